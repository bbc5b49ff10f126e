pub use block_dev::BLOCK_SIZE;

/// 超级块开头的签名
pub const SIGNATURE: [u8; 8] = *b"ECS150FS";

/// 目录项中文件名字段的宽度，含结尾的NUL
pub const FILENAME_LEN: usize = 16;
pub const MAX_NAME_LEN: usize = FILENAME_LEN - 1;

/// 根目录的容量
pub const MAX_FILES: usize = 128;
/// 打开文件表的容量
pub const MAX_OPEN: usize = 32;
