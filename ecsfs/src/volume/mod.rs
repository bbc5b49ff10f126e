//! 卷的布局
//!
//! 超级块 | FAT区 | 根目录 | 数据区
//!
//! 所有多字节字段均为小端序。

pub mod fat;
pub mod root_dir;
pub mod super_block;

pub use self::{
    fat::{Fat, FatEntry, Position},
    root_dir::{DirEntry, RootDir},
    super_block::SuperBlock,
};

#[cfg(test)]
mod tests {
    use block_dev::BLOCK_SIZE;

    use super::root_dir::DIR_ENTRY_SIZE;
    use crate::{MAX_FILES, SIGNATURE};

    #[test]
    fn volume() {
        assert_eq!(BLOCK_SIZE, DIR_ENTRY_SIZE * MAX_FILES);
        assert_eq!(8, SIGNATURE.len());
    }
}
