
mod block_file;

use std::io;
use std::path::Path;
use std::sync::Arc;

use ecsfs::volume::SuperBlock;
use ecsfs::{Error, MountError, Volume};

pub use self::block_file::BlockFile;

/// 打开磁盘镜像并挂载其中的卷
pub fn mount(path: impl AsRef<Path>) -> ecsfs::Result<Volume> {
    let path = path.as_ref();
    let dev = BlockFile::open(path).map_err(|e| {
        log::warn!("Cannot open {path:?}: {e}");
        Error::Mount(MountError::Open)
    })?;
    Volume::mount(Arc::new(dev))
}

/// 新建恰好容纳`data_blocks`个数据块的磁盘镜像并格式化
pub fn mkfs(path: impl AsRef<Path>, data_blocks: u16) -> io::Result<Volume> {
    let sb = SuperBlock::new(data_blocks).ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{data_blocks} data blocks don't fit in a volume"),
        )
    })?;
    let dev = BlockFile::create(path, sb.total_blocks.into())?;
    Volume::format(Arc::new(dev)).map_err(io::Error::other)
}
