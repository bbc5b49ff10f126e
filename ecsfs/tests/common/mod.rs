#![allow(dead_code)]

use std::sync::Arc;

use block_dev::MemDisk;
use ecsfs::volume::SuperBlock;
use ecsfs::Volume;

/// 格式化一个有`data_blocks`个数据块的内存卷
pub fn format(data_blocks: u16) -> (Arc<MemDisk>, Volume) {
    let sb = SuperBlock::new(data_blocks).unwrap();
    let disk = Arc::new(MemDisk::new(sb.total_blocks.into()));
    let volume = Volume::format(disk.clone()).unwrap();
    (disk, volume)
}

/// 卸载后在同样内容的新设备上重新挂载
pub fn remount(disk: &MemDisk, volume: Volume) -> (Arc<MemDisk>, Volume) {
    volume.unmount().unwrap();
    assert!(disk.is_closed());
    let disk = Arc::new(MemDisk::from_blocks(disk.snapshot()));
    let volume = Volume::mount(disk.clone()).unwrap();
    (disk, volume)
}

pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 % 251) as u8).collect()
}
