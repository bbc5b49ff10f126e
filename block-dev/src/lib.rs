//! # 块设备接口层
//!
//! 块设备以固定大小的**块**为单位读写数据，
//! [`BlockDevice`] 是对其的抽象，实现了此特质的类型称为**块设备驱动**。
//!
//! 打开设备由驱动自己的构造函数负责，关闭则通过 [`BlockDevice::close`]。

#![no_std]

extern crate alloc;

mod mem_disk;

use core::any::Any;
use core::fmt::Debug;

use derive_more::Display;

pub use self::mem_disk::MemDisk;

/// 块的字节量，所有驱动都以此为单位读写
pub const BLOCK_SIZE: usize = 4096;

pub type Block = [u8; BLOCK_SIZE];

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum DeviceError {
    /// 块编号超出设备范围
    #[display(fmt = "block {} is out of range", _0)]
    OutOfRange(usize),
    /// 底层读失败
    Read,
    /// 底层写失败
    Write,
    /// 设备已关闭
    Closed,
}

/// 块设备驱动特质
pub trait BlockDevice: Send + Sync + Any + Debug {
    /// 设备的总块数
    fn block_count(&self) -> usize;

    fn read_block(&self, block_id: usize, buf: &mut Block) -> Result<(), DeviceError>;

    fn write_block(&self, block_id: usize, buf: &Block) -> Result<(), DeviceError>;

    /// 释放设备，此后的读写都应报错
    fn close(&self) -> Result<(), DeviceError>;
}
