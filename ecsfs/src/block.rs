//! 块的抽象
//!
//! [`BlockId`] 是设备上的物理块号，[`DataIndex`] 是数据块在FAT中的索引，
//! [`Staging`] 是读写引擎唯一的暂存块。

use alloc::boxed::Box;

use block_dev::{Block, BlockDevice, DeviceError};
use derive_more::{Add, Display, From, Into};

use crate::BLOCK_SIZE;

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Add, From, Into)]
#[repr(transparent)]
pub struct BlockId(usize);

impl core::ops::Add<usize> for BlockId {
    type Output = Self;

    fn add(self, rhs: usize) -> Self::Output {
        self + Self(rhs)
    }
}

impl BlockId {
    pub const fn new(raw: usize) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> usize {
        self.0
    }
}

/// 数据块的索引，亦即FAT条目的下标。
///
/// 0号恒为保留，不属于任何文件。
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, From, Into)]
#[repr(transparent)]
pub struct DataIndex(u16);

impl DataIndex {
    pub const RESERVED: Self = Self(0);

    pub const fn new(raw: u16) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// 内存中的暂存块
#[derive(Debug)]
pub struct Staging {
    /// 暂存的数据
    data: Box<Block>,
    /// 对应的块号
    id: BlockId,
    /// 是否为脏块
    modified: bool,
}

impl Staging {
    pub fn new() -> Self {
        Self {
            data: Box::new([0; BLOCK_SIZE]),
            id: BlockId::new(0),
            modified: false,
        }
    }

    /// 换入`id`指向的块，换出前先写回脏数据
    pub fn load(&mut self, dev: &dyn BlockDevice, id: BlockId) -> Result<(), DeviceError> {
        self.sync(dev)?;
        dev.read_block(id.get(), &mut self.data)?;
        self.id = id;
        Ok(())
    }

    /// 换入一个新分配的块，不必读取旧内容
    pub fn zeroize(&mut self, dev: &dyn BlockDevice, id: BlockId) -> Result<(), DeviceError> {
        self.sync(dev)?;
        self.data.fill(0);
        self.id = id;
        self.modified = true;
        Ok(())
    }

    pub fn sync(&mut self, dev: &dyn BlockDevice) -> Result<(), DeviceError> {
        if self.modified {
            dev.write_block(self.id.get(), &self.data)?;
            self.modified = false;
        }
        Ok(())
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        self.data.as_slice()
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        self.modified = true;
        self.data.as_mut_slice()
    }
}
