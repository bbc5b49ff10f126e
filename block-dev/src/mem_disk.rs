use alloc::boxed::Box;
use alloc::vec::Vec;

use spin::Mutex;

use crate::{Block, BlockDevice, DeviceError, BLOCK_SIZE};

/// 内存中的块设备
#[derive(Debug)]
pub struct MemDisk {
    inner: Mutex<Inner>,
}

#[derive(Debug)]
struct Inner {
    blocks: Vec<Box<Block>>,
    closed: bool,
}

impl MemDisk {
    pub fn new(block_count: usize) -> Self {
        Self::from_blocks((0..block_count).map(|_| Box::new([0; BLOCK_SIZE])).collect())
    }

    pub fn from_blocks(blocks: Vec<Box<Block>>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                blocks,
                closed: false,
            }),
        }
    }

    /// 拷贝出全部块，关闭后也可用，方便模拟重新挂载
    pub fn snapshot(&self) -> Vec<Box<Block>> {
        self.inner.lock().blocks.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }
}

impl BlockDevice for MemDisk {
    fn block_count(&self) -> usize {
        self.inner.lock().blocks.len()
    }

    fn read_block(&self, block_id: usize, buf: &mut Block) -> Result<(), DeviceError> {
        let inner = self.inner.lock();
        if inner.closed {
            return Err(DeviceError::Closed);
        }
        let block = inner
            .blocks
            .get(block_id)
            .ok_or(DeviceError::OutOfRange(block_id))?;
        buf.copy_from_slice(block.as_slice());
        Ok(())
    }

    fn write_block(&self, block_id: usize, buf: &Block) -> Result<(), DeviceError> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(DeviceError::Closed);
        }
        let block = inner
            .blocks
            .get_mut(block_id)
            .ok_or(DeviceError::OutOfRange(block_id))?;
        block.copy_from_slice(buf);
        Ok(())
    }

    fn close(&self) -> Result<(), DeviceError> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(DeviceError::Closed);
        }
        inner.closed = true;
        Ok(())
    }
}
