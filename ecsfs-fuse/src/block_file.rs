use std::cell::{RefCell, RefMut};
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

use block_dev::{Block, BlockDevice, DeviceError, BLOCK_SIZE};
use send_wrapper::SendWrapper;

/// A disk image file seen as a block device.
///
/// The file handle is pinned to the thread that created it: accessing the
/// device from any other thread panics, even through `Volume::shared`.
#[derive(Debug)]
pub struct BlockFile {
    /// `None` once the device is closed.
    inner: SendWrapper<RefCell<Option<File>>>,
    block_count: usize,
}

impl BlockFile {
    pub fn new(fd: File, block_count: usize) -> Self {
        Self {
            inner: SendWrapper::new(RefCell::new(Some(fd))),
            block_count,
        }
    }

    /// Opens an existing image, which must be a whole number of blocks long.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let fd = OpenOptions::new().read(true).write(true).open(path)?;
        let len = fd.metadata()?.len();
        if len % BLOCK_SIZE as u64 != 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("image size {len} is not a multiple of {BLOCK_SIZE}"),
            ));
        }
        Ok(Self::new(fd, (len / BLOCK_SIZE as u64) as usize))
    }

    /// Creates (or truncates) an image of `block_count` zeroed blocks.
    pub fn create(path: impl AsRef<Path>, block_count: usize) -> io::Result<Self> {
        let fd = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        fd.set_len((block_count * BLOCK_SIZE) as u64)?;
        Ok(Self::new(fd, block_count))
    }

    fn seek_to(
        &self,
        block_id: usize,
        on_err: DeviceError,
    ) -> Result<RefMut<'_, File>, DeviceError> {
        if block_id >= self.block_count {
            return Err(DeviceError::OutOfRange(block_id));
        }
        let mut file = RefMut::filter_map(self.inner.borrow_mut(), Option::as_mut)
            .map_err(|_| DeviceError::Closed)?;
        file.seek(SeekFrom::Start((block_id * BLOCK_SIZE) as u64))
            .map_err(|e| {
                log::error!("seeking to block {block_id}: {e}");
                on_err
            })?;
        Ok(file)
    }
}

impl BlockDevice for BlockFile {
    fn block_count(&self) -> usize {
        self.block_count
    }

    fn read_block(&self, block_id: usize, buf: &mut Block) -> Result<(), DeviceError> {
        self.seek_to(block_id, DeviceError::Read)?.read_exact(buf).map_err(|e| {
            log::error!("reading block {block_id}: {e}");
            DeviceError::Read
        })
    }

    fn write_block(&self, block_id: usize, buf: &Block) -> Result<(), DeviceError> {
        self.seek_to(block_id, DeviceError::Write)?.write_all(buf).map_err(|e| {
            log::error!("writing block {block_id}: {e}");
            DeviceError::Write
        })
    }

    fn close(&self) -> Result<(), DeviceError> {
        let file = self.inner.borrow_mut().take().ok_or(DeviceError::Closed)?;
        file.sync_all().map_err(|e| {
            log::error!("syncing image: {e}");
            DeviceError::Write
        })
    }
}
