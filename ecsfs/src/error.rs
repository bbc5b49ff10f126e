use block_dev::DeviceError;
use derive_more::Display;

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    #[display(fmt = "mount failed: {}", _0)]
    Mount(MountError),
    #[display(fmt = "no such file")]
    NotFound,
    #[display(fmt = "file already exists")]
    AlreadyExists,
    #[display(fmt = "root directory is full")]
    DirectoryFull,
    #[display(fmt = "open file table is full")]
    TableFull,
    #[display(fmt = "invalid file descriptor")]
    InvalidDescriptor,
    #[display(fmt = "invalid argument")]
    InvalidArgument,
    #[display(fmt = "no space left on volume")]
    NoSpace,
    #[display(fmt = "device error: {}", _0)]
    Device(DeviceError),
}

/// 挂载被拒的原因
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum MountError {
    #[display(fmt = "cannot open device")]
    Open,
    #[display(fmt = "cannot read metadata: {}", _0)]
    Io(DeviceError),
    #[display(fmt = "bad signature")]
    Signature,
    #[display(fmt = "device has {} blocks, superblock records {}", device, recorded)]
    BlockCount { device: usize, recorded: usize },
    #[display(fmt = "inconsistent geometry")]
    Geometry,
    /// FAT的0号条目不是链尾标记
    #[display(fmt = "corrupted allocation table head")]
    FatHead,
}

impl From<DeviceError> for Error {
    fn from(e: DeviceError) -> Self {
        Self::Device(e)
    }
}

impl From<MountError> for Error {
    fn from(e: MountError) -> Self {
        Self::Mount(e)
    }
}

impl core::error::Error for Error {}

pub type Result<T> = core::result::Result<T, Error>;
