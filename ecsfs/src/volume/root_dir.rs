//! 根目录
//!
//! 唯一的目录，整块存放[`MAX_FILES`]个定长目录项。
//! 文件名首字节为NUL的目录项即为空闲。

use alloc::borrow::Cow;
use alloc::boxed::Box;
use alloc::string::String;

use block_dev::{Block, BlockDevice, DeviceError};

use crate::volume::FatEntry;
use crate::{BlockId, DataIndex, Error, Result, BLOCK_SIZE, FILENAME_LEN, MAX_FILES, MAX_NAME_LEN};

pub const DIR_ENTRY_SIZE: usize = BLOCK_SIZE / MAX_FILES;

/// 目录项，在磁盘上占32字节：
/// 文件名(16) | 文件大小(4) | 首个数据块(2) | 保留(10)
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DirEntry {
    name: [u8; FILENAME_LEN],
    size: u32,
    /// 空文件没有数据块，磁盘上记为链尾标记
    first_block: Option<DataIndex>,
}

impl DirEntry {
    pub fn new(name: &str) -> Result<Self> {
        validate_name(name)?;

        let mut dirent = Self::default();
        dirent.name[..name.len()].copy_from_slice(name.as_bytes());
        Ok(dirent)
    }

    pub fn is_free(&self) -> bool {
        self.name[0] == 0
    }

    pub fn name_bytes(&self) -> &[u8] {
        let len = self
            .name
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(FILENAME_LEN);
        &self.name[..len]
    }

    pub fn name(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.name_bytes())
    }

    /// 空名字不与任何目录项匹配
    pub fn matches(&self, name: &str) -> bool {
        !name.is_empty() && !self.is_free() && self.name_bytes() == name.as_bytes()
    }

    pub const fn size(&self) -> usize {
        self.size as usize
    }

    pub fn resize(&mut self, size: usize) {
        self.size = size as u32;
    }

    pub const fn first_block(&self) -> Option<DataIndex> {
        self.first_block
    }

    pub fn set_first_block(&mut self, id: Option<DataIndex>) {
        self.first_block = id;
    }

    fn decode(raw: &[u8]) -> Self {
        let mut name = [0; FILENAME_LEN];
        name.copy_from_slice(&raw[..FILENAME_LEN]);
        let size = u32::from_le_bytes([raw[16], raw[17], raw[18], raw[19]]);
        let first_block = match FatEntry::from(u16::from_le_bytes([raw[20], raw[21]])) {
            FatEntry::Next(id) => Some(id),
            FatEntry::Free | FatEntry::EndOfChain => None,
        };

        Self {
            name,
            size,
            first_block,
        }
    }

    fn encode(&self, raw: &mut [u8]) {
        raw.fill(0);
        raw[..FILENAME_LEN].copy_from_slice(&self.name);
        raw[16..20].copy_from_slice(&self.size.to_le_bytes());
        let first_block = self
            .first_block
            .map_or(FatEntry::EndOfChain, FatEntry::Next);
        raw[20..22].copy_from_slice(&u16::from(first_block).to_le_bytes());
    }
}

/// 合法的文件名非空、不含NUL，且留得下结尾的NUL
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > MAX_NAME_LEN || name.as_bytes().contains(&0) {
        return Err(Error::InvalidArgument);
    }
    Ok(())
}

#[derive(Debug)]
pub struct RootDir {
    entries: Box<[DirEntry]>,
    block: BlockId,
}

impl RootDir {
    pub fn new(block: BlockId) -> Self {
        Self {
            entries: (0..MAX_FILES).map(|_| DirEntry::default()).collect(),
            block,
        }
    }

    pub fn load(dev: &dyn BlockDevice, block: BlockId) -> core::result::Result<Self, DeviceError> {
        let mut buf = [0; BLOCK_SIZE];
        dev.read_block(block.get(), &mut buf)?;

        Ok(Self {
            entries: buf.chunks_exact(DIR_ENTRY_SIZE).map(DirEntry::decode).collect(),
            block,
        })
    }

    pub fn store(&self, dev: &dyn BlockDevice) -> core::result::Result<(), DeviceError> {
        let mut buf: Block = [0; BLOCK_SIZE];
        for (raw, dirent) in buf.chunks_exact_mut(DIR_ENTRY_SIZE).zip(self.entries.iter()) {
            dirent.encode(raw);
        }
        dev.write_block(self.block.get(), &buf)
    }

    /// 搜索指定名称的目录项，返回其槽位
    pub fn find(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|dirent| dirent.matches(name))
    }

    pub fn get(&self, slot: usize) -> &DirEntry {
        &self.entries[slot]
    }

    pub fn get_mut(&mut self, slot: usize) -> &mut DirEntry {
        &mut self.entries[slot]
    }

    /// 占用最靠前的空闲目录项
    pub fn insert(&mut self, name: &str) -> Result<usize> {
        let dirent = DirEntry::new(name)?;
        if self.find(name).is_some() {
            return Err(Error::AlreadyExists);
        }
        let slot = self
            .entries
            .iter()
            .position(DirEntry::is_free)
            .ok_or(Error::DirectoryFull)?;
        self.entries[slot] = dirent;
        Ok(slot)
    }

    pub fn clear(&mut self, slot: usize) {
        self.entries[slot] = DirEntry::default();
    }

    /// 按槽位顺序遍历已占用的目录项
    pub fn iter(&self) -> impl Iterator<Item = (usize, &DirEntry)> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, dirent)| !dirent.is_free())
    }

    pub fn free_count(&self) -> usize {
        self.entries.iter().filter(|dirent| dirent.is_free()).count()
    }
}
