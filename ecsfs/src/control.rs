use alloc::string::String;
use alloc::sync::Arc;

use block_dev::{BlockDevice, BLOCK_SIZE};
use spin::Mutex;

use crate::file_table::FileTable;
use crate::volume::root_dir::validate_name;
use crate::volume::{Fat, FatEntry, RootDir, SuperBlock};
use crate::{DataIndex, Error, MountError, OpenFile, Result};

/// 已挂载的卷。
///
/// 超级块、FAT、根目录在内存中各有一份，修改后立即写穿到设备。
#[derive(Debug)]
pub struct Volume {
    pub(crate) dev: Arc<dyn BlockDevice>,
    pub(crate) super_block: SuperBlock,
    pub(crate) fat: Fat,
    pub(crate) root_dir: RootDir,
    pub(crate) files: FileTable,
}

/// 卷的几何信息与空闲比例
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeInfo {
    pub total_blocks: usize,
    pub fat_blocks: usize,
    pub root_index: usize,
    pub data_start: usize,
    pub data_blocks: usize,
    /// 空闲的FAT条目数，分母为`data_blocks`
    pub fat_free: usize,
    /// 空闲的目录项数，分母为[`MAX_FILES`](crate::MAX_FILES)
    pub dir_free: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    pub name: String,
    pub size: usize,
    /// 空文件为`None`
    pub first_block: Option<DataIndex>,
}

impl Volume {
    /// 在设备上建立全新的卷，布局由设备的块数决定
    pub fn format(dev: Arc<dyn BlockDevice>) -> Result<Self> {
        let block_count = dev.block_count();
        let super_block = SuperBlock::for_device(block_count).ok_or_else(|| {
            log::warn!("No geometry fits {block_count} blocks");
            Error::InvalidArgument
        })?;
        log::info!("format: {super_block:?}");

        let volume = Self {
            fat: Fat::new(&super_block),
            root_dir: RootDir::new(super_block.root_dir()),
            files: FileTable::new(),
            super_block,
            dev,
        };
        volume.sync()?;

        Ok(volume)
    }

    /// 挂载设备上的卷，失败时设备被关闭
    pub fn mount(dev: Arc<dyn BlockDevice>) -> Result<Self> {
        match Self::load(&dev) {
            Ok((super_block, fat, root_dir)) => {
                log::info!("mount: {super_block:?}");
                Ok(Self {
                    dev,
                    super_block,
                    fat,
                    root_dir,
                    files: FileTable::new(),
                })
            }
            Err(e) => {
                log::warn!("Rejecting volume: {e}");
                if let Err(close_err) = dev.close() {
                    log::error!("Failed to close rejected device: {close_err}");
                }
                Err(e.into())
            }
        }
    }

    /// 写回超级块、整张FAT和根目录
    pub fn sync(&self) -> Result<()> {
        let mut buf = [0; BLOCK_SIZE];
        self.super_block.encode(&mut buf);
        self.dev.write_block(SuperBlock::SUPER_BLOCK.get(), &buf)?;
        self.fat.store(&*self.dev)?;
        self.root_dir.store(&*self.dev)?;
        Ok(())
    }

    /// 写回全部元数据后关闭设备。
    /// 写回失败时中止，不关闭设备。
    pub fn unmount(self) -> Result<()> {
        self.sync()?;
        self.dev.close()?;
        log::info!("unmount");
        Ok(())
    }

    pub fn info(&self) -> VolumeInfo {
        let sb = &self.super_block;
        VolumeInfo {
            total_blocks: sb.total_blocks.into(),
            fat_blocks: sb.fat_blocks.into(),
            root_index: sb.root_index.into(),
            data_start: sb.data_start.into(),
            data_blocks: sb.data_blocks.into(),
            fat_free: self.fat.free_count(),
            dir_free: self.root_dir.free_count(),
        }
    }

    pub fn super_block(&self) -> &SuperBlock {
        &self.super_block
    }

    pub fn fat(&self) -> &Fat {
        &self.fat
    }

    /// 供多方共享的卷，锁住整个卷来串行化访问。
    ///
    /// 能否跨线程取决于设备驱动：只能在创建线程上使用的驱动
    /// （如`ecsfs-fuse`的`BlockFile`）被别的线程访问时会panic。
    pub fn shared(self) -> Arc<Mutex<Self>> {
        Arc::new(Mutex::new(self))
    }
}

impl Volume {
    pub fn create(&mut self, name: &str) -> Result<()> {
        let slot = self.root_dir.insert(name)?;
        if let Err(e) = self.root_dir.store(&*self.dev) {
            self.root_dir.clear(slot);
            return Err(e.into());
        }
        log::debug!("create {name:?} at slot {slot}");
        Ok(())
    }

    /// 删除文件，释放其整条链表。
    /// 仍指向该文件的描述符随之失效，之后只能关闭。
    pub fn delete(&mut self, name: &str) -> Result<()> {
        let slot = self.root_dir.find(name).ok_or(Error::NotFound)?;
        if let Some(head) = self.root_dir.get(slot).first_block() {
            self.fat.free_chain(&*self.dev, head)?;
        }
        // 链表已释放，目录项无论能否写回都不能再指向它
        self.root_dir.clear(slot);
        let detached = self.files.detach(name);
        log::debug!("delete {name:?} from slot {slot}, {detached} descriptors detached");
        self.root_dir.store(&*self.dev)?;
        Ok(())
    }

    /// 按槽位顺序列出全部文件
    pub fn list(&self) -> impl Iterator<Item = FileInfo> + '_ {
        self.root_dir.iter().map(|(_, dirent)| FileInfo {
            name: dirent.name().into_owned(),
            size: dirent.size(),
            first_block: dirent.first_block(),
        })
    }

    pub fn stat_name(&self, name: &str) -> Result<usize> {
        let slot = self.root_dir.find(name).ok_or(Error::NotFound)?;
        Ok(self.root_dir.get(slot).size())
    }

    /// 打开文件，返回描述符，偏移置0
    pub fn open(&mut self, name: &str) -> Result<usize> {
        validate_name(name)?;
        if self.root_dir.find(name).is_none() {
            return Err(Error::NotFound);
        }
        let fd = self.files.open(name)?;
        log::trace!("open {name:?} as fd {fd}");
        Ok(fd)
    }

    pub fn close(&mut self, fd: usize) -> Result<()> {
        let file = self.files.close(fd)?;
        log::trace!("close fd {fd} ({:?})", file.name);
        Ok(())
    }

    pub fn stat(&self, fd: usize) -> Result<usize> {
        let slot = self.lookup(fd)?;
        Ok(self.root_dir.get(slot).size())
    }

    /// 移动偏移，不得越过文件末尾
    pub fn seek(&mut self, fd: usize, offset: usize) -> Result<()> {
        if offset > self.stat(fd)? {
            return Err(Error::InvalidArgument);
        }
        self.files.get_mut(fd)?.offset = offset;
        Ok(())
    }

    pub fn tell(&self, fd: usize) -> Result<usize> {
        Ok(self.files.get(fd)?.offset)
    }

    pub fn open_file(&self, fd: usize) -> Result<&OpenFile> {
        self.files.get(fd)
    }

    /// 描述符所指文件在根目录中的槽位
    pub(crate) fn lookup(&self, fd: usize) -> Result<usize> {
        let file = self.files.get(fd)?;
        if file.detached {
            return Err(Error::NotFound);
        }
        let slot = self.root_dir.find(&file.name).ok_or(Error::NotFound)?;
        if file.offset > self.root_dir.get(slot).size() {
            log::warn!("fd {fd} at {} is past the end of {:?}", file.offset, file.name);
            return Err(Error::InvalidArgument);
        }
        Ok(slot)
    }
}

impl Volume {
    fn load(
        dev: &Arc<dyn BlockDevice>,
    ) -> core::result::Result<(SuperBlock, Fat, RootDir), MountError> {
        let mut buf = [0; BLOCK_SIZE];
        dev.read_block(SuperBlock::SUPER_BLOCK.get(), &mut buf)
            .map_err(MountError::Io)?;

        let super_block = SuperBlock::decode(&buf)?;
        super_block.validate(dev.block_count())?;

        let fat = Fat::load(&**dev, &super_block).map_err(MountError::Io)?;
        if fat.get(DataIndex::RESERVED) != Some(FatEntry::EndOfChain) {
            return Err(MountError::FatHead);
        }

        let root_dir = RootDir::load(&**dev, super_block.root_dir()).map_err(MountError::Io)?;

        Ok((super_block, fat, root_dir))
    }
}

#[cfg(test)]
mod tests {
    use block_dev::MemDisk;

    use super::*;
    use crate::MAX_FILES;

    fn volume(data_blocks: u16) -> Volume {
        let sb = SuperBlock::new(data_blocks).unwrap();
        Volume::format(Arc::new(MemDisk::new(sb.total_blocks.into()))).unwrap()
    }

    #[test]
    fn info() {
        let mut vol = volume(100);
        vol.create("a").unwrap();
        assert_eq!(
            VolumeInfo {
                total_blocks: 103,
                fat_blocks: 1,
                root_index: 2,
                data_start: 3,
                data_blocks: 100,
                fat_free: 99,
                dir_free: MAX_FILES - 1,
            },
            vol.info()
        );
    }

    #[test]
    fn failed_create_leaves_directory() {
        let mut vol = volume(4);
        vol.create("a").unwrap();
        assert_eq!(Err(Error::AlreadyExists), vol.create("a"));
        assert_eq!(Err(Error::InvalidArgument), vol.create(""));
        assert_eq!(Err(Error::InvalidArgument), vol.create("this-name-is-too-long"));
        assert_eq!(1, vol.list().count());
    }

    #[test]
    fn open_requires_existing_file() {
        let mut vol = volume(4);
        assert_eq!(Err(Error::NotFound), vol.open("missing"));
        assert_eq!(Err(Error::InvalidArgument), vol.open(""));
        assert_eq!(Err(Error::InvalidDescriptor), vol.stat(0));
    }

    #[test]
    fn seek_past_end() {
        let mut vol = volume(4);
        vol.create("a").unwrap();
        let fd = vol.open("a").unwrap();
        assert_eq!(Ok(()), vol.seek(fd, 0));
        assert_eq!(Err(Error::InvalidArgument), vol.seek(fd, 1));
        assert_eq!(Ok(0), vol.tell(fd));
    }

    #[test]
    fn deleted_while_open() {
        let mut vol = volume(4);
        vol.create("a").unwrap();
        let fd = vol.open("a").unwrap();
        vol.delete("a").unwrap();

        assert_eq!(Err(Error::NotFound), vol.stat(fd));
        assert_eq!(Err(Error::NotFound), vol.seek(fd, 0));
        // 描述符本身仍然有效，可以关闭
        assert_eq!(Ok(()), vol.close(fd));
    }

    #[test]
    fn recreated_file_ignores_old_descriptor() {
        let mut vol = volume(8);
        vol.create("a").unwrap();
        let stale = vol.open("a").unwrap();
        assert_eq!(5000, vol.write(stale, &[0x5A; 5000]).unwrap());

        vol.delete("a").unwrap();
        vol.create("a").unwrap();

        assert_eq!(Err(Error::NotFound), vol.write(stale, b"xyz"));
        assert_eq!(Err(Error::NotFound), vol.read(stale, 3));
        assert_eq!(Err(Error::NotFound), vol.seek(stale, 0));
        assert_eq!(Ok(0), vol.stat_name("a"));
        assert_eq!(Ok(5000), vol.tell(stale));

        let fd = vol.open("a").unwrap();
        assert_eq!(3, vol.write(fd, b"xyz").unwrap());
        vol.seek(fd, 0).unwrap();
        assert_eq!(b"xyz".to_vec(), vol.read(fd, 10).unwrap());
        assert_eq!(Ok(()), vol.close(stale));
    }
}
