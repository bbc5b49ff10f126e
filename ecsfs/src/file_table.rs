//! # 打开文件表
//!
//! 定长的槽位数组，槽位下标即文件描述符。
//! 同一文件可被多次打开，各描述符的偏移互不影响。
//! 文件被删除后，指向它的描述符只能关闭，即使之后又建立了同名文件。

use alloc::string::String;
use alloc::vec::Vec;

use crate::{Error, Result, MAX_OPEN};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenFile {
    /// 以名字引用根目录中的文件
    pub name: String,
    /// 当前读写偏移
    pub offset: usize,
    /// 所指的文件已被删除
    pub detached: bool,
}

#[derive(Debug)]
pub struct FileTable {
    slots: Vec<Option<OpenFile>>,
}

impl FileTable {
    pub fn new() -> Self {
        Self {
            slots: (0..MAX_OPEN).map(|_| None).collect(),
        }
    }

    /// 占用最靠前的空槽位，返回描述符
    pub fn open(&mut self, name: &str) -> Result<usize> {
        let fd = self
            .slots
            .iter()
            .position(Option::is_none)
            .ok_or(Error::TableFull)?;
        self.slots[fd] = Some(OpenFile {
            name: name.into(),
            offset: 0,
            detached: false,
        });
        Ok(fd)
    }

    pub fn close(&mut self, fd: usize) -> Result<OpenFile> {
        self.slots
            .get_mut(fd)
            .and_then(Option::take)
            .ok_or(Error::InvalidDescriptor)
    }

    pub fn get(&self, fd: usize) -> Result<&OpenFile> {
        self.slots
            .get(fd)
            .and_then(Option::as_ref)
            .ok_or(Error::InvalidDescriptor)
    }

    pub fn get_mut(&mut self, fd: usize) -> Result<&mut OpenFile> {
        self.slots
            .get_mut(fd)
            .and_then(Option::as_mut)
            .ok_or(Error::InvalidDescriptor)
    }

    /// 令所有指向`name`的描述符失效，返回受影响的个数
    pub fn detach(&mut self, name: &str) -> usize {
        self.slots
            .iter_mut()
            .flatten()
            .filter(|file| !file.detached && file.name == name)
            .map(|file| file.detached = true)
            .count()
    }

    /// 已打开的描述符数
    #[cfg(test)]
    pub fn count(&self) -> usize {
        self.slots.iter().flatten().count()
    }
}
