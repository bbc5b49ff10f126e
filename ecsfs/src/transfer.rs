//! # 读写引擎
//!
//! 以描述符的当前偏移为起点，沿簇链逐块搬运数据。
//! 每次只经由一个暂存块，块内部分一次拷贝完，写入的块立即写回。

use alloc::vec;
use alloc::vec::Vec;

use crate::block::Staging;
use crate::volume::Position;
use crate::{Error, Result, Volume, BLOCK_SIZE};

impl Volume {
    /// 从当前偏移读取至多`buf.len()`字节，不会越过文件末尾。
    /// 偏移前进实际读到的字节数。
    pub fn read_into(&mut self, fd: usize, buf: &mut [u8]) -> Result<usize> {
        let slot = self.lookup(fd)?;
        let dirent = self.root_dir.get(slot);
        let size = dirent.size();
        let offset = self.files.get(fd)?.offset;

        let Some(head) = dirent.first_block() else {
            return Ok(0);
        };
        if buf.is_empty() || offset >= size {
            return Ok(0);
        }

        let end = size.min(offset + buf.len()); // exclusive
        let mut staging = Staging::new();
        let mut pos = offset;

        let mut current = match self.fat.block_at_offset(head, pos) {
            Position::At(id) => Some(id),
            Position::PastEnd { tail, missing } => {
                log::warn!("Chain of fd {fd} ends at {tail}, {missing} blocks short of {pos}");
                None
            }
        };

        while let Some(id) = current {
            staging.load(&*self.dev, self.super_block.data_block(id))?;

            let in_block = pos % BLOCK_SIZE;
            let len = (BLOCK_SIZE - in_block).min(end - pos);
            let copied = pos - offset;
            buf[copied..copied + len]
                .copy_from_slice(&staging.as_slice()[in_block..in_block + len]);
            pos += len;

            if pos == end {
                break;
            }
            current = self.fat.next(id);
            if current.is_none() {
                log::warn!("Chain of fd {fd} ends before its size {size}");
            }
        }

        self.files.get_mut(fd)?.offset = pos;
        log::trace!("read fd {fd}: {offset}..{pos}");

        Ok(pos - offset)
    }

    /// 从当前偏移读取至多`count`字节
    pub fn read(&mut self, fd: usize, count: usize) -> Result<Vec<u8>> {
        let available = self.stat(fd)?.saturating_sub(self.tell(fd)?);
        let mut buf = vec![0; count.min(available)];
        let len = self.read_into(fd, &mut buf)?;
        buf.truncate(len);
        Ok(buf)
    }

    /// 从当前偏移写入`data`，返回实际写入的字节数。
    ///
    /// 写到文件末尾之后时文件随之增长，链表不够长就追加新块；
    /// 卷的空间耗尽时提前结束，写入的字节数可能少于`data.len()`。
    pub fn write(&mut self, fd: usize, data: &[u8]) -> Result<usize> {
        let slot = self.lookup(fd)?;
        let offset = self.files.get(fd)?.offset;
        if data.is_empty() {
            return Ok(0);
        }

        let mut staging = Staging::new();

        // 空文件先分配链头
        let (head, head_fresh) = match self.root_dir.get(slot).first_block() {
            Some(head) => (head, false),
            None => match self.fat.alloc(&*self.dev) {
                Ok(head) => {
                    self.root_dir.get_mut(slot).set_first_block(Some(head));
                    if let Err(e) = self.root_dir.store(&*self.dev) {
                        self.root_dir.get_mut(slot).set_first_block(None);
                        self.fat.release(&*self.dev, head);
                        return Err(e.into());
                    }
                    (head, true)
                }
                Err(Error::NoSpace) => {
                    log::warn!("No free block for fd {fd}");
                    return Ok(0);
                }
                Err(e) => return Err(e),
            },
        };

        // 偏移恰好落在链尾之后时立即追加，途经的新块一律清零
        let (mut current, mut fresh) = match self.fat.block_at_offset(head, offset) {
            Position::At(id) => (id, head_fresh),
            Position::PastEnd { mut tail, missing } => {
                let mut tail_fresh = head_fresh && tail == head;
                for _ in 0..missing {
                    if tail_fresh {
                        staging.zeroize(&*self.dev, self.super_block.data_block(tail))?;
                        staging.sync(&*self.dev)?;
                    }
                    tail = match self.fat.extend(&*self.dev, tail) {
                        Ok(next) => next,
                        Err(Error::NoSpace) => {
                            log::warn!("No free block for fd {fd}");
                            return Ok(0);
                        }
                        Err(e) => return Err(e),
                    };
                    tail_fresh = true;
                }
                (tail, true)
            }
        };

        let mut pos = offset;

        loop {
            let bid = self.super_block.data_block(current);
            if fresh {
                staging.zeroize(&*self.dev, bid)?;
            } else {
                staging.load(&*self.dev, bid)?;
            }

            let in_block = pos % BLOCK_SIZE;
            let written = pos - offset;
            let len = (BLOCK_SIZE - in_block).min(data.len() - written);
            staging.as_mut_slice()[in_block..in_block + len]
                .copy_from_slice(&data[written..written + len]);
            staging.sync(&*self.dev)?;
            pos += len;
            self.files.get_mut(fd)?.offset = pos;

            let dirent = self.root_dir.get_mut(slot);
            if pos > dirent.size() {
                dirent.resize(pos);
                self.root_dir.store(&*self.dev)?;
            }

            if pos - offset == data.len() {
                break;
            }

            // 跨过块边界：已有的下一块直接沿用，否则追加
            (current, fresh) = match self.fat.next(current) {
                Some(next) => (next, false),
                None => match self.fat.extend(&*self.dev, current) {
                    Ok(next) => (next, true),
                    Err(Error::NoSpace) => {
                        log::warn!(
                            "Volume full, fd {fd} wrote {} of {} bytes",
                            pos - offset,
                            data.len()
                        );
                        break;
                    }
                    Err(e) => return Err(e),
                },
            };
        }

        log::trace!("write fd {fd}: {offset}..{pos}");
        Ok(pos - offset)
    }
}
