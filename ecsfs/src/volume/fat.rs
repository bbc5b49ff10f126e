//! 文件分配表
//!
//! 每个数据块对应一条16位的条目，其中存放着链表上下一个数据块的索引。
//! `0`表示块未分配，`0xFFFF`表示链尾；0号条目保留，恒为链尾。

use alloc::vec;
use alloc::vec::Vec;
use core::mem;
use core::ops::Range;

use block_dev::{BlockDevice, DeviceError};

use crate::volume::SuperBlock;
use crate::{BlockId, DataIndex, Error, Result, BLOCK_SIZE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FatEntry {
    Free,
    EndOfChain,
    Next(DataIndex),
}

impl FatEntry {
    pub const FREE_RAW: u16 = 0;
    pub const EOC_RAW: u16 = 0xFFFF;
}

impl From<u16> for FatEntry {
    fn from(raw: u16) -> Self {
        match raw {
            Self::FREE_RAW => Self::Free,
            Self::EOC_RAW => Self::EndOfChain,
            raw => Self::Next(DataIndex::new(raw)),
        }
    }
}

impl From<FatEntry> for u16 {
    fn from(entry: FatEntry) -> Self {
        match entry {
            FatEntry::Free => FatEntry::FREE_RAW,
            FatEntry::EndOfChain => FatEntry::EOC_RAW,
            FatEntry::Next(id) => id.into(),
        }
    }
}

/// [`Fat::block_at_offset`]的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    /// 偏移所在的块
    At(DataIndex),
    /// 链表在到达偏移前就结束了。
    /// `tail`为链上最后一块，`missing`为还差的块数。
    PastEnd { tail: DataIndex, missing: usize },
}

#[derive(Debug)]
pub struct Fat {
    entries: Vec<FatEntry>,
    /// FAT区占据的块
    area: Range<BlockId>,
}

impl Fat {
    /// 一个块能容纳多少条目
    const BLOCK_ENTRIES: usize = BLOCK_SIZE / mem::size_of::<u16>();

    /// 全新的FAT：除0号条目外皆未分配
    pub fn new(sb: &SuperBlock) -> Self {
        let mut entries = vec![FatEntry::Free; sb.data_blocks.into()];
        entries[0] = FatEntry::EndOfChain;
        Self {
            entries,
            area: sb.fat_area(),
        }
    }

    pub fn load(dev: &dyn BlockDevice, sb: &SuperBlock) -> core::result::Result<Self, DeviceError> {
        let len = usize::from(sb.data_blocks);
        let mut entries = Vec::with_capacity(len);
        let mut buf = [0; BLOCK_SIZE];
        let area = sb.fat_area();

        for bid in area.start.get()..area.end.get() {
            dev.read_block(bid, &mut buf)?;
            entries.extend(
                buf.chunks_exact(2)
                    .map(|raw| FatEntry::from(u16::from_le_bytes([raw[0], raw[1]]))),
            );
        }
        entries.truncate(len);

        Ok(Self { entries, area })
    }

    /// 写回整张表
    pub fn store(&self, dev: &dyn BlockDevice) -> core::result::Result<(), DeviceError> {
        (0..self.area_len()).try_for_each(|nth| self.store_block(dev, nth))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, id: DataIndex) -> Option<FatEntry> {
        self.entries.get(id.index()).copied()
    }

    /// 获取链表上的下一块。
    /// `None`表示`id`为链尾，或条目已损坏。
    pub fn next(&self, id: DataIndex) -> Option<DataIndex> {
        match self.get(id)? {
            FatEntry::Next(next) if next.index() < self.len() && next != DataIndex::RESERVED => {
                Some(next)
            }
            FatEntry::Next(next) => {
                log::warn!("Entry {id} points outside the table: {next}");
                None
            }
            FatEntry::Free | FatEntry::EndOfChain => None,
        }
    }

    /// 自1号条目起寻找未分配的块
    pub fn find_free(&self) -> Result<DataIndex> {
        self.entries
            .iter()
            .skip(1)
            .position(|&entry| entry == FatEntry::Free)
            .map(|i| DataIndex::new((i + 1) as u16))
            .ok_or(Error::NoSpace)
    }

    /// 分配一块作为新链表的链头
    pub fn alloc(&mut self, dev: &dyn BlockDevice) -> Result<DataIndex> {
        let id = self.find_free()?;
        self.set(dev, id, FatEntry::EndOfChain)?;
        log::debug!("alloc data block {id}");
        Ok(id)
    }

    /// 在链尾`tail`后追加一块。
    /// 失败时（包括空间不足）链表保持原样。
    pub fn extend(&mut self, dev: &dyn BlockDevice, tail: DataIndex) -> Result<DataIndex> {
        let id = self.find_free()?;
        self.set(dev, id, FatEntry::EndOfChain)?;
        if let Err(e) = self.set(dev, tail, FatEntry::Next(id)) {
            self.release(dev, id);
            return Err(e);
        }
        log::debug!("extend chain {tail} -> {id}");
        Ok(id)
    }

    /// 归还刚分配、尚未被任何链表或目录项引用的块。
    /// 内存中总是归还成功，写回失败只记录日志。
    pub fn release(&mut self, dev: &dyn BlockDevice, id: DataIndex) {
        if let Some(entry) = self.entries.get_mut(id.index()) {
            *entry = FatEntry::Free;
            self.restore_blocks(dev, &[Self::area_nth(id)]);
        }
    }

    /// 沿链表从`head`走`offset / BLOCK_SIZE`步，求得偏移所在的块
    pub fn block_at_offset(&self, head: DataIndex, offset: usize) -> Position {
        let hops = offset / BLOCK_SIZE;
        let mut current = head;
        for walked in 0..hops {
            match self.next(current) {
                Some(next) => current = next,
                None => {
                    return Position::PastEnd {
                        tail: current,
                        missing: hops - walked,
                    };
                }
            }
        }
        Position::At(current)
    }

    /// 释放整条链表，返回释放的块数。
    /// 写回失败时内存中的链表原样恢复。
    pub fn free_chain(&mut self, dev: &dyn BlockDevice, head: DataIndex) -> Result<usize> {
        let mut freed: Vec<(DataIndex, FatEntry)> = Vec::new();
        let mut touched: Vec<usize> = Vec::new();
        let mut current = Some(head);

        while let Some(id) = current {
            let entry = match self.get(id) {
                Some(entry) if id != DataIndex::RESERVED && entry != FatEntry::Free => entry,
                _ => break,
            };
            current = self.next(id);
            self.entries[id.index()] = FatEntry::Free;
            freed.push((id, entry));

            let nth = Self::area_nth(id);
            if !touched.contains(&nth) {
                touched.push(nth);
            }
        }

        if let Err(e) = touched.iter().try_for_each(|&nth| self.store_block(dev, nth)) {
            for &(id, entry) in &freed {
                self.entries[id.index()] = entry;
            }
            self.restore_blocks(dev, &touched);
            return Err(e.into());
        }
        log::debug!("free chain from {head}: {} blocks", freed.len());

        Ok(freed.len())
    }

    /// 遍历以`head`为首的链表
    pub fn chain(&self, head: DataIndex) -> Chain<'_> {
        Chain {
            fat: self,
            current: Some(head),
            remaining: self.len(),
        }
    }

    pub fn free_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|&&entry| entry == FatEntry::Free)
            .count()
    }
}

impl Fat {
    fn area_len(&self) -> usize {
        self.area.end.get() - self.area.start.get()
    }

    /// 条目所在的FAT块是FAT区的第几块
    fn area_nth(id: DataIndex) -> usize {
        id.index() / Self::BLOCK_ENTRIES
    }

    /// 修改条目并立即写回其所在的块，写回失败则撤销修改
    fn set(&mut self, dev: &dyn BlockDevice, id: DataIndex, entry: FatEntry) -> Result<()> {
        let slot = self.entries.get_mut(id.index()).ok_or(Error::InvalidArgument)?;
        let old = mem::replace(slot, entry);
        if let Err(e) = self.store_block(dev, Self::area_nth(id)) {
            self.entries[id.index()] = old;
            return Err(e.into());
        }
        Ok(())
    }

    /// 撤销修改后尽力让磁盘与内存重新一致
    fn restore_blocks(&self, dev: &dyn BlockDevice, blocks: &[usize]) {
        for &nth in blocks {
            if let Err(e) = self.store_block(dev, nth) {
                log::error!("FAT block {nth} may be stale on disk: {e}");
            }
        }
    }

    fn store_block(
        &self,
        dev: &dyn BlockDevice,
        nth: usize,
    ) -> core::result::Result<(), DeviceError> {
        let mut buf = [0; BLOCK_SIZE];
        let start = (nth * Self::BLOCK_ENTRIES).min(self.len());
        let end = (start + Self::BLOCK_ENTRIES).min(self.len());
        for (raw, &entry) in buf.chunks_exact_mut(2).zip(&self.entries[start..end]) {
            raw.copy_from_slice(&u16::from(entry).to_le_bytes());
        }
        dev.write_block((self.area.start + nth).get(), &buf)
    }
}

/// 链表上各块的迭代器
///
/// 最多走表长步，损坏的表即使成环也不会陷入死循环。
#[derive(Debug)]
pub struct Chain<'a> {
    fat: &'a Fat,
    current: Option<DataIndex>,
    remaining: usize,
}

impl Iterator for Chain<'_> {
    type Item = DataIndex;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.current.take()?;
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        self.current = self.fat.next(current);
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec::Vec;

    use block_dev::MemDisk;

    use super::*;

    fn setup(data_blocks: u16) -> (MemDisk, SuperBlock, Fat) {
        let sb = SuperBlock::new(data_blocks).unwrap();
        let disk = MemDisk::new(sb.total_blocks.into());
        let fat = Fat::new(&sb);
        (disk, sb, fat)
    }

    #[test]
    fn entry_encoding() {
        assert_eq!(FatEntry::Free, FatEntry::from(0));
        assert_eq!(FatEntry::EndOfChain, FatEntry::from(0xFFFF));
        assert_eq!(FatEntry::Next(DataIndex::new(7)), FatEntry::from(7));
        assert_eq!(0xFFFF, u16::from(FatEntry::EndOfChain));
        assert_eq!(7, u16::from(FatEntry::Next(DataIndex::new(7))));
    }

    #[test]
    fn alloc_and_extend() {
        let (disk, _, mut fat) = setup(4);

        let head = fat.alloc(&disk).unwrap();
        assert_eq!(DataIndex::new(1), head);
        let second = fat.extend(&disk, head).unwrap();
        let third = fat.extend(&disk, second).unwrap();
        assert_eq!(Err(Error::NoSpace), fat.extend(&disk, third));

        assert_eq!(Some(FatEntry::EndOfChain), fat.get(DataIndex::RESERVED));
        assert_eq!(Some(FatEntry::EndOfChain), fat.get(third));
        assert_eq!(vec![head, second, third], fat.chain(head).collect::<Vec<_>>());
        assert_eq!(0, fat.free_count());
    }

    #[test]
    fn block_at_offset() {
        let (disk, _, mut fat) = setup(8);
        let head = fat.alloc(&disk).unwrap();
        let second = fat.extend(&disk, head).unwrap();

        assert_eq!(Position::At(head), fat.block_at_offset(head, 0));
        assert_eq!(Position::At(head), fat.block_at_offset(head, BLOCK_SIZE - 1));
        assert_eq!(Position::At(second), fat.block_at_offset(head, BLOCK_SIZE));
        assert_eq!(
            Position::PastEnd {
                tail: second,
                missing: 1
            },
            fat.block_at_offset(head, 2 * BLOCK_SIZE)
        );
        assert_eq!(
            Position::PastEnd {
                tail: second,
                missing: 3
            },
            fat.block_at_offset(head, 4 * BLOCK_SIZE + 5)
        );
    }

    #[test]
    fn free_chain() {
        let (disk, _, mut fat) = setup(8);
        let a = fat.alloc(&disk).unwrap();
        let b = fat.alloc(&disk).unwrap();
        fat.extend(&disk, a).unwrap();
        fat.extend(&disk, b).unwrap();
        assert_eq!(3, fat.free_count());

        assert_eq!(2, fat.free_chain(&disk, a).unwrap());
        assert_eq!(5, fat.free_count());
        assert_eq!(2, fat.chain(b).count());
        // 释放出来的块被优先复用
        assert_eq!(a, fat.find_free().unwrap());
    }

    #[test]
    fn persistence() {
        // 3000个条目横跨两个FAT块
        let (disk, sb, mut fat) = setup(3000);
        let head = fat.alloc(&disk).unwrap();
        let mut tail = head;
        for _ in 0..2500 {
            tail = fat.extend(&disk, tail).unwrap();
        }

        let loaded = Fat::load(&disk, &sb).unwrap();
        assert_eq!(3000, loaded.len());
        assert_eq!(2501, loaded.chain(head).count());
        assert_eq!(Some(FatEntry::EndOfChain), loaded.get(tail));
        assert_eq!(fat.free_count(), loaded.free_count());
    }

    #[test]
    fn cyclic_chain_terminates() {
        let (disk, _, mut fat) = setup(4);
        let a = fat.alloc(&disk).unwrap();
        let b = fat.extend(&disk, a).unwrap();
        fat.set(&disk, b, FatEntry::Next(a)).unwrap();

        assert_eq!(4, fat.chain(a).count());
        assert_eq!(2, fat.free_chain(&disk, a).unwrap());
    }
}
