use core::ops::Range;

use block_dev::Block;

use crate::{BlockId, DataIndex, MountError, BLOCK_SIZE, SIGNATURE};

/// 超级块：
/// - 提供文件系统合法性校验；
/// - 定位其它连续区域
///
/// 磁盘上的排布：签名(8) | 总块数(2) | 根目录块号(2) | 数据区起始块号(2) | 数据块数(2) | FAT块数(1)，
/// 其余填0。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuperBlock {
    /// 卷占据的块数
    pub total_blocks: u16,
    pub root_index: u16,
    pub data_start: u16,
    pub data_blocks: u16,
    pub fat_blocks: u8,
}

impl SuperBlock {
    /// 按数据块数推算整个卷的布局。
    /// 若总块数或FAT块数溢出字段宽度，则返回空。
    pub fn new(data_blocks: u16) -> Option<Self> {
        if data_blocks == 0 {
            return None;
        }
        let fat_blocks = u8::try_from(fat_blocks_for(data_blocks)).ok()?;
        let root_index = u16::from(fat_blocks) + 1;
        let data_start = root_index + 1;
        let total_blocks = data_start.checked_add(data_blocks)?;

        Some(Self {
            total_blocks,
            root_index,
            data_start,
            data_blocks,
            fat_blocks,
        })
    }

    /// 寻找恰好铺满`block_count`个块的布局
    pub fn for_device(block_count: usize) -> Option<Self> {
        (1..=u8::MAX as usize)
            .map_while(|fat_blocks| block_count.checked_sub(2 + fat_blocks))
            .filter_map(|data_blocks| u16::try_from(data_blocks).ok())
            .filter_map(Self::new)
            .find(|sb| sb.total_blocks as usize == block_count)
    }

    pub fn decode(block: &Block) -> Result<Self, MountError> {
        if block[..8] != SIGNATURE {
            return Err(MountError::Signature);
        }
        let u16_at = |pos: usize| u16::from_le_bytes([block[pos], block[pos + 1]]);

        Ok(Self {
            total_blocks: u16_at(8),
            root_index: u16_at(10),
            data_start: u16_at(12),
            data_blocks: u16_at(14),
            fat_blocks: block[16],
        })
    }

    pub fn encode(&self, block: &mut Block) {
        block.fill(0);
        block[..8].copy_from_slice(&SIGNATURE);
        block[8..10].copy_from_slice(&self.total_blocks.to_le_bytes());
        block[10..12].copy_from_slice(&self.root_index.to_le_bytes());
        block[12..14].copy_from_slice(&self.data_start.to_le_bytes());
        block[14..16].copy_from_slice(&self.data_blocks.to_le_bytes());
        block[16] = self.fat_blocks;
    }

    /// 校验布局自洽，且与设备大小一致
    pub fn validate(&self, device_blocks: usize) -> Result<(), MountError> {
        let fat_blocks = usize::from(self.fat_blocks);
        let data_blocks = usize::from(self.data_blocks);

        if 1 + fat_blocks + 1 + data_blocks != usize::from(self.total_blocks) {
            return Err(MountError::Geometry);
        }
        if device_blocks != usize::from(self.total_blocks) {
            return Err(MountError::BlockCount {
                device: device_blocks,
                recorded: self.total_blocks.into(),
            });
        }
        if data_blocks == 0
            || fat_blocks != fat_blocks_for(self.data_blocks)
            || usize::from(self.root_index) != fat_blocks + 1
            || self.data_start != self.root_index + 1
        {
            return Err(MountError::Geometry);
        }

        Ok(())
    }

    pub const SUPER_BLOCK: BlockId = BlockId::new(0);

    /// FAT区占据的块
    pub fn fat_area(&self) -> Range<BlockId> {
        let start = BlockId::new(Self::SUPER_BLOCK.get() + 1);
        start..start + usize::from(self.fat_blocks)
    }

    pub fn root_dir(&self) -> BlockId {
        BlockId::new(self.root_index.into())
    }

    /// 数据块索引对应的物理块
    pub fn data_block(&self, id: DataIndex) -> BlockId {
        BlockId::new(usize::from(self.data_start) + id.index())
    }
}

/// 容纳`data_blocks`个16位条目所需的块数
fn fat_blocks_for(data_blocks: u16) -> usize {
    (usize::from(data_blocks) * 2).div_ceil(BLOCK_SIZE)
}
