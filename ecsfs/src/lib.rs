//! # ecsfs
//!
//! 单卷、扁平命名空间的FAT式文件系统，完全运行在块设备抽象之上。
//!
//! 自上而下分为：
//!
//! 1. 卷控制层：挂载/卸载、文件的增删查、描述符操作
//! 2. 读写引擎：经由暂存块在簇链上逐块搬运数据
//! 3. 打开文件表：描述符与其读写偏移
//! 4. 磁盘布局层：超级块、FAT、根目录
//! 5. 块设备接口层（`block-dev`）

#![no_std]

extern crate alloc;

mod block;
mod config;
mod control;
mod error;
mod file_table;
mod transfer;
pub mod volume;

pub use self::{
    block::{BlockId, DataIndex},
    config::*,
    control::{FileInfo, Volume, VolumeInfo},
    error::{Error, MountError, Result},
    file_table::OpenFile,
};
