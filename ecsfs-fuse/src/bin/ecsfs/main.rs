mod cli;

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use block_dev::BLOCK_SIZE;
use clap::Parser;
use cli::{Cli, Command};
use ecsfs::{Volume, VolumeInfo, MAX_FILES};
use typed_bytesize::ByteSizeIec;

fn main() -> io::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Command::Mkfs { disk, data_blocks } => {
            let data_blocks = match data_blocks {
                Some(n) => n,
                None => (ByteSizeIec::mib(8).0 / BLOCK_SIZE as u64) as u16,
            };
            let volume = ecsfs_fuse::mkfs(&disk, data_blocks)?;
            print_info(&volume.info());
            volume.unmount().map_err(io::Error::other)
        }
        Command::Info { disk } => {
            let volume = mount(&disk)?;
            print_info(&volume.info());
            volume.unmount().map_err(io::Error::other)
        }
        Command::Ls { disk } => {
            let volume = mount(&disk)?;
            println!("FS Ls:");
            for file in volume.list() {
                let data_blk = file.first_block.map_or(0xFFFF, u16::from);
                println!("file: {}, size: {}, data_blk: {data_blk}", file.name, file.size);
            }
            volume.unmount().map_err(io::Error::other)
        }
        Command::Add {
            disk,
            host_file,
            name,
        } => {
            let data = fs::read(&host_file)?;
            let name = name
                .or_else(|| {
                    host_file
                        .file_name()
                        .and_then(|n| n.to_str())
                        .map(str::to_owned)
                })
                .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "no file name"))?;

            let mut volume = mount(&disk)?;
            volume.create(&name).map_err(io::Error::other)?;
            let fd = volume.open(&name).map_err(io::Error::other)?;
            let written = volume.write(fd, &data).map_err(io::Error::other)?;
            if written < data.len() {
                println!("Wrote file '{name}' (only {written}/{} bytes)", data.len());
            } else {
                println!("Wrote file '{name}' ({written} bytes)");
            }
            volume.close(fd).map_err(io::Error::other)?;
            volume.unmount().map_err(io::Error::other)
        }
        Command::Rm { disk, name } => {
            let mut volume = mount(&disk)?;
            volume.delete(&name).map_err(io::Error::other)?;
            println!("Removed file '{name}'");
            volume.unmount().map_err(io::Error::other)
        }
        Command::Cat { disk, name } => {
            let mut volume = mount(&disk)?;
            let fd = volume.open(&name).map_err(io::Error::other)?;
            let size = volume.stat(fd).map_err(io::Error::other)?;
            let data = volume.read(fd, size).map_err(io::Error::other)?;
            log::info!("read {}/{size} bytes of {name:?}", data.len());
            io::stdout().write_all(&data)?;
            volume.close(fd).map_err(io::Error::other)?;
            volume.unmount().map_err(io::Error::other)
        }
        Command::Stat { disk, name } => {
            let volume = mount(&disk)?;
            let size = volume.stat_name(&name).map_err(io::Error::other)?;
            let blocks = volume
                .list()
                .find(|file| file.name == name)
                .and_then(|file| file.first_block)
                .map_or(0, |head| volume.fat().chain(head).count());
            println!("Size of file '{name}' is {size} bytes ({blocks} blocks)");
            volume.unmount().map_err(io::Error::other)
        }
    }
}

fn mount(disk: &Path) -> io::Result<Volume> {
    ecsfs_fuse::mount(disk).map_err(|e| io::Error::other(format!("{}: {e}", disk.display())))
}

fn print_info(info: &VolumeInfo) {
    println!("FS Info:");
    println!("total_blk_count={}", info.total_blocks);
    println!("fat_blk_count={}", info.fat_blocks);
    println!("rdir_blk={}", info.root_index);
    println!("data_blk={}", info.data_start);
    println!("data_blk_count={}", info.data_blocks);
    println!("fat_free_ratio={}/{}", info.fat_free, info.data_blocks);
    println!("rdir_free_ratio={}/{}", info.dir_free, MAX_FILES);
}
