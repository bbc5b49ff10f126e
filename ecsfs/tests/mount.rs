mod common;

use std::sync::Arc;

use block_dev::{BlockDevice, MemDisk, BLOCK_SIZE};
use ecsfs::volume::{FatEntry, SuperBlock};
use ecsfs::{DataIndex, Error, MountError, Volume, MAX_FILES};

#[test]
fn format_then_mount() {
    let (disk, volume) = common::format(100);
    let (_, volume) = common::remount(&disk, volume);

    let info = volume.info();
    assert_eq!(103, info.total_blocks);
    assert_eq!(99, info.fat_free);
    assert_eq!(MAX_FILES, info.dir_free);
    assert_eq!(0, volume.list().count());
}

#[test]
fn block_count_mismatch() {
    let (disk, volume) = common::format(2);
    volume.unmount().unwrap();

    let mut blocks = disk.snapshot();
    blocks.push(Box::new([0; BLOCK_SIZE]));
    let bigger = Arc::new(MemDisk::from_blocks(blocks));

    let err = Volume::mount(bigger.clone()).unwrap_err();
    assert_eq!(
        Error::Mount(MountError::BlockCount {
            device: 6,
            recorded: 5
        }),
        err
    );
    // 被拒的设备已经关闭
    assert!(bigger.is_closed());
}

#[test]
fn bad_signature() {
    let disk = Arc::new(MemDisk::new(5));
    assert_eq!(
        Err(Error::Mount(MountError::Signature)),
        Volume::mount(disk).map(|_| ())
    );
}

#[test]
fn bad_geometry() {
    let (disk, volume) = common::format(2);
    volume.unmount().unwrap();
    let disk = MemDisk::from_blocks(disk.snapshot());

    let mut sb = SuperBlock::new(2).unwrap();
    sb.data_start = 4;
    let mut block = [0; BLOCK_SIZE];
    sb.encode(&mut block);
    disk.write_block(0, &block).unwrap();

    assert_eq!(
        Err(Error::Mount(MountError::Geometry)),
        Volume::mount(Arc::new(disk)).map(|_| ())
    );
}

#[test]
fn corrupted_fat_head() {
    let (disk, volume) = common::format(2);
    volume.unmount().unwrap();
    let disk = MemDisk::from_blocks(disk.snapshot());
    disk.write_block(1, &[0; BLOCK_SIZE]).unwrap();

    assert_eq!(
        Err(Error::Mount(MountError::FatHead)),
        Volume::mount(Arc::new(disk)).map(|_| ())
    );
}

#[test]
fn unmount_fails_on_closed_device() {
    let (disk, volume) = common::format(2);
    disk.close().unwrap();
    assert!(matches!(volume.unmount(), Err(Error::Device(_))));
}

#[test]
fn format_rejects_unfit_device() {
    let disk = Arc::new(MemDisk::new(3));
    assert_eq!(
        Err(Error::InvalidArgument),
        Volume::format(disk).map(|_| ())
    );
}

#[test]
fn metadata_survives_remount() {
    let (disk, mut volume) = common::format(16);
    volume.create("a.txt").unwrap();
    volume.create("b.txt").unwrap();
    let fd = volume.open("b.txt").unwrap();
    assert_eq!(10, volume.write(fd, b"0123456789").unwrap());

    let (_, volume) = common::remount(&disk, volume);
    let files: Vec<_> = volume
        .list()
        .map(|file| (file.name, file.size, file.first_block))
        .collect();
    assert_eq!(
        vec![
            ("a.txt".to_owned(), 0, None),
            ("b.txt".to_owned(), 10, Some(DataIndex::new(1))),
        ],
        files
    );
    assert_eq!(
        Some(FatEntry::EndOfChain),
        volume.fat().get(DataIndex::new(1))
    );
    // 重新挂载后没有打开的描述符
    assert!(volume.open_file(fd).is_err());
}

#[test]
fn shared_volume() {
    let (_, volume) = common::format(4);
    let shared = volume.shared();
    shared.lock().create("a").unwrap();
    assert_eq!(Ok(0), shared.lock().stat_name("a"));
}
