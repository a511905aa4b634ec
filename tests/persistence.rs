use std::sync::Arc;

use myfs_fuse::{BlockDevice, FileDisk, FileKind, FsError, MemDisk, MountOptions, MountState, MyFs, MAGIC};

fn init_log() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn mount_with(disk: &MemDisk, cache_capacity: usize) -> MyFs {
    let options = MountOptions { cache_capacity };
    MyFs::mount(Arc::new(disk.clone()), &options).unwrap()
}

#[test]
fn tree_round_trips_through_remount() {
    init_log();
    let disk = MemDisk::new(512 * 1024, 512);
    let mut fs = mount_with(&disk, 16);
    fs.mkdir("/a").unwrap();
    fs.mknod("/a/b").unwrap();
    let payload: Vec<u8> = (0..2500u32).map(|i| (i * 7 % 256) as u8).collect();
    fs.write("/a/b", 0, &payload).unwrap();
    fs.symlink("/a/link", "/a/b").unwrap();
    fs.sync().unwrap();
    let usage = fs.usage();
    fs.unmount().unwrap();

    let mut fs = mount_with(&disk, 16);
    let attr = fs.getattr("/a/b").unwrap();
    assert_eq!(attr.kind, FileKind::File);
    assert_eq!(attr.size, payload.len() as u64);
    let found = fs.lookup("/a/b").unwrap();
    assert_eq!(fs.entry(found.dentry).unwrap().name, "b");
    assert_eq!(fs.read("/a/b", 0, 4096).unwrap(), payload);
    assert_eq!(fs.readlink("/a/link").unwrap(), "/a/b");
    assert_eq!(fs.usage(), usage);
}

#[test]
fn usage_is_persisted_in_the_super_block() {
    init_log();
    let disk = MemDisk::new(512 * 1024, 512);
    let mut fs = mount_with(&disk, 16);
    fs.mknod("/x").unwrap();
    fs.mknod("/y").unwrap();
    fs.unlink("/x").unwrap();
    fs.unmount().unwrap();

    let image = disk.snapshot();
    assert_eq!(u32::from_le_bytes(image[0..4].try_into().unwrap()), MAGIC);
    let sz_usage = i32::from_le_bytes(image[4..8].try_into().unwrap());
    assert_eq!(sz_usage, 2 * 5 * 1024);
    assert_eq!(getattr_root_size(&disk), 2 * 5 * 1024);
}

fn getattr_root_size(disk: &MemDisk) -> u64 {
    let mut fs = mount_with(disk, 16);
    fs.getattr("/").unwrap().size
}

#[test]
fn evicted_files_are_read_back() {
    init_log();
    let disk = MemDisk::new(512 * 1024, 512);
    let mut fs = mount_with(&disk, 1);
    for i in 0..5 {
        let path = format!("/f{i}");
        fs.mknod(&path).unwrap();
        fs.write(&path, 0, path.as_bytes()).unwrap();
    }
    // clean leaves become evictable once synced
    fs.sync().unwrap();
    for i in 0..5 {
        let path = format!("/f{i}");
        assert_eq!(fs.read(&path, 0, 16).unwrap(), path.as_bytes());
    }
    fs.write("/f0", 0, b"F").unwrap();
    fs.mknod("/g").unwrap();
    fs.unmount().unwrap();

    let mut fs = mount_with(&disk, 1);
    assert_eq!(fs.read("/f0", 0, 16).unwrap(), b"Ff0");
    assert_eq!(fs.readdir("/").unwrap().len(), 6);
}

#[test]
fn corrupt_super_block_is_rejected() {
    init_log();
    let disk = MemDisk::new(512 * 1024, 512);
    mount_with(&disk, 16).unmount().unwrap();

    let mut image = disk.snapshot();
    image[8..12].copy_from_slice(&5000i32.to_le_bytes());
    let tampered = MemDisk::new(image.len(), 512);
    for (i, chunk) in image.chunks(512).enumerate() {
        tampered.write_block(i, chunk).unwrap();
    }
    let res = MyFs::mount(Arc::new(tampered), &MountOptions::default());
    assert!(matches!(res, Err(FsError::Corruption { .. })));
}

#[test]
fn file_backed_image_survives_reopen() {
    init_log();
    let dir = tempfile::tempdir().unwrap();
    let image = dir.path().join("disk.img");
    {
        let disk = FileDisk::create(&image, 512 * 1024, 512).unwrap();
        let mut fs = MyFs::mount(Arc::new(disk), &MountOptions::default()).unwrap();
        fs.mkdir("/docs").unwrap();
        fs.mknod("/docs/readme").unwrap();
        fs.write("/docs/readme", 0, b"hello").unwrap();
        fs.unmount().unwrap();
        assert_eq!(fs.state(), MountState::Unmounted);
    }
    let mut fs = MyFs::open(&image, 512, &MountOptions::default()).unwrap();
    assert_eq!(fs.read("/docs/readme", 0, 5).unwrap(), b"hello");
    fs.unmount().unwrap();
}

#[test]
fn zero_io_unit_is_refused_without_panicking() {
    init_log();
    let res = MyFs::mount(Arc::new(MemDisk::new(4096, 0)), &MountOptions::default());
    assert!(matches!(res, Err(FsError::InvalidArgument(_))));

    let dir = tempfile::tempdir().unwrap();
    let image = dir.path().join("disk.img");
    FileDisk::create(&image, 512 * 1024, 512).unwrap();
    let res = MyFs::open(&image, 0, &MountOptions::default());
    assert!(matches!(res, Err(FsError::Io(_))));
}

/// Overwrite `bytes` at byte `offset` of `disk`, one io unit at a time.
fn patch(disk: &MemDisk, offset: usize, bytes: &[u8]) {
    let io = disk.io_unit();
    let mut unit = vec![0u8; io];
    let mut done = 0;
    while done < bytes.len() {
        let pos = offset + done;
        disk.read_block(pos / io, &mut unit).unwrap();
        let start = pos % io;
        let n = (io - start).min(bytes.len() - done);
        unit[start..start + n].copy_from_slice(&bytes[done..done + n]);
        disk.write_block(pos / io, &unit).unwrap();
        done += n;
    }
}

#[test]
fn non_utf8_entry_name_is_corruption() {
    init_log();
    let disk = MemDisk::new(512 * 1024, 512);
    let mut fs = mount_with(&disk, 16);
    fs.mkdir("/d").unwrap();
    fs.mknod("/d/abc").unwrap();
    fs.mknod("/ok").unwrap();
    fs.write("/ok", 0, b"fine").unwrap();
    let (_, blocks) = fs.block_map("/d").unwrap();
    let first_entry = fs.layout().data_ofs(blocks[0]);
    fs.unmount().unwrap();

    patch(&disk, first_entry, &[0xFF; 128]);

    let mut fs = mount_with(&disk, 16);
    assert!(matches!(fs.readdir("/d"), Err(FsError::Corruption { .. })));
    assert!(matches!(fs.lookup("/d/abc"), Err(FsError::Corruption { .. })));
    assert_eq!(fs.read("/ok", 0, 16).unwrap(), b"fine");
    assert_eq!(fs.readdir("/").unwrap().len(), 2);
    fs.sync().unwrap();
    fs.unmount().unwrap();
}

#[test]
fn non_utf8_root_entry_fails_the_mount() {
    init_log();
    let disk = MemDisk::new(512 * 1024, 512);
    let mut fs = mount_with(&disk, 16);
    fs.mknod("/x").unwrap();
    let (_, blocks) = fs.block_map("/").unwrap();
    let first_entry = fs.layout().data_ofs(blocks[0]);
    fs.unmount().unwrap();

    // a valid lead byte followed by a bad continuation byte
    patch(&disk, first_entry, &[b'x', 0xC3, b'(']);
    let res = MyFs::mount(Arc::new(disk.clone()), &MountOptions::default());
    assert!(matches!(res, Err(FsError::Corruption { .. })));
}

#[test]
fn bad_inode_payload_is_corruption() {
    init_log();
    let disk = MemDisk::new(512 * 1024, 512);
    let mut fs = mount_with(&disk, 16);
    fs.symlink("/link", "/target").unwrap();
    fs.mknod("/file").unwrap();
    fs.write("/file", 0, b"abc").unwrap();
    let (link_ino, _) = fs.block_map("/link").unwrap();
    let (file_ino, _) = fs.block_map("/file").unwrap();
    let link_ofs = fs.layout().ino_ofs(link_ino);
    let file_ofs = fs.layout().ino_ofs(file_ino);
    fs.unmount().unwrap();

    // InodeD is ino: i32, size: i32, target_path: [u8; 128], ...
    patch(&disk, link_ofs + 8, &[0xFF; 7]);
    patch(&disk, file_ofs + 4, &(-1i32).to_le_bytes());

    let mut fs = mount_with(&disk, 16);
    assert!(matches!(fs.readlink("/link"), Err(FsError::Corruption { .. })));
    assert!(matches!(fs.read("/file", 0, 3), Err(FsError::Corruption { .. })));
    fs.unmount().unwrap();
}
