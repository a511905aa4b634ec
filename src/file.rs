//! Byte-level operations on regular files and symlinks. A regular file owns
//! a fixed run of `DATA_PER_FILE` blocks, so its size never exceeds
//! `file_capacity`.

use super::*;
use fs::MyFs;
use inode::FileKind;
use vfs::DentryId;

use log::debug;

/// Capacity figures for `statfs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatFs {
    pub blocks: u64,
    pub bfree: u64,
    pub files: u64,
    pub ffree: u64,
    pub bsize: u32,
    pub namelen: u32,
}

impl MyFs {
    /// Regular file behind `path`, refusing directories and symlinks.
    fn regular(&mut self, path: &str) -> Result<DentryId> {
        let found = self.find(path)?;
        match self.inode(found.dentry)?.kind {
            FileKind::File => Ok(found.dentry),
            FileKind::Directory => Err(FsError::IsDirectory),
            FileKind::Symlink => Err(FsError::InvalidArgument("not a regular file")),
        }
    }

    /// Up to `size` bytes starting at `offset`; short at end of file.
    pub fn read(&mut self, path: &str, offset: usize, size: usize) -> Result<Vec<u8>> {
        let id = self.regular(path)?;
        let inode = self.inode(id)?;
        let start = offset.min(inode.size);
        let end = offset.saturating_add(size).min(inode.size);
        let buf = inode.data[start..end].to_vec();
        self.shrink_cache();
        Ok(buf)
    }

    /// Write `data` at `offset`, growing the file as needed.
    pub fn write(&mut self, path: &str, offset: usize, data: &[u8]) -> Result<usize> {
        let id = self.regular(path)?;
        let capacity = self.layout().file_capacity();
        let end = offset.checked_add(data.len()).ok_or(FsError::NoSpace)?;
        if end > capacity {
            debug!("[write] {path}: {end} bytes exceed {capacity}");
            return Err(FsError::NoSpace);
        }
        let inode = self.inode_mut(id)?;
        inode.data[offset..end].copy_from_slice(data);
        inode.size = inode.size.max(end);
        inode.dirty = true;
        Ok(data.len())
    }

    /// Set the length of the file at `path`; bytes past the new end read as
    /// zero if it grows again.
    pub fn truncate(&mut self, path: &str, size: usize) -> Result<()> {
        let id = self.regular(path)?;
        if size > self.layout().file_capacity() {
            return Err(FsError::NoSpace);
        }
        let inode = self.inode_mut(id)?;
        if size < inode.size {
            let old = inode.size;
            inode.data[size..old].fill(0);
        }
        inode.size = size;
        inode.dirty = true;
        Ok(())
    }

    pub fn symlink(&mut self, path: &str, target: &str) -> Result<DentryId> {
        if target.len() > MAX_FILE_NAME {
            return Err(FsError::NameTooLong);
        }
        let id = self.create(path, FileKind::Symlink)?;
        let inode = self.inode_mut(id)?;
        inode.target_path = target.to_string();
        inode.size = target.len();
        inode.dirty = true;
        Ok(id)
    }

    pub fn readlink(&mut self, path: &str) -> Result<String> {
        let found = self.find(path)?;
        let inode = self.inode(found.dentry)?;
        if inode.kind != FileKind::Symlink {
            return Err(FsError::InvalidArgument("not a symlink"));
        }
        let target = inode.target_path.clone();
        self.shrink_cache();
        Ok(target)
    }

    /// Existence check; permissions are not enforced.
    pub fn access(&mut self, path: &str) -> Result<()> {
        self.find(path).map(|_| ())
    }

    pub fn statfs(&self) -> Result<StatFs> {
        self.ensure_mounted()?;
        let layout = self.layout();
        let (ifree, dfree) = self.map_free();
        Ok(StatFs {
            blocks: layout.max_data() as u64,
            bfree: dfree as u64,
            files: layout.max_ino as u64,
            ffree: ifree as u64,
            bsize: layout.sz_blk as u32,
            namelen: MAX_FILE_NAME as u32,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use block_device::MemDisk;
    use std::sync::Arc;

    fn mounted() -> MyFs {
        let disk = MemDisk::new(512 * 1024, 512);
        MyFs::mount(Arc::new(disk), &MountOptions::default()).unwrap()
    }

    #[test]
    fn write_then_read_back() {
        let mut fs = mounted();
        fs.mknod("/a").unwrap();
        assert_eq!(fs.write("/a", 0, b"hello world").unwrap(), 11);
        assert_eq!(fs.read("/a", 6, 100).unwrap(), b"world");
        assert_eq!(fs.read("/a", 50, 10).unwrap(), b"");
        assert_eq!(fs.getattr("/a").unwrap().size, 11);
    }

    #[test]
    fn write_spanning_blocks() {
        let mut fs = mounted();
        fs.mknod("/big").unwrap();
        let payload: Vec<u8> = (0..3000).map(|i| (i % 251) as u8).collect();
        fs.write("/big", 500, &payload).unwrap();
        assert_eq!(fs.read("/big", 500, 3000).unwrap(), payload);
        assert_eq!(fs.read("/big", 0, 500).unwrap(), vec![0u8; 500]);
    }

    #[test]
    fn write_past_capacity_is_rejected() {
        let mut fs = mounted();
        fs.mknod("/a").unwrap();
        let cap = fs.layout().file_capacity();
        assert!(matches!(fs.write("/a", cap - 1, b"xy"), Err(FsError::NoSpace)));
        assert_eq!(fs.write("/a", cap - 2, b"xy").unwrap(), 2);
        assert!(matches!(fs.truncate("/a", cap + 1), Err(FsError::NoSpace)));
    }

    #[test]
    fn truncate_zeroes_the_tail() {
        let mut fs = mounted();
        fs.mknod("/a").unwrap();
        fs.write("/a", 0, b"abcdef").unwrap();
        fs.truncate("/a", 2).unwrap();
        fs.truncate("/a", 6).unwrap();
        assert_eq!(fs.read("/a", 0, 6).unwrap(), b"ab\0\0\0\0");
    }

    #[test]
    fn directories_are_not_readable() {
        let mut fs = mounted();
        fs.mkdir("/d").unwrap();
        assert!(matches!(fs.read("/d", 0, 1), Err(FsError::IsDirectory)));
        assert!(matches!(fs.write("/missing", 0, b"x"), Err(FsError::NotFound)));
    }

    #[test]
    fn symlink_keeps_target() {
        let mut fs = mounted();
        fs.symlink("/link", "/some/where").unwrap();
        assert_eq!(fs.readlink("/link").unwrap(), "/some/where");
        assert_eq!(fs.getattr("/link").unwrap().kind, FileKind::Symlink);
        assert!(matches!(fs.read("/link", 0, 1), Err(FsError::InvalidArgument(_))));
        let long = "x".repeat(MAX_FILE_NAME + 1);
        assert!(matches!(fs.symlink("/l2", &long), Err(FsError::NameTooLong)));
    }

    #[test]
    fn statfs_tracks_allocation() {
        let mut fs = mounted();
        let before = fs.statfs().unwrap();
        assert_eq!(before.files, 99);
        assert_eq!(before.ffree, 98);
        fs.mknod("/a").unwrap();
        let after = fs.statfs().unwrap();
        assert_eq!(after.ffree, 97);
        assert_eq!(after.bfree, before.bfree - DATA_PER_FILE as u64);
    }
}
