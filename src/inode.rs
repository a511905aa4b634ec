use super::*;
use disk::{from_fixed, to_fixed, InodeD};
use vfs::DentryId;

use libc::{getgid, getuid};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Declaration order is the on-disk enum value: 0, 1, 2.
#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileKind {
    File = 0,
    Directory = 1,
    Symlink = 2,
}

impl From<FileKind> for fuser::FileType {
    fn from(kind: FileKind) -> Self {
        match kind {
            FileKind::File => fuser::FileType::RegularFile,
            FileKind::Directory => fuser::FileType::Directory,
            FileKind::Symlink => fuser::FileType::Symlink,
        }
    }
}

/// A named pointer from a parent directory to an inode. The inode itself is
/// reached through the inode cache by `ino`, loading it on first use.
#[derive(Debug, Clone)]
pub struct Dentry {
    pub name: String,
    pub kind: FileKind,
    pub ino: u32,
    /// `None` only for the root
    pub parent: Option<DentryId>,
}

impl Dentry {
    pub fn new(name: &str, kind: FileKind, ino: u32, parent: Option<DentryId>) -> Self {
        Self {
            name: name.to_string(),
            kind,
            ino,
            parent,
        }
    }
}

/// inode in memory
#[derive(Debug, Clone)]
pub struct MInode {
    pub ino: u32,
    /// Size of file (bytes)
    pub size: usize,
    pub kind: FileKind,
    /// symlink target
    pub target_path: String,
    /// dentry that owns this inode
    pub dentry: DentryId,
    /// children, newest first (directories only)
    pub dentrys: Vec<DentryId>,
    /// the whole preallocated data range (regular files only)
    pub data: Vec<u8>,
    pub block_pointer: [u32; DATA_PER_FILE],
    /// changed since it was last read or synced
    pub dirty: bool,
}

impl MInode {
    pub fn new(
        ino: u32,
        kind: FileKind,
        dentry: DentryId,
        block_pointer: [u32; DATA_PER_FILE],
        file_capacity: usize,
    ) -> Self {
        let data = match kind {
            FileKind::File => vec![0u8; file_capacity],
            _ => Vec::new(),
        };
        Self {
            ino,
            size: 0,
            kind,
            target_path: String::new(),
            dentry,
            dentrys: Vec::new(),
            data,
            block_pointer,
            dirty: true,
        }
    }

    pub fn dir_cnt(&self) -> usize {
        self.dentrys.len()
    }

    pub fn is_dir(&self) -> bool {
        self.kind == FileKind::Directory
    }

    /// Head insertion: the newest child leads the list.
    pub fn alloc_dentry(&mut self, child: DentryId) -> usize {
        self.dentrys.insert(0, child);
        self.dirty = true;
        self.dir_cnt()
    }

    /// Detach `child`; `None` if it was not listed here.
    pub fn drop_dentry(&mut self, child: DentryId) -> Option<usize> {
        let pos = self.dentrys.iter().position(|id| *id == child)?;
        self.dentrys.remove(pos);
        self.dirty = true;
        Some(self.dir_cnt())
    }

    pub fn to_disk(&self) -> Result<InodeD> {
        let mut block_pointer = [0i32; DATA_PER_FILE];
        for (dst, src) in block_pointer.iter_mut().zip(self.block_pointer.iter()) {
            *dst = *src as i32;
        }
        Ok(InodeD {
            ino: self.ino as i32,
            size: self.size as i32,
            target_path: to_fixed(&self.target_path)?,
            dir_cnt: self.dir_cnt() as i32,
            ftype: self.kind,
            block_pointer,
        })
    }

    /// Rebuild from a record; children and data are filled in by the caller.
    /// `None` if the symlink target is not UTF-8.
    pub fn from_disk(d_inode: &InodeD, dentry: DentryId) -> Option<Self> {
        let mut block_pointer = [0u32; DATA_PER_FILE];
        for (dst, src) in block_pointer.iter_mut().zip(d_inode.block_pointer.iter()) {
            *dst = *src as u32;
        }
        Some(Self {
            ino: d_inode.ino as u32,
            size: d_inode.size as usize,
            kind: d_inode.ftype,
            target_path: from_fixed(&d_inode.target_path)?,
            dentry,
            dentrys: Vec::new(),
            data: Vec::new(),
            block_pointer,
            dirty: false,
        })
    }
}

/// What `getattr` reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attr {
    pub ino: u32,
    pub kind: FileKind,
    pub size: u64,
    pub dir_cnt: usize,
    pub nlink: u32,
    pub blocks: u64,
    pub blksize: u32,
}

impl From<&Attr> for fuser::FileAttr {
    fn from(value: &Attr) -> Self {
        let uid = unsafe { getuid() };
        let gid = unsafe { getgid() };
        let now = SystemTime::now();
        fuser::FileAttr {
            // the kernel reserves 0, FUSE_ROOT_ID is 1
            ino: value.ino as u64 + 1,
            size: value.size,
            blocks: value.blocks,
            atime: now,
            mtime: now,
            ctime: now,
            crtime: UNIX_EPOCH,
            kind: value.kind.into(),
            perm: DEFAULT_PERM,
            nlink: value.nlink,
            uid,
            gid,
            rdev: 0,
            blksize: value.blksize,
            flags: 0,
        }
    }
}
