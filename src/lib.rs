mod bitmap;
mod block_device; // devices addressed in io units
mod common;
mod disk; // on-disk records
mod driver;
mod error;
mod file;
mod fs; // mounted session
pub mod fuse;
mod inode;
mod layout;
mod trans;
mod vfs; // dentry arena and inode cache

pub use block_device::{BlockDevice, FileDisk, MemDisk};
pub use common::*;
pub use error::{FsError, Result};
pub use file::StatFs;
pub use fs::{components, get_fname, Lookup, MountState, MyFs};
pub use inode::{Attr, Dentry, FileKind};
pub use layout::Layout;
pub use vfs::DentryId;
