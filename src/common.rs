use super::*;
use disk::DentryD;

/// Must be written at `SUPER_OFS` for the device to count as formatted.
pub const MAGIC: u32 = 0x52415453;

/// byte offset of the super block
pub const SUPER_OFS: usize = 0;

/// root i-number
pub const ROOT_INO: u32 = 0;

/// bytes of a name or a symlink target, on disk and in memory
pub const MAX_FILE_NAME: usize = 128;

/// inode-table blocks per file
pub const INODE_PER_FILE: usize = 1;

/// data blocks preallocated for every file, fixed for its lifetime
pub const DATA_PER_FILE: usize = 4;

pub const DEFAULT_PERM: u16 = 0o777;

/// fallback atomic I/O unit of a file-backed device
pub const DEFAULT_IO_SZ: usize = 512;

/// leaf inodes kept resident before clean ones get evicted
pub const DEFAULT_CACHE_CAPACITY: usize = 1024;

pub const UINT32_BITS: usize = 32;
pub const UINT8_BITS: usize = 8;

/// Round `value` down to a multiple of `round`; multiples stay as they are.
pub fn round_down(value: usize, round: usize) -> usize {
    if value % round == 0 {
        value
    } else {
        (value / round) * round
    }
}

/// Round `value` up to a multiple of `round`; multiples stay as they are.
pub fn round_up(value: usize, round: usize) -> usize {
    if value % round == 0 {
        value
    } else {
        (value / round + 1) * round
    }
}

/// dentry records that fit in one block without straddling it
pub fn dentries_per_block(sz_blk: usize) -> usize {
    sz_blk / DentryD::SIZE
}

/// Knobs a session is mounted with.
#[derive(Debug, Clone)]
pub struct MountOptions {
    /// soft bound on resident regular-file and symlink inodes
    pub cache_capacity: usize,
}

impl Default for MountOptions {
    fn default() -> Self {
        MountOptions {
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}
