//! On-disk records. All three are fixed size; bincode writes them as
//! little-endian fixed-width fields with no padding and no length prefixes,
//! which is the native `repr(C)` image on little-endian hosts.
//!
//! Disk layout (1 KiB blocks, 512 KiB device):
//! [ super(1) | inode map(1) | data map(1) | inodes(99) | data(410) ]

use super::*;
use inode::FileKind;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_big_array::BigArray;

#[repr(C)]
#[derive(Serialize, Deserialize, Default, Debug, Clone, PartialEq)]
pub struct SuperBlockD {
    /// Must be MAGIC
    pub magic_num: u32,
    /// Bytes held by allocated inodes and data blocks
    pub sz_usage: i32,
    /// Number of usable inodes
    pub max_ino: i32,
    pub map_inode_blks: i32,
    pub map_inode_offset: i32,
    pub map_data_blks: i32,
    pub map_data_offset: i32,
    pub inode_offset: i32,
    pub data_offset: i32,
}

impl SuperBlockD {
    pub const SIZE: usize = 4 + 8 * 4;
}

/// inode on disk, one per inode-table block
#[repr(C)]
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct InodeD {
    pub ino: i32,
    /// Size of file (bytes)
    pub size: i32,
    /// Link target, NUL padded (symlinks only)
    #[serde(with = "BigArray")]
    pub target_path: [u8; MAX_FILE_NAME],
    pub dir_cnt: i32,
    pub ftype: FileKind,
    /// Data block numbers, relative to the data region
    pub block_pointer: [i32; DATA_PER_FILE],
}

impl InodeD {
    pub const SIZE: usize = 4 + 4 + MAX_FILE_NAME + 4 + 4 + 4 * DATA_PER_FILE;
}

/// directory entry on disk, packed into the parent's data blocks
#[repr(C)]
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DentryD {
    #[serde(with = "BigArray")]
    pub fname: [u8; MAX_FILE_NAME],
    pub ftype: FileKind,
    pub ino: i32,
    pub valid: i32,
}

impl DentryD {
    pub const SIZE: usize = MAX_FILE_NAME + 4 + 4 + 4;
}

/// Copy `name` into a NUL-padded fixed buffer.
pub fn to_fixed(name: &str) -> Result<[u8; MAX_FILE_NAME]> {
    let bytes = name.as_bytes();
    if bytes.len() > MAX_FILE_NAME {
        return Err(FsError::NameTooLong);
    }
    let mut buf = [0u8; MAX_FILE_NAME];
    buf[..bytes.len()].copy_from_slice(bytes);
    Ok(buf)
}

/// Read a NUL-padded fixed buffer back; a full buffer carries no terminator.
/// `None` if the bytes are not UTF-8.
pub fn from_fixed(buf: &[u8; MAX_FILE_NAME]) -> Option<String> {
    let len = buf.iter().position(|b| *b == 0).unwrap_or(MAX_FILE_NAME);
    std::str::from_utf8(&buf[..len]).ok().map(str::to_owned)
}

pub fn encode<T: Serialize>(record: &T) -> Result<Vec<u8>> {
    Ok(bincode::serialize(record)?)
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    Ok(bincode::deserialize(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_sizes_match_native_layout() {
        let sb = SuperBlockD::default();
        assert_eq!(encode(&sb).unwrap().len(), SuperBlockD::SIZE);
        assert_eq!(SuperBlockD::SIZE, 36);

        let inode = InodeD {
            ino: 3,
            size: 0,
            target_path: [0; MAX_FILE_NAME],
            dir_cnt: 0,
            ftype: FileKind::File,
            block_pointer: [0; DATA_PER_FILE],
        };
        assert_eq!(encode(&inode).unwrap().len(), InodeD::SIZE);
        assert_eq!(InodeD::SIZE, 160);

        let dentry = DentryD {
            fname: to_fixed("readme").unwrap(),
            ftype: FileKind::Directory,
            ino: 9,
            valid: 1,
        };
        assert_eq!(encode(&dentry).unwrap().len(), DentryD::SIZE);
        assert_eq!(DentryD::SIZE, 140);
    }

    #[test]
    fn dentry_fields_land_at_native_offsets() {
        let dentry = DentryD {
            fname: to_fixed("ab").unwrap(),
            ftype: FileKind::Symlink,
            ino: 0x0102_0304,
            valid: 1,
        };
        let bytes = encode(&dentry).unwrap();
        assert_eq!(&bytes[..3], b"ab\0");
        assert_eq!(&bytes[128..132], &2u32.to_le_bytes());
        assert_eq!(&bytes[132..136], &0x0102_0304i32.to_le_bytes());
        assert_eq!(&bytes[136..140], &1i32.to_le_bytes());
    }

    #[test]
    fn zeroed_super_block_has_no_magic() {
        let sb: SuperBlockD = decode(&[0u8; SuperBlockD::SIZE]).unwrap();
        assert_ne!(sb.magic_num, MAGIC);
    }

    #[test]
    fn unknown_file_type_is_rejected() {
        let mut bytes = encode(&DentryD {
            fname: to_fixed("x").unwrap(),
            ftype: FileKind::File,
            ino: 1,
            valid: 1,
        })
        .unwrap();
        bytes[128] = 9;
        assert!(matches!(decode::<DentryD>(&bytes), Err(FsError::Codec(_))));
    }

    #[test]
    fn full_length_name_survives() {
        let name = "n".repeat(MAX_FILE_NAME);
        assert_eq!(from_fixed(&to_fixed(&name).unwrap()).unwrap(), name);
    }

    #[test]
    fn over_long_name_is_refused() {
        let name = "n".repeat(MAX_FILE_NAME + 1);
        assert!(matches!(to_fixed(&name), Err(FsError::NameTooLong)));
        // multi-byte characters count in bytes
        let name = "\u{e9}".repeat(MAX_FILE_NAME / 2 + 1);
        assert!(matches!(to_fixed(&name), Err(FsError::NameTooLong)));
    }

    #[test]
    fn non_utf8_name_does_not_decode() {
        assert_eq!(from_fixed(&[0xFF; MAX_FILE_NAME]), None);
        let mut buf = [0u8; MAX_FILE_NAME];
        buf[..3].copy_from_slice(&[b'a', 0xC3, b'b']);
        assert_eq!(from_fixed(&buf), None);
    }
}
