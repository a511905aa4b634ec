//! Region boundaries of a formatted device.
//!
//! | Super(1) | Inode Map | Data Map | Inodes(max_ino) | Data(*) |
//!
//! Block size is twice the device I/O unit, every inode owns one inode-table
//! block, and a formatted layout is never recomputed while the magic holds.

use super::*;
use disk::SuperBlockD;

use log::debug;

fn fit_i32(v: usize) -> Result<i32> {
    i32::try_from(v).map_err(|_| FsError::InvalidArgument("device too large"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub sz_io: usize,
    pub sz_disk: usize,
    pub sz_blk: usize,
    pub max_ino: usize,
    pub map_inode_blks: usize,
    pub map_inode_offset: usize,
    pub map_data_blks: usize,
    pub map_data_offset: usize,
    pub inode_offset: usize,
    pub data_offset: usize,
}

impl Layout {
    /// Compute a fresh layout from the device geometry.
    pub fn plan(sz_disk: usize, sz_io: usize) -> Result<Self> {
        if sz_io == 0 {
            return Err(FsError::InvalidArgument("zero I/O unit"));
        }
        let sz_blk = 2 * sz_io;
        let super_blks = round_up(SuperBlockD::SIZE, sz_blk) / sz_blk;
        let inode_num = sz_disk / ((DATA_PER_FILE + INODE_PER_FILE) * sz_blk);
        let map_inode_blks = Self::map_blks(inode_num, sz_io, sz_blk);
        let map_data_blks = Self::map_blks(sz_disk / sz_blk, sz_io, sz_blk);

        let meta_blks = super_blks + map_inode_blks + map_data_blks;
        if inode_num <= meta_blks {
            return Err(FsError::InvalidArgument("device too small to format"));
        }
        // reserving the metadata blocks out of the inode count keeps every
        // inode's preallocated blocks inside the data region
        let max_ino = inode_num - meta_blks;

        let map_inode_offset = SUPER_OFS + super_blks * sz_blk;
        let map_data_offset = map_inode_offset + map_inode_blks * sz_blk;
        let inode_offset = map_data_offset + map_data_blks * sz_blk;
        let data_offset = inode_offset + max_ino * sz_blk;

        let layout = Layout {
            sz_io,
            sz_disk,
            sz_blk,
            max_ino,
            map_inode_blks,
            map_inode_offset,
            map_data_blks,
            map_data_offset,
            inode_offset,
            data_offset,
        };
        // super block fields are i32: every offset and the usage of a full
        // device must fit
        let worst_usage = layout.blks_sz(layout.max_ino + layout.max_data());
        layout.to_super(worst_usage)?;
        debug!("planned fresh layout: {layout:?} (super_blks: {super_blks}, inode_num: {inode_num})");
        Ok(layout)
    }

    /// bitmap region for `bits` slots: whole u32 words, then whole I/O units,
    /// then whole blocks
    fn map_blks(bits: usize, sz_io: usize, sz_blk: usize) -> usize {
        let bytes = round_up(round_up(bits, UINT32_BITS) / UINT8_BITS, sz_io);
        round_up(bytes, sz_blk) / sz_blk
    }

    /// Rebuild the layout recorded in a formatted super block.
    pub fn from_super(sb: &SuperBlockD, sz_disk: usize, sz_io: usize) -> Result<Self> {
        let field = |v: i32, name: &str| -> Result<usize> {
            usize::try_from(v).map_err(|_| FsError::Corruption {
                offset: SUPER_OFS,
                detail: format!("negative {name}: {v}"),
            })
        };
        let layout = Layout {
            sz_io,
            sz_disk,
            sz_blk: 2 * sz_io,
            max_ino: field(sb.max_ino, "max_ino")?,
            map_inode_blks: field(sb.map_inode_blks, "map_inode_blks")?,
            map_inode_offset: field(sb.map_inode_offset, "map_inode_offset")?,
            map_data_blks: field(sb.map_data_blks, "map_data_blks")?,
            map_data_offset: field(sb.map_data_offset, "map_data_offset")?,
            inode_offset: field(sb.inode_offset, "inode_offset")?,
            data_offset: field(sb.data_offset, "data_offset")?,
        };
        layout.validate()?;
        Ok(layout)
    }

    fn validate(&self) -> Result<()> {
        let corrupt = |detail: &str| FsError::Corruption {
            offset: SUPER_OFS,
            detail: detail.to_string(),
        };
        if self.max_ino == 0 {
            return Err(corrupt("no inodes"));
        }
        if self.map_inode_offset + self.map_inode_blks * self.sz_blk > self.map_data_offset
            || self.map_data_offset + self.map_data_blks * self.sz_blk > self.inode_offset
            || self.inode_offset + self.max_ino * self.sz_blk > self.data_offset
        {
            return Err(corrupt("regions overlap"));
        }
        if self.data_offset > self.sz_disk {
            return Err(corrupt("data region starts past the device end"));
        }
        if self.max_ino > self.map_inode_blks * self.sz_blk * UINT8_BITS {
            return Err(corrupt("inode bitmap too small for max_ino"));
        }
        Ok(())
    }

    pub fn to_super(&self, sz_usage: usize) -> Result<SuperBlockD> {
        Ok(SuperBlockD {
            magic_num: MAGIC,
            sz_usage: fit_i32(sz_usage)?,
            max_ino: fit_i32(self.max_ino)?,
            map_inode_blks: fit_i32(self.map_inode_blks)?,
            map_inode_offset: fit_i32(self.map_inode_offset)?,
            map_data_blks: fit_i32(self.map_data_blks)?,
            map_data_offset: fit_i32(self.map_data_offset)?,
            inode_offset: fit_i32(self.inode_offset)?,
            data_offset: fit_i32(self.data_offset)?,
        })
    }

    /// Data blocks the allocator may hand out: whole blocks between the data
    /// region and the device end, bounded by the bitmap region.
    pub fn max_data(&self) -> usize {
        let region = (self.sz_disk - self.data_offset) / self.sz_blk;
        region.min(self.map_data_blks * self.sz_blk * UINT8_BITS)
    }

    pub fn blks_sz(&self, blks: usize) -> usize {
        blks * self.sz_blk
    }

    /// byte offset of inode `ino`'s inode-table slot
    pub fn ino_ofs(&self, ino: u32) -> usize {
        self.inode_offset + self.blks_sz(ino as usize)
    }

    /// byte offset of data block `bno`
    pub fn data_ofs(&self, bno: u32) -> usize {
        self.data_offset + self.blks_sz(bno as usize)
    }

    /// bytes of data a regular file can hold
    pub fn file_capacity(&self) -> usize {
        self.blks_sz(DATA_PER_FILE)
    }

    /// entries a directory can hold
    pub fn dir_capacity(&self) -> usize {
        dentries_per_block(self.sz_blk) * DATA_PER_FILE
    }
}
