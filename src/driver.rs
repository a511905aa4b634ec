//! Byte-granular access on top of a unit-granular device.
//!
//! Requests are widened to I/O-unit boundaries, the covering units are read,
//! and the caller's bytes are spliced in (write) or cut out (read).

use super::*;
use block_device::BlockDevice;

use std::sync::Arc;

#[derive(Clone)]
pub struct Driver {
    blk_dev: Arc<dyn BlockDevice>,
    sz_io: usize,
}

impl Driver {
    pub fn new(blk_dev: Arc<dyn BlockDevice>) -> Self {
        let sz_io = blk_dev.io_unit();
        Self { blk_dev, sz_io }
    }

    pub fn sz_io(&self) -> usize {
        self.sz_io
    }

    pub fn sz_disk(&self) -> usize {
        self.blk_dev.size()
    }

    fn read_units(&self, offset_aligned: usize, out: &mut [u8]) -> Result<()> {
        let first = offset_aligned / self.sz_io;
        for (i, unit) in out.chunks_mut(self.sz_io).enumerate() {
            self.blk_dev.read_block(first + i, unit)?;
        }
        Ok(())
    }

    /// Read `out.len()` bytes starting at byte `offset`.
    pub fn read(&self, offset: usize, out: &mut [u8]) -> Result<()> {
        let offset_aligned = round_down(offset, self.sz_io);
        let bias = offset - offset_aligned;
        let size_aligned = round_up(out.len() + bias, self.sz_io);
        let mut tmp = vec![0u8; size_aligned];
        self.read_units(offset_aligned, &mut tmp)?;
        out.copy_from_slice(&tmp[bias..bias + out.len()]);
        Ok(())
    }

    /// Write `data` at byte `offset`, preserving the bytes around it.
    pub fn write(&self, offset: usize, data: &[u8]) -> Result<()> {
        let offset_aligned = round_down(offset, self.sz_io);
        let bias = offset - offset_aligned;
        let size_aligned = round_up(data.len() + bias, self.sz_io);
        let mut tmp = vec![0u8; size_aligned];
        // only the partially covered edge units carry bytes we must keep
        if bias != 0 || size_aligned != data.len() {
            self.read_units(offset_aligned, &mut tmp)?;
        }
        tmp[bias..bias + data.len()].copy_from_slice(data);
        let first = offset_aligned / self.sz_io;
        for (i, unit) in tmp.chunks(self.sz_io).enumerate() {
            self.blk_dev.write_block(first + i, unit)?;
        }
        Ok(())
    }

    pub fn flush(&self) -> Result<()> {
        Ok(self.blk_dev.flush()?)
    }
}
