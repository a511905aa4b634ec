//! Write batch for one sync pass, a typical use is:
//!   let mut trans = Trans::begin();
//!   trans.log_write(offset, record)   (as many times as needed)
//!   trans.commit(&driver)
//! Nothing reaches the device before `commit`, so a pass that fails while
//! collecting its writes leaves the device untouched. A device error during
//! `commit` itself can still leave part of the batch written.

use super::*;
use driver::Driver;

use log::debug;

#[derive(Default)]
pub struct Trans {
    /// pending writes in issue order
    table: Vec<(usize /* offset */, Vec<u8>)>,
    bytes: usize,
}

impl Trans {
    pub fn begin() -> Self {
        Self::default()
    }

    /// Queue `data` for byte offset `offset`. A second write of the same
    /// range replaces the first in place (log absorption).
    pub fn log_write(&mut self, offset: usize, data: Vec<u8>) {
        if let Some(pending) = self
            .table
            .iter_mut()
            .find(|(ofs, old)| *ofs == offset && old.len() == data.len())
        {
            pending.1 = data;
            return;
        }
        self.bytes += data.len();
        self.table.push((offset, data));
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Install every queued write, in order.
    pub fn commit(self, driver: &Driver) -> Result<()> {
        debug!(
            "commit: {} writes, {} bytes",
            self.table.len(),
            self.bytes
        );
        for (offset, data) in &self.table {
            driver.write(*offset, data)?;
        }
        driver.flush()
    }
}
