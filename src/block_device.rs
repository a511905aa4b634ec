#[allow(unused_imports)]
use super::*;

use std::any::Any;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// A device addressed in whole atomic I/O units.
///
/// `buf.len()` passed to `read_block`/`write_block` is always `io_unit()`.
pub trait BlockDevice: Send + Sync + Any {
    /// capacity in bytes
    fn size(&self) -> usize;
    /// atomic I/O unit in bytes
    fn io_unit(&self) -> usize;
    fn read_block(&self, blockno: usize, buf: &mut [u8]) -> io::Result<()>;
    fn write_block(&self, blockno: usize, buf: &[u8]) -> io::Result<()>;
    fn flush(&self) -> io::Result<()> {
        Ok(())
    }
}

fn check_range(blockno: usize, len: usize, io_unit: usize, size: usize) -> io::Result<usize> {
    if len != io_unit {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("buffer of {len} bytes is not one I/O unit ({io_unit})"),
        ));
    }
    let start = blockno * io_unit;
    if start + io_unit > size {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("unit {blockno} lies beyond the device end ({size} bytes)"),
        ));
    }
    Ok(start)
}

fn check_io_unit(io_unit: usize) -> io::Result<()> {
    if io_unit == 0 {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, "zero I/O unit"));
    }
    Ok(())
}

/// An image file (or device node) on the host.
pub struct FileDisk {
    file: Mutex<File>,
    size: usize,
    io_unit: usize,
}

impl FileDisk {
    pub fn open<P: AsRef<Path>>(path: P, io_unit: usize) -> io::Result<Self> {
        check_io_unit(io_unit)?;
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let size = file.metadata()?.len() as usize;
        Ok(Self {
            file: Mutex::new(file),
            size: round_down(size, io_unit),
            io_unit,
        })
    }

    /// Create (or truncate) a zero-filled image of `size` bytes.
    pub fn create<P: AsRef<Path>>(path: P, size: usize, io_unit: usize) -> io::Result<Self> {
        check_io_unit(io_unit)?;
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.set_len(size as u64)?;
        Ok(Self {
            file: Mutex::new(file),
            size: round_down(size, io_unit),
            io_unit,
        })
    }
}

impl BlockDevice for FileDisk {
    fn size(&self) -> usize {
        self.size
    }

    fn io_unit(&self) -> usize {
        self.io_unit
    }

    fn read_block(&self, blockno: usize, buf: &mut [u8]) -> io::Result<()> {
        let start = check_range(blockno, buf.len(), self.io_unit, self.size)?;
        let mut file = self.file.lock().unwrap();
        file.seek(SeekFrom::Start(start as u64))?;
        file.read_exact(buf)
    }

    fn write_block(&self, blockno: usize, buf: &[u8]) -> io::Result<()> {
        let start = check_range(blockno, buf.len(), self.io_unit, self.size)?;
        let mut file = self.file.lock().unwrap();
        file.seek(SeekFrom::Start(start as u64))?;
        file.write_all(buf)
    }

    fn flush(&self) -> io::Result<()> {
        self.file.lock().unwrap().sync_all()
    }
}

/// A RAM-backed device. Clones share the same bytes, so a clone outlives an
/// unmounted session and can be mounted again.
#[derive(Clone)]
pub struct MemDisk {
    inner: Arc<Mutex<Vec<u8>>>,
    io_unit: usize,
}

impl MemDisk {
    /// A zero `io_unit` yields an empty device, which `MyFs::mount` refuses.
    pub fn new(size: usize, io_unit: usize) -> Self {
        let size = if io_unit == 0 { 0 } else { round_down(size, io_unit) };
        Self {
            inner: Arc::new(Mutex::new(vec![0u8; size])),
            io_unit,
        }
    }

    /// copy of the raw device contents
    pub fn snapshot(&self) -> Vec<u8> {
        self.inner.lock().unwrap().clone()
    }
}

impl BlockDevice for MemDisk {
    fn size(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    fn io_unit(&self) -> usize {
        self.io_unit
    }

    fn read_block(&self, blockno: usize, buf: &mut [u8]) -> io::Result<()> {
        let data = self.inner.lock().unwrap();
        let start = check_range(blockno, buf.len(), self.io_unit, data.len())?;
        buf.copy_from_slice(&data[start..start + self.io_unit]);
        Ok(())
    }

    fn write_block(&self, blockno: usize, buf: &[u8]) -> io::Result<()> {
        let mut data = self.inner.lock().unwrap();
        let start = check_range(blockno, buf.len(), self.io_unit, data.len())?;
        data[start..start + self.io_unit].copy_from_slice(buf);
        Ok(())
    }
}
