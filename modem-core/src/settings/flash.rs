//! Non-volatile storage primitives.

use crate::error::{ModemError, ModemResult};

/// NOR-style flash: erase whole sectors to 0xFF, program whole pages.
pub trait Flash: Send {
    /// Total size in bytes.
    fn capacity(&self) -> u32;

    /// Erase granularity in bytes.
    fn sector_size(&self) -> u32;

    /// Program granularity in bytes.
    fn page_size(&self) -> u32;

    /// Read `buf.len()` bytes at `offset`.
    fn read(&self, offset: u32, buf: &mut [u8]) -> ModemResult<()>;

    /// Erase `len` bytes at `offset`; both must be sector aligned.
    fn erase(&mut self, offset: u32, len: u32) -> ModemResult<()>;

    /// Program `data` at `offset`; both must be page aligned. Programming
    /// can only clear bits, so the region should be erased first.
    fn program(&mut self, offset: u32, data: &[u8]) -> ModemResult<()>;
}

impl<F: Flash + ?Sized> Flash for Box<F> {
    fn capacity(&self) -> u32 {
        (**self).capacity()
    }

    fn sector_size(&self) -> u32 {
        (**self).sector_size()
    }

    fn page_size(&self) -> u32 {
        (**self).page_size()
    }

    fn read(&self, offset: u32, buf: &mut [u8]) -> ModemResult<()> {
        (**self).read(offset, buf)
    }

    fn erase(&mut self, offset: u32, len: u32) -> ModemResult<()> {
        (**self).erase(offset, len)
    }

    fn program(&mut self, offset: u32, data: &[u8]) -> ModemResult<()> {
        (**self).program(offset, data)
    }
}

/// Check that `offset..offset+len` lies inside `capacity` and is aligned to
/// `align`.
pub(crate) fn check_range(
    capacity: u32,
    align: u32,
    offset: u32,
    len: usize,
) -> ModemResult<std::ops::Range<usize>> {
    let start = offset as usize;
    let end = start
        .checked_add(len)
        .filter(|&end| end <= capacity as usize)
        .ok_or(ModemError::FlashRange { offset, len })?;
    if align == 0 || offset % align != 0 || len % align as usize != 0 {
        return Err(ModemError::FlashAlignment { offset, len });
    }
    Ok(start..end)
}

/// Default capacity: 2 MiB, like the board's on-module flash.
pub const DEFAULT_CAPACITY: u32 = 2 * 1024 * 1024;
pub const DEFAULT_SECTOR_SIZE: u32 = 4096;
pub const DEFAULT_PAGE_SIZE: u32 = 256;

/// In-memory flash device.
#[derive(Clone)]
pub struct MemoryFlash {
    data: Vec<u8>,
    sector_size: u32,
    page_size: u32,
}

impl MemoryFlash {
    /// Create an erased device of `capacity` bytes.
    pub fn new(capacity: u32) -> Self {
        Self {
            data: vec![0xFF; capacity as usize],
            sector_size: DEFAULT_SECTOR_SIZE,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Raw contents.
    pub fn contents(&self) -> &[u8] {
        &self.data
    }

    /// Overwrite raw contents at `offset`, bypassing erase/program rules.
    pub fn poke(&mut self, offset: usize, bytes: &[u8]) {
        self.data[offset..offset + bytes.len()].copy_from_slice(bytes);
    }
}

impl Default for MemoryFlash {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl Flash for MemoryFlash {
    fn capacity(&self) -> u32 {
        self.data.len() as u32
    }

    fn sector_size(&self) -> u32 {
        self.sector_size
    }

    fn page_size(&self) -> u32 {
        self.page_size
    }

    fn read(&self, offset: u32, buf: &mut [u8]) -> ModemResult<()> {
        let range = check_range(self.capacity(), 1, offset, buf.len())?;
        buf.copy_from_slice(&self.data[range]);
        Ok(())
    }

    fn erase(&mut self, offset: u32, len: u32) -> ModemResult<()> {
        let range = check_range(self.capacity(), self.sector_size, offset, len as usize)?;
        self.data[range].fill(0xFF);
        Ok(())
    }

    fn program(&mut self, offset: u32, data: &[u8]) -> ModemResult<()> {
        let range = check_range(self.capacity(), self.page_size, offset, data.len())?;
        for (cell, &byte) in self.data[range].iter_mut().zip(data) {
            *cell &= byte;
        }
        Ok(())
    }
}
