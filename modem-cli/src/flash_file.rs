//! Flash image kept in a host file.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

use log::info;
use modem_core::settings::{DEFAULT_CAPACITY, DEFAULT_SECTOR_SIZE};
use modem_core::{Flash, MemoryFlash, ModemResult};

/// A `MemoryFlash` mirrored to a file. Every erase and program is written
/// through before returning.
pub struct FileFlash {
    image: MemoryFlash,
    file: File,
}

impl FileFlash {
    /// Open the image at `path`, creating an erased one if it does not exist.
    pub fn open(path: &Path) -> io::Result<Self> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        let len = file.metadata()?.len();

        let image = if len == 0 {
            let image = MemoryFlash::new(DEFAULT_CAPACITY);
            file.write_all(image.contents())?;
            file.sync_all()?;
            info!("created flash image {}", path.display());
            image
        } else {
            if len > u32::MAX as u64 || len % DEFAULT_SECTOR_SIZE as u64 != 0 {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("{}: {} bytes is not a whole number of sectors", path.display(), len),
                ));
            }
            let mut data = Vec::with_capacity(len as usize);
            file.read_to_end(&mut data)?;
            let mut image = MemoryFlash::new(len as u32);
            image.poke(0, &data);
            image
        };

        Ok(Self { image, file })
    }

    fn write_back(&mut self, offset: u32, len: usize) -> io::Result<()> {
        let start = offset as usize;
        self.file.seek(SeekFrom::Start(offset as u64))?;
        self.file.write_all(&self.image.contents()[start..start + len])?;
        self.file.sync_data()
    }
}

impl Flash for FileFlash {
    fn capacity(&self) -> u32 {
        self.image.capacity()
    }

    fn sector_size(&self) -> u32 {
        self.image.sector_size()
    }

    fn page_size(&self) -> u32 {
        self.image.page_size()
    }

    fn read(&self, offset: u32, buf: &mut [u8]) -> ModemResult<()> {
        self.image.read(offset, buf)
    }

    fn erase(&mut self, offset: u32, len: u32) -> ModemResult<()> {
        self.image.erase(offset, len)?;
        self.write_back(offset, len as usize)?;
        Ok(())
    }

    fn program(&mut self, offset: u32, data: &[u8]) -> ModemResult<()> {
        self.image.program(offset, data)?;
        self.write_back(offset, data.len())?;
        Ok(())
    }
}
