//! Virtual drives backed by remote files.
//!
//! - `DriveBay`: the two drive slots and their mount state
//! - `protocol`: the framed block protocol served over the transport
//! - `RemoteFs` / `RemoteFile`: where the drive images come from

pub mod protocol;
mod remote;

use std::io;

use log::{debug, info, warn};

pub use remote::{LocalFs, MemoryRemoteFs, RemoteFile, RemoteFs};

use crate::error::{ModemError, ModemResult};

/// Number of drive slots.
pub const DRIVE_SLOTS: usize = 2;

/// Bytes per block.
pub const BLOCK_SIZE: usize = 512;

/// Magic at the start of a 2IMG disk image.
pub const IMAGE_MAGIC: &[u8; 4] = b"2IMG";

/// Offset of the 2IMG header-size field.
const IMAGE_HEADER_SIZE_AT: usize = 0x18;

/// Transient read failures tolerated per block before giving up.
const MAX_TRANSIENT_RETRIES: usize = 64;

struct VirtualDrive {
    url: String,
    file: Box<dyn RemoteFile>,
    header_offset: u64,
    size: u64,
}

/// The drive slots. Unmounted slots ignore every access.
#[derive(Default)]
pub struct DriveBay {
    slots: [Option<VirtualDrive>; DRIVE_SLOTS],
}

impl DriveBay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mount `url` in `slot` (0-based), replacing whatever was there. On
    /// failure the slot is left empty.
    pub fn mount(&mut self, fs: &mut dyn RemoteFs, slot: usize, url: &str) -> ModemResult<()> {
        if slot >= DRIVE_SLOTS {
            return Err(ModemError::InvalidDrive(slot));
        }
        self.unmount(slot);

        let mount_err = |source| ModemError::Mount {
            url: url.to_string(),
            source,
        };
        let mut file = fs.open(url).map_err(mount_err)?;
        let size = file.size();
        let header_offset = probe_header(file.as_mut()).map_err(mount_err)?;

        info!(
            "mounted {} in drive {} ({} bytes, data at {})",
            url,
            slot + 1,
            size,
            header_offset
        );
        self.slots[slot] = Some(VirtualDrive {
            url: url.to_string(),
            file,
            header_offset,
            size,
        });
        Ok(())
    }

    /// Release the file in `slot`. Returns true if something was mounted.
    pub fn unmount(&mut self, slot: usize) -> bool {
        match self.slots.get_mut(slot).and_then(Option::take) {
            Some(drive) => {
                debug!("unmounted {} from drive {}", drive.url, slot + 1);
                true
            }
            None => false,
        }
    }

    pub fn is_mounted(&self, slot: usize) -> bool {
        matches!(self.slots.get(slot), Some(Some(_)))
    }

    /// URL, data offset and size of the image in `slot`.
    pub fn info(&self, slot: usize) -> Option<(&str, u64, u64)> {
        let drive = self.slots.get(slot)?.as_ref()?;
        Some((&drive.url, drive.header_offset, drive.size))
    }

    /// Read block `block` of `slot` into `buf`. Returns the number of bytes
    /// filled, or None when the slot is not mounted. Reading stops early at
    /// end of file or on a hard error.
    pub fn read_block(&mut self, slot: usize, block: u16, buf: &mut [u8; BLOCK_SIZE]) -> Option<usize> {
        let drive = self.slots.get_mut(slot)?.as_mut()?;
        let offset = block as u64 * BLOCK_SIZE as u64 + drive.header_offset;
        Some(read_fully(drive.file.as_mut(), buf, offset))
    }
}

/// Read as much of `buf` as possible from `offset`.
fn read_fully(file: &mut dyn RemoteFile, buf: &mut [u8], offset: u64) -> usize {
    let mut filled = 0;
    let mut retries = 0;
    while filled < buf.len() {
        match file.read_at(&mut buf[filled..], offset + filled as u64) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted) => {
                retries += 1;
                if retries > MAX_TRANSIENT_RETRIES {
                    warn!("giving up on read at {} after {} retries", offset, retries - 1);
                    break;
                }
            }
            Err(e) => {
                debug!("read at {} failed: {}", offset, e);
                break;
            }
        }
    }
    filled
}

/// Data offset of a disk image: the header size for 2IMG files, else 0.
fn probe_header(file: &mut dyn RemoteFile) -> io::Result<u64> {
    let mut head = [0u8; IMAGE_HEADER_SIZE_AT + 4];
    let n = read_fully(file, &mut head, 0);
    if n < IMAGE_MAGIC.len() || &head[..4] != IMAGE_MAGIC {
        return Ok(0);
    }
    if n < head.len() {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "truncated 2IMG header",
        ));
    }
    let field = &head[IMAGE_HEADER_SIZE_AT..IMAGE_HEADER_SIZE_AT + 4];
    Ok(u32::from_le_bytes([field[0], field[1], field[2], field[3]]) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image_2mg(data: &[u8]) -> Vec<u8> {
        let mut image = vec![0u8; 64];
        image[..4].copy_from_slice(IMAGE_MAGIC);
        image[IMAGE_HEADER_SIZE_AT] = 64;
        image.extend_from_slice(data);
        image
    }

    #[test]
    fn test_mount_plain_image() {
        let mut fs = MemoryRemoteFs::new();
        fs.add_file("smb://nas/disk.po", vec![7u8; 1024]);
        let mut bay = DriveBay::new();

        bay.mount(&mut fs, 0, "smb://nas/disk.po").unwrap();
        assert!(bay.is_mounted(0));
        assert!(!bay.is_mounted(1));
        assert_eq!(bay.info(0), Some(("smb://nas/disk.po", 0, 1024)));

        let mut buf = [0u8; BLOCK_SIZE];
        assert_eq!(bay.read_block(0, 1, &mut buf), Some(512));
        assert!(buf.iter().all(|&b| b == 7));
        assert_eq!(bay.read_block(0, 2, &mut buf), Some(0));
        assert_eq!(bay.read_block(1, 0, &mut buf), None);
    }

    #[test]
    fn test_mount_2img_uses_header_offset() {
        let mut data = vec![0u8; 1024];
        data[512] = 0xAB;
        let mut fs = MemoryRemoteFs::new();
        fs.add_file("disk.2mg", image_2mg(&data));
        let mut bay = DriveBay::new();

        bay.mount(&mut fs, 1, "disk.2mg").unwrap();
        assert_eq!(bay.info(1).unwrap().1, 64);
        let mut buf = [0u8; BLOCK_SIZE];
        assert_eq!(bay.read_block(1, 1, &mut buf), Some(512));
        assert_eq!(buf[0], 0xAB);
    }

    #[test]
    fn test_remount_releases_previous_file() {
        let mut fs = MemoryRemoteFs::new();
        fs.add_file("a.po", vec![1u8; 512]);
        fs.add_file("b.po", vec![2u8; 512]);
        let mut bay = DriveBay::new();

        bay.mount(&mut fs, 0, "a.po").unwrap();
        bay.mount(&mut fs, 0, "b.po").unwrap();
        assert_eq!(fs.open_handles(), 1);

        assert!(bay.mount(&mut fs, 0, "missing.po").is_err());
        assert!(!bay.is_mounted(0));
        assert_eq!(fs.open_handles(), 0);
    }

    #[test]
    fn test_truncated_2img_header_rejected() {
        let mut fs = MemoryRemoteFs::new();
        fs.add_file("short.2mg", b"2IMGxx".to_vec());
        let mut bay = DriveBay::new();
        assert!(matches!(
            bay.mount(&mut fs, 0, "short.2mg"),
            Err(ModemError::Mount { .. })
        ));
        assert_eq!(fs.open_handles(), 0);
    }

    #[test]
    fn test_invalid_slot() {
        let mut fs = MemoryRemoteFs::new();
        let mut bay = DriveBay::new();
        assert!(matches!(
            bay.mount(&mut fs, 2, "a.po"),
            Err(ModemError::InvalidDrive(2))
        ));
        assert!(!bay.unmount(5));
    }

    #[test]
    fn test_read_retries_transient_stalls() {
        let mut fs = MemoryRemoteFs::new();
        fs.add_file("a.po", vec![3u8; 1024]);
        let mut bay = DriveBay::new();
        bay.mount(&mut fs, 0, "a.po").unwrap();

        fs.stall(5);
        fs.set_chunk(100);
        let mut buf = [0u8; BLOCK_SIZE];
        assert_eq!(bay.read_block(0, 0, &mut buf), Some(512));
    }
}
