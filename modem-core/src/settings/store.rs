//! Settings persistence at a fixed flash offset.

use log::{debug, info};

use super::record::{self, RecordError, MAX_RECORD_LEN};
use super::{Flash, Settings};
use crate::error::{ModemError, ModemResult};

/// Flash offset of the settings record: 2044 KiB into the device.
pub const SETTINGS_OFFSET: u32 = 2044 * 1024;

/// Saves and loads settings records.
///
/// `save` performs the destructive erase/program sequence. Callers sharing
/// the flash with another execution context must quiesce it first.
pub struct SettingsStore<F: Flash> {
    flash: F,
    offset: u32,
}

impl<F: Flash> SettingsStore<F> {
    /// Store records at `SETTINGS_OFFSET`.
    pub fn new(flash: F) -> Self {
        Self::with_offset(flash, SETTINGS_OFFSET)
    }

    pub fn with_offset(flash: F, offset: u32) -> Self {
        Self { flash, offset }
    }

    pub fn flash(&self) -> &F {
        &self.flash
    }

    /// Write `settings` to flash.
    pub fn save(&mut self, settings: &Settings) -> ModemResult<()> {
        let mut bytes = record::encode(settings);
        if bytes.len() > MAX_RECORD_LEN {
            return Err(ModemError::RecordTooLarge(bytes.len()));
        }

        let page = self.flash.page_size() as usize;
        let sector = self.flash.sector_size() as usize;
        bytes.resize(round_up(bytes.len(), page), 0xFF);
        let erase_len = round_up(bytes.len(), sector);

        self.flash.erase(self.offset, erase_len as u32)?;
        self.flash.program(self.offset, &bytes)?;
        info!("saved settings ({} bytes) at {:#x}", bytes.len(), self.offset);
        Ok(())
    }

    /// Read the stored record. Any failure means "no saved settings".
    pub fn load(&self) -> Result<Settings, RecordError> {
        let mut buf = vec![0u8; MAX_RECORD_LEN];
        if let Err(e) = self.flash.read(self.offset, &mut buf) {
            debug!("settings region unreadable: {}", e);
            return Err(RecordError::Truncated);
        }
        record::decode(&buf)
    }
}

fn round_up(len: usize, granule: usize) -> usize {
    if granule == 0 {
        return len;
    }
    len.div_ceil(granule) * granule
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::MemoryFlash;

    #[test]
    fn test_save_then_load() {
        let mut store = SettingsStore::new(MemoryFlash::default());
        let mut settings = Settings::default();
        settings.ssid = "RetroNet".into();
        settings.telnet = true;
        settings.set_speed_dial(3, "example.com:2000");

        store.save(&settings).unwrap();
        assert_eq!(store.load().unwrap(), settings);
    }

    #[test]
    fn test_blank_flash_has_no_settings() {
        let store = SettingsStore::new(MemoryFlash::default());
        assert_eq!(store.load(), Err(RecordError::BadMagic));
    }

    #[test]
    fn test_save_overwrites_previous_record() {
        let mut store = SettingsStore::with_offset(MemoryFlash::new(16384), 8192);
        let mut settings = Settings::default();
        settings.ssid = "first".into();
        store.save(&settings).unwrap();
        settings.ssid = "second".into();
        store.save(&settings).unwrap();
        assert_eq!(store.load().unwrap().ssid, "second");
    }

    #[test]
    fn test_save_failure_reported() {
        // Region does not fit inside the device.
        let mut store = SettingsStore::with_offset(MemoryFlash::new(4096), 4096);
        assert!(store.save(&Settings::default()).is_err());
    }

    #[test]
    fn test_round_up() {
        assert_eq!(round_up(1, 256), 256);
        assert_eq!(round_up(256, 256), 256);
        assert_eq!(round_up(921, 4096), 4096);
    }
}
