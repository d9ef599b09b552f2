//! Modem configuration and its persistence.
//!
//! This module provides:
//! - `Settings`: the user-alterable configuration aggregate
//! - `record`: the versioned binary layout stored in flash
//! - `Flash`: erase/program primitives, with `MemoryFlash` for tests
//! - `SettingsStore`: save/load of a record at a fixed flash offset

mod flash;
pub mod record;
mod store;

use serde::{Deserialize, Serialize};

pub use flash::{Flash, MemoryFlash, DEFAULT_CAPACITY, DEFAULT_SECTOR_SIZE};
pub use record::RecordError;
pub use store::{SettingsStore, SETTINGS_OFFSET};

use crate::DEFAULT_BAUD_INDEX;

/// Number of speed dial slots.
pub const SPEED_DIAL_SLOTS: usize = 10;

/// Longest stored text field, in bytes.
pub const MAX_FIELD_LEN: usize = 64;

/// Longest accepted SSID, in characters.
pub const MAX_SSID_LEN: usize = 32;

/// User-alterable configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub ssid: String,
    pub password: String,
    pub ssh_user: String,
    pub ssh_password: String,
    /// Index into `BAUD_RATES`.
    pub baud_index: u8,
    pub echo: bool,
    pub hex: bool,
    pub telnet: bool,
    pub verbose: bool,
    pub quiet: bool,
    pub speed_dials: [String; SPEED_DIAL_SLOTS],
}

impl Default for Settings {
    /// Factory defaults.
    fn default() -> Self {
        let dials = [
            "theoldnet.com:23",
            "bbs.retrocampus.com:23",
            "bbs.eotd.com:23",
            "blackflag.acid.org:31337",
            "bbs.starbase21.net:23",
            "reflections.servebbs.com:23",
            "heatwavebbs.com:9640",
            "",
            "",
            "",
        ];
        Self {
            ssid: String::new(),
            password: String::new(),
            ssh_user: String::new(),
            ssh_password: String::new(),
            baud_index: DEFAULT_BAUD_INDEX,
            echo: true,
            hex: false,
            telnet: false,
            verbose: true,
            quiet: false,
            speed_dials: dials.map(String::from),
        }
    }
}

impl Settings {
    /// Store a speed dial entry, truncated to `MAX_FIELD_LEN` characters.
    /// Returns false for an index outside 0-9.
    pub fn set_speed_dial(&mut self, index: usize, location: &str) -> bool {
        match self.speed_dials.get_mut(index) {
            Some(slot) => {
                *slot = truncate_chars(location, MAX_FIELD_LEN).to_string();
                true
            }
            None => false,
        }
    }
}

/// Prefix of `s` holding at most `max` characters.
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.baud_index, 5);
        assert!(settings.echo);
        assert!(settings.verbose);
        assert!(!settings.quiet);
        assert!(!settings.telnet);
        assert_eq!(settings.speed_dials[0], "theoldnet.com:23");
        assert!(settings.speed_dials[9].is_empty());
    }

    #[test]
    fn test_speed_dial_truncated() {
        let mut settings = Settings::default();
        let long = "x".repeat(100);
        assert!(settings.set_speed_dial(7, &long));
        assert_eq!(settings.speed_dials[7].len(), MAX_FIELD_LEN);
        assert!(!settings.set_speed_dial(10, "nowhere:23"));
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("hello", 3), "hel");
        assert_eq!(truncate_chars("hi", 3), "hi");
    }
}
