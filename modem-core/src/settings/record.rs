//! Versioned binary settings record.
//!
//! Layout, in order:
//! - 4-byte magic `9C 15 40 85` and a 1-byte format version
//! - SSID, WiFi password, SSH user, SSH password: each a length byte
//!   followed by at most 64 bytes of UTF-8
//! - baud index, echo, hex, telnet, verbose, quiet: one byte each
//! - 10 speed dial strings, encoded like the text fields above
//!
//! A record is applied all or nothing: any decode failure leaves the caller
//! with no settings at all.

use thiserror::Error;

use super::{Settings, MAX_FIELD_LEN, SPEED_DIAL_SLOTS};
use crate::BAUD_RATES;

/// Identifies a settings record.
pub const MAGIC: [u8; 4] = [0x9C, 0x15, 0x40, 0x85];

/// Current record format version.
pub const VERSION: u8 = 0;

/// Largest record ever written.
pub const MAX_RECORD_LEN: usize = 1024;

/// Why a stored record could not be used.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    #[error("There is no valid save in flash")]
    BadMagic,

    #[error("Save version mismatch. Expected {expected}, got {found}")]
    VersionMismatch { expected: u8, found: u8 },

    #[error("Record truncated")]
    Truncated,

    #[error("Field length {0} exceeds {MAX_FIELD_LEN}")]
    FieldTooLong(usize),

    #[error("Baud index {0} out of range")]
    BadBaudIndex(u8),

    #[error("Field is not valid UTF-8")]
    BadUtf8,
}

/// Serialize settings into a record.
pub fn encode(settings: &Settings) -> Vec<u8> {
    let mut out = Vec::with_capacity(MAX_RECORD_LEN);
    out.extend_from_slice(&MAGIC);
    out.push(VERSION);
    for field in [
        &settings.ssid,
        &settings.password,
        &settings.ssh_user,
        &settings.ssh_password,
    ] {
        put_str(&mut out, field);
    }
    out.push(settings.baud_index);
    for flag in [
        settings.echo,
        settings.hex,
        settings.telnet,
        settings.verbose,
        settings.quiet,
    ] {
        out.push(flag as u8);
    }
    for dial in &settings.speed_dials {
        put_str(&mut out, dial);
    }
    out
}

/// Parse a record. Trailing bytes after the last field are ignored.
pub fn decode(bytes: &[u8]) -> Result<Settings, RecordError> {
    let mut reader = Reader { bytes, pos: 0 };

    if reader.take(MAGIC.len()).ok() != Some(&MAGIC[..]) {
        return Err(RecordError::BadMagic);
    }
    let version = reader.byte()?;
    if version != VERSION {
        return Err(RecordError::VersionMismatch {
            expected: VERSION,
            found: version,
        });
    }

    let ssid = reader.string()?;
    let password = reader.string()?;
    let ssh_user = reader.string()?;
    let ssh_password = reader.string()?;

    let baud_index = reader.byte()?;
    if baud_index as usize >= BAUD_RATES.len() {
        return Err(RecordError::BadBaudIndex(baud_index));
    }
    let echo = reader.flag()?;
    let hex = reader.flag()?;
    let telnet = reader.flag()?;
    let verbose = reader.flag()?;
    let quiet = reader.flag()?;

    let mut speed_dials: [String; SPEED_DIAL_SLOTS] = Default::default();
    for dial in speed_dials.iter_mut() {
        *dial = reader.string()?;
    }

    Ok(Settings {
        ssid,
        password,
        ssh_user,
        ssh_password,
        baud_index,
        echo,
        hex,
        telnet,
        verbose,
        quiet,
        speed_dials,
    })
}

/// Write a length-prefixed string, cut at `MAX_FIELD_LEN` bytes on a char
/// boundary.
fn put_str(out: &mut Vec<u8>, s: &str) {
    let mut end = s.len().min(MAX_FIELD_LEN);
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    out.push(end as u8);
    out.extend_from_slice(&s.as_bytes()[..end]);
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, len: usize) -> Result<&'a [u8], RecordError> {
        let end = self.pos + len;
        let slice = self.bytes.get(self.pos..end).ok_or(RecordError::Truncated)?;
        self.pos = end;
        Ok(slice)
    }

    fn byte(&mut self) -> Result<u8, RecordError> {
        Ok(self.take(1)?[0])
    }

    fn flag(&mut self) -> Result<bool, RecordError> {
        Ok(self.byte()? != 0)
    }

    fn string(&mut self) -> Result<String, RecordError> {
        let len = self.byte()? as usize;
        if len > MAX_FIELD_LEN {
            return Err(RecordError::FieldTooLong(len));
        }
        let raw = self.take(len)?;
        String::from_utf8(raw.to_vec()).map_err(|_| RecordError::BadUtf8)
    }
}
