//! Framed block protocol for the virtual drives.
//!
//! Request (host to modem), 5 bytes:
//!
//! ```text
//! [0xC5, ctrl, block_lo, block_hi, xor(first four)]
//! ```
//!
//! `ctrl >> 2` selects the drive. `ctrl` 3 or 5 reads a block, 2 or 4 writes
//! one (not supported, ignored), 0x80 ends the session.
//!
//! Read response, 522 bytes:
//!
//! ```text
//! [0xC5, ctrl, block_lo, block_hi, time_lo, time_hi, date_lo, date_hi,
//!  xor(first eight), data[512], xor(data)]
//! ```
//!
//! A short read still sends 512 data bytes but bumps the data checksum by one
//! so the host rejects the block.

use chrono::{DateTime, Datelike, Timelike, Utc};
use log::{debug, trace};

use super::{DriveBay, BLOCK_SIZE};
use crate::clock::Clock;
use crate::transport::Transport;

pub const FRAME_MARKER: u8 = 0xC5;
pub const REQUEST_LEN: usize = 5;
pub const HEADER_LEN: usize = 9;
pub const RESPONSE_LEN: usize = HEADER_LEN + BLOCK_SIZE + 1;

/// What a request asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    ReadBlock,
    WriteBlock,
    Terminate,
    Unknown,
}

/// A request frame that passed its checksum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Request {
    pub ctrl: u8,
    pub block_lo: u8,
    pub block_hi: u8,
}

impl Request {
    pub fn drive(&self) -> usize {
        (self.ctrl >> 2) as usize
    }

    pub fn block(&self) -> u16 {
        u16::from_le_bytes([self.block_lo, self.block_hi])
    }

    pub fn operation(&self) -> Operation {
        match self.ctrl {
            0x03 | 0x05 => Operation::ReadBlock,
            0x02 | 0x04 => Operation::WriteBlock,
            0x80 => Operation::Terminate,
            _ => Operation::Unknown,
        }
    }
}

/// XOR of all bytes.
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0, |acc, b| acc ^ b)
}

/// Validate a request frame. Returns None for a bad marker or checksum.
pub fn parse_request(frame: &[u8; REQUEST_LEN]) -> Option<Request> {
    if frame[0] != FRAME_MARKER || checksum(&frame[..4]) != frame[4] {
        return None;
    }
    Some(Request {
        ctrl: frame[1],
        block_lo: frame[2],
        block_hi: frame[3],
    })
}

/// ProDOS packed `(time, date)` for a wall-clock time.
///
/// `time = hour << 8 | minute`, `date = (year - 2000) << 9 | month << 5 | day`.
pub fn pack_timestamp(epoch_secs: i64) -> (u16, u16) {
    let now: DateTime<Utc> = DateTime::from_timestamp(epoch_secs, 0).unwrap_or_default();
    let time = ((now.hour() as u16) << 8) | now.minute() as u16;
    let year = (now.year() - 2000).clamp(0, 0x7F) as u16;
    let date = (year << 9) | ((now.month() as u16) << 5) | now.day() as u16;
    (time, date)
}

/// Build the response to a read request. `filled` is how many bytes of
/// `data` actually came from the file.
pub fn build_block_response(
    request: &Request,
    stamp: (u16, u16),
    data: &[u8; BLOCK_SIZE],
    filled: usize,
) -> Vec<u8> {
    let (time, date) = stamp;
    let mut frame = Vec::with_capacity(RESPONSE_LEN);
    frame.extend_from_slice(&[FRAME_MARKER, request.ctrl, request.block_lo, request.block_hi]);
    frame.extend_from_slice(&time.to_le_bytes());
    frame.extend_from_slice(&date.to_le_bytes());
    frame.push(checksum(&frame));

    frame.extend_from_slice(data);
    let mut sum = checksum(data);
    if filled < BLOCK_SIZE {
        sum = sum.wrapping_add(1);
    }
    frame.push(sum);
    frame
}

/// How `serve` ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServeExit {
    /// The host sent a terminate frame.
    Terminated,
    /// The transport closed.
    Closed,
}

/// Answer block requests until the host terminates the session. Owns the
/// transport for the duration.
pub fn serve<T: Transport + ?Sized>(
    transport: &mut T,
    drives: &mut DriveBay,
    clock: &dyn Clock,
) -> ServeExit {
    let mut frame = [0u8; REQUEST_LEN];
    loop {
        match transport.read_byte() {
            Some(FRAME_MARKER) => frame[0] = FRAME_MARKER,
            Some(_) => continue,
            None => return ServeExit::Closed,
        }
        for slot in frame.iter_mut().skip(1) {
            match transport.read_byte() {
                Some(byte) => *slot = byte,
                None => return ServeExit::Closed,
            }
        }

        let Some(request) = parse_request(&frame) else {
            debug!("dropped drive frame with bad checksum: {:02X?}", frame);
            continue;
        };

        match request.operation() {
            Operation::ReadBlock => {
                let mut data = [0u8; BLOCK_SIZE];
                let Some(filled) = drives.read_block(request.drive(), request.block(), &mut data)
                else {
                    trace!("read from empty drive {}", request.drive() + 1);
                    continue;
                };
                let stamp = pack_timestamp(clock.epoch_secs());
                transport.write(&build_block_response(&request, stamp, &data, filled));
            }
            Operation::WriteBlock => {
                trace!(
                    "ignoring write to drive {} block {}",
                    request.drive() + 1,
                    request.block()
                );
            }
            Operation::Terminate => return ServeExit::Terminated,
            Operation::Unknown => debug!("unknown drive request {:#04x}", request.ctrl),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::drive::MemoryRemoteFs;
    use crate::transport::HeadlessTransport;

    fn request(ctrl: u8, block: u16) -> [u8; REQUEST_LEN] {
        let [lo, hi] = block.to_le_bytes();
        [FRAME_MARKER, ctrl, lo, hi, FRAME_MARKER ^ ctrl ^ lo ^ hi]
    }

    #[test]
    fn test_parse_request() {
        let req = parse_request(&[0xC5, 0x03, 0x00, 0x00, 0xC6]).unwrap();
        assert_eq!(req.drive(), 0);
        assert_eq!(req.block(), 0);
        assert_eq!(req.operation(), Operation::ReadBlock);

        let req = parse_request(&request(0x05, 0x0102)).unwrap();
        assert_eq!(req.drive(), 1);
        assert_eq!(req.block(), 0x0102);

        assert!(parse_request(&[0xC5, 0x03, 0x01, 0x00, 0xC6]).is_none());
        assert!(parse_request(&[0xC4, 0x03, 0x00, 0x00, 0xC7]).is_none());
    }

    #[test]
    fn test_operations() {
        let op = |ctrl| parse_request(&request(ctrl, 0)).unwrap().operation();
        assert_eq!(op(0x02), Operation::WriteBlock);
        assert_eq!(op(0x04), Operation::WriteBlock);
        assert_eq!(op(0x80), Operation::Terminate);
        assert_eq!(op(0x01), Operation::Unknown);
    }

    #[test]
    fn test_pack_timestamp() {
        // 2024-03-15 13:45:00 UTC
        let (time, date) = pack_timestamp(1_710_510_300);
        assert_eq!(time, (13 << 8) | 45);
        assert_eq!(date, (24 << 9) | (3 << 5) | 15);
    }

    #[test]
    fn test_block_response_layout() {
        let req = parse_request(&request(0x03, 0x0201)).unwrap();
        let mut data = [0u8; BLOCK_SIZE];
        data[0] = 0x0F;
        data[1] = 0xF0;
        let frame = build_block_response(&req, (0x0D2D, 0x3070), &data, BLOCK_SIZE);

        assert_eq!(frame.len(), RESPONSE_LEN);
        assert_eq!(&frame[..8], &[0xC5, 0x03, 0x01, 0x02, 0x2D, 0x0D, 0x70, 0x30]);
        assert_eq!(frame[8], checksum(&frame[..8]));
        assert_eq!(frame[RESPONSE_LEN - 1], 0xFF);
    }

    #[test]
    fn test_short_read_corrupts_checksum() {
        let req = parse_request(&request(0x03, 0)).unwrap();
        let data = [0x11u8; BLOCK_SIZE];
        let full = build_block_response(&req, (0, 0), &data, BLOCK_SIZE);
        let short = build_block_response(&req, (0, 0), &data, 500);
        assert_eq!(full[RESPONSE_LEN - 1], 0x00);
        assert_eq!(short[RESPONSE_LEN - 1], 0x01);
        assert_eq!(short.len(), RESPONSE_LEN);
    }

    #[test]
    fn test_serve_answers_reads_until_terminate() {
        let mut fs = MemoryRemoteFs::new();
        fs.add_file("disk.po", vec![0x5A; 1024]);
        let mut drives = DriveBay::new();
        drives.mount(&mut fs, 0, "disk.po").unwrap();

        let mut input = vec![0x00, 0x13];
        input.extend_from_slice(&request(0x03, 1));
        input.extend_from_slice(&[0xC5, 0x03, 0x00, 0x00, 0x00]);
        input.extend_from_slice(&request(0x05, 0));
        input.extend_from_slice(&request(0x04, 0));
        input.extend_from_slice(&request(0x80, 0));
        input.extend_from_slice(b"AT\r");
        let mut transport = HeadlessTransport::with_input(&input);
        let clock = ManualClock::at_epoch(1_710_510_300);

        assert_eq!(serve(&mut transport, &mut drives, &clock), ServeExit::Terminated);
        let out = transport.output();
        assert_eq!(out.len(), RESPONSE_LEN);
        assert_eq!(&out[..4], &[0xC5, 0x03, 0x01, 0x00]);
        assert!(out[HEADER_LEN..HEADER_LEN + BLOCK_SIZE].iter().all(|&b| b == 0x5A));
        assert_eq!(transport.available(), 3);
    }

    #[test]
    fn test_serve_stops_when_transport_closes() {
        let mut drives = DriveBay::new();
        let mut transport = HeadlessTransport::with_input(&[0xC5, 0x03]);
        let clock = ManualClock::new();
        assert_eq!(serve(&mut transport, &mut drives, &clock), ServeExit::Closed);
    }
}
