//! Hayes-compatible WiFi modem emulator core
//!
//! This crate provides the session and protocol engine of a virtual modem:
//! - AT command parsing and the command/online mode state machine
//! - Telnet IAC transparency while relaying online data
//! - Outbound call setup (plain TCP or a secure channel) and hangup
//! - A framed block protocol that serves a remote file as a virtual drive
//! - Versioned settings records persisted to flash
//!
//! # Architecture
//!
//! The engine talks to the outside world only through traits:
//! - `Transport`: duplex byte queue to the legacy host
//! - `Network` / `Link`: TCP/IP stack, WiFi association and open connections
//! - `Flash`: erase/program primitives of non-volatile storage
//! - `RemoteFs` / `RemoteFile`: read-only remote file access for virtual drives
//! - `Clock`: monotonic milliseconds and wall-clock epoch seconds
//!
//! `Modem` owns one of each and is driven by `Modem::poll` or `Modem::run`.

pub mod clock;
pub mod command;
pub mod dial;
pub mod drive;
pub mod error;
pub mod modem;
pub mod net;
pub mod result;
pub mod settings;
pub mod telnet;
pub mod transport;

pub use clock::{Clock, ManualClock, SystemClock};
pub use command::Command;
pub use dial::{CallManager, Target, UrlRequest};
pub use drive::{DriveBay, LocalFs, MemoryRemoteFs, RemoteFile, RemoteFs};
pub use error::{ModemError, ModemResult};
pub use modem::{Modem, Peripherals};
pub use net::{AccessPoint, Link, LinkStatus, MemoryNetwork, Network, NetworkStatus, TcpNetwork};
pub use result::ResultCode;
pub use settings::{Flash, MemoryFlash, RecordError, Settings, SettingsStore};
pub use transport::{HeadlessTransport, QueueTransport, SerialDevice, Transport, TransportContext};

/// Baud rates selectable with `AT$SB`, addressed by index.
pub const BAUD_RATES: [u32; 9] = [300, 1200, 2400, 4800, 9600, 19200, 38400, 57600, 115200];

/// Index into `BAUD_RATES` used by factory defaults (19200).
pub const DEFAULT_BAUD_INDEX: u8 = 5;

/// Index of the fastest rate, used while the drive protocol runs.
pub const MAX_BAUD_INDEX: u8 = 8;

/// Look up a baud rate by index, falling back to the default rate.
pub fn baud_rate(index: u8) -> u32 {
    BAUD_RATES
        .get(index as usize)
        .copied()
        .unwrap_or(BAUD_RATES[DEFAULT_BAUD_INDEX as usize])
}

/// Session mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Bytes from the host are collected into AT command lines.
    Command,
    /// Bytes are relayed between the host and the active connection.
    Online,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_baud_rate_lookup() {
        assert_eq!(baud_rate(0), 300);
        assert_eq!(baud_rate(DEFAULT_BAUD_INDEX), 19200);
        assert_eq!(baud_rate(MAX_BAUD_INDEX), 115200);
        assert_eq!(baud_rate(42), 19200);
    }
}
