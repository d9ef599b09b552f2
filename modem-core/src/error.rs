//! Error types for the modem engine.

use thiserror::Error;

/// Errors that can occur while running a modem session.
#[derive(Error, Debug)]
pub enum ModemError {
    #[error("Already connected to {0}")]
    AlreadyConnected(String),

    #[error("Could not reach {host}:{port}: {source}")]
    Unreachable {
        host: String,
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("Secure handshake with {host}:{port} failed: {source}")]
    Handshake {
        host: String,
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid drive slot: {0}")]
    InvalidDrive(usize),

    #[error("Cannot mount {url}: {source}")]
    Mount {
        url: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Flash access out of range: offset {offset:#x}, length {len}")]
    FlashRange { offset: u32, len: usize },

    #[error("Flash access misaligned: offset {offset:#x}, length {len}")]
    FlashAlignment { offset: u32, len: usize },

    #[error("Settings record too large: {0} bytes")]
    RecordTooLarge(usize),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for modem operations.
pub type ModemResult<T> = Result<T, ModemError>;
