//! Network abstractions: the TCP/IP stack, WiFi association and open links.
//!
//! - `Network`: opens connections, wraps them in a secure channel, and
//!   manages WiFi association
//! - `Link`: one open connection
//! - `TcpNetwork`: host implementation on `std::net`
//! - `MemoryNetwork`: scripted in-memory implementation

mod memory;
mod tcp;

use std::fmt;
use std::io;
use std::net::Ipv4Addr;

pub use memory::{MemoryLink, MemoryNetwork, RemoteEnd};
pub use tcp::{TcpLink, TcpNetwork};

/// One open connection to a remote host.
pub trait Link: Send {
    /// Read available bytes. Returns `Ok(0)` when nothing is pending.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Write all of `buf`, blocking as needed.
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()>;

    /// Number of bytes readable without blocking.
    fn available(&mut self) -> usize;

    /// False once the remote side has closed or the link failed.
    fn is_connected(&mut self) -> bool;

    /// Disable (or enable) send coalescing.
    fn set_nodelay(&mut self, nodelay: bool) -> io::Result<()>;

    /// Close the link. Idempotent.
    fn close(&mut self);
}

/// WiFi association state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    Up,
    Joining,
    NoIp,
    BadAuth,
    NoNetwork,
    Failed,
    Down,
}

impl fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            LinkStatus::Up | LinkStatus::Joining => "CONNECTED",
            LinkStatus::NoIp => "NO IP ASSIGNED",
            LinkStatus::BadAuth => "CONNECT FAILED BAD AUTHENTICATION",
            LinkStatus::NoNetwork => "SSID UNAVAILABLE",
            LinkStatus::Failed => "CONNECTION LOST",
            LinkStatus::Down => "DISCONNECTED",
        };
        f.write_str(text)
    }
}

/// Snapshot of the network interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkStatus {
    pub link: LinkStatus,
    pub ssid: String,
    pub mac: [u8; 6],
    pub ip: Ipv4Addr,
    pub gateway: Ipv4Addr,
    pub netmask: Ipv4Addr,
}

impl NetworkStatus {
    /// Status of an interface that is not associated.
    pub fn down() -> Self {
        Self {
            link: LinkStatus::Down,
            ssid: String::new(),
            mac: [0; 6],
            ip: Ipv4Addr::UNSPECIFIED,
            gateway: Ipv4Addr::UNSPECIFIED,
            netmask: Ipv4Addr::UNSPECIFIED,
        }
    }

    /// MAC address as colon separated hex.
    pub fn mac_string(&self) -> String {
        self.mac
            .iter()
            .map(|b| format!("{:02X}", b))
            .collect::<Vec<_>>()
            .join(":")
    }
}

/// One network seen in a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessPoint {
    pub ssid: String,
    pub auth_mode: u32,
    pub rssi: i16,
}

/// TCP/IP stack plus WiFi association.
pub trait Network: Send {
    /// Open a plain TCP connection.
    fn connect(&mut self, host: &str, port: u16) -> io::Result<Box<dyn Link>>;

    /// Run the secure-channel handshake over `link`. On failure the link is
    /// dropped, which closes it.
    fn secure(
        &mut self,
        link: Box<dyn Link>,
        user: &str,
        password: &str,
    ) -> io::Result<Box<dyn Link>>;

    /// Scan for visible networks.
    fn scan(&mut self) -> Vec<AccessPoint>;

    /// Associate with a WiFi network.
    fn join(&mut self, ssid: &str, password: &str) -> io::Result<()>;

    /// Drop the WiFi association.
    fn leave(&mut self);

    fn status(&self) -> NetworkStatus;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mac_string() {
        let mut status = NetworkStatus::down();
        status.mac = [0x28, 0xCD, 0xC1, 0x0A, 0x0B, 0x0C];
        assert_eq!(status.mac_string(), "28:CD:C1:0A:0B:0C");
    }

    #[test]
    fn test_link_status_text() {
        assert_eq!(LinkStatus::Up.to_string(), "CONNECTED");
        assert_eq!(LinkStatus::Down.to_string(), "DISCONNECTED");
        assert_eq!(LinkStatus::NoNetwork.to_string(), "SSID UNAVAILABLE");
    }
}
