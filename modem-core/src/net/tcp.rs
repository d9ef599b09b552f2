//! Host network implementation over `std::net`.

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::net::{Ipv4Addr, SocketAddr, TcpStream, ToSocketAddrs, UdpSocket};
use std::time::Duration;

use log::debug;

use super::{AccessPoint, Link, LinkStatus, Network, NetworkStatus};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Network backed by the host's own TCP/IP stack.
///
/// The host is assumed to be online already, so `join` only records the
/// SSID and `scan` finds nothing. The secure channel is not available.
pub struct TcpNetwork {
    ssid: String,
    up: bool,
}

impl TcpNetwork {
    pub fn new() -> Self {
        Self {
            ssid: String::new(),
            up: true,
        }
    }
}

impl Default for TcpNetwork {
    fn default() -> Self {
        Self::new()
    }
}

/// Address the host would use for outbound traffic. No packets are sent.
fn local_ip() -> Option<Ipv4Addr> {
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("192.0.2.1:9").ok()?;
    match socket.local_addr().ok()? {
        SocketAddr::V4(addr) => Some(*addr.ip()),
        SocketAddr::V6(_) => None,
    }
}

impl Network for TcpNetwork {
    fn connect(&mut self, host: &str, port: u16) -> io::Result<Box<dyn Link>> {
        let mut last_err = io::Error::new(io::ErrorKind::NotFound, "host did not resolve");
        for addr in (host, port).to_socket_addrs()? {
            match TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT) {
                Ok(stream) => {
                    debug!("connected to {}", addr);
                    return Ok(Box::new(TcpLink::new(stream)?));
                }
                Err(e) => last_err = e,
            }
        }
        Err(last_err)
    }

    fn secure(
        &mut self,
        _link: Box<dyn Link>,
        _user: &str,
        _password: &str,
    ) -> io::Result<Box<dyn Link>> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "secure channel not available on this host",
        ))
    }

    fn scan(&mut self) -> Vec<AccessPoint> {
        Vec::new()
    }

    fn join(&mut self, ssid: &str, _password: &str) -> io::Result<()> {
        self.ssid = ssid.to_string();
        self.up = true;
        Ok(())
    }

    fn leave(&mut self) {
        self.up = false;
    }

    fn status(&self) -> NetworkStatus {
        if !self.up {
            return NetworkStatus::down();
        }
        NetworkStatus {
            link: LinkStatus::Up,
            ssid: self.ssid.clone(),
            ip: local_ip().unwrap_or(Ipv4Addr::UNSPECIFIED),
            ..NetworkStatus::down()
        }
    }
}

/// TCP connection with a non-blocking read side.
pub struct TcpLink {
    stream: TcpStream,
    pending: VecDeque<u8>,
    connected: bool,
}

impl TcpLink {
    pub fn new(stream: TcpStream) -> io::Result<Self> {
        stream.set_nonblocking(true)?;
        Ok(Self {
            stream,
            pending: VecDeque::new(),
            connected: true,
        })
    }

    /// Pull whatever the socket has into `pending`.
    fn fill(&mut self) {
        if !self.connected {
            return;
        }
        let mut buf = [0u8; 512];
        loop {
            match self.stream.read(&mut buf) {
                Ok(0) => {
                    self.connected = false;
                    break;
                }
                Ok(n) => self.pending.extend(&buf[..n]),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    debug!("tcp read failed: {}", e);
                    self.connected = false;
                    break;
                }
            }
        }
    }
}

impl Link for TcpLink {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pending.is_empty() {
            self.fill();
        }
        let n = buf.len().min(self.pending.len());
        for (slot, byte) in buf.iter_mut().zip(self.pending.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.stream.set_nonblocking(false)?;
        let result = self.stream.write_all(buf);
        self.stream.set_nonblocking(true)?;
        if result.is_err() {
            self.connected = false;
        }
        result
    }

    fn available(&mut self) -> usize {
        self.fill();
        self.pending.len()
    }

    fn is_connected(&mut self) -> bool {
        if self.pending.is_empty() {
            self.fill();
        }
        self.connected || !self.pending.is_empty()
    }

    fn set_nodelay(&mut self, nodelay: bool) -> io::Result<()> {
        self.stream.set_nodelay(nodelay)
    }

    fn close(&mut self) {
        if self.connected {
            let _ = self.stream.shutdown(std::net::Shutdown::Both);
            self.connected = false;
        }
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn test_tcp_link_relays_and_detects_close() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let mut network = TcpNetwork::new();
        let mut link = network.connect("127.0.0.1", port).unwrap();
        let (mut server, _) = listener.accept().unwrap();

        link.write_all(b"hello").unwrap();
        let mut buf = [0u8; 5];
        server.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"hello");

        server.write_all(b"hi").unwrap();
        drop(server);

        let mut got = Vec::new();
        for _ in 0..200 {
            let mut chunk = [0u8; 8];
            let n = link.read(&mut chunk).unwrap();
            got.extend_from_slice(&chunk[..n]);
            if !link.is_connected() {
                break;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(got, b"hi");
        assert!(!link.is_connected());
    }

    #[test]
    fn test_secure_unsupported() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let mut network = TcpNetwork::new();
        let link = network.connect("127.0.0.1", port).unwrap();
        let err = network.secure(link, "user", "pass").err().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::Unsupported);
    }
}
