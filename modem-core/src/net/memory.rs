//! Scripted in-memory network.
//!
//! Hosts must be registered with `MemoryNetwork::accept` before they can be
//! dialed. Every successful connect yields a `MemoryLink` for the engine and
//! a `RemoteEnd` handle for the test, which can inject inbound bytes, read
//! what the engine sent, and hang up.

use std::collections::{HashSet, VecDeque};
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};

use super::{AccessPoint, Link, LinkStatus, Network, NetworkStatus};

#[derive(Default)]
struct LinkState {
    inbound: VecDeque<u8>,
    sent: Vec<u8>,
    remote_closed: bool,
    local_closed: bool,
    nodelay: bool,
    secure: bool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Test-side handle on one connection.
#[derive(Clone)]
pub struct RemoteEnd {
    host: String,
    port: u16,
    state: Arc<Mutex<LinkState>>,
}

impl RemoteEnd {
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Queue bytes for the engine to read.
    pub fn push(&self, bytes: &[u8]) {
        lock(&self.state).inbound.extend(bytes.iter().copied());
    }

    /// Everything the engine has written so far.
    pub fn sent(&self) -> Vec<u8> {
        lock(&self.state).sent.clone()
    }

    /// Remote side closes the connection.
    pub fn hang_up(&self) {
        lock(&self.state).remote_closed = true;
    }

    /// True once the engine closed or dropped its end.
    pub fn is_closed_locally(&self) -> bool {
        lock(&self.state).local_closed
    }

    pub fn nodelay(&self) -> bool {
        lock(&self.state).nodelay
    }

    pub fn is_secure(&self) -> bool {
        lock(&self.state).secure
    }
}

/// Engine-side end of an in-memory connection.
pub struct MemoryLink {
    state: Arc<Mutex<LinkState>>,
}

impl Link for MemoryLink {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut state = lock(&self.state);
        let n = buf.len().min(state.inbound.len());
        for (slot, byte) in buf.iter_mut().zip(state.inbound.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        let mut state = lock(&self.state);
        if state.remote_closed || state.local_closed {
            return Err(io::ErrorKind::BrokenPipe.into());
        }
        state.sent.extend_from_slice(buf);
        Ok(())
    }

    fn available(&mut self) -> usize {
        lock(&self.state).inbound.len()
    }

    fn is_connected(&mut self) -> bool {
        let state = lock(&self.state);
        !state.local_closed && (!state.remote_closed || !state.inbound.is_empty())
    }

    fn set_nodelay(&mut self, nodelay: bool) -> io::Result<()> {
        lock(&self.state).nodelay = nodelay;
        Ok(())
    }

    fn close(&mut self) {
        lock(&self.state).local_closed = true;
    }
}

impl Drop for MemoryLink {
    fn drop(&mut self) {
        self.close();
    }
}

#[derive(Default)]
struct NetState {
    reachable: HashSet<(String, u16)>,
    secure_credentials: Option<(String, String)>,
    remotes: Vec<RemoteEnd>,
    access_points: Vec<AccessPoint>,
    wifi: Option<(String, String)>,
    joined: Option<String>,
}

/// In-memory `Network`. Clones share state.
#[derive(Clone, Default)]
pub struct MemoryNetwork {
    state: Arc<Mutex<NetState>>,
}

impl MemoryNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `host:port` reachable.
    pub fn accept(&self, host: &str, port: u16) {
        lock(&self.state).reachable.insert((host.to_string(), port));
    }

    /// Let secure handshakes succeed for these credentials only.
    pub fn accept_secure(&self, user: &str, password: &str) {
        lock(&self.state).secure_credentials = Some((user.to_string(), password.to_string()));
    }

    /// Let `join` succeed for this SSID/password pair.
    pub fn set_wifi(&self, ssid: &str, password: &str) {
        lock(&self.state).wifi = Some((ssid.to_string(), password.to_string()));
    }

    /// Networks reported by `scan`.
    pub fn set_access_points(&self, aps: Vec<AccessPoint>) {
        lock(&self.state).access_points = aps;
    }

    /// Every connection opened so far, oldest first.
    pub fn remotes(&self) -> Vec<RemoteEnd> {
        lock(&self.state).remotes.clone()
    }

    /// Most recently opened connection.
    pub fn last_remote(&self) -> Option<RemoteEnd> {
        lock(&self.state).remotes.last().cloned()
    }
}

impl Network for MemoryNetwork {
    fn connect(&mut self, host: &str, port: u16) -> io::Result<Box<dyn Link>> {
        let mut net = lock(&self.state);
        if !net.reachable.contains(&(host.to_string(), port)) {
            return Err(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                format!("{}:{} unreachable", host, port),
            ));
        }
        let state = Arc::new(Mutex::new(LinkState::default()));
        net.remotes.push(RemoteEnd {
            host: host.to_string(),
            port,
            state: state.clone(),
        });
        Ok(Box::new(MemoryLink { state }))
    }

    fn secure(
        &mut self,
        link: Box<dyn Link>,
        user: &str,
        password: &str,
    ) -> io::Result<Box<dyn Link>> {
        let accepted = {
            let net = lock(&self.state);
            net.secure_credentials
                .as_ref()
                .is_some_and(|(u, p)| u == user && p == password)
        };
        if !accepted {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "authentication rejected",
            ));
        }
        if let Some(remote) = self.last_remote() {
            lock(&remote.state).secure = true;
        }
        Ok(link)
    }

    fn scan(&mut self) -> Vec<AccessPoint> {
        lock(&self.state).access_points.clone()
    }

    fn join(&mut self, ssid: &str, password: &str) -> io::Result<()> {
        let mut net = lock(&self.state);
        let ok = net
            .wifi
            .as_ref()
            .is_some_and(|(s, p)| s == ssid && p == password);
        if ok {
            net.joined = Some(ssid.to_string());
            Ok(())
        } else {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "bad credentials"))
        }
    }

    fn leave(&mut self) {
        lock(&self.state).joined = None;
    }

    fn status(&self) -> NetworkStatus {
        match &lock(&self.state).joined {
            Some(ssid) => NetworkStatus {
                link: LinkStatus::Up,
                ssid: ssid.clone(),
                mac: [0x02, 0x00, 0x00, 0x00, 0x00, 0x01],
                ip: [192, 168, 1, 50].into(),
                gateway: [192, 168, 1, 1].into(),
                netmask: [255, 255, 255, 0].into(),
            },
            None => NetworkStatus::down(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unreachable_host_refused() {
        let mut net = MemoryNetwork::new();
        assert!(net.connect("nowhere", 23).is_err());
        assert!(net.last_remote().is_none());
    }

    #[test]
    fn test_link_round_trip() {
        let mut net = MemoryNetwork::new();
        net.accept("bbs.example.com", 23);
        let mut link = net.connect("bbs.example.com", 23).unwrap();
        let remote = net.last_remote().unwrap();

        link.write_all(b"hi").unwrap();
        assert_eq!(remote.sent(), b"hi".to_vec());

        remote.push(b"yo");
        assert_eq!(link.available(), 2);
        let mut buf = [0u8; 4];
        assert_eq!(link.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"yo");

        remote.hang_up();
        assert!(!link.is_connected());
        drop(link);
        assert!(remote.is_closed_locally());
    }

    #[test]
    fn test_failed_handshake_drops_link() {
        let mut net = MemoryNetwork::new();
        net.accept("ssh.example.com", 22);
        let link = net.connect("ssh.example.com", 22).unwrap();
        assert!(net.secure(link, "root", "wrong").is_err());
        assert!(net.last_remote().unwrap().is_closed_locally());
    }
}
