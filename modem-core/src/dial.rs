//! Outbound call setup and teardown.
//!
//! `CallManager` owns at most one `Connection`. Dial strings are parsed into
//! a `Target` (plain `host[:port]`, secure, or a speed dial entry) and URL
//! helpers into a `UrlRequest` carrying the greeting to send once connected.

use log::{info, warn};

use crate::error::{ModemError, ModemResult};
use crate::net::{Link, Network};

/// Default port for plain dials.
pub const TELNET_PORT: u16 = 23;
/// Default port for secure dials.
pub const SSH_PORT: u16 = 22;
pub const HTTP_PORT: u16 = 80;
pub const GOPHER_PORT: u16 = 70;

/// Where to dial.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub host: String,
    pub port: u16,
    pub secure: bool,
}

impl Target {
    /// Parse `host[:port]`. Returns None for an empty host or a bad port.
    pub fn parse(spec: &str, secure: bool) -> Option<Self> {
        let default_port = if secure { SSH_PORT } else { TELNET_PORT };
        let (host, port) = match spec.split_once(':') {
            Some((host, port)) => (host.trim(), port.trim().parse().ok()?),
            None => (spec.trim(), default_port),
        };
        if host.is_empty() {
            return None;
        }
        Some(Self {
            host: host.to_string(),
            port,
            secure,
        })
    }
}

/// Protocol spoken by a URL dial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlKind {
    Http,
    Gopher,
}

/// A URL dial: connect, then send a request line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlRequest {
    pub kind: UrlKind,
    pub host: String,
    pub port: u16,
    pub path: String,
}

impl UrlRequest {
    /// Parse `[scheme://]host[:port][/path]`.
    pub fn parse(url: &str, kind: UrlKind) -> Option<Self> {
        let (scheme, default_port) = match kind {
            UrlKind::Http => ("http://", HTTP_PORT),
            UrlKind::Gopher => ("gopher://", GOPHER_PORT),
        };
        let url = url.trim();
        let rest = match url.get(..scheme.len()) {
            Some(prefix) if prefix.eq_ignore_ascii_case(scheme) => &url[scheme.len()..],
            _ => url,
        };
        let (authority, path) = match rest.find('/') {
            Some(idx) => (&rest[..idx], &rest[idx..]),
            None => (rest, "/"),
        };
        let (host, port) = match authority.split_once(':') {
            Some((host, port)) => (host, port.parse().ok()?),
            None => (authority, default_port),
        };
        if host.is_empty() {
            return None;
        }
        Some(Self {
            kind,
            host: host.to_string(),
            port,
            path: path.to_string(),
        })
    }

    /// Bytes sent to the server right after connecting.
    pub fn greeting(&self) -> String {
        match self.kind {
            UrlKind::Http => format!(
                "GET {} HTTP/1.1\r\nHost: {}\r\nConnection: close\r\n\r\n",
                self.path, self.host
            ),
            UrlKind::Gopher => format!("{}\r\n", self.path),
        }
    }
}

/// The active call.
pub struct Connection {
    pub host: String,
    pub port: u16,
    pub secure: bool,
    link: Box<dyn Link>,
}

impl Connection {
    pub fn link(&mut self) -> &mut dyn Link {
        self.link.as_mut()
    }
}

/// Tracks the single active connection and its call timer.
#[derive(Default)]
pub struct CallManager {
    connection: Option<Connection>,
    connect_started: Option<u64>,
}

impl CallManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    pub fn connection(&mut self) -> Option<&mut Connection> {
        self.connection.as_mut()
    }

    /// Open a connection to `target`, running the secure handshake with
    /// `credentials` when the target asks for it. Nothing is left open on
    /// failure.
    pub fn dial(
        &mut self,
        network: &mut dyn Network,
        target: &Target,
        credentials: (&str, &str),
        now_ms: u64,
    ) -> ModemResult<()> {
        if let Some(active) = &self.connection {
            return Err(ModemError::AlreadyConnected(format!(
                "{}:{}",
                active.host, active.port
            )));
        }

        let link = network
            .connect(&target.host, target.port)
            .map_err(|source| ModemError::Unreachable {
                host: target.host.clone(),
                port: target.port,
                source,
            })?;

        let mut link = if target.secure {
            let (user, password) = credentials;
            network
                .secure(link, user, password)
                .map_err(|source| ModemError::Handshake {
                    host: target.host.clone(),
                    port: target.port,
                    source,
                })?
        } else {
            link
        };

        if let Err(e) = link.set_nodelay(true) {
            warn!("could not disable send coalescing: {}", e);
        }

        info!(
            "connected to {}:{}{}",
            target.host,
            target.port,
            if target.secure { " (secure)" } else { "" }
        );
        self.connection = Some(Connection {
            host: target.host.clone(),
            port: target.port,
            secure: target.secure,
            link,
        });
        self.connect_started = Some(now_ms);
        Ok(())
    }

    /// Close the active connection, if any, and return the call duration.
    pub fn hangup(&mut self, now_ms: u64) -> String {
        let duration = self.duration(now_ms);
        if let Some(mut connection) = self.connection.take() {
            connection.link.close();
            info!(
                "hung up {}:{} after {}",
                connection.host, connection.port, duration
            );
        }
        self.connect_started = None;
        duration
    }

    /// Elapsed call time as `HH:MM:SS`, or `NOT CONNECTED`.
    pub fn duration(&self, now_ms: u64) -> String {
        match self.connect_started {
            Some(start) => format_duration(now_ms.saturating_sub(start) / 1000),
            None => "NOT CONNECTED".to_string(),
        }
    }
}

/// Format whole seconds as `HH:MM:SS`.
pub fn format_duration(secs: u64) -> String {
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}
