//! The session engine: command mode, online relay and the escape sequence.

use std::time::Duration;

use chrono::DateTime;
use log::{debug, info, warn};

use crate::clock::Clock;
use crate::command::{Command, Field, Switch};
use crate::dial::{CallManager, Target, UrlKind, UrlRequest};
use crate::drive::{protocol, DriveBay, RemoteFs};
use crate::net::Network;
use crate::result::ResultCode;
use crate::settings::{
    truncate_chars, Flash, RecordError, Settings, SettingsStore, MAX_FIELD_LEN, MAX_SSID_LEN,
};
use crate::telnet::{self, TelnetDecoder, TelnetEvent};
use crate::transport::Transport;
use crate::{baud_rate, Mode, BAUD_RATES, MAX_BAUD_INDEX};

/// Longest command line kept; further characters are dropped.
pub const MAX_COMMAND_LEN: usize = 256;

/// Silence required after `+++` before command mode is entered.
pub const ESCAPE_GUARD_MS: u64 = 1000;

/// How long the activity LED stays lit after the last byte.
pub const LED_MS: u64 = 15;

/// How long a settings save waits for the transport context to pause.
pub const QUIESCE_WAIT: Duration = Duration::from_millis(100);

/// Delay between announcing and applying a rate change.
pub const BAUD_SWITCH_DELAY: Duration = Duration::from_secs(5);

/// Host bytes relayed per poll. Halved with telnet on, since escaping can
/// double the data.
const TX_CHUNK: usize = 544;

/// Remote bytes relayed per poll.
const RX_CHUNK: usize = 2048;

const IDLE_SLEEP: Duration = Duration::from_millis(1);

const BANNER: [&str; 3] = [
    "WIFI MODEM EMULATOR",
    concat!("BUILD ", env!("CARGO_PKG_VERSION")),
    "HAYES COMPATIBLE AT COMMAND SET",
];

const HELP_PAGE_1: [&str; 14] = [
    "AT COMMAND SUMMARY:",
    "WIFI SCAN............: ATC?",
    "SET SSID.............: AT$SSID=WIFISSID",
    "SET WIFI PASSWORD....: AT$PASS=WIFIPASSWORD",
    "WIFI OFF/ON..........: ATC0 / ATC1",
    "NETWORK INFO.........: ATI",
    "DIAL HOST............: ATDTHOST:PORT",
    "SET SPEED DIAL.......: AT&ZN=HOST:PORT (N=0-9)",
    "SPEED DIAL...........: ATDSN (N=0-9)",
    "SET SSH USER NAME....: AT$SSHU=SSHUSERNAME",
    "SET SSH PASSWORD.....: AT$SSHP=SSHPASSWORD",
    "SSH DIAL.............: ATDSSHHOST:PORT",
    "HTTP GET.............: ATGET<URL>",
    "GOPHER REQUEST.......: ATGPH<URL>",
];

const HELP_PAGE_2: [&str; 19] = [
    "HANDLE TELNET........: ATNETN (N=0,1)",
    "MOUNT VSDRIVE........: ATVSNPATH (N=1-2)",
    "VSDRIVE ONLINE.......: ATVSO",
    "ECHO OFF/ON..........: ATE0 / ATE1",
    "HEX ECHO OFF/ON......: ATHEX=0 / ATHEX=1",
    "QUIET MODE OFF/ON....: ATQ0 / ATQ1",
    "VERBOSE OFF/ON.......: ATV0 / ATV1",
    "SET BAUD RATE........: AT$SB=N (3,12,24,48,96",
    "                        192,384,576,1152)*100",
    "HANGUP...............: ATH",
    "ENTER CMD MODE.......: +++",
    "EXIT CMD MODE........: ATO",
    "LOAD SETTINGS........: ATZ",
    "SAVE SETTINGS........: AT&W",
    "SHOW SAVED SETTINGS..: AT&V?",
    "SHOW PROFILE.........: AT&V",
    "FACT. DEFAULTS.......: AT&F",
    "QUERY MOST COMMANDS FOLLOWED BY '?'",
    "",
];

const SECRET: &str = "****** (It's a secret!)";

/// Everything the engine drives besides the host transport.
pub struct Peripherals {
    pub network: Box<dyn Network>,
    pub flash: Box<dyn Flash>,
    pub remote: Box<dyn RemoteFs>,
    pub clock: Box<dyn Clock>,
}

/// The modem: one session over one transport.
pub struct Modem<T: Transport> {
    transport: T,
    network: Box<dyn Network>,
    remote: Box<dyn RemoteFs>,
    clock: Box<dyn Clock>,
    store: SettingsStore<Box<dyn Flash>>,
    settings: Settings,
    mode: Mode,
    /// Command line being typed.
    line: String,
    calls: CallManager,
    drives: DriveBay,
    telnet: TelnetDecoder,
    plus_count: u8,
    plus_time: u64,
    led_on: bool,
    led_time: u64,
}

impl<T: Transport> Modem<T> {
    /// Create a modem with factory default settings. Call `boot` to load
    /// saved settings and greet the host.
    pub fn new(transport: T, peripherals: Peripherals) -> Self {
        Self {
            transport,
            network: peripherals.network,
            remote: peripherals.remote,
            clock: peripherals.clock,
            store: SettingsStore::new(peripherals.flash),
            settings: Settings::default(),
            mode: Mode::Command,
            line: String::new(),
            calls: CallManager::new(),
            drives: DriveBay::new(),
            telnet: TelnetDecoder::new(),
            plus_count: 0,
            plus_time: 0,
            led_on: false,
            led_time: 0,
        }
    }

    /// Load saved settings, apply the line rate and print the banner.
    pub fn boot(&mut self) {
        self.load_settings();
        self.transport.set_baud(self.baud());
        self.welcome();
    }

    /// Poll until the transport closes.
    pub fn run(&mut self) {
        while !self.transport.is_closed() {
            if !self.poll() {
                self.clock.sleep(IDLE_SLEEP);
            }
        }
        debug!("transport closed, session ends");
    }

    /// One pass of the engine loop. Returns true if any byte moved.
    pub fn poll(&mut self) -> bool {
        let busy = match self.mode {
            Mode::Command => match self.transport.try_read_byte() {
                Some(byte) => {
                    self.blink();
                    self.command_byte(byte);
                    true
                }
                None => false,
            },
            Mode::Online => self.relay(),
        };
        self.check_escape();
        self.check_carrier();
        self.update_led();
        busy
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn drives(&self) -> &DriveBay {
        &self.drives
    }

    pub fn store(&self) -> &SettingsStore<Box<dyn Flash>> {
        &self.store
    }

    pub fn is_connected(&self) -> bool {
        self.calls.is_connected()
    }

    fn baud(&self) -> u32 {
        baud_rate(self.settings.baud_index)
    }

    fn now(&self) -> u64 {
        self.clock.now_ms()
    }

    fn println(&mut self, line: &str) {
        self.transport.println(line);
    }

    /// Text framed by CR LF on both sides.
    fn send_string(&mut self, text: &str) {
        self.transport.write(format!("\r\n{}\r\n", text).as_bytes());
    }

    fn result(&mut self, code: ResultCode) {
        if self.settings.quiet {
            return;
        }
        if self.settings.verbose {
            self.send_string(&code.to_string());
        } else {
            self.send_string(&code.code().to_string());
        }
    }

    fn blink(&mut self) {
        self.led_time = self.now();
        if !self.led_on {
            self.led_on = true;
            self.transport.activity(true);
        }
    }

    fn update_led(&mut self) {
        if self.led_on && self.now().saturating_sub(self.led_time) >= LED_MS {
            self.led_on = false;
            self.transport.activity(false);
        }
    }

    // ---- command mode ----

    fn command_byte(&mut self, byte: u8) {
        match byte {
            b'\r' | b'\n' => self.dispatch(),
            8 | 20 | 127 => {
                self.line.pop();
                if self.settings.echo {
                    self.transport.write(&[byte]);
                }
            }
            32..=126 => {
                if self.line.len() < MAX_COMMAND_LEN {
                    self.line.push(byte as char);
                }
                if self.settings.echo {
                    self.transport.write(&[byte]);
                }
                if self.settings.hex {
                    self.transport.write(format!("{:X}", byte).as_bytes());
                }
            }
            _ => {}
        }
    }

    fn dispatch(&mut self) {
        let line = std::mem::take(&mut self.line);
        let line = line.trim();
        if line.is_empty() {
            return;
        }
        self.transport.write(b"\r\n");
        match Command::parse(line) {
            Some(command) => {
                debug!("command {:?}", command);
                self.execute(command);
            }
            None => {
                debug!("unrecognised command {:?}", line);
                self.result(ResultCode::Error);
            }
        }
    }

    fn execute(&mut self, command: Command) {
        match command {
            Command::At => self.result(ResultCode::Ok),
            Command::Dial(spec) => self.dial(&spec, false),
            Command::DialSecure(spec) => self.dial(&spec, true),
            Command::SpeedDial(slot) => {
                let entry = self.settings.speed_dials[slot].clone();
                self.dial(&entry, false);
            }
            Command::HangUp => self.hang_up(),
            Command::Online => {
                if self.calls.is_connected() {
                    self.go_online();
                } else {
                    self.result(ResultCode::Error);
                }
            }
            Command::Reset => {
                let previous = self.settings.baud_index;
                self.load_settings();
                self.result(ResultCode::Ok);
                self.apply_line_rate(previous);
            }
            Command::FactoryDefaults => {
                let previous = self.settings.baud_index;
                self.settings = Settings::default();
                self.result(ResultCode::Ok);
                self.apply_line_rate(previous);
            }
            Command::Save => match self.save_settings() {
                Ok(()) => self.result(ResultCode::Ok),
                Err(e) => {
                    warn!("settings save failed: {}", e);
                    self.result(ResultCode::Error);
                }
            },
            Command::ShowProfile => {
                self.show_profile();
                self.result(ResultCode::Ok);
            }
            Command::ShowSaved => {
                self.show_saved();
                self.result(ResultCode::Ok);
            }
            Command::StoreSpeedDial(slot, location) => {
                self.settings.set_speed_dial(slot, &location);
                self.println(&format!("STORED {}: {}", slot, location));
                self.result(ResultCode::Ok);
            }
            Command::QuerySpeedDial(slot) => {
                let entry = self.settings.speed_dials[slot].clone();
                self.send_string(&entry);
                self.result(ResultCode::Ok);
            }
            Command::Set(switch, on) => {
                *self.switch_mut(switch) = on;
                self.result(ResultCode::Ok);
            }
            Command::Query(switch) => {
                let on = *self.switch_mut(switch);
                self.send_string(if on { "1" } else { "0" });
                self.result(ResultCode::Ok);
            }
            Command::SetBaud(rate) => self.set_baud(rate),
            Command::QueryBaud => {
                self.send_string(&self.baud().to_string());
                self.result(ResultCode::Ok);
            }
            Command::SetField(field, value) => {
                self.set_field(field, &value);
                self.result(ResultCode::Ok);
            }
            Command::QueryField(field) => {
                let text = match field {
                    Field::Ssid => self.settings.ssid.clone(),
                    Field::SshUser => self.settings.ssh_user.clone(),
                    Field::Password | Field::SshPassword => SECRET.to_string(),
                };
                self.send_string(&text);
                self.result(ResultCode::Ok);
            }
            Command::Scan => {
                self.scan();
                self.result(ResultCode::Ok);
            }
            Command::WifiOff => {
                self.network.leave();
                info!("left wifi network");
                self.result(ResultCode::Ok);
            }
            Command::WifiOn => {
                let code = if self.join_wifi() {
                    ResultCode::Ok
                } else {
                    ResultCode::Error
                };
                self.result(code);
            }
            Command::Info => {
                self.show_status();
                self.result(ResultCode::Ok);
            }
            Command::Mount(drive, url) => self.mount(drive, &url),
            Command::DriveService => self.drive_service(),
            Command::HttpGet(url) => self.dial_url(&url, UrlKind::Http),
            Command::Gopher(url) => self.dial_url(&url, UrlKind::Gopher),
            Command::Help => {
                self.help();
                self.result(ResultCode::Ok);
            }
        }
    }

    fn switch_mut(&mut self, switch: Switch) -> &mut bool {
        match switch {
            Switch::Echo => &mut self.settings.echo,
            Switch::Verbose => &mut self.settings.verbose,
            Switch::Quiet => &mut self.settings.quiet,
            Switch::Telnet => &mut self.settings.telnet,
            Switch::Hex => &mut self.settings.hex,
        }
    }

    fn set_field(&mut self, field: Field, value: &str) {
        let (slot, max) = match field {
            Field::Ssid => (&mut self.settings.ssid, MAX_SSID_LEN),
            Field::Password => (&mut self.settings.password, MAX_FIELD_LEN),
            Field::SshUser => (&mut self.settings.ssh_user, MAX_FIELD_LEN),
            Field::SshPassword => (&mut self.settings.ssh_password, MAX_FIELD_LEN),
        };
        *slot = truncate_chars(value, max).to_string();
    }

    fn set_baud(&mut self, rate: u32) {
        let Some(index) = BAUD_RATES.iter().position(|&r| r == rate) else {
            self.result(ResultCode::Error);
            return;
        };
        if index as u8 != self.settings.baud_index {
            self.println(&format!("SWITCHING SERIAL PORT TO {} IN 5 SECONDS", rate));
            self.clock.sleep(BAUD_SWITCH_DELAY);
            self.transport.set_baud(rate);
            self.settings.baud_index = index as u8;
            info!("line rate now {}", rate);
        }
        self.result(ResultCode::Ok);
    }

    /// Move the line to the configured rate if it differs from `previous`.
    fn apply_line_rate(&mut self, previous: u8) {
        if self.settings.baud_index != previous {
            let rate = self.baud();
            self.transport.set_baud(rate);
            info!("line rate now {}", rate);
        }
    }

    // ---- calls ----

    fn go_online(&mut self) {
        let baud = self.baud();
        self.result(ResultCode::Connect(baud));
        self.mode = Mode::Online;
        self.plus_count = 0;
        self.telnet.reset();
    }

    fn dial(&mut self, spec: &str, secure: bool) {
        if self.calls.is_connected() {
            self.result(ResultCode::Error);
            return;
        }
        let Some(target) = Target::parse(spec, secure) else {
            self.result(ResultCode::Error);
            return;
        };

        self.println(&format!("DIALING {}:{}", target.host, target.port));
        let now = self.now();
        let credentials = (
            self.settings.ssh_user.as_str(),
            self.settings.ssh_password.as_str(),
        );
        match self
            .calls
            .dial(self.network.as_mut(), &target, credentials, now)
        {
            Ok(()) => self.go_online(),
            Err(e) => {
                warn!("dial failed: {}", e);
                self.result(ResultCode::NoAnswer);
            }
        }
    }

    fn dial_url(&mut self, url: &str, kind: UrlKind) {
        if self.calls.is_connected() {
            self.result(ResultCode::Error);
            return;
        }
        let Some(request) = UrlRequest::parse(url, kind) else {
            self.result(ResultCode::Error);
            return;
        };

        let target = Target {
            host: request.host.clone(),
            port: request.port,
            secure: false,
        };
        let now = self.now();
        if let Err(e) = self.calls.dial(self.network.as_mut(), &target, ("", ""), now) {
            warn!("{:?} request failed: {}", kind, e);
            let duration = self.calls.duration(now);
            self.result(ResultCode::NoCarrier(duration));
            return;
        }

        self.go_online();
        if let Some(connection) = self.calls.connection() {
            if let Err(e) = connection.link().write_all(request.greeting().as_bytes()) {
                warn!("could not send request: {}", e);
            }
        }
    }

    fn hang_up(&mut self) {
        let now = self.now();
        let duration = self.calls.hangup(now);
        self.mode = Mode::Command;
        self.plus_count = 0;
        self.result(ResultCode::NoCarrier(duration));
    }

    // ---- online mode ----

    /// Move bytes both ways between the host and the connection.
    fn relay(&mut self) -> bool {
        let mut busy = false;

        let pending = self.transport.available();
        if pending > 0 {
            busy = true;
            self.blink();
            let limit = if self.settings.telnet {
                TX_CHUNK / 2
            } else {
                TX_CHUNK
            };
            let mut chunk = Vec::with_capacity(pending.min(limit));
            while chunk.len() < pending.min(limit) {
                match self.transport.try_read_byte() {
                    Some(byte) => chunk.push(byte),
                    None => break,
                }
            }
            self.scan_escape(&chunk);

            let outbound = if self.settings.telnet {
                let mut escaped = Vec::with_capacity(chunk.len() * 2);
                telnet::escape_iac(&chunk, &mut escaped);
                escaped
            } else {
                chunk
            };
            if let Some(connection) = self.calls.connection() {
                if let Err(e) = connection.link().write_all(&outbound) {
                    debug!("send to remote failed: {}", e);
                }
            }
        }

        let Some(connection) = self.calls.connection() else {
            return busy;
        };
        let link = connection.link();
        let mut inbound = Vec::new();
        let mut buf = [0u8; 512];
        while inbound.len() < RX_CHUNK {
            match link.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => inbound.extend_from_slice(&buf[..n]),
                Err(e) => {
                    debug!("receive from remote failed: {}", e);
                    break;
                }
            }
        }
        if inbound.is_empty() {
            return busy;
        }

        self.blink();
        if !self.settings.telnet {
            self.transport.write(&inbound);
            return true;
        }

        let mut terminal = Vec::with_capacity(inbound.len());
        let mut replies = Vec::new();
        for byte in inbound {
            match self.telnet.feed(byte) {
                Some(TelnetEvent::Data(b)) => terminal.push(b),
                Some(TelnetEvent::Reply(reply)) => replies.extend_from_slice(&reply),
                None => {}
            }
        }
        self.transport.write(&terminal);
        if !replies.is_empty() {
            if let Some(connection) = self.calls.connection() {
                if let Err(e) = connection.link().write_all(&replies) {
                    debug!("telnet reply failed: {}", e);
                }
            }
        }
        true
    }

    /// Track runs of `+` in host data. The bytes are still relayed.
    fn scan_escape(&mut self, bytes: &[u8]) {
        let now = self.now();
        for &byte in bytes {
            if byte == b'+' {
                self.plus_count = self.plus_count.saturating_add(1);
                if self.plus_count >= 3 {
                    self.plus_time = now;
                }
            } else {
                self.plus_count = 0;
            }
        }
    }

    fn check_escape(&mut self) {
        if self.plus_count >= 3 && self.now().saturating_sub(self.plus_time) >= ESCAPE_GUARD_MS {
            debug!("escape sequence, entering command mode");
            self.mode = Mode::Command;
            self.plus_count = 0;
            self.result(ResultCode::Ok);
        }
    }

    fn check_carrier(&mut self) {
        if self.mode != Mode::Online {
            return;
        }
        let alive = match self.calls.connection() {
            Some(connection) => connection.link().is_connected(),
            None => false,
        };
        if !alive {
            info!("remote closed the connection");
            self.hang_up();
        }
    }

    // ---- settings ----

    fn load_settings(&mut self) {
        match self.store.load() {
            Ok(settings) => {
                info!("loaded saved settings");
                self.settings = settings;
            }
            Err(e) => debug!("keeping current settings: {}", e),
        }
    }

    fn save_settings(&mut self) -> crate::ModemResult<()> {
        if !self.transport.quiesce(QUIESCE_WAIT) {
            warn!("transport did not pause within {:?}, saving anyway", QUIESCE_WAIT);
        }
        let result = self.store.save(&self.settings);
        self.transport.resume();
        result
    }

    fn show_profile(&mut self) {
        let s = self.settings.clone();
        self.println("ACTIVE PROFILE:");
        self.println(&format!("BAUD: {}", self.baud()));
        self.println(&format!("SSID: {}", s.ssid));
        self.println(&format!("PASS: {}", mask(&s.password)));
        self.println(&format!("SSH USER: {}", s.ssh_user));
        self.println(&format!("SSH PASS: {}", mask(&s.ssh_password)));
        self.println(&format!(
            "E{} Q{} V{} NET{}",
            s.echo as u8, s.quiet as u8, s.verbose as u8, s.telnet as u8
        ));
        self.println("SPEED DIAL:");
        for (i, dial) in s.speed_dials.iter().enumerate() {
            self.println(&format!("{}: {}", i, dial));
        }
        self.println("");
    }

    fn show_saved(&mut self) {
        let s = match self.store.load() {
            Ok(s) => s,
            Err(e @ RecordError::VersionMismatch { .. }) => {
                self.println(&e.to_string());
                return;
            }
            Err(_) => {
                self.println(&RecordError::BadMagic.to_string());
                return;
            }
        };
        self.println(&format!("SSID = {}", s.ssid));
        self.println(&format!("PASSWORD = {}", mask(&s.password)));
        self.println(&format!("SSH USER = {}", s.ssh_user));
        self.println(&format!("SSH PASS = {}", mask(&s.ssh_password)));
        self.println(&format!(
            "BAUD = {} ({})",
            baud_rate(s.baud_index),
            s.baud_index
        ));
        self.println(&format!("ECHO = {}", s.echo as u8));
        self.println(&format!("HEX = {}", s.hex as u8));
        self.println(&format!("TELNET = {}", s.telnet as u8));
        self.println(&format!("VERBOSE = {}", s.verbose as u8));
        self.println(&format!("QUIET MODE = {}", s.quiet as u8));
        for (i, dial) in s.speed_dials.iter().enumerate() {
            self.println(&format!("Speed Dial {} = {}", i, dial));
        }
    }

    // ---- network ----

    fn scan(&mut self) {
        self.println("SCANNING FOR WIFI NETWORKS...");
        for ap in self.network.scan() {
            self.println(&format!("{} {:X} {}", ap.ssid, ap.auth_mode, ap.rssi));
        }
    }

    fn join_wifi(&mut self) -> bool {
        if self.settings.ssid.is_empty() || self.settings.password.is_empty() {
            self.println("CONFIGURE SSID AND PASSWORD. TYPE AT? FOR HELP.");
            return false;
        }
        let ssid = self.settings.ssid.clone();
        self.println(&format!("CONNECTING TO SSID {}", ssid));
        match self.network.join(&ssid, &self.settings.password) {
            Ok(()) => {
                info!("joined {}", ssid);
                true
            }
            Err(e) => {
                warn!("could not join {}: {}", ssid, e);
                self.println(&format!("COULD NOT CONNECT TO {}", ssid));
                false
            }
        }
    }

    fn show_status(&mut self) {
        let status = self.network.status();
        self.println(&format!("WIFI STATUS: {}", status.link));
        self.println(&format!("SSID.......: {}", status.ssid));
        self.println(&format!("MAC ADDRESS: {}", status.mac_string()));
        self.println(&format!("IP ADDRESS.: {}", status.ip));
        self.println(&format!("GATEWAY....: {}", status.gateway));
        self.println(&format!("SUBNET MASK: {}", status.netmask));
        let call = if self.calls.is_connected() {
            format!("CALL LENGTH: {}", self.calls.duration(self.now()))
        } else {
            "NOT CONNECTED".to_string()
        };
        self.println(&format!("CALL STATUS: {}", call));
        let stamp = DateTime::from_timestamp(self.clock.epoch_secs(), 0).unwrap_or_default();
        self.println(&format!("DATE & TIME: {}", stamp.format("%Y-%m-%dT%H:%M:%SZ")));
    }

    // ---- virtual drives ----

    fn mount(&mut self, drive: usize, url: &str) {
        match self.drives.mount(self.remote.as_mut(), drive - 1, url.trim()) {
            Ok(()) => self.result(ResultCode::Ok),
            Err(e) => {
                warn!("{}", e);
                self.result(ResultCode::Error);
            }
        }
    }

    /// Serve drive blocks at the top line rate until the host ends the
    /// session, then restore the configured rate.
    fn drive_service(&mut self) {
        let restore = self.baud();
        info!("drive service started");
        self.transport.set_baud(baud_rate(MAX_BAUD_INDEX));
        let exit = protocol::serve(&mut self.transport, &mut self.drives, self.clock.as_ref());
        self.transport.set_baud(restore);
        info!("drive service ended: {:?}", exit);
    }

    // ---- text screens ----

    fn welcome(&mut self) {
        self.println("");
        for line in BANNER {
            self.println(line);
        }
        self.println("");
    }

    fn help(&mut self) {
        self.welcome();
        for line in HELP_PAGE_1 {
            self.println(line);
        }
        self.wait_for_space();
        for line in HELP_PAGE_2 {
            self.println(line);
        }
    }

    fn wait_for_space(&mut self) {
        self.transport.write(b"PRESS SPACE");
        while let Some(byte) = self.transport.read_byte() {
            if byte == b' ' {
                break;
            }
        }
        self.transport.write(b"\r");
    }
}

/// Stand-in for a stored secret: asterisks if set, else nothing.
fn mask(secret: &str) -> &'static str {
    if secret.is_empty() {
        ""
    } else {
        "********"
    }
}
