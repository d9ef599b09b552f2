//! AT command grammar.
//!
//! Matching is case-insensitive. Exact forms are tried before prefix forms,
//! so `ATHELP` and `ATHEX=1` win over the `ATH` hangup prefix and `ATVSO`
//! wins over the `ATVSn` mount prefix. Payloads (SSIDs, passwords, speed dial
//! locations, URLs) are taken from the line as typed, not upper-cased.

/// A boolean setting toggled with `<cmd>0` / `<cmd>1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Switch {
    /// `ATE`
    Echo,
    /// `ATV`
    Verbose,
    /// `ATQ`
    Quiet,
    /// `ATNET`
    Telnet,
    /// `ATHEX=`
    Hex,
}

/// A text setting set with `AT$<name>=` and read with `AT$<name>?`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Ssid,
    Password,
    SshUser,
    SshPassword,
}

/// A parsed command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `AT`
    At,
    /// `ATDT<host[:port]>`
    Dial(String),
    /// `ATDSSH<host[:port]>`
    DialSecure(String),
    /// `ATDS<n>`
    SpeedDial(usize),
    /// `ATH`, `ATH0`
    HangUp,
    /// `ATO`
    Online,
    /// `ATZ`
    Reset,
    /// `AT&F`
    FactoryDefaults,
    /// `AT&W`
    Save,
    /// `AT&V`
    ShowProfile,
    /// `AT&V?`
    ShowSaved,
    /// `AT&Zn=<location>`
    StoreSpeedDial(usize, String),
    /// `AT&Zn?`
    QuerySpeedDial(usize),
    /// `ATE1`, `ATV0`, `ATNET1`, `ATHEX=0`, ...
    Set(Switch, bool),
    /// `ATE?`, `ATV?`, `ATQ?`, `ATNET?`
    Query(Switch),
    /// `AT$SB=<rate>`
    SetBaud(u32),
    /// `AT$SB?`
    QueryBaud,
    /// `AT$SSID=`, `AT$PASS=`, `AT$SSHU=`, `AT$SSHP=`
    SetField(Field, String),
    /// `AT$SSID?`, `AT$PASS?`, `AT$SSHU?`, `AT$SSHP?`
    QueryField(Field),
    /// `ATC?`
    Scan,
    /// `ATC0`
    WifiOff,
    /// `ATC1`
    WifiOn,
    /// `ATI`
    Info,
    /// `ATVSn<url>`, drive 1 or 2
    Mount(usize, String),
    /// `ATVSO`
    DriveService,
    /// `ATGET<url>`
    HttpGet(String),
    /// `ATGPH<url>`
    Gopher(String),
    /// `AT?`, `ATHELP`
    Help,
}

const FIELDS: [(&str, Field); 4] = [
    ("AT$SSID", Field::Ssid),
    ("AT$PASS", Field::Password),
    ("AT$SSHU", Field::SshUser),
    ("AT$SSHP", Field::SshPassword),
];

const SWITCHES: [(&str, Switch); 4] = [
    ("ATE", Switch::Echo),
    ("ATV", Switch::Verbose),
    ("ATQ", Switch::Quiet),
    ("ATNET", Switch::Telnet),
];

impl Command {
    /// Parse a trimmed, non-empty command line. Returns None for anything
    /// that does not match the grammar.
    pub fn parse(line: &str) -> Option<Command> {
        let upper = line.to_ascii_uppercase();
        Self::parse_exact(&upper).or_else(|| Self::parse_prefix(line, &upper))
    }

    fn parse_exact(upper: &str) -> Option<Command> {
        let command = match upper {
            "AT" => Command::At,
            "ATO" => Command::Online,
            "ATZ" => Command::Reset,
            "AT&F" => Command::FactoryDefaults,
            "AT&W" => Command::Save,
            "AT&V" => Command::ShowProfile,
            "AT&V?" => Command::ShowSaved,
            "AT$SB?" => Command::QueryBaud,
            "ATC?" => Command::Scan,
            "ATC0" => Command::WifiOff,
            "ATC1" => Command::WifiOn,
            "ATI" => Command::Info,
            "ATVSO" => Command::DriveService,
            "AT?" | "ATHELP" => Command::Help,
            "ATHEX=0" => Command::Set(Switch::Hex, false),
            "ATHEX=1" => Command::Set(Switch::Hex, true),
            _ => {
                for (name, switch) in SWITCHES {
                    if let Some(arg) = upper.strip_prefix(name) {
                        match arg {
                            "0" => return Some(Command::Set(switch, false)),
                            "1" => return Some(Command::Set(switch, true)),
                            "?" => return Some(Command::Query(switch)),
                            _ => {}
                        }
                    }
                }
                for (name, field) in FIELDS {
                    if upper.strip_prefix(name) == Some("?") {
                        return Some(Command::QueryField(field));
                    }
                }
                return None;
            }
        };
        Some(command)
    }

    fn parse_prefix(line: &str, upper: &str) -> Option<Command> {
        // `upper` is the ASCII upper-casing of `line`, so byte offsets agree.
        let payload = |prefix: &str| line[prefix.len()..].to_string();

        if upper.starts_with("ATDSSH") {
            return Some(Command::DialSecure(payload("ATDSSH")));
        }
        if let Some(rest) = upper.strip_prefix("ATDS") {
            return single_digit(rest).map(Command::SpeedDial);
        }
        if upper.starts_with("ATDT") {
            return Some(Command::Dial(payload("ATDT")));
        }
        if let Some(rest) = upper.strip_prefix("ATH") {
            return rest.bytes().all(|b| b.is_ascii_digit()).then_some(Command::HangUp);
        }
        if let Some(rest) = upper.strip_prefix("AT&Z") {
            let slot = rest.get(..1).and_then(single_digit)?;
            return match &rest[1..] {
                "?" => Some(Command::QuerySpeedDial(slot)),
                arg if arg.starts_with('=') => {
                    Some(Command::StoreSpeedDial(slot, payload("AT&Zn=")))
                }
                _ => None,
            };
        }
        if let Some(rate) = upper.strip_prefix("AT$SB=") {
            return rate.trim().parse().ok().map(Command::SetBaud);
        }
        for (name, field) in FIELDS {
            if upper.starts_with(name) && upper[name.len()..].starts_with('=') {
                return Some(Command::SetField(field, line[name.len() + 1..].to_string()));
            }
        }
        if let Some(rest) = upper.strip_prefix("ATVS") {
            return match rest.as_bytes().first() {
                Some(b'1') => Some(Command::Mount(1, payload("ATVS1"))),
                Some(b'2') => Some(Command::Mount(2, payload("ATVS2"))),
                _ => None,
            };
        }
        if upper.starts_with("ATGET") {
            return Some(Command::HttpGet(payload("ATGET")));
        }
        if upper.starts_with("ATGPH") {
            return Some(Command::Gopher(payload("ATGPH")));
        }
        None
    }
}

/// Parse exactly one ASCII digit.
fn single_digit(s: &str) -> Option<usize> {
    match s.as_bytes() {
        [d] if d.is_ascii_digit() => Some((d - b'0') as usize),
        _ => None,
    }
}
