//! Telnet IAC transparency for online data relay.
//!
//! Outbound data has every 0xFF doubled. Inbound data is run through
//! `TelnetDecoder`, a byte-at-a-time state machine that unescapes doubled
//! IACs and answers option negotiation: DO is always refused with WON'T and
//! WILL is always accepted with DO. Other three-byte commands are consumed
//! without a reply.

/// Interpret As Command.
pub const IAC: u8 = 0xFF;
/// Sender requests the receiver to disable an option.
pub const DONT: u8 = 0xFE;
/// Sender requests the receiver to enable an option.
pub const DO: u8 = 0xFD;
/// Sender refuses to enable an option.
pub const WONT: u8 = 0xFC;
/// Sender offers to enable an option.
pub const WILL: u8 = 0xFB;

/// Append `data` to `out`, doubling every IAC byte.
pub fn escape_iac(data: &[u8], out: &mut Vec<u8>) {
    out.reserve(data.len());
    for &byte in data {
        if byte == IAC {
            out.push(IAC);
        }
        out.push(byte);
    }
}

/// Output of feeding one byte to the decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelnetEvent {
    /// Byte for the terminal.
    Data(u8),
    /// Negotiation reply for the remote side.
    Reply([u8; 3]),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum State {
    #[default]
    Data,
    Iac,
    /// Holds the command byte, awaits the option byte.
    Command(u8),
}

/// Inbound telnet decoder.
#[derive(Debug, Default)]
pub struct TelnetDecoder {
    state: State,
}

impl TelnetDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget any partially received command.
    pub fn reset(&mut self) {
        self.state = State::Data;
    }

    /// Feed one byte received from the remote side.
    pub fn feed(&mut self, byte: u8) -> Option<TelnetEvent> {
        match self.state {
            State::Data if byte == IAC => {
                self.state = State::Iac;
                None
            }
            State::Data => Some(TelnetEvent::Data(byte)),
            State::Iac if byte == IAC => {
                self.state = State::Data;
                Some(TelnetEvent::Data(IAC))
            }
            State::Iac => {
                self.state = State::Command(byte);
                None
            }
            State::Command(verb) => {
                self.state = State::Data;
                match verb {
                    DO => Some(TelnetEvent::Reply([IAC, WONT, byte])),
                    WILL => Some(TelnetEvent::Reply([IAC, DO, byte])),
                    // DONT / WONT and anything else are consumed unanswered.
                    _ => None,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(input: &[u8]) -> (Vec<u8>, Vec<u8>) {
        let mut decoder = TelnetDecoder::new();
        let mut data = Vec::new();
        let mut replies = Vec::new();
        for &byte in input {
            match decoder.feed(byte) {
                Some(TelnetEvent::Data(b)) => data.push(b),
                Some(TelnetEvent::Reply(r)) => replies.extend_from_slice(&r),
                None => {}
            }
        }
        (data, replies)
    }

    #[test]
    fn test_escape_single_iac() {
        let mut out = Vec::new();
        escape_iac(&[0xFF], &mut out);
        assert_eq!(out, vec![0xFF, 0xFF]);
    }

    #[test]
    fn test_escape_preserves_order() {
        let mut out = Vec::new();
        escape_iac(&[b'a', 0xFF, b'b', 0xFF, 0xFF], &mut out);
        assert_eq!(out, vec![b'a', 0xFF, 0xFF, b'b', 0xFF, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn test_doubled_iac_is_literal() {
        let (data, replies) = decode(&[0xFF, 0xFF]);
        assert_eq!(data, vec![0xFF]);
        assert!(replies.is_empty());
    }

    #[test]
    fn test_do_is_refused() {
        let (data, replies) = decode(&[b'x', IAC, DO, 1, b'y']);
        assert_eq!(data, b"xy".to_vec());
        assert_eq!(replies, vec![IAC, WONT, 1]);
    }

    #[test]
    fn test_will_is_accepted() {
        let (_, replies) = decode(&[IAC, WILL, 3]);
        assert_eq!(replies, vec![IAC, DO, 3]);
    }

    #[test]
    fn test_dont_and_wont_are_consumed_silently() {
        let (data, replies) = decode(&[IAC, DONT, 1, IAC, WONT, 3, b'z']);
        assert_eq!(data, b"z".to_vec());
        assert!(replies.is_empty());
    }

    #[test]
    fn test_command_split_across_feeds() {
        let mut decoder = TelnetDecoder::new();
        assert_eq!(decoder.feed(IAC), None);
        assert_eq!(decoder.feed(DO), None);
        assert_eq!(decoder.feed(24), Some(TelnetEvent::Reply([IAC, WONT, 24])));
        assert_eq!(decoder.feed(b'a'), Some(TelnetEvent::Data(b'a')));
    }
}
