//! Hayes result codes.

use std::fmt;

/// Result reported to the host after a command or a call event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultCode {
    Ok,
    /// Carries the current line rate.
    Connect(u32),
    Ring,
    /// Carries the call duration (`HH:MM:SS` or `NOT CONNECTED`).
    NoCarrier(String),
    Error,
    NoDialtone,
    Busy,
    NoAnswer,
}

impl ResultCode {
    /// Numeric form used when verbose results are off.
    pub fn code(&self) -> u8 {
        match self {
            ResultCode::Ok => 0,
            ResultCode::Connect(_) => 1,
            ResultCode::Ring => 2,
            ResultCode::NoCarrier(_) => 3,
            ResultCode::Error => 4,
            ResultCode::NoDialtone => 6,
            ResultCode::Busy => 7,
            ResultCode::NoAnswer => 8,
        }
    }
}

/// Verbose text form.
impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultCode::Ok => write!(f, "OK"),
            ResultCode::Connect(baud) => write!(f, "CONNECT {}", baud),
            ResultCode::Ring => write!(f, "RING"),
            ResultCode::NoCarrier(duration) => write!(f, "NO CARRIER ({})", duration),
            ResultCode::Error => write!(f, "ERROR"),
            ResultCode::NoDialtone => write!(f, "NO DIALTONE"),
            ResultCode::Busy => write!(f, "BUSY"),
            ResultCode::NoAnswer => write!(f, "NO ANSWER"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_codes() {
        assert_eq!(ResultCode::Ok.code(), 0);
        assert_eq!(ResultCode::Connect(300).code(), 1);
        assert_eq!(ResultCode::NoCarrier(String::new()).code(), 3);
        assert_eq!(ResultCode::Error.code(), 4);
        assert_eq!(ResultCode::NoDialtone.code(), 6);
        assert_eq!(ResultCode::NoAnswer.code(), 8);
    }

    #[test]
    fn test_verbose_text() {
        assert_eq!(ResultCode::Connect(19200).to_string(), "CONNECT 19200");
        assert_eq!(
            ResultCode::NoCarrier("00:01:05".into()).to_string(),
            "NO CARRIER (00:01:05)"
        );
        assert_eq!(ResultCode::Busy.to_string(), "BUSY");
    }
}
