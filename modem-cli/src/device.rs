//! Host byte devices standing in for the legacy machine's serial line.

use std::io::{self, Read, Write};
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use log::debug;
use modem_core::SerialDevice;

/// Ctrl+] leaves the emulator.
const EXIT_KEY: u8 = 0x1D;

/// Translate crossterm key events to the bytes a terminal would send.
fn translate_key(code: KeyCode, modifiers: KeyModifiers) -> Option<u8> {
    if modifiers.contains(KeyModifiers::CONTROL) {
        if let KeyCode::Char(c) = code {
            let upper = c.to_ascii_uppercase();
            if ('@'..='_').contains(&upper) {
                return Some(upper as u8 - 64); // Ctrl+A=1, Ctrl+]=29
            }
        }
    }

    match code {
        KeyCode::Char(c) if c.is_ascii() => Some(c as u8),
        KeyCode::Enter => Some(13),
        KeyCode::Backspace => Some(8),
        KeyCode::Tab => Some(9),
        KeyCode::Esc => Some(27),
        _ => None,
    }
}

/// The local terminal, read through crossterm in raw mode.
pub struct TerminalDevice;

impl SerialDevice for TerminalDevice {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut n = 0;
        while n < buf.len() && event::poll(Duration::from_millis(0))? {
            let Event::Key(KeyEvent {
                code,
                modifiers,
                kind,
                ..
            }) = event::read()?
            else {
                continue;
            };
            if kind == KeyEventKind::Release {
                continue;
            }
            match translate_key(code, modifiers) {
                Some(EXIT_KEY) => {
                    return Err(io::Error::new(
                        io::ErrorKind::ConnectionAborted,
                        "terminal closed",
                    ))
                }
                Some(byte) => {
                    buf[n] = byte;
                    n += 1;
                }
                None => {}
            }
        }
        Ok(n)
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        stdout.write_all(buf)?;
        stdout.flush()
    }

    fn set_baud(&mut self, baud: u32) -> io::Result<()> {
        debug!("terminal ignores line rate {}", baud);
        Ok(())
    }
}

/// A real serial port.
pub struct SerialPortDevice {
    port: Box<dyn serialport::SerialPort>,
}

impl SerialPortDevice {
    pub fn open(name: &str, baud: u32) -> Result<Self, serialport::Error> {
        let port = serialport::new(name, baud)
            .timeout(Duration::from_millis(10))
            .open()?;
        Ok(Self { port })
    }
}

impl SerialDevice for SerialPortDevice {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.port.read(buf)
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.port.write_all(buf)?;
        self.port.flush()
    }

    fn set_baud(&mut self, baud: u32) -> io::Result<()> {
        debug!("serial port now at {} baud", baud);
        self.port.set_baud_rate(baud).map_err(io::Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translate_printable_and_control() {
        assert_eq!(translate_key(KeyCode::Char('a'), KeyModifiers::NONE), Some(b'a'));
        assert_eq!(translate_key(KeyCode::Char('+'), KeyModifiers::SHIFT), Some(b'+'));
        assert_eq!(translate_key(KeyCode::Enter, KeyModifiers::NONE), Some(13));
        assert_eq!(translate_key(KeyCode::Char('c'), KeyModifiers::CONTROL), Some(3));
        assert_eq!(translate_key(KeyCode::Char(']'), KeyModifiers::CONTROL), Some(EXIT_KEY));
    }

    #[test]
    fn test_translate_ignores_non_ascii() {
        assert_eq!(translate_key(KeyCode::Char('é'), KeyModifiers::NONE), None);
        assert_eq!(translate_key(KeyCode::F(1), KeyModifiers::NONE), None);
    }
}
