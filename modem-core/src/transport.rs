//! Transport interface between the session engine and the legacy host.
//!
//! The `Transport` trait is the session side of a duplex byte queue. Two
//! implementations are provided: `HeadlessTransport` for testing, and
//! `QueueTransport`, which talks through bounded queues to a
//! `TransportContext` running the physical device on another thread.

use std::collections::VecDeque;
use std::io;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, SyncSender, TryRecvError, TrySendError};
use std::time::Duration;

use log::{debug, warn};

/// Session-side byte queue to the legacy host.
pub trait Transport: Send {
    /// Write bytes to the host. May block until queue space is available.
    fn write(&mut self, bytes: &[u8]);

    /// Read one byte, blocking until one arrives. Returns None once the
    /// transport context has gone away.
    fn read_byte(&mut self) -> Option<u8>;

    /// Read one byte if one is already queued.
    fn try_read_byte(&mut self) -> Option<u8>;

    /// Number of bytes that can be read without blocking.
    fn available(&mut self) -> usize;

    /// True once no more input can ever arrive.
    fn is_closed(&self) -> bool;

    /// Ask the transport context to change the line rate.
    fn set_baud(&mut self, _baud: u32) {}

    /// Ask the transport context to stop touching shared hardware and wait up
    /// to `wait` for it to acknowledge. Returns false if the wait elapsed.
    fn quiesce(&mut self, _wait: Duration) -> bool {
        true
    }

    /// Restart a quiesced transport context.
    fn resume(&mut self) {}

    /// Drive the activity indicator.
    fn activity(&mut self, _on: bool) {}

    /// Write a string followed by CR LF.
    fn println(&mut self, line: &str) {
        self.write(line.as_bytes());
        self.write(b"\r\n");
    }
}

/// Headless transport for testing - captures output, provides queued input.
///
/// Reports itself closed once the queued input is exhausted, so `Modem::run`
/// returns after consuming everything a test queued.
#[derive(Default)]
pub struct HeadlessTransport {
    output: Vec<u8>,
    input: VecDeque<u8>,
    bauds: Vec<u32>,
    quiesces: usize,
    resumes: usize,
    /// Report quiesce requests as timed out.
    quiesce_timeout: bool,
    led: bool,
}

impl HeadlessTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with pre-queued input.
    pub fn with_input(input: &[u8]) -> Self {
        Self {
            input: input.iter().copied().collect(),
            ..Self::default()
        }
    }

    /// Queue input bytes.
    pub fn queue_input(&mut self, input: &[u8]) {
        self.input.extend(input.iter().copied());
    }

    /// Queue a string as input.
    pub fn queue_str(&mut self, s: &str) {
        self.queue_input(s.as_bytes());
    }

    /// Get all output as bytes.
    pub fn output(&self) -> &[u8] {
        &self.output
    }

    /// Get output as string (lossy UTF-8 conversion).
    pub fn output_string(&self) -> String {
        String::from_utf8_lossy(&self.output).into_owned()
    }

    /// Return the output so far and clear it.
    pub fn take_output(&mut self) -> String {
        let text = self.output_string();
        self.output.clear();
        text
    }

    /// Clear output buffer.
    pub fn clear_output(&mut self) {
        self.output.clear();
    }

    /// Line rates requested so far, oldest first.
    pub fn baud_changes(&self) -> &[u32] {
        &self.bauds
    }

    /// Number of quiesce requests and resumes seen.
    pub fn quiesce_counts(&self) -> (usize, usize) {
        (self.quiesces, self.resumes)
    }

    /// Make later quiesce requests time out instead of being acknowledged.
    pub fn set_quiesce_timeout(&mut self, timeout: bool) {
        self.quiesce_timeout = timeout;
    }

    pub fn led(&self) -> bool {
        self.led
    }
}

impl Transport for HeadlessTransport {
    fn write(&mut self, bytes: &[u8]) {
        self.output.extend_from_slice(bytes);
    }

    fn read_byte(&mut self) -> Option<u8> {
        self.input.pop_front()
    }

    fn try_read_byte(&mut self) -> Option<u8> {
        self.input.pop_front()
    }

    fn available(&mut self) -> usize {
        self.input.len()
    }

    fn is_closed(&self) -> bool {
        self.input.is_empty()
    }

    fn set_baud(&mut self, baud: u32) {
        self.bauds.push(baud);
    }

    fn quiesce(&mut self, _wait: Duration) -> bool {
        self.quiesces += 1;
        !self.quiesce_timeout
    }

    fn resume(&mut self) {
        self.resumes += 1;
    }

    fn activity(&mut self, on: bool) {
        self.led = on;
    }
}

/// Physical byte device serviced by a `TransportContext` (UART, bus engine,
/// terminal, ...).
pub trait SerialDevice: Send {
    /// Read whatever is available. `Ok(0)`, `WouldBlock` and `TimedOut` all
    /// mean "nothing yet"; any other error ends the transport context.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()>;

    fn set_baud(&mut self, baud: u32) -> io::Result<()>;
}

impl<D: SerialDevice + ?Sized> SerialDevice for Box<D> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (**self).read(buf)
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        (**self).write_all(buf)
    }

    fn set_baud(&mut self, baud: u32) -> io::Result<()> {
        (**self).set_baud(baud)
    }
}

/// Control messages from the session context to the transport context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    SetBaud(u32),
    Pause,
    Resume,
}

/// Acknowledgements from the transport context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ack {
    Paused,
}

/// Default depth of each byte queue.
pub const QUEUE_DEPTH: usize = 2048;

const IDLE_BACKOFF: Duration = Duration::from_millis(1);

/// Create a connected `QueueTransport` / `TransportContext` pair.
pub fn channel<D: SerialDevice>(device: D, depth: usize) -> (QueueTransport, TransportContext<D>) {
    let (rx_tx, rx_rx) = mpsc::sync_channel(depth);
    let (tx_tx, tx_rx) = mpsc::sync_channel(depth);
    let (control_tx, control_rx) = mpsc::channel();
    let (ack_tx, ack_rx) = mpsc::channel();

    let transport = QueueTransport {
        rx: rx_rx,
        tx: tx_tx,
        control: control_tx,
        acks: ack_rx,
        pending: VecDeque::new(),
        closed: false,
    };
    let context = TransportContext {
        device,
        to_session: rx_tx,
        from_session: tx_rx,
        control: control_rx,
        acks: ack_tx,
        backlog: VecDeque::new(),
    };
    (transport, context)
}

/// Session-side end of the queues to a `TransportContext`.
pub struct QueueTransport {
    rx: Receiver<u8>,
    tx: SyncSender<u8>,
    control: Sender<Control>,
    acks: Receiver<Ack>,
    pending: VecDeque<u8>,
    closed: bool,
}

impl QueueTransport {
    fn drain(&mut self) {
        loop {
            match self.rx.try_recv() {
                Ok(byte) => self.pending.push_back(byte),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.closed = true;
                    break;
                }
            }
        }
    }
}

impl Transport for QueueTransport {
    fn write(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            if self.tx.send(byte).is_err() {
                self.closed = true;
                return;
            }
        }
    }

    fn read_byte(&mut self) -> Option<u8> {
        if let Some(byte) = self.pending.pop_front() {
            return Some(byte);
        }
        match self.rx.recv() {
            Ok(byte) => Some(byte),
            Err(_) => {
                self.closed = true;
                None
            }
        }
    }

    fn try_read_byte(&mut self) -> Option<u8> {
        if self.pending.is_empty() {
            self.drain();
        }
        self.pending.pop_front()
    }

    fn available(&mut self) -> usize {
        self.drain();
        self.pending.len()
    }

    fn is_closed(&self) -> bool {
        self.closed && self.pending.is_empty()
    }

    fn set_baud(&mut self, baud: u32) {
        let _ = self.control.send(Control::SetBaud(baud));
    }

    fn quiesce(&mut self, wait: Duration) -> bool {
        while self.acks.try_recv().is_ok() {}
        if self.control.send(Control::Pause).is_err() {
            return false;
        }
        match self.acks.recv_timeout(wait) {
            Ok(Ack::Paused) => true,
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => false,
        }
    }

    fn resume(&mut self) {
        let _ = self.control.send(Control::Resume);
    }
}

/// The transport execution context: moves bytes between a physical device
/// and the session queues, and obeys `Control` messages.
pub struct TransportContext<D: SerialDevice> {
    device: D,
    to_session: SyncSender<u8>,
    from_session: Receiver<u8>,
    control: Receiver<Control>,
    acks: Sender<Ack>,
    /// Device bytes waiting for room in the session queue.
    backlog: VecDeque<u8>,
}

impl<D: SerialDevice> TransportContext<D> {
    /// Service the device until the session side goes away or the device
    /// fails.
    pub fn run(mut self) -> io::Result<()> {
        let mut buf = [0u8; 256];
        loop {
            if !self.service_control()? {
                return Ok(());
            }

            let mut idle = true;

            if !self.flush_backlog() {
                return Ok(());
            }
            if self.backlog.is_empty() {
                match self.device.read(&mut buf) {
                    Ok(0) => {}
                    Ok(n) => {
                        idle = false;
                        self.backlog.extend(&buf[..n]);
                        if !self.flush_backlog() {
                            return Ok(());
                        }
                    }
                    Err(e)
                        if matches!(
                            e.kind(),
                            io::ErrorKind::WouldBlock
                                | io::ErrorKind::TimedOut
                                | io::ErrorKind::Interrupted
                        ) => {}
                    Err(e) => {
                        debug!("transport device closed: {}", e);
                        return Err(e);
                    }
                }
            }

            let (wrote, session_gone) = self.flush_session()?;
            if wrote {
                idle = false;
            }
            if session_gone {
                return Ok(());
            }

            if idle {
                std::thread::sleep(IDLE_BACKOFF);
            }
        }
    }

    /// Write everything the session has queued to the device. Returns
    /// whether anything was written and whether the session side is gone.
    fn flush_session(&mut self) -> io::Result<(bool, bool)> {
        let mut out = Vec::new();
        let mut session_gone = false;
        loop {
            match self.from_session.try_recv() {
                Ok(byte) => out.push(byte),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    session_gone = true;
                    break;
                }
            }
        }
        if !out.is_empty() {
            self.device.write_all(&out)?;
        }
        Ok((!out.is_empty(), session_gone))
    }

    /// Push backlog bytes into the session queue until it is full.
    /// Returns false when the session side has gone away.
    fn flush_backlog(&mut self) -> bool {
        while let Some(&byte) = self.backlog.front() {
            match self.to_session.try_send(byte) {
                Ok(()) => {
                    self.backlog.pop_front();
                }
                Err(TrySendError::Full(_)) => break,
                Err(TrySendError::Disconnected(_)) => return false,
            }
        }
        true
    }

    /// Apply pending control messages. Returns false when the session side
    /// went away while the context was paused.
    fn service_control(&mut self) -> io::Result<bool> {
        loop {
            match self.control.try_recv() {
                Ok(Control::SetBaud(baud)) => {
                    // Output queued before the change goes out at the old rate.
                    self.flush_session()?;
                    self.device.set_baud(baud)?;
                }
                Ok(Control::Pause) => {
                    if !self.pause()? {
                        return Ok(false);
                    }
                }
                Ok(Control::Resume) => {}
                // Exit is driven by the data queues so queued output still drains.
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => return Ok(true),
            }
        }
    }

    /// Acknowledge a pause and leave the device alone until resumed.
    fn pause(&mut self) -> io::Result<bool> {
        if self.acks.send(Ack::Paused).is_err() {
            return Ok(false);
        }
        debug!("transport context paused");
        let mut deferred_baud = None;
        loop {
            match self.control.recv() {
                Ok(Control::Resume) => break,
                Ok(Control::Pause) => {
                    let _ = self.acks.send(Ack::Paused);
                }
                Ok(Control::SetBaud(baud)) => deferred_baud = Some(baud),
                Err(_) => return Ok(false),
            }
        }
        if let Some(baud) = deferred_baud {
            self.device.set_baud(baud)?;
        }
        debug!("transport context resumed");
        Ok(true)
    }
}

impl<D: SerialDevice> Drop for TransportContext<D> {
    fn drop(&mut self) {
        if !self.backlog.is_empty() {
            warn!("dropping {} undelivered host bytes", self.backlog.len());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_headless_transport_output() {
        let mut transport = HeadlessTransport::new();
        transport.write(b"H");
        transport.println("i");
        assert_eq!(transport.output_string(), "Hi\r\n");
        assert_eq!(transport.take_output(), "Hi\r\n");
        assert!(transport.output().is_empty());
    }

    #[test]
    fn test_headless_transport_input() {
        let mut transport = HeadlessTransport::with_input(b"AB");
        assert_eq!(transport.available(), 2);
        assert!(!transport.is_closed());
        assert_eq!(transport.try_read_byte(), Some(b'A'));
        assert_eq!(transport.read_byte(), Some(b'B'));
        assert!(transport.is_closed());
        assert_eq!(transport.read_byte(), None);
    }

    /// Device fed from a fixed script, recording writes and rate changes.
    struct ScriptDevice {
        input: VecDeque<u8>,
        written: Arc<Mutex<Vec<u8>>>,
        bauds: Arc<Mutex<Vec<u32>>>,
    }

    impl SerialDevice for ScriptDevice {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = buf.len().min(self.input.len());
            for slot in buf.iter_mut().take(n) {
                *slot = self.input.pop_front().unwrap();
            }
            Ok(n)
        }

        fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
            self.written.lock().unwrap().extend_from_slice(buf);
            Ok(())
        }

        fn set_baud(&mut self, baud: u32) -> io::Result<()> {
            self.bauds.lock().unwrap().push(baud);
            Ok(())
        }
    }

    #[test]
    fn test_queue_transport_round_trip() {
        let written = Arc::new(Mutex::new(Vec::new()));
        let bauds = Arc::new(Mutex::new(Vec::new()));
        let device = ScriptDevice {
            input: b"AT\r".iter().copied().collect(),
            written: written.clone(),
            bauds: bauds.clone(),
        };
        let (mut transport, context) = channel(device, 16);
        let worker = std::thread::spawn(move || context.run());

        assert_eq!(transport.read_byte(), Some(b'A'));
        assert_eq!(transport.read_byte(), Some(b'T'));
        assert_eq!(transport.read_byte(), Some(b'\r'));

        transport.set_baud(115200);
        assert!(transport.quiesce(Duration::from_secs(5)));
        transport.resume();
        transport.println("OK");

        drop(transport);
        worker.join().unwrap().unwrap();

        assert_eq!(written.lock().unwrap().as_slice(), b"OK\r\n");
        assert_eq!(bauds.lock().unwrap().as_slice(), &[115200]);
    }

    #[derive(Debug, PartialEq)]
    enum DeviceEvent {
        Wrote(Vec<u8>),
        Baud(u32),
    }

    /// Device that logs writes and rate changes in the order they happen.
    struct RecordingDevice {
        events: Arc<Mutex<Vec<DeviceEvent>>>,
    }

    impl SerialDevice for RecordingDevice {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Ok(0)
        }

        fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
            self.events.lock().unwrap().push(DeviceEvent::Wrote(buf.to_vec()));
            Ok(())
        }

        fn set_baud(&mut self, baud: u32) -> io::Result<()> {
            self.events.lock().unwrap().push(DeviceEvent::Baud(baud));
            Ok(())
        }
    }

    #[test]
    fn test_output_queued_before_rate_change_goes_first() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let device = RecordingDevice {
            events: events.clone(),
        };
        let (mut transport, context) = channel(device, 16);
        transport.write(b"\r\n");
        transport.set_baud(115200);
        drop(transport);
        context.run().unwrap();

        assert_eq!(
            events.lock().unwrap().as_slice(),
            &[DeviceEvent::Wrote(b"\r\n".to_vec()), DeviceEvent::Baud(115200)]
        );
    }

    #[test]
    fn test_quiesce_times_out_without_context() {
        let device = ScriptDevice {
            input: VecDeque::new(),
            written: Arc::new(Mutex::new(Vec::new())),
            bauds: Arc::new(Mutex::new(Vec::new())),
        };
        let (mut transport, context) = channel(device, 4);
        // Context never runs, so no acknowledgement arrives.
        assert!(!transport.quiesce(Duration::from_millis(10)));
        drop(context);
        assert_eq!(transport.read_byte(), None);
        assert!(transport.is_closed());
    }
}
