//! Serial link to the LED controller
//!
//! A dedicated writer thread owns the port. Callers queue frames and return
//! at once; the thread delivers them in order, opening the port lazily and
//! dropping it on the first write error so the next frame performs exactly
//! one reconnect attempt. Construction queues the forced "all off" ahead of
//! anything else.

use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::time::Duration;

use serialport::SerialPort;

use super::Frame;
use crate::{Error, Result};

/// Default baud rate of the controller firmware
pub const DEFAULT_BAUD: u32 = 115_200;

/// Default write timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(100);

/// Writable connection handed out by a [`PortOpener`]
pub type Connection = Box<dyn Write + Send>;

/// Opens connections to the controller
///
/// Abstracted so tests can record frames without hardware.
pub trait PortOpener: Send + Sync {
    /// Open a fresh connection
    ///
    /// # Errors
    ///
    /// Returns error if the device cannot be opened
    fn open(&self) -> Result<Connection>;

    /// Human-readable target for logs
    fn describe(&self) -> String;
}

/// [`PortOpener`] backed by a real serial device
#[derive(Debug, Clone)]
pub struct SerialPortOpener {
    path: String,
    baud: u32,
    timeout: Duration,
    settle: Duration,
}

impl SerialPortOpener {
    #[must_use]
    pub fn new(path: impl Into<String>, baud: u32) -> Self {
        Self {
            path: path.into(),
            baud,
            timeout: DEFAULT_TIMEOUT,
            settle: Duration::ZERO,
        }
    }

    /// Set the per-write timeout
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Wait this long after opening (boards that reset on DTR need it)
    #[must_use]
    pub const fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    fn open_path(&self, path: &str) -> Result<Box<dyn SerialPort>> {
        Ok(serialport::new(path, self.baud).timeout(self.timeout).open()?)
    }
}

impl PortOpener for SerialPortOpener {
    fn open(&self) -> Result<Connection> {
        let mut port = match self.open_path(&self.path) {
            Ok(port) => port,
            Err(primary) => {
                let Some(callout) = callout_variant(&self.path) else {
                    return Err(primary);
                };
                tracing::debug!(path = %self.path, callout = %callout, "trying callout device");
                self.open_path(&callout).map_err(|_| primary)?
            }
        };

        if let Err(e) = port.write_data_terminal_ready(true) {
            tracing::warn!(port = %self.path, error = %e, "failed to raise DTR");
        }
        if !self.settle.is_zero() {
            std::thread::sleep(self.settle);
        }

        tracing::info!(port = %self.path, baud = self.baud, "serial port opened");
        Ok(Box::new(port))
    }

    fn describe(&self) -> String {
        format!("{}@{}", self.path, self.baud)
    }
}

/// macOS exposes each USB modem as both `tty.*` and `cu.*`
fn callout_variant(path: &str) -> Option<String> {
    path.strip_prefix("/dev/tty.")
        .map(|rest| format!("/dev/cu.{rest}"))
}

/// How the channel forces the strip dark at construction
#[derive(Debug, Clone, Copy)]
pub struct ChannelSettings {
    /// Number of "all off" frames sent
    pub off_repeats: u32,
    /// Pause between them
    pub off_spacing: Duration,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            off_repeats: 3,
            off_spacing: Duration::from_millis(100),
        }
    }
}

enum Job {
    Write(Vec<u8>),
    ForceOff(ChannelSettings),
    Connect(mpsc::Sender<Result<()>>),
    Disconnect,
    Flush(mpsc::Sender<()>),
}

/// The single owner of the hardware connection
///
/// Dropping the channel lets the writer finish the queued frames and exit.
pub struct SerialChannel {
    target: String,
    jobs: mpsc::Sender<Job>,
    connected: Arc<AtomicBool>,
}

impl std::fmt::Debug for SerialChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialChannel")
            .field("target", &self.target)
            .field("connected", &self.is_connected())
            .finish()
    }
}

impl SerialChannel {
    /// Start the writer thread and queue the forced "all off"
    ///
    /// The connection used for the forced reset is released afterwards;
    /// failures are logged and leave the channel disconnected.
    ///
    /// # Errors
    ///
    /// Returns error if the writer thread cannot be spawned
    pub fn new(opener: impl PortOpener + 'static, settings: ChannelSettings) -> Result<Self> {
        let target = opener.describe();
        let connected = Arc::new(AtomicBool::new(false));
        let (jobs, rx) = mpsc::channel();

        let writer = Writer {
            opener: Box::new(opener),
            conn: None,
            connected: Arc::clone(&connected),
        };
        std::thread::Builder::new()
            .name("serial-writer".into())
            .spawn(move || writer.run(&rx))?;

        let channel = Self {
            target,
            jobs,
            connected,
        };
        channel.enqueue(Job::ForceOff(settings))?;
        Ok(channel)
    }

    fn enqueue(&self, job: Job) -> Result<()> {
        self.jobs
            .send(job)
            .map_err(|_| Error::Serial(format!("serial writer for {} stopped", self.target)))
    }

    /// Open the connection if there is none, waiting for the outcome
    ///
    /// Blocks the calling thread until the writer has tried.
    ///
    /// # Errors
    ///
    /// Returns error if the device cannot be opened
    pub fn ensure_connected(&self) -> Result<()> {
        let (tx, rx) = mpsc::channel();
        self.enqueue(Job::Connect(tx))?;
        rx.recv()
            .map_err(|_| Error::Serial(format!("serial writer for {} stopped", self.target)))?
    }

    /// Queue one frame
    ///
    /// Delivery failures are logged by the writer; a failed write leaves
    /// the channel disconnected.
    ///
    /// # Errors
    ///
    /// Returns error if the writer thread is gone
    pub fn send(&self, frame: &Frame) -> Result<()> {
        self.send_raw(frame.encode().as_bytes())
    }

    /// Queue pre-encoded bytes
    ///
    /// # Errors
    ///
    /// Same as [`SerialChannel::send`]
    pub fn send_raw(&self, bytes: &[u8]) -> Result<()> {
        self.enqueue(Job::Write(bytes.to_vec()))
    }

    /// Wait until everything queued so far has been handled
    ///
    /// Blocks the calling thread; returns `false` on timeout.
    #[must_use]
    pub fn flush(&self, timeout: Duration) -> bool {
        let (tx, rx) = mpsc::channel();
        if self.enqueue(Job::Flush(tx)).is_err() {
            return false;
        }
        rx.recv_timeout(timeout).is_ok()
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Release the connection once the queued frames are out
    pub fn disconnect(&self) {
        if let Err(e) = self.enqueue(Job::Disconnect) {
            tracing::debug!(error = %e, "disconnect after writer exit");
        }
    }
}

struct Writer {
    opener: Box<dyn PortOpener>,
    conn: Option<Connection>,
    connected: Arc<AtomicBool>,
}

impl Writer {
    fn run(mut self, jobs: &mpsc::Receiver<Job>) {
        tracing::debug!(target_port = %self.opener.describe(), "serial writer started");
        while let Ok(job) = jobs.recv() {
            match job {
                Job::Write(bytes) => {
                    if let Err(e) = self.write(&bytes) {
                        tracing::warn!(error = %e, "light frame not delivered");
                    }
                }
                Job::ForceOff(settings) => self.force_off(settings),
                Job::Connect(reply) => {
                    if reply.send(self.connect()).is_err() {
                        tracing::debug!("connect requester went away");
                    }
                }
                Job::Disconnect => self.drop_connection(),
                Job::Flush(reply) => {
                    if reply.send(()).is_err() {
                        tracing::debug!("flush requester timed out");
                    }
                }
            }
        }
        self.drop_connection();
        tracing::debug!("serial writer stopped");
    }

    fn connect(&mut self) -> Result<()> {
        if self.conn.is_none() {
            self.conn = Some(self.opener.open()?);
            self.connected.store(true, Ordering::SeqCst);
        }
        Ok(())
    }

    fn drop_connection(&mut self) {
        self.conn = None;
        self.connected.store(false, Ordering::SeqCst);
    }

    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        self.connect()?;
        let Some(conn) = self.conn.as_mut() else {
            return Ok(());
        };

        let written = conn.write_all(bytes).and_then(|()| conn.flush());
        if let Err(e) = written {
            self.drop_connection();
            tracing::warn!(error = %e, "serial write failed, connection dropped");
            return Err(e.into());
        }
        Ok(())
    }

    fn force_off(&mut self, settings: ChannelSettings) {
        let off = Frame::OFF.encode();
        for i in 0..settings.off_repeats {
            if let Err(e) = self.write(off.as_bytes()) {
                tracing::warn!(
                    target_port = %self.opener.describe(),
                    error = %e,
                    "could not force lights off"
                );
                break;
            }
            if i + 1 < settings.off_repeats && !settings.off_spacing.is_zero() {
                std::thread::sleep(settings.off_spacing);
            }
        }
        self.drop_connection();
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use super::*;
    use crate::light::Rgb;

    #[derive(Clone, Default)]
    struct FakeDevice {
        writes: Arc<parking_lot::Mutex<Vec<String>>>,
        opens: Arc<AtomicUsize>,
        fail_writes: Arc<AtomicBool>,
        refuse_open: Arc<AtomicBool>,
        open_delay: Arc<parking_lot::Mutex<Option<Duration>>>,
    }

    struct FakePort(FakeDevice);

    impl Write for FakePort {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.0.fail_writes.load(Ordering::SeqCst) {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "unplugged"));
            }
            self.0.writes.lock().push(String::from_utf8_lossy(buf).into_owned());
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl PortOpener for FakeDevice {
        fn open(&self) -> Result<Connection> {
            if self.refuse_open.load(Ordering::SeqCst) {
                return Err(crate::Error::Serial("no such device".into()));
            }
            if let Some(delay) = *self.open_delay.lock() {
                std::thread::sleep(delay);
            }
            self.opens.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(FakePort(self.clone())))
        }

        fn describe(&self) -> String {
            "fake".into()
        }
    }

    fn quick() -> ChannelSettings {
        ChannelSettings {
            off_repeats: 3,
            off_spacing: Duration::ZERO,
        }
    }

    const WAIT: Duration = Duration::from_secs(2);

    #[test]
    fn test_construction_forces_off_three_times_and_releases() {
        let device = FakeDevice::default();
        let channel = SerialChannel::new(device.clone(), quick()).unwrap();
        assert!(channel.flush(WAIT));

        assert_eq!(*device.writes.lock(), vec!["0,0,0\n"; 3]);
        assert!(!channel.is_connected());
    }

    #[test]
    fn test_lazy_connect_on_first_send() {
        let device = FakeDevice::default();
        let channel = SerialChannel::new(device.clone(), quick()).unwrap();
        assert!(channel.flush(WAIT));
        assert_eq!(device.opens.load(Ordering::SeqCst), 1);

        channel.send(&Frame::Solid(Rgb::new(1, 2, 3))).unwrap();
        assert!(channel.flush(WAIT));
        assert!(channel.is_connected());
        assert_eq!(device.opens.load(Ordering::SeqCst), 2);

        channel.send(&Frame::OFF).unwrap();
        assert!(channel.flush(WAIT));
        assert_eq!(device.opens.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_write_failure_drops_then_reconnects_once() {
        let device = FakeDevice::default();
        let channel = SerialChannel::new(device.clone(), quick()).unwrap();
        channel.ensure_connected().unwrap();

        device.fail_writes.store(true, Ordering::SeqCst);
        channel.send(&Frame::OFF).unwrap();
        assert!(channel.flush(WAIT));
        assert!(!channel.is_connected());

        device.fail_writes.store(false, Ordering::SeqCst);
        channel.send(&Frame::OFF).unwrap();
        assert!(channel.flush(WAIT));
        assert!(channel.is_connected());
        assert_eq!(device.opens.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_missing_device_is_not_fatal() {
        let device = FakeDevice::default();
        device.refuse_open.store(true, Ordering::SeqCst);
        let channel = SerialChannel::new(device.clone(), quick()).unwrap();

        channel.send(&Frame::OFF).unwrap();
        assert!(channel.flush(WAIT));
        assert!(channel.ensure_connected().is_err());
        assert!(!channel.is_connected());
        assert!(device.writes.lock().is_empty());
    }

    #[test]
    fn test_slow_reconnect_does_not_block_callers() {
        let device = FakeDevice::default();
        let channel = SerialChannel::new(device.clone(), quick()).unwrap();
        assert!(channel.flush(WAIT));
        *device.open_delay.lock() = Some(Duration::from_millis(400));

        let started = std::time::Instant::now();
        channel.send(&Frame::Solid(Rgb::new(9, 9, 9))).unwrap();
        channel.send(&Frame::OFF).unwrap();
        assert!(started.elapsed() < Duration::from_millis(100));

        assert!(channel.flush(WAIT));
        assert_eq!(device.writes.lock()[3..], ["9,9,9\n", "0,0,0\n"]);
    }

    #[test]
    fn test_callout_variant() {
        assert_eq!(
            callout_variant("/dev/tty.usbmodem1").as_deref(),
            Some("/dev/cu.usbmodem1")
        );
        assert_eq!(callout_variant("/dev/ttyUSB0"), None);
    }
}
