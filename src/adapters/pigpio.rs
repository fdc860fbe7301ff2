//! pigpio daemon adapter.
//!
//! Drives the fan through `pigpiod`'s socket interface, so the controller
//! needs no root access or kernel bindings of its own.
//!
//! ## Wire format
//!
//! Every command is a 16-byte little-endian frame `cmd, p1, p2, p3` and
//! every answer echoes it with the result (an `i32`, negative on error)
//! in the last word. `p3` is the length of an optional extension, always
//! 0 here.
//!
//! Edge callbacks use a second connection: `NOIB` turns that socket into
//! a notification stream, `NB` (sent on the command socket) selects the
//! GPIOs to watch, and the daemon then streams 12-byte reports
//! `seqno: u16, flags: u16, tick: u32, level: u32` where `level` holds
//! all GPIO levels after the change. Closing the notification socket
//! releases the handle on the daemon side.

use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use log::{debug, info, warn};

use crate::app::ports::{ActuatorPort, CallbackHandle, Edge, EdgeHandler};
use crate::error::ActuatorError;

// ── Command codes ─────────────────────────────────────────────

const CMD_MODES: u32 = 0;
const CMD_PUD: u32 = 2;
const CMD_PWM: u32 = 5;
const CMD_PRS: u32 = 6;
const CMD_PFS: u32 = 7;
const CMD_NB: u32 = 19;
const CMD_NOIB: u32 = 99;

const MODE_INPUT: u32 = 0;
const MODE_OUTPUT: u32 = 1;
const PUD_UP: u32 = 2;

// Report flags marking keep-alive / watchdog / event reports, not level changes.
const NTFY_FLAGS_WDOG: u16 = 1 << 5;
const NTFY_FLAGS_ALIVE: u16 = 1 << 6;
const NTFY_FLAGS_EVENT: u16 = 1 << 7;

const FRAME_LEN: usize = 16;
const REPORT_LEN: usize = 12;

// ── Frame codec ───────────────────────────────────────────────

/// Encode a command frame with no extension.
pub fn encode_command(cmd: u32, p1: u32, p2: u32) -> [u8; FRAME_LEN] {
    let mut frame = [0u8; FRAME_LEN];
    frame[0..4].copy_from_slice(&cmd.to_le_bytes());
    frame[4..8].copy_from_slice(&p1.to_le_bytes());
    frame[8..12].copy_from_slice(&p2.to_le_bytes());
    frame
}

/// Extract the result word from a response frame.
pub fn decode_result(frame: &[u8; FRAME_LEN]) -> i32 {
    i32::from_le_bytes([frame[12], frame[13], frame[14], frame[15]])
}

/// One notification report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Report {
    pub seqno: u16,
    pub flags: u16,
    pub tick: u32,
    pub level: u32,
}

impl Report {
    pub fn decode(bytes: &[u8; REPORT_LEN]) -> Self {
        Self {
            seqno: u16::from_le_bytes([bytes[0], bytes[1]]),
            flags: u16::from_le_bytes([bytes[2], bytes[3]]),
            tick: u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
            level: u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]),
        }
    }

    /// True for reports that carry a level change.
    pub fn is_level_change(&self) -> bool {
        self.flags & (NTFY_FLAGS_WDOG | NTFY_FLAGS_ALIVE | NTFY_FLAGS_EVENT) == 0
    }

    pub fn gpio_level(&self, gpio: u32) -> bool {
        (self.level >> gpio) & 1 == 1
    }
}

/// Turns a stream of levels into edge events.
#[derive(Debug, Clone, Copy)]
pub struct EdgeDetector {
    edge: Edge,
    last: Option<bool>,
}

impl EdgeDetector {
    pub fn new(edge: Edge) -> Self {
        Self { edge, last: None }
    }

    /// Feed the latest level; returns true if it completes a matching edge.
    /// The first level only establishes the baseline.
    pub fn feed(&mut self, level: bool) -> bool {
        let previous = self.last.replace(level);
        match previous {
            None => false,
            Some(prev) if prev == level => false,
            Some(_) => match self.edge {
                Edge::Rising => level,
                Edge::Falling => !level,
                Edge::Either => true,
            },
        }
    }
}

// ── Client ────────────────────────────────────────────────────

/// Connection to a running `pigpiod`.
pub struct PigpioActuator {
    addr: String,
    stream: Option<TcpStream>,
}

impl PigpioActuator {
    /// Connect to the daemon. Failure here is the fatal startup error.
    pub fn connect(host: &str, port: u16) -> Result<Self, ActuatorError> {
        let addr = format!("{host}:{port}");
        let stream = TcpStream::connect(&addr).map_err(|e| {
            warn!("pigpio: cannot reach daemon at {addr}: {e}");
            ActuatorError::ConnectFailed
        })?;
        stream.set_nodelay(true)?;
        info!("pigpio: connected to {addr}");
        Ok(Self {
            addr,
            stream: Some(stream),
        })
    }

    /// Put the PWM pin in output mode with `range` duty steps and the tach
    /// pin in input mode with its pull-up enabled.
    pub fn configure_fan(
        &mut self,
        pwm_gpio: u32,
        range: u32,
        tach_gpio: u32,
    ) -> Result<(), ActuatorError> {
        self.command(CMD_MODES, pwm_gpio, MODE_OUTPUT)?;
        self.command(CMD_PRS, pwm_gpio, range)?;
        self.command(CMD_MODES, tach_gpio, MODE_INPUT)?;
        self.command(CMD_PUD, tach_gpio, PUD_UP)?;
        Ok(())
    }

    fn command(&mut self, cmd: u32, p1: u32, p2: u32) -> Result<u32, ActuatorError> {
        let stream = self.stream.as_mut().ok_or(ActuatorError::Stopped)?;
        exchange(stream, cmd, p1, p2)
    }
}

/// Send one command frame and wait for its answer.
fn exchange(stream: &mut TcpStream, cmd: u32, p1: u32, p2: u32) -> Result<u32, ActuatorError> {
    stream.write_all(&encode_command(cmd, p1, p2))?;
    let mut reply = [0u8; FRAME_LEN];
    stream.read_exact(&mut reply)?;
    let res = decode_result(&reply);
    if res < 0 {
        return Err(ActuatorError::Rejected { cmd, code: res });
    }
    Ok(res as u32)
}

impl ActuatorPort for PigpioActuator {
    type Callback = PigpioCallback;

    fn set_pwm_frequency(&mut self, pin: u32, hz: u32) -> Result<(), ActuatorError> {
        // The daemon picks the closest supported frequency and returns it.
        let actual = self.command(CMD_PFS, pin, hz)?;
        debug!("pigpio: PWM frequency on {pin} requested {hz} Hz, got {actual} Hz");
        Ok(())
    }

    fn set_duty_cycle(&mut self, pin: u32, duty: u32) -> Result<(), ActuatorError> {
        self.command(CMD_PWM, pin, duty).map(|_| ())
    }

    fn register_edge_callback(
        &mut self,
        pin: u32,
        edge: Edge,
        handler: EdgeHandler,
    ) -> Result<PigpioCallback, ActuatorError> {
        let mut notify = TcpStream::connect(&self.addr).map_err(|_| ActuatorError::ConnectFailed)?;
        let handle = exchange(&mut notify, CMD_NOIB, 0, 0)?;
        self.command(CMD_NB, handle, 1 << pin)?;
        info!("pigpio: notification handle {handle} watching GPIO {pin} ({edge:?})");

        let reader = notify.try_clone()?;
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);
        let thread = thread::Builder::new()
            .name("tach-notify".into())
            .spawn(move || notify_loop(reader, pin, edge, handler, &flag))
            .map_err(ActuatorError::from)?;

        Ok(PigpioCallback {
            stream: notify,
            cancelled,
            thread: Some(thread),
        })
    }

    fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            stream.shutdown(Shutdown::Both).ok();
            info!("pigpio: disconnected from {}", self.addr);
        }
    }
}

fn notify_loop(
    mut stream: TcpStream,
    pin: u32,
    edge: Edge,
    mut handler: EdgeHandler,
    cancelled: &AtomicBool,
) {
    let mut detector = EdgeDetector::new(edge);
    let mut buf = [0u8; REPORT_LEN];
    loop {
        if let Err(e) = stream.read_exact(&mut buf) {
            if !cancelled.load(Ordering::Acquire) {
                warn!("pigpio: notification stream closed: {e}");
            }
            return;
        }
        let report = Report::decode(&buf);
        if report.is_level_change() && detector.feed(report.gpio_level(pin)) {
            handler();
        }
    }
}

/// Live notification subscription. Cancelling closes the stream, which
/// also frees the handle inside the daemon.
pub struct PigpioCallback {
    stream: TcpStream,
    cancelled: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl CallbackHandle for PigpioCallback {
    fn cancel(&mut self) {
        self.cancelled.store(true, Ordering::Release);
        self.stream.shutdown(Shutdown::Both).ok();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("pigpio: notification thread panicked");
            }
        }
    }
}

impl Drop for PigpioCallback {
    fn drop(&mut self) {
        self.cancel();
    }
}
