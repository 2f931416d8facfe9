//! Scripted transport and fixtures shared by the integration tests

// Not every test file uses every helper
#![allow(dead_code)]

use pedalog_lib::constants::{FRAME_V1_LEN, PID, VID};
use pedalog_lib::observer::{ResponseOutcome, SessionObserver, Sleeper};
use pedalog_lib::{Command, DeviceIdentity, TransportError};
use pedalog_lib::transport::Transport;
use std::sync::Mutex;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Route library logs to the test harness; `RUST_LOG` picks the level.
pub fn init_tracing() {
    // Several tests per binary call this; only the first install wins
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Field text of the reference frame, by offset
pub const FRAME_FIELDS: [(usize, &str); 7] = [
    (1, "12.5"),
    (5, "1.200"),
    (10, "015.0"),
    (15, "0001.25"),
    (22, "120.5"),
    (27, "080.2"),
    (32, "00000360"),
];

pub fn build_frame(fields: &[(usize, &str)]) -> Vec<u8> {
    let mut frame = vec![b' '; FRAME_V1_LEN];
    frame[0] = u8::from(Command::ReadTelemetry);
    for (offset, text) in fields {
        frame[*offset..*offset + text.len()].copy_from_slice(text.as_bytes());
    }
    frame
}

pub fn reference_frame() -> Vec<u8> {
    build_frame(&FRAME_FIELDS)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimFailure {
    Busy,
    OutOfMemory,
    Other,
}

/// Behaviour of one simulated Pedalog.
#[derive(Debug, Clone)]
pub struct MockDevice {
    /// Reply to the serial query; `None` times out like old firmware
    pub serial_reply: Option<Vec<u8>>,
    /// Reply to the telemetry command; `None` times out
    pub telemetry_reply: Option<Vec<u8>>,
    pub fail_open: bool,
    pub fail_configure: bool,
    pub claim_failure: Option<ClaimFailure>,
    pub short_write: bool,
    /// Unplug the device while its telemetry read is in flight
    pub unplug_on_read: bool,
}

impl MockDevice {
    pub fn with_serial(serial: u32) -> Self {
        Self {
            serial_reply: Some(format!("\x01{:04}", serial).into_bytes()),
            ..Self::anonymous()
        }
    }

    pub fn anonymous() -> Self {
        Self {
            serial_reply: None,
            telemetry_reply: Some(reference_frame()),
            fail_open: false,
            fail_configure: false,
            claim_failure: None,
            short_write: false,
            unplug_on_read: false,
        }
    }

    pub fn telemetry(mut self, reply: Option<Vec<u8>>) -> Self {
        self.telemetry_reply = reply;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockHandle {
    pub port: u32,
}

#[derive(Debug)]
pub struct MockSession {
    port: u32,
    claimed: bool,
    last_command: Option<u8>,
}

struct Attached {
    port: u32,
    device: MockDevice,
    /// Scans left before a scheduled unplug takes effect
    scans_left: Option<u32>,
}

#[derive(Default)]
struct MockState {
    attached: Vec<Attached>,
    listing: Vec<u32>,
    next_port: u32,
    scans: usize,
    opened: usize,
    closed: usize,
    claimed: usize,
    released: usize,
    commands: Vec<u8>,
}

impl MockState {
    fn device(&self, port: u32) -> Result<&MockDevice, TransportError> {
        self.attached
            .iter()
            .find(|a| a.port == port)
            .map(|a| &a.device)
            .ok_or_else(|| TransportError::Other(format!("no device on port {}", port)))
    }
}

#[derive(Default)]
pub struct MockTransport {
    state: Mutex<MockState>,
}

impl MockTransport {
    pub fn new() -> Self {
        init_tracing();
        Self::default()
    }

    /// Attach a device and return its port.
    pub fn plug(&self, device: MockDevice) -> u32 {
        let mut state = self.state.lock().unwrap();
        let port = state.next_port;
        state.next_port += 1;
        state.attached.push(Attached {
            port,
            device,
            scans_left: None,
        });
        port
    }

    pub fn unplug(&self, port: u32) {
        self.state.lock().unwrap().attached.retain(|a| a.port != port);
    }

    /// Keep the device listed for `scans` more bus scans, then drop it.
    pub fn unplug_after_scans(&self, port: u32, scans: u32) {
        let mut state = self.state.lock().unwrap();
        if let Some(attached) = state.attached.iter_mut().find(|a| a.port == port) {
            attached.scans_left = Some(scans);
        }
    }

    pub fn update(&self, port: u32, f: impl FnOnce(&mut MockDevice)) {
        let mut state = self.state.lock().unwrap();
        if let Some(attached) = state.attached.iter_mut().find(|a| a.port == port) {
            f(&mut attached.device);
        }
    }

    pub fn scans(&self) -> usize {
        self.state.lock().unwrap().scans
    }

    pub fn commands(&self) -> Vec<u8> {
        self.state.lock().unwrap().commands.clone()
    }

    /// (opened, closed, claimed, released)
    pub fn balance(&self) -> (usize, usize, usize, usize) {
        let state = self.state.lock().unwrap();
        (state.opened, state.closed, state.claimed, state.released)
    }

    pub fn assert_balanced(&self) {
        let (opened, closed, claimed, released) = self.balance();
        assert_eq!(opened, closed, "every opened device must be closed");
        assert_eq!(claimed, released, "every claimed interface must be released");
    }
}

impl Transport for MockTransport {
    type Handle = MockHandle;
    type Session = MockSession;

    fn refresh_bus_listing(&self) -> Result<(), TransportError> {
        let mut state = self.state.lock().unwrap();
        state.scans += 1;
        state.attached.retain_mut(|a| match a.scans_left {
            Some(0) => false,
            Some(ref mut n) => {
                *n -= 1;
                true
            }
            None => true,
        });
        state.listing = state.attached.iter().map(|a| a.port).collect();
        Ok(())
    }

    fn enumerate_matching(&self, vendor_id: u16, product_id: u16) -> Result<Vec<MockHandle>, TransportError> {
        let state = self.state.lock().unwrap();
        if vendor_id != VID || product_id != PID {
            return Ok(Vec::new());
        }
        Ok(state.listing.iter().map(|&port| MockHandle { port }).collect())
    }

    fn open(&self, handle: &MockHandle) -> Result<MockSession, TransportError> {
        let mut state = self.state.lock().unwrap();
        if state.device(handle.port)?.fail_open {
            return Err(TransportError::Other("permission denied".to_string()));
        }
        state.opened += 1;
        Ok(MockSession {
            port: handle.port,
            claimed: false,
            last_command: None,
        })
    }

    fn close(&self, _session: &mut MockSession) {
        self.state.lock().unwrap().closed += 1;
    }

    fn select_configuration(&self, session: &mut MockSession) -> Result<(), TransportError> {
        let state = self.state.lock().unwrap();
        if state.device(session.port)?.fail_configure {
            return Err(TransportError::Other("set configuration failed".to_string()));
        }
        Ok(())
    }

    fn claim_interface(&self, session: &mut MockSession) -> Result<(), TransportError> {
        let mut state = self.state.lock().unwrap();
        match state.device(session.port)?.claim_failure {
            Some(ClaimFailure::Busy) => return Err(TransportError::Busy),
            Some(ClaimFailure::OutOfMemory) => return Err(TransportError::OutOfMemory),
            Some(ClaimFailure::Other) => return Err(TransportError::Other("claim failed".to_string())),
            None => {}
        }
        state.claimed += 1;
        session.claimed = true;
        Ok(())
    }

    fn release_interface(&self, session: &mut MockSession) {
        if session.claimed {
            session.claimed = false;
            self.state.lock().unwrap().released += 1;
        }
    }

    fn bulk_write(
        &self,
        session: &mut MockSession,
        _endpoint: u8,
        data: &[u8],
        _timeout: Duration,
    ) -> Result<usize, TransportError> {
        let mut state = self.state.lock().unwrap();
        let short = state.device(session.port)?.short_write;
        state.commands.extend_from_slice(data);
        session.last_command = data.first().copied();
        Ok(if short { 0 } else { data.len() })
    }

    fn bulk_read(
        &self,
        session: &mut MockSession,
        _endpoint: u8,
        max_len: usize,
        _timeout: Duration,
    ) -> Result<Vec<u8>, TransportError> {
        let mut state = self.state.lock().unwrap();
        let device = state.device(session.port)?.clone();
        let reply = match session.last_command {
            Some(0x01) => device.serial_reply,
            Some(0x43) if device.unplug_on_read => {
                state.attached.retain(|a| a.port != session.port);
                None
            }
            Some(0x43) => device.telemetry_reply,
            _ => None,
        };
        let mut reply = reply.ok_or(TransportError::Timeout)?;
        reply.truncate(max_len);
        Ok(reply)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    EnumerationStarted,
    EnumerationFinished(usize),
    CommandSent(Command),
    Classified(usize, ResponseOutcome),
    ReconnectAttempt(u32),
    ReconnectFinished(bool),
}

#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<Event>>,
}

impl RecordingObserver {
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    fn push(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}

impl SessionObserver for RecordingObserver {
    fn enumeration_started(&self) {
        self.push(Event::EnumerationStarted);
    }

    fn enumeration_finished(&self, devices: &[DeviceIdentity]) {
        self.push(Event::EnumerationFinished(devices.len()));
    }

    fn command_sent(&self, _identity: &DeviceIdentity, command: Command) {
        self.push(Event::CommandSent(command));
    }

    fn response_classified(&self, _identity: &DeviceIdentity, len: usize, outcome: ResponseOutcome) {
        self.push(Event::Classified(len, outcome));
    }

    fn reconnect_attempt(&self, _identity: &DeviceIdentity, attempt: u32) {
        self.push(Event::ReconnectAttempt(attempt));
    }

    fn reconnect_finished(&self, _identity: &DeviceIdentity, present: bool) {
        self.push(Event::ReconnectFinished(present));
    }
}

#[derive(Default)]
pub struct RecordingSleeper {
    naps: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn naps(&self) -> Vec<Duration> {
        self.naps.lock().unwrap().clone()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.naps.lock().unwrap().push(duration);
    }
}
