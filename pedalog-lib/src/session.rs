use crate::channel::{self, Command};
use crate::config::SessionConfig;
use crate::constants::{FRAME_V2_LEN, MAX_DEVICES};
use crate::error::{ErrorKind, TransportError};
use crate::frame::{FrameVersion, Reading};
use crate::identity::DeviceIdentity;
use crate::observer::{ResponseOutcome, SessionObserver, Sleeper, ThreadSleeper, TracingObserver};
use crate::registry::DeviceRegistry;
use crate::transport::{OpenDevice, Transport};
use crate::usb::NusbTransport;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::warn;

/// Entry point: discovers Pedalogs and reads telemetry from them.
///
/// The device registry lives behind a mutex, so a `Pedalog` may be shared
/// between threads. Only registry updates and lookups are locked: device
/// I/O is not, and an enumeration running alongside a read may find the
/// device busy during its serial query.
pub struct Pedalog<T: Transport> {
    transport: T,
    registry: Mutex<DeviceRegistry<T::Handle>>,
    config: SessionConfig,
    observer: Arc<dyn SessionObserver>,
    sleeper: Arc<dyn Sleeper>,
}

impl Pedalog<NusbTransport> {
    /// Open the system USB stack.
    pub fn init() -> Result<Self, TransportError> {
        Ok(Self::new(NusbTransport::new()?))
    }
}

impl<T: Transport> Pedalog<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            registry: Mutex::new(DeviceRegistry::new()),
            config: SessionConfig::default(),
            observer: Arc::new(TracingObserver),
            sleeper: Arc::new(ThreadSleeper),
        }
    }

    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn SessionObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn max_devices(&self) -> usize {
        MAX_DEVICES
    }

    fn registry(&self) -> MutexGuard<'_, DeviceRegistry<T::Handle>> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Scan for attached devices, replacing every previously known identity.
    pub fn enumerate(&self) -> Vec<DeviceIdentity> {
        self.observer.enumeration_started();
        let devices = self
            .registry()
            .enumerate(&self.transport, self.config.query_serial, self.config.timeout());
        self.observer.enumeration_finished(&devices);
        devices
    }

    /// Read one telemetry sample from `identity`.
    ///
    /// After a failed exchange the bus is rescanned to tell a removed
    /// device from a transient glitch. A device that has gone yields
    /// [`ErrorKind::NoDeviceFound`]; one that is still attached yields the
    /// original error and may be read again.
    pub fn read(&self, identity: &DeviceIdentity) -> Result<Reading, ErrorKind> {
        let handle = self
            .registry()
            .resolve(identity)
            .cloned()
            .ok_or(ErrorKind::NoDeviceFound)?;

        let response = {
            let mut device = match OpenDevice::open(&self.transport, &handle) {
                Ok(device) => device,
                Err(e) => {
                    warn!("{}: open failed: {}", identity, e);
                    return Err(ErrorKind::NoDeviceFound);
                }
            };
            self.observer.command_sent(identity, Command::ReadTelemetry);
            channel::send(
                &self.transport,
                device.session_mut(),
                Command::ReadTelemetry,
                FRAME_V2_LEN,
                self.config.timeout(),
            )
        };

        let result = match response {
            Ok(frame) => {
                let reading = Reading::decode(&frame);
                let outcome = match reading {
                    Ok(_) => ResponseOutcome::Decoded(FrameVersion::detect(frame.len())),
                    Err(kind) => ResponseOutcome::Failed(kind),
                };
                self.observer.response_classified(identity, frame.len(), outcome);
                reading
            }
            Err(kind) => {
                self.observer
                    .response_classified(identity, 0, ResponseOutcome::Failed(kind));
                Err(kind)
            }
        };

        result.map_err(|kind| self.confirm_presence(identity, kind))
    }

    /// Rescan until `identity` disappears or the attempts run out.
    fn confirm_presence(&self, identity: &DeviceIdentity, original: ErrorKind) -> ErrorKind {
        let attempts = self.config.reconnect_attempts.max(1);
        for attempt in 1..=attempts {
            if attempt > 1 {
                self.sleeper.sleep(self.config.reconnect_delay());
            }
            self.observer.reconnect_attempt(identity, attempt);
            if !self.enumerate().contains(identity) {
                self.observer.reconnect_finished(identity, false);
                return ErrorKind::NoDeviceFound;
            }
        }
        self.observer.reconnect_finished(identity, true);
        original
    }
}
