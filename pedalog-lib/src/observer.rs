//! Lifecycle hooks for enumeration and reads.

use crate::channel::Command;
use crate::error::ErrorKind;
use crate::frame::FrameVersion;
use crate::identity::DeviceIdentity;
use std::time::Duration;
use tracing::{debug, info, warn};

/// How a response to a command was classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseOutcome {
    /// Layout is `None` for a decodable frame of non-standard length
    Decoded(Option<FrameVersion>),
    Failed(ErrorKind),
}

/// Receives events at fixed points of the session lifecycle.
///
/// Every method has an empty default so implementors pick what they need.
pub trait SessionObserver: Send + Sync {
    fn enumeration_started(&self) {}

    fn enumeration_finished(&self, _devices: &[DeviceIdentity]) {}

    fn command_sent(&self, _identity: &DeviceIdentity, _command: Command) {}

    fn response_classified(&self, _identity: &DeviceIdentity, _len: usize, _outcome: ResponseOutcome) {}

    /// `attempt` counts from 1.
    fn reconnect_attempt(&self, _identity: &DeviceIdentity, _attempt: u32) {}

    fn reconnect_finished(&self, _identity: &DeviceIdentity, _present: bool) {}
}

/// Forwards every event to `tracing`. Used when no observer is supplied.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl SessionObserver for TracingObserver {
    fn enumeration_started(&self) {
        debug!("Searching for Pedalog devices...");
    }

    fn enumeration_finished(&self, devices: &[DeviceIdentity]) {
        info!("Found {} Pedalog device(s)", devices.len());
    }

    fn command_sent(&self, identity: &DeviceIdentity, command: Command) {
        debug!("{}: sent {} command", identity, command);
    }

    fn response_classified(&self, identity: &DeviceIdentity, len: usize, outcome: ResponseOutcome) {
        match outcome {
            ResponseOutcome::Decoded(Some(version)) => debug!("{}: decoded {} frame", identity, version),
            ResponseOutcome::Decoded(None) => debug!("{}: decoded {} byte frame of unknown layout", identity, len),
            ResponseOutcome::Failed(kind) => warn!("{}: {} byte response rejected: {:?}", identity, len, kind),
        }
    }

    fn reconnect_attempt(&self, identity: &DeviceIdentity, attempt: u32) {
        info!("{}: rescanning bus (attempt {})", identity, attempt);
    }

    fn reconnect_finished(&self, identity: &DeviceIdentity, present: bool) {
        if present {
            info!("{}: still attached, failure was transient", identity);
        } else {
            warn!("{}: device disconnected", identity);
        }
    }
}

/// Blocking pause between reconnect attempts.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}
