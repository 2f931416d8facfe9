use crate::channel::{self, Command};
use crate::constants::{ANONYMOUS_SERIAL, SERIAL_RESPONSE_LEN};
use crate::transport::{OpenDevice, Transport};
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use tracing::debug;

/// Caller-visible identity of one physical Pedalog.
///
/// Only produced by enumeration. Firmware without the serial query
/// reports [`ANONYMOUS_SERIAL`], so every such device shares one identity;
/// with more than one of them attached the identity is ambiguous.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct DeviceIdentity {
    serial: u32,
}

impl DeviceIdentity {
    pub(crate) fn new(serial: u32) -> Self {
        Self { serial }
    }

    pub fn serial(&self) -> u32 {
        self.serial
    }

    pub fn is_anonymous(&self) -> bool {
        self.serial == ANONYMOUS_SERIAL
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_anonymous() {
            write!(f, "Pedalog (no serial)")
        } else {
            write!(f, "Pedalog #{:04}", self.serial)
        }
    }
}

/// Ask a device for its serial number.
///
/// Never fails: firmware that predates the query, a device that cannot be
/// opened, an empty reply or an unparsable one all give [`ANONYMOUS_SERIAL`].
pub fn resolve_serial<T: Transport>(transport: &T, handle: &T::Handle, timeout: Duration) -> u32 {
    let mut device = match OpenDevice::open(transport, handle) {
        Ok(device) => device,
        Err(e) => {
            debug!("Cannot open {:?} for serial query: {}", handle, e);
            return ANONYMOUS_SERIAL;
        }
    };

    let reply = channel::send(transport, device.session_mut(), Command::ReadSerial, SERIAL_RESPONSE_LEN, timeout);
    drop(device);

    match reply {
        Ok(bytes) if !bytes.is_empty() => parse_serial(&bytes[1..]).unwrap_or_else(|| {
            debug!(bytes = hex::encode(&bytes), "Unparsable serial reply");
            ANONYMOUS_SERIAL
        }),
        Ok(_) => ANONYMOUS_SERIAL,
        Err(kind) => {
            debug!("Serial query unsupported or failed: {:?}", kind);
            ANONYMOUS_SERIAL
        }
    }
}

/// Parse the digits following the echoed prefix byte.
fn parse_serial(digits: &[u8]) -> Option<u32> {
    let text = std::str::from_utf8(digits).ok()?;
    text.trim_matches(|c: char| c.is_ascii_whitespace() || c == '\0').parse().ok()
}
