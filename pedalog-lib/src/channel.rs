//! Single-byte command / bounded response exchange.

use crate::constants::{ENDPOINT_IN, ENDPOINT_OUT};
use crate::error::{ErrorKind, TransportError};
use crate::transport::Transport;
use bytes::Bytes;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::time::Duration;
use strum_macros::Display;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum Command {
    #[strum(to_string = "read serial")]
    ReadSerial = 0x01,
    #[strum(to_string = "read telemetry")]
    ReadTelemetry = 0x43,
}

/// Claimed interface that is released when dropped.
struct ClaimedInterface<'a, T: Transport> {
    transport: &'a T,
    session: &'a mut T::Session,
}

impl<'a, T: Transport> ClaimedInterface<'a, T> {
    fn claim(transport: &'a T, session: &'a mut T::Session) -> Result<Self, ErrorKind> {
        transport.claim_interface(session).map_err(|e| {
            warn!("Failed to claim interface: {}", e);
            classify_claim_error(&e)
        })?;
        Ok(Self { transport, session })
    }

    fn session(&mut self) -> &mut T::Session {
        self.session
    }
}

impl<T: Transport> Drop for ClaimedInterface<'_, T> {
    fn drop(&mut self) {
        self.transport.release_interface(self.session);
    }
}

fn classify_claim_error(err: &TransportError) -> ErrorKind {
    match err {
        TransportError::Busy => ErrorKind::DeviceBusy,
        TransportError::OutOfMemory => ErrorKind::OutOfMemory,
        _ => ErrorKind::Unknown,
    }
}

/// Send `command` to an opened device and read back at most `max_len` bytes.
///
/// Any response length from zero up to the bound is returned as-is; the
/// caller decides what an empty or short answer means. The interface is
/// released on every path once claimed.
pub fn send<T: Transport>(
    transport: &T,
    session: &mut T::Session,
    command: Command,
    max_len: usize,
    timeout: Duration,
) -> Result<Bytes, ErrorKind> {
    transport.select_configuration(session).map_err(|e| {
        warn!("Failed to select configuration: {}", e);
        ErrorKind::FailedToOpen
    })?;

    let mut claimed = ClaimedInterface::claim(transport, session)?;

    let request = [u8::from(command)];
    let written = transport
        .bulk_write(claimed.session(), ENDPOINT_OUT, &request, timeout)
        .map_err(|e| {
            warn!("Write of {} command failed: {}", command, e);
            ErrorKind::Unknown
        })?;
    if written != request.len() {
        return Err(ErrorKind::Unknown);
    }
    debug!("Sent {} command", command);

    let response = transport
        .bulk_read(claimed.session(), ENDPOINT_IN, max_len, timeout)
        .map_err(|e| {
            warn!("No answer to {} command: {}", command, e);
            ErrorKind::BadResponse
        })?;
    debug!("Received {} bytes", response.len());

    Ok(Bytes::from(response))
}
