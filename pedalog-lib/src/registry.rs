//! Table of enumerated devices.
//!
//! The table is rebuilt from scratch by every enumeration. A handle stored
//! here is a bus position, not an identity: it stays valid only until the
//! next enumeration, so anything resolved from an earlier table must be
//! resolved again afterwards.

use crate::constants::{ANONYMOUS_SERIAL, MAX_DEVICES, PID, VID};
use crate::identity::{self, DeviceIdentity};
use crate::transport::Transport;
use std::fmt;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct RegistryEntry<H> {
    pub identity: DeviceIdentity,
    pub handle: H,
}

#[derive(Debug)]
pub struct DeviceRegistry<H> {
    entries: Vec<RegistryEntry<H>>,
    capacity: usize,
}

impl<H: Clone + fmt::Debug> Default for DeviceRegistry<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: Clone + fmt::Debug> DeviceRegistry<H> {
    pub fn new() -> Self {
        Self::with_capacity(MAX_DEVICES)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[RegistryEntry<H>] {
        &self.entries
    }

    /// Rescan the bus and replace the table with the matching devices.
    ///
    /// At most `capacity` devices are kept; the rest are ignored for this
    /// scan. When `query_serial` is false, or a device does not answer the
    /// serial query, the device gets the anonymous identity. A failing bus
    /// scan leaves the table empty.
    pub fn enumerate<T>(&mut self, transport: &T, query_serial: bool, timeout: Duration) -> Vec<DeviceIdentity>
    where
        T: Transport<Handle = H>,
    {
        self.entries.clear();

        let handles = match transport
            .refresh_bus_listing()
            .and_then(|()| transport.enumerate_matching(VID, PID))
        {
            Ok(handles) => handles,
            Err(e) => {
                warn!("USB bus scan failed: {}", e);
                return Vec::new();
            }
        };

        if handles.len() > self.capacity {
            warn!(
                "{} Pedalogs attached, only the first {} are used",
                handles.len(),
                self.capacity
            );
        }

        for handle in handles.into_iter().take(self.capacity) {
            let serial = if query_serial {
                identity::resolve_serial(transport, &handle, timeout)
            } else {
                ANONYMOUS_SERIAL
            };
            let identity = DeviceIdentity::new(serial);
            info!("Registered {} at {:?}", identity, handle);
            self.entries.push(RegistryEntry { identity, handle });
        }

        self.entries.iter().map(|e| e.identity).collect()
    }

    /// Handle of the first entry carrying `identity`.
    pub fn resolve(&self, identity: &DeviceIdentity) -> Option<&H> {
        self.entries
            .iter()
            .find(|e| &e.identity == identity)
            .map(|e| &e.handle)
    }
}
