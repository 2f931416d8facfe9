//! The narrow USB capability the protocol layer is written against.
//!
//! Enumeration, descriptor handling and driver binding belong to the
//! backend. The core only sequences these calls and classifies their
//! failures; see [`NusbTransport`](crate::usb::NusbTransport) for the
//! production implementation.

use crate::error::TransportError;
use std::fmt;
use std::time::Duration;

pub trait Transport {
    /// Bus position of a device. Only valid until the next
    /// [`refresh_bus_listing`](Transport::refresh_bus_listing).
    type Handle: Clone + fmt::Debug;

    /// An opened device.
    type Session;

    /// Rescan the attached devices.
    fn refresh_bus_listing(&self) -> Result<(), TransportError>;

    /// Devices from the last scan matching `vendor_id`/`product_id`, in bus order.
    fn enumerate_matching(&self, vendor_id: u16, product_id: u16) -> Result<Vec<Self::Handle>, TransportError>;

    fn open(&self, handle: &Self::Handle) -> Result<Self::Session, TransportError>;

    /// Release the device. The session must not be used afterwards.
    fn close(&self, session: &mut Self::Session);

    /// Select the device's first configuration.
    fn select_configuration(&self, session: &mut Self::Session) -> Result<(), TransportError>;

    /// Claim the first interface of the selected configuration.
    fn claim_interface(&self, session: &mut Self::Session) -> Result<(), TransportError>;

    fn release_interface(&self, session: &mut Self::Session);

    /// Returns the number of bytes accepted by the device.
    fn bulk_write(
        &self,
        session: &mut Self::Session,
        endpoint: u8,
        data: &[u8],
        timeout: Duration,
    ) -> Result<usize, TransportError>;

    /// Returns between `0` and `max_len` bytes.
    fn bulk_read(
        &self,
        session: &mut Self::Session,
        endpoint: u8,
        max_len: usize,
        timeout: Duration,
    ) -> Result<Vec<u8>, TransportError>;
}

/// An opened device that is closed when dropped.
pub struct OpenDevice<'t, T: Transport> {
    transport: &'t T,
    session: T::Session,
}

impl<'t, T: Transport> OpenDevice<'t, T> {
    pub fn open(transport: &'t T, handle: &T::Handle) -> Result<Self, TransportError> {
        let session = transport.open(handle)?;
        Ok(Self { transport, session })
    }

    pub fn session_mut(&mut self) -> &mut T::Session {
        &mut self.session
    }
}

impl<T: Transport> Drop for OpenDevice<'_, T> {
    fn drop(&mut self) {
        self.transport.close(&mut self.session);
    }
}
