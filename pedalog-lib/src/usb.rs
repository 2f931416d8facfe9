//! [`Transport`] backed by `nusb`.

use crate::error::TransportError;
use crate::transport::Transport;
use nusb::transfer::RequestBuffer;
use nusb::{Device, DeviceInfo, Interface};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::runtime::Runtime;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Bus position of an attached device as seen in the last scan.
#[derive(Debug, Clone)]
pub struct UsbDeviceRef {
    info: DeviceInfo,
}

impl UsbDeviceRef {
    pub fn bus_number(&self) -> u8 {
        self.info.bus_number()
    }

    pub fn device_address(&self) -> u8 {
        self.info.device_address()
    }
}

pub struct UsbSession {
    device: Option<Device>,
    interface_number: u8,
    interface: Option<Interface>,
}

impl UsbSession {
    fn device(&self) -> Result<&Device, TransportError> {
        self.device
            .as_ref()
            .ok_or_else(|| TransportError::Other("device already closed".to_string()))
    }

    fn interface(&self) -> Result<&Interface, TransportError> {
        self.interface
            .as_ref()
            .ok_or_else(|| TransportError::Other("interface not claimed".to_string()))
    }
}

pub struct NusbTransport {
    runtime: Runtime,
    listing: Mutex<Vec<DeviceInfo>>,
}

impl NusbTransport {
    pub fn new() -> Result<Self, TransportError> {
        // Transfers are async in nusb; drive them to completion on a private runtime.
        let runtime = tokio::runtime::Builder::new_current_thread().enable_time().build()?;
        Ok(Self {
            runtime,
            listing: Mutex::new(Vec::new()),
        })
    }
}

impl Transport for NusbTransport {
    type Handle = UsbDeviceRef;
    type Session = UsbSession;

    fn refresh_bus_listing(&self) -> Result<(), TransportError> {
        let devices: Vec<DeviceInfo> = nusb::list_devices()?.collect();
        debug!("Bus scan found {} USB devices", devices.len());
        *self.listing.lock().unwrap_or_else(PoisonError::into_inner) = devices;
        Ok(())
    }

    fn enumerate_matching(&self, vendor_id: u16, product_id: u16) -> Result<Vec<UsbDeviceRef>, TransportError> {
        let listing = self.listing.lock().unwrap_or_else(PoisonError::into_inner);
        let matching = listing
            .iter()
            .filter(|d| d.vendor_id() == vendor_id && d.product_id() == product_id)
            .map(|info| {
                info!(
                    "Found device on bus {} addr {}",
                    info.bus_number(),
                    info.device_address()
                );
                UsbDeviceRef { info: info.clone() }
            })
            .collect();
        Ok(matching)
    }

    fn open(&self, handle: &UsbDeviceRef) -> Result<UsbSession, TransportError> {
        let device = handle.info.open()?;
        Ok(UsbSession {
            device: Some(device),
            interface_number: 0,
            interface: None,
        })
    }

    fn close(&self, session: &mut UsbSession) {
        session.interface = None;
        session.device = None;
    }

    fn select_configuration(&self, session: &mut UsbSession) -> Result<(), TransportError> {
        let device = session.device()?;
        let config = device
            .configurations()
            .next()
            .ok_or_else(|| TransportError::Other("device has no configuration descriptor".to_string()))?;
        let interface_number = config.interfaces().next().map_or(0, |i| i.interface_number());
        device.set_configuration(config.configuration_value())?;
        session.interface_number = interface_number;
        Ok(())
    }

    fn claim_interface(&self, session: &mut UsbSession) -> Result<(), TransportError> {
        let interface = session.device()?.detach_and_claim_interface(session.interface_number)?;
        debug!("Interface {} claimed", session.interface_number);
        session.interface = Some(interface);
        Ok(())
    }

    fn release_interface(&self, session: &mut UsbSession) {
        if session.interface.take().is_some() {
            debug!("Interface {} released", session.interface_number);
        }
    }

    fn bulk_write(
        &self,
        session: &mut UsbSession,
        endpoint: u8,
        data: &[u8],
        limit: Duration,
    ) -> Result<usize, TransportError> {
        debug!(bytes = hex::encode(data), "USB Write");
        let transfer = session.interface()?.bulk_out(endpoint, data.to_vec());
        let completion = self.runtime.block_on(async { timeout(limit, transfer).await })?;
        let written = completion.into_result()?.actual_length();
        if written != data.len() {
            warn!("Short write: {} of {} bytes", written, data.len());
        }
        Ok(written)
    }

    fn bulk_read(
        &self,
        session: &mut UsbSession,
        endpoint: u8,
        max_len: usize,
        limit: Duration,
    ) -> Result<Vec<u8>, TransportError> {
        let transfer = session.interface()?.bulk_in(endpoint, RequestBuffer::new(max_len));
        let completion = self.runtime.block_on(async { timeout(limit, transfer).await })?;
        let mut data = completion.into_result()?;
        data.truncate(max_len);
        debug!(bytes = hex::encode(&data), "USB Read");
        Ok(data)
    }
}
