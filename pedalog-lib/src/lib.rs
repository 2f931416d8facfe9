//! Host-side protocol for the Pedalog USB pedal-power meter.
//!
//! ```no_run
//! use pedalog_lib::Pedalog;
//!
//! let pedalog = Pedalog::init()?;
//! for identity in pedalog.enumerate() {
//!     match pedalog.read(&identity) {
//!         Ok(reading) => println!("{identity}: {reading}"),
//!         Err(kind) => eprintln!("{identity}: {kind}"),
//!     }
//! }
//! # Ok::<(), pedalog_lib::TransportError>(())
//! ```

pub mod channel;
pub mod config;
pub mod constants;
pub mod error;
pub mod frame;
pub mod identity;
pub mod observer;
pub mod registry;
pub mod session;
pub mod transport;
pub mod usb;


pub use channel::Command;
pub use config::SessionConfig;
pub use constants::{MAX_DEVICES, MAX_ERROR_MESSAGE_LEN};
pub use error::{ErrorKind, TransportError, message_for, message_for_code};
pub use frame::{FrameVersion, Reading};
pub use identity::DeviceIdentity;
pub use observer::{ResponseOutcome, SessionObserver, Sleeper, ThreadSleeper, TracingObserver};
pub use registry::{DeviceRegistry, RegistryEntry};
pub use session::Pedalog;
pub use transport::{OpenDevice, Transport};
pub use usb::NusbTransport;

/// Number of devices a single enumeration reports at most.
pub const fn max_devices() -> usize {
    MAX_DEVICES
}

/// Length bound of every message returned by [`message_for`].
pub const fn max_error_message_len() -> usize {
    MAX_ERROR_MESSAGE_LEN
}
