use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::fmt;
use std::io;
use thiserror::Error;

/// Failure of a single `read` or command exchange.
///
/// The discriminants are the status codes reported by the original host
/// library; `0` is reserved for success and has no variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum ErrorKind {
    Unknown = 1,
    NoDeviceFound = 2,
    FailedToOpen = 3,
    BadResponse = 4,
    DeviceBusy = 5,
    OutOfMemory = 6,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 6] = [
        ErrorKind::Unknown,
        ErrorKind::NoDeviceFound,
        ErrorKind::FailedToOpen,
        ErrorKind::BadResponse,
        ErrorKind::DeviceBusy,
        ErrorKind::OutOfMemory,
    ];

    pub fn code(self) -> u8 {
        self.into()
    }

    pub fn message(self) -> &'static str {
        message_for(self)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(message_for(*self))
    }
}

impl std::error::Error for ErrorKind {}

const UNKNOWN_MESSAGE: &str = "An unknown error occurred.";

/// Human-readable text for an error kind.
pub fn message_for(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::NoDeviceFound => "The Pedalog device was not found. It may have been disconnected.",
        ErrorKind::FailedToOpen => {
            "The device could not be opened for communication. You might not have permission to access it, try running as root."
        }
        ErrorKind::BadResponse => {
            "A bad response was received from the device. It may have an incompatible firmware version."
        }
        ErrorKind::DeviceBusy => "The device is busy. It may be in use by another application.",
        ErrorKind::OutOfMemory => "An out of memory error occurred when trying to communicate with the device.",
        ErrorKind::Unknown => UNKNOWN_MESSAGE,
    }
}

/// Text for a raw status code. `0` is success and maps to an empty string,
/// unrecognized codes fall back to the unknown-error message.
pub fn message_for_code(code: i32) -> &'static str {
    if code == 0 {
        return "";
    }
    u8::try_from(code)
        .ok()
        .and_then(|c| ErrorKind::try_from(c).ok())
        .map_or(UNKNOWN_MESSAGE, message_for)
}

/// Errors raised by a [`Transport`](crate::transport::Transport) backend.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("resource busy")]
    Busy,

    #[error("out of memory")]
    OutOfMemory,

    #[error("timeout during USB operation")]
    Timeout,

    #[error("I/O error: {0}")]
    Io(io::Error),

    #[error("USB transfer error: {0}")]
    Transfer(#[from] nusb::transfer::TransferError),

    #[error("{0}")]
    Other(String),
}

impl From<io::Error> for TransportError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::ResourceBusy => TransportError::Busy,
            io::ErrorKind::OutOfMemory => TransportError::OutOfMemory,
            io::ErrorKind::TimedOut => TransportError::Timeout,
            _ => TransportError::Io(err),
        }
    }
}

impl From<tokio::time::error::Elapsed> for TransportError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        TransportError::Timeout
    }
}
