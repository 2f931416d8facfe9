// Protocol constants for the Pedalog pedal-power meter

use std::time::Duration;

/// USB vendor id of the Pedalog (Microchip PIC18 USB stack)
pub const VID: u16 = 0x04d8;

/// USB product id of the Pedalog
pub const PID: u16 = 0x000c;

pub const ENDPOINT_OUT: u8 = 0x01;
pub const ENDPOINT_IN: u8 = 0x81;

/// Per-transfer timeout used by the device firmware's host library
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(1000);

/// Number of devices tracked by a single registry
pub const MAX_DEVICES: usize = 8;

/// Upper bound on the length of any error catalog message
pub const MAX_ERROR_MESSAGE_LEN: usize = 128;

/// Telemetry frame length of the original firmware (48 bytes)
pub const FRAME_V1_LEN: usize = 48;

/// Telemetry frame length of later firmware, trailing fields appended (52 bytes)
pub const FRAME_V2_LEN: usize = 52;

/// Digits in the serial number reply
pub const SERIAL_DIGITS: usize = 4;

/// Serial reply length: one echoed prefix byte plus the digits
pub const SERIAL_RESPONSE_LEN: usize = SERIAL_DIGITS + 1;

/// Serial reported when the firmware cannot answer the serial query
pub const ANONYMOUS_SERIAL: u32 = 0;

/// Byte offset and width of one ASCII field inside a telemetry frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpan {
    pub offset: usize,
    pub len: usize,
}

impl FieldSpan {
    pub const fn new(offset: usize, len: usize) -> Self {
        Self { offset, len }
    }

    pub const fn end(&self) -> usize {
        self.offset + self.len
    }
}

pub const VOLTAGE_FIELD: FieldSpan = FieldSpan::new(1, 4);
pub const CURRENT_FIELD: FieldSpan = FieldSpan::new(5, 5);
pub const POWER_FIELD: FieldSpan = FieldSpan::new(10, 5);
pub const ENERGY_FIELD: FieldSpan = FieldSpan::new(15, 7);
pub const MAX_POWER_FIELD: FieldSpan = FieldSpan::new(22, 5);
pub const AVG_POWER_FIELD: FieldSpan = FieldSpan::new(27, 5);
pub const TIME_FIELD: FieldSpan = FieldSpan::new(32, 8);
