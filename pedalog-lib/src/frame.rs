use crate::constants::{
    AVG_POWER_FIELD, CURRENT_FIELD, ENERGY_FIELD, FRAME_V1_LEN, FRAME_V2_LEN, FieldSpan, MAX_POWER_FIELD,
    POWER_FIELD, TIME_FIELD, VOLTAGE_FIELD,
};
use crate::error::ErrorKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use strum_macros::Display;

/// Telemetry frame layouts shipped by the firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum FrameVersion {
    #[strum(to_string = "V1 (48 bytes)")]
    V1,
    /// V1 followed by four trailing bytes the host ignores
    #[strum(to_string = "V2 (52 bytes)")]
    V2,
}

impl FrameVersion {
    pub fn frame_len(&self) -> usize {
        match self {
            FrameVersion::V1 => FRAME_V1_LEN,
            FrameVersion::V2 => FRAME_V2_LEN,
        }
    }

    /// Layout matching a response of `len` bytes, if any.
    pub fn detect(len: usize) -> Option<Self> {
        match len {
            FRAME_V1_LEN => Some(FrameVersion::V1),
            FRAME_V2_LEN => Some(FrameVersion::V2),
            _ => None,
        }
    }
}

/// One telemetry sample from a Pedalog.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Reading {
    pub voltage: f64,   // Volts
    pub current: f64,   // Amperes
    pub power: f64,     // Watts, instantaneous
    pub energy: f64,    // Cumulative energy
    pub max_power: f64, // Watts
    pub avg_power: f64, // Watts
    pub time: i64,      // Elapsed time counter
}

impl Reading {
    /// Decode a telemetry frame.
    ///
    /// Fields are fixed-width ASCII at fixed offsets. Only the first
    /// [`FRAME_V1_LEN`] bytes are inspected, so V1 and V2 frames with the
    /// same prefix decode identically. A frame shorter than V1 or a field
    /// that is not a decimal number yields [`ErrorKind::BadResponse`].
    pub fn decode(frame: &[u8]) -> Result<Self, ErrorKind> {
        if frame.len() < FRAME_V1_LEN {
            return Err(ErrorKind::BadResponse);
        }
        let frame = &frame[..FRAME_V1_LEN];

        Ok(Reading {
            voltage: field(frame, VOLTAGE_FIELD)?,
            current: field(frame, CURRENT_FIELD)?,
            power: field(frame, POWER_FIELD)?,
            energy: field(frame, ENERGY_FIELD)?,
            max_power: field(frame, MAX_POWER_FIELD)?,
            avg_power: field(frame, AVG_POWER_FIELD)?,
            time: field(frame, TIME_FIELD)?,
        })
    }
}

fn field<N: FromStr>(frame: &[u8], span: FieldSpan) -> Result<N, ErrorKind> {
    let bytes = frame.get(span.offset..span.end()).ok_or(ErrorKind::BadResponse)?;
    let text = std::str::from_utf8(bytes).map_err(|_| ErrorKind::BadResponse)?;
    // Firmware pads short values with spaces; some revisions NUL-terminate.
    text.trim_matches(|c: char| c.is_ascii_whitespace() || c == '\0')
        .parse()
        .map_err(|_| ErrorKind::BadResponse)
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.1} V, {:.3} A, {:.1} W, energy {:.2}, max {:.1} W, avg {:.1} W, time {}",
            self.voltage, self.current, self.power, self.energy, self.max_power, self.avg_power, self.time
        )
    }
}
