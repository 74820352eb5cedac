//! Smart pen notification protocol.
//!
//! Each characteristic notification carries one fixed-layout little-endian
//! record: `x: u16`, `y: u16`, `pressure: u8`. The device does not send a
//! timestamp, so the capture time is stamped at decode.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[cfg(test)]
#[path = "pen_test.rs"]
mod pen_test;

pub const SERVICE_UUID: Uuid = Uuid::from_u128(0x4f99f138_9e53_5750_9d4f_21896461b5c9);
pub const CHARACTERISTIC_UUID: Uuid = Uuid::from_u128(0x4f99f139_9e53_5750_9d4f_21896461b5c9);
pub const NAME_PREFIXES: [&str; 2] = ["Neo", "dimo"];

/// Device coordinates span `0..DEVICE_RANGE` on both axes.
pub const DEVICE_RANGE: f32 = 4096.0;
pub const MAX_PRESSURE: f32 = 255.0;
pub const SAMPLE_LEN: usize = 5;

/// One decoded pen event.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct Sample {
    pub x: u16,
    pub y: u16,
    pub pressure: u8,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("pen record truncated: {len} bytes, need {SAMPLE_LEN}")]
    Truncated { len: usize },
}

/// Decodes one notification payload, stamping it with the current time.
pub fn decode(payload: &[u8]) -> Result<Sample, DecodeError> {
    decode_at(payload, Utc::now())
}

/// Decodes one notification payload captured at `captured_at`.
///
/// Trailing bytes past the record are ignored.
pub fn decode_at(payload: &[u8], captured_at: DateTime<Utc>) -> Result<Sample, DecodeError> {
    let Some(record) = payload.get(..SAMPLE_LEN) else {
        return Err(DecodeError::Truncated { len: payload.len() });
    };
    Ok(Sample {
        x: u16::from_le_bytes([record[0], record[1]]),
        y: u16::from_le_bytes([record[2], record[3]]),
        pressure: record[4],
        timestamp: captured_at,
    })
}

/// Encodes a sample back into its wire record. Used by capture tooling.
pub fn encode(sample: &Sample) -> [u8; SAMPLE_LEN] {
    let x = sample.x.to_le_bytes();
    let y = sample.y.to_le_bytes();
    [x[0], x[1], y[0], y[1], sample.pressure]
}

/// Whether an advertised device name passes the pen allow-list.
pub fn matches_name_prefix(name: &str) -> bool {
    NAME_PREFIXES.iter().any(|prefix| name.starts_with(prefix))
}
