// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 rotorlink project

//! Telemetry line decoder.
//!
//! The device broadcasts its state as one ASCII datagram per tick:
//!
//! ```text
//! pitch:0;roll:-2;yaw:51;vgx:0;vgy:0;vgz:0;templ:63;temph:65;tof:10;h:0;
//! bat:87;baro:163.91;time:0;agx:-14.00;agy:7.00;agz:-998.00;\r\n
//! ```
//!
//! [`decode`] is a pure function from one line to a typed field map. Fields
//! named in the fixed schema are converted to their declared numeric type;
//! a field that fails conversion is dropped with a logged warning while the
//! rest of the line still parses. Keys outside the schema pass through as
//! raw strings so newer firmware fields are never lost.

use std::collections::HashMap;

/// Schema fields carried as integers.
///
/// `mid`/`x`/`y`/`z` are mission-pad relative and read `-1`/`0` when no pad
/// is visible; the remainder are attitude (deg), ground speed (cm/s),
/// temperature bounds (C), time-of-flight and relative height (cm), battery
/// (percent) and motor time (s).
const INT_FIELDS: [&str; 16] = [
    "mid", "x", "y", "z", "pitch", "roll", "yaw", "vgx", "vgy", "vgz", "templ", "temph", "tof",
    "h", "bat", "time",
];

/// Schema fields carried as floats: barometer (cm) and acceleration (cm/s^2).
const FLOAT_FIELDS: [&str; 4] = ["baro", "agx", "agy", "agz"];

/// One decoded telemetry field value.
#[derive(Debug, Clone, PartialEq)]
pub enum TelemetryValue {
    /// Integer schema field.
    Int(i64),
    /// Floating-point schema field.
    Float(f64),
    /// Any field outside the fixed schema, kept verbatim.
    Text(String),
}

impl TelemetryValue {
    /// Integer value, if this field decoded as an integer.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            TelemetryValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Numeric value widened to `f64` (integers convert losslessly enough
    /// for telemetry magnitudes).
    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            TelemetryValue::Float(v) => Some(*v),
            TelemetryValue::Int(v) => Some(*v as f64),
            TelemetryValue::Text(_) => None,
        }
    }

    /// Raw text value for non-schema fields.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            TelemetryValue::Text(v) => Some(v),
            _ => None,
        }
    }
}

/// Decoded telemetry snapshot: field name to typed value.
pub type TelemetryMap = HashMap<String, TelemetryValue>;

/// Decode one raw telemetry line into a typed field map.
///
/// Pure function of its input: no I/O, no shared state. A bare `ok` line
/// (sent by some firmware before the first real state tick) yields an
/// empty map rather than an error.
#[must_use]
pub fn decode(line: &str) -> TelemetryMap {
    let line = line.trim();
    let mut fields = TelemetryMap::new();

    if line.is_empty() || line == "ok" {
        return fields;
    }

    for segment in line.split(';') {
        let Some((key, value)) = segment.split_once(':') else {
            // Trailing empty segment after the final ';', or garbage.
            continue;
        };

        if INT_FIELDS.contains(&key) {
            match value.parse::<i64>() {
                Ok(v) => {
                    fields.insert(key.to_string(), TelemetryValue::Int(v));
                }
                Err(_) => {
                    log::warn!("[TELEMETRY] dropping field {}={:?}: not an integer", key, value);
                }
            }
        } else if FLOAT_FIELDS.contains(&key) {
            match value.parse::<f64>() {
                Ok(v) => {
                    fields.insert(key.to_string(), TelemetryValue::Float(v));
                }
                Err(_) => {
                    log::warn!("[TELEMETRY] dropping field {}={:?}: not a float", key, value);
                }
            }
        } else {
            fields.insert(key.to_string(), TelemetryValue::Text(value.to_string()));
        }
    }

    fields
}
