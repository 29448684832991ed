// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 rotorlink project

//! Crate-wide error taxonomy.
//!
//! The variants split along the recovery policy boundary:
//!
//! - `CommandTimeout` / `ResponseDecode` are transient network-layer
//!   failures; [`Dispatcher::send_command`](crate::Dispatcher::send_command)
//!   retries them a bounded number of times.
//! - `NotConnected` / `Unsupported` / `OutOfRange` are caller-fixable and
//!   raised before any byte leaves the process; they are never retried.
//! - `Bind` / `Send` are socket failures surfaced verbatim.
//!
//! A listener socket failure has no variant of its own: the worker logs and
//! exits, and every later command surfaces as `CommandTimeout` (documented
//! degraded mode, not a crash).

use std::io;
use std::time::Duration;

/// Error type for all fallible rotorlink operations.
#[derive(Debug)]
pub enum Error {
    // ========================================================================
    // Transient network-layer failures (retried by send_command)
    // ========================================================================
    /// No response arrived within the deadline measured from send.
    CommandTimeout {
        /// Command string that went unanswered.
        command: String,
        /// Deadline that elapsed.
        timeout: Duration,
    },
    /// Response bytes were not valid UTF-8.
    ResponseDecode {
        /// Command whose response could not be decoded.
        command: String,
    },
    /// All retry attempts exhausted without an `ok` acknowledgement.
    CommandFailed {
        /// Command string that was rejected or unanswered.
        command: String,
        /// Number of full send/await cycles attempted.
        attempts: u32,
    },

    // ========================================================================
    // Caller-fixable capability and validation failures (never retried)
    // ========================================================================
    /// Command issued before the session entered SDK mode.
    NotConnected,
    /// Command not available on the negotiated protocol version or hardware.
    Unsupported {
        /// Operation that was rejected.
        what: &'static str,
        /// Human-readable requirement, e.g. `"SDK 3.0"` or `"RMTT hardware"`.
        requirement: &'static str,
    },
    /// Numeric parameter outside the protocol's accepted range.
    OutOfRange {
        /// Parameter name.
        what: &'static str,
        /// Rejected value.
        value: i64,
        /// Inclusive lower bound.
        min: i64,
        /// Inclusive upper bound.
        max: i64,
    },

    // ========================================================================
    // Session and query failures
    // ========================================================================
    /// The mode-entry command was not acknowledged; session stays unconnected.
    ConnectFailed,
    /// A query response did not convert to its expected numeric type.
    FieldParse {
        /// Query field that failed conversion.
        field: &'static str,
        /// Raw response text.
        raw: String,
    },

    // ========================================================================
    // Transport errors
    // ========================================================================
    /// Failed to bind a local socket or start its listener.
    Bind(io::Error),
    /// A datagram send failed.
    Send(io::Error),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::CommandTimeout { command, timeout } => write!(
                f,
                "no response to '{}' within {:?}",
                command, timeout
            ),
            Error::ResponseDecode { command } => {
                write!(f, "response to '{}' was not valid UTF-8", command)
            }
            Error::CommandFailed { command, attempts } => write!(
                f,
                "command '{}' not acknowledged after {} attempts",
                command, attempts
            ),
            Error::NotConnected => {
                write!(f, "not in SDK mode: call connect() first")
            }
            Error::Unsupported { what, requirement } => {
                write!(f, "'{}' requires {}", what, requirement)
            }
            Error::OutOfRange {
                what,
                value,
                min,
                max,
            } => write!(
                f,
                "{} value {} out of range {}..={}",
                what, value, min, max
            ),
            Error::ConnectFailed => {
                write!(f, "failed to enter SDK mode: verify the Wi-Fi connection")
            }
            Error::FieldParse { field, raw } => {
                write!(f, "could not convert '{}' response: {:?}", field, raw)
            }
            Error::Bind(e) => write!(f, "bind failed: {}", e),
            Error::Send(e) => write!(f, "send failed: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Bind(e) | Error::Send(e) => Some(e),
            _ => None,
        }
    }
}

/// Convenient alias for API results using the public [`Error`] type.
pub type Result<T> = std::result::Result<T, Error>;

/// Check a numeric parameter against an inclusive range before any I/O.
pub(crate) fn check_range(what: &'static str, value: i64, range: (i64, i64)) -> Result<()> {
    let (min, max) = range;
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(Error::OutOfRange {
            what,
            value,
            min,
            max,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_check_accepts_bounds() {
        assert!(check_range("distance", 20, (20, 500)).is_ok());
        assert!(check_range("distance", 500, (20, 500)).is_ok());
    }

    #[test]
    fn range_check_rejects_outside() {
        let err = check_range("distance", 600, (20, 500)).unwrap_err();
        match err {
            Error::OutOfRange { what, value, min, max } => {
                assert_eq!(what, "distance");
                assert_eq!(value, 600);
                assert_eq!((min, max), (20, 500));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn timeout_displays_command() {
        let err = Error::CommandTimeout {
            command: "takeoff".to_string(),
            timeout: Duration::from_secs(8),
        };
        assert!(err.to_string().contains("takeoff"));
    }
}
