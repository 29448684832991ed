// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 rotorlink project

//! Rotorlink Global Configuration - Single Source of Truth
//!
//! This module centralizes the wire-protocol constants and failure-handling
//! policy values. **NEVER hardcode these elsewhere!**
//!
//! Port numbers and timing values follow the vendor firmware contract:
//! the device listens for commands on 8889, broadcasts state on 8890 and
//! announces video on 11111. Commands sent less than 100 ms apart are
//! silently dropped by the firmware, hence [`COMMAND_SPACING`].

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

// =======================================================================
// Wire protocol ports
// =======================================================================

/// UDP port the device accepts commands on (and replies from).
///
/// The local command socket binds the same port number so replies reach
/// a predictable endpoint regardless of ephemeral-port policy.
pub const COMMAND_PORT: u16 = 8889;

/// UDP port the device broadcasts its state/telemetry stream to.
pub const TELEMETRY_PORT: u16 = 8890;

/// UDP port the device streams raw video to after `streamon`.
///
/// Video decoding is out of scope for this crate; the constant exists so
/// consumers can point a decoder at the right endpoint.
pub const VIDEO_STREAM_PORT: u16 = 11111;

/// Factory-default device address when joined to the device's own AP.
pub const DEFAULT_DEVICE_IP: IpAddr = IpAddr::V4(Ipv4Addr::new(192, 168, 10, 1));

// =======================================================================
// Failure handling policy
// =======================================================================

/// Default deadline for a command acknowledgement, measured from send.
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(8);

/// Minimum spacing between two commands to the same device.
///
/// The firmware drops commands that arrive closer together than this, so
/// the dispatcher blocks the caller for the remainder before sending.
pub const COMMAND_SPACING: Duration = Duration::from_millis(100);

/// Number of full send/await cycles an acknowledged command is attempted.
pub const RETRY_COUNT: u32 = 3;

/// Receive timeout on listener sockets.
///
/// Short enough that a listener observes its shutdown flag promptly,
/// long enough to stay off the CPU between datagrams.
pub const LISTENER_READ_TIMEOUT: Duration = Duration::from_millis(250);

/// Largest datagram either listener will accept.
///
/// Responses and state lines are short ASCII; 1 KiB matches the vendor
/// reference implementation.
pub const MAX_DATAGRAM_SIZE: usize = 1024;

// =======================================================================
// Protocol parameter ranges (validated before any I/O)
// =======================================================================

/// Accepted relative-move distance in centimeters.
pub const DISTANCE_RANGE: (i64, i64) = (20, 500);

/// Accepted rotation angle in degrees.
pub const ANGLE_RANGE: (i64, i64) = (0, 360);

/// Accepted `go` coordinate offsets in centimeters.
pub const COORDINATE_RANGE: (i64, i64) = (-500, 500);

/// Accepted speed in cm/s.
pub const SPEED_RANGE: (i64, i64) = (10, 100);

/// Accepted joystick channel deflection.
pub const JOYSTICK_RANGE: (i64, i64) = (-100, 100);

/// Accepted mission pad identifiers (`m1`..`m8`).
pub const MISSION_PAD_RANGE: (i64, i64) = (1, 8);

/// Accepted video bitrate selector: 0 = auto, 1-5 = Mbps.
pub const BITRATE_RANGE: (i64, i64) = (0, 5);

// =======================================================================
// Capability gates
// =======================================================================

/// Protocol version value reported by `sdk?` for SDK 3.0 firmware.
///
/// Commands introduced in SDK 3.0 (reboot, video tuning, port remapping)
/// are rejected locally when the cached version differs.
pub const SDK_VERSION_30: i64 = 30;

/// Hardware variant string reported by open-protocol flight controllers.
pub const HARDWARE_RMTT: &str = "RMTT";
