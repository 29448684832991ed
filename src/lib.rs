// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 rotorlink project

//! # rotorlink - UDP command link for Tello-family drones
//!
//! Client-side transport and correlation engine for the ASCII command
//! protocol spoken by Tello-family quadcopters: commands go out over UDP
//! to port 8889, acknowledgements come back on the same socket, and the
//! device pushes a key:value telemetry stream to port 8890.
//!
//! ## Quick start
//!
//! ```no_run
//! use rotorlink::{Device, MoveDirection};
//! use std::net::{IpAddr, Ipv4Addr};
//!
//! fn main() -> rotorlink::Result<()> {
//!     let mut drone = Device::new(IpAddr::V4(Ipv4Addr::new(192, 168, 10, 1)))?;
//!     drone.connect()?;
//!     drone.takeoff()?;
//!     drone.move_in(MoveDirection::Forward, 100)?;
//!     println!("battery: {:?}%", drone.battery_state());
//!     drone.land()?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//!  +---------+      +------------+      +-----------------+
//!  | Device  |----->| Dispatcher |----->| command socket  |--UDP--> :8889
//!  | session |      | pace/retry |      +-----------------+
//!  +---------+      +------------+               |
//!       |                 ^              recv (listener thread)
//!       | telemetry       | wait_response        v
//!       v                 |            +-------------------+
//!  +--------------+       +------------|   PeerRegistry    |
//!  | telemetry    |                    | queue + snapshot  |
//!  | snapshot     |<-------------------|   keyed by IP     |
//!  +--------------+   set_telemetry    +-------------------+
//!                                               ^
//!                                       recv (listener thread)
//!                                      +-----------------+
//!                          :8890 -UDP->| telemetry socket|
//!                                      +-----------------+
//! ```
//!
//! Both sockets belong to a process-shared [`Link`]; its two listener
//! threads route every inbound datagram by source IP through the
//! [`PeerRegistry`], so multiple devices on one network are kept apart
//! without any per-device sockets.
//!
//! ## Key types
//!
//! | Type | Role |
//! |------|------|
//! | [`Device`] | Per-drone session: lifecycle, command catalog, telemetry |
//! | [`Link`] | Shared sockets, registry and listener threads |
//! | [`Dispatcher`] | Pacing, response correlation and retry for one peer |
//! | [`PeerRegistry`] | Response queues and telemetry snapshots keyed by IP |
//! | [`TelemetryValue`] | One decoded telemetry field (int, float or text) |
//!
//! Logging goes through the `log` facade; install any `log`-compatible
//! backend to see it. The `trace` feature additionally logs every received
//! datagram, which is noisy at 10 Hz telemetry and off by default.

pub mod command;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod link;
pub mod registry;
pub mod session;
pub mod telemetry;
pub mod transport;

pub use command::{
    CameraDirection, FlipDirection, MoveDirection, PadDetection, RotateDirection, VideoFps,
    VideoResolution,
};
pub use dispatcher::Dispatcher;
pub use error::{Error, Result};
pub use link::{Link, LinkConfig};
pub use registry::PeerRegistry;
pub use session::{Device, SessionState};
pub use telemetry::{decode, TelemetryMap, TelemetryValue};
pub use transport::{CommandTransport, PeerAddress};

/// Per-datagram trace logging (only with the `trace` feature).
#[macro_export]
#[cfg(feature = "trace")]
macro_rules! trace_datagram {
    ($($arg:tt)*) => {
        log::debug!($($arg)*);
    };
}

/// No-op per-datagram trace macro (when the `trace` feature is disabled).
#[macro_export]
#[cfg(not(feature = "trace"))]
macro_rules! trace_datagram {
    ($($arg:tt)*) => {};
}
