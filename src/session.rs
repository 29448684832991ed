// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 rotorlink project

//! Per-device session: lifecycle, command catalog, telemetry accessors.
//!
//! A [`Device`] binds one [`PeerAddress`] to the shared link and walks the
//! session state machine:
//!
//! ```text
//! Unconnected --connect()--> SdkActive --close()--> Closed
//!                               |
//!                               +-- streaming flag (orthogonal, stream_on/off)
//! ```
//!
//! Every cataloged command checks `SdkActive` first and fails fast with
//! [`Error::NotConnected`] before any I/O; commands gated on protocol
//! version or hardware variant check the values cached at connect time.
//! Command methods take `&mut self`: the correlation design allows one
//! command in flight per device, and exclusive borrows make concurrent
//! misuse a compile error instead of a protocol violation.

use crate::command::{
    self, CameraDirection, FlipDirection, MoveDirection, PadDetection, RotateDirection, VideoFps,
    VideoResolution,
};
use crate::config::{COMMAND_TIMEOUT, HARDWARE_RMTT, SDK_VERSION_30};
use crate::dispatcher::Dispatcher;
use crate::error::{Error, Result};
use crate::link::Link;
use crate::registry::PeerRegistry;
use crate::telemetry::TelemetryMap;
use crate::transport::{CommandTransport, PeerAddress};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

/// Negotiated per-session state, cached at connect time.
#[derive(Debug, Default, Clone)]
pub struct SessionState {
    /// Device acknowledged the mode-entry command.
    pub sdk_active: bool,
    /// Protocol version reported by `sdk?` (20 for 2.0, 30 for 3.0).
    pub sdk_version: Option<i64>,
    /// Hardware variant reported by `hardware?` (SDK 3.0 only).
    pub hardware: Option<String>,
    /// Video streaming currently enabled.
    pub streaming: bool,
}

/// Handle to one controlled device.
///
/// Construction registers the peer; [`Device::connect`] negotiates SDK
/// mode. Dropping the handle performs a best-effort [`Device::close`].
pub struct Device {
    peer: PeerAddress,
    dispatcher: Dispatcher,
    registry: Arc<PeerRegistry>,
    state: SessionState,
    timeout: Duration,
    closed: bool,
    // Keeps the listeners alive for the lifetime of the session.
    _link: Option<Arc<Link>>,
}

impl Device {
    /// Session for the device at `ip` over the process-wide shared link.
    pub fn new(ip: IpAddr) -> Result<Self> {
        let link = Link::shared()?;
        Ok(Self::with_link(PeerAddress::new(ip), link))
    }

    /// Session over an explicitly bound link (multi-homed setups, tests).
    #[must_use]
    pub fn with_link(peer: PeerAddress, link: Arc<Link>) -> Self {
        let dispatcher = Dispatcher::new(
            peer,
            link.command_socket() as Arc<dyn CommandTransport>,
            Arc::clone(link.registry()),
        );
        let registry = Arc::clone(link.registry());
        log::info!(
            "[SESSION] created for {} (command port {})",
            peer.ip,
            peer.command_port
        );
        Self {
            peer,
            dispatcher,
            registry,
            state: SessionState::default(),
            timeout: COMMAND_TIMEOUT,
            closed: false,
            _link: Some(link),
        }
    }

    #[cfg(test)]
    fn with_transport(
        peer: PeerAddress,
        transport: Arc<dyn CommandTransport>,
        registry: Arc<PeerRegistry>,
    ) -> Self {
        let dispatcher = Dispatcher::new(peer, transport, Arc::clone(&registry));
        Self {
            peer,
            dispatcher,
            registry,
            state: SessionState::default(),
            timeout: COMMAND_TIMEOUT,
            closed: false,
            _link: None,
        }
    }

    /// Override the per-command response deadline.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Enter SDK mode and cache the device's capabilities.
    ///
    /// Sends the mode-entry command; on acknowledgement marks the session
    /// `SdkActive`, then queries protocol version and (on SDK 3.0) the
    /// hardware variant. Capability queries that fail are logged, not
    /// fatal. On failure the session stays Unconnected.
    pub fn connect(&mut self) -> Result<()> {
        log::debug!("[SESSION] initiating SDK mode for {}", self.peer.ip);
        if !self.dispatcher.send_command("command", self.timeout) {
            log::error!(
                "[SESSION] failed to enter SDK mode for {}: verify the Wi-Fi connection",
                self.peer.ip
            );
            return Err(Error::ConnectFailed);
        }
        self.state.sdk_active = true;
        log::info!("[SESSION] SDK mode active for {}", self.peer.ip);

        match self.query_int("sdk?", "sdk version") {
            Ok(version) => {
                log::info!("[SESSION] protocol version: {}", version);
                self.state.sdk_version = Some(version);
            }
            Err(e) => log::warn!("[SESSION] could not read protocol version: {}", e),
        }

        if self.state.sdk_version == Some(SDK_VERSION_30) {
            match self.query_raw("hardware?") {
                Ok(hardware) => {
                    log::info!("[SESSION] hardware: {}", hardware);
                    self.state.hardware = Some(hardware);
                }
                Err(e) => log::warn!("[SESSION] could not read hardware variant: {}", e),
            }
        }

        match self.query_int("battery?", "battery") {
            Ok(battery) => log::info!("[SESSION] battery: {}%", battery),
            Err(e) => log::warn!("[SESSION] could not read battery: {}", e),
        }

        Ok(())
    }

    /// Best-effort teardown: land, stop streaming, mark the session closed.
    ///
    /// Never fails; unacknowledged teardown commands are logged and
    /// ignored. Also invoked from `Drop`.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        if self.state.sdk_active {
            if !self.dispatcher.send_command("land", self.timeout) {
                log::debug!("[SESSION] best-effort land not acknowledged");
            }
            if !self.dispatcher.send_command("streamoff", self.timeout) {
                log::debug!("[SESSION] best-effort streamoff not acknowledged");
            }
        }
        self.state = SessionState::default();
        self.closed = true;
        log::info!("[SESSION] closed {}", self.peer.ip);
    }

    /// Whether the session negotiated SDK mode.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state.sdk_active
    }

    /// Whether video streaming is currently enabled.
    #[must_use]
    pub fn is_streaming(&self) -> bool {
        self.state.streaming
    }

    /// Protocol version cached at connect time.
    #[must_use]
    pub fn sdk_version(&self) -> Option<i64> {
        self.state.sdk_version
    }

    /// Hardware variant cached at connect time (SDK 3.0 only).
    #[must_use]
    pub fn hardware(&self) -> Option<&str> {
        self.state.hardware.as_deref()
    }

    /// Peer this session controls.
    #[must_use]
    pub fn peer(&self) -> PeerAddress {
        self.peer
    }

    // ========================================================================
    // Raw primitives (consumer-facing seam for external command builders)
    // ========================================================================

    /// Send a raw protocol string and wait for the acknowledgement,
    /// retrying per policy. No SDK-mode gate: this is the low-level seam.
    pub fn send_command(&mut self, command: &str) -> bool {
        self.dispatcher.send_command(command, self.timeout)
    }

    /// Send a raw protocol string and return the raw response.
    pub fn send_and_await(&mut self, command: &str, timeout: Duration) -> Result<String> {
        self.dispatcher.send_and_await(command, timeout)
    }

    // ========================================================================
    // Flight commands
    // ========================================================================

    /// Auto takeoff.
    pub fn takeoff(&mut self) -> Result<()> {
        self.acked("takeoff".to_string())
    }

    /// Auto landing.
    pub fn land(&mut self) -> Result<()> {
        self.acked("land".to_string())
    }

    /// Stop all motors immediately.
    pub fn emergency(&mut self) -> Result<()> {
        self.acked("emergency".to_string())
    }

    /// Spin the motors at low speed without taking off (SDK 3.0).
    pub fn motor_on(&mut self) -> Result<()> {
        self.ensure_sdk_active()?;
        self.ensure_sdk_30("motoron")?;
        self.acked("motoron".to_string())
    }

    /// Leave motor-on mode (SDK 3.0).
    pub fn motor_off(&mut self) -> Result<()> {
        self.ensure_sdk_active()?;
        self.ensure_sdk_30("motoroff")?;
        self.acked("motoroff".to_string())
    }

    /// Launch by throwing the device within two seconds.
    pub fn throw_and_fly(&mut self) -> Result<()> {
        self.acked("throwfly".to_string())
    }

    /// Move `distance` centimeters along `direction` (20-500 cm).
    pub fn move_in(&mut self, direction: MoveDirection, distance: i64) -> Result<()> {
        self.ensure_sdk_active()?;
        self.acked(command::move_in(direction, distance)?)
    }

    /// Ascend (20-500 cm).
    pub fn move_up(&mut self, distance: i64) -> Result<()> {
        self.move_in(MoveDirection::Up, distance)
    }

    /// Descend (20-500 cm).
    pub fn move_down(&mut self, distance: i64) -> Result<()> {
        self.move_in(MoveDirection::Down, distance)
    }

    /// Strafe left (20-500 cm).
    pub fn move_left(&mut self, distance: i64) -> Result<()> {
        self.move_in(MoveDirection::Left, distance)
    }

    /// Strafe right (20-500 cm).
    pub fn move_right(&mut self, distance: i64) -> Result<()> {
        self.move_in(MoveDirection::Right, distance)
    }

    /// Fly forward (20-500 cm).
    pub fn move_forward(&mut self, distance: i64) -> Result<()> {
        self.move_in(MoveDirection::Forward, distance)
    }

    /// Fly backward (20-500 cm).
    pub fn move_back(&mut self, distance: i64) -> Result<()> {
        self.move_in(MoveDirection::Back, distance)
    }

    /// Rotate clockwise by `angle` degrees (0-360).
    pub fn rotate_clockwise(&mut self, angle: i64) -> Result<()> {
        self.ensure_sdk_active()?;
        self.acked(command::rotate(RotateDirection::Clockwise, angle)?)
    }

    /// Rotate counterclockwise by `angle` degrees (0-360).
    pub fn rotate_counterclockwise(&mut self, angle: i64) -> Result<()> {
        self.ensure_sdk_active()?;
        self.acked(command::rotate(RotateDirection::CounterClockwise, angle)?)
    }

    /// Flip in the given direction.
    pub fn flip(&mut self, direction: FlipDirection) -> Result<()> {
        self.acked(command::flip(direction))
    }

    /// Fly to relative coordinates at the given speed.
    pub fn go_to(&mut self, x: i64, y: i64, z: i64, speed: i64) -> Result<()> {
        self.ensure_sdk_active()?;
        self.acked(command::go(x, y, z, speed, None)?)
    }

    /// Fly to coordinates in the frame of mission pad `pad` (1-8).
    pub fn go_to_pad(&mut self, x: i64, y: i64, z: i64, speed: i64, pad: i64) -> Result<()> {
        self.ensure_sdk_active()?;
        self.acked(command::go(x, y, z, speed, Some(pad))?)
    }

    /// Joystick-style channel control, -100..100 per channel.
    ///
    /// Unacknowledged by the firmware: written straight to the socket with
    /// no response wait and no retry.
    pub fn rc_control(&mut self, roll: i64, pitch: i64, yaw: i64, throttle: i64) -> Result<()> {
        self.ensure_sdk_active()?;
        self.dispatcher
            .send_unacknowledged(&command::joystick(roll, pitch, yaw, throttle)?)
    }

    /// Reboot the device (SDK 3.0). Unacknowledged by the firmware.
    pub fn reboot(&mut self) -> Result<()> {
        self.ensure_sdk_active()?;
        self.ensure_sdk_30("reboot")?;
        self.dispatcher.send_unacknowledged("reboot")
    }

    // ========================================================================
    // Configuration commands
    // ========================================================================

    /// Set cruising speed, 10-100 cm/s.
    pub fn set_speed(&mut self, speed: i64) -> Result<()> {
        self.ensure_sdk_active()?;
        self.acked(command::set_speed(speed)?)
    }

    /// Join the given Wi-Fi access point (station mode).
    pub fn set_wifi(&mut self, ssid: &str, password: &str) -> Result<()> {
        self.acked(format!("wifi {} {}", ssid, password))
    }

    /// Reconfigure the device's own access point credentials.
    pub fn set_access_point(&mut self, ssid: &str, password: &str) -> Result<()> {
        self.acked(format!("ap {} {}", ssid, password))
    }

    /// Select the AP Wi-Fi channel (open-protocol flight controllers only).
    pub fn set_wifi_channel(&mut self, channel: i64) -> Result<()> {
        self.ensure_sdk_active()?;
        self.ensure_rmtt("wifisetchannel")?;
        self.acked(format!("wifisetchannel {}", channel))
    }

    /// Enable mission pad detection.
    pub fn mission_pads_on(&mut self) -> Result<()> {
        self.acked("mon".to_string())
    }

    /// Disable mission pad detection.
    pub fn mission_pads_off(&mut self) -> Result<()> {
        self.acked("moff".to_string())
    }

    /// Choose which cameras look for mission pads.
    pub fn set_mission_detection(&mut self, direction: PadDetection) -> Result<()> {
        self.acked(command::mission_detection(direction))
    }

    /// Remap the response and video UDP ports (SDK 3.0).
    pub fn remap_ports(&mut self, response_port: u16, video_port: u16) -> Result<()> {
        self.ensure_sdk_active()?;
        self.ensure_sdk_30("port")?;
        self.acked(format!("port {} {}", response_port, video_port))
    }

    // ========================================================================
    // Video stream control (decoding is out of scope; see config docs)
    // ========================================================================

    /// Enable the video stream and set the streaming flag.
    pub fn stream_on(&mut self) -> Result<()> {
        self.acked("streamon".to_string())?;
        self.state.streaming = true;
        log::info!("[SESSION] video stream enabled for {}", self.peer.ip);
        Ok(())
    }

    /// Disable the video stream and clear the streaming flag.
    pub fn stream_off(&mut self) -> Result<()> {
        self.acked("streamoff".to_string())?;
        self.state.streaming = false;
        log::info!("[SESSION] video stream disabled for {}", self.peer.ip);
        Ok(())
    }

    /// Video frame rate preset (SDK 3.0).
    pub fn set_fps(&mut self, fps: VideoFps) -> Result<()> {
        self.ensure_sdk_active()?;
        self.ensure_sdk_30("setfps")?;
        self.acked(command::set_fps(fps))
    }

    /// Video bitrate selector, 0 = auto, 1-5 Mbps (SDK 3.0).
    pub fn set_bitrate(&mut self, mbps: i64) -> Result<()> {
        self.ensure_sdk_active()?;
        self.ensure_sdk_30("setbitrate")?;
        self.acked(command::set_bitrate(mbps)?)
    }

    /// Video resolution preset (SDK 3.0).
    pub fn set_resolution(&mut self, resolution: VideoResolution) -> Result<()> {
        self.ensure_sdk_active()?;
        self.ensure_sdk_30("setresolution")?;
        self.acked(command::set_resolution(resolution))
    }

    /// Switch between the forward and downward camera (SDK 3.0).
    pub fn set_video_direction(&mut self, direction: CameraDirection) -> Result<()> {
        self.ensure_sdk_active()?;
        self.ensure_sdk_30("downvision")?;
        self.acked(command::video_direction(direction))
    }

    // ========================================================================
    // Query commands (round-trip to the device)
    // ========================================================================

    /// Battery percentage via `battery?`.
    pub fn battery(&mut self) -> Result<i64> {
        self.query_int("battery?", "battery")
    }

    /// Configured cruising speed via `speed?` (not the current velocity).
    pub fn speed_setting(&mut self) -> Result<f64> {
        self.query_float("speed?", "speed")
    }

    /// Accumulated motor time in seconds via `time?`.
    pub fn flight_time(&mut self) -> Result<i64> {
        self.ensure_sdk_active()?;
        let raw = self.query_raw("time?")?;
        // SDK 3.0 suffixes the unit: "12s".
        raw.trim_end_matches('s')
            .parse()
            .map_err(|_| Error::FieldParse {
                field: "time",
                raw,
            })
    }

    /// Signal-to-noise ratio of the Wi-Fi link via `wifi?`.
    pub fn wifi_snr(&mut self) -> Result<String> {
        self.ensure_sdk_active()?;
        self.query_raw("wifi?")
    }

    /// Firmware serial number via `sn?`.
    pub fn serial_number(&mut self) -> Result<String> {
        self.ensure_sdk_active()?;
        self.query_raw("sn?")
    }

    /// Wi-Fi module firmware version (open-protocol controllers only).
    pub fn wifi_version(&mut self) -> Result<String> {
        self.ensure_sdk_active()?;
        self.ensure_rmtt("wifiversion?")?;
        self.query_raw("wifiversion?")
    }

    /// SSID and password of the joined access point via `ap?`
    /// (open-protocol controllers only).
    pub fn access_point(&mut self) -> Result<String> {
        self.ensure_sdk_active()?;
        self.ensure_rmtt("ap?")?;
        self.query_raw("ap?")
    }

    /// SSID the device's own access point advertises via `ssid?`
    /// (open-protocol controllers only).
    pub fn ssid(&mut self) -> Result<String> {
        self.ensure_sdk_active()?;
        self.ensure_rmtt("ssid?")?;
        self.query_raw("ssid?")
    }

    // ========================================================================
    // Telemetry accessors (read the latest snapshot, no device round-trip)
    // ========================================================================

    /// Latest decoded telemetry snapshot (empty until the first datagram).
    #[must_use]
    pub fn state(&self) -> TelemetryMap {
        self.registry.telemetry(self.peer.ip)
    }

    /// Battery percentage from telemetry.
    #[must_use]
    pub fn battery_state(&self) -> Option<i64> {
        self.state_int("bat")
    }

    /// Relative height in cm from telemetry.
    #[must_use]
    pub fn height(&self) -> Option<i64> {
        self.state_int("h")
    }

    /// Time-of-flight distance in cm from telemetry.
    #[must_use]
    pub fn tof_distance(&self) -> Option<i64> {
        self.state_int("tof")
    }

    /// Barometer altitude in cm from telemetry.
    #[must_use]
    pub fn barometer(&self) -> Option<f64> {
        self.state_float("baro")
    }

    /// (pitch, roll, yaw) in degrees from telemetry.
    #[must_use]
    pub fn attitude(&self) -> Option<(i64, i64, i64)> {
        Some((
            self.state_int("pitch")?,
            self.state_int("roll")?,
            self.state_int("yaw")?,
        ))
    }

    /// Ground speed components (vgx, vgy, vgz) in cm/s from telemetry.
    #[must_use]
    pub fn ground_speed(&self) -> Option<(i64, i64, i64)> {
        Some((
            self.state_int("vgx")?,
            self.state_int("vgy")?,
            self.state_int("vgz")?,
        ))
    }

    /// Acceleration components (agx, agy, agz) in cm/s^2 from telemetry.
    #[must_use]
    pub fn acceleration(&self) -> Option<(f64, f64, f64)> {
        Some((
            self.state_float("agx")?,
            self.state_float("agy")?,
            self.state_float("agz")?,
        ))
    }

    /// Detected mission pad id from telemetry (`-1` when none visible).
    #[must_use]
    pub fn mission_pad(&self) -> Option<i64> {
        self.state_int("mid")
    }

    /// Position relative to the detected mission pad, in cm.
    #[must_use]
    pub fn mission_pad_position(&self) -> Option<(i64, i64, i64)> {
        Some((
            self.state_int("x")?,
            self.state_int("y")?,
            self.state_int("z")?,
        ))
    }

    /// Orientation relative to the detected mission pad as
    /// (pitch, roll, yaw) in degrees.
    ///
    /// The firmware packs the three angles into one comma-separated
    /// `mpry` field, unlike every other telemetry key.
    #[must_use]
    pub fn mission_pad_orientation(&self) -> Option<(i64, i64, i64)> {
        let snapshot = self.registry.telemetry(self.peer.ip);
        let raw = snapshot.get("mpry")?.as_text()?;
        let mut angles = raw.split(',').map(|part| part.trim().parse::<i64>());
        let pitch = angles.next()?.ok()?;
        let roll = angles.next()?.ok()?;
        let yaw = angles.next()?.ok()?;
        Some((pitch, roll, yaw))
    }

    /// Lowest motor temperature in degrees Celsius from telemetry.
    #[must_use]
    pub fn temperature_low(&self) -> Option<i64> {
        self.state_int("templ")
    }

    /// Highest motor temperature in degrees Celsius from telemetry.
    #[must_use]
    pub fn temperature_high(&self) -> Option<i64> {
        self.state_int("temph")
    }

    // ========================================================================
    // Internal helpers
    // ========================================================================

    /// Gate + acknowledged dispatch shared by the whole catalog.
    fn acked(&mut self, command: String) -> Result<()> {
        self.ensure_sdk_active()?;
        if self.dispatcher.send_command(&command, self.timeout) {
            Ok(())
        } else {
            Err(Error::CommandFailed {
                command,
                attempts: self.dispatcher.retry_count(),
            })
        }
    }

    fn query_raw(&mut self, command: &str) -> Result<String> {
        self.ensure_sdk_active()?;
        self.dispatcher.send_and_await(command, self.timeout)
    }

    fn query_int(&mut self, command: &str, field: &'static str) -> Result<i64> {
        let raw = self.query_raw(command)?;
        raw.trim().parse().map_err(|_| Error::FieldParse { field, raw })
    }

    fn query_float(&mut self, command: &str, field: &'static str) -> Result<f64> {
        let raw = self.query_raw(command)?;
        raw.trim().parse().map_err(|_| Error::FieldParse { field, raw })
    }

    fn state_int(&self, key: &str) -> Option<i64> {
        self.registry.telemetry(self.peer.ip).get(key)?.as_int()
    }

    fn state_float(&self, key: &str) -> Option<f64> {
        self.registry.telemetry(self.peer.ip).get(key)?.as_float()
    }

    fn ensure_sdk_active(&self) -> Result<()> {
        if self.state.sdk_active {
            Ok(())
        } else {
            Err(Error::NotConnected)
        }
    }

    fn ensure_sdk_30(&self, what: &'static str) -> Result<()> {
        if self.state.sdk_version == Some(SDK_VERSION_30) {
            Ok(())
        } else {
            Err(Error::Unsupported {
                what,
                requirement: "SDK 3.0 firmware",
            })
        }
    }

    fn ensure_rmtt(&self, what: &'static str) -> Result<()> {
        if self.state.hardware.as_deref() == Some(HARDWARE_RMTT) {
            Ok(())
        } else {
            Err(Error::Unsupported {
                what,
                requirement: "RMTT hardware",
            })
        }
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::io;
    use std::net::{Ipv4Addr, SocketAddr};

    const PEER_IP: IpAddr = IpAddr::V4(Ipv4Addr::new(192, 168, 10, 1));

    /// In-process device double: acks every command, answers queries from
    /// a small table, records everything it was sent.
    struct FakeWire {
        registry: Arc<PeerRegistry>,
        sent: Mutex<Vec<String>>,
        hardware: &'static str,
    }

    impl FakeWire {
        fn new(registry: Arc<PeerRegistry>, hardware: &'static str) -> Self {
            Self {
                registry,
                sent: Mutex::new(Vec::new()),
                hardware,
            }
        }

        fn sent(&self) -> Vec<String> {
            self.sent.lock().clone()
        }

        fn reply_for(&self, command: &str) -> &'static [u8] {
            match command {
                "sdk?" => b"30",
                "battery?" => b"87",
                "hardware?" => {
                    if self.hardware == "RMTT" {
                        b"RMTT"
                    } else {
                        b"TELLO"
                    }
                }
                "speed?" => b"100.0",
                "time?" => b"12s",
                "sn?" => b"0TQZK7AED00F42",
                "wifi?" => b"90",
                "wifiversion?" => b"wifiv1.0.0.0",
                "ap?" => b"fieldnet 12345678",
                "ssid?" => b"RMTT-C3P0",
                _ => b"ok\r\n",
            }
        }
    }

    impl CommandTransport for FakeWire {
        fn send_to(&self, payload: &[u8], _dest: SocketAddr) -> io::Result<usize> {
            let command = String::from_utf8(payload.to_vec()).expect("commands are UTF-8");
            let reply = self.reply_for(&command);
            self.sent.lock().push(command);
            // rc and reboot are unacknowledged: replying anyway would
            // poison the next command's correlation, as on real firmware.
            self.registry.append_response(PEER_IP, reply.to_vec());
            Ok(payload.len())
        }
    }

    fn session(hardware: &'static str) -> (Device, Arc<FakeWire>) {
        let registry = Arc::new(PeerRegistry::new());
        let wire = Arc::new(FakeWire::new(Arc::clone(&registry), hardware));
        let device = Device::with_transport(
            PeerAddress::new(PEER_IP),
            Arc::clone(&wire) as Arc<dyn CommandTransport>,
            registry,
        )
        .with_timeout(Duration::from_secs(1));
        (device, wire)
    }

    #[test]
    fn commands_before_connect_fail_fast_with_zero_bytes() {
        let (mut device, wire) = session("TELLO");
        assert!(matches!(device.takeoff(), Err(Error::NotConnected)));
        assert!(matches!(device.move_forward(100), Err(Error::NotConnected)));
        assert!(matches!(device.battery(), Err(Error::NotConnected)));
        assert!(wire.sent().is_empty());
        device.close();
    }

    #[test]
    fn connect_negotiates_and_caches_capabilities() {
        let (mut device, wire) = session("TELLO");
        device.connect().expect("connect should succeed");
        assert!(device.is_connected());
        assert_eq!(device.sdk_version(), Some(30));
        assert_eq!(device.hardware(), Some("TELLO"));

        let sent = wire.sent();
        assert_eq!(sent[0], "command");
        assert!(sent.contains(&"sdk?".to_string()));
        assert!(sent.contains(&"hardware?".to_string()));
        assert!(sent.contains(&"battery?".to_string()));
        device.close();
    }

    #[test]
    fn out_of_range_move_is_rejected_before_io() {
        let (mut device, wire) = session("TELLO");
        device.connect().expect("connect");
        let sends_after_connect = wire.sent().len();

        let err = device.move_forward(600).unwrap_err();
        assert!(matches!(err, Error::OutOfRange { value: 600, .. }));
        assert_eq!(wire.sent().len(), sends_after_connect, "zero bytes sent");

        device.move_forward(100).expect("in-range move");
        assert_eq!(wire.sent().last().unwrap(), "forward 100");
        device.close();
    }

    #[test]
    fn version_gated_commands_check_cached_capabilities() {
        let (mut device, _) = session("TELLO");
        device.connect().expect("connect");
        // SDK 3.0 present, RMTT hardware absent.
        assert!(device.set_bitrate(3).is_ok());
        assert!(matches!(
            device.set_wifi_channel(6),
            Err(Error::Unsupported { .. })
        ));
        assert!(matches!(
            device.wifi_version(),
            Err(Error::Unsupported { .. })
        ));
        device.close();
    }

    #[test]
    fn rmtt_hardware_unlocks_wifi_commands() {
        let (mut device, wire) = session("RMTT");
        device.connect().expect("connect");
        assert_eq!(device.hardware(), Some("RMTT"));
        device.set_wifi_channel(6).expect("rmtt command");
        assert!(wire.sent().contains(&"wifisetchannel 6".to_string()));
        device.close();
    }

    #[test]
    fn access_point_queries_need_rmtt_hardware() {
        let (mut device, _) = session("TELLO");
        device.connect().expect("connect");
        assert!(matches!(device.access_point(), Err(Error::Unsupported { .. })));
        assert!(matches!(device.ssid(), Err(Error::Unsupported { .. })));
        device.close();

        let (mut device, _) = session("RMTT");
        device.connect().expect("connect");
        assert_eq!(device.access_point().unwrap(), "fieldnet 12345678");
        assert_eq!(device.ssid().unwrap(), "RMTT-C3P0");
        device.close();
    }

    #[test]
    fn queries_convert_types() {
        let (mut device, _) = session("TELLO");
        device.connect().expect("connect");
        assert_eq!(device.battery().unwrap(), 87);
        assert_eq!(device.speed_setting().unwrap(), 100.0);
        assert_eq!(device.flight_time().unwrap(), 12);
        assert_eq!(device.serial_number().unwrap(), "0TQZK7AED00F42");
        device.close();
    }

    #[test]
    fn streaming_is_an_orthogonal_flag() {
        let (mut device, _) = session("TELLO");
        device.connect().expect("connect");
        assert!(!device.is_streaming());
        device.stream_on().expect("stream on");
        assert!(device.is_streaming());
        assert!(device.is_connected());
        device.stream_off().expect("stream off");
        assert!(!device.is_streaming());
        device.close();
    }

    #[test]
    fn close_sends_best_effort_teardown() {
        let (mut device, wire) = session("TELLO");
        device.connect().expect("connect");
        device.close();
        let sent = wire.sent();
        assert!(sent.contains(&"land".to_string()));
        assert!(sent.contains(&"streamoff".to_string()));
        assert!(!device.is_connected());

        // Idempotent: closing again sends nothing.
        let count = wire.sent().len();
        device.close();
        assert_eq!(wire.sent().len(), count);
    }

    #[test]
    fn telemetry_getters_read_latest_snapshot() {
        let (device, _) = session("TELLO");
        let snapshot = crate::telemetry::decode(
            "mid:-1;x:0;y:0;z:0;pitch:3;roll:-2;yaw:51;vgx:1;vgy:2;vgz:3;templ:63;temph:65;tof:10;h:40;bat:87;baro:163.91;time:0;agx:-14.00;agy:7.00;agz:-998.00;",
        );
        device.registry.set_telemetry(PEER_IP, snapshot);

        assert_eq!(device.battery_state(), Some(87));
        assert_eq!(device.height(), Some(40));
        assert_eq!(device.attitude(), Some((3, -2, 51)));
        assert_eq!(device.ground_speed(), Some((1, 2, 3)));
        assert_eq!(device.barometer(), Some(163.91));
        assert_eq!(device.acceleration(), Some((-14.0, 7.0, -998.0)));
        assert_eq!(device.mission_pad(), Some(-1));
        assert_eq!(device.temperature_low(), Some(63));
        assert_eq!(device.temperature_high(), Some(65));
    }

    #[test]
    fn mission_pad_orientation_unpacks_the_packed_field() {
        let (device, _) = session("TELLO");
        let snapshot = crate::telemetry::decode("mid:3;mpry:5,-10,90;bat:87;");
        device.registry.set_telemetry(PEER_IP, snapshot);
        assert_eq!(device.mission_pad_orientation(), Some((5, -10, 90)));

        // No pad detected: mpry absent entirely.
        let snapshot = crate::telemetry::decode("mid:-1;bat:87;");
        device.registry.set_telemetry(PEER_IP, snapshot);
        assert_eq!(device.mission_pad_orientation(), None);
    }

    #[test]
    fn rc_control_validates_before_direct_send() {
        let (mut device, wire) = session("TELLO");
        device.connect().expect("connect");
        let before = wire.sent().len();

        assert!(matches!(
            device.rc_control(0, 0, 0, 101),
            Err(Error::OutOfRange { .. })
        ));
        assert_eq!(wire.sent().len(), before);

        device.rc_control(10, -20, 30, -40).expect("rc send");
        assert_eq!(wire.sent().last().unwrap(), "rc 10 -20 -40 30");
        device.close();
    }
}
