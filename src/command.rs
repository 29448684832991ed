// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 rotorlink project

//! Typed command builders.
//!
//! Pure translation from typed parameters to protocol strings, with every
//! numeric range validated before any I/O. Builders never touch the
//! network: the session layer feeds their output to the dispatcher.

use crate::config::{
    ANGLE_RANGE, BITRATE_RANGE, COORDINATE_RANGE, DISTANCE_RANGE, JOYSTICK_RANGE,
    MISSION_PAD_RANGE, SPEED_RANGE,
};
use crate::error::{check_range, Result};

/// Relative movement axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveDirection {
    Up,
    Down,
    Left,
    Right,
    Forward,
    Back,
}

impl MoveDirection {
    fn token(self) -> &'static str {
        match self {
            MoveDirection::Up => "up",
            MoveDirection::Down => "down",
            MoveDirection::Left => "left",
            MoveDirection::Right => "right",
            MoveDirection::Forward => "forward",
            MoveDirection::Back => "back",
        }
    }
}

/// Yaw rotation sense.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotateDirection {
    Clockwise,
    CounterClockwise,
}

impl RotateDirection {
    fn token(self) -> &'static str {
        match self {
            RotateDirection::Clockwise => "cw",
            RotateDirection::CounterClockwise => "ccw",
        }
    }
}

/// Flip direction (single-letter on the wire).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlipDirection {
    Left,
    Right,
    Forward,
    Back,
}

impl FlipDirection {
    fn token(self) -> &'static str {
        match self {
            FlipDirection::Left => "l",
            FlipDirection::Right => "r",
            FlipDirection::Forward => "f",
            FlipDirection::Back => "b",
        }
    }
}

/// Mission pad detection direction for `mdirection`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PadDetection {
    Downward,
    Forward,
    Both,
}

impl PadDetection {
    fn code(self) -> u8 {
        match self {
            PadDetection::Downward => 0,
            PadDetection::Forward => 1,
            PadDetection::Both => 2,
        }
    }
}

/// Camera feed selected by `downvision`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraDirection {
    Forward,
    Downward,
}

impl CameraDirection {
    fn code(self) -> u8 {
        match self {
            CameraDirection::Forward => 0,
            CameraDirection::Downward => 1,
        }
    }
}

/// Frame rate presets for `setfps`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoFps {
    High,
    Middle,
    Low,
}

impl VideoFps {
    fn token(self) -> &'static str {
        match self {
            VideoFps::High => "high",
            VideoFps::Middle => "middle",
            VideoFps::Low => "low",
        }
    }
}

/// Resolution presets for `setresolution`: 720p or 480p.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoResolution {
    High,
    Low,
}

impl VideoResolution {
    fn token(self) -> &'static str {
        match self {
            VideoResolution::High => "high",
            VideoResolution::Low => "low",
        }
    }
}

/// `up/down/left/right/forward/back <distance>` - distance in cm.
pub fn move_in(direction: MoveDirection, distance: i64) -> Result<String> {
    check_range("distance", distance, DISTANCE_RANGE)?;
    Ok(format!("{} {}", direction.token(), distance))
}

/// `cw/ccw <angle>` - angle in degrees.
pub fn rotate(direction: RotateDirection, angle: i64) -> Result<String> {
    check_range("angle", angle, ANGLE_RANGE)?;
    Ok(format!("{} {}", direction.token(), angle))
}

/// `flip <l|r|f|b>`.
#[must_use]
pub fn flip(direction: FlipDirection) -> String {
    format!("flip {}", direction.token())
}

/// `go <x> <y> <z> <speed> [m1..m8]` - relative coordinates, optional
/// mission pad frame of reference.
pub fn go(x: i64, y: i64, z: i64, speed: i64, pad: Option<i64>) -> Result<String> {
    check_range("speed", speed, SPEED_RANGE)?;
    check_range("x", x, COORDINATE_RANGE)?;
    check_range("y", y, COORDINATE_RANGE)?;
    check_range("z", z, COORDINATE_RANGE)?;
    match pad {
        Some(pad) => {
            check_range("mission pad", pad, MISSION_PAD_RANGE)?;
            Ok(format!("go {} {} {} {} m{}", x, y, z, speed, pad))
        }
        None => Ok(format!("go {} {} {} {}", x, y, z, speed)),
    }
}

/// `rc <roll> <pitch> <throttle> <yaw>` - four channel deflections.
///
/// Note the wire order: throttle before yaw, unlike the argument order of
/// most SDK bindings.
pub fn joystick(roll: i64, pitch: i64, yaw: i64, throttle: i64) -> Result<String> {
    check_range("roll", roll, JOYSTICK_RANGE)?;
    check_range("pitch", pitch, JOYSTICK_RANGE)?;
    check_range("yaw", yaw, JOYSTICK_RANGE)?;
    check_range("throttle", throttle, JOYSTICK_RANGE)?;
    Ok(format!("rc {} {} {} {}", roll, pitch, throttle, yaw))
}

/// `speed <cm/s>`.
pub fn set_speed(speed: i64) -> Result<String> {
    check_range("speed", speed, SPEED_RANGE)?;
    Ok(format!("speed {}", speed))
}

/// `setfps <high|middle|low>`.
#[must_use]
pub fn set_fps(fps: VideoFps) -> String {
    format!("setfps {}", fps.token())
}

/// `setbitrate <0..5>` - 0 selects automatic bitrate, 1-5 are Mbps.
pub fn set_bitrate(mbps: i64) -> Result<String> {
    check_range("bitrate", mbps, BITRATE_RANGE)?;
    Ok(format!("setbitrate {}", mbps))
}

/// `setresolution <high|low>`.
#[must_use]
pub fn set_resolution(resolution: VideoResolution) -> String {
    format!("setresolution {}", resolution.token())
}

/// `mdirection <0|1|2>`.
#[must_use]
pub fn mission_detection(direction: PadDetection) -> String {
    format!("mdirection {}", direction.code())
}

/// `downvision <0|1>`.
#[must_use]
pub fn video_direction(direction: CameraDirection) -> String {
    format!("downvision {}", direction.code())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn move_formats_direction_and_distance() {
        assert_eq!(move_in(MoveDirection::Forward, 100).unwrap(), "forward 100");
        assert_eq!(move_in(MoveDirection::Up, 20).unwrap(), "up 20");
    }

    #[test]
    fn move_rejects_out_of_range_distance() {
        let err = move_in(MoveDirection::Forward, 600).unwrap_err();
        assert!(matches!(
            err,
            Error::OutOfRange {
                what: "distance",
                value: 600,
                ..
            }
        ));
        assert!(move_in(MoveDirection::Back, 19).is_err());
    }

    #[test]
    fn rotate_covers_full_circle() {
        assert_eq!(rotate(RotateDirection::Clockwise, 360).unwrap(), "cw 360");
        assert_eq!(
            rotate(RotateDirection::CounterClockwise, 0).unwrap(),
            "ccw 0"
        );
        assert!(rotate(RotateDirection::Clockwise, 361).is_err());
    }

    #[test]
    fn flip_uses_single_letter() {
        assert_eq!(flip(FlipDirection::Back), "flip b");
    }

    #[test]
    fn go_with_and_without_pad() {
        assert_eq!(go(50, -50, 100, 60, None).unwrap(), "go 50 -50 100 60");
        assert_eq!(go(0, 0, 100, 60, Some(3)).unwrap(), "go 0 0 100 60 m3");
        assert!(go(501, 0, 0, 60, None).is_err());
        assert!(go(0, 0, 0, 9, None).is_err());
        assert!(go(0, 0, 100, 60, Some(9)).is_err());
    }

    #[test]
    fn joystick_wire_order_is_roll_pitch_throttle_yaw() {
        assert_eq!(joystick(1, 2, 3, 4).unwrap(), "rc 1 2 4 3");
        assert!(joystick(-101, 0, 0, 0).is_err());
    }

    #[test]
    fn video_settings_format() {
        assert_eq!(set_fps(VideoFps::Middle), "setfps middle");
        assert_eq!(set_bitrate(0).unwrap(), "setbitrate 0");
        assert!(set_bitrate(6).is_err());
        assert_eq!(set_resolution(VideoResolution::Low), "setresolution low");
        assert_eq!(video_direction(CameraDirection::Downward), "downvision 1");
        assert_eq!(mission_detection(PadDetection::Both), "mdirection 2");
    }

    #[test]
    fn speed_bounds() {
        assert_eq!(set_speed(10).unwrap(), "speed 10");
        assert!(set_speed(101).is_err());
    }
}
