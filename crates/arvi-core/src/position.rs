//! Player position report
//!
//! Answer body of the reserved `POSITION` message. The camera mirrors the
//! player. Components are rounded to at most three decimals and integral
//! values are written without a fractional part, so `1.0` becomes `1` and
//! `0.12345` becomes `0.123`.

use serde::{Serialize, Serializer};

use crate::types::{PlayerPose, Vector3};

/// Component rounded to three decimals
#[derive(Debug, Clone, Copy, PartialEq)]
struct Rounded(f64);

impl Rounded {
    fn new(value: f32) -> Self {
        // f64::round rounds half away from zero
        Self((f64::from(value) * 1000.0).round() / 1000.0)
    }
}

impl Serialize for Rounded {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let value = self.0;
        if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
            serializer.serialize_i64(value as i64)
        } else {
            serializer.serialize_f64(value)
        }
    }
}

#[derive(Debug, Serialize)]
struct Coordinates {
    x: Rounded,
    y: Rounded,
    z: Rounded,
}

impl From<Vector3> for Coordinates {
    fn from(v: Vector3) -> Self {
        Self {
            x: Rounded::new(v.x),
            y: Rounded::new(v.y),
            z: Rounded::new(v.z),
        }
    }
}

#[derive(Debug, Serialize)]
struct PoseReport {
    position: Coordinates,
    forward: Coordinates,
    up: Coordinates,
}

impl From<PlayerPose> for PoseReport {
    fn from(pose: PlayerPose) -> Self {
        Self {
            position: pose.position.into(),
            forward: pose.forward.into(),
            up: pose.up.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct PositionReport {
    player: PoseReport,
    camera: PoseReport,
}

/// Render the `POSITION` answer for a pose
pub fn position_json(pose: &PlayerPose) -> serde_json::Result<String> {
    serde_json::to_string(&PositionReport {
        player: (*pose).into(),
        camera: (*pose).into(),
    })
}
