//! Axis remapping between the OptiTrack native frame and standard robotics frames.
//!
//! OptiTrack streams rigid body poses in its native "NUE" convention
//! (X north, Y up, Z east-ish). Downstream consumers want ENU
//! (East-North-Up) or NED (North-East-Down). Both remappings are fixed
//! frame changes: a constant rotation for orientations and an axis
//! permutation for positions.

use glam::{DQuat, EulerRot};
use std::f64::consts::FRAC_PI_2;

/// The fixed rotation from the OptiTrack NUE frame to ENU.
///
/// Equivalent to roll/pitch/yaw = (0, -pi/2, -pi/2) applied Z then Y then X.
pub fn nue_to_enu() -> DQuat {
    DQuat::from_euler(EulerRot::ZYX, -FRAC_PI_2, -FRAC_PI_2, 0.0)
}

/// The fixed rotation from the OptiTrack NUE frame to NED.
///
/// Equivalent to roll/pitch/yaw = (-pi/2, 0, 0).
pub fn nue_to_ned() -> DQuat {
    DQuat::from_euler(EulerRot::ZYX, 0.0, 0.0, -FRAC_PI_2)
}

/// Body orientation re-expressed in the ENU frame.
pub fn enu_orientation(body: DQuat) -> DQuat {
    nue_to_enu().inverse() * body
}

/// Body orientation re-expressed in the NED frame.
pub fn ned_orientation(body: DQuat) -> DQuat {
    nue_to_ned().inverse() * body
}

/// Position remapped from NUE to ENU.
///
/// Axis mapping:
///   East  (X): OptiTrack Z
///   North (Y): OptiTrack X
///   Up    (Z): OptiTrack Y
///
/// ```
/// use cu_frame_convert::enu_position;
/// assert_eq!(enu_position([1.0, 2.0, 3.0]), [3.0, 1.0, 2.0]);
/// ```
pub fn enu_position(pos: [f64; 3]) -> [f64; 3] {
    [pos[2], pos[0], pos[1]]
}

/// Position remapped from NUE to NED.
///
/// Axis mapping:
///   North (X): OptiTrack X
///   East  (Y): OptiTrack Z
///   Down  (Z): OptiTrack -Y
pub fn ned_position(pos: [f64; 3]) -> [f64; 3] {
    [pos[0], pos[2], -pos[1]]
}
