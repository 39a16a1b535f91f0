//! Payload types exchanged between the motion capture source and downstream
//! tasks. Scalars are plain `f64` in the ROS conventions: positions in
//! meters, orientations as unit quaternions.

use bincode::de::Decoder;
use bincode::enc::Encoder;
use bincode::error::{DecodeError, EncodeError};
use bincode::{Decode, Encode};
use compact_str::CompactString;
use cu29::clock::CuTime;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt::Display;

/// Frame and tracker identifiers.
pub type FrameIdString = CompactString;

/// Maximum number of tracker updates carried by one batch.
pub const MAX_UPDATES_PER_BATCH: usize = 8;

#[derive(Default, Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

impl From<[f64; 3]> for Vector3 {
    fn from(v: [f64; 3]) -> Self {
        Self {
            x: v[0],
            y: v[1],
            z: v[2],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct Quaternion {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

impl Default for Quaternion {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            z: 0.0,
            w: 1.0,
        }
    }
}

impl Quaternion {
    pub fn new(x: f64, y: f64, z: f64, w: f64) -> Self {
        Self { x, y, z, w }
    }
}

/// A pose with its time of validity and the frame it is expressed in.
#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseStamped {
    pub stamp: CuTime,
    pub frame_id: FrameIdString,
    pub position: Vector3,
    pub orientation: Quaternion,
}

impl Display for PoseStamped {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}] pos: ({}, {}, {}) quat: ({}, {}, {}, {}) @ {}",
            self.frame_id,
            self.position.x,
            self.position.y,
            self.position.z,
            self.orientation.x,
            self.orientation.y,
            self.orientation.z,
            self.orientation.w,
            self.stamp
        )
    }
}

impl Encode for PoseStamped {
    fn encode<E: Encoder>(&self, encoder: &mut E) -> Result<(), EncodeError> {
        self.stamp.encode(encoder)?;
        self.frame_id.as_str().encode(encoder)?;
        self.position.encode(encoder)?;
        self.orientation.encode(encoder)
    }
}

impl Decode<()> for PoseStamped {
    fn decode<D: Decoder<Context = ()>>(decoder: &mut D) -> Result<Self, DecodeError> {
        Ok(Self {
            stamp: CuTime::decode(decoder)?,
            frame_id: String::decode(decoder)?.into(),
            position: Vector3::decode(decoder)?,
            orientation: Quaternion::decode(decoder)?,
        })
    }
}

/// A stamped transform from `frame_id` to `child_frame_id`.
#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameTransform {
    pub stamp: CuTime,
    pub frame_id: FrameIdString,
    pub child_frame_id: FrameIdString,
    pub translation: Vector3,
    pub rotation: Quaternion,
}

impl FrameTransform {
    /// The transform equivalent to a pose: translation and rotation are
    /// copied directly, the parent frame is the frame the pose is
    /// expressed in.
    pub fn from_pose(pose: &PoseStamped, child_frame_id: impl AsRef<str>) -> Self {
        Self {
            stamp: pose.stamp,
            frame_id: pose.frame_id.clone(),
            child_frame_id: child_frame_id.as_ref().into(),
            translation: pose.position,
            rotation: pose.orientation,
        }
    }
}

impl Encode for FrameTransform {
    fn encode<E: Encoder>(&self, encoder: &mut E) -> Result<(), EncodeError> {
        self.stamp.encode(encoder)?;
        self.frame_id.as_str().encode(encoder)?;
        self.child_frame_id.as_str().encode(encoder)?;
        self.translation.encode(encoder)?;
        self.rotation.encode(encoder)
    }
}

impl Decode<()> for FrameTransform {
    fn decode<D: Decoder<Context = ()>>(decoder: &mut D) -> Result<Self, DecodeError> {
        Ok(Self {
            stamp: CuTime::decode(decoder)?,
            frame_id: String::decode(decoder)?.into(),
            child_frame_id: String::decode(decoder)?.into(),
            translation: Vector3::decode(decoder)?,
            rotation: Quaternion::decode(decoder)?,
        })
    }
}

/// One tracking update: the pose of a rigid body in both output
/// conventions, plus the equivalent frame transforms.
#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerUpdatePayload {
    /// Sanitized tracker name, usable as a topic base.
    pub tracker: FrameIdString,
    pub enu: PoseStamped,
    pub ned: PoseStamped,
    pub enu_transform: FrameTransform,
    pub ned_transform: FrameTransform,
}

impl Display for TrackerUpdatePayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: enu {} | ned {}", self.tracker, self.enu, self.ned)
    }
}

impl Encode for TrackerUpdatePayload {
    fn encode<E: Encoder>(&self, encoder: &mut E) -> Result<(), EncodeError> {
        self.tracker.as_str().encode(encoder)?;
        self.enu.encode(encoder)?;
        self.ned.encode(encoder)?;
        self.enu_transform.encode(encoder)?;
        self.ned_transform.encode(encoder)
    }
}

impl Decode<()> for TrackerUpdatePayload {
    fn decode<D: Decoder<Context = ()>>(decoder: &mut D) -> Result<Self, DecodeError> {
        Ok(Self {
            tracker: String::decode(decoder)?.into(),
            enu: PoseStamped::decode(decoder)?,
            ned: PoseStamped::decode(decoder)?,
            enu_transform: FrameTransform::decode(decoder)?,
            ned_transform: FrameTransform::decode(decoder)?,
        })
    }
}

/// Updates produced by one pump of the client, possibly covering several
/// trackers.
#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerUpdateBatch(pub SmallVec<[TrackerUpdatePayload; MAX_UPDATES_PER_BATCH]>);

impl TrackerUpdateBatch {
    pub fn new() -> Self {
        Self(SmallVec::new())
    }

    pub fn push(&mut self, update: TrackerUpdatePayload) {
        self.0.push(update);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrackerUpdatePayload> {
        self.0.iter()
    }
}

impl Encode for TrackerUpdateBatch {
    fn encode<E: Encoder>(&self, encoder: &mut E) -> Result<(), EncodeError> {
        Encode::encode(&self.0.as_slice(), encoder)
    }
}

impl Decode<()> for TrackerUpdateBatch {
    fn decode<D: Decoder<Context = ()>>(decoder: &mut D) -> Result<Self, DecodeError> {
        // allocations are ok in decode
        let v = <Vec<TrackerUpdatePayload> as Decode<()>>::decode(decoder)?;
        Ok(Self(v.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cu29::clock::CuDuration;

    fn sample_pose() -> PoseStamped {
        PoseStamped {
            stamp: CuDuration(1_000),
            frame_id: "world".into(),
            position: Vector3::new(3.0, 1.0, 2.0),
            orientation: Quaternion::new(0.5, 0.5, 0.5, 0.5),
        }
    }

    #[test]
    fn transform_copies_pose() {
        let pose = sample_pose();
        let tf = FrameTransform::from_pose(&pose, "Tracker0");

        assert_eq!(tf.stamp, pose.stamp);
        assert_eq!(tf.frame_id.as_str(), "world");
        assert_eq!(tf.child_frame_id.as_str(), "Tracker0");
        assert_eq!(tf.translation, pose.position);
        assert_eq!(tf.rotation, pose.orientation);
    }

    #[test]
    fn default_orientation_is_identity() {
        let q = Quaternion::default();
        assert_eq!(q, Quaternion::new(0.0, 0.0, 0.0, 1.0));
    }

    #[test]
    fn batch_keeps_insertion_order() {
        let mut batch = TrackerUpdateBatch::new();
        assert!(batch.is_empty());

        for name in ["a", "b", "c"] {
            batch.push(TrackerUpdatePayload {
                tracker: name.into(),
                ..Default::default()
            });
        }

        assert_eq!(batch.len(), 3);
        let names: Vec<&str> = batch.iter().map(|u| u.tracker.as_str()).collect();
        assert_eq!(names, ["a", "b", "c"]);
    }

    #[test]
    fn update_encode_decode() {
        let pose = sample_pose();
        let update = TrackerUpdatePayload {
            tracker: "Tracker0".into(),
            enu: pose.clone(),
            ned: pose.clone(),
            enu_transform: FrameTransform::from_pose(&pose, "Tracker0"),
            ned_transform: FrameTransform::from_pose(&pose, "Tracker0_ned"),
        };

        let encoded = bincode::encode_to_vec(&update, bincode::config::standard())
            .expect("Failed to encode");
        let (decoded, _): (TrackerUpdatePayload, _) =
            bincode::decode_from_slice(&encoded, bincode::config::standard())
                .expect("Failed to decode");

        assert_eq!(decoded, update);
    }
}
