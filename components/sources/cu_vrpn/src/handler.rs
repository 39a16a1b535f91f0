//! Per-tracker message handling: raw samples from the client callback are
//! queued, then turned into stamped ENU/NED poses and frame transforms.

use chrono::{DateTime, Utc};
use compact_str::format_compact;
use cu29::clock::CuTime;
use cu_frame_convert::{enu_orientation, enu_position, ned_orientation, ned_position};
use cu_mocap_payloads::{
    FrameIdString, FrameTransform, PoseStamped, Quaternion, TrackerUpdatePayload,
};
use glam::DQuat;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Queue depth before the oldest sample gets dropped.
pub const MAX_QUEUED_SAMPLES: usize = 64;

/// One pose report from the tracking server, as delivered by the client
/// callback. Position and orientation are in the server native frame,
/// quaternion in (x, y, z, w) order.
#[derive(Debug, Clone)]
pub struct TrackerSample {
    pub tracker: FrameIdString,
    pub msg_time: DateTime<Utc>,
    pub position: [f64; 3],
    pub orientation: [f64; 4],
}

/// Thread safe queue between the client callback and the task.
///
/// The callback fires on the client thread whenever the connection is
/// pumped, so samples are staged here and drained at process time. When
/// the task falls behind, the oldest samples are discarded first.
#[derive(Debug, Clone, Default)]
pub struct SampleQueue(Arc<Mutex<VecDeque<TrackerSample>>>);

impl SampleQueue {
    pub fn new() -> Self {
        Self(Arc::new(Mutex::new(VecDeque::new())))
    }

    pub fn push(&self, sample: TrackerSample) {
        let mut queue = self.0.lock().unwrap();
        if queue.len() >= MAX_QUEUED_SAMPLES {
            queue.pop_front();
        }
        queue.push_back(sample);
    }

    pub fn pop(&self) -> Option<TrackerSample> {
        self.0.lock().unwrap().pop_front()
    }

    pub fn len(&self) -> usize {
        self.0.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.lock().unwrap().is_empty()
    }
}

/// Makes a tracker name safe to use as a topic base: ASCII letters,
/// digits and '/' pass through, spaces map to '_', an '_' in first input
/// position is dropped and anything else is stripped.
pub fn sanitize_name(name: &str) -> FrameIdString {
    let mut out = FrameIdString::default();
    let mut first_character = true;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() || c == '/' {
            out.push(c);
        } else if c == ' ' {
            out.push('_');
        } else if c == '_' && !first_character {
            out.push(c);
        }
        first_character = false;
    }
    out
}

/// The device address the client connects to, e.g. "Tracker0@mocap-pc".
pub fn tracker_address(tracker: &str, host: &str) -> String {
    format!("{tracker}@{host}")
}

/// Converts the samples of one rigid body into the dual convention
/// update payload. Created once per distinct tracker name seen.
pub struct TrackerHandler {
    name: FrameIdString,
    topic: FrameIdString,
    enu_topic: FrameIdString,
    ned_topic: FrameIdString,
    frame_id: FrameIdString,
    ned_frame_id: FrameIdString,
    ned_child_frame: FrameIdString,
}

impl TrackerHandler {
    pub fn new(name: &str, frame_id: &str, ned_frame_id: &str) -> Self {
        let topic = sanitize_name(name);
        Self {
            name: name.into(),
            enu_topic: format_compact!("{topic}_enu"),
            ned_topic: format_compact!("{topic}_ned"),
            topic,
            frame_id: frame_id.into(),
            ned_frame_id: ned_frame_id.into(),
            ned_child_frame: format_compact!("{name}_ned"),
        }
    }

    /// The raw tracker name as the server reports it.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The sanitized topic base.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn enu_topic(&self) -> &str {
        &self.enu_topic
    }

    pub fn ned_topic(&self) -> &str {
        &self.ned_topic
    }

    /// Pure remapping of one sample: same numeric inputs always produce
    /// the same two poses and two transforms.
    pub fn handle(
        &self,
        stamp: CuTime,
        position: [f64; 3],
        orientation: [f64; 4],
    ) -> TrackerUpdatePayload {
        let [qx, qy, qz, qw] = orientation;
        let body = DQuat::from_xyzw(qx, qy, qz, qw);

        let enu = PoseStamped {
            stamp,
            frame_id: self.frame_id.clone(),
            position: enu_position(position).into(),
            orientation: as_payload(enu_orientation(body)),
        };
        let ned = PoseStamped {
            stamp,
            frame_id: self.ned_frame_id.clone(),
            position: ned_position(position).into(),
            orientation: as_payload(ned_orientation(body)),
        };

        // Transforms keep the raw tracker name as child frame, topics get
        // the sanitized one.
        let enu_transform = FrameTransform::from_pose(&enu, self.name.as_str());
        let ned_transform = FrameTransform::from_pose(&ned, self.ned_child_frame.as_str());

        TrackerUpdatePayload {
            tracker: self.topic.clone(),
            enu,
            ned,
            enu_transform,
            ned_transform,
        }
    }
}

fn as_payload(q: DQuat) -> Quaternion {
    Quaternion::new(q.x, q.y, q.z, q.w)
}
