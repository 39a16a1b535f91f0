//! Copper source task bridging a VRPN motion capture server (OptiTrack
//! and friends) into the robot frame conventions.
//!
//! The client callback stages raw samples into a [`SampleQueue`]; each
//! process cycle drains the queue and emits a [`TrackerUpdateBatch`] with
//! every pose re-expressed in ENU and NED, plus the matching frame
//! transforms.

pub mod handler;
pub mod time_sync;

use chrono::Utc;
use cu29::clock::{CuTime, CuTimeRange, Tov};
use cu29::prelude::*;
use std::collections::HashMap;

use crate::handler::{tracker_address, SampleQueue, TrackerHandler};
use crate::time_sync::{resolve_tov, RefTime};
use cu_mocap_payloads::{FrameIdString, TrackerUpdateBatch, MAX_UPDATES_PER_BATCH};

const DEFAULT_HOST: &str = "localhost";
const DEFAULT_FRAME: &str = "world";

pub struct CuVrpnSrc {
    host: String,
    frame: String,
    ned_frame: String,
    queue: SampleQueue,
    handlers: HashMap<FrameIdString, TrackerHandler>,
    reftime: RefTime,
}

impl CuVrpnSrc {
    /// Handle for the client callback feeding samples into this task.
    pub fn sample_queue(&self) -> SampleQueue {
        self.queue.clone()
    }

    /// The address a tracker device is reachable at on the configured host.
    pub fn tracker_address(&self, tracker: &str) -> String {
        tracker_address(tracker, &self.host)
    }

    fn handler_for(&mut self, tracker: &FrameIdString) -> &TrackerHandler {
        self.handlers.entry(tracker.clone()).or_insert_with(|| {
            let handler = TrackerHandler::new(tracker, &self.frame, &self.ned_frame);
            debug!(
                "New tracker {}: publishing {} and {}",
                handler.name(),
                handler.enu_topic(),
                handler.ned_topic()
            );
            handler
        })
    }
}

impl Freezable for CuVrpnSrc {}

impl CuSrcTask for CuVrpnSrc {
    type Output<'m> = output_msg!(TrackerUpdateBatch);

    fn new(config: Option<&ComponentConfig>) -> CuResult<Self>
    where
        Self: Sized,
    {
        let host = config
            .and_then(|config| config.get::<String>("host"))
            .unwrap_or(DEFAULT_HOST.to_string());
        let frame = config
            .and_then(|config| config.get::<String>("frame"))
            .unwrap_or(DEFAULT_FRAME.to_string());
        let ned_frame = config
            .and_then(|config| config.get::<String>("ned_frame"))
            .unwrap_or(format!("{frame}_ned"));

        // just a temporary value, it will be redone at start.
        let reftime: RefTime = (Utc::now(), RobotClock::new().now());

        Ok(Self {
            host,
            frame,
            ned_frame,
            queue: SampleQueue::new(),
            handlers: HashMap::new(),
            reftime,
        })
    }

    fn start(&mut self, clock: &RobotClock) -> CuResult<()> {
        self.reftime = (Utc::now(), clock.now());
        debug!("Waiting for tracker updates from {}", self.host.as_str());
        Ok(())
    }

    fn process(&mut self, _clock: &RobotClock, new_msg: &mut Self::Output<'_>) -> CuResult<()> {
        let mut batch = TrackerUpdateBatch::new();
        let mut min_tov = CuTime::MAX;
        let mut max_tov = CuTime::MIN;

        while batch.len() < MAX_UPDATES_PER_BATCH {
            let Some(sample) = self.queue.pop() else {
                break;
            };
            let stamp = resolve_tov(&self.reftime, sample.msg_time);
            let handler = self.handler_for(&sample.tracker);
            let update = handler.handle(stamp, sample.position, sample.orientation);
            if stamp < min_tov {
                min_tov = stamp;
            }
            if stamp > max_tov {
                max_tov = stamp;
            }
            batch.push(update);
        }

        if batch.is_empty() {
            new_msg.clear_payload();
            return Ok(());
        }

        new_msg.tov = if min_tov == max_tov {
            Tov::Time(min_tov)
        } else {
            Tov::Range(CuTimeRange {
                start: min_tov,
                end: max_tov,
            })
        };
        new_msg.set_payload(batch);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::TrackerSample;
    use chrono::TimeDelta;

    fn new_task(frame: &str) -> CuVrpnSrc {
        let mut config = ComponentConfig::default();
        config.set("host", "mocap-pc".to_string());
        config.set("frame", frame.to_string());
        CuVrpnSrc::new(Some(&config)).unwrap()
    }

    fn sample(name: &str, offset_ms: i64) -> TrackerSample {
        TrackerSample {
            tracker: name.into(),
            msg_time: Utc::now() + TimeDelta::milliseconds(offset_ms),
            position: [1.0, 2.0, 3.0],
            orientation: [0.0, 0.0, 0.0, 1.0],
        }
    }

    #[test]
    fn defaults_without_config() {
        let task = CuVrpnSrc::new(None).unwrap();
        assert_eq!(task.tracker_address("Tracker0"), "Tracker0@localhost");
    }

    #[test]
    fn ned_frame_derived_from_frame() {
        let clock = RobotClock::new();
        let mut task = new_task("map");
        task.start(&clock).unwrap();
        task.sample_queue().push(sample("Tracker0", 1));

        let mut msg = CuMsg::new(Some(TrackerUpdateBatch::default()));
        task.process(&clock, &mut msg).unwrap();

        let update = msg.payload().unwrap().iter().next().unwrap();
        assert_eq!(update.enu.frame_id.as_str(), "map");
        assert_eq!(update.ned.frame_id.as_str(), "map_ned");
    }

    #[test]
    fn empty_queue_clears_payload() {
        let clock = RobotClock::new();
        let mut task = new_task("world");
        task.start(&clock).unwrap();

        let mut msg = CuMsg::new(Some(TrackerUpdateBatch::default()));
        task.process(&clock, &mut msg).unwrap();
        assert!(msg.payload().is_none());
    }

    #[test]
    fn single_update_gets_a_time_tov() {
        let clock = RobotClock::new();
        let mut task = new_task("world");
        task.start(&clock).unwrap();
        task.sample_queue().push(sample("Tracker0", 1));

        let mut msg = CuMsg::new(Some(TrackerUpdateBatch::default()));
        task.process(&clock, &mut msg).unwrap();

        assert_eq!(msg.payload().unwrap().len(), 1);
        assert!(matches!(msg.tov, Tov::Time(_)));
    }

    #[test]
    fn multiple_updates_get_a_range_tov() {
        let clock = RobotClock::new();
        let mut task = new_task("world");
        task.start(&clock).unwrap();
        let queue = task.sample_queue();
        queue.push(sample("Tracker0", 1));
        queue.push(sample("Tracker1", 5));

        let mut msg = CuMsg::new(Some(TrackerUpdateBatch::default()));
        task.process(&clock, &mut msg).unwrap();

        assert_eq!(msg.payload().unwrap().len(), 2);
        match msg.tov {
            Tov::Range(range) => assert!(range.start < range.end),
            other => panic!("expected a range tov, got {other:?}"),
        }
    }

    #[test]
    fn overflow_stays_queued_for_next_cycle() {
        let clock = RobotClock::new();
        let mut task = new_task("world");
        task.start(&clock).unwrap();
        let queue = task.sample_queue();
        for i in 0..(MAX_UPDATES_PER_BATCH + 3) {
            queue.push(sample(&format!("Tracker{i}"), i as i64));
        }

        let mut msg = CuMsg::new(Some(TrackerUpdateBatch::default()));
        task.process(&clock, &mut msg).unwrap();
        assert_eq!(msg.payload().unwrap().len(), MAX_UPDATES_PER_BATCH);
        assert_eq!(queue.len(), 3);

        let mut msg = CuMsg::new(Some(TrackerUpdateBatch::default()));
        task.process(&clock, &mut msg).unwrap();
        assert_eq!(msg.payload().unwrap().len(), 3);
    }
}
