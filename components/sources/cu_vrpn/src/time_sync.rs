//! Maps the wall clock timestamps stamped by the tracking server onto the
//! robot monotonic clock.

use chrono::{DateTime, Utc};
use cu29::clock::{CuDuration, CuTime};

/// A matching pair of (UTC instant, robot monotonic time) taken at sync.
pub type RefTime = (DateTime<Utc>, CuTime);

/// Converts a UTC message timestamp to a monotonic time of validity.
///
/// UTC is corrected to match earth rotation so it is NOT suitable as a
/// robot timeline by itself. We anchor it to the monotonic clock once and
/// offset from there. Timestamps older than the sync point clamp to the
/// epoch of the robot clock.
pub fn resolve_tov(reftime: &RefTime, utc: DateTime<Utc>) -> CuTime {
    let (ref_date, ref_cu_time) = reftime;
    let elapsed_ns = utc
        .signed_duration_since(*ref_date)
        .num_nanoseconds()
        .unwrap_or(0);

    if elapsed_ns >= 0 {
        *ref_cu_time + CuDuration(elapsed_ns as u64)
    } else {
        let backwards = CuDuration(elapsed_ns.unsigned_abs());
        if backwards.0 >= ref_cu_time.0 {
            CuDuration(0)
        } else {
            *ref_cu_time - backwards
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    fn reference() -> RefTime {
        let date = DateTime::parse_from_rfc3339("2024-09-17T15:47:11.684855Z")
            .unwrap()
            .with_timezone(&Utc);
        (date, CuDuration(5_000_000_000))
    }

    #[test]
    fn later_message_moves_forward() {
        let rt = reference();
        let utc = rt.0 + TimeDelta::milliseconds(250);
        assert_eq!(resolve_tov(&rt, utc), CuDuration(5_250_000_000));
    }

    #[test]
    fn sync_instant_maps_to_reference() {
        let rt = reference();
        assert_eq!(resolve_tov(&rt, rt.0), rt.1);
    }

    #[test]
    fn earlier_message_moves_back() {
        let rt = reference();
        let utc = rt.0 - TimeDelta::seconds(1);
        assert_eq!(resolve_tov(&rt, utc), CuDuration(4_000_000_000));
    }

    #[test]
    fn before_clock_epoch_clamps_to_zero() {
        let rt = reference();
        let utc = rt.0 - TimeDelta::seconds(10);
        assert_eq!(resolve_tov(&rt, utc), CuDuration(0));
    }
}
