//! Liveness rules
//!
//! Bridge liveness decays with time: it is a pure function of the last
//! heartbeat and the current time, recomputed by every reader and never
//! stored. Device liveness does not decay; it follows events only.

use chrono::{DateTime, Duration, Utc};

/// Seconds without a heartbeat before the bridge counts as offline
pub const HEARTBEAT_TIMEOUT_SECS: i64 = 35;

/// Seconds between heartbeats sent by the bridge firmware
pub const HEARTBEAT_INTERVAL_SECS: i64 = 25;

/// Period of the status refresh poll
pub const POLL_INTERVAL: std::time::Duration = std::time::Duration::from_secs(5);

pub fn heartbeat_timeout() -> Duration {
    Duration::seconds(HEARTBEAT_TIMEOUT_SECS)
}

/// Online iff something was seen and strictly less than `timeout` has elapsed
pub fn is_online(last_seen: Option<DateTime<Utc>>, now: DateTime<Utc>, timeout: Duration) -> bool {
    match last_seen {
        Some(seen) => now - seen < timeout,
        None => false,
    }
}

/// Bridge liveness under the fixed heartbeat timeout
pub fn bridge_online(last_heartbeat: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    is_online(last_heartbeat, now, heartbeat_timeout())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-03-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_never_seen_is_offline() {
        assert!(!bridge_online(None, t0()));
    }

    #[test]
    fn test_boundary_is_exclusive() {
        let hb = Some(t0());
        assert!(bridge_online(hb, t0()));
        assert!(bridge_online(hb, t0() + Duration::milliseconds(34_999)));
        assert!(!bridge_online(hb, t0() + Duration::seconds(35)));
        assert!(!bridge_online(hb, t0() + Duration::seconds(120)));
    }

    #[test]
    fn test_custom_timeout() {
        let seen = Some(t0());
        let timeout = Duration::seconds(5);
        assert!(is_online(seen, t0() + Duration::seconds(4), timeout));
        assert!(!is_online(seen, t0() + Duration::seconds(5), timeout));
    }
}
