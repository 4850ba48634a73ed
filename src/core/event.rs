//! Request arrival record
//!
//! One Event per observed HTTP request. The on-disk form is one JSON object
//! per line in the history file; the field names are stable and must remain
//! parseable by replay across versions.

use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

/// Trailing window covered by the request statistic: 60 seconds, fixed
pub const METER_WINDOW: Duration = Duration::from_secs(60);

/// Basic information of one observed HTTP request.
///
/// `time` is the server's local time down to nano-second precision in Unix
/// epoch. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Request URL
    pub url: String,

    /// Arrival time, Unix epoch nanoseconds
    #[serde(rename = "request_time")]
    pub time: i64,
}

impl Event {
    /// Create an event stamped with the current time
    pub fn now(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            time: unix_nanos(),
        }
    }
}

/// Current time as Unix epoch nanoseconds
pub fn unix_nanos() -> i64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as i64
}

/// Cutoff timestamp for the trailing window ending now
pub fn window_cutoff() -> i64 {
    unix_nanos() - METER_WINDOW.as_nanos() as i64
}
