use std::fmt;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Ordering key carried by every message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct Timestamp(pub DateTime<Utc>);

impl Timestamp {
    /// Builds a timestamp from Unix milliseconds, clamping out-of-range values to the epoch.
    #[must_use]
    pub fn from_millis(millis: i64) -> Self {
        Self(
            Utc.timestamp_millis_opt(millis)
                .single()
                .unwrap_or(DateTime::UNIX_EPOCH),
        )
    }

    #[must_use]
    pub fn as_millis(&self) -> i64 {
        self.0.timestamp_millis()
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(value: DateTime<Utc>) -> Self {
        Self(value)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d %H:%M:%S%.3f"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn millis_are_preserved() {
        let ts = Timestamp::from_millis(1_714_564_800_123);
        assert_eq!(ts.as_millis(), 1_714_564_800_123);
    }

    #[test]
    fn orders_by_instant() {
        assert!(Timestamp::from_millis(100) < Timestamp::from_millis(200));
    }

    #[test]
    fn out_of_range_clamps_to_epoch() {
        assert_eq!(Timestamp::from_millis(i64::MAX).as_millis(), 0);
    }
}
