//! Frame timestamps on a fixed publication cadence.

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Interval between possible publication instants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Cadence {
    minutes: u32,
}

impl Cadence {
    pub const TWO_MINUTES: Cadence = Cadence { minutes: 2 };

    pub fn from_minutes(minutes: u32) -> Result<Self, TimeError> {
        if minutes == 0 {
            return Err(TimeError::ZeroCadence);
        }
        Ok(Self { minutes })
    }

    pub fn minutes(&self) -> u32 {
        self.minutes
    }

    pub fn as_duration(&self) -> Duration {
        Duration::minutes(self.minutes as i64)
    }

    /// Number of cadence steps that fit in `horizon` (the candidate count).
    pub fn steps_within(&self, horizon: Duration) -> usize {
        (horizon.num_minutes().max(0) / self.minutes as i64) as usize
    }
}

impl Default for Cadence {
    fn default() -> Self {
        Self::TWO_MINUTES
    }
}

impl TryFrom<u32> for Cadence {
    type Error = TimeError;

    fn try_from(minutes: u32) -> Result<Self, Self::Error> {
        Self::from_minutes(minutes)
    }
}

impl From<Cadence> for u32 {
    fn from(cadence: Cadence) -> Self {
        cadence.minutes
    }
}

/// A UTC instant truncated to the cadence grid (seconds always zero).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FrameTimestamp(DateTime<Utc>);

impl FrameTimestamp {
    /// Truncate `instant` down to the nearest cadence boundary.
    pub fn truncate(instant: DateTime<Utc>, cadence: Cadence) -> Self {
        let step = cadence.minutes as i64 * 60;
        let secs = instant.timestamp();
        let floored = secs - secs.rem_euclid(step);
        // floored is always a representable, unambiguous UTC second
        let truncated = Utc
            .timestamp_opt(floored, 0)
            .single()
            .unwrap_or(instant);
        Self(truncated)
    }

    /// Candidate timestamps from `now` backward, newest first.
    ///
    /// Yields `horizon / cadence` values: with a 2 minute cadence and a 4 hour
    /// horizon that is 120 timestamps, the oldest 238 minutes before the newest.
    pub fn walk_back(
        now: DateTime<Utc>,
        cadence: Cadence,
        horizon: Duration,
    ) -> impl Iterator<Item = FrameTimestamp> {
        let newest = Self::truncate(now, cadence);
        let step = cadence.as_duration();
        (0..cadence.steps_within(horizon) as i32).map(move |i| Self(newest.0 - step * i))
    }

    pub fn instant(&self) -> DateTime<Utc> {
        self.0
    }

    /// `YYYYMMDD-HHMM00`, the timestamp fragment used in archive filenames.
    pub fn filename_fragment(&self) -> String {
        self.0.format("%Y%m%d-%H%M00").to_string()
    }
}

impl std::fmt::Display for FrameTimestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%dT%H:%M:%SZ"))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TimeError {
    #[error("Cadence must be at least one minute")]
    ZeroCadence,
}
