//! Revision clock normalization
//!
//! The local replica stamps revisions with a high-precision wall clock,
//! while the server rounds revision dates to a coarser grid. Comparing raw
//! timestamps would make every freshly pushed item look "changed" on the
//! next pass, so all ordering decisions go through a [`ClockNormalizer`]
//! that maps a timestamp to an integer ordinal. Two timestamps with the same
//! ordinal count as the same revision.

use chrono::{DateTime, Utc};

/// Default bucket width: the server's observed rounding drift stays below it.
pub const DEFAULT_GRANULARITY_MS: i64 = 100;

/// Returns the date used for all ordering decisions
///
/// A deletion is itself a revision, so when a deletion date is present the
/// later of the two dates wins.
pub fn effective_date(
    revision_date: DateTime<Utc>,
    deleted_date: Option<DateTime<Utc>>,
) -> DateTime<Utc> {
    match deleted_date {
        Some(deleted) => revision_date.max(deleted),
        None => revision_date,
    }
}

/// Strategy that maps timestamps to comparable ordinals
///
/// Equal ordinals mean "no effective change", not "identical timestamp".
pub trait ClockNormalizer: Send + Sync {
    /// Maps a timestamp to its ordinal
    fn ordinal(&self, timestamp: DateTime<Utc>) -> i64;
}

/// Rounds milliseconds-since-epoch to the nearest multiple of a bucket width
///
/// Halves round up (toward positive infinity), also before the epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketedClock {
    granularity_ms: i64,
}

impl BucketedClock {
    /// Creates a normalizer with the given bucket width
    ///
    /// A zero or negative width is clamped to 1 ms (raw millisecond
    /// comparison); configuration validation rejects such values upstream.
    pub fn new(granularity_ms: i64) -> Self {
        Self {
            granularity_ms: granularity_ms.max(1),
        }
    }

    /// Whole-second buckets, for servers that only keep second precision
    pub fn whole_seconds() -> Self {
        Self::new(1000)
    }

    /// Returns the bucket width in milliseconds
    pub fn granularity_ms(&self) -> i64 {
        self.granularity_ms
    }
}

impl Default for BucketedClock {
    fn default() -> Self {
        Self::new(DEFAULT_GRANULARITY_MS)
    }
}

impl ClockNormalizer for BucketedClock {
    fn ordinal(&self, timestamp: DateTime<Utc>) -> i64 {
        // floor(ms / g + 1/2) == floor((2ms + g) / 2g), exact for odd g too
        let ms = timestamp.timestamp_millis();
        let g = self.granularity_ms;
        (2 * ms + g).div_euclid(2 * g)
    }
}
