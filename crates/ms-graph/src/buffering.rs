//! Buffering stage configuration.

use serde::Serialize;
use std::time::Duration;

/// Buffered elements allowed per second of interleave tolerance.
const BUFFERS_PER_SECOND: f64 = 100.0;

/// Limits applied to a buffering stage placed in front of a discard sink.
///
/// The stage holds data back until `min_threshold` worth of it has queued,
/// which gives demuxers that create their endpoints lazily time to expose
/// every stream. A zero `max_bytes` means no byte limit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BufferingConfig {
    pub min_threshold: Duration,
    pub max_time: Duration,
    pub max_bytes: u64,
    pub max_buffers: u32,
}

impl BufferingConfig {
    /// Limits for a given maximum interleave, in seconds. Times beyond the
    /// range of [`Duration`] saturate.
    pub fn for_interleave(max_interleave_secs: f64) -> Self {
        let secs = max_interleave_secs.max(0.0);
        Self {
            min_threshold: saturating_secs(secs),
            max_time: saturating_secs(2.0 * secs),
            max_bytes: 0,
            max_buffers: (BUFFERS_PER_SECOND * secs) as u32,
        }
    }

    /// The same limits with the minimum threshold removed.
    #[must_use]
    pub fn without_min_threshold(self) -> Self {
        Self {
            min_threshold: Duration::ZERO,
            ..self
        }
    }

    pub fn has_min_threshold(&self) -> bool {
        !self.min_threshold.is_zero()
    }
}

fn saturating_secs(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}
