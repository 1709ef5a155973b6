//! Media-domain types shared by the graph interface and the discovery core.
//!
//! Enums serialize in lowercase and implement `Display` manually for a
//! consistent string representation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

// ---------------------------------------------------------------------------
// Clock time
// ---------------------------------------------------------------------------

/// Sentinel used for a duration that could not be determined.
pub const UNKNOWN_DURATION: i64 = -1;

/// One second in nanoseconds.
pub const SECOND: i64 = 1_000_000_000;

/// One millisecond in nanoseconds.
pub const MSECOND: i64 = 1_000_000;

/// Render a nanosecond clock time as `MMm SSs mmm`.
///
/// Negative values (including [`UNKNOWN_DURATION`]) render as zero.
pub fn format_clock_time(ns: i64) -> String {
    let ms = ns.max(0) / MSECOND;
    let sec = ms / 1000;
    let ms = ms % 1000;
    let min = sec / 60;
    let sec = sec % 60;
    format!("{min:2}m {sec:2}s {ms:3}")
}

// ---------------------------------------------------------------------------
// StreamKind
// ---------------------------------------------------------------------------

/// Classification of a decoded stream endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    Audio,
    Video,
    Other,
}

impl StreamKind {
    /// Classify a capability descriptor by substring.
    ///
    /// "audio" is checked before "video", so a descriptor mentioning both
    /// counts as audio.
    pub fn classify(descriptor: &str) -> Self {
        if descriptor.contains("audio") {
            Self::Audio
        } else if descriptor.contains("video") {
            Self::Video
        } else {
            Self::Other
        }
    }

    /// Whether this kind participates in the completion criteria.
    pub fn is_decodable(self) -> bool {
        !matches!(self, Self::Other)
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Audio => write!(f, "audio"),
            Self::Video => write!(f, "video"),
            Self::Other => write!(f, "other"),
        }
    }
}

// ---------------------------------------------------------------------------
// Fraction
// ---------------------------------------------------------------------------

/// A rational number, used for frame rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fraction {
    pub num: i32,
    pub den: i32,
}

impl Fraction {
    pub const fn new(num: i32, den: i32) -> Self {
        Self { num, den }
    }

    /// Floating-point value, or `None` for a zero denominator.
    pub fn as_f64(&self) -> Option<f64> {
        if self.den == 0 {
            None
        } else {
            Some(f64::from(self.num) / f64::from(self.den))
        }
    }

    pub fn is_zero(&self) -> bool {
        self.num == 0
    }
}

impl Default for Fraction {
    fn default() -> Self {
        Self::new(0, 1)
    }
}

impl fmt::Display for Fraction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

impl FromStr for Fraction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::Validation(format!("invalid fraction: {s}"));
        match s.split_once('/') {
            Some((num, den)) => {
                let num = num.trim().parse().map_err(|_| invalid())?;
                let den = den.trim().parse().map_err(|_| invalid())?;
                Ok(Self::new(num, den))
            }
            None => s.trim().parse().map(|num| Self::new(num, 1)).map_err(|_| invalid()),
        }
    }
}
