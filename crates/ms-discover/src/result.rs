//! The accumulated outcome of a discovery session.

use ms_core::{Fraction, StreamKind, UNKNOWN_DURATION};
use ms_graph::{Caps, TagList};
use serde::Serialize;

/// How audio samples are represented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "representation", rename_all = "lowercase")]
pub enum SampleFormat {
    Int { depth: i32 },
    Float,
}

/// Attributes of a negotiated audio stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AudioFormat {
    pub rate: i32,
    pub channels: i32,
    pub width: i32,
    pub sample: SampleFormat,
}

impl AudioFormat {
    /// Read audio attributes from fixed caps. Missing fields read as zero.
    ///
    /// Integer samples carry a depth; when a descriptor omits it the sample
    /// width is used.
    pub fn from_caps(caps: &Caps) -> Self {
        let width = caps.int("width").unwrap_or(0);
        let sample = if caps.media_type().contains("x-raw-float") {
            SampleFormat::Float
        } else {
            SampleFormat::Int {
                depth: caps.int("depth").unwrap_or(width),
            }
        };
        Self {
            rate: caps.int("rate").unwrap_or(0),
            channels: caps.int("channels").unwrap_or(0),
            width,
            sample,
        }
    }

    pub fn is_float(&self) -> bool {
        matches!(self.sample, SampleFormat::Float)
    }

    /// Significant bits per sample: the width for float, the depth for int.
    pub fn bits(&self) -> i32 {
        match self.sample {
            SampleFormat::Int { depth } => depth,
            SampleFormat::Float => self.width,
        }
    }
}

/// Attributes of a negotiated video stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VideoFormat {
    pub width: i32,
    pub height: i32,
    pub framerate: Fraction,
}

impl VideoFormat {
    pub fn from_caps(caps: &Caps) -> Self {
        Self {
            width: caps.int("width").unwrap_or(0),
            height: caps.int("height").unwrap_or(0),
            framerate: caps.fraction("framerate").unwrap_or_default(),
        }
    }
}

/// Kind-specific attributes of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum StreamDetails {
    Audio(AudioFormat),
    Video(VideoFormat),
}

/// What was learned about one negotiated audio or video stream.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamRecord {
    pub kind: StreamKind,
    pub caps: Caps,
    /// Nanoseconds, or [`UNKNOWN_DURATION`].
    pub duration: i64,
    pub details: StreamDetails,
}

impl StreamRecord {
    /// Build a record from negotiated caps. `None` for anything that is not
    /// audio or video.
    pub fn from_caps(caps: Caps, duration: i64) -> Option<Self> {
        let descriptor = caps.to_string();
        let (kind, details) = match StreamKind::classify(&descriptor) {
            StreamKind::Audio => (StreamKind::Audio, StreamDetails::Audio(AudioFormat::from_caps(&caps))),
            StreamKind::Video => (StreamKind::Video, StreamDetails::Video(VideoFormat::from_caps(&caps))),
            StreamKind::Other => return None,
        };
        Some(Self {
            kind,
            caps,
            duration,
            details,
        })
    }

    pub fn audio(&self) -> Option<&AudioFormat> {
        match &self.details {
            StreamDetails::Audio(a) => Some(a),
            StreamDetails::Video(_) => None,
        }
    }

    pub fn video(&self) -> Option<&VideoFormat> {
        match &self.details {
            StreamDetails::Video(v) => Some(v),
            StreamDetails::Audio(_) => None,
        }
    }
}

/// Everything a session discovered about its input.
///
/// Each session owns a fresh instance. The caller only receives it once the
/// session has finished.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiscoveryResult {
    pub locator: String,
    /// Type of the outermost container, when identified.
    pub mime: Option<String>,
    /// An audio endpoint appeared.
    pub is_audio: bool,
    /// A video endpoint appeared.
    pub is_video: bool,
    pub audio: Option<StreamRecord>,
    pub video: Option<StreamRecord>,
    /// Descriptors of streams that are neither audio nor video.
    pub other_streams: Vec<String>,
    pub tags: TagList,
    /// Longest recorded stream duration, in nanoseconds.
    pub duration: i64,
    pub success: bool,
}

impl DiscoveryResult {
    pub fn new(locator: impl Into<String>) -> Self {
        Self {
            locator: locator.into(),
            mime: None,
            is_audio: false,
            is_video: false,
            audio: None,
            video: None,
            other_streams: Vec::new(),
            tags: TagList::new(),
            duration: UNKNOWN_DURATION,
            success: false,
        }
    }

    /// Whether any audio or video endpoint was seen.
    pub fn found_decodable(&self) -> bool {
        self.is_audio || self.is_video
    }

    pub fn stream(&self, kind: StreamKind) -> Option<&StreamRecord> {
        match kind {
            StreamKind::Audio => self.audio.as_ref(),
            StreamKind::Video => self.video.as_ref(),
            StreamKind::Other => None,
        }
    }

    /// Every recognized kind has a recorded stream.
    pub fn recognized_kinds_recorded(&self) -> bool {
        (!self.is_audio || self.audio.is_some()) && (!self.is_video || self.video.is_some())
    }

    pub(crate) fn mark_recognized(&mut self, kind: StreamKind) {
        match kind {
            StreamKind::Audio => self.is_audio = true,
            StreamKind::Video => self.is_video = true,
            StreamKind::Other => {}
        }
    }

    /// Store a record unless one of the same kind already exists.
    pub(crate) fn record(&mut self, record: StreamRecord) -> bool {
        let slot = match record.kind {
            StreamKind::Audio => &mut self.audio,
            StreamKind::Video => &mut self.video,
            StreamKind::Other => return false,
        };
        if slot.is_some() {
            return false;
        }
        self.duration = self.duration.max(record.duration);
        *slot = Some(record);
        true
    }

    pub(crate) fn merge_tags(&mut self, tags: TagList) {
        self.tags.extend(tags);
    }
}
