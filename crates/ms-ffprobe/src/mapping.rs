//! Mapping ffprobe's JSON report onto caps, tags and durations.
//!
//! Decodable streams are described the way a decoder would expose them:
//! raw video as `video/x-raw-yuv` and raw audio as `audio/x-raw-int` or
//! `audio/x-raw-float`, with the fields the discovery core reads.

use ms_core::{Error, Fraction, Result, SECOND};
use ms_graph::{Caps, TagList, TagValue};
use serde::Deserialize;
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// JSON structures
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    format_name: Option<String>,
    duration: Option<String>,
    bit_rate: Option<String>,
    #[serde(default)]
    tags: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    index: u32,
    codec_type: Option<String>,
    codec_name: Option<String>,
    codec_long_name: Option<String>,
    width: Option<i32>,
    height: Option<i32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    pix_fmt: Option<String>,
    sample_fmt: Option<String>,
    sample_rate: Option<String>,
    channels: Option<i32>,
    bits_per_raw_sample: Option<String>,
    duration: Option<String>,
    #[serde(default)]
    disposition: FfprobeDisposition,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeDisposition {
    #[serde(default)]
    attached_pic: u8,
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// One stream of the probed input.
#[derive(Debug, Clone, PartialEq)]
pub enum ProbedStream {
    /// Audio or video the decoder can produce.
    Decodable {
        index: u32,
        /// Caps exposed before negotiation.
        caps: Caps,
        /// Caps once negotiated.
        negotiated: Caps,
        /// Nanoseconds.
        duration: Option<i64>,
    },
    /// Anything else: subtitles, data, cover art.
    Unrecognized { index: u32, caps: Caps },
}

/// What ffprobe found in one input.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProbeReport {
    pub container: Option<Caps>,
    pub streams: Vec<ProbedStream>,
    pub tags: TagList,
}

/// Parse the output of `ffprobe -print_format json -show_format -show_streams`.
pub fn parse_report(json: &str) -> Result<ProbeReport> {
    let output: FfprobeOutput = serde_json::from_str(json)
        .map_err(|e| Error::tool("ffprobe", format!("JSON parse error: {e}")))?;

    let format_duration = output
        .format
        .as_ref()
        .and_then(|f| f.duration.as_deref())
        .and_then(parse_seconds);

    let mut report = ProbeReport::default();
    if let Some(format) = output.format {
        report.container = format.format_name.as_deref().map(container_caps);
        if let Some(bitrate) = format.bit_rate.and_then(|b| b.parse::<u64>().ok()) {
            report.tags.insert("bitrate".into(), TagValue::UInt(bitrate));
        }
        for (key, value) in format.tags {
            report.tags.insert(key.to_lowercase(), TagValue::Str(value));
        }
    }

    for stream in output.streams {
        let duration = stream.duration.as_deref().and_then(parse_seconds).or(format_duration);
        let codec = stream
            .codec_long_name
            .clone()
            .or_else(|| stream.codec_name.clone());

        let probed = match stream.codec_type.as_deref() {
            Some("video") if stream.disposition.attached_pic == 0 => {
                tag_codec(&mut report.tags, "video-codec", codec);
                ProbedStream::Decodable {
                    index: stream.index,
                    caps: Caps::new("video/x-raw-yuv").unfixed(),
                    negotiated: video_caps(&stream),
                    duration,
                }
            }
            Some("audio") => {
                tag_codec(&mut report.tags, "audio-codec", codec);
                let negotiated = audio_caps(&stream);
                ProbedStream::Decodable {
                    index: stream.index,
                    caps: Caps::new(negotiated.media_type()).unfixed(),
                    negotiated,
                    duration,
                }
            }
            other => ProbedStream::Unrecognized {
                index: stream.index,
                caps: other_caps(other, &stream),
            },
        };
        report.streams.push(probed);
    }

    Ok(report)
}

fn tag_codec(tags: &mut TagList, key: &str, codec: Option<String>) {
    if let Some(codec) = codec {
        tags.entry(key.to_string()).or_insert(TagValue::Str(codec));
    }
}

/// Seconds as printed by ffprobe, to nanoseconds.
fn parse_seconds(s: &str) -> Option<i64> {
    let secs = s.trim().parse::<f64>().ok()?;
    if !secs.is_finite() || secs < 0.0 {
        return None;
    }
    Some((secs * SECOND as f64).round() as i64)
}

fn parse_rate(s: &str) -> Option<Fraction> {
    let rate = s.parse::<Fraction>().ok()?;
    (rate.den != 0 && !rate.is_zero()).then_some(rate)
}

fn video_caps(stream: &FfprobeStream) -> Caps {
    let framerate = stream
        .r_frame_rate
        .as_deref()
        .and_then(parse_rate)
        .or_else(|| stream.avg_frame_rate.as_deref().and_then(parse_rate))
        .unwrap_or_default();
    let caps = Caps::new("video/x-raw-yuv")
        .with_int("width", stream.width.unwrap_or(0))
        .with_int("height", stream.height.unwrap_or(0))
        .with_fraction("framerate", framerate.num, framerate.den);
    match stream.pix_fmt.as_deref() {
        Some(pix_fmt) => caps.with_str("format", pix_fmt),
        None => caps,
    }
}

fn audio_caps(stream: &FfprobeStream) -> Caps {
    let rate = stream
        .sample_rate
        .as_deref()
        .and_then(|r| r.parse().ok())
        .unwrap_or(0);
    let channels = stream.channels.unwrap_or(0);
    let raw_bits = stream
        .bits_per_raw_sample
        .as_deref()
        .and_then(|b| b.parse::<i32>().ok())
        .filter(|b| *b > 0);

    let sample_fmt = stream.sample_fmt.as_deref().unwrap_or("");
    let (float, width, signed) = match sample_fmt.trim_end_matches('p') {
        "flt" => (true, 32, true),
        "dbl" => (true, 64, true),
        "u8" => (false, 8, false),
        "s16" => (false, 16, true),
        "s32" => (false, 32, true),
        "s64" => (false, 64, true),
        _ => (false, raw_bits.unwrap_or(16), true),
    };

    if float {
        Caps::new("audio/x-raw-float")
            .with_int("rate", rate)
            .with_int("channels", channels)
            .with_int("width", width)
    } else {
        Caps::new("audio/x-raw-int")
            .with_int("rate", rate)
            .with_int("channels", channels)
            .with_int("width", width)
            .with_int("depth", raw_bits.unwrap_or(width).min(width))
            .with_bool("signed", signed)
    }
}

fn other_caps(codec_type: Option<&str>, stream: &FfprobeStream) -> Caps {
    let codec = stream.codec_name.as_deref().unwrap_or("unknown");
    let media_type = match codec_type {
        Some("video") => format!("image/x-{codec}"),
        Some("subtitle") => format!("text/x-{codec}"),
        _ => format!("application/x-{codec}"),
    };
    Caps::new(media_type)
}

/// Container mime type for an ffprobe format name such as `matroska,webm`.
fn container_caps(format_name: &str) -> Caps {
    let first = format_name.split(',').next().unwrap_or(format_name).trim();
    let media_type = match first {
        "matroska" => "video/x-matroska",
        "webm" => "video/webm",
        "mov" | "mp4" => "video/quicktime",
        "avi" => "video/x-msvideo",
        "ogg" => "application/ogg",
        "mpeg" | "mpegvideo" => "video/mpeg",
        "mpegts" => "video/mpegts",
        "flv" => "video/x-flv",
        "asf" => "video/x-ms-asf",
        "mp3" => "application/x-id3",
        "flac" => "audio/x-flac",
        "wav" => "audio/x-wav",
        "video4linux2" | "v4l2" => "video/x-raw-yuv",
        other => return Caps::new(format!("application/x-{other}")),
    };
    Caps::new(media_type)
}
