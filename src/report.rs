//! Rendering discovery results for the terminal.

use ms_core::{format_clock_time, UNKNOWN_DURATION};
use ms_discover::{DiscoveryResult, StreamRecord};
use std::fmt::Write;

const VIDEO_CODEC: &str = "video-codec";
const AUDIO_CODEC: &str = "audio-codec";

/// Human-readable summary of a finished session.
///
/// Returns `None` when the session found neither audio nor video.
pub fn render(result: &DiscoveryResult) -> Option<String> {
    if !result.found_decodable() {
        return None;
    }

    let mut tags = result.tags.clone();
    let mut out = String::new();

    let mime = result.mime.as_deref().unwrap_or("unknown");
    let _ = writeln!(out, "Mime Type :\t{mime}");
    let _ = writeln!(out, "Length :\t{}", format_clock_time(result.duration));
    let _ = writeln!(out, "\tAudio: {}", format_clock_time(stream_length(result.audio.as_ref())));
    let _ = writeln!(out, "\tVideo: {}", format_clock_time(stream_length(result.video.as_ref())));

    if let Some(video) = result.video.as_ref().and_then(StreamRecord::video) {
        if result.is_video && !video.framerate.is_zero() {
            let _ = writeln!(out, "Video :");
            let _ = writeln!(
                out,
                "\t{} x {} @ {}/{} fps",
                video.width, video.height, video.framerate.num, video.framerate.den
            );
            if let Some(codec) = tags.remove(VIDEO_CODEC) {
                let _ = writeln!(out, "\tCodec : {codec}");
            }
        }
    }

    if result.is_audio {
        let _ = writeln!(out, "Audio :");
        if let Some(audio) = result.audio.as_ref().and_then(StreamRecord::audio) {
            let sample = if audio.is_float() { "float" } else { "int" };
            let _ = writeln!(
                out,
                "\t{} channels(s) : {}Hz @ {}bits ({sample})",
                audio.channels,
                audio.rate,
                audio.bits()
            );
        }
        if let Some(codec) = tags.remove(AUDIO_CODEC) {
            let _ = writeln!(out, "\tCodec : {codec}");
        }
    }

    for stream in &result.other_streams {
        if result.mime.as_deref() != Some(stream.as_str()) {
            let _ = writeln!(out, "Other unsupported multimedia stream : {stream}");
        }
    }

    if !tags.is_empty() {
        let _ = writeln!(out, "Additional information :");
        for (name, value) in &tags {
            let _ = writeln!(out, "{name:>20} :\t{value}");
        }
    }

    Some(out)
}

/// JSON array of finished sessions, in the order they ran.
pub fn to_json(results: &[DiscoveryResult]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(results)
}

fn stream_length(stream: Option<&StreamRecord>) -> i64 {
    stream.map_or(UNKNOWN_DURATION, |s| s.duration)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ms_core::{MSECOND, SECOND};
    use ms_graph::{Caps, TagValue};

    fn movie() -> DiscoveryResult {
        let mut result = DiscoveryResult::new("file:///media/movie.mkv");
        result.mime = Some("video/x-matroska".into());
        result.is_audio = true;
        result.is_video = true;
        result.video = StreamRecord::from_caps(
            Caps::new("video/x-raw-yuv")
                .with_int("width", 1920)
                .with_int("height", 1080)
                .with_fraction("framerate", 30000, 1001),
            10 * SECOND,
        );
        result.audio = StreamRecord::from_caps(
            Caps::new("audio/x-raw-int")
                .with_int("rate", 48000)
                .with_int("channels", 2)
                .with_int("width", 16)
                .with_int("depth", 16),
            9 * SECOND + 500 * MSECOND,
        );
        result.duration = 10 * SECOND;
        result.other_streams = vec!["video/x-matroska".into(), "text/x-ass".into()];
        result.tags.insert(VIDEO_CODEC.into(), TagValue::from("H.264"));
        result.tags.insert(AUDIO_CODEC.into(), TagValue::from("Vorbis"));
        result.tags.insert("title".into(), TagValue::from("Movie"));
        result.success = true;
        result
    }

    #[test]
    fn renders_streams_and_codecs() {
        let text = render(&movie()).unwrap();

        assert!(text.starts_with("Mime Type :\tvideo/x-matroska\n"));
        assert!(text.contains("Length :\t 0m 10s   0\n"));
        assert!(text.contains("\tAudio:  0m  9s 500\n"));
        assert!(text.contains("\t1920 x 1080 @ 30000/1001 fps\n\tCodec : H.264\n"));
        assert!(text.contains("\t2 channels(s) : 48000Hz @ 16bits (int)\n\tCodec : Vorbis\n"));
    }

    #[test]
    fn codec_tags_are_not_repeated() {
        let text = render(&movie()).unwrap();
        assert!(text.contains("Additional information :\n               title :\tMovie\n"));
        assert!(!text.contains("video-codec"));
        assert!(!text.contains("audio-codec"));
    }

    #[test]
    fn container_type_is_not_listed_as_other_stream() {
        let text = render(&movie()).unwrap();
        assert!(text.contains("Other unsupported multimedia stream : text/x-ass"));
        assert!(!text.contains("stream : video/x-matroska"));
    }

    #[test]
    fn float_audio_reports_width() {
        let mut result = DiscoveryResult::new("file:///a.ogg");
        result.is_audio = true;
        result.audio = StreamRecord::from_caps(
            Caps::new("audio/x-raw-float")
                .with_int("rate", 44100)
                .with_int("channels", 1)
                .with_int("width", 32),
            SECOND,
        );
        let text = render(&result).unwrap();
        assert!(text.contains("Mime Type :\tunknown"));
        assert!(text.contains("\t1 channels(s) : 44100Hz @ 32bits (float)"));
        assert!(!text.contains("Video :"));
    }

    #[test]
    fn nothing_found_renders_nothing() {
        assert!(render(&DiscoveryResult::new("file:///notes.txt")).is_none());
    }

    #[test]
    fn json_carries_outcome() {
        let results = [movie(), DiscoveryResult::new("file:///notes.txt")];
        let json: serde_json::Value = serde_json::from_str(&to_json(&results).unwrap()).unwrap();
        assert_eq!(json[0]["success"], true);
        assert_eq!(json[0]["mime"], "video/x-matroska");
        assert_eq!(json[0]["tags"]["title"], "Movie");
        assert_eq!(json[1]["success"], false);
        assert_eq!(json[1]["duration"], -1);
    }
}
