//! End-to-end discovery sessions against the scripted runtime.

use ms_core::config::DiscoveryConfig;
use ms_core::{Fraction, StreamKind, SECOND, UNKNOWN_DURATION};
use ms_discover::{discover, Discoverer, ResourceLocator, SampleFormat};
use ms_graph::{
    Caps, ElementSpec, EndpointId, GraphCall, GraphState, ScriptStep, ScriptedEndpoint, ScriptedRuntime,
    TagList, TagValue,
};
use std::time::Duration;
use tokio::time::Instant;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn locator() -> ResourceLocator {
    ResourceLocator::parse("/media/sample.mkv").unwrap()
}

fn video_caps() -> Caps {
    Caps::new("video/x-raw-yuv")
        .with_int("width", 1920)
        .with_int("height", 1080)
        .with_fraction("framerate", 30000, 1001)
}

fn audio_caps() -> Caps {
    Caps::new("audio/x-raw-int")
        .with_int("rate", 48000)
        .with_int("channels", 2)
        .with_int("width", 16)
        .with_int("depth", 16)
}

fn video_endpoint(id: u32) -> ScriptedEndpoint {
    ScriptedEndpoint::new(id, Caps::new("video/x-raw-yuv").unfixed())
        .negotiates(video_caps())
        .duration(10 * SECOND)
}

fn audio_endpoint(id: u32) -> ScriptedEndpoint {
    ScriptedEndpoint::new(id, Caps::new("audio/x-raw-int").unfixed())
        .negotiates(audio_caps())
        .duration(10 * SECOND)
}

fn tags(pairs: &[(&str, &str)]) -> TagList {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), TagValue::from(*v)))
        .collect()
}

fn timeout() -> Duration {
    DiscoveryConfig::default().timeout()
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn full_audio_video_input() {
    let runtime = ScriptedRuntime::new()
        .step(ScriptStep::ContainerType(Caps::new("video/x-matroska")))
        .endpoint(video_endpoint(0))
        .endpoint(audio_endpoint(1))
        .step(ScriptStep::NoMoreEndpoints)
        .step(ScriptStep::Eos);

    let discovered = discover(locator(), DiscoveryConfig::default(), &runtime).await;
    let result = &discovered.result;

    assert!(discovered.success);
    assert!(result.success);
    assert!(result.is_audio && result.is_video);
    assert_eq!(result.duration, 10 * SECOND);
    assert_eq!(result.mime.as_deref(), Some("video/x-matroska"));

    let video = result.video.as_ref().unwrap();
    assert_eq!(video.kind, StreamKind::Video);
    assert_eq!(video.duration, 10 * SECOND);
    let v = video.video().unwrap();
    assert_eq!((v.width, v.height), (1920, 1080));
    assert_eq!(v.framerate, Fraction::new(30000, 1001));

    let audio = result.audio.as_ref().unwrap();
    assert_eq!(audio.duration, 10 * SECOND);
    let a = audio.audio().unwrap();
    assert_eq!(a.rate, 48000);
    assert_eq!(a.channels, 2);
    assert_eq!(a.sample, SampleFormat::Int { depth: 16 });
}

#[tokio::test(start_paused = true)]
async fn audio_only_then_eos_succeeds() {
    let runtime = ScriptedRuntime::new()
        .endpoint(audio_endpoint(0).duration(7 * SECOND))
        .step(ScriptStep::Eos);

    let discovered = discover(locator(), DiscoveryConfig::default(), &runtime).await;

    assert!(discovered.success);
    assert!(!discovered.result.is_video);
    assert_eq!(discovered.result.duration, 7 * SECOND);
}

#[tokio::test(start_paused = true)]
async fn nothing_decodable_fails_immediately() {
    let runtime = ScriptedRuntime::new()
        .step(ScriptStep::Unrecognized(Caps::new("application/x-subrip")))
        .step(ScriptStep::Unrecognized(Caps::new("application/x-ass")))
        .step(ScriptStep::Eos);
    let start = Instant::now();

    let discovered = discover(locator(), DiscoveryConfig::default(), &runtime).await;

    assert!(!discovered.success);
    assert!(start.elapsed() < timeout());
    assert_eq!(discovered.result.other_streams, vec!["application/x-subrip".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn other_endpoint_counts_as_unrecognized() {
    let runtime = ScriptedRuntime::new()
        .endpoint(ScriptedEndpoint::new(0, Caps::new("text/x-pango-markup")))
        .step(ScriptStep::Eos);

    let discovered = discover(locator(), DiscoveryConfig::default(), &runtime).await;

    assert!(!discovered.success);
    assert_eq!(discovered.result.other_streams, vec!["text/x-pango-markup".to_string()]);
    assert_eq!(
        runtime
            .log()
            .count(|c| matches!(c, GraphCall::Add { spec: ElementSpec::DiscardSink { .. }, .. })),
        0
    );
}

#[tokio::test(start_paused = true)]
async fn deferred_failure_collects_every_unrecognized_stream() {
    let runtime = ScriptedRuntime::new()
        .step(ScriptStep::Unrecognized(Caps::new("application/x-subrip")))
        .step(ScriptStep::Unrecognized(Caps::new("application/x-ass")))
        .step(ScriptStep::NoMoreEndpoints);
    let config = DiscoveryConfig {
        defer_unrecognized_failure: true,
        ..DiscoveryConfig::default()
    };
    let start = Instant::now();

    let discovered = discover(locator(), config, &runtime).await;

    assert!(!discovered.success);
    assert!(start.elapsed() < timeout());
    assert_eq!(
        discovered.result.other_streams,
        vec!["application/x-subrip".to_string(), "application/x-ass".to_string()]
    );
}

#[tokio::test(start_paused = true)]
async fn deferred_failure_lets_late_audio_through() {
    let runtime = ScriptedRuntime::new()
        .step(ScriptStep::Unrecognized(Caps::new("application/x-id3")))
        .endpoint(audio_endpoint(0))
        .step(ScriptStep::NoMoreEndpoints)
        .step(ScriptStep::Eos);
    let config = DiscoveryConfig {
        defer_unrecognized_failure: true,
        ..DiscoveryConfig::default()
    };

    let discovered = discover(locator(), config, &runtime).await;

    assert!(discovered.success);
    assert_eq!(discovered.result.other_streams, vec!["application/x-id3".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn unrecognized_after_audio_is_only_recorded() {
    let runtime = ScriptedRuntime::new()
        .endpoint(audio_endpoint(0))
        .step(ScriptStep::Unrecognized(Caps::new("application/x-id3")))
        .step(ScriptStep::Eos);

    let discovered = discover(locator(), DiscoveryConfig::default(), &runtime).await;

    assert!(discovered.success);
    assert_eq!(discovered.result.other_streams.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn error_fails_despite_progress() {
    let runtime = ScriptedRuntime::new()
        .endpoint(audio_endpoint(0))
        .step(ScriptStep::Error("internal data flow error".into()))
        .step(ScriptStep::Eos);

    let discovered = discover(locator(), DiscoveryConfig::default(), &runtime).await;

    assert!(!discovered.success);
    assert!(discovered.result.audio.is_some());
}

#[tokio::test(start_paused = true)]
async fn eos_with_unnegotiated_kind_fails() {
    let runtime = ScriptedRuntime::new()
        .endpoint(audio_endpoint(0))
        .endpoint(ScriptedEndpoint::new(1, Caps::new("video/x-raw-yuv").unfixed()))
        .step(ScriptStep::NoMoreEndpoints)
        .step(ScriptStep::Eos);

    let discovered = discover(locator(), DiscoveryConfig::default(), &runtime).await;

    assert!(!discovered.success);
    assert!(discovered.result.is_video);
    assert!(discovered.result.video.is_none());
}

// ---------------------------------------------------------------------------
// Timing
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn timeout_with_one_kind_unnegotiated_fails() {
    let runtime = ScriptedRuntime::new()
        .endpoint(audio_endpoint(0))
        .endpoint(ScriptedEndpoint::new(1, Caps::new("video/x-raw-yuv").unfixed()))
        .step(ScriptStep::NoMoreEndpoints);
    let start = Instant::now();

    let discovered = discover(locator(), DiscoveryConfig::default(), &runtime).await;

    assert!(!discovered.success);
    assert!(start.elapsed() >= timeout());
    assert!(discovered.result.audio.is_some());
}

#[tokio::test(start_paused = true)]
async fn timeout_without_bus_messages_uses_eos_criterion() {
    let runtime = ScriptedRuntime::new().endpoint(audio_endpoint(0));
    let start = Instant::now();

    let discovered = discover(locator(), DiscoveryConfig::default(), &runtime).await;

    assert!(discovered.success);
    let elapsed = start.elapsed();
    assert!(elapsed >= timeout());
    assert!(elapsed < timeout() + Duration::from_millis(100));
}

#[tokio::test(start_paused = true)]
async fn timeout_with_nothing_found_fails() {
    let runtime = ScriptedRuntime::new();
    let config = DiscoveryConfig {
        timeout_ms: 500,
        ..DiscoveryConfig::default()
    };
    let start = Instant::now();

    let discovered = discover(locator(), config, &runtime).await;

    assert!(!discovered.success);
    assert!(start.elapsed() >= Duration::from_millis(500));
}

#[tokio::test(start_paused = true)]
async fn late_negotiation_after_close_finishes_early() {
    let runtime = ScriptedRuntime::new()
        .endpoint(ScriptedEndpoint::new(0, Caps::new("audio/x-raw-int").unfixed()).duration(4 * SECOND))
        .step(ScriptStep::NoMoreEndpoints)
        .step(ScriptStep::Negotiate(EndpointId(0), Caps::new("audio/x-raw-int").unfixed()))
        .step(ScriptStep::Negotiate(EndpointId(0), audio_caps()));
    let start = Instant::now();

    let discovered = discover(locator(), DiscoveryConfig::default(), &runtime).await;

    assert!(discovered.success);
    assert!(start.elapsed() < timeout());
    assert_eq!(discovered.result.duration, 4 * SECOND);
    assert_eq!(discovered.result.audio.as_ref().unwrap().caps, audio_caps());
}

#[tokio::test(start_paused = true)]
async fn negotiation_before_close_waits_for_eos() {
    let runtime = ScriptedRuntime::new()
        .endpoint(audio_endpoint(0))
        .step(ScriptStep::NoMoreEndpoints)
        .step(ScriptStep::Delay(Duration::from_millis(500)))
        .step(ScriptStep::Eos);
    let start = Instant::now();

    let discovered = discover(locator(), DiscoveryConfig::default(), &runtime).await;

    assert!(discovered.success);
    assert!(start.elapsed() >= Duration::from_millis(500));
}

#[tokio::test(start_paused = true)]
async fn first_negotiation_per_kind_wins() {
    let runtime = ScriptedRuntime::new()
        .endpoint(audio_endpoint(0).duration(3 * SECOND))
        .endpoint(
            ScriptedEndpoint::new(1, Caps::new("audio/x-raw-float").unfixed())
                .negotiates(Caps::new("audio/x-raw-float").with_int("rate", 22050))
                .duration(9 * SECOND),
        )
        .step(ScriptStep::Negotiate(EndpointId(0), Caps::new("audio/x-raw-int").with_int("rate", 8000)))
        .step(ScriptStep::Eos);

    let discovered = discover(locator(), DiscoveryConfig::default(), &runtime).await;

    let audio = discovered.result.audio.as_ref().unwrap();
    assert_eq!(audio.audio().unwrap().rate, 48000);
    assert_eq!(audio.duration, 3 * SECOND);
    assert_eq!(discovered.result.duration, 3 * SECOND);
}

#[tokio::test(start_paused = true)]
async fn video_before_audio_any_order() {
    let runtime = ScriptedRuntime::new()
        .endpoint(ScriptedEndpoint::new(0, Caps::new("video/x-raw-yuv").unfixed()).duration(2 * SECOND))
        .endpoint(audio_endpoint(1).duration(UNKNOWN_DURATION))
        .step(ScriptStep::NoMoreEndpoints)
        .step(ScriptStep::Negotiate(EndpointId(0), video_caps()));

    let discovered = discover(locator(), DiscoveryConfig::default(), &runtime).await;

    assert!(discovered.success);
    assert_eq!(discovered.result.duration, 2 * SECOND);
    assert_eq!(discovered.result.audio.as_ref().unwrap().duration, UNKNOWN_DURATION);
}

// ---------------------------------------------------------------------------
// Metadata
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn tags_accumulate_with_last_write_winning() {
    let runtime = ScriptedRuntime::new()
        .step(ScriptStep::Tags(tags(&[("title", "First"), ("artist", "Someone")])))
        .endpoint(audio_endpoint(0))
        .step(ScriptStep::Tags(tags(&[("title", "Second"), ("audio-codec", "Vorbis")])))
        .step(ScriptStep::Eos);

    let discovered = discover(locator(), DiscoveryConfig::default(), &runtime).await;

    let tags = &discovered.result.tags;
    assert_eq!(tags.len(), 3);
    assert_eq!(tags["title"], TagValue::from("Second"));
    assert_eq!(tags["artist"], TagValue::from("Someone"));
    assert_eq!(tags["audio-codec"], TagValue::from("Vorbis"));
}

#[tokio::test(start_paused = true)]
async fn disc_title_reports_container_type() {
    let runtime = ScriptedRuntime::new()
        .step(ScriptStep::ContainerType(Caps::new("video/mpeg").with_bool("systemstream", true)))
        .endpoint(video_endpoint(0))
        .step(ScriptStep::Eos);
    let locator = ResourceLocator::parse("dvd:///dev/sr0@1").unwrap();

    let discovered = discover(locator, DiscoveryConfig::default(), &runtime).await;

    assert!(discovered.success);
    assert_eq!(
        discovered.result.mime.as_deref(),
        Some("video/mpeg, systemstream=(boolean)true")
    );
    assert_eq!(discovered.result.locator, "dvd:///dev/sr0@1");
    assert!(runtime
        .log()
        .added()
        .contains(&ElementSpec::DiscSource { device: "/dev/sr0".into(), title: 1 }));
}

#[tokio::test(start_paused = true)]
async fn overrun_relaxes_buffering_once() {
    let runtime = ScriptedRuntime::new()
        .endpoint(ScriptedEndpoint::new(0, Caps::new("video/x-raw-yuv").unfixed()))
        .step(ScriptStep::Overrun(EndpointId(0)))
        .step(ScriptStep::Overrun(EndpointId(0)))
        .step(ScriptStep::Negotiate(EndpointId(0), video_caps()))
        .step(ScriptStep::Eos);
    let config = DiscoveryConfig {
        max_interleave_secs: 2.0,
        ..DiscoveryConfig::default()
    };

    let discovered = discover(locator(), config, &runtime).await;

    assert!(discovered.success);
    let updates = runtime.log().buffering_updates();
    assert_eq!(updates.len(), 1);
    let relaxed = updates[0].1;
    assert_eq!(relaxed.min_threshold, Duration::ZERO);
    assert_eq!(relaxed.max_time, Duration::from_secs(4));
    assert_eq!(relaxed.max_buffers, 200);
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn notification_fires_once_and_nothing_happens_after() {
    let runtime = ScriptedRuntime::new()
        .endpoint(audio_endpoint(0))
        .step(ScriptStep::Eos)
        .step(ScriptStep::Tags(tags(&[("title", "too late")])))
        .endpoint(video_endpoint(1))
        .step(ScriptStep::Error("after the fact".into()));
    let log = runtime.log();

    let discovered = discover(locator(), DiscoveryConfig::default(), &runtime).await;
    assert!(discovered.success);
    assert!(discovered.result.tags.is_empty());
    assert!(!discovered.result.is_video);

    let calls = log.calls().len();
    tokio::time::sleep(2 * timeout()).await;
    assert_eq!(log.calls().len(), calls);
    assert_eq!(log.graph_states(), vec![GraphState::Playing, GraphState::Ready]);
}

#[tokio::test(start_paused = true)]
async fn rediscovery_on_finished_session_fails_without_graph() {
    let runtime = ScriptedRuntime::new().endpoint(audio_endpoint(0)).step(ScriptStep::Eos);
    let discoverer = Discoverer::new(locator(), DiscoveryConfig::default());

    assert!(discoverer.discover(&runtime).discovered().await.success);
    assert!(discoverer.is_finished());
    assert_eq!(runtime.log().graphs_created(), 1);

    let again = discoverer.discover(&runtime).discovered().await;
    assert!(!again.success);
    assert!(again.result.audio.is_none());
    assert_eq!(runtime.log().graphs_created(), 1);
}

#[tokio::test(start_paused = true)]
async fn missing_front_end_fails_immediately() {
    let runtime = ScriptedRuntime::new().refuse_element("uridecodebin");
    let start = Instant::now();

    let discovered = discover(locator(), DiscoveryConfig::default(), &runtime).await;

    assert!(!discovered.success);
    assert_eq!(start.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn start_failure_tears_down_graph() {
    let runtime = ScriptedRuntime::new().fail_start().endpoint(audio_endpoint(0));

    let discovered = discover(locator(), DiscoveryConfig::default(), &runtime).await;

    assert!(!discovered.success);
    assert_eq!(
        runtime.log().graph_states(),
        vec![GraphState::Playing, GraphState::Ready]
    );
}

#[tokio::test(start_paused = true)]
async fn each_endpoint_gets_its_own_chain() {
    let runtime = ScriptedRuntime::new()
        .endpoint(video_endpoint(0))
        .endpoint(audio_endpoint(1))
        .step(ScriptStep::NoMoreEndpoints)
        .step(ScriptStep::Eos);

    discover(locator(), DiscoveryConfig::default(), &runtime).await;

    let sinks: Vec<String> = runtime
        .log()
        .added()
        .into_iter()
        .filter_map(|spec| match spec {
            ElementSpec::DiscardSink { name } => Some(name),
            _ => None,
        })
        .collect();
    assert_eq!(sinks, vec!["sink0-video".to_string(), "sink1-audio".to_string()]);
    assert_eq!(
        runtime
            .log()
            .count(|c| matches!(c, GraphCall::LinkEndpoint { .. })),
        2
    );
}
