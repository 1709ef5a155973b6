//! Capability Aggregator: turn negotiated caps into stream records.

use ms_core::{StreamKind, UNKNOWN_DURATION};
use ms_graph::{Caps, ElementId, MediaGraph};

use crate::result::{DiscoveryResult, StreamRecord};

/// Record the stream behind `sink` once its caps are fixed.
///
/// Returns the kind that was recorded, or `None` when nothing changed:
/// caps missing or unfixed, not audio or video, or a record of that kind
/// already exists.
pub(crate) fn on_caps_negotiated(
    graph: &dyn MediaGraph,
    result: &mut DiscoveryResult,
    sink: ElementId,
    caps: Option<&Caps>,
) -> Option<StreamKind> {
    let Some(caps) = caps.filter(|c| c.is_fixed()) else {
        tracing::trace!(%sink, "no negotiated caps available yet");
        return None;
    };

    let kind = StreamKind::classify(&caps.to_string());
    if !kind.is_decodable() {
        return None;
    }
    if result.stream(kind).is_some() {
        tracing::debug!(%sink, %kind, "already recorded, ignoring renegotiation");
        return None;
    }

    let duration = graph.query_upstream_duration(sink).unwrap_or_else(|| {
        tracing::warn!(%sink, "duration query failed");
        UNKNOWN_DURATION
    });

    let record = StreamRecord::from_caps(caps.clone(), duration)?;
    tracing::debug!(%sink, %kind, caps = %caps, duration, "caps negotiated");
    result.record(record).then_some(kind)
}
