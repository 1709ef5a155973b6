//! Endpoint Tracker: give every decoded endpoint a buffering stage and a
//! discard sink, and keep the books on streams nothing can decode.

use ms_core::{Result, StreamKind};
use ms_graph::{BufferingConfig, Caps, ElementId, ElementSpec, EndpointId, GraphState, MediaGraph, Watch};
use std::collections::HashMap;

use crate::result::DiscoveryResult;

/// Per-endpoint buffering stage.
///
/// The minimum fill threshold is disarmed the first time the stage overruns
/// its buffer count, and never re-armed. Demuxers that stamp buffers with
/// bogus durations would otherwise keep the stage from ever releasing data.
#[derive(Debug, Clone)]
pub(crate) struct BufferingStage {
    pub endpoint: EndpointId,
    pub config: BufferingConfig,
    pub min_threshold_armed: bool,
}

impl BufferingStage {
    fn new(endpoint: EndpointId, config: BufferingConfig) -> Self {
        Self {
            endpoint,
            min_threshold_armed: config.has_min_threshold(),
            config,
        }
    }

    /// Disarm the threshold. Returns the new limits on the first call only.
    fn disarm(&mut self) -> Option<BufferingConfig> {
        if !self.min_threshold_armed {
            return None;
        }
        self.min_threshold_armed = false;
        self.config = self.config.without_min_threshold();
        Some(self.config)
    }
}

/// What the session should do after an endpoint-level event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Verdict {
    Continue,
    /// Only undecodable streams were found.
    NothingDecodable,
}

#[derive(Debug)]
pub(crate) struct EndpointTracker {
    interleave_secs: f64,
    defer_unrecognized: bool,
    closed: bool,
    unrecognized_pending: bool,
    sink_count: u32,
    stages: HashMap<ElementId, BufferingStage>,
}

impl EndpointTracker {
    pub fn new(interleave_secs: f64, defer_unrecognized: bool) -> Self {
        Self {
            interleave_secs,
            defer_unrecognized,
            closed: false,
            unrecognized_pending: false,
            sink_count: 0,
            stages: HashMap::new(),
        }
    }

    /// Whether the runtime announced that no more endpoints will appear.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    #[cfg(test)]
    pub fn stage(&self, queue: ElementId) -> Option<&BufferingStage> {
        self.stages.get(&queue)
    }

    /// Handle a newly decoded endpoint.
    pub fn on_new_endpoint(
        &mut self,
        graph: &mut dyn MediaGraph,
        result: &mut DiscoveryResult,
        endpoint: EndpointId,
        caps: &Caps,
    ) -> Verdict {
        let descriptor = caps.to_string();
        let kind = StreamKind::classify(&descriptor);
        if !kind.is_decodable() {
            tracing::warn!(%endpoint, caps = %descriptor, "endpoint is neither audio nor video");
            return self.record_other(result, descriptor);
        }

        result.mark_recognized(kind);
        tracing::debug!(%endpoint, %kind, caps = %descriptor, "new endpoint");
        if let Err(e) = self.attach(graph, endpoint, kind) {
            tracing::warn!(%endpoint, %kind, error = %e, "failed to attach discard chain");
        }
        Verdict::Continue
    }

    /// Record a stream that cannot be decoded.
    ///
    /// Fails the session when nothing decodable has been seen yet, unless
    /// failure is deferred until the endpoint set closes.
    pub fn record_other(&mut self, result: &mut DiscoveryResult, descriptor: String) -> Verdict {
        tracing::debug!(caps = %descriptor, "unrecognized stream");
        result.other_streams.push(descriptor);
        if result.found_decodable() {
            return Verdict::Continue;
        }
        if self.defer_unrecognized && !self.closed {
            self.unrecognized_pending = true;
            return Verdict::Continue;
        }
        Verdict::NothingDecodable
    }

    /// Mark the endpoint set closed.
    pub fn close(&mut self, result: &DiscoveryResult) -> Verdict {
        self.closed = true;
        tracing::debug!(stages = self.stages.len(), "no more endpoints");
        if self.unrecognized_pending && !result.found_decodable() {
            return Verdict::NothingDecodable;
        }
        Verdict::Continue
    }

    /// A buffering stage overran. Disarms its minimum threshold once.
    pub fn on_overrun(&mut self, graph: &mut dyn MediaGraph, queue: ElementId) -> Result<()> {
        let Some(stage) = self.stages.get_mut(&queue) else {
            return Ok(());
        };
        if let Some(config) = stage.disarm() {
            tracing::debug!(endpoint = %stage.endpoint, "buffer overrun, dropping minimum threshold");
            graph.configure_buffering(queue, config)?;
        }
        Ok(())
    }

    fn attach(&mut self, graph: &mut dyn MediaGraph, endpoint: EndpointId, kind: StreamKind) -> Result<()> {
        let name = format!("sink{}-{kind}", self.sink_count);
        self.sink_count += 1;

        let config = BufferingConfig::for_interleave(self.interleave_secs);
        let queue = graph.add(ElementSpec::Buffering(config))?;
        let sink = graph.add(ElementSpec::DiscardSink { name })?;
        self.stages.insert(queue, BufferingStage::new(endpoint, config));

        graph.watch(queue, Watch::Overrun)?;
        graph.link(queue, sink)?;
        graph.watch(sink, Watch::NegotiatedCaps)?;
        graph.link_endpoint(endpoint, queue)?;
        graph.set_element_state(queue, GraphState::Playing)?;
        graph.set_element_state(sink, GraphState::Playing)?;
        Ok(())
    }
}
