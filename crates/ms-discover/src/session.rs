//! Discovery sessions.
//!
//! [`Discoverer::discover`] builds and starts the graph, then hands it to a
//! task that owns every piece of session state. That task consumes the
//! graph's event channel and the timeout on a single run loop, so nothing in
//! a session is ever touched from two places at once.

use ms_core::config::DiscoveryConfig;
use ms_core::Result;
use ms_graph::{
    event_channel, BusMessage, ElementId, EventReceiver, GraphEvent, GraphRuntime, GraphState,
    MediaGraph,
};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::aggregator;
use crate::builder;
use crate::decider::{self, CompletionDecider, Trigger};
use crate::locator::ResourceLocator;
use crate::result::DiscoveryResult;
use crate::tracker::{EndpointTracker, Verdict};

const IDLE: u8 = 0;
const RUNNING: u8 = 1;
const FINISHED: u8 = 2;

/// The single notification a session delivers.
#[derive(Debug, Clone, PartialEq)]
pub struct Discovered {
    pub success: bool,
    pub result: DiscoveryResult,
}

impl Discovered {
    fn failed(locator: &str) -> Self {
        Self {
            success: false,
            result: DiscoveryResult::new(locator),
        }
    }

    /// Outcome of a session whose graph never started.
    fn start_failed(locator: &str) -> Self {
        let mut result = DiscoveryResult::new(locator);
        let mut decider = CompletionDecider::new();
        let success = decider.fire(Trigger::StartFailed, &result).unwrap_or(false);
        decider.stop();
        result.success = success;
        Self { success, result }
    }
}

/// Discovers what a single resource contains.
///
/// A `Discoverer` runs at most one session. Calling [`discover`] again,
/// whether the first session is still running or already finished, reports
/// failure straight away without touching a graph.
///
/// [`discover`]: Discoverer::discover
#[derive(Debug)]
pub struct Discoverer {
    locator: ResourceLocator,
    config: DiscoveryConfig,
    state: Arc<AtomicU8>,
}

impl Discoverer {
    pub fn new(locator: ResourceLocator, config: DiscoveryConfig) -> Self {
        Self {
            locator,
            config,
            state: Arc::new(AtomicU8::new(IDLE)),
        }
    }

    pub fn locator(&self) -> &ResourceLocator {
        &self.locator
    }

    /// Whether a session ran and delivered its notification.
    pub fn is_finished(&self) -> bool {
        self.state.load(Ordering::Acquire) == FINISHED
    }

    /// Start discovery. Returns immediately; the outcome arrives through the
    /// returned handle. Must be called from within a tokio runtime.
    pub fn discover(&self, runtime: &dyn GraphRuntime) -> SessionHandle {
        let label = self.locator.to_string();
        if self
            .state
            .compare_exchange(IDLE, RUNNING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!(locator = %label, "discoverer already used");
            return SessionHandle::ready(Discovered::failed(&label));
        }

        tracing::info!(locator = %label, runtime = runtime.name(), "starting discovery");
        let deadline = Instant::now() + self.config.timeout();

        let session = match self.start(runtime, &label, deadline) {
            Ok(session) => session,
            Err(e) => {
                if e.is_resource_error() {
                    tracing::warn!(locator = %label, error = %e, "graph could not be built or started");
                } else {
                    tracing::warn!(locator = %label, error = %e, "discovery could not start");
                }
                let discovered = Discovered::start_failed(&label);
                self.state.store(FINISHED, Ordering::Release);
                return SessionHandle::ready(discovered);
            }
        };

        let (done_tx, done_rx) = oneshot::channel();
        tokio::spawn(session.run(done_tx));
        SessionHandle {
            locator: label,
            rx: done_rx,
        }
    }

    fn start(&self, runtime: &dyn GraphRuntime, label: &str, deadline: Instant) -> Result<Session> {
        self.config.check()?;
        let (tx, events) = event_channel();
        let mut graph = runtime.create_graph(tx)?;

        let started = builder::build(graph.as_mut(), &self.locator)
            .and_then(|front_end| graph.set_state(GraphState::Playing).map(|()| front_end));
        let front_end = match started {
            Ok(front_end) => front_end,
            Err(e) => {
                if let Err(teardown) = graph.set_state(GraphState::Ready) {
                    tracing::debug!(error = %teardown, "teardown after failed start");
                }
                return Err(e);
            }
        };

        Ok(Session {
            label: label.to_string(),
            graph,
            events,
            deadline,
            front_end,
            result: DiscoveryResult::new(label),
            tracker: EndpointTracker::new(
                self.config.max_interleave_secs,
                self.config.defer_unrecognized_failure,
            ),
            decider: CompletionDecider::new(),
            state: Arc::clone(&self.state),
        })
    }
}

/// Receives the outcome of one session.
#[derive(Debug)]
pub struct SessionHandle {
    locator: String,
    rx: oneshot::Receiver<Discovered>,
}

impl SessionHandle {
    fn ready(discovered: Discovered) -> Self {
        let (tx, rx) = oneshot::channel();
        let locator = discovered.result.locator.clone();
        // The receiver is alive, so this cannot fail.
        let _ = tx.send(discovered);
        Self { locator, rx }
    }

    /// Wait for the session's single notification.
    pub async fn discovered(self) -> Discovered {
        match self.rx.await {
            Ok(discovered) => discovered,
            Err(_) => {
                tracing::warn!(locator = %self.locator, "session ended without reporting");
                Discovered::failed(&self.locator)
            }
        }
    }
}

/// Discover `locator` with a fresh [`Discoverer`] and wait for the outcome.
pub async fn discover(locator: ResourceLocator, config: DiscoveryConfig, runtime: &dyn GraphRuntime) -> Discovered {
    Discoverer::new(locator, config).discover(runtime).discovered().await
}

struct Session {
    label: String,
    graph: Box<dyn MediaGraph>,
    events: EventReceiver,
    deadline: Instant,
    front_end: ElementId,
    result: DiscoveryResult,
    tracker: EndpointTracker,
    decider: CompletionDecider,
    state: Arc<AtomicU8>,
}

impl Session {
    async fn run(mut self, done: oneshot::Sender<Discovered>) {
        {
            let timeout = tokio::time::sleep_until(self.deadline);
            tokio::pin!(timeout);

            while self.decider.is_running() {
                tokio::select! {
                    event = self.events.recv() => match event {
                        Some(event) => self.handle(event),
                        None => {
                            tracing::warn!(locator = %self.label, "graph dropped its event channel");
                            self.fire(Trigger::Error);
                        }
                    },
                    () = &mut timeout => {
                        tracing::debug!(locator = %self.label, "timed out");
                        self.fire(Trigger::Timeout);
                    }
                }
            }
            // Leaving this scope cancels the timeout.
        }

        self.finish(done).await;
    }

    fn fire(&mut self, trigger: Trigger) {
        self.decider.fire(trigger, &self.result);
    }

    fn handle(&mut self, event: GraphEvent) {
        tracing::trace!(locator = %self.label, event = event.name(), "graph event");
        match event {
            GraphEvent::ElementAdded { element, .. } => {
                if let Err(e) = builder::on_element_added(self.graph.as_mut(), element) {
                    tracing::warn!(%element, error = %e, "failed to hook added element");
                }
            }
            GraphEvent::NewEndpoint { element, endpoint, caps } => {
                if element != self.front_end {
                    tracing::debug!(%element, %endpoint, "endpoint from unexpected element");
                }
                let verdict = self
                    .tracker
                    .on_new_endpoint(self.graph.as_mut(), &mut self.result, endpoint, &caps);
                self.apply(verdict);
            }
            GraphEvent::NoMoreEndpoints { .. } => {
                let verdict = self.tracker.close(&self.result);
                self.apply(verdict);
            }
            GraphEvent::CapsNegotiated { sink, caps } => {
                let recorded =
                    aggregator::on_caps_negotiated(self.graph.as_ref(), &mut self.result, sink, caps.as_ref());
                if recorded.is_some() && decider::all_capabilities_recorded(&self.result, self.tracker.is_closed()) {
                    self.fire(Trigger::CapabilitiesSatisfied);
                }
            }
            GraphEvent::ContainerType { caps, .. } => {
                tracing::debug!(mime = %caps, "container type identified");
                self.result.mime = Some(caps.to_string());
            }
            GraphEvent::UnrecognizedStream { caps, .. } => {
                let verdict = self.tracker.record_other(&mut self.result, caps.to_string());
                self.apply(verdict);
            }
            GraphEvent::Overrun { element } => {
                if let Err(e) = self.tracker.on_overrun(self.graph.as_mut(), element) {
                    tracing::warn!(%element, error = %e, "failed to relax buffering");
                }
            }
            GraphEvent::Bus(BusMessage::Eos) => self.fire(Trigger::Eos),
            GraphEvent::Bus(BusMessage::Error { source, message }) => {
                tracing::warn!(locator = %self.label, %source, %message, "graph error");
                self.fire(Trigger::Error);
            }
            GraphEvent::Bus(BusMessage::Tag(tags)) => self.result.merge_tags(tags),
        }
    }

    fn apply(&mut self, verdict: Verdict) {
        if verdict == Verdict::NothingDecodable {
            self.fire(Trigger::NothingDecodable);
        }
    }

    async fn finish(mut self, done: oneshot::Sender<Discovered>) {
        // Stop listening before the graph winds down, then shut it down on a
        // later turn of the run loop.
        self.events.close();
        tokio::task::yield_now().await;
        if let Err(e) = self.graph.set_state(GraphState::Ready) {
            tracing::warn!(locator = %self.label, error = %e, "failed to stop graph");
        }

        if !self.decider.stop() {
            return;
        }
        let success = self.decider.outcome();
        self.result.success = success;
        self.state.store(FINISHED, Ordering::Release);
        tracing::info!(
            locator = %self.label,
            success,
            trigger = ?self.decider.trigger(),
            audio = self.result.is_audio,
            video = self.result.is_video,
            "discovery finished"
        );

        let discovered = Discovered {
            success,
            result: self.result,
        };
        if done.send(discovered).is_err() {
            tracing::debug!("discovery handle dropped before completion");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ms_graph::{Caps, ScriptStep, ScriptedEndpoint, ScriptedRuntime};

    #[tokio::test(start_paused = true)]
    async fn invalid_config_fails_without_graph() {
        let runtime = ScriptedRuntime::new();
        let config = DiscoveryConfig {
            max_interleave_secs: -1.0,
            ..DiscoveryConfig::default()
        };
        let discoverer = Discoverer::new(ResourceLocator::parse("/a.ogg").unwrap(), config);
        let discovered = discoverer.discover(&runtime).discovered().await;
        assert!(!discovered.success);
        assert!(discoverer.is_finished());
        assert_eq!(runtime.log().graphs_created(), 0);
    }

    #[test]
    fn start_failure_runs_through_decider() {
        let discovered = Discovered::start_failed("/a.ogg");
        assert!(!discovered.success);
        assert!(!discovered.result.success);
        assert_eq!(discovered.result.locator, "/a.ogg");
    }

    #[tokio::test(start_paused = true)]
    async fn oversized_interleave_fails_cleanly() {
        let runtime = ScriptedRuntime::new()
            .endpoint(
                ScriptedEndpoint::new(0, Caps::new("audio/x-raw-int").unfixed())
                    .negotiates(Caps::new("audio/x-raw-int").with_int("rate", 8000)),
            )
            .step(ScriptStep::Eos);
        let config = DiscoveryConfig {
            max_interleave_secs: 1.0e20,
            ..DiscoveryConfig::default()
        };
        let discoverer = Discoverer::new(ResourceLocator::parse("/a.ogg").unwrap(), config);
        let discovered = discoverer.discover(&runtime).discovered().await;
        assert!(!discovered.success);
        assert!(discoverer.is_finished());
        assert_eq!(runtime.log().graphs_created(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn second_call_while_running_fails() {
        let runtime = ScriptedRuntime::new()
            .endpoint(
                ScriptedEndpoint::new(0, Caps::new("audio/x-raw-int").unfixed())
                    .negotiates(Caps::new("audio/x-raw-int").with_int("rate", 8000)),
            )
            .step(ScriptStep::Eos);
        let discoverer = Discoverer::new(ResourceLocator::parse("/a.ogg").unwrap(), DiscoveryConfig::default());

        let first = discoverer.discover(&runtime);
        let second = discoverer.discover(&runtime).discovered().await;
        assert!(!second.success);
        assert_eq!(runtime.log().graphs_created(), 1);

        assert!(first.discovered().await.success);
        assert!(discoverer.is_finished());
    }
}
