//! A deterministic [`GraphRuntime`] that replays a script.
//!
//! [`ScriptedRuntime`] stands in for a real decoder. Once its graph is set
//! to playing it walks the script one step at a time, pausing briefly
//! between steps so the consumer drains each event before the next one is
//! produced. Endpoints negotiate their caps when the chain behind them is
//! linked and running, the way a real graph only negotiates once data can
//! flow. Every call the core makes is recorded in a [`GraphLog`].
//!
//! ```no_run
//! use ms_graph::{Caps, ScriptStep, ScriptedEndpoint, ScriptedRuntime};
//!
//! let runtime = ScriptedRuntime::new()
//!     .endpoint(
//!         ScriptedEndpoint::new(0, Caps::new("audio/x-raw-int").unfixed())
//!             .negotiates(Caps::new("audio/x-raw-int").with_int("rate", 48000))
//!             .duration(10_000_000_000),
//!     )
//!     .step(ScriptStep::NoMoreEndpoints)
//!     .step(ScriptStep::Eos);
//! let log = runtime.log();
//! # let _ = (runtime, log);
//! ```

use ms_core::{Error, Result};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::buffering::BufferingConfig;
use crate::caps::Caps;
use crate::dispatch::Dispatcher;
use crate::elements::ElementTable;
use crate::event::{BusMessage, EventSender, GraphEvent, TagList};
use crate::graph::{ElementSpec, GraphRuntime, GraphState, MediaGraph, Watch};
use crate::ids::{ElementId, EndpointId};
use crate::topology::Topology;

/// Pause between script steps.
const DEFAULT_STEP_GAP: Duration = Duration::from_millis(1);

// ---------------------------------------------------------------------------
// Script
// ---------------------------------------------------------------------------

/// A decoded endpoint the script will announce.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptedEndpoint {
    pub id: EndpointId,
    pub caps: Caps,
    /// Caps reported once the chain behind the endpoint runs. `None` means
    /// the endpoint never negotiates.
    pub negotiated: Option<Caps>,
    /// Answer to the duration query, in nanoseconds.
    pub duration: Option<i64>,
}

impl ScriptedEndpoint {
    pub fn new(id: u32, caps: Caps) -> Self {
        Self {
            id: EndpointId(id),
            caps,
            negotiated: None,
            duration: None,
        }
    }

    #[must_use]
    pub fn negotiates(mut self, caps: Caps) -> Self {
        self.negotiated = Some(caps);
        self
    }

    #[must_use]
    pub fn duration(mut self, ns: i64) -> Self {
        self.duration = Some(ns);
        self
    }
}

/// One step of a script.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptStep {
    Endpoint(ScriptedEndpoint),
    NoMoreEndpoints,
    ContainerType(Caps),
    Unrecognized(Caps),
    Tags(TagList),
    Overrun(EndpointId),
    /// Report `caps` on the sink behind an endpoint, whether or not it has
    /// negotiated before. Ignored while the endpoint is unlinked.
    Negotiate(EndpointId, Caps),
    Eos,
    Error(String),
    Delay(Duration),
}

// ---------------------------------------------------------------------------
// Call log
// ---------------------------------------------------------------------------

/// A graph method call, as recorded by the scripted runtime.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphCall {
    Add { element: ElementId, spec: ElementSpec },
    Link { upstream: ElementId, downstream: ElementId },
    LinkEndpoint { endpoint: EndpointId, downstream: ElementId },
    Watch { element: ElementId, watch: Watch },
    ConfigureBuffering { element: ElementId, config: BufferingConfig },
    SetElementState { element: ElementId, state: GraphState },
    SetState(GraphState),
    QueryDuration { sink: ElementId },
}

#[derive(Debug, Default)]
struct LogInner {
    graphs_created: usize,
    calls: Vec<GraphCall>,
}

/// Shared record of everything done to graphs of one runtime.
#[derive(Debug, Clone, Default)]
pub struct GraphLog {
    inner: Arc<Mutex<LogInner>>,
}

impl GraphLog {
    pub fn graphs_created(&self) -> usize {
        self.inner.lock().graphs_created
    }

    pub fn calls(&self) -> Vec<GraphCall> {
        self.inner.lock().calls.clone()
    }

    pub fn count(&self, pred: impl Fn(&GraphCall) -> bool) -> usize {
        self.inner.lock().calls.iter().filter(|c| pred(c)).count()
    }

    /// Specs of every element created, in order.
    pub fn added(&self) -> Vec<ElementSpec> {
        self.inner
            .lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                GraphCall::Add { spec, .. } => Some(spec.clone()),
                _ => None,
            })
            .collect()
    }

    /// Every whole-graph state change, in order.
    pub fn graph_states(&self) -> Vec<GraphState> {
        self.inner
            .lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                GraphCall::SetState(state) => Some(*state),
                _ => None,
            })
            .collect()
    }

    /// Every buffering reconfiguration, in order.
    pub fn buffering_updates(&self) -> Vec<(ElementId, BufferingConfig)> {
        self.inner
            .lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                GraphCall::ConfigureBuffering { element, config } => Some((*element, *config)),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: GraphCall) {
        self.inner.lock().calls.push(call);
    }

    fn graph_created(&self) {
        self.inner.lock().graphs_created += 1;
    }
}

// ---------------------------------------------------------------------------
// Runtime
// ---------------------------------------------------------------------------

/// Runtime whose graphs replay a fixed script.
#[derive(Debug, Clone, Default)]
pub struct ScriptedRuntime {
    steps: Vec<ScriptStep>,
    refused: Vec<&'static str>,
    fail_start: bool,
    step_gap: Option<Duration>,
    log: GraphLog,
}

impl ScriptedRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn step(mut self, step: ScriptStep) -> Self {
        self.steps.push(step);
        self
    }

    #[must_use]
    pub fn endpoint(self, endpoint: ScriptedEndpoint) -> Self {
        self.step(ScriptStep::Endpoint(endpoint))
    }

    /// Make `add` fail for elements with this factory name.
    #[must_use]
    pub fn refuse_element(mut self, factory_name: &'static str) -> Self {
        self.refused.push(factory_name);
        self
    }

    /// Make setting the graph to playing fail.
    #[must_use]
    pub fn fail_start(mut self) -> Self {
        self.fail_start = true;
        self
    }

    #[must_use]
    pub fn step_gap(mut self, gap: Duration) -> Self {
        self.step_gap = Some(gap);
        self
    }

    /// Handle to the call log shared by every graph this runtime creates.
    pub fn log(&self) -> GraphLog {
        self.log.clone()
    }
}

impl GraphRuntime for ScriptedRuntime {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn create_graph(&self, events: EventSender) -> Result<Box<dyn MediaGraph>> {
        self.log.graph_created();
        Ok(Box::new(ScriptedGraph {
            shared: Arc::new(Mutex::new(Shared {
                dispatcher: Dispatcher::new(events),
                topology: Topology::new(),
                endpoints: HashMap::new(),
                negotiated: HashSet::new(),
            })),
            steps: Some(self.steps.clone()),
            refused: self.refused.clone(),
            fail_start: self.fail_start,
            step_gap: self.step_gap.unwrap_or(DEFAULT_STEP_GAP),
            log: self.log.clone(),
            elements: ElementTable::new(),
            emitter: None,
        }))
    }
}

// ---------------------------------------------------------------------------
// Graph
// ---------------------------------------------------------------------------

struct Shared {
    dispatcher: Dispatcher,
    topology: Topology,
    endpoints: HashMap<EndpointId, ScriptedEndpoint>,
    negotiated: HashSet<EndpointId>,
}

impl Shared {
    /// Report negotiated caps once the chain behind `endpoint` is running.
    fn negotiate(&mut self, endpoint: EndpointId) {
        if self.negotiated.contains(&endpoint) || !self.topology.chain_playing(endpoint) {
            return;
        }
        let Some(caps) = self.endpoints.get(&endpoint).and_then(|ep| ep.negotiated.clone()) else {
            return;
        };
        let Some(sink) = self.topology.chain_from(endpoint).last().copied() else {
            return;
        };
        self.negotiated.insert(endpoint);
        self.dispatcher.emit(
            sink,
            Watch::NegotiatedCaps,
            GraphEvent::CapsNegotiated {
                sink,
                caps: Some(caps),
            },
        );
    }
}

/// Where script steps are delivered from.
#[derive(Debug, Clone, Copy)]
struct Targets {
    front_end: ElementId,
    internal: Option<ElementId>,
    typefind: Option<ElementId>,
}

struct ScriptedGraph {
    shared: Arc<Mutex<Shared>>,
    steps: Option<Vec<ScriptStep>>,
    refused: Vec<&'static str>,
    fail_start: bool,
    step_gap: Duration,
    log: GraphLog,
    elements: ElementTable,
    emitter: Option<JoinHandle<()>>,
}

impl ScriptedGraph {
    fn require(&self, element: ElementId, operation: &str) -> Result<()> {
        if self.elements.contains(element) {
            Ok(())
        } else {
            Err(Error::graph(operation, format!("unknown {element}")))
        }
    }

    fn start(&mut self) -> Result<()> {
        if self.fail_start {
            return Err(Error::graph("set_state", "scripted start failure"));
        }
        let front_end = self
            .elements
            .front_end()
            .ok_or_else(|| Error::graph("set_state", "graph has no decoder"))?;
        let Some(steps) = self.steps.take() else {
            return Ok(());
        };
        let targets = Targets {
            front_end,
            internal: self.elements.internal(),
            typefind: self.elements.typefind(),
        };
        let shared = Arc::clone(&self.shared);
        let gap = self.step_gap;
        self.emitter = Some(tokio::spawn(replay(shared, steps, targets, gap)));
        Ok(())
    }
}

async fn replay(shared: Arc<Mutex<Shared>>, steps: Vec<ScriptStep>, targets: Targets, gap: Duration) {
    if let Some(internal) = targets.internal {
        shared.lock().dispatcher.emit(
            targets.front_end,
            Watch::ElementAdded,
            GraphEvent::ElementAdded {
                bin: targets.front_end,
                element: internal,
            },
        );
    }

    for step in steps {
        tokio::time::sleep(gap).await;
        if let ScriptStep::Delay(d) = step {
            tokio::time::sleep(d).await;
            continue;
        }
        let mut shared = shared.lock();
        if shared.dispatcher.is_detached() {
            break;
        }
        apply(&mut shared, step, targets);
    }
}

fn apply(shared: &mut Shared, step: ScriptStep, targets: Targets) {
    let front_end = targets.front_end;
    match step {
        ScriptStep::Endpoint(endpoint) => {
            let event = GraphEvent::NewEndpoint {
                element: front_end,
                endpoint: endpoint.id,
                caps: endpoint.caps.clone(),
            };
            shared.endpoints.insert(endpoint.id, endpoint);
            shared.dispatcher.emit(front_end, Watch::Endpoints, event);
        }
        ScriptStep::NoMoreEndpoints => {
            shared.dispatcher.emit(
                front_end,
                Watch::Endpoints,
                GraphEvent::NoMoreEndpoints { element: front_end },
            );
        }
        ScriptStep::ContainerType(caps) => {
            if let Some(typefind) = targets.typefind {
                shared.dispatcher.emit(
                    typefind,
                    Watch::ContainerType,
                    GraphEvent::ContainerType {
                        element: typefind,
                        caps,
                    },
                );
            }
        }
        ScriptStep::Unrecognized(caps) => {
            let element = targets.internal.unwrap_or(front_end);
            shared.dispatcher.emit(
                element,
                Watch::UnknownType,
                GraphEvent::UnrecognizedStream { element, caps },
            );
        }
        ScriptStep::Tags(tags) => shared.dispatcher.post(BusMessage::Tag(tags)),
        ScriptStep::Overrun(endpoint) => {
            if let Some(queue) = shared.topology.endpoint_target(endpoint) {
                shared
                    .dispatcher
                    .emit(queue, Watch::Overrun, GraphEvent::Overrun { element: queue });
            }
        }
        ScriptStep::Negotiate(endpoint, caps) => {
            if let Some(sink) = shared.topology.chain_from(endpoint).last().copied() {
                shared.negotiated.insert(endpoint);
                shared.dispatcher.emit(
                    sink,
                    Watch::NegotiatedCaps,
                    GraphEvent::CapsNegotiated {
                        sink,
                        caps: Some(caps),
                    },
                );
            }
        }
        ScriptStep::Eos => shared.dispatcher.post(BusMessage::Eos),
        ScriptStep::Error(message) => shared.dispatcher.post(BusMessage::Error {
            source: "scripted".into(),
            message,
        }),
        ScriptStep::Delay(_) => {}
    }
}

impl MediaGraph for ScriptedGraph {
    fn add(&mut self, spec: ElementSpec) -> Result<ElementId> {
        if self.refused.contains(&spec.factory_name()) {
            return Err(Error::element_unavailable(spec.factory_name()));
        }
        let id = self.elements.insert(spec.clone());
        self.log.record(GraphCall::Add { element: id, spec });
        Ok(id)
    }

    fn link(&mut self, upstream: ElementId, downstream: ElementId) -> Result<()> {
        self.log.record(GraphCall::Link { upstream, downstream });
        self.require(upstream, "link")?;
        self.require(downstream, "link")?;
        if !self.shared.lock().topology.link(upstream, downstream) {
            return Err(Error::graph("link", format!("{upstream} already linked")));
        }
        Ok(())
    }

    fn link_endpoint(&mut self, endpoint: EndpointId, downstream: ElementId) -> Result<()> {
        self.log.record(GraphCall::LinkEndpoint { endpoint, downstream });
        self.require(downstream, "link_endpoint")?;
        let mut shared = self.shared.lock();
        if !shared.endpoints.contains_key(&endpoint) {
            return Err(Error::graph("link_endpoint", format!("unknown {endpoint}")));
        }
        if !shared.topology.link_endpoint(endpoint, downstream) {
            return Err(Error::graph("link_endpoint", format!("{endpoint} already linked")));
        }
        shared.negotiate(endpoint);
        Ok(())
    }

    fn child_by_name(&self, element: ElementId, name: &str) -> Option<ElementId> {
        self.elements.child(element, name)
    }

    fn watch(&mut self, element: ElementId, watch: Watch) -> Result<()> {
        self.log.record(GraphCall::Watch { element, watch });
        self.require(element, "watch")?;
        self.shared.lock().dispatcher.watch(element, watch);
        Ok(())
    }

    fn configure_buffering(&mut self, element: ElementId, config: BufferingConfig) -> Result<()> {
        self.log.record(GraphCall::ConfigureBuffering { element, config });
        match self.elements.spec_mut(element) {
            Some(ElementSpec::Buffering(current)) => {
                *current = config;
                Ok(())
            }
            _ => Err(Error::graph(
                "configure_buffering",
                format!("{element} is not a buffering stage"),
            )),
        }
    }

    fn set_element_state(&mut self, element: ElementId, state: GraphState) -> Result<()> {
        self.log.record(GraphCall::SetElementState { element, state });
        self.require(element, "set_element_state")?;
        let mut shared = self.shared.lock();
        shared.topology.set_state(element, state);
        if let Some(endpoint) = shared.topology.endpoint_feeding(element) {
            shared.negotiate(endpoint);
        }
        Ok(())
    }

    fn set_state(&mut self, state: GraphState) -> Result<()> {
        self.log.record(GraphCall::SetState(state));
        match state {
            GraphState::Playing => self.start(),
            _ => {
                if let Some(emitter) = self.emitter.take() {
                    emitter.abort();
                }
                Ok(())
            }
        }
    }

    fn query_upstream_duration(&self, sink: ElementId) -> Option<i64> {
        self.log.record(GraphCall::QueryDuration { sink });
        let shared = self.shared.lock();
        let endpoint = shared.topology.endpoint_feeding(sink)?;
        shared.endpoints.get(&endpoint)?.duration
    }
}

impl Drop for ScriptedGraph {
    fn drop(&mut self) {
        if let Some(emitter) = self.emitter.take() {
            emitter.abort();
        }
    }
}
