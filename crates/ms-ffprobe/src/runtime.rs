//! A [`GraphRuntime`] that answers discovery from a single ffprobe run.
//!
//! When the graph is set to playing, ffprobe is run once on the input. Its
//! report is replayed as graph events: container type, tags, one endpoint
//! per audio or video stream, then unrecognized streams, then the end of the
//! endpoint set. Each endpoint negotiates as soon as the core has linked and
//! started the chain behind it. End of stream follows once every endpoint
//! has negotiated.

use ms_core::config::ToolsConfig;
use ms_core::{Error, Result};
use ms_graph::{
    BufferingConfig, BusMessage, Caps, Dispatcher, ElementId, ElementSpec, ElementTable, EndpointId,
    EventSender, GraphEvent, GraphRuntime, GraphState, MediaGraph, Topology, Watch,
};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::command::ToolCommand;
use crate::mapping::{self, ProbedStream};
use crate::tools;

const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(30);

/// Runtime backed by the `ffprobe` CLI.
#[derive(Debug, Clone)]
pub struct FfprobeRuntime {
    ffprobe: PathBuf,
    timeout: Duration,
}

impl FfprobeRuntime {
    pub fn new(ffprobe: PathBuf) -> Self {
        Self {
            ffprobe,
            timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    /// Locate ffprobe from configuration or `PATH`.
    pub fn from_config(config: &ToolsConfig) -> Result<Self> {
        tools::locate_ffprobe(config).map(Self::new)
    }

    /// Limit for a single ffprobe run.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn ffprobe_path(&self) -> &PathBuf {
        &self.ffprobe
    }
}

impl GraphRuntime for FfprobeRuntime {
    fn name(&self) -> &'static str {
        "ffprobe"
    }

    fn create_graph(&self, events: EventSender) -> Result<Box<dyn MediaGraph>> {
        Ok(Box::new(FfprobeGraph {
            ffprobe: self.ffprobe.clone(),
            timeout: self.timeout,
            elements: ElementTable::new(),
            shared: Arc::new(Mutex::new(Shared {
                dispatcher: Dispatcher::new(events),
                topology: Topology::new(),
                endpoints: HashMap::new(),
                pending: HashSet::new(),
                announced: false,
                eos_posted: false,
            })),
            probe: None,
        }))
    }
}

/// ffprobe arguments selecting the input described by `spec`.
pub fn input_args(spec: &ElementSpec) -> Result<Vec<String>> {
    let args = match spec {
        ElementSpec::UriDecoder { uri } => {
            if let Some(path) = uri.strip_prefix("file://") {
                vec![path.to_string()]
            } else if let Some(device) = uri.strip_prefix("v4l2://").or_else(|| uri.strip_prefix("v4l://")) {
                vec!["-f".into(), "video4linux2".into(), device.to_string()]
            } else if let Some(device) = uri.strip_prefix("dvd://") {
                vec!["-f".into(), "dvdvideo".into(), device.to_string()]
            } else {
                vec![uri.clone()]
            }
        }
        ElementSpec::DiscSource { device, title } => vec![
            "-f".into(),
            "dvdvideo".into(),
            "-title".into(),
            title.to_string(),
            device.clone(),
        ],
        other => {
            return Err(Error::graph(
                "set_state",
                format!("{} cannot read input", other.factory_name()),
            ))
        }
    };
    Ok(args)
}

struct Endpoint {
    negotiated: Caps,
    duration: Option<i64>,
}

struct Shared {
    dispatcher: Dispatcher,
    topology: Topology,
    endpoints: HashMap<EndpointId, Endpoint>,
    /// Endpoints that have not negotiated yet.
    pending: HashSet<EndpointId>,
    /// Every endpoint has been announced.
    announced: bool,
    eos_posted: bool,
}

impl Shared {
    fn negotiate(&mut self, endpoint: EndpointId) {
        if !self.pending.contains(&endpoint) || !self.topology.chain_playing(endpoint) {
            return;
        }
        let Some(sink) = self.topology.chain_from(endpoint).last().copied() else {
            return;
        };
        let Some(caps) = self.endpoints.get(&endpoint).map(|ep| ep.negotiated.clone()) else {
            return;
        };
        self.pending.remove(&endpoint);
        self.dispatcher.emit(
            sink,
            Watch::NegotiatedCaps,
            GraphEvent::CapsNegotiated {
                sink,
                caps: Some(caps),
            },
        );
        self.maybe_post_eos();
    }

    fn maybe_post_eos(&mut self) {
        if self.announced && self.pending.is_empty() && !self.eos_posted {
            self.eos_posted = true;
            self.dispatcher.post(BusMessage::Eos);
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Targets {
    front_end: ElementId,
    internal: Option<ElementId>,
    typefind: Option<ElementId>,
}

struct FfprobeGraph {
    ffprobe: PathBuf,
    timeout: Duration,
    elements: ElementTable,
    shared: Arc<Mutex<Shared>>,
    probe: Option<JoinHandle<()>>,
}

impl FfprobeGraph {
    fn require(&self, element: ElementId, operation: &str) -> Result<()> {
        if self.elements.contains(element) {
            Ok(())
        } else {
            Err(Error::graph(operation, format!("unknown {element}")))
        }
    }

    fn start(&mut self) -> Result<()> {
        if self.probe.is_some() {
            return Ok(());
        }
        let front_end = self
            .elements
            .front_end()
            .ok_or_else(|| Error::graph("set_state", "graph has no decoder"))?;
        let input = self
            .elements
            .input()
            .ok_or_else(|| Error::graph("set_state", "graph has no input"))?;

        let mut command = ToolCommand::new(self.ffprobe.clone());
        command
            .args(["-v", "error", "-print_format", "json", "-show_format", "-show_streams"])
            .args(input_args(input)?)
            .timeout(self.timeout);

        let targets = Targets {
            front_end,
            internal: self.elements.internal(),
            typefind: self.elements.typefind(),
        };
        self.probe = Some(tokio::spawn(run_probe(Arc::clone(&self.shared), command, targets)));
        Ok(())
    }
}

async fn run_probe(shared: Arc<Mutex<Shared>>, command: ToolCommand, targets: Targets) {
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

    let report = command
        .execute()
        .await
        .and_then(|output| mapping::parse_report(&output.stdout));

    let mut shared = shared.lock();
    let report = match report {
        Ok(report) => report,
        Err(e) => {
            tracing::debug!(error = %e, "ffprobe failed");
            shared.dispatcher.post(BusMessage::Error {
                source: "ffprobe".into(),
                message: e.to_string(),
            });
            return;
        }
    };

    if let (Some(typefind), Some(caps)) = (targets.typefind, report.container) {
        shared.dispatcher.emit(
            typefind,
            Watch::ContainerType,
            GraphEvent::ContainerType {
                element: typefind,
                caps,
            },
        );
    }
    if !report.tags.is_empty() {
        shared.dispatcher.post(BusMessage::Tag(report.tags));
    }

    let front_end = targets.front_end;
    let decoder = targets.internal.unwrap_or(front_end);
    // The whole report is known up front, so decodable endpoints go first
    // and a leading data or subtitle stream cannot end discovery early.
    let (decodable, unrecognized): (Vec<_>, Vec<_>) = report
        .streams
        .into_iter()
        .partition(|stream| matches!(stream, ProbedStream::Decodable { .. }));
    for stream in decodable.into_iter().chain(unrecognized) {
        match stream {
            ProbedStream::Decodable {
                index,
                caps,
                negotiated,
                duration,
            } => {
                let endpoint = EndpointId(index);
                shared.endpoints.insert(endpoint, Endpoint { negotiated, duration });
                shared.pending.insert(endpoint);
                shared.dispatcher.emit(
                    front_end,
                    Watch::Endpoints,
                    GraphEvent::NewEndpoint {
                        element: front_end,
                        endpoint,
                        caps,
                    },
                );
            }
            ProbedStream::Unrecognized { caps, .. } => {
                shared.dispatcher.emit(
                    decoder,
                    Watch::UnknownType,
                    GraphEvent::UnrecognizedStream { element: decoder, caps },
                );
            }
        }
    }

    shared.dispatcher.emit(
        front_end,
        Watch::Endpoints,
        GraphEvent::NoMoreEndpoints { element: front_end },
    );
    shared.announced = true;
    shared.maybe_post_eos();
}

impl MediaGraph for FfprobeGraph {
    fn add(&mut self, spec: ElementSpec) -> Result<ElementId> {
        Ok(self.elements.insert(spec))
    }

    fn link(&mut self, upstream: ElementId, downstream: ElementId) -> Result<()> {
        self.require(upstream, "link")?;
        self.require(downstream, "link")?;
        if !self.shared.lock().topology.link(upstream, downstream) {
            return Err(Error::graph("link", format!("{upstream} already linked")));
        }
        Ok(())
    }

    fn link_endpoint(&mut self, endpoint: EndpointId, downstream: ElementId) -> Result<()> {
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
        self.require(element, "watch")?;
        self.shared.lock().dispatcher.watch(element, watch);
        Ok(())
    }

    fn configure_buffering(&mut self, element: ElementId, config: BufferingConfig) -> Result<()> {
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
        self.require(element, "set_element_state")?;
        let mut shared = self.shared.lock();
        shared.topology.set_state(element, state);
        if let Some(endpoint) = shared.topology.endpoint_feeding(element) {
            shared.negotiate(endpoint);
        }
        Ok(())
    }

    fn set_state(&mut self, state: GraphState) -> Result<()> {
        match state {
            GraphState::Playing => self.start(),
            _ => {
                if let Some(probe) = self.probe.take() {
                    probe.abort();
                }
                Ok(())
            }
        }
    }

    fn query_upstream_duration(&self, sink: ElementId) -> Option<i64> {
        let shared = self.shared.lock();
        let endpoint = shared.topology.endpoint_feeding(sink)?;
        shared.endpoints.get(&endpoint)?.duration
    }
}

impl Drop for FfprobeGraph {
    fn drop(&mut self) {
        if let Some(probe) = self.probe.take() {
            probe.abort();
        }
    }
}
