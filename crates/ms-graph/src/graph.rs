//! The [`MediaGraph`] and [`GraphRuntime`] traits.

use ms_core::Result;
use serde::Serialize;
use std::fmt;

use crate::buffering::BufferingConfig;
use crate::event::EventSender;
use crate::ids::{ElementId, EndpointId};

/// Lifecycle state of a graph or of a single element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GraphState {
    Null,
    Ready,
    Paused,
    Playing,
}

impl fmt::Display for GraphState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Ready => write!(f, "ready"),
            Self::Paused => write!(f, "paused"),
            Self::Playing => write!(f, "playing"),
        }
    }
}

/// Elements the discovery core knows how to ask for.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ElementSpec {
    /// Self-configuring front-end that reads a URI, demuxes, and decodes
    /// every elementary stream it can.
    UriDecoder { uri: String },
    /// Source reading one title from an optical disc.
    DiscSource { device: String, title: u32 },
    /// Generic demuxing and decoding stage fed by an explicit source.
    Demuxer,
    /// Bounded buffering stage.
    Buffering(BufferingConfig),
    /// Sink that discards everything it receives.
    DiscardSink { name: String },
}

impl ElementSpec {
    /// Factory name of the element, as used in logs and errors.
    pub fn factory_name(&self) -> &'static str {
        match self {
            Self::UriDecoder { .. } => "uridecodebin",
            Self::DiscSource { .. } => "dvdreadsrc",
            Self::Demuxer => "decodebin2",
            Self::Buffering(_) => "queue",
            Self::DiscardSink { .. } => "fakesink",
        }
    }
}

/// Notifications a caller can register for on an element.
///
/// The runtime only emits the corresponding [`GraphEvent`](crate::GraphEvent)
/// for elements that have been watched. Bus messages need no registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Watch {
    /// `NewEndpoint` and `NoMoreEndpoints` from a decoder.
    Endpoints,
    /// `ElementAdded` from a self-configuring front-end.
    ElementAdded,
    /// `ContainerType` from a type-finding element.
    ContainerType,
    /// `UnrecognizedStream` from a decoding element.
    UnknownType,
    /// `CapsNegotiated` on a sink's input.
    NegotiatedCaps,
    /// `Overrun` from a buffering stage.
    Overrun,
}

/// A media graph owned by exactly one discovery session.
///
/// None of these calls may block on media processing; results of the work
/// they start arrive later as events.
pub trait MediaGraph: Send {
    /// Create an element inside the graph.
    fn add(&mut self, spec: ElementSpec) -> Result<ElementId>;

    /// Link the output of `upstream` to the input of `downstream`.
    fn link(&mut self, upstream: ElementId, downstream: ElementId) -> Result<()>;

    /// Link a decoded endpoint to the input of `downstream`.
    fn link_endpoint(&mut self, endpoint: EndpointId, downstream: ElementId) -> Result<()>;

    /// Look up a named child of a composite element.
    fn child_by_name(&self, element: ElementId, name: &str) -> Option<ElementId>;

    /// Register for a notification on an element.
    fn watch(&mut self, element: ElementId, watch: Watch) -> Result<()>;

    /// Replace the limits of a buffering stage.
    fn configure_buffering(&mut self, element: ElementId, config: BufferingConfig) -> Result<()>;

    /// Change the state of a single element.
    fn set_element_state(&mut self, element: ElementId, state: GraphState) -> Result<()>;

    /// Change the state of the whole graph.
    fn set_state(&mut self, state: GraphState) -> Result<()>;

    /// Ask the element upstream of `sink` for the total stream duration, in
    /// nanoseconds. `None` if the query cannot be answered.
    fn query_upstream_duration(&self, sink: ElementId) -> Option<i64>;
}

/// Factory for media graphs.
///
/// Implementations must be safe to share across threads (`Send + Sync`).
pub trait GraphRuntime: Send + Sync {
    /// Human-readable name identifying this runtime.
    fn name(&self) -> &'static str;

    /// Create an empty graph that reports to `events`.
    fn create_graph(&self, events: EventSender) -> Result<Box<dyn MediaGraph>>;
}
