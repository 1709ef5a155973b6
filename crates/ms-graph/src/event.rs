//! Inbound events from a media graph runtime.
//!
//! The runtime may do its work on any number of threads, but everything it
//! observes reaches the discovery core through one ordered channel of
//! [`GraphEvent`]s. Events for one endpoint keep the order the runtime
//! produced them in; nothing is promised across endpoints.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use tokio::sync::mpsc;

use crate::caps::Caps;
use crate::ids::{ElementId, EndpointId};

/// Sending half handed to a runtime when a graph is created.
pub type EventSender = mpsc::UnboundedSender<GraphEvent>;

/// Receiving half owned by the discovery session.
pub type EventReceiver = mpsc::UnboundedReceiver<GraphEvent>;

/// Create the channel connecting a graph to its session.
pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// A metadata value carried by a tag message.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TagValue {
    Str(String),
    UInt(u64),
    Int(i64),
    Double(f64),
    Bool(bool),
}

impl fmt::Display for TagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(v) => write!(f, "{v}"),
            Self::UInt(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Double(v) => write!(f, "{v}"),
            Self::Bool(v) => write!(f, "{v}"),
        }
    }
}

impl From<&str> for TagValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for TagValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<u64> for TagValue {
    fn from(v: u64) -> Self {
        Self::UInt(v)
    }
}

/// Key/value metadata from one tag message.
pub type TagList = BTreeMap<String, TagValue>;

/// Messages posted on the graph's bus.
#[derive(Debug, Clone, PartialEq)]
pub enum BusMessage {
    /// All streams reached their end.
    Eos,
    /// Something inside the graph failed while running.
    Error { source: String, message: String },
    /// Metadata discovered in the stream.
    Tag(TagList),
}

/// Everything a running graph reports to the discovery core.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphEvent {
    /// The decode front-end created an internal element.
    /// Requires [`Watch::ElementAdded`](crate::Watch::ElementAdded) on `bin`.
    ElementAdded { bin: ElementId, element: ElementId },
    /// A decoded stream endpoint appeared, with its un-negotiated caps.
    NewEndpoint {
        element: ElementId,
        endpoint: EndpointId,
        caps: Caps,
    },
    /// The decoder will not produce any further endpoints.
    NoMoreEndpoints { element: ElementId },
    /// The caps on a sink's input changed. `None` means no caps are
    /// available yet.
    CapsNegotiated { sink: ElementId, caps: Option<Caps> },
    /// The container type of the input was identified.
    ContainerType { element: ElementId, caps: Caps },
    /// A stream was found that nothing in the graph can decode.
    UnrecognizedStream { element: ElementId, caps: Caps },
    /// A buffering stage hit one of its size limits.
    Overrun { element: ElementId },
    /// A message from the graph bus.
    Bus(BusMessage),
}

impl GraphEvent {
    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ElementAdded { .. } => "element-added",
            Self::NewEndpoint { .. } => "new-endpoint",
            Self::NoMoreEndpoints { .. } => "no-more-endpoints",
            Self::CapsNegotiated { .. } => "caps-negotiated",
            Self::ContainerType { .. } => "container-type",
            Self::UnrecognizedStream { .. } => "unrecognized-stream",
            Self::Overrun { .. } => "overrun",
            Self::Bus(BusMessage::Eos) => "eos",
            Self::Bus(BusMessage::Error { .. }) => "error",
            Self::Bus(BusMessage::Tag(_)) => "tag",
        }
    }
}
