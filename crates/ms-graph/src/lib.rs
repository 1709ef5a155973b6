//! # ms-graph
//!
//! The interface between the discovery core and a media graph runtime.
//!
//! A runtime owns the actual demuxing and decoding machinery. The core only
//! sees it through:
//!
//! - [`MediaGraph`]: element construction, linking, notification
//!   registration, state changes, and duration queries
//! - [`GraphEvent`]: every observation the runtime makes, delivered in order
//!   over a single channel
//! - [`Caps`]: capability descriptors attached to endpoints
//!
//! [`ScriptedRuntime`] is a deterministic runtime that replays a script of
//! events, used to exercise the core without a real decoder. Real runtimes
//! can build on [`ElementTable`], [`Topology`] and [`Dispatcher`] for the
//! bookkeeping every graph needs.

pub mod buffering;
pub mod caps;
pub mod dispatch;
pub mod elements;
pub mod event;
pub mod graph;
pub mod ids;
pub mod scripted;
pub mod topology;

// Re-export key types at crate root for convenience.
pub use buffering::BufferingConfig;
pub use caps::{Caps, CapsValue};
pub use dispatch::Dispatcher;
pub use elements::ElementTable;
pub use event::{event_channel, BusMessage, EventReceiver, EventSender, GraphEvent, TagList, TagValue};
pub use graph::{ElementSpec, GraphRuntime, GraphState, MediaGraph, Watch};
pub use ids::{ElementId, EndpointId};
pub use scripted::{GraphCall, GraphLog, ScriptStep, ScriptedEndpoint, ScriptedRuntime};
pub use topology::Topology;
