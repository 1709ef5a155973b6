//! # ms-discover
//!
//! Works out whether a media resource holds usable audio or video, and
//! collects per-stream metadata along the way, without decoding it in full.
//!
//! A session builds a graph for its [`ResourceLocator`], attaches a
//! buffering stage and a discard sink to every decoded endpoint, records the
//! first negotiated caps of each kind, and finishes on end of stream, error,
//! timeout, or as soon as every recognized kind has been recorded.
//!
//! ```no_run
//! use ms_core::config::DiscoveryConfig;
//! use ms_discover::{Discoverer, ResourceLocator};
//! use ms_graph::ScriptedRuntime;
//!
//! # async fn example() -> ms_core::Result<()> {
//! let locator = ResourceLocator::parse("movie.mkv")?;
//! let discoverer = Discoverer::new(locator, DiscoveryConfig::default());
//! let discovered = discoverer.discover(&ScriptedRuntime::new()).discovered().await;
//! println!("success: {}", discovered.success);
//! # Ok(())
//! # }
//! ```

mod aggregator;
mod builder;
pub mod decider;
pub mod locator;
pub mod result;
pub mod session;
mod tracker;

pub use decider::{CompletionDecider, Phase, Trigger};
pub use locator::{CaptureScheme, ResourceLocator};
pub use result::{AudioFormat, DiscoveryResult, SampleFormat, StreamDetails, StreamRecord, VideoFormat};
pub use session::{discover, Discovered, Discoverer, SessionHandle};
