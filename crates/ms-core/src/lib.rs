//! ms-core: shared errors, configuration, and media-domain types.
//!
//! This crate is the foundational dependency for the other ms-* crates. It
//! carries the unified error type, the TOML configuration model, and the
//! small set of media enums the discovery core reasons about.

pub mod config;
pub mod error;
pub mod media;

// Re-export the most commonly used items at the crate root.
pub use error::{Error, Result};
pub use media::*;
