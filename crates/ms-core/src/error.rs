//! Unified error type for mediascout.
//!
//! Discovery sessions never hand an [`Error`] to their caller; every failure
//! inside a session is folded into the boolean outcome. The type is still
//! used for the synchronous edges: locator parsing, configuration loading,
//! and the graph runtime methods the core calls.

use std::fmt;

/// Unified error type covering all failure modes in mediascout.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A resource locator string could not be interpreted.
    #[error("Invalid locator: {0}")]
    InvalidLocator(String),

    /// The graph runtime cannot instantiate the requested element.
    #[error("Element unavailable: {element}")]
    ElementUnavailable {
        /// Name of the element kind that was requested.
        element: String,
    },

    /// A graph operation (link, state change, registration) failed.
    #[error("Graph error [{operation}]: {message}")]
    Graph {
        /// The graph operation that failed.
        operation: String,
        /// Human-readable error description.
        message: String,
    },

    /// An external tool (ffprobe) returned an error.
    #[error("Tool error [{tool}]: {message}")]
    Tool {
        /// Name of the tool that failed.
        tool: String,
        /// Human-readable error description.
        message: String,
    },

    /// Configuration could not be read or parsed.
    #[error("Config error: {0}")]
    Config(String),

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Input data failed validation.
    #[error("Validation error: {0}")]
    Validation(String),
}

impl Error {
    /// Convenience constructor for [`Error::ElementUnavailable`].
    pub fn element_unavailable(element: impl fmt::Display) -> Self {
        Error::ElementUnavailable {
            element: element.to_string(),
        }
    }

    /// Convenience constructor for [`Error::Graph`].
    pub fn graph(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Graph {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::Tool`].
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Whether this error means the graph could not be built or started,
    /// as opposed to a failure reported while it was running.
    pub fn is_resource_error(&self) -> bool {
        matches!(
            self,
            Error::ElementUnavailable { .. } | Error::Graph { .. } | Error::Tool { .. }
        )
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
