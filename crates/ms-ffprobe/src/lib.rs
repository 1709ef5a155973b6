//! # ms-ffprobe
//!
//! A media graph runtime backed by the `ffprobe` CLI.
//!
//! - [`FfprobeRuntime`]: implements [`ms_graph::GraphRuntime`] by probing the
//!   input once and replaying the report as graph events
//! - [`ToolCommand`]: async tool execution with a time limit
//! - [`locate_ffprobe`] and [`check_tools`]: finding the executable

pub mod command;
pub mod mapping;
pub mod runtime;
pub mod tools;

pub use command::{ToolCommand, ToolOutput};
pub use mapping::{parse_report, ProbeReport, ProbedStream};
pub use runtime::{input_args, FfprobeRuntime};
pub use tools::{check_tools, locate_ffprobe, ToolInfo};
