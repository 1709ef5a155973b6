//! Locating ffprobe.

use ms_core::config::ToolsConfig;
use ms_core::{Error, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};

pub const FFPROBE: &str = "ffprobe";

/// Availability of a tool, as reported by `check-tools`.
#[derive(Debug, Clone, Serialize)]
pub struct ToolInfo {
    pub name: String,
    pub available: bool,
    /// First line of the tool's version banner.
    pub version: Option<String>,
    pub path: Option<PathBuf>,
}

/// Resolve the ffprobe executable.
///
/// A configured path wins when it exists; otherwise `PATH` is searched.
pub fn locate_ffprobe(config: &ToolsConfig) -> Result<PathBuf> {
    if let Some(path) = config.ffprobe_path.as_deref() {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
        tracing::warn!(path = %path.display(), "configured ffprobe not found, searching PATH");
    }
    which::which(FFPROBE)
        .map_err(|_| Error::tool(FFPROBE, "ffprobe not found; is it installed and in PATH?"))
}

/// Report whether ffprobe is usable.
pub fn check_tools(config: &ToolsConfig) -> Vec<ToolInfo> {
    let info = match locate_ffprobe(config) {
        Ok(path) => ToolInfo {
            name: FFPROBE.into(),
            available: true,
            version: detect_version(&path),
            path: Some(path),
        },
        Err(_) => ToolInfo {
            name: FFPROBE.into(),
            available: false,
            version: None,
            path: None,
        },
    };
    vec![info]
}

fn detect_version(path: &Path) -> Option<String> {
    let output = std::process::Command::new(path).arg("-version").output().ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .map(str::to_string)
}
