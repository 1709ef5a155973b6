//! Application configuration types.
//!
//! The top-level [`Config`] is deserialized from TOML. Every section defaults
//! sensibly so an empty file is valid.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Result;
use crate::Error;

/// Locations searched by [`Config::load_or_default`] when no path is given.
const DEFAULT_PATHS: &[&str] = &[
    "./mediascout.toml",
    "~/.config/mediascout/config.toml",
    "/etc/mediascout/config.toml",
];

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub discovery: DiscoveryConfig,
    pub tools: ToolsConfig,
}

impl Config {
    /// Deserialize a `Config` from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str).map_err(|e| Error::Config(format!("parse error: {e}")))
    }

    /// Load and check configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;
        let config = Self::from_toml(&content)?;
        config.discovery.check()?;
        Ok(config)
    }

    /// Load from `custom_path`, or the first default location that exists,
    /// or fall back to defaults.
    pub fn load_or_default(custom_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = custom_path {
            return Self::load(path);
        }

        for path_str in DEFAULT_PATHS {
            let expanded = shellexpand::tilde(path_str);
            let path = Path::new(expanded.as_ref());
            if path.exists() {
                tracing::debug!("Using config file {}", path.display());
                return Self::load(path);
            }
        }

        Ok(Self::default())
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.discovery.max_interleave_secs > 10.0 {
            warnings.push(format!(
                "discovery.max_interleave_secs is {}; large values increase memory use and latency",
                self.discovery.max_interleave_secs
            ));
        }

        if self.discovery.timeout() < self.discovery.interleave() {
            warnings.push(
                "discovery.timeout_ms is shorter than max_interleave_secs; streams may never negotiate"
                    .into(),
            );
        }

        if let Some(ref path) = self.tools.ffprobe_path {
            if !path.exists() {
                warnings.push(format!("tools.ffprobe_path {} does not exist", path.display()));
            }
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// Discovery session settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Maximum stream interleave tolerated, in seconds. Must exceed the real
    /// interleave of the input or some streams are never discovered.
    pub max_interleave_secs: f64,
    /// Wall-clock limit for a session, in milliseconds.
    pub timeout_ms: u64,
    /// When set, an unrecognized stream seen before any audio or video
    /// endpoint only fails the session once the endpoint set is closed.
    pub defer_unrecognized_failure: bool,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            max_interleave_secs: 1.0,
            timeout_ms: 3000,
            defer_unrecognized_failure: false,
        }
    }
}

impl DiscoveryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// The interleave as a duration, saturating at [`Duration::MAX`].
    pub fn interleave(&self) -> Duration {
        Duration::try_from_secs_f64(self.max_interleave_secs.max(0.0)).unwrap_or(Duration::MAX)
    }

    /// Reject values the discovery core cannot work with.
    pub fn check(&self) -> Result<()> {
        if !self.max_interleave_secs.is_finite() || self.max_interleave_secs <= 0.0 {
            return Err(Error::Validation(format!(
                "max_interleave_secs must be a positive number, got {}",
                self.max_interleave_secs
            )));
        }
        // Buffering stages hold up to twice the interleave.
        if Duration::try_from_secs_f64(2.0 * self.max_interleave_secs).is_err() {
            return Err(Error::Validation(format!(
                "max_interleave_secs is too large, got {}",
                self.max_interleave_secs
            )));
        }
        if self.timeout_ms == 0 {
            return Err(Error::Validation("timeout_ms must be greater than zero".into()));
        }
        Ok(())
    }
}

/// Paths to external CLI tools.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub ffprobe_path: Option<PathBuf>,
}
