//! Resource locators: what the caller wants discovered.

use ms_core::{Error, Result};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Live capture device scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureScheme {
    V4l,
    V4l2,
}

impl CaptureScheme {
    fn prefix(self) -> &'static str {
        match self {
            Self::V4l => "v4l://",
            Self::V4l2 => "v4l2://",
        }
    }
}

/// The input of a discovery session.
///
/// Parsed once from a string and never changed while a session runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResourceLocator {
    /// A local path, absolute or relative to the working directory.
    File { path: PathBuf },
    /// An optical disc, optionally narrowed to one title.
    DiscTitle { device: String, title: Option<u32> },
    /// A live capture device.
    CaptureDevice { scheme: CaptureScheme, device: String },
    /// Any other URI, used as given.
    Uri { uri: String },
}

impl ResourceLocator {
    /// Interpret a locator string.
    ///
    /// - `dvd://DEVICE@TITLE` and `dvd://DEVICE`
    /// - `v4l://DEVICE` and `v4l2://DEVICE`
    /// - any other `scheme://...`, passed through untouched
    /// - anything else is a local path
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::InvalidLocator("empty locator".into()));
        }

        if let Some(rest) = s.strip_prefix("dvd://") {
            return match rest.split_once('@') {
                Some((device, title)) => {
                    let title = title
                        .parse::<u32>()
                        .map_err(|_| Error::InvalidLocator(format!("bad disc title in {s:?}")))?;
                    Ok(Self::DiscTitle {
                        device: device.to_string(),
                        title: Some(title),
                    })
                }
                None => Ok(Self::DiscTitle {
                    device: rest.to_string(),
                    title: None,
                }),
            };
        }

        for scheme in [CaptureScheme::V4l2, CaptureScheme::V4l] {
            if let Some(device) = s.strip_prefix(scheme.prefix()) {
                return Ok(Self::CaptureDevice {
                    scheme,
                    device: device.to_string(),
                });
            }
        }

        if s.contains("://") {
            return Ok(Self::Uri { uri: s.to_string() });
        }

        Ok(Self::File { path: PathBuf::from(s) })
    }

    /// Fully-qualified URI for the generic decode front-end.
    ///
    /// Local paths are made absolute and given a `file://` prefix.
    pub fn to_uri(&self) -> Result<String> {
        match self {
            Self::File { path } => {
                let absolute = std::path::absolute(path)?;
                Ok(format!("file://{}", absolute.display()))
            }
            other => Ok(other.to_string()),
        }
    }

    /// The disc device and title when a specific title was requested.
    pub fn disc_title(&self) -> Option<(&str, u32)> {
        match self {
            Self::DiscTitle {
                device,
                title: Some(title),
            } => Some((device, *title)),
            _ => None,
        }
    }
}

impl fmt::Display for ResourceLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File { path } => write!(f, "{}", path.display()),
            Self::DiscTitle { device, title: None } => write!(f, "dvd://{device}"),
            Self::DiscTitle {
                device,
                title: Some(title),
            } => write!(f, "dvd://{device}@{title}"),
            Self::CaptureDevice { scheme, device } => write!(f, "{}{device}", scheme.prefix()),
            Self::Uri { uri } => write!(f, "{uri}"),
        }
    }
}

impl FromStr for ResourceLocator {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
