//! Capability descriptors.
//!
//! A [`Caps`] is a media type plus an ordered list of typed fields, written
//! in the familiar textual form:
//!
//! ```text
//! video/x-raw-yuv, width=(int)1920, height=(int)1080, framerate=(fraction)30000/1001
//! ```
//!
//! Caps are *fixed* once every field holds a single value. Values given as
//! ranges (`[ 1, 2 ]`) or lists (`{ a, b }`) are kept verbatim and make the
//! caps unfixed.

use ms_core::{Error, Fraction, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A single caps field value.
#[derive(Debug, Clone, PartialEq)]
pub enum CapsValue {
    Int(i32),
    Bool(bool),
    Fraction(Fraction),
    Str(String),
    /// A range or list, stored as written.
    Unfixed(String),
}

impl fmt::Display for CapsValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "(int){v}"),
            Self::Bool(v) => write!(f, "(boolean){v}"),
            Self::Fraction(v) => write!(f, "(fraction){v}"),
            Self::Str(v) => write!(f, "(string){v}"),
            Self::Unfixed(v) => write!(f, "{v}"),
        }
    }
}

/// A media type with typed fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Caps {
    media_type: String,
    fields: Vec<(String, CapsValue)>,
    fixed: bool,
}

impl Caps {
    /// Create fixed caps with no fields.
    pub fn new(media_type: impl Into<String>) -> Self {
        Self {
            media_type: media_type.into(),
            fields: Vec::new(),
            fixed: true,
        }
    }

    /// Mark these caps as not yet negotiated.
    #[must_use]
    pub fn unfixed(mut self) -> Self {
        self.fixed = false;
        self
    }

    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: CapsValue) -> Self {
        self.set(name, value);
        self
    }

    #[must_use]
    pub fn with_int(self, name: impl Into<String>, value: i32) -> Self {
        self.with_field(name, CapsValue::Int(value))
    }

    #[must_use]
    pub fn with_bool(self, name: impl Into<String>, value: bool) -> Self {
        self.with_field(name, CapsValue::Bool(value))
    }

    #[must_use]
    pub fn with_fraction(self, name: impl Into<String>, num: i32, den: i32) -> Self {
        self.with_field(name, CapsValue::Fraction(Fraction::new(num, den)))
    }

    #[must_use]
    pub fn with_str(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.with_field(name, CapsValue::Str(value.into()))
    }

    /// Insert or replace a field, keeping the original position on replace.
    pub fn set(&mut self, name: impl Into<String>, value: CapsValue) {
        let name = name.into();
        if matches!(value, CapsValue::Unfixed(_)) {
            self.fixed = false;
        }
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((name, value)),
        }
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn is_fixed(&self) -> bool {
        self.fixed
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &CapsValue)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn get(&self, name: &str) -> Option<&CapsValue> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn int(&self, name: &str) -> Option<i32> {
        match self.get(name)? {
            CapsValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn bool(&self, name: &str) -> Option<bool> {
        match self.get(name)? {
            CapsValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn fraction(&self, name: &str) -> Option<Fraction> {
        match self.get(name)? {
            CapsValue::Fraction(v) => Some(*v),
            CapsValue::Int(v) => Some(Fraction::new(*v, 1)),
            _ => None,
        }
    }

    pub fn str(&self, name: &str) -> Option<&str> {
        match self.get(name)? {
            CapsValue::Str(v) => Some(v),
            _ => None,
        }
    }

    /// Parse the textual caps form.
    pub fn parse(s: &str) -> Result<Self> {
        let mut parts = split_top_level(s).into_iter();
        let media_type = parts
            .next()
            .map(str::trim)
            .filter(|mt| !mt.is_empty() && !mt.contains('='))
            .ok_or_else(|| Error::Validation(format!("caps without media type: {s:?}")))?;

        let mut caps = Caps::new(media_type);
        for part in parts {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let (name, raw) = part
                .split_once('=')
                .ok_or_else(|| Error::Validation(format!("malformed caps field: {part:?}")))?;
            caps.set(name.trim(), parse_value(raw.trim())?);
        }
        Ok(caps)
    }
}

/// Split on commas that are not nested in `[]` or `{}`.
fn split_top_level(s: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in s.char_indices() {
        match c {
            '[' | '{' => depth += 1,
            ']' | '}' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&s[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&s[start..]);
    parts
}

fn parse_value(raw: &str) -> Result<CapsValue> {
    let invalid = || Error::Validation(format!("invalid caps value: {raw:?}"));

    let (type_hint, value) = match raw.strip_prefix('(') {
        Some(rest) => {
            let (hint, value) = rest.split_once(')').ok_or_else(invalid)?;
            (Some(hint.trim()), value.trim())
        }
        None => (None, raw),
    };

    if value.starts_with('[') || value.starts_with('{') {
        let rendered = match type_hint {
            Some(hint) => format!("({hint}){value}"),
            None => value.to_string(),
        };
        return Ok(CapsValue::Unfixed(rendered));
    }

    match type_hint {
        Some("int") => value.parse().map(CapsValue::Int).map_err(|_| invalid()),
        Some("boolean") | Some("bool") => parse_bool(value).map(CapsValue::Bool).ok_or_else(invalid),
        Some("fraction") => Fraction::from_str(value).map(CapsValue::Fraction),
        Some(_) => Ok(CapsValue::Str(unquote(value))),
        None => Ok(infer_value(value)),
    }
}

fn infer_value(value: &str) -> CapsValue {
    if let Ok(v) = value.parse::<i32>() {
        return CapsValue::Int(v);
    }
    if let Some(v) = parse_bool(value) {
        return CapsValue::Bool(v);
    }
    if value.contains('/') {
        if let Ok(v) = Fraction::from_str(value) {
            return CapsValue::Fraction(v);
        }
    }
    CapsValue::Str(unquote(value))
}

fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

fn unquote(value: &str) -> String {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
        .to_string()
}

impl fmt::Display for Caps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.media_type)?;
        for (name, value) in &self.fields {
            write!(f, ", {name}={value}")?;
        }
        Ok(())
    }
}

impl FromStr for Caps {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for Caps {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Caps {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Caps::parse(&s).map_err(serde::de::Error::custom)
    }
}
