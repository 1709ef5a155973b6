//! Typed identifiers for graph elements and decoded stream endpoints.
//!
//! Identifiers are allocated by the runtime that owns the graph and are only
//! meaningful within that graph.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Generate a newtype ID wrapper over `u32`.
macro_rules! typed_id {
    ($($(#[doc = $doc:expr])* $name:ident => $prefix:literal),+ $(,)?) => {
        $(
            $(#[doc = $doc])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
            #[serde(transparent)]
            pub struct $name(pub u32);

            impl $name {
                /// Return the raw numeric value.
                #[must_use]
                pub fn get(self) -> u32 {
                    self.0
                }
            }

            impl fmt::Display for $name {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    write!(f, concat!($prefix, "{}"), self.0)
                }
            }

            impl From<u32> for $name {
                fn from(raw: u32) -> Self {
                    Self(raw)
                }
            }
        )+
    };
}

typed_id! {
    /// Identifier of an element inside a media graph.
    ElementId => "element",
    /// Identifier of a decoded stream endpoint exposed by a decoder.
    EndpointId => "endpoint",
}
