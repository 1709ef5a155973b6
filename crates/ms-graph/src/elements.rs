//! Element bookkeeping shared by runtime implementations.

use std::collections::HashMap;

use crate::graph::ElementSpec;
use crate::ids::ElementId;

/// Name of the type-finding child inside a decoder.
pub const TYPEFIND: &str = "typefind";

/// Name of the internal decoding bin inside a URI decoder.
pub const DECODEBIN: &str = "decodebin";

/// Elements of one graph and the children decoders create for themselves.
///
/// A URI decoder owns an internal decoding bin, which in turn owns a
/// type finder. A plain demuxer owns its type finder directly.
#[derive(Debug, Default)]
pub struct ElementTable {
    next_id: u32,
    specs: HashMap<ElementId, ElementSpec>,
    children: HashMap<(ElementId, String), ElementId>,
    front_end: Option<ElementId>,
    internal: Option<ElementId>,
}

impl ElementTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an element and any children it creates.
    pub fn insert(&mut self, spec: ElementSpec) -> ElementId {
        let id = self.allocate();
        match spec {
            ElementSpec::UriDecoder { .. } => {
                let internal = self.allocate();
                let typefind = self.allocate();
                self.children.insert((id, DECODEBIN.into()), internal);
                self.children.insert((internal, TYPEFIND.into()), typefind);
                self.front_end = Some(id);
                self.internal = Some(internal);
            }
            ElementSpec::Demuxer => {
                let typefind = self.allocate();
                self.children.insert((id, TYPEFIND.into()), typefind);
                self.front_end = Some(id);
            }
            _ => {}
        }
        self.specs.insert(id, spec);
        id
    }

    /// Whether `element` is a known element or child.
    pub fn contains(&self, element: ElementId) -> bool {
        self.specs.contains_key(&element) || self.children.values().any(|c| *c == element)
    }

    pub fn spec(&self, element: ElementId) -> Option<&ElementSpec> {
        self.specs.get(&element)
    }

    pub fn spec_mut(&mut self, element: ElementId) -> Option<&mut ElementSpec> {
        self.specs.get_mut(&element)
    }

    pub fn child(&self, element: ElementId, name: &str) -> Option<ElementId> {
        self.children.get(&(element, name.to_string())).copied()
    }

    /// The element producing decoded endpoints.
    pub fn front_end(&self) -> Option<ElementId> {
        self.front_end
    }

    /// The internal decoding bin of a URI decoder.
    pub fn internal(&self) -> Option<ElementId> {
        self.internal
    }

    /// The type finder reporting the container type.
    pub fn typefind(&self) -> Option<ElementId> {
        self.child(self.internal.or(self.front_end)?, TYPEFIND)
    }

    /// The element that reads the input: a URI decoder or a disc source.
    pub fn input(&self) -> Option<&ElementSpec> {
        self.specs
            .values()
            .find(|spec| matches!(spec, ElementSpec::UriDecoder { .. } | ElementSpec::DiscSource { .. }))
    }

    fn allocate(&mut self) -> ElementId {
        let id = ElementId(self.next_id);
        self.next_id += 1;
        id
    }
}
