//! Link bookkeeping shared by runtime implementations.

use std::collections::{HashMap, HashSet};

use crate::graph::GraphState;
use crate::ids::{ElementId, EndpointId};

/// Which endpoint feeds which element, and which elements are running.
#[derive(Debug, Default)]
pub struct Topology {
    endpoint_links: HashMap<EndpointId, ElementId>,
    links: HashMap<ElementId, ElementId>,
    upstream: HashMap<ElementId, ElementId>,
    playing: HashSet<ElementId>,
}

impl Topology {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a link. Returns `false` if `upstream` was already linked.
    pub fn link(&mut self, upstream: ElementId, downstream: ElementId) -> bool {
        if self.links.contains_key(&upstream) {
            return false;
        }
        self.links.insert(upstream, downstream);
        self.upstream.insert(downstream, upstream);
        true
    }

    /// Record an endpoint link. Returns `false` if the endpoint was already
    /// linked.
    pub fn link_endpoint(&mut self, endpoint: EndpointId, downstream: ElementId) -> bool {
        if self.endpoint_links.contains_key(&endpoint) {
            return false;
        }
        self.endpoint_links.insert(endpoint, downstream);
        true
    }

    pub fn set_state(&mut self, element: ElementId, state: GraphState) {
        if state == GraphState::Playing {
            self.playing.insert(element);
        } else {
            self.playing.remove(&element);
        }
    }

    pub fn is_playing(&self, element: ElementId) -> bool {
        self.playing.contains(&element)
    }

    /// Element directly downstream of an endpoint.
    pub fn endpoint_target(&self, endpoint: EndpointId) -> Option<ElementId> {
        self.endpoint_links.get(&endpoint).copied()
    }

    /// Walk upstream from `element` to the endpoint feeding the chain.
    pub fn endpoint_feeding(&self, element: ElementId) -> Option<EndpointId> {
        let mut current = element;
        // Bounded by the number of links, so a malformed cycle cannot spin.
        for _ in 0..=self.upstream.len() {
            if let Some((endpoint, _)) = self.endpoint_links.iter().find(|(_, el)| **el == current) {
                return Some(*endpoint);
            }
            current = *self.upstream.get(&current)?;
        }
        None
    }

    /// Every element downstream of an endpoint, nearest first.
    pub fn chain_from(&self, endpoint: EndpointId) -> Vec<ElementId> {
        let mut chain = Vec::new();
        let mut next = self.endpoint_target(endpoint);
        while let Some(element) = next {
            if chain.contains(&element) {
                break;
            }
            chain.push(element);
            next = self.links.get(&element).copied();
        }
        chain
    }

    /// Whether the whole chain behind `endpoint` is running.
    pub fn chain_playing(&self, endpoint: EndpointId) -> bool {
        let chain = self.chain_from(endpoint);
        !chain.is_empty() && chain.iter().all(|el| self.is_playing(*el))
    }
}
