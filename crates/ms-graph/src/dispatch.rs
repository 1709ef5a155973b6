//! Watch-aware event delivery shared by runtime implementations.
//!
//! A runtime may notice something (say, the container type) before the core
//! has registered interest in the element that noticed it. [`Dispatcher`]
//! parks such events and releases them, in order, the moment the matching
//! [`Watch`] is registered. Bus messages bypass registration.

use std::collections::HashSet;

use crate::event::{BusMessage, EventSender, GraphEvent};
use crate::graph::Watch;
use crate::ids::ElementId;

/// Routes runtime observations into a session's event channel.
#[derive(Debug)]
pub struct Dispatcher {
    tx: EventSender,
    watches: HashSet<(ElementId, Watch)>,
    parked: Vec<(ElementId, Watch, GraphEvent)>,
}

impl Dispatcher {
    pub fn new(tx: EventSender) -> Self {
        Self {
            tx,
            watches: HashSet::new(),
            parked: Vec::new(),
        }
    }

    /// Register interest and flush any events parked for it.
    pub fn watch(&mut self, element: ElementId, watch: Watch) {
        if !self.watches.insert((element, watch)) {
            return;
        }
        let parked = std::mem::take(&mut self.parked);
        for (el, w, event) in parked {
            if el == element && w == watch {
                self.send(event);
            } else {
                self.parked.push((el, w, event));
            }
        }
    }

    pub fn is_watched(&self, element: ElementId, watch: Watch) -> bool {
        self.watches.contains(&(element, watch))
    }

    /// Deliver `event` now if `element` is watched, otherwise park it.
    pub fn emit(&mut self, element: ElementId, watch: Watch, event: GraphEvent) {
        if self.is_watched(element, watch) {
            self.send(event);
        } else {
            tracing::trace!(%element, event = event.name(), "parking unwatched event");
            self.parked.push((element, watch, event));
        }
    }

    /// Post a bus message.
    pub fn post(&mut self, message: BusMessage) {
        self.send(GraphEvent::Bus(message));
    }

    /// Whether the session stopped listening.
    pub fn is_detached(&self) -> bool {
        self.tx.is_closed()
    }

    fn send(&self, event: GraphEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("event receiver detached, dropping event");
        }
    }
}
