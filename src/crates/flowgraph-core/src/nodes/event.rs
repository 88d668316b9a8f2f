//! Host event entry nodes and the listener registry behind them.
//!
//! An event node owns nothing at runtime except its listener registration.
//! The host dispatcher pushes the event's argument values, the runtime
//! traverses every registered listener for the `(source, event_id)` pair,
//! and the dispatcher pops the arguments again — so an event node's
//! "outputs" are reads *below* its frame bottom.
//!
//! # One delegate per live pair
//!
//! Several event nodes (across any number of graphs) may listen to the same
//! host event on the same source. The registry keeps exactly one host-side
//! [`EventDelegate`] per live `(source, event_id)` pair and drops it when
//! the last listener record for the pair disappears — reference counting by
//! presence in the record list, not by a counter. Removing one listener
//! therefore never disturbs the others.

use std::cell::RefCell;
use std::rc::Rc;

use flowgraph_bindings::{EventBinding, EventDelegate, HostObject};

use crate::context::ExecutionContext;
use crate::error::Result;
use crate::graph::{GraphId, NodeId, NodeRef};
use crate::node::NodeKind;
use crate::nodes::{verify_entry_args, ArgLayout};
use crate::runtime::Runtime;

/// State of an event node: the consumed event binding and the host object
/// whose event it listens to.
pub struct EventNode {
    pub binding: EventBinding,
    pub target: HostObject,
}

/// One registered listener: which node in which graph handles which host
/// event on which source.
#[derive(Clone)]
pub struct ListenerRecord {
    pub source: HostObject,
    pub event_id: u64,
    pub graph: GraphId,
    pub target: NodeId,
}

struct DelegateEntry {
    source: HostObject,
    event_id: u64,
    delegate: EventDelegate,
}

/// The runtime's host-event listener list.
#[derive(Default)]
pub(crate) struct EventListeners {
    records: RefCell<Vec<ListenerRecord>>,
    delegates: RefCell<Vec<DelegateEntry>>,
}

impl EventListeners {
    /// Snapshot of the records matching `(source, event_id)`, in
    /// registration order. Snapshotting first keeps dispatch stable even if
    /// a handler mutates the list mid-iteration.
    pub(crate) fn matching(&self, source: &HostObject, event_id: u64) -> Vec<ListenerRecord> {
        self.records
            .borrow()
            .iter()
            .filter(|r| r.event_id == event_id && r.source.same(source))
            .cloned()
            .collect()
    }

    pub(crate) fn record_count(&self) -> usize {
        self.records.borrow().len()
    }

    fn contains(&self, graph: GraphId, target: NodeId) -> bool {
        self.records
            .borrow()
            .iter()
            .any(|r| r.graph == graph && r.target == target)
    }

    fn add(&self, record: ListenerRecord) {
        self.records.borrow_mut().push(record);
    }

    fn remove(&self, graph: GraphId, target: NodeId) {
        self.records
            .borrow_mut()
            .retain(|r| !(r.graph == graph && r.target == target));
    }

    fn pair_live(&self, source: &HostObject, event_id: u64) -> bool {
        self.records
            .borrow()
            .iter()
            .any(|r| r.event_id == event_id && r.source.same(source))
    }

    fn has_delegate(&self, source: &HostObject, event_id: u64) -> bool {
        self.delegates
            .borrow()
            .iter()
            .any(|d| d.event_id == event_id && d.source.same(source))
    }

    fn store_delegate(&self, source: HostObject, event_id: u64, delegate: EventDelegate) {
        self.delegates.borrow_mut().push(DelegateEntry { source, event_id, delegate });
    }

    fn take_delegate(&self, source: &HostObject, event_id: u64) -> Option<EventDelegate> {
        let mut delegates = self.delegates.borrow_mut();
        let index = delegates
            .iter()
            .position(|d| d.event_id == event_id && d.source.same(source))?;
        Some(delegates.remove(index).delegate)
    }
}

/// The event's arguments were already pushed by the dispatcher; just check
/// they are there with the declared types.
pub(crate) fn execute(node: &NodeRef, ctx: &mut ExecutionContext) -> Result<usize> {
    verify_entry_args(node, ctx, ArgLayout::DeclaredOrder)
}

/// Register this node's listener record; bind the host delegate if this is
/// the first listener for the `(source, event_id)` pair.
pub(crate) fn enable(node: &NodeRef, rt: &Runtime) {
    let (binding, target, graph_id, node_id) = {
        let n = node.borrow();
        let NodeKind::Event(e) = n.kind() else { return };
        (e.binding.clone(), e.target.clone(), n.graph_id(), n.id())
    };

    let listeners = rt.event_listeners();
    if listeners.contains(graph_id, node_id) {
        return; // already enabled
    }
    listeners.add(ListenerRecord {
        source: target.clone(),
        event_id: binding.event_id,
        graph: graph_id,
        target: node_id,
    });
    tracing::debug!(event = binding.event_id, node = %node_id, "event listener registered");

    if !listeners.has_delegate(&target, binding.event_id) {
        let weak = rt.weak_self();
        let source = target.clone();
        let event_id = binding.event_id;
        let delegate: EventDelegate = Rc::new(move |args| {
            if let Some(rt) = weak.upgrade() {
                if let Err(error) = rt.dispatch_event(&source, event_id, args) {
                    tracing::warn!(%error, "host event dispatch failed");
                }
            }
        });
        (binding.add_listener)(&target, &delegate);
        listeners.store_delegate(target, binding.event_id, delegate);
    }
}

/// Remove this node's listener record; unbind the host delegate only when
/// no other record still uses the `(source, event_id)` pair.
pub(crate) fn disable(node: &NodeRef, rt: &Runtime) {
    let (binding, target, graph_id, node_id) = {
        let n = node.borrow();
        let NodeKind::Event(e) = n.kind() else { return };
        (e.binding.clone(), e.target.clone(), n.graph_id(), n.id())
    };

    let listeners = rt.event_listeners();
    listeners.remove(graph_id, node_id);
    if !listeners.pair_live(&target, binding.event_id) {
        if let Some(delegate) = listeners.take_delegate(&target, binding.event_id) {
            (binding.remove_listener)(&target, &delegate);
        }
    }
}
