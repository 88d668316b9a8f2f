//! Custom outputs: a producer that fans out to every handler bound to it,
//! across graphs, once per listener, in listener-list order.

use std::cell::RefCell;

use crate::context::ExecutionContext;
use crate::engine;
use crate::error::Result;
use crate::graph::{GraphId, NodeId, NodeRef};
use crate::node::{props, NodeKind};
use crate::nodes::{verify_entry_args, ArgLayout};
use crate::runtime::Runtime;

/// One handler registration: which node in which graph is driven when the
/// producer `(source_graph, variant)` fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct OutputListener {
    pub source_graph: GraphId,
    pub variant: NodeId,
    pub graph: GraphId,
    pub target: NodeId,
}

/// The runtime's custom-output listener list. Registration order is
/// dispatch order.
#[derive(Default)]
pub(crate) struct OutputListeners {
    entries: RefCell<Vec<OutputListener>>,
}

impl OutputListeners {
    pub(crate) fn matching(&self, source_graph: GraphId, variant: NodeId) -> Vec<OutputListener> {
        self.entries
            .borrow()
            .iter()
            .filter(|l| l.source_graph == source_graph && l.variant == variant)
            .cloned()
            .collect()
    }

    fn add(&self, listener: OutputListener) {
        let mut entries = self.entries.borrow_mut();
        if !entries.contains(&listener) {
            entries.push(listener);
        }
    }

    fn remove(&self, graph: GraphId, target: NodeId) {
        self.entries
            .borrow_mut()
            .retain(|l| !(l.graph == graph && l.target == target));
    }
}

/// Producer side: inputs are on the stack above our frame; traverse every
/// registered handler, then continue through our own flow output.
pub(crate) fn execute_producer(
    node: &NodeRef,
    rt: &Runtime,
    ctx: &mut ExecutionContext,
) -> Result<usize> {
    let (graph_id, node_id) = {
        let n = node.borrow();
        (n.graph_id(), n.id())
    };
    let listeners = rt.output_listeners().matching(graph_id, node_id);
    for listener in listeners {
        match rt.try_resolve_node(listener.graph, listener.target) {
            Some(handler) => engine::traverse_node(&handler, rt, ctx)?,
            None => {
                tracing::warn!(node = %listener.target, "custom output listener target is gone")
            }
        }
    }
    Ok(0)
}

/// Handler side: assert the producer's values are sitting below our frame.
pub(crate) fn execute_handler(node: &NodeRef, ctx: &mut ExecutionContext) -> Result<usize> {
    verify_entry_args(node, ctx, ArgLayout::ReversePulled)
}

pub(crate) fn enable_handler(node: &NodeRef, rt: &Runtime) {
    let Some(listener) = listener_of(node) else { return };
    rt.output_listeners().add(listener);
}

pub(crate) fn disable_handler(node: &NodeRef, rt: &Runtime) {
    let n = node.borrow();
    if matches!(n.kind(), NodeKind::HandleCustomOutput) {
        rt.output_listeners().remove(n.graph_id(), n.id());
    }
}

fn listener_of(node: &NodeRef) -> Option<OutputListener> {
    let n = node.borrow();
    if !matches!(n.kind(), NodeKind::HandleCustomOutput) {
        return None;
    }
    Some(OutputListener {
        source_graph: GraphId::from_uuid(n.guid_property(props::TARGET_GRAPH)),
        variant: NodeId::from_uuid(n.guid_property(props::VARIANT)),
        graph: n.graph_id(),
        target: n.id(),
    })
}
