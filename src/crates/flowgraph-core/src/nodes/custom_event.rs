//! Custom events: a producer declaring a named entry point with a custom
//! output shape, and the cross-graph call node that drives flow into it.
//!
//! The caller forwards its own stack inputs as the producer's declared
//! outputs: the engine's reverse-order pull leaves input 0 on top of the
//! caller's frame, which is exactly where the producer's output-0 read
//! expects it.

use crate::context::ExecutionContext;
use crate::engine;
use crate::error::Result;
use crate::graph::{GraphId, NodeId, NodeRef};
use crate::node::props;
use crate::nodes::{verify_entry_args, ArgLayout};
use crate::runtime::Runtime;

/// Producer side: assert the caller left our declared outputs on the stack.
pub(crate) fn execute_producer(node: &NodeRef, ctx: &mut ExecutionContext) -> Result<usize> {
    verify_entry_args(node, ctx, ArgLayout::ReversePulled)
}

/// Caller side: resolve the bound producer through the graph directory and
/// traverse into its flow chain within the same context. An unresolved
/// binding is skipped at runtime; validation reports it.
pub(crate) fn execute_call(
    node: &NodeRef,
    rt: &Runtime,
    ctx: &mut ExecutionContext,
) -> Result<usize> {
    let (target_graph, variant) = {
        let n = node.borrow();
        (
            GraphId::from_uuid(n.guid_property(props::TARGET_GRAPH)),
            NodeId::from_uuid(n.guid_property(props::VARIANT)),
        )
    };
    match rt.try_resolve_node(target_graph, variant) {
        Some(producer) => engine::traverse_node(&producer, rt, ctx)?,
        None => tracing::debug!(%variant, "call-custom-event target is unresolved; skipping"),
    }
    Ok(0)
}
