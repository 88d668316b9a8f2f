//! Custom getters: a producer exposing one pull-evaluated value, and the
//! handler that reads it from another graph on demand.

use crate::context::ExecutionContext;
use crate::engine;
use crate::error::{FlowError, Result};
use crate::graph::{GraphId, NodeId, NodeRef};
use crate::node::props;
use crate::runtime::Runtime;

/// Pull the producer's data-evaluation path: execute it (which pulls its
/// single input), keep the one value it placed, and pop its frame without
/// cleanup so the value survives as our output.
pub(crate) fn place_handler_output(
    node: &NodeRef,
    rt: &Runtime,
    ctx: &mut ExecutionContext,
) -> Result<()> {
    let (target_graph, variant, name) = {
        let n = node.borrow();
        (
            GraphId::from_uuid(n.guid_property(props::TARGET_GRAPH)),
            NodeId::from_uuid(n.guid_property(props::VARIANT)),
            n.name(),
        )
    };
    let producer = rt
        .try_resolve_node(target_graph, variant)
        .ok_or_else(|| FlowError::variant(format!("target getter of '{name}' is not found")))?;

    let depth_before = ctx.stack.len();
    if let Err(error) = engine::execute_node(&producer, rt, ctx) {
        ctx.pop(true);
        return Err(error);
    }
    debug_assert_eq!(
        ctx.stack.len(),
        depth_before + 1,
        "a custom getter places exactly one value"
    );
    ctx.pop(false);
    Ok(())
}
