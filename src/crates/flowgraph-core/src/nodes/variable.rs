//! Variable read nodes.

use flowgraph_bindings::ValueType;

use crate::context::ExecutionContext;
use crate::error::{FlowError, Result};
use crate::graph::{NodeRef, VariableId};
use crate::node::props;

/// Place the bound graph variable's backing cell — not a copy. The cell's
/// lifetime is the graph's, so the stack takes no ownership, and writes
/// through the variable stay visible to every reader.
pub(crate) fn place_output(
    node: &NodeRef,
    ctx: &mut ExecutionContext,
    ty: ValueType,
) -> Result<()> {
    let (graph, variable_id, name) = {
        let n = node.borrow();
        let graph = n.owner().expect("node is not attached to a live graph");
        (graph, VariableId::from_uuid(n.guid_property(props::VARIABLE)), n.name())
    };
    let cell = {
        let g = graph.borrow();
        g.variable(variable_id)
            .ok_or(FlowError::MissingVariable(name))?
            .cell()
            .clone()
    };
    ctx.stack.place(ty, &cell);
    Ok(())
}
