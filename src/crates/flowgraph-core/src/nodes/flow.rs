//! Flow control: branch and sequence.

use crate::context::ExecutionContext;
use crate::error::Result;
use crate::graph::NodeRef;

/// Pop the mandatory boolean input and select flow output 0 ("true") or
/// 1 ("false"). There is no default case.
pub(crate) fn execute_branch(ctx: &mut ExecutionContext) -> Result<usize> {
    let condition = ctx.stack.pop_bool();
    ctx.stack.push_int(if condition { 0 } else { 1 });
    Ok(1)
}

/// Hand every flow output back to the engine in one call: push the indices
/// `N-1 … 0` and return `N`. The engine pops them in ascending order, so
/// targets are visited by output index regardless of authoring order.
pub(crate) fn execute_sequence(node: &NodeRef, ctx: &mut ExecutionContext) -> Result<usize> {
    let count = node.borrow().flow_outputs().len();
    for index in (0..count).rev() {
        ctx.stack.push_int(index as i64);
    }
    Ok(count)
}
