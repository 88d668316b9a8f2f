//! Depth-first traversal over flow edges with pull-based data evaluation.
//!
//! ```text
//!  traverse(start)
//!    ├─ push frame (records stack depth)
//!    ├─ pull stack inputs          ── may recursively execute data nodes
//!    ├─ execute                    ── returns count of pushed flow indices
//!    ├─ pop & follow each index    ── recursion, same context
//!    │    (or default-follow the single flow output)
//!    └─ pop frame (restores stack depth)
//! ```
//!
//! The load-bearing invariant: every call to [`traverse_node`] pops the
//! frame it pushed and restores the value stack to its entry depth — on
//! success *and* on error. Errors propagate to the caller; nothing in the
//! engine swallows them. The one catch-and-discard boundary in the system
//! is the deferred-continuation replay, which lives with the delay node,
//! not here.
//!
//! Input pulls run in reverse declaration order so the *first* declared
//! input ends up on top of the stack, where a binding's in-order pops
//! expect it.

use flowgraph_bindings::ValueType;

use crate::context::ExecutionContext;
use crate::error::Result;
use crate::graph::NodeRef;
use crate::nodes;
use crate::runtime::Runtime;

/// Execute `node` and walk its chosen flow edges to exhaustion.
///
/// On return the context has the same frame count and stack depth it had on
/// entry, whether or not an error is propagating.
pub(crate) fn traverse_node(
    node: &NodeRef,
    rt: &Runtime,
    ctx: &mut ExecutionContext,
) -> Result<()> {
    let flows = execute_node(node, rt, ctx);
    let walked = flows.and_then(|count| follow_flows(node, count, rt, ctx));
    ctx.pop(true);
    walked
}

/// Push a frame for `node`, pull its stack inputs, and run its execute.
///
/// Exactly one frame is pushed no matter how this returns; the caller owns
/// the matching pop. Data-pull callers pop without cleanup to keep a placed
/// value; traversal pops with cleanup to restore the entry depth.
pub(crate) fn execute_node(
    node: &NodeRef,
    rt: &Runtime,
    ctx: &mut ExecutionContext,
) -> Result<usize> {
    ctx.push(node)?;
    process_stack_inputs(node, rt, ctx)?;
    nodes::dispatch_execute(node, rt, ctx)
}

fn follow_flows(
    node: &NodeRef,
    count: usize,
    rt: &Runtime,
    ctx: &mut ExecutionContext,
) -> Result<()> {
    let graph = ctx.peek_frame().graph().clone();

    for _ in 0..count {
        let index = ctx.stack.pop_int() as usize;
        let target = node.borrow().flow_outputs()[index].target;
        if let Some(target) = target {
            let next = graph.borrow().node(target)?;
            traverse_node(&next, rt, ctx)?;
        }
    }

    // A node that selected nothing but has a single default flow output
    // continues through it. Flow-control nodes choose explicitly and are
    // exempt: returning no indices means the branch ends here.
    if count == 0 {
        let default_target = {
            let n = node.borrow();
            if !n.is_flow_control() && n.flow_outputs().len() == 1 {
                n.flow_outputs()[0].target
            } else {
                None
            }
        };
        if let Some(target) = default_target {
            let next = graph.borrow().node(target)?;
            traverse_node(&next, rt, ctx)?;
        }
    }

    Ok(())
}

/// Resolve every stack input of the node whose frame is on top.
///
/// Literals are placed (the literal's own cell, no copy). References pull:
/// the referenced node places exactly one value on top, recursively
/// evaluating its own inputs first if it is a data node.
fn process_stack_inputs(node: &NodeRef, rt: &Runtime, ctx: &mut ExecutionContext) -> Result<()> {
    let count = node.borrow().stack_inputs().len();
    for i in (0..count).rev() {
        let (ty, reference, literal) = {
            let n = node.borrow();
            let input = &n.stack_inputs()[i];
            (input.ty, input.reference, input.literal().clone())
        };
        match reference {
            None => ctx.stack.place(ty, &literal),
            Some((target, output)) => {
                let graph = ctx.peek_frame().graph().clone();
                let dep = graph.borrow().node(target)?;
                place_output(&dep, rt, ctx, ty, output)?;
            }
        }
    }
    Ok(())
}

/// Ask `node` to place exactly one value — its `output`-th stack output —
/// on top of the stack.
pub(crate) fn place_output(
    node: &NodeRef,
    rt: &Runtime,
    ctx: &mut ExecutionContext,
    ty: ValueType,
    output: usize,
) -> Result<()> {
    nodes::dispatch_place_output(node, rt, ctx, ty, output)
}
