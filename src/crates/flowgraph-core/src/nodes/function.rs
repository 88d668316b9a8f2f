//! Host function nodes: flow calls and per-pull data evaluation.

use flowgraph_bindings::{HostObject, MethodBinding, ValueType};

use crate::context::ExecutionContext;
use crate::engine;
use crate::error::{FlowError, Result};
use crate::graph::NodeRef;
use crate::node::NodeKind;
use crate::runtime::Runtime;

/// State of a function node: the consumed binding plus its target instance
/// (absent for static bindings).
pub struct FunctionNode {
    pub binding: MethodBinding,
    pub target: Option<HostObject>,
}

pub(crate) fn execute(node: &NodeRef, _rt: &Runtime, ctx: &mut ExecutionContext) -> Result<usize> {
    let (invoke, target, is_static, name) = {
        let n = node.borrow();
        let NodeKind::Function(f) = n.kind() else { unreachable!() };
        (
            f.binding.invoke.clone(),
            f.target.clone(),
            f.binding.signature.is_static,
            n.name(),
        )
    };
    if !is_static && target.is_none() {
        return Err(FlowError::MissingTarget(name));
    }
    // The binding pops declared inputs and leaves declared outputs on top.
    invoke(target.as_ref(), &mut ctx.stack);
    Ok(0)
}

pub(crate) fn place_output(
    node: &NodeRef,
    rt: &Runtime,
    ctx: &mut ExecutionContext,
    ty: ValueType,
    output: usize,
) -> Result<()> {
    if node.borrow().has_flow_input() {
        // Flow mode: the outputs were produced by the original invocation
        // of this node earlier in the chain and live at its frame bottom.
        // Duplicate the requested one on top without taking ownership.
        let bottom = ctx
            .last_frame_of(node)
            .ok_or_else(|| FlowError::OutputsNotLive(node.borrow().name()))?
            .stack_bottom();
        let handle = ctx.stack.peek(bottom + output);
        ctx.stack.place(ty, &handle);
    } else {
        // Data mode: re-execute on every pull, then discard every output
        // except the requested one. Walk from the stack top down so the
        // survivor ends up on top.
        if let Err(error) = engine::execute_node(node, rt, ctx) {
            ctx.pop(true);
            return Err(error);
        }
        let count = node.borrow().stack_outputs().len();
        for i in 0..count {
            let reverse = count - 1 - i;
            if reverse != output {
                let offset = if reverse > output { 0 } else { 1 };
                ctx.stack.remove(offset);
            }
        }
        ctx.pop(false);
    }
    Ok(())
}
