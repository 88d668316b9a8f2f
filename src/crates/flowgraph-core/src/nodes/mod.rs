//! Per-kind node behavior: execute, output placement, lifecycle.
//!
//! The engine dispatches here over [`NodeTag`]. Each submodule owns one kind
//! family and mirrors the data contracts the integration tests pin down.
//! Reaching a metadata node (group, comment), a data-only node, or an error
//! placeholder through flow is a defect and panics loudly.

pub mod custom_event;
pub mod custom_getter;
pub mod custom_output;
pub mod delay;
pub mod event;
pub mod flow;
pub mod function;
pub mod metadata;
pub mod variable;

use flowgraph_bindings::ValueType;

use crate::context::ExecutionContext;
use crate::error::{FlowError, Result};
use crate::graph::NodeRef;
use crate::node::NodeTag;
use crate::runtime::Runtime;

pub(crate) fn dispatch_execute(
    node: &NodeRef,
    rt: &Runtime,
    ctx: &mut ExecutionContext,
) -> Result<usize> {
    let tag = node.borrow().tag();
    match tag {
        NodeTag::Function => function::execute(node, rt, ctx),
        NodeTag::Event => event::execute(node, ctx),
        NodeTag::UpdateTick | NodeTag::FixedTick => Ok(0),
        NodeTag::Branch => flow::execute_branch(ctx),
        NodeTag::Sequence => flow::execute_sequence(node, ctx),
        NodeTag::Delay => delay::execute(node, ctx),
        NodeTag::CustomEvent => custom_event::execute_producer(node, ctx),
        NodeTag::CallCustomEvent => custom_event::execute_call(node, rt, ctx),
        NodeTag::CustomGetter => Ok(0),
        NodeTag::HandleCustomGetter => Ok(0),
        NodeTag::CustomOutput => custom_output::execute_producer(node, rt, ctx),
        NodeTag::HandleCustomOutput => custom_output::execute_handler(node, ctx),
        NodeTag::Group | NodeTag::Comment => {
            panic!("{} nodes are metadata and are never executed", tag.as_str())
        }
        NodeTag::Variable => panic!("variable nodes are data-only and are never executed"),
        NodeTag::Error => {
            let message = match node.borrow().kind() {
                crate::node::NodeKind::Error(e) => e.message.clone(),
                _ => unreachable!(),
            };
            panic!("error node reached during traversal: {message}");
        }
    }
}

pub(crate) fn dispatch_place_output(
    node: &NodeRef,
    rt: &Runtime,
    ctx: &mut ExecutionContext,
    ty: ValueType,
    output: usize,
) -> Result<()> {
    let tag = node.borrow().tag();
    match tag {
        NodeTag::Function => function::place_output(node, rt, ctx, ty, output),
        NodeTag::Event => place_entry_output(node, ctx, ty, output, ArgLayout::DeclaredOrder),
        NodeTag::CustomEvent | NodeTag::CustomOutput | NodeTag::HandleCustomOutput => {
            place_entry_output(node, ctx, ty, output, ArgLayout::ReversePulled)
        }
        NodeTag::HandleCustomGetter => custom_getter::place_handler_output(node, rt, ctx),
        NodeTag::Variable => variable::place_output(node, ctx, ty),
        _ => panic!(
            "node '{}' does not expose stack outputs",
            node.borrow().name()
        ),
    }
}

/// Lifecycle fan-in: run a node's enable hook, if it has one.
pub(crate) fn run_enable(node: &NodeRef, rt: &Runtime) {
    match node.borrow().tag() {
        NodeTag::Event => event::enable(node, rt),
        NodeTag::HandleCustomOutput => custom_output::enable_handler(node, rt),
        _ => {}
    }
}

/// Lifecycle fan-in: run a node's disable hook, if it has one. Idempotent.
pub(crate) fn run_disable(node: &NodeRef, rt: &Runtime) {
    match node.borrow().tag() {
        NodeTag::Event => event::disable(node, rt),
        NodeTag::HandleCustomOutput => custom_output::disable_handler(node, rt),
        _ => {}
    }
}

/// How an entry node's argument values were laid out below its frame.
#[derive(Clone, Copy, PartialEq, Eq)]
pub(crate) enum ArgLayout {
    /// Pushed by a host dispatcher in declared order: argument `i` sits at
    /// `bottom - count + i`.
    DeclaredOrder,
    /// Placed by the engine's reverse-order input pull: argument `i` sits
    /// at `bottom - 1 - i`.
    ReversePulled,
}

impl ArgLayout {
    fn slot(self, bottom: usize, count: usize, index: usize) -> usize {
        match self {
            ArgLayout::DeclaredOrder => bottom - count + index,
            ArgLayout::ReversePulled => bottom - 1 - index,
        }
    }
}

/// Assert that an entry node's declared outputs are already sitting below
/// its frame bottom, with matching types. Dispatchers put them there before
/// triggering the traversal; the node itself pushes nothing.
pub(crate) fn verify_entry_args(
    node: &NodeRef,
    ctx: &ExecutionContext,
    layout: ArgLayout,
) -> Result<usize> {
    let n = node.borrow();
    let outputs = n.stack_outputs();
    let bottom = ctx.peek_frame().stack_bottom();
    assert!(
        bottom >= outputs.len(),
        "entry node '{}' is missing its arguments below the frame",
        n.name()
    );
    for (index, output) in outputs.iter().enumerate() {
        let handle = ctx.stack.peek(layout.slot(bottom, outputs.len(), index));
        assert_eq!(
            handle.value_type(),
            output.ty,
            "entry node '{}' argument '{}' has the wrong type",
            n.name(),
            output.name
        );
    }
    Ok(0)
}

/// Duplicate one of an entry node's argument values onto the stack top,
/// without taking ownership. The values were pushed by whoever triggered
/// the node and live until that dispatch finishes.
pub(crate) fn place_entry_output(
    node: &NodeRef,
    ctx: &mut ExecutionContext,
    ty: ValueType,
    output: usize,
    layout: ArgLayout,
) -> Result<()> {
    let (bottom, count) = {
        let frame = ctx
            .last_frame_of(node)
            .ok_or_else(|| FlowError::OutputsNotLive(node.borrow().name()))?;
        (frame.stack_bottom(), node.borrow().stack_outputs().len())
    };
    let handle = ctx.stack.peek(layout.slot(bottom, count, output));
    ctx.stack.place(ty, &handle);
    Ok(())
}
