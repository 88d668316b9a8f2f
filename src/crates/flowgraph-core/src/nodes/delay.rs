//! Deferred continuation: the delay node.
//!
//! First execute while idle captures a duplicate of the current execution
//! context, fires "started" immediately, and arms a timer in whichever tick
//! domain the traversal was running in. Host ticks advance the timer; when
//! it elapses, the completion chain replays **on the captured context**, so
//! downstream nodes can still read outputs produced before the delay.
//! Exactly one completion fires per start; re-triggering while running is
//! ignored, not queued.
//!
//! The replay is the system's only catch-and-discard error boundary: a
//! failing continuation is logged and dropped so it cannot corrupt the
//! value stack for the rest of the program.

use flowgraph_bindings::Scope;

use crate::context::ExecutionContext;
use crate::error::Result;
use crate::graph::{GraphRef, NodeId, NodeRef};
use crate::node::NodeKind;
use crate::runtime::Runtime;

/// Which host tick advances a delay's timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TickDomain {
    Fixed,
    Variable,
}

/// Timer state of one delay node.
pub struct DelayNode {
    running: bool,
    domain: TickDomain,
    duration: f64,
    elapsed: f64,
    captured: Option<ExecutionContext>,
}

impl DelayNode {
    pub(crate) fn new() -> Self {
        Self {
            running: false,
            domain: TickDomain::Variable,
            duration: 0.0,
            elapsed: 0.0,
            captured: None,
        }
    }

    /// True between the "started" firing and the "completed" firing.
    pub fn is_running(&self) -> bool {
        self.running
    }
}

/// A completion that elapsed this tick and is ready to replay once the
/// node borrow is released.
pub(crate) struct DeferredFire {
    target: Option<NodeId>,
    graph: GraphRef,
    context: ExecutionContext,
}

pub(crate) fn execute(node: &NodeRef, ctx: &mut ExecutionContext) -> Result<usize> {
    let duration = ctx.stack.pop_float();

    let mut n = node.borrow_mut();
    let NodeKind::Delay(state) = n.kind_mut() else { unreachable!() };
    if state.running {
        // Already armed: one completion per start, re-triggers are dropped.
        return Ok(0);
    }
    state.running = true;
    state.duration = duration;
    state.elapsed = 0.0;
    state.domain = if ctx.scope() == Scope::Simulation {
        TickDomain::Fixed
    } else {
        TickDomain::Variable
    };
    // Capture after the duration input is consumed and before the flow
    // index is pushed: the replay wants the chain's values, not ours.
    state.captured = Some(ctx.duplicate());
    drop(n);

    ctx.stack.push_int(0); // "started"
    Ok(1)
}

/// Advance the timer by `dt` if the node is armed in `domain`. Returns the
/// completion to fire, with the node borrow already released by the caller
/// before replaying (the completion chain may legally reach this node
/// again).
pub(crate) fn tick(node: &NodeRef, dt: f64, domain: TickDomain) -> Option<DeferredFire> {
    let mut n = node.borrow_mut();
    let graph = n.owner()?;
    let NodeKind::Delay(state) = n.kind_mut() else { return None };
    if !state.running || state.domain != domain {
        return None;
    }
    state.elapsed += dt;
    if state.elapsed < state.duration {
        return None;
    }
    state.running = false;
    let context = state.captured.take()?;
    let target = n.flow_outputs().get(1).and_then(|output| output.target);
    Some(DeferredFire { target, graph, context })
}

/// Replay the completion chain on the captured context, then discard the
/// context regardless of the outcome. The explicit `Result` here is the
/// catch-and-discard boundary: one failing continuation must not corrupt
/// the value stack for the rest of the program.
pub(crate) fn fire_completed(rt: &Runtime, fire: DeferredFire) {
    let DeferredFire { target, graph, mut context } = fire;
    if let Some(target) = target {
        let resolved = graph.borrow().try_node(target);
        match resolved {
            Some(next) => {
                if let Err(error) = rt.traverse_with_context(&next, &mut context) {
                    tracing::warn!(%error, "deferred completion replay failed; dropping its context");
                }
            }
            None => {
                tracing::warn!(node = %target, "deferred completion target is gone");
            }
        }
    }
    context.clear();
}
