//! Execution context: the frame stack layered over the value stack.
//!
//! A [`Frame`] records which node entered and how deep the value stack was
//! at that moment. That depth is the anchor for everything frame-relative:
//! output placement peeks at `stack_bottom + i` (or below it, for entry
//! nodes whose arguments were pushed by their dispatcher), and popping a
//! frame with cleanup restores the stack to exactly that depth.
//!
//! One context exists per execution domain and is threaded explicitly into
//! every execution call — there is no ambient global. The deferred
//! continuation pattern relies on [`ExecutionContext::duplicate`]: a delay
//! captures a full copy (frames plus per-slot value copies) that stays valid
//! after the original traversal unwinds, and replays it on a later tick.
//!
//! # Invariants
//!
//! - Frame count and stack depth after a complete top-level traversal equal
//!   their values before it.
//! - `pop(cleanup_stack: true)` never pops below the frame's recorded
//!   bottom, and always restores exactly that depth.

use flowgraph_bindings::{Scope, ValueStack};

use crate::error::{FlowError, Result};
use crate::graph::{GraphRef, NodeRef};

/// One node activation: the entering node, its graph, and the value-stack
/// depth when it entered.
#[derive(Clone)]
pub struct Frame {
    entry: NodeRef,
    graph: GraphRef,
    stack_bottom: usize,
}

impl Frame {
    pub fn entry(&self) -> &NodeRef {
        &self.entry
    }

    pub fn graph(&self) -> &GraphRef {
        &self.graph
    }

    pub fn stack_bottom(&self) -> usize {
        self.stack_bottom
    }

    /// Frame identity for tests: same node, same depth.
    pub fn same_activation(&self, other: &Frame) -> bool {
        std::rc::Rc::ptr_eq(&self.entry, &other.entry) && self.stack_bottom == other.stack_bottom
    }
}

/// The per-domain execution state: value stack, frame stack, scope.
pub struct ExecutionContext {
    /// The shared value stack all inter-node data passing goes through.
    pub stack: ValueStack,
    frames: Vec<Frame>,
    scope: Scope,
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self {
            stack: ValueStack::new(),
            frames: Vec::new(),
            scope: Scope::Any,
        }
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    /// Switch the execution domain. Only legal while no frames are live —
    /// changing domains mid-traversal is a defect.
    pub fn set_scope(&mut self, scope: Scope) {
        assert!(
            self.frames.is_empty() || scope == self.scope,
            "cannot change execution scope with frames present"
        );
        self.scope = scope;
    }

    /// Push a frame for `node`, recording the current stack depth.
    ///
    /// The frame is appended unconditionally so the caller's pop always
    /// balances; scope validation runs afterwards. An empty context adopts
    /// the node's scope; a non-`Any` node from the other domain is rejected.
    pub fn push(&mut self, node: &NodeRef) -> Result<()> {
        let graph = node
            .borrow()
            .owner()
            .expect("node is not attached to a live graph");
        let scope = node.borrow().scope();
        self.frames.push(Frame {
            entry: node.clone(),
            graph,
            stack_bottom: self.stack.len(),
        });
        if self.frames.len() == 1 {
            self.scope = scope;
            Ok(())
        } else if scope != Scope::Any && scope != self.scope {
            Err(FlowError::ScopeMismatch {
                node: node.borrow().name(),
                required: scope,
                current: self.scope,
            })
        } else {
            Ok(())
        }
    }

    /// Pop the top frame, optionally restoring the stack to its bottom.
    ///
    /// Cleanup is skipped by pull-based evaluation, which pops the frame but
    /// deliberately leaves one placed value behind for its consumer.
    pub fn pop(&mut self, cleanup_stack: bool) {
        let frame = self.frames.pop().expect("frame stack underflow");
        if cleanup_stack {
            while self.stack.len() > frame.stack_bottom {
                self.stack.pop_value();
            }
        }
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// The top frame. Only valid while a traversal is in progress.
    pub fn peek_frame(&self) -> &Frame {
        self.frames.last().expect("no live frames")
    }

    /// The most recent frame whose entry is `node`, scanning from the top.
    ///
    /// This is the "am I the one who owns these outputs" lookup used by
    /// output placement: a node may appear several times in one call chain
    /// through data-pull recursion, and the newest activation wins.
    pub fn last_frame_of(&self, node: &NodeRef) -> Option<&Frame> {
        self.frames
            .iter()
            .rev()
            .find(|frame| std::rc::Rc::ptr_eq(&frame.entry, node))
    }

    /// Deep-copy this context: same frames, and a value stack holding
    /// per-slot copies of the live region.
    ///
    /// The copy is what lets a delay replay a traversal after the original
    /// context has unwound — it shares no slots with the source.
    pub fn duplicate(&self) -> ExecutionContext {
        let mut stack = ValueStack::new();
        for index in 0..self.stack.len() {
            stack.push_copy(&self.stack, index);
        }
        ExecutionContext {
            stack,
            frames: self.frames.clone(),
            scope: self.scope,
        }
    }

    /// Empty both the frame stack and the value stack.
    pub fn clear(&mut self) {
        while !self.frames.is_empty() {
            self.pop(true);
        }
        // Values can sit below the first frame when they were pushed by an
        // external dispatcher; drain those too.
        while !self.stack.is_empty() {
            self.stack.pop_value();
        }
    }
}
