//! The per-domain runtime: graph directory, execution context, listener
//! lists, and the host-facing traversal and tick entry points.
//!
//! A [`Runtime`] is the "arena of arenas": it owns every registered graph
//! and resolves cross-graph references by `(GraphId, NodeId)` at call time.
//! Handler nodes never hold direct references into other graphs, so
//! independently-lived graphs can come and go — resolution of a dropped
//! graph just fails.
//!
//! Execution is strictly single-threaded and cooperative. The runtime holds
//! one [`ExecutionContext`] for its domain; hosts that keep separate
//! simulation and presentation stacks construct one runtime per domain.
//! Tests construct isolated runtimes the same way — there are no process
//! globals.
//!
//! # Examples
//!
//! ```rust
//! use flowgraph_bindings::{MethodBinding, Scope, Signature};
//! use flowgraph_core::{NodeKind, Runtime};
//!
//! let rt = Runtime::new();
//! let graph = rt.create_graph();
//!
//! // A host function with no inputs and no outputs: a pure flow call.
//! let ping = MethodBinding::new(
//!     Signature::new("ping", "Ping").static_fn(),
//!     |_target, _stack| println!("ping"),
//! );
//! let node = graph
//!     .borrow_mut()
//!     .create_node(NodeKind::function(ping, None))
//!     .unwrap();
//!
//! rt.traverse(&node, Scope::Simulation).unwrap();
//! assert_eq!(rt.stack_depth(), 0);
//! assert_eq!(rt.frame_depth(), 0);
//! ```

use std::cell::{RefCell, RefMut};
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use flowgraph_bindings::{HostObject, Scope, Value};

use crate::context::ExecutionContext;
use crate::engine;
use crate::error::{FlowError, Result};
use crate::graph::{Graph, GraphId, GraphRef, NodeId, NodeRef};
use crate::node::NodeTag;
use crate::nodes;
use crate::nodes::custom_output::OutputListeners;
use crate::nodes::delay::{self, TickDomain};
use crate::nodes::event::EventListeners;

/// Directory of graphs plus the execution state of one domain.
pub struct Runtime {
    weak_self: RefCell<Weak<Runtime>>,
    graphs: RefCell<HashMap<GraphId, GraphRef>>,
    graph_order: RefCell<Vec<GraphId>>,
    context: RefCell<ExecutionContext>,
    event_listeners: EventListeners,
    output_listeners: OutputListeners,
}

impl Runtime {
    /// Create an isolated runtime with an empty directory and a fresh
    /// execution context.
    #[allow(clippy::new_ret_no_self)]
    pub fn new() -> Rc<Runtime> {
        let rt = Rc::new(Runtime {
            weak_self: RefCell::new(Weak::new()),
            graphs: RefCell::new(HashMap::new()),
            graph_order: RefCell::new(Vec::new()),
            context: RefCell::new(ExecutionContext::new()),
            event_listeners: EventListeners::default(),
            output_listeners: OutputListeners::default(),
        });
        *rt.weak_self.borrow_mut() = Rc::downgrade(&rt);
        rt
    }

    /// Handle event delegates hold to reach back into this runtime without
    /// keeping it alive.
    pub(crate) fn weak_self(&self) -> Weak<Runtime> {
        self.weak_self.borrow().clone()
    }

    /// Create a graph and register it in the directory.
    pub fn create_graph(&self) -> GraphRef {
        let id = GraphId::new();
        let graph = Rc::new(RefCell::new(Graph::new(id, self.weak_self())));
        graph.borrow_mut().set_weak_self(Rc::downgrade(&graph));
        self.graphs.borrow_mut().insert(id, graph.clone());
        self.graph_order.borrow_mut().push(id);
        graph
    }

    /// Disable and unregister a graph. In-flight references to its nodes
    /// simply stop resolving.
    pub fn remove_graph(&self, id: GraphId) -> Result<()> {
        self.disable_graph(id)?;
        self.graphs.borrow_mut().remove(&id);
        self.graph_order.borrow_mut().retain(|&g| g != id);
        Ok(())
    }

    /// Resolve a graph id through the directory.
    pub fn graph(&self, id: GraphId) -> Result<GraphRef> {
        self.try_graph(id).ok_or(FlowError::UnknownGraph(id))
    }

    pub fn try_graph(&self, id: GraphId) -> Option<GraphRef> {
        self.graphs.borrow().get(&id).cloned()
    }

    /// Resolve `(graph, node)` through the directory; `None` when either
    /// half is gone.
    pub(crate) fn try_resolve_node(&self, graph: GraphId, node: NodeId) -> Option<NodeRef> {
        self.try_graph(graph)?.borrow().try_node(node)
    }

    /// Run enable hooks for every node of the graph (listener
    /// registration), in creation order, then mark it enabled.
    pub fn enable_graph(&self, id: GraphId) -> Result<()> {
        let graph = self.graph(id)?;
        let all = graph.borrow().nodes();
        for node in &all {
            nodes::run_enable(node, self);
        }
        graph.borrow_mut().set_enabled(true);
        Ok(())
    }

    /// Run disable hooks for every node of the graph, in creation order,
    /// then mark it disabled. Does not cancel in-flight delay timers.
    pub fn disable_graph(&self, id: GraphId) -> Result<()> {
        let graph = self.graph(id)?;
        let all = graph.borrow().nodes();
        for node in &all {
            nodes::run_disable(node, self);
        }
        graph.borrow_mut().set_enabled(false);
        Ok(())
    }

    /// Execute a node and walk its flow edges to exhaustion, in `scope`.
    ///
    /// This is the top-level entry: it runs on the runtime's own context,
    /// and restores the context's stack depth and frame count whether it
    /// succeeds or fails.
    pub fn traverse(&self, node: &NodeRef, scope: Scope) -> Result<()> {
        let mut ctx = self.context_mut();
        ctx.set_scope(scope);
        engine::traverse_node(node, self, &mut ctx)
    }

    /// Re-entry path for deferred continuations: traverse on a context that
    /// this call did not create (typically a delay's captured duplicate).
    pub fn traverse_with_context(
        &self,
        node: &NodeRef,
        ctx: &mut ExecutionContext,
    ) -> Result<()> {
        engine::traverse_node(node, self, ctx)
    }

    /// Host event entry: push the arguments once, traverse every listener
    /// registered for `(source, event_id)` in registration order, pop the
    /// arguments.
    ///
    /// Each listener's traversal adopts that listener's own scope.
    pub fn dispatch_event(
        &self,
        source: &HostObject,
        event_id: u64,
        args: &[Value],
    ) -> Result<()> {
        let matching = self.event_listeners.matching(source, event_id);
        if matching.is_empty() {
            return Ok(());
        }

        let mut ctx = self.context_mut();
        for value in args {
            ctx.stack.push(value.clone());
        }
        let dispatched = (|| -> Result<()> {
            for record in &matching {
                let graph = self.graph(record.graph)?;
                let node = graph.borrow().node(record.target)?;
                engine::traverse_node(&node, self, &mut ctx)?;
            }
            Ok(())
        })();
        for _ in args {
            ctx.stack.pop_value();
        }
        dispatched
    }

    /// Variable-rate host tick for one graph: advance delay timers in the
    /// variable domain, replay elapsed completions, and — when requested
    /// and the graph is enabled — fire its update-tick entry nodes.
    pub fn update_graph(&self, id: GraphId, dt: f64, fire_tick_events: bool) -> Result<()> {
        self.tick_graph(id, dt, TickDomain::Variable, fire_tick_events, NodeTag::UpdateTick, Scope::Presentation)
    }

    /// Fixed-rate host tick for one graph; the fixed-domain counterpart of
    /// [`update_graph`](Self::update_graph).
    pub fn fixed_update_graph(&self, id: GraphId, dt: f64, fire_tick_events: bool) -> Result<()> {
        self.tick_graph(id, dt, TickDomain::Fixed, fire_tick_events, NodeTag::FixedTick, Scope::Simulation)
    }

    /// Variable-rate tick for every registered graph, in registration
    /// order.
    pub fn update(&self, dt: f64, fire_tick_events: bool) -> Result<()> {
        for id in self.graph_order.borrow().clone() {
            self.update_graph(id, dt, fire_tick_events)?;
        }
        Ok(())
    }

    /// Fixed-rate tick for every registered graph, in registration order.
    pub fn fixed_update(&self, dt: f64, fire_tick_events: bool) -> Result<()> {
        for id in self.graph_order.borrow().clone() {
            self.fixed_update_graph(id, dt, fire_tick_events)?;
        }
        Ok(())
    }

    fn tick_graph(
        &self,
        id: GraphId,
        dt: f64,
        domain: TickDomain,
        fire_tick_events: bool,
        tick_tag: NodeTag,
        scope: Scope,
    ) -> Result<()> {
        let graph = self.graph(id)?;
        let all = graph.borrow().nodes();

        // Timers advance even on disabled graphs: disabling stops future
        // event-driven traversals but never cancels an armed delay.
        let mut fires = Vec::new();
        for node in &all {
            if node.borrow().is_tick_driven() {
                if let Some(fire) = delay::tick(node, dt, domain) {
                    fires.push(fire);
                }
            }
        }
        for fire in fires {
            delay::fire_completed(self, fire);
        }

        if fire_tick_events && graph.borrow().is_enabled() {
            for node in &all {
                if node.borrow().tag() == tick_tag {
                    self.traverse(node, scope)?;
                }
            }
        }
        Ok(())
    }

    /// Run static validation over every node of a graph; returns the
    /// problems found as `(node, message)` pairs.
    pub fn validate_graph(&self, id: GraphId) -> Result<Vec<(NodeId, String)>> {
        let graph = self.graph(id)?;
        let mut problems = Vec::new();
        for node in graph.borrow().nodes() {
            let n = node.borrow();
            if !n.supports_validation() {
                continue;
            }
            if let Some(message) = n.check_for_errors(self) {
                problems.push((n.id(), message));
            }
        }
        Ok(problems)
    }

    /// Current value-stack depth of the runtime's context. Zero between
    /// traversals — the balance invariant tests assert against this.
    pub fn stack_depth(&self) -> usize {
        self.context.borrow().stack.len()
    }

    /// Current frame count of the runtime's context.
    pub fn frame_depth(&self) -> usize {
        self.context.borrow().frame_count()
    }

    /// Number of live host-event listener records.
    pub fn listener_count(&self) -> usize {
        self.event_listeners.record_count()
    }

    pub(crate) fn event_listeners(&self) -> &EventListeners {
        &self.event_listeners
    }

    pub(crate) fn output_listeners(&self) -> &OutputListeners {
        &self.output_listeners
    }

    fn context_mut(&self) -> RefMut<'_, ExecutionContext> {
        self.context
            .try_borrow_mut()
            .expect("the execution context is already driving a traversal")
    }
}
