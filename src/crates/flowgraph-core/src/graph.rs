//! Graph storage: nodes, variables, and identity.
//!
//! A [`Graph`] is the exclusive owner of its [`Node`]s and variables. Other
//! graphs may point *at* its nodes — variant handlers store a
//! `(GraphId, NodeId)` pair — but resolution always goes through the
//! runtime's graph directory, never through direct references, so
//! independently-lived graphs cannot form ownership cycles.
//!
//! Node and variable iteration follows creation order. That ordering is
//! load-bearing: lifecycle fan-out (enable/disable) and listener
//! registration must be deterministic, and listener dispatch order is
//! defined as registration order.
//!
//! # Examples
//!
//! ```rust
//! use flowgraph_bindings::{Value, ValueType};
//! use flowgraph_core::{NodeKind, Runtime};
//!
//! let rt = Runtime::new();
//! let graph = rt.create_graph();
//!
//! let var = graph.borrow_mut().add_variable("speed", ValueType::Float);
//! graph.borrow().variable(var).unwrap().cell().set(Value::Float(4.5));
//!
//! let node = graph.borrow_mut().create_node(NodeKind::variable()).unwrap();
//! graph.borrow().bind_variable_node(&node, var).unwrap();
//! assert_eq!(node.borrow().stack_outputs().len(), 1);
//! ```

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use flowgraph_bindings::{ValueCell, ValueType};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{FlowError, Result};
use crate::node::{Node, NodeKind};
use crate::nodes;
use crate::runtime::Runtime;

macro_rules! id_type {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// A fresh random id.
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// The all-zero id, used as "unbound".
            pub fn nil() -> Self {
                Self(Uuid::nil())
            }

            pub fn is_nil(&self) -> bool {
                self.0.is_nil()
            }

            pub fn as_uuid(&self) -> Uuid {
                self.0
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

id_type! {
    /// Stable identity of a node, scoped to its owning graph.
    NodeId
}
id_type! {
    /// Stable identity of a graph; the key other graphs bind to.
    GraphId
}
id_type! {
    /// Stable identity of a graph variable.
    VariableId
}

/// Shared handle to a node. Frames and author tooling hold these; identity
/// comparison is `Rc::ptr_eq`.
pub type NodeRef = Rc<RefCell<Node>>;

/// Shared handle to a graph.
pub type GraphRef = Rc<RefCell<Graph>>;

/// A graph-scoped storage cell: named, typed, and alive for the graph's
/// lifetime rather than any traversal's.
pub struct Variable {
    name: String,
    ty: ValueType,
    cell: ValueCell,
}

impl Variable {
    pub(crate) fn reconstruct(name: String, ty: ValueType) -> Self {
        Self {
            name,
            ty,
            cell: ValueCell::of_type(ty),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> ValueType {
        self.ty
    }

    /// The backing cell. Variable nodes *place* this cell on the stack, so
    /// writes through it are immediately visible to future reads.
    pub fn cell(&self) -> &ValueCell {
        &self.cell
    }
}

/// A map of nodes and variables with a stable identity.
pub struct Graph {
    pub(crate) id: GraphId,
    pub(crate) weak_self: Weak<RefCell<Graph>>,
    pub(crate) runtime: Weak<Runtime>,
    pub(crate) nodes: HashMap<NodeId, NodeRef>,
    pub(crate) order: Vec<NodeId>,
    pub(crate) variables: HashMap<VariableId, Variable>,
    pub(crate) variable_order: Vec<VariableId>,
    pub(crate) enabled: bool,
}

impl Graph {
    pub(crate) fn new(id: GraphId, runtime: Weak<Runtime>) -> Self {
        Self {
            id,
            weak_self: Weak::new(),
            runtime,
            nodes: HashMap::new(),
            order: Vec::new(),
            variables: HashMap::new(),
            variable_order: Vec::new(),
            enabled: false,
        }
    }

    pub(crate) fn set_weak_self(&mut self, weak: Weak<RefCell<Graph>>) {
        self.weak_self = weak;
    }

    pub fn id(&self) -> GraphId {
        self.id
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub(crate) fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Create a node of the given kind, initialize its IO shape, and
    /// register it under a fresh id.
    pub fn create_node(&mut self, kind: NodeKind) -> Result<NodeRef> {
        let id = NodeId::new();
        let mut node = Node::new(id, self.id, self.weak_self.clone(), kind);
        node.initialize()?;
        Ok(self.register(id, node))
    }

    pub(crate) fn register(&mut self, id: NodeId, node: Node) -> NodeRef {
        debug_assert!(!self.nodes.contains_key(&id), "duplicate node id {id}");
        let node = Rc::new(RefCell::new(node));
        self.nodes.insert(id, node.clone());
        self.order.push(id);
        node
    }

    /// Remove a node: run its disable hooks, detach it from any group, and
    /// scrub every flow edge and data reference pointing at it.
    pub fn remove_node(&mut self, id: NodeId) -> Result<()> {
        let node = self.nodes.get(&id).cloned().ok_or(FlowError::UnknownNode(id))?;
        if let Some(rt) = self.runtime.upgrade() {
            nodes::run_disable(&node, &rt);
        }
        for other in self.nodes.values() {
            if !Rc::ptr_eq(other, &node) {
                other.borrow_mut().detach_group_child(id);
            }
        }
        self.nodes.remove(&id);
        self.order.retain(|&n| n != id);
        for other in self.nodes.values() {
            other.borrow_mut().remove_links_to(id);
        }
        Ok(())
    }

    /// Resolve a node id, failing if it does not exist.
    pub fn node(&self, id: NodeId) -> Result<NodeRef> {
        self.try_node(id).ok_or(FlowError::UnknownNode(id))
    }

    pub fn try_node(&self, id: NodeId) -> Option<NodeRef> {
        self.nodes.get(&id).cloned()
    }

    /// All nodes, in creation order.
    pub fn nodes(&self) -> Vec<NodeRef> {
        self.order
            .iter()
            .filter_map(|id| self.nodes.get(id).cloned())
            .collect()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Allocate a new variable with the default value of its type.
    pub fn add_variable(&mut self, name: impl Into<String>, ty: ValueType) -> VariableId {
        let id = VariableId::new();
        self.variables.insert(
            id,
            Variable {
                name: name.into(),
                ty,
                cell: ValueCell::of_type(ty),
            },
        );
        self.variable_order.push(id);
        id
    }

    pub fn remove_variable(&mut self, id: VariableId) -> Result<()> {
        if self.variables.remove(&id).is_none() {
            return Err(FlowError::author(format!("variable '{id}' does not exist")));
        }
        self.variable_order.retain(|&v| v != id);
        Ok(())
    }

    pub fn variable(&self, id: VariableId) -> Option<&Variable> {
        self.variables.get(&id)
    }

    /// All variables, in creation order.
    pub fn variables(&self) -> Vec<(VariableId, &Variable)> {
        self.variable_order
            .iter()
            .filter_map(|id| self.variables.get(id).map(|v| (*id, v)))
            .collect()
    }

    /// Point a variable node at one of this graph's variables, giving the
    /// node a stack output matching the variable's name and type.
    pub fn bind_variable_node(&self, node: &NodeRef, id: VariableId) -> Result<()> {
        let variable = self
            .variables
            .get(&id)
            .ok_or_else(|| FlowError::author(format!("variable '{id}' does not exist")))?;
        node.borrow_mut()
            .bind_variable(id, variable.name.clone(), variable.ty)
    }
}

impl fmt::Debug for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Graph")
            .field("id", &self.id)
            .field("nodes", &self.nodes.len())
            .field("variables", &self.variables.len())
            .field("enabled", &self.enabled)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeKind;
    use crate::runtime::Runtime;
    use flowgraph_bindings::Value;

    #[test]
    fn create_and_resolve_nodes() {
        let rt = Runtime::new();
        let graph = rt.create_graph();
        let node = graph.borrow_mut().create_node(NodeKind::comment()).unwrap();
        let id = node.borrow().id();
        assert!(Rc::ptr_eq(&graph.borrow().node(id).unwrap(), &node));
        assert!(graph.borrow().try_node(NodeId::new()).is_none());
    }

    #[test]
    fn nodes_iterate_in_creation_order() {
        let rt = Runtime::new();
        let graph = rt.create_graph();
        let mut ids = Vec::new();
        for _ in 0..5 {
            ids.push(
                graph
                    .borrow_mut()
                    .create_node(NodeKind::comment())
                    .unwrap()
                    .borrow()
                    .id(),
            );
        }
        let listed: Vec<NodeId> = graph.borrow().nodes().iter().map(|n| n.borrow().id()).collect();
        assert_eq!(listed, ids);
    }

    #[test]
    fn removing_a_node_scrubs_links_to_it() {
        let rt = Runtime::new();
        let graph = rt.create_graph();
        let seq = graph.borrow_mut().create_node(NodeKind::sequence()).unwrap();
        let target = graph.borrow_mut().create_node(NodeKind::sequence()).unwrap();
        let target_id = target.borrow().id();

        seq.borrow_mut().add_custom_flow().unwrap();
        seq.borrow_mut().set_flow_target(0, Some(target_id)).unwrap();
        assert_eq!(seq.borrow().flow_outputs()[0].target, Some(target_id));

        graph.borrow_mut().remove_node(target_id).unwrap();
        assert_eq!(seq.borrow().flow_outputs()[0].target, None);
        assert!(graph.borrow().try_node(target_id).is_none());
    }

    #[test]
    fn removing_a_node_detaches_it_from_groups() {
        let rt = Runtime::new();
        let graph = rt.create_graph();
        let group = graph.borrow_mut().create_node(NodeKind::group()).unwrap();
        let child = graph.borrow_mut().create_node(NodeKind::comment()).unwrap();
        let child_id = child.borrow().id();

        group.borrow_mut().add_group_child(child_id).unwrap();
        graph.borrow_mut().remove_node(child_id).unwrap();
        assert!(group.borrow().group_children().is_empty());
    }

    #[test]
    fn variables_hold_graph_lifetime_cells() {
        let rt = Runtime::new();
        let graph = rt.create_graph();
        let id = graph.borrow_mut().add_variable("count", ValueType::Int);
        graph.borrow().variable(id).unwrap().cell().set(Value::Int(3));
        assert_eq!(graph.borrow().variable(id).unwrap().cell().get_int(), 3);

        graph.borrow_mut().remove_variable(id).unwrap();
        assert!(graph.borrow().variable(id).is_none());
        assert!(graph.borrow_mut().remove_variable(id).is_err());
    }
}
