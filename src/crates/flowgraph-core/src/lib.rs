//! # flowgraph-core — node-graph execution runtime
//!
//! A small stack-based interpreter for visually-authored programs: typed
//! nodes connected by control-flow edges ("flow") and data-reference edges
//! ("stack"), executed by a depth-first traversal over one shared value
//! stack per execution domain.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                        Runtime                           │
//! │  directory: GraphId → Graph      listeners  context      │
//! │                                                          │
//! │   Graph A                      Graph B                   │
//! │  ┌───────────┐  flow   ┌────────┐     ┌──────────────┐   │
//! │  │ Event     ├────────►│ Branch ├────►│ Function     │   │
//! │  └───────────┘         └───▲────┘     └──────────────┘   │
//! │        ▲ args on stack     │ pull                        │
//! │        │                ┌──┴─────┐   variant id          │
//! │   host dispatch         │ Data fn │  ◄──────── handler   │
//! │                         └────────┘    (other graph)      │
//! │                                                          │
//! │  ExecutionContext:  frames ⟪node, stack bottom⟫          │
//! │  ValueStack:        typed slots, owned or placed         │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## The pieces
//!
//! - [`ValueStack`](flowgraph_bindings::ValueStack) (from
//!   `flowgraph-bindings`): the shared, typed slot stack all inter-node
//!   data passing goes through.
//! - [`Node`] / [`NodeKind`]: the closed set of node kinds — function
//!   calls, event entries, branch/sequence/delay flow control, variable
//!   reads, the cross-graph custom event/getter/output families, group and
//!   comment metadata, and the error placeholder the loader plants when an
//!   entry cannot be reconstructed.
//! - [`ExecutionContext`]: the frame stack layered over the value stack;
//!   frames record which node owns which stack region.
//! - The traversal engine: executes a node, pulls its data inputs from
//!   referenced nodes (re-invoking them on every read), and walks chosen
//!   flow edges until none remain.
//! - [`Runtime`]: the graph directory, host-event dispatch, tick driving,
//!   and the per-domain execution context.
//! - The variant layer ([`set_variant`]): one graph declares a named
//!   extension point, another binds to it by stable id, validated for
//!   arity and type agreement.
//! - The delay node: captures a duplicate of the live execution context
//!   and replays it on a later host tick — the only deferred-continuation
//!   mechanism, and the only place a traversal error is caught and
//!   dropped instead of propagated.
//!
//! ## The invariant everything leans on
//!
//! Every complete top-level traversal leaves the value stack and the frame
//! stack exactly as it found them — on success and on error. Stack type
//! mismatches, executing metadata nodes, and frame imbalance are defects
//! and panic; everything recoverable travels as [`FlowError`].
//!
//! ## Quick start
//!
//! ```rust
//! use flowgraph_bindings::{MethodBinding, ParamSpec, Scope, Signature, Value, ValueType};
//! use flowgraph_core::{NodeKind, Runtime};
//!
//! let rt = Runtime::new();
//! let graph = rt.create_graph();
//!
//! // Host function: pops its int input, prints it.
//! let print_int = MethodBinding::new(
//!     Signature::new("print_int", "Prints a number")
//!         .with_param(ParamSpec::input("value", ValueType::Int))
//!         .static_fn(),
//!     |_target, stack| {
//!         let value = stack.pop_int();
//!         println!("value: {value}");
//!     },
//! );
//!
//! let node = graph
//!     .borrow_mut()
//!     .create_node(NodeKind::function(print_int, None))
//!     .unwrap();
//! node.borrow().set_input_literal(0, Value::Int(7)).unwrap();
//!
//! rt.traverse(&node, Scope::Simulation).unwrap();
//! assert_eq!(rt.stack_depth(), 0);
//! ```

pub mod context;
pub mod engine;
pub mod error;
pub mod graph;
pub mod node;
pub mod nodes;
pub mod runtime;
pub mod serialization;
pub mod variant;

pub use context::{ExecutionContext, Frame};
pub use error::{FlowError, Result};
pub use graph::{Graph, GraphId, GraphRef, NodeId, NodeRef, Variable, VariableId};
pub use node::{FlowOutput, Node, NodeKind, NodeTag, Property, StackInput, StackOutput};
pub use nodes::delay::DelayNode;
pub use nodes::event::{EventNode, ListenerRecord};
pub use nodes::function::FunctionNode;
pub use nodes::metadata::{ErrorNode, GroupNode};
pub use runtime::Runtime;
pub use serialization::{BindingResolver, GraphEntry, NodeEntry, ObjectKeys, FORMAT_VERSION};
pub use variant::set_variant;
