//! # flowgraph-bindings — value model and host adapter surface
//!
//! Foundational crate for the FlowGraph runtime. It owns the pieces that sit
//! on the boundary between the graph interpreter and its host:
//!
//! - the typed [`Value`] model and the shared [`ValueCell`]s backing
//!   literals, properties and variables,
//! - the [`ValueStack`] — the per-domain slot stack all inter-node data
//!   passing goes through,
//! - [`MethodBinding`] / [`Signature`] — the consumed descriptor of a
//!   callable host function,
//! - [`EventBinding`] / [`HostEvent`] — the consumed listener surface for
//!   host events.
//!
//! The reflection/registration layer that produces bindings from host code
//! is deliberately out of scope; hosts (and tests) construct bindings by
//! hand from closures.

pub mod events;
pub mod signature;
pub mod stack;
pub mod value;

pub use events::{same_delegate, EventBinding, EventDelegate, HostEvent};
pub use signature::{InvokeFn, MethodBinding, ParamSpec, Scope, Signature};
pub use stack::ValueStack;
pub use value::{HostObject, Value, ValueCell, ValueType};
