//! Signatures and invoke functions for host method bindings.
//!
//! This is the consumed half of the binding adapter: the reflection or code
//! generation layer that produces these descriptors lives in the host. The
//! runtime only needs an ordered, typed parameter list and a function it can
//! hand the value stack to.
//!
//! The invoke contract mirrors the stack discipline exactly:
//!
//! 1. inputs are popped in declared order (the first declared parameter is
//!    on top of the stack when invoke runs),
//! 2. outputs are pushed in declared order — return value first, then each
//!    `out` parameter.

use std::fmt;
use std::rc::Rc;

use crate::stack::ValueStack;
use crate::value::{HostObject, ValueType};

/// Execution domain a binding (and the nodes built from it) may run in.
///
/// `Any` bindings run in either domain. A traversal adopts the scope of its
/// entry node and rejects nodes from the other domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    Any,
    Simulation,
    Presentation,
}

/// One declared parameter of a host function or event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: String,
    pub ty: ValueType,
    /// Output parameters are pushed by invoke instead of popped.
    pub out: bool,
}

impl ParamSpec {
    pub fn input(name: impl Into<String>, ty: ValueType) -> Self {
        Self { name: name.into(), ty, out: false }
    }

    pub fn output(name: impl Into<String>, ty: ValueType) -> Self {
        Self { name: name.into(), ty, out: true }
    }
}

/// Ordered, typed description of a callable host function.
#[derive(Debug, Clone)]
pub struct Signature {
    /// Stable lookup name (the host function's name).
    pub name: String,
    /// Human-readable description shown to authors.
    pub description: String,
    pub params: Vec<ParamSpec>,
    /// Return value type, if any. Pushed before any `out` parameters.
    pub ret: Option<ValueType>,
    /// Static bindings take no target instance.
    pub is_static: bool,
    pub scope: Scope,
    /// Forces a function with return values to still be a flow node instead
    /// of a per-pull data node.
    pub force_flow: bool,
}

impl Signature {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            params: Vec::new(),
            ret: None,
            is_static: false,
            scope: Scope::Any,
            force_flow: false,
        }
    }

    pub fn with_param(mut self, param: ParamSpec) -> Self {
        self.params.push(param);
        self
    }

    pub fn with_ret(mut self, ty: ValueType) -> Self {
        self.ret = Some(ty);
        self
    }

    pub fn static_fn(mut self) -> Self {
        self.is_static = true;
        self
    }

    pub fn in_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    pub fn flow(mut self) -> Self {
        self.force_flow = true;
        self
    }

    /// True when the function produces any stack outputs (a return value or
    /// at least one `out` parameter). Functions without return values are
    /// flow nodes; functions with them are data nodes unless `force_flow`.
    pub fn has_return_values(&self) -> bool {
        self.ret.is_some() || self.params.iter().any(|p| p.out)
    }
}

/// The invoke function of a method binding.
///
/// Pops declared inputs in declared order, pushes declared outputs in
/// declared order, returns nothing. The target is `None` for static
/// bindings.
pub type InvokeFn = Rc<dyn Fn(Option<&HostObject>, &mut ValueStack)>;

/// A callable host function: signature plus invoke.
#[derive(Clone)]
pub struct MethodBinding {
    pub signature: Signature,
    pub invoke: InvokeFn,
}

impl MethodBinding {
    pub fn new(
        signature: Signature,
        invoke: impl Fn(Option<&HostObject>, &mut ValueStack) + 'static,
    ) -> Self {
        Self { signature, invoke: Rc::new(invoke) }
    }
}

impl fmt::Debug for MethodBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodBinding")
            .field("signature", &self.signature)
            .field("invoke", &"<function>")
            .finish()
    }
}
