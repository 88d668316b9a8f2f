//! Error types for graph construction, traversal and loading.
//!
//! Only *recoverable* failures travel through [`FlowError`]: unresolved
//! cross-graph references, scope violations, variant mismatches, load
//! failures. Runtime contract violations — a typed pop that finds the wrong
//! tag, executing a metadata node, frame/stack imbalance — are defects and
//! panic instead; see the crate-level documentation for the taxonomy.

use flowgraph_bindings::Scope;
use thiserror::Error;

use crate::graph::{GraphId, NodeId};

/// Convenience result type using [`FlowError`].
pub type Result<T> = std::result::Result<T, FlowError>;

/// All recoverable errors produced by the runtime.
#[derive(Error, Debug)]
pub enum FlowError {
    /// A cross-graph reference named a graph the runtime does not know.
    ///
    /// Graphs are resolved through the runtime's directory at call time;
    /// a dropped or never-registered container surfaces here.
    #[error("graph '{0}' is not registered with the runtime")]
    UnknownGraph(GraphId),

    /// A node id did not resolve inside its graph.
    #[error("node '{0}' does not exist")]
    UnknownNode(NodeId),

    /// A node from one execution domain was reached by a traversal running
    /// in the other.
    #[error("execution scope is {current:?}, but node '{node}' requires {required:?}")]
    ScopeMismatch {
        /// Display name of the offending node.
        node: String,
        required: Scope,
        current: Scope,
    },

    /// An instance binding was invoked with no target object.
    #[error("binding target for node '{0}' is missing")]
    MissingTarget(String),

    /// A downstream reader asked for the outputs of a node that has no live
    /// frame on the execution context.
    #[error("outputs of node '{0}' are not live on the execution context")]
    OutputsNotLive(String),

    /// A variable node whose graph variable was removed or never bound.
    #[error("graph variable for node '{0}' is missing")]
    MissingVariable(String),

    /// Variant binding or resolution failed.
    #[error("variant binding error: {0}")]
    Variant(String),

    /// An author-time operation was rejected (bad custom IO edit, group
    /// containment violation, out-of-range index).
    #[error("author error: {0}")]
    Author(String),

    /// A serialized node entry could not be reconstructed. The graph loader
    /// converts this into an error-placeholder node rather than failing the
    /// whole graph.
    #[error("failed to load node entry: {0}")]
    Load(String),

    /// A graph could not be written out (e.g. a live object reference with
    /// no serializable key).
    #[error("failed to save graph: {0}")]
    Save(String),

    /// Underlying JSON error from the entry format.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl FlowError {
    /// Create a variant-layer error.
    pub fn variant(message: impl Into<String>) -> Self {
        Self::Variant(message.into())
    }

    /// Create an author-time error.
    pub fn author(message: impl Into<String>) -> Self {
        Self::Author(message.into())
    }

    /// Create a load error.
    pub fn load(message: impl Into<String>) -> Self {
        Self::Load(message.into())
    }
}
