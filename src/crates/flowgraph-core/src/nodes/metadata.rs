//! Metadata-only nodes: groups, comments, and error placeholders.
//!
//! None of these execute. Groups and comments organize the canvas; an error
//! node is planted by the loader wherever a serialized entry could not be
//! reconstructed, preserving the raw entry so saving the graph again loses
//! nothing.

use crate::serialization::NodeEntry;

/// Visual grouping of nodes by id. Containment is bookkeeping only; it has
/// no effect on traversal.
#[derive(Default)]
pub struct GroupNode {
    pub(crate) children: Vec<crate::graph::NodeId>,
}

/// Placeholder for a node that failed to load. `check_for_errors` reports
/// the stored diagnostic; reaching it through flow is a defect.
pub struct ErrorNode {
    /// Human-readable explanation of why the original node could not be
    /// reconstructed.
    pub message: String,
    /// The raw serialized entry, written back verbatim on save.
    pub backup: NodeEntry,
}
