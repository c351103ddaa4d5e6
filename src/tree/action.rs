//! Mutation actions applied to the library tree.

use super::locator::Locator;
use super::node::Status;

/// A single structural mutation of the tree.
///
/// Exhaustively matched everywhere it is consumed; adding a variant is a
/// compile error at every consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeAction {
    /// Create the addressed node, auto-creating missing intermediate
    /// sections. Idempotent for an identical existing node.
    Create { locator: Locator, status: Status },

    /// Remove the addressed node and prune any ancestor sections left
    /// empty (never the root).
    Delete { locator: Locator },

    /// Change the target's own name; its parent stays put.
    Rename { locator: Locator, new_name: String },

    /// Re-parent the target under a new section chain, keeping its name.
    Move { locator: Locator, new_parent: Vec<String> },

    /// Set a leaf's status; on a section, applies recursively to every
    /// descendant leaf.
    ChangeStatus { locator: Locator, status: Status },
}

impl TreeAction {
    pub fn locator(&self) -> &Locator {
        match self {
            Self::Create { locator, .. }
            | Self::Delete { locator }
            | Self::Rename { locator, .. }
            | Self::Move { locator, .. }
            | Self::ChangeStatus { locator, .. } => locator,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Create { .. } => "create",
            Self::Delete { .. } => "delete",
            Self::Rename { .. } => "rename",
            Self::Move { .. } => "move",
            Self::ChangeStatus { .. } => "change-status",
        }
    }
}
