//! Library tree node types.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Completion status of a leaf document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Status {
    NotStarted,
    Done,
    #[default]
    Unknown,
}

/// A folder-equivalent node with named children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionNode {
    pub name: String,
    /// Keys always equal the child's own name.
    pub children: BTreeMap<String, TreeNode>,
}

impl SectionNode {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            children: BTreeMap::new(),
        }
    }
}

/// A file-equivalent terminal node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafNode {
    pub name: String,
    pub extension: String,
    pub status: Status,
}

/// A node in the library tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeNode {
    Section(SectionNode),
    Leaf(LeafNode),
}
