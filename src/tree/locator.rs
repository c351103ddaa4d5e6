//! Locators address tree nodes without holding live references.
//!
//! A locator is re-resolved against the tree on every operation, so it
//! tolerates structural changes between computation and application.

use std::fmt;

/// What kind of node a locator addresses.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TargetKind {
    Section,
    Leaf { extension: String },
}

/// An ordered chain of node names from the root (inclusive) to a target,
/// plus the target's kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Locator {
    pub chain: Vec<String>,
    pub target: TargetKind,
}

impl Locator {
    pub fn section(chain: Vec<String>) -> Self {
        Self {
            chain,
            target: TargetKind::Section,
        }
    }

    pub fn leaf(chain: Vec<String>, extension: &str) -> Self {
        Self {
            chain,
            target: TargetKind::Leaf {
                extension: extension.to_string(),
            },
        }
    }

    /// The target's own name (last element of the chain).
    pub fn name(&self) -> &str {
        self.chain.last().map(|s| s.as_str()).unwrap_or_default()
    }

    /// The chain of the target's parent.
    pub fn parent_chain(&self) -> &[String] {
        if self.chain.is_empty() {
            &[]
        } else {
            &self.chain[..self.chain.len() - 1]
        }
    }

    pub fn is_section(&self) -> bool {
        self.target == TargetKind::Section
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.chain.join("/"))?;
        if let TargetKind::Leaf { extension } = &self.target {
            if !extension.is_empty() {
                write!(f, ".{}", extension)?;
            }
        }
        Ok(())
    }
}
