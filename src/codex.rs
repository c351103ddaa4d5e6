//! Codex files: per-section index documents.
//!
//! A codex enumerates a section's children and lives inside the section's
//! folder under the reserved prefix. [`CodexImpact`] accumulates which
//! codexes a burst of tree actions touched, so one minimal regeneration
//! plan covers overlapping work.

use crate::config::LibraryConfig;
use crate::error::NamingError;
use crate::events::{FilePath, FolderPath};
use crate::naming::Naming;
use crate::tree::{Chain, TargetKind};
use std::collections::HashMap;

/// Sections whose index file must be regenerated or removed.
///
/// `created` doubles as "regenerate in place": any section whose member
/// list changed lands here. Merging is associative; rename chains collapse
/// and a create followed by a delete cancels out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodexImpact {
    pub created: Vec<Chain>,
    pub renamed: Vec<(Chain, Chain)>,
    pub deleted: Vec<Chain>,
}

impl CodexImpact {
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.renamed.is_empty() && self.deleted.is_empty()
    }

    pub fn record_created(&mut self, chain: Chain) {
        if !self.created.contains(&chain) {
            self.created.push(chain);
        }
    }

    pub fn record_renamed(&mut self, old: Chain, new: Chain) {
        if old != new && !self.renamed.contains(&(old.clone(), new.clone())) {
            self.renamed.push((old, new));
        }
    }

    pub fn record_deleted(&mut self, chain: Chain) {
        if !self.deleted.contains(&chain) {
            self.deleted.push(chain);
        }
    }

    /// Union with another impact, then normalize.
    pub fn merge(&mut self, other: CodexImpact) {
        for chain in other.created {
            self.record_created(chain);
        }
        for (old, new) in other.renamed {
            self.record_renamed(old, new);
        }
        for chain in other.deleted {
            self.record_deleted(chain);
        }
        self.normalize();
    }

    /// Collapse rename chains, map creations through renames, and cancel
    /// create/delete pairs.
    fn normalize(&mut self) {
        // Collapse rename chains: old -> mid, mid -> new becomes old -> new.
        let forward: HashMap<Chain, Chain> = self.renamed.iter().cloned().collect();
        let to_set: std::collections::HashSet<&Chain> = forward.values().collect();
        let mut collapsed: Vec<(Chain, Chain)> = Vec::new();
        for (old, first_new) in &self.renamed {
            if to_set.contains(old) {
                continue;
            }
            let mut seen = std::collections::HashSet::new();
            seen.insert(old.clone());
            seen.insert(first_new.clone());
            let mut current = first_new.clone();
            while let Some(next) = forward.get(&current) {
                if seen.contains(next) {
                    current = first_new.clone();
                    break;
                }
                seen.insert(next.clone());
                current = next.clone();
            }
            if *old != current {
                collapsed.push((old.clone(), current));
            }
        }
        self.renamed = collapsed;

        // A created section that was then renamed is simply created at its
        // final chain.
        let original_created = std::mem::take(&mut self.created);
        let mut created: Vec<Chain> = Vec::new();
        for chain in &original_created {
            let final_chain = self
                .renamed
                .iter()
                .find(|(old, _)| old == chain)
                .map(|(_, new)| new.clone())
                .unwrap_or_else(|| chain.clone());
            if !created.contains(&final_chain) {
                created.push(final_chain);
            }
        }
        self.renamed.retain(|(old, _)| !original_created.contains(old));
        self.created = created;

        // Created then deleted within the same burst cancels out.
        let deleted = std::mem::take(&mut self.deleted);
        for chain in deleted {
            if let Some(pos) = self.created.iter().position(|c| *c == chain) {
                self.created.remove(pos);
            } else {
                self.deleted.push(chain);
            }
        }
    }
}

/// Vault-absolute path of a section's codex file. The chain is the full
/// root-inclusive section chain, which doubles as the physical folder path.
pub fn codex_path(
    naming: &Naming,
    config: &LibraryConfig,
    section_chain: &[String],
) -> Result<FilePath, NamingError> {
    let stem = naming.codex_basename(section_chain)?;
    Ok(FilePath::new(
        FolderPath::new(section_chain.to_vec()),
        &stem,
        &config.note_extension,
    ))
}

/// Render codex content from a section's direct children.
pub fn render_codex(
    naming: &Naming,
    section_chain: &[String],
    children: &[(String, TargetKind)],
) -> String {
    let title = section_chain.last().map(|s| s.as_str()).unwrap_or_default();
    let mut out = format!("# {}\n\n", title);
    for (name, kind) in children {
        match kind {
            TargetKind::Section => {
                let mut child_chain = section_chain.to_vec();
                child_chain.push(name.clone());
                if let Ok(stem) = naming.codex_basename(&child_chain) {
                    out.push_str(&format!("- [[{}|{}/]]\n", stem, name));
                }
            }
            TargetKind::Leaf { .. } => {
                let mut child_chain = section_chain.to_vec();
                child_chain.push(name.clone());
                if let Ok(stem) = naming.leaf_basename(&child_chain) {
                    out.push_str(&format!("- [[{}|{}]]\n", stem, name));
                }
            }
        }
    }
    out
}
