//! Healer: tree mutation plus the corrective physical operations that
//! restore the canonical filename/location invariants.
//!
//! Every operation applies the tree action first, then diffs the canonical
//! layout against what was physically observed. Because the ancestor chain
//! is encoded in every descendant leaf's filename, a section rename or
//! move fans out to a rewrite of the whole subtree, computed from the
//! post-mutation tree shape.

use crate::codex::CodexImpact;
use crate::config::LibraryConfig;
use crate::error::NamingError;
use crate::events::{FilePath, FolderPath};
use crate::naming::Naming;
use crate::tree::{ApplyOutcome, Chain, Tree, TreeAction};
use crate::vault::VaultAction;
use std::collections::HashSet;
use tracing::debug;

/// What was physically observed at the time of the action. Event-driven
/// healing sees the post-edit layout; API-driven mutation sees nothing and
/// the healer produces the physical change itself.
#[derive(Debug, Clone)]
pub enum Observation {
    /// The file already sits at this vault-absolute path.
    File(FilePath),
    /// The folder already sits at this vault-absolute path.
    Folder(FolderPath),
    /// No physical change has happened yet.
    None,
}

/// Corrective operations plus the codex regeneration they imply.
#[derive(Debug, Default)]
pub struct Healing {
    pub actions: Vec<VaultAction>,
    pub impact: CodexImpact,
}

pub struct Healer {
    naming: Naming,
    note_extension: String,
    untracked_folder: String,
}

impl Healer {
    pub fn new(config: &LibraryConfig) -> Self {
        Self {
            naming: Naming::from_config(config),
            note_extension: config.note_extension.clone(),
            untracked_folder: config.untracked_folder.clone(),
        }
    }

    /// Apply `action` to the tree and compute the corrective operations.
    ///
    /// `seen_folders` deduplicates folder creation across the actions of
    /// one batch; the caller shares one set for the whole burst.
    pub fn heal(
        &self,
        tree: &mut Tree,
        action: &TreeAction,
        observed: Observation,
        seen_folders: &mut HashSet<String>,
    ) -> Result<Healing, NamingError> {
        let result = tree.apply(action);
        if result.outcome == ApplyOutcome::Noop {
            return Ok(Healing::default());
        }

        let mut healing = Healing::default();
        match action {
            TreeAction::Create { locator, .. } => {
                self.folder_creates(&result.created_sections, &observed, seen_folders, &mut healing);
                for chain in &result.created_sections {
                    healing.impact.record_created(chain.clone());
                    if chain.len() > 1 {
                        healing.impact.record_created(chain[..chain.len() - 1].to_vec());
                    }
                }

                if locator.is_section() {
                    if result.outcome == ApplyOutcome::Changed {
                        healing.impact.record_created(locator.chain.clone());
                    }
                } else {
                    let canonical = self.leaf_path(&locator.chain, locator_ext(locator))?;
                    match &observed {
                        Observation::File(physical) if *physical != canonical => {
                            healing.actions.push(VaultAction::RenameFile {
                                from: physical.clone(),
                                to: canonical,
                            });
                            healing.impact.record_created(locator.parent_chain().to_vec());
                        }
                        Observation::File(_) => {
                            if result.outcome == ApplyOutcome::Changed {
                                healing.impact.record_created(locator.parent_chain().to_vec());
                            }
                        }
                        _ => {
                            if result.outcome == ApplyOutcome::Changed {
                                healing.actions.push(VaultAction::UpsertFile {
                                    path: canonical,
                                    content: None,
                                });
                                healing.impact.record_created(locator.parent_chain().to_vec());
                            }
                        }
                    }
                }
            }

            TreeAction::Delete { locator } => {
                let target = &locator.chain;
                let event_driven = !matches!(observed, Observation::None);

                if locator.is_section() {
                    if !event_driven {
                        healing.actions.push(VaultAction::TrashFolder {
                            path: FolderPath::new(target.clone()),
                        });
                    }
                } else if !event_driven {
                    healing.actions.push(VaultAction::TrashFile {
                        path: self.leaf_path(target, locator_ext(locator))?,
                    });
                }

                // Ancestors pruned empty still exist physically either way.
                for chain in &result.removed_sections {
                    let under_target = locator.is_section()
                        && chain.len() >= target.len()
                        && chain[..target.len()] == target[..];
                    if !under_target {
                        healing.actions.push(VaultAction::TrashFolder {
                            path: FolderPath::new(chain.clone()),
                        });
                    }
                    healing.impact.record_deleted(chain.clone());
                }
                if let Some(survivor) = surviving_ancestor(locator.parent_chain(), &result.removed_sections) {
                    healing.impact.record_created(survivor);
                }
            }

            TreeAction::Rename { locator, new_name } => {
                let old_chain = locator.chain.clone();
                let mut new_chain = locator.parent_chain().to_vec();
                new_chain.push(new_name.clone());

                if locator.is_section() {
                    self.relocate_section(tree, &old_chain, &new_chain, &observed, &mut healing)?;
                } else {
                    let canonical = self.leaf_path(&new_chain, locator_ext(locator))?;
                    let from = match &observed {
                        Observation::File(physical) => physical.clone(),
                        _ => self.leaf_path(&old_chain, locator_ext(locator))?,
                    };
                    if from != canonical {
                        healing.actions.push(VaultAction::RenameFile { from, to: canonical });
                    }
                }
                healing.impact.record_created(locator.parent_chain().to_vec());
            }

            TreeAction::Move { locator, new_parent } => {
                let old_chain = locator.chain.clone();
                let mut new_chain = new_parent.clone();
                new_chain.push(locator.name().to_string());

                self.folder_creates(&result.created_sections, &observed, seen_folders, &mut healing);
                for chain in &result.created_sections {
                    healing.impact.record_created(chain.clone());
                }

                if locator.is_section() {
                    self.relocate_section(tree, &old_chain, &new_chain, &observed, &mut healing)?;
                } else {
                    let canonical = self.leaf_path(&new_chain, locator_ext(locator))?;
                    let from = match &observed {
                        Observation::File(physical) => physical.clone(),
                        _ => self.leaf_path(&old_chain, locator_ext(locator))?,
                    };
                    if from != canonical {
                        healing.actions.push(VaultAction::RenameFile { from, to: canonical });
                    }
                }

                for chain in &result.removed_sections {
                    healing.actions.push(VaultAction::TrashFolder {
                        path: FolderPath::new(chain.clone()),
                    });
                    healing.impact.record_deleted(chain.clone());
                }
                if let Some(survivor) = surviving_ancestor(locator.parent_chain(), &result.removed_sections) {
                    healing.impact.record_created(survivor);
                }
                healing.impact.record_created(new_parent.clone());
            }

            TreeAction::ChangeStatus { locator, .. } => {
                if result.outcome == ApplyOutcome::Changed {
                    let chain = if locator.is_section() {
                        locator.chain.clone()
                    } else {
                        locator.parent_chain().to_vec()
                    };
                    healing.impact.record_created(chain);
                }
            }
        }

        debug!(
            action = action.kind_name(),
            locator = %action.locator(),
            corrective = healing.actions.len(),
            "Healed tree action"
        );
        Ok(healing)
    }

    /// Heal a combined move-and-rename as one unit.
    ///
    /// A collapsed rename chain can land a node in a new parent under a
    /// new name in a single event. Healing the two tree actions
    /// separately would diff against the transient intermediate chain, so
    /// both are applied first and the physical diff runs once against the
    /// final chain.
    pub fn heal_relocation(
        &self,
        tree: &mut Tree,
        locator: &crate::tree::Locator,
        new_parent: &[String],
        new_name: &str,
        observed: Observation,
        seen_folders: &mut HashSet<String>,
    ) -> Result<Healing, NamingError> {
        let moved = tree.apply(&TreeAction::Move {
            locator: locator.clone(),
            new_parent: new_parent.to_vec(),
        });
        if moved.outcome == ApplyOutcome::Noop {
            return Ok(Healing::default());
        }
        let mut moved_chain = new_parent.to_vec();
        moved_chain.push(locator.name().to_string());
        tree.apply(&TreeAction::Rename {
            locator: crate::tree::Locator {
                chain: moved_chain,
                target: locator.target.clone(),
            },
            new_name: new_name.to_string(),
        });
        let mut final_chain = new_parent.to_vec();
        final_chain.push(new_name.to_string());

        let mut healing = Healing::default();
        self.folder_creates(&moved.created_sections, &observed, seen_folders, &mut healing);
        for chain in &moved.created_sections {
            healing.impact.record_created(chain.clone());
        }

        if locator.is_section() {
            self.relocate_section(tree, &locator.chain, &final_chain, &observed, &mut healing)?;
        } else {
            let canonical = self.leaf_path(&final_chain, locator_ext(locator))?;
            let from = match &observed {
                Observation::File(physical) => physical.clone(),
                _ => self.leaf_path(&locator.chain, locator_ext(locator))?,
            };
            if from != canonical {
                healing.actions.push(VaultAction::RenameFile { from, to: canonical });
            }
        }

        for chain in &moved.removed_sections {
            healing.actions.push(VaultAction::TrashFolder {
                path: FolderPath::new(chain.clone()),
            });
            healing.impact.record_deleted(chain.clone());
        }
        if let Some(survivor) = surviving_ancestor(locator.parent_chain(), &moved.removed_sections) {
            healing.impact.record_created(survivor);
        }
        healing.impact.record_created(new_parent.to_vec());
        Ok(healing)
    }

    /// Relocate an undecodable file under the untracked subfolder of its
    /// nearest tracked ancestor. `path` is vault-absolute.
    pub fn quarantine(
        &self,
        tree: &Tree,
        path: &FilePath,
        seen_folders: &mut HashSet<String>,
    ) -> Vec<VaultAction> {
        let tracked = nearest_tracked_ancestor(tree, &path.folder);
        let pen = tracked.join(&self.untracked_folder);
        let mut actions = Vec::new();
        if seen_folders.insert(pen.to_string()) {
            actions.push(VaultAction::CreateFolder { path: pen.clone() });
        }
        actions.push(VaultAction::RenameFile {
            from: path.clone(),
            to: path.with_folder(pen),
        });
        actions
    }

    /// Emit `CreateFolder` for newly created section chains, skipping
    /// chains the observed physical layout proves already exist and chains
    /// already ensured earlier in the batch.
    fn folder_creates(
        &self,
        created: &[Chain],
        observed: &Observation,
        seen_folders: &mut HashSet<String>,
        healing: &mut Healing,
    ) {
        let physical_folder = match observed {
            Observation::File(path) => Some(path.folder.clone()),
            Observation::Folder(path) => Some(path.clone()),
            Observation::None => None,
        };
        for chain in created {
            let folder = FolderPath::new(chain.clone());
            if let Some(physical) = &physical_folder {
                if physical.starts_with(&folder) {
                    continue;
                }
            }
            if seen_folders.insert(folder.to_string()) {
                healing.actions.push(VaultAction::CreateFolder { path: folder });
            }
        }
    }

    /// Shared fan-out for section rename and move: rewrite every descendant
    /// leaf's filename from the post-mutation tree, trash each stale codex
    /// sitting at the new location under the old suffix, and record the
    /// section renames for regeneration.
    fn relocate_section(
        &self,
        tree: &Tree,
        old_chain: &[String],
        new_chain: &[String],
        observed: &Observation,
        healing: &mut Healing,
    ) -> Result<(), NamingError> {
        match observed {
            Observation::Folder(physical) if physical.segments != new_chain => {
                healing.actions.push(VaultAction::RenameFolder {
                    from: physical.clone(),
                    to: FolderPath::new(new_chain.to_vec()),
                });
            }
            Observation::Folder(_) => {}
            _ => {
                healing.actions.push(VaultAction::RenameFolder {
                    from: FolderPath::new(old_chain.to_vec()),
                    to: FolderPath::new(new_chain.to_vec()),
                });
            }
        }

        for leaf in tree.leaves_under(new_chain) {
            let canonical = self.leaf_path(&leaf.chain, locator_ext(&leaf))?;
            let former = remap_chain(&leaf.chain, new_chain, old_chain);
            let stale_stem = self.naming.leaf_basename(&former)?;
            let physical = FilePath::new(
                FolderPath::new(leaf.parent_chain().to_vec()),
                &stale_stem,
                locator_ext(&leaf),
            );
            if physical != canonical {
                healing.actions.push(VaultAction::RenameFile {
                    from: physical,
                    to: canonical,
                });
            }
        }

        for section in tree.sections_under(new_chain) {
            let former = remap_chain(&section, new_chain, old_chain);
            let stale_stem = self.naming.codex_basename(&former)?;
            let fresh_stem = self.naming.codex_basename(&section)?;
            if stale_stem != fresh_stem {
                healing.actions.push(VaultAction::TrashFile {
                    path: FilePath::new(
                        FolderPath::new(section.clone()),
                        &stale_stem,
                        &self.note_extension,
                    ),
                });
            }
            healing.impact.record_renamed(former, section);
        }
        Ok(())
    }

    fn leaf_path(&self, chain: &[String], extension: &str) -> Result<FilePath, NamingError> {
        let stem = self.naming.leaf_basename(chain)?;
        Ok(FilePath::new(
            FolderPath::new(chain[..chain.len() - 1].to_vec()),
            &stem,
            extension,
        ))
    }
}

fn locator_ext(locator: &crate::tree::Locator) -> &str {
    match &locator.target {
        crate::tree::TargetKind::Leaf { extension } => extension,
        crate::tree::TargetKind::Section => "",
    }
}

/// Replace the `new_prefix` portion of a chain with `old_prefix`.
fn remap_chain(chain: &[String], new_prefix: &[String], old_prefix: &[String]) -> Chain {
    let mut out = old_prefix.to_vec();
    out.extend(chain[new_prefix.len()..].iter().cloned());
    out
}

/// The deepest ancestor of `parent_chain` that survived pruning.
fn surviving_ancestor(parent_chain: &[String], removed: &[Chain]) -> Option<Chain> {
    let mut depth = parent_chain.len();
    while depth >= 1 {
        let candidate = &parent_chain[..depth];
        if !removed.iter().any(|chain| chain[..] == candidate[..]) {
            return Some(candidate.to_vec());
        }
        depth -= 1;
    }
    None
}

/// Walk up from `folder` to the deepest chain the tree actually tracks;
/// the root always qualifies.
fn nearest_tracked_ancestor(tree: &Tree, folder: &FolderPath) -> FolderPath {
    let segments = &folder.segments;
    if segments.is_empty() || segments[0] != tree.root_name() {
        return FolderPath::new(vec![tree.root_name().to_string()]);
    }
    let mut depth = segments.len();
    while depth > 1 {
        let chain = segments[..depth].to_vec();
        if tree
            .find(&crate::tree::Locator::section(chain))
            .is_some()
        {
            return FolderPath::new(segments[..depth].to_vec());
        }
        depth -= 1;
    }
    FolderPath::new(vec![tree.root_name().to_string()])
}
