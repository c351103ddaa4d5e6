//! Tree-Action Translator.
//!
//! Maps each scoped, reduced event onto tree mutations, inferring
//! rename-vs-move intent from whether the basename's encoded suffix still
//! matches the physical folder chain. Create policy depends on depth: at
//! depth 0 or 1 the freshly typed filename is taken as authoritative
//! ("name is king"); at depth 2+ the physical folder wins ("path is
//! king") since deep appearances are usually drags.

use crate::config::LibraryConfig;
use crate::events::{FilePath, FolderPath, Scope, ScopedEvent, VaultEvent};
use crate::naming::{DecodedKind, Naming};
use crate::tree::{Chain, Locator, Status, TreeAction};
use tracing::debug;

/// What one scoped event asks of the library.
#[derive(Debug, Clone, PartialEq)]
pub enum Translation {
    /// Mutations to apply in order.
    Tree(Vec<TreeAction>),
    /// The basename did not decode; relocate the file out of the way.
    /// The path is vault-absolute.
    Quarantine { path: FilePath },
    /// Nothing to do (outside scope, codex file, untracked subfolder).
    Skip,
}

pub struct Translator {
    naming: Naming,
    root: FolderPath,
    untracked_folder: String,
}

impl Translator {
    pub fn new(config: &LibraryConfig) -> Self {
        Self {
            naming: Naming::from_config(config),
            root: FolderPath::parse(&config.library_root),
            untracked_folder: config.untracked_folder.clone(),
        }
    }

    pub fn translate(&self, scoped: &ScopedEvent) -> Translation {
        match scoped.scope {
            Scope::Outside => Translation::Skip,
            Scope::Inside => self.translate_inside(&scoped.event),
            Scope::InsideToOutside => self.translate_leaving(&scoped.event),
            Scope::OutsideToInside => self.translate_entering(&scoped.event),
        }
    }

    fn translate_inside(&self, event: &VaultEvent) -> Translation {
        match event {
            VaultEvent::FileCreated { path } => self.file_appeared(path),
            VaultEvent::FileDeleted { path } => self.file_removed(path),
            VaultEvent::FileRenamed { from, to } => self.file_renamed(from, to),
            VaultEvent::FolderCreated { path } => self.folder_appeared(path),
            VaultEvent::FolderDeleted { path } => self.folder_removed(path),
            VaultEvent::FolderRenamed { from, to } => self.folder_renamed(from, to),
        }
    }

    /// A rename that leaves the library is a deletion of the tracked node.
    fn translate_leaving(&self, event: &VaultEvent) -> Translation {
        match event {
            VaultEvent::FileRenamed { from, .. } => self.file_removed(from),
            VaultEvent::FolderRenamed { from, .. } => Translation::Tree(vec![TreeAction::Delete {
                locator: Locator::section(self.section_chain(from)),
            }]),
            _ => Translation::Skip,
        }
    }

    /// A rename that enters the library is a creation at its destination.
    fn translate_entering(&self, event: &VaultEvent) -> Translation {
        match event {
            VaultEvent::FileRenamed { to, .. } => self.file_appeared(to),
            VaultEvent::FolderRenamed { to, .. } => self.folder_appeared(to),
            _ => Translation::Skip,
        }
    }

    fn file_appeared(&self, path: &FilePath) -> Translation {
        if self.in_untracked(&path.folder) {
            return Translation::Skip;
        }
        let Some(decoded) = self.naming.decode_basename(&path.stem) else {
            return self.quarantine(path);
        };
        if decoded.kind == DecodedKind::Codex {
            return Translation::Skip;
        }

        // Depth 0/1: name is king. Deeper: path is king.
        let chain = if path.folder.depth() <= 1 {
            let mut chain = self.root.segments.clone();
            chain.extend(decoded.ancestors.iter().cloned());
            chain.push(decoded.core.clone());
            chain
        } else {
            self.leaf_chain(&path.folder, &decoded.core)
        };
        debug!(path = %path, chain = %chain.join("/"), "Translating file appearance");
        Translation::Tree(vec![TreeAction::Create {
            locator: Locator::leaf(chain, &path.extension),
            status: Status::Unknown,
        }])
    }

    fn file_removed(&self, path: &FilePath) -> Translation {
        if self.in_untracked(&path.folder) {
            return Translation::Skip;
        }
        let Some(decoded) = self.naming.decode_basename(&path.stem) else {
            // Never tracked; nothing to delete.
            return Translation::Skip;
        };
        if decoded.kind == DecodedKind::Codex {
            return Translation::Skip;
        }
        Translation::Tree(vec![TreeAction::Delete {
            locator: Locator::leaf(self.leaf_chain(&path.folder, &decoded.core), &path.extension),
        }])
    }

    fn file_renamed(&self, from: &FilePath, to: &FilePath) -> Translation {
        if self.in_untracked(&to.folder) {
            return self.file_removed(from);
        }
        let to_decoded = match self.naming.decode_basename(&to.stem) {
            Some(decoded) => decoded,
            None => return self.quarantine(to),
        };
        if to_decoded.kind == DecodedKind::Codex {
            return Translation::Skip;
        }
        let Some(from_decoded) = self.naming.decode_basename(&from.stem) else {
            // The source was never tracked; treat as an appearance.
            return self.file_appeared(to);
        };
        if from_decoded.kind == DecodedKind::Codex {
            return self.file_appeared(to);
        }

        let locator = Locator::leaf(
            self.leaf_chain(&from.folder, &from_decoded.core),
            &from.extension,
        );
        let mut actions = Vec::new();

        if from.folder == to.folder {
            if to_decoded.ancestors == from.folder.segments {
                // Suffix still matches the physical chain: pure rename.
                if from_decoded.core != to_decoded.core {
                    actions.push(TreeAction::Rename {
                        locator,
                        new_name: to_decoded.core.clone(),
                    });
                }
            } else {
                // Suffix drifted: the decoded chain is the intended home.
                let mut new_parent = self.root.segments.clone();
                new_parent.extend(to_decoded.ancestors.iter().cloned());
                actions.push(TreeAction::Move {
                    locator: locator.clone(),
                    new_parent: new_parent.clone(),
                });
                if from_decoded.core != to_decoded.core {
                    let mut moved_chain = new_parent;
                    moved_chain.push(from_decoded.core.clone());
                    actions.push(TreeAction::Rename {
                        locator: Locator::leaf(moved_chain, &from.extension),
                        new_name: to_decoded.core.clone(),
                    });
                }
            }
        } else {
            // Physically relocated: the new folder is the intended home.
            let new_parent = self.section_chain(&to.folder);
            actions.push(TreeAction::Move {
                locator: locator.clone(),
                new_parent: new_parent.clone(),
            });
            if from_decoded.core != to_decoded.core {
                let mut moved_chain = new_parent;
                moved_chain.push(from_decoded.core.clone());
                actions.push(TreeAction::Rename {
                    locator: Locator::leaf(moved_chain, &from.extension),
                    new_name: to_decoded.core.clone(),
                });
            }
        }

        if actions.is_empty() {
            Translation::Skip
        } else {
            Translation::Tree(actions)
        }
    }

    fn folder_appeared(&self, path: &FolderPath) -> Translation {
        if path.segments.is_empty() || self.in_untracked(path) {
            return Translation::Skip;
        }
        Translation::Tree(vec![TreeAction::Create {
            locator: Locator::section(self.section_chain(path)),
            status: Status::Unknown,
        }])
    }

    fn folder_removed(&self, path: &FolderPath) -> Translation {
        if path.segments.is_empty() || self.in_untracked(path) {
            return Translation::Skip;
        }
        Translation::Tree(vec![TreeAction::Delete {
            locator: Locator::section(self.section_chain(path)),
        }])
    }

    fn folder_renamed(&self, from: &FolderPath, to: &FolderPath) -> Translation {
        if from.segments.is_empty() || to.segments.is_empty() {
            return Translation::Skip;
        }
        if self.in_untracked(to) {
            return self.folder_removed(from);
        }
        let locator = Locator::section(self.section_chain(from));
        let same_parent = from.parent() == to.parent();
        let same_name = from.name() == to.name();
        let mut actions = Vec::new();

        if !same_parent {
            let new_parent = match to.parent() {
                Some(parent) => self.section_chain_of(&parent),
                None => self.root.segments.clone(),
            };
            actions.push(TreeAction::Move {
                locator: locator.clone(),
                new_parent: new_parent.clone(),
            });
            if !same_name {
                let mut moved_chain = new_parent;
                moved_chain.push(from.name().unwrap_or_default().to_string());
                actions.push(TreeAction::Rename {
                    locator: Locator::section(moved_chain),
                    new_name: to.name().unwrap_or_default().to_string(),
                });
            }
        } else if !same_name {
            actions.push(TreeAction::Rename {
                locator,
                new_name: to.name().unwrap_or_default().to_string(),
            });
        }

        if actions.is_empty() {
            Translation::Skip
        } else {
            Translation::Tree(actions)
        }
    }

    fn quarantine(&self, path: &FilePath) -> Translation {
        Translation::Quarantine {
            path: path.with_folder(path.folder.prepend(&self.root)),
        }
    }

    fn in_untracked(&self, folder: &FolderPath) -> bool {
        folder
            .segments
            .iter()
            .any(|segment| *segment == self.untracked_folder)
    }

    /// Full root-inclusive chain of a leaf located in a library-relative
    /// physical folder.
    fn leaf_chain(&self, folder: &FolderPath, core: &str) -> Chain {
        let mut chain = self.section_chain(folder);
        chain.push(core.to_string());
        chain
    }

    /// Full root-inclusive chain of a library-relative physical folder.
    fn section_chain(&self, folder: &FolderPath) -> Chain {
        self.section_chain_of(folder)
    }

    fn section_chain_of(&self, folder: &FolderPath) -> Chain {
        let mut chain = self.root.segments.clone();
        chain.extend(folder.segments.iter().cloned());
        chain
    }
}
