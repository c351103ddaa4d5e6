//! Full library scan: rebuild the tree from the vault's physical truth.
//!
//! The tree is derived state, so a scan is always authoritative. Files are
//! placed path-is-king: the physical folder decides the chain, and a
//! basename whose suffix disagrees is reported as drifted so the caller
//! can heal it.

use crate::config::LibraryConfig;
use crate::error::LibraryError;
use crate::events::{FilePath, FolderPath};
use crate::naming::{DecodedKind, Naming};
use crate::tree::{Locator, Status, Tree, TreeAction};
use crate::vault::{Vault, VaultEntry};
use tracing::{info, warn};

/// What a full scan found.
#[derive(Debug, Default)]
pub struct ScanReport {
    pub sections: usize,
    pub leaves: usize,
    /// Files whose basename did not decode, vault-absolute.
    pub undecodable: Vec<FilePath>,
    /// Files whose observed path differs from canonical: (observed,
    /// canonical), both vault-absolute.
    pub drifted: Vec<(FilePath, FilePath)>,
}

/// Walk the vault under the library root and rebuild the tree. Creates
/// the root folder if it is missing.
pub async fn scan_library(
    vault: &dyn Vault,
    config: &LibraryConfig,
) -> Result<(Tree, ScanReport), LibraryError> {
    let naming = Naming::from_config(config);
    let root = FolderPath::parse(&config.library_root);
    if !vault.folder_exists(&root).await? {
        vault.create_folder(&root).await?;
    }

    let mut tree = Tree::new(&config.library_root);
    let mut report = ScanReport::default();
    let mut stack = vec![root.clone()];

    while let Some(folder) = stack.pop() {
        if folder.depth() > config.max_depth {
            warn!(folder = %folder, max_depth = config.max_depth, "Skipping folder beyond depth limit");
            continue;
        }
        for entry in vault.list_children(&folder).await? {
            match entry {
                VaultEntry::Folder(path) => {
                    if path.name() == Some(config.untracked_folder.as_str()) {
                        continue;
                    }
                    tree.apply(&TreeAction::Create {
                        locator: Locator::section(path.segments.clone()),
                        status: Status::Unknown,
                    });
                    stack.push(path);
                }
                VaultEntry::File(path) => {
                    let Some(decoded) = naming.decode_basename(&path.stem) else {
                        report.undecodable.push(path);
                        continue;
                    };
                    if decoded.kind == DecodedKind::Codex {
                        continue;
                    }
                    let mut chain = folder.segments.clone();
                    chain.push(decoded.core.clone());
                    tree.apply(&TreeAction::Create {
                        locator: Locator::leaf(chain.clone(), &path.extension),
                        status: Status::Unknown,
                    });
                    let canonical_stem = naming.leaf_basename(&chain)?;
                    if canonical_stem != path.stem {
                        let canonical = path.with_stem(&canonical_stem);
                        report.drifted.push((path, canonical));
                    }
                }
            }
        }
    }

    let (sections, leaves) = tree.counts();
    report.sections = sections;
    report.leaves = leaves;
    info!(
        sections,
        leaves,
        undecodable = report.undecodable.len(),
        drifted = report.drifted.len(),
        "Library scan complete"
    );
    Ok((tree, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vault::MemoryVault;

    #[tokio::test]
    async fn scan_rebuilds_tree_from_layout() {
        let vault = MemoryVault::new();
        vault.seed_file("Library/recipes/soup/Note-soup-recipes.md", "");
        vault.seed_file("Library/recipes/soup/__-soup-recipes.md", "# soup");
        vault.seed_file("Library/Inbox.md", "");
        let config = LibraryConfig::default();

        let (tree, report) = scan_library(&vault, &config).await.unwrap();
        assert_eq!((report.sections, report.leaves), (2, 2));
        assert!(tree
            .find(&Locator::leaf(
                vec!["Library".into(), "recipes".into(), "soup".into(), "Note".into()],
                "md"
            ))
            .is_some());
        assert!(report.drifted.is_empty());
        assert!(report.undecodable.is_empty());
    }

    #[tokio::test]
    async fn scan_reports_drift_and_undecodables() {
        let vault = MemoryVault::new();
        vault.seed_file("Library/recipes/Note.md", "");
        vault.seed_file("Library/recipes/-broken.md", "");
        let config = LibraryConfig::default();

        let (_, report) = scan_library(&vault, &config).await.unwrap();
        assert_eq!(report.drifted.len(), 1);
        let (observed, canonical) = &report.drifted[0];
        assert_eq!(observed.to_string(), "Library/recipes/Note.md");
        assert_eq!(canonical.to_string(), "Library/recipes/Note-recipes.md");
        assert_eq!(report.undecodable.len(), 1);
    }

    #[tokio::test]
    async fn scan_creates_a_missing_root() {
        let vault = MemoryVault::new();
        let config = LibraryConfig::default();
        let (tree, report) = scan_library(&vault, &config).await.unwrap();
        assert_eq!((report.sections, report.leaves), (0, 0));
        assert_eq!(tree.root_name(), "Library");
        assert!(vault
            .folder_exists(&FolderPath::parse("Library"))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn scan_skips_the_untracked_pen() {
        let vault = MemoryVault::new();
        vault.seed_file("Library/_untracked/junk.md", "");
        let config = LibraryConfig::default();
        let (_, report) = scan_library(&vault, &config).await.unwrap();
        assert_eq!((report.sections, report.leaves), (0, 0));
    }
}
