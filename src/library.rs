//! Library facade: the full event-to-healing pipeline behind one type.
//!
//! `Library` owns the derived tree plus every pipeline stage. A burst of
//! raw vault events flows through suppression, normalization, scoping,
//! translation, and healing, then codex regeneration, and finally leaves
//! as one dispatched action batch. All tree work happens synchronously
//! under the write lock; vault I/O only starts after the lock is dropped.

use crate::codex::{codex_path, render_codex, CodexImpact};
use crate::config::LibraryConfig;
use crate::error::LibraryError;
use crate::events::{library_scope, normalize_burst, FolderPath, VaultEvent};
use crate::heal::{Healer, Observation};
use crate::naming::Naming;
use crate::queue::ActionQueue;
use crate::scan::{scan_library, ScanReport};
use crate::tracker::SelfEventTracker;
use crate::translate::{Translation, Translator};
use crate::tree::{Locator, Tree, TreeAction};
use crate::vault::{Vault, VaultAction};
use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info, warn};

/// What one burst amounted to after the pipeline ran.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BurstSummary {
    /// Raw events received.
    pub events: usize,
    /// Events swallowed as echoes of our own writes.
    pub suppressed: usize,
    /// Root events left after normalization.
    pub roots: usize,
    /// Undecodable files penned under the untracked folder.
    pub quarantined: usize,
    /// Vault actions dispatched.
    pub actions: usize,
}

pub struct Library {
    config: LibraryConfig,
    naming: Naming,
    root: FolderPath,
    vault: Arc<dyn Vault>,
    tracker: Arc<SelfEventTracker>,
    queue: ActionQueue,
    translator: Translator,
    healer: Healer,
    tree: RwLock<Option<Tree>>,
}

impl Library {
    pub fn new(vault: Arc<dyn Vault>, config: LibraryConfig) -> Self {
        let tracker = Arc::new(SelfEventTracker::from_config(&config));
        let queue = ActionQueue::new(vault.clone(), tracker.clone(), &config);
        Self {
            naming: Naming::from_config(&config),
            root: FolderPath::parse(&config.library_root),
            translator: Translator::new(&config),
            healer: Healer::new(&config),
            vault,
            tracker,
            queue,
            tree: RwLock::new(None),
            config,
        }
    }

    pub fn config(&self) -> &LibraryConfig {
        &self.config
    }

    /// The raw change-event stream of the underlying vault.
    pub fn subscribe_raw(&self) -> Result<UnboundedReceiver<VaultEvent>, LibraryError> {
        Ok(self.vault.subscribe()?)
    }

    /// Rebuild the tree from the vault's physical truth. Must run before
    /// any burst or API mutation.
    pub async fn init_scan(&self) -> Result<ScanReport, LibraryError> {
        let (tree, report) = scan_library(self.vault.as_ref(), &self.config).await?;
        *self.tree.write() = Some(tree);
        Ok(report)
    }

    /// Run one burst of raw vault events through the full pipeline and
    /// dispatch the resulting action batch.
    pub async fn handle_burst(&self, events: Vec<VaultEvent>) -> Result<BurstSummary, LibraryError> {
        let mut summary = BurstSummary {
            events: events.len(),
            ..BurstSummary::default()
        };

        let kept: Vec<VaultEvent> = events
            .into_iter()
            .filter(|event| {
                let suppress = self.tracker.should_suppress(event);
                if suppress {
                    summary.suppressed += 1;
                }
                !suppress
            })
            .collect();
        let reduced = normalize_burst(kept);
        summary.roots = reduced.roots.len();
        if reduced.roots.is_empty() {
            return Ok(summary);
        }

        let (actions, deferred_trash) = {
            let mut guard = self.tree.write();
            let tree = guard.as_mut().ok_or(LibraryError::TreeNotInitialized)?;

            let mut actions: Vec<VaultAction> = Vec::new();
            let mut impact = CodexImpact::default();
            let mut seen_folders = HashSet::new();

            for event in &reduced.roots {
                let scoped = library_scope(event, &self.root);
                let observed = observation_for(event);
                match self.translator.translate(&scoped) {
                    Translation::Skip => continue,
                    Translation::Quarantine { path } => {
                        debug!(path = %path, "Quarantining undecodable file");
                        actions.extend(self.healer.quarantine(tree, &path, &mut seen_folders));
                        summary.quarantined += 1;
                    }
                    Translation::Tree(tree_actions) => {
                        let healing = match tree_actions.as_slice() {
                            // A collapsed rename chain can move and rename
                            // in one event; heal it as a single relocation.
                            [TreeAction::Move { locator, new_parent }, TreeAction::Rename { new_name, .. }] => {
                                self.healer.heal_relocation(
                                    tree,
                                    locator,
                                    new_parent,
                                    new_name,
                                    observed,
                                    &mut seen_folders,
                                )?
                            }
                            _ => {
                                let mut merged = crate::heal::Healing::default();
                                for action in &tree_actions {
                                    let healing = self.healer.heal(
                                        tree,
                                        action,
                                        observed.clone(),
                                        &mut seen_folders,
                                    )?;
                                    merged.actions.extend(healing.actions);
                                    merged.impact.merge(healing.impact);
                                }
                                merged
                            }
                        };
                        actions.extend(healing.actions);
                        impact.merge(healing.impact);
                    }
                }
            }

            let deferred = self.codex_actions(tree, &impact, &mut actions)?;
            (actions, deferred)
        };

        let actions = self.confirm_deferred_trash(actions, deferred_trash).await?;
        summary.actions = actions.len();
        info!(
            events = summary.events,
            suppressed = summary.suppressed,
            roots = summary.roots,
            quarantined = summary.quarantined,
            actions = summary.actions,
            "Handled event burst"
        );
        self.submit(actions).await?;
        Ok(summary)
    }

    /// Submit a batch, discounting benign failures: a trash whose target
    /// is already gone has achieved its goal.
    async fn submit(&self, actions: Vec<VaultAction>) -> Result<(), LibraryError> {
        let Err(failures) = self.queue.submit(actions).await else {
            return Ok(());
        };
        let real: Vec<_> = failures
            .into_iter()
            .filter(|failure| {
                let benign = matches!(
                    failure.action,
                    VaultAction::TrashFile { .. } | VaultAction::TrashFolder { .. }
                ) && matches!(failure.error, crate::error::VaultError::NotFound(_));
                if benign {
                    warn!(action = ?failure.action, "Trash target already gone; treating as done");
                }
                !benign
            })
            .collect();
        if real.is_empty() {
            Ok(())
        } else {
            Err(LibraryError::Dispatch(real))
        }
    }

    /// Apply one tree mutation from the API side. The healer produces the
    /// physical change, so no observation exists yet.
    pub async fn apply_action(&self, action: &TreeAction) -> Result<(), LibraryError> {
        let (actions, deferred_trash) = {
            let mut guard = self.tree.write();
            let tree = guard.as_mut().ok_or(LibraryError::TreeNotInitialized)?;
            let mut seen_folders = HashSet::new();
            let healing = self
                .healer
                .heal(tree, action, Observation::None, &mut seen_folders)?;
            let mut actions = healing.actions;
            let deferred = self.codex_actions(tree, &healing.impact, &mut actions)?;
            (actions, deferred)
        };
        let actions = self.confirm_deferred_trash(actions, deferred_trash).await?;
        self.submit(actions).await
    }

    /// Rename drifted files found by a scan back to their canonical
    /// basenames, and pen the undecodables.
    pub async fn heal_drift(&self, report: &ScanReport) -> Result<(), LibraryError> {
        let (actions, deferred_trash) = {
            let guard = self.tree.read();
            let tree = guard.as_ref().ok_or(LibraryError::TreeNotInitialized)?;

            let mut actions: Vec<VaultAction> = Vec::new();
            let mut impact = CodexImpact::default();
            let mut seen_folders = HashSet::new();
            for (observed, canonical) in &report.drifted {
                actions.push(VaultAction::RenameFile {
                    from: observed.clone(),
                    to: canonical.clone(),
                });
                impact.record_created(canonical.folder.segments.clone());
            }
            for path in &report.undecodable {
                actions.extend(self.healer.quarantine(tree, path, &mut seen_folders));
            }
            let deferred = self.codex_actions(tree, &impact, &mut actions)?;
            (actions, deferred)
        };
        let actions = self.confirm_deferred_trash(actions, deferred_trash).await?;
        self.submit(actions).await
    }

    /// Regenerate every section's codex from the current tree, the root
    /// included.
    pub async fn rebuild_codexes(&self) -> Result<usize, LibraryError> {
        let actions = {
            let guard = self.tree.read();
            let tree = guard.as_ref().ok_or(LibraryError::TreeNotInitialized)?;
            let mut actions = Vec::new();
            for chain in tree.sections_under(&self.root.segments) {
                let Some(children) = tree.section_children(&chain) else {
                    continue;
                };
                actions.push(VaultAction::UpsertFile {
                    path: codex_path(&self.naming, &self.config, &chain)?,
                    content: Some(render_codex(&self.naming, &chain, &children)),
                });
            }
            actions
        };
        let count = actions.len();
        self.submit(actions).await?;
        Ok(count)
    }

    pub fn find_by_core_name(&self, core: &str) -> Result<Vec<Locator>, LibraryError> {
        let guard = self.tree.read();
        let tree = guard.as_ref().ok_or(LibraryError::TreeNotInitialized)?;
        Ok(tree.find_by_core_name(core))
    }

    /// (sections, leaves) of the current tree.
    pub fn counts(&self) -> Result<(usize, usize), LibraryError> {
        let guard = self.tree.read();
        let tree = guard.as_ref().ok_or(LibraryError::TreeNotInitialized)?;
        Ok(tree.counts())
    }

    /// Turn a merged codex impact into regeneration actions. Sections
    /// still in the tree get their codex re-rendered; deleted sections
    /// whose folder survives are returned for an existence check, since
    /// an event-driven delete takes the codex with it.
    fn codex_actions(
        &self,
        tree: &Tree,
        impact: &CodexImpact,
        actions: &mut Vec<VaultAction>,
    ) -> Result<Vec<VaultAction>, LibraryError> {
        let mut regenerate: Vec<&Vec<String>> = impact.created.iter().collect();
        regenerate.extend(impact.renamed.iter().map(|(_, new)| new));

        let mut emitted = HashSet::new();
        for chain in regenerate {
            if !emitted.insert(chain.clone()) {
                continue;
            }
            let Some(children) = tree.section_children(chain) else {
                continue;
            };
            actions.push(VaultAction::UpsertFile {
                path: codex_path(&self.naming, &self.config, chain)?,
                content: Some(render_codex(&self.naming, chain, &children)),
            });
        }

        let mut deferred = Vec::new();
        for chain in &impact.deleted {
            let folder = FolderPath::new(chain.clone());
            let trashed_with_folder = actions.iter().any(|action| {
                matches!(action, VaultAction::TrashFolder { path } if folder.starts_with(path))
            });
            if !trashed_with_folder {
                deferred.push(VaultAction::TrashFile {
                    path: codex_path(&self.naming, &self.config, chain)?,
                });
            }
        }
        Ok(deferred)
    }

    /// Append deferred codex trashes whose target still physically exists.
    async fn confirm_deferred_trash(
        &self,
        mut actions: Vec<VaultAction>,
        deferred: Vec<VaultAction>,
    ) -> Result<Vec<VaultAction>, LibraryError> {
        for action in deferred {
            let keep = match &action {
                VaultAction::TrashFile { path } => self.vault.file_exists(path).await?,
                _ => true,
            };
            if keep {
                actions.push(action);
            }
        }
        Ok(actions)
    }
}

/// The physical state an event proves. For deletions the former path is a
/// marker meaning "event-driven"; the healer only checks it is not `None`.
fn observation_for(event: &VaultEvent) -> Observation {
    match event {
        VaultEvent::FileCreated { path } | VaultEvent::FileDeleted { path } => {
            Observation::File(path.clone())
        }
        VaultEvent::FileRenamed { to, .. } => Observation::File(to.clone()),
        VaultEvent::FolderCreated { path } | VaultEvent::FolderDeleted { path } => {
            Observation::Folder(path.clone())
        }
        VaultEvent::FolderRenamed { to, .. } => Observation::Folder(to.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::FilePath;
    use crate::vault::MemoryVault;

    fn file(path: &str) -> FilePath {
        FilePath::parse(path).unwrap()
    }

    async fn library_over(vault: Arc<MemoryVault>) -> Library {
        let library = Library::new(vault, LibraryConfig::default());
        library.init_scan().await.unwrap();
        library
    }

    #[tokio::test]
    async fn burst_before_scan_is_rejected() {
        let vault = Arc::new(MemoryVault::new());
        let library = Library::new(vault, LibraryConfig::default());
        let result = library
            .handle_burst(vec![VaultEvent::FileCreated {
                path: file("Library/a.md"),
            }])
            .await;
        assert!(matches!(result, Err(LibraryError::TreeNotInitialized)));
    }

    #[tokio::test]
    async fn created_file_without_suffix_is_renamed_into_place() {
        let vault = Arc::new(MemoryVault::new());
        vault.seed_file("Library/recipes/soup/Note-soup-recipes.md", "");
        let library = library_over(vault.clone()).await;

        // The user drops a bare "Other.md" into the soup folder.
        vault
            .create_file(&file("Library/recipes/soup/Other.md"), "body")
            .await
            .unwrap();
        let summary = library
            .handle_burst(vec![VaultEvent::FileCreated {
                path: file("Library/recipes/soup/Other.md"),
            }])
            .await
            .unwrap();

        assert_eq!(summary.roots, 1);
        assert!(vault
            .file_exists(&file("Library/recipes/soup/Other-soup-recipes.md"))
            .await
            .unwrap());
        assert!(!vault
            .file_exists(&file("Library/recipes/soup/Other.md"))
            .await
            .unwrap());
        // The section's codex was regenerated with the new member.
        let codex = vault
            .read_file(&file("Library/recipes/soup/__-soup-recipes.md"))
            .await
            .unwrap();
        assert!(codex.contains("Other"));
    }

    #[tokio::test]
    async fn collapsed_relocation_heals_as_one_unit() {
        let vault = Arc::new(MemoryVault::new());
        vault.seed_file("Library/soup/Note-soup.md", "broth");
        let library = library_over(vault.clone()).await;

        // Mimic the user's drag-and-retype before the event arrives.
        vault
            .create_folder(&FolderPath::parse("Library/stew"))
            .await
            .unwrap();
        vault
            .rename_file(
                &file("Library/soup/Note-soup.md"),
                &file("Library/stew/Recipe-stew.md"),
            )
            .await
            .unwrap();

        library
            .handle_burst(vec![VaultEvent::FileRenamed {
                from: file("Library/soup/Note-soup.md"),
                to: file("Library/stew/Recipe-stew.md"),
            }])
            .await
            .unwrap();

        assert_eq!(
            library.find_by_core_name("Recipe").unwrap()[0].chain,
            vec!["Library".to_string(), "stew".to_string(), "Recipe".to_string()]
        );
        // The physical layout already matched; only the emptied source
        // folder and the codexes needed work.
        assert!(!vault
            .folder_exists(&FolderPath::parse("Library/soup"))
            .await
            .unwrap());
        assert!(vault
            .file_exists(&file("Library/stew/__-stew.md"))
            .await
            .unwrap());
        let content = vault
            .read_file(&file("Library/stew/Recipe-stew.md"))
            .await
            .unwrap();
        assert_eq!(content, "broth");
    }

    #[tokio::test]
    async fn echoed_self_events_are_suppressed() {
        let vault = Arc::new(MemoryVault::new());
        vault.seed_folder("Library");
        let library = library_over(vault.clone()).await;

        library
            .apply_action(&TreeAction::Create {
                locator: Locator::leaf(
                    vec!["Library".to_string(), "Inbox".to_string()],
                    "md",
                ),
                status: crate::tree::Status::Unknown,
            })
            .await
            .unwrap();

        // The vault echoes our own write back; the burst must swallow it.
        let summary = library
            .handle_burst(vec![VaultEvent::FileCreated {
                path: file("Library/Inbox.md"),
            }])
            .await
            .unwrap();
        assert_eq!(summary.suppressed, 1);
        assert_eq!(summary.actions, 0);
    }

    #[tokio::test]
    async fn event_driven_folder_delete_emits_no_physical_work() {
        let vault = Arc::new(MemoryVault::new());
        vault.seed_file("Library/soup/Note-soup.md", "");
        let library = library_over(vault.clone()).await;

        // The user already deleted the folder; only the tree catches up.
        vault
            .trash_folder(&FolderPath::parse("Library/soup"))
            .await
            .unwrap();
        vault.clear_operations();
        let summary = library
            .handle_burst(vec![VaultEvent::FolderDeleted {
                path: FolderPath::parse("Library/soup"),
            }])
            .await
            .unwrap();

        // The tree catches up; the only physical work is the root codex
        // losing its reference to the gone section.
        assert_eq!(summary.actions, 1);
        assert!(library.find_by_core_name("Note").unwrap().is_empty());
        assert_eq!(vault.operations(), vec!["create_file Library/__.md".to_string()]);
    }

    #[tokio::test]
    async fn undecodable_create_is_quarantined() {
        let vault = Arc::new(MemoryVault::new());
        vault.seed_file("Library/soup/Note-soup.md", "");
        let library = library_over(vault.clone()).await;

        vault
            .create_file(&file("Library/soup/-broken.md"), "junk")
            .await
            .unwrap();
        let summary = library
            .handle_burst(vec![VaultEvent::FileCreated {
                path: file("Library/soup/-broken.md"),
            }])
            .await
            .unwrap();

        assert_eq!(summary.quarantined, 1);
        assert!(vault
            .file_exists(&file("Library/soup/_untracked/-broken.md"))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn rebuild_codexes_covers_every_section() {
        let vault = Arc::new(MemoryVault::new());
        vault.seed_file("Library/recipes/soup/Note-soup-recipes.md", "");
        let library = library_over(vault.clone()).await;

        let count = library.rebuild_codexes().await.unwrap();
        assert_eq!(count, 3); // root, recipes, soup
        assert!(vault.file_exists(&file("Library/__.md")).await.unwrap());
        assert!(vault
            .file_exists(&file("Library/recipes/__-recipes.md"))
            .await
            .unwrap());
        assert!(vault
            .file_exists(&file("Library/recipes/soup/__-soup-recipes.md"))
            .await
            .unwrap());
    }
}
