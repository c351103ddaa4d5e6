//! Action dispatcher: turns a batch of physical operations into a
//! conflict-free, dependency-ordered execution plan.
//!
//! Planning runs in three passes: requirement closure (ensure every
//! ancestor folder an action needs will exist, unless a trash in the same
//! batch claims that exact path), keep-last collapse per target path
//! (content transforms are exempt and compose in arrival order), then a
//! topological sort over the structural dependencies. Execution is
//! sequential and partial-failure-tolerant: a failed operation is recorded
//! and the batch continues.

use crate::error::{DispatchFailure, VaultError};
use crate::events::FolderPath;
use crate::vault::{Vault, VaultAction};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};
use tracing::{debug, warn};

/// Execute a batch against the vault. Returns every recorded failure;
/// `Ok(())` means the whole batch landed.
pub async fn dispatch(
    vault: &dyn Vault,
    actions: Vec<VaultAction>,
) -> Result<(), Vec<DispatchFailure>> {
    if actions.is_empty() {
        return Ok(());
    }
    let closed = requirement_closure(vault, actions).await;
    let collapsed = collapse(closed);
    let ordered = order(collapsed);
    debug!(count = ordered.len(), "Dispatching batch");

    let mut failures = Vec::new();
    for action in ordered {
        if let Err(error) = execute(vault, &action).await {
            warn!(action = ?action, error = %error, "Vault operation failed; continuing batch");
            failures.push(DispatchFailure { action, error });
        }
    }
    if failures.is_empty() {
        Ok(())
    } else {
        Err(failures)
    }
}

/// Prepend placeholder actions for every missing prerequisite: folder
/// creates for absent ancestors, and an empty upsert for a content
/// transform whose file does not exist. A trash targeting the exact
/// ancestor path wins over ensure-exists.
async fn requirement_closure(vault: &dyn Vault, actions: Vec<VaultAction>) -> Vec<VaultAction> {
    let mut provided: HashSet<String> = actions
        .iter()
        .filter_map(|action| match action {
            VaultAction::CreateFolder { path } => Some(path.to_string()),
            VaultAction::RenameFolder { to, .. } => Some(to.to_string()),
            _ => None,
        })
        .collect();
    let trashed: HashSet<String> = actions
        .iter()
        .filter_map(|action| match action {
            VaultAction::TrashFolder { path } => Some(path.to_string()),
            _ => None,
        })
        .collect();

    let mut ensured = Vec::new();
    for action in &actions {
        for folder in action.required_folders() {
            for depth in 1..=folder.depth() {
                let ancestor = FolderPath::new(folder.segments[..depth].to_vec());
                let key = ancestor.to_string();
                if provided.contains(&key) || trashed.contains(&key) {
                    continue;
                }
                provided.insert(key);
                let exists = vault.folder_exists(&ancestor).await.unwrap_or(false);
                if !exists {
                    ensured.push(VaultAction::CreateFolder { path: ancestor });
                }
            }
        }
        if let VaultAction::ProcessFile { path, .. } = action {
            let exists = vault.file_exists(path).await.unwrap_or(false);
            if !exists {
                ensured.push(VaultAction::UpsertFile {
                    path: path.clone(),
                    content: None,
                });
            }
        }
    }
    ensured.extend(actions);
    ensured
}

/// Keep the last structural action per target path. `ProcessFile` actions
/// all survive, in arrival order, since transforms compose.
fn collapse(actions: Vec<VaultAction>) -> Vec<VaultAction> {
    let mut last: HashMap<String, usize> = HashMap::new();
    for (i, action) in actions.iter().enumerate() {
        if !matches!(action, VaultAction::ProcessFile { .. }) {
            last.insert(action.target_path(), i);
        }
    }
    actions
        .into_iter()
        .enumerate()
        .filter(|(i, action)| {
            matches!(action, VaultAction::ProcessFile { .. })
                || last.get(&action.target_path()) == Some(i)
        })
        .map(|(_, action)| action)
        .collect()
}

fn path_covers(folder: &str, path: &str) -> bool {
    path == folder || path.starts_with(&format!("{}/", folder))
}

/// Topologically order the batch: a folder create or rename-to-destination
/// precedes everything inside that destination; a trash of a vacated
/// source follows the rename that vacated it. Ties break shallower-first,
/// then by submission order.
fn order(actions: Vec<VaultAction>) -> Vec<VaultAction> {
    let n = actions.len();
    let mut edges: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut indegree = vec![0usize; n];

    for (u, action) in actions.iter().enumerate() {
        let provides_folder = match action {
            VaultAction::CreateFolder { path } => Some(path.to_string()),
            VaultAction::RenameFolder { to, .. } => Some(to.to_string()),
            _ => None,
        };
        let vacates = match action {
            VaultAction::RenameFolder { from, .. } => Some(from.to_string()),
            VaultAction::RenameFile { from, .. } => Some(from.to_string()),
            _ => None,
        };
        let file_dest = match action {
            VaultAction::RenameFile { to, .. } => Some(to.to_string()),
            _ => None,
        };

        for (v, other) in actions.iter().enumerate() {
            if u == v {
                continue;
            }
            let mut depends = false;
            if let Some(folder) = &provides_folder {
                depends = other.required_folders().iter().any(|required| {
                    (1..=required.depth()).any(|depth| {
                        FolderPath::new(required.segments[..depth].to_vec()).to_string() == *folder
                    })
                }) || other
                    .touched_paths()
                    .iter()
                    .any(|path| path != folder && path_covers(folder, path));
            }
            if !depends {
                if let Some(source) = &vacates {
                    depends = other.target_path() == *source;
                }
            }
            if !depends {
                if let Some(dest) = &file_dest {
                    depends = !matches!(other, VaultAction::RenameFile { .. })
                        && other.target_path() == *dest;
                }
            }
            if !depends {
                if let (
                    VaultAction::UpsertFile { path, .. },
                    VaultAction::ProcessFile { path: processed, .. },
                ) = (action, other)
                {
                    depends = path == processed;
                }
            }
            if !depends {
                // Work inside a folder lands before the rename or trash
                // that takes the folder away.
                let other_source = match other {
                    VaultAction::RenameFolder { from, .. } => Some(from.to_string()),
                    VaultAction::TrashFolder { path } => Some(path.to_string()),
                    _ => None,
                };
                if let Some(source) = &other_source {
                    depends = action
                        .touched_paths()
                        .iter()
                        .any(|path| path != source && path_covers(source, path));
                }
            }
            if depends {
                edges[u].push(v);
                indegree[v] += 1;
            }
        }
    }

    let priority = |i: usize| {
        let depth = actions[i].target_path().matches('/').count();
        Reverse((depth, i))
    };
    let mut ready: BinaryHeap<(Reverse<(usize, usize)>, usize)> = (0..n)
        .filter(|&i| indegree[i] == 0)
        .map(|i| (priority(i), i))
        .collect();

    let mut sorted = Vec::with_capacity(n);
    let mut placed = vec![false; n];
    while let Some((_, u)) = ready.pop() {
        placed[u] = true;
        sorted.push(u);
        for &v in &edges[u] {
            indegree[v] -= 1;
            if indegree[v] == 0 && !placed[v] {
                ready.push((priority(v), v));
            }
        }
    }
    if sorted.len() < n {
        warn!(
            remaining = n - sorted.len(),
            "Dependency cycle in dispatch batch; appending remainder in submission order"
        );
        for i in 0..n {
            if !placed[i] {
                sorted.push(i);
            }
        }
    }

    let mut by_index: Vec<Option<VaultAction>> = actions.into_iter().map(Some).collect();
    sorted
        .into_iter()
        .filter_map(|i| by_index[i].take())
        .collect()
}

async fn execute(vault: &dyn Vault, action: &VaultAction) -> Result<(), VaultError> {
    match action {
        VaultAction::CreateFolder { path } => match vault.create_folder(path).await {
            // Ensure-exists semantics.
            Err(VaultError::AlreadyExists(_)) => Ok(()),
            other => other,
        },
        VaultAction::RenameFolder { from, to } => vault.rename_folder(from, to).await,
        VaultAction::TrashFolder { path } => vault.trash_folder(path).await,
        VaultAction::UpsertFile { path, content } => {
            if vault.file_exists(path).await? {
                match content {
                    Some(content) => vault.modify_file(path, content).await,
                    None => Ok(()),
                }
            } else {
                vault.create_file(path, content.as_deref().unwrap_or("")).await
            }
        }
        VaultAction::RenameFile { from, to } => vault.rename_file(from, to).await,
        VaultAction::TrashFile { path } => vault.trash_file(path).await,
        VaultAction::ProcessFile { path, transform } => {
            let content = vault.read_file(path).await?;
            vault.modify_file(path, &transform(content)).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::FilePath;
    use crate::vault::MemoryVault;
    use std::sync::Arc;

    fn file(path: &str) -> FilePath {
        FilePath::parse(path).unwrap()
    }

    fn upsert(path: &str, content: &str) -> VaultAction {
        VaultAction::UpsertFile {
            path: file(path),
            content: Some(content.to_string()),
        }
    }

    #[tokio::test]
    async fn folder_create_runs_before_file_inside_it() {
        let vault = MemoryVault::new();
        vault.seed_folder("A");
        dispatch(
            &vault,
            vec![
                upsert("A/B/x.md", "content"),
                VaultAction::CreateFolder {
                    path: FolderPath::parse("A/B"),
                },
            ],
        )
        .await
        .unwrap();
        assert_eq!(
            vault.operations(),
            vec!["create_folder A/B".to_string(), "create_file A/B/x.md".to_string()]
        );
    }

    #[tokio::test]
    async fn closure_creates_missing_ancestors() {
        let vault = MemoryVault::new();
        dispatch(&vault, vec![upsert("A/B/x.md", "deep")]).await.unwrap();
        assert_eq!(
            vault.operations(),
            vec![
                "create_folder A".to_string(),
                "create_folder A/B".to_string(),
                "create_file A/B/x.md".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn trash_beats_ensure_exists() {
        let vault = MemoryVault::new();
        vault.seed_folder("A/B");
        let result = dispatch(
            &vault,
            vec![VaultAction::TrashFolder {
                path: FolderPath::parse("A/B"),
            }],
        )
        .await;
        assert!(result.is_ok());
        // The trashed path was never speculatively recreated.
        assert!(!vault
            .operations()
            .iter()
            .any(|op| op == "create_folder A/B"));
    }

    #[tokio::test]
    async fn rename_precedes_operations_at_destination() {
        let vault = MemoryVault::new();
        vault.seed_file("A/x.md", "body");
        dispatch(
            &vault,
            vec![
                VaultAction::ProcessFile {
                    path: file("A/y.md"),
                    transform: Arc::new(|content| content.to_uppercase()),
                },
                VaultAction::RenameFile {
                    from: file("A/x.md"),
                    to: file("A/y.md"),
                },
            ],
        )
        .await
        .unwrap();
        assert_eq!(
            vault.operations(),
            vec![
                "rename_file A/x.md -> A/y.md".to_string(),
                "modify_file A/y.md".to_string(),
            ]
        );
        assert_eq!(vault.read_file(&file("A/y.md")).await.unwrap(), "BODY");
    }

    #[tokio::test]
    async fn trash_follows_the_rename_that_vacates_its_target() {
        let vault = MemoryVault::new();
        vault.seed_file("A/x.md", "keep");
        // If the trash ran first it would destroy the file before the
        // rename could move it. Ordered after, it finds the path vacated
        // and fails harmlessly.
        let result = dispatch(
            &vault,
            vec![
                VaultAction::TrashFile { path: file("A/x.md") },
                VaultAction::RenameFile {
                    from: file("A/x.md"),
                    to: file("A/z.md"),
                },
            ],
        )
        .await;
        let failures = result.unwrap_err();
        assert_eq!(failures.len(), 1);
        assert!(matches!(failures[0].error, VaultError::NotFound(_)));
        assert_eq!(vault.read_file(&file("A/z.md")).await.unwrap(), "keep");
    }

    #[tokio::test]
    async fn file_leaves_a_folder_before_the_folder_is_trashed() {
        let vault = MemoryVault::new();
        vault.seed_file("L/a/x.md", "body");
        vault.seed_folder("L/b");
        dispatch(
            &vault,
            vec![
                VaultAction::TrashFolder {
                    path: FolderPath::parse("L/a"),
                },
                VaultAction::RenameFile {
                    from: file("L/a/x.md"),
                    to: file("L/b/x.md"),
                },
            ],
        )
        .await
        .unwrap();
        assert_eq!(vault.read_file(&file("L/b/x.md")).await.unwrap(), "body");
        assert!(!vault
            .folder_exists(&FolderPath::parse("L/a"))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn collapse_keeps_the_last_structural_action() {
        let vault = MemoryVault::new();
        vault.seed_folder("A");
        dispatch(
            &vault,
            vec![upsert("A/x.md", "first"), upsert("A/x.md", "second")],
        )
        .await
        .unwrap();
        assert_eq!(vault.read_file(&file("A/x.md")).await.unwrap(), "second");
        assert_eq!(vault.operations().len(), 1);
    }

    #[tokio::test]
    async fn transforms_compose_in_arrival_order() {
        let vault = MemoryVault::new();
        vault.seed_file("A/x.md", "a");
        dispatch(
            &vault,
            vec![
                VaultAction::ProcessFile {
                    path: file("A/x.md"),
                    transform: Arc::new(|content| format!("{}b", content)),
                },
                VaultAction::ProcessFile {
                    path: file("A/x.md"),
                    transform: Arc::new(|content| format!("{}c", content)),
                },
            ],
        )
        .await
        .unwrap();
        assert_eq!(vault.read_file(&file("A/x.md")).await.unwrap(), "abc");
    }

    #[tokio::test]
    async fn transform_on_missing_file_gets_a_placeholder() {
        let vault = MemoryVault::new();
        vault.seed_folder("A");
        dispatch(
            &vault,
            vec![VaultAction::ProcessFile {
                path: file("A/x.md"),
                transform: Arc::new(|content| format!("{}!", content)),
            }],
        )
        .await
        .unwrap();
        assert_eq!(vault.read_file(&file("A/x.md")).await.unwrap(), "!");
    }

    #[tokio::test]
    async fn failures_are_recorded_and_the_batch_continues() {
        let vault = MemoryVault::new();
        vault.seed_folder("A");
        let result = dispatch(
            &vault,
            vec![
                VaultAction::TrashFile { path: file("A/ghost.md") },
                upsert("A/x.md", "still lands"),
            ],
        )
        .await;
        let failures = result.unwrap_err();
        assert_eq!(failures.len(), 1);
        assert!(matches!(failures[0].error, VaultError::NotFound(_)));
        assert!(vault.file_exists(&file("A/x.md")).await.unwrap());
    }
}
