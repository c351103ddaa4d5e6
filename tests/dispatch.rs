//! Dispatcher ordering over the in-memory vault's strict
//! parent-must-exist semantics.

use stacks::dispatch::dispatch;
use stacks::events::{FilePath, FolderPath};
use stacks::vault::{MemoryVault, Vault, VaultAction};
use std::sync::Arc;

fn file(path: &str) -> FilePath {
    FilePath::parse(path).unwrap()
}

#[tokio::test]
async fn folder_creation_precedes_the_file_inside_it() {
    let vault = Arc::new(MemoryVault::new());
    vault.seed_folder("Library");

    // Submitted file-first; the dependency graph must flip the order.
    dispatch(
        vault.as_ref(),
        vec![
            VaultAction::UpsertFile {
                path: file("Library/A/B/x.md"),
                content: Some("body".to_string()),
            },
            VaultAction::CreateFolder {
                path: FolderPath::parse("Library/A/B"),
            },
        ],
    )
    .await
    .unwrap();

    assert_eq!(
        vault.operations(),
        vec![
            "create_folder Library/A".to_string(),
            "create_folder Library/A/B".to_string(),
            "create_file Library/A/B/x.md".to_string(),
        ]
    );
    assert_eq!(vault.read_file(&file("Library/A/B/x.md")).await.unwrap(), "body");
}

#[tokio::test]
async fn a_vacating_rename_runs_before_the_trash_of_its_source_folder() {
    let vault = Arc::new(MemoryVault::new());
    vault.seed_file("Library/old/keep-old.md", "precious");
    vault.seed_folder("Library/new");

    dispatch(
        vault.as_ref(),
        vec![
            VaultAction::TrashFolder {
                path: FolderPath::parse("Library/old"),
            },
            VaultAction::RenameFile {
                from: file("Library/old/keep-old.md"),
                to: file("Library/new/keep-new.md"),
            },
        ],
    )
    .await
    .unwrap();

    assert_eq!(
        vault.read_file(&file("Library/new/keep-new.md")).await.unwrap(),
        "precious"
    );
    assert!(!vault
        .folder_exists(&FolderPath::parse("Library/old"))
        .await
        .unwrap());
}

#[tokio::test]
async fn one_failure_does_not_abort_the_batch() {
    let vault = Arc::new(MemoryVault::new());
    vault.seed_folder("Library");

    let failures = dispatch(
        vault.as_ref(),
        vec![
            VaultAction::TrashFile {
                path: file("Library/ghost.md"),
            },
            VaultAction::UpsertFile {
                path: file("Library/real.md"),
                content: Some("x".to_string()),
            },
        ],
    )
    .await
    .unwrap_err();

    assert_eq!(failures.len(), 1);
    assert!(vault.file_exists(&file("Library/real.md")).await.unwrap());
}
