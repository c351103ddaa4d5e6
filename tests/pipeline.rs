//! Burst normalization through the full pipeline: a folder drag emits a
//! storm of per-file events, but only the root event carries intent.

use stacks::events::{FilePath, FolderPath, VaultEvent};
use stacks::library::Library;
use stacks::vault::{MemoryVault, Vault};
use stacks::LibraryConfig;
use std::sync::Arc;

fn file(path: &str) -> FilePath {
    FilePath::parse(path).unwrap()
}

#[tokio::test]
async fn a_folder_drag_reduces_to_one_root_event() {
    let vault = Arc::new(MemoryVault::new());
    vault.seed_file("Library/A/x-A.md", "one");
    vault.seed_file("Library/A/y-A.md", "two");
    let library = Library::new(vault.clone(), LibraryConfig::default());
    library.init_scan().await.unwrap();

    // The user drags folder A into B; the OS reports the folder rename
    // plus one rename per contained file.
    vault
        .create_folder(&FolderPath::parse("Library/B"))
        .await
        .unwrap();
    vault
        .rename_folder(
            &FolderPath::parse("Library/A"),
            &FolderPath::parse("Library/B/A"),
        )
        .await
        .unwrap();

    let summary = library
        .handle_burst(vec![
            VaultEvent::FolderRenamed {
                from: FolderPath::parse("Library/A"),
                to: FolderPath::parse("Library/B/A"),
            },
            VaultEvent::FileRenamed {
                from: file("Library/A/x-A.md"),
                to: file("Library/B/A/x-A.md"),
            },
            VaultEvent::FileRenamed {
                from: file("Library/A/y-A.md"),
                to: file("Library/B/A/y-A.md"),
            },
        ])
        .await
        .unwrap();

    assert_eq!(summary.events, 3);
    assert_eq!(summary.roots, 1);

    // Healing fanned out from the single section move.
    assert_eq!(
        vault
            .read_file(&file("Library/B/A/x-A-B.md"))
            .await
            .unwrap(),
        "one"
    );
    assert_eq!(
        vault
            .read_file(&file("Library/B/A/y-A-B.md"))
            .await
            .unwrap(),
        "two"
    );
    assert!(vault
        .file_exists(&file("Library/B/A/__-A-B.md"))
        .await
        .unwrap());
    assert!(vault.file_exists(&file("Library/B/__-B.md")).await.unwrap());
}

#[tokio::test]
async fn a_rename_chain_collapses_before_translation() {
    let vault = Arc::new(MemoryVault::new());
    vault.seed_file("Library/soup/Note-soup.md", "");
    let library = Library::new(vault.clone(), LibraryConfig::default());
    library.init_scan().await.unwrap();

    // Two quick renames inside one burst; only the endpoints matter.
    vault
        .rename_file(
            &file("Library/soup/Note-soup.md"),
            &file("Library/soup/Draft-soup.md"),
        )
        .await
        .unwrap();
    vault
        .rename_file(
            &file("Library/soup/Draft-soup.md"),
            &file("Library/soup/Final-soup.md"),
        )
        .await
        .unwrap();

    let summary = library
        .handle_burst(vec![
            VaultEvent::FileRenamed {
                from: file("Library/soup/Note-soup.md"),
                to: file("Library/soup/Draft-soup.md"),
            },
            VaultEvent::FileRenamed {
                from: file("Library/soup/Draft-soup.md"),
                to: file("Library/soup/Final-soup.md"),
            },
        ])
        .await
        .unwrap();

    assert_eq!(summary.roots, 1);
    let found = library.find_by_core_name("Final").unwrap();
    assert_eq!(found.len(), 1);
    assert!(library.find_by_core_name("Draft").unwrap().is_empty());
    assert!(vault
        .file_exists(&file("Library/soup/Final-soup.md"))
        .await
        .unwrap());
}

#[tokio::test]
async fn a_rename_leaving_the_library_forgets_the_leaf() {
    let vault = Arc::new(MemoryVault::new());
    vault.seed_file("Library/soup/Note-soup.md", "");
    vault.seed_file("Library/soup/Keep-soup.md", "");
    vault.seed_folder("Archive");
    let library = Library::new(vault.clone(), LibraryConfig::default());
    library.init_scan().await.unwrap();

    vault
        .rename_file(
            &file("Library/soup/Note-soup.md"),
            &file("Archive/Note-soup.md"),
        )
        .await
        .unwrap();
    library
        .handle_burst(vec![VaultEvent::FileRenamed {
            from: file("Library/soup/Note-soup.md"),
            to: file("Archive/Note-soup.md"),
        }])
        .await
        .unwrap();

    assert!(library.find_by_core_name("Note").unwrap().is_empty());
    assert_eq!(library.counts().unwrap(), (1, 1));
    // The file itself is untouched outside the library.
    assert!(vault.file_exists(&file("Archive/Note-soup.md")).await.unwrap());
}
