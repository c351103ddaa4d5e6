//! End-to-end healing through the library facade over the in-memory
//! vault.

use stacks::events::{FilePath, FolderPath, VaultEvent};
use stacks::library::Library;
use stacks::vault::{MemoryVault, Vault};
use stacks::LibraryConfig;
use std::sync::Arc;

fn file(path: &str) -> FilePath {
    FilePath::parse(path).unwrap()
}

async fn scanned_library(vault: Arc<MemoryVault>) -> Library {
    let library = Library::new(vault, LibraryConfig::default());
    library.init_scan().await.unwrap();
    library
}

#[tokio::test]
async fn a_file_missing_its_suffix_heals_with_one_rename() {
    let vault = Arc::new(MemoryVault::new());
    vault.seed_file("Library/recipes/soup/Existing-soup-recipes.md", "");
    let library = scanned_library(vault.clone()).await;

    // The user saves a bare "Note.md" two levels deep.
    vault
        .create_file(&file("Library/recipes/soup/Note.md"), "text")
        .await
        .unwrap();
    vault.clear_operations();

    library
        .handle_burst(vec![VaultEvent::FileCreated {
            path: file("Library/recipes/soup/Note.md"),
        }])
        .await
        .unwrap();

    let operations = vault.operations();
    let renames: Vec<_> = operations
        .iter()
        .filter(|op| op.starts_with("rename_file"))
        .collect();
    assert_eq!(
        renames,
        vec!["rename_file Library/recipes/soup/Note.md -> Library/recipes/soup/Note-soup-recipes.md"]
    );
    assert_eq!(
        vault
            .read_file(&file("Library/recipes/soup/Note-soup-recipes.md"))
            .await
            .unwrap(),
        "text"
    );
}

#[tokio::test]
async fn suffix_rename_into_a_new_child_keeps_the_file() {
    let vault = Arc::new(MemoryVault::new());
    vault.seed_file("Library/a/Note-a.md", "body");
    let library = scanned_library(vault.clone()).await;

    // Renaming the folder's only note so its suffix claims a child
    // section empties `a` in the tree on the way; the physical folder
    // must survive with the new child inside it.
    vault
        .rename_file(&file("Library/a/Note-a.md"), &file("Library/a/Note-b-a.md"))
        .await
        .unwrap();
    vault.clear_operations();

    library
        .handle_burst(vec![VaultEvent::FileRenamed {
            from: file("Library/a/Note-a.md"),
            to: file("Library/a/Note-b-a.md"),
        }])
        .await
        .unwrap();

    let operations = vault.operations();
    assert!(
        !operations.iter().any(|op| op.starts_with("trash_folder")),
        "unexpected folder trash: {:?}",
        operations
    );
    assert_eq!(
        vault
            .read_file(&file("Library/a/b/Note-b-a.md"))
            .await
            .unwrap(),
        "body"
    );
    assert!(vault
        .file_exists(&file("Library/a/b/__-b-a.md"))
        .await
        .unwrap());
    assert_eq!(
        library.find_by_core_name("Note").unwrap()[0].chain,
        vec![
            "Library".to_string(),
            "a".to_string(),
            "b".to_string(),
            "Note".to_string()
        ]
    );
}

#[tokio::test]
async fn section_rename_rewrites_every_descendant_suffix() {
    let vault = Arc::new(MemoryVault::new());
    vault.seed_file("Library/recipes/Note-recipes.md", "");
    vault.seed_file("Library/recipes/__-recipes.md", "# recipes");
    vault.seed_file("Library/recipes/soup/Broth-soup-recipes.md", "stock");
    vault.seed_file("Library/recipes/soup/__-soup-recipes.md", "# soup");
    let library = scanned_library(vault.clone()).await;

    // The user renames the whole section folder in a file manager.
    vault
        .rename_folder(
            &FolderPath::parse("Library/recipes"),
            &FolderPath::parse("Library/cookbook"),
        )
        .await
        .unwrap();

    library
        .handle_burst(vec![VaultEvent::FolderRenamed {
            from: FolderPath::parse("Library/recipes"),
            to: FolderPath::parse("Library/cookbook"),
        }])
        .await
        .unwrap();

    // Every descendant leaf carries the new chain in its suffix.
    assert!(vault
        .file_exists(&file("Library/cookbook/Note-cookbook.md"))
        .await
        .unwrap());
    assert_eq!(
        vault
            .read_file(&file("Library/cookbook/soup/Broth-soup-cookbook.md"))
            .await
            .unwrap(),
        "stock"
    );
    assert!(!vault
        .file_exists(&file("Library/cookbook/Note-recipes.md"))
        .await
        .unwrap());

    // Stale codexes were trashed and fresh ones regenerated in place.
    assert!(!vault
        .file_exists(&file("Library/cookbook/__-recipes.md"))
        .await
        .unwrap());
    assert!(!vault
        .file_exists(&file("Library/cookbook/soup/__-soup-recipes.md"))
        .await
        .unwrap());
    let codex = vault
        .read_file(&file("Library/cookbook/__-cookbook.md"))
        .await
        .unwrap();
    assert!(codex.contains("Note-cookbook"));
    assert!(vault
        .file_exists(&file("Library/cookbook/soup/__-soup-cookbook.md"))
        .await
        .unwrap());

    // The tree followed along.
    assert_eq!(
        library.find_by_core_name("Broth").unwrap()[0].chain,
        vec![
            "Library".to_string(),
            "cookbook".to_string(),
            "soup".to_string(),
            "Broth".to_string()
        ]
    );
}

#[tokio::test]
async fn drift_reported_by_a_scan_heals_on_request() {
    let vault = Arc::new(MemoryVault::new());
    vault.seed_file("Library/recipes/Note.md", "body");
    vault.seed_file("Library/recipes/-broken.md", "junk");
    let library = Library::new(vault.clone(), LibraryConfig::default());

    let report = library.init_scan().await.unwrap();
    assert_eq!(report.drifted.len(), 1);
    assert_eq!(report.undecodable.len(), 1);

    library.heal_drift(&report).await.unwrap();
    assert!(vault
        .file_exists(&file("Library/recipes/Note-recipes.md"))
        .await
        .unwrap());
    assert!(vault
        .file_exists(&file("Library/recipes/_untracked/-broken.md"))
        .await
        .unwrap());
}
