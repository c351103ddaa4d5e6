//! Disk-backed vault.
//!
//! Paths are stored vault-relative and mapped onto a root directory.
//! Trash is non-destructive: entries move into a `.trash` folder at the
//! vault root. The raw event stream is fed by a `notify` watcher.

use super::{Vault, VaultEntry};
use crate::error::VaultError;
use crate::events::{FilePath, FolderPath, VaultEvent};
use async_trait::async_trait;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tracing::{error, warn};

const TRASH_FOLDER: &str = ".trash";

/// A vault rooted at a directory on disk.
pub struct DiskVault {
    root: PathBuf,
    watchers: Mutex<Vec<RecommendedWatcher>>,
}

impl DiskVault {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, VaultError> {
        let root = root.into();
        let root = dunce::canonicalize(&root)?;
        if !root.is_dir() {
            return Err(VaultError::NotAFolder(root.display().to_string()));
        }
        Ok(Self {
            root,
            watchers: Mutex::new(Vec::new()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve_folder(&self, path: &FolderPath) -> PathBuf {
        let mut out = self.root.clone();
        for segment in &path.segments {
            out.push(segment);
        }
        out
    }

    fn resolve_file(&self, path: &FilePath) -> PathBuf {
        let mut out = self.resolve_folder(&path.folder);
        out.push(path.basename());
        out
    }

    async fn move_to_trash(&self, source: PathBuf, basename: &str) -> Result<(), VaultError> {
        let trash_dir = self.root.join(TRASH_FOLDER);
        tokio::fs::create_dir_all(&trash_dir).await?;
        let mut target = trash_dir.join(basename);
        let mut attempt = 1;
        while tokio::fs::try_exists(&target).await? {
            target = trash_dir.join(format!("{}.{}", basename, attempt));
            attempt += 1;
        }
        tokio::fs::rename(&source, &target).await?;
        Ok(())
    }

    fn relative_path(&self, path: &Path) -> Option<String> {
        let rel = path.strip_prefix(&self.root).ok()?;
        let display = rel.to_string_lossy().replace('\\', "/");
        if display.is_empty() || display.starts_with(TRASH_FOLDER) {
            return None;
        }
        Some(display)
    }

    fn convert_event(&self, event: notify::Event) -> Option<VaultEvent> {
        use notify::event::{CreateKind, ModifyKind, RemoveKind, RenameMode};

        match event.kind {
            notify::EventKind::Create(kind) => {
                let path = event.paths.first()?;
                let rel = self.relative_path(path)?;
                let is_dir = match kind {
                    CreateKind::Folder => true,
                    CreateKind::File => false,
                    _ => path.is_dir(),
                };
                if is_dir {
                    Some(VaultEvent::FolderCreated {
                        path: FolderPath::parse(&rel),
                    })
                } else {
                    Some(VaultEvent::FileCreated {
                        path: FilePath::parse(&rel)?,
                    })
                }
            }
            notify::EventKind::Remove(kind) => {
                let path = event.paths.first()?;
                let rel = self.relative_path(path)?;
                // The path is gone; fall back to the extension heuristic
                // when the backend does not say which kind it was.
                let is_dir = match kind {
                    RemoveKind::Folder => true,
                    RemoveKind::File => false,
                    _ => !rel.rsplit('/').next().unwrap_or(&rel).contains('.'),
                };
                if is_dir {
                    Some(VaultEvent::FolderDeleted {
                        path: FolderPath::parse(&rel),
                    })
                } else {
                    Some(VaultEvent::FileDeleted {
                        path: FilePath::parse(&rel)?,
                    })
                }
            }
            notify::EventKind::Modify(ModifyKind::Name(mode)) => match mode {
                RenameMode::Both if event.paths.len() >= 2 => {
                    let from_rel = self.relative_path(&event.paths[0])?;
                    let to_rel = self.relative_path(&event.paths[1])?;
                    if event.paths[1].is_dir() {
                        Some(VaultEvent::FolderRenamed {
                            from: FolderPath::parse(&from_rel),
                            to: FolderPath::parse(&to_rel),
                        })
                    } else {
                        Some(VaultEvent::FileRenamed {
                            from: FilePath::parse(&from_rel)?,
                            to: FilePath::parse(&to_rel)?,
                        })
                    }
                }
                RenameMode::From => {
                    let rel = self.relative_path(event.paths.first()?)?;
                    Some(VaultEvent::FileDeleted {
                        path: FilePath::parse(&rel)?,
                    })
                }
                RenameMode::To => {
                    let path = event.paths.first()?;
                    let rel = self.relative_path(path)?;
                    if path.is_dir() {
                        Some(VaultEvent::FolderCreated {
                            path: FolderPath::parse(&rel),
                        })
                    } else {
                        Some(VaultEvent::FileCreated {
                            path: FilePath::parse(&rel)?,
                        })
                    }
                }
                _ => None,
            },
            // Content modifications do not move the tree.
            _ => None,
        }
    }
}

#[async_trait]
impl Vault for DiskVault {
    async fn create_folder(&self, path: &FolderPath) -> Result<(), VaultError> {
        let target = self.resolve_folder(path);
        if tokio::fs::try_exists(&target).await? {
            return Err(VaultError::AlreadyExists(path.to_string()));
        }
        tokio::fs::create_dir(&target).await?;
        Ok(())
    }

    async fn rename_folder(&self, from: &FolderPath, to: &FolderPath) -> Result<(), VaultError> {
        let source = self.resolve_folder(from);
        let target = self.resolve_folder(to);
        if !tokio::fs::try_exists(&source).await? {
            return Err(VaultError::NotFound(from.to_string()));
        }
        if tokio::fs::try_exists(&target).await? {
            return Err(VaultError::AlreadyExists(to.to_string()));
        }
        tokio::fs::rename(&source, &target).await?;
        Ok(())
    }

    async fn trash_folder(&self, path: &FolderPath) -> Result<(), VaultError> {
        let source = self.resolve_folder(path);
        if !tokio::fs::try_exists(&source).await? {
            return Err(VaultError::NotFound(path.to_string()));
        }
        self.move_to_trash(source, path.name().unwrap_or("folder")).await
    }

    async fn create_file(&self, path: &FilePath, content: &str) -> Result<(), VaultError> {
        let target = self.resolve_file(path);
        if tokio::fs::try_exists(&target).await? {
            return Err(VaultError::AlreadyExists(path.to_string()));
        }
        tokio::fs::write(&target, content).await?;
        Ok(())
    }

    async fn read_file(&self, path: &FilePath) -> Result<String, VaultError> {
        let target = self.resolve_file(path);
        Ok(tokio::fs::read_to_string(&target).await?)
    }

    async fn modify_file(&self, path: &FilePath, content: &str) -> Result<(), VaultError> {
        let target = self.resolve_file(path);
        if !tokio::fs::try_exists(&target).await? {
            return Err(VaultError::NotFound(path.to_string()));
        }
        tokio::fs::write(&target, content).await?;
        Ok(())
    }

    async fn rename_file(&self, from: &FilePath, to: &FilePath) -> Result<(), VaultError> {
        let source = self.resolve_file(from);
        let target = self.resolve_file(to);
        if !tokio::fs::try_exists(&source).await? {
            return Err(VaultError::NotFound(from.to_string()));
        }
        if tokio::fs::try_exists(&target).await? {
            return Err(VaultError::AlreadyExists(to.to_string()));
        }
        tokio::fs::rename(&source, &target).await?;
        Ok(())
    }

    async fn trash_file(&self, path: &FilePath) -> Result<(), VaultError> {
        let source = self.resolve_file(path);
        if !tokio::fs::try_exists(&source).await? {
            return Err(VaultError::NotFound(path.to_string()));
        }
        self.move_to_trash(source, &path.basename()).await
    }

    async fn folder_exists(&self, path: &FolderPath) -> Result<bool, VaultError> {
        Ok(self.resolve_folder(path).is_dir())
    }

    async fn file_exists(&self, path: &FilePath) -> Result<bool, VaultError> {
        Ok(self.resolve_file(path).is_file())
    }

    async fn list_children(&self, folder: &FolderPath) -> Result<Vec<VaultEntry>, VaultError> {
        let dir = self.resolve_folder(folder);
        let mut entries = Vec::new();
        let mut read_dir = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = read_dir.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            if name == TRASH_FOLDER || name.starts_with('.') {
                continue;
            }
            let file_type = entry.file_type().await?;
            if file_type.is_dir() {
                entries.push(VaultEntry::Folder(folder.join(&name)));
            } else if file_type.is_file() {
                let (stem, extension) = match name.rsplit_once('.') {
                    Some((stem, ext)) if !stem.is_empty() => (stem.to_string(), ext.to_string()),
                    _ => (name.clone(), String::new()),
                };
                entries.push(VaultEntry::File(FilePath {
                    folder: folder.clone(),
                    stem,
                    extension,
                }));
            }
        }
        entries.sort_by_key(|entry| match entry {
            VaultEntry::Folder(path) => path.to_string(),
            VaultEntry::File(path) => path.to_string(),
        });
        Ok(entries)
    }

    fn subscribe(&self) -> Result<UnboundedReceiver<VaultEvent>, VaultError> {
        let (tx, rx) = unbounded_channel();
        let root = self.root.clone();
        let converter = DiskVault {
            root,
            watchers: Mutex::new(Vec::new()),
        };

        let mut watcher = notify::recommended_watcher(move |result: notify::Result<notify::Event>| {
            match result {
                Ok(event) => {
                    if let Some(converted) = converter.convert_event(event) {
                        if tx.send(converted).is_err() {
                            warn!("Vault event receiver dropped");
                        }
                    }
                }
                Err(e) => error!("Watch error: {}", e),
            }
        })
        .map_err(|e| VaultError::Watch(format!("failed to create watcher: {}", e)))?;

        watcher
            .watch(&self.root, RecursiveMode::Recursive)
            .map_err(|e| VaultError::Watch(format!("failed to watch {}: {}", self.root.display(), e)))?;

        self.watchers.lock().push(watcher);
        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(path: &str) -> FilePath {
        FilePath::parse(path).unwrap()
    }

    #[tokio::test]
    async fn folder_and_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let vault = DiskVault::new(dir.path()).unwrap();

        vault.create_folder(&FolderPath::parse("Library")).await.unwrap();
        vault.create_file(&file("Library/a.md"), "hello").await.unwrap();
        assert!(vault.file_exists(&file("Library/a.md")).await.unwrap());
        assert_eq!(vault.read_file(&file("Library/a.md")).await.unwrap(), "hello");

        vault
            .rename_file(&file("Library/a.md"), &file("Library/b.md"))
            .await
            .unwrap();
        assert!(!vault.file_exists(&file("Library/a.md")).await.unwrap());

        let children = vault.list_children(&FolderPath::parse("Library")).await.unwrap();
        assert_eq!(children, vec![VaultEntry::File(file("Library/b.md"))]);
    }

    #[tokio::test]
    async fn trash_is_non_destructive() {
        let dir = tempfile::tempdir().unwrap();
        let vault = DiskVault::new(dir.path()).unwrap();
        vault.create_folder(&FolderPath::parse("Library")).await.unwrap();
        vault.create_file(&file("Library/a.md"), "keep me").await.unwrap();
        vault.trash_file(&file("Library/a.md")).await.unwrap();

        assert!(!vault.file_exists(&file("Library/a.md")).await.unwrap());
        let trashed = dir.path().join(".trash").join("a.md");
        assert_eq!(std::fs::read_to_string(trashed).unwrap(), "keep me");
    }
}
