//! Content-store abstraction.
//!
//! The vault is the only external surface the system requires: primitive
//! create/rename/trash/read/write operations plus a raw change-event
//! stream. Everything above this trait is deterministic.

pub mod disk;
pub mod memory;

pub use disk::DiskVault;
pub use memory::MemoryVault;

use crate::error::VaultError;
use crate::events::{FilePath, FolderPath, VaultEvent};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;

/// A directory listing entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VaultEntry {
    Folder(FolderPath),
    File(FilePath),
}

/// Asynchronous content-store primitives.
///
/// Operations are awaited sequentially by the dispatcher; implementations
/// need not be atomic across calls.
#[async_trait]
pub trait Vault: Send + Sync {
    async fn create_folder(&self, path: &FolderPath) -> Result<(), VaultError>;
    async fn rename_folder(&self, from: &FolderPath, to: &FolderPath) -> Result<(), VaultError>;
    async fn trash_folder(&self, path: &FolderPath) -> Result<(), VaultError>;

    async fn create_file(&self, path: &FilePath, content: &str) -> Result<(), VaultError>;
    async fn read_file(&self, path: &FilePath) -> Result<String, VaultError>;
    async fn modify_file(&self, path: &FilePath, content: &str) -> Result<(), VaultError>;
    async fn rename_file(&self, from: &FilePath, to: &FilePath) -> Result<(), VaultError>;
    async fn trash_file(&self, path: &FilePath) -> Result<(), VaultError>;

    async fn folder_exists(&self, path: &FolderPath) -> Result<bool, VaultError>;
    async fn file_exists(&self, path: &FilePath) -> Result<bool, VaultError>;
    async fn list_children(&self, folder: &FolderPath) -> Result<Vec<VaultEntry>, VaultError>;

    /// Subscribe to the raw change-event stream.
    fn subscribe(&self) -> Result<UnboundedReceiver<VaultEvent>, VaultError>;
}

/// A content transform applied by `ProcessFile`; transforms on the same
/// path compose in arrival order.
pub type FileTransform = Arc<dyn Fn(String) -> String + Send + Sync>;

/// A physical operation against the vault. Produced by the healer (and
/// other producers), consumed only by the dispatcher; ephemeral within one
/// dispatch cycle.
#[derive(Clone)]
pub enum VaultAction {
    CreateFolder { path: FolderPath },
    RenameFolder { from: FolderPath, to: FolderPath },
    TrashFolder { path: FolderPath },
    /// Create the file, or replace its content; `None` means "ensure the
    /// file exists with empty content".
    UpsertFile { path: FilePath, content: Option<String> },
    RenameFile { from: FilePath, to: FilePath },
    TrashFile { path: FilePath },
    /// Read-transform-write the file's content.
    ProcessFile { path: FilePath, transform: FileTransform },
}

impl fmt::Debug for VaultAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreateFolder { path } => write!(f, "CreateFolder({})", path),
            Self::RenameFolder { from, to } => write!(f, "RenameFolder({} -> {})", from, to),
            Self::TrashFolder { path } => write!(f, "TrashFolder({})", path),
            Self::UpsertFile { path, content } => {
                write!(f, "UpsertFile({}, {} bytes)", path, content.as_deref().map_or(0, str::len))
            }
            Self::RenameFile { from, to } => write!(f, "RenameFile({} -> {})", from, to),
            Self::TrashFile { path } => write!(f, "TrashFile({})", path),
            Self::ProcessFile { path, .. } => write!(f, "ProcessFile({})", path),
        }
    }
}

impl PartialEq for VaultAction {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::CreateFolder { path: a }, Self::CreateFolder { path: b }) => a == b,
            (Self::TrashFolder { path: a }, Self::TrashFolder { path: b }) => a == b,
            (
                Self::RenameFolder { from: a, to: b },
                Self::RenameFolder { from: c, to: d },
            ) => a == c && b == d,
            (
                Self::UpsertFile { path: a, content: b },
                Self::UpsertFile { path: c, content: d },
            ) => a == c && b == d,
            (Self::RenameFile { from: a, to: b }, Self::RenameFile { from: c, to: d }) => {
                a == c && b == d
            }
            (Self::TrashFile { path: a }, Self::TrashFile { path: b }) => a == b,
            // Transforms compare by identity.
            (
                Self::ProcessFile { path: a, transform: ta },
                Self::ProcessFile { path: b, transform: tb },
            ) => a == b && Arc::ptr_eq(ta, tb),
            _ => false,
        }
    }
}

impl VaultAction {
    /// The path this action produces or affects; competing structural
    /// actions on the same target collapse keep-last.
    pub fn target_path(&self) -> String {
        match self {
            Self::CreateFolder { path } | Self::TrashFolder { path } => path.to_string(),
            Self::RenameFolder { to, .. } => to.to_string(),
            Self::UpsertFile { path, .. } | Self::TrashFile { path } | Self::ProcessFile { path, .. } => {
                path.to_string()
            }
            Self::RenameFile { to, .. } => to.to_string(),
        }
    }

    /// Every vault path this action touches (source and destination).
    pub fn touched_paths(&self) -> Vec<String> {
        match self {
            Self::CreateFolder { path } | Self::TrashFolder { path } => vec![path.to_string()],
            Self::RenameFolder { from, to } => vec![from.to_string(), to.to_string()],
            Self::UpsertFile { path, .. } | Self::TrashFile { path } | Self::ProcessFile { path, .. } => {
                vec![path.to_string()]
            }
            Self::RenameFile { from, to } => vec![from.to_string(), to.to_string()],
        }
    }

    /// Folders that must exist before this action can run.
    pub fn required_folders(&self) -> Vec<FolderPath> {
        match self {
            Self::CreateFolder { path } => path.parent().into_iter().collect(),
            Self::RenameFolder { to, .. } => to.parent().into_iter().collect(),
            Self::TrashFolder { .. } => Vec::new(),
            Self::UpsertFile { path, .. } | Self::ProcessFile { path, .. } => vec![path.folder.clone()],
            Self::RenameFile { to, .. } => vec![to.folder.clone()],
            Self::TrashFile { .. } => Vec::new(),
        }
    }
}
