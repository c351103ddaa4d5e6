//! Vault change events and their split-path representations.
//!
//! Paths are carried as ordered segment lists rather than `PathBuf`s so the
//! pipeline can compare prefixes and strip the library root without any
//! platform path semantics leaking in.

pub mod collapse;
pub mod scope;

pub use collapse::{normalize_burst, ReducedEvents};
pub use scope::{library_scope, vault_scope, Scope, ScopedEvent};

use std::fmt;

/// A folder addressed by its ordered path segments from the vault root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct FolderPath {
    pub segments: Vec<String>,
}

impl FolderPath {
    pub fn new(segments: Vec<String>) -> Self {
        Self { segments }
    }

    pub fn root() -> Self {
        Self::default()
    }

    /// Parse a `/`-separated vault path.
    pub fn parse(path: &str) -> Self {
        Self {
            segments: path
                .split('/')
                .filter(|s| !s.is_empty())
                .map(|s| s.to_string())
                .collect(),
        }
    }

    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    pub fn join(&self, segment: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.to_string());
        Self { segments }
    }

    pub fn parent(&self) -> Option<Self> {
        if self.segments.is_empty() {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    pub fn name(&self) -> Option<&str> {
        self.segments.last().map(|s| s.as_str())
    }

    /// True when `self` is `prefix` or lies underneath it.
    pub fn starts_with(&self, prefix: &Self) -> bool {
        self.segments.len() >= prefix.segments.len()
            && self.segments[..prefix.segments.len()] == prefix.segments[..]
    }

    /// True when `self` lies strictly underneath `prefix`.
    pub fn is_under(&self, prefix: &Self) -> bool {
        self.segments.len() > prefix.segments.len() && self.starts_with(prefix)
    }

    /// The segments of `self` after `prefix`, if `self` starts with it.
    pub fn strip_prefix(&self, prefix: &Self) -> Option<Self> {
        if !self.starts_with(prefix) {
            return None;
        }
        Some(Self {
            segments: self.segments[prefix.segments.len()..].to_vec(),
        })
    }

    /// Re-attach a prefix removed by `strip_prefix`.
    pub fn prepend(&self, prefix: &Self) -> Self {
        let mut segments = prefix.segments.clone();
        segments.extend(self.segments.iter().cloned());
        Self { segments }
    }
}

impl fmt::Display for FolderPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("/"))
    }
}

/// A file addressed by its containing folder plus a stem/extension split
/// basename.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FilePath {
    pub folder: FolderPath,
    pub stem: String,
    pub extension: String,
}

impl FilePath {
    pub fn new(folder: FolderPath, stem: &str, extension: &str) -> Self {
        Self {
            folder,
            stem: stem.to_string(),
            extension: extension.to_string(),
        }
    }

    /// Parse a `/`-separated vault path; the final segment is split on its
    /// last `.` into stem and extension.
    pub fn parse(path: &str) -> Option<Self> {
        let mut folder = FolderPath::parse(path);
        let basename = folder.segments.pop()?;
        let (stem, extension) = match basename.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => (stem.to_string(), ext.to_string()),
            _ => (basename, String::new()),
        };
        Some(Self {
            folder,
            stem,
            extension,
        })
    }

    pub fn basename(&self) -> String {
        if self.extension.is_empty() {
            self.stem.clone()
        } else {
            format!("{}.{}", self.stem, self.extension)
        }
    }

    pub fn with_folder(&self, folder: FolderPath) -> Self {
        Self {
            folder,
            stem: self.stem.clone(),
            extension: self.extension.clone(),
        }
    }

    pub fn with_stem(&self, stem: &str) -> Self {
        Self {
            folder: self.folder.clone(),
            stem: stem.to_string(),
            extension: self.extension.clone(),
        }
    }
}

impl fmt::Display for FilePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.folder.segments.is_empty() {
            write!(f, "{}", self.basename())
        } else {
            write!(f, "{}/{}", self.folder, self.basename())
        }
    }
}

/// A raw change event emitted by the content store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VaultEvent {
    FileCreated { path: FilePath },
    FileDeleted { path: FilePath },
    FileRenamed { from: FilePath, to: FilePath },
    FolderCreated { path: FolderPath },
    FolderDeleted { path: FolderPath },
    FolderRenamed { from: FolderPath, to: FolderPath },
}

impl VaultEvent {
    /// All vault paths this event mentions, rendered as display strings.
    pub fn touched_paths(&self) -> Vec<String> {
        match self {
            Self::FileCreated { path } | Self::FileDeleted { path } => vec![path.to_string()],
            Self::FileRenamed { from, to } => vec![from.to_string(), to.to_string()],
            Self::FolderCreated { path } | Self::FolderDeleted { path } => vec![path.to_string()],
            Self::FolderRenamed { from, to } => vec![from.to_string(), to.to_string()],
        }
    }
}
