//! Deterministic in-memory vault used by tests.
//!
//! Mutations echo synthetic change events to every subscriber, mimicking a
//! real content store feeding its own edits back through the watch stream.
//! Every operation is recorded in an inspection log.

use super::{Vault, VaultEntry};
use crate::error::VaultError;
use crate::events::{FilePath, FolderPath, VaultEvent};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

#[derive(Debug, Clone)]
enum Entry {
    Folder(BTreeMap<String, Entry>),
    File(String),
}

struct MemoryState {
    root: BTreeMap<String, Entry>,
    subscribers: Vec<UnboundedSender<VaultEvent>>,
    operations: Vec<String>,
}

/// An in-process vault backed by a nested map.
pub struct MemoryVault {
    state: Mutex<MemoryState>,
}

impl Default for MemoryVault {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryVault {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState {
                root: BTreeMap::new(),
                subscribers: Vec::new(),
                operations: Vec::new(),
            }),
        }
    }

    /// The recorded operation log, oldest first.
    pub fn operations(&self) -> Vec<String> {
        self.state.lock().operations.clone()
    }

    pub fn clear_operations(&self) {
        self.state.lock().operations.clear();
    }

    /// Seed a folder (with all ancestors) without surfacing an event.
    pub fn seed_folder(&self, path: &str) {
        let folder = FolderPath::parse(path);
        let mut state = self.state.lock();
        let mut children = &mut state.root;
        for segment in &folder.segments {
            children = match children
                .entry(segment.clone())
                .or_insert_with(|| Entry::Folder(BTreeMap::new()))
            {
                Entry::Folder(map) => map,
                Entry::File(_) => return,
            };
        }
    }

    /// Seed a file (with all ancestor folders) without surfacing an event.
    pub fn seed_file(&self, path: &str, content: &str) {
        let Some(file) = FilePath::parse(path) else {
            return;
        };
        let mut state = self.state.lock();
        let mut children = &mut state.root;
        for segment in &file.folder.segments {
            children = match children
                .entry(segment.clone())
                .or_insert_with(|| Entry::Folder(BTreeMap::new()))
            {
                Entry::Folder(map) => map,
                Entry::File(_) => return,
            };
        }
        children.insert(file.basename(), Entry::File(content.to_string()));
    }

    /// Snapshot of every file path currently present, sorted.
    pub fn file_paths(&self) -> Vec<String> {
        let state = self.state.lock();
        let mut out = Vec::new();
        collect_files(&state.root, &mut String::new(), &mut out);
        out.sort();
        out
    }

    fn emit(state: &mut MemoryState, event: VaultEvent) {
        state.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    fn log(state: &mut MemoryState, op: String) {
        state.operations.push(op);
    }
}

fn collect_files(children: &BTreeMap<String, Entry>, prefix: &mut String, out: &mut Vec<String>) {
    for (name, entry) in children {
        let saved = prefix.len();
        if !prefix.is_empty() {
            prefix.push('/');
        }
        prefix.push_str(name);
        match entry {
            Entry::File(_) => out.push(prefix.clone()),
            Entry::Folder(sub) => collect_files(sub, prefix, out),
        }
        prefix.truncate(saved);
    }
}

fn folder_children<'a>(
    root: &'a mut BTreeMap<String, Entry>,
    folder: &FolderPath,
) -> Result<&'a mut BTreeMap<String, Entry>, VaultError> {
    let mut children = root;
    for segment in &folder.segments {
        children = match children.get_mut(segment) {
            Some(Entry::Folder(map)) => map,
            Some(Entry::File(_)) => return Err(VaultError::NotAFolder(folder.to_string())),
            None => return Err(VaultError::NotFound(folder.to_string())),
        };
    }
    Ok(children)
}

fn folder_children_ref<'a>(
    root: &'a BTreeMap<String, Entry>,
    folder: &FolderPath,
) -> Result<&'a BTreeMap<String, Entry>, VaultError> {
    let mut children = root;
    for segment in &folder.segments {
        children = match children.get(segment) {
            Some(Entry::Folder(map)) => map,
            Some(Entry::File(_)) => return Err(VaultError::NotAFolder(folder.to_string())),
            None => return Err(VaultError::NotFound(folder.to_string())),
        };
    }
    Ok(children)
}

#[async_trait]
impl Vault for MemoryVault {
    async fn create_folder(&self, path: &FolderPath) -> Result<(), VaultError> {
        let mut state = self.state.lock();
        let Some(parent) = path.parent() else {
            return Err(VaultError::NotFound(path.to_string()));
        };
        let name = path.name().unwrap_or_default().to_string();
        let children = folder_children(&mut state.root, &parent)?;
        if children.contains_key(&name) {
            return Err(VaultError::AlreadyExists(path.to_string()));
        }
        children.insert(name, Entry::Folder(BTreeMap::new()));
        MemoryVault::log(&mut state, format!("create_folder {}", path));
        MemoryVault::emit(&mut state, VaultEvent::FolderCreated { path: path.clone() });
        Ok(())
    }

    async fn rename_folder(&self, from: &FolderPath, to: &FolderPath) -> Result<(), VaultError> {
        let mut state = self.state.lock();
        let (Some(from_parent), Some(to_parent)) = (from.parent(), to.parent()) else {
            return Err(VaultError::NotFound(from.to_string()));
        };
        let from_name = from.name().unwrap_or_default().to_string();
        let to_name = to.name().unwrap_or_default().to_string();

        {
            let dest = folder_children(&mut state.root, &to_parent)?;
            if dest.contains_key(&to_name) {
                return Err(VaultError::AlreadyExists(to.to_string()));
            }
        }
        let entry = {
            let children = folder_children(&mut state.root, &from_parent)?;
            match children.get(&from_name) {
                Some(Entry::Folder(_)) => match children.remove(&from_name) {
                    Some(entry) => entry,
                    None => return Err(VaultError::NotFound(from.to_string())),
                },
                _ => return Err(VaultError::NotFound(from.to_string())),
            }
        };
        let dest = folder_children(&mut state.root, &to_parent)?;
        dest.insert(to_name, entry);
        MemoryVault::log(&mut state, format!("rename_folder {} -> {}", from, to));
        MemoryVault::emit(
            &mut state,
            VaultEvent::FolderRenamed {
                from: from.clone(),
                to: to.clone(),
            },
        );
        Ok(())
    }

    async fn trash_folder(&self, path: &FolderPath) -> Result<(), VaultError> {
        let mut state = self.state.lock();
        let Some(parent) = path.parent() else {
            return Err(VaultError::NotFound(path.to_string()));
        };
        let name = path.name().unwrap_or_default().to_string();
        let children = folder_children(&mut state.root, &parent)?;
        match children.get(&name) {
            Some(Entry::Folder(_)) => {
                children.remove(&name);
            }
            _ => return Err(VaultError::NotFound(path.to_string())),
        }
        MemoryVault::log(&mut state, format!("trash_folder {}", path));
        MemoryVault::emit(&mut state, VaultEvent::FolderDeleted { path: path.clone() });
        Ok(())
    }

    async fn create_file(&self, path: &FilePath, content: &str) -> Result<(), VaultError> {
        let mut state = self.state.lock();
        let children = folder_children(&mut state.root, &path.folder)?;
        let basename = path.basename();
        if children.contains_key(&basename) {
            return Err(VaultError::AlreadyExists(path.to_string()));
        }
        children.insert(basename, Entry::File(content.to_string()));
        MemoryVault::log(&mut state, format!("create_file {}", path));
        MemoryVault::emit(&mut state, VaultEvent::FileCreated { path: path.clone() });
        Ok(())
    }

    async fn read_file(&self, path: &FilePath) -> Result<String, VaultError> {
        let state = self.state.lock();
        let children = folder_children_ref(&state.root, &path.folder)?;
        match children.get(&path.basename()) {
            Some(Entry::File(content)) => Ok(content.clone()),
            _ => Err(VaultError::NotFound(path.to_string())),
        }
    }

    async fn modify_file(&self, path: &FilePath, content: &str) -> Result<(), VaultError> {
        let mut state = self.state.lock();
        let children = folder_children(&mut state.root, &path.folder)?;
        match children.get_mut(&path.basename()) {
            Some(Entry::File(existing)) => {
                *existing = content.to_string();
            }
            _ => return Err(VaultError::NotFound(path.to_string())),
        }
        MemoryVault::log(&mut state, format!("modify_file {}", path));
        Ok(())
    }

    async fn rename_file(&self, from: &FilePath, to: &FilePath) -> Result<(), VaultError> {
        let mut state = self.state.lock();
        let basename = to.basename();
        {
            let dest = folder_children(&mut state.root, &to.folder)?;
            if dest.contains_key(&basename) {
                return Err(VaultError::AlreadyExists(to.to_string()));
            }
        }
        let content = {
            let children = folder_children(&mut state.root, &from.folder)?;
            match children.remove(&from.basename()) {
                Some(Entry::File(content)) => content,
                Some(other) => {
                    children.insert(from.basename(), other);
                    return Err(VaultError::NotFound(from.to_string()));
                }
                None => return Err(VaultError::NotFound(from.to_string())),
            }
        };
        let dest = folder_children(&mut state.root, &to.folder)?;
        dest.insert(basename, Entry::File(content));
        MemoryVault::log(&mut state, format!("rename_file {} -> {}", from, to));
        MemoryVault::emit(
            &mut state,
            VaultEvent::FileRenamed {
                from: from.clone(),
                to: to.clone(),
            },
        );
        Ok(())
    }

    async fn trash_file(&self, path: &FilePath) -> Result<(), VaultError> {
        let mut state = self.state.lock();
        let children = folder_children(&mut state.root, &path.folder)?;
        match children.get(&path.basename()) {
            Some(Entry::File(_)) => {
                children.remove(&path.basename());
            }
            _ => return Err(VaultError::NotFound(path.to_string())),
        }
        MemoryVault::log(&mut state, format!("trash_file {}", path));
        MemoryVault::emit(&mut state, VaultEvent::FileDeleted { path: path.clone() });
        Ok(())
    }

    async fn folder_exists(&self, path: &FolderPath) -> Result<bool, VaultError> {
        let state = self.state.lock();
        Ok(folder_children_ref(&state.root, path).is_ok())
    }

    async fn file_exists(&self, path: &FilePath) -> Result<bool, VaultError> {
        let state = self.state.lock();
        match folder_children_ref(&state.root, &path.folder) {
            Ok(children) => Ok(matches!(children.get(&path.basename()), Some(Entry::File(_)))),
            Err(_) => Ok(false),
        }
    }

    async fn list_children(&self, folder: &FolderPath) -> Result<Vec<VaultEntry>, VaultError> {
        let state = self.state.lock();
        let children = folder_children_ref(&state.root, folder)?;
        Ok(children
            .iter()
            .map(|(name, entry)| match entry {
                Entry::Folder(_) => VaultEntry::Folder(folder.join(name)),
                Entry::File(_) => {
                    let (stem, extension) = match name.rsplit_once('.') {
                        Some((stem, ext)) if !stem.is_empty() => (stem.to_string(), ext.to_string()),
                        _ => (name.clone(), String::new()),
                    };
                    VaultEntry::File(FilePath {
                        folder: folder.clone(),
                        stem,
                        extension,
                    })
                }
            })
            .collect())
    }

    fn subscribe(&self) -> Result<UnboundedReceiver<VaultEvent>, VaultError> {
        let (tx, rx) = unbounded_channel();
        self.state.lock().subscribers.push(tx);
        Ok(rx)
    }
}
