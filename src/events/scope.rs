//! Library scoping: classifying vault-absolute events against the
//! configured library root and translating them into library-relative
//! form.
//!
//! Scoping and its inverse round-trip exactly for every scope and event
//! kind; downstream consumers never reason about the absolute root prefix.

use super::{FilePath, FolderPath, VaultEvent};

/// Where an event sits relative to the library root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Both endpoints under the root.
    Inside,
    /// Neither endpoint under the root.
    Outside,
    /// A rename leaving the library.
    InsideToOutside,
    /// A rename entering the library.
    OutsideToInside,
}

/// An event classified against the library root. Endpoints that are inside
/// the library are stored library-relative; outside endpoints keep their
/// vault-absolute form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopedEvent {
    pub scope: Scope,
    pub event: VaultEvent,
}

fn folder_inside(path: &FolderPath, root: &FolderPath) -> bool {
    path.starts_with(root)
}

fn file_inside(path: &FilePath, root: &FolderPath) -> bool {
    path.folder.starts_with(root)
}

fn strip_folder(path: &FolderPath, root: &FolderPath) -> FolderPath {
    path.strip_prefix(root).unwrap_or_else(|| path.clone())
}

fn strip_file(path: &FilePath, root: &FolderPath) -> FilePath {
    path.with_folder(strip_folder(&path.folder, root))
}

/// Classify a vault-absolute event and strip the root prefix from its
/// inside endpoints.
pub fn library_scope(event: &VaultEvent, root: &FolderPath) -> ScopedEvent {
    match event {
        VaultEvent::FileCreated { path } => scoped_single_file(path, root, |path| {
            VaultEvent::FileCreated { path }
        }),
        VaultEvent::FileDeleted { path } => scoped_single_file(path, root, |path| {
            VaultEvent::FileDeleted { path }
        }),
        VaultEvent::FolderCreated { path } => scoped_single_folder(path, root, |path| {
            VaultEvent::FolderCreated { path }
        }),
        VaultEvent::FolderDeleted { path } => scoped_single_folder(path, root, |path| {
            VaultEvent::FolderDeleted { path }
        }),
        VaultEvent::FileRenamed { from, to } => {
            let (scope, from, to) = scope_endpoints(
                file_inside(from, root),
                file_inside(to, root),
                || strip_file(from, root),
                || from.clone(),
                || strip_file(to, root),
                || to.clone(),
            );
            ScopedEvent {
                scope,
                event: VaultEvent::FileRenamed { from, to },
            }
        }
        VaultEvent::FolderRenamed { from, to } => {
            let (scope, from, to) = scope_endpoints(
                folder_inside(from, root),
                folder_inside(to, root),
                || strip_folder(from, root),
                || from.clone(),
                || strip_folder(to, root),
                || to.clone(),
            );
            ScopedEvent {
                scope,
                event: VaultEvent::FolderRenamed { from, to },
            }
        }
    }
}

fn scoped_single_file(
    path: &FilePath,
    root: &FolderPath,
    build: impl FnOnce(FilePath) -> VaultEvent,
) -> ScopedEvent {
    if file_inside(path, root) {
        ScopedEvent {
            scope: Scope::Inside,
            event: build(strip_file(path, root)),
        }
    } else {
        ScopedEvent {
            scope: Scope::Outside,
            event: build(path.clone()),
        }
    }
}

fn scoped_single_folder(
    path: &FolderPath,
    root: &FolderPath,
    build: impl FnOnce(FolderPath) -> VaultEvent,
) -> ScopedEvent {
    if folder_inside(path, root) {
        ScopedEvent {
            scope: Scope::Inside,
            event: build(strip_folder(path, root)),
        }
    } else {
        ScopedEvent {
            scope: Scope::Outside,
            event: build(path.clone()),
        }
    }
}

fn scope_endpoints<P>(
    from_inside: bool,
    to_inside: bool,
    strip_from: impl FnOnce() -> P,
    keep_from: impl FnOnce() -> P,
    strip_to: impl FnOnce() -> P,
    keep_to: impl FnOnce() -> P,
) -> (Scope, P, P) {
    match (from_inside, to_inside) {
        (true, true) => (Scope::Inside, strip_from(), strip_to()),
        (false, false) => (Scope::Outside, keep_from(), keep_to()),
        (true, false) => (Scope::InsideToOutside, strip_from(), keep_to()),
        (false, true) => (Scope::OutsideToInside, keep_from(), strip_to()),
    }
}

/// Re-attach the root prefix removed by [`library_scope`]. Exact inverse
/// for every scope and event kind.
pub fn vault_scope(scoped: &ScopedEvent, root: &FolderPath) -> VaultEvent {
    let prefix_folder = |path: &FolderPath| path.prepend(root);
    let prefix_file = |path: &FilePath| path.with_folder(path.folder.prepend(root));

    match (&scoped.event, scoped.scope) {
        (VaultEvent::FileCreated { path }, Scope::Inside) => VaultEvent::FileCreated {
            path: prefix_file(path),
        },
        (VaultEvent::FileDeleted { path }, Scope::Inside) => VaultEvent::FileDeleted {
            path: prefix_file(path),
        },
        (VaultEvent::FolderCreated { path }, Scope::Inside) => VaultEvent::FolderCreated {
            path: prefix_folder(path),
        },
        (VaultEvent::FolderDeleted { path }, Scope::Inside) => VaultEvent::FolderDeleted {
            path: prefix_folder(path),
        },
        (VaultEvent::FileRenamed { from, to }, scope) => {
            let (from, to) = match scope {
                Scope::Inside => (prefix_file(from), prefix_file(to)),
                Scope::Outside => (from.clone(), to.clone()),
                Scope::InsideToOutside => (prefix_file(from), to.clone()),
                Scope::OutsideToInside => (from.clone(), prefix_file(to)),
            };
            VaultEvent::FileRenamed { from, to }
        }
        (VaultEvent::FolderRenamed { from, to }, scope) => {
            let (from, to) = match scope {
                Scope::Inside => (prefix_folder(from), prefix_folder(to)),
                Scope::Outside => (from.clone(), to.clone()),
                Scope::InsideToOutside => (prefix_folder(from), to.clone()),
                Scope::OutsideToInside => (from.clone(), prefix_folder(to)),
            };
            VaultEvent::FolderRenamed { from, to }
        }
        // Non-rename events are only ever Inside or Outside.
        (event, _) => event.clone(),
    }
}
