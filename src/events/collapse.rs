//! Burst normalization: exact dedupe, rename-chain collapsing, and root
//! reduction.
//!
//! Runs once per burst over the full raw event list. A folder drag can
//! produce hundreds of per-file rename events; after this pass only the
//! events that carry independent intent remain in `roots`.

use super::{FilePath, FolderPath, VaultEvent};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Output of burst normalization.
#[derive(Debug, Clone, Default)]
pub struct ReducedEvents {
    /// Events not implied by an ancestor folder operation in the same burst.
    pub roots: Vec<VaultEvent>,
    /// The full collapsed list, implied events included.
    pub all: Vec<VaultEvent>,
}

/// Dedupe, collapse rename chains, and reduce to root events.
pub fn normalize_burst(events: Vec<VaultEvent>) -> ReducedEvents {
    let raw_count = events.len();
    let deduped = dedupe_events(events);
    let collapsed = collapse_renames(deduped);
    let reduced = reduce_roots(collapsed);
    debug!(
        raw = raw_count,
        collapsed = reduced.all.len(),
        roots = reduced.roots.len(),
        "Normalized event burst"
    );
    reduced
}

/// Keep only the last event for any (kind, path) key.
pub fn dedupe_events(events: Vec<VaultEvent>) -> Vec<VaultEvent> {
    let mut last_index: HashMap<String, usize> = HashMap::new();
    for (index, event) in events.iter().enumerate() {
        last_index.insert(event_key(event), index);
    }
    events
        .into_iter()
        .enumerate()
        .filter(|(index, event)| last_index.get(&event_key(event)) == Some(index))
        .map(|(_, event)| event)
        .collect()
}

fn event_key(event: &VaultEvent) -> String {
    match event {
        VaultEvent::FileCreated { path } => format!("fc:{}", path),
        VaultEvent::FileDeleted { path } => format!("fd:{}", path),
        VaultEvent::FileRenamed { from, to } => format!("fr:{}>{}", from, to),
        VaultEvent::FolderCreated { path } => format!("dc:{}", path),
        VaultEvent::FolderDeleted { path } => format!("dd:{}", path),
        VaultEvent::FolderRenamed { from, to } => format!("dr:{}>{}", from, to),
    }
}

/// Collapse rename chains, per node kind (file vs folder) independently.
///
/// A chain root is a `from` that never appears as a `to`; walking forward
/// from each root yields one collapsed `root_from -> final_to`. A revisited
/// `to` means a cycle: the walk stops and the single-hop result is emitted
/// for that root. No-op collapses (`from == to`) are dropped entirely.
pub fn collapse_renames(events: Vec<VaultEvent>) -> Vec<VaultEvent> {
    let mut file_forward: HashMap<String, (FilePath, FilePath)> = HashMap::new();
    let mut folder_forward: HashMap<String, (FolderPath, FolderPath)> = HashMap::new();
    let mut out = Vec::new();

    for event in events {
        match event {
            VaultEvent::FileRenamed { from, to } => {
                file_forward.insert(from.to_string(), (from, to));
            }
            VaultEvent::FolderRenamed { from, to } => {
                folder_forward.insert(from.to_string(), (from, to));
            }
            other => out.push(other),
        }
    }

    let mut file_collapsed = collapse_chain(&file_forward, |p| p.to_string());
    file_collapsed.sort_by(|a, b| a.0.to_string().cmp(&b.0.to_string()));
    for (from, to) in file_collapsed {
        out.push(VaultEvent::FileRenamed { from, to });
    }

    let mut folder_collapsed = collapse_chain(&folder_forward, |p| p.to_string());
    folder_collapsed.sort_by(|a, b| a.0.to_string().cmp(&b.0.to_string()));
    for (from, to) in folder_collapsed {
        out.push(VaultEvent::FolderRenamed { from, to });
    }

    out
}

fn collapse_chain<P: Clone>(
    forward: &HashMap<String, (P, P)>,
    key: impl Fn(&P) -> String,
) -> Vec<(P, P)> {
    let to_keys: HashSet<String> = forward.values().map(|(_, to)| key(to)).collect();
    let mut collapsed = Vec::new();

    for (from_key, (from, first_to)) in forward {
        if to_keys.contains(from_key) {
            continue; // not a chain root
        }

        let mut visited: HashSet<String> = HashSet::new();
        visited.insert(from_key.clone());
        visited.insert(key(first_to));

        let mut current = first_to.clone();
        while let Some((_, next)) = forward.get(&key(&current)) {
            if visited.contains(&key(next)) {
                // Cycle mid-chain: fall back to the single-hop result.
                current = first_to.clone();
                break;
            }
            visited.insert(key(next));
            current = next.clone();
        }

        if key(from) != key(&current) {
            collapsed.push((from.clone(), current));
        }
    }

    collapsed
}

/// Drop events already implied by an ancestor folder operation in the same
/// burst. Implied events remain in `all` for completeness.
pub fn reduce_roots(events: Vec<VaultEvent>) -> ReducedEvents {
    let folder_renames: Vec<(FolderPath, FolderPath)> = events
        .iter()
        .filter_map(|e| match e {
            VaultEvent::FolderRenamed { from, to } => Some((from.clone(), to.clone())),
            _ => None,
        })
        .collect();
    let folder_deletes: Vec<FolderPath> = events
        .iter()
        .filter_map(|e| match e {
            VaultEvent::FolderDeleted { path } => Some(path.clone()),
            _ => None,
        })
        .collect();

    let roots = events
        .iter()
        .filter(|event| !is_implied(event, &folder_renames, &folder_deletes))
        .cloned()
        .collect();

    ReducedEvents { roots, all: events }
}

fn is_implied(
    event: &VaultEvent,
    folder_renames: &[(FolderPath, FolderPath)],
    folder_deletes: &[FolderPath],
) -> bool {
    match event {
        VaultEvent::FileRenamed { from, to } => folder_renames.iter().any(|(f_from, f_to)| {
            rename_covers_file(f_from, f_to, from, to)
        }),
        VaultEvent::FolderRenamed { from, to } => folder_renames.iter().any(|(f_from, f_to)| {
            // A rename never implies itself.
            (f_from != from || f_to != to) && rename_covers_folder(f_from, f_to, from, to)
        }),
        VaultEvent::FileDeleted { path } => folder_deletes
            .iter()
            .any(|folder| path.folder.starts_with(folder)),
        VaultEvent::FolderDeleted { path } => folder_deletes
            .iter()
            .any(|folder| path.is_under(folder)),
        _ => false,
    }
}

fn rename_covers_file(
    folder_from: &FolderPath,
    folder_to: &FolderPath,
    from: &FilePath,
    to: &FilePath,
) -> bool {
    let (Some(rel_from), Some(rel_to)) = (
        from.folder.strip_prefix(folder_from),
        to.folder.strip_prefix(folder_to),
    ) else {
        return false;
    };
    rel_from == rel_to && from.basename() == to.basename()
}

fn rename_covers_folder(
    folder_from: &FolderPath,
    folder_to: &FolderPath,
    from: &FolderPath,
    to: &FolderPath,
) -> bool {
    let (Some(rel_from), Some(rel_to)) = (from.strip_prefix(folder_from), to.strip_prefix(folder_to))
    else {
        return false;
    };
    !rel_from.segments.is_empty() && rel_from == rel_to
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(path: &str) -> FilePath {
        FilePath::parse(path).unwrap()
    }

    fn folder(path: &str) -> FolderPath {
        FolderPath::parse(path)
    }

    fn file_rename(from: &str, to: &str) -> VaultEvent {
        VaultEvent::FileRenamed {
            from: file(from),
            to: file(to),
        }
    }

    #[test]
    fn dedupe_keeps_last_occurrence() {
        let events = vec![
            VaultEvent::FileCreated { path: file("L/a.md") },
            VaultEvent::FileDeleted { path: file("L/b.md") },
            VaultEvent::FileCreated { path: file("L/a.md") },
        ];
        let deduped = dedupe_events(events);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0], VaultEvent::FileDeleted { path: file("L/b.md") });
        assert_eq!(deduped[1], VaultEvent::FileCreated { path: file("L/a.md") });
    }

    #[test]
    fn collapses_two_hop_chain() {
        let events = vec![file_rename("L/a.md", "L/b.md"), file_rename("L/b.md", "L/c.md")];
        let collapsed = collapse_renames(events);
        assert_eq!(collapsed, vec![file_rename("L/a.md", "L/c.md")]);
    }

    #[test]
    fn collapses_three_hop_chain() {
        let events = vec![
            file_rename("L/b.md", "L/c.md"),
            file_rename("L/a.md", "L/b.md"),
            file_rename("L/c.md", "L/d.md"),
        ];
        let collapsed = collapse_renames(events);
        assert_eq!(collapsed, vec![file_rename("L/a.md", "L/d.md")]);
    }

    #[test]
    fn pure_cycle_collapses_to_nothing() {
        let events = vec![file_rename("L/a.md", "L/b.md"), file_rename("L/b.md", "L/a.md")];
        assert!(collapse_renames(events).is_empty());
    }

    #[test]
    fn chain_into_cycle_emits_single_hop() {
        // x -> a, then a -> b -> a. Root is x; the walk revisits a and
        // falls back to the single hop x -> a.
        let events = vec![
            file_rename("L/x.md", "L/a.md"),
            file_rename("L/a.md", "L/b.md"),
            file_rename("L/b.md", "L/a.md"),
        ];
        let collapsed = collapse_renames(events);
        assert_eq!(collapsed, vec![file_rename("L/x.md", "L/a.md")]);
    }

    #[test]
    fn folder_and_file_chains_collapse_independently() {
        let events = vec![
            file_rename("L/a.md", "L/b.md"),
            VaultEvent::FolderRenamed {
                from: folder("L/a"),
                to: folder("L/b"),
            },
            VaultEvent::FolderRenamed {
                from: folder("L/b"),
                to: folder("L/c"),
            },
        ];
        let collapsed = collapse_renames(events);
        assert!(collapsed.contains(&file_rename("L/a.md", "L/b.md")));
        assert!(collapsed.contains(&VaultEvent::FolderRenamed {
            from: folder("L/a"),
            to: folder("L/c"),
        }));
        assert_eq!(collapsed.len(), 2);
    }

    #[test]
    fn folder_rename_implies_descendant_file_rename() {
        let events = vec![
            VaultEvent::FolderRenamed {
                from: folder("Library/A"),
                to: folder("Library/B/A"),
            },
            file_rename("Library/A/x.md", "Library/B/A/x.md"),
        ];
        let reduced = reduce_roots(events);
        assert_eq!(reduced.roots.len(), 1);
        assert!(matches!(reduced.roots[0], VaultEvent::FolderRenamed { .. }));
        assert_eq!(reduced.all.len(), 2);
    }

    #[test]
    fn mismatched_relative_suffix_is_not_implied() {
        let events = vec![
            VaultEvent::FolderRenamed {
                from: folder("Library/A"),
                to: folder("Library/B"),
            },
            // Moved somewhere else inside the renamed folder; independent intent.
            file_rename("Library/A/x.md", "Library/B/sub/x.md"),
        ];
        let reduced = reduce_roots(events);
        assert_eq!(reduced.roots.len(), 2);
    }

    #[test]
    fn folder_delete_implies_descendant_deletes() {
        let events = vec![
            VaultEvent::FolderDeleted { path: folder("Library/A") },
            VaultEvent::FileDeleted { path: file("Library/A/x.md") },
            VaultEvent::FolderDeleted { path: folder("Library/A/sub") },
        ];
        let reduced = reduce_roots(events);
        assert_eq!(reduced.roots.len(), 1);
        assert_eq!(reduced.all.len(), 3);
    }
}
