//! In-memory library tree.
//!
//! The tree is derived state: rebuilt from the vault by a full scan and
//! mutated incrementally as events arrive. It never serializes to disk.
//! Mutations are locator-based and intentionally permissive: deleting or
//! renaming a node that no longer resolves is an observable no-op rather
//! than an error, which lets stale locators from a prior burst land
//! harmlessly.

pub mod action;
pub mod locator;
pub mod node;

pub use action::TreeAction;
pub use locator::{Locator, TargetKind};
pub use node::{LeafNode, SectionNode, Status, TreeNode};

use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::{debug, warn};

/// A root-relative chain of section names (root inclusive).
pub type Chain = Vec<String>;

/// How an action landed on the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The tree shape or a status changed.
    Changed,
    /// An idempotent re-application; nothing to do.
    Unchanged,
    /// The locator did not resolve; nothing was done. Distinct from
    /// `Unchanged` so callers and tests can assert the no-op happened.
    Noop,
}

/// Result of applying one action, including the structural side effects
/// the healer needs to mirror physically.
#[derive(Debug, Clone)]
pub struct ApplyResult {
    pub outcome: ApplyOutcome,
    /// Sections newly created (auto-created intermediates included),
    /// shallowest first.
    pub created_sections: Vec<Chain>,
    /// Sections removed, by deletion or empty-ancestor pruning, deepest
    /// first.
    pub removed_sections: Vec<Chain>,
}

impl ApplyResult {
    fn noop() -> Self {
        Self {
            outcome: ApplyOutcome::Noop,
            created_sections: Vec::new(),
            removed_sections: Vec::new(),
        }
    }

    fn unchanged() -> Self {
        Self {
            outcome: ApplyOutcome::Unchanged,
            created_sections: Vec::new(),
            removed_sections: Vec::new(),
        }
    }
}

#[derive(Default)]
struct CoreNameIndex {
    dirty: bool,
    by_core: HashMap<String, Vec<Locator>>,
}

/// The mutable library hierarchy.
pub struct Tree {
    root: SectionNode,
    index: RwLock<CoreNameIndex>,
}

impl Tree {
    pub fn new(root_name: &str) -> Self {
        Self {
            root: SectionNode::new(root_name),
            index: RwLock::new(CoreNameIndex {
                dirty: true,
                by_core: HashMap::new(),
            }),
        }
    }

    pub fn root_name(&self) -> &str {
        &self.root.name
    }

    /// Resolve a locator to a node, checking both chain and target kind.
    pub fn find(&self, locator: &Locator) -> Option<&TreeNode> {
        let node = self.node_at(&locator.chain)?;
        match (&locator.target, node) {
            (TargetKind::Section, TreeNode::Section(_)) => Some(node),
            (TargetKind::Leaf { .. }, TreeNode::Leaf(_)) => Some(node),
            _ => None,
        }
    }

    /// All locators whose node name equals `core`, anywhere in the tree.
    ///
    /// Backed by a cache that is invalidated unconditionally on every
    /// successful mutation and rebuilt lazily on the next read.
    pub fn find_by_core_name(&self, core: &str) -> Vec<Locator> {
        {
            let index = self.index.read();
            if !index.dirty {
                return index.by_core.get(core).cloned().unwrap_or_default();
            }
        }
        let mut index = self.index.write();
        if index.dirty {
            let mut by_core: HashMap<String, Vec<Locator>> = HashMap::new();
            let mut chain = vec![self.root.name.clone()];
            collect_core_names(&self.root, &mut chain, &mut by_core);
            index.by_core = by_core;
            index.dirty = false;
        }
        index.by_core.get(core).cloned().unwrap_or_default()
    }

    /// Apply one mutation. Never errors; see [`ApplyOutcome`].
    pub fn apply(&mut self, action: &TreeAction) -> ApplyResult {
        let result = match action {
            TreeAction::Create { locator, status } => self.apply_create(locator, *status),
            TreeAction::Delete { locator } => self.apply_delete(locator),
            TreeAction::Rename { locator, new_name } => self.apply_rename(locator, new_name),
            TreeAction::Move { locator, new_parent } => self.apply_move(locator, new_parent),
            TreeAction::ChangeStatus { locator, status } => self.apply_status(locator, *status),
        };
        if result.outcome == ApplyOutcome::Changed {
            self.index.write().dirty = true;
        }
        if result.outcome == ApplyOutcome::Noop {
            debug!(
                action = action.kind_name(),
                locator = %action.locator(),
                "Tree action was a no-op (locator did not resolve)"
            );
        }
        result
    }

    fn apply_create(&mut self, locator: &Locator, status: Status) -> ApplyResult {
        if locator.chain.is_empty() || locator.chain[0] != self.root.name {
            return ApplyResult::noop();
        }

        match &locator.target {
            TargetKind::Section => {
                if locator.chain.len() == 1 {
                    return ApplyResult::unchanged(); // the root always exists
                }
                let mut created = Vec::new();
                self.ensure_sections(&locator.chain, &mut created);
                if created.is_empty() {
                    ApplyResult::unchanged()
                } else {
                    ApplyResult {
                        outcome: ApplyOutcome::Changed,
                        created_sections: created,
                        removed_sections: Vec::new(),
                    }
                }
            }
            TargetKind::Leaf { extension } => {
                if locator.chain.len() < 2 {
                    return ApplyResult::noop();
                }
                let mut created = Vec::new();
                self.ensure_sections(locator.parent_chain(), &mut created);
                let name = locator.name().to_string();
                let leaf = LeafNode {
                    name: name.clone(),
                    extension: extension.clone(),
                    status,
                };
                let Some(parent) = self.section_mut(locator.parent_chain()) else {
                    return ApplyResult::noop();
                };
                if matches!(parent.children.get(&name), Some(TreeNode::Section(_))) {
                    warn!(
                        name = %name,
                        parent = %locator.parent_chain().join("/"),
                        "Section occupies a required leaf name; replacing with a leaf"
                    );
                }
                let changed = match parent.children.get(&name) {
                    Some(TreeNode::Leaf(existing)) if *existing == leaf => false,
                    _ => {
                        parent.children.insert(name, TreeNode::Leaf(leaf));
                        true
                    }
                };
                if changed || !created.is_empty() {
                    ApplyResult {
                        outcome: ApplyOutcome::Changed,
                        created_sections: created,
                        removed_sections: Vec::new(),
                    }
                } else {
                    ApplyResult::unchanged()
                }
            }
        }
    }

    fn apply_delete(&mut self, locator: &Locator) -> ApplyResult {
        if self.find(locator).is_none() {
            return ApplyResult::noop();
        }
        if locator.chain.len() < 2 {
            // The root cannot be deleted.
            return ApplyResult::noop();
        }

        let mut removed = Vec::new();
        if locator.is_section() {
            collect_removed_sections(self.node_at(&locator.chain), &locator.chain, &mut removed);
        }

        let name = locator.name().to_string();
        let Some(parent) = self.section_mut(locator.parent_chain()) else {
            return ApplyResult::noop();
        };
        parent.children.remove(&name);
        self.prune_empty(locator.parent_chain(), &mut removed);

        ApplyResult {
            outcome: ApplyOutcome::Changed,
            created_sections: Vec::new(),
            removed_sections: removed,
        }
    }

    fn apply_rename(&mut self, locator: &Locator, new_name: &str) -> ApplyResult {
        if self.find(locator).is_none() || locator.chain.len() < 2 {
            return ApplyResult::noop();
        }
        if locator.name() == new_name {
            return ApplyResult::unchanged();
        }

        let old_name = locator.name().to_string();
        let Some(parent) = self.section_mut(locator.parent_chain()) else {
            return ApplyResult::noop();
        };
        let Some(mut node) = parent.children.remove(&old_name) else {
            return ApplyResult::noop();
        };
        match &mut node {
            TreeNode::Section(section) => section.name = new_name.to_string(),
            TreeNode::Leaf(leaf) => leaf.name = new_name.to_string(),
        }
        if parent.children.contains_key(new_name) {
            warn!(
                name = new_name,
                parent = %locator.parent_chain().join("/"),
                "Rename target name already occupied; replacing"
            );
        }
        parent.children.insert(new_name.to_string(), node);

        ApplyResult {
            outcome: ApplyOutcome::Changed,
            created_sections: Vec::new(),
            removed_sections: Vec::new(),
        }
    }

    fn apply_move(&mut self, locator: &Locator, new_parent: &[String]) -> ApplyResult {
        if self.find(locator).is_none() || locator.chain.len() < 2 {
            return ApplyResult::noop();
        }
        if new_parent == locator.parent_chain() {
            return ApplyResult::unchanged();
        }
        if new_parent.len() >= locator.chain.len()
            && new_parent[..locator.chain.len()] == locator.chain[..]
        {
            warn!(locator = %locator, "Refusing to move a section into its own subtree");
            return ApplyResult::noop();
        }
        if new_parent.is_empty() || new_parent[0] != self.root.name {
            return ApplyResult::noop();
        }

        let name = locator.name().to_string();
        let Some(old_parent) = self.section_mut(locator.parent_chain()) else {
            return ApplyResult::noop();
        };
        let Some(node) = old_parent.children.remove(&name) else {
            return ApplyResult::noop();
        };

        let mut removed = Vec::new();
        self.prune_empty(locator.parent_chain(), &mut removed);

        let mut created = Vec::new();
        self.ensure_sections(new_parent, &mut created);
        // A destination under the emptied old parent recreates sections
        // pruning just removed; those chains are net unchanged and must
        // not be reported either way.
        let recreated: Vec<Chain> = removed
            .iter()
            .filter(|chain| created.contains(chain))
            .cloned()
            .collect();
        removed.retain(|chain| !recreated.contains(chain));
        created.retain(|chain| !recreated.contains(chain));
        let Some(target) = self.section_mut(new_parent) else {
            return ApplyResult::noop();
        };
        if target.children.contains_key(&name) {
            warn!(
                name = %name,
                parent = %new_parent.join("/"),
                "Move destination name already occupied; replacing"
            );
        }
        target.children.insert(name, node);

        ApplyResult {
            outcome: ApplyOutcome::Changed,
            created_sections: created,
            removed_sections: removed,
        }
    }

    fn apply_status(&mut self, locator: &Locator, status: Status) -> ApplyResult {
        // Bulk status on the root section itself.
        if locator.is_section() && locator.chain.len() == 1 && locator.chain[0] == self.root.name {
            let mut changed = false;
            for child in self.root.children.values_mut() {
                changed |= set_status_recursive(child, status);
            }
            return if changed {
                ApplyResult {
                    outcome: ApplyOutcome::Changed,
                    created_sections: Vec::new(),
                    removed_sections: Vec::new(),
                }
            } else {
                ApplyResult::unchanged()
            };
        }
        if self.find(locator).is_none() {
            return ApplyResult::noop();
        }
        let Some(node) = self.node_at_mut(&locator.chain) else {
            return ApplyResult::noop();
        };
        let changed = set_status_recursive(node, status);
        if changed {
            ApplyResult {
                outcome: ApplyOutcome::Changed,
                created_sections: Vec::new(),
                removed_sections: Vec::new(),
            }
        } else {
            ApplyResult::unchanged()
        }
    }

    /// All leaf locators in the subtree rooted at `chain` (full chains).
    pub fn leaves_under(&self, chain: &[String]) -> Vec<Locator> {
        let mut out = Vec::new();
        if let Some(section) = self.section(chain) {
            let mut prefix = chain.to_vec();
            collect_leaves(section, &mut prefix, &mut out);
        } else if let Some(TreeNode::Leaf(leaf)) = self.node_ref_at(chain) {
            out.push(Locator::leaf(chain.to_vec(), &leaf.extension));
        }
        out
    }

    /// All section chains in the subtree rooted at `chain`, the section
    /// itself first.
    pub fn sections_under(&self, chain: &[String]) -> Vec<Chain> {
        let mut out = Vec::new();
        if let Some(section) = self.section(chain) {
            let mut prefix = chain.to_vec();
            collect_sections(section, &mut prefix, &mut out);
        }
        out
    }

    /// Direct children of a section: (name, kind) pairs in name order.
    pub fn section_children(&self, chain: &[String]) -> Option<Vec<(String, TargetKind)>> {
        let section = self.section(chain)?;
        Some(
            section
                .children
                .iter()
                .map(|(name, node)| {
                    let kind = match node {
                        TreeNode::Section(_) => TargetKind::Section,
                        TreeNode::Leaf(leaf) => TargetKind::Leaf {
                            extension: leaf.extension.clone(),
                        },
                    };
                    (name.clone(), kind)
                })
                .collect(),
        )
    }

    /// Total counts of (sections, leaves), root excluded from sections.
    pub fn counts(&self) -> (usize, usize) {
        let mut sections = 0;
        let mut leaves = 0;
        count_nodes(&self.root, &mut sections, &mut leaves);
        (sections, leaves)
    }

    fn node_at(&self, chain: &[String]) -> Option<&TreeNode> {
        self.node_ref_at(chain)
    }

    fn node_ref_at(&self, chain: &[String]) -> Option<&TreeNode> {
        if chain.is_empty() || chain[0] != self.root.name {
            return None;
        }
        // The root is not reachable as a TreeNode value; synthesize walks
        // from its children.
        let mut current: Option<&TreeNode> = None;
        let mut children = &self.root.children;
        for name in &chain[1..] {
            let node = children.get(name)?;
            children = match node {
                TreeNode::Section(section) => &section.children,
                TreeNode::Leaf(_) => {
                    // A leaf mid-chain only resolves if it is the last hop.
                    if name != chain.last().unwrap() {
                        return None;
                    }
                    current = Some(node);
                    return current;
                }
            };
            current = Some(node);
        }
        if chain.len() == 1 {
            None // the root itself; see `root_section`
        } else {
            current
        }
    }

    fn node_at_mut(&mut self, chain: &[String]) -> Option<&mut TreeNode> {
        if chain.len() < 2 || chain[0] != self.root.name {
            return None;
        }
        let mut children = &mut self.root.children;
        for (i, name) in chain[1..].iter().enumerate() {
            let is_last = i == chain.len() - 2;
            let node = children.get_mut(name)?;
            if is_last {
                return Some(node);
            }
            children = match node {
                TreeNode::Section(section) => &mut section.children,
                TreeNode::Leaf(_) => return None,
            };
        }
        None
    }

    fn section_mut(&mut self, chain: &[String]) -> Option<&mut SectionNode> {
        if chain.is_empty() || chain[0] != self.root.name {
            return None;
        }
        let mut section = &mut self.root;
        for name in &chain[1..] {
            section = match section.children.get_mut(name) {
                Some(TreeNode::Section(child)) => child,
                _ => return None,
            };
        }
        Some(section)
    }

    fn section(&self, chain: &[String]) -> Option<&SectionNode> {
        if chain.is_empty() || chain[0] != self.root.name {
            return None;
        }
        let mut section = &self.root;
        for name in &chain[1..] {
            section = match section.children.get(name) {
                Some(TreeNode::Section(child)) => child,
                _ => return None,
            };
        }
        Some(section)
    }

    /// Create every missing section along `chain`, recording created chains
    /// shallowest first. A leaf occupying a needed name is replaced.
    fn ensure_sections(&mut self, chain: &[String], created: &mut Vec<Chain>) {
        if chain.is_empty() || chain[0] != self.root.name {
            return;
        }
        let mut section = &mut self.root;
        for (i, name) in chain[1..].iter().enumerate() {
            let needs_insert = match section.children.get(name) {
                Some(TreeNode::Section(_)) => false,
                Some(TreeNode::Leaf(_)) => {
                    warn!(
                        name = %name,
                        chain = %chain[..=i + 1].join("/"),
                        "Leaf occupies a required section name; replacing with a section"
                    );
                    true
                }
                None => true,
            };
            if needs_insert {
                section
                    .children
                    .insert(name.clone(), TreeNode::Section(SectionNode::new(name)));
                created.push(chain[..=i + 1].to_vec());
            }
            section = match section.children.get_mut(name) {
                Some(TreeNode::Section(child)) => child,
                _ => return,
            };
        }
    }

    /// Remove empty sections walking up from `chain` toward (but never
    /// including) the root.
    fn prune_empty(&mut self, chain: &[String], removed: &mut Vec<Chain>) {
        let mut depth = chain.len();
        while depth > 1 {
            let sub = &chain[..depth];
            let is_empty = self
                .section(sub)
                .map(|s| s.children.is_empty())
                .unwrap_or(false);
            if !is_empty {
                break;
            }
            let name = sub[depth - 1].clone();
            if let Some(parent) = self.section_mut(&sub[..depth - 1]) {
                parent.children.remove(&name);
                removed.push(sub.to_vec());
            }
            depth -= 1;
        }
    }
}

fn set_status_recursive(node: &mut TreeNode, status: Status) -> bool {
    match node {
        TreeNode::Leaf(leaf) => {
            if leaf.status == status {
                false
            } else {
                leaf.status = status;
                true
            }
        }
        TreeNode::Section(section) => {
            let mut changed = false;
            for child in section.children.values_mut() {
                changed |= set_status_recursive(child, status);
            }
            changed
        }
    }
}

fn collect_leaves(section: &SectionNode, prefix: &mut Chain, out: &mut Vec<Locator>) {
    for (name, node) in &section.children {
        prefix.push(name.clone());
        match node {
            TreeNode::Leaf(leaf) => out.push(Locator::leaf(prefix.clone(), &leaf.extension)),
            TreeNode::Section(child) => collect_leaves(child, prefix, out),
        }
        prefix.pop();
    }
}

fn collect_sections(section: &SectionNode, prefix: &mut Chain, out: &mut Vec<Chain>) {
    out.push(prefix.clone());
    for (name, node) in &section.children {
        if let TreeNode::Section(child) = node {
            prefix.push(name.clone());
            collect_sections(child, prefix, out);
            prefix.pop();
        }
    }
}

fn collect_removed_sections(node: Option<&TreeNode>, chain: &[String], out: &mut Vec<Chain>) {
    if let Some(TreeNode::Section(section)) = node {
        // Deepest first so physical trash ordering is natural.
        for (name, child) in &section.children {
            if matches!(child, TreeNode::Section(_)) {
                let mut sub = chain.to_vec();
                sub.push(name.clone());
                collect_removed_sections(Some(child), &sub, out);
            }
        }
        out.push(chain.to_vec());
    }
}

fn collect_core_names(
    section: &SectionNode,
    chain: &mut Chain,
    by_core: &mut HashMap<String, Vec<Locator>>,
) {
    for (name, node) in &section.children {
        chain.push(name.clone());
        match node {
            TreeNode::Leaf(leaf) => {
                by_core
                    .entry(name.clone())
                    .or_default()
                    .push(Locator::leaf(chain.clone(), &leaf.extension));
            }
            TreeNode::Section(child) => {
                by_core
                    .entry(name.clone())
                    .or_default()
                    .push(Locator::section(chain.clone()));
                collect_core_names(child, chain, by_core);
            }
        }
        chain.pop();
    }
}

fn count_nodes(section: &SectionNode, sections: &mut usize, leaves: &mut usize) {
    for node in section.children.values() {
        match node {
            TreeNode::Leaf(_) => *leaves += 1,
            TreeNode::Section(child) => {
                *sections += 1;
                count_nodes(child, sections, leaves);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(names: &[&str]) -> Chain {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn leaf_create(names: &[&str]) -> TreeAction {
        TreeAction::Create {
            locator: Locator::leaf(chain(names), "md"),
            status: Status::Unknown,
        }
    }

    #[test]
    fn create_auto_creates_intermediate_sections() {
        let mut tree = Tree::new("Library");
        let result = tree.apply(&leaf_create(&["Library", "recipes", "soup", "Note"]));
        assert_eq!(result.outcome, ApplyOutcome::Changed);
        assert_eq!(
            result.created_sections,
            vec![chain(&["Library", "recipes"]), chain(&["Library", "recipes", "soup"])]
        );
        assert!(tree
            .find(&Locator::leaf(chain(&["Library", "recipes", "soup", "Note"]), "md"))
            .is_some());
    }

    #[test]
    fn create_is_idempotent() {
        let mut tree = Tree::new("Library");
        let action = leaf_create(&["Library", "recipes", "Note"]);
        assert_eq!(tree.apply(&action).outcome, ApplyOutcome::Changed);
        let second = tree.apply(&action);
        assert_eq!(second.outcome, ApplyOutcome::Unchanged);
        assert!(second.created_sections.is_empty());
    }

    #[test]
    fn delete_prunes_empty_ancestors_but_not_root() {
        let mut tree = Tree::new("Library");
        tree.apply(&leaf_create(&["Library", "a", "b", "Note"]));
        let result = tree.apply(&TreeAction::Delete {
            locator: Locator::leaf(chain(&["Library", "a", "b", "Note"]), "md"),
        });
        assert_eq!(result.outcome, ApplyOutcome::Changed);
        assert_eq!(
            result.removed_sections,
            vec![chain(&["Library", "a", "b"]), chain(&["Library", "a"])]
        );
        assert!(tree.find(&Locator::section(chain(&["Library", "a"]))).is_none());
        assert_eq!(tree.root_name(), "Library");
    }

    #[test]
    fn delete_missing_locator_is_noop() {
        let mut tree = Tree::new("Library");
        let result = tree.apply(&TreeAction::Delete {
            locator: Locator::leaf(chain(&["Library", "ghost"]), "md"),
        });
        assert_eq!(result.outcome, ApplyOutcome::Noop);
    }

    #[test]
    fn rename_missing_locator_is_noop() {
        let mut tree = Tree::new("Library");
        let result = tree.apply(&TreeAction::Rename {
            locator: Locator::section(chain(&["Library", "ghost"])),
            new_name: "spirit".to_string(),
        });
        assert_eq!(result.outcome, ApplyOutcome::Noop);
    }

    #[test]
    fn rename_section_keeps_children() {
        let mut tree = Tree::new("Library");
        tree.apply(&leaf_create(&["Library", "soup", "Note"]));
        let result = tree.apply(&TreeAction::Rename {
            locator: Locator::section(chain(&["Library", "soup"])),
            new_name: "stew".to_string(),
        });
        assert_eq!(result.outcome, ApplyOutcome::Changed);
        assert!(tree
            .find(&Locator::leaf(chain(&["Library", "stew", "Note"]), "md"))
            .is_some());
    }

    #[test]
    fn move_reparents_and_prunes_old_parent() {
        let mut tree = Tree::new("Library");
        tree.apply(&leaf_create(&["Library", "a", "Note"]));
        let result = tree.apply(&TreeAction::Move {
            locator: Locator::leaf(chain(&["Library", "a", "Note"]), "md"),
            new_parent: chain(&["Library", "b"]),
        });
        assert_eq!(result.outcome, ApplyOutcome::Changed);
        assert_eq!(result.created_sections, vec![chain(&["Library", "b"])]);
        assert_eq!(result.removed_sections, vec![chain(&["Library", "a"])]);
        assert!(tree
            .find(&Locator::leaf(chain(&["Library", "b", "Note"]), "md"))
            .is_some());
    }

    #[test]
    fn move_into_child_of_emptied_parent_reports_no_removal() {
        let mut tree = Tree::new("Library");
        tree.apply(&leaf_create(&["Library", "a", "Note"]));
        // Moving the only leaf of `a` into `a/b` empties `a` and then
        // recreates it on the way back down.
        let result = tree.apply(&TreeAction::Move {
            locator: Locator::leaf(chain(&["Library", "a", "Note"]), "md"),
            new_parent: chain(&["Library", "a", "b"]),
        });
        assert_eq!(result.outcome, ApplyOutcome::Changed);
        assert!(result.removed_sections.is_empty());
        assert_eq!(result.created_sections, vec![chain(&["Library", "a", "b"])]);
        assert!(tree
            .find(&Locator::leaf(chain(&["Library", "a", "b", "Note"]), "md"))
            .is_some());
        assert!(tree.find(&Locator::section(chain(&["Library", "a"]))).is_some());
    }

    #[test]
    fn leaf_create_over_a_section_replaces_it() {
        let mut tree = Tree::new("Library");
        tree.apply(&leaf_create(&["Library", "a", "b", "Note"]));
        let result = tree.apply(&leaf_create(&["Library", "a", "b"]));
        assert_eq!(result.outcome, ApplyOutcome::Changed);
        assert!(tree
            .find(&Locator::leaf(chain(&["Library", "a", "b"]), "md"))
            .is_some());
        assert!(tree
            .find(&Locator::leaf(chain(&["Library", "a", "b", "Note"]), "md"))
            .is_none());
    }

    #[test]
    fn move_into_own_subtree_is_noop() {
        let mut tree = Tree::new("Library");
        tree.apply(&leaf_create(&["Library", "a", "b", "Note"]));
        let result = tree.apply(&TreeAction::Move {
            locator: Locator::section(chain(&["Library", "a"])),
            new_parent: chain(&["Library", "a", "b"]),
        });
        assert_eq!(result.outcome, ApplyOutcome::Noop);
    }

    #[test]
    fn change_status_on_section_recurses() {
        let mut tree = Tree::new("Library");
        tree.apply(&leaf_create(&["Library", "a", "x"]));
        tree.apply(&leaf_create(&["Library", "a", "b", "y"]));
        let result = tree.apply(&TreeAction::ChangeStatus {
            locator: Locator::section(chain(&["Library", "a"])),
            status: Status::Done,
        });
        assert_eq!(result.outcome, ApplyOutcome::Changed);
        for locator in tree.leaves_under(&chain(&["Library", "a"])) {
            let TreeNode::Leaf(leaf) = tree.find(&locator).unwrap() else {
                panic!("expected leaf")
            };
            assert_eq!(leaf.status, Status::Done);
        }
        // A second identical pass changes nothing.
        let again = tree.apply(&TreeAction::ChangeStatus {
            locator: Locator::section(chain(&["Library", "a"])),
            status: Status::Done,
        });
        assert_eq!(again.outcome, ApplyOutcome::Unchanged);
    }

    #[test]
    fn core_name_index_tracks_mutations() {
        let mut tree = Tree::new("Library");
        tree.apply(&leaf_create(&["Library", "a", "Note"]));
        tree.apply(&leaf_create(&["Library", "b", "Note"]));
        assert_eq!(tree.find_by_core_name("Note").len(), 2);

        tree.apply(&TreeAction::Delete {
            locator: Locator::leaf(chain(&["Library", "a", "Note"]), "md"),
        });
        let found = tree.find_by_core_name("Note");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].chain, chain(&["Library", "b", "Note"]));
    }

    #[test]
    fn sections_under_lists_subtree() {
        let mut tree = Tree::new("Library");
        tree.apply(&leaf_create(&["Library", "a", "b", "x"]));
        tree.apply(&leaf_create(&["Library", "a", "c", "y"]));
        let sections = tree.sections_under(&chain(&["Library", "a"]));
        assert_eq!(
            sections,
            vec![
                chain(&["Library", "a"]),
                chain(&["Library", "a", "b"]),
                chain(&["Library", "a", "c"]),
            ]
        );
    }

    #[test]
    fn delete_section_reports_descendant_sections() {
        let mut tree = Tree::new("Library");
        tree.apply(&leaf_create(&["Library", "a", "b", "x"]));
        let result = tree.apply(&TreeAction::Delete {
            locator: Locator::section(chain(&["Library", "a"])),
        });
        assert_eq!(result.outcome, ApplyOutcome::Changed);
        assert!(result.removed_sections.contains(&chain(&["Library", "a"])));
        assert!(result.removed_sections.contains(&chain(&["Library", "a", "b"])));
    }
}
