//! Stage tree model
//!
//! Nodes live in a flat map keyed by id; the hierarchy is derived from
//! `parent_id` and sibling position from `order`. Every mutation either
//! succeeds and leaves the forest acyclic with orders `0..n` per sibling
//! list, or fails and leaves it untouched.

use orca_core::{OrcaError, StageId, StageNode};
use orca_store::StagePatch;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use tracing::{debug, warn};

/// Stage records keyed by id, as last known to be stored
pub type StageRecords = BTreeMap<StageId, StageNode>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StageTree {
    nodes: BTreeMap<StageId, StageNode>,
}

impl StageTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a tree from stored records, repairing whatever they hold:
    /// parents that do not exist become roots, a cycle is cut at the node
    /// that closes it, and sibling orders are renumbered contiguously
    /// keeping their relative order (ties go by name, then id).
    pub fn from_nodes(nodes: impl IntoIterator<Item = StageNode>) -> Self {
        let mut map: BTreeMap<StageId, StageNode> = BTreeMap::new();
        for node in nodes {
            if map.contains_key(&node.id) {
                warn!(stage = %node.id, "duplicate stage record ignored");
                continue;
            }
            map.insert(node.id.clone(), node);
        }

        let dangling: Vec<StageId> = map
            .values()
            .filter(|n| n.parent_id.as_ref().is_some_and(|p| !map.contains_key(p)))
            .map(|n| n.id.clone())
            .collect();
        for id in dangling {
            if let Some(node) = map.get_mut(&id) {
                debug!(stage = %id, "parent missing, promoted to root");
                node.parent_id = None;
            }
        }

        let ids: Vec<StageId> = map.keys().cloned().collect();
        for id in &ids {
            if closes_cycle(&map, id) {
                if let Some(node) = map.get_mut(id) {
                    warn!(stage = %id, "stage cycle broken");
                    node.parent_id = None;
                }
            }
        }

        let mut tree = Self { nodes: map };
        let parents: BTreeSet<Option<StageId>> =
            tree.nodes.values().map(|n| n.parent_id.clone()).collect();
        for parent in parents {
            let level = tree.sibling_ids(parent.as_ref());
            tree.renumber(&level);
        }
        tree
    }

    // ========== Mutations ==========

    /// Add a stage with a fresh id as the last child of `parent`
    /// (or the last root).
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        parent: Option<&StageId>,
    ) -> Result<StageNode, OrcaError> {
        self.insert_node(StageNode {
            id: StageId::generate(),
            name: name.into(),
            parent_id: parent.cloned(),
            order: 0,
        })
    }

    /// Add a stage whose id was assigned elsewhere. The node's own `order`
    /// is ignored; it always lands after its last sibling.
    pub fn insert_node(&mut self, mut node: StageNode) -> Result<StageNode, OrcaError> {
        if self.nodes.contains_key(&node.id) {
            return Err(OrcaError::DuplicateStage(node.id));
        }
        if let Some(parent) = &node.parent_id {
            if !self.nodes.contains_key(parent) {
                return Err(OrcaError::StageNotFound(parent.clone()));
            }
        }
        node.order = self.next_order(node.parent_id.as_ref());
        debug!(stage = %node.id, order = node.order, "stage inserted");
        self.nodes.insert(node.id.clone(), node.clone());
        Ok(node)
    }

    /// Detach a stage. Its children become roots after the existing roots,
    /// keeping their relative order.
    pub fn remove(&mut self, id: &StageId) -> Result<StageNode, OrcaError> {
        if !self.nodes.contains_key(id) {
            return Err(OrcaError::StageNotFound(id.clone()));
        }
        let children = self.sibling_ids(Some(id));
        let removed = self
            .nodes
            .remove(id)
            .ok_or_else(|| OrcaError::StageNotFound(id.clone()))?;

        let mut roots = self.sibling_ids(None);
        for child in &children {
            if let Some(node) = self.nodes.get_mut(child) {
                node.parent_id = None;
            }
        }
        roots.extend(children);
        self.renumber(&roots);

        if removed.parent_id.is_some() {
            let level = self.sibling_ids(removed.parent_id.as_ref());
            self.renumber(&level);
        }
        debug!(stage = %id, "stage removed");
        Ok(removed)
    }

    /// Move a stage to position `index` among the children of `new_parent`
    /// (roots when `None`). An index past the end appends.
    pub fn move_to(
        &mut self,
        id: &StageId,
        new_parent: Option<&StageId>,
        index: usize,
    ) -> Result<(), OrcaError> {
        let current_parent = self
            .nodes
            .get(id)
            .ok_or_else(|| OrcaError::StageNotFound(id.clone()))?
            .parent_id
            .clone();

        if let Some(target) = new_parent {
            if !self.nodes.contains_key(target) {
                return Err(OrcaError::StageNotFound(target.clone()));
            }
            if target == id {
                return Err(OrcaError::invalid_move(format!(
                    "stage {} cannot be its own parent",
                    id
                )));
            }
            if self.is_ancestor(id, target) {
                return Err(OrcaError::invalid_move(format!(
                    "stage {} is inside stage {}",
                    target, id
                )));
            }
        }

        let mut old_level = self.sibling_ids(current_parent.as_ref());
        old_level.retain(|s| s != id);
        let mut new_level = self.sibling_ids(new_parent);
        new_level.retain(|s| s != id);
        let index = index.min(new_level.len());
        new_level.insert(index, id.clone());

        if let Some(node) = self.nodes.get_mut(id) {
            node.parent_id = new_parent.cloned();
        }
        if current_parent.as_ref() != new_parent {
            self.renumber(&old_level);
        }
        self.renumber(&new_level);
        debug!(stage = %id, index, "stage moved");
        Ok(())
    }

    pub fn rename(&mut self, id: &StageId, name: impl Into<String>) -> Result<(), OrcaError> {
        let node = self
            .nodes
            .get_mut(id)
            .ok_or_else(|| OrcaError::StageNotFound(id.clone()))?;
        node.name = name.into();
        Ok(())
    }

    // ========== Queries ==========

    pub fn get(&self, id: &StageId) -> Option<&StageNode> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &StageId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All nodes, in id order
    pub fn nodes(&self) -> impl Iterator<Item = &StageNode> {
        self.nodes.values()
    }

    /// Direct children ordered by `order`
    pub fn children(&self, id: &StageId) -> Vec<&StageNode> {
        self.siblings(Some(id))
    }

    pub fn roots(&self) -> Vec<&StageNode> {
        self.siblings(None)
    }

    /// Everything below `id`, depth first, parents before their children
    pub fn descendants(&self, id: &StageId) -> Vec<&StageNode> {
        let mut out = Vec::new();
        let mut stack: Vec<&StageNode> = self.children(id).into_iter().rev().collect();
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(self.children(&node.id).into_iter().rev());
        }
        out
    }

    /// Parent chain, nearest first
    pub fn ancestors(&self, id: &StageId) -> Vec<&StageNode> {
        let mut out = Vec::new();
        let mut current = self.nodes.get(id).and_then(|n| n.parent_id.as_ref());
        while let Some(parent) = current {
            let Some(node) = self.nodes.get(parent) else { break };
            if out.len() >= self.nodes.len() {
                break;
            }
            out.push(node);
            current = node.parent_id.as_ref();
        }
        out
    }

    pub fn depth(&self, id: &StageId) -> Option<usize> {
        self.nodes.get(id).map(|_| self.ancestors(id).len())
    }

    /// Display order: every root followed by its subtree, with depth
    pub fn walk(&self) -> Vec<(usize, &StageNode)> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<(usize, &StageNode)> =
            self.roots().into_iter().rev().map(|n| (0, n)).collect();
        while let Some((depth, node)) = stack.pop() {
            out.push((depth, node));
            stack.extend(self.children(&node.id).into_iter().rev().map(|n| (depth + 1, n)));
        }
        out
    }

    /// True if `ancestor` appears on the parent chain of `node`
    pub fn is_ancestor(&self, ancestor: &StageId, node: &StageId) -> bool {
        self.ancestors(node).iter().any(|n| &n.id == ancestor)
    }

    // ========== Persistence support ==========

    pub fn records(&self) -> StageRecords {
        self.nodes.clone()
    }

    /// One patch per node whose placement differs from `stored`: the new
    /// order, plus the parent when that changed too. Nodes missing from
    /// `stored` get a full placement.
    pub fn changes_since(&self, stored: &StageRecords) -> Vec<(StageId, StagePatch)> {
        self.nodes
            .values()
            .filter_map(|node| match stored.get(&node.id) {
                Some(s) if s.parent_id == node.parent_id && s.order == node.order => None,
                Some(s) if s.parent_id == node.parent_id => {
                    Some((node.id.clone(), StagePatch::order(node.order)))
                }
                _ => Some((
                    node.id.clone(),
                    StagePatch::placement(node.parent_id.clone(), node.order),
                )),
            })
            .collect()
    }

    /// Every parent exists, no node is its own ancestor, and each sibling
    /// list is numbered `0..n`
    pub fn is_consistent(&self) -> bool {
        for node in self.nodes.values() {
            if let Some(parent) = &node.parent_id {
                if !self.nodes.contains_key(parent) {
                    return false;
                }
            }
            if closes_cycle(&self.nodes, &node.id) {
                return false;
            }
        }
        let parents: BTreeSet<Option<&StageId>> =
            self.nodes.values().map(|n| n.parent_id.as_ref()).collect();
        parents.into_iter().all(|parent| {
            self.siblings(parent)
                .iter()
                .enumerate()
                .all(|(i, n)| n.order as usize == i)
        })
    }

    // ========== Internals ==========

    fn siblings(&self, parent: Option<&StageId>) -> Vec<&StageNode> {
        let mut level: Vec<&StageNode> = self
            .nodes
            .values()
            .filter(|n| n.parent_id.as_ref() == parent)
            .collect();
        level.sort_by(|a, b| sibling_order(a, b));
        level
    }

    fn sibling_ids(&self, parent: Option<&StageId>) -> Vec<StageId> {
        self.siblings(parent).into_iter().map(|n| n.id.clone()).collect()
    }

    pub(crate) fn next_order(&self, parent: Option<&StageId>) -> u32 {
        self.siblings(parent)
            .iter()
            .map(|n| n.order)
            .max()
            .map_or(0, |max| max + 1)
    }

    fn renumber(&mut self, ordered: &[StageId]) {
        for (i, id) in ordered.iter().enumerate() {
            if let Some(node) = self.nodes.get_mut(id) {
                node.order = i as u32;
            }
        }
    }
}

fn sibling_order(a: &StageNode, b: &StageNode) -> Ordering {
    a.order
        .cmp(&b.order)
        .then_with(|| a.name.cmp(&b.name))
        .then_with(|| a.id.cmp(&b.id))
}

/// Following parents from `start` comes back to `start`
fn closes_cycle(nodes: &BTreeMap<StageId, StageNode>, start: &StageId) -> bool {
    let mut seen = HashSet::new();
    let mut current = nodes.get(start).and_then(|n| n.parent_id.as_ref());
    while let Some(id) = current {
        if id == start {
            return true;
        }
        if !seen.insert(id) {
            return false;
        }
        current = nodes.get(id).and_then(|n| n.parent_id.as_ref());
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sid(s: &str) -> StageId {
        StageId::new(s)
    }

    fn node(id: &str, parent: Option<&str>, order: u32) -> StageNode {
        StageNode {
            id: sid(id),
            name: id.to_uppercase(),
            parent_id: parent.map(sid),
            order,
        }
    }

    /// a(b(d), c), e
    fn sample() -> StageTree {
        StageTree::from_nodes(vec![
            node("a", None, 0),
            node("e", None, 1),
            node("b", Some("a"), 0),
            node("c", Some("a"), 1),
            node("d", Some("b"), 0),
        ])
    }

    fn ids(nodes: Vec<&StageNode>) -> Vec<String> {
        nodes.into_iter().map(|n| n.id.to_string()).collect()
    }

    #[test]
    fn test_insert_appends_last_sibling() {
        let mut tree = sample();
        let f = tree.insert("Pintura", Some(&sid("a"))).unwrap();
        assert_eq!(f.order, 2);
        assert_eq!(tree.children(&sid("a")).last().unwrap().id, f.id);

        let root = tree.insert("Limpeza", None).unwrap();
        assert_eq!(root.order, 2);

        let mut empty = StageTree::new();
        assert_eq!(empty.insert("Fundação", None).unwrap().order, 0);
    }

    #[test]
    fn test_insert_under_unknown_parent() {
        let mut tree = sample();
        let before = tree.clone();
        let err = tree.insert("X", Some(&sid("ghost"))).unwrap_err();
        assert_eq!(err, OrcaError::StageNotFound(sid("ghost")));
        assert_eq!(tree, before);
    }

    #[test]
    fn test_insert_node_rejects_duplicate() {
        let mut tree = sample();
        let err = tree.insert_node(node("a", None, 0)).unwrap_err();
        assert_eq!(err, OrcaError::DuplicateStage(sid("a")));
    }

    #[test]
    fn test_descendants_preorder() {
        let tree = sample();
        assert_eq!(ids(tree.descendants(&sid("a"))), vec!["b", "d", "c"]);
        assert!(tree.descendants(&sid("e")).is_empty());
    }

    #[test]
    fn test_walk_depth_and_ancestors() {
        let tree = sample();
        let walk: Vec<(usize, String)> =
            tree.walk().into_iter().map(|(d, n)| (d, n.id.to_string())).collect();
        assert_eq!(
            walk,
            vec![
                (0, "a".to_string()),
                (1, "b".to_string()),
                (2, "d".to_string()),
                (1, "c".to_string()),
                (0, "e".to_string()),
            ]
        );
        assert_eq!(tree.depth(&sid("d")), Some(2));
        assert_eq!(tree.depth(&sid("ghost")), None);
        assert_eq!(ids(tree.ancestors(&sid("d"))), vec!["b", "a"]);
    }

    #[test]
    fn test_move_before_sibling() {
        let mut tree = sample();
        tree.move_to(&sid("c"), Some(&sid("a")), 0).unwrap();
        assert_eq!(ids(tree.children(&sid("a"))), vec!["c", "b"]);
        assert_eq!(tree.get(&sid("c")).unwrap().order, 0);
        assert_eq!(tree.get(&sid("b")).unwrap().order, 1);
        assert!(tree.is_consistent());
    }

    #[test]
    fn test_move_across_parents_renumbers_both() {
        let mut tree = sample();
        tree.move_to(&sid("b"), None, 1).unwrap();
        assert_eq!(ids(tree.roots()), vec!["a", "b", "e"]);
        assert_eq!(ids(tree.children(&sid("a"))), vec!["c"]);
        assert_eq!(tree.get(&sid("c")).unwrap().order, 0);
        // subtree travels along
        assert_eq!(ids(tree.children(&sid("b"))), vec!["d"]);
        assert!(tree.is_consistent());
    }

    #[test]
    fn test_move_index_past_end_appends() {
        let mut tree = sample();
        tree.move_to(&sid("a"), None, 99).unwrap();
        assert_eq!(ids(tree.roots()), vec!["e", "a"]);
    }

    #[test]
    fn test_move_into_self_or_descendant_leaves_tree_unchanged() {
        let mut tree = sample();
        let before = serde_json::to_string(&tree).unwrap();

        for target in ["a", "b", "d", "c"] {
            let err = tree.move_to(&sid("a"), Some(&sid(target)), 0).unwrap_err();
            assert!(matches!(err, OrcaError::InvalidMove { .. }), "{}: {:?}", target, err);
            assert_eq!(serde_json::to_string(&tree).unwrap(), before);
        }
    }

    #[test]
    fn test_move_unknown() {
        let mut tree = sample();
        assert_eq!(
            tree.move_to(&sid("ghost"), None, 0),
            Err(OrcaError::StageNotFound(sid("ghost")))
        );
        assert_eq!(
            tree.move_to(&sid("a"), Some(&sid("ghost")), 0),
            Err(OrcaError::StageNotFound(sid("ghost")))
        );
    }

    #[test]
    fn test_remove_promotes_children_to_roots() {
        let mut tree = sample();
        tree.remove(&sid("a")).unwrap();
        assert_eq!(ids(tree.roots()), vec!["e", "b", "c"]);
        assert_eq!(ids(tree.children(&sid("b"))), vec!["d"]);
        assert!(tree.is_consistent());

        assert_eq!(tree.remove(&sid("a")), Err(OrcaError::StageNotFound(sid("a"))));
    }

    #[test]
    fn test_remove_renumbers_former_siblings() {
        let mut tree = sample();
        tree.remove(&sid("b")).unwrap();
        assert_eq!(ids(tree.children(&sid("a"))), vec!["c"]);
        assert_eq!(tree.get(&sid("c")).unwrap().order, 0);
        assert_eq!(ids(tree.roots()), vec!["a", "e", "d"]);
    }

    #[test]
    fn test_from_nodes_repairs_records() {
        let tree = StageTree::from_nodes(vec![
            node("x", Some("ghost"), 5),
            node("p", Some("q"), 0),
            node("q", Some("p"), 0),
            node("s", Some("s"), 0),
            node("m", None, 3),
            node("k", None, 3),
        ]);
        assert!(tree.is_consistent());
        assert_eq!(tree.get(&sid("x")).unwrap().parent_id, None);
        assert_eq!(tree.get(&sid("s")).unwrap().parent_id, None);
        // p is checked first and closes the p -> q -> p loop
        assert_eq!(tree.get(&sid("p")).unwrap().parent_id, None);
        assert_eq!(tree.get(&sid("q")).unwrap().parent_id, Some(sid("p")));
        // equal stored orders fall back to name
        let roots = ids(tree.roots());
        let k = roots.iter().position(|r| r == "k").unwrap();
        let m = roots.iter().position(|r| r == "m").unwrap();
        assert!(k < m);
    }

    #[test]
    fn test_random_operations_keep_invariants() {
        let mut tree = StageTree::new();
        let mut seed: u64 = 0x2545_f491;
        let mut next = move || {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            seed
        };

        for step in 0..400 {
            let ids: Vec<StageId> = tree.nodes().map(|n| n.id.clone()).collect();
            let pick = |r: u64| ids.get(r as usize % ids.len().max(1)).cloned();
            match next() % 4 {
                0 | 1 => {
                    let parent = if next() % 3 == 0 { None } else { pick(next()) };
                    tree.insert(format!("S{}", step), parent.as_ref()).unwrap();
                }
                2 => {
                    if let Some(id) = pick(next()) {
                        let parent = if next() % 4 == 0 { None } else { pick(next()) };
                        let before = tree.clone();
                        if tree.move_to(&id, parent.as_ref(), (next() % 5) as usize).is_err() {
                            assert_eq!(tree, before);
                        }
                    }
                }
                _ => {
                    if next() % 3 == 0 {
                        if let Some(id) = pick(next()) {
                            tree.remove(&id).unwrap();
                        }
                    }
                }
            }
            assert!(tree.is_consistent(), "inconsistent after step {}", step);
        }
    }

    #[test]
    fn test_changes_since_stored_records() {
        let stored = sample().records();
        let mut tree = sample();
        tree.move_to(&sid("c"), None, 0).unwrap();

        let changes: BTreeMap<StageId, StagePatch> = tree.changes_since(&stored).into_iter().collect();
        assert_eq!(changes.len(), 3);
        assert_eq!(changes[&sid("c")], StagePatch::placement(None, 0));
        assert_eq!(changes[&sid("a")], StagePatch::order(1));
        assert_eq!(changes[&sid("e")], StagePatch::order(2));
        assert!(sample().changes_since(&stored).is_empty());
    }
}
