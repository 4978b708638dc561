//! Hierarchy Index
//!
//! Derived, read-only lookup structures over the flat record store.
//!
//! # Architecture
//!
//! The index is an arena: every node is copied into a slot of `arena`, and the
//! auxiliary maps hold slot numbers rather than references:
//!
//! - `by_id`: id → slot
//! - `children_of`: parent id → child slots, in store order
//! - `roots`: slots whose node has `parent_id == id`
//! - `orphans`: slots whose declared parent is absent
//! - `descendant_count`: slot → number of transitive children
//!
//! # Rebuild, never patch
//!
//! An index is built once from a store snapshot and never mutated afterwards. The
//! editor builds a fresh index after every commit, undo, and redo, so a reader can
//! never observe a half-applied change.
//!
//! # Performance
//!
//! - **Build**: O(n), three passes
//! - **Lookups**: O(1) for node/children/counts, O(depth) for ancestor paths

use crate::models::Node;
use std::collections::{HashMap, HashSet};

/// Read-only hierarchy lookups over one store snapshot
#[derive(Debug, Clone, Default)]
pub struct HierarchyIndex {
    arena: Vec<Node>,
    by_id: HashMap<String, usize>,
    children_of: HashMap<String, Vec<usize>>,
    roots: Vec<usize>,
    orphans: Vec<usize>,
    descendant_count: Vec<usize>,
}

impl HierarchyIndex {
    /// Build an index from flat records.
    ///
    /// Duplicate ids must be filtered by the caller (`RecordStore` guarantees
    /// this); if one slips through, the later record wins the `by_id` slot.
    pub fn build(nodes: &[Node]) -> Self {
        let arena: Vec<Node> = nodes.to_vec();

        // Pass 1: id → slot
        let mut by_id: HashMap<String, usize> = HashMap::with_capacity(arena.len());
        for (slot, node) in arena.iter().enumerate() {
            by_id.insert(node.id.clone(), slot);
        }

        // Pass 2: roots, children, orphans
        let mut children_of: HashMap<String, Vec<usize>> = HashMap::new();
        let mut roots = Vec::new();
        let mut orphans = Vec::new();
        for (slot, node) in arena.iter().enumerate() {
            if node.is_root() {
                roots.push(slot);
            } else {
                if !by_id.contains_key(&node.parent_id) {
                    orphans.push(slot);
                }
                children_of
                    .entry(node.parent_id.clone())
                    .or_default()
                    .push(slot);
            }
        }

        // Pass 3: descendant counts
        let descendant_count = count_descendants(&arena, &children_of);

        if !orphans.is_empty() {
            tracing::warn!("Hierarchy index contains {} orphan nodes", orphans.len());
        }
        tracing::debug!(
            "Hierarchy index built: {} nodes, {} roots",
            arena.len(),
            roots.len()
        );

        Self {
            arena,
            by_id,
            children_of,
            roots,
            orphans,
            descendant_count,
        }
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    /// All nodes in store order
    pub fn nodes(&self) -> &[Node] {
        &self.arena
    }

    pub fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&Node> {
        self.by_id.get(id).map(|&slot| &self.arena[slot])
    }

    /// Direct children of `id`, in store order
    pub fn children(&self, id: &str) -> Vec<&Node> {
        self.child_slots(id)
            .iter()
            .map(|&slot| &self.arena[slot])
            .collect()
    }

    pub fn has_children(&self, id: &str) -> bool {
        !self.child_slots(id).is_empty()
    }

    pub fn roots(&self) -> Vec<&Node> {
        self.roots.iter().map(|&slot| &self.arena[slot]).collect()
    }

    /// Non-root nodes whose parent is not in this snapshot
    pub fn orphans(&self) -> Vec<&Node> {
        self.orphans.iter().map(|&slot| &self.arena[slot]).collect()
    }

    /// Number of transitive children of `id` (0 for unknown ids)
    pub fn descendant_count(&self, id: &str) -> usize {
        self.by_id
            .get(id)
            .map(|&slot| self.descendant_count[slot])
            .unwrap_or(0)
    }

    /// Path from the top-most reachable ancestor down to `id`, inclusive.
    ///
    /// Stops at a self-referencing root, a missing parent, or an id seen twice.
    pub fn ancestor_path(&self, id: &str) -> Vec<&Node> {
        let mut path = Vec::new();
        let mut visited: HashSet<&str> = HashSet::new();
        let mut current = self.get(id);

        while let Some(node) = current {
            if !visited.insert(node.id.as_str()) {
                break;
            }
            path.push(node);
            if node.is_root() {
                break;
            }
            current = self.get(&node.parent_id);
        }

        path.reverse();
        path
    }

    /// Number of ancestors above `id`
    pub fn depth(&self, id: &str) -> usize {
        self.ancestor_path(id).len().saturating_sub(1)
    }

    /// Deepest level reachable from a root (0 for a catalog of bare roots)
    pub fn max_depth(&self) -> usize {
        let mut deepest = 0;
        let mut visited: HashSet<usize> = HashSet::with_capacity(self.arena.len());
        let mut stack: Vec<(usize, usize)> = self.roots.iter().map(|&slot| (slot, 0)).collect();
        while let Some((slot, depth)) = stack.pop() {
            if !visited.insert(slot) {
                continue;
            }
            deepest = deepest.max(depth);
            stack.extend(
                self.child_slots(&self.arena[slot].id)
                    .iter()
                    .map(|&child| (child, depth + 1)),
            );
        }
        deepest
    }

    /// True when `candidate` sits strictly below `ancestor`
    pub fn is_descendant(&self, ancestor: &str, candidate: &str) -> bool {
        if ancestor == candidate {
            return false;
        }
        self.ancestor_path(candidate)
            .iter()
            .any(|node| node.id == ancestor)
    }

    /// `id` followed by every node below it, depth-first pre-order
    pub fn subtree(&self, id: &str) -> Vec<&Node> {
        let Some(&start) = self.by_id.get(id) else {
            return Vec::new();
        };

        let mut result = Vec::new();
        let mut visited: HashSet<usize> = HashSet::new();
        let mut stack = vec![start];
        while let Some(slot) = stack.pop() {
            if !visited.insert(slot) {
                continue;
            }
            let node = &self.arena[slot];
            result.push(node);
            // Reverse so the first child is visited first
            stack.extend(self.child_slots(&node.id).iter().rev().copied());
        }
        result
    }

    /// Ids of `id` and all its descendants
    pub fn subtree_ids(&self, id: &str) -> HashSet<String> {
        self.subtree(id).into_iter().map(|n| n.id.clone()).collect()
    }

    /// Case-insensitive name search.
    ///
    /// With a `scope`, only strict descendants of that node are searched;
    /// otherwise the whole catalog is, in store order.
    pub fn search(&self, query: &str, scope: Option<&str>) -> Vec<&Node> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }

        let matches = |node: &&Node| node.name.to_lowercase().contains(&needle);
        match scope {
            Some(scope_id) => self
                .subtree(scope_id)
                .into_iter()
                .skip(1)
                .filter(matches)
                .collect(),
            None => self.arena.iter().filter(matches).collect(),
        }
    }

    fn child_slots(&self, id: &str) -> &[usize] {
        self.children_of.get(id).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Memoized post-order descendant counting.
///
/// Iterative so deep chains cannot overflow the stack. A per-path set stops the
/// walk if a cycle has slipped into the records.
fn count_descendants(arena: &[Node], children_of: &HashMap<String, Vec<usize>>) -> Vec<usize> {
    let mut memo: Vec<Option<usize>> = vec![None; arena.len()];
    let mut on_path: HashSet<usize> = HashSet::new();

    for start in 0..arena.len() {
        if memo[start].is_some() {
            continue;
        }

        let mut stack: Vec<(usize, usize)> = vec![(start, 0)];
        on_path.insert(start);

        while let Some(frame) = stack.last_mut() {
            let (slot, next) = *frame;
            let kids = kids_of(arena, children_of, slot);

            if next < kids.len() {
                frame.1 += 1;
                let child = kids[next];
                if memo[child].is_none() && !on_path.contains(&child) {
                    on_path.insert(child);
                    stack.push((child, 0));
                }
                continue;
            }

            // A child still on the path closes a cycle; it contributes nothing
            let total = kids
                .iter()
                .filter_map(|&child| memo[child].map(|count| count + 1))
                .sum();
            memo[slot] = Some(total);
            on_path.remove(&slot);
            stack.pop();
        }
    }

    memo.into_iter().map(Option::unwrap_or_default).collect()
}

fn kids_of<'a>(
    arena: &[Node],
    children_of: &'a HashMap<String, Vec<usize>>,
    slot: usize,
) -> &'a [usize] {
    children_of
        .get(&arena[slot].id)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

// Comprehensive tests in separate module
#[cfg(test)]
#[path = "hierarchy_index_test.rs"]
mod hierarchy_index_test;
