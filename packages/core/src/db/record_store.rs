//! Record Store
//!
//! The flat, ordered collection of catalog nodes. This is the single source of
//! truth; every other structure (index, navigator state, history) is derived from
//! or checked against it.
//!
//! # Ordering
//!
//! Store order is meaningful: siblings are listed in the order they appear in the
//! store, so inserting a record directly after another makes it the next sibling.
//!
//! # Loading
//!
//! `load` accepts records in any order and sanitizes them so the store invariants
//! hold from the first moment:
//!
//! - Duplicate ids: the first record wins, later ones are dropped
//! - Orphans (parent absent) are dropped together with their subtrees
//! - Records caught in a parent cycle never reach a root and are dropped
//!
//! Every dropped record is reported in `LoadReport::warnings`.

use crate::models::{Node, ValidationError};
use crate::services::CatalogError;
use std::collections::{HashMap, HashSet, VecDeque};

/// Outcome of sanitizing a raw record array
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    /// Records accepted into the store
    pub loaded: usize,
    /// Records dropped during sanitation
    pub dropped: usize,
    /// One human-readable line per dropped or suspicious record
    pub warnings: Vec<String>,
}

/// Flat node storage
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordStore {
    nodes: Vec<Node>,
}

impl RecordStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from raw records, dropping anything that would break the
    /// hierarchy invariants
    pub fn load(records: Vec<Node>) -> (Self, LoadReport) {
        let mut report = LoadReport::default();
        let total = records.len();

        // Pass 1: identity. First occurrence of an id wins.
        let mut seen: HashSet<String> = HashSet::with_capacity(total);
        let mut candidates: Vec<Node> = Vec::with_capacity(total);
        for node in records {
            // A blank name is kept (it can be renamed later); other defects drop the record
            let blank_name = match node.validate() {
                Ok(()) => false,
                Err(ValidationError::EmptyField(field)) if field == "Name" => true,
                Err(e) => {
                    report
                        .warnings
                        .push(format!("Dropped record '{}': {}", node.name, e));
                    continue;
                }
            };
            if !seen.insert(node.id.clone()) {
                report
                    .warnings
                    .push(format!("Dropped duplicate record for id '{}'", node.id));
                continue;
            }
            if blank_name {
                report
                    .warnings
                    .push(format!("Record '{}' has an empty Name", node.id));
            }
            candidates.push(node);
        }

        // Pass 2: reachability. Only nodes that walk down from a root survive.
        let mut children_of: HashMap<&str, Vec<&str>> = HashMap::new();
        let mut queue: VecDeque<&str> = VecDeque::new();
        for node in &candidates {
            if node.is_root() {
                queue.push_back(node.id.as_str());
            } else {
                children_of
                    .entry(node.parent_id.as_str())
                    .or_default()
                    .push(node.id.as_str());
            }
        }

        let mut reachable: HashSet<String> = HashSet::with_capacity(candidates.len());
        while let Some(id) = queue.pop_front() {
            if !reachable.insert(id.to_string()) {
                continue;
            }
            if let Some(children) = children_of.get(id) {
                queue.extend(children.iter().copied());
            }
        }

        let nodes: Vec<Node> = candidates
            .into_iter()
            .filter(|node| {
                if reachable.contains(&node.id) {
                    return true;
                }
                let reason = if seen.contains(&node.parent_id) {
                    "does not reach a root (cycle or dropped ancestor)"
                } else {
                    "is an orphan (parent not present)"
                };
                report.warnings.push(format!(
                    "Dropped record '{}' ({}): {}",
                    node.name, node.id, reason
                ));
                false
            })
            .collect();

        report.loaded = nodes.len();
        report.dropped = total - nodes.len();

        if report.dropped > 0 {
            tracing::warn!(
                "Catalog load dropped {} of {} records",
                report.dropped,
                total
            );
        } else {
            tracing::debug!("Catalog loaded {} records", report.loaded);
        }

        (Self { nodes }, report)
    }

    /// Parse a JSON array of flat records and sanitize it
    pub fn from_json(json: &str) -> Result<(Self, LoadReport), CatalogError> {
        let records: Vec<Node> = serde_json::from_str(json)?;
        Ok(Self::load(records))
    }

    /// Wrap records that already satisfy the invariants, checking them first
    pub fn from_validated(nodes: Vec<Node>) -> Result<Self, CatalogError> {
        let store = Self { nodes };
        store.check_invariants()?;
        Ok(store)
    }

    /// Reinstall a snapshot taken from a store that already passed
    /// `check_invariants` (undo/redo)
    pub(crate) fn from_snapshot(nodes: Vec<Node>) -> Self {
        Self { nodes }
    }

    /// Serialize the whole store in the flat record shape
    pub fn to_json(&self) -> Result<String, CatalogError> {
        Ok(serde_json::to_string_pretty(&self.nodes)?)
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn into_nodes(self) -> Vec<Node> {
        self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Verify the hierarchy invariants:
    ///
    /// 1. ids are unique
    /// 2. every parent is self or present
    /// 3. following parents always reaches a root
    pub fn check_invariants(&self) -> Result<(), CatalogError> {
        let mut parents: HashMap<&str, &str> = HashMap::with_capacity(self.nodes.len());
        for node in &self.nodes {
            if parents
                .insert(node.id.as_str(), node.parent_id.as_str())
                .is_some()
            {
                return Err(CatalogError::hierarchy_violation(format!(
                    "duplicate id '{}'",
                    node.id
                )));
            }
        }

        for node in &self.nodes {
            if !node.is_root() && !parents.contains_key(node.parent_id.as_str()) {
                return Err(CatalogError::invalid_parent(node.parent_id.clone()));
            }
        }

        // Nodes already proven to reach a root
        let mut grounded: HashSet<&str> = HashSet::with_capacity(self.nodes.len());
        for node in &self.nodes {
            let mut path: Vec<&str> = Vec::new();
            let mut on_path: HashSet<&str> = HashSet::new();
            let mut current = node.id.as_str();
            loop {
                if grounded.contains(current) {
                    break;
                }
                if !on_path.insert(current) {
                    return Err(CatalogError::circular_reference(format!(
                        "parent chain of '{}' loops back to '{}'",
                        node.id, current
                    )));
                }
                path.push(current);
                match parents.get(current) {
                    Some(&parent) if parent != current => current = parent,
                    _ => break,
                }
            }
            grounded.extend(path);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<Node> {
        vec![
            Node::with_id("c1", "r1", "Child", "t"),
            Node::with_id("r1", "r1", "Root", "r1"),
            Node::with_id("g1", "c1", "Grandchild", "t"),
        ]
    }

    #[test]
    fn test_load_accepts_any_order() {
        let (store, report) = RecordStore::load(sample());
        assert_eq!(store.len(), 3);
        assert_eq!(report.dropped, 0);
        assert!(report.warnings.is_empty());
        assert!(store.check_invariants().is_ok());
    }

    #[test]
    fn test_load_drops_duplicates_first_wins() {
        let mut records = sample();
        records.push(Node::with_id("c1", "r1", "Second copy", "t"));

        let (store, report) = RecordStore::load(records);
        assert_eq!(store.len(), 3);
        assert_eq!(store.get("c1").unwrap().name, "Child");
        assert_eq!(report.dropped, 1);
    }

    #[test]
    fn test_load_keeps_blank_name_drops_blank_parent() {
        let mut records = sample();
        records.push(Node::with_id("b1", "r1", " ", "t"));
        records.push(Node::with_id("p1", "", "No parent", "t"));

        let (store, report) = RecordStore::load(records);
        assert!(store.get("b1").is_some());
        assert!(store.get("p1").is_none());
        assert_eq!(report.dropped, 1);
        assert!(report.warnings.iter().any(|w| w.contains("empty Name")));
    }

    #[test]
    fn test_load_drops_orphan_subtrees() {
        let mut records = sample();
        records.push(Node::with_id("o1", "missing", "Orphan", "t"));
        records.push(Node::with_id("o2", "o1", "Orphan child", "t"));

        let (store, report) = RecordStore::load(records);
        assert_eq!(store.len(), 3);
        assert_eq!(report.dropped, 2);
        assert!(report.warnings.iter().any(|w| w.contains("orphan")));
    }

    #[test]
    fn test_load_drops_cycles() {
        let mut records = sample();
        records.push(Node::with_id("x", "y", "X", "t"));
        records.push(Node::with_id("y", "x", "Y", "t"));

        let (store, report) = RecordStore::load(records);
        assert_eq!(store.len(), 3);
        assert_eq!(report.dropped, 2);
        assert!(store.check_invariants().is_ok());
    }

    #[test]
    fn test_check_invariants_detects_cycle() {
        let store = RecordStore {
            nodes: vec![
                Node::with_id("r", "r", "Root", "r"),
                Node::with_id("x", "y", "X", "t"),
                Node::with_id("y", "x", "Y", "t"),
            ],
        };
        assert!(matches!(
            store.check_invariants(),
            Err(CatalogError::CircularReference { .. })
        ));
    }

    #[test]
    fn test_check_invariants_detects_dangling_parent() {
        let result = RecordStore::from_validated(vec![Node::with_id("a", "nope", "A", "t")]);
        assert!(matches!(result, Err(CatalogError::InvalidParent { .. })));
    }

    #[test]
    fn test_json_round_trip_is_byte_identical() {
        let (store, _) = RecordStore::load(sample());
        let json = store.to_json().unwrap();

        let (reloaded, report) = RecordStore::from_json(&json).unwrap();
        assert_eq!(report.dropped, 0);
        assert_eq!(reloaded.to_json().unwrap(), json);
    }
}
