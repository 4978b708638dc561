//! Tree Editor - Mutation Engine
//!
//! `TreeEditor` owns the record store and every structure derived from it, and is
//! the only entry point that changes the catalog.
//!
//! # Transactions
//!
//! Every structural operation follows the same path:
//!
//! 1. Validate the request against the current index (unknown ids, cycle guard)
//! 2. Apply the change to a cloned copy of the records
//! 3. `commit`: re-check the store invariants on the copy, push the previous
//!    records onto the history, install the copy, rebuild the index, reconcile
//!    selection/expansion/navigation, and schedule a save
//!
//! A failure at any step returns `Err` and leaves the live store untouched.
//!
//! # View State
//!
//! Selection and expansion are not part of the records, so undo/redo does not
//! restore them. They are reconciled after every install instead: a selected node
//! that no longer exists is deselected, and one hidden under a collapsed ancestor
//! hands the selection to that ancestor.
//!
//! # Examples
//!
//! ```rust
//! use payanarss_core::config::CatalogConfig;
//! use payanarss_core::services::{DropPosition, TreeEditor};
//!
//! let mut editor = TreeEditor::new(CatalogConfig::default());
//! let root = editor.add_root_node().unwrap();
//! let a = editor.add_child(&root).unwrap();
//! let b = editor.add_child(&root).unwrap();
//!
//! editor.move_node(&a, &b, DropPosition::Inside).unwrap();
//! assert!(editor.move_node(&b, &a, DropPosition::Inside).is_err());
//!
//! assert!(editor.undo());
//! assert_eq!(editor.index().children(&root).len(), 2);
//! ```

use crate::config::CatalogConfig;
use crate::db::{LoadReport, RecordStore};
use crate::models::{generate_node_id, NestedNode, Node, NodeUpdate};
use crate::services::history::{History, Snapshot};
use crate::services::import_pipeline::{ImportOptions, ImportPipeline, ImportResult};
use crate::services::navigator::{Breadcrumb, Navigator};
use crate::services::save_scheduler::SaveHandle;
use crate::services::{CatalogError, HierarchyIndex};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Where a dragged node lands relative to the drop target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DropPosition {
    /// Previous sibling of the target
    Before,
    /// Next sibling of the target
    After,
    /// Last child of the target
    Inside,
}

/// One line of the expanded tree view
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisibleRow<'a> {
    pub node: &'a Node,
    pub depth: usize,
    pub has_children: bool,
    pub expanded: bool,
}

/// Summary numbers for status bars and the CLI
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogStats {
    pub node_count: usize,
    pub root_count: usize,
    pub max_depth: usize,
    pub undo_depth: usize,
    pub redo_depth: usize,
}

/// Single-writer owner of the catalog
#[derive(Debug)]
pub struct TreeEditor {
    store: RecordStore,
    index: HierarchyIndex,
    history: History,
    navigator: Navigator,
    selected_id: Option<String>,
    expanded: HashSet<String>,
    clipboard: Option<Vec<Node>>,
    config: CatalogConfig,
    saver: Option<SaveHandle>,
}

impl TreeEditor {
    /// Create an editor over an empty catalog
    pub fn new(config: CatalogConfig) -> Self {
        Self::from_store(RecordStore::new(), config)
    }

    /// Create an editor over an already sanitized store
    pub fn from_store(store: RecordStore, config: CatalogConfig) -> Self {
        let index = HierarchyIndex::build(store.nodes());
        tracing::info!(
            "TreeEditor ready: {} nodes, {} roots",
            index.len(),
            index.roots().len()
        );

        Self {
            store,
            index,
            history: History::new(config.history_limit),
            navigator: Navigator::new(),
            selected_id: None,
            expanded: HashSet::new(),
            clipboard: None,
            config,
            saver: None,
        }
    }

    /// Parse and sanitize a flat JSON catalog
    pub fn from_json(
        json: &str,
        config: CatalogConfig,
    ) -> Result<(Self, LoadReport), CatalogError> {
        let (store, report) = RecordStore::from_json(json)?;
        Ok((Self::from_store(store, config), report))
    }

    /// Schedule a save through `saver` after every change
    pub fn with_persistence(mut self, saver: SaveHandle) -> Self {
        self.saver = Some(saver);
        self
    }

    pub fn set_persistence(&mut self, saver: Option<SaveHandle>) {
        self.saver = saver;
    }

    /// Replace the whole catalog with freshly loaded records.
    ///
    /// This is a reload, not an edit: history, selection and navigation are reset.
    pub fn load_json(&mut self, json: &str) -> Result<LoadReport, CatalogError> {
        let (store, report) = RecordStore::from_json(json)?;
        self.store = store;
        self.history.clear();
        self.selected_id = None;
        self.expanded.clear();
        self.navigator = Navigator::new();
        self.install_index();
        Ok(report)
    }

    // ---- Reads ----

    /// Records in store order
    pub fn nodes(&self) -> &[Node] {
        self.store.nodes()
    }

    pub fn index(&self) -> &HierarchyIndex {
        &self.index
    }

    pub fn get(&self, id: &str) -> Option<&Node> {
        self.index.get(id)
    }

    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    pub fn navigator(&self) -> &Navigator {
        &self.navigator
    }

    pub fn selected_id(&self) -> Option<&str> {
        self.selected_id.as_deref()
    }

    pub fn selected(&self) -> Option<&Node> {
        self.selected_id.as_deref().and_then(|id| self.index.get(id))
    }

    pub fn is_expanded(&self, id: &str) -> bool {
        self.expanded.contains(id)
    }

    pub fn expanded_ids(&self) -> &HashSet<String> {
        &self.expanded
    }

    pub fn has_clipboard(&self) -> bool {
        self.clipboard.is_some()
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn search(&self, query: &str, scope: Option<&str>) -> Vec<&Node> {
        self.index.search(query, scope)
    }

    pub fn stats(&self) -> CatalogStats {
        CatalogStats {
            node_count: self.index.len(),
            root_count: self.index.roots().len(),
            max_depth: self.index.max_depth(),
            undo_depth: self.history.undo_depth(),
            redo_depth: self.history.redo_depth(),
        }
    }

    /// Rows of the tree view: every root, plus the children of expanded nodes
    pub fn visible_rows(&self) -> Vec<VisibleRow<'_>> {
        let mut rows = Vec::new();
        let mut stack: Vec<(&Node, usize)> = self
            .index
            .roots()
            .into_iter()
            .rev()
            .map(|root| (root, 0))
            .collect();

        while let Some((node, depth)) = stack.pop() {
            let expanded = self.expanded.contains(&node.id);
            let children = self.index.children(&node.id);
            rows.push(VisibleRow {
                node,
                depth,
                has_children: !children.is_empty(),
                expanded,
            });
            if expanded {
                stack.extend(children.into_iter().rev().map(|child| (child, depth + 1)));
            }
        }
        rows
    }

    // ---- Structural edits ----

    /// Add a node as the last child of `parent_id`.
    ///
    /// The new node takes the type of the parent's last child, or the parent's
    /// own type when it has none yet. Returns the new id.
    pub fn add_child(&mut self, parent_id: &str) -> Result<String, CatalogError> {
        let parent = self.require(parent_id)?;
        let type_ref = self
            .index
            .children(parent_id)
            .last()
            .map(|sibling| sibling.type_ref.clone())
            .unwrap_or_else(|| parent.type_ref.clone());

        let node = Node::new_child(parent_id, self.config.default_node_name.clone(), type_ref);
        let id = node.id.clone();

        let mut staged = self.staged();
        staged.push(node);
        self.commit(staged, "add child")?;

        self.expanded.insert(parent_id.to_string());
        self.reveal_and_select(&id);
        Ok(id)
    }

    /// Add a node directly after `node_id`, with the same parent and type.
    /// A sibling of a root is a new root.
    pub fn add_sibling(&mut self, node_id: &str) -> Result<String, CatalogError> {
        let anchor = self.require(node_id)?.clone();

        let name = self.config.default_node_name.clone();
        let node = if anchor.is_root() {
            let mut root = Node::new_root(name);
            if anchor.type_ref != anchor.id {
                root.type_ref = anchor.type_ref.clone();
            }
            root
        } else {
            Node::new_child(anchor.parent_id.clone(), name, anchor.type_ref.clone())
        };
        let id = node.id.clone();

        let mut staged = self.staged();
        let position = staged
            .iter()
            .position(|n| n.id == node_id)
            .map(|p| p + 1)
            .unwrap_or(staged.len());
        staged.insert(position, node);
        self.commit(staged, "add sibling")?;

        self.reveal_and_select(&id);
        Ok(id)
    }

    /// Add a self-classifying root at the end of the catalog
    pub fn add_root_node(&mut self) -> Result<String, CatalogError> {
        let node = Node::new_root(self.config.default_node_name.clone());
        let id = node.id.clone();

        let mut staged = self.staged();
        staged.push(node);
        self.commit(staged, "add root")?;

        self.reveal_and_select(&id);
        Ok(id)
    }

    /// Remove `id` and everything below it. Returns the number of removed nodes.
    pub fn delete(&mut self, id: &str) -> Result<usize, CatalogError> {
        self.require(id)?;
        let doomed = self.index.subtree_ids(id);

        let staged: Vec<Node> = self
            .store
            .nodes()
            .iter()
            .filter(|node| !doomed.contains(&node.id))
            .cloned()
            .collect();
        self.commit(staged, "delete")?;

        tracing::debug!("Deleted subtree '{}' ({} nodes)", id, doomed.len());
        Ok(doomed.len())
    }

    /// Deep-clone the subtree at `id` with fresh ids and insert it as the next
    /// sibling of the original. Returns the id of the clone's root.
    pub fn duplicate(&mut self, id: &str) -> Result<String, CatalogError> {
        let original = self.require(id)?.clone();
        let subtree: Vec<Node> = self.index.subtree(id).into_iter().cloned().collect();

        let new_parent = (!original.is_root()).then_some(original.parent_id.as_str());
        let mut clones = clone_subtree(&subtree, new_parent);
        let Some(clone_root) = clones.first_mut() else {
            return Err(CatalogError::node_not_found(id));
        };
        clone_root.name = format!("{} (Copy)", original.name);
        let clone_id = clone_root.id.clone();

        // Place the whole block right after the original's last store slot so it
        // lands as the next sibling
        let mut staged = self.staged();
        let members = self.index.subtree_ids(id);
        let after = staged
            .iter()
            .rposition(|n| members.contains(&n.id))
            .map(|p| p + 1)
            .unwrap_or(staged.len());
        staged.splice(after..after, clones);
        self.commit(staged, "duplicate")?;

        self.reveal_and_select(&clone_id);
        Ok(clone_id)
    }

    /// Stage a deep copy of the subtree at `id` in the one-slot clipboard.
    /// Returns the number of copied nodes.
    pub fn copy(&mut self, id: &str) -> Result<usize, CatalogError> {
        self.require(id)?;
        let subtree: Vec<Node> = self.index.subtree(id).into_iter().cloned().collect();
        let count = subtree.len();
        self.clipboard = Some(subtree);
        tracing::debug!("Copied subtree '{}' ({} nodes)", id, count);
        Ok(count)
    }

    /// Append a fresh-id clone of the clipboard under `parent_id`. The clipboard
    /// is kept, so the same copy can be pasted again. Returns the pasted root id.
    pub fn paste_into(&mut self, parent_id: &str) -> Result<String, CatalogError> {
        self.require(parent_id)?;
        let clipboard = self.clipboard.as_ref().ok_or(CatalogError::ClipboardEmpty)?;

        let clones = clone_subtree(clipboard, Some(parent_id));
        let pasted_id = clones
            .first()
            .map(|root| root.id.clone())
            .ok_or(CatalogError::ClipboardEmpty)?;

        let mut staged = self.staged();
        staged.extend(clones);
        self.commit(staged, "paste")?;

        self.expanded.insert(parent_id.to_string());
        self.reveal_and_select(&pasted_id);
        Ok(pasted_id)
    }

    /// Detach the subtree at `drag_id` and re-attach it next to or inside
    /// `drop_id`.
    ///
    /// Rejected with `CircularReference` when the target is the dragged node or
    /// lies inside its subtree.
    pub fn move_node(
        &mut self,
        drag_id: &str,
        drop_id: &str,
        position: DropPosition,
    ) -> Result<(), CatalogError> {
        self.require(drag_id)?;
        let drop = self.require(drop_id)?.clone();

        if drag_id == drop_id {
            return Err(CatalogError::circular_reference(format!(
                "cannot drop '{}' onto itself",
                drag_id
            )));
        }
        if self.index.is_descendant(drag_id, drop_id) {
            return Err(CatalogError::circular_reference(format!(
                "'{}' lies inside the subtree of '{}'",
                drop_id, drag_id
            )));
        }

        let mut staged = self.staged();
        let from = staged
            .iter()
            .position(|n| n.id == drag_id)
            .ok_or_else(|| CatalogError::node_not_found(drag_id))?;
        let mut dragged = staged.remove(from);

        dragged.parent_id = match position {
            DropPosition::Inside => drop.id.clone(),
            DropPosition::Before | DropPosition::After if drop.is_root() => dragged.id.clone(),
            DropPosition::Before | DropPosition::After => drop.parent_id.clone(),
        };

        let target = staged
            .iter()
            .position(|n| n.id == drop_id)
            .ok_or_else(|| CatalogError::node_not_found(drop_id))?;
        let insert_at = match position {
            DropPosition::Before => target,
            DropPosition::After => target + 1,
            DropPosition::Inside => staged.len(),
        };
        staged.insert(insert_at, dragged);

        let newly_expanded =
            position == DropPosition::Inside && self.expanded.insert(drop_id.to_string());
        if let Err(e) = self.commit(staged, "move") {
            if newly_expanded {
                self.expanded.remove(drop_id);
            }
            return Err(e);
        }

        tracing::debug!("Moved '{}' {:?} '{}'", drag_id, position, drop_id);
        Ok(())
    }

    /// Edit fields in place. Parentage never changes here; an empty update is a
    /// no-op and records no history.
    pub fn update(&mut self, id: &str, update: NodeUpdate) -> Result<(), CatalogError> {
        update.validate()?;
        self.require(id)?;
        if update.is_empty() {
            return Ok(());
        }

        let mut staged = self.staged();
        let node = staged
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or_else(|| CatalogError::node_not_found(id))?;
        node.apply_update(update);

        self.commit(staged, "update")
    }

    // ---- History ----

    /// Restore the state before the last committed edit. Returns false when
    /// there is nothing to undo.
    pub fn undo(&mut self) -> bool {
        if !self.history.can_undo() {
            return false;
        }
        let current: Snapshot = Arc::new(self.store.nodes().to_vec());
        match self.history.undo(current) {
            Some(previous) => {
                self.install_snapshot(previous);
                tracing::debug!("Undo: {} nodes", self.store.len());
                true
            }
            None => false,
        }
    }

    /// Re-apply the last undone edit. Returns false when there is nothing to redo.
    pub fn redo(&mut self) -> bool {
        if !self.history.can_redo() {
            return false;
        }
        let current: Snapshot = Arc::new(self.store.nodes().to_vec());
        match self.history.redo(current) {
            Some(next) => {
                self.install_snapshot(next);
                tracing::debug!("Redo: {} nodes", self.store.len());
                true
            }
            None => false,
        }
    }

    // ---- Selection and expansion ----

    /// Select `id`, expanding its ancestors so it is visible
    pub fn select(&mut self, id: &str) -> Result<(), CatalogError> {
        self.require(id)?;
        self.reveal_and_select(id);
        Ok(())
    }

    pub fn clear_selection(&mut self) {
        self.selected_id = None;
    }

    /// Flip the expansion of `id`; returns the new state
    pub fn toggle_expanded(&mut self, id: &str) -> Result<bool, CatalogError> {
        if self.expanded.contains(id) {
            self.collapse(id)?;
            Ok(false)
        } else {
            self.expand(id)?;
            Ok(true)
        }
    }

    pub fn expand(&mut self, id: &str) -> Result<(), CatalogError> {
        self.require(id)?;
        self.expanded.insert(id.to_string());
        Ok(())
    }

    /// Collapse `id`. A selection hidden by the collapse moves to `id`.
    pub fn collapse(&mut self, id: &str) -> Result<(), CatalogError> {
        self.require(id)?;
        self.expanded.remove(id);
        if let Some(selected) = &self.selected_id {
            if self.index.is_descendant(id, selected) {
                self.selected_id = Some(id.to_string());
            }
        }
        Ok(())
    }

    pub fn collapse_all(&mut self) {
        self.expanded.clear();
        self.reconcile_selection();
    }

    /// Expand every strict ancestor of `id`
    pub fn expand_path_to(&mut self, id: &str) -> Result<(), CatalogError> {
        self.require(id)?;
        self.expand_ancestors(id);
        Ok(())
    }

    // ---- Navigation ----

    pub fn drill_into(&mut self, id: &str) -> bool {
        self.navigator.drill_into(&self.index, id)
    }

    pub fn go_back(&mut self) -> bool {
        self.navigator.go_back()
    }

    pub fn go_to_breadcrumb(&mut self, target: Breadcrumb) {
        self.navigator.go_to_breadcrumb(target);
    }

    pub fn set_search_query(&mut self, query: impl Into<String>) {
        self.navigator.set_search_query(query);
    }

    pub fn current_children(&self) -> Vec<&Node> {
        self.navigator.current_children(&self.index)
    }

    pub fn filtered_children(&self) -> Vec<&Node> {
        self.navigator.filtered_children(&self.index)
    }

    pub fn breadcrumb(&self) -> Vec<&Node> {
        self.navigator.breadcrumb(&self.index)
    }

    // ---- Export ----

    /// The whole catalog as flat records, round-trippable through `from_json`
    pub fn export_json(&self) -> Result<String, CatalogError> {
        self.store.to_json()
    }

    /// The subtree at `id` as flat records, in store order
    pub fn export_subtree_json(&self, id: &str) -> Result<String, CatalogError> {
        self.require(id)?;
        let members = self.index.subtree_ids(id);
        let records: Vec<&Node> = self
            .store
            .nodes()
            .iter()
            .filter(|node| members.contains(&node.id))
            .collect();
        Ok(serde_json::to_string_pretty(&records)?)
    }

    /// The subtree at `id` in the nested import shape
    pub fn export_nested(&self, id: &str) -> Result<NestedNode, CatalogError> {
        let node = self.require(id)?;
        Ok(nest(&self.index, node))
    }

    /// Every root in the nested import shape
    pub fn export_forest(&self) -> Vec<NestedNode> {
        self.index
            .roots()
            .into_iter()
            .map(|root| nest(&self.index, root))
            .collect()
    }

    // ---- Import ----

    /// Options defaulting to the current selection as attachment point and the
    /// configured large-import threshold
    pub fn import_options(&self) -> ImportOptions {
        ImportOptions {
            attach_to: self.selected_id.clone(),
            large_import_threshold: self.config.large_import_threshold,
            ..Default::default()
        }
    }

    /// Run the import pipeline and commit the accepted batch as one undoable edit.
    ///
    /// Never returns `Err`: every failure is reported through the result, and a
    /// rejected import leaves the store untouched.
    pub fn import_json(&mut self, input: &str, options: ImportOptions) -> ImportResult {
        let attach_to = options.attach_to.clone();
        let mut result = ImportPipeline::new(options).run(input, &self.index);
        if !result.success {
            return result;
        }

        let replaced: HashSet<&str> = result.replaced_ids.iter().map(String::as_str).collect();
        let mut staged: Vec<Node> = self
            .store
            .nodes()
            .iter()
            .filter(|node| !replaced.contains(node.id.as_str()))
            .cloned()
            .collect();
        staged.extend(result.records.iter().cloned());

        if let Err(e) = self.commit(staged, "import") {
            tracing::error!("Import commit failed: {}", e);
            result.reject(format!("Commit failed: {}", e));
            return result;
        }

        if let Some(attach_id) = attach_to {
            self.expanded.insert(attach_id);
        }
        result.mark_committed();
        tracing::info!(
            "Imported {} records with {} warning(s)",
            result.imported_count,
            result.warnings.len()
        );
        result
    }

    // ---- Internals ----

    fn require(&self, id: &str) -> Result<&Node, CatalogError> {
        self.index
            .get(id)
            .ok_or_else(|| CatalogError::node_not_found(id))
    }

    fn staged(&self) -> Vec<Node> {
        self.store.nodes().to_vec()
    }

    fn commit(&mut self, staged: Vec<Node>, action: &str) -> Result<(), CatalogError> {
        let store = RecordStore::from_validated(staged).map_err(|e| {
            tracing::warn!("Rejected {}: {}", action, e);
            e
        })?;

        let before = std::mem::replace(&mut self.store, store);
        self.history.record(Arc::new(before.into_nodes()));
        self.install_index();
        self.schedule_save();

        tracing::debug!("Committed {} ({} nodes)", action, self.store.len());
        Ok(())
    }

    fn install_snapshot(&mut self, snapshot: Snapshot) {
        let nodes = Arc::try_unwrap(snapshot).unwrap_or_else(|shared| (*shared).clone());
        self.store = RecordStore::from_snapshot(nodes);
        self.install_index();
        self.schedule_save();
    }

    fn install_index(&mut self) {
        self.index = HierarchyIndex::build(self.store.nodes());
        self.navigator.sync(&self.index);
        self.expanded.retain(|id| self.index.contains(id));
        self.reconcile_selection();
    }

    /// Deselect a vanished node; hand a hidden one's selection to its nearest
    /// visible ancestor
    fn reconcile_selection(&mut self) {
        let Some(selected) = self.selected_id.clone() else {
            return;
        };
        if !self.index.contains(&selected) {
            self.selected_id = None;
            return;
        }

        let path = self.index.ancestor_path(&selected);
        let visible = path
            .iter()
            .find(|node| node.id == selected || !self.expanded.contains(&node.id))
            .map(|node| node.id.clone());
        self.selected_id = visible;
    }

    fn reveal_and_select(&mut self, id: &str) {
        self.expand_ancestors(id);
        self.selected_id = Some(id.to_string());
    }

    fn expand_ancestors(&mut self, id: &str) {
        let ancestors: Vec<String> = self
            .index
            .ancestor_path(id)
            .iter()
            .filter(|node| node.id != id)
            .map(|node| node.id.clone())
            .collect();
        self.expanded.extend(ancestors);
    }

    fn schedule_save(&self) {
        if let Some(saver) = &self.saver {
            saver.schedule(Arc::new(self.store.nodes().to_vec()));
        }
    }
}

/// Clone `subtree` (pre-order, root first) with fresh ids.
///
/// Internal parent links and type references follow the new ids; the clone's
/// root hangs under `new_parent`, or becomes a root itself when `None`.
fn clone_subtree(subtree: &[Node], new_parent: Option<&str>) -> Vec<Node> {
    let id_map: HashMap<&str, String> = subtree
        .iter()
        .map(|node| (node.id.as_str(), generate_node_id()))
        .collect();

    subtree
        .iter()
        .enumerate()
        .filter_map(|(position, node)| {
            let id = id_map.get(node.id.as_str())?.clone();
            let parent_id = if position == 0 {
                new_parent.map(str::to_string).unwrap_or_else(|| id.clone())
            } else {
                id_map
                    .get(node.parent_id.as_str())
                    .cloned()
                    .unwrap_or_else(|| node.parent_id.clone())
            };
            let type_ref = id_map
                .get(node.type_ref.as_str())
                .cloned()
                .unwrap_or_else(|| node.type_ref.clone());

            Some(Node {
                id,
                parent_id,
                type_ref,
                ..node.clone()
            })
        })
        .collect()
}

fn nest(index: &HierarchyIndex, node: &Node) -> NestedNode {
    let mut nested = NestedNode::from_node(node);
    nested.children = index
        .children(&node.id)
        .into_iter()
        .map(|child| nest(index, child))
        .collect();
    nested
}

// Comprehensive tests in separate module
#[cfg(test)]
#[path = "tree_editor_test.rs"]
mod tree_editor_test;
