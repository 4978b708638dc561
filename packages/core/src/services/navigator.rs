//! Drill-down Navigator
//!
//! A stack-based cursor over a `HierarchyIndex`. The navigator only reads: it never
//! touches the record store or the index, so it needs no transactional guarantees,
//! only `sync` after a new index snapshot is installed.
//!
//! # Top Level
//!
//! With an empty path the navigator shows the catalog's top level: the children
//! of the single root when exactly one root exists, otherwise the roots
//! themselves.

use crate::models::Node;
use crate::services::HierarchyIndex;

/// Target of a breadcrumb click
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Breadcrumb {
    /// Back to the top level
    Root,
    /// Keep the first `n + 1` entries of the path (the entry at `n` stays current)
    Level(usize),
}

/// Drill-down cursor state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Navigator {
    path_stack: Vec<String>,
    search_query: String,
}

impl Navigator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ids drilled into, outermost first
    pub fn path(&self) -> &[String] {
        &self.path_stack
    }

    /// Node currently being viewed, `None` at the top level
    pub fn current_id(&self) -> Option<&str> {
        self.path_stack.last().map(String::as_str)
    }

    pub fn search_query(&self) -> &str {
        &self.search_query
    }

    pub fn set_search_query(&mut self, query: impl Into<String>) {
        self.search_query = query.into();
    }

    pub fn clear_search(&mut self) {
        self.search_query.clear();
    }

    /// Enter `id`. Returns false (and does nothing) for leaves and unknown ids.
    pub fn drill_into(&mut self, index: &HierarchyIndex, id: &str) -> bool {
        if !index.has_children(id) {
            return false;
        }
        self.path_stack.push(id.to_string());
        true
    }

    /// Pop one level. Returns false at the top level.
    pub fn go_back(&mut self) -> bool {
        self.path_stack.pop().is_some()
    }

    pub fn go_to_breadcrumb(&mut self, target: Breadcrumb) {
        match target {
            Breadcrumb::Root => self.path_stack.clear(),
            Breadcrumb::Level(level) => self.path_stack.truncate(level + 1),
        }
    }

    /// Nodes for the breadcrumb bar, outermost first
    pub fn breadcrumb<'a>(&self, index: &'a HierarchyIndex) -> Vec<&'a Node> {
        self.path_stack
            .iter()
            .filter_map(|id| index.get(id))
            .collect()
    }

    pub fn current_children<'a>(&self, index: &'a HierarchyIndex) -> Vec<&'a Node> {
        if let Some(current) = self.current_id() {
            return index.children(current);
        }

        let roots = index.roots();
        if roots.len() == 1 {
            let single = roots[0];
            return index.children(&single.id);
        }
        roots
    }

    /// `current_children` narrowed by the search query (name or description,
    /// case-insensitive); unfiltered when the query is blank
    pub fn filtered_children<'a>(&self, index: &'a HierarchyIndex) -> Vec<&'a Node> {
        let query = self.search_query.trim().to_lowercase();
        let children = self.current_children(index);
        if query.is_empty() {
            return children;
        }
        children
            .into_iter()
            .filter(|node| node.matches_query(&query))
            .collect()
    }

    /// Truncate the path at the first entry missing from `index`. Called
    /// whenever a new index is installed.
    pub fn sync(&mut self, index: &HierarchyIndex) {
        let valid = self
            .path_stack
            .iter()
            .position(|id| index.get(id).is_none())
            .unwrap_or(self.path_stack.len());

        if valid < self.path_stack.len() {
            tracing::debug!(
                "Navigator path truncated from {} to {} levels",
                self.path_stack.len(),
                valid
            );
            self.path_stack.truncate(valid);
        }
    }
}
