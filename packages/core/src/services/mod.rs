//! Catalog Services
//!
//! This module contains the tree engine built on top of the record store:
//!
//! - `HierarchyIndex` - O(1) parent/child/count lookups over one store snapshot
//! - `Navigator` - Drill-down cursor with breadcrumb and search filter
//! - `History` - Bounded snapshot undo/redo stacks
//! - `TreeEditor` - The single mutation entry point (add, delete, duplicate,
//!   copy/paste, move, update, import)
//! - `ImportPipeline` - Staged validation and transformation of external trees
//! - `SaveScheduler` - Debounced write-behind persistence to a `CatalogSink`

pub mod error;
pub mod hierarchy_index;
pub mod history;
pub mod import_pipeline;
pub mod navigator;
pub mod save_scheduler;
pub mod tree_editor;

pub use error::CatalogError;
pub use hierarchy_index::HierarchyIndex;
pub use history::{History, Snapshot};
pub use import_pipeline::{
    default_signature, ImportMode, ImportOptions, ImportPipeline, ImportResult, ImportStage,
    SignatureFn,
};
pub use navigator::{Breadcrumb, Navigator};
pub use save_scheduler::{SaveHandle, SaveScheduler, SaveStats};
pub use tree_editor::{CatalogStats, DropPosition, TreeEditor, VisibleRow};
