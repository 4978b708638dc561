//! Payanarss Catalog Core
//!
//! This crate provides the hierarchical tree engine for the Payanarss metadata
//! catalog: tens of thousands of typed nodes stored as flat
//! `{Id, ParentId, Name, PayanarssTypeId, Attributes, Description}` records.
//!
//! # Architecture
//!
//! - **Flat-by-reference storage**: Hierarchy lives only in the `Id`/`ParentId`
//!   relation; a root is a node that is its own parent
//! - **Rebuilt indices**: Every change installs a freshly built `HierarchyIndex`,
//!   never a patched one
//! - **Single writer**: All mutations go through `TreeEditor`, each one atomic and
//!   recorded as a full snapshot for undo/redo
//! - **Write-behind persistence**: Saves are debounced onto a background task and
//!   never block or roll back the in-memory catalog
//!
//! # Modules
//!
//! - [`models`] - Data structures (Node, NodeUpdate, NestedNode)
//! - [`services`] - Index, navigator, editor, import pipeline, save scheduler
//! - [`db`] - Record store and persistence sinks
//! - [`config`] - Engine tunables

pub mod config;
pub mod db;
pub mod models;
pub mod services;

// Re-export commonly used types
pub use config::CatalogConfig;
pub use db::*;
pub use models::*;
pub use services::*;
