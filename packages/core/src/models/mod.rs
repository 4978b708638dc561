//! Data Models
//!
//! This module contains the data structures shared by every layer of the catalog:
//!
//! - `Node` - The flat `{Id, ParentId, Name, TypeRef, Attributes, Description}` record
//! - `NodeUpdate` - Patch type for in-place edits
//! - `NestedNode` - The hierarchical-by-nesting shape used by import files and
//!   nested exports

mod nested;
mod node;

pub use nested::NestedNode;
pub use node::{generate_node_id, Node, NodeUpdate, ValidationError};
