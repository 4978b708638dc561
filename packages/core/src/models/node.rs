//! Catalog Node Data Structures
//!
//! This module defines the flat `Node` record that the whole catalog is built from,
//! plus the `NodeUpdate` patch type used for in-place edits.
//!
//! # Flat-by-reference Hierarchy
//!
//! - **No nesting**: A node never contains its children; hierarchy lives entirely in
//!   the `id`/`parent_id` relation
//! - **Root sentinel**: A root node has `parent_id == id` (never an absent parent)
//! - **Self-classifying types**: `type_ref` points at the node that describes this
//!   node's kind, and may point at the node itself for root type definitions
//!
//! # Wire Format
//!
//! Records serialize with PascalCase keys to match the catalog files:
//!
//! ```json
//! {
//!   "Id": "6f1c...",
//!   "ParentId": "6f1c...",
//!   "Name": "Customer",
//!   "PayanarssTypeId": "a2b4...",
//!   "Attributes": [1, {"refId": "x", "value": "y"}],
//!   "Description": null
//! }
//! ```
//!
//! # Examples
//!
//! ```rust
//! use payanarss_core::models::Node;
//!
//! let root = Node::new_root("Catalog");
//! assert!(root.is_root());
//!
//! let child = Node::new_child(&root.id, "Tables", &root.id);
//! assert_eq!(child.parent_id, root.id);
//! ```

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Validation errors for Node records
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Field '{0}' must not be empty")]
    EmptyField(String),

    #[error("Invalid parent reference: {0}")]
    InvalidParent(String),
}

/// Generate a fresh node identifier
pub fn generate_node_id() -> String {
    Uuid::new_v4().to_string()
}

/// One record of the catalog.
///
/// # Fields
///
/// - `id`: Opaque unique identifier (UUID for generated nodes)
/// - `parent_id`: Equal to `id` for roots, otherwise the id of the parent node
/// - `name`: Display label
/// - `type_ref`: Id of the node classifying this one (e.g. "Field", "Table")
/// - `attributes`: Ordered opaque payload, never interpreted by the engine
/// - `description`: Optional free text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Node {
    pub id: String,

    pub parent_id: String,

    pub name: String,

    #[serde(
        rename = "PayanarssTypeId",
        alias = "TypeRef",
        alias = "typeRef",
        default
    )]
    pub type_ref: String,

    #[serde(default, deserialize_with = "deserialize_attributes")]
    pub attributes: Vec<serde_json::Value>,

    #[serde(default)]
    pub description: Option<String>,
}

/// `Attributes: null` shows up in older catalog files; treat it as empty
fn deserialize_attributes<'de, D>(deserializer: D) -> Result<Vec<serde_json::Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<serde_json::Value>>::deserialize(deserializer)?.unwrap_or_default())
}

impl Node {
    /// Create a node with every field given explicitly
    pub fn with_id(
        id: impl Into<String>,
        parent_id: impl Into<String>,
        name: impl Into<String>,
        type_ref: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            parent_id: parent_id.into(),
            name: name.into(),
            type_ref: type_ref.into(),
            attributes: Vec::new(),
            description: None,
        }
    }

    /// Create a self-classifying root node with a generated id
    pub fn new_root(name: impl Into<String>) -> Self {
        let id = generate_node_id();
        Self::with_id(id.clone(), id.clone(), name, id)
    }

    /// Create a child of `parent_id` with a generated id
    pub fn new_child(
        parent_id: impl Into<String>,
        name: impl Into<String>,
        type_ref: impl Into<String>,
    ) -> Self {
        Self::with_id(generate_node_id(), parent_id, name, type_ref)
    }

    /// Builder-style description setter
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Builder-style attributes setter
    pub fn with_attributes(mut self, attributes: Vec<serde_json::Value>) -> Self {
        self.attributes = attributes;
        self
    }

    /// A root is a node whose parent is itself
    pub fn is_root(&self) -> bool {
        self.id == self.parent_id
    }

    /// Check the record-local rules (no cross-record checks)
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.trim().is_empty() {
            return Err(ValidationError::EmptyField("Id".to_string()));
        }
        if self.parent_id.trim().is_empty() {
            return Err(ValidationError::InvalidParent(format!(
                "node '{}' has an empty ParentId",
                self.id
            )));
        }
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyField("Name".to_string()));
        }
        Ok(())
    }

    /// Case-insensitive match against name and description
    pub fn matches_query(&self, query_lower: &str) -> bool {
        self.name.to_lowercase().contains(query_lower)
            || self
                .description
                .as_deref()
                .is_some_and(|d| d.to_lowercase().contains(query_lower))
    }

    /// Apply a patch in place. Parentage is never touched.
    pub fn apply_update(&mut self, update: NodeUpdate) {
        if let Some(name) = update.name {
            self.name = name;
        }
        if let Some(description) = update.description {
            self.description = description;
        }
        if let Some(type_ref) = update.type_ref {
            self.type_ref = type_ref;
        }
        if let Some(attributes) = update.attributes {
            self.attributes = attributes;
        }
    }
}

/// Partial update for an existing node
///
/// `parent_id` is intentionally absent: re-parenting goes through `move_node`,
/// which enforces the cycle guard.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Uses double-Option pattern:
    /// - `None`: Don't change description
    /// - `Some(None)`: Clear description
    /// - `Some(Some(text))`: Set description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_ref: Option<String>,

    /// Appearance and other opaque metadata
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Vec<serde_json::Value>>,
}

impl NodeUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = Some(description);
        self
    }

    pub fn with_type_ref(mut self, type_ref: impl Into<String>) -> Self {
        self.type_ref = Some(type_ref.into());
        self
    }

    pub fn with_attributes(mut self, attributes: Vec<serde_json::Value>) -> Self {
        self.attributes = Some(attributes);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.type_ref.is_none()
            && self.attributes.is_none()
    }

    /// Reject edits that would leave the node invalid
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err(ValidationError::EmptyField("Name".to_string()));
            }
        }
        if let Some(type_ref) = &self.type_ref {
            if type_ref.trim().is_empty() {
                return Err(ValidationError::EmptyField("PayanarssTypeId".to_string()));
            }
        }
        Ok(())
    }
}
