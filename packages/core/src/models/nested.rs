//! Nested node shape
//!
//! Import files describe hierarchy by nesting (`Children` arrays) instead of
//! `ParentId` references. `NestedNode` is that shape, produced by nested exports
//! and accepted back by the import pipeline.

use super::Node;
use serde::{Deserialize, Serialize};

/// A node together with its nested children
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NestedNode {
    pub id: String,

    pub name: String,

    #[serde(rename = "PayanarssTypeId", alias = "TypeRef", alias = "typeRef")]
    pub type_ref: String,

    #[serde(default)]
    pub attributes: Vec<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, alias = "children", skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NestedNode>,
}

impl NestedNode {
    /// Wrap a flat record; children are attached by the caller
    pub fn from_node(node: &Node) -> Self {
        Self {
            id: node.id.clone(),
            name: node.name.clone(),
            type_ref: node.type_ref.clone(),
            attributes: node.attributes.clone(),
            description: node.description.clone(),
            children: Vec::new(),
        }
    }

    /// Total number of nodes in this nested tree, including self
    pub fn len(&self) -> usize {
        1 + self.children.iter().map(NestedNode::len).sum::<usize>()
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_nested_deserialize_lowercase_children() {
        let nested: NestedNode = serde_json::from_value(json!({
            "Id": "a",
            "Name": "A",
            "TypeRef": "t",
            "children": [{"Id": "b", "Name": "B", "TypeRef": "t"}]
        }))
        .unwrap();

        assert_eq!(nested.len(), 2);
        assert!(nested.children[0].is_leaf());
    }

    #[test]
    fn test_nested_serialize_omits_empty_children() {
        let node = Node::with_id("a", "a", "A", "a");
        let value = serde_json::to_value(NestedNode::from_node(&node)).unwrap();
        assert!(value.get("Children").is_none());
        assert_eq!(value["PayanarssTypeId"], "a");
    }
}
