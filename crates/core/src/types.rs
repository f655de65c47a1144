//! Typed views of the objects the AM configuration API returns.
//!
//! Every object keeps the fields it does not model in a flattened map so that
//! an export carries the server payload through unchanged, minus `_rev`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Objects carrying a `_rev` marker that must not leak into exports.
pub trait Revisioned {
    fn revision(&self) -> Option<&str>;
    fn strip_revision(&mut self);
}

macro_rules! impl_revisioned {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl Revisioned for $ty {
                fn revision(&self) -> Option<&str> {
                    self.rev.as_deref()
                }

                fn strip_revision(&mut self) {
                    self.rev = None;
                }
            }
        )+
    };
}

/// An authentication tree (journey) definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeObject {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", default, skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    /// Node id -> entry declaring its type.
    #[serde(default)]
    pub nodes: BTreeMap<String, TreeNodeEntry>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One entry of a tree's `nodes` map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeNodeEntry {
    #[serde(rename = "nodeType")]
    pub node_type: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `_type` descriptor embedded in every node payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeTypeDescriptor {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Reference to a child node inside a container (page) node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildNodeRef {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "nodeType")]
    pub node_type: String,
    #[serde(rename = "displayName", default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A node's own configuration object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeObject {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", default, skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(rename = "_type", default, skip_serializing_if = "Option::is_none")]
    pub node_type: Option<NodeTypeDescriptor>,
    /// Script id, set on scripted nodes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
    /// Template name, set on email-template nodes.
    #[serde(
        rename = "emailTemplateName",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub email_template_name: Option<String>,
    /// Child list, set on container nodes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nodes: Option<Vec<ChildNodeRef>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl NodeObject {
    /// Declared type identifier from the `_type` descriptor.
    pub fn type_id(&self) -> Option<&str> {
        self.node_type.as_ref().map(|t| t.id.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptObject {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", default, skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailTemplateObject {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", default, skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl_revisioned!(TreeObject, NodeObject, ScriptObject, EmailTemplateObject);

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tree_decode_keeps_unmodelled_fields() {
        let tree: TreeObject = serde_json::from_value(json!({
            "_id": "Login",
            "_rev": "12345",
            "entryNodeId": "n1",
            "nodes": {
                "n1": {
                    "nodeType": "UsernameCollectorNode",
                    "displayName": "User Name",
                    "connections": {}
                }
            }
        }))
        .unwrap();

        assert_eq!(tree.id, "Login");
        assert_eq!(tree.revision(), Some("12345"));
        assert_eq!(tree.nodes["n1"].node_type, "UsernameCollectorNode");
        assert_eq!(tree.extra["entryNodeId"], "n1");
        assert_eq!(tree.nodes["n1"].extra["displayName"], "User Name");
    }

    #[test]
    fn test_strip_revision_removes_rev_from_output() {
        let mut node: NodeObject = serde_json::from_value(json!({
            "_id": "n2",
            "_rev": "99",
            "_type": {"_id": "PageNode", "name": "Page Node", "collection": true},
            "nodes": [{"_id": "n3", "nodeType": "ScriptedDecisionNode", "displayName": "Check"}],
            "pageHeader": {}
        }))
        .unwrap();

        node.strip_revision();
        let value = serde_json::to_value(&node).unwrap();
        assert!(value.get("_rev").is_none());
        assert_eq!(value["_type"]["_id"], "PageNode");
        assert_eq!(value["_type"]["collection"], true);
        assert_eq!(value["nodes"][0]["_id"], "n3");
        assert!(value.get("pageHeader").is_some());
        assert_eq!(node.type_id(), Some("PageNode"));
    }

    #[test]
    fn test_script_null_description_decodes_as_none() {
        let script: ScriptObject = serde_json::from_value(json!({
            "_id": "s1",
            "name": "Check Device",
            "description": null,
            "script": "dmFyIGEgPSAxOw=="
        }))
        .unwrap();
        assert_eq!(script.name.as_deref(), Some("Check Device"));
        assert!(script.description.is_none());
        assert_eq!(script.extra["script"], "dmFyIGEgPSAxOw==");
    }

    #[test]
    fn test_tree_without_id_fails_to_decode() {
        let result: Result<TreeObject, _> = serde_json::from_value(json!({"nodes": {}}));
        assert!(result.is_err());
    }
}
