use std::collections::BTreeMap;

use amtree_core::types::{EmailTemplateObject, NodeObject, ScriptObject, TreeObject};
use serde::{Deserialize, Serialize};

/// Self-contained export of one journey and everything it references.
///
/// Nodes listed by the tree land in `nodes`; nodes nested in container nodes
/// land in `innernodes`, which is absent when the tree has no container.
/// No stored object carries a `_rev` marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JourneyDocument {
    pub origin: String,
    pub tree: TreeObject,
    pub nodes: BTreeMap<String, NodeObject>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub innernodes: Option<BTreeMap<String, NodeObject>>,
    #[serde(default)]
    pub scripts: BTreeMap<String, ScriptObject>,
    #[serde(rename = "emailTemplates", default)]
    pub email_templates: BTreeMap<String, EmailTemplateObject>,
}

impl JourneyDocument {
    pub fn name(&self) -> &str {
        &self.tree.id
    }

    /// Top-level nodes followed by nested ones.
    pub fn all_nodes(&self) -> impl Iterator<Item = &NodeObject> {
        self.nodes
            .values()
            .chain(self.innernodes.iter().flat_map(|inner| inner.values()))
    }
}

/// Journey id -> "is customized". Ordered by journey id.
pub type JourneyListing = BTreeMap<String, bool>;

/// Compact report over an assembled journey.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeSummary {
    #[serde(rename = "treeName")]
    pub tree_name: String,
    /// Declared node type -> occurrences across `nodes` and `innernodes`.
    #[serde(rename = "nodeTypes")]
    pub node_types: BTreeMap<String, usize>,
    /// Script display name -> description (empty when absent).
    pub scripts: BTreeMap<String, String>,
}

impl TreeSummary {
    pub fn count_of(&self, node_type: &str) -> usize {
        self.node_types.get(node_type).copied().unwrap_or(0)
    }
}
