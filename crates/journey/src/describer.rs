use std::collections::HashMap;

use crate::types::{JourneyDocument, TreeSummary};

/// Node id -> type as declared by the parent: the tree for top-level nodes,
/// the container's child list for nested ones.
fn declared_types(document: &JourneyDocument) -> HashMap<&str, &str> {
    let mut declared: HashMap<&str, &str> = document
        .tree
        .nodes
        .iter()
        .map(|(id, entry)| (id.as_str(), entry.node_type.as_str()))
        .collect();
    for child in document.nodes.values().filter_map(|n| n.nodes.as_ref()).flatten() {
        declared
            .entry(child.id.as_str())
            .or_insert(child.node_type.as_str());
    }
    declared
}

/// Summarizes an assembled journey: node-type histogram over `nodes` and
/// `innernodes`, and script name -> description.
///
/// A node without a `_type` descriptor is counted under the type its parent
/// declares for it. Scripts without a name are listed under their id.
pub fn describe(document: &JourneyDocument) -> TreeSummary {
    let mut summary = TreeSummary {
        tree_name: document.tree.id.clone(),
        ..Default::default()
    };

    let declared = declared_types(document);
    let node_types = document
        .all_nodes()
        .filter_map(|node| node.type_id().or_else(|| declared.get(node.id.as_str()).copied()));
    for node_type in node_types {
        *summary.node_types.entry(node_type.to_string()).or_insert(0) += 1;
    }

    for (id, script) in &document.scripts {
        let name = script.name.clone().unwrap_or_else(|| id.clone());
        let description = script.description.clone().unwrap_or_default();
        summary.scripts.insert(name, description);
    }

    summary
}
