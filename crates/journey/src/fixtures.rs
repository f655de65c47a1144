//! Builders for trees, nodes and scripts used across the crate's tests.

use amtree_core::types::{EmailTemplateObject, NodeObject, ScriptObject, TreeObject};
use amtree_core::{DeploymentKind, InMemoryFetcher, SessionContext};
use serde_json::{json, Map, Value};

pub fn session(deployment: DeploymentKind, version: &str) -> SessionContext {
    SessionContext::new("https://am.example.com/am", "alpha", deployment, version)
        .with_cookie("iPlanetDirectoryPro", "token")
}

pub fn tree(id: &str, nodes: &[(&str, &str)]) -> TreeObject {
    let mut map = Map::new();
    for (node_id, node_type) in nodes {
        map.insert(
            node_id.to_string(),
            json!({"nodeType": node_type, "displayName": node_id, "connections": {}}),
        );
    }
    serde_json::from_value(json!({
        "_id": id,
        "_rev": "-1",
        "entryNodeId": nodes.first().map(|(n, _)| *n).unwrap_or_default(),
        "nodes": Value::Object(map),
    }))
    .unwrap()
}

pub fn node(id: &str, node_type: &str) -> NodeObject {
    serde_json::from_value(json!({
        "_id": id,
        "_rev": "1",
        "_type": {"_id": node_type, "name": node_type, "collection": true},
    }))
    .unwrap()
}

pub fn scripted_node(id: &str, node_type: &str, script_id: &str) -> NodeObject {
    serde_json::from_value(json!({
        "_id": id,
        "_rev": "2",
        "_type": {"_id": node_type, "name": node_type, "collection": true},
        "script": script_id,
        "outcomes": ["true", "false"],
    }))
    .unwrap()
}

pub fn email_node(id: &str, node_type: &str, template: &str) -> NodeObject {
    serde_json::from_value(json!({
        "_id": id,
        "_rev": "3",
        "_type": {"_id": node_type, "name": node_type, "collection": true},
        "emailTemplateName": template,
    }))
    .unwrap()
}

pub fn page_node(id: &str, children: &[(&str, &str)]) -> NodeObject {
    let children: Vec<Value> = children
        .iter()
        .map(|(child_id, child_type)| {
            json!({"_id": child_id, "nodeType": child_type, "displayName": child_id})
        })
        .collect();
    serde_json::from_value(json!({
        "_id": id,
        "_rev": "4",
        "_type": {"_id": "PageNode", "name": "Page Node", "collection": true},
        "nodes": children,
        "pageHeader": {},
    }))
    .unwrap()
}

pub fn script(id: &str, name: &str, description: Option<&str>) -> ScriptObject {
    serde_json::from_value(json!({
        "_id": id,
        "_rev": "5",
        "name": name,
        "description": description,
        "language": "JAVASCRIPT",
        "script": "b3V0Y29tZSA9ICJ0cnVlIjs=",
    }))
    .unwrap()
}

pub fn email_template(id: &str) -> EmailTemplateObject {
    serde_json::from_value(json!({
        "_id": id,
        "_rev": "6",
        "enabled": true,
        "subject": {"en": "Hello"},
    }))
    .unwrap()
}

/// `Login`: `n1` username collector, `n2` page holding scripted `n3` -> `s1`.
pub fn login_fetcher() -> InMemoryFetcher {
    InMemoryFetcher::new()
        .with_tree(tree(
            "Login",
            &[("n1", "UsernameCollectorNode"), ("n2", "PageNode")],
        ))
        .with_node(node("n1", "UsernameCollectorNode"))
        .with_node(page_node("n2", &[("n3", "ScriptedDecisionNode")]))
        .with_node(scripted_node("n3", "ScriptedDecisionNode", "s1"))
        .with_script(script("s1", "Check Device", Some("Checks the device profile")))
}
