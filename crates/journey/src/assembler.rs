use std::collections::BTreeMap;
use std::sync::Arc;

use amtree_core::error::{ExportError, ExportResult, FetchError, FetchResult, ResourceKind};
use amtree_core::fetch::ResourceFetcher;
use amtree_core::session::SessionContext;
use amtree_core::types::{ChildNodeRef, EmailTemplateObject, NodeObject, Revisioned, ScriptObject};
use dashmap::{DashMap, DashSet};
use futures_util::stream::{self, StreamExt, TryStreamExt};
use tracing::{debug, info, warn};

use crate::catalog::classify_role;
use crate::origin::origin_fingerprint;
use crate::types::JourneyDocument;

/// Default bound on in-flight node fetches per journey.
pub const DEFAULT_MAX_CONCURRENCY: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placement {
    TopLevel,
    Nested,
}

/// Objects gathered by concurrent node tasks before being frozen into the
/// document's ordered maps.
#[derive(Default)]
struct Collector {
    nodes: DashMap<String, NodeObject>,
    innernodes: DashMap<String, NodeObject>,
    scripts: DashMap<String, ScriptObject>,
    email_templates: DashMap<String, EmailTemplateObject>,
    requested_scripts: DashSet<String>,
    requested_templates: DashSet<String>,
}

fn freeze<V>(map: DashMap<String, V>) -> BTreeMap<String, V> {
    map.into_iter().collect()
}

/// Resolves a journey's full object graph (tree, nodes, page children,
/// scripts, email templates) into one [`JourneyDocument`].
#[derive(Clone)]
pub struct JourneyAssembler {
    fetcher: Arc<dyn ResourceFetcher>,
    max_concurrency: usize,
}

impl std::fmt::Debug for JourneyAssembler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JourneyAssembler")
            .field("max_concurrency", &self.max_concurrency)
            .finish()
    }
}

impl JourneyAssembler {
    pub fn new(fetcher: Arc<dyn ResourceFetcher>) -> Self {
        Self {
            fetcher,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }

    /// Caps in-flight node fetches. Values below 1 are raised to 1.
    pub fn with_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    /// Builds the export document for `journey`.
    ///
    /// Tree, node and page child-list failures abort with
    /// [`ExportError::Assemble`]. Script and email-template failures only
    /// omit that object.
    pub async fn assemble(
        &self,
        session: &SessionContext,
        journey: &str,
    ) -> ExportResult<JourneyDocument> {
        let wrap = |source: FetchError| ExportError::Assemble {
            journey: journey.to_string(),
            source,
        };

        let mut tree = self
            .fetcher
            .fetch_tree(session, journey)
            .await
            .map_err(wrap)?;
        tree.strip_revision();

        let collector = Collector::default();

        let child_lists: Vec<Option<Vec<ChildNodeRef>>> = stream::iter(tree.nodes.iter())
            .map(|(id, entry)| {
                self.collect_node(session, &collector, id, &entry.node_type, Placement::TopLevel)
            })
            .buffer_unordered(self.max_concurrency)
            .try_collect()
            .await
            .map_err(wrap)?;

        let has_container = child_lists.iter().any(Option::is_some);
        let children: Vec<ChildNodeRef> = child_lists.into_iter().flatten().flatten().collect();

        stream::iter(children.iter())
            .map(|child| {
                self.collect_node(
                    session,
                    &collector,
                    &child.id,
                    &child.node_type,
                    Placement::Nested,
                )
            })
            .buffer_unordered(self.max_concurrency)
            .try_collect::<Vec<_>>()
            .await
            .map_err(wrap)?;

        let document = JourneyDocument {
            origin: origin_fingerprint(&session.tenant, &session.realm),
            tree,
            nodes: freeze(collector.nodes),
            innernodes: has_container.then(|| freeze(collector.innernodes)),
            scripts: freeze(collector.scripts),
            email_templates: freeze(collector.email_templates),
        };

        info!(
            journey = %journey,
            nodes = document.nodes.len(),
            innernodes = document.innernodes.as_ref().map_or(0, |m| m.len()),
            scripts = document.scripts.len(),
            email_templates = document.email_templates.len(),
            "Assembled journey"
        );
        Ok(document)
    }

    /// Fetches one node, enriches it with its script or email template and
    /// files it under `placement`. Returns the child list of container nodes.
    async fn collect_node(
        &self,
        session: &SessionContext,
        collector: &Collector,
        id: &str,
        node_type: &str,
        placement: Placement,
    ) -> FetchResult<Option<Vec<ChildNodeRef>>> {
        debug!(node_id = %id, node_type = %node_type, ?placement, "Fetching node");
        let mut node = self.fetcher.fetch_node(session, id, node_type).await?;
        node.strip_revision();

        let role = classify_role(node_type);
        if role.is_scripted {
            self.collect_script(session, collector, &node).await;
        }
        if role.has_email_template && session.deployment.supports_email_templates() {
            self.collect_email_template(session, collector, &node).await;
        }

        // Pages do not nest, so a nested node's own children are not expanded.
        let children = if role.is_container && placement == Placement::TopLevel {
            match &node.nodes {
                Some(children) => Some(children.clone()),
                None => {
                    return Err(FetchError::decode(
                        ResourceKind::Node,
                        id,
                        "container node has no child node list",
                    ))
                }
            }
        } else {
            None
        };

        let target = match placement {
            Placement::TopLevel => &collector.nodes,
            Placement::Nested => &collector.innernodes,
        };
        target.insert(id.to_string(), node);

        Ok(children)
    }

    async fn collect_script(
        &self,
        session: &SessionContext,
        collector: &Collector,
        node: &NodeObject,
    ) {
        let Some(script_id) = node.script.as_deref().filter(|s| !s.is_empty()) else {
            warn!(node_id = %node.id, "Scripted node has no script reference, skipping");
            return;
        };
        if !collector.requested_scripts.insert(script_id.to_string()) {
            return;
        }

        match self.fetcher.fetch_script(session, script_id).await {
            Ok(mut script) => {
                script.strip_revision();
                collector.scripts.insert(script_id.to_string(), script);
            }
            Err(e) => {
                warn!(node_id = %node.id, script_id = %script_id, error = %e, "Omitting script");
            }
        }
    }

    async fn collect_email_template(
        &self,
        session: &SessionContext,
        collector: &Collector,
        node: &NodeObject,
    ) {
        let Some(template_id) = node.email_template_name.as_deref().filter(|s| !s.is_empty())
        else {
            warn!(node_id = %node.id, "Email node has no template name, skipping");
            return;
        };
        if !collector.requested_templates.insert(template_id.to_string()) {
            return;
        }

        match self.fetcher.fetch_email_template(session, template_id).await {
            Ok(mut template) => {
                template.strip_revision();
                collector
                    .email_templates
                    .insert(template_id.to_string(), template);
            }
            Err(e) => {
                warn!(
                    node_id = %node.id,
                    template_id = %template_id,
                    error = %e,
                    "Omitting email template"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::*;
    use amtree_core::{DeploymentKind, InMemoryFetcher};

    fn assembler(fetcher: &Arc<InMemoryFetcher>) -> JourneyAssembler {
        JourneyAssembler::new(fetcher.clone())
    }

    #[tokio::test]
    async fn test_login_scenario() {
        let fetcher = Arc::new(login_fetcher());
        let session = session(DeploymentKind::Cloud, "7.1.0");

        let doc = assembler(&fetcher).assemble(&session, "Login").await.unwrap();

        assert_eq!(doc.name(), "Login");
        assert_eq!(doc.nodes.keys().collect::<Vec<_>>(), vec!["n1", "n2"]);
        let inner = doc.innernodes.as_ref().unwrap();
        assert_eq!(inner.keys().collect::<Vec<_>>(), vec!["n3"]);
        assert!(!doc.nodes.contains_key("n3"));
        assert_eq!(doc.scripts.keys().collect::<Vec<_>>(), vec!["s1"]);
        assert!(doc.email_templates.is_empty());
        assert_eq!(doc.origin, origin_fingerprint(&session.tenant, &session.realm));
    }

    #[tokio::test]
    async fn test_origin_hashes_tenant_as_supplied() {
        let fetcher = Arc::new(login_fetcher());
        let session = SessionContext::new(
            "https://am.example.com/am/",
            "alpha",
            DeploymentKind::Cloud,
            "7.1.0",
        );

        let doc = assembler(&fetcher).assemble(&session, "Login").await.unwrap();
        // md5("https://am.example.com/am/alpha")
        assert_eq!(doc.origin, "e29d6d2b5751b64187f52ce54d39e59f");
        assert_ne!(
            doc.origin,
            origin_fingerprint("https://am.example.com/am", "alpha")
        );
    }

    #[tokio::test]
    async fn test_no_revision_markers_anywhere() {
        let fetcher = Arc::new(
            login_fetcher()
                .with_tree(tree(
                    "Register",
                    &[("e1", "EmailSuspendNode"), ("p1", "PageNode")],
                ))
                .with_node(email_node("e1", "EmailSuspendNode", "registration"))
                .with_node(page_node("p1", &[("c1", "EmailTemplateNode")]))
                .with_node(email_node("c1", "EmailTemplateNode", "welcome"))
                .with_email_template(email_template("registration"))
                .with_email_template(email_template("welcome")),
        );
        let session = session(DeploymentKind::ForgeOps, "7.1.0");

        for journey in ["Login", "Register"] {
            let doc = assembler(&fetcher).assemble(&session, journey).await.unwrap();
            if journey == "Register" {
                assert_eq!(
                    doc.email_templates.keys().collect::<Vec<_>>(),
                    vec!["registration", "welcome"]
                );
                assert!(doc.innernodes.as_ref().unwrap().contains_key("c1"));
            }
            let value = serde_json::to_value(&doc).unwrap();
            assert!(value["tree"].get("_rev").is_none());
            for section in ["nodes", "innernodes", "scripts", "emailTemplates"] {
                if let Some(map) = value.get(section).and_then(|v| v.as_object()) {
                    for (id, object) in map {
                        assert!(object.get("_rev").is_none(), "{} {} kept _rev", section, id);
                    }
                }
            }
        }
    }

    #[tokio::test]
    async fn test_no_container_means_no_innernodes() {
        let fetcher = Arc::new(
            InMemoryFetcher::new()
                .with_tree(tree(
                    "Simple",
                    &[("n1", "UsernameCollectorNode"), ("n2", "PasswordCollectorNode")],
                ))
                .with_node(node("n1", "UsernameCollectorNode"))
                .with_node(node("n2", "PasswordCollectorNode")),
        );
        let doc = assembler(&fetcher)
            .assemble(&session(DeploymentKind::Classic, "7.0.0"), "Simple")
            .await
            .unwrap();

        assert!(doc.innernodes.is_none());
        let value = serde_json::to_value(&doc).unwrap();
        assert!(value.get("innernodes").is_none());
        assert!(value["scripts"].as_object().unwrap().is_empty());
        assert!(value["emailTemplates"].as_object().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_innernodes_accumulate_across_pages() {
        let fetcher = Arc::new(
            InMemoryFetcher::new()
                .with_tree(tree("TwoPages", &[("p1", "PageNode"), ("p2", "PageNode")]))
                .with_node(page_node("p1", &[("c1", "UsernameCollectorNode")]))
                .with_node(page_node(
                    "p2",
                    &[("c2", "PasswordCollectorNode"), ("c3", "MessageNode")],
                ))
                .with_node(node("c1", "UsernameCollectorNode"))
                .with_node(node("c2", "PasswordCollectorNode"))
                .with_node(node("c3", "MessageNode")),
        );
        let doc = assembler(&fetcher)
            .assemble(&session(DeploymentKind::Cloud, "7.1.0"), "TwoPages")
            .await
            .unwrap();

        let inner = doc.innernodes.unwrap();
        assert_eq!(inner.len(), 3);
        assert_eq!(doc.nodes.len(), 2);
    }

    #[tokio::test]
    async fn test_failed_script_is_omitted_not_fatal() {
        let fetcher = Arc::new(login_fetcher().failing(ResourceKind::Script, "s1"));
        let doc = assembler(&fetcher)
            .assemble(&session(DeploymentKind::Cloud, "7.1.0"), "Login")
            .await
            .unwrap();

        assert!(doc.scripts.is_empty());
        assert!(doc.innernodes.unwrap().contains_key("n3"));
        assert_eq!(fetcher.call_count(ResourceKind::Script), 1);
    }

    #[tokio::test]
    async fn test_missing_script_is_omitted() {
        let fetcher = Arc::new(
            InMemoryFetcher::new()
                .with_tree(tree("Orphan", &[("n1", "ScriptedDecisionNode")]))
                .with_node(scripted_node("n1", "ScriptedDecisionNode", "deleted")),
        );
        let doc = assembler(&fetcher)
            .assemble(&session(DeploymentKind::Cloud, "7.1.0"), "Orphan")
            .await
            .unwrap();
        assert!(doc.scripts.is_empty());
        assert!(doc.nodes.contains_key("n1"));
    }

    #[tokio::test]
    async fn test_shared_script_fetched_once() {
        let fetcher = Arc::new(
            InMemoryFetcher::new()
                .with_tree(tree(
                    "Shared",
                    &[("n1", "ScriptedDecisionNode"), ("n2", "ScriptedDecisionNode")],
                ))
                .with_node(scripted_node("n1", "ScriptedDecisionNode", "s1"))
                .with_node(scripted_node("n2", "ScriptedDecisionNode", "s1"))
                .with_script(script("s1", "Shared", None)),
        );
        let doc = assembler(&fetcher)
            .with_concurrency(1)
            .assemble(&session(DeploymentKind::Cloud, "7.1.0"), "Shared")
            .await
            .unwrap();
        assert_eq!(doc.scripts.len(), 1);
        assert_eq!(fetcher.call_count(ResourceKind::Script), 1);
    }

    #[tokio::test]
    async fn test_email_templates_gated_on_deployment() {
        let build = || {
            Arc::new(
                InMemoryFetcher::new()
                    .with_tree(tree("Reset", &[("e1", "EmailTemplateNode")]))
                    .with_node(email_node("e1", "EmailTemplateNode", "resetPassword"))
                    .with_email_template(email_template("resetPassword")),
            )
        };

        let classic = build();
        let doc = assembler(&classic)
            .assemble(&session(DeploymentKind::Classic, "7.1.0"), "Reset")
            .await
            .unwrap();
        assert!(doc.email_templates.is_empty());
        assert_eq!(classic.call_count(ResourceKind::EmailTemplate), 0);

        for deployment in [DeploymentKind::Cloud, DeploymentKind::ForgeOps] {
            let fetcher = build();
            let doc = assembler(&fetcher)
                .assemble(&session(deployment, "7.1.0"), "Reset")
                .await
                .unwrap();
            assert!(doc.email_templates.contains_key("resetPassword"));
        }
    }

    #[tokio::test]
    async fn test_failed_email_template_is_omitted() {
        let fetcher = Arc::new(
            InMemoryFetcher::new()
                .with_tree(tree("Reset", &[("e1", "EmailSuspendNode")]))
                .with_node(email_node("e1", "EmailSuspendNode", "resetPassword"))
                .failing(ResourceKind::EmailTemplate, "resetPassword"),
        );
        let doc = assembler(&fetcher)
            .assemble(&session(DeploymentKind::Cloud, "7.1.0"), "Reset")
            .await
            .unwrap();
        assert!(doc.email_templates.is_empty());
        assert_eq!(doc.nodes.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_tree_is_fatal() {
        let fetcher = Arc::new(InMemoryFetcher::new());
        let err = assembler(&fetcher)
            .assemble(&session(DeploymentKind::Cloud, "7.1.0"), "Nope")
            .await
            .unwrap_err();
        match err {
            ExportError::Assemble { journey, source } => {
                assert_eq!(journey, "Nope");
                assert!(source.is_not_found());
                assert_eq!(source.kind(), ResourceKind::Tree);
            }
            other => panic!("Expected Assemble error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_failed_node_is_fatal() {
        let fetcher = Arc::new(login_fetcher().failing(ResourceKind::Node, "n1"));
        let err = assembler(&fetcher)
            .assemble(&session(DeploymentKind::Cloud, "7.1.0"), "Login")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("node 'n1'"));
    }

    #[tokio::test]
    async fn test_failed_page_child_is_fatal() {
        let fetcher = Arc::new(login_fetcher().failing(ResourceKind::Node, "n3"));
        let result = assembler(&fetcher)
            .assemble(&session(DeploymentKind::Cloud, "7.1.0"), "Login")
            .await;
        assert!(matches!(result, Err(ExportError::Assemble { .. })));
    }

    #[tokio::test]
    async fn test_page_without_child_list_is_decode_error() {
        let fetcher = Arc::new(
            InMemoryFetcher::new()
                .with_tree(tree("Broken", &[("p1", "PageNode")]))
                .with_node(node("p1", "PageNode")),
        );
        let err = assembler(&fetcher)
            .assemble(&session(DeploymentKind::Cloud, "7.1.0"), "Broken")
            .await
            .unwrap_err();
        match err {
            ExportError::Assemble { source, .. } => {
                assert!(matches!(source, FetchError::Decode { .. }));
            }
            other => panic!("Expected Assemble error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_nested_page_is_stored_not_expanded() {
        let fetcher = Arc::new(
            InMemoryFetcher::new()
                .with_tree(tree("Nested", &[("p1", "PageNode")]))
                .with_node(page_node("p1", &[("p2", "PageNode")]))
                .with_node(node("p2", "PageNode")),
        );
        let doc = assembler(&fetcher)
            .assemble(&session(DeploymentKind::Cloud, "7.1.0"), "Nested")
            .await
            .unwrap();
        let inner = doc.innernodes.unwrap();
        assert_eq!(inner.len(), 1);
        assert!(inner.contains_key("p2"));
        assert_eq!(fetcher.call_count(ResourceKind::Node), 2);
    }

    #[tokio::test]
    async fn test_sequential_and_concurrent_runs_agree() {
        let fetcher = Arc::new(login_fetcher());
        let session = session(DeploymentKind::Cloud, "7.1.0");
        let sequential = assembler(&fetcher)
            .with_concurrency(1)
            .assemble(&session, "Login")
            .await
            .unwrap();
        let concurrent = assembler(&fetcher)
            .with_concurrency(16)
            .assemble(&session, "Login")
            .await
            .unwrap();
        assert_eq!(sequential, concurrent);
    }
}
