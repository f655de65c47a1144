use std::collections::HashSet;
use std::sync::Arc;

use amtree_core::fetch::ResourceFetcher;
use amtree_core::session::SessionContext;
use amtree_core::types::TreeObject;
use futures_util::stream::{self, StreamExt};
use tracing::{debug, warn};

use crate::assembler::DEFAULT_MAX_CONCURRENCY;
use crate::catalog::{classify_role, ootb_whitelist};

/// Decides whether a tree uses any node type outside the OOTB whitelist of
/// the session's server version.
#[derive(Clone)]
pub struct CustomizationDetector {
    fetcher: Arc<dyn ResourceFetcher>,
    max_concurrency: usize,
}

impl std::fmt::Debug for CustomizationDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CustomizationDetector")
            .field("max_concurrency", &self.max_concurrency)
            .finish()
    }
}

impl CustomizationDetector {
    pub fn new(fetcher: Arc<dyn ResourceFetcher>) -> Self {
        Self {
            fetcher,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }

    pub fn with_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    /// `true` when the tree is customized. Never fails: an unknown server
    /// version, or any error while reading a page node's children, counts
    /// as customization.
    pub async fn is_custom(&self, session: &SessionContext, tree: &TreeObject) -> bool {
        let Some(whitelist) = ootb_whitelist(&session.version) else {
            debug!(tree = %tree.id, version = %session.version, "No whitelist for version");
            return true;
        };

        if let Some((id, entry)) = tree
            .nodes
            .iter()
            .find(|(_, entry)| !whitelist.contains(entry.node_type.as_str()))
        {
            debug!(
                tree = %tree.id,
                node_id = %id,
                node_type = %entry.node_type,
                "Custom node type"
            );
            return true;
        }

        let containers = tree
            .nodes
            .iter()
            .filter(|(_, entry)| classify_role(&entry.node_type).is_container);

        let mut checks = stream::iter(containers)
            .map(|(id, entry)| self.container_is_custom(session, whitelist, id, &entry.node_type))
            .buffer_unordered(self.max_concurrency);

        while let Some(custom) = checks.next().await {
            if custom {
                return true;
            }
        }
        false
    }

    async fn container_is_custom(
        &self,
        session: &SessionContext,
        whitelist: &HashSet<&'static str>,
        id: &str,
        node_type: &str,
    ) -> bool {
        let node = match self.fetcher.fetch_node(session, id, node_type).await {
            Ok(node) => node,
            Err(e) => {
                warn!(node_id = %id, error = %e, "Cannot inspect page node, assuming custom");
                return true;
            }
        };

        let Some(children) = node.nodes else {
            warn!(node_id = %id, "Page node has no child list, assuming custom");
            return true;
        };

        match children
            .iter()
            .find(|child| !whitelist.contains(child.node_type.as_str()))
        {
            Some(child) => {
                debug!(
                    node_id = %id,
                    child_id = %child.id,
                    node_type = %child.node_type,
                    "Custom node type inside page"
                );
                true
            }
            None => false,
        }
    }
}
