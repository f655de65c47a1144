//! Resource-fetch collaborators: the trait the export engine reads through.
//!
//! The HTTP implementation lives in `amtree-client`; the in-memory one below
//! backs tests and offline runs.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{FetchError, FetchResult, ResourceKind};
use crate::session::SessionContext;
use crate::types::{EmailTemplateObject, NodeObject, ScriptObject, TreeObject};

/// Reads one kind of remote object by identifier. Implementations apply
/// their own timeouts and never retry.
#[async_trait]
pub trait ResourceFetcher: Send + Sync {
    async fn fetch_tree(&self, session: &SessionContext, name: &str) -> FetchResult<TreeObject>;

    async fn fetch_node(
        &self,
        session: &SessionContext,
        id: &str,
        node_type: &str,
    ) -> FetchResult<NodeObject>;

    async fn fetch_script(&self, session: &SessionContext, id: &str) -> FetchResult<ScriptObject>;

    async fn fetch_email_template(
        &self,
        session: &SessionContext,
        id: &str,
    ) -> FetchResult<EmailTemplateObject>;

    /// Every tree in the session's realm, each with its `nodes` map.
    async fn fetch_tree_list(&self, session: &SessionContext) -> FetchResult<Vec<TreeObject>>;
}

/// In-memory fetcher. Unknown ids yield `NotFound`; ids registered with
/// [`InMemoryFetcher::failing`] yield a transport error.
#[derive(Default)]
pub struct InMemoryFetcher {
    trees: Mutex<HashMap<String, TreeObject>>,
    nodes: Mutex<HashMap<String, NodeObject>>,
    scripts: Mutex<HashMap<String, ScriptObject>>,
    email_templates: Mutex<HashMap<String, EmailTemplateObject>>,
    failures: Mutex<HashSet<(ResourceKind, String)>>,
    calls: Mutex<HashMap<ResourceKind, usize>>,
}

impl InMemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tree(self, tree: TreeObject) -> Self {
        self.add_tree(tree);
        self
    }

    pub fn with_node(self, node: NodeObject) -> Self {
        self.add_node(node);
        self
    }

    pub fn with_script(self, script: ScriptObject) -> Self {
        self.add_script(script);
        self
    }

    pub fn with_email_template(self, template: EmailTemplateObject) -> Self {
        self.add_email_template(template);
        self
    }

    /// Forces every fetch of `(kind, id)` to fail with a transport error.
    pub fn failing(self, kind: ResourceKind, id: impl Into<String>) -> Self {
        self.failures
            .lock()
            .expect("fetcher mutex poisoned")
            .insert((kind, id.into()));
        self
    }

    pub fn add_tree(&self, tree: TreeObject) {
        self.trees
            .lock()
            .expect("fetcher mutex poisoned")
            .insert(tree.id.clone(), tree);
    }

    pub fn add_node(&self, node: NodeObject) {
        self.nodes
            .lock()
            .expect("fetcher mutex poisoned")
            .insert(node.id.clone(), node);
    }

    pub fn add_script(&self, script: ScriptObject) {
        self.scripts
            .lock()
            .expect("fetcher mutex poisoned")
            .insert(script.id.clone(), script);
    }

    pub fn add_email_template(&self, template: EmailTemplateObject) {
        self.email_templates
            .lock()
            .expect("fetcher mutex poisoned")
            .insert(template.id.clone(), template);
    }

    /// Number of fetches issued for `kind` so far, failed ones included.
    pub fn call_count(&self, kind: ResourceKind) -> usize {
        self.calls
            .lock()
            .expect("fetcher mutex poisoned")
            .get(&kind)
            .copied()
            .unwrap_or(0)
    }

    fn record(&self, kind: ResourceKind, id: &str) -> FetchResult<()> {
        *self
            .calls
            .lock()
            .expect("fetcher mutex poisoned")
            .entry(kind)
            .or_insert(0) += 1;

        let failing = self
            .failures
            .lock()
            .expect("fetcher mutex poisoned")
            .contains(&(kind, id.to_string()));
        if failing {
            return Err(FetchError::transport(kind, id, "simulated connection failure"));
        }
        Ok(())
    }

    fn lookup<T: Clone>(
        map: &Mutex<HashMap<String, T>>,
        kind: ResourceKind,
        id: &str,
    ) -> FetchResult<T> {
        map.lock()
            .expect("fetcher mutex poisoned")
            .get(id)
            .cloned()
            .ok_or_else(|| FetchError::NotFound {
                kind,
                id: id.to_string(),
            })
    }
}

#[async_trait]
impl ResourceFetcher for InMemoryFetcher {
    async fn fetch_tree(&self, _session: &SessionContext, name: &str) -> FetchResult<TreeObject> {
        self.record(ResourceKind::Tree, name)?;
        Self::lookup(&self.trees, ResourceKind::Tree, name)
    }

    async fn fetch_node(
        &self,
        _session: &SessionContext,
        id: &str,
        node_type: &str,
    ) -> FetchResult<NodeObject> {
        self.record(ResourceKind::Node, id)?;
        let node = Self::lookup(&self.nodes, ResourceKind::Node, id)?;
        // The server addresses nodes by type and id; a wrong type is a miss.
        match node.type_id() {
            Some(declared) if declared != node_type => Err(FetchError::NotFound {
                kind: ResourceKind::Node,
                id: id.to_string(),
            }),
            _ => Ok(node),
        }
    }

    async fn fetch_script(&self, _session: &SessionContext, id: &str) -> FetchResult<ScriptObject> {
        self.record(ResourceKind::Script, id)?;
        Self::lookup(&self.scripts, ResourceKind::Script, id)
    }

    async fn fetch_email_template(
        &self,
        _session: &SessionContext,
        id: &str,
    ) -> FetchResult<EmailTemplateObject> {
        self.record(ResourceKind::EmailTemplate, id)?;
        Self::lookup(&self.email_templates, ResourceKind::EmailTemplate, id)
    }

    async fn fetch_tree_list(&self, session: &SessionContext) -> FetchResult<Vec<TreeObject>> {
        self.record(ResourceKind::TreeList, &session.realm)?;
        let mut trees: Vec<TreeObject> = self
            .trees
            .lock()
            .expect("fetcher mutex poisoned")
            .values()
            .cloned()
            .collect();
        trees.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(trees)
    }
}
