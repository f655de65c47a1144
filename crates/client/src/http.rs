//! HTTP implementation of [`ResourceFetcher`] against the AM REST API and the
//! IDM config endpoint.

use std::time::Duration;

use amtree_core::config::HttpConfig;
use amtree_core::error::{ExportError, ExportResult, FetchError, FetchResult, ResourceKind};
use amtree_core::fetch::ResourceFetcher;
use amtree_core::session::SessionContext;
use amtree_core::types::{EmailTemplateObject, NodeObject, ScriptObject, TreeObject};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;
use url::Url;

pub const AM_API_VERSION: &str = "resource=1.0";

const TREES_PATH: &str = "realm-config/authentication/authenticationtrees/trees";
const NODES_PATH: &str = "realm-config/authentication/authenticationtrees/nodes";

/// `{ "result": [...] }` envelope of AM query endpoints.
#[derive(Debug, Deserialize)]
struct QueryResult<T> {
    result: Vec<T>,
}

/// `/realms/root` for the root realm, `/realms/root/realms/<name>` otherwise.
/// A leading `/` on the realm name is ignored.
pub fn realm_path(realm: &str) -> String {
    let name = realm
        .strip_prefix('/')
        .filter(|rest| !rest.is_empty())
        .unwrap_or(realm);
    if name.is_empty() || name == "/" {
        "/realms/root".to_string()
    } else {
        format!("/realms/root/realms/{}", name)
    }
}

/// `scheme://host[:port]` of the tenant URL.
pub fn tenant_origin(tenant: &str) -> Result<String, url::ParseError> {
    Ok(Url::parse(tenant)?.origin().ascii_serialization())
}

pub(crate) fn build_client(config: &HttpConfig) -> ExportResult<Client> {
    Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .build()
        .map_err(|e| ExportError::Config(format!("failed to build HTTP client: {}", e)))
}

/// Appends `path` (split on `/`) and then each of `ids` as a single encoded
/// segment to `base`.
pub(crate) fn endpoint(
    base: &str,
    path: &str,
    ids: &[&str],
    kind: ResourceKind,
    id: &str,
) -> FetchResult<Url> {
    let mut url = Url::parse(base).map_err(|e| FetchError::transport(kind, id, e))?;
    url.path_segments_mut()
        .map_err(|_| FetchError::transport(kind, id, format!("'{}' is not a base URL", base)))?
        .pop_if_empty()
        .extend(path.split('/').filter(|s| !s.is_empty()))
        .extend(ids);
    Ok(url)
}

/// AM request carrying the API version and the session cookie.
pub(crate) fn am_get(
    client: &Client,
    url: Url,
    cookie_name: &str,
    cookie_value: &str,
) -> RequestBuilder {
    client
        .get(url)
        .header("Accept-API-Version", AM_API_VERSION)
        .header("X-Requested-With", "XmlHttpRequest")
        .header(reqwest::header::COOKIE, format!("{}={}", cookie_name, cookie_value))
}

/// Sends the request; any status outside 200..=399 becomes an error.
pub(crate) async fn send(
    request: RequestBuilder,
    kind: ResourceKind,
    id: &str,
) -> FetchResult<Response> {
    let response = request
        .send()
        .await
        .map_err(|e| FetchError::transport(kind, id, e))?;
    let status = response.status().as_u16();
    debug!(%kind, id, status, "HTTP response");
    if !(200..400).contains(&status) {
        return Err(FetchError::from_status(kind, id, status));
    }
    Ok(response)
}

pub(crate) async fn read_json<T: DeserializeOwned>(
    request: RequestBuilder,
    kind: ResourceKind,
    id: &str,
) -> FetchResult<T> {
    let body = send(request, kind, id)
        .await?
        .bytes()
        .await
        .map_err(|e| FetchError::transport(kind, id, e))?;
    serde_json::from_slice(&body).map_err(|e| FetchError::decode(kind, id, e))
}

/// Reads journeys, nodes and scripts from AM with the session cookie, and
/// email templates and config entities from IDM with the bearer token.
#[derive(Debug, Clone)]
pub struct AmHttpFetcher {
    client: Client,
}

impl AmHttpFetcher {
    pub fn new(config: &HttpConfig) -> ExportResult<Self> {
        Ok(Self::with_client(build_client(config)?))
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    fn realm_url(
        session: &SessionContext,
        path: &str,
        ids: &[&str],
        kind: ResourceKind,
        id: &str,
    ) -> FetchResult<Url> {
        let path = format!("json{}/{}", realm_path(&session.realm), path);
        endpoint(&session.tenant, &path, ids, kind, id)
    }

    fn am_request(&self, session: &SessionContext, url: Url) -> RequestBuilder {
        am_get(&self.client, url, &session.cookie_name, &session.cookie_value)
    }

    fn idm_request(
        &self,
        session: &SessionContext,
        path: &str,
        ids: &[&str],
        kind: ResourceKind,
        id: &str,
    ) -> FetchResult<RequestBuilder> {
        let token = session
            .bearer_token
            .as_deref()
            .ok_or_else(|| FetchError::transport(kind, id, "no bearer token configured"))?;
        let origin =
            tenant_origin(&session.tenant).map_err(|e| FetchError::transport(kind, id, e))?;
        let url = endpoint(&origin, path, ids, kind, id)?;
        Ok(self.client.get(url).bearer_auth(token))
    }

    /// Raw IDM configuration object, e.g. `managed` or `ui/configuration`.
    pub async fn fetch_config_entity(
        &self,
        session: &SessionContext,
        entity: &str,
    ) -> FetchResult<Value> {
        let kind = ResourceKind::ConfigEntity;
        let path = format!("openidm/config/{}", entity);
        let request = self.idm_request(session, &path, &[], kind, entity)?;
        read_json(request, kind, entity).await
    }
}

#[async_trait]
impl ResourceFetcher for AmHttpFetcher {
    async fn fetch_tree(&self, session: &SessionContext, name: &str) -> FetchResult<TreeObject> {
        let kind = ResourceKind::Tree;
        let url = Self::realm_url(session, TREES_PATH, &[name], kind, name)?;
        read_json(self.am_request(session, url), kind, name).await
    }

    async fn fetch_node(
        &self,
        session: &SessionContext,
        id: &str,
        node_type: &str,
    ) -> FetchResult<NodeObject> {
        let kind = ResourceKind::Node;
        let url = Self::realm_url(session, NODES_PATH, &[node_type, id], kind, id)?;
        read_json(self.am_request(session, url), kind, id).await
    }

    async fn fetch_script(&self, session: &SessionContext, id: &str) -> FetchResult<ScriptObject> {
        let kind = ResourceKind::Script;
        let url = Self::realm_url(session, "scripts", &[id], kind, id)?;
        read_json(self.am_request(session, url), kind, id).await
    }

    async fn fetch_email_template(
        &self,
        session: &SessionContext,
        id: &str,
    ) -> FetchResult<EmailTemplateObject> {
        let kind = ResourceKind::EmailTemplate;
        let request = self.idm_request(session, "openidm/config/emailTemplate", &[id], kind, id)?;
        read_json(request, kind, id).await
    }

    async fn fetch_tree_list(&self, session: &SessionContext) -> FetchResult<Vec<TreeObject>> {
        let kind = ResourceKind::TreeList;
        let realm = session.realm.as_str();
        let mut url = Self::realm_url(session, TREES_PATH, &[], kind, realm)?;
        url.set_query(Some("_queryFilter=true"));
        let page: QueryResult<TreeObject> =
            read_json(self.am_request(session, url), kind, realm).await?;
        Ok(page.result)
    }
}
