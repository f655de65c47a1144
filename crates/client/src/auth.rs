//! Session bootstrap: cookie name discovery, username/password login (with
//! the two-factor skip), server version and deployment detection.

use std::sync::LazyLock;

use amtree_core::config::HttpConfig;
use amtree_core::error::{ExportError, ExportResult, FetchResult, ResourceKind};
use amtree_core::session::{DeploymentKind, SessionContext};
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::http::{am_get, build_client, endpoint, read_json, send};

pub const AUTH_API_VERSION: &str = "resource=2.0, protocol=1.0";

const CLOUD_ADMIN_CLIENT: &str = "idmAdminClient";
const FORGEOPS_ADMIN_CLIENT: &str = "idm-admin-ui";

static VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d\.\d\.\d(\.\d)*").expect("valid version pattern"));

#[derive(Debug, Deserialize)]
struct ServerInfo {
    #[serde(rename = "cookieName")]
    cookie_name: String,
}

#[derive(Debug, Deserialize)]
struct VersionInfo {
    version: String,
    #[serde(rename = "fullVersion", default)]
    full_version: Option<String>,
}

/// Rewrites an authentication callback payload so that every
/// `HiddenValueCallback` whose first input value contains `skip` answers
/// `Skip`. Returns `None` when the payload has no `callbacks` array, i.e. the
/// login already completed.
pub fn prepare_two_factor_skip(payload: &Value) -> Option<Value> {
    let mut updated = payload.clone();
    let callbacks = updated.get_mut("callbacks")?.as_array_mut()?;

    for callback in callbacks
        .iter_mut()
        .filter(|cb| cb.get("type").and_then(Value::as_str) == Some("HiddenValueCallback"))
    {
        let value = callback
            .get_mut("input")
            .and_then(|inputs| inputs.get_mut(0))
            .and_then(|input| input.get_mut("value"));
        if let Some(value) = value {
            if value.as_str().is_some_and(|v| v.contains("skip")) {
                *value = Value::String("Skip".to_string());
            }
        }
    }
    Some(updated)
}

/// First `d.d.d[.d...]` run in a server version banner.
pub fn extract_version(banner: &str) -> Option<String> {
    VERSION_RE.find(banner).map(|m| m.as_str().to_string())
}

fn token_id(payload: &Value) -> ExportResult<String> {
    payload
        .get("tokenId")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ExportError::Auth("no tokenId in authentication response".to_string()))
}

/// Turns tenant URL and credentials into a [`SessionContext`].
#[derive(Debug, Clone)]
pub struct SessionBootstrap {
    client: Client,
}

impl SessionBootstrap {
    pub fn new(config: &HttpConfig) -> ExportResult<Self> {
        Ok(Self::with_client(build_client(config)?))
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    pub async fn establish(
        &self,
        tenant: &str,
        realm: &str,
        username: &str,
        password: &str,
        bearer_token: Option<String>,
    ) -> ExportResult<SessionContext> {
        let cookie_name = self.cookie_name(tenant).await?;
        let token = self.authenticate(tenant, username, password).await?;
        let version = self.server_version(tenant, &cookie_name, &token).await?;
        let deployment = self.determine_deployment(tenant, &cookie_name, &token).await?;

        info!(
            tenant,
            realm,
            version = %version,
            deployment = %deployment,
            "Session established"
        );

        let session =
            SessionContext::new(tenant, realm, deployment, version).with_cookie(cookie_name, token);
        Ok(match bearer_token {
            Some(bearer) => session.with_bearer_token(bearer),
            None => session,
        })
    }

    /// Name of the AM session cookie, from `serverinfo/*`.
    pub async fn cookie_name(&self, tenant: &str) -> FetchResult<String> {
        let kind = ResourceKind::ServerInfo;
        let url = endpoint(tenant, "json/serverinfo/*", &[], kind, "*")?;
        let info: ServerInfo = read_json(self.client.get(url), kind, "*").await?;
        Ok(info.cookie_name)
    }

    /// Logs in against the root realm and returns the session token.
    pub async fn authenticate(
        &self,
        tenant: &str,
        username: &str,
        password: &str,
    ) -> ExportResult<String> {
        let kind = ResourceKind::Authentication;
        let url = endpoint(tenant, "json/realms/root/authenticate", &[], kind, username)?;

        let first = self
            .client
            .post(url.clone())
            .header("Accept-API-Version", AUTH_API_VERSION)
            .header("X-OpenAM-Username", username)
            .header("X-OpenAM-Password", password)
            .json(&json!({}));
        let first: Value = read_json(first, kind, username).await.map_err(|e| {
            ExportError::Auth(format!("{}; likely cause: wrong username or password", e))
        })?;

        let Some(answer) = prepare_two_factor_skip(&first) else {
            return token_id(&first);
        };

        debug!(username, "Answering two-factor callbacks with Skip");
        let second = self
            .client
            .post(url)
            .header("Accept-API-Version", AUTH_API_VERSION)
            .json(&answer);
        let second: Value = read_json(second, kind, username).await.map_err(|e| {
            ExportError::Auth(format!("{}; likely cause: two-factor skip not possible", e))
        })?;
        token_id(&second)
    }

    /// Normalized server version, or an empty string when the banner holds
    /// none (every tree then classifies as custom).
    pub async fn server_version(
        &self,
        tenant: &str,
        cookie_name: &str,
        token: &str,
    ) -> ExportResult<String> {
        let kind = ResourceKind::ServerInfo;
        let url = endpoint(tenant, "json/serverinfo/version", &[], kind, "version")?;
        let info: VersionInfo =
            read_json(am_get(&self.client, url, cookie_name, token), kind, "version").await?;

        if let Some(full) = &info.full_version {
            info!(server = %full, "Connected");
        }
        match extract_version(&info.version) {
            Some(version) => Ok(version),
            None => {
                warn!(banner = %info.version, "Unrecognized server version");
                Ok(String::new())
            }
        }
    }

    /// Probes for the admin OAuth client each deployment ships with.
    pub async fn determine_deployment(
        &self,
        tenant: &str,
        cookie_name: &str,
        token: &str,
    ) -> ExportResult<DeploymentKind> {
        let cloud = self
            .probe_client(
                tenant,
                "/realms/root/realms/alpha",
                CLOUD_ADMIN_CLIENT,
                cookie_name,
                token,
            )
            .await;
        match cloud {
            Ok(()) => return Ok(DeploymentKind::Cloud),
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e.into()),
        }

        let forgeops = self
            .probe_client(tenant, "/realms/root", FORGEOPS_ADMIN_CLIENT, cookie_name, token)
            .await;
        match forgeops {
            Ok(()) => Ok(DeploymentKind::ForgeOps),
            Err(e) if e.is_not_found() => Ok(DeploymentKind::Classic),
            Err(e) => Err(e.into()),
        }
    }

    async fn probe_client(
        &self,
        tenant: &str,
        realm_path: &str,
        client_id: &str,
        cookie_name: &str,
        token: &str,
    ) -> FetchResult<()> {
        let kind = ResourceKind::OAuthClient;
        let path = format!("json{}/realm-config/agents/OAuth2Client", realm_path);
        let url = endpoint(tenant, &path, &[client_id], kind, client_id)?;
        send(am_get(&self.client, url, cookie_name, token), kind, client_id).await?;
        debug!(client_id, "Found admin OAuth client");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn callback_payload(hidden_value: &str) -> Value {
        json!({
            "authId": "abc",
            "callbacks": [
                {
                    "type": "TextOutputCallback",
                    "output": [{"name": "message", "value": "Register a device"}]
                },
                {
                    "type": "HiddenValueCallback",
                    "output": [{"name": "value", "value": ""}],
                    "input": [{"name": "IDToken2", "value": hidden_value}]
                }
            ]
        })
    }

    #[test]
    fn test_skip_rewrites_hidden_skip_callback() {
        let updated = prepare_two_factor_skip(&callback_payload("skip-registration")).unwrap();
        assert_eq!(updated["callbacks"][1]["input"][0]["value"], "Skip");
        assert_eq!(updated["callbacks"][0]["output"][0]["value"], "Register a device");
        assert_eq!(updated["authId"], "abc");
    }

    #[test]
    fn test_skip_leaves_other_hidden_values() {
        let updated = prepare_two_factor_skip(&callback_payload("webAuthnOutcome")).unwrap();
        assert_eq!(updated["callbacks"][1]["input"][0]["value"], "webAuthnOutcome");
    }

    #[test]
    fn test_no_callbacks_means_login_complete() {
        assert!(prepare_two_factor_skip(&json!({"tokenId": "t", "successUrl": "/"})).is_none());
    }

    #[test]
    fn test_extract_version() {
        assert_eq!(extract_version("7.1.0").as_deref(), Some("7.1.0"));
        assert_eq!(extract_version("6.5.2.3").as_deref(), Some("6.5.2.3"));
        assert_eq!(
            extract_version("ForgeRock Access Management 7.0.1 Build 6f2c3").as_deref(),
            Some("7.0.1")
        );
        assert!(extract_version("unknown").is_none());
    }

    #[test]
    fn test_token_id_required() {
        assert_eq!(token_id(&json!({"tokenId": "abc"})).unwrap(), "abc");
        assert!(matches!(token_id(&json!({})), Err(ExportError::Auth(_))));
    }
}
