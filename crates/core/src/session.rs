//! Authenticated session shared read-only by every export operation.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Where the identity platform runs. Decides which endpoints exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeploymentKind {
    Classic,
    Cloud,
    ForgeOps,
}

impl DeploymentKind {
    /// Cloud and ForgeOps expose the IDM email-template endpoint.
    pub fn supports_email_templates(&self) -> bool {
        matches!(self, DeploymentKind::Cloud | DeploymentKind::ForgeOps)
    }
}

impl fmt::Display for DeploymentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeploymentKind::Classic => f.write_str("Classic"),
            DeploymentKind::Cloud => f.write_str("Cloud"),
            DeploymentKind::ForgeOps => f.write_str("ForgeOps"),
        }
    }
}

/// Opaque, already-authenticated context. Built once per invocation and
/// passed by reference into every operation; never mutated afterwards.
///
/// `tenant` and `realm` are kept exactly as supplied: the export origin
/// hashes them verbatim. URL building tolerates a trailing `/` and an empty
/// realm.
#[derive(Clone, Serialize, Deserialize)]
pub struct SessionContext {
    pub tenant: String,
    pub realm: String,
    pub cookie_name: String,
    pub cookie_value: String,
    pub bearer_token: Option<String>,
    pub deployment: DeploymentKind,
    pub version: String,
}

impl SessionContext {
    pub fn new(
        tenant: impl Into<String>,
        realm: impl Into<String>,
        deployment: DeploymentKind,
        version: impl Into<String>,
    ) -> Self {
        Self {
            tenant: tenant.into(),
            realm: realm.into(),
            cookie_name: String::new(),
            cookie_value: String::new(),
            bearer_token: None,
            deployment,
            version: version.into(),
        }
    }

    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookie_name = name.into();
        self.cookie_value = value.into();
        self
    }

    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }
}

// Credentials stay out of logs.
impl fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionContext")
            .field("tenant", &self.tenant)
            .field("realm", &self.realm)
            .field("cookie_name", &self.cookie_name)
            .field("has_cookie", &!self.cookie_value.is_empty())
            .field("has_bearer_token", &self.bearer_token.is_some())
            .field("deployment", &self.deployment)
            .field("version", &self.version)
            .finish()
    }
}
