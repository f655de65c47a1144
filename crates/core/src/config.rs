use serde::Deserialize;
use tracing::debug;

use crate::error::{ExportError, ExportResult};

/// Root application configuration. Loaded from an optional `amtree.toml`
/// and environment variables with the prefix `AMTREE__`.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub tenant: String,
    #[serde(default = "default_realm")]
    pub realm: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub bearer_token: Option<String>,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub export: ExportConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExportConfig {
    /// Upper bound on in-flight fetches per operation. 1 runs sequentially.
    #[serde(default = "default_max_concurrent_fetches")]
    pub max_concurrent_fetches: usize,
}

// Default functions
fn default_realm() -> String {
    "/".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_connect_timeout_secs() -> u64 {
    10
}
fn default_max_concurrent_fetches() -> usize {
    8
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            max_concurrent_fetches: default_max_concurrent_fetches(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            tenant: String::new(),
            realm: default_realm(),
            username: None,
            password: None,
            bearer_token: None,
            http: HttpConfig::default(),
            export: ExportConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from `amtree.toml` (if present) and environment.
    pub fn load() -> ExportResult<Self> {
        Self::load_from("amtree")
    }

    /// Load from the named config file (extension optional, file optional)
    /// layered under `AMTREE__*` environment variables.
    pub fn load_from(file: &str) -> ExportResult<Self> {
        debug!(file, "Loading configuration");
        let builder = config::Config::builder()
            .add_source(config::File::with_name(file).required(false))
            .add_source(
                config::Environment::with_prefix("AMTREE")
                    .separator("__")
                    .try_parsing(true),
            );

        let config = builder.build()?;
        Ok(config.try_deserialize()?)
    }

    /// Checks the fields every remote operation depends on.
    pub fn validate(&self) -> ExportResult<()> {
        if self.tenant.trim().is_empty() {
            return Err(ExportError::Config(
                "tenant URL is required (AMTREE__TENANT or --tenant)".to_string(),
            ));
        }
        if !self.tenant.starts_with("http://") && !self.tenant.starts_with("https://") {
            return Err(ExportError::Config(format!(
                "tenant '{}' must be an http(s) URL",
                self.tenant
            )));
        }
        if self.export.max_concurrent_fetches == 0 {
            return Err(ExportError::Config(
                "export.max_concurrent_fetches must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
