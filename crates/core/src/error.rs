use std::fmt;

use thiserror::Error;

pub type ExportResult<T> = Result<T, ExportError>;
pub type FetchResult<T> = Result<T, FetchError>;

/// Remote resource addressed by a fetch. Carried by every [`FetchError`] so
/// messages name what was being read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Tree,
    Node,
    Script,
    EmailTemplate,
    TreeList,
    ServerInfo,
    Authentication,
    OAuthClient,
    ConfigEntity,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ResourceKind::Tree => "tree",
            ResourceKind::Node => "node",
            ResourceKind::Script => "script",
            ResourceKind::EmailTemplate => "email template",
            ResourceKind::TreeList => "tree list",
            ResourceKind::ServerInfo => "server info",
            ResourceKind::Authentication => "authentication",
            ResourceKind::OAuthClient => "oauth client",
            ResourceKind::ConfigEntity => "config entity",
        };
        f.write_str(label)
    }
}

/// Failure of a single resource-fetch collaborator call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("Transport error reading {kind} '{id}': {message}")]
    Transport {
        kind: ResourceKind,
        id: String,
        message: String,
    },

    #[error("Reading {kind} '{id}' returned status {code}")]
    Status {
        kind: ResourceKind,
        id: String,
        code: u16,
    },

    #[error("{kind} '{id}' not found")]
    NotFound { kind: ResourceKind, id: String },

    #[error("Failed to decode {kind} '{id}': {message}")]
    Decode {
        kind: ResourceKind,
        id: String,
        message: String,
    },
}

impl FetchError {
    /// Maps an out-of-range status to `NotFound` (404) or `Status`.
    pub fn from_status(kind: ResourceKind, id: impl Into<String>, code: u16) -> Self {
        let id = id.into();
        if code == 404 {
            FetchError::NotFound { kind, id }
        } else {
            FetchError::Status { kind, id, code }
        }
    }

    pub fn transport(
        kind: ResourceKind,
        id: impl Into<String>,
        message: impl fmt::Display,
    ) -> Self {
        FetchError::Transport {
            kind,
            id: id.into(),
            message: message.to_string(),
        }
    }

    pub fn decode(kind: ResourceKind, id: impl Into<String>, message: impl fmt::Display) -> Self {
        FetchError::Decode {
            kind,
            id: id.into(),
            message: message.to_string(),
        }
    }

    pub fn kind(&self) -> ResourceKind {
        match self {
            FetchError::Transport { kind, .. }
            | FetchError::Status { kind, .. }
            | FetchError::NotFound { kind, .. }
            | FetchError::Decode { kind, .. } => *kind,
        }
    }

    /// Status code carried by `Status` and `NotFound` errors.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            FetchError::Status { code, .. } => Some(*code),
            FetchError::NotFound { .. } => Some(404),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, FetchError::NotFound { .. })
    }
}

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Failed to assemble journey '{journey}': {source}")]
    Assemble {
        journey: String,
        #[source]
        source: FetchError,
    },

    #[error("Failed to list journeys in realm '{realm}': {source}")]
    List {
        realm: String,
        #[source]
        source: FetchError,
    },

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<config::ConfigError> for ExportError {
    fn from(err: config::ConfigError) -> Self {
        ExportError::Config(err.to_string())
    }
}
