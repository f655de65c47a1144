//! Shared building blocks for AM journey export: the authenticated session,
//! typed resource objects, the fetch collaborator trait, errors and config.

pub mod config;
pub mod error;
pub mod fetch;
pub mod session;
pub mod types;

pub use config::AppConfig;
pub use error::{ExportError, ExportResult, FetchError, FetchResult, ResourceKind};
pub use fetch::{InMemoryFetcher, ResourceFetcher};
pub use session::{DeploymentKind, SessionContext};
