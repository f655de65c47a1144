//! HTTP collaborators for AM and IDM: the resource fetcher used by the
//! journey engine and the session bootstrap that authenticates it.

pub mod auth;
pub mod http;

pub use auth::{extract_version, prepare_two_factor_skip, SessionBootstrap};
pub use http::{realm_path, tenant_origin, AmHttpFetcher};
