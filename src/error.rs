//! Error types for the swagger-agent crate.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while building or querying an endpoint catalog.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SpecError {
    #[error("document is not valid JSON")]
    InvalidJson(#[source] serde_json::Error),

    #[error("failed to read document")]
    Read(#[source] std::io::Error),

    #[error("malformed spec document: {reason}")]
    Malformed { reason: String },

    #[error("endpoint not found: {method} {path}")]
    EndpointNotFound { method: String, path: String },
}

impl SpecError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed {
            reason: reason.into(),
        }
    }
}

/// Errors raised while turning an endpoint + values into a request.
///
/// These are always reported before any network activity.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RequestError {
    #[error("missing required path parameter: {name}")]
    MissingPathParameter { name: String },

    #[error("path placeholder has no value: {{{name}}}")]
    UnresolvedPlaceholder { name: String },

    #[error("failed to construct HTTP client")]
    Client(#[source] reqwest::Error),
}

/// Errors returned by an [`IntentResolver`](crate::resolver::IntentResolver).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ResolverError {
    #[error("intent resolver failed: {0}")]
    Failed(String),
}

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("failed to read config file: {}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file: {}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Errors surfaced by a [`Session`](crate::session::Session).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error("no spec document loaded")]
    NoDocument,

    #[error(transparent)]
    Spec(#[from] SpecError),

    #[error(transparent)]
    Request(#[from] RequestError),

    #[error(transparent)]
    Resolver(#[from] ResolverError),
}
