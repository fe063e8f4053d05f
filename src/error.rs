//! Error types for rnaseq-qc operations.
//!
//! Two families of failure exist:
//! - Configuration problems (config file, credentials, CLI input), raised
//!   before any remote call is made
//! - Remote service failures (Airtable, Cloud Storage, Hail Batch), which are
//!   never retried and propagate to the process boundary

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while assembling the run configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    #[error("Config file {path} doesn't contain a \"{key}\" key")]
    MissingKey { path: PathBuf, key: String },

    #[error("Config value '{key}' must not be empty")]
    EmptyValue { key: String },

    #[error("Missing required argument: {0}")]
    MissingArgument(String),

    #[error("Could not determine the home directory")]
    NoHomeDir,

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors returned by the hosted table, object storage and batch services.
#[derive(Debug, Error)]
pub enum RemoteServiceError {
    #[error("{service} request failed: {message}")]
    RequestFailed {
        service: &'static str,
        message: String,
    },

    #[error("{service} API error ({code}): {message}")]
    ApiError {
        service: &'static str,
        code: u16,
        message: String,
    },

    #[error("Failed to parse {service} response: {message}")]
    ParseError {
        service: &'static str,
        message: String,
    },

    #[error("Invalid object path '{0}': expected gs://bucket/object")]
    InvalidObjectPath(String),

    #[error("Credential helper failed: {0}")]
    Credentials(String),
}

impl RemoteServiceError {
    pub(crate) fn request(service: &'static str, err: impl std::fmt::Display) -> Self {
        Self::RequestFailed {
            service,
            message: err.to_string(),
        }
    }

    pub(crate) fn parse(service: &'static str, err: impl std::fmt::Display) -> Self {
        Self::ParseError {
            service,
            message: err.to_string(),
        }
    }

    /// Turns a non-success HTTP response into an `ApiError`, keeping the body text.
    pub(crate) async fn from_response(service: &'static str, response: reqwest::Response) -> Self {
        let code = response.status().as_u16();
        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "Failed to read error response".to_string());
        Self::ApiError {
            service,
            code,
            message,
        }
    }
}

/// Any failure of a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Remote(#[from] RemoteServiceError),
}
