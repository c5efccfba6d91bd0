//! Error taxonomy
//!
//! Fatal errors (`DiscoveryError`, `ConfigError`) abort a run before any
//! output is produced. Everything else is recorded in the run's error report
//! and the pipeline keeps going.

use std::path::PathBuf;
use thiserror::Error;

/// The document catalog could not be read.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("catalog request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("catalog {url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("catalog {url} is malformed: {reason}")]
    Malformed { url: String, reason: String },
}

/// A single document could not be fetched.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status}")]
    Status { status: u16 },

    #[error("timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("no element matches content selector `{selector}`")]
    MissingContent { selector: String },

    #[error("render failed: {0}")]
    Render(String),
}

/// A funding paragraph without an extractable company name.
#[derive(Debug, Clone, Error)]
#[error("no company name in paragraph from {document_id}: {excerpt}")]
pub struct ExtractionParseFailure {
    pub document_id: String,
    pub excerpt: String,
}

/// One ATS query failed for transport or payload reasons.
#[derive(Debug, Error)]
pub enum AtsQueryError {
    #[error("HTTP error: {0}")]
    Http(reqwest::Error),

    #[error("timed out")]
    Timeout,

    #[error("unexpected HTTP {status}")]
    Status { status: u16 },

    #[error("unexpected response shape: {0}")]
    Shape(String),

    #[error("query pool closed")]
    PoolClosed,
}

impl From<reqwest::Error> for AtsQueryError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AtsQueryError::Timeout
        } else if err.is_decode() {
            AtsQueryError::Shape(err.to_string())
        } else {
            AtsQueryError::Http(err)
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid configuration: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

/// Errors that abort a whole run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Configuration(#[from] ConfigError),

    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}
