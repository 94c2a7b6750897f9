//! Error types for the site generator.
//!
//! Errors are split by how far they are allowed to travel:
//!
//! - [`AppError`]: run-level failures that abort before or during the run
//!   (bad configuration, unreadable keyword file, HTTP 403 from the product API).
//! - [`FetchError`]: a single product API call went wrong. Everything except
//!   [`FetchError::Forbidden`] is recovered by the fetcher's fallback policy.
//! - [`PublishError`]: the optional GitHub publish step failed for one niche.
//!   Logged by the pipeline, never propagated.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Missing required configuration: {0}")]
    MissingConfig(&'static str),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Keyword file {path}: {source}")]
    KeywordFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Config file {path}: {source}")]
    ConfigFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Keyword file {path} has no 'keyword' or 'niche' column (found: {found})")]
    MissingColumn { path: String, found: String },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Product API rejected the credentials (HTTP 403) for {url}")]
    Forbidden { url: String },
}

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    #[error("Rate limited by {url} after {attempts} attempts")]
    RateLimited { attempts: u32, url: String },

    #[error("Forbidden (HTTP 403) from {url}")]
    Forbidden { url: String },

    #[error("Response from {url} is not valid JSON: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

impl FetchError {
    /// Only an authorization failure stops the run; everything else falls back.
    pub fn is_fatal(&self) -> bool {
        matches!(self, FetchError::Forbidden { .. })
    }
}

#[derive(Error, Debug)]
pub enum PublishError {
    #[error("GitHub token missing (set GITHUB_TOKEN or GH_TOKEN)")]
    MissingToken,

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("GitHub API {status} on {endpoint}: {message}")]
    Api {
        status: u16,
        endpoint: String,
        message: String,
    },

    #[error("git {command} failed: {message}")]
    Git { command: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;
