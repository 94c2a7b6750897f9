//! Run configuration, resolved once at startup.
//!
//! Sources, highest precedence first:
//!
//! 1. command-line flags and their environment variables ([`Cli`])
//! 2. the YAML file passed with `--config` ([`FileConfig`])
//! 3. built-in defaults
//!
//! The result is an immutable [`Config`] handed to the fetcher, renderer, and
//! publisher. Nothing downstream reads the environment.
//!
//! # Example config file
//!
//! ```yaml
//! niches: data/niches.csv
//! output_dir: dist
//! country: US
//! max_products: 8
//! fallback: placeholder
//! retry:
//!   max_attempts: 3
//!   backoff_ms: 5000
//! publish:
//!   owner: my-org
//!   repo_prefix: best-
//!   enable_pages: true
//! ```

use crate::api::{Backoff, RetryPolicy};
use crate::cli::Cli;
use crate::error::{AppError, Result};
use crate::fetcher::{FallbackPolicy, FetchStrategy, FetcherSettings};
use crate::publish::PublishSettings;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

pub const DEFAULT_RAPIDAPI_HOST: &str = "amazon-real-time-api.p.rapidapi.com";
pub const DEFAULT_SEARCH_PATH: &str = "/search";
pub const DEFAULT_DETAIL_PATH: &str = "/product-details";
pub const DEFAULT_REVIEWS_PATH: &str = "/product-reviews";
pub const DEFAULT_MAX_PRODUCTS: usize = 10;
pub const DEFAULT_REQUEST_DELAY_MS: u64 = 1_000;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_BACKOFF_MS: u64 = 5_000;
pub const DEFAULT_MAX_BACKOFF_MS: u64 = 30_000;

/// Retry section of the config file.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryFile {
    pub max_attempts: Option<u32>,
    pub backoff_ms: Option<u64>,
    /// Double the delay on each attempt (with jitter) instead of a fixed delay.
    pub exponential: Option<bool>,
    pub max_backoff_ms: Option<u64>,
}

/// Publish section of the config file. Tokens are never read from the file.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PublishFile {
    pub enabled: Option<bool>,
    pub owner: Option<String>,
    pub repo_prefix: Option<String>,
    pub branch: Option<String>,
    pub enable_pages: Option<bool>,
    pub api_base: Option<String>,
    pub git_host: Option<String>,
    /// Git remote base, e.g. a local directory of bare repositories.
    pub remote_base: Option<String>,
    pub commit_name: Option<String>,
    pub commit_email: Option<String>,
}

/// Optional settings loaded from YAML.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub niches: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub template_dir: Option<PathBuf>,
    pub rapidapi_host: Option<String>,
    pub api_base_url: Option<String>,
    pub search_path: Option<String>,
    pub detail_path: Option<String>,
    pub reviews_path: Option<String>,
    pub query_param: Option<String>,
    pub country: Option<String>,
    pub max_products: Option<usize>,
    pub assoc_tag: Option<String>,
    pub fallback: Option<FallbackPolicy>,
    pub strategy: Option<FetchStrategy>,
    pub with_reviews: Option<bool>,
    pub request_delay_ms: Option<u64>,
    pub timeout_secs: Option<u64>,
    pub clean: Option<bool>,
    pub retry: RetryFile,
    pub publish: PublishFile,
}

impl FileConfig {
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| AppError::ConfigFile {
            path: path.display().to_string(),
            source,
        })?;
        Ok(serde_yaml::from_str(&text)?)
    }
}

/// Fully resolved, immutable run configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub niches_path: PathBuf,
    pub output_dir: PathBuf,
    pub template_dir: PathBuf,
    /// `None` means offline: placeholder products only.
    pub api_key: Option<String>,
    pub api_host: String,
    pub fetcher: FetcherSettings,
    pub retry: RetryPolicy,
    pub timeout: Duration,
    pub clean: bool,
    /// `None` when publishing is off or `--dry-run` is set.
    pub publish: Option<PublishSettings>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl Config {
    /// Read the optional YAML file named by `--config` and resolve.
    pub fn load(cli: &Cli) -> Result<Self> {
        let file = match &cli.config {
            Some(path) => {
                let file = FileConfig::from_path(path)?;
                info!(path = %path.display(), "Loaded config file");
                file
            }
            None => FileConfig::default(),
        };
        Self::resolve(cli, file)
    }

    /// Merge CLI, file, and defaults, then validate.
    ///
    /// # Errors
    ///
    /// - [`AppError::MissingConfig`] when `RAPIDAPI_KEY` is absent under the
    ///   `empty` fallback policy, or when publishing has no token
    /// - [`AppError::InvalidConfig`] for out-of-range or malformed values
    pub fn resolve(cli: &Cli, file: FileConfig) -> Result<Self> {
        let api_key = non_empty(cli.rapidapi_key.clone());
        let api_host = non_empty(cli.rapidapi_host.clone())
            .or(non_empty(file.rapidapi_host))
            .unwrap_or_else(|| DEFAULT_RAPIDAPI_HOST.to_string());
        let base_url = non_empty(cli.api_base_url.clone())
            .or(non_empty(file.api_base_url))
            .unwrap_or_else(|| format!("https://{api_host}"));
        if url::Url::parse(&base_url).is_err() {
            return Err(AppError::InvalidConfig(format!("API base URL '{base_url}' is not a URL")));
        }

        let fallback = cli.fallback.or(file.fallback).unwrap_or_default();
        if api_key.is_none() {
            match fallback {
                FallbackPolicy::Empty => return Err(AppError::MissingConfig("RAPIDAPI_KEY")),
                FallbackPolicy::Placeholder => {
                    warn!("RAPIDAPI_KEY not set; rendering placeholder products only")
                }
            }
        }

        let max_products = cli
            .max_products
            .or(file.max_products)
            .unwrap_or(DEFAULT_MAX_PRODUCTS);
        if max_products == 0 {
            return Err(AppError::InvalidConfig("max_products must be at least 1".into()));
        }

        let fetcher = FetcherSettings {
            base_url,
            search_path: file.search_path.unwrap_or_else(|| DEFAULT_SEARCH_PATH.to_string()),
            detail_path: file.detail_path.unwrap_or_else(|| DEFAULT_DETAIL_PATH.to_string()),
            reviews_path: file.reviews_path.unwrap_or_else(|| DEFAULT_REVIEWS_PATH.to_string()),
            query_param: file.query_param.unwrap_or_else(|| "query".to_string()),
            country: non_empty(cli.country.clone())
                .or(non_empty(file.country))
                .unwrap_or_else(|| "US".to_string()),
            max_products,
            assoc_tag: non_empty(cli.assoc_tag.clone()).or(non_empty(file.assoc_tag)),
            strategy: cli.strategy.or(file.strategy).unwrap_or_default(),
            with_reviews: cli.with_reviews || file.with_reviews.unwrap_or(false),
            fallback,
            request_delay: Duration::from_millis(
                file.request_delay_ms.unwrap_or(DEFAULT_REQUEST_DELAY_MS),
            ),
        };

        let retry = resolve_retry(&file.retry)?;
        let publish = resolve_publish(cli, file.publish)?;

        Ok(Self {
            niches_path: cli
                .niches
                .clone()
                .or(file.niches)
                .unwrap_or_else(|| PathBuf::from("niches.csv")),
            output_dir: cli
                .output_dir
                .clone()
                .or(file.output_dir)
                .unwrap_or_else(|| PathBuf::from("dist")),
            template_dir: cli
                .template_dir
                .clone()
                .or(file.template_dir)
                .unwrap_or_else(|| PathBuf::from("site_template")),
            api_key,
            api_host,
            fetcher,
            retry,
            timeout: Duration::from_secs(file.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)),
            clean: cli.clean || file.clean.unwrap_or(false),
            publish,
        })
    }
}

fn resolve_retry(file: &RetryFile) -> Result<RetryPolicy> {
    let max_attempts = file.max_attempts.unwrap_or(3);
    if max_attempts == 0 {
        return Err(AppError::InvalidConfig("retry.max_attempts must be at least 1".into()));
    }
    let base = Duration::from_millis(file.backoff_ms.unwrap_or(DEFAULT_BACKOFF_MS));
    let backoff = if file.exponential.unwrap_or(false) {
        Backoff::Exponential {
            base,
            max: Duration::from_millis(file.max_backoff_ms.unwrap_or(DEFAULT_MAX_BACKOFF_MS)),
        }
    } else {
        Backoff::Fixed(base)
    };
    Ok(RetryPolicy {
        max_attempts,
        backoff,
    })
}

fn resolve_publish(cli: &Cli, file: PublishFile) -> Result<Option<PublishSettings>> {
    let requested = cli.publish || file.enabled.unwrap_or(false);
    if !requested {
        return Ok(None);
    }
    if cli.dry_run {
        info!("Dry run; publishing disabled");
        return Ok(None);
    }
    let token = non_empty(cli.github_token.clone())
        .or(non_empty(cli.gh_token.clone()))
        .ok_or(AppError::MissingConfig("GITHUB_TOKEN or GH_TOKEN"))?;

    Ok(Some(PublishSettings {
        token,
        owner: non_empty(cli.github_owner.clone()).or(non_empty(file.owner)),
        repo_prefix: cli
            .repo_prefix
            .clone()
            .or(file.repo_prefix)
            .unwrap_or_default(),
        branch: non_empty(file.branch).unwrap_or_else(|| "main".to_string()),
        enable_pages: cli.enable_pages || file.enable_pages.unwrap_or(false),
        api_base: non_empty(file.api_base).unwrap_or_else(|| "https://api.github.com".to_string()),
        git_host: non_empty(file.git_host).unwrap_or_else(|| "github.com".to_string()),
        remote_base: non_empty(file.remote_base),
        commit_name: non_empty(file.commit_name).unwrap_or_else(|| "niche-pages".to_string()),
        commit_email: non_empty(file.commit_email)
            .unwrap_or_else(|| "niche-pages@users.noreply.github.com".to_string()),
    }))
}
