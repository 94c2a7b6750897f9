//! Deployment publisher: push each rendered niche to its own GitHub repository.
//!
//! For every page the publisher:
//!
//! 1. makes sure `<owner>/<prefix><slug>` exists, creating it when GitHub
//!    answers 404 (under the token's user account when the owner is that
//!    user, under `/orgs/<owner>` otherwise)
//! 2. turns the niche directory into a git working tree if it is not one
//!    already, commits everything, and force-pushes to the configured branch
//! 3. optionally enables GitHub Pages on that branch
//!
//! Remote history is overwritten on every run. Errors are returned to the
//! pipeline, which logs them and moves on to the next niche.
//!
//! The token is embedded in the push URL, so every git error message passes
//! through [`redact`] before it is logged or returned.

use crate::error::PublishError;
use crate::models::RenderedPage;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use serde::Deserialize;
use serde_json::json;
use std::path::Path;
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument, warn};

/// Publisher settings, resolved from CLI, environment, and config file.
#[derive(Debug, Clone)]
pub struct PublishSettings {
    pub token: String,
    /// Account that owns the repositories; looked up via `GET /user` when unset.
    pub owner: Option<String>,
    pub repo_prefix: String,
    pub branch: String,
    pub enable_pages: bool,
    /// REST API root, `https://api.github.com` unless overridden.
    pub api_base: String,
    /// Host used for the git remote, `github.com` unless overridden.
    pub git_host: String,
    /// Remote base that `/<owner>/<name>.git` is appended to. Defaults to
    /// `https://x-access-token:<token>@<git_host>`.
    pub remote_base: Option<String>,
    pub commit_name: String,
    pub commit_email: String,
}

/// Where a niche ended up after publishing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedSite {
    pub repo: String,
    pub created: bool,
    pub pages_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GitHubUser {
    login: String,
}

/// GitHub API client plus git driver.
#[derive(Debug)]
pub struct GitHubPublisher {
    client: reqwest::Client,
    settings: PublishSettings,
    owner: String,
    /// Login of the token's user, fetched on first need.
    login: OnceCell<String>,
}

impl GitHubPublisher {
    /// Build the API client and resolve the repository owner.
    #[instrument(level = "info", skip_all)]
    pub async fn connect(settings: PublishSettings) -> Result<Self, PublishError> {
        if settings.token.trim().is_empty() {
            return Err(PublishError::MissingToken);
        }
        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("Bearer {}", settings.token))
            .map_err(|_| PublishError::MissingToken)?;
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert("x-github-api-version", HeaderValue::from_static("2022-11-28"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(concat!("niche_pages/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()?;

        let configured = settings.owner.clone().filter(|o| !o.trim().is_empty());
        let mut publisher = Self {
            client,
            settings,
            owner: String::new(),
            login: OnceCell::new(),
        };
        publisher.owner = match configured {
            Some(owner) => owner,
            None => publisher.login().await?.to_string(),
        };
        info!(owner = %publisher.owner, "GitHub publisher ready");
        Ok(publisher)
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// The token's user, from `GET /user`.
    async fn login(&self) -> Result<&str, PublishError> {
        let login = self
            .login
            .get_or_try_init(|| async {
                let resp = self.client.get(self.api("/user")).send().await?;
                let status = resp.status();
                if !status.is_success() {
                    return Err(api_error(status, "/user", resp).await);
                }
                Ok::<_, PublishError>(resp.json::<GitHubUser>().await?.login)
            })
            .await?;
        Ok(login.as_str())
    }

    /// Endpoint that creates repositories for the owner: the user's own
    /// account when the owner is the token's user, the organization otherwise.
    async fn create_repo_path(&self) -> Result<String, PublishError> {
        let login = self.login().await?;
        if login.eq_ignore_ascii_case(&self.owner) {
            Ok("/user/repos".to_string())
        } else {
            Ok(format!("/orgs/{}/repos", urlencoding::encode(&self.owner)))
        }
    }

    /// Repository name for a niche slug.
    pub fn repo_name(&self, slug: &str) -> String {
        format!("{}{}", self.settings.repo_prefix, slug)
    }

    fn api(&self, path: &str) -> String {
        format!("{}{}", self.settings.api_base.trim_end_matches('/'), path)
    }

    fn repo_path(&self, name: &str) -> String {
        format!(
            "/repos/{}/{}",
            urlencoding::encode(&self.owner),
            urlencoding::encode(name)
        )
    }

    /// Publish one rendered page.
    #[instrument(level = "info", skip_all, fields(slug = %page.slug))]
    pub async fn publish(&self, page: &RenderedPage) -> Result<PublishedSite, PublishError> {
        let name = self.repo_name(&page.slug);
        let created = self.ensure_repo(&name).await?;
        self.push_dir(&page.dir, &name).await?;

        let pages_url = if self.settings.enable_pages {
            self.enable_pages(&name).await?;
            Some(pages_url(&self.owner, &name))
        } else {
            None
        };

        info!(repo = %name, created, pages = ?pages_url, "Published niche site");
        Ok(PublishedSite {
            repo: format!("{}/{}", self.owner, name),
            created,
            pages_url,
        })
    }

    /// Make sure the repository exists. Returns `true` if it was created.
    ///
    /// A 422 on create means the name is already taken by this owner (for
    /// instance a concurrent run created it first) and is treated as success.
    pub async fn ensure_repo(&self, name: &str) -> Result<bool, PublishError> {
        let path = self.repo_path(name);
        let resp = self.client.get(self.api(&path)).send().await?;
        match resp.status() {
            s if s.is_success() => {
                debug!(repo = %name, "Repository exists");
                return Ok(false);
            }
            StatusCode::NOT_FOUND => {}
            s => return Err(api_error(s, &path, resp).await),
        }

        let create_path = self.create_repo_path().await?;
        info!(repo = %name, endpoint = %create_path, "Repository not found; creating");
        let body = json!({
            "name": name,
            "private": false,
            "auto_init": false,
            "description": format!("Product picks for {name}"),
        });
        let resp = self.client.post(self.api(&create_path)).json(&body).send().await?;
        match resp.status() {
            s if s.is_success() => Ok(true),
            StatusCode::UNPROCESSABLE_ENTITY => {
                warn!(repo = %name, "Repository creation conflict; assuming it exists");
                Ok(false)
            }
            s => Err(api_error(s, &create_path, resp).await),
        }
    }

    /// Turn on GitHub Pages for the branch root. Already enabled (409) is fine.
    pub async fn enable_pages(&self, name: &str) -> Result<(), PublishError> {
        let path = format!("{}/pages", self.repo_path(name));
        let body = json!({ "source": { "branch": self.settings.branch, "path": "/" } });
        let resp = self.client.post(self.api(&path)).json(&body).send().await?;
        match resp.status() {
            s if s.is_success() => {
                info!(repo = %name, "Enabled GitHub Pages");
                Ok(())
            }
            StatusCode::CONFLICT => {
                debug!(repo = %name, "GitHub Pages already enabled");
                Ok(())
            }
            s => Err(api_error(s, &path, resp).await),
        }
    }

    /// Commit everything in `dir` and force-push it to the repository.
    async fn push_dir(&self, dir: &Path, name: &str) -> Result<(), PublishError> {
        let s = &self.settings;
        let token = s.token.as_str();

        if !dir.join(".git").exists() {
            git(dir, &["init", "--quiet"], token).await?;
        }
        let head = format!("refs/heads/{}", s.branch);
        git(dir, &["symbolic-ref", "HEAD", &head], token).await?;
        git(dir, &["add", "--all"], token).await?;

        let name_cfg = format!("user.name={}", s.commit_name);
        let email_cfg = format!("user.email={}", s.commit_email);
        let message = format!("Update {name} site");
        git(
            dir,
            &[
                "-c", &name_cfg, "-c", &email_cfg, "commit", "--quiet", "--allow-empty", "-m", &message,
            ],
            token,
        )
        .await?;

        let remote = match &s.remote_base {
            Some(base) => format!("{}/{}/{}.git", base.trim_end_matches('/'), self.owner, name),
            None => remote_url(&s.git_host, token, &self.owner, name),
        };
        git(dir, &["push", "--force", "--quiet", &remote, &s.branch], token).await?;
        Ok(())
    }
}

async fn api_error(status: StatusCode, endpoint: &str, resp: reqwest::Response) -> PublishError {
    let message = resp.text().await.unwrap_or_default();
    PublishError::Api {
        status: status.as_u16(),
        endpoint: endpoint.to_string(),
        message: crate::utils::truncate_for_log(&message, 200),
    }
}

/// Run `git` in `dir`, redacting `secret` from anything that gets reported.
async fn git(dir: &Path, args: &[&str], secret: &str) -> Result<String, PublishError> {
    let shown = redact(&args.join(" "), secret);
    debug!(dir = %dir.display(), args = %shown, "git");
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .env("GIT_TERMINAL_PROMPT", "0")
        .output()
        .await?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(PublishError::Git {
            command: shown,
            message: redact(stderr.trim(), secret),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Authenticated HTTPS remote for `owner/name` on `host`.
pub fn remote_url(host: &str, token: &str, owner: &str, name: &str) -> String {
    format!("https://x-access-token:{token}@{host}/{owner}/{name}.git")
}

/// Public GitHub Pages URL for a project repository.
pub fn pages_url(owner: &str, name: &str) -> String {
    format!("https://{}.github.io/{}/", owner.to_lowercase(), name)
}

/// Replace every occurrence of `secret` in `text`.
pub fn redact(text: &str, secret: &str) -> String {
    if secret.is_empty() {
        text.to_string()
    } else {
        text.replace(secret, "***")
    }
}
