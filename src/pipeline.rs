//! Run driver: keyword source → fetcher → renderer → publisher.
//!
//! Niches are processed one at a time. A 403 from the product API aborts the
//! whole run; every other failure is logged, counted in the [`RunSummary`],
//! and the next niche proceeds.

use crate::api::{Sleeper, Transport};
use crate::error::AppError;
use crate::fetcher::ProductFetcher;
use crate::models::Niche;
use crate::outputs::PageRenderer;
use crate::publish::GitHubPublisher;
use crate::utils::ensure_writable_dir;
use std::collections::HashMap;
use std::path::Path;
use tokio::fs;
use tracing::{debug, error, info, instrument, warn};

/// Counters for one run, logged by `main` when the run completes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub keywords: usize,
    pub rendered: usize,
    pub live: usize,
    pub fallbacks: usize,
    pub render_failures: usize,
    pub published: usize,
    pub publish_failures: usize,
    /// Niches whose keyword differs from an earlier one with the same slug.
    pub slug_collisions: usize,
}

pub struct Pipeline<T, S> {
    fetcher: ProductFetcher<T, S>,
    renderer: PageRenderer,
    publisher: Option<GitHubPublisher>,
    year: i32,
}

impl<T, S> Pipeline<T, S>
where
    T: Transport,
    S: Sleeper,
{
    pub fn new(fetcher: ProductFetcher<T, S>, renderer: PageRenderer, year: i32) -> Self {
        Self {
            fetcher,
            renderer,
            publisher: None,
            year,
        }
    }

    pub fn with_publisher(mut self, publisher: GitHubPublisher) -> Self {
        self.publisher = Some(publisher);
        self
    }

    /// Fetch, render, and optionally publish every niche in order.
    ///
    /// # Errors
    ///
    /// [`AppError::Forbidden`] when the product API rejects the credentials.
    /// Pages rendered before the 403 stay on disk.
    #[instrument(level = "info", skip_all, fields(count = niches.len()))]
    pub async fn run(&self, niches: &[Niche]) -> Result<RunSummary, AppError> {
        let mut summary = RunSummary {
            keywords: niches.len(),
            ..Default::default()
        };
        let mut seen: HashMap<&str, &str> = HashMap::new();

        for (i, niche) in niches.iter().enumerate() {
            info!(
                keyword = %niche.keyword,
                slug = %niche.slug,
                position = i + 1,
                total = niches.len(),
                "Processing niche"
            );
            match seen.insert(niche.slug.as_str(), niche.keyword.as_str()) {
                Some(previous) if previous != niche.keyword => {
                    warn!(
                        slug = %niche.slug,
                        %previous,
                        keyword = %niche.keyword,
                        "Different keywords share a slug; the later page replaces the earlier one"
                    );
                    summary.slug_collisions += 1;
                }
                Some(_) => debug!(slug = %niche.slug, "Slug already rendered this run; regenerating"),
                None => {}
            }

            let outcome = match self.fetcher.fetch(niche).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(keyword = %niche.keyword, error = %e, "Aborting run");
                    return Err(e);
                }
            };
            if outcome.is_live() {
                summary.live += 1;
            } else {
                summary.fallbacks += 1;
            }

            let page = match self
                .renderer
                .write_page(niche, &outcome.products, self.year)
                .await
            {
                Ok(page) => {
                    info!(
                        path = %page.path.display(),
                        products = page.product_count,
                        assets = page.assets.len(),
                        bytes = page.html.len(),
                        live = outcome.is_live(),
                        "Rendered page"
                    );
                    summary.rendered += 1;
                    page
                }
                Err(e) => {
                    error!(keyword = %niche.keyword, error = %e, "Failed to render page");
                    summary.render_failures += 1;
                    continue;
                }
            };

            let Some(publisher) = &self.publisher else {
                continue;
            };
            match publisher.publish(&page).await {
                Ok(site) => {
                    summary.published += 1;
                    if let Some(url) = &site.pages_url {
                        info!(repo = %site.repo, %url, "Site published");
                    }
                }
                Err(e) => {
                    warn!(keyword = %niche.keyword, error = %e, "Failed to publish site");
                    summary.publish_failures += 1;
                }
            }
        }

        Ok(summary)
    }
}

/// Optionally wipe the output root, then make sure it exists and is writable.
#[instrument(level = "info", skip_all, fields(path = %root.display(), clean))]
pub async fn prepare_output(root: &Path, clean: bool) -> Result<(), AppError> {
    if clean {
        match fs::remove_dir_all(root).await {
            Ok(()) => info!("Removed previous output"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
    }
    ensure_writable_dir(root).await?;
    Ok(())
}
