//! # Niche Pages
//!
//! A static site generator for affiliate product niches. Reads niche keywords
//! from a CSV file, fetches matching products from a RapidAPI product search,
//! and renders one landing page per niche. Each page can optionally be pushed
//! to its own GitHub repository and served with GitHub Pages.
//!
//! ## Usage
//!
//! ```sh
//! RAPIDAPI_KEY=... niche_pages -n niches.csv -o dist
//! ```
//!
//! ## Architecture
//!
//! 1. **Keywords**: read the `keyword` (or `niche`) column of the CSV
//! 2. **Fetching**: search the product API, normalizing whatever response
//!    shape comes back; fall back to empty or placeholder products on failure
//! 3. **Rendering**: fill the HTML template and write `<slug>/index.html`
//! 4. **Publishing** (optional): create the repository, force-push, enable Pages

use chrono::{Datelike, Local};
use clap::Parser;
use std::error::Error;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod api;
mod cli;
mod config;
mod error;
mod fetcher;
mod keywords;
mod models;
mod outputs;
mod pipeline;
mod publish;
mod utils;

use api::{ApiClient, RapidApiTransport, TokioSleeper};
use cli::Cli;
use config::Config;
use fetcher::ProductFetcher;
use outputs::PageRenderer;
use pipeline::{Pipeline, prepare_output};
use publish::GitHubPublisher;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("niche_pages starting up");

    let args = Cli::parse();
    debug!(?args.niches, ?args.output_dir, ?args.config, "Parsed CLI arguments");

    let config = Config::load(&args).inspect_err(|e| error!(error = %e, "Invalid configuration"))?;
    info!(
        niches = %config.niches_path.display(),
        output = %config.output_dir.display(),
        host = %config.api_host,
        strategy = ?config.fetcher.strategy,
        fallback = ?config.fetcher.fallback,
        publish = config.publish.is_some(),
        "Configuration resolved"
    );

    let niches = keywords::read_niches(&config.niches_path)?;
    if niches.is_empty() {
        info!("No keywords to process");
        return Ok(());
    }

    prepare_output(&config.output_dir, config.clean).await?;

    let fetcher = match &config.api_key {
        Some(key) => {
            let transport = RapidApiTransport::new(key, &config.api_host, config.timeout)?;
            let client = ApiClient::new(transport, TokioSleeper, config.retry.clone());
            ProductFetcher::new(client, config.fetcher.clone())
        }
        None => ProductFetcher::offline(config.fetcher.clone()),
    };
    let renderer = PageRenderer::load(&config.template_dir, &config.output_dir)?;

    let mut pipeline = Pipeline::new(fetcher, renderer, Local::now().year());
    if let Some(settings) = config.publish.clone() {
        let publisher = GitHubPublisher::connect(settings)
            .await
            .inspect_err(|e| error!(error = %e, "Failed to set up GitHub publisher"))?;
        info!(owner = %publisher.owner(), "Publishing enabled");
        pipeline = pipeline.with_publisher(publisher);
    }

    let summary = pipeline.run(&niches).await?;

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        keywords = summary.keywords,
        rendered = summary.rendered,
        live = summary.live,
        fallbacks = summary.fallbacks,
        render_failures = summary.render_failures,
        published = summary.published,
        publish_failures = summary.publish_failures,
        slug_collisions = summary.slug_collisions,
        "Execution complete"
    );

    Ok(())
}
