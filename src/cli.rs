//! Command-line interface definitions for niche_pages.
//!
//! Every option can come from a flag; secrets and deployment settings can
//! also come from environment variables. Options left unset fall back to the
//! YAML config file given with `--config`, then to built-in defaults (see
//! [`crate::config`]).

use crate::fetcher::{FallbackPolicy, FetchStrategy};
use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments for niche_pages.
///
/// # Examples
///
/// ```sh
/// # Render every niche in niches.csv into ./dist
/// RAPIDAPI_KEY=... niche_pages --niches niches.csv --output-dir dist
///
/// # No API key: render placeholder products instead
/// niche_pages --fallback placeholder
///
/// # Render and push each niche to its own GitHub Pages repository
/// GITHUB_TOKEN=... niche_pages --publish --enable-pages --repo-prefix best-
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// CSV file with a `keyword` or `niche` column [default: niches.csv]
    #[arg(short, long)]
    pub niches: Option<PathBuf>,

    /// Root directory for rendered pages [default: dist]
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Directory holding index.html and static assets [default: site_template]
    #[arg(short, long)]
    pub template_dir: Option<PathBuf>,

    /// Optional path to a YAML config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// RapidAPI key; without it only `--fallback placeholder` can run
    #[arg(long, env = "RAPIDAPI_KEY", hide_env_values = true)]
    pub rapidapi_key: Option<String>,

    /// RapidAPI host for the product API
    #[arg(long, env = "RAPIDAPI_HOST")]
    pub rapidapi_host: Option<String>,

    /// Override the API base URL (defaults to https://<RAPIDAPI_HOST>)
    #[arg(long)]
    pub api_base_url: Option<String>,

    /// Amazon Associates tag appended to product links
    #[arg(long, env = "AMAZON_ASSOC_TAG")]
    pub assoc_tag: Option<String>,

    /// What to render when the API fails or returns nothing
    #[arg(long, value_enum)]
    pub fallback: Option<FallbackPolicy>,

    /// One search call, or search plus per-product detail calls
    #[arg(long, value_enum)]
    pub strategy: Option<FetchStrategy>,

    /// With `--strategy detailed`, also fetch reviews for each product
    #[arg(long)]
    pub with_reviews: bool,

    /// Maximum products per page [default: 10]
    #[arg(long)]
    pub max_products: Option<usize>,

    /// Marketplace country code [default: US]
    #[arg(long)]
    pub country: Option<String>,

    /// Delete the output directory before rendering
    #[arg(long)]
    pub clean: bool,

    /// Push each rendered niche to its own GitHub repository
    #[arg(long)]
    pub publish: bool,

    /// Render only; skip publishing even when enabled
    #[arg(long)]
    pub dry_run: bool,

    /// Enable GitHub Pages on published repositories
    #[arg(long)]
    pub enable_pages: bool,

    /// GitHub account that owns the niche repositories
    #[arg(long, env = "GITHUB_OWNER")]
    pub github_owner: Option<String>,

    /// GitHub token for publishing
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub github_token: Option<String>,

    /// Alternative GitHub token variable used by the gh CLI
    #[arg(long, env = "GH_TOKEN", hide = true, hide_env_values = true)]
    pub gh_token: Option<String>,

    /// Prefix for repository names (`<prefix><slug>`)
    #[arg(long)]
    pub repo_prefix: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::parse_from([
            "niche_pages",
            "--niches",
            "data/niches.csv",
            "--output-dir",
            "./out",
            "--fallback",
            "placeholder",
            "--strategy",
            "detailed",
            "--max-products",
            "5",
        ]);

        assert_eq!(cli.niches, Some(PathBuf::from("data/niches.csv")));
        assert_eq!(cli.output_dir, Some(PathBuf::from("./out")));
        assert_eq!(cli.fallback, Some(FallbackPolicy::Placeholder));
        assert_eq!(cli.strategy, Some(FetchStrategy::Detailed));
        assert_eq!(cli.max_products, Some(5));
        assert!(!cli.publish);
    }

    #[test]
    fn test_cli_short_flags() {
        let cli = Cli::parse_from(["niche_pages", "-n", "n.csv", "-o", "/tmp/dist", "-t", "tpl"]);

        assert_eq!(cli.niches, Some(PathBuf::from("n.csv")));
        assert_eq!(cli.output_dir, Some(PathBuf::from("/tmp/dist")));
        assert_eq!(cli.template_dir, Some(PathBuf::from("tpl")));
    }

    #[test]
    fn test_cli_rejects_unknown_fallback() {
        assert!(Cli::try_parse_from(["niche_pages", "--fallback", "mock"]).is_err());
    }
}
