//! Data models for niches, products, and rendered pages.
//!
//! - [`Niche`]: a keyword read from the keyword file plus its slug
//! - [`ProductRecord`]: one normalized product, whatever shape the API returned
//! - [`FetchOutcome`]: the products for a niche and where they came from
//! - [`RenderedPage`]: the terminal artifact written for each niche

use crate::utils::slugify;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// A niche keyword as read from the keyword file.
///
/// The slug is derived once on construction and used for the output
/// directory and, when publishing, the repository name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Niche {
    /// The trimmed keyword exactly as it appeared in the file.
    pub keyword: String,
    /// Filesystem- and URL-safe identifier derived from `keyword`.
    pub slug: String,
}

impl Niche {
    pub fn new(keyword: &str) -> Self {
        let keyword = keyword.trim().to_string();
        let slug = slugify(&keyword);
        Self { keyword, slug }
    }

    /// Human-readable name used in page titles.
    ///
    /// Hyphens and underscores become spaces and each word is capitalized,
    /// so `bluetooth-earbuds` reads as `Bluetooth Earbuds`.
    pub fn display_name(&self) -> String {
        self.keyword
            .split(|c: char| c.is_whitespace() || c == '-' || c == '_')
            .filter(|w| !w.is_empty())
            .map(crate::utils::upcase)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// A product normalized from any of the response shapes the API produces.
///
/// Defaults mirror what the page needs to stay renderable: a placeholder
/// title, an empty image, `N/A` for price and `#` for the link.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRecord {
    pub title: String,
    pub image: String,
    pub price: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_count: Option<String>,
    /// Product identifier, needed for the detail/reviews calls.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asin: Option<String>,
}

pub const DEFAULT_TITLE: &str = "Unknown Product";
pub const DEFAULT_PRICE: &str = "N/A";
pub const DEFAULT_URL: &str = "#";

impl Default for ProductRecord {
    fn default() -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
            image: String::new(),
            price: DEFAULT_PRICE.to_string(),
            url: DEFAULT_URL.to_string(),
            rating: None,
            review_count: None,
            asin: None,
        }
    }
}

/// Why a niche ended up with fallback products instead of live ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackReason {
    /// No API key configured; running offline.
    Offline,
    /// The API answered but no product list could be found or it was empty.
    NoResults,
    /// The API call failed (network, status, decode, or rate limit).
    FetchFailed(String),
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FallbackReason::Offline => write!(f, "offline"),
            FallbackReason::NoResults => write!(f, "no results"),
            FallbackReason::FetchFailed(e) => write!(f, "fetch failed: {e}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchSource {
    Live,
    Fallback(FallbackReason),
}

/// Products for one niche and where they came from.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub products: Vec<ProductRecord>,
    pub source: FetchSource,
}

impl FetchOutcome {
    pub fn live(products: Vec<ProductRecord>) -> Self {
        Self {
            products,
            source: FetchSource::Live,
        }
    }

    pub fn fallback(products: Vec<ProductRecord>, reason: FallbackReason) -> Self {
        Self {
            products,
            source: FetchSource::Fallback(reason),
        }
    }

    pub fn is_live(&self) -> bool {
        self.source == FetchSource::Live
    }
}

/// A page written to disk for one niche.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub slug: String,
    /// `<output_root>/<slug>`
    pub dir: PathBuf,
    /// `<output_root>/<slug>/index.html`
    pub path: PathBuf,
    pub html: String,
    /// Number of product cards on the page (0 when the fallback message shows).
    pub product_count: usize,
    /// File names of static assets copied next to the page.
    pub assets: Vec<String>,
}

/// Contents of the `products.json` file written next to each page.
#[derive(Debug, Deserialize, Serialize)]
pub struct PageData {
    pub keyword: String,
    pub slug: String,
    pub products: Vec<ProductRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_niche_trims_and_slugs() {
        let niche = Niche::new("  Wireless Ear Buds!!  ");
        assert_eq!(niche.keyword, "Wireless Ear Buds!!");
        assert_eq!(niche.slug, "wireless-ear-buds");
    }

    #[test]
    fn test_display_name() {
        assert_eq!(Niche::new("bluetooth-earbuds").display_name(), "Bluetooth Earbuds");
        assert_eq!(Niche::new("fitness trackers").display_name(), "Fitness Trackers");
        assert_eq!(Niche::new("smart_home hubs").display_name(), "Smart Home Hubs");
    }

    #[test]
    fn test_product_record_defaults() {
        let p = ProductRecord::default();
        assert_eq!(p.title, "Unknown Product");
        assert_eq!(p.image, "");
        assert_eq!(p.price, "N/A");
        assert_eq!(p.url, "#");
        assert!(p.rating.is_none());
    }

    #[test]
    fn test_product_record_serializes_camel_case_and_skips_none() {
        let p = ProductRecord {
            title: "Earbuds".to_string(),
            review_count: Some("1200".to_string()),
            ..Default::default()
        };
        let json = serde_json::to_string(&p).unwrap();
        assert!(json.contains("\"reviewCount\":\"1200\""));
        assert!(!json.contains("rating"));
        assert!(!json.contains("asin"));
    }

    #[test]
    fn test_page_data_deserialization() {
        let json = r##"{
            "keyword": "bluetooth-earbuds",
            "slug": "bluetooth-earbuds",
            "products": [
                {"title": "A", "image": "", "price": "$10", "url": "#", "reviewCount": "3"}
            ]
        }"##;
        let data: PageData = serde_json::from_str(json).unwrap();
        assert_eq!(data.products.len(), 1);
        assert_eq!(data.products[0].review_count.as_deref(), Some("3"));
    }

    #[test]
    fn test_fallback_reason_display() {
        assert_eq!(FallbackReason::Offline.to_string(), "offline");
        assert_eq!(
            FallbackReason::FetchFailed("HTTP 500".to_string()).to_string(),
            "fetch failed: HTTP 500"
        );
    }
}
