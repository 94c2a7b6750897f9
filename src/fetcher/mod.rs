//! Product data fetcher.
//!
//! Turns a niche keyword into a list of [`ProductRecord`]s:
//!
//! 1. **Search**: one GET against the search endpoint with the keyword,
//!    country, and page parameters
//! 2. **Shape matching**: [`shapes`] locates the product list in the body
//! 3. **Normalization**: [`normalize`] maps entries onto `ProductRecord`,
//!    rewriting links with the associate tag and keeping at most
//!    `max_products`
//! 4. **Detail pass** (optional): for [`FetchStrategy::Detailed`], each
//!    product with an ASIN is refined by a detail call and, optionally, a
//!    reviews call, with a fixed delay before each request
//!
//! Failures never reach the caller except HTTP 403: network errors, bad
//! statuses, undecodable bodies, unknown shapes, exhausted rate-limit retries,
//! and empty results all resolve through the [`FallbackPolicy`].

pub mod normalize;
pub mod shapes;

use crate::api::{ApiClient, Sleeper, Transport};
use crate::error::{AppError, FetchError};
use crate::models::{FallbackReason, FetchOutcome, Niche, ProductRecord};
use crate::utils::with_associate_tag;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

/// What to render when live data is unavailable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FallbackPolicy {
    /// No products; the page shows its "no products found" message.
    #[default]
    Empty,
    /// A fixed set of placeholder products linking to an Amazon search.
    Placeholder,
}

/// How many calls are made per niche.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FetchStrategy {
    /// A single search call.
    #[default]
    Search,
    /// Search, then one detail call per product.
    Detailed,
}

/// Number of placeholder products served by [`FallbackPolicy::Placeholder`].
pub const PLACEHOLDER_COUNT: usize = 3;

/// Request and normalization settings for the fetcher.
#[derive(Debug, Clone)]
pub struct FetcherSettings {
    /// Scheme and host, e.g. `https://amazon-real-time-api.p.rapidapi.com`.
    pub base_url: String,
    pub search_path: String,
    pub detail_path: String,
    pub reviews_path: String,
    /// Name of the keyword query parameter (`query` or `keyword`).
    pub query_param: String,
    pub country: String,
    pub max_products: usize,
    pub assoc_tag: Option<String>,
    pub strategy: FetchStrategy,
    /// Also call the reviews endpoint in the detail pass.
    pub with_reviews: bool,
    pub fallback: FallbackPolicy,
    /// Pause before each detail/reviews call.
    pub request_delay: Duration,
}

impl FetcherSettings {
    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn tag(&self) -> Option<&str> {
        self.assoc_tag.as_deref().filter(|t| !t.trim().is_empty())
    }
}

/// Fetches products for a niche; offline when constructed without a client.
#[derive(Debug)]
pub struct ProductFetcher<T, S> {
    client: Option<ApiClient<T, S>>,
    settings: FetcherSettings,
}

impl<T, S> ProductFetcher<T, S>
where
    T: Transport,
    S: Sleeper,
{
    pub fn new(client: ApiClient<T, S>, settings: FetcherSettings) -> Self {
        Self {
            client: Some(client),
            settings,
        }
    }

    /// A fetcher that never touches the network and always serves the fallback.
    pub fn offline(settings: FetcherSettings) -> Self {
        Self {
            client: None,
            settings,
        }
    }

    /// Fetch products for `niche`.
    ///
    /// # Errors
    ///
    /// Only [`AppError::Forbidden`], when the API answers 403.
    #[instrument(level = "info", skip_all, fields(keyword = %niche.keyword))]
    pub async fn fetch(&self, niche: &Niche) -> Result<FetchOutcome, AppError> {
        let Some(client) = &self.client else {
            debug!("No API client configured; serving fallback");
            return Ok(self.fallback(niche, FallbackReason::Offline));
        };

        match self.fetch_live(client, niche).await {
            Ok(products) if !products.is_empty() => {
                info!(count = products.len(), "Fetched products");
                Ok(FetchOutcome::live(products))
            }
            Ok(_) => {
                warn!("No products found");
                Ok(self.fallback(niche, FallbackReason::NoResults))
            }
            Err(FetchError::Forbidden { url }) => Err(AppError::Forbidden { url }),
            Err(e) => {
                error!(error = %e, "Error fetching products");
                Ok(self.fallback(niche, FallbackReason::FetchFailed(e.to_string())))
            }
        }
    }

    async fn fetch_live(
        &self,
        client: &ApiClient<T, S>,
        niche: &Niche,
    ) -> Result<Vec<ProductRecord>, FetchError> {
        let s = &self.settings;
        let url = s.endpoint(&s.search_path);
        let query = [
            (s.query_param.as_str(), niche.keyword.as_str()),
            ("country", s.country.as_str()),
            ("page", "1"),
        ];
        let body = client.get_json(&url, &query).await?;
        let items = shapes::extract_items_or_empty(&body, &niche.keyword);
        let mut products = normalize::normalize_items(items, s.max_products, s.tag());

        if s.strategy == FetchStrategy::Detailed {
            self.refine(client, &mut products).await?;
        }
        Ok(products)
    }

    /// Detail pass: overlay detail (and optionally review) data per product.
    ///
    /// A failed detail or reviews call keeps the search record; only a 403
    /// aborts.
    async fn refine(
        &self,
        client: &ApiClient<T, S>,
        products: &mut [ProductRecord],
    ) -> Result<(), FetchError> {
        let s = &self.settings;
        let detail_url = s.endpoint(&s.detail_path);
        let reviews_url = s.endpoint(&s.reviews_path);

        for product in products.iter_mut() {
            let Some(asin) = product.asin.clone() else {
                debug!(title = %product.title, "No ASIN; skipping detail call");
                continue;
            };
            let query = [("asin", asin.as_str()), ("country", s.country.as_str())];

            client.pause(s.request_delay).await;
            match client.get_json(&detail_url, &query).await {
                Ok(body) => normalize::merge_detail(product, &body, s.tag()),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => warn!(%asin, error = %e, "Detail call failed; keeping search data"),
            }

            if !s.with_reviews {
                continue;
            }
            client.pause(s.request_delay).await;
            match client.get_json(&reviews_url, &query).await {
                Ok(body) => {
                    if product.review_count.is_none() {
                        product.review_count = normalize::review_count(&body);
                    }
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => warn!(%asin, error = %e, "Reviews call failed"),
            }
        }
        Ok(())
    }

    fn fallback(&self, niche: &Niche, reason: FallbackReason) -> FetchOutcome {
        let products = match self.settings.fallback {
            FallbackPolicy::Empty => Vec::new(),
            FallbackPolicy::Placeholder => placeholder_products(niche, self.settings.tag()),
        };
        info!(%reason, count = products.len(), policy = ?self.settings.fallback, "Using fallback products");
        FetchOutcome::fallback(products, reason)
    }
}

/// Deterministic placeholder products for a niche.
///
/// Each links to an Amazon search for the keyword so the page stays useful.
pub fn placeholder_products(niche: &Niche, assoc_tag: Option<&str>) -> Vec<ProductRecord> {
    let name = niche.display_name();
    let search = format!(
        "https://www.amazon.com/s?k={}",
        urlencoding::encode(&niche.keyword)
    );
    let url = match assoc_tag {
        Some(tag) => with_associate_tag(&search, tag),
        None => search,
    };

    (1..=PLACEHOLDER_COUNT)
        .map(|i| ProductRecord {
            title: format!("{name} Pick #{i}"),
            url: url.clone(),
            ..Default::default()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::{RecordingSleeper, ScriptedTransport};
    use crate::api::{Backoff, RetryPolicy};
    use crate::models::FetchSource;

    fn settings() -> FetcherSettings {
        FetcherSettings {
            base_url: "https://api.test/".to_string(),
            search_path: "/search".to_string(),
            detail_path: "product-details".to_string(),
            reviews_path: "product-reviews".to_string(),
            query_param: "query".to_string(),
            country: "US".to_string(),
            max_products: 10,
            assoc_tag: Some("mytag-20".to_string()),
            strategy: FetchStrategy::Search,
            with_reviews: false,
            fallback: FallbackPolicy::Empty,
            request_delay: Duration::from_secs(1),
        }
    }

    fn fetcher(
        script: Vec<(u16, &str)>,
        settings: FetcherSettings,
    ) -> ProductFetcher<ScriptedTransport, RecordingSleeper> {
        let client = ApiClient::new(
            ScriptedTransport::new(script),
            RecordingSleeper::default(),
            RetryPolicy {
                max_attempts: 3,
                backoff: Backoff::Fixed(Duration::from_secs(5)),
            },
        );
        ProductFetcher::new(client, settings)
    }

    fn client_of<T, S>(f: &ProductFetcher<T, S>) -> &ApiClient<T, S> {
        f.client.as_ref().unwrap()
    }

    #[tokio::test]
    async fn test_search_builds_request_and_normalizes() {
        let body = r#"{"data": {"products": [
            {"asin": "B1", "product_title": "One", "product_url": "https://amazon.com/dp/B1?ref=abc"},
            {"asin": "B2", "product_title": "Two"},
            {"asin": "B3", "product_title": "Three"}
        ]}}"#;
        let f = fetcher(vec![(200, body)], settings());
        let outcome = f.fetch(&Niche::new("bluetooth earbuds")).await.unwrap();

        assert!(outcome.is_live());
        assert_eq!(outcome.products.len(), 3);
        assert_eq!(outcome.products[0].url, "https://amazon.com/dp/B1?ref=abc&tag=mytag-20");

        let calls = client_of(&f).transport_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "https://api.test/search");
        assert_eq!(
            calls[0].1,
            vec![
                ("query".to_string(), "bluetooth earbuds".to_string()),
                ("country".to_string(), "US".to_string()),
                ("page".to_string(), "1".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_truncates_to_max_products() {
        let items: Vec<String> = (0..25).map(|i| format!(r#"{{"title": "P{i}"}}"#)).collect();
        let body = format!("[{}]", items.join(","));
        let f = fetcher(vec![(200, body.as_str())], settings());
        let outcome = f.fetch(&Niche::new("desk lamps")).await.unwrap();
        assert_eq!(outcome.products.len(), 10);
    }

    #[tokio::test]
    async fn test_server_error_falls_back_to_empty() {
        let f = fetcher(vec![(500, "oops")], settings());
        let outcome = f.fetch(&Niche::new("wireless-chargers")).await.unwrap();
        assert!(outcome.products.is_empty());
        assert!(matches!(
            outcome.source,
            FetchSource::Fallback(FallbackReason::FetchFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_malformed_bodies_never_raise() {
        for body in ["not json", "null", r#"{"status": "ok"}"#, r#"{"data": "x"}"#, "[1, 2, 3]"] {
            let f = fetcher(vec![(200, body)], settings());
            let outcome = f.fetch(&Niche::new("x")).await.unwrap();
            assert!(outcome.products.is_empty(), "body {body} produced products");
            assert!(!outcome.is_live());
        }
    }

    #[tokio::test]
    async fn test_placeholder_policy() {
        let mut s = settings();
        s.fallback = FallbackPolicy::Placeholder;
        let f = fetcher(vec![(200, r#"{"products": []}"#)], s);
        let outcome = f.fetch(&Niche::new("smart rings")).await.unwrap();
        assert_eq!(outcome.products.len(), PLACEHOLDER_COUNT);
        assert_eq!(outcome.source, FetchSource::Fallback(FallbackReason::NoResults));
        assert_eq!(outcome.products[0].title, "Smart Rings Pick #1");
        assert_eq!(
            outcome.products[0].url,
            "https://www.amazon.com/s?k=smart+rings&tag=mytag-20"
        );
    }

    #[tokio::test]
    async fn test_offline_fetcher_serves_placeholders() {
        let mut s = settings();
        s.fallback = FallbackPolicy::Placeholder;
        let f: ProductFetcher<ScriptedTransport, RecordingSleeper> = ProductFetcher::offline(s);
        let outcome = f.fetch(&Niche::new("yoga mats")).await.unwrap();
        assert_eq!(outcome.products.len(), 3);
        assert_eq!(outcome.source, FetchSource::Fallback(FallbackReason::Offline));
    }

    #[tokio::test]
    async fn test_forbidden_propagates() {
        let f = fetcher(vec![(403, "")], settings());
        let err = f.fetch(&Niche::new("x")).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden { .. }));
    }

    #[tokio::test]
    async fn test_rate_limit_exhaustion_falls_back() {
        let f = fetcher(vec![(429, ""), (429, ""), (429, "")], settings());
        let outcome = f.fetch(&Niche::new("x")).await.unwrap();
        assert!(outcome.products.is_empty());
        assert_eq!(client_of(&f).transport_calls().len(), 3);
    }

    #[tokio::test]
    async fn test_detailed_strategy_merges_and_delays() {
        let mut s = settings();
        s.strategy = FetchStrategy::Detailed;
        s.with_reviews = true;
        let search = r#"[{"asin": "B1", "title": "Short"}, {"title": "No asin"}]"#;
        let detail = r#"{"data": {"product_title": "Long title", "product_price": "$20"}}"#;
        let reviews = r#"{"data": [{"id": 1}, {"id": 2}]}"#;
        let f = fetcher(vec![(200, search), (200, detail), (200, reviews)], s);

        let outcome = f.fetch(&Niche::new("x")).await.unwrap();
        assert_eq!(outcome.products[0].title, "Long title");
        assert_eq!(outcome.products[0].price, "$20");
        assert_eq!(outcome.products[0].review_count.as_deref(), Some("2"));
        assert_eq!(outcome.products[1].title, "No asin");

        let calls = client_of(&f).transport_calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[1].0, "https://api.test/product-details");
        assert_eq!(calls[1].1[0], ("asin".to_string(), "B1".to_string()));
        assert_eq!(calls[2].0, "https://api.test/product-reviews");
        assert_eq!(client_of(&f).slept(), vec![Duration::from_secs(1); 2]);
    }

    #[tokio::test]
    async fn test_reviews_nested_under_data() {
        let mut s = settings();
        s.strategy = FetchStrategy::Detailed;
        s.with_reviews = true;
        let search = r#"[{"asin": "B1", "title": "Short"}]"#;
        let detail = r#"{"data": {"asin": "B1"}}"#;
        let reviews = r#"{"status": "OK", "data": {"asin": "B1", "reviews": [{"id": 1}, {"id": 2}, {"id": 3}]}}"#;
        let f = fetcher(vec![(200, search), (200, detail), (200, reviews)], s);

        let outcome = f.fetch(&Niche::new("x")).await.unwrap();
        assert_eq!(outcome.products[0].review_count.as_deref(), Some("3"));
    }

    #[tokio::test]
    async fn test_detail_failure_keeps_search_record() {
        let mut s = settings();
        s.strategy = FetchStrategy::Detailed;
        let f = fetcher(vec![(200, r#"[{"asin": "B1", "title": "Short"}]"#), (500, "")], s);
        let outcome = f.fetch(&Niche::new("x")).await.unwrap();
        assert!(outcome.is_live());
        assert_eq!(outcome.products[0].title, "Short");
    }

    #[tokio::test]
    async fn test_detail_forbidden_aborts() {
        let mut s = settings();
        s.strategy = FetchStrategy::Detailed;
        let f = fetcher(vec![(200, r#"[{"asin": "B1"}]"#), (403, "")], s);
        assert!(f.fetch(&Niche::new("x")).await.is_err());
    }

    #[test]
    fn test_placeholders_without_tag() {
        let products = placeholder_products(&Niche::new("Gaming Mice"), None);
        assert_eq!(products.len(), 3);
        assert_eq!(products[2].title, "Gaming Mice Pick #3");
        assert_eq!(products[2].url, "https://www.amazon.com/s?k=Gaming%20Mice");
        assert_eq!(products[2].price, "N/A");
    }
}
