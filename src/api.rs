//! HTTP access to the product API with a rate-limit retry policy.
//!
//! The module is built from small injectable pieces so the retry behavior can
//! be exercised without a network or real delays:
//! - [`Transport`]: performs one HTTP GET and returns status + body
//! - [`Sleeper`]: waits between attempts (and between detail calls)
//! - [`RetryPolicy`]: how many attempts and how long to back off
//! - [`ApiClient`]: ties them together and decodes JSON
//!
//! # Retry Strategy
//!
//! Only HTTP 429 is retried, up to `max_attempts` total attempts. HTTP 403 is
//! returned immediately as [`FetchError::Forbidden`]. Any other non-success
//! status is returned as [`FetchError::Status`] without retrying.

use crate::error::{AppError, FetchError};
use crate::utils::truncate_for_log;
use rand::{Rng, rng};
use reqwest::header::{HeaderMap, HeaderValue};
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, error, instrument, warn};

pub const RAPIDAPI_KEY_HEADER: &str = "x-rapidapi-key";
pub const RAPIDAPI_HOST_HEADER: &str = "x-rapidapi-host";

/// A raw HTTP response: status code and body text.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

/// Performs a single HTTP GET.
pub trait Transport {
    async fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<HttpResponse, reqwest::Error>;
}

/// Waits for a given duration.
pub trait Sleeper {
    async fn sleep(&self, duration: Duration);
}

/// [`Sleeper`] backed by `tokio::time::sleep`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// [`Transport`] for RapidAPI: every request carries the key and host headers.
#[derive(Debug, Clone)]
pub struct RapidApiTransport {
    client: reqwest::Client,
}

impl RapidApiTransport {
    pub fn new(api_key: &str, api_host: &str, timeout: Duration) -> Result<Self, AppError> {
        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(api_key)
            .map_err(|_| AppError::InvalidConfig("RAPIDAPI_KEY is not a valid header value".into()))?;
        let host = HeaderValue::from_str(api_host)
            .map_err(|_| AppError::InvalidConfig("RAPIDAPI_HOST is not a valid header value".into()))?;
        headers.insert(RAPIDAPI_KEY_HEADER, key);
        headers.insert(RAPIDAPI_HOST_HEADER, host);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .user_agent(concat!("niche_pages/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::InvalidConfig(format!("HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

impl Transport for RapidApiTransport {
    async fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<HttpResponse, reqwest::Error> {
        let resp = self.client.get(url).query(query).send().await?;
        let status = resp.status().as_u16();
        let body = resp.text().await?;
        Ok(HttpResponse { status, body })
    }
}

/// Delay between attempts after a 429.
#[derive(Debug, Clone, PartialEq)]
pub enum Backoff {
    /// Same delay before every retry.
    Fixed(Duration),
    /// `min(base * 2^(attempt-1), max)` plus 0-250ms of jitter.
    Exponential { base: Duration, max: Duration },
}

impl Backoff {
    /// Delay to wait after failed attempt number `attempt` (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        match self {
            Backoff::Fixed(d) => *d,
            Backoff::Exponential { base, max } => {
                let shift = attempt.saturating_sub(1).min(16);
                let delay = base.saturating_mul(1 << shift).min(*max);
                let jitter_ms: u64 = rng().random_range(0..=250);
                delay + Duration::from_millis(jitter_ms)
            }
        }
    }
}

/// Maximum attempts and the backoff between them.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Always at least 1.
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Backoff::Fixed(Duration::from_secs(5)),
        }
    }
}

/// JSON client over an injected [`Transport`] and [`Sleeper`].
pub struct ApiClient<T, S> {
    transport: T,
    sleeper: S,
    policy: RetryPolicy,
}

impl<T, S> fmt::Debug for ApiClient<T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("max_attempts", &self.policy.max_attempts)
            .field("backoff", &self.policy.backoff)
            .finish()
    }
}

impl<T, S> ApiClient<T, S>
where
    T: Transport,
    S: Sleeper,
{
    pub fn new(transport: T, sleeper: S, policy: RetryPolicy) -> Self {
        Self {
            transport,
            sleeper,
            policy,
        }
    }

    /// Sleep through the injected [`Sleeper`]; used for inter-request delays.
    pub async fn pause(&self, duration: Duration) {
        if !duration.is_zero() {
            self.sleeper.sleep(duration).await;
        }
    }

    /// GET `url` with `query` and decode the body as JSON, retrying on 429.
    #[instrument(level = "debug", skip(self, query))]
    pub async fn get_json(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<serde_json::Value, FetchError> {
        let total_t0 = Instant::now();
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            let resp = self.transport.get(url, query).await?;

            match resp.status {
                200..=299 => {
                    debug!(
                        status = resp.status,
                        attempt,
                        elapsed_ms_total = total_t0.elapsed().as_millis(),
                        bytes = resp.body.len(),
                        "GET succeeded"
                    );
                    return serde_json::from_str(&resp.body).map_err(|source| {
                        warn!(
                            error = %source,
                            body_preview = %truncate_for_log(&resp.body, 300),
                            "Response body is not JSON"
                        );
                        FetchError::Decode {
                            url: url.to_string(),
                            source,
                        }
                    });
                }
                403 => {
                    error!(attempt, "Product API returned 403; not retrying");
                    return Err(FetchError::Forbidden {
                        url: url.to_string(),
                    });
                }
                429 => {
                    if attempt >= max_attempts {
                        error!(
                            attempt,
                            max = max_attempts,
                            elapsed_ms_total = total_t0.elapsed().as_millis(),
                            "Rate limited; retries exhausted"
                        );
                        return Err(FetchError::RateLimited {
                            attempts: attempt,
                            url: url.to_string(),
                        });
                    }
                    let delay = self.policy.backoff.delay(attempt);
                    warn!(attempt, max = max_attempts, ?delay, "Rate limited; backing off");
                    self.sleeper.sleep(delay).await;
                }
                status => {
                    warn!(
                        status,
                        body_preview = %truncate_for_log(&resp.body, 200),
                        "Non-success status from product API"
                    );
                    return Err(FetchError::Status {
                        status,
                        url: url.to_string(),
                    });
                }
            }
        }
    }
}

#[cfg(test)]
impl ApiClient<testing::ScriptedTransport, testing::RecordingSleeper> {
    pub fn transport_calls(&self) -> Vec<(String, Vec<(String, String)>)> {
        self.transport.calls.lock().unwrap().clone()
    }

    pub fn slept(&self) -> Vec<Duration> {
        self.sleeper.slept.lock().unwrap().clone()
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{RecordingSleeper, ScriptedTransport};
    use super::*;

    fn client(script: Vec<(u16, &str)>) -> ApiClient<ScriptedTransport, RecordingSleeper> {
        ApiClient::new(
            ScriptedTransport::new(script),
            RecordingSleeper::default(),
            RetryPolicy {
                max_attempts: 3,
                backoff: Backoff::Fixed(Duration::from_secs(5)),
            },
        )
    }

    #[tokio::test]
    async fn test_success_decodes_json() {
        let api = client(vec![(200, r#"{"data": []}"#)]);
        let value = api.get_json("https://api.test/search", &[("query", "x")]).await.unwrap();
        assert!(value["data"].is_array());
        assert_eq!(api.transport.call_count(), 1);
        assert!(api.sleeper.slept.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_429_then_success_retries_with_backoff() {
        let api = client(vec![(429, ""), (429, ""), (200, "[]")]);
        let value = api.get_json("https://api.test/search", &[]).await.unwrap();
        assert!(value.as_array().unwrap().is_empty());
        assert_eq!(api.transport.call_count(), 3);
        assert_eq!(
            *api.sleeper.slept.lock().unwrap(),
            vec![Duration::from_secs(5), Duration::from_secs(5)]
        );
    }

    #[tokio::test]
    async fn test_429_exhausts_attempts() {
        let api = client(vec![(429, ""), (429, ""), (429, ""), (200, "[]")]);
        let err = api.get_json("https://api.test/search", &[]).await.unwrap_err();
        assert!(matches!(err, FetchError::RateLimited { attempts: 3, .. }));
        assert_eq!(api.transport.call_count(), 3);
        assert_eq!(api.sleeper.slept.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_403_is_not_retried() {
        let api = client(vec![(403, "forbidden"), (200, "[]")]);
        let err = api.get_json("https://api.test/search", &[]).await.unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(api.transport.call_count(), 1);
        assert!(api.sleeper.slept.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_500_is_status_error_without_retry() {
        let api = client(vec![(500, "boom"), (200, "[]")]);
        let err = api.get_json("https://api.test/search", &[]).await.unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 500, .. }));
        assert_eq!(api.transport.call_count(), 1);
    }

    #[tokio::test]
    async fn test_invalid_json_is_decode_error() {
        let api = client(vec![(200, "<html>oops</html>")]);
        let err = api.get_json("https://api.test/search", &[]).await.unwrap_err();
        assert!(matches!(err, FetchError::Decode { .. }));
    }

    #[tokio::test]
    async fn test_pause_skips_zero() {
        let api = client(vec![]);
        api.pause(Duration::ZERO).await;
        api.pause(Duration::from_millis(1500)).await;
        assert_eq!(
            *api.sleeper.slept.lock().unwrap(),
            vec![Duration::from_millis(1500)]
        );
    }

    #[test]
    fn test_exponential_backoff_is_capped() {
        let backoff = Backoff::Exponential {
            base: Duration::from_secs(1),
            max: Duration::from_secs(30),
        };
        let first = backoff.delay(1);
        assert!(first >= Duration::from_secs(1) && first <= Duration::from_millis(1250));
        let third = backoff.delay(3);
        assert!(third >= Duration::from_secs(4) && third <= Duration::from_millis(4250));
        let tenth = backoff.delay(10);
        assert!(tenth >= Duration::from_secs(30) && tenth <= Duration::from_millis(30250));
    }

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.backoff, Backoff::Fixed(Duration::from_secs(5)));
    }

    #[tokio::test]
    async fn test_rapidapi_transport_sends_headers() {
        use wiremock::matchers::{header, method, path, query_param};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("query", "desk lamps"))
            .and(header(RAPIDAPI_KEY_HEADER, "secret"))
            .and(header(RAPIDAPI_HOST_HEADER, "api.example.com"))
            .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
            .expect(1)
            .mount(&server)
            .await;

        let transport =
            RapidApiTransport::new("secret", "api.example.com", Duration::from_secs(5)).unwrap();
        let resp = transport
            .get(&format!("{}/search", server.uri()), &[("query", "desk lamps")])
            .await
            .unwrap();
        assert_eq!(resp.status, 200);
        assert_eq!(resp.body, "[]");
    }

    #[test]
    fn test_rapidapi_transport_rejects_bad_header() {
        let err = RapidApiTransport::new("bad\nkey", "host", Duration::from_secs(5)).unwrap_err();
        assert!(matches!(err, AppError::InvalidConfig(_)));
    }
}
