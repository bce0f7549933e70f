/// Shared HTTP plumbing for the provider clients.
///
/// Wraps a `reqwest::blocking::Client` with:
/// - an explicit request timeout,
/// - a bounded retry policy with exponential backoff for transient failures,
/// - a process-lifetime in-memory response cache keyed by full URL.
///
/// All three are fixed at construction. Concurrent requests for the same URL
/// may both miss the cache and both write it; the stored body is identical
/// either way.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use reqwest::StatusCode;
use reqwest::blocking::Client;

use crate::model::ClimateError;

/// Status codes worth retrying.
const RETRY_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

/// Upper bound on a single backoff delay.
pub const MAX_BACKOFF_SECS: f64 = 60.0;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum FetchError {
    /// Connection failure, timeout, or similar; no response received.
    Transport(String),
    /// Non-2xx status after retries.
    Status(u16),
    /// Body could not be read or parsed as JSON.
    Decode(String),
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchError::Transport(msg) => write!(f, "Request failed: {}", msg),
            FetchError::Status(code) => write!(f, "HTTP error: {}", code),
            FetchError::Decode(msg) => write!(f, "Parse error: {}", msg),
        }
    }
}

impl std::error::Error for FetchError {}

impl From<FetchError> for ClimateError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Transport(msg) => ClimateError::Transport(msg),
            FetchError::Status(code) => ClimateError::Http(code),
            FetchError::Decode(msg) => ClimateError::MalformedResponse(msg),
        }
    }
}

// ---------------------------------------------------------------------------
// Retry policy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    /// Seconds; the n-th retry waits `backoff_factor * 2^(n-1)`.
    pub backoff_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            backoff_factor: 0.2,
        }
    }
}

impl RetryPolicy {
    /// No retries at all. Used by the elevation path.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            backoff_factor: 0.0,
        }
    }

    /// Delay before retry number `retry` (1-based), capped at `MAX_BACKOFF_SECS`.
    pub fn backoff(&self, retry: u32) -> Duration {
        if retry == 0 {
            return Duration::ZERO;
        }
        let exponent = retry.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.backoff_factor * 2f64.powi(exponent);
        if secs.is_nan() {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(secs.clamp(0.0, MAX_BACKOFF_SECS))
    }

    pub fn should_retry_status(status: StatusCode) -> bool {
        RETRY_STATUSES.contains(&status.as_u16())
    }
}

// ---------------------------------------------------------------------------
// Response cache
// ---------------------------------------------------------------------------

struct CachedBody {
    stored_at: Instant,
    body: String,
}

/// URL-keyed body cache with a fixed time-to-live. Expired entries are
/// dropped when read and swept on every insert.
pub struct ResponseCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, CachedBody>>,
}

impl ResponseCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        let mut entries = self.entries.lock().ok()?;
        match entries.get(key) {
            Some(cached) if cached.stored_at.elapsed() < self.ttl => Some(cached.body.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn put(&self, key: &str, body: &str) {
        if self.ttl.is_zero() {
            return;
        }
        if let Ok(mut entries) = self.entries.lock() {
            let ttl = self.ttl;
            entries.retain(|_, cached| cached.stored_at.elapsed() < ttl);
            entries.insert(
                key.to_string(),
                CachedBody {
                    stored_at: Instant::now(),
                    body: body.to_string(),
                },
            );
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HttpSettings {
    pub timeout: Duration,
    pub retry: RetryPolicy,
    pub cache_ttl: Duration,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            cache_ttl: Duration::from_secs(3600),
        }
    }
}

pub struct HttpClient {
    client: Client,
    retry: RetryPolicy,
    cache: ResponseCache,
}

impl HttpClient {
    pub fn new(settings: HttpSettings) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .user_agent(concat!("livability_service/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            retry: settings.retry,
            cache: ResponseCache::new(settings.cache_ttl),
        })
    }

    /// GET `url` and parse the body as JSON, retrying transient failures.
    pub fn get_json(&self, url: &str) -> Result<serde_json::Value, FetchError> {
        self.get_json_with(url, self.retry)
    }

    /// GET `url` once with no retries. Successful bodies are still cached.
    pub fn get_json_once(&self, url: &str) -> Result<serde_json::Value, FetchError> {
        self.get_json_with(url, RetryPolicy::none())
    }

    fn get_json_with(&self, url: &str, retry: RetryPolicy) -> Result<serde_json::Value, FetchError> {
        if let Some(body) = self.cache.get(url) {
            return parse_body(&body);
        }

        let body = self.fetch_text(url, retry)?;
        let json = parse_body(&body)?;
        self.cache.put(url, &body);
        Ok(json)
    }

    fn fetch_text(&self, url: &str, retry: RetryPolicy) -> Result<String, FetchError> {
        let mut attempt = 0;
        loop {
            let outcome = self
                .client
                .get(url)
                .header("Accept", "application/json")
                .send();

            let retryable = match outcome {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return response.text().map_err(|e| FetchError::Decode(e.to_string()));
                    }
                    if !RetryPolicy::should_retry_status(status) {
                        // Open-Meteo reports bad requests with a JSON reason body.
                        if status == StatusCode::BAD_REQUEST {
                            if let Ok(text) = response.text() {
                                return Ok(text);
                            }
                        }
                        return Err(FetchError::Status(status.as_u16()));
                    }
                    FetchError::Status(status.as_u16())
                }
                Err(e) => FetchError::Transport(e.to_string()),
            };

            if attempt >= retry.max_retries {
                return Err(retryable);
            }
            attempt += 1;
            std::thread::sleep(retry.backoff(attempt));
        }
    }
}

fn parse_body(body: &str) -> Result<serde_json::Value, FetchError> {
    serde_json::from_str(body).map_err(|e| FetchError::Decode(e.to_string()))
}

// ---------------------------------------------------------------------------
// Local test server
// ---------------------------------------------------------------------------


// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use super::canned::CannedServer;

    fn local_client(max_retries: u32, cache_ttl: Duration) -> HttpClient {
        HttpClient::new(HttpSettings {
            timeout: Duration::from_secs(5),
            retry: RetryPolicy {
                max_retries,
                backoff_factor: 0.0,
            },
            cache_ttl,
        })
        .unwrap()
    }

    #[test]
    fn test_default_retry_policy_matches_five_retries_at_point_two() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 5);
        assert_eq!(policy.backoff(1), Duration::from_millis(200));
        assert_eq!(policy.backoff(2), Duration::from_millis(400));
        assert_eq!(policy.backoff(3), Duration::from_millis(800));
    }

    #[test]
    fn test_no_retry_policy_never_waits() {
        let policy = RetryPolicy::none();
        assert_eq!(policy.max_retries, 0);
        assert_eq!(policy.backoff(1), Duration::ZERO);
    }

    #[test]
    fn test_retryable_statuses() {
        assert!(RetryPolicy::should_retry_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(RetryPolicy::should_retry_status(StatusCode::BAD_GATEWAY));
        assert!(!RetryPolicy::should_retry_status(StatusCode::NOT_FOUND));
        assert!(!RetryPolicy::should_retry_status(StatusCode::BAD_REQUEST));
    }

    #[test]
    fn test_cache_returns_stored_body_until_expiry() {
        let cache = ResponseCache::new(Duration::from_secs(3600));
        assert!(cache.get("https://example.test/a").is_none());
        cache.put("https://example.test/a", r#"{"x":1}"#);
        assert_eq!(cache.get("https://example.test/a").as_deref(), Some(r#"{"x":1}"#));
        assert!(cache.get("https://example.test/b").is_none());
    }

    #[test]
    fn test_cache_overwrite_is_idempotent() {
        let cache = ResponseCache::new(Duration::from_secs(60));
        cache.put("k", "same");
        cache.put("k", "same");
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("k").as_deref(), Some("same"));
    }

    #[test]
    fn test_zero_ttl_disables_cache() {
        let cache = ResponseCache::new(Duration::ZERO);
        cache.put("k", "v");
        assert!(cache.is_empty());
        assert!(cache.get("k").is_none());
    }

    #[test]
    fn test_fetch_errors_map_into_domain_errors() {
        assert_eq!(
            ClimateError::from(FetchError::Status(503)),
            ClimateError::Http(503)
        );
        assert!(matches!(
            ClimateError::from(FetchError::Transport("timed out".into())),
            ClimateError::Transport(_)
        ));
        assert!(matches!(
            ClimateError::from(FetchError::Decode("eof".into())),
            ClimateError::MalformedResponse(_)
        ));
    }

    #[test]
    fn test_backoff_is_capped() {
        let huge = RetryPolicy {
            max_retries: 5,
            backoff_factor: 1e20,
        };
        assert_eq!(huge.backoff(5), Duration::from_secs(60));

        let default = RetryPolicy::default();
        assert_eq!(default.backoff(40), Duration::from_secs(60));
        assert_eq!(default.backoff(u32::MAX), Duration::from_secs(60));

        let infinite = RetryPolicy {
            max_retries: 1,
            backoff_factor: f64::INFINITY,
        };
        assert_eq!(infinite.backoff(1), Duration::from_secs(60));
        let undefined = RetryPolicy {
            max_retries: 1,
            backoff_factor: f64::NAN,
        };
        assert_eq!(undefined.backoff(1), Duration::ZERO);
    }

    #[test]
    fn test_cache_drops_expired_entries() {
        let cache = ResponseCache::new(Duration::from_millis(10));
        for i in 0..1000 {
            cache.put(&format!("https://example.test/{}", i), "{}");
        }

        std::thread::sleep(Duration::from_millis(30));
        cache.put("https://example.test/fresh", "{}");
        assert!(cache.len() <= 1);

        std::thread::sleep(Duration::from_millis(30));
        assert!(cache.get("https://example.test/fresh").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_transient_status_is_retried_until_exhausted() {
        let server = CannedServer::start("503 Service Unavailable", "");
        let client = local_client(5, Duration::ZERO);

        let result = client.get_json(&format!("{}/v1/archive", server.base_url));
        assert_eq!(result, Err(FetchError::Status(503)));
        assert_eq!(server.requests(), 6);
    }

    #[test]
    fn test_single_attempt_does_not_retry() {
        let server = CannedServer::start("503 Service Unavailable", "");
        let client = local_client(5, Duration::ZERO);

        let result = client.get_json_once(&format!("{}/v1/elevation", server.base_url));
        assert_eq!(result, Err(FetchError::Status(503)));
        assert_eq!(server.requests(), 1);
    }

    #[test]
    fn test_non_retryable_status_fails_immediately() {
        let server = CannedServer::start("404 Not Found", "");
        let client = local_client(5, Duration::ZERO);

        let result = client.get_json(&format!("{}/v1/search", server.base_url));
        assert_eq!(result, Err(FetchError::Status(404)));
        assert_eq!(server.requests(), 1);
    }

    #[test]
    fn test_bad_request_body_is_returned_as_json() {
        let server = CannedServer::start(
            "400 Bad Request",
            r#"{"error":true,"reason":"Parameter 'end_date' is out of allowed range"}"#,
        );
        let client = local_client(5, Duration::ZERO);

        let json = client.get_json(&format!("{}/v1/archive", server.base_url)).unwrap();
        assert_eq!(json["error"], true);
        assert!(json["reason"].as_str().unwrap().contains("end_date"));
        assert_eq!(server.requests(), 1);
    }

    #[test]
    fn test_successful_body_is_served_from_cache() {
        let server = CannedServer::start("200 OK", r#"{"elevation":[34.0]}"#);
        let client = local_client(5, Duration::from_secs(60));
        let url = format!("{}/v1/elevation", server.base_url);

        assert_eq!(client.get_json(&url).unwrap()["elevation"][0], 34.0);
        assert_eq!(client.get_json_once(&url).unwrap()["elevation"][0], 34.0);
        assert_eq!(server.requests(), 1);
    }

    #[test]
    fn test_unreachable_host_is_a_transport_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = local_client(1, Duration::ZERO);
        let result = client.get_json(&format!("http://{}/v1/archive", addr));
        match result {
            Err(err @ FetchError::Transport(_)) => {
                assert!(ClimateError::from(err).to_string().starts_with("Request failed"));
            }
            other => panic!("expected transport error, got {:?}", other),
        }
    }
}
