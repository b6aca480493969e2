//! HTTP client with request pacing for eventbrite.com
//!
//! This module provides the rate limiter that spaces outbound requests and
//! the HTTP client used for both the HTML pages and the internal search API.
//! Requests are issued one at a time and are never retried.

use std::time::{Duration, Instant};

use rand::Rng;
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::debug;

use crate::error::{EventbriteError, Result};

/// Base URL for eventbrite.com
pub const EVENTBRITE_BASE_URL: &str = "https://www.eventbrite.com";

/// Default User-Agent mimicking a desktop browser
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/102.0.0.0 Safari/537.36";

/// Default Accept-Language header
const DEFAULT_ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9";

const SEC_CH_UA: &str = "\".Not/A)Brand\";v=\"99\", \"Google Chrome\";v=\"103\", \"Chromium\";v=\"103\"";

const HTML_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8,application/signed-exchange;v=b3;q=0.9";

/// Delay applied between two consecutive fetches
#[derive(Debug, Clone, PartialEq)]
pub enum Interval {
    /// Always wait this long
    Fixed(Duration),
    /// Wait a uniformly random number of seconds in `[min, max]`,
    /// rounded to 2 decimal places
    Range { min: f64, max: f64 },
}

impl Interval {
    /// Pick the delay to use for one wait.
    ///
    /// # Errors
    /// Returns `EventbriteError::InvalidArgument` for a range that is
    /// negative, non-finite, too large for a `Duration` or has `min > max`.
    pub fn sample(&self) -> Result<Duration> {
        match *self {
            Interval::Fixed(duration) => Ok(duration),
            Interval::Range { min, max } => {
                if !min.is_finite() || !max.is_finite() || min < 0.0 || min > max {
                    return Err(EventbriteError::InvalidArgument(format!(
                        "invalid delay range ({}, {})",
                        min, max
                    )));
                }
                let out_of_bounds = || {
                    EventbriteError::InvalidArgument(format!(
                        "delay range ({}, {}) is out of bounds",
                        min, max
                    ))
                };
                Duration::try_from_secs_f64(max).map_err(|_| out_of_bounds())?;

                let secs = rand::thread_rng().gen_range(min..=max);
                let rounded = (secs * 100.0).round() / 100.0;
                Duration::try_from_secs_f64(rounded.clamp(min, max)).map_err(|_| out_of_bounds())
            }
        }
    }
}

/// Paces outbound requests.
///
/// The clock starts on the first call to [`RateLimiter::wait_if_needed`]
/// (or on [`RateLimiter::reset`]). When a later call comes in sooner than the
/// chosen interval, the limiter sleeps for the whole interval rather than for
/// the remainder, which adds jitter between requests.
pub struct RateLimiter {
    /// Interval used when the caller does not pass one
    default_interval: Option<Interval>,
    /// Time of the last reset, `None` until the clock is started
    last_reset: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// Create a new rate limiter.
    ///
    /// # Example
    /// ```
    /// use eventbrite_core::client::{Interval, RateLimiter};
    ///
    /// let limiter = RateLimiter::new(Some(Interval::Range { min: 0.2, max: 1.0 }));
    /// ```
    pub fn new(default_interval: Option<Interval>) -> Self {
        Self {
            default_interval,
            last_reset: Mutex::new(None),
        }
    }

    /// Create a limiter whose clock is already running
    pub fn started(default_interval: Option<Interval>) -> Self {
        Self {
            default_interval,
            last_reset: Mutex::new(Some(Instant::now())),
        }
    }

    /// Record the current time as the last request time
    pub async fn reset(&self) {
        *self.last_reset.lock().await = Some(Instant::now());
    }

    /// Wait before the next request if the previous one was too recent.
    ///
    /// Returns the time elapsed since the previous reset, measured before
    /// any sleeping. The very first call only starts the clock and returns
    /// zero.
    ///
    /// # Errors
    /// Returns `EventbriteError::InvalidArgument` when neither `interval` nor
    /// the default interval is set, or when the interval is malformed.
    pub async fn wait_if_needed(&self, interval: Option<&Interval>) -> Result<Duration> {
        let mut last = self.last_reset.lock().await;
        let Some(started) = *last else {
            *last = Some(Instant::now());
            return Ok(Duration::ZERO);
        };

        let elapsed = started.elapsed();

        let interval = interval.or(self.default_interval.as_ref()).ok_or_else(|| {
            EventbriteError::InvalidArgument("no delay interval configured".to_string())
        })?;
        let wait_time = interval.sample()?;

        if elapsed < wait_time {
            debug!(wait_secs = wait_time.as_secs_f64(), "waiting before next request");
            sleep(wait_time).await;
        }

        *last = Some(Instant::now());
        Ok(elapsed)
    }

    /// Interval used when none is passed to `wait_if_needed`
    pub fn default_interval(&self) -> Option<&Interval> {
        self.default_interval.as_ref()
    }
}

/// Configuration for the Eventbrite HTTP client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Site root, without trailing slash (default: https://www.eventbrite.com)
    pub base_url: String,
    /// Delay between fetches (default: random 0.2 - 1.0 seconds)
    pub delay: Option<Interval>,
    /// Request timeout in seconds (default: 30)
    pub timeout_secs: u64,
    /// User-Agent header value
    pub user_agent: String,
    /// Accept-Language header value
    pub accept_language: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: EVENTBRITE_BASE_URL.to_string(),
            delay: Some(Interval::Range { min: 0.2, max: 1.0 }),
            timeout_secs: 30,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            accept_language: DEFAULT_ACCEPT_LANGUAGE.to_string(),
        }
    }
}

/// HTTP client for eventbrite.com
///
/// This client:
/// - Waits on its rate limiter before every request
/// - Keeps cookies between requests
/// - Sends browser-like navigation headers for pages and XHR headers for the API
pub struct EventbriteClient {
    /// Underlying HTTP client
    client: reqwest::Client,
    /// Site root
    base_url: String,
    /// Rate limiter for request pacing
    rate_limiter: RateLimiter,
}

impl EventbriteClient {
    /// Create a new client with default configuration
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be created
    pub fn new() -> Result<Self> {
        Self::with_config(ClientConfig::default())
    }

    /// Create a new client with custom configuration
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be created or a header
    /// value in the configuration is invalid
    pub fn with_config(config: ClientConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::ACCEPT_LANGUAGE,
            header_value(&config.accept_language)?,
        );
        headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
        headers.insert(
            HeaderName::from_static("sec-ch-ua"),
            HeaderValue::from_static(SEC_CH_UA),
        );
        headers.insert(
            HeaderName::from_static("sec-ch-ua-mobile"),
            HeaderValue::from_static("?0"),
        );
        headers.insert(
            HeaderName::from_static("sec-ch-ua-platform"),
            HeaderValue::from_static("\"macOS\""),
        );

        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .default_headers(headers)
            .cookie_store(true)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            rate_limiter: RateLimiter::new(config.delay),
        })
    }

    /// Site root this client talks to
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Rate limiter shared by all requests of this client
    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }

    /// Fetch an HTML page.
    ///
    /// # Errors
    /// - `EventbriteError::Http` - Network or HTTP error
    /// - `EventbriteError::RateLimited` - Server returned 429
    /// - `EventbriteError::NotFound` - Server returned 404
    pub async fn fetch_html(&self, url: &str) -> Result<String> {
        self.rate_limiter.wait_if_needed(None).await?;
        debug!(url, "GET page");

        let response = self
            .client
            .get(url)
            .headers(navigation_headers())
            .send()
            .await?;
        let response = check_status(response, url)?;

        Ok(response.text().await?)
    }

    /// POST a JSON body to the internal API and parse the JSON answer.
    ///
    /// `extra_headers` is merged over the API defaults, which is how the
    /// referer and CSRF token are passed.
    ///
    /// # Errors
    /// Same as [`EventbriteClient::fetch_html`], plus `EventbriteError::Http`
    /// when the answer is not valid JSON
    pub async fn post_json(
        &self,
        url: &str,
        body: &Value,
        extra_headers: HeaderMap,
    ) -> Result<Value> {
        self.rate_limiter.wait_if_needed(None).await?;
        debug!(url, body = %body, "POST api");

        let mut headers = self.api_headers()?;
        headers.extend(extra_headers);

        let response = self
            .client
            .post(url)
            .headers(headers)
            .json(body)
            .send()
            .await?;
        let response = check_status(response, url)?;

        Ok(response.json::<Value>().await?)
    }

    fn api_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        headers.insert(header::DNT, HeaderValue::from_static("1"));
        headers.insert(header::ORIGIN, header_value(&self.base_url)?);
        headers.insert(
            HeaderName::from_static("sec-fetch-dest"),
            HeaderValue::from_static("empty"),
        );
        headers.insert(
            HeaderName::from_static("sec-fetch-mode"),
            HeaderValue::from_static("cors"),
        );
        headers.insert(
            HeaderName::from_static("sec-fetch-site"),
            HeaderValue::from_static("same-origin"),
        );
        headers.insert(
            HeaderName::from_static("x-requested-with"),
            HeaderValue::from_static("XMLHttpRequest"),
        );
        Ok(headers)
    }
}

/// Build a header value from runtime text
pub(crate) fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|_| EventbriteError::InvalidArgument(format!("invalid header value: {:?}", value)))
}

fn navigation_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(header::ACCEPT, HeaderValue::from_static(HTML_ACCEPT));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(header::DNT, HeaderValue::from_static("1"));
    headers.insert(
        HeaderName::from_static("sec-fetch-dest"),
        HeaderValue::from_static("document"),
    );
    headers.insert(
        HeaderName::from_static("sec-fetch-mode"),
        HeaderValue::from_static("navigate"),
    );
    headers.insert(
        HeaderName::from_static("sec-fetch-site"),
        HeaderValue::from_static("none"),
    );
    headers.insert(
        HeaderName::from_static("sec-fetch-user"),
        HeaderValue::from_static("?1"),
    );
    headers.insert(
        header::UPGRADE_INSECURE_REQUESTS,
        HeaderValue::from_static("1"),
    );
    headers
}

fn check_status(response: reqwest::Response, url: &str) -> Result<reqwest::Response> {
    let status = response.status();

    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(EventbriteError::NotFound(url.to_string()));
    }
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Err(EventbriteError::RateLimited);
    }

    Ok(response.error_for_status()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;
    use wiremock::matchers::{header as header_is, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(base_url: String) -> ClientConfig {
        ClientConfig {
            base_url,
            delay: Some(Interval::Fixed(Duration::ZERO)),
            ..ClientConfig::default()
        }
    }

    #[test]
    fn test_interval_fixed_sample() {
        let interval = Interval::Fixed(Duration::from_millis(250));
        assert_eq!(interval.sample().unwrap(), Duration::from_millis(250));
    }

    #[test]
    fn test_interval_range_invalid() {
        assert!(matches!(
            Interval::Range { min: 2.0, max: 1.0 }.sample(),
            Err(EventbriteError::InvalidArgument(_))
        ));
        assert!(matches!(
            Interval::Range { min: -1.0, max: 1.0 }.sample(),
            Err(EventbriteError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_interval_range_too_large_for_duration() {
        let result = Interval::Range { min: 0.0, max: 1e30 }.sample();
        assert!(matches!(result, Err(EventbriteError::InvalidArgument(_))));
    }

    proptest! {
        #[test]
        fn prop_interval_range_sample_is_rounded_and_bounded(
            min in 0.0f64..5.0,
            width in 0.0f64..5.0,
        ) {
            let max = min + width;
            let secs = Interval::Range { min, max }.sample().unwrap().as_secs_f64();
            prop_assert!(secs >= min - 1e-6 && secs <= max + 1e-6);
            let hundredths = secs * 100.0;
            let on_grid = (hundredths - hundredths.round()).abs() < 1e-6;
            // clamping to a bound that is not on the 0.01 grid is the only exception
            prop_assert!(on_grid || (secs - min).abs() < 1e-6 || (secs - max).abs() < 1e-6);
        }
    }

    #[test]
    fn test_client_config_default() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url, EVENTBRITE_BASE_URL);
        assert_eq!(config.delay, Some(Interval::Range { min: 0.2, max: 1.0 }));
        assert_eq!(config.timeout_secs, 30);
    }

    #[test]
    fn test_client_creation() {
        let client = EventbriteClient::new();
        assert!(client.is_ok());
    }

    #[test]
    fn test_client_trims_base_url() {
        let config = test_config("http://localhost:1234/".to_string());
        let client = EventbriteClient::with_config(config).unwrap();
        assert_eq!(client.base_url(), "http://localhost:1234");
    }

    #[tokio::test]
    async fn test_first_wait_only_starts_clock() {
        let limiter = RateLimiter::new(None);
        let start = Instant::now();
        let elapsed = limiter.wait_if_needed(None).await.unwrap();
        assert_eq!(elapsed, Duration::ZERO);
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_reset_starts_clock_for_next_wait() {
        let limiter = RateLimiter::new(Some(Interval::Fixed(Duration::from_millis(50))));
        limiter.reset().await;

        tokio::time::sleep(Duration::from_millis(20)).await;
        let start = Instant::now();
        let elapsed = limiter.wait_if_needed(None).await.unwrap();

        assert!(elapsed >= Duration::from_millis(20));
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_wait_without_interval_fails() {
        let limiter = RateLimiter::started(None);
        let result = limiter.wait_if_needed(None).await;
        assert!(matches!(result, Err(EventbriteError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn test_wait_sleeps_full_interval() {
        let limiter = RateLimiter::started(Some(Interval::Range { min: 0.1, max: 0.1 }));

        tokio::time::sleep(Duration::from_millis(30)).await;
        let start = Instant::now();
        let elapsed = limiter.wait_if_needed(None).await.unwrap();

        // full interval, not the 70ms remainder
        assert!(start.elapsed() >= Duration::from_millis(100));
        assert!(elapsed >= Duration::from_millis(30));
        assert!(elapsed < Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_wait_skips_sleep_after_long_gap() {
        let limiter = RateLimiter::started(Some(Interval::Fixed(Duration::from_millis(20))));

        tokio::time::sleep(Duration::from_millis(40)).await;
        let start = Instant::now();
        let elapsed = limiter.wait_if_needed(None).await.unwrap();

        assert!(elapsed >= Duration::from_millis(40));
        assert!(start.elapsed() < Duration::from_millis(20));
    }

    #[tokio::test]
    async fn test_explicit_interval_overrides_default() {
        let limiter = RateLimiter::started(Some(Interval::Fixed(Duration::from_secs(30))));
        let start = Instant::now();
        limiter
            .wait_if_needed(Some(&Interval::Fixed(Duration::from_millis(10))))
            .await
            .unwrap();
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_fetch_html_ok() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/e/1"))
            .and(header_is("upgrade-insecure-requests", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
            .expect(1)
            .mount(&server)
            .await;

        let client = EventbriteClient::with_config(test_config(server.uri())).unwrap();
        let body = client.fetch_html(&format!("{}/e/1", server.uri())).await.unwrap();
        assert_eq!(body, "<html>ok</html>");
    }

    #[tokio::test]
    async fn test_fetch_html_status_mapping() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/busy"))
            .respond_with(ResponseTemplate::new(429))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/broken"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let client = EventbriteClient::with_config(test_config(server.uri())).unwrap();

        let missing = client.fetch_html(&format!("{}/missing", server.uri())).await;
        assert!(matches!(missing, Err(EventbriteError::NotFound(_))));

        let busy = client.fetch_html(&format!("{}/busy", server.uri())).await;
        assert!(matches!(busy, Err(EventbriteError::RateLimited)));

        // no retry on server errors
        let broken = client.fetch_html(&format!("{}/broken", server.uri())).await;
        assert!(matches!(broken, Err(EventbriteError::Http(_))));
    }

    #[tokio::test]
    async fn test_post_json_sends_api_headers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api"))
            .and(header_is("x-requested-with", "XMLHttpRequest"))
            .and(header_is("x-csrftoken", "tok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        let client = EventbriteClient::with_config(test_config(server.uri())).unwrap();
        let mut extra = HeaderMap::new();
        extra.insert(HeaderName::from_static("x-csrftoken"), HeaderValue::from_static("tok"));

        let value = client
            .post_json(&format!("{}/api", server.uri()), &json!({"q": 1}), extra)
            .await
            .unwrap();
        assert_eq!(value, json!({"ok": true}));
    }
}
