//! Main Eventbrite scraper API
//!
//! This module combines the HTTP client with the parsers. Search results are
//! fetched differently depending on the page: page 1 is scraped from the
//! search HTML, later pages come from the internal search API, which needs
//! the place id and CSRF token found on page 1.

use reqwest::header::{self, HeaderMap, HeaderName};
use serde_json::Value;
use tracing::{debug, info};

use crate::client::{header_value, EventbriteClient};
use crate::error::{EventbriteError, Result};
use crate::parser::{
    event_from_profile, event_from_search_result, extract_server_data, parse_search_api_response,
    parse_search_page,
};
use crate::query::{
    event_profile_url, search_api_body, search_api_url, search_page_url, SearchQuery,
};
use crate::types::{Event, PaginatedResult};

/// Main scraper API for eventbrite.com
///
/// # Example
/// ```no_run
/// use eventbrite_core::{EventbriteScraper, SearchQuery};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let scraper = EventbriteScraper::new()?;
///     let query = SearchQuery::with_date_strings("ca--san-francisco", "2024-01-01", "2024-01-14")?;
///
///     let mut pages = scraper.search_pages(query);
///     while let Some(page) = pages.next_page().await? {
///         println!("page {}: {} events", page.current_page, page.items.len());
///     }
///     Ok(())
/// }
/// ```
pub struct EventbriteScraper {
    client: EventbriteClient,
}

/// State carried from page 1 into the API driven pages
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContinuationContext {
    pub place_id: String,
    pub csrf_token: String,
    /// Zone of the first event on page 1
    pub timezone: String,
    /// Page 1 URL, sent as referer
    pub referer_url: String,
}

impl EventbriteScraper {
    /// Create a new scraper with default configuration.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be created.
    pub fn new() -> Result<Self> {
        let client = EventbriteClient::new()?;
        Ok(Self { client })
    }

    /// Create a new scraper with a custom client.
    pub fn with_client(client: EventbriteClient) -> Self {
        Self { client }
    }

    /// Start a paged search.
    ///
    /// Nothing is fetched until [`SearchPages::next_page`] is awaited.
    pub fn search_pages(&self, query: SearchQuery) -> SearchPages<'_> {
        SearchPages {
            scraper: self,
            query,
            state: PagerState::FirstPage,
        }
    }

    /// Run a search to completion and return all events, in page order.
    pub async fn search_all(&self, query: SearchQuery) -> Result<Vec<Event>> {
        self.search_pages(query).collect_all().await
    }

    /// Load and normalize one event page.
    ///
    /// # Arguments
    /// * `url_or_id` - Full event URL, or a bare event id
    ///
    /// # Errors
    /// - `EventbriteError::NotFound` - the page has no embedded data or the
    ///   server answered 404
    /// - `EventbriteError::Parse` - the embedded data is malformed
    /// - `EventbriteError::MissingField` - the payload lacks a required key
    pub async fn load_profile(&self, url_or_id: &str) -> Result<Event> {
        let url = if url_or_id.starts_with("http") {
            url_or_id.to_string()
        } else {
            event_profile_url(self.client.base_url(), url_or_id)
        };

        let html = self.client.fetch_html(&url).await?;
        let data = extract_server_data(&html)?;
        event_from_profile(&data)
    }

    /// Fetch one page of raw results from the search API.
    ///
    /// # Errors
    /// Returns `EventbriteError::UnsupportedPage` for `page < 2`; page 1 is
    /// only available as HTML.
    pub async fn fetch_search_api(
        &self,
        query: &SearchQuery,
        context: &ContinuationContext,
        page: u32,
    ) -> Result<Vec<Value>> {
        if page < 2 {
            return Err(EventbriteError::UnsupportedPage(page));
        }

        let url = search_api_url(self.client.base_url());
        let body = search_api_body(query, &context.place_id, page, &context.timezone);

        let mut headers = HeaderMap::new();
        headers.insert(header::REFERER, header_value(&context.referer_url)?);
        headers.insert(
            HeaderName::from_static("x-csrftoken"),
            header_value(&context.csrf_token)?,
        );

        let data = self.client.post_json(&url, &body, headers).await?;
        parse_search_api_response(&data)
    }

    async fn fetch_first_page(
        &self,
        query: &SearchQuery,
    ) -> Result<Option<(Vec<Event>, ContinuationContext)>> {
        let url = search_page_url(self.client.base_url(), query, 1);
        let html = self.client.fetch_html(&url).await?;
        let page = parse_search_page(&html)?;

        if page.results.is_empty() {
            debug!("first search page has no results");
            return Ok(None);
        }
        let events = normalize_results(&page.results)?;

        let timezone = events
            .first()
            .and_then(|e| e.timezone.clone())
            .ok_or_else(|| EventbriteError::MissingField("timezone".to_string()))?;

        let context = ContinuationContext {
            place_id: page.place_id,
            csrf_token: page.csrf_token,
            timezone,
            referer_url: url,
        };
        Ok(Some((events, context)))
    }
}

fn normalize_results(results: &[Value]) -> Result<Vec<Event>> {
    results.iter().map(event_from_search_result).collect()
}

enum PagerState {
    FirstPage,
    Api {
        context: ContinuationContext,
        next_page: u32,
    },
    Done,
}

/// Forward-only sequence of search result pages.
///
/// Each call to [`SearchPages::next_page`] issues at most one request. The
/// sequence ends on the first empty page, once `max_pages` pages were
/// returned, or after an error. It cannot be restarted: start a new search
/// to fetch page 1 again.
pub struct SearchPages<'a> {
    scraper: &'a EventbriteScraper,
    query: SearchQuery,
    state: PagerState,
}

impl SearchPages<'_> {
    /// Fetch the next page of events, `None` once the search is over.
    pub async fn next_page(&mut self) -> Result<Option<PaginatedResult<Event>>> {
        let max_pages = self.query.max_pages;

        match std::mem::replace(&mut self.state, PagerState::Done) {
            PagerState::Done => Ok(None),
            PagerState::FirstPage => {
                if max_pages == 0 {
                    return Err(EventbriteError::InvalidArgument(
                        "max_pages must be at least 1".to_string(),
                    ));
                }
                info!(page = 1, max_pages, region = %self.query.region, "search page");

                let first = self.scraper.fetch_first_page(&self.query).await?;
                let Some((events, context)) = first else {
                    return Ok(None);
                };
                if max_pages > 1 {
                    self.state = PagerState::Api {
                        context,
                        next_page: 2,
                    };
                }
                Ok(Some(PaginatedResult::new(events, 1)))
            }
            PagerState::Api { context, next_page } => {
                info!(page = next_page, max_pages, region = %self.query.region, "search page");

                let results = self
                    .scraper
                    .fetch_search_api(&self.query, &context, next_page)
                    .await?;
                if results.is_empty() {
                    debug!(page = next_page, "search API returned no results");
                    return Ok(None);
                }
                let events = normalize_results(&results)?;

                if next_page < max_pages {
                    self.state = PagerState::Api {
                        context,
                        next_page: next_page + 1,
                    };
                }
                Ok(Some(PaginatedResult::new(events, next_page)))
            }
        }
    }

    /// Whether the sequence has ended
    pub fn is_finished(&self) -> bool {
        matches!(self.state, PagerState::Done)
    }

    /// Drain the remaining pages into one list, keeping page order.
    pub async fn collect_all(mut self) -> Result<Vec<Event>> {
        let mut events = Vec::new();
        while let Some(page) = self.next_page().await? {
            events.extend(page.items);
        }
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ClientConfig, Interval};
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{header as header_is, method, path, query_param};
    use wiremock::{Match, Mock, MockServer, Request, ResponseTemplate};

    const REGION: &str = "ca--san-francisco";

    /// Matches a search API request for the given page
    struct ApiPage(u64);

    impl Match for ApiPage {
        fn matches(&self, request: &Request) -> bool {
            serde_json::from_slice::<Value>(&request.body)
                .map(|body| body["event_search"]["page"] == self.0)
                .unwrap_or(false)
        }
    }

    fn item(id: &str) -> Value {
        json!({
            "id": id,
            "dedup": {"hash": format!("hash-{}", id)},
            "name": format!("Event {}", id),
            "url": format!("https://www.eventbrite.com/e/{}", id),
            "timezone": "America/Los_Angeles",
            "start_date": "2024-01-02",
            "start_time": "19:00",
            "end_date": "2024-01-02",
            "end_time": "22:00",
            "published": "2023-12-01T12:00:00Z",
            "is_online_event": false,
            "full_description": null,
            "summary": "summary",
            "tags": []
        })
    }

    fn search_html(results: Vec<Value>) -> String {
        let data = json!({
            "placeId": "85921881",
            "search_data": {"events": {"results": results}}
        });
        format!(
            r#"<html><body>
            <form><input type="hidden" name="csrfmiddlewaretoken" value="tok-1"></form>
            <script>window.__SERVER_DATA__ = {};</script>
            </body></html>"#,
            data
        )
    }

    fn api_response(results: Vec<Value>) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({"events": {"results": results}}))
    }

    fn scraper_for(server: &MockServer) -> EventbriteScraper {
        let config = ClientConfig {
            base_url: server.uri(),
            delay: Some(Interval::Fixed(Duration::ZERO)),
            ..ClientConfig::default()
        };
        EventbriteScraper::with_client(EventbriteClient::with_config(config).unwrap())
    }

    fn query() -> SearchQuery {
        SearchQuery::with_date_strings(REGION, "2024-01-01", "2024-01-14").unwrap()
    }

    async fn mount_first_page(server: &MockServer, results: Vec<Value>) {
        Mock::given(method("GET"))
            .and(path(format!("/d/{}/all-events/", REGION)))
            .and(query_param("page", "1"))
            .and(query_param("start_date", "2024-01-01"))
            .respond_with(ResponseTemplate::new(200).set_body_string(search_html(results)))
            .expect(1)
            .mount(server)
            .await;
    }

    async fn mount_api_page(server: &MockServer, page: u64, results: Vec<Value>, times: u64) {
        Mock::given(method("POST"))
            .and(path("/api/v3/destination/search/"))
            .and(ApiPage(page))
            .respond_with(api_response(results))
            .expect(times)
            .mount(server)
            .await;
    }

    #[test]
    fn test_scraper_creation() {
        let scraper = EventbriteScraper::new();
        assert!(scraper.is_ok());
    }

    #[tokio::test]
    async fn test_search_stops_on_first_empty_page() {
        let server = MockServer::start().await;
        mount_first_page(&server, vec![item("1"), item("2")]).await;
        mount_api_page(&server, 2, vec![item("3")], 1).await;
        mount_api_page(&server, 3, vec![], 1).await;
        mount_api_page(&server, 4, vec![item("never")], 0).await;

        let scraper = scraper_for(&server);
        let mut pages = scraper.search_pages(query());

        let first = pages.next_page().await.unwrap().unwrap();
        assert_eq!(first.current_page, 1);
        assert_eq!(first.items.len(), 2);

        let second = pages.next_page().await.unwrap().unwrap();
        assert_eq!(second.current_page, 2);
        assert_eq!(second.items[0].id, "3");

        assert!(pages.next_page().await.unwrap().is_none());
        assert!(pages.is_finished());
        // no further fetches once finished
        assert!(pages.next_page().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_search_all_preserves_order() {
        let server = MockServer::start().await;
        mount_first_page(&server, vec![item("1"), item("2")]).await;
        mount_api_page(&server, 2, vec![item("3"), item("4")], 1).await;
        mount_api_page(&server, 3, vec![item("5")], 1).await;
        mount_api_page(&server, 4, vec![], 1).await;

        let scraper = scraper_for(&server);
        let events = scraper.search_all(query()).await.unwrap();
        let ids: Vec<_> = events.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3", "4", "5"]);
    }

    #[tokio::test]
    async fn test_search_single_page_cap() {
        let server = MockServer::start().await;
        mount_first_page(&server, vec![item("1")]).await;
        mount_api_page(&server, 2, vec![item("2")], 0).await;

        let scraper = scraper_for(&server);
        let events = scraper.search_all(query().max_pages(1)).await.unwrap();
        assert_eq!(events.len(), 1);
    }

    #[tokio::test]
    async fn test_search_respects_max_pages() {
        let server = MockServer::start().await;
        mount_first_page(&server, vec![item("1")]).await;
        mount_api_page(&server, 2, vec![item("2")], 1).await;
        mount_api_page(&server, 3, vec![item("3")], 1).await;
        mount_api_page(&server, 4, vec![item("4")], 0).await;

        let scraper = scraper_for(&server);
        let events = scraper.search_all(query().max_pages(3)).await.unwrap();
        assert_eq!(events.len(), 3);
    }

    #[tokio::test]
    async fn test_search_empty_first_page() {
        let server = MockServer::start().await;
        mount_first_page(&server, vec![]).await;
        mount_api_page(&server, 2, vec![item("2")], 0).await;

        let scraper = scraper_for(&server);
        let mut pages = scraper.search_pages(query());
        assert!(pages.next_page().await.unwrap().is_none());
        assert!(pages.is_finished());
    }

    #[tokio::test]
    async fn test_api_request_carries_continuation_context() {
        let server = MockServer::start().await;
        mount_first_page(&server, vec![item("1")]).await;

        let referer = format!(
            "{}/d/{}/all-events/?page=1&start_date=2024-01-01&end_date=2024-01-14",
            server.uri(),
            REGION
        );
        Mock::given(method("POST"))
            .and(path("/api/v3/destination/search/"))
            .and(header_is("x-csrftoken", "tok-1"))
            .and(header_is("referer", referer.as_str()))
            .and(ApiPage(2))
            .respond_with(api_response(vec![]))
            .expect(1)
            .mount(&server)
            .await;

        let scraper = scraper_for(&server);
        scraper.search_all(query()).await.unwrap();

        let requests = server.received_requests().await.unwrap();
        let api_request = requests
            .iter()
            .find(|r| r.url.path() == "/api/v3/destination/search/")
            .unwrap();
        let body: Value = serde_json::from_slice(&api_request.body).unwrap();
        assert_eq!(body["event_search"]["places"], json!(["85921881"]));
        assert_eq!(body["event_search"]["client_timezone"], "America/Los_Angeles");
    }

    #[tokio::test]
    async fn test_error_ends_the_sequence() {
        let server = MockServer::start().await;
        mount_first_page(&server, vec![item("1")]).await;
        Mock::given(method("POST"))
            .and(path("/api/v3/destination/search/"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let scraper = scraper_for(&server);
        let mut pages = scraper.search_pages(query());
        assert!(pages.next_page().await.unwrap().is_some());
        assert!(matches!(
            pages.next_page().await,
            Err(EventbriteError::Http(_))
        ));
        assert!(pages.next_page().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_search_zero_max_pages() {
        let scraper = EventbriteScraper::new().unwrap();
        let result = scraper.search_all(query().max_pages(0)).await;
        assert!(matches!(result, Err(EventbriteError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn test_fetch_search_api_rejects_first_page() {
        let scraper = EventbriteScraper::new().unwrap();
        let context = ContinuationContext {
            place_id: "1".to_string(),
            csrf_token: "t".to_string(),
            timezone: "UTC".to_string(),
            referer_url: "https://www.eventbrite.com/d/x/all-events/".to_string(),
        };
        match scraper.fetch_search_api(&query(), &context, 1).await {
            Err(EventbriteError::UnsupportedPage(page)) => assert_eq!(page, 1),
            _ => panic!("Expected UnsupportedPage error"),
        }
    }

    fn profile_html() -> String {
        let data = json!({
            "event": {
                "id": "555",
                "name": "Jazz Night",
                "url": "https://www.eventbrite.com/e/555",
                "isOnlineEvent": true,
                "start": {"utc": "2024-05-01T02:00:00Z"},
                "end": {"utc": "2024-05-01T05:00:00Z", "timezone": "America/New_York"}
            },
            "organizer": {"id": "org1", "name": "Blue Note"},
            "components": {
                "eventDescription": {"summary": "Live jazz"},
                "eventMap": {}
            }
        });
        format!("<html><script>window.__SERVER_DATA__ = {};</script></html>", data)
    }

    #[tokio::test]
    async fn test_load_profile_by_id() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/e/555"))
            .respond_with(ResponseTemplate::new(200).set_body_string(profile_html()))
            .expect(1)
            .mount(&server)
            .await;

        let scraper = scraper_for(&server);
        let event = scraper.load_profile("555").await.unwrap();
        assert_eq!(event.id, "555");
        assert!(event.is_online_event);
        assert_eq!(event.primary_venue.name.as_deref(), Some("Blue Note"));
    }

    #[tokio::test]
    async fn test_load_profile_by_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/e/jazz-night-555"))
            .respond_with(ResponseTemplate::new(200).set_body_string(profile_html()))
            .expect(1)
            .mount(&server)
            .await;

        let scraper = scraper_for(&server);
        let url = format!("{}/e/jazz-night-555", server.uri());
        let event = scraper.load_profile(&url).await.unwrap();
        assert_eq!(event.name, "Jazz Night");
    }

    #[tokio::test]
    async fn test_load_profile_without_data() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/e/1"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .mount(&server)
            .await;

        let scraper = scraper_for(&server);
        assert!(matches!(
            scraper.load_profile("1").await,
            Err(EventbriteError::NotFound(_))
        ));
    }
}
