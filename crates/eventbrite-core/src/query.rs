//! Search parameters and URL building
//!
//! Page 1 of a search is a GET on `/d/{region}/{filters}/` with the date
//! range in the query string. Later pages are POSTs to the internal search
//! API with an equivalent JSON body.

use chrono::NaiveDate;
use serde_json::{json, Value};

use crate::error::{EventbriteError, Result};
use crate::types::{Category, EventFormat, Price};

/// Default number of pages fetched by a search
pub const DEFAULT_MAX_PAGES: u32 = 10;

/// Events per page requested from the search API
pub const API_PAGE_SIZE: u32 = 20;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parameters of an event search
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    /// Region slug, e.g. "ca--san-francisco"
    pub region: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub price: Option<Price>,
    pub category: Option<Category>,
    pub event_format: Option<EventFormat>,
    pub online_events_only: bool,
    /// Stop after this many pages (default: 10)
    pub max_pages: u32,
}

impl SearchQuery {
    /// Create a query for all events of a region in a date range
    pub fn new(region: impl Into<String>, start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            region: region.into(),
            start_date,
            end_date,
            price: None,
            category: None,
            event_format: None,
            online_events_only: false,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }

    /// Create a query from `YYYY-MM-DD` date strings.
    ///
    /// # Errors
    /// Returns `EventbriteError::InvalidArgument` if a date is malformed
    ///
    /// # Example
    /// ```
    /// use eventbrite_core::SearchQuery;
    ///
    /// let query = SearchQuery::with_date_strings("ca--san-francisco", "2024-01-01", "2024-01-14").unwrap();
    /// assert_eq!(query.max_pages, 10);
    /// assert!(SearchQuery::with_date_strings("ca--san-francisco", "01/01/2024", "2024-01-14").is_err());
    /// ```
    pub fn with_date_strings(region: impl Into<String>, start_date: &str, end_date: &str) -> Result<Self> {
        Ok(Self::new(region, parse_date(start_date)?, parse_date(end_date)?))
    }

    pub fn price(mut self, price: Price) -> Self {
        self.price = Some(price);
        self
    }

    pub fn category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    pub fn event_format(mut self, event_format: EventFormat) -> Self {
        self.event_format = Some(event_format);
        self
    }

    pub fn online_events_only(mut self, online_only: bool) -> Self {
        self.online_events_only = online_only;
        self
    }

    pub fn max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages;
        self
    }

    /// Path segment built from the filters, `all-events` when none is set
    pub fn filter_path(&self) -> String {
        let mut parts = Vec::new();
        if let Some(price) = self.price {
            parts.push(price.as_str());
        }
        if let Some(category) = self.category {
            parts.push(category.url_slug());
        }
        if let Some(format) = self.event_format {
            parts.push(format.url_slug());
        }

        if parts.is_empty() {
            "all-events".to_string()
        } else {
            parts.join("--")
        }
    }
}

fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT).map_err(|_| {
        EventbriteError::InvalidArgument(format!("date must be YYYY-MM-DD, got {:?}", value))
    })
}

/// URL of a search results page
pub fn search_page_url(base_url: &str, query: &SearchQuery, page: u32) -> String {
    let params = [
        ("page", page.to_string()),
        ("start_date", query.start_date.format(DATE_FORMAT).to_string()),
        ("end_date", query.end_date.format(DATE_FORMAT).to_string()),
    ];
    let encoded = params
        .iter()
        .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&");

    format!(
        "{}/d/{}/{}/?{}",
        base_url,
        query.region,
        query.filter_path(),
        encoded
    )
}

/// URL of the internal search API
pub fn search_api_url(base_url: &str) -> String {
    format!("{}/api/v3/destination/search/", base_url)
}

/// URL of an event page
pub fn event_profile_url(base_url: &str, event_id: &str) -> String {
    format!("{}/e/{}", base_url, event_id)
}

/// JSON body for one search API page
pub fn search_api_body(
    query: &SearchQuery,
    place_id: &str,
    page: u32,
    client_timezone: &str,
) -> Value {
    let mut body = json!({
        "event_search": {
            "date_range": {
                "from": query.start_date.format(DATE_FORMAT).to_string(),
                "to": query.end_date.format(DATE_FORMAT).to_string(),
            },
            "dates": "current_future",
            "dedup": true,
            "places": [place_id],
            "page": page,
            "page_size": API_PAGE_SIZE,
            "online_events_only": query.online_events_only,
            "client_timezone": client_timezone,
            "include_promoted_events_for": {
                "interface": "search",
                "request_source": "web",
            },
        },
        "expand.destination_event": [
            "primary_venue",
            "image",
            "ticket_availability",
            "saves",
            "event_sales_status",
            "primary_organizer",
            "public_collections",
        ],
    });

    let tags: Vec<&str> = query
        .category
        .map(Category::api_id)
        .into_iter()
        .chain(query.event_format.map(EventFormat::api_id))
        .collect();

    if let Some(search) = body.get_mut("event_search").and_then(Value::as_object_mut) {
        if !tags.is_empty() {
            search.insert("tags".to_string(), json!(tags));
        }
        if let Some(price) = query.price {
            search.insert("price".to_string(), json!(price.as_str()));
        }
    }

    body
}
