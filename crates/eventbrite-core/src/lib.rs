//! Eventbrite Scraper Core Library
//!
//! This crate retrieves event listings and event pages from eventbrite.com
//! by combining HTML scraping with the site's internal search API, and
//! normalizes both kinds of payload into one [`Event`] record.
//!
//! # Features
//! - Paged event search by region and date range, with price, category and
//!   format filters
//! - Event page loading by URL or id
//! - Request pacing with a fixed or randomized delay

pub mod client;
pub mod error;
pub mod parser;
pub mod query;
pub mod scraper;
pub mod types;

// Re-export main types for convenience
pub use client::{ClientConfig, EventbriteClient, Interval, RateLimiter};
pub use error::{EventbriteError, Result};
pub use query::SearchQuery;
pub use scraper::{ContinuationContext, EventbriteScraper, SearchPages};
pub use types::{
    Address, Category, Event, EventFormat, EventTag, Image, PaginatedResult, Price, RawPayload,
    Venue,
};
