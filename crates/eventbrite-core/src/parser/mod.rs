//! Page data extraction and normalization
//!
//! - `server_data`: pull the embedded JSON and CSRF token out of page HTML
//! - `search`: normalize search result items
//! - `profile`: normalize event page payloads
//! - `fields`: shared JSON field access and date helpers

pub mod fields;
pub mod profile;
pub mod search;
pub mod server_data;

// Re-export main parsing functions
pub use profile::event_from_profile;
pub use search::{classify_tag, event_from_search_result, TagBucket};
pub use server_data::{
    extract_csrf_token, extract_server_data, parse_search_api_response, parse_search_page,
    SearchPageData,
};
