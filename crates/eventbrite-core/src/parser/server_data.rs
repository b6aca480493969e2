//! Embedded page data extraction
//!
//! Eventbrite pages ship their data as a JSON literal assigned to
//! `window.__SERVER_DATA__` inside a `<script>` block. Search pages also
//! carry a `csrfmiddlewaretoken` form field needed by the search API.

use scraper::{Html, Selector};
use serde_json::Value;
use tracing::error;

use crate::error::{EventbriteError, Result};

use super::fields::{require, value_to_string};

/// Global variable holding the page data
pub const SERVER_DATA_MARKER: &str = "window.__SERVER_DATA__";

/// Data pulled from the first search results page
#[derive(Debug, Clone)]
pub struct SearchPageData {
    /// Anti-forgery token for the search API
    pub csrf_token: String,
    /// Place id of the searched region
    pub place_id: String,
    /// Raw event objects of page 1
    pub results: Vec<Value>,
}

/// Extract and parse the `window.__SERVER_DATA__` JSON of a page.
///
/// # Errors
/// - `EventbriteError::NotFound` - no script assigns the marker
/// - `EventbriteError::Parse` - the JSON literal is malformed; `raw`
///   carries the unparsed text
///
/// # Example
/// ```
/// use eventbrite_core::parser::extract_server_data;
///
/// let html = r#"<script>window.__SERVER_DATA__ = {"a":1};</script>"#;
/// let data = extract_server_data(html).unwrap();
/// assert_eq!(data["a"], 1);
/// ```
pub fn extract_server_data(html: &str) -> Result<Value> {
    let document = Html::parse_document(html);
    server_data_from_document(&document)
}

/// Extract the value of the hidden `csrfmiddlewaretoken` input.
///
/// # Errors
/// Returns `EventbriteError::NotFound` if the field or its value is absent
pub fn extract_csrf_token(html: &str) -> Result<String> {
    let document = Html::parse_document(html);
    csrf_token_from_document(&document)
}

/// Parse the first search results page.
///
/// Place id comes from `placeId` and results from
/// `search_data.events.results` of the embedded data.
pub fn parse_search_page(html: &str) -> Result<SearchPageData> {
    let document = Html::parse_document(html);
    let data = server_data_from_document(&document)?;
    let csrf_token = csrf_token_from_document(&document)?;

    let place_id = value_to_string(require(&data, "placeId")?)
        .ok_or_else(|| EventbriteError::MissingField("placeId (expected text)".to_string()))?;
    let results = results_array(&data, "search_data.events.results")?;

    Ok(SearchPageData {
        csrf_token,
        place_id,
        results,
    })
}

/// Results of a search API answer (`events.results`)
pub fn parse_search_api_response(data: &Value) -> Result<Vec<Value>> {
    results_array(data, "events.results")
}

fn results_array(data: &Value, path: &str) -> Result<Vec<Value>> {
    require(data, path)?
        .as_array()
        .cloned()
        .ok_or_else(|| EventbriteError::MissingField(format!("{} (expected list)", path)))
}

fn server_data_from_document(document: &Html) -> Result<Value> {
    let selector = Selector::parse("script")
        .map_err(|e| EventbriteError::Parse {
            message: format!("Invalid selector: {:?}", e),
            raw: "script".to_string(),
        })?;

    let script_text = document
        .select(&selector)
        .map(|el| el.text().collect::<String>())
        .find(|text| text.contains(SERVER_DATA_MARKER))
        .ok_or_else(|| EventbriteError::NotFound(format!("script with {}", SERVER_DATA_MARKER)))?;

    let re = regex_lite::Regex::new(r"(?ims)window\.__SERVER_DATA__\s*=(.*?\});")
        .map_err(|e| EventbriteError::Parse {
            message: format!("Invalid pattern: {}", e),
            raw: String::new(),
        })?;
    let raw = re
        .captures(&script_text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .ok_or_else(|| EventbriteError::NotFound(format!("{} assignment", SERVER_DATA_MARKER)))?;

    parse_relaxed_json(raw)
}

fn csrf_token_from_document(document: &Html) -> Result<String> {
    let selector = Selector::parse("input[name='csrfmiddlewaretoken']")
        .map_err(|e| EventbriteError::Parse {
            message: format!("Invalid selector: {:?}", e),
            raw: "input[name='csrfmiddlewaretoken']".to_string(),
        })?;

    document
        .select(&selector)
        .next()
        .and_then(|el| el.value().attr("value"))
        .map(str::to_string)
        .ok_or_else(|| EventbriteError::NotFound("csrfmiddlewaretoken".to_string()))
}

/// Parse JSON, accepting raw control characters inside string literals
fn parse_relaxed_json(raw: &str) -> Result<Value> {
    let first_error = match serde_json::from_str(raw) {
        Ok(value) => return Ok(value),
        Err(e) => e,
    };

    serde_json::from_str(&escape_control_chars(raw)).map_err(|_| {
        error!(raw, "malformed embedded JSON");
        EventbriteError::Parse {
            message: first_error.to_string(),
            raw: raw.to_string(),
        }
    })
}

/// Escape control characters that appear inside JSON string literals
fn escape_control_chars(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut in_string = false;
    let mut escaped = false;

    for ch in raw.chars() {
        if in_string {
            if escaped {
                escaped = false;
                out.push(ch);
                continue;
            }
            match ch {
                '\\' => {
                    escaped = true;
                    out.push(ch);
                }
                '"' => {
                    in_string = false;
                    out.push(ch);
                }
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                '\t' => out.push_str("\\t"),
                c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
                c => out.push(c),
            }
        } else {
            if ch == '"' {
                in_string = true;
            }
            out.push(ch);
        }
    }

    out
}
