//! Event page normalizer
//!
//! The event page data has a different shape from search results: the event
//! lives under `event`, the venue is described by the `organizer` block and
//! the address only exists as one string under `components.eventMap`.
//! Tags, ticketing and image fields are not reliable there and stay empty.

use serde_json::Value;
use tracing::warn;

use crate::error::{EventbriteError, Result};
use crate::types::{Address, Event, Image, Venue};

use super::fields::{
    lookup, opt_bool, opt_string, require, require_bool, require_string, require_utc_timestamp,
};

/// Normalize the `window.__SERVER_DATA__` payload of an event page.
///
/// # Errors
/// - `EventbriteError::MissingField` - one of the `event`, `organizer`,
///   `components.eventDescription` or `components.eventMap` blocks, the
///   event id, name, url, online flag or start/end timestamps is absent
/// - `EventbriteError::Parse` - a timestamp has an unexpected format
pub fn event_from_profile(raw: &Value) -> Result<Event> {
    let event = require(raw, "event")?;
    let organizer = require(raw, "organizer")?;
    let description = require(raw, "components.eventDescription")?;
    let event_map = require(raw, "components.eventMap")?;

    let start_datetime = require_utc_timestamp(event, "start.utc")
        .map_err(|e| prefix_missing(e, "event."))?;
    let end_datetime = require_utc_timestamp(event, "end.utc")
        .map_err(|e| prefix_missing(e, "event."))?;

    let venue = Venue {
        id: Some(require_string(organizer, "id").map_err(|e| prefix_missing(e, "organizer."))?),
        name: Some(require_string(organizer, "name").map_err(|e| prefix_missing(e, "organizer."))?),
        description: opt_string(organizer, "description"),
        address: Address {
            full_address: opt_string(event_map, "venueAddress"),
            ..Address::default()
        },
        url: opt_string(organizer, "url"),
        twitter_handle: opt_string(organizer, "orgTwitter"),
        facebook_handle: opt_string(organizer, "orgFacebook"),
        organization_website: opt_string(organizer, "orgWebsite"),
    };

    Ok(Event {
        id: require_string(event, "id").map_err(|e| prefix_missing(e, "event."))?,
        hash: None,
        name: require_string(event, "name").map_err(|e| prefix_missing(e, "event."))?,
        url: require_string(event, "url").map_err(|e| prefix_missing(e, "event."))?,
        is_online_event: require_bool(event, "isOnlineEvent")
            .map_err(|e| prefix_missing(e, "event."))?,
        long_description: Some(long_description(description)?),
        short_description: opt_string(description, "summary"),
        published_datetime: None,
        start_datetime,
        end_datetime,
        timezone: opt_string(event, "end.timezone"),
        is_cancelled: opt_bool(event, "compactCheckoutDisqualifications.is_canceled"),
        hide_start_date: opt_bool(event, "hideStartDate"),
        hide_end_date: opt_bool(event, "hideEndDate"),
        parent_event_url: None,
        series_id: None,
        primary_venue: venue,
        tags_categories: Vec::new(),
        tags_formats: Vec::new(),
        tags_by_organizer: Vec::new(),
        tickets_url: None,
        tickets_by: None,
        checkout_flow: None,
        language: None,
        image: Image::default(),
        raw_search_data: None,
        raw_profile_data: Some(raw.clone()),
    })
}

/// Concatenate the structured content modules into one HTML string.
///
/// Text modules become `<div>…</div>`, image modules `<img href="…">`, one
/// per line. Unknown module types are logged and skipped.
fn long_description(description: &Value) -> Result<String> {
    let mut out = String::new();

    let modules = lookup(description, "structuredContent.modules").and_then(Value::as_array);
    let Some(modules) = modules else {
        return Ok(out);
    };

    for (i, module) in modules.iter().enumerate() {
        match module.get("type").and_then(Value::as_str) {
            Some("text") => {
                let text = require_string(module, "text").map_err(|_| {
                    EventbriteError::MissingField(format!("structuredContent.modules[{}].text", i))
                })?;
                out.push_str(&format!("<div>{}</div>\n", text));
            }
            Some("image") => {
                let url = require_string(module, "url").map_err(|_| {
                    EventbriteError::MissingField(format!("structuredContent.modules[{}].url", i))
                })?;
                out.push_str(&format!("<img href=\"{}\">\n", url));
            }
            other => {
                warn!(module_type = ?other, index = i, "unknown content module, skipping");
            }
        }
    }

    Ok(out)
}

fn prefix_missing(error: EventbriteError, prefix: &str) -> EventbriteError {
    match error {
        EventbriteError::MissingField(path) => {
            EventbriteError::MissingField(format!("{}{}", prefix, path))
        }
        other => other,
    }
}
