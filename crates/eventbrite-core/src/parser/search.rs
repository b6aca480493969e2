//! Search result normalizer
//!
//! Turns one event object from the search page data (or the search API) into
//! an [`Event`].

use serde_json::Value;

use crate::error::{EventbriteError, Result};
use crate::types::{Address, Event, EventTag, Image, Venue};

use super::fields::{
    first_present, localize, lookup, opt_bool, opt_string, parse_timezone, require_bool,
    require_f64, require_string, require_utc_timestamp,
};

/// Upstream keys that may carry the event id, in order of preference
pub const EVENT_ID_KEYS: [&str; 3] = ["id", "eventbrite_event_id", "eid"];

const CATEGORY_PREFIX: &str = "EventbriteCategory";
const FORMAT_PREFIX: &str = "EventbriteFormat";

/// Bucket a search result tag belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagBucket {
    Category,
    Format,
    Organizer,
}

/// Classify an upstream tag object.
///
/// The first matching rule wins: `prefix == "EventbriteCategory"`, then
/// `prefix == "EventbriteFormat"`, then `_type == "tag"`. Tags matching
/// none of them are dropped.
pub fn classify_tag(tag: &Value) -> Option<TagBucket> {
    let prefix = tag.get("prefix").and_then(Value::as_str);
    let kind = tag.get("_type").and_then(Value::as_str);

    match (prefix, kind) {
        (Some(CATEGORY_PREFIX), _) => Some(TagBucket::Category),
        (Some(FORMAT_PREFIX), _) => Some(TagBucket::Format),
        (_, Some("tag")) => Some(TagBucket::Organizer),
        _ => None,
    }
}

/// Normalize one search result item.
///
/// # Errors
/// - `EventbriteError::MissingField` - id, dedup hash, name, url, online
///   flag, timezone or any date part is absent; also when a venue address
///   lacks coordinates
/// - `EventbriteError::InvalidTimezone` - the declared zone is unknown
/// - `EventbriteError::Parse` - a date or time has an unexpected format
pub fn event_from_search_result(raw: &Value) -> Result<Event> {
    let id = first_present(raw, &EVENT_ID_KEYS)?;

    let timezone = require_string(raw, "timezone")?;
    let tz = parse_timezone(&timezone)?;

    let start_datetime = localize(
        &require_string(raw, "start_date")?,
        &require_string(raw, "start_time")?,
        tz,
    )?;
    let end_datetime = localize(
        &require_string(raw, "end_date")?,
        &require_string(raw, "end_time")?,
        tz,
    )?;
    let published_datetime = require_utc_timestamp(raw, "published")?;

    let (tags_categories, tags_formats, tags_by_organizer) = partition_tags(raw)?;

    Ok(Event {
        id,
        hash: Some(require_string(raw, "dedup.hash")?),
        name: require_string(raw, "name")?,
        url: require_string(raw, "url")?,
        is_online_event: require_bool(raw, "is_online_event")?,
        long_description: opt_string(raw, "full_description"),
        short_description: opt_string(raw, "summary"),
        published_datetime: Some(published_datetime),
        start_datetime,
        end_datetime,
        timezone: Some(timezone),
        is_cancelled: opt_bool(raw, "is_cancelled"),
        hide_start_date: opt_bool(raw, "hide_start_date"),
        hide_end_date: opt_bool(raw, "hide_end_date"),
        parent_event_url: opt_string(raw, "parent_url"),
        series_id: opt_string(raw, "series_id"),
        primary_venue: venue(raw)?,
        tags_categories,
        tags_formats,
        tags_by_organizer,
        tickets_url: opt_string(raw, "tickets_url"),
        tickets_by: opt_string(raw, "tickets_by"),
        checkout_flow: opt_string(raw, "checkout_flow"),
        language: opt_string(raw, "language"),
        image: Image {
            id: opt_string(raw, "image.id"),
            url: opt_string(raw, "image.url"),
            original_url: opt_string(raw, "image.original.url"),
        },
        raw_search_data: Some(raw.clone()),
        raw_profile_data: None,
    })
}

type TagBuckets = (Vec<EventTag>, Vec<EventTag>, Vec<EventTag>);

fn partition_tags(raw: &Value) -> Result<TagBuckets> {
    let mut categories = Vec::new();
    let mut formats = Vec::new();
    let mut by_organizer = Vec::new();

    let Some(tags) = lookup(raw, "tags") else {
        return Ok((categories, formats, by_organizer));
    };
    let tags = tags
        .as_array()
        .ok_or_else(|| EventbriteError::MissingField("tags (expected list)".to_string()))?;

    for (i, item) in tags.iter().enumerate() {
        let Some(bucket) = classify_tag(item) else {
            continue;
        };
        let tag = EventTag {
            id: require_string(item, "tag")
                .map_err(|_| EventbriteError::MissingField(format!("tags[{}].tag", i)))?,
            text: require_string(item, "display_name")
                .map_err(|_| EventbriteError::MissingField(format!("tags[{}].display_name", i)))?,
        };
        match bucket {
            TagBucket::Category => categories.push(tag),
            TagBucket::Format => formats.push(tag),
            TagBucket::Organizer => by_organizer.push(tag),
        }
    }

    Ok((categories, formats, by_organizer))
}

fn venue(raw: &Value) -> Result<Venue> {
    let Some(venue) = lookup(raw, "primary_venue") else {
        return Ok(Venue::default());
    };

    Ok(Venue {
        id: opt_string(venue, "id"),
        name: opt_string(venue, "name"),
        address: address(venue)?,
        ..Venue::default()
    })
}

fn address(venue: &Value) -> Result<Address> {
    let Some(address) = lookup(venue, "address") else {
        return Ok(Address::default());
    };

    // coordinates are mandatory once an address is present
    let coordinate = |key: &str| {
        require_f64(address, key)
            .map_err(|_| EventbriteError::MissingField(format!("primary_venue.address.{}", key)))
    };
    let latitude = coordinate("latitude")?;
    let longitude = coordinate("longitude")?;

    Ok(Address {
        city: opt_string(address, "city"),
        latitude: Some(latitude),
        longitude: Some(longitude),
        country: opt_string(address, "country"),
        region: opt_string(address, "region"),
        postal_code: opt_string(address, "postal_code"),
        address_1: opt_string(address, "address_1"),
        address_2: opt_string(address, "address_2"),
        localized_area_display: opt_string(address, "localized_area_display"),
        localized_address_display: opt_string(address, "localized_address_display"),
        full_address: None,
    })
}
