//! Data types for the Eventbrite scraper
//!
//! This module contains the unified event record produced by both the search
//! and the profile normalizers, together with the immutable lookup tables
//! used to build search filters.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{EventbriteError, Result};

/// Tag attached to an event: an upstream id and its display text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventTag {
    /// Upstream tag id (e.g. "EventbriteCategory/103")
    pub id: String,
    /// Human readable text
    pub text: String,
}

/// Postal address of a venue
///
/// Search results fill the structured parts and the two display strings;
/// event pages only provide `full_address`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Address {
    pub city: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub country: Option<String>,
    pub region: Option<String>,
    pub postal_code: Option<String>,
    pub address_1: Option<String>,
    pub address_2: Option<String>,
    /// Area line for display, e.g. "San Francisco, CA"
    pub localized_area_display: Option<String>,
    /// Full address line for display
    pub localized_address_display: Option<String>,
    /// Unstructured address, only present on event pages
    pub full_address: Option<String>,
}

/// Venue of an event
///
/// On event pages this is built from the organizer block, so the contact
/// fields are only populated there.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Venue {
    pub id: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub address: Address,
    pub url: Option<String>,
    pub twitter_handle: Option<String>,
    pub facebook_handle: Option<String>,
    pub organization_website: Option<String>,
}

/// Event image
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Image {
    pub id: Option<String>,
    pub url: Option<String>,
    pub original_url: Option<String>,
}

/// Canonical event record
///
/// Built once per upstream record by [`crate::parser::event_from_search_result`]
/// or [`crate::parser::event_from_profile`]. All timestamps are stored in UTC,
/// the original zone name is kept in `timezone`.
///
/// The raw upstream payloads are skipped by the default `Serialize` output;
/// use [`Event::to_value`] with [`RawPayload::Include`] to get them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    /// Deduplication hash, only present in search results
    pub hash: Option<String>,
    pub name: String,
    pub url: String,
    pub is_online_event: bool,
    pub long_description: Option<String>,
    pub short_description: Option<String>,

    pub published_datetime: Option<DateTime<Utc>>,
    pub start_datetime: DateTime<Utc>,
    pub end_datetime: DateTime<Utc>,
    /// IANA zone name the event was declared in
    pub timezone: Option<String>,
    pub is_cancelled: Option<bool>,
    pub hide_start_date: Option<bool>,
    pub hide_end_date: Option<bool>,

    pub parent_event_url: Option<String>,
    pub series_id: Option<String>,

    pub primary_venue: Venue,

    pub tags_categories: Vec<EventTag>,
    pub tags_formats: Vec<EventTag>,
    pub tags_by_organizer: Vec<EventTag>,

    pub tickets_url: Option<String>,
    pub tickets_by: Option<String>,
    pub checkout_flow: Option<String>,
    pub language: Option<String>,

    pub image: Image,

    #[serde(skip_serializing, default)]
    pub raw_search_data: Option<Value>,
    #[serde(skip_serializing, default)]
    pub raw_profile_data: Option<Value>,
}

/// Whether raw upstream payloads go into a dict conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawPayload {
    Include,
    Exclude,
}

impl Event {
    /// Convert the event into a JSON object.
    ///
    /// # Errors
    /// Returns `EventbriteError::Json` if serialization fails
    pub fn to_value(&self, raw: RawPayload) -> Result<Value> {
        let mut value = serde_json::to_value(self)?;
        if raw == RawPayload::Include {
            if let Value::Object(map) = &mut value {
                self.attach_raw(map);
            }
        }
        Ok(value)
    }

    /// Convert the event into a flat JSON object with dotted keys
    /// (`primary_venue.address.city`).
    ///
    /// Raw payloads are attached after flattening and stay nested.
    pub fn to_flat_map(&self, raw: RawPayload) -> Result<Map<String, Value>> {
        let value = serde_json::to_value(self)?;
        let mut flat = Map::new();
        flatten_value("", &value, ".", &mut flat);
        if raw == RawPayload::Include {
            self.attach_raw(&mut flat);
        }
        Ok(flat)
    }

    fn attach_raw(&self, map: &mut Map<String, Value>) {
        map.insert(
            "raw_search_data".to_string(),
            self.raw_search_data.clone().unwrap_or(Value::Null),
        );
        map.insert(
            "raw_profile_data".to_string(),
            self.raw_profile_data.clone().unwrap_or(Value::Null),
        );
    }
}

/// Flatten nested JSON objects into `out`, joining keys with `sep`.
///
/// Arrays and scalars are kept as leaf values.
pub fn flatten_value(prefix: &str, value: &Value, sep: &str, out: &mut Map<String, Value>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let new_key = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{}{}{}", prefix, sep, key)
                };
                flatten_value(&new_key, child, sep, out);
            }
        }
        other => {
            out.insert(prefix.to_string(), other.clone());
        }
    }
}

/// Event category filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Business,
    FoodDrink,
    Health,
    Music,
    AutoBoatAir,
    CharityCauses,
    Community,
    FamilyEducation,
    Fashion,
    FilmMedia,
    Hobbies,
    HomeLifestyle,
    PerformingVisualArts,
    Government,
    Spirituality,
    SchoolActivities,
    ScienceTech,
    Holiday,
    SportsFitness,
    TravelOutdoor,
    Other,
}

impl Category {
    pub const ALL: [Category; 21] = [
        Category::Business,
        Category::FoodDrink,
        Category::Health,
        Category::Music,
        Category::AutoBoatAir,
        Category::CharityCauses,
        Category::Community,
        Category::FamilyEducation,
        Category::Fashion,
        Category::FilmMedia,
        Category::Hobbies,
        Category::HomeLifestyle,
        Category::PerformingVisualArts,
        Category::Government,
        Category::Spirituality,
        Category::SchoolActivities,
        Category::ScienceTech,
        Category::Holiday,
        Category::SportsFitness,
        Category::TravelOutdoor,
        Category::Other,
    ];

    /// Tag id sent to the search API
    pub fn api_id(self) -> &'static str {
        match self {
            Category::Business => "EventbriteCategory/101",
            Category::FoodDrink => "EventbriteCategory/110",
            Category::Health => "EventbriteCategory/107",
            Category::Music => "EventbriteCategory/103",
            Category::AutoBoatAir => "EventbriteCategory/118",
            Category::CharityCauses => "EventbriteCategory/111",
            Category::Community => "EventbriteCategory/113",
            Category::FamilyEducation => "EventbriteCategory/115",
            Category::Fashion => "EventbriteCategory/106",
            Category::FilmMedia => "EventbriteCategory/104",
            Category::Hobbies => "EventbriteCategory/119",
            Category::HomeLifestyle => "EventbriteCategory/117",
            Category::PerformingVisualArts => "EventbriteCategory/105",
            Category::Government => "EventbriteCategory/112",
            Category::Spirituality => "EventbriteCategory/114",
            Category::SchoolActivities => "EventbriteCategory/120",
            Category::ScienceTech => "EventbriteCategory/102",
            Category::Holiday => "EventbriteCategory/116",
            Category::SportsFitness => "EventbriteCategory/108",
            Category::TravelOutdoor => "EventbriteCategory/109",
            Category::Other => "EventbriteCategory/199",
        }
    }

    /// Path segment used in search page URLs
    pub fn url_slug(self) -> &'static str {
        match self {
            Category::Business => "business",
            Category::FoodDrink => "food-and-drink",
            Category::Health => "health",
            Category::Music => "music",
            Category::AutoBoatAir => "auto-boat-and-air",
            Category::CharityCauses => "charity-and-causes",
            Category::Community => "community",
            Category::FamilyEducation => "family-and-education",
            Category::Fashion => "fashion",
            Category::FilmMedia => "film-and-media",
            Category::Hobbies => "hobbies",
            Category::HomeLifestyle => "home-and-lifestyle",
            Category::PerformingVisualArts => "arts",
            Category::Government => "government",
            Category::Spirituality => "spirituality",
            Category::SchoolActivities => "school-activities",
            Category::ScienceTech => "science-and-tech",
            Category::Holiday => "holiday",
            Category::SportsFitness => "sports-and-fitness",
            Category::TravelOutdoor => "travel-and-outdoor",
            Category::Other => "other",
        }
    }
}

impl FromStr for Category {
    type Err = EventbriteError;

    fn from_str(s: &str) -> Result<Self> {
        Category::ALL
            .iter()
            .copied()
            .find(|c| c.url_slug() == s)
            .ok_or_else(|| EventbriteError::InvalidArgument(format!("unknown category: {}", s)))
    }
}

/// Event format filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventFormat {
    Class,
    Conference,
    Festival,
    Party,
    Appearance,
    Attraction,
    Convention,
    Expo,
    Gala,
    Game,
    Networking,
    Performance,
    Race,
    Rally,
    Retreat,
    Screening,
    Seminar,
    Tournament,
    Tour,
}

impl EventFormat {
    pub const ALL: [EventFormat; 19] = [
        EventFormat::Class,
        EventFormat::Conference,
        EventFormat::Festival,
        EventFormat::Party,
        EventFormat::Appearance,
        EventFormat::Attraction,
        EventFormat::Convention,
        EventFormat::Expo,
        EventFormat::Gala,
        EventFormat::Game,
        EventFormat::Networking,
        EventFormat::Performance,
        EventFormat::Race,
        EventFormat::Rally,
        EventFormat::Retreat,
        EventFormat::Screening,
        EventFormat::Seminar,
        EventFormat::Tournament,
        EventFormat::Tour,
    ];

    /// Tag id sent to the search API
    pub fn api_id(self) -> &'static str {
        match self {
            EventFormat::Class => "EventbriteFormat/9",
            EventFormat::Conference => "EventbriteFormat/1",
            EventFormat::Festival => "EventbriteFormat/5",
            EventFormat::Party => "EventbriteFormat/11",
            EventFormat::Appearance => "EventbriteFormat/19",
            EventFormat::Attraction => "EventbriteFormat/17",
            EventFormat::Convention => "EventbriteFormat/4",
            EventFormat::Expo => "EventbriteFormat/3",
            EventFormat::Gala => "EventbriteFormat/8",
            EventFormat::Game => "EventbriteFormat/14",
            EventFormat::Networking => "EventbriteFormat/10",
            EventFormat::Performance => "EventbriteFormat/6",
            EventFormat::Race => "EventbriteFormat/15",
            EventFormat::Rally => "EventbriteFormat/12",
            EventFormat::Retreat => "EventbriteFormat/18",
            EventFormat::Screening => "EventbriteFormat/7",
            EventFormat::Seminar => "EventbriteFormat/2",
            EventFormat::Tournament => "EventbriteFormat/13",
            EventFormat::Tour => "EventbriteFormat/16",
        }
    }

    /// Path segment used in search page URLs
    pub fn url_slug(self) -> &'static str {
        match self {
            EventFormat::Class => "classes",
            EventFormat::Conference => "conferences",
            EventFormat::Festival => "festivals",
            EventFormat::Party => "parties",
            EventFormat::Appearance => "appearances",
            EventFormat::Attraction => "attractions",
            EventFormat::Convention => "conventions",
            EventFormat::Expo => "expos",
            EventFormat::Gala => "galas",
            EventFormat::Game => "games",
            EventFormat::Networking => "networking",
            EventFormat::Performance => "performances",
            EventFormat::Race => "races",
            EventFormat::Rally => "rallies",
            EventFormat::Retreat => "retreats",
            EventFormat::Screening => "screenings",
            EventFormat::Seminar => "seminars",
            EventFormat::Tournament => "tournaments",
            EventFormat::Tour => "tours",
        }
    }
}

impl FromStr for EventFormat {
    type Err = EventbriteError;

    fn from_str(s: &str) -> Result<Self> {
        EventFormat::ALL
            .iter()
            .copied()
            .find(|f| f.url_slug() == s)
            .ok_or_else(|| EventbriteError::InvalidArgument(format!("unknown event format: {}", s)))
    }
}

/// Price filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Price {
    Paid,
    Free,
}

impl Price {
    pub fn as_str(self) -> &'static str {
        match self {
            Price::Paid => "paid",
            Price::Free => "free",
        }
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One page of search results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedResult<T> {
    /// Items on the current page
    pub items: Vec<T>,
    /// Current page number (1-based)
    pub current_page: u32,
}

impl<T> PaginatedResult<T> {
    /// Create a new paginated result
    pub fn new(items: Vec<T>, current_page: u32) -> Self {
        Self {
            items,
            current_page,
        }
    }
}
