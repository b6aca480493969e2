//! Field access helpers over upstream JSON
//!
//! Paths are dotted (`primary_venue.address.city`). A JSON `null` is treated
//! the same as an absent key.

use chrono::{DateTime, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde_json::Value;

use crate::error::{EventbriteError, Result};

/// Upstream format of UTC timestamps
pub const UTC_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Walk a dotted path, returning `None` on a missing key or a `null`
pub fn lookup<'a>(data: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = data;
    for key in path.split('.') {
        current = current.get(key)?;
    }
    if current.is_null() {
        None
    } else {
        Some(current)
    }
}

/// Like [`lookup`] but fails with `MissingField`
pub fn require<'a>(data: &'a Value, path: &str) -> Result<&'a Value> {
    lookup(data, path).ok_or_else(|| EventbriteError::MissingField(path.to_string()))
}

/// Render a string or number as text
pub fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub fn opt_string(data: &Value, path: &str) -> Option<String> {
    lookup(data, path).and_then(value_to_string)
}

pub fn require_string(data: &Value, path: &str) -> Result<String> {
    value_to_string(require(data, path)?)
        .ok_or_else(|| EventbriteError::MissingField(format!("{} (expected text)", path)))
}

pub fn opt_bool(data: &Value, path: &str) -> Option<bool> {
    lookup(data, path).and_then(Value::as_bool)
}

pub fn require_bool(data: &Value, path: &str) -> Result<bool> {
    require(data, path)?
        .as_bool()
        .ok_or_else(|| EventbriteError::MissingField(format!("{} (expected boolean)", path)))
}

/// Coerce a JSON number or numeric string to `f64`
pub fn value_to_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub fn require_f64(data: &Value, path: &str) -> Result<f64> {
    value_to_f64(require(data, path)?)
        .ok_or_else(|| EventbriteError::MissingField(format!("{} (expected number)", path)))
}

/// Return the first non-empty value among `keys`, tried in order.
///
/// Empty strings count as absent. Fails with `MissingField` naming every
/// candidate when none of them is usable.
///
/// # Example
/// ```
/// use eventbrite_core::parser::fields::first_present;
/// use serde_json::json;
///
/// let data = json!({"id": "", "eventbrite_event_id": 77});
/// let id = first_present(&data, &["id", "eventbrite_event_id", "eid"]).unwrap();
/// assert_eq!(id, "77");
/// ```
pub fn first_present(data: &Value, keys: &[&str]) -> Result<String> {
    keys.iter()
        .filter_map(|key| opt_string(data, key))
        .find(|value| !value.is_empty())
        .ok_or_else(|| EventbriteError::MissingField(keys.join(" | ")))
}

/// Parse a `YYYY-MM-DDTHH:MM:SSZ` timestamp
pub fn parse_utc_timestamp(value: &str) -> Result<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value, UTC_TIMESTAMP_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|e| EventbriteError::Parse {
            message: format!("invalid UTC timestamp: {}", e),
            raw: value.to_string(),
        })
}

pub fn require_utc_timestamp(data: &Value, path: &str) -> Result<DateTime<Utc>> {
    parse_utc_timestamp(&require_string(data, path)?)
}

/// Resolve an IANA zone name
pub fn parse_timezone(name: &str) -> Result<Tz> {
    name.parse::<Tz>()
        .map_err(|_| EventbriteError::InvalidTimezone(name.to_string()))
}

/// Combine a local date (`YYYY-MM-DD`) and time (`HH:MM`) declared in `tz`
/// and convert the result to UTC.
///
/// Ambiguous local times (clocks going back) resolve to the standard-time
/// instant. Local times inside a gap (clocks going forward) are read with
/// the offset in force before the gap.
pub fn localize(date: &str, time: &str, tz: Tz) -> Result<DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|e| EventbriteError::Parse {
        message: format!("invalid local date: {}", e),
        raw: date.to_string(),
    })?;
    let time = NaiveTime::parse_from_str(time, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(time, "%H:%M:%S"))
        .map_err(|e| EventbriteError::Parse {
            message: format!("invalid local time: {}", e),
            raw: time.to_string(),
        })?;
    let naive = NaiveDateTime::new(date, time);

    let local = match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => dt,
        LocalResult::Ambiguous(_, standard) => standard,
        LocalResult::None => {
            let before_gap = naive - chrono::Duration::hours(1);
            let shifted = tz
                .from_local_datetime(&before_gap)
                .latest()
                .ok_or_else(|| EventbriteError::Parse {
                    message: format!("local time does not exist in {}", tz.name()),
                    raw: naive.to_string(),
                })?;
            shifted + chrono::Duration::hours(1)
        }
    };

    Ok(local.with_timezone(&Utc))
}
