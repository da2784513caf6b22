//! Coercion of timestamp-shaped field values.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde_json::{json, Map, Value};

use crate::models::Timestamp;

/// Key of the server-timestamp placeholder object, `{".sv": "timestamp"}`.
pub const SERVER_VALUE_KEY: &str = ".sv";
const SERVER_VALUE_TIMESTAMP: &str = "timestamp";

/// Build the placeholder a client writes to request a server-assigned instant.
pub fn server_timestamp() -> Value {
    json!({ SERVER_VALUE_KEY: SERVER_VALUE_TIMESTAMP })
}

/// Whether a value is the server-timestamp placeholder.
pub fn is_server_timestamp(value: &Value) -> bool {
    match value {
        Value::Object(map) => {
            map.len() == 1
                && map.get(SERVER_VALUE_KEY).and_then(Value::as_str) == Some(SERVER_VALUE_TIMESTAMP)
        }
        _ => false,
    }
}

/// Coerce a raw field value into a `Timestamp`.
///
/// Accepts `{seconds, nanoseconds}` instant objects (also with leading
/// underscores), RFC 3339 strings, naive ISO date-times (read as UTC), epoch
/// milliseconds, and the server-timestamp placeholder. `null` is pending.
/// Returns `None` for anything else.
pub fn coerce_timestamp(value: &Value) -> Option<Timestamp> {
    match value {
        Value::Null => Some(Timestamp::Pending),
        Value::String(s) => parse_iso(s).map(Timestamp::At),
        Value::Number(n) => n
            .as_i64()
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single())
            .map(Timestamp::At),
        Value::Object(_) if is_server_timestamp(value) => Some(Timestamp::Pending),
        Value::Object(map) => instant_from_parts(map).map(Timestamp::At),
        _ => None,
    }
}

fn parse_iso(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(at) = DateTime::parse_from_rfc3339(s) {
        return Some(at.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

fn instant_from_parts(map: &Map<String, Value>) -> Option<DateTime<Utc>> {
    let seconds = map
        .get("seconds")
        .or_else(|| map.get("_seconds"))
        .and_then(Value::as_i64)?;
    let nanos = match map.get("nanoseconds").or_else(|| map.get("_nanoseconds")) {
        Some(value) => u32::try_from(value.as_u64()?).ok()?,
        None => 0,
    };
    DateTime::from_timestamp(seconds, nanos)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> Timestamp {
        Timestamp::At(DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc))
    }

    #[test]
    fn test_instant_object() {
        let value = json!({ "seconds": 1_700_000_000, "nanoseconds": 500_000_000 });
        assert_eq!(
            coerce_timestamp(&value),
            Some(at("2023-11-14T22:13:20.5Z"))
        );

        let value = json!({ "_seconds": 1_700_000_000, "_nanoseconds": 0 });
        assert_eq!(coerce_timestamp(&value), Some(at("2023-11-14T22:13:20Z")));
    }

    #[test]
    fn test_iso_strings() {
        assert_eq!(
            coerce_timestamp(&json!("2024-02-01T08:30:00+01:00")),
            Some(at("2024-02-01T07:30:00Z"))
        );
        assert_eq!(
            coerce_timestamp(&json!("2024-02-01T08:30:00")),
            Some(at("2024-02-01T08:30:00Z"))
        );
        assert_eq!(coerce_timestamp(&json!("yesterday")), None);
    }

    #[test]
    fn test_epoch_millis() {
        assert_eq!(
            coerce_timestamp(&json!(1_700_000_000_000i64)),
            Some(at("2023-11-14T22:13:20Z"))
        );
    }

    #[test]
    fn test_placeholder_is_pending() {
        assert!(is_server_timestamp(&server_timestamp()));
        assert_eq!(
            coerce_timestamp(&server_timestamp()),
            Some(Timestamp::Pending)
        );
        assert_eq!(coerce_timestamp(&Value::Null), Some(Timestamp::Pending));
    }

    #[test]
    fn test_rejects_other_shapes() {
        assert_eq!(coerce_timestamp(&json!(true)), None);
        assert_eq!(coerce_timestamp(&json!([1, 2])), None);
        assert_eq!(coerce_timestamp(&json!({ "nanoseconds": 3 })), None);
        assert!(!is_server_timestamp(&json!({ ".sv": "increment" })));
    }
}
