//! Canonical instant type shared by all entities.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// A decoded point in time.
///
/// `Pending` is produced for server-assigned timestamps the store has not
/// resolved yet. It orders after every concrete instant and serializes as `null`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(untagged)]
pub enum Timestamp {
    At(DateTime<Utc>),
    Pending,
}

impl Timestamp {
    pub fn instant(&self) -> Option<DateTime<Utc>> {
        match self {
            Timestamp::At(at) => Some(*at),
            Timestamp::Pending => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Timestamp::Pending)
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(at: DateTime<Utc>) -> Self {
        Timestamp::At(at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_pending_sorts_after_instants() {
        let early = Timestamp::At(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        let late = Timestamp::At(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap());
        let mut stamps = vec![Timestamp::Pending, late, early];
        stamps.sort();
        assert_eq!(stamps, vec![early, late, Timestamp::Pending]);
    }

    #[test]
    fn test_serializes_as_iso_string_or_null() {
        let at = Timestamp::At(Utc.with_ymd_and_hms(2024, 3, 5, 12, 0, 0).unwrap());
        assert_eq!(
            serde_json::to_value(at).unwrap(),
            serde_json::json!("2024-03-05T12:00:00Z")
        );
        assert_eq!(
            serde_json::to_value(Timestamp::Pending).unwrap(),
            serde_json::Value::Null
        );
    }
}
