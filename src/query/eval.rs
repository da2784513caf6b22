//! In-process evaluation of a `QuerySpec` against raw documents.
//!
//! Stores that cannot push predicates down use this to answer queries. Ordering
//! follows document-store conventions: documents lacking the order field are
//! excluded, and values of different types order by type rank.

use std::cmp::Ordering;

use serde_json::Value;

use super::{Direction, Filter, FilterOp, QuerySpec};
use crate::decode::coerce_timestamp;
use crate::models::Timestamp;
use crate::store::RawDocument;

impl Filter {
    pub fn matches(&self, doc: &RawDocument) -> bool {
        let Some(actual) = doc.fields.get(&self.field) else {
            return false;
        };
        match self.op {
            FilterOp::Eq => actual == &self.value,
            FilterOp::ArrayContains => actual
                .as_array()
                .is_some_and(|items| items.contains(&self.value)),
        }
    }
}

impl QuerySpec {
    /// Whether a document satisfies every filter.
    pub fn matches(&self, doc: &RawDocument) -> bool {
        self.filters.iter().all(|filter| filter.matches(doc))
    }

    /// Filter, order and limit a collection's documents.
    pub fn apply(&self, docs: Vec<RawDocument>) -> Vec<RawDocument> {
        let mut selected: Vec<RawDocument> =
            docs.into_iter().filter(|doc| self.matches(doc)).collect();

        if let Some(order) = &self.order_by {
            selected.retain(|doc| doc.fields.contains_key(&order.field));
            selected.sort_by(|a, b| {
                let ordering = compare(&a.fields[&order.field], &b.fields[&order.field]);
                match order.direction {
                    Direction::Asc => ordering,
                    Direction::Desc => ordering.reverse(),
                }
            });
        }

        if let Some(limit) = self.limit {
            selected.truncate(limit);
        }
        selected
    }
}

#[derive(PartialEq, PartialOrd)]
enum SortKey<'a> {
    Null,
    Bool(bool),
    Number(f64),
    Time(Timestamp),
    Text(&'a str),
    Other,
}

/// Timestamp-shaped values rank as instants whatever their JSON type, so epoch
/// millis, ISO strings and pending placeholders order together.
fn sort_key(value: &Value) -> SortKey<'_> {
    if let Some(at) = coerce_timestamp(value) {
        return SortKey::Time(at);
    }
    match value {
        Value::Null => SortKey::Null,
        Value::Bool(b) => SortKey::Bool(*b),
        Value::Number(n) => n.as_f64().map(SortKey::Number).unwrap_or(SortKey::Other),
        Value::String(s) => SortKey::Text(s),
        Value::Object(_) | Value::Array(_) => SortKey::Other,
    }
}

fn compare(a: &Value, b: &Value) -> Ordering {
    sort_key(a)
        .partial_cmp(&sort_key(b))
        .unwrap_or(Ordering::Equal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use crate::query::QueryBuilder;
    use serde_json::json;

    fn doc(id: &str, fields: Value) -> RawDocument {
        RawDocument::from_value(id, fields).unwrap()
    }

    fn ids(docs: &[RawDocument]) -> Vec<&str> {
        docs.iter().map(|d| d.id.as_str()).collect()
    }

    #[test]
    fn test_array_contains_and_eq() {
        let docs = vec![
            doc("c1", json!({ "teacherId": "t1", "enrolledStudentIds": ["s1", "s2"] })),
            doc("c2", json!({ "teacherId": "t2", "enrolledStudentIds": ["s3"] })),
            doc("c3", json!({ "teacherId": "t1" })),
        ];

        let student = QueryBuilder::courses(Some("s1"), Some(Role::Student)).unwrap();
        assert_eq!(ids(&student.apply(docs.clone())), vec!["c1"]);

        let teacher = QueryBuilder::courses(Some("t1"), Some(Role::Teacher)).unwrap();
        assert_eq!(ids(&teacher.apply(docs)), vec!["c1", "c3"]);
    }

    #[test]
    fn test_order_mixed_timestamp_shapes_and_limit() {
        let docs = vec![
            doc("old", json!({ "createdAt": "2024-01-01T00:00:00Z" })),
            doc("new", json!({ "createdAt": { "seconds": 1_750_000_000, "nanoseconds": 0 } })),
            doc("mid", json!({ "createdAt": "2024-03-09T00:00:00+02:00" })),
            doc("undated", json!({ "content": "x" })),
        ];

        let spec = QueryBuilder::announcements(2);
        assert_eq!(ids(&spec.apply(docs)), vec!["new", "mid"]);
    }

    #[test]
    fn test_epoch_millis_and_pending_order_as_instants() {
        let docs = vec![
            doc("iso2024", json!({ "createdAt": "2024-01-01T00:00:00Z" })),
            doc("millis2030", json!({ "createdAt": 1_900_000_000_000_i64 })),
        ];
        let newest = QueryBuilder::announcements(1);
        assert_eq!(ids(&newest.apply(docs)), vec!["millis2030"]);

        let docs = vec![
            doc("nullts", json!({ "createdAt": null })),
            doc("iso", json!({ "createdAt": "2024-01-01T00:00:00Z" })),
            doc("millis", json!({ "createdAt": 1_600_000_000_000_i64 })),
            doc("sv", json!({ "createdAt": { ".sv": "timestamp" } })),
        ];
        let ascending =
            QuerySpec::collection("announcements").order_by("createdAt", Direction::Asc);
        let ordered = ascending.apply(docs);
        assert_eq!(ids(&ordered[..2]), vec!["millis", "iso"]);
        let mut pending = ids(&ordered[2..]);
        pending.sort();
        assert_eq!(pending, vec!["nullts", "sv"]);
    }

    #[test]
    fn test_ascending_messages_for_one_conversation() {
        let docs = vec![
            doc("m2", json!({ "conversationId": "c1", "createdAt": "2024-05-01T10:01:00Z" })),
            doc("m1", json!({ "conversationId": "c1", "createdAt": "2024-05-01T10:00:00Z" })),
            doc("x1", json!({ "conversationId": "c2", "createdAt": "2024-05-01T09:00:00Z" })),
        ];

        let spec = QueryBuilder::messages(Some("c1"), None).unwrap();
        assert_eq!(ids(&spec.apply(docs)), vec!["m1", "m2"]);
    }
}
