//! Snapshot decoding.
//!
//! Raw documents are duck-typed field maps. This module is the only place that
//! reads them: everything past `decode_snapshot` works with typed entities.
//! A malformed document is rejected on its own and never blanks the rest of
//! the snapshot.

mod timestamp;

pub use timestamp::*;

use std::collections::BTreeSet;
use std::fmt::Debug;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::errors::DecodeError;
use crate::models::Timestamp;
use crate::store::RawDocument;

/// A typed record that can be materialized from a raw document.
pub trait Entity: Clone + Debug + Serialize + Send + Sync + 'static {
    fn decode(doc: &RawDocument) -> Result<Self, DecodeError>;
}

/// Outcome of decoding one snapshot.
#[derive(Debug, Clone)]
pub struct Decoded<T> {
    /// Successfully decoded entities, in snapshot order
    pub entities: Vec<T>,
    /// Documents that were excluded
    pub rejected: Vec<DecodeError>,
}

/// Decode every document of a snapshot, isolating per-document failures.
pub fn decode_snapshot<T: Entity>(docs: &[RawDocument]) -> Decoded<T> {
    let mut entities = Vec::with_capacity(docs.len());
    let mut rejected = Vec::new();

    for doc in docs {
        match T::decode(doc) {
            Ok(entity) => entities.push(entity),
            Err(err) => rejected.push(err),
        }
    }

    Decoded { entities, rejected }
}

/// Typed read access to a document's field map.
#[derive(Debug, Clone, Copy)]
pub struct Fields<'a> {
    doc_id: &'a str,
    scope: Option<&'a str>,
    map: &'a Map<String, Value>,
}

impl<'a> Fields<'a> {
    pub fn of(doc: &'a RawDocument) -> Self {
        Self {
            doc_id: &doc.id,
            scope: None,
            map: &doc.fields,
        }
    }

    pub fn doc_id(&self) -> String {
        self.doc_id.to_string()
    }

    /// Required string field.
    pub fn string(&self, field: &str) -> Result<String, DecodeError> {
        match self.present(field) {
            Some(Value::String(s)) => Ok(s.clone()),
            Some(_) => Err(self.wrong_type(field)),
            None => Err(self.missing(field)),
        }
    }

    /// Optional string field; absent and `null` both decode to `None`.
    pub fn optional_string(&self, field: &str) -> Result<Option<String>, DecodeError> {
        match self.present(field) {
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(_) => Err(self.wrong_type(field)),
            None => Ok(None),
        }
    }

    /// Array of strings read as a set; an absent field is the empty set.
    pub fn string_set(&self, field: &str) -> Result<BTreeSet<String>, DecodeError> {
        match self.present(field) {
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| self.wrong_type(field))
                })
                .collect(),
            Some(_) => Err(self.wrong_type(field)),
            None => Ok(BTreeSet::new()),
        }
    }

    /// Required timestamp field. An explicit `null` counts as pending.
    pub fn timestamp(&self, field: &str) -> Result<Timestamp, DecodeError> {
        let value = self.map.get(field).ok_or_else(|| self.missing(field))?;
        coerce_timestamp(value).ok_or_else(|| self.wrong_type(field))
    }

    /// Required nested object, read with the same document id.
    pub fn nested(&self, field: &'a str) -> Result<Fields<'a>, DecodeError> {
        match self.present(field) {
            Some(Value::Object(map)) => Ok(Fields {
                doc_id: self.doc_id,
                scope: Some(field),
                map,
            }),
            Some(_) => Err(self.wrong_type(field)),
            None => Err(self.missing(field)),
        }
    }

    pub fn missing(&self, field: &str) -> DecodeError {
        DecodeError::missing(self.doc_id, &self.path(field))
    }

    pub fn wrong_type(&self, field: &str) -> DecodeError {
        DecodeError::wrong_type(self.doc_id, &self.path(field))
    }

    fn present(&self, field: &str) -> Option<&'a Value> {
        self.map.get(field).filter(|value| !value.is_null())
    }

    fn path(&self, field: &str) -> String {
        match self.scope {
            Some(scope) => format!("{}.{}", scope, field),
            None => field.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::DecodeErrorKind;
    use crate::models::{
        Announcement, Course, DocumentContent, DocumentRecord, Message, ReadStatus, SenderRole,
    };
    use serde_json::json;

    fn doc(id: &str, fields: Value) -> RawDocument {
        RawDocument::from_value(id, fields).unwrap()
    }

    #[test]
    fn test_one_malformed_document_is_isolated() {
        let docs = vec![
            doc("a1", json!({ "content": "Welcome", "createdAt": "2024-09-01T08:00:00Z" })),
            doc("a2", json!({ "createdAt": "2024-09-02T08:00:00Z" })),
            doc("a3", json!({ "content": "Exams", "createdAt": "2024-09-03T08:00:00Z" })),
        ];

        let decoded = decode_snapshot::<Announcement>(&docs);

        assert_eq!(decoded.entities.len(), 2);
        assert_eq!(decoded.entities[0].id, "a1");
        assert_eq!(decoded.entities[1].id, "a3");
        assert_eq!(decoded.rejected, vec![DecodeError::missing("a2", "content")]);
    }

    #[test]
    fn test_all_malformed_yields_empty_without_failing() {
        let docs = vec![
            doc("x", json!({ "content": 42, "createdAt": "2024-09-01T08:00:00Z" })),
            doc("y", json!({ "content": "No date" })),
        ];
        let decoded = decode_snapshot::<Announcement>(&docs);
        assert!(decoded.entities.is_empty());
        assert_eq!(decoded.rejected[0].kind, DecodeErrorKind::WrongType);
        assert_eq!(decoded.rejected[0].field, "content");
        assert_eq!(decoded.rejected[1], DecodeError::missing("y", "createdAt"));
    }

    #[test]
    fn test_pending_timestamp_does_not_fail() {
        let docs = vec![doc(
            "a1",
            json!({ "content": "Just posted", "createdAt": server_timestamp() }),
        )];
        let decoded = decode_snapshot::<Announcement>(&docs);
        assert!(decoded.rejected.is_empty());
        assert!(decoded.entities[0].created_at.is_pending());
    }

    #[test]
    fn test_course_enrolment_set() {
        let course = Course::decode(&doc(
            "c1",
            json!({
                "title": "Algebra",
                "teacherId": "t1",
                "enrolledStudentIds": ["s2", "s1", "s2"]
            }),
        ))
        .unwrap();

        assert_eq!(course.enrolled_student_ids.len(), 2);
        assert!(course.is_enrolled("s1"));
        assert_eq!(course.description, None);

        let err = Course::decode(&doc(
            "c2",
            json!({ "title": "Biology", "teacherId": "t1", "enrolledStudentIds": [1] }),
        ))
        .unwrap_err();
        assert_eq!(err, DecodeError::wrong_type("c2", "enrolledStudentIds"));
    }

    #[test]
    fn test_message_enums() {
        let message = Message::decode(&doc(
            "m1",
            json!({
                "senderId": "u1",
                "senderRole": "peer",
                "content": "hi",
                "createdAt": { "seconds": 1_700_000_000, "nanoseconds": 0 }
            }),
        ))
        .unwrap();
        assert_eq!(message.sender_role, SenderRole::Peer);
        assert_eq!(message.read_status, ReadStatus::Sent);

        let err = Message::decode(&doc(
            "m2",
            json!({
                "senderId": "u1",
                "senderRole": "robot",
                "content": "hi",
                "createdAt": "2024-01-01T00:00:00Z"
            }),
        ))
        .unwrap_err();
        assert_eq!(err, DecodeError::wrong_type("m2", "senderRole"));
    }

    #[test]
    fn test_document_content_variants() {
        let record = DocumentRecord::decode(&doc(
            "d1",
            json!({
                "title": "Syllabus",
                "content": { "kind": "doc", "html": "<p>Week 1</p>" },
                "publicToken": "abc123",
                "createdAt": "2024-01-01T00:00:00Z",
                "updatedAt": "2024-01-02T00:00:00Z"
            }),
        ))
        .unwrap();
        assert_eq!(
            record.content,
            DocumentContent::Doc {
                html: "<p>Week 1</p>".to_string()
            }
        );
        assert_eq!(record.file_url, None);

        let record = DocumentRecord::decode(&doc(
            "d2",
            json!({
                "title": "Slides",
                "content": { "kind": "pdf" },
                "publicToken": "def456",
                "fileUrl": "https://files.example/slides.pdf",
                "createdAt": "2024-01-01T00:00:00Z",
                "updatedAt": "2024-01-02T00:00:00Z"
            }),
        ))
        .unwrap();
        assert_eq!(record.content.kind(), "pdf");

        let err = DocumentRecord::decode(&doc(
            "d3",
            json!({
                "title": "Broken",
                "content": { "kind": "doc" },
                "publicToken": "x",
                "createdAt": "2024-01-01T00:00:00Z",
                "updatedAt": "2024-01-02T00:00:00Z"
            }),
        ))
        .unwrap_err();
        assert_eq!(err, DecodeError::missing("d3", "content.html"));
    }
}
