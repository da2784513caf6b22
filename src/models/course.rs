//! Course entity.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::decode::{Entity, Fields};
use crate::errors::DecodeError;
use crate::store::RawDocument;

/// A course with its teaching staff and enrolment.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructor_id: Option<String>,
    pub enrolled_student_ids: BTreeSet<String>,
    pub teacher_id: String,
}

impl Course {
    pub fn is_enrolled(&self, student_id: &str) -> bool {
        self.enrolled_student_ids.contains(student_id)
    }
}

impl Entity for Course {
    fn decode(doc: &RawDocument) -> Result<Self, DecodeError> {
        let fields = Fields::of(doc);
        Ok(Self {
            id: fields.doc_id(),
            title: fields.string("title")?,
            description: fields.optional_string("description")?,
            instructor_id: fields.optional_string("instructorId")?,
            enrolled_student_ids: fields.string_set("enrolledStudentIds")?,
            teacher_id: fields.string("teacherId")?,
        })
    }
}
