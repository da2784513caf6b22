//! Announcement entity.

use serde::Serialize;

use super::Timestamp;
use crate::decode::{Entity, Fields};
use crate::errors::DecodeError;
use crate::store::RawDocument;

/// A broadcast notice shown newest first.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Announcement {
    pub id: String,
    pub created_at: Timestamp,
    pub content: String,
}

impl Entity for Announcement {
    fn decode(doc: &RawDocument) -> Result<Self, DecodeError> {
        let fields = Fields::of(doc);
        Ok(Self {
            id: fields.doc_id(),
            created_at: fields.timestamp("createdAt")?,
            content: fields.string("content")?,
        })
    }
}
