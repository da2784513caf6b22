//! Publicly shared document entity.

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

use super::Timestamp;
use crate::decode::{Entity, Fields};
use crate::errors::DecodeError;
use crate::store::RawDocument;

/// Body of a shared document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentContent {
    /// Rich-text document rendered from HTML
    Doc { html: String },
    /// Any other content kind, kept by name only
    Other { kind: String },
}

impl DocumentContent {
    pub fn kind(&self) -> &str {
        match self {
            DocumentContent::Doc { .. } => "doc",
            DocumentContent::Other { kind } => kind,
        }
    }
}

impl Serialize for DocumentContent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            DocumentContent::Doc { html } => {
                let mut state = serializer.serialize_struct("DocumentContent", 2)?;
                state.serialize_field("kind", "doc")?;
                state.serialize_field("html", html)?;
                state.end()
            }
            DocumentContent::Other { kind } => {
                let mut state = serializer.serialize_struct("DocumentContent", 1)?;
                state.serialize_field("kind", kind)?;
                state.end()
            }
        }
    }
}

/// A document reachable through its public share token.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRecord {
    pub id: String,
    pub title: String,
    pub content: DocumentContent,
    pub public_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Entity for DocumentRecord {
    fn decode(doc: &RawDocument) -> Result<Self, DecodeError> {
        let fields = Fields::of(doc);
        let content = fields.nested("content")?;
        let kind = content.string("kind")?;
        let content = if kind == "doc" {
            DocumentContent::Doc {
                html: content.string("html")?,
            }
        } else {
            DocumentContent::Other { kind }
        };

        Ok(Self {
            id: fields.doc_id(),
            title: fields.string("title")?,
            content,
            public_token: fields.string("publicToken")?,
            file_url: fields.optional_string("fileUrl")?,
            created_at: fields.timestamp("createdAt")?,
            updated_at: fields.timestamp("updatedAt")?,
        })
    }
}
