//! Chat message entity.

use serde::Serialize;

use super::Timestamp;
use crate::decode::{Entity, Fields};
use crate::errors::DecodeError;
use crate::store::RawDocument;

/// Who authored a message, relative to the viewing user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SenderRole {
    User,
    Peer,
}

impl SenderRole {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(SenderRole::User),
            "peer" => Some(SenderRole::Peer),
            _ => None,
        }
    }
}

/// Delivery state of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadStatus {
    #[default]
    Sent,
    Read,
}

impl ReadStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "sent" => Some(ReadStatus::Sent),
            "read" => Some(ReadStatus::Read),
            _ => None,
        }
    }
}

/// One message in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub sender_id: String,
    pub sender_role: SenderRole,
    pub content: String,
    pub created_at: Timestamp,
    pub read_status: ReadStatus,
}

impl Entity for Message {
    fn decode(doc: &RawDocument) -> Result<Self, DecodeError> {
        let fields = Fields::of(doc);
        let sender_role = fields.string("senderRole")?;
        let read_status = fields.optional_string("readStatus")?;

        Ok(Self {
            id: fields.doc_id(),
            sender_id: fields.string("senderId")?,
            sender_role: SenderRole::parse(&sender_role)
                .ok_or_else(|| fields.wrong_type("senderRole"))?,
            content: fields.string("content")?,
            created_at: fields.timestamp("createdAt")?,
            read_status: match read_status {
                Some(status) => {
                    ReadStatus::parse(&status).ok_or_else(|| fields.wrong_type("readStatus"))?
                }
                None => ReadStatus::default(),
            },
        })
    }
}
