//! Messages of one conversation, live.

use super::{Hook, QueryFamily};
use crate::models::Message;
use crate::query::{QueryBuilder, QuerySpec};
use crate::subscription::Mode;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageParams {
    pub conversation_id: Option<String>,
    pub limit: Option<usize>,
}

impl MessageParams {
    pub fn new(conversation_id: Option<&str>, limit: Option<usize>) -> Self {
        Self {
            conversation_id: conversation_id.map(str::to_string),
            limit,
        }
    }
}

pub struct Messages;

impl QueryFamily for Messages {
    type Params = MessageParams;
    type Entity = Message;
    const MODE: Mode = Mode::Live;

    fn build(params: &Self::Params) -> Option<QuerySpec> {
        QueryBuilder::messages(params.conversation_id.as_deref(), params.limit)
    }
}

pub type MessagesHook<S> = Hook<S, Messages>;
