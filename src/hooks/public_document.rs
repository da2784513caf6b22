//! Lookup of a document by its public share token.
//!
//! Runs once per token; there are no live updates.

use super::{Hook, QueryFamily};
use crate::models::DocumentRecord;
use crate::query::{QueryBuilder, QuerySpec};
use crate::store::RemoteStore;
use crate::subscription::{Mode, Phase};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublicDocumentParams {
    pub token: Option<String>,
}

impl PublicDocumentParams {
    pub fn new(token: Option<&str>) -> Self {
        Self {
            token: token.map(str::to_string),
        }
    }
}

pub struct PublicDocument;

impl QueryFamily for PublicDocument {
    type Params = PublicDocumentParams;
    type Entity = DocumentRecord;
    const MODE: Mode = Mode::Oneshot;

    fn build(params: &Self::Params) -> Option<QuerySpec> {
        QueryBuilder::public_document(params.token.as_deref())
    }
}

pub type PublicDocumentHook<S> = Hook<S, PublicDocument>;

impl<S: RemoteStore> Hook<S, PublicDocument> {
    /// The matched document, once found.
    pub fn document(&self) -> Option<DocumentRecord> {
        self.state().data.into_iter().next()
    }

    /// Whether the lookup finished without a match, as opposed to failing.
    pub fn is_not_found(&self) -> bool {
        self.phase() == Phase::NotFound
    }
}
