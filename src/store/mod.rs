//! Remote document store contract.
//!
//! A store answers live queries by pushing events into an `EventSink`, and
//! one-shot queries by resolving a future. Sinks are stamped with the
//! generation of the controller that opened them so stale events can be told
//! apart from current ones.

mod scripted;
mod sqlite;

pub use scripted::*;
pub use sqlite::*;

use std::future::Future;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::mpsc;

use crate::errors::SyncError;
use crate::query::QuerySpec;

/// An opaque remote record: identifier plus unstructured fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDocument {
    pub id: String,
    pub fields: Map<String, Value>,
}

impl RawDocument {
    pub fn new(id: impl Into<String>, fields: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    /// Build a document from a JSON object.
    pub fn from_value(id: impl Into<String>, value: Value) -> Result<Self, SyncError> {
        match value {
            Value::Object(fields) => Ok(Self::new(id, fields)),
            other => Err(SyncError::BadRequest(format!(
                "Document fields must be a JSON object, got {}",
                other
            ))),
        }
    }
}

/// Identifies one live subscription inside a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionHandle(pub u64);

impl std::fmt::Display for SubscriptionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    /// A full result set; repeatable
    Snapshot(Vec<RawDocument>),
    /// Terminal failure of the subscription
    Error(String),
}

/// An event tagged with the generation it was produced for.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreEvent {
    pub generation: u64,
    pub kind: EventKind,
}

/// Where a store delivers the events of one subscription.
#[derive(Debug, Clone)]
pub struct EventSink {
    generation: u64,
    tx: mpsc::UnboundedSender<StoreEvent>,
}

impl EventSink {
    pub fn new(generation: u64, tx: mpsc::UnboundedSender<StoreEvent>) -> Self {
        Self { generation, tx }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Push a snapshot. Returns `false` once nobody is listening.
    pub fn snapshot(&self, docs: Vec<RawDocument>) -> bool {
        self.send(EventKind::Snapshot(docs))
    }

    /// Push a terminal error. Returns `false` once nobody is listening.
    pub fn error(&self, message: impl Into<String>) -> bool {
        self.send(EventKind::Error(message.into()))
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    fn send(&self, kind: EventKind) -> bool {
        self.tx
            .send(StoreEvent {
                generation: self.generation,
                kind,
            })
            .is_ok()
    }
}

/// The remote document store consumed by subscription controllers.
pub trait RemoteStore: Send + Sync + 'static {
    /// Start a live query. Events for it are pushed into `sink` until closed.
    fn open_query(&self, spec: &QuerySpec, sink: EventSink) -> SubscriptionHandle;

    /// Release a live query. Closing an unknown or already closed handle is a no-op.
    fn close(&self, handle: SubscriptionHandle);

    /// Run a query once without live updates.
    fn fetch_once(
        &self,
        spec: &QuerySpec,
    ) -> impl Future<Output = Result<Vec<RawDocument>, SyncError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_value_requires_object() {
        let doc = RawDocument::from_value("d1", json!({ "title": "x" })).unwrap();
        assert_eq!(doc.fields["title"], "x");

        let err = RawDocument::from_value("d2", json!([1, 2])).unwrap_err();
        assert!(matches!(err, SyncError::BadRequest(_)));
    }

    #[test]
    fn test_sink_tags_events_with_generation() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = EventSink::new(7, tx);

        assert!(sink.snapshot(Vec::new()));
        assert!(sink.error("permission-denied"));

        assert_eq!(
            rx.try_recv().unwrap(),
            StoreEvent {
                generation: 7,
                kind: EventKind::Snapshot(Vec::new())
            }
        );
        assert_eq!(
            rx.try_recv().unwrap().kind,
            EventKind::Error("permission-denied".to_string())
        );

        drop(rx);
        assert!(sink.is_closed());
        assert!(!sink.snapshot(Vec::new()));
    }
}
