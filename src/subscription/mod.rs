//! Lifecycle of one query against the remote store.
//!
//! A `SubscriptionController` is created for exactly one generation of query
//! parameters and is never reused: when parameters change, the owner closes it
//! and opens a new one. Every event carries the generation it was produced
//! for, and the controller ignores events that are not its own or that arrive
//! after it was closed.
//!
//! ```text
//! live:     Idle | Opening -> Active <-> Active ... -> Erroring -> Closed
//! one-shot: Idle | Opening -> Found | NotFound | Erroring        -> Closed
//! ```

use std::sync::Arc;

use serde::Serialize;
use tokio::task::JoinHandle;

use crate::decode::{decode_snapshot, Entity};
use crate::errors::{DecodeError, DOCUMENT_NOT_FOUND};
use crate::query::QuerySpec;
use crate::store::{
    EventKind, EventSink, RawDocument, RemoteStore, StoreEvent, SubscriptionHandle,
};

/// Whether a query stays open for pushed updates or runs once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Live,
    Oneshot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    /// No valid query; nothing requested
    Idle,
    /// Query requested, no result yet
    Opening,
    /// At least one snapshot applied
    Active,
    /// The stream failed; previous data retained
    Erroring,
    /// One-shot lookup matched a document
    Found,
    /// One-shot lookup matched nothing
    NotFound,
    /// Torn down; terminal
    Closed,
}

/// Caller-visible state of a hook.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HookState<T> {
    pub data: Vec<T>,
    pub loading: bool,
    pub error: Option<String>,
}

impl<T> HookState<T> {
    pub fn idle() -> Self {
        Self {
            data: Vec::new(),
            loading: false,
            error: None,
        }
    }

    pub fn opening() -> Self {
        Self {
            data: Vec::new(),
            loading: true,
            error: None,
        }
    }
}

/// Owns one remote query and folds its events into a `HookState`.
pub struct SubscriptionController<S: RemoteStore, T: Entity> {
    store: Arc<S>,
    generation: u64,
    mode: Mode,
    spec: Option<QuerySpec>,
    phase: Phase,
    handle: Option<SubscriptionHandle>,
    lookup: Option<JoinHandle<()>>,
    state: HookState<T>,
}

impl<S: RemoteStore, T: Entity> SubscriptionController<S, T> {
    /// Create the controller for `spec` and, if there is one, request it.
    ///
    /// A one-shot lookup is spawned onto the current Tokio runtime; without one
    /// the controller starts out `Erroring`.
    pub fn open(store: Arc<S>, mode: Mode, spec: Option<QuerySpec>, sink: EventSink) -> Self {
        let generation = sink.generation();
        let mut controller = Self {
            store,
            generation,
            mode,
            spec: None,
            phase: Phase::Idle,
            handle: None,
            lookup: None,
            state: HookState::idle(),
        };

        let Some(spec) = spec else {
            tracing::debug!(generation, "No query to open; staying idle");
            return controller;
        };

        match mode {
            Mode::Live => {
                let handle = controller.store.open_query(&spec, sink);
                tracing::debug!(
                    generation,
                    %handle,
                    collection = %spec.collection,
                    "Subscription opening"
                );
                controller.handle = Some(handle);
            }
            Mode::Oneshot => {
                let Ok(runtime) = tokio::runtime::Handle::try_current() else {
                    tracing::error!(generation, "One-shot lookup outside a Tokio runtime");
                    controller.spec = Some(spec);
                    controller.phase = Phase::Erroring;
                    controller.state.error =
                        Some("Lookup requires a running Tokio runtime".to_string());
                    return controller;
                };
                let store = controller.store.clone();
                let request = spec.clone();
                controller.lookup = Some(runtime.spawn(async move {
                    match store.fetch_once(&request).await {
                        Ok(docs) => sink.snapshot(docs),
                        Err(err) => sink.error(err.message()),
                    };
                }));
                tracing::debug!(generation, collection = %spec.collection, "Lookup started");
            }
        }

        controller.spec = Some(spec);
        controller.phase = Phase::Opening;
        controller.state = HookState::opening();
        controller
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn spec(&self) -> Option<&QuerySpec> {
        self.spec.as_ref()
    }

    pub fn state(&self) -> &HookState<T> {
        &self.state
    }

    pub fn is_closed(&self) -> bool {
        self.phase == Phase::Closed
    }

    /// Apply one store event. Returns whether the visible state changed.
    pub fn handle_event(&mut self, event: StoreEvent) -> bool {
        if self.is_closed() {
            tracing::debug!(
                generation = event.generation,
                "Dropping event for closed subscription"
            );
            return false;
        }
        if event.generation != self.generation {
            tracing::debug!(
                generation = event.generation,
                current = self.generation,
                "Dropping stale event"
            );
            return false;
        }

        match (self.phase, event.kind) {
            (Phase::Opening | Phase::Active, EventKind::Snapshot(docs))
                if self.mode == Mode::Live =>
            {
                self.state = HookState {
                    data: self.decode(&docs).0,
                    loading: false,
                    error: None,
                };
                self.phase = Phase::Active;
                true
            }
            (Phase::Opening, EventKind::Snapshot(docs)) => {
                let (data, rejected) = self.decode(&docs);
                match (data.is_empty(), rejected.first()) {
                    (false, _) => {
                        self.phase = Phase::Found;
                        self.state = HookState {
                            data,
                            loading: false,
                            error: None,
                        };
                    }
                    (true, Some(err)) => {
                        self.phase = Phase::Erroring;
                        self.state = HookState {
                            data,
                            loading: false,
                            error: Some(err.to_string()),
                        };
                    }
                    (true, None) => {
                        self.phase = Phase::NotFound;
                        self.state = HookState {
                            data,
                            loading: false,
                            error: Some(DOCUMENT_NOT_FOUND.to_string()),
                        };
                    }
                }
                true
            }
            (Phase::Opening | Phase::Active, EventKind::Error(message)) => {
                tracing::warn!(generation = self.generation, "Subscription failed: {}", message);
                self.phase = Phase::Erroring;
                self.state.loading = false;
                self.state.error = Some(message);
                true
            }
            (phase, _) => {
                tracing::debug!(
                    generation = self.generation,
                    ?phase,
                    "Ignoring event after terminal result"
                );
                false
            }
        }
    }

    /// Release the remote query. Idempotent; nothing changes state afterwards.
    pub fn close(&mut self) {
        if self.is_closed() {
            return;
        }
        if let Some(handle) = self.handle.take() {
            self.store.close(handle);
            tracing::debug!(generation = self.generation, %handle, "Subscription closed");
        }
        if let Some(lookup) = self.lookup.take() {
            lookup.abort();
        }
        self.phase = Phase::Closed;
    }

    fn decode(&self, docs: &[RawDocument]) -> (Vec<T>, Vec<DecodeError>) {
        let decoded = decode_snapshot::<T>(docs);
        for rejected in &decoded.rejected {
            tracing::warn!(generation = self.generation, "Skipping document: {}", rejected);
        }

        let mut data = decoded.entities;
        if let Some(limit) = self.spec.as_ref().and_then(|spec| spec.limit) {
            data.truncate(limit);
        }
        (data, decoded.rejected)
    }
}

impl<S: RemoteStore, T: Entity> Drop for SubscriptionController<S, T> {
    fn drop(&mut self) {
        self.close();
    }
}
