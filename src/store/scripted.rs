//! A store driven by hand.
//!
//! `ScriptedStore` records every query it is asked to open or fetch and only
//! emits events when told to. It is what the subscription layer is tested
//! against, and it lets embedders drive hooks without a network.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::oneshot;

use super::{EventSink, RawDocument, RemoteStore, SubscriptionHandle};
use crate::errors::SyncError;
use crate::query::QuerySpec;

type FetchResult = Result<Vec<RawDocument>, SyncError>;

struct OpenedQuery {
    spec: QuerySpec,
    sink: EventSink,
    close_calls: usize,
}

struct PendingFetch {
    spec: QuerySpec,
    responder: Option<oneshot::Sender<FetchResult>>,
}

#[derive(Default)]
struct ScriptedState {
    next_handle: u64,
    queries: BTreeMap<SubscriptionHandle, OpenedQuery>,
    fetches: Vec<PendingFetch>,
}

/// In-memory store whose events are pushed explicitly.
#[derive(Default)]
pub struct ScriptedStore {
    state: Mutex<ScriptedState>,
}

impl ScriptedStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every live query opened so far, in opening order.
    pub fn opened(&self) -> Vec<(SubscriptionHandle, QuerySpec)> {
        self.lock()
            .queries
            .iter()
            .map(|(handle, query)| (*handle, query.spec.clone()))
            .collect()
    }

    pub fn open_count(&self) -> usize {
        self.lock().queries.len()
    }

    pub fn last_handle(&self) -> Option<SubscriptionHandle> {
        self.lock().queries.keys().next_back().copied()
    }

    /// How many times `close` was called for `handle`.
    pub fn close_calls(&self, handle: SubscriptionHandle) -> usize {
        self.lock()
            .queries
            .get(&handle)
            .map(|query| query.close_calls)
            .unwrap_or(0)
    }

    /// Handles opened and not yet closed.
    pub fn active_handles(&self) -> Vec<SubscriptionHandle> {
        self.lock()
            .queries
            .iter()
            .filter(|(_, query)| query.close_calls == 0)
            .map(|(handle, _)| *handle)
            .collect()
    }

    /// Deliver a snapshot on `handle`, even if it was closed, the way a late
    /// network callback would.
    pub fn push_snapshot(&self, handle: SubscriptionHandle, docs: Vec<RawDocument>) -> bool {
        match self.lock().queries.get(&handle) {
            Some(query) => query.sink.snapshot(docs),
            None => false,
        }
    }

    /// Deliver a terminal error on `handle`.
    pub fn push_error(&self, handle: SubscriptionHandle, message: &str) -> bool {
        match self.lock().queries.get(&handle) {
            Some(query) => query.sink.error(message),
            None => false,
        }
    }

    /// Specs of every one-shot fetch requested so far.
    pub fn fetches(&self) -> Vec<QuerySpec> {
        self.lock()
            .fetches
            .iter()
            .map(|fetch| fetch.spec.clone())
            .collect()
    }

    /// Answer the `index`-th fetch. Returns `false` if it was already answered
    /// or its caller went away.
    pub fn resolve_fetch(&self, index: usize, result: FetchResult) -> bool {
        let responder = self
            .lock()
            .fetches
            .get_mut(index)
            .and_then(|fetch| fetch.responder.take());
        match responder {
            Some(responder) => responder.send(result).is_ok(),
            None => false,
        }
    }

    fn lock(&self) -> MutexGuard<'_, ScriptedState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl RemoteStore for ScriptedStore {
    fn open_query(&self, spec: &QuerySpec, sink: EventSink) -> SubscriptionHandle {
        let mut state = self.lock();
        state.next_handle += 1;
        let handle = SubscriptionHandle(state.next_handle);
        state.queries.insert(
            handle,
            OpenedQuery {
                spec: spec.clone(),
                sink,
                close_calls: 0,
            },
        );
        tracing::debug!(%handle, collection = %spec.collection, "Scripted query opened");
        handle
    }

    fn close(&self, handle: SubscriptionHandle) {
        if let Some(query) = self.lock().queries.get_mut(&handle) {
            query.close_calls += 1;
        }
    }

    fn fetch_once(&self, spec: &QuerySpec) -> impl Future<Output = FetchResult> + Send {
        let (tx, rx) = oneshot::channel();
        self.lock().fetches.push(PendingFetch {
            spec: spec.clone(),
            responder: Some(tx),
        });
        async move {
            rx.await
                .unwrap_or_else(|_| Err(SyncError::Stream("Fetch abandoned".to_string())))
        }
    }
}
