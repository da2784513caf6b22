//! Hook adapters.
//!
//! A `Hook` binds one query family to a store and exposes the family's
//! `{data, loading, error}` state. Changing parameters (compared by value)
//! closes the current controller and opens a new one under a fresh
//! generation, so at most one controller is ever live per hook.
//!
//! All store events funnel through one channel and are applied on the task
//! that owns the hook, one at a time.

mod announcements;
mod courses;
mod messages;
mod public_document;

pub use announcements::*;
pub use courses::*;
pub use messages::*;
pub use public_document::*;

use std::fmt::Debug;
use std::marker::PhantomData;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use crate::decode::Entity;
use crate::query::QuerySpec;
use crate::store::{EventSink, RemoteStore, StoreEvent};
use crate::subscription::{HookState, Mode, Phase, SubscriptionController};

/// Announcements shown when the caller does not ask for a specific count.
pub const DEFAULT_MAX_RESULTS: usize = 10;

/// One kind of query a hook can run.
pub trait QueryFamily: Send + 'static {
    /// Inputs that participate in building the query.
    type Params: Clone + PartialEq + Debug + Send + Sync + 'static;
    type Entity: Entity;
    const MODE: Mode;

    fn build(params: &Self::Params) -> Option<QuerySpec>;
}

/// Caller-facing view of one query family over a store.
pub struct Hook<S: RemoteStore, F: QueryFamily> {
    store: Arc<S>,
    params: F::Params,
    generation: u64,
    controller: SubscriptionController<S, F::Entity>,
    tx: mpsc::UnboundedSender<StoreEvent>,
    rx: mpsc::UnboundedReceiver<StoreEvent>,
    state: watch::Sender<HookState<F::Entity>>,
    _family: PhantomData<fn() -> F>,
}

impl<S: RemoteStore, F: QueryFamily> Hook<S, F> {
    /// Build the query for `params` and open it.
    pub fn open(store: Arc<S>, params: F::Params) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let generation = 1;
        let controller = SubscriptionController::open(
            store.clone(),
            F::MODE,
            F::build(&params),
            EventSink::new(generation, tx.clone()),
        );
        let (state, _) = watch::channel(controller.state().clone());

        Self {
            store,
            params,
            generation,
            controller,
            tx,
            rx,
            state,
            _family: PhantomData,
        }
    }

    pub fn params(&self) -> &F::Params {
        &self.params
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn phase(&self) -> Phase {
        self.controller.phase()
    }

    /// Current state snapshot.
    pub fn state(&self) -> HookState<F::Entity> {
        self.state.borrow().clone()
    }

    /// Receiver notified on every state transition.
    pub fn watch(&self) -> watch::Receiver<HookState<F::Entity>> {
        self.state.subscribe()
    }

    /// Re-derive the query if `params` differ from the current ones.
    ///
    /// Returns whether a new subscription generation was started.
    pub fn set_params(&mut self, params: F::Params) -> bool {
        if params == self.params {
            return false;
        }

        self.controller.close();
        self.generation += 1;
        tracing::debug!(generation = self.generation, ?params, "Hook parameters changed");

        self.controller = SubscriptionController::open(
            self.store.clone(),
            F::MODE,
            F::build(&params),
            EventSink::new(self.generation, self.tx.clone()),
        );
        self.params = params;
        self.publish();
        true
    }

    /// Apply every event already delivered, without waiting.
    ///
    /// Returns how many of them changed the state.
    pub fn pump(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(event) = self.rx.try_recv() {
            if self.apply(event) {
                applied += 1;
            }
        }
        applied
    }

    /// Wait for the next event and apply it. Returns whether the state changed.
    ///
    /// Pends forever if the store never answers.
    pub async fn next_event(&mut self) -> bool {
        match self.rx.recv().await {
            Some(event) => self.apply(event),
            None => false,
        }
    }

    /// Wait until the hook is no longer loading, or return at once if closed.
    pub async fn settle(&mut self) -> HookState<F::Entity> {
        loop {
            let loading = self.state.borrow().loading;
            if !loading || self.controller.is_closed() {
                return self.state();
            }
            self.next_event().await;
        }
    }

    /// Keep applying events until every watcher has gone, then close.
    pub async fn run_until_unobserved(mut self) {
        loop {
            let event = tokio::select! {
                _ = self.state.closed() => None,
                event = self.rx.recv() => event,
            };
            match event {
                Some(event) => {
                    self.apply(event);
                }
                None => break,
            }
        }
        tracing::debug!(generation = self.generation, "Hook no longer observed");
        self.close();
    }

    /// Tear down the current subscription. Later events are ignored.
    pub fn close(&mut self) {
        self.controller.close();
    }

    fn apply(&mut self, event: StoreEvent) -> bool {
        let changed = self.controller.handle_event(event);
        if changed {
            self.publish();
        }
        changed
    }

    fn publish(&self) {
        self.state.send_replace(self.controller.state().clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use crate::store::{RawDocument, ScriptedStore};
    use serde_json::json;

    fn course(id: &str, teacher: &str) -> RawDocument {
        RawDocument::from_value(id, json!({ "title": id, "teacherId": teacher })).unwrap()
    }

    #[test]
    fn test_equal_params_do_not_resubscribe() {
        let store = Arc::new(ScriptedStore::new());
        let mut hook = CoursesHook::open(
            store.clone(),
            CourseParams::new(Some("t1"), Some(Role::Teacher)),
        );

        assert!(!hook.set_params(CourseParams::new(Some("t1"), Some(Role::Teacher))));
        assert_eq!(store.open_count(), 1);
        assert_eq!(hook.generation(), 1);
    }

    #[test]
    fn test_param_change_closes_previous_before_opening() {
        let store = Arc::new(ScriptedStore::new());
        let mut hook = CoursesHook::open(
            store.clone(),
            CourseParams::new(Some("t1"), Some(Role::Teacher)),
        );
        let first = store.last_handle().unwrap();

        assert!(hook.set_params(CourseParams::new(Some("t2"), Some(Role::Teacher))));
        let second = store.last_handle().unwrap();

        assert_ne!(first, second);
        assert_eq!(store.close_calls(first), 1);
        assert_eq!(store.active_handles(), vec![second]);
        assert_eq!(hook.generation(), 2);
        assert!(hook.state().loading);
    }

    #[test]
    fn test_role_change_alone_resubscribes() {
        let store = Arc::new(ScriptedStore::new());
        let mut hook = CoursesHook::open(
            store.clone(),
            CourseParams::new(Some("u1"), Some(Role::Student)),
        );

        assert!(hook.set_params(CourseParams::new(Some("u1"), Some(Role::Parent))));
        assert_eq!(store.open_count(), 2);
        assert_eq!(store.active_handles().len(), 1);
    }

    #[test]
    fn test_watchers_see_every_transition() {
        let store = Arc::new(ScriptedStore::new());
        let mut hook = CoursesHook::open(
            store.clone(),
            CourseParams::new(Some("t1"), Some(Role::Teacher)),
        );
        let mut watcher = hook.watch();
        assert!(watcher.borrow_and_update().loading);

        store.push_snapshot(store.last_handle().unwrap(), vec![course("c1", "t1")]);
        assert_eq!(hook.pump(), 1);

        assert!(watcher.has_changed().unwrap());
        let seen = watcher.borrow_and_update().clone();
        assert!(!seen.loading);
        assert_eq!(seen.data[0].id, "c1");
    }

    #[test]
    fn test_closed_hook_ignores_late_events() {
        let store = Arc::new(ScriptedStore::new());
        let mut hook = CoursesHook::open(
            store.clone(),
            CourseParams::new(Some("t1"), Some(Role::Teacher)),
        );
        let handle = store.last_handle().unwrap();

        hook.close();
        hook.close();
        store.push_snapshot(handle, vec![course("c1", "t1")]);

        assert_eq!(hook.pump(), 0);
        assert!(hook.state().data.is_empty());
        assert_eq!(hook.phase(), Phase::Closed);
        assert_eq!(store.close_calls(handle), 1);
    }

    #[tokio::test]
    async fn test_settle_returns_once_closed() {
        let store = Arc::new(ScriptedStore::new());
        let mut hook = CoursesHook::open(
            store.clone(),
            CourseParams::new(Some("t1"), Some(Role::Teacher)),
        );
        hook.close();

        let state = tokio::time::timeout(std::time::Duration::from_secs(5), hook.settle())
            .await
            .expect("settle kept waiting on a closed hook");
        assert!(state.data.is_empty());
        assert_eq!(hook.phase(), Phase::Closed);
    }

    #[test]
    fn test_drop_closes_exactly_once() {
        let store = Arc::new(ScriptedStore::new());
        let hook = MessagesHook::open(store.clone(), MessageParams::new(Some("conv-1"), None));
        let handle = store.last_handle().unwrap();

        drop(hook);
        assert_eq!(store.close_calls(handle), 1);
    }

    #[tokio::test]
    async fn test_run_until_unobserved_stops_when_watchers_leave() {
        let store = Arc::new(ScriptedStore::new());
        let hook = AnnouncementsHook::open(store.clone(), AnnouncementParams::default());
        let handle = store.last_handle().unwrap();
        let watcher = hook.watch();

        let runner = tokio::spawn(hook.run_until_unobserved());
        tokio::task::yield_now().await;
        assert_eq!(store.close_calls(handle), 0);

        drop(watcher);
        tokio::time::timeout(std::time::Duration::from_secs(5), runner)
            .await
            .expect("hook kept running")
            .unwrap();
        assert_eq!(store.close_calls(handle), 1);
    }
}
