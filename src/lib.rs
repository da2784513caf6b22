//! Classroom sync
//!
//! Live query synchronization for the classroom platform: builds role-aware
//! queries, keeps typed local state consistent with a remote document store,
//! and tears subscriptions down exactly once.

pub mod api;
pub mod config;
pub mod decode;
pub mod errors;
pub mod hooks;
pub mod models;
pub mod query;
pub mod store;
pub mod subscription;

use std::sync::Arc;

use config::Config;
use store::SqliteStore;

pub use api::create_router;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<SqliteStore>,
    pub config: Arc<Config>,
}
