//! Live hook endpoints.
//!
//! Each request opens one hook and streams its state, one SSE event per
//! transition, starting with the current state. When the client disconnects
//! the hook is dropped and its subscription closed.

use axum::{
    extract::{Path, Query, State},
    response::sse::{Event, KeepAlive, Sse},
};
use serde::Deserialize;
use tokio_stream::{wrappers::WatchStream, Stream, StreamExt};

use crate::hooks::{
    AnnouncementParams, AnnouncementsHook, CourseParams, CoursesHook, Hook, MessageParams,
    MessagesHook, QueryFamily,
};
use crate::models::Role;
use crate::store::SqliteStore;
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnouncementQuery {
    pub max_results: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct CourseQuery {
    pub identity: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    pub limit: Option<usize>,
}

/// GET /api/live/announcements - Stream the latest announcements.
pub async fn live_announcements(
    State(state): State<AppState>,
    Query(query): Query<AnnouncementQuery>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>> + Send + 'static> {
    let params = AnnouncementParams::with_max_results(
        query.max_results.unwrap_or(state.config.announcement_limit),
    );
    stream_hook(AnnouncementsHook::open(state.store.clone(), params))
}

/// GET /api/live/courses - Stream the courses visible to a caller.
pub async fn live_courses(
    State(state): State<AppState>,
    Query(query): Query<CourseQuery>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>> + Send + 'static> {
    let role = query.role.as_deref().and_then(|raw| match raw.parse::<Role>() {
        Ok(role) => Some(role),
        Err(e) => {
            tracing::warn!("{}; treating caller as having no role", e);
            None
        }
    });
    let params = CourseParams::new(query.identity.as_deref(), role);
    stream_hook(CoursesHook::open(state.store.clone(), params))
}

/// GET /api/live/conversations/:conversation_id/messages - Stream a conversation.
pub async fn live_messages(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
    Query(query): Query<MessageQuery>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>> + Send + 'static> {
    let params = MessageParams::new(Some(&conversation_id), query.limit);
    stream_hook(MessagesHook::open(state.store.clone(), params))
}

fn stream_hook<F: QueryFamily>(
    hook: Hook<SqliteStore, F>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>> + Send + 'static> {
    let updates = WatchStream::new(hook.watch());
    tokio::spawn(hook.run_until_unobserved());

    Sse::new(updates.map(|state| Event::default().json_data(state)))
        .keep_alive(KeepAlive::default())
}
