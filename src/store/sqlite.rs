//! SQLite-backed document store with live queries.
//!
//! Documents are stored as JSON field maps keyed by `(collection, id)`. Live
//! queries are re-evaluated in process after every write to their collection.
//! Dispatch is serialized so a subscriber never sees an older result after a
//! newer one.

use std::collections::HashMap;
use std::future::Future;
use std::path::Path;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;

use super::{EventSink, RawDocument, RemoteStore, SubscriptionHandle};
use crate::decode::is_server_timestamp;
use crate::errors::SyncError;
use crate::query::QuerySpec;

#[derive(Clone)]
struct LiveQuery {
    spec: QuerySpec,
    sink: EventSink,
}

struct Inner {
    pool: SqlitePool,
    live: Mutex<HashMap<SubscriptionHandle, LiveQuery>>,
    next_handle: AtomicU64,
    dispatch_turn: tokio::sync::Mutex<()>,
}

/// Persistent document store answering live and one-shot queries.
#[derive(Clone)]
pub struct SqliteStore {
    inner: Arc<Inner>,
}

impl SqliteStore {
    /// Open (or create) the store at `db_path` and run migrations.
    pub async fn open(db_path: &Path) -> Result<Self, SyncError> {
        // Ensure the parent directory exists
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent).await.ok();
        }

        let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

        let options = SqliteConnectOptions::from_str(&db_url)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_secs(30));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        run_migrations(&pool).await?;

        Ok(Self::new(pool))
    }

    pub fn new(pool: SqlitePool) -> Self {
        Self {
            inner: Arc::new(Inner {
                pool,
                live: Mutex::new(HashMap::new()),
                next_handle: AtomicU64::new(1),
                dispatch_turn: tokio::sync::Mutex::new(()),
            }),
        }
    }

    /// Number of live queries currently registered.
    pub fn live_count(&self) -> usize {
        self.inner.live().len()
    }

    /// Get a document by collection and id.
    pub async fn get_document(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<RawDocument>, SyncError> {
        let row = sqlx::query("SELECT id, fields FROM documents WHERE collection = ? AND id = ?")
            .bind(collection)
            .bind(id)
            .fetch_optional(&self.inner.pool)
            .await?;

        row.as_ref().map(document_from_row).transpose()
    }

    /// Create or replace a document, then notify live queries on its collection.
    ///
    /// Server-timestamp placeholders are resolved to the write instant.
    pub async fn put_document(
        &self,
        collection: &str,
        id: &str,
        mut fields: Map<String, Value>,
    ) -> Result<RawDocument, SyncError> {
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        for value in fields.values_mut() {
            resolve_server_values(value, &now);
        }
        let fields_json = serde_json::to_string(&fields)?;

        sqlx::query(
            "INSERT INTO documents (collection, id, fields, updated_at) VALUES (?, ?, ?, ?)
             ON CONFLICT(collection, id) DO UPDATE SET fields = excluded.fields, updated_at = excluded.updated_at",
        )
        .bind(collection)
        .bind(id)
        .bind(&fields_json)
        .bind(&now)
        .execute(&self.inner.pool)
        .await?;

        tracing::debug!(collection, id, "Document written");
        self.inner.dispatch(collection, None).await;

        Ok(RawDocument::new(id, fields))
    }

    /// Create a document under a generated id.
    pub async fn create_document(
        &self,
        collection: &str,
        fields: Map<String, Value>,
    ) -> Result<RawDocument, SyncError> {
        let id = uuid::Uuid::new_v4().to_string();
        self.put_document(collection, &id, fields).await
    }

    /// Delete a document. Returns whether it existed.
    pub async fn delete_document(&self, collection: &str, id: &str) -> Result<bool, SyncError> {
        let result = sqlx::query("DELETE FROM documents WHERE collection = ? AND id = ?")
            .bind(collection)
            .bind(id)
            .execute(&self.inner.pool)
            .await?;

        let existed = result.rows_affected() > 0;
        if existed {
            tracing::debug!(collection, id, "Document deleted");
            self.inner.dispatch(collection, None).await;
        }
        Ok(existed)
    }
}

impl Inner {
    fn live(&self) -> MutexGuard<'_, HashMap<SubscriptionHandle, LiveQuery>> {
        self.live.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn load_collection(&self, collection: &str) -> Result<Vec<RawDocument>, SyncError> {
        let rows = sqlx::query("SELECT id, fields FROM documents WHERE collection = ? ORDER BY id")
            .bind(collection)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(document_from_row).collect()
    }

    /// Push fresh snapshots to live queries on `collection`, or only to `target`.
    async fn dispatch(&self, collection: &str, target: Option<SubscriptionHandle>) {
        let _turn = self.dispatch_turn.lock().await;

        let queries: Vec<(SubscriptionHandle, LiveQuery)> = self
            .live()
            .iter()
            .filter(|(handle, query)| {
                query.spec.collection == collection && target.map_or(true, |t| t == **handle)
            })
            .map(|(handle, query)| (*handle, query.clone()))
            .collect();

        if queries.is_empty() {
            return;
        }

        match self.load_collection(collection).await {
            Ok(docs) => {
                let gone: Vec<SubscriptionHandle> = queries
                    .into_iter()
                    .filter(|(_, query)| !query.sink.snapshot(query.spec.apply(docs.clone())))
                    .map(|(handle, _)| handle)
                    .collect();
                self.forget(&gone);
            }
            Err(err) => {
                tracing::error!(collection, "Live query dispatch failed: {}", err);
                let message = err.message();
                for (_, query) in &queries {
                    query.sink.error(message.clone());
                }
                let failed: Vec<SubscriptionHandle> =
                    queries.iter().map(|(handle, _)| *handle).collect();
                self.forget(&failed);
            }
        }
    }

    fn forget(&self, handles: &[SubscriptionHandle]) {
        if handles.is_empty() {
            return;
        }
        let mut live = self.live();
        for handle in handles {
            live.remove(handle);
        }
    }
}

impl RemoteStore for SqliteStore {
    fn open_query(&self, spec: &QuerySpec, sink: EventSink) -> SubscriptionHandle {
        let handle = SubscriptionHandle(self.inner.next_handle.fetch_add(1, Ordering::Relaxed));

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                tracing::error!(%handle, "Live query opened outside a Tokio runtime");
                sink.error("Live queries require a running Tokio runtime");
                return handle;
            }
        };

        self.inner.live().insert(
            handle,
            LiveQuery {
                spec: spec.clone(),
                sink,
            },
        );
        tracing::debug!(%handle, collection = %spec.collection, "Live query opened");

        let inner = self.inner.clone();
        let collection = spec.collection.clone();
        runtime.spawn(async move { inner.dispatch(&collection, Some(handle)).await });

        handle
    }

    fn close(&self, handle: SubscriptionHandle) {
        if self.inner.live().remove(&handle).is_some() {
            tracing::debug!(%handle, "Live query closed");
        }
    }

    fn fetch_once(
        &self,
        spec: &QuerySpec,
    ) -> impl Future<Output = Result<Vec<RawDocument>, SyncError>> + Send {
        let inner = self.inner.clone();
        let spec = spec.clone();
        async move {
            let docs = inner.load_collection(&spec.collection).await?;
            Ok(spec.apply(docs))
        }
    }
}

/// Run database migrations.
async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            collection TEXT NOT NULL,
            id TEXT NOT NULL,
            fields TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (collection, id)
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents(collection);
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

fn document_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<RawDocument, SyncError> {
    let id: String = row.get("id");
    let fields: String = row.get("fields");
    let fields = serde_json::from_str(&fields).map_err(|e| {
        SyncError::Store(format!("Stored document {} has corrupt fields: {}", id, e))
    })?;
    Ok(RawDocument::new(id, fields))
}

fn resolve_server_values(value: &mut Value, now: &str) {
    if is_server_timestamp(value) {
        *value = Value::String(now.to_string());
        return;
    }
    match value {
        Value::Object(map) => map.values_mut().for_each(|v| resolve_server_values(v, now)),
        Value::Array(items) => items.iter_mut().for_each(|v| resolve_server_values(v, now)),
        _ => {}
    }
}
