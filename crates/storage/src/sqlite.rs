//! Durable local backend: non-overlapping subtree documents in SQLite with
//! in-process push notifications on write. A write replaces an exact row,
//! splices into an ancestor row, or absorbs descendant rows; reads reverse
//! the decomposition.

use std::{fs, path::Path, str::FromStr, sync::Arc};

use async_trait::async_trait;
use serde_json::Value;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Row, Sqlite, SqliteConnection,
};
use uuid::Uuid;

use shared::error::StoreError;

use crate::{
    evaluate_query, listeners::ListenerRegistry, tree, Query, RemoteStore, Snapshot, StorePath,
    Subscription,
};

#[derive(Clone)]
pub struct SqliteStore {
    pool: Pool<Sqlite>,
    listeners: Arc<ListenerRegistry>,
}

impl SqliteStore {
    pub async fn new(database_url: &str) -> Result<Self, StoreError> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)
            .map_err(db_err)?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await
            .map_err(db_err)?;
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|err| StoreError::Backend(err.to_string()))?;
        Ok(Self {
            pool,
            listeners: Arc::new(ListenerRegistry::default()),
        })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<(), StoreError> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn load_subtree(&self, path: &StorePath) -> Result<Option<Value>, StoreError> {
        let mut conn = self.pool.acquire().await.map_err(db_err)?;
        load_subtree_on(&mut conn, path).await
    }

    async fn write(&self, path: &StorePath, value: Option<Value>) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        if let Some((row_path, mut doc)) = covering_row(&mut tx, path).await? {
            let relative = relative_path(&row_path, path);
            tree::write_at(&mut doc, &relative, value);
            let emptied =
                doc.is_null() || doc.as_object().is_some_and(|map| map.is_empty());
            if emptied {
                sqlx::query("DELETE FROM nodes WHERE path = ?")
                    .bind(row_path.as_str())
                    .execute(&mut *tx)
                    .await
                    .map_err(db_err)?;
            } else {
                upsert(&mut tx, &row_path, &doc).await?;
            }
        } else {
            sqlx::query("DELETE FROM nodes WHERE path LIKE ? ESCAPE '\\'")
                .bind(descendant_pattern(path))
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
            if let Some(value) = value {
                upsert(&mut tx, path, &value).await?;
            }
        }

        tx.commit().await.map_err(db_err)?;
        self.notify(path).await;
        Ok(())
    }

    async fn notify(&self, changed: &StorePath) {
        for (id, query) in self.listeners.overlapping(changed) {
            let result = match self.load_subtree(&query.path).await {
                Ok(subtree) => Ok(evaluate_query(subtree.as_ref(), &query)),
                Err(err) => Err(err),
            };
            self.listeners.send(id, result);
        }
    }
}

#[async_trait]
impl RemoteStore for SqliteStore {
    fn generate_key(&self) -> String {
        Uuid::now_v7().to_string()
    }

    async fn get(&self, query: &Query) -> Result<Snapshot, StoreError> {
        let subtree = self.load_subtree(&query.path).await?;
        Ok(evaluate_query(subtree.as_ref(), query))
    }

    async fn put(&self, path: &StorePath, value: Value) -> Result<(), StoreError> {
        self.write(path, Some(value)).await
    }

    async fn delete(&self, path: &StorePath) -> Result<(), StoreError> {
        self.write(path, None).await
    }

    async fn watch(&self, query: &Query) -> Result<Subscription, StoreError> {
        let initial = self.get(query).await?;
        let (rx, guard) = self.listeners.attach(query.clone(), Ok(initial));
        Ok(Subscription::new(rx, guard))
    }
}

async fn load_subtree_on(
    conn: &mut SqliteConnection,
    path: &StorePath,
) -> Result<Option<Value>, StoreError> {
    if let Some((row_path, value)) = covering_row(conn, path).await? {
        let relative = relative_path(&row_path, path);
        return Ok(tree::value_at(&value, &relative).cloned());
    }

    let rows = sqlx::query("SELECT path, json FROM nodes WHERE path LIKE ? ESCAPE '\\' ORDER BY path")
        .bind(descendant_pattern(path))
        .fetch_all(&mut *conn)
        .await
        .map_err(db_err)?;
    if rows.is_empty() {
        return Ok(None);
    }

    let mut assembled = Value::Null;
    for row in rows {
        let row_path: String = row.get(0);
        let json: String = row.get(1);
        let value = decode_json(&row_path, &json)?;
        let relative = relative_path(path, &StorePath::new(row_path));
        tree::write_at(&mut assembled, &relative, Some(value));
    }
    Ok(if assembled.is_null() {
        None
    } else {
        Some(assembled)
    })
}

/// The exact row at `path` or its closest ancestor row. Rows never overlap,
/// so at most one can cover a path.
async fn covering_row(
    conn: &mut SqliteConnection,
    path: &StorePath,
) -> Result<Option<(StorePath, Value)>, StoreError> {
    let mut candidates: Vec<String> = Vec::new();
    let mut prefix = String::new();
    for segment in path.segments() {
        if !prefix.is_empty() {
            prefix.push('/');
        }
        prefix.push_str(segment);
        candidates.push(prefix.clone());
    }

    for candidate in candidates.iter().rev() {
        let row = sqlx::query("SELECT json FROM nodes WHERE path = ?")
            .bind(candidate.as_str())
            .fetch_optional(&mut *conn)
            .await
            .map_err(db_err)?;
        if let Some(row) = row {
            let json: String = row.get(0);
            let value = decode_json(candidate, &json)?;
            return Ok(Some((StorePath::new(candidate.clone()), value)));
        }
    }
    Ok(None)
}

async fn upsert(
    tx: &mut sqlx::Transaction<'_, Sqlite>,
    path: &StorePath,
    value: &Value,
) -> Result<(), StoreError> {
    sqlx::query(
        "INSERT INTO nodes (path, json) VALUES (?, ?)
         ON CONFLICT(path) DO UPDATE SET json = excluded.json",
    )
    .bind(path.as_str())
    .bind(encode_json(path, value)?)
    .execute(&mut **tx)
    .await
    .map_err(db_err)?;
    Ok(())
}

fn relative_path(base: &StorePath, full: &StorePath) -> StorePath {
    if base.as_str().is_empty() {
        return full.clone();
    }
    if full.as_str() == base.as_str() {
        return StorePath::new("");
    }
    match full.as_str().strip_prefix(&format!("{}/", base.as_str())) {
        Some(rest) => StorePath::new(rest),
        None => full.clone(),
    }
}

/// LIKE pattern matching strict descendants of `path`, with the pattern
/// metacharacters escaped.
fn descendant_pattern(path: &StorePath) -> String {
    let mut escaped = String::with_capacity(path.as_str().len());
    for ch in path.as_str().chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    if escaped.is_empty() {
        "%".to_owned()
    } else {
        format!("{escaped}/%")
    }
}

fn decode_json(path: &str, json: &str) -> Result<Value, StoreError> {
    serde_json::from_str(json).map_err(|err| StoreError::Serde {
        path: path.to_owned(),
        reason: err.to_string(),
    })
}

fn encode_json(path: &StorePath, value: &Value) -> Result<String, StoreError> {
    serde_json::to_string(value).map_err(|err| StoreError::Serde {
        path: path.to_string(),
        reason: err.to_string(),
    })
}

fn db_err(err: sqlx::Error) -> StoreError {
    StoreError::Backend(err.to_string())
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<(), StoreError> {
    let Some(raw_path) = database_url.strip_prefix("sqlite://") else {
        return Ok(());
    };
    let raw_path = raw_path.split('?').next().unwrap_or(raw_path);
    if raw_path.is_empty() || raw_path == ":memory:" {
        return Ok(());
    }
    if let Some(parent) = Path::new(raw_path).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|err| {
                StoreError::Backend(format!(
                    "failed to create {}: {err}",
                    parent.display()
                ))
            })?;
        }
    }
    Ok(())
}
