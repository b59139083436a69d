//! Postgres-backed document store.
//!
//! Documents live in one JSONB table keyed by `(collection, id)`. Business keys
//! are claimed in `document_keys`, whose primary key makes a second claim fail
//! inside the same transaction that writes the document. Counters live in
//! `document_sequences` and are bumped with a single upsert.
//!
//! JSONB orders strings by text, so sorting and range filters on RFC 3339
//! timestamps cast them to `timestamptz` first. A batch from `write_all` runs in
//! one transaction; any failed write drops it uncommitted.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique violation) | `23505` | `DuplicateKey` |
//! | Database (other) | any | `Backend` |
//! | PoolTimedOut / PoolClosed / Io | N/A | `Unavailable` |
//! | Other | N/A | `Backend` |

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::types::Json;
use chrono::DateTime;
use sqlx::{PgPool, Postgres, QueryBuilder, Row, Transaction};
use tracing::instrument;
use uuid::Uuid;

use kardex_core::{DocumentId, ExpectedVersion};

use super::query::{Condition, Page, Query};
use super::r#trait::{DocumentStore, RawDocument, StoreError, UniqueKey, WriteOp};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS documents (
        collection TEXT NOT NULL,
        id UUID NOT NULL,
        version BIGINT NOT NULL,
        body JSONB NOT NULL,
        PRIMARY KEY (collection, id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS document_keys (
        collection TEXT NOT NULL,
        key_name TEXT NOT NULL,
        key_value TEXT NOT NULL,
        document_id UUID NOT NULL,
        PRIMARY KEY (collection, key_name, key_value)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS document_keys_owner ON document_keys (collection, document_id)",
    r#"
    CREATE TABLE IF NOT EXISTS document_sequences (
        collection TEXT NOT NULL,
        key TEXT NOT NULL,
        field TEXT NOT NULL,
        value BIGINT NOT NULL,
        PRIMARY KEY (collection, key, field)
    )
    "#,
];

/// Text shape of an RFC 3339 timestamp, checked before casting to `timestamptz`.
const TIMESTAMP_PATTERN: &str = r"'^\d{4}-\d{2}-\d{2}[Tt ]\d{2}:\d{2}:\d{2}(\.\d+)?([Zz]|[+-]\d{2}:\d{2})$'";

/// Postgres-backed document store.
///
/// `PgPool` is internally reference counted, so the store is cheap to clone and
/// `Send + Sync`.
#[derive(Debug, Clone)]
pub struct PostgresDocumentStore {
    pool: PgPool,
}

impl PostgresDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect a pool and create the tables when missing.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        let store = Self::new(pool);
        store.ensure_schema().await?;
        Ok(store)
    }

    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        }
        Ok(())
    }

    async fn begin(&self) -> Result<Transaction<'_, Postgres>, StoreError> {
        self.pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))
    }
}

#[async_trait]
impl DocumentStore for PostgresDocumentStore {
    #[instrument(skip(self, query), fields(conditions = query.conditions.len()), err)]
    async fn find(&self, collection: &str, query: &Query) -> Result<Page<RawDocument>, StoreError> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM documents");
        push_filter(&mut count, collection, query);
        let total: i64 = count
            .build()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_count", e))?
            .try_get(0)
            .map_err(|e| map_sqlx_error("find_count", e))?;

        let mut select = QueryBuilder::<Postgres>::new("SELECT id, version, body FROM documents");
        push_filter(&mut select, collection, query);
        match &query.sort {
            Some(sort) => {
                let direction = if sort.descending { " DESC" } else { " ASC" };
                select.push(" ORDER BY ");
                push_instant(&mut select, &sort.path);
                select.push(direction);
                select.push(", body #> ");
                select.push_bind(path_segments(&sort.path));
                select.push(direction);
                select.push(", id ASC");
            }
            None => {
                select.push(" ORDER BY id ASC");
            }
        }
        if let Some(p) = query.pagination {
            select.push(" LIMIT ");
            select.push_bind(i64::from(p.limit));
            select.push(" OFFSET ");
            select.push_bind(i64::from(p.offset));
        }

        let rows = select
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("find", e))?;
        let items = rows.iter().map(raw_from_row).collect::<Result<Vec<_>, _>>()?;

        Ok(Page::new(items, total.max(0) as u64, query.pagination))
    }

    #[instrument(skip(self), err)]
    async fn get(&self, collection: &str, id: DocumentId) -> Result<Option<RawDocument>, StoreError> {
        let row = sqlx::query("SELECT id, version, body FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection)
            .bind(*id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("get", e))?;
        row.as_ref().map(raw_from_row).transpose()
    }

    #[instrument(skip(self, body, unique_keys), err)]
    async fn insert(
        &self,
        collection: &str,
        id: DocumentId,
        body: JsonValue,
        unique_keys: &[UniqueKey],
    ) -> Result<u64, StoreError> {
        let mut tx = self.begin().await?;
        let version = insert_in(&mut tx, collection, id, &body, unique_keys).await?;
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(version)
    }

    #[instrument(skip(self, body, unique_keys), err)]
    async fn save(
        &self,
        collection: &str,
        id: DocumentId,
        body: JsonValue,
        expected: ExpectedVersion,
        unique_keys: &[UniqueKey],
    ) -> Result<u64, StoreError> {
        let mut tx = self.begin().await?;
        let version = save_in(&mut tx, collection, id, &body, expected, unique_keys).await?;
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(version)
    }

    #[instrument(skip(self, ops), fields(writes = ops.len()), err)]
    async fn write_all(&self, ops: Vec<WriteOp>) -> Result<Vec<u64>, StoreError> {
        let mut tx = self.begin().await?;
        let mut versions = Vec::with_capacity(ops.len());
        for op in &ops {
            let version = match op {
                WriteOp::Insert {
                    collection,
                    id,
                    body,
                    unique_keys,
                } => insert_in(&mut tx, collection, *id, body, unique_keys).await?,
                WriteOp::Save {
                    collection,
                    id,
                    body,
                    expected,
                    unique_keys,
                } => save_in(&mut tx, collection, *id, body, *expected, unique_keys).await?,
            };
            versions.push(version);
        }
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(versions)
    }

    #[instrument(skip(self), err)]
    async fn delete(&self, collection: &str, id: DocumentId) -> Result<bool, StoreError> {
        let mut tx = self.begin().await?;
        sqlx::query("DELETE FROM document_keys WHERE collection = $1 AND document_id = $2")
            .bind(collection)
            .bind(*id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("release_keys", e))?;
        let deleted = sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection)
            .bind(*id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_document", e))?
            .rows_affected();
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(deleted > 0)
    }

    #[instrument(skip(self), err)]
    async fn atomic_increment(&self, collection: &str, key: &str, field: &str) -> Result<i64, StoreError> {
        sqlx::query_scalar(
            r#"
            INSERT INTO document_sequences (collection, key, field, value)
            VALUES ($1, $2, $3, 1)
            ON CONFLICT (collection, key, field)
            DO UPDATE SET value = document_sequences.value + 1
            RETURNING value
            "#,
        )
        .bind(collection)
        .bind(key)
        .bind(field)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("atomic_increment", e))
    }
}

async fn insert_in(
    tx: &mut Transaction<'_, Postgres>,
    collection: &str,
    id: DocumentId,
    body: &JsonValue,
    unique_keys: &[UniqueKey],
) -> Result<u64, StoreError> {
    sqlx::query("INSERT INTO documents (collection, id, version, body) VALUES ($1, $2, 1, $3)")
        .bind(collection)
        .bind(*id.as_uuid())
        .bind(Json(body))
        .execute(&mut **tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::DuplicateKey {
                    collection: collection.to_string(),
                    field: "id".to_string(),
                    value: id.to_string(),
                }
            } else {
                map_sqlx_error("insert_document", e)
            }
        })?;
    claim_keys(tx, collection, id, unique_keys).await?;
    Ok(1)
}

async fn save_in(
    tx: &mut Transaction<'_, Postgres>,
    collection: &str,
    id: DocumentId,
    body: &JsonValue,
    expected: ExpectedVersion,
    unique_keys: &[UniqueKey],
) -> Result<u64, StoreError> {
    let expected_version = match expected {
        ExpectedVersion::Any => None,
        ExpectedVersion::Exact(v) => Some(v as i64),
    };

    let version: Option<i64> = sqlx::query_scalar(
        r#"
        UPDATE documents
        SET body = $3, version = version + 1
        WHERE collection = $1 AND id = $2 AND ($4::BIGINT IS NULL OR version = $4)
        RETURNING version
        "#,
    )
    .bind(collection)
    .bind(*id.as_uuid())
    .bind(Json(body))
    .bind(expected_version)
    .fetch_optional(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("save_document", e))?;

    // The caller's transaction is dropped on error, which rolls it back.
    let Some(version) = version else {
        return Err(StoreError::Concurrency(format!(
            "{collection}/{id}: expected {expected:?} but the stored document differs or is gone"
        )));
    };

    sqlx::query("DELETE FROM document_keys WHERE collection = $1 AND document_id = $2")
        .bind(collection)
        .bind(*id.as_uuid())
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("release_keys", e))?;
    claim_keys(tx, collection, id, unique_keys).await?;
    Ok(version as u64)
}

async fn claim_keys(
    tx: &mut Transaction<'_, Postgres>,
    collection: &str,
    id: DocumentId,
    unique_keys: &[UniqueKey],
) -> Result<(), StoreError> {
    for key in unique_keys {
        sqlx::query(
            "INSERT INTO document_keys (collection, key_name, key_value, document_id) VALUES ($1, $2, $3, $4)",
        )
        .bind(collection)
        .bind(&key.field)
        .bind(&key.value)
        .bind(*id.as_uuid())
        .execute(&mut **tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::DuplicateKey {
                    collection: collection.to_string(),
                    field: key.field.clone(),
                    value: key.value.clone(),
                }
            } else {
                map_sqlx_error("claim_key", e)
            }
        })?;
    }
    Ok(())
}

/// `WHERE collection = $1 AND <conditions>` for a count or select.
fn push_filter(builder: &mut QueryBuilder<'_, Postgres>, collection: &str, query: &Query) {
    builder.push(" WHERE collection = ");
    builder.push_bind(collection.to_string());
    for condition in &query.conditions {
        builder.push(" AND ");
        match condition {
            Condition::Eq { path, value } => {
                builder.push("body #> ");
                builder.push_bind(path_segments(path));
                builder.push(" = ");
                builder.push_bind(Json(value.clone()));
            }
            Condition::Contains { path, needle } => {
                builder.push("body #>> ");
                builder.push_bind(path_segments(path));
                builder.push(" ILIKE ");
                builder.push_bind(format!("%{}%", escape_like(needle)));
            }
            Condition::Gte { path, value } => push_range(builder, path, " >= ", value),
            Condition::Lte { path, value } => push_range(builder, path, " <= ", value),
        }
    }
}

/// Range bound on `path`. A timestamp bound compares instants, anything else
/// compares JSONB.
fn push_range(builder: &mut QueryBuilder<'_, Postgres>, path: &str, op: &str, value: &JsonValue) {
    match value.as_str().filter(|s| DateTime::parse_from_rfc3339(s).is_ok()) {
        Some(instant) => {
            push_instant(builder, path);
            builder.push(op);
            builder.push_bind(instant.to_string());
            builder.push("::timestamptz");
        }
        None => {
            builder.push("body #> ");
            builder.push_bind(path_segments(path));
            builder.push(op);
            builder.push_bind(Json(value.clone()));
        }
    }
}

/// `path` as `timestamptz` when it holds an RFC 3339 string, NULL otherwise.
fn push_instant(builder: &mut QueryBuilder<'_, Postgres>, path: &str) {
    builder.push("(CASE WHEN body #>> ");
    builder.push_bind(path_segments(path));
    builder.push(" ~ ");
    builder.push(TIMESTAMP_PATTERN);
    builder.push(" THEN (body #>> ");
    builder.push_bind(path_segments(path));
    builder.push(")::timestamptz END)");
}

fn path_segments(path: &str) -> Vec<String> {
    path.split('.').map(str::to_string).collect()
}

fn escape_like(needle: &str) -> String {
    needle
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

fn raw_from_row(row: &PgRow) -> Result<RawDocument, StoreError> {
    let id: Uuid = row.try_get("id").map_err(|e| map_sqlx_error("decode_row", e))?;
    let version: i64 = row.try_get("version").map_err(|e| map_sqlx_error("decode_row", e))?;
    let Json(body): Json<JsonValue> = row.try_get("body").map_err(|e| map_sqlx_error("decode_row", e))?;
    Ok(RawDocument {
        id: DocumentId::from_uuid(id),
        version: version.max(0) as u64,
        body,
    })
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            StoreError::Backend(format!("database error in {operation}: {}", db_err.message()))
        }
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            StoreError::Unavailable(format!("{operation}: {err}"))
        }
        _ => StoreError::Backend(format!("sqlx error in {operation}: {err}")),
    }
}
