//! Table-backed record access.
//!
//! A [`Repository`] exposes `get`, `save` and `all` over one collection's
//! table. Each operation is a single statement run through the shared
//! [`QueryExecutor`]; none are transactional across records.

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use sqlx::Row;
use sqlx::postgres::PgRow;
use tokio::task::JoinHandle;

use crate::callback::spawn_with_callback;
use crate::domain::{Collection, record};
use crate::error::{StorageError, StorageResult};
use crate::persistence::QueryExecutor;

/// SQL text for one collection, built once from its fixed table name.
#[derive(Debug, Clone)]
struct Statements {
    get: String,
    save: String,
    all: String,
}

impl Statements {
    fn for_table(table: &str) -> Self {
        Self {
            // Compare as bpchar so ids with trailing blanks match their padded key.
            get: format!("SELECT json FROM {table} WHERE id = $1::char(50)"),
            save: format!(
                "INSERT INTO {table} (id, json) VALUES ($1, $2) \
                 ON CONFLICT (id) DO UPDATE SET json = EXCLUDED.json"
            ),
            all: format!("SELECT json FROM {table}"),
        }
    }
}

/// Record access for a single collection.
#[derive(Debug, Clone)]
pub struct Repository {
    collection: Collection,
    executor: Arc<QueryExecutor>,
    statements: Arc<Statements>,
}

impl Repository {
    /// Creates a repository for `collection` on top of `executor`.
    #[must_use]
    pub fn new(collection: Collection, executor: Arc<QueryExecutor>) -> Self {
        Self {
            collection,
            executor,
            statements: Arc::new(Statements::for_table(collection.table_name())),
        }
    }

    /// The collection this repository reads and writes.
    #[must_use]
    pub const fn collection(&self) -> Collection {
        self.collection
    }

    /// Fetches the record stored under `id`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] when no row matches,
    /// [`StorageError::Decode`] when the stored JSON does not fit `T`, and
    /// the executor's errors otherwise.
    pub async fn get<T: DeserializeOwned>(&self, id: &str) -> StorageResult<T> {
        let rows = self.executor.fetch_all(&self.statements.get, &[id]).await?;
        let Some(row) = rows.first() else {
            return Err(StorageError::NotFound {
                collection: self.collection.to_string(),
                id: id.to_string(),
            });
        };
        self.decode_row(&self.statements.get, row)
    }

    /// Inserts `record`, or replaces the stored record with the same `id`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidRecord`] if `record` has no usable
    /// string `id`, and the executor's errors otherwise.
    pub async fn save<T: Serialize + ?Sized>(&self, record: &T) -> StorageResult<()> {
        let encoded = record::encode(record)?;
        self.executor
            .execute(&self.statements.save, &[encoded.id.as_str(), encoded.json.as_str()])
            .await?;
        tracing::debug!(collection = %self.collection, id = %encoded.id, "record saved");
        Ok(())
    }

    /// Fetches every record in the collection, in whatever order the
    /// database returns them.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Decode`] if any stored row does not fit `T`,
    /// and the executor's errors otherwise.
    pub async fn all<T: DeserializeOwned>(&self) -> StorageResult<Vec<T>> {
        let rows = self.executor.fetch_all(&self.statements.all, &[]).await?;
        rows.iter()
            .map(|row| self.decode_row(&self.statements.all, row))
            .collect()
    }

    /// Callback form of [`Repository::get`].
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn get_with<T, C>(&self, id: impl Into<String>, callback: C) -> JoinHandle<()>
    where
        T: DeserializeOwned + Send + 'static,
        C: FnOnce(StorageResult<T>) + Send + 'static,
    {
        let repo = self.clone();
        let id = id.into();
        spawn_with_callback(async move { repo.get(&id).await }, callback)
    }

    /// Callback form of [`Repository::save`].
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn save_with<T, C>(&self, record: T, callback: C) -> JoinHandle<()>
    where
        T: Serialize + Send + Sync + 'static,
        C: FnOnce(StorageResult<()>) + Send + 'static,
    {
        let repo = self.clone();
        spawn_with_callback(async move { repo.save(&record).await }, callback)
    }

    /// Callback form of [`Repository::all`].
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn all_with<T, C>(&self, callback: C) -> JoinHandle<()>
    where
        T: DeserializeOwned + Send + 'static,
        C: FnOnce(StorageResult<Vec<T>>) + Send + 'static,
    {
        let repo = self.clone();
        spawn_with_callback(async move { repo.all().await }, callback)
    }

    fn decode_row<T: DeserializeOwned>(&self, statement: &str, row: &PgRow) -> StorageResult<T> {
        let json: String = row
            .try_get("json")
            .map_err(|e| StorageError::query(statement, &e))?;
        record::decode(&json).map_err(|err| match err {
            StorageError::Decode(msg) => StorageError::Decode(format!(
                "{} record: {msg}",
                self.collection
            )),
            other => other,
        })
    }
}
