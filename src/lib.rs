//! # botkit-storage-postgres
//!
//! PostgreSQL storage adapter for botkit. Teams, channels and users are
//! kept as JSON documents, one table per collection, keyed by each
//! record's string `id`.
//!
//! The database is used purely as a document store: lookups are by
//! primary key or full-table scan, and saves are upserts.
//!
//! ## Architecture
//!
//! ```text
//! Storage { teams, channels, users, end() }
//!     │
//!     ├── Repository (get / save / all, async + callback forms)
//!     │
//!     ├── QueryExecutor (memoized bootstrap, borrowed connections)
//!     │
//!     ├── bootstrap: maintenance db → CREATE DATABASE → CREATE TABLEs → PgPool
//!     │
//!     └── StorageConfig (explicit > BOTKIT_STORAGE_POSTGRES_* > defaults)
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use botkit_storage_postgres::{ClientDefaults, Storage, StorageOptions};
//! use serde_json::json;
//!
//! # async fn run() -> Result<(), botkit_storage_postgres::StorageError> {
//! let options = StorageOptions {
//!     database: Some("botkit_test".to_string()),
//!     ..StorageOptions::default()
//! };
//! let storage = Storage::connect(options, ClientDefaults::default()).await?;
//!
//! storage.users.save(&json!({"id": "TEST0", "foo": "bar0"})).await?;
//! let user: serde_json::Value = storage.users.get("TEST0").await?;
//! assert_eq!(user["foo"], "bar0");
//!
//! storage.end().await?;
//! # Ok(())
//! # }
//! ```

pub mod callback;
pub mod config;
pub mod domain;
pub mod error;
pub mod persistence;
pub mod repository;
pub mod storage;

pub use config::{ClientDefaults, ConfigInput, StorageConfig, StorageOptions};
pub use domain::Collection;
pub use error::{StorageError, StorageResult};
pub use repository::Repository;
pub use storage::Storage;
