//! The storage handle botkit consumes.
//!
//! [`Storage`] bundles one [`Repository`] per collection over a single
//! shared [`QueryExecutor`], so all three collections use the same pool and
//! the same one-time bootstrap.

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::callback::spawn_with_callback;
use crate::config::{ClientDefaults, ConfigInput, StorageConfig};
use crate::domain::Collection;
use crate::error::StorageResult;
use crate::persistence::QueryExecutor;
use crate::repository::Repository;

/// Storage adapter exposing `teams`, `channels` and `users`.
///
/// Cloning is cheap; clones share the pool.
#[derive(Debug, Clone)]
pub struct Storage {
    /// Team records (`botkit_teams`).
    pub teams: Repository,
    /// Channel records (`botkit_channels`).
    pub channels: Repository,
    /// User records (`botkit_users`).
    pub users: Repository,
    executor: Arc<QueryExecutor>,
}

impl Storage {
    /// Normalizes `input` and creates the adapter.
    ///
    /// When called inside a Tokio runtime, bootstrap starts immediately in
    /// the background; otherwise it runs on the first operation. Either way
    /// it runs once, and every operation waits for it.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StorageError::InvalidConfiguration`] for malformed
    /// configuration. Setup errors surface from the first operation (or
    /// from [`Storage::ready`]).
    pub fn new(input: impl Into<ConfigInput>, defaults: ClientDefaults) -> StorageResult<Self> {
        let config = StorageConfig::from_input(input.into())?;
        Ok(Self::with_config(config, defaults))
    }

    /// Creates the adapter from an already-normalized configuration.
    #[must_use]
    pub fn with_config(config: StorageConfig, defaults: ClientDefaults) -> Self {
        let executor = Arc::new(QueryExecutor::new(config, defaults));

        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            let eager = Arc::clone(&executor);
            runtime.spawn(async move {
                let _ = eager.pool().await;
            });
        }

        Self {
            teams: Repository::new(Collection::Teams, Arc::clone(&executor)),
            channels: Repository::new(Collection::Channels, Arc::clone(&executor)),
            users: Repository::new(Collection::Users, Arc::clone(&executor)),
            executor,
        }
    }

    /// Creates the adapter and waits for bootstrap to finish.
    ///
    /// # Errors
    ///
    /// Returns configuration errors and setup errors.
    pub async fn connect(
        input: impl Into<ConfigInput>,
        defaults: ClientDefaults,
    ) -> StorageResult<Self> {
        let storage = Self::new(input, defaults)?;
        storage.ready().await?;
        Ok(storage)
    }

    /// Waits for the shared bootstrap to finish.
    ///
    /// # Errors
    ///
    /// Returns the memoized [`crate::StorageError::SetupFailure`].
    pub async fn ready(&self) -> StorageResult<()> {
        self.executor.pool().await.map(|_| ())
    }

    /// Repository for `collection`.
    #[must_use]
    pub const fn collection(&self, collection: Collection) -> &Repository {
        match collection {
            Collection::Teams => &self.teams,
            Collection::Channels => &self.channels,
            Collection::Users => &self.users,
        }
    }

    /// The normalized configuration in use.
    #[must_use]
    pub fn config(&self) -> &StorageConfig {
        self.executor.config()
    }

    /// Waits for bootstrap, then closes the pool. Operations issued after
    /// this fail.
    ///
    /// # Errors
    ///
    /// Returns the memoized setup error if bootstrap failed.
    pub async fn end(&self) -> StorageResult<()> {
        self.executor.close().await
    }

    /// Callback form of [`Storage::end`].
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn end_with<C>(&self, callback: C) -> JoinHandle<()>
    where
        C: FnOnce(StorageResult<()>) + Send + 'static,
    {
        let executor = Arc::clone(&self.executor);
        spawn_with_callback(async move { executor.close().await }, callback)
    }
}
