//! Persistence layer: PostgreSQL bootstrap and statement execution.
//!
//! [`bootstrap`] prepares the database and tables and builds the pool;
//! [`QueryExecutor`] memoizes that result and runs statements on borrowed
//! pool connections.

pub mod bootstrap;
pub mod executor;

pub use bootstrap::bootstrap;
pub use executor::QueryExecutor;
