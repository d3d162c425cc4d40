//! The three fixed record collections.
//!
//! Each [`Collection`] maps 1:1 to a physical table with the schema
//! `(id CHAR(50) PRIMARY KEY, json TEXT NOT NULL)`. Table names come from
//! this closed set only, which is what makes interpolating them into SQL
//! text safe.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::StorageError;

/// A logical record collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    /// Workspace/team records.
    Teams,
    /// Channel records.
    Channels,
    /// User records.
    Users,
}

impl Collection {
    /// Every collection, in table-creation order.
    pub const ALL: [Self; 3] = [Self::Teams, Self::Users, Self::Channels];

    /// Physical table backing this collection.
    #[must_use]
    pub const fn table_name(self) -> &'static str {
        match self {
            Self::Teams => "botkit_teams",
            Self::Channels => "botkit_channels",
            Self::Users => "botkit_users",
        }
    }

    /// Short logical name (`teams`, `channels`, `users`).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Teams => "teams",
            Self::Channels => "channels",
            Self::Users => "users",
        }
    }

    /// Idempotent `CREATE TABLE` statement for this collection.
    #[must_use]
    pub fn create_table_sql(self) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {} (id CHAR(50) NOT NULL PRIMARY KEY, json TEXT NOT NULL)",
            self.table_name()
        )
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Collection {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "teams" | "team" => Ok(Self::Teams),
            "channels" | "channel" => Ok(Self::Channels),
            "users" | "user" => Ok(Self::Users),
            other => Err(StorageError::InvalidConfiguration(format!(
                "unknown collection '{other}' (expected teams, channels or users)"
            ))),
        }
    }
}
