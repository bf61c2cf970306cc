//! Write durability settings and database options.

use serde::{Deserialize, Serialize};

/// How many nodes must acknowledge a write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Acknowledgment {
    /// Acknowledged by the given number of nodes. Zero means fire-and-forget.
    Nodes(u32),
    /// Acknowledged by a majority of voting nodes.
    Majority,
    /// A named tag set configured on the server.
    Custom(String),
}

/// Durability options attached to every write.
///
/// Unset fields fall back to the database default when merged with
/// [`WriteConcern::merged_with`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteConcern {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub w: Option<Acknowledgment>,
    #[serde(default, rename = "j", skip_serializing_if = "Option::is_none")]
    pub journal: Option<bool>,
}

impl WriteConcern {
    /// No explicit options; everything comes from the default.
    pub fn inherit() -> Self {
        WriteConcern::default()
    }

    /// The fallback used when neither the caller nor the database configure anything:
    /// acknowledged by one node, no journal flush.
    pub fn acknowledged() -> Self {
        WriteConcern {
            w: Some(Acknowledgment::Nodes(1)),
            journal: Some(false),
        }
    }

    pub fn w(mut self, w: Acknowledgment) -> Self {
        self.w = Some(w);
        self
    }

    pub fn journal(mut self, journal: bool) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.w.is_none() && self.journal.is_none()
    }

    /// Fills every field this concern leaves unset from `defaults`.
    pub fn merged_with(self, defaults: &WriteConcern) -> WriteConcern {
        WriteConcern {
            w: self.w.or_else(|| defaults.w.clone()),
            journal: self.journal.or(defaults.journal),
        }
    }
}

/// Options for a [`Database`](crate::database::Database).
///
/// Deserializable so it can sit inside an application's own configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatabaseOptions {
    /// Overrides the backend's default write concern when set.
    #[serde(default)]
    pub write_concern: Option<WriteConcern>,
}
