//! Read-only access to stored user preferences.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A stored user as seen by the pipeline.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    /// Opaque user identifier.
    pub id: String,
    /// Display name, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Free-form preferences (target role, preferred cloud, ...).
    #[serde(default)]
    pub preferences: BTreeMap<String, serde_json::Value>,
}

impl UserRecord {
    /// Creates a record with no preferences.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Adds a preference.
    #[must_use]
    pub fn with_preference(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.preferences.insert(key.into(), value);
        self
    }
}

/// Lookup of users by ID. The pipeline never writes through this trait.
pub trait UserStore: Send + Sync {
    /// Returns the user, if known.
    fn get(&self, user_id: &str) -> Option<UserRecord>;
}

/// A concurrent in-memory user store.
#[derive(Debug, Default)]
pub struct InMemoryUserStore {
    users: DashMap<String, UserRecord>,
}

impl InMemoryUserStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a user.
    pub fn insert(&self, user: UserRecord) {
        self.users.insert(user.id.clone(), user);
    }

    /// Returns the number of stored users.
    #[must_use]
    pub fn len(&self) -> usize {
        self.users.len()
    }

    /// Returns true if the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

impl UserStore for InMemoryUserStore {
    fn get(&self, user_id: &str) -> Option<UserRecord> {
        self.users.get(user_id).map(|entry| entry.value().clone())
    }
}
