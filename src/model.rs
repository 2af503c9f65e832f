use serde::{Deserialize, Serialize};
use std::fmt;

/// One row of the `users` table.
///
/// `id` is `None` until the store assigns one on insert. A record carrying
/// an explicit id replaces the row with that id when inserted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub name: String,
    pub email: String,
}

impl UserRecord {
    /// Create a record that has not been persisted yet
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            email: email.into(),
        }
    }

    /// Set an explicit primary key
    pub fn with_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }

    /// Key to bind on insert. Zero counts as unset so the store assigns one.
    pub(crate) fn insert_key(&self) -> Option<i64> {
        self.id.filter(|id| *id != 0)
    }
}

// Log line format: "<id>: <name> - <email>"
impl fmt::Display for UserRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} - {}", self.id.unwrap_or(0), self.name, self.email)
    }
}
