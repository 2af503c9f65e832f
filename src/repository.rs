use crate::database::DatabaseHandle;
use crate::error::{StoreError, StoreResult};
use crate::model::UserRecord;
use rusqlite::{params, Row};

const INSERT_OR_REPLACE: &str = "INSERT OR REPLACE INTO users (id, name, email) VALUES (?1, ?2, ?3)";
const SELECT_ALL: &str = "SELECT id, name, email FROM users";

/// Operations over the `users` table.
///
/// Both calls block the current thread on storage I/O. Use
/// [`crate::background::BackgroundRepository`] to run them elsewhere.
pub trait UserRepository {
    /// Write `record`, replacing any row with the same id.
    ///
    /// Returns the id of the written row. A failure leaves the table as it
    /// was before the call.
    fn insert(&self, record: &UserRecord) -> StoreResult<i64>;

    /// Every stored record, in whatever order SQLite returns them.
    fn get_all_users(&self) -> StoreResult<Vec<UserRecord>>;
}

/// [`UserRepository`] issuing literal SQL against a [`DatabaseHandle`]
#[derive(Debug, Clone)]
pub struct SqliteUserRepository {
    db: DatabaseHandle,
}

impl SqliteUserRepository {
    pub fn new(db: DatabaseHandle) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &DatabaseHandle {
        &self.db
    }
}

fn map_row(row: &Row<'_>) -> rusqlite::Result<UserRecord> {
    Ok(UserRecord {
        id: Some(row.get(0)?),
        name: row.get(1)?,
        email: row.get(2)?,
    })
}

impl UserRepository for SqliteUserRepository {
    fn insert(&self, record: &UserRecord) -> StoreResult<i64> {
        let id = self
            .db
            .with_connection(|conn| -> rusqlite::Result<i64> {
                conn.execute(
                    INSERT_OR_REPLACE,
                    params![record.insert_key(), record.name, record.email],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .map_err(StoreError::StorageWrite)?;

        tracing::debug!(id, explicit_id = record.insert_key().is_some(), "inserted user");
        Ok(id)
    }

    fn get_all_users(&self) -> StoreResult<Vec<UserRecord>> {
        let users = self
            .db
            .with_connection(|conn| -> rusqlite::Result<Vec<UserRecord>> {
                let mut stmt = conn.prepare(SELECT_ALL)?;
                let rows = stmt.query_map([], map_row)?;
                rows.collect()
            })
            .map_err(StoreError::StorageRead)?;

        tracing::debug!(count = users.len(), "loaded users");
        Ok(users)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assigned_ids_are_positive_and_distinct() {
        let repo = DatabaseHandle::open_in_memory().unwrap().repository();
        let a = repo.insert(&UserRecord::new("a", "a@example.com")).unwrap();
        let b = repo.insert(&UserRecord::new("b", "b@example.com")).unwrap();
        assert!(a > 0);
        assert_ne!(a, b);
    }

    #[test]
    fn explicit_id_is_kept() {
        let repo = DatabaseHandle::open_in_memory().unwrap().repository();
        let id = repo
            .insert(&UserRecord::new("x", "x@example.com").with_id(42))
            .unwrap();
        assert_eq!(id, 42);
        assert_eq!(repo.get_all_users().unwrap()[0].id, Some(42));
    }
}
