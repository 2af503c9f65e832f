use crate::context::AppContext;
use crate::error::{StoreError, StoreResult};
use crate::repository::SqliteUserRepository;
use crate::sqlite::{ColumnInfo, Schema, SqliteConfig, SCHEMA_VERSION};
use once_cell::sync::OnceCell;
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

const IN_MEMORY: &str = ":memory:";

static USER_DATABASE: OnceCell<Arc<Database>> = OnceCell::new();

/// An open store. Statements are serialized on the connection mutex, which
/// is held only for the duration of one statement.
#[derive(Debug)]
pub struct Database {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl Database {
    fn open(config: &SqliteConfig) -> StoreResult<Self> {
        let path = &config.db_path;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::StorageDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let label = path.display().to_string();
        tracing::debug!(path = %label, "opening sqlite store");
        let conn = Connection::open(path).map_err(|e| StoreError::init(&label, e))?;
        initialize_schema(&conn, &config.schema, &label)?;

        Ok(Self {
            conn: Mutex::new(conn),
            path: Some(path.clone()),
        })
    }

    fn open_in_memory(schema: &Schema) -> StoreResult<Self> {
        let conn = Connection::open_in_memory().map_err(|e| StoreError::init(IN_MEMORY, e))?;
        initialize_schema(&conn, schema, IN_MEMORY)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: None,
        })
    }
}

// Checks existing tables against `schema`, creates missing ones, and stamps
// fresh files with the schema version. Files written by a newer schema, or
// holding a differently shaped table, are refused rather than migrated.
fn initialize_schema(conn: &Connection, schema: &Schema, label: &str) -> StoreResult<()> {
    let found: i64 = conn
        .pragma_query_value(None, "user_version", |row| row.get(0))
        .map_err(|e| StoreError::init(label, e))?;
    if found > SCHEMA_VERSION {
        return Err(StoreError::UnsupportedSchemaVersion {
            found,
            supported: SCHEMA_VERSION,
        });
    }

    for table in &schema.tables {
        let existing = table_columns(conn, &table.name).map_err(|e| StoreError::init(label, e))?;
        if existing.is_empty() {
            continue;
        }
        if let Some(detail) = table.diff(&existing) {
            return Err(StoreError::SchemaMismatch {
                table: table.name.clone(),
                detail,
            });
        }
    }

    conn.execute_batch(&schema.to_sql())
        .map_err(|e| StoreError::init(label, e))?;

    if found == 0 {
        conn.pragma_update(None, "user_version", SCHEMA_VERSION)
            .map_err(|e| StoreError::init(label, e))?;
        tracing::debug!(path = %label, version = SCHEMA_VERSION, "stamped schema version");
    }
    Ok(())
}

// Empty when the table does not exist.
fn table_columns(conn: &Connection, table: &str) -> rusqlite::Result<Vec<ColumnInfo>> {
    let mut stmt =
        conn.prepare("SELECT name, type, \"notnull\", pk FROM pragma_table_info(?1) ORDER BY cid")?;
    let rows = stmt.query_map([table], |row| {
        Ok(ColumnInfo {
            name: row.get(0)?,
            decl_type: row.get(1)?,
            not_null: row.get(2)?,
            primary_key: row.get::<_, i64>(3)? > 0,
        })
    })?;
    rows.collect()
}

// Single construction even under concurrent first use: `get_or_try_init`
// blocks other callers while one opens the store, and a failed open leaves
// the cell empty.
fn open_shared(cell: &OnceCell<Arc<Database>>, path: &Path) -> StoreResult<Arc<Database>> {
    cell.get_or_try_init(|| {
        let db = Database::open(&SqliteConfig::users(path))?;
        tracing::info!(path = %path.display(), "opened process-wide user database");
        Ok::<_, StoreError>(Arc::new(db))
    })
    .map(Arc::clone)
}

/// Shared handle to the user store.
///
/// [`DatabaseHandle::get`] hands out the single process-wide store.
/// [`DatabaseHandle::open`] and [`DatabaseHandle::open_in_memory`] build
/// independent stores that are not registered anywhere.
#[derive(Clone)]
pub struct DatabaseHandle {
    inner: Arc<Database>,
}

impl DatabaseHandle {
    /// Return the process-wide store, opening `<data_dir>/user-database` on
    /// first use.
    ///
    /// The first successful caller decides the location. Later callers get
    /// that same store whatever context they pass.
    pub fn get(context: &AppContext) -> StoreResult<Self> {
        let path = context.database_path();
        let inner = open_shared(&USER_DATABASE, &path)?;

        if inner.path.as_deref() != Some(path.as_path()) {
            tracing::warn!(
                requested = %path.display(),
                "user database already open at another location; returning existing instance"
            );
        }
        Ok(Self { inner })
    }

    /// Open a standalone store described by `config`.
    pub fn open(config: SqliteConfig) -> StoreResult<Self> {
        Ok(Self {
            inner: Arc::new(Database::open(&config)?),
        })
    }

    /// Open a standalone user store held entirely in memory.
    pub fn open_in_memory() -> StoreResult<Self> {
        Ok(Self {
            inner: Arc::new(Database::open_in_memory(&Schema::users())?),
        })
    }

    pub fn repository(&self) -> SqliteUserRepository {
        SqliteUserRepository::new(self.clone())
    }

    /// File backing this store, `None` for in-memory stores
    pub fn path(&self) -> Option<&Path> {
        self.inner.path.as_deref()
    }

    /// Whether both handles refer to the same underlying store
    pub fn same_store(&self, other: &DatabaseHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn schema_version(&self) -> StoreResult<i64> {
        self.with_connection(|conn| {
            conn.pragma_query_value(None, "user_version", |row| row.get(0))
                .map_err(StoreError::StorageRead)
        })
    }

    /// Run `f` with exclusive access to the connection.
    pub fn with_connection<T>(&self, f: impl FnOnce(&Connection) -> T) -> T {
        // A panic elsewhere cannot leave the connection half-updated: every
        // statement is atomic inside SQLite.
        let conn = self
            .inner
            .conn
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        f(&conn)
    }
}

impl std::fmt::Debug for DatabaseHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseHandle")
            .field("path", &self.inner.path)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Barrier;
    use std::thread;

    #[test]
    fn concurrent_first_use_constructs_once() {
        const CALLERS: usize = 16;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("user-database");
        let cell = Arc::new(OnceCell::new());
        let barrier = Arc::new(Barrier::new(CALLERS));

        let handles: Vec<_> = (0..CALLERS)
            .map(|_| {
                let cell = Arc::clone(&cell);
                let barrier = Arc::clone(&barrier);
                let path = path.clone();
                thread::spawn(move || {
                    barrier.wait();
                    open_shared(&cell, &path).unwrap()
                })
            })
            .collect();

        let dbs: Vec<Arc<Database>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(dbs.iter().all(|db| Arc::ptr_eq(db, &dbs[0])));
        assert!(Arc::ptr_eq(cell.get().unwrap(), &dbs[0]));
    }

    #[test]
    fn failed_open_leaves_cell_empty() {
        let blocker = tempfile::NamedTempFile::new().unwrap();
        let cell = OnceCell::new();

        // The parent "directory" is a regular file, so it cannot be created.
        let bad = blocker.path().join("sub").join("user-database");
        let err = open_shared(&cell, &bad).unwrap_err();
        assert!(err.is_init(), "unexpected error: {err}");
        assert!(cell.get().is_none());

        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("user-database");
        let db = open_shared(&cell, &good).unwrap();
        assert_eq!(db.path.as_deref(), Some(good.as_path()));
    }

    #[test]
    fn fresh_store_is_version_one() {
        let db = DatabaseHandle::open_in_memory().unwrap();
        assert_eq!(db.schema_version().unwrap(), SCHEMA_VERSION);
        assert!(db.path().is_none());
    }

    #[test]
    fn clones_share_the_store() {
        let a = DatabaseHandle::open_in_memory().unwrap();
        let b = a.clone();
        let c = DatabaseHandle::open_in_memory().unwrap();
        assert!(a.same_store(&b));
        assert!(!a.same_store(&c));
    }

    #[test]
    fn creates_missing_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("user-database");
        let db = DatabaseHandle::open(SqliteConfig::users(&path)).unwrap();
        assert_eq!(db.path(), Some(path.as_path()));
        assert!(path.exists());
    }

    #[test]
    fn reopening_keeps_version() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("user-database");
        drop(DatabaseHandle::open(SqliteConfig::users(&path)).unwrap());
        let db = DatabaseHandle::open(SqliteConfig::users(&path)).unwrap();
        assert_eq!(db.schema_version().unwrap(), SCHEMA_VERSION);
    }
}
