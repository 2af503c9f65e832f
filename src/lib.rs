//! Process-wide SQLite user store.
//!
//! # Intention
//!
//! - Hand out exactly one open store per process through [`DatabaseHandle::get`].
//! - Expose user records through a small repository: insert with
//!   replace-on-conflict, and list all rows.
//!
//! # Architectural Boundaries
//!
//! - Only storage code belongs here. Callers decide where blocking calls run;
//!   [`BackgroundRepository`] is provided for moving them off-thread.
//! - Schema version 1 is the only version. There are no migrations.
//!
//! ```no_run
//! use user_database::{AppContext, DatabaseHandle, UserRecord, UserRepository};
//!
//! # fn main() -> user_database::StoreResult<()> {
//! let db = DatabaseHandle::get(&AppContext::new("data"))?;
//! let users = db.repository();
//! users.insert(&UserRecord::new("Rute", "rute@gmail.com"))?;
//! for user in users.get_all_users()? {
//!     println!("{user}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod background;
pub mod context;
pub mod database;
pub mod error;
pub mod model;
pub mod repository;
pub mod sqlite;

pub use background::{AsyncUserRepository, BackgroundRepository};
pub use context::AppContext;
pub use database::DatabaseHandle;
pub use error::{StoreError, StoreResult};
pub use model::UserRecord;
pub use repository::{SqliteUserRepository, UserRepository};
pub use sqlite::{Schema, SqliteConfig, DATABASE_NAME, SCHEMA_VERSION};
