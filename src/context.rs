use crate::error::StoreResult;
use crate::sqlite::DATABASE_NAME;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// The application's private storage area.
///
/// Parsed from TOML with a single key:
///
/// ```toml
/// data_dir = "/var/lib/app"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AppContext {
    data_dir: PathBuf,
}

impl AppContext {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn from_toml_str(input: &str) -> StoreResult<Self> {
        Ok(toml::from_str(input)?)
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Location of the user store file
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(DATABASE_NAME)
    }
}
