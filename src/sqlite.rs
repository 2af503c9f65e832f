use crate::error::{StoreError, StoreResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Logical file name of the user store inside the application data directory
pub const DATABASE_NAME: &str = "user-database";

/// Only schema version this crate creates or accepts. There are no migrations.
pub const SCHEMA_VERSION: i64 = 1;

/// Name of the table holding user records
pub const USERS_TABLE: &str = "users";

/// Schema definition for the SQLite database
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub tables: Vec<TableDefinition>,
}

impl Schema {
    pub fn new() -> Self {
        Self { tables: Vec::new() }
    }

    pub fn add_table(mut self, table: TableDefinition) -> Self {
        self.tables.push(table);
        self
    }

    /// The fixed schema of the user store
    pub fn users() -> Self {
        Self::new().add_table(
            TableDefinition::new(USERS_TABLE)
                .add_column(
                    ColumnDefinition::new("id", DataType::Integer)
                        .with_constraint(ColumnConstraint::PrimaryKey)
                        .with_constraint(ColumnConstraint::AutoIncrement),
                )
                .add_column(
                    ColumnDefinition::new("name", DataType::Text)
                        .with_constraint(ColumnConstraint::NotNull),
                )
                .add_column(
                    ColumnDefinition::new("email", DataType::Text)
                        .with_constraint(ColumnConstraint::NotNull),
                ),
        )
    }

    /// DDL creating every table that does not exist yet
    pub fn to_sql(&self) -> String {
        self.tables
            .iter()
            .map(|table| format!("{};", table.create_statement()))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Render the schema as a versioned JSON document.
    pub fn export_json(&self, version: i64) -> StoreResult<String> {
        let doc = SchemaExport {
            version,
            tables: &self.tables,
        };
        Ok(serde_json::to_string_pretty(&doc)?)
    }

    /// Write `<dir>/<version>.json`, creating `dir` if needed.
    pub fn export_to_dir(&self, dir: impl AsRef<Path>, version: i64) -> StoreResult<PathBuf> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir).map_err(|e| StoreError::io(dir, e))?;
        let file = dir.join(format!("{version}.json"));
        std::fs::write(&file, self.export_json(version)?).map_err(|e| StoreError::io(&file, e))?;
        tracing::debug!(path = %file.display(), version, "exported schema");
        Ok(file)
    }
}

#[derive(Serialize)]
struct SchemaExport<'a> {
    version: i64,
    tables: &'a [TableDefinition],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDefinition {
    pub name: String,
    pub columns: Vec<ColumnDefinition>,
}

impl TableDefinition {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            columns: Vec::new(),
        }
    }

    pub fn add_column(mut self, column: ColumnDefinition) -> Self {
        self.columns.push(column);
        self
    }

    /// Describe the first way `found` differs from this definition, if any.
    pub fn diff(&self, found: &[ColumnInfo]) -> Option<String> {
        if found.len() != self.columns.len() {
            let expected: Vec<&str> = self.columns.iter().map(|c| c.name.as_str()).collect();
            let actual: Vec<&str> = found.iter().map(|c| c.name.as_str()).collect();
            return Some(format!(
                "expected columns ({}), found ({})",
                expected.join(", "),
                actual.join(", ")
            ));
        }
        self.columns
            .iter()
            .zip(found)
            .find(|(column, info)| !column.matches(info))
            .map(|(column, info)| format!("expected `{}`, found `{}`", column.to_sql(), info))
    }

    fn create_statement(&self) -> String {
        let columns = self
            .columns
            .iter()
            .map(ColumnDefinition::to_sql)
            .collect::<Vec<_>>()
            .join(", ");
        format!("CREATE TABLE IF NOT EXISTS {} ({})", self.name, columns)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    pub name: String,
    pub data_type: DataType,
    pub constraints: Vec<ColumnConstraint>,
}

impl ColumnDefinition {
    pub fn new(name: &str, data_type: DataType) -> Self {
        Self {
            name: name.to_string(),
            data_type,
            constraints: Vec::new(),
        }
    }

    pub fn with_constraint(mut self, constraint: ColumnConstraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    fn matches(&self, info: &ColumnInfo) -> bool {
        self.name == info.name
            && info.decl_type.eq_ignore_ascii_case(self.data_type.as_sql())
            && self.constraints.contains(&ColumnConstraint::NotNull) == info.not_null
            && self.constraints.contains(&ColumnConstraint::PrimaryKey) == info.primary_key
    }

    fn to_sql(&self) -> String {
        let mut sql = format!("{} {}", self.name, self.data_type.as_sql());
        for constraint in &self.constraints {
            sql.push(' ');
            sql.push_str(constraint.as_sql());
        }
        sql
    }
}

/// A column as reported by `PRAGMA table_info` on an existing table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    pub decl_type: String,
    pub not_null: bool,
    pub primary_key: bool,
}

impl fmt::Display for ColumnInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.decl_type)?;
        if self.primary_key {
            f.write_str(" PRIMARY KEY")?;
        }
        if self.not_null {
            f.write_str(" NOT NULL")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DataType {
    Integer,
    Text,
}

impl DataType {
    fn as_sql(self) -> &'static str {
        match self {
            DataType::Integer => "INTEGER",
            DataType::Text => "TEXT",
        }
    }
}

/// Column constraints, rendered in declaration order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnConstraint {
    PrimaryKey,
    AutoIncrement,
    NotNull,
}

impl ColumnConstraint {
    fn as_sql(self) -> &'static str {
        match self {
            ColumnConstraint::PrimaryKey => "PRIMARY KEY",
            ColumnConstraint::AutoIncrement => "AUTOINCREMENT",
            ColumnConstraint::NotNull => "NOT NULL",
        }
    }
}

/// SQLite store configuration
#[derive(Debug, Clone, PartialEq)]
pub struct SqliteConfig {
    /// Path to the SQLite database file
    pub db_path: PathBuf,
    /// Schema installed when the store is opened
    pub schema: Schema,
}

impl SqliteConfig {
    /// Create a new SQLite config with path and schema
    pub fn new(db_path: impl Into<PathBuf>, schema: Schema) -> Self {
        Self {
            db_path: db_path.into(),
            schema,
        }
    }

    /// The user store at `path`
    pub fn users(db_path: impl Into<PathBuf>) -> Self {
        Self::new(db_path, Schema::users())
    }
}
