//! Delete-and-recreate store rebuild.
//!
//! A rebuild never mutates the existing store. The previous file (and its
//! write-ahead log) is removed, a fresh store is created, and each artifact
//! that exists on disk becomes one table. Sources that declare their columns
//! get exactly those types, so an artifact holding only its header still
//! loads with a typed schema; other sources are type-inferred from the CSV.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::store::{AccessMode, StoreHandle};
use crate::{escape_sql_string, path_to_sql, WarehouseError};

/// One artifact to materialize as a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactSource {
    pub path: PathBuf,
    pub table: String,
    /// `(name, DuckDB type)` in header order; empty means infer.
    pub columns: Vec<(String, String)>,
}

impl ArtifactSource {
    pub fn new(path: impl Into<PathBuf>, table: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            table: table.into(),
            columns: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_columns<N, T>(mut self, columns: impl IntoIterator<Item = (N, T)>) -> Self
    where
        N: Into<String>,
        T: Into<String>,
    {
        self.columns = columns
            .into_iter()
            .map(|(name, column_type)| (name.into(), column_type.into()))
            .collect();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadedTable {
    pub table: String,
    pub artifact: PathBuf,
    pub row_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedTable {
    pub table: String,
    pub artifact: PathBuf,
}

/// Summary of one rebuild.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub store: PathBuf,
    pub loaded: Vec<LoadedTable>,
    pub skipped: Vec<SkippedTable>,
}

impl LoadReport {
    pub fn total_rows(&self) -> u64 {
        self.loaded.iter().map(|table| table.row_count).sum()
    }
}

/// Rebuilds the store file at a fixed path.
#[derive(Debug, Clone)]
pub struct StoreLoader {
    db_path: PathBuf,
}

impl StoreLoader {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
        }
    }

    pub fn db_path(&self) -> &Path {
        self.db_path.as_path()
    }

    /// Replace the store with one table per existing artifact.
    ///
    /// `previous` is an open handle to the current store, if the caller holds
    /// one; it is closed before the file is deleted. Missing artifacts are
    /// skipped with a warning and do not fail the rebuild. A failure while
    /// creating any table aborts the whole rebuild and leaves a store that
    /// must not be relied on.
    ///
    /// # Errors
    /// Returns [`WarehouseError::InvalidTableName`] or
    /// [`WarehouseError::InvalidColumnType`] before touching the store when a
    /// source is not safe to splice into SQL, [`WarehouseError::IoAt`] naming
    /// the path when the store file cannot be replaced, or the `DuckDB` error
    /// otherwise.
    pub fn rebuild(
        &self,
        previous: Option<StoreHandle>,
        sources: &[ArtifactSource],
    ) -> Result<LoadReport, WarehouseError> {
        for source in sources {
            validate_table_name(&source.table)?;
            for (_, column_type) in &source.columns {
                validate_column_type(column_type)?;
            }
        }

        if let Some(handle) = previous {
            debug!(store = %handle.path().display(), "closing previous store handle");
            handle.close()?;
        }

        if let Some(parent) = self.db_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(WarehouseError::io_at("cannot create store directory", parent))?;
            }
        }
        remove_if_exists(&self.db_path)?;
        remove_if_exists(&wal_path(&self.db_path))?;

        let store = StoreHandle::open(self.db_path.clone(), AccessMode::ReadWrite)?;
        let mut report = LoadReport {
            store: self.db_path.clone(),
            ..LoadReport::default()
        };

        for source in sources {
            if !source.path.is_file() {
                warn!(
                    table = %source.table,
                    artifact = %source.path.display(),
                    "artifact missing, skipping table"
                );
                report.skipped.push(SkippedTable {
                    table: source.table.clone(),
                    artifact: source.path.clone(),
                });
                continue;
            }

            let row_count = replace_table(&store, source)?;
            info!(table = %source.table, rows = row_count, "loaded table");
            report.loaded.push(LoadedTable {
                table: source.table.clone(),
                artifact: source.path.clone(),
                row_count,
            });
        }

        store.close()?;
        info!(
            store = %self.db_path.display(),
            tables = report.loaded.len(),
            skipped = report.skipped.len(),
            "store rebuilt"
        );
        Ok(report)
    }
}

fn replace_table(store: &StoreHandle, source: &ArtifactSource) -> Result<u64, WarehouseError> {
    let artifact = escape_sql_string(&path_to_sql(&source.path));
    let reader = if source.columns.is_empty() {
        format!("read_csv_auto('{artifact}', header = true)")
    } else {
        let columns = source
            .columns
            .iter()
            .map(|(name, column_type)| format!("'{}': '{column_type}'", escape_sql_string(name)))
            .collect::<Vec<_>>()
            .join(", ");
        format!("read_csv('{artifact}', header = true, columns = {{{columns}}})")
    };
    let sql = format!(
        "CREATE OR REPLACE TABLE {table} AS SELECT * FROM {reader}",
        table = source.table,
    );
    store.execute_batch(&sql)?;

    let count_sql = format!("SELECT COUNT(*) FROM {}", source.table);
    let row_count: i64 = store.query_row(&count_sql, [], |row| row.get(0))?;
    Ok(u64::try_from(row_count).unwrap_or_default())
}

fn validate_table_name(name: &str) -> Result<(), WarehouseError> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .is_some_and(|ch| ch.is_ascii_alphabetic() || ch == '_');
    if valid_start && chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_') {
        Ok(())
    } else {
        Err(WarehouseError::InvalidTableName(name.to_string()))
    }
}

fn validate_column_type(column_type: &str) -> Result<(), WarehouseError> {
    let valid = !column_type.is_empty()
        && column_type
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '_' | ' ' | '(' | ')' | ','));
    if valid {
        Ok(())
    } else {
        Err(WarehouseError::InvalidColumnType(column_type.to_string()))
    }
}

fn wal_path(db_path: &Path) -> PathBuf {
    let mut wal = db_path.as_os_str().to_owned();
    wal.push(".wal");
    PathBuf::from(wal)
}

fn remove_if_exists(path: &Path) -> Result<(), WarehouseError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(error) => Err(WarehouseError::io_at("cannot remove", path)(error)),
    }
}
