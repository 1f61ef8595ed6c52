//! Named query definitions and result persistence.
//!
//! Each `*.sql` file in the queries directory is one definition; its file stem
//! names the result artifact written to `results/<stem>.csv`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::store::StoreHandle;
use crate::{execute_guarded, QueryGuardrails, SqlColumn, WarehouseConfig, WarehouseError};

/// Lifecycle of one query definition within a run.
///
/// `Pending -> Executing -> Succeeded -> Persisted` on success and
/// `Pending -> Executing -> Failed -> Reported` on failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryState {
    Pending,
    Executing,
    Succeeded,
    Persisted,
    Failed,
    Reported,
}

impl QueryState {
    /// Next state after `self`, given whether the step succeeded.
    ///
    /// Terminal states stay where they are.
    pub const fn advance(self, ok: bool) -> Self {
        match (self, ok) {
            (Self::Pending, _) => Self::Executing,
            (Self::Executing, true) => Self::Succeeded,
            (Self::Executing, false) | (Self::Succeeded, false) => Self::Failed,
            (Self::Succeeded, true) => Self::Persisted,
            (Self::Failed, _) => Self::Reported,
            (terminal, _) => terminal,
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Persisted | Self::Reported)
    }
}

/// A single `*.sql` file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryDefinition {
    pub name: String,
    pub path: PathBuf,
    pub sql: String,
}

impl QueryDefinition {
    pub fn from_path(path: impl Into<PathBuf>) -> Result<Self, WarehouseError> {
        let path = path.into();
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        let sql = fs::read_to_string(&path)
            .map_err(|error| WarehouseError::for_query(&name, error.into()))?;
        Ok(Self { name, path, sql })
    }
}

/// Result of a persisted query.
#[derive(Debug, Clone, Serialize)]
pub struct QueryOutcome {
    pub name: String,
    pub state: QueryState,
    pub result_path: PathBuf,
    pub columns: Vec<SqlColumn>,
    pub row_count: usize,
    pub preview: Vec<Vec<Value>>,
    pub elapsed_ms: u64,
}

/// Executes query definitions against a read-only store handle.
///
/// Definitions run to completion with no row or time limit unless
/// [`QueryRunner::with_guardrails`] sets one.
#[derive(Debug, Clone)]
pub struct QueryRunner {
    queries_dir: PathBuf,
    results_dir: PathBuf,
    preview_rows: usize,
    guardrails: QueryGuardrails,
}

impl QueryRunner {
    pub fn new(queries_dir: impl Into<PathBuf>, results_dir: impl Into<PathBuf>) -> Self {
        Self {
            queries_dir: queries_dir.into(),
            results_dir: results_dir.into(),
            preview_rows: 5,
            guardrails: QueryGuardrails::unbounded(),
        }
    }

    pub fn from_config(config: &WarehouseConfig) -> Self {
        Self::new(config.queries_dir.clone(), config.results_dir.clone())
            .with_preview_rows(config.preview_rows)
    }

    #[must_use]
    pub fn with_preview_rows(mut self, preview_rows: usize) -> Self {
        self.preview_rows = preview_rows;
        self
    }

    #[must_use]
    pub fn with_guardrails(mut self, guardrails: QueryGuardrails) -> Self {
        self.guardrails = guardrails;
        self
    }

    pub fn queries_dir(&self) -> &Path {
        self.queries_dir.as_path()
    }

    pub fn results_dir(&self) -> &Path {
        self.results_dir.as_path()
    }

    /// All `*.sql` definitions, sorted by name.
    pub fn definitions(&self) -> Result<Vec<QueryDefinition>, WarehouseError> {
        if !self.queries_dir.is_dir() {
            warn!(dir = %self.queries_dir.display(), "queries directory missing");
            return Ok(Vec::new());
        }

        let mut paths = Vec::new();
        for entry in fs::read_dir(&self.queries_dir)? {
            let path = entry?.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "sql") {
                paths.push(path);
            }
        }
        paths.sort();

        paths.into_iter().map(QueryDefinition::from_path).collect()
    }

    /// Look up one definition by its stem.
    pub fn definition(&self, name: &str) -> Result<QueryDefinition, WarehouseError> {
        let path = self.queries_dir.join(format!("{name}.sql"));
        if !path.is_file() {
            return Err(WarehouseError::DefinitionNotFound {
                name: name.to_string(),
                dir: self.queries_dir.clone(),
            });
        }
        QueryDefinition::from_path(path)
    }

    /// Execute `definition` and persist its result set.
    ///
    /// Every failure is returned as [`WarehouseError::QueryExecution`] naming
    /// the definition. A failed query never leaves a partial result file.
    pub fn run(
        &self,
        store: &StoreHandle,
        definition: &QueryDefinition,
    ) -> Result<QueryOutcome, WarehouseError> {
        self.run_inner(store, definition)
            .map_err(|error| WarehouseError::for_query(&definition.name, error))
    }

    /// Execute the definition named `name`.
    pub fn run_named(&self, store: &StoreHandle, name: &str) -> Result<QueryOutcome, WarehouseError> {
        let definition = self.definition(name)?;
        self.run(store, &definition)
    }

    fn run_inner(
        &self,
        store: &StoreHandle,
        definition: &QueryDefinition,
    ) -> Result<QueryOutcome, WarehouseError> {
        let started = Instant::now();
        let mut state = QueryState::Pending.advance(true);
        debug!(query = %definition.name, ?state, "executing query");

        let result = execute_guarded(store, &definition.sql, self.guardrails)?;
        if result.truncated {
            return Err(WarehouseError::QueryRejected(format!(
                "result exceeds {} rows",
                self.guardrails.max_rows
            )));
        }
        state = state.advance(true);

        fs::create_dir_all(&self.results_dir).map_err(WarehouseError::io_at(
            "cannot create results directory",
            &self.results_dir,
        ))?;
        let result_path = self.results_dir.join(format!("{}.csv", definition.name));
        write_result_csv(&result_path, &result.columns, &result.rows)?;
        state = state.advance(true);

        let preview: Vec<Vec<Value>> = result
            .rows
            .iter()
            .take(self.preview_rows)
            .cloned()
            .collect();
        info!(
            query = %definition.name,
            rows = result.row_count,
            result = %result_path.display(),
            "query persisted"
        );

        Ok(QueryOutcome {
            name: definition.name.clone(),
            state,
            result_path,
            columns: result.columns,
            row_count: result.row_count,
            preview,
            elapsed_ms: started.elapsed().as_millis().min(u128::from(u64::MAX)) as u64,
        })
    }
}

fn write_result_csv(
    path: &Path,
    columns: &[SqlColumn],
    rows: &[Vec<Value>],
) -> Result<(), WarehouseError> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    let written = write_rows(&tmp, columns, rows);

    match written {
        Ok(()) => {
            fs::rename(&tmp, path)?;
            Ok(())
        }
        Err(error) => {
            let _ = fs::remove_file(&tmp);
            Err(error)
        }
    }
}

fn write_rows(path: &Path, columns: &[SqlColumn], rows: &[Vec<Value>]) -> Result<(), WarehouseError> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(columns.iter().map(|column| column.name.as_str()))?;
    for row in rows {
        writer.write_record(row.iter().map(csv_cell))?;
    }
    writer.flush()?;
    Ok(())
}

fn csv_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::AccessMode;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn state_machine_follows_success_and_failure_paths() {
        let success = QueryState::Pending
            .advance(true)
            .advance(true)
            .advance(true);
        assert_eq!(success, QueryState::Persisted);
        assert!(success.is_terminal());

        let failure = QueryState::Pending.advance(true).advance(false).advance(true);
        assert_eq!(failure, QueryState::Reported);
        assert_eq!(failure.advance(true), QueryState::Reported);
    }

    #[test]
    fn null_values_become_empty_cells() {
        assert_eq!(csv_cell(&Value::Null), "");
        assert_eq!(csv_cell(&json!("JNJ")), "JNJ");
        assert_eq!(csv_cell(&json!(158.5)), "158.5");
        assert_eq!(csv_cell(&json!(42)), "42");
    }

    #[test]
    fn definitions_are_sorted_and_ignore_other_files() {
        let temp = tempdir().expect("tempdir");
        let queries = temp.path().join("queries");
        fs::create_dir_all(&queries).expect("mkdir");
        fs::write(queries.join("zeta.sql"), "SELECT 1").expect("write");
        fs::write(queries.join("alpha.sql"), "SELECT 2").expect("write");
        fs::write(queries.join("notes.txt"), "not sql").expect("write");

        let runner = QueryRunner::new(&queries, temp.path().join("results"));
        let names: Vec<String> = runner
            .definitions()
            .expect("definitions")
            .into_iter()
            .map(|definition| definition.name)
            .collect();

        assert_eq!(names, vec!["alpha".to_string(), "zeta".to_string()]);
    }

    #[test]
    fn missing_queries_directory_yields_no_definitions() {
        let temp = tempdir().expect("tempdir");
        let runner = QueryRunner::new(temp.path().join("absent"), temp.path().join("results"));
        assert!(runner.definitions().expect("definitions").is_empty());
    }

    #[test]
    fn unknown_definition_is_reported_by_name() {
        let temp = tempdir().expect("tempdir");
        let runner = QueryRunner::new(temp.path(), temp.path().join("results"));
        let error = runner.definition("nope").expect_err("missing");
        assert!(matches!(error, WarehouseError::DefinitionNotFound { .. }));
    }

    #[test]
    fn definitions_are_unbounded_unless_guarded() {
        let temp = tempdir().expect("tempdir");
        let db_path = temp.path().join("store.duckdb");
        let store = StoreHandle::open(&db_path, AccessMode::ReadWrite).expect("open");
        let results = temp.path().join("results");

        let runner = QueryRunner::new(temp.path(), &results);
        let definition = QueryDefinition {
            name: "wide".to_string(),
            path: temp.path().join("wide.sql"),
            sql: "SELECT * FROM range(20000)".to_string(),
        };

        let outcome = runner.run(&store, &definition).expect("runs to completion");
        assert_eq!(outcome.row_count, 20_000);
        let persisted = fs::read_to_string(results.join("wide.csv")).expect("result");
        assert_eq!(persisted.lines().count(), 20_001);
    }

    #[test]
    fn result_too_large_fails_without_writing_file() {
        let temp = tempdir().expect("tempdir");
        let db_path = temp.path().join("store.duckdb");
        let store = StoreHandle::open(&db_path, AccessMode::ReadWrite).expect("open");
        let results = temp.path().join("results");

        let runner = QueryRunner::new(temp.path(), &results).with_guardrails(QueryGuardrails {
            max_rows: 2,
            query_timeout_ms: 5_000,
        });
        let definition = QueryDefinition {
            name: "many".to_string(),
            path: temp.path().join("many.sql"),
            sql: "SELECT * FROM range(10)".to_string(),
        };

        let error = runner.run(&store, &definition).expect_err("too many rows");
        match error {
            WarehouseError::QueryExecution { query, .. } => assert_eq!(query, "many"),
            other => panic!("unexpected error: {other}"),
        }
        assert!(!results.join("many.csv").exists());
    }
}
