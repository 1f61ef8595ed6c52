//! # finlake warehouse
//!
//! DuckDB-backed relational store for finlake.
//!
//! The store is never updated in place. Every load deletes the store file and
//! rebuilds it from the per-domain CSV artifacts, one table per artifact, so
//! the store always reflects exactly the most recent successful load.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use finlake_warehouse::{ArtifactSource, QueryGuardrails, Warehouse, WarehouseConfig};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let warehouse = Warehouse::new(WarehouseConfig::for_home("."));
//!
//!     let report = warehouse.rebuild(&[ArtifactSource::new(
//!         "data/stock_prices.csv",
//!         "stock_prices",
//!     )])?;
//!     println!("loaded {} tables", report.loaded.len());
//!
//!     let result = warehouse.execute_query(
//!         "SELECT symbol, MAX(close) FROM stock_prices GROUP BY symbol",
//!         QueryGuardrails::default(),
//!     )?;
//!     println!("{} rows", result.row_count);
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`store`] | Scoped store handles |
//! | [`loader`] | Delete-and-recreate store rebuild from CSV artifacts |
//! | [`query`] | Named query definitions, execution, and result persistence |

pub mod loader;
pub mod query;
pub mod store;

use std::env;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use ::duckdb::types::{TimeUnit, Value as DuckValue};
use ::duckdb::Connection;
use ::duckdb::ToSql;
use serde::Serialize;
use serde_json::{Number, Value};
use thiserror::Error;
use time::macros::format_description;
use time::{Date, OffsetDateTime};

pub use loader::{ArtifactSource, LoadReport, LoadedTable, SkippedTable, StoreLoader};
pub use query::{QueryDefinition, QueryOutcome, QueryRunner, QueryState};
pub use store::{AccessMode, StoreHandle};

/// Errors that can occur during warehouse operations.
#[derive(Debug, Error)]
pub enum WarehouseError {
    /// `DuckDB` database error.
    #[error(transparent)]
    DuckDb(#[from] ::duckdb::Error),

    /// I/O error (file system operations).
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// I/O error on a known path.
    #[error("{action} {}: {source}", .path.display())]
    IoAt {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Result artifact could not be written.
    #[error(transparent)]
    Csv(#[from] csv::Error),

    /// Query was rejected due to policy violation.
    #[error("query rejected: {0}")]
    QueryRejected(String),

    /// Query execution timed out.
    #[error("query timed out after {timeout_ms}ms")]
    QueryTimeout { timeout_ms: u64 },

    /// A named query definition failed; carries the query name and the cause.
    #[error("query '{query}' failed: {source}")]
    QueryExecution {
        query: String,
        #[source]
        source: Box<WarehouseError>,
    },

    /// Table names come from artifact plans and must be plain identifiers.
    #[error("invalid table name '{0}'")]
    InvalidTableName(String),

    /// Declared artifact column types must be plain type names.
    #[error("invalid column type '{0}'")]
    InvalidColumnType(String),

    /// The store has not been built yet.
    #[error("store not found at {} (run the load stage first)", .0.display())]
    StoreMissing(PathBuf),

    /// No query definition with the requested name.
    #[error("query definition '{name}' not found in {}", .dir.display())]
    DefinitionNotFound { name: String, dir: PathBuf },
}

impl WarehouseError {
    pub(crate) fn io_at<'a>(
        action: &'static str,
        path: &'a Path,
    ) -> impl FnOnce(std::io::Error) -> Self + 'a {
        move |source| Self::IoAt {
            action,
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn for_query(query: &str, source: WarehouseError) -> Self {
        match source {
            already @ Self::QueryExecution { .. } => already,
            other => Self::QueryExecution {
                query: query.to_string(),
                source: Box::new(other),
            },
        }
    }
}

/// Filesystem layout of the warehouse side of a finlake home.
#[derive(Debug, Clone)]
pub struct WarehouseConfig {
    /// Project root.
    pub home: PathBuf,
    /// Path to the `DuckDB` store file.
    pub db_path: PathBuf,
    /// Directory of `*.sql` query definitions.
    pub queries_dir: PathBuf,
    /// Directory receiving one CSV per executed query.
    pub results_dir: PathBuf,
    /// Number of rows kept in each query preview.
    pub preview_rows: usize,
}

impl WarehouseConfig {
    pub fn for_home(home: impl Into<PathBuf>) -> Self {
        let home = home.into();
        Self {
            db_path: home.join("database").join("market_data.duckdb"),
            queries_dir: home.join("queries"),
            results_dir: home.join("results"),
            preview_rows: 5,
            home,
        }
    }
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self::for_home(resolve_home())
    }
}

/// Guardrails for query execution to prevent resource exhaustion.
#[derive(Debug, Clone, Copy)]
pub struct QueryGuardrails {
    /// Maximum number of rows to return.
    pub max_rows: usize,
    /// Query timeout in milliseconds.
    pub query_timeout_ms: u64,
}

impl Default for QueryGuardrails {
    fn default() -> Self {
        Self {
            max_rows: 10_000,
            query_timeout_ms: 5_000,
        }
    }
}

impl QueryGuardrails {
    /// No effective row or time limit.
    pub const fn unbounded() -> Self {
        Self {
            max_rows: usize::MAX,
            query_timeout_ms: u64::MAX,
        }
    }

    fn timeout(self) -> Duration {
        Duration::from_millis(self.query_timeout_ms.max(1))
    }

    fn validate(self) -> Result<(), WarehouseError> {
        if self.max_rows == 0 {
            return Err(WarehouseError::QueryRejected(String::from(
                "--max-rows must be greater than zero",
            )));
        }
        if self.query_timeout_ms == 0 {
            return Err(WarehouseError::QueryRejected(String::from(
                "--query-timeout-ms must be greater than zero",
            )));
        }
        Ok(())
    }
}

/// Column metadata for query results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SqlColumn {
    /// Column name.
    pub name: String,
    /// Column data type.
    #[serde(rename = "type")]
    pub r#type: String,
}

/// Result of a SQL query execution.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    /// Column definitions.
    pub columns: Vec<SqlColumn>,
    /// Row data as JSON values.
    pub rows: Vec<Vec<Value>>,
    /// Number of rows returned.
    pub row_count: usize,
    /// Whether results were truncated due to `max_rows`.
    pub truncated: bool,
}

/// Entry point tying the loader and the query side to one store location.
///
/// `Warehouse` holds no open connection. Every operation acquires a scoped
/// [`StoreHandle`] and releases it before returning.
#[derive(Debug, Clone)]
pub struct Warehouse {
    config: WarehouseConfig,
}

impl Warehouse {
    pub fn new(config: WarehouseConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &WarehouseConfig {
        &self.config
    }

    pub fn db_path(&self) -> &Path {
        self.config.db_path.as_path()
    }

    /// Rebuild the store from the given artifacts.
    ///
    /// See [`StoreLoader::rebuild`].
    pub fn rebuild(&self, sources: &[ArtifactSource]) -> Result<LoadReport, WarehouseError> {
        StoreLoader::new(self.config.db_path.clone()).rebuild(None, sources)
    }

    /// Open the store for reading.
    pub fn open_read_only(&self) -> Result<StoreHandle, WarehouseError> {
        if !self.config.db_path.exists() {
            return Err(WarehouseError::StoreMissing(self.config.db_path.clone()));
        }
        Ok(StoreHandle::open(
            self.config.db_path.clone(),
            AccessMode::ReadOnly,
        )?)
    }

    /// Query runner bound to this warehouse's query and result directories.
    pub fn query_runner(&self) -> QueryRunner {
        QueryRunner::from_config(&self.config)
    }

    /// Execute one ad-hoc read-only SQL statement with guardrails.
    pub fn execute_query(
        &self,
        sql: &str,
        guardrails: QueryGuardrails,
    ) -> Result<QueryResult, WarehouseError> {
        let store = self.open_read_only()?;
        let result = execute_guarded(&store, sql, guardrails);
        drop(store);
        result
    }
}

/// Validate and execute a read-only statement against an open connection.
pub fn execute_guarded(
    connection: &Connection,
    sql: &str,
    guardrails: QueryGuardrails,
) -> Result<QueryResult, WarehouseError> {
    guardrails.validate()?;
    let sql = normalize_sql(sql)?;
    enforce_read_only_query(sql)?;
    execute_select_query(connection, sql, guardrails, Instant::now())
}

fn execute_select_query(
    connection: &Connection,
    sql: &str,
    guardrails: QueryGuardrails,
    started: Instant,
) -> Result<QueryResult, WarehouseError> {
    let mut statement = connection.prepare(sql)?;
    // Column metadata is only available once the statement has run, so it is
    // read through the cursor of the single execution.
    let mut rows_cursor = statement.query([] as [&dyn ToSql; 0])?;
    let columns = rows_cursor.as_ref().map(columns_of).unwrap_or_default();
    let column_count = columns.len();

    let mut rows = Vec::new();
    let mut truncated = false;

    while let Some(row) = rows_cursor.next()? {
        ensure_timeout(started, guardrails.timeout())?;

        if rows.len() >= guardrails.max_rows {
            truncated = true;
            break;
        }

        rows.push(read_row(row, column_count)?);
    }

    ensure_timeout(started, guardrails.timeout())?;

    Ok(QueryResult {
        columns,
        row_count: rows.len(),
        rows,
        truncated,
    })
}

fn columns_of(statement: &::duckdb::Statement<'_>) -> Vec<SqlColumn> {
    (0..statement.column_count())
        .map(|index| SqlColumn {
            name: statement
                .column_name(index)
                .map_or_else(|_| format!("column_{index}"), ToString::to_string),
            r#type: statement.column_type(index).to_string(),
        })
        .collect()
}

fn read_row(row: &::duckdb::Row<'_>, column_count: usize) -> Result<Vec<Value>, ::duckdb::Error> {
    let mut output = Vec::with_capacity(column_count);
    for index in 0..column_count {
        let value: DuckValue = row.get(index)?;
        output.push(to_json_value(value));
    }
    Ok(output)
}

const UNIX_EPOCH_JULIAN_DAY: i32 = 2_440_588;

fn to_json_value(value: DuckValue) -> Value {
    match value {
        DuckValue::Null => Value::Null,
        DuckValue::Boolean(value) => Value::Bool(value),
        DuckValue::TinyInt(value) => Value::Number(Number::from(value)),
        DuckValue::SmallInt(value) => Value::Number(Number::from(value)),
        DuckValue::Int(value) => Value::Number(Number::from(value)),
        DuckValue::BigInt(value) => Value::Number(Number::from(value)),
        DuckValue::HugeInt(value) => i64::try_from(value)
            .map(|value| Value::Number(Number::from(value)))
            .unwrap_or_else(|_| Value::String(value.to_string())),
        DuckValue::UTinyInt(value) => Value::Number(Number::from(value)),
        DuckValue::USmallInt(value) => Value::Number(Number::from(value)),
        DuckValue::UInt(value) => Value::Number(Number::from(value)),
        DuckValue::UBigInt(value) => Value::Number(Number::from(value)),
        DuckValue::Float(value) => number_from_f64(f64::from(value)),
        DuckValue::Double(value) => number_from_f64(value),
        DuckValue::Decimal(value) => value
            .to_string()
            .parse::<f64>()
            .map_or(Value::Null, number_from_f64),
        DuckValue::Text(value) => Value::String(value),
        DuckValue::Date32(days) => format_date32(days),
        DuckValue::Timestamp(unit, value) => format_timestamp(unit, value),
        other => Value::String(format!("{other:?}")),
    }
}

/// Convert an f64 to a JSON number, returning Null for NaN/Inf.
fn number_from_f64(value: f64) -> Value {
    Number::from_f64(value)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

fn format_date32(days: i32) -> Value {
    let formatted = days
        .checked_add(UNIX_EPOCH_JULIAN_DAY)
        .and_then(|julian| Date::from_julian_day(julian).ok())
        .and_then(|date| date.format(format_description!("[year]-[month]-[day]")).ok());
    formatted.map_or_else(|| Value::String(format!("Date32({days})")), Value::String)
}

fn format_timestamp(unit: TimeUnit, value: i64) -> Value {
    let nanos = i128::from(value)
        * match unit {
            TimeUnit::Second => 1_000_000_000,
            TimeUnit::Millisecond => 1_000_000,
            TimeUnit::Microsecond => 1_000,
            TimeUnit::Nanosecond => 1,
        };
    let formatted = OffsetDateTime::from_unix_timestamp_nanos(nanos)
        .ok()
        .and_then(|ts| {
            ts.format(format_description!(
                "[year]-[month]-[day] [hour]:[minute]:[second]"
            ))
            .ok()
        });
    formatted.map_or_else(|| Value::String(value.to_string()), Value::String)
}

/// Trim whitespace, leading comments, and trailing semicolons.
fn normalize_sql(sql: &str) -> Result<&str, WarehouseError> {
    let normalized = strip_leading_comments(sql).trim_end_matches(';').trim();
    if normalized.is_empty() {
        return Err(WarehouseError::QueryRejected(String::from(
            "query must not be empty",
        )));
    }
    Ok(normalized)
}

fn strip_leading_comments(sql: &str) -> &str {
    let mut rest = sql.trim_start();
    loop {
        if let Some(line_comment) = rest.strip_prefix("--") {
            rest = line_comment
                .split_once('\n')
                .map_or("", |(_, tail)| tail)
                .trim_start();
        } else if let Some(block_comment) = rest.strip_prefix("/*") {
            rest = block_comment
                .split_once("*/")
                .map_or("", |(_, tail)| tail)
                .trim_start();
        } else {
            return rest;
        }
    }
}

fn enforce_read_only_query(sql: &str) -> Result<(), WarehouseError> {
    if !is_select_like(sql) {
        return Err(WarehouseError::QueryRejected(String::from(
            "only SELECT/CTE queries are accepted",
        )));
    }
    if has_multiple_statements(sql) {
        return Err(WarehouseError::QueryRejected(String::from(
            "multiple SQL statements are not allowed",
        )));
    }
    Ok(())
}

fn is_select_like(sql: &str) -> bool {
    let first_keyword = sql
        .split(|ch: char| ch.is_whitespace() || ch == '(')
        .find(|part| !part.is_empty())
        .unwrap_or_default()
        .to_ascii_uppercase();
    matches!(
        first_keyword.as_str(),
        "SELECT" | "WITH" | "EXPLAIN" | "SHOW" | "DESCRIBE"
    )
}

fn has_multiple_statements(sql: &str) -> bool {
    sql.split(';')
        .filter(|part| !part.trim().is_empty())
        .count()
        > 1
}

fn ensure_timeout(started: Instant, timeout: Duration) -> Result<(), WarehouseError> {
    if started.elapsed() > timeout {
        return Err(WarehouseError::QueryTimeout {
            timeout_ms: timeout.as_millis().min(u128::from(u64::MAX)) as u64,
        });
    }
    Ok(())
}

/// Resolve the finlake home directory from `FINLAKE_HOME`, falling back to
/// the current directory.
pub fn resolve_home() -> PathBuf {
    if let Some(path) = env::var_os("FINLAKE_HOME") {
        let path = PathBuf::from(path);
        if !path.as_os_str().is_empty() {
            return path;
        }
    }

    PathBuf::from(".")
}

/// Convert a path to a SQL-compatible string (forward slashes).
fn path_to_sql(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Escape a string for inclusion in a single-quoted SQL literal.
///
/// Only used for artifact paths chosen by the pipeline itself.
fn escape_sql_string(value: &str) -> String {
    value.replace('\'', "''")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn scratch_store(dir: &Path) -> StoreHandle {
        let handle =
            StoreHandle::open(dir.join("scratch.duckdb"), AccessMode::ReadWrite).expect("open");
        handle
            .execute_batch(
                "CREATE TABLE prices AS SELECT * FROM (VALUES \
                 ('JNJ', DATE '2024-01-02', 158.5), \
                 ('PFE', DATE '2024-01-02', 28.9)) t(symbol, date, close)",
            )
            .expect("seed");
        handle
    }

    #[test]
    fn leading_comments_are_ignored_when_classifying_queries() {
        let sql = "-- top movers\n/* block\ncomment */\n  select 1;";
        assert_eq!(normalize_sql(sql).expect("normalized"), "select 1");
        assert!(is_select_like(normalize_sql(sql).expect("normalized")));
    }

    #[test]
    fn parenthesized_select_is_select_like() {
        assert!(is_select_like("(SELECT 1) UNION ALL (SELECT 2)"));
    }

    #[test]
    fn write_statements_are_rejected() {
        let temp = tempdir().expect("tempdir");
        let store = scratch_store(temp.path());

        let error = execute_guarded(&store, "DROP TABLE prices", QueryGuardrails::default())
            .expect_err("should reject");
        assert!(matches!(error, WarehouseError::QueryRejected(_)));
    }

    #[test]
    fn multiple_statements_are_rejected() {
        let temp = tempdir().expect("tempdir");
        let store = scratch_store(temp.path());

        let error = execute_guarded(
            &store,
            "SELECT 1; SELECT 2",
            QueryGuardrails::default(),
        )
        .expect_err("should reject");
        assert!(matches!(error, WarehouseError::QueryRejected(_)));
    }

    #[test]
    fn dates_are_rendered_as_iso_strings() {
        let temp = tempdir().expect("tempdir");
        let store = scratch_store(temp.path());

        let result = execute_guarded(
            &store,
            "SELECT symbol, date, close FROM prices ORDER BY symbol",
            QueryGuardrails::default(),
        )
        .expect("query");

        assert_eq!(result.row_count, 2);
        assert_eq!(result.columns[1].name, "date");
        assert_eq!(result.rows[0][1], Value::String("2024-01-02".to_string()));
        assert_eq!(result.rows[0][0], Value::String("JNJ".to_string()));
    }

    #[test]
    fn statement_runs_once_and_still_reports_columns() {
        let temp = tempdir().expect("tempdir");
        let store = scratch_store(temp.path());
        store
            .execute_batch("CREATE SEQUENCE ticks START 1")
            .expect("sequence");

        let result = execute_guarded(
            &store,
            "SELECT nextval('ticks') AS tick",
            QueryGuardrails::default(),
        )
        .expect("query");

        assert_eq!(result.columns.len(), 1);
        assert_eq!(result.columns[0].name, "tick");
        assert_eq!(result.rows[0][0].as_i64(), Some(1));
    }

    #[test]
    fn max_rows_truncates_result() {
        let temp = tempdir().expect("tempdir");
        let store = scratch_store(temp.path());

        let result = execute_guarded(
            &store,
            "SELECT * FROM prices",
            QueryGuardrails {
                max_rows: 1,
                query_timeout_ms: 5_000,
            },
        )
        .expect("query");

        assert_eq!(result.row_count, 1);
        assert!(result.truncated);
    }

    #[test]
    fn zero_max_rows_is_rejected() {
        let temp = tempdir().expect("tempdir");
        let store = scratch_store(temp.path());

        let error = execute_guarded(
            &store,
            "SELECT 1",
            QueryGuardrails {
                max_rows: 0,
                query_timeout_ms: 5_000,
            },
        )
        .expect_err("should reject");
        assert!(matches!(error, WarehouseError::QueryRejected(_)));
    }

    #[test]
    fn query_execution_error_is_not_double_wrapped() {
        let inner = WarehouseError::for_query(
            "top_price",
            WarehouseError::QueryRejected("bad".to_string()),
        );
        let outer = WarehouseError::for_query("other", inner);
        match outer {
            WarehouseError::QueryExecution { query, .. } => assert_eq!(query, "top_price"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn date32_conversion_handles_epoch_offsets() {
        assert_eq!(format_date32(0), Value::String("1970-01-01".to_string()));
        assert_eq!(format_date32(19_724), Value::String("2024-01-02".to_string()));
    }

    #[test]
    fn missing_store_is_reported_before_opening() {
        let temp = tempdir().expect("tempdir");
        let warehouse = Warehouse::new(WarehouseConfig::for_home(temp.path()));

        let error = warehouse
            .execute_query("SELECT 1", QueryGuardrails::default())
            .expect_err("no store yet");
        assert!(matches!(error, WarehouseError::StoreMissing(_)));
    }
}
