//! Behavior-driven tests for the finlake warehouse
//!
//! These tests verify how the store is rebuilt from CSV artifacts and how
//! query definitions are executed and persisted, focusing on what an operator
//! sees on disk and in the store.

use finlake_warehouse::{
    ArtifactSource, QueryGuardrails, QueryState, StoreLoader, Warehouse, WarehouseConfig,
    WarehouseError,
};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

const PRICES_CSV: &str = "symbol,date,open,high,low,close,volume\n\
JNJ,2024-01-02,157.0,159.1,156.8,158.5,6200000\n\
JNJ,2024-01-03,158.4,160.2,158.0,159.9,5400000\n\
PFE,2024-01-02,28.7,29.1,28.5,28.9,31000000\n";

const ANNUAL_CSV: &str = "symbol,fiscal_year,reported_EPS\nJNJ,2023-12-31,9.92\n";

const QUARTERLY_CSV: &str = "symbol,fiscal_quarter,reported_date,reported_EPS,estimated_EPS,surprise,surprise_pct,report_time\n\
JNJ,2023-12-31,2024-01-23,2.29,2.28,0.01,0.4386,pre-market\n";

const INCOME_CSV: &str = "symbol,report_type,fiscal_date,reported_currency,totalRevenue,netIncome\n\
JNJ,annual,2023-12-31,USD,85159000000,35153000000\n";

const BALANCE_CSV: &str = "symbol,report_type,fiscal_date,reported_currency,totalAssets\n\
JNJ,annual,2023-12-31,USD,167558000000\n";

fn write_artifact(dir: &Path, table: &str, contents: &str) -> PathBuf {
    let path = dir.join(format!("{table}.csv"));
    fs::write(&path, contents).expect("write artifact");
    path
}

fn sources(data_dir: &Path) -> Vec<ArtifactSource> {
    [
        "stock_prices",
        "annual_earnings",
        "quarterly_earnings",
        "income_statements",
        "balance_sheets",
    ]
    .into_iter()
    .map(|table| ArtifactSource::new(data_dir.join(format!("{table}.csv")), table))
    .collect()
}

fn seeded_home(with_balance_sheets: bool) -> (tempfile::TempDir, Warehouse) {
    let temp = tempdir().expect("tempdir");
    let data = temp.path().join("data");
    fs::create_dir_all(&data).expect("data dir");
    write_artifact(&data, "stock_prices", PRICES_CSV);
    write_artifact(&data, "annual_earnings", ANNUAL_CSV);
    write_artifact(&data, "quarterly_earnings", QUARTERLY_CSV);
    write_artifact(&data, "income_statements", INCOME_CSV);
    if with_balance_sheets {
        write_artifact(&data, "balance_sheets", BALANCE_CSV);
    }
    let warehouse = Warehouse::new(WarehouseConfig::for_home(temp.path()));
    (temp, warehouse)
}

fn table_names(warehouse: &Warehouse) -> Vec<String> {
    let result = warehouse
        .execute_query(
            "SELECT table_name FROM information_schema.tables ORDER BY table_name",
            QueryGuardrails::default(),
        )
        .expect("list tables");
    result
        .rows
        .into_iter()
        .filter_map(|row| match row.into_iter().next() {
            Some(Value::String(name)) => Some(name),
            _ => None,
        })
        .collect()
}

// =============================================================================
// Warehouse: Store Rebuild
// =============================================================================

#[test]
fn when_all_artifacts_exist_every_domain_becomes_a_table() {
    // Given: A home with all five domain artifacts
    let (temp, warehouse) = seeded_home(true);

    // When: The store is rebuilt
    let report = warehouse
        .rebuild(&sources(&temp.path().join("data")))
        .expect("rebuild");

    // Then: Five tables exist with the artifact row counts
    assert_eq!(report.loaded.len(), 5);
    assert!(report.skipped.is_empty());
    assert_eq!(report.loaded[0].table, "stock_prices");
    assert_eq!(report.loaded[0].row_count, 3);
    assert_eq!(
        table_names(&warehouse),
        vec![
            "annual_earnings",
            "balance_sheets",
            "income_statements",
            "quarterly_earnings",
            "stock_prices",
        ]
    );
}

#[test]
fn when_balance_sheet_artifact_is_missing_remaining_domains_still_load() {
    // Given: A home without the balance-sheet artifact
    let (temp, warehouse) = seeded_home(false);

    // When: The store is rebuilt
    let report = warehouse
        .rebuild(&sources(&temp.path().join("data")))
        .expect("rebuild tolerates missing artifact");

    // Then: Four tables load and balance_sheets is reported as skipped
    assert_eq!(report.loaded.len(), 4);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].table, "balance_sheets");
    assert!(!table_names(&warehouse).contains(&"balance_sheets".to_string()));
}

#[test]
fn when_the_same_artifacts_are_loaded_twice_row_counts_do_not_double() {
    // Given: A store built once
    let (temp, warehouse) = seeded_home(true);
    let plan = sources(&temp.path().join("data"));
    warehouse.rebuild(&plan).expect("first rebuild");

    // When: The same artifacts are loaded again
    warehouse.rebuild(&plan).expect("second rebuild");

    // Then: The table is replaced, not accumulated
    let result = warehouse
        .execute_query(
            "SELECT COUNT(*) AS n FROM stock_prices",
            QueryGuardrails::default(),
        )
        .expect("count");
    assert_eq!(result.rows[0][0], Value::from(3));
}

#[test]
fn when_an_artifact_disappears_between_loads_its_stale_table_is_gone() {
    // Given: A store that once had balance_sheets
    let (temp, warehouse) = seeded_home(true);
    let data = temp.path().join("data");
    warehouse.rebuild(&sources(&data)).expect("first rebuild");

    // When: The artifact is removed and the store rebuilt
    fs::remove_file(data.join("balance_sheets.csv")).expect("remove");
    warehouse.rebuild(&sources(&data)).expect("second rebuild");

    // Then: The store reflects only the latest artifacts
    assert!(!table_names(&warehouse).contains(&"balance_sheets".to_string()));
}

#[test]
fn when_artifact_values_are_loaded_types_are_inferred() {
    // Given: A rebuilt store
    let (temp, warehouse) = seeded_home(true);
    warehouse
        .rebuild(&sources(&temp.path().join("data")))
        .expect("rebuild");

    // When: A typed column is queried
    let result = warehouse
        .execute_query(
            "SELECT date, close, volume FROM stock_prices WHERE symbol = 'PFE'",
            QueryGuardrails::default(),
        )
        .expect("query");

    // Then: Dates, floats, and integers survive as typed values
    assert_eq!(result.rows[0][0], Value::String("2024-01-02".to_string()));
    assert_eq!(result.rows[0][1].as_f64(), Some(28.9));
    assert_eq!(result.rows[0][2].as_i64(), Some(31_000_000));
}

// =============================================================================
// Warehouse: Query Definitions
// =============================================================================

#[test]
fn when_top_price_query_runs_a_one_row_result_is_persisted() {
    // Given: A rebuilt store and a top_price definition
    let (temp, warehouse) = seeded_home(true);
    warehouse
        .rebuild(&sources(&temp.path().join("data")))
        .expect("rebuild");
    let queries = temp.path().join("queries");
    fs::create_dir_all(&queries).expect("queries dir");
    fs::write(
        queries.join("top_price.sql"),
        "SELECT * FROM stock_prices ORDER BY close DESC LIMIT 1",
    )
    .expect("write query");

    // When: The runner executes it
    let runner = warehouse.query_runner();
    let store = warehouse.open_read_only().expect("open store");
    let outcome = runner.run_named(&store, "top_price").expect("query runs");
    drop(store);

    // Then: results/top_price.csv has the stock_prices header and one row
    assert_eq!(outcome.state, QueryState::Persisted);
    assert_eq!(outcome.row_count, 1);
    assert_eq!(outcome.result_path, temp.path().join("results").join("top_price.csv"));
    let persisted = fs::read_to_string(&outcome.result_path).expect("read result");
    let mut lines = persisted.lines();
    assert_eq!(
        lines.next(),
        Some("symbol,date,open,high,low,close,volume")
    );
    assert_eq!(
        lines.next(),
        Some("JNJ,2024-01-03,158.4,160.2,158.0,159.9,5400000")
    );
    assert_eq!(lines.next(), None);
}

#[test]
fn when_a_query_fails_the_error_names_the_query_and_others_still_run() {
    // Given: One broken and one valid definition
    let (temp, warehouse) = seeded_home(true);
    warehouse
        .rebuild(&sources(&temp.path().join("data")))
        .expect("rebuild");
    let queries = temp.path().join("queries");
    fs::create_dir_all(&queries).expect("queries dir");
    fs::write(queries.join("a_broken.sql"), "SELECT * FROM no_such_table").expect("write");
    fs::write(
        queries.join("b_symbols.sql"),
        "-- distinct tickers\nSELECT DISTINCT symbol FROM stock_prices ORDER BY symbol;",
    )
    .expect("write");

    // When: All definitions are run in order
    let runner = warehouse.query_runner();
    let store = warehouse.open_read_only().expect("open store");
    let outcomes: Vec<_> = runner
        .definitions()
        .expect("definitions")
        .iter()
        .map(|definition| runner.run(&store, definition))
        .collect();

    // Then: The failure carries the query name and the valid query persists
    match &outcomes[0] {
        Err(WarehouseError::QueryExecution { query, .. }) => assert_eq!(query, "a_broken"),
        other => panic!("expected query execution error, got {other:?}"),
    }
    let symbols = outcomes[1].as_ref().expect("second query runs");
    assert_eq!(symbols.row_count, 2);
    assert!(!temp.path().join("results").join("a_broken.csv").exists());
}

#[test]
fn when_a_definition_writes_to_the_store_it_is_rejected() {
    // Given: A definition that tries to drop a table
    let (temp, warehouse) = seeded_home(true);
    warehouse
        .rebuild(&sources(&temp.path().join("data")))
        .expect("rebuild");
    let queries = temp.path().join("queries");
    fs::create_dir_all(&queries).expect("queries dir");
    fs::write(queries.join("cleanup.sql"), "DROP TABLE stock_prices").expect("write");

    // When: The runner executes it
    let runner = warehouse.query_runner();
    let store = warehouse.open_read_only().expect("open store");
    let error = runner
        .run_named(&store, "cleanup")
        .expect_err("write rejected");
    drop(store);

    // Then: It fails as a query error and the table survives
    assert!(matches!(error, WarehouseError::QueryExecution { .. }));
    assert!(table_names(&warehouse).contains(&"stock_prices".to_string()));
}

#[test]
fn when_store_is_rebuilt_while_a_handle_is_held_the_handle_is_released_first() {
    // Given: An open read-write handle on an existing store
    let (temp, warehouse) = seeded_home(true);
    let plan = sources(&temp.path().join("data"));
    warehouse.rebuild(&plan).expect("first rebuild");
    let held = finlake_warehouse::StoreHandle::open(
        warehouse.db_path(),
        finlake_warehouse::AccessMode::ReadWrite,
    )
    .expect("open handle");

    // When: The loader is handed that handle
    let report = StoreLoader::new(warehouse.db_path())
        .rebuild(Some(held), &plan)
        .expect("rebuild with previous handle");

    // Then: The rebuild completes
    assert_eq!(report.loaded.len(), 5);
}

#[test]
fn when_no_store_exists_queries_report_it() {
    // Given: A home that has never been loaded
    let temp = tempdir().expect("tempdir");
    let warehouse = Warehouse::new(WarehouseConfig::for_home(temp.path()));

    // When: A query is attempted
    let error = warehouse.open_read_only().expect_err("no store");

    // Then: The error points at the missing store
    assert!(matches!(error, WarehouseError::StoreMissing(_)));
}
