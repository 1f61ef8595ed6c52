//! # finlake core
//!
//! Fetch, normalize, and persist Alpha Vantage financial data for a set of
//! tracked symbols.
//!
//! ## Overview
//!
//! The pipeline has three stages. This crate owns the first and re-exports
//! the warehouse crate for the other two:
//!
//! 1. **Fetch and normalize**: one GET per (domain, symbol), normalized into
//!    typed records and written to `data/<table>.csv`
//! 2. **Load**: rebuild `database/market_data.duckdb` from the artifacts
//!    ([`finlake_warehouse::StoreLoader`])
//! 3. **Query**: run `queries/*.sql` and persist `results/<name>.csv`
//!    ([`finlake_warehouse::QueryRunner`])
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`adapters`] | Alpha Vantage source fetcher |
//! | [`config`] | Environment configuration and credential check |
//! | [`domain`] | Domains, symbols, and record types |
//! | [`error`] | Pipeline and validation errors |
//! | [`http_client`] | HTTP transport seam |
//! | [`normalize`] | Payload to record conversion |
//! | [`pipeline`] | Generic per-domain pipeline |
//! | [`writer`] | CSV artifact writer |
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use finlake_core::{load_plan, Domain, FetchStage, PipelineConfig, ReqwestHttpClient, Warehouse};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PipelineConfig::from_env(None)?;
//!     let stage = FetchStage::new(&config, Arc::new(ReqwestHttpClient::new()))?;
//!     let summary = stage.run(&Domain::ALL).await;
//!     println!("{} domains written", summary.succeeded().count());
//!
//!     let warehouse = Warehouse::new(config.warehouse());
//!     let report = warehouse.rebuild(&load_plan(&config.data_dir))?;
//!     println!("{} rows loaded", report.total_rows());
//!     Ok(())
//! }
//! ```
//!
//! ## Security
//!
//! - The API key is read from the environment or `<home>/.env` only
//! - Request URLs are logged with the key masked

pub mod adapters;
pub mod config;
pub mod domain;
pub mod error;
pub mod http_client;
pub mod normalize;
pub mod pipeline;
pub mod writer;

pub use adapters::AlphaVantageClient;

pub use config::{ApiKey, PipelineConfig};

pub use domain::{
    AnnualEarnings, CompanyOverview, Domain, FinancialStatementLine, PriceBar, QuarterlyEarnings,
    ReportType, StatementKind, Symbol,
};

pub use error::{PipelineError, ValidationError};

pub use http_client::{HttpClient, HttpError, HttpRequest, HttpResponse, ReqwestHttpClient};

pub use pipeline::{
    load_plan, run_dataset, run_domain, table_schema, Dataset, DomainOutcome, DomainReport,
    FetchStage, FetchSummary,
};

pub use writer::{StagedArtifact, TableRow, TableWriter, WrittenArtifact};

// Warehouse (re-exported from finlake-warehouse)
pub use finlake_warehouse::{
    ArtifactSource, LoadReport, QueryDefinition, QueryGuardrails, QueryOutcome, QueryResult,
    QueryRunner, QueryState, SqlColumn, StoreHandle, StoreLoader, Warehouse, WarehouseConfig,
    WarehouseError,
};
