//! CLI argument definitions for finlake.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `fetch` | Fetch and normalize upstream data into `data/*.csv` |
//! | `load` | Rebuild the DuckDB store from the artifacts |
//! | `query` | Run named query definitions from `queries/` |
//! | `sql` | Run one ad-hoc read-only statement |
//! | `run` | fetch, load, and query in sequence |
//! | `domains` | List domains, endpoints, and tables |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--format` | `json` | Output format (json, table) |
//! | `--pretty` | `false` | Pretty-print JSON output |
//! | `--home` | `$FINLAKE_HOME` or `.` | Project root |
//! | `--symbols` | `$FINLAKE_SYMBOLS` | Comma-separated tickers |
//! | `--timeout-ms` | `$FINLAKE_TIMEOUT_MS` | Per-request timeout |
//! | `--preview-rows` | `5` | Rows shown per query preview |
//!
//! # Examples
//!
//! ```bash
//! finlake fetch prices earnings
//! finlake load
//! finlake query top_price --format table
//! finlake sql "SELECT symbol, MAX(close) FROM stock_prices GROUP BY symbol"
//! finlake run --fail-fast
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use finlake_core::Domain;

/// finlake: Alpha Vantage to DuckDB pipeline
#[derive(Debug, Parser)]
#[command(
    name = "finlake",
    author,
    version,
    about = "Fetch Alpha Vantage data, load it into DuckDB, and run analytical queries",
    long_about = "finlake keeps a local copy of Alpha Vantage financial data for a set of \
tracked symbols.\n\
\n\
  fetch  writes one CSV artifact per table under data/\n\
  load   rebuilds database/market_data.duckdb from those artifacts\n\
  query  runs queries/*.sql and writes results/<name>.csv\n\
\n\
The API key is read from ALPHA_VANTAGE_API_KEY or <home>/.env."
)]
pub struct Cli {
    /// Output format for results.
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,

    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// Project root holding data/, database/, queries/, and results/.
    #[arg(long, global = true)]
    pub home: Option<PathBuf>,

    /// Comma-separated symbols to track (overrides FINLAKE_SYMBOLS).
    #[arg(long, global = true)]
    pub symbols: Option<String>,

    /// Per-request timeout in milliseconds (overrides FINLAKE_TIMEOUT_MS).
    #[arg(long, global = true)]
    pub timeout_ms: Option<u64>,

    /// Rows shown in each query preview.
    #[arg(long, global = true)]
    pub preview_rows: Option<usize>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable layout for terminals.
    Table,
    /// Single JSON object.
    Json,
}

/// Available CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch, normalize, and write artifacts for one or more domains.
    ///
    /// Without arguments every domain is fetched. A domain whose fetch fails
    /// for any symbol keeps its previous artifact.
    ///
    /// # Examples
    ///
    ///   finlake fetch
    ///   finlake fetch prices overview --symbols JNJ,PFE
    Fetch(FetchArgs),

    /// Rebuild the store from the current artifacts.
    ///
    /// The store file is deleted and recreated; missing artifacts are skipped.
    Load,

    /// Run query definitions from the queries directory.
    ///
    /// # Examples
    ///
    ///   finlake query
    ///   finlake query top_price monthly_net_2pct_gain_counts
    ///   finlake query --list
    Query(QueryArgs),

    /// Run one ad-hoc read-only SQL statement against the store.
    ///
    /// # Examples
    ///
    ///   finlake sql "SELECT * FROM company_overviews" --format table
    Sql(SqlArgs),

    /// Fetch every domain, rebuild the store, and run every query.
    Run(RunArgs),

    /// List domains with their upstream function and output tables.
    Domains,
}

#[derive(Debug, Clone, Args)]
pub struct FetchArgs {
    /// Domains to fetch (prices, earnings, income, balance, overview).
    pub domains: Vec<Domain>,
}

#[derive(Debug, Clone, Args)]
pub struct QueryArgs {
    /// Query names (file stems); all definitions when omitted.
    pub names: Vec<String>,

    /// Stop at the first failing query.
    #[arg(long, default_value_t = false)]
    pub fail_fast: bool,

    /// List definitions without running them.
    #[arg(long, default_value_t = false)]
    pub list: bool,
}

#[derive(Debug, Clone, Args)]
pub struct SqlArgs {
    /// SQL statement (SELECT, WITH, EXPLAIN, SHOW, or DESCRIBE).
    pub query: String,

    /// Maximum rows returned.
    #[arg(long, default_value_t = 10_000)]
    pub max_rows: usize,

    /// Query timeout in milliseconds.
    #[arg(long, default_value_t = 5_000)]
    pub query_timeout_ms: u64,
}

#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    /// Stop at the first failing domain or query.
    #[arg(long, default_value_t = false)]
    pub fail_fast: bool,
}
