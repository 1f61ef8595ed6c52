//! Generic fetch → normalize → write pipeline, instantiated once per domain.
//!
//! Each domain is a [`Dataset`]: it names its [`Domain`] (endpoint and
//! required response key), accumulates normalized rows across symbols, and
//! writes its artifacts. [`run_dataset`] drives one domain; [`FetchStage`]
//! runs several domains in order, keeping their failures separate.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use finlake_warehouse::ArtifactSource;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{error, info, warn};

use crate::adapters::AlphaVantageClient;
use crate::config::PipelineConfig;
use crate::domain::{
    AnnualEarnings, CompanyOverview, FinancialStatementLine, PriceBar, QuarterlyEarnings,
    StatementKind,
};
use crate::http_client::HttpClient;
use crate::normalize;
use crate::writer::{TableWriter, WrittenArtifact};
use crate::{Domain, PipelineError, Symbol};

/// Per-domain normalization and artifact layout.
pub trait Dataset {
    const DOMAIN: Domain;

    /// Rows accumulated across all symbols of one run.
    type Rows: Default;

    fn normalize(symbol: &Symbol, payload: &Map<String, Value>, rows: &mut Self::Rows);

    fn write(rows: &Self::Rows, writer: &TableWriter) -> Result<Vec<WrittenArtifact>, PipelineError>;
}

pub struct Prices;

impl Dataset for Prices {
    const DOMAIN: Domain = Domain::Prices;
    type Rows = Vec<PriceBar>;

    fn normalize(symbol: &Symbol, payload: &Map<String, Value>, rows: &mut Self::Rows) {
        rows.extend(normalize::normalize_prices(symbol, payload));
    }

    fn write(rows: &Self::Rows, writer: &TableWriter) -> Result<Vec<WrittenArtifact>, PipelineError> {
        Ok(vec![writer.write("stock_prices", &PriceBar::COLUMNS, rows)?])
    }
}

pub struct Earnings;

impl Dataset for Earnings {
    const DOMAIN: Domain = Domain::Earnings;
    type Rows = (Vec<AnnualEarnings>, Vec<QuarterlyEarnings>);

    fn normalize(symbol: &Symbol, payload: &Map<String, Value>, rows: &mut Self::Rows) {
        let (annual, quarterly) = normalize::normalize_earnings(symbol, payload);
        rows.0.extend(annual);
        rows.1.extend(quarterly);
    }

    fn write(rows: &Self::Rows, writer: &TableWriter) -> Result<Vec<WrittenArtifact>, PipelineError> {
        // Both tables are staged before either replaces its artifact.
        let annual = writer.stage("annual_earnings", &AnnualEarnings::COLUMNS, &rows.0)?;
        let quarterly = writer.stage("quarterly_earnings", &QuarterlyEarnings::COLUMNS, &rows.1)?;
        writer.commit(vec![annual, quarterly])
    }
}

pub struct IncomeStatements;

impl Dataset for IncomeStatements {
    const DOMAIN: Domain = Domain::IncomeStatement;
    type Rows = Vec<FinancialStatementLine>;

    fn normalize(symbol: &Symbol, payload: &Map<String, Value>, rows: &mut Self::Rows) {
        rows.extend(normalize::normalize_statement(
            StatementKind::Income,
            symbol,
            payload,
        ));
    }

    fn write(rows: &Self::Rows, writer: &TableWriter) -> Result<Vec<WrittenArtifact>, PipelineError> {
        write_statements(StatementKind::Income, rows, writer)
    }
}

pub struct BalanceSheets;

impl Dataset for BalanceSheets {
    const DOMAIN: Domain = Domain::BalanceSheet;
    type Rows = Vec<FinancialStatementLine>;

    fn normalize(symbol: &Symbol, payload: &Map<String, Value>, rows: &mut Self::Rows) {
        rows.extend(normalize::normalize_statement(
            StatementKind::Balance,
            symbol,
            payload,
        ));
    }

    fn write(rows: &Self::Rows, writer: &TableWriter) -> Result<Vec<WrittenArtifact>, PipelineError> {
        write_statements(StatementKind::Balance, rows, writer)
    }
}

pub struct Overviews;

impl Dataset for Overviews {
    const DOMAIN: Domain = Domain::Overview;
    type Rows = Vec<CompanyOverview>;

    fn normalize(symbol: &Symbol, payload: &Map<String, Value>, rows: &mut Self::Rows) {
        rows.push(normalize::normalize_overview(symbol, payload));
    }

    fn write(rows: &Self::Rows, writer: &TableWriter) -> Result<Vec<WrittenArtifact>, PipelineError> {
        Ok(vec![writer.write(
            "company_overviews",
            &CompanyOverview::COLUMNS,
            rows,
        )?])
    }
}

fn write_statements(
    kind: StatementKind,
    rows: &[FinancialStatementLine],
    writer: &TableWriter,
) -> Result<Vec<WrittenArtifact>, PipelineError> {
    Ok(vec![writer.write(kind.table(), &kind.columns(), rows)?])
}

/// Artifacts produced by one successful domain run.
#[derive(Debug, Clone, Serialize)]
pub struct DomainReport {
    pub domain: Domain,
    pub symbols: usize,
    pub artifacts: Vec<WrittenArtifact>,
    pub elapsed_ms: u64,
}

/// Fetch every symbol for `D`, then write its artifacts.
///
/// Any fetch failure aborts the domain before anything is written, so the
/// previous artifacts stay in place.
pub async fn run_dataset<D: Dataset>(
    client: &AlphaVantageClient,
    symbols: &[Symbol],
    writer: &TableWriter,
) -> Result<DomainReport, PipelineError> {
    let started = Instant::now();
    let mut rows = D::Rows::default();

    for symbol in symbols {
        let payload = client.fetch(D::DOMAIN, symbol).await?;
        D::normalize(symbol, &payload, &mut rows);
        info!(domain = %D::DOMAIN, %symbol, "fetched");
    }

    let artifacts = D::write(&rows, writer)?;
    for artifact in &artifacts {
        info!(
            domain = %D::DOMAIN,
            table = %artifact.table,
            rows = artifact.rows,
            "artifact replaced"
        );
    }

    Ok(DomainReport {
        domain: D::DOMAIN,
        symbols: symbols.len(),
        artifacts,
        elapsed_ms: started.elapsed().as_millis().min(u128::from(u64::MAX)) as u64,
    })
}

/// Run the pipeline for one domain.
pub async fn run_domain(
    domain: Domain,
    client: &AlphaVantageClient,
    symbols: &[Symbol],
    writer: &TableWriter,
) -> Result<DomainReport, PipelineError> {
    match domain {
        Domain::Prices => run_dataset::<Prices>(client, symbols, writer).await,
        Domain::Earnings => run_dataset::<Earnings>(client, symbols, writer).await,
        Domain::IncomeStatement => run_dataset::<IncomeStatements>(client, symbols, writer).await,
        Domain::BalanceSheet => run_dataset::<BalanceSheets>(client, symbols, writer).await,
        Domain::Overview => run_dataset::<Overviews>(client, symbols, writer).await,
    }
}

/// Outcome of one domain within a fetch stage.
#[derive(Debug)]
pub struct DomainOutcome {
    pub domain: Domain,
    pub result: Result<DomainReport, PipelineError>,
}

#[derive(Debug, Default)]
pub struct FetchSummary {
    pub outcomes: Vec<DomainOutcome>,
}

impl FetchSummary {
    pub fn succeeded(&self) -> impl Iterator<Item = &DomainReport> {
        self.outcomes
            .iter()
            .filter_map(|outcome| outcome.result.as_ref().ok())
    }

    pub fn failed(&self) -> impl Iterator<Item = (Domain, &PipelineError)> {
        self.outcomes.iter().filter_map(|outcome| {
            outcome
                .result
                .as_ref()
                .err()
                .map(|error| (outcome.domain, error))
        })
    }

    pub fn has_failures(&self) -> bool {
        self.failed().next().is_some()
    }
}

/// The fetch-normalize-write stage over several domains.
pub struct FetchStage {
    client: AlphaVantageClient,
    writer: TableWriter,
    symbols: Vec<Symbol>,
}

impl FetchStage {
    /// Build the stage from configuration.
    ///
    /// Fails with [`PipelineError::Authentication`] before any request when no
    /// usable credential is configured.
    pub fn new(config: &PipelineConfig, http_client: Arc<dyn HttpClient>) -> Result<Self, PipelineError> {
        let api_key = config.api_key()?;
        let client = AlphaVantageClient::new(http_client, api_key)
            .with_base_url(config.base_url.clone())
            .with_timeout_ms(config.timeout_ms);
        Ok(Self {
            client,
            writer: TableWriter::new(config.data_dir.clone()),
            symbols: config.symbols.clone(),
        })
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    /// Run `domains` in order. A failed domain is logged and recorded; the
    /// remaining domains still run.
    pub async fn run(&self, domains: &[Domain]) -> FetchSummary {
        let mut summary = FetchSummary::default();
        for &domain in domains {
            let result = run_domain(domain, &self.client, &self.symbols, &self.writer).await;
            if let Err(failure) = &result {
                if failure.is_domain_local() {
                    warn!(%domain, error = %failure, "domain aborted; previous artifacts kept");
                } else {
                    error!(%domain, error = %failure, "domain failed");
                }
            }
            summary.outcomes.push(DomainOutcome { domain, result });
        }
        summary
    }
}

/// Every domain table under `data_dir`, with its declared column types.
pub fn load_plan(data_dir: &Path) -> Vec<ArtifactSource> {
    Domain::ALL
        .iter()
        .flat_map(|domain| domain.tables().iter())
        .map(|table| {
            ArtifactSource::new(data_dir.join(format!("{table}.csv")), *table)
                .with_columns(table_schema(table))
        })
        .collect()
}

/// `(column, store type)` pairs of an artifact, in header order.
pub fn table_schema(table: &str) -> Vec<(&'static str, &'static str)> {
    let (columns, types): (Vec<&'static str>, Vec<&'static str>) = match table {
        "stock_prices" => (PriceBar::COLUMNS.to_vec(), PriceBar::SQL_TYPES.to_vec()),
        "annual_earnings" => (
            AnnualEarnings::COLUMNS.to_vec(),
            AnnualEarnings::SQL_TYPES.to_vec(),
        ),
        "quarterly_earnings" => (
            QuarterlyEarnings::COLUMNS.to_vec(),
            QuarterlyEarnings::SQL_TYPES.to_vec(),
        ),
        "income_statements" => (
            StatementKind::Income.columns(),
            StatementKind::Income.sql_types(),
        ),
        "balance_sheets" => (
            StatementKind::Balance.columns(),
            StatementKind::Balance.sql_types(),
        ),
        "company_overviews" => (
            CompanyOverview::COLUMNS.to_vec(),
            CompanyOverview::SQL_TYPES.to_vec(),
        ),
        _ => (Vec::new(), Vec::new()),
    };
    columns.into_iter().zip(types).collect()
}
