use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::Date;

use crate::writer::TableRow;

use super::Symbol;

pub(crate) const DATE_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]");

/// Income statement line items, in artifact column order.
pub const INCOME_STATEMENT_LINE_ITEMS: [&str; 24] = [
    "grossProfit",
    "totalRevenue",
    "costOfRevenue",
    "costofGoodsAndServicesSold",
    "operatingIncome",
    "sellingGeneralAndAdministrative",
    "researchAndDevelopment",
    "operatingExpenses",
    "investmentIncomeNet",
    "netInterestIncome",
    "interestIncome",
    "interestExpense",
    "nonInterestIncome",
    "otherNonOperatingIncome",
    "depreciation",
    "depreciationAndAmortization",
    "incomeBeforeTax",
    "incomeTaxExpense",
    "interestAndDebtExpense",
    "netIncomeFromContinuingOperations",
    "comprehensiveIncomeNetOfTax",
    "ebit",
    "ebitda",
    "netIncome",
];

/// Balance sheet line items, in artifact column order.
pub const BALANCE_SHEET_LINE_ITEMS: [&str; 36] = [
    "totalAssets",
    "totalCurrentAssets",
    "cashAndCashEquivalentsAtCarryingValue",
    "cashAndShortTermInvestments",
    "inventory",
    "currentNetReceivables",
    "totalNonCurrentAssets",
    "propertyPlantEquipment",
    "accumulatedDepreciationAmortizationPPE",
    "intangibleAssets",
    "intangibleAssetsExcludingGoodwill",
    "goodwill",
    "investments",
    "longTermInvestments",
    "shortTermInvestments",
    "otherCurrentAssets",
    "otherNonCurrentAssets",
    "totalLiabilities",
    "totalCurrentLiabilities",
    "currentAccountsPayable",
    "deferredRevenue",
    "currentDebt",
    "shortTermDebt",
    "totalNonCurrentLiabilities",
    "capitalLeaseObligations",
    "longTermDebt",
    "currentLongTermDebt",
    "longTermDebtNoncurrent",
    "shortLongTermDebtTotal",
    "otherCurrentLiabilities",
    "otherNonCurrentLiabilities",
    "totalShareholderEquity",
    "treasuryStock",
    "retainedEarnings",
    "commonStock",
    "commonStockSharesOutstanding",
];

/// One daily OHLCV bar.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceBar {
    pub symbol: Symbol,
    pub date: Option<Date>,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub volume: Option<f64>,
}

impl PriceBar {
    pub const COLUMNS: [&'static str; 7] =
        ["symbol", "date", "open", "high", "low", "close", "volume"];

    pub const SQL_TYPES: [&'static str; 7] =
        ["VARCHAR", "DATE", "DOUBLE", "DOUBLE", "DOUBLE", "DOUBLE", "DOUBLE"];
}

impl TableRow for PriceBar {
    fn cells(&self) -> Vec<String> {
        vec![
            self.symbol.to_string(),
            date_cell(self.date),
            float_cell(self.open),
            float_cell(self.high),
            float_cell(self.low),
            float_cell(self.close),
            float_cell(self.volume),
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnnualEarnings {
    pub symbol: Symbol,
    pub fiscal_year: Option<Date>,
    pub reported_eps: Option<f64>,
}

impl AnnualEarnings {
    pub const COLUMNS: [&'static str; 3] = ["symbol", "fiscal_year", "reported_EPS"];
    pub const SQL_TYPES: [&'static str; 3] = ["VARCHAR", "DATE", "DOUBLE"];
}

impl TableRow for AnnualEarnings {
    fn cells(&self) -> Vec<String> {
        vec![
            self.symbol.to_string(),
            date_cell(self.fiscal_year),
            float_cell(self.reported_eps),
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuarterlyEarnings {
    pub symbol: Symbol,
    pub fiscal_quarter: Option<Date>,
    pub reported_date: Option<Date>,
    pub reported_eps: Option<f64>,
    pub estimated_eps: Option<f64>,
    pub surprise: Option<f64>,
    pub surprise_pct: Option<f64>,
    /// `pre-market` or `post-market` as reported upstream.
    pub report_time: Option<String>,
}

impl QuarterlyEarnings {
    pub const COLUMNS: [&'static str; 8] = [
        "symbol",
        "fiscal_quarter",
        "reported_date",
        "reported_EPS",
        "estimated_EPS",
        "surprise",
        "surprise_pct",
        "report_time",
    ];

    pub const SQL_TYPES: [&'static str; 8] = [
        "VARCHAR", "DATE", "DATE", "DOUBLE", "DOUBLE", "DOUBLE", "DOUBLE", "VARCHAR",
    ];
}

impl TableRow for QuarterlyEarnings {
    fn cells(&self) -> Vec<String> {
        vec![
            self.symbol.to_string(),
            date_cell(self.fiscal_quarter),
            date_cell(self.reported_date),
            float_cell(self.reported_eps),
            float_cell(self.estimated_eps),
            float_cell(self.surprise),
            float_cell(self.surprise_pct),
            self.report_time.clone().unwrap_or_default(),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportType {
    Annual,
    Quarterly,
}

impl ReportType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Annual => "annual",
            Self::Quarterly => "quarterly",
        }
    }

    /// Upstream collection holding reports of this type.
    pub const fn collection(self) -> &'static str {
        match self {
            Self::Annual => "annualReports",
            Self::Quarterly => "quarterlyReports",
        }
    }
}

/// Which financial statement a line belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Income,
    Balance,
}

impl StatementKind {
    pub const fn line_items(self) -> &'static [&'static str] {
        match self {
            Self::Income => &INCOME_STATEMENT_LINE_ITEMS,
            Self::Balance => &BALANCE_SHEET_LINE_ITEMS,
        }
    }

    pub const fn table(self) -> &'static str {
        match self {
            Self::Income => "income_statements",
            Self::Balance => "balance_sheets",
        }
    }

    /// Full artifact header: the shared prefix followed by the line items.
    pub fn columns(self) -> Vec<&'static str> {
        let mut columns = vec!["symbol", "report_type", "fiscal_date", "reported_currency"];
        columns.extend_from_slice(self.line_items());
        columns
    }

    /// Store types matching [`StatementKind::columns`].
    pub fn sql_types(self) -> Vec<&'static str> {
        let mut types = vec!["VARCHAR", "VARCHAR", "DATE", "VARCHAR"];
        types.extend(self.line_items().iter().map(|_| "BIGINT"));
        types
    }
}

/// One income statement or balance sheet for one fiscal period.
///
/// `line_items` holds one value per entry of `kind.line_items()`, in the same
/// order. Values the upstream omitted or could not report are zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinancialStatementLine {
    pub symbol: Symbol,
    pub kind: StatementKind,
    pub report_type: ReportType,
    pub fiscal_date: Option<Date>,
    pub reported_currency: Option<String>,
    pub line_items: Vec<i64>,
}

impl FinancialStatementLine {
    /// Value of the named line item, if `name` belongs to this statement kind.
    pub fn line_item(&self, name: &str) -> Option<i64> {
        self.kind
            .line_items()
            .iter()
            .position(|item| *item == name)
            .and_then(|index| self.line_items.get(index).copied())
    }
}

impl TableRow for FinancialStatementLine {
    fn cells(&self) -> Vec<String> {
        let mut cells = Vec::with_capacity(4 + self.line_items.len());
        cells.push(self.symbol.to_string());
        cells.push(self.report_type.as_str().to_string());
        cells.push(date_cell(self.fiscal_date));
        cells.push(self.reported_currency.clone().unwrap_or_default());
        cells.extend(self.line_items.iter().map(ToString::to_string));
        cells
    }
}

/// Company profile and valuation snapshot, one per entity.
#[derive(Debug, Clone, PartialEq)]
pub struct CompanyOverview {
    pub symbol: Symbol,
    pub name: String,
    pub cik: i64,
    pub market_capitalization: i64,
    pub ebitda: i64,
    pub pe_ratio: f64,
    pub peg_ratio: f64,
    pub eps: f64,
    pub profit_margin: f64,
    pub return_on_equity_ttm: f64,
    pub revenue_ttm: i64,
    pub quarterly_earnings_growth_yoy: f64,
    pub quarterly_revenue_growth_yoy: f64,
    pub price_to_book_ratio: f64,
    pub dividend_yield: f64,
    pub beta: f64,
}

impl CompanyOverview {
    pub const UNKNOWN_NAME: &'static str = "Unknown";

    pub const COLUMNS: [&'static str; 16] = [
        "symbol",
        "Name",
        "CIK",
        "MarketCapitalization",
        "EBITDA",
        "PERatio",
        "PEGRatio",
        "EPS",
        "ProfitMargin",
        "ReturnOnEquityTTM",
        "RevenueTTM",
        "QuarterlyEarningsGrowthYOY",
        "QuarterlyRevenueGrowthYOY",
        "PriceToBookRatio",
        "DividendYield",
        "Beta",
    ];

    pub const SQL_TYPES: [&'static str; 16] = [
        "VARCHAR", "VARCHAR", "BIGINT", "BIGINT", "BIGINT", "DOUBLE", "DOUBLE", "DOUBLE",
        "DOUBLE", "DOUBLE", "BIGINT", "DOUBLE", "DOUBLE", "DOUBLE", "DOUBLE", "DOUBLE",
    ];
}

impl TableRow for CompanyOverview {
    fn cells(&self) -> Vec<String> {
        vec![
            self.symbol.to_string(),
            self.name.clone(),
            self.cik.to_string(),
            self.market_capitalization.to_string(),
            self.ebitda.to_string(),
            self.pe_ratio.to_string(),
            self.peg_ratio.to_string(),
            self.eps.to_string(),
            self.profit_margin.to_string(),
            self.return_on_equity_ttm.to_string(),
            self.revenue_ttm.to_string(),
            self.quarterly_earnings_growth_yoy.to_string(),
            self.quarterly_revenue_growth_yoy.to_string(),
            self.price_to_book_ratio.to_string(),
            self.dividend_yield.to_string(),
            self.beta.to_string(),
        ]
    }
}

fn date_cell(date: Option<Date>) -> String {
    date.and_then(|date| date.format(DATE_FORMAT).ok())
        .unwrap_or_default()
}

fn float_cell(value: Option<f64>) -> String {
    value.map(|value| value.to_string()).unwrap_or_default()
}
