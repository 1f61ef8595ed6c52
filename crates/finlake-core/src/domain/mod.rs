//! Domain types for finlake.
//!
//! A [`Domain`] is one category of upstream data. Each domain knows its
//! upstream function name, the top-level key that marks a usable response,
//! and the artifact tables it produces.
//!
//! | Domain | Function | Required key | Tables |
//! |--------|----------|--------------|--------|
//! | `prices` | `TIME_SERIES_DAILY` | `Time Series (Daily)` | `stock_prices` |
//! | `earnings` | `EARNINGS` | `annualEarnings` | `annual_earnings`, `quarterly_earnings` |
//! | `income` | `INCOME_STATEMENT` | `annualReports` | `income_statements` |
//! | `balance` | `BALANCE_SHEET` | `annualReports` | `balance_sheets` |
//! | `overview` | `OVERVIEW` | `Symbol` | `company_overviews` |

pub(crate) mod records;
mod symbol;

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::Serialize;

use crate::ValidationError;

pub use records::{
    AnnualEarnings, CompanyOverview, FinancialStatementLine, PriceBar, QuarterlyEarnings,
    ReportType, StatementKind, BALANCE_SHEET_LINE_ITEMS, INCOME_STATEMENT_LINE_ITEMS,
};
pub use symbol::Symbol;

/// Category of upstream financial data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Prices,
    Earnings,
    IncomeStatement,
    BalanceSheet,
    Overview,
}

impl Domain {
    /// Every domain, in fetch order.
    pub const ALL: [Self; 5] = [
        Self::Prices,
        Self::Earnings,
        Self::IncomeStatement,
        Self::BalanceSheet,
        Self::Overview,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Prices => "prices",
            Self::Earnings => "earnings",
            Self::IncomeStatement => "income",
            Self::BalanceSheet => "balance",
            Self::Overview => "overview",
        }
    }

    /// Upstream `function` query parameter.
    pub const fn function(self) -> &'static str {
        match self {
            Self::Prices => "TIME_SERIES_DAILY",
            Self::Earnings => "EARNINGS",
            Self::IncomeStatement => "INCOME_STATEMENT",
            Self::BalanceSheet => "BALANCE_SHEET",
            Self::Overview => "OVERVIEW",
        }
    }

    /// Extra query parameters sent with every request for this domain.
    pub const fn extra_params(self) -> &'static [(&'static str, &'static str)] {
        match self {
            Self::Prices => &[("outputsize", "full")],
            _ => &[],
        }
    }

    /// Top-level key whose absence marks a response as malformed.
    pub const fn required_key(self) -> &'static str {
        match self {
            Self::Prices => "Time Series (Daily)",
            Self::Earnings => "annualEarnings",
            Self::IncomeStatement | Self::BalanceSheet => "annualReports",
            Self::Overview => "Symbol",
        }
    }

    /// Tables (and artifact stems) written for this domain.
    pub const fn tables(self) -> &'static [&'static str] {
        match self {
            Self::Prices => &["stock_prices"],
            Self::Earnings => &["annual_earnings", "quarterly_earnings"],
            Self::IncomeStatement => &["income_statements"],
            Self::BalanceSheet => &["balance_sheets"],
            Self::Overview => &["company_overviews"],
        }
    }
}

impl Display for Domain {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Domain {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "prices" | "stock_prices" => Ok(Self::Prices),
            "earnings" => Ok(Self::Earnings),
            "income" | "income_statement" | "income_statements" => Ok(Self::IncomeStatement),
            "balance" | "balance_sheet" | "balance_sheets" => Ok(Self::BalanceSheet),
            "overview" | "company_overview" | "company_overviews" => Ok(Self::Overview),
            _ => Err(ValidationError::InvalidDomain {
                value: value.to_string(),
            }),
        }
    }
}
