//! Pure conversion of upstream payloads into typed records.
//!
//! Normalizers never drop a row because of a bad field: the number of records
//! produced equals the length of the upstream collection being iterated.
//! Coercion rules differ by field family:
//!
//! - statement line items and overview integers: parse as float, truncate,
//!   anything unusable becomes `0`
//! - overview ratios: parse as float, anything unusable becomes `0.0`
//! - price and earnings values: parse as float, anything unusable is `None`
//! - dates: `YYYY-MM-DD`, anything else is `None`

use serde_json::{Map, Value};
use time::Date;

use crate::domain::records::DATE_FORMAT;
use crate::domain::{
    AnnualEarnings, CompanyOverview, FinancialStatementLine, PriceBar, QuarterlyEarnings,
    ReportType, StatementKind, Symbol,
};

/// Upstream marker for a value it could not report.
const NULL_MARKER: &str = "None";

/// Parse a numeric field delivered as a JSON string or number.
pub fn parse_float(value: Option<&Value>) -> Option<f64> {
    let parsed = match value? {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => {
            let text = text.trim();
            if text.is_empty() || text == NULL_MARKER {
                None
            } else {
                text.parse::<f64>().ok()
            }
        }
        _ => None,
    };
    parsed.filter(|value| value.is_finite())
}

/// Float-then-truncate integer coercion; unusable values become zero.
pub fn truncated_int(value: Option<&Value>) -> i64 {
    // `as` saturates on out-of-range floats.
    parse_float(value).map_or(0, |value| value.trunc() as i64)
}

pub fn float_or_zero(value: Option<&Value>) -> f64 {
    parse_float(value).unwrap_or(0.0)
}

pub fn parse_date(value: Option<&Value>) -> Option<Date> {
    value
        .and_then(Value::as_str)
        .and_then(|text| Date::parse(text.trim(), DATE_FORMAT).ok())
}

fn text(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|text| !text.is_empty() && *text != NULL_MARKER)
        .map(ToString::to_string)
}

fn entries<'a>(payload: &'a Map<String, Value>, key: &str) -> &'a [Value] {
    payload
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

fn field<'a>(entry: Option<&'a Map<String, Value>>, key: &str) -> Option<&'a Value> {
    entry.and_then(|entry| entry.get(key))
}

/// Daily bars from a `TIME_SERIES_DAILY` payload, oldest first.
pub fn normalize_prices(symbol: &Symbol, payload: &Map<String, Value>) -> Vec<PriceBar> {
    let Some(series) = payload
        .get(crate::Domain::Prices.required_key())
        .and_then(Value::as_object)
    else {
        return Vec::new();
    };

    let mut days: Vec<(&String, &Value)> = series.iter().collect();
    days.sort_by(|left, right| left.0.cmp(right.0));

    days.into_iter()
        .map(|(day, values)| {
            let values = values.as_object();
            PriceBar {
                symbol: symbol.clone(),
                date: Date::parse(day.trim(), DATE_FORMAT).ok(),
                open: parse_float(field(values, "1. open")),
                high: parse_float(field(values, "2. high")),
                low: parse_float(field(values, "3. low")),
                close: parse_float(field(values, "4. close")),
                volume: parse_float(field(values, "5. volume")),
            }
        })
        .collect()
}

/// Annual and quarterly earnings from one `EARNINGS` payload.
pub fn normalize_earnings(
    symbol: &Symbol,
    payload: &Map<String, Value>,
) -> (Vec<AnnualEarnings>, Vec<QuarterlyEarnings>) {
    let annual = entries(payload, "annualEarnings")
        .iter()
        .map(|entry| {
            let entry = entry.as_object();
            AnnualEarnings {
                symbol: symbol.clone(),
                fiscal_year: parse_date(field(entry, "fiscalDateEnding")),
                reported_eps: parse_float(field(entry, "reportedEPS")),
            }
        })
        .collect();

    let quarterly = entries(payload, "quarterlyEarnings")
        .iter()
        .map(|entry| {
            let entry = entry.as_object();
            QuarterlyEarnings {
                symbol: symbol.clone(),
                fiscal_quarter: parse_date(field(entry, "fiscalDateEnding")),
                reported_date: parse_date(field(entry, "reportedDate")),
                reported_eps: parse_float(field(entry, "reportedEPS")),
                estimated_eps: parse_float(field(entry, "estimatedEPS")),
                surprise: parse_float(field(entry, "surprise")),
                surprise_pct: parse_float(field(entry, "surprisePercentage")),
                report_time: text(field(entry, "reportTime")),
            }
        })
        .collect();

    (annual, quarterly)
}

/// Annual then quarterly statements of one kind.
pub fn normalize_statement(
    kind: StatementKind,
    symbol: &Symbol,
    payload: &Map<String, Value>,
) -> Vec<FinancialStatementLine> {
    [ReportType::Annual, ReportType::Quarterly]
        .into_iter()
        .flat_map(|report_type| {
            entries(payload, report_type.collection())
                .iter()
                .map(move |entry| statement_line(kind, report_type, symbol, entry))
        })
        .collect()
}

fn statement_line(
    kind: StatementKind,
    report_type: ReportType,
    symbol: &Symbol,
    entry: &Value,
) -> FinancialStatementLine {
    let entry = entry.as_object();
    FinancialStatementLine {
        symbol: symbol.clone(),
        kind,
        report_type,
        fiscal_date: parse_date(field(entry, "fiscalDateEnding")),
        reported_currency: text(field(entry, "reportedCurrency")),
        line_items: kind
            .line_items()
            .iter()
            .map(|item| truncated_int(field(entry, item)))
            .collect(),
    }
}

/// Company profile from an `OVERVIEW` payload.
pub fn normalize_overview(symbol: &Symbol, payload: &Map<String, Value>) -> CompanyOverview {
    let get = |key: &str| payload.get(key);
    CompanyOverview {
        symbol: symbol.clone(),
        name: text(get("Name")).unwrap_or_else(|| CompanyOverview::UNKNOWN_NAME.to_string()),
        cik: truncated_int(get("CIK")),
        market_capitalization: truncated_int(get("MarketCapitalization")),
        ebitda: truncated_int(get("EBITDA")),
        pe_ratio: float_or_zero(get("PERatio")),
        peg_ratio: float_or_zero(get("PEGRatio")),
        eps: float_or_zero(get("EPS")),
        profit_margin: float_or_zero(get("ProfitMargin")),
        return_on_equity_ttm: float_or_zero(get("ReturnOnEquityTTM")),
        revenue_ttm: truncated_int(get("RevenueTTM")),
        quarterly_earnings_growth_yoy: float_or_zero(get("QuarterlyEarningsGrowthYOY")),
        quarterly_revenue_growth_yoy: float_or_zero(get("QuarterlyRevenueGrowthYOY")),
        price_to_book_ratio: float_or_zero(get("PriceToBookRatio")),
        dividend_yield: float_or_zero(get("DividendYield")),
        beta: float_or_zero(get("Beta")),
    }
}
