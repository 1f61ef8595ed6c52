use std::path::PathBuf;

use thiserror::Error;

use crate::domain::Domain;

/// Validation errors for user-supplied identifiers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("symbol cannot be empty")]
    EmptySymbol,
    #[error("symbol length {len} exceeds max {max}")]
    SymbolTooLong { len: usize, max: usize },
    #[error("symbol must start with an ASCII letter: '{ch}'")]
    SymbolInvalidStart { ch: char },
    #[error("symbol contains invalid character '{ch}' at index {index}")]
    SymbolInvalidChar { ch: char, index: usize },

    #[error("invalid domain '{value}', expected one of prices, earnings, income, balance, overview")]
    InvalidDomain { value: String },
    #[error("invalid value '{value}' for {name}: expected a positive integer")]
    InvalidSetting { name: &'static str, value: String },
}

/// Errors raised by the fetch-normalize-write stage.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// No usable API key; the fetch stage must stop before any request.
    #[error("no valid API key configured (set ALPHA_VANTAGE_API_KEY); existing artifacts are kept")]
    Authentication,

    #[error("{domain} fetch for {symbol} failed: {message}")]
    UpstreamUnavailable {
        domain: Domain,
        symbol: String,
        message: String,
    },

    #[error("{domain} response for {symbol} is malformed: {message}")]
    MalformedResponse {
        domain: Domain,
        symbol: String,
        message: String,
    },

    #[error("failed to write artifact {}: {source}", path.display())]
    Artifact {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl PipelineError {
    pub fn unavailable(domain: Domain, symbol: &str, message: impl Into<String>) -> Self {
        Self::UpstreamUnavailable {
            domain,
            symbol: symbol.to_string(),
            message: message.into(),
        }
    }

    pub fn malformed(domain: Domain, symbol: &str, message: impl Into<String>) -> Self {
        Self::MalformedResponse {
            domain,
            symbol: symbol.to_string(),
            message: message.into(),
        }
    }

    /// Whether this error is confined to one domain's batch.
    pub const fn is_domain_local(&self) -> bool {
        matches!(
            self,
            Self::UpstreamUnavailable { .. } | Self::MalformedResponse { .. }
        )
    }
}
