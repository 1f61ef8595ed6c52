//! Pipeline configuration resolved from the environment.

use std::env;
use std::fmt::{Debug, Formatter};
use std::path::{Path, PathBuf};

use finlake_warehouse::{resolve_home, WarehouseConfig};
use tracing::{debug, warn};

use crate::{PipelineError, Symbol, ValidationError};

pub const API_KEY_VAR: &str = "ALPHA_VANTAGE_API_KEY";
pub const BASE_URL_VAR: &str = "ALPHA_VANTAGE_BASE_URL";
pub const SYMBOLS_VAR: &str = "FINLAKE_SYMBOLS";
pub const TIMEOUT_VAR: &str = "FINLAKE_TIMEOUT_MS";

/// Value shipped in `.env` templates; treated the same as no key at all.
pub const PLACEHOLDER_API_KEY: &str = "your_actual_api_key_here";
pub const DEFAULT_BASE_URL: &str = "https://www.alphavantage.co/query";
pub const DEFAULT_SYMBOLS: &str = "JNJ,PFE,UNH,MDT";
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// A credential that passed [`PipelineConfig::api_key`].
///
/// `Debug` never prints the key.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Debug for ApiKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

#[derive(Clone)]
pub struct PipelineConfig {
    pub home: PathBuf,
    pub data_dir: PathBuf,
    pub api_key: Option<String>,
    pub base_url: String,
    pub symbols: Vec<Symbol>,
    pub timeout_ms: u64,
}

impl PipelineConfig {
    /// Defaults for `home` without consulting the environment.
    pub fn for_home(home: impl Into<PathBuf>) -> Self {
        let home = home.into();
        Self {
            data_dir: home.join("data"),
            home,
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            symbols: default_symbols(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }

    /// Resolve configuration from the process environment.
    ///
    /// `home` overrides `FINLAKE_HOME`. An optional `<home>/.env` file is
    /// loaded first; variables already set in the environment win.
    pub fn from_env(home: Option<PathBuf>) -> Result<Self, ValidationError> {
        let home = home.unwrap_or_else(resolve_home);
        load_dotenv(&home);
        Self::from_lookup(home, |name| env::var(name).ok())
    }

    /// Resolve configuration through `lookup` instead of the process
    /// environment.
    pub fn from_lookup(
        home: impl Into<PathBuf>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ValidationError> {
        let mut config = Self::for_home(home);
        config.api_key = lookup(API_KEY_VAR);

        if let Some(base_url) = lookup(BASE_URL_VAR).filter(|value| !value.trim().is_empty()) {
            config.base_url = base_url.trim().to_string();
        }
        if let Some(symbols) = lookup(SYMBOLS_VAR).filter(|value| !value.trim().is_empty()) {
            config.symbols = Symbol::parse_list(&symbols)?;
        }
        if let Some(timeout) = lookup(TIMEOUT_VAR).filter(|value| !value.trim().is_empty()) {
            config.timeout_ms = parse_timeout(&timeout)?;
        }
        Ok(config)
    }

    #[must_use]
    pub fn with_symbols(mut self, symbols: Vec<Symbol>) -> Self {
        self.symbols = symbols;
        self
    }

    #[must_use]
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// The configured credential, or [`PipelineError::Authentication`] when it
    /// is absent, blank, or the template placeholder.
    pub fn api_key(&self) -> Result<ApiKey, PipelineError> {
        match self.api_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() && key != PLACEHOLDER_API_KEY => {
                Ok(ApiKey(key.to_string()))
            }
            _ => Err(PipelineError::Authentication),
        }
    }

    /// Warehouse layout for the same home.
    pub fn warehouse(&self) -> WarehouseConfig {
        WarehouseConfig::for_home(self.home.clone())
    }
}

impl Debug for PipelineConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("home", &self.home)
            .field("data_dir", &self.data_dir)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("base_url", &self.base_url)
            .field("symbols", &self.symbols)
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

/// Load `<home>/.env` into the process environment if it exists.
pub fn load_dotenv(home: &Path) -> Option<PathBuf> {
    let path = home.join(".env");
    if !path.is_file() {
        return None;
    }
    match dotenvy::from_path(&path) {
        Ok(()) => {
            debug!(path = %path.display(), "loaded environment file");
            Some(path)
        }
        Err(error) => {
            warn!(path = %path.display(), %error, "ignoring unreadable environment file");
            None
        }
    }
}

fn parse_timeout(value: &str) -> Result<u64, ValidationError> {
    match value.trim().parse::<u64>() {
        Ok(timeout) if timeout > 0 => Ok(timeout),
        _ => Err(ValidationError::InvalidSetting {
            name: TIMEOUT_VAR,
            value: value.to_string(),
        }),
    }
}

fn default_symbols() -> Vec<Symbol> {
    DEFAULT_SYMBOLS
        .split(',')
        .filter_map(|symbol| Symbol::parse(symbol).ok())
        .collect()
}
