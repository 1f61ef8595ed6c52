//! Upstream data source adapters.

pub mod alphavantage;

pub use alphavantage::AlphaVantageClient;
