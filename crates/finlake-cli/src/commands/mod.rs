mod domains;
mod fetch;
mod load;
mod query;
mod run;
mod sql;

use std::time::Instant;

use finlake_core::{PipelineConfig, Symbol, WarehouseConfig};
use serde::Serialize;
use serde_json::Value;

use crate::cli::{Cli, Command};
use crate::error::CliError;

/// Resolved settings shared by every command.
#[derive(Debug, Clone)]
pub struct Context {
    pub pipeline: PipelineConfig,
    pub warehouse: WarehouseConfig,
}

impl Context {
    pub fn from_cli(cli: &Cli) -> Result<Self, CliError> {
        let mut pipeline = PipelineConfig::from_env(cli.home.clone())?;
        if let Some(symbols) = &cli.symbols {
            pipeline = pipeline.with_symbols(Symbol::parse_list(symbols)?);
        }
        if let Some(timeout_ms) = cli.timeout_ms {
            if timeout_ms == 0 {
                return Err(CliError::Command(String::from(
                    "--timeout-ms must be greater than zero",
                )));
            }
            pipeline = pipeline.with_timeout_ms(timeout_ms);
        }

        let mut warehouse = pipeline.warehouse();
        if let Some(preview_rows) = cli.preview_rows {
            warehouse.preview_rows = preview_rows;
        }

        Ok(Self {
            pipeline,
            warehouse,
        })
    }
}

pub struct CommandResult {
    pub data: Value,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl CommandResult {
    pub fn ok(data: Value) -> Self {
        Self {
            data,
            warnings: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings.extend(warnings);
        self
    }

    pub fn with_errors(mut self, errors: Vec<String>) -> Self {
        self.errors.extend(errors);
        self
    }
}

/// What gets rendered for one invocation.
#[derive(Debug, Serialize)]
pub struct CommandReport {
    pub command: &'static str,
    pub data: Value,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
    pub latency_ms: u64,
}

pub async fn run(cli: &Cli) -> Result<CommandReport, CliError> {
    let started = Instant::now();

    let (command, result) = match &cli.command {
        Command::Domains => ("domains", domains::run()),
        command => {
            let context = Context::from_cli(cli)?;
            match command {
                Command::Fetch(args) => ("fetch", fetch::run(args, &context).await?),
                Command::Load => ("load", load::run(&context)?),
                Command::Query(args) => ("query", query::run(args, &context)?),
                Command::Sql(args) => ("sql", sql::run(args, &context)?),
                Command::Run(args) => ("run", run::run(args, &context).await?),
                Command::Domains => ("domains", domains::run()),
            }
        }
    };

    let CommandResult {
        data,
        warnings,
        errors,
    } = result;

    Ok(CommandReport {
        command,
        data,
        warnings,
        errors,
        latency_ms: started.elapsed().as_millis().min(u128::from(u64::MAX)) as u64,
    })
}
