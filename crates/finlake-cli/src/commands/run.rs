use finlake_core::{Domain, Warehouse};
use serde_json::{json, Value};
use tracing::{error, info, warn};

use super::{fetch, load, query, CommandResult, Context};
use crate::cli::RunArgs;
use crate::error::CliError;

/// fetch, load, and query in sequence.
///
/// Every stage runs even when an earlier one failed; failures are collected
/// into the result so the process exits with the stage-failure code. With
/// `--fail-fast` the first failing stage ends the run.
pub async fn run(args: &RunArgs, context: &Context) -> Result<CommandResult, CliError> {
    let mut warnings = Vec::new();
    let mut errors = Vec::new();

    info!(stage = "fetch", "stage started");
    let fetched = fetch::fetch_domains(context, &Domain::ALL, args.fail_fast).await?;
    warnings.extend(fetched.warnings);
    errors.extend(fetched.errors);
    if args.fail_fast && !errors.is_empty() {
        warn!("fetch failed; stopping before load");
        return Ok(CommandResult::ok(json!({ "fetch": fetched.data }))
            .with_warnings(warnings)
            .with_errors(errors));
    }

    info!(stage = "load", "stage started");
    let loaded = match load::run(context) {
        Ok(loaded) => {
            warnings.extend(loaded.warnings);
            loaded.data
        }
        Err(failure) => {
            error!(stage = "load", error = %failure, "stage failed");
            errors.push(format!("load: {failure}"));
            if args.fail_fast {
                return Ok(CommandResult::ok(json!({
                    "fetch": fetched.data,
                    "load": Value::Null,
                }))
                .with_warnings(warnings)
                .with_errors(errors));
            }
            Value::Null
        }
    };

    info!(stage = "query", "stage started");
    let warehouse = Warehouse::new(context.warehouse.clone());
    let runner = warehouse.query_runner();
    let queried = runner
        .definitions()
        .map_err(CliError::from)
        .and_then(|definitions| {
            query::run_definitions(&warehouse, &runner, &definitions, args.fail_fast)
        });
    let queried = match queried {
        Ok(queried) => {
            warnings.extend(queried.warnings);
            errors.extend(queried.errors);
            queried.data
        }
        Err(failure) => {
            error!(stage = "query", error = %failure, "stage failed");
            errors.push(format!("query: {failure}"));
            Value::Null
        }
    };

    Ok(CommandResult::ok(json!({
        "fetch": fetched.data,
        "load": loaded,
        "query": queried,
    }))
    .with_warnings(warnings)
    .with_errors(errors))
}
