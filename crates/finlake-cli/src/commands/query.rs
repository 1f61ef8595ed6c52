use finlake_core::{QueryDefinition, QueryRunner, Warehouse};
use serde_json::{json, Value};
use tracing::error;

use super::{CommandResult, Context};
use crate::cli::QueryArgs;
use crate::error::CliError;

pub fn run(args: &QueryArgs, context: &Context) -> Result<CommandResult, CliError> {
    let warehouse = Warehouse::new(context.warehouse.clone());
    let runner = warehouse.query_runner();

    let definitions = if args.names.is_empty() {
        runner.definitions()?
    } else {
        args.names
            .iter()
            .map(|name| runner.definition(name))
            .collect::<Result<Vec<_>, _>>()?
    };

    if args.list {
        let listed: Vec<Value> = definitions
            .iter()
            .map(|definition| json!({ "name": definition.name, "path": definition.path }))
            .collect();
        return Ok(CommandResult::ok(json!({ "definitions": listed })));
    }

    run_definitions(&warehouse, &runner, &definitions, args.fail_fast)
}

/// Execute `definitions` in order against one read-only store handle.
///
/// A failing query is reported by name; the rest still run unless
/// `fail_fast` is set.
pub(crate) fn run_definitions(
    warehouse: &Warehouse,
    runner: &QueryRunner,
    definitions: &[QueryDefinition],
    fail_fast: bool,
) -> Result<CommandResult, CliError> {
    if definitions.is_empty() {
        return Ok(CommandResult::ok(json!({ "queries": [] })).with_warning(format!(
            "no query definitions in {}",
            runner.queries_dir().display()
        )));
    }

    let store = warehouse.open_read_only()?;
    let mut queries = Vec::with_capacity(definitions.len());
    let mut errors = Vec::new();

    for definition in definitions {
        match runner.run(&store, definition) {
            Ok(outcome) => queries.push(serde_json::to_value(&outcome)?),
            Err(failure) => {
                error!(query = %definition.name, error = %failure, "query failed");
                queries.push(json!({
                    "name": definition.name,
                    "state": "reported",
                    "error": failure.to_string(),
                }));
                errors.push(failure.to_string());
                if fail_fast {
                    break;
                }
            }
        }
    }
    drop(store);

    Ok(CommandResult::ok(json!({ "queries": queries })).with_errors(errors))
}
