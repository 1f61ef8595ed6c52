use finlake_core::{QueryGuardrails, Warehouse};

use super::{CommandResult, Context};
use crate::cli::SqlArgs;
use crate::error::CliError;

pub fn run(args: &SqlArgs, context: &Context) -> Result<CommandResult, CliError> {
    let guardrails = QueryGuardrails {
        max_rows: args.max_rows,
        query_timeout_ms: args.query_timeout_ms,
    };

    let result = Warehouse::new(context.warehouse.clone()).execute_query(&args.query, guardrails)?;
    let truncated = result.truncated;

    let mut command_result = CommandResult::ok(serde_json::to_value(&result)?);
    if truncated {
        command_result = command_result.with_warning(format!(
            "result truncated at {} rows (use --max-rows to increase limit)",
            args.max_rows
        ));
    }

    Ok(command_result)
}
