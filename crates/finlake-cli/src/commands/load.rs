use finlake_core::{load_plan, Warehouse};

use super::{CommandResult, Context};
use crate::error::CliError;

pub fn run(context: &Context) -> Result<CommandResult, CliError> {
    let warehouse = Warehouse::new(context.warehouse.clone());
    let report = warehouse.rebuild(&load_plan(&context.pipeline.data_dir))?;

    let warnings = report
        .skipped
        .iter()
        .map(|skipped| {
            format!(
                "table {} not loaded: {} is missing",
                skipped.table,
                skipped.artifact.display()
            )
        })
        .collect();

    Ok(CommandResult::ok(serde_json::to_value(&report)?).with_warnings(warnings))
}
