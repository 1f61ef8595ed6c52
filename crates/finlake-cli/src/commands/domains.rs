use finlake_core::Domain;
use serde_json::{json, Value};

use super::CommandResult;

pub fn run() -> CommandResult {
    let domains: Vec<Value> = Domain::ALL
        .iter()
        .map(|domain| {
            json!({
                "domain": domain.as_str(),
                "function": domain.function(),
                "required_key": domain.required_key(),
                "tables": domain.tables(),
            })
        })
        .collect();

    CommandResult::ok(json!({ "domains": domains }))
}
