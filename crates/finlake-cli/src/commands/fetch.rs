use std::sync::Arc;

use finlake_core::{Domain, FetchStage, FetchSummary, PipelineError, ReqwestHttpClient};
use serde_json::{json, Value};
use tracing::warn;

use super::{CommandResult, Context};
use crate::cli::FetchArgs;
use crate::error::CliError;

pub async fn run(args: &FetchArgs, context: &Context) -> Result<CommandResult, CliError> {
    let mut domains: Vec<Domain> = Vec::new();
    for domain in &args.domains {
        if !domains.contains(domain) {
            domains.push(*domain);
        }
    }
    if domains.is_empty() {
        domains = Domain::ALL.to_vec();
    }

    fetch_domains(context, &domains, false).await
}

/// Run the fetch stage for `domains`.
///
/// A missing credential is not an error: nothing is fetched, existing
/// artifacts stay, and the result carries a warning.
pub(crate) async fn fetch_domains(
    context: &Context,
    domains: &[Domain],
    fail_fast: bool,
) -> Result<CommandResult, CliError> {
    let stage = match FetchStage::new(&context.pipeline, Arc::new(ReqwestHttpClient::new())) {
        Ok(stage) => stage,
        Err(PipelineError::Authentication) => {
            warn!("no usable API key; skipping fetch");
            return Ok(CommandResult::ok(json!({
                "skipped": true,
                "symbols": [],
                "domains": [],
            }))
            .with_warning(PipelineError::Authentication.to_string()));
        }
        Err(error) => return Err(error.into()),
    };

    let mut summary = FetchSummary::default();
    if fail_fast {
        for domain in domains {
            let step = stage.run(std::slice::from_ref(domain)).await;
            let failed = step.has_failures();
            summary.outcomes.extend(step.outcomes);
            if failed {
                break;
            }
        }
    } else {
        summary = stage.run(domains).await;
    }

    let symbols: Vec<&str> = stage.symbols().iter().map(|symbol| symbol.as_str()).collect();
    Ok(summarize(&summary, &symbols))
}

fn summarize(summary: &FetchSummary, symbols: &[&str]) -> CommandResult {
    let entries: Vec<Value> = summary
        .outcomes
        .iter()
        .map(|outcome| match &outcome.result {
            Ok(report) => json!({
                "domain": outcome.domain.as_str(),
                "status": "written",
                "artifacts": report.artifacts,
                "elapsed_ms": report.elapsed_ms,
            }),
            Err(error) => json!({
                "domain": outcome.domain.as_str(),
                "status": "failed",
                "error": error.to_string(),
            }),
        })
        .collect();

    let errors = summary
        .failed()
        .map(|(domain, error)| format!("{domain}: {error}"))
        .collect();

    CommandResult::ok(json!({
        "skipped": false,
        "symbols": symbols,
        "domains": entries,
    }))
    .with_errors(errors)
}
