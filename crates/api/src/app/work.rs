//! Demo work handlers registered at startup.
//!
//! Each handler only sees the caller snapshot; none of them touch the request.

use std::thread;
use std::time::Duration;

use serde::Deserialize;
use serde_json::json;

use offload_core::{CallerContext, JobOutput};
use offload_infra::jobs::{JobStore, QueuedExecutor};

const DEFAULT_DELAY: Duration = Duration::from_millis(500);
const MAX_DELAY: Duration = Duration::from_secs(30);

pub fn register<S: JobStore>(executor: &mut QueuedExecutor<S>) {
    executor.register_handler("report", report);
    executor.register_handler("export", export);
    executor.register_form_handler("summary", summary);
    executor.register_handler("fail", fail);
}

/// Simulated slow work; `delay_ms` overrides the default pause.
fn simulate_work(ctx: &CallerContext) {
    let delay = ctx
        .query_param("delay_ms")
        .and_then(|v| v.parse().ok())
        .map(Duration::from_millis)
        .unwrap_or(DEFAULT_DELAY)
        .min(MAX_DELAY);
    thread::sleep(delay);
}

fn report(ctx: &CallerContext) -> Result<JobOutput, String> {
    simulate_work(ctx);
    let owner = ctx.identity.user_id.as_deref().unwrap_or(ctx.session().as_str());
    Ok(JobOutput::content(format!("report for {owner} is ready")))
}

fn export(ctx: &CallerContext) -> Result<JobOutput, String> {
    simulate_work(ctx);
    let name = ctx.query_param("name").unwrap_or("export");
    Ok(JobOutput::redirect(format!("/files/{name}.csv")))
}

#[derive(Debug, Deserialize)]
struct SummaryParams {
    values: Vec<f64>,
}

fn summary(params: SummaryParams, ctx: &CallerContext) -> Result<JobOutput, String> {
    simulate_work(ctx);
    if params.values.is_empty() {
        return Err("divide by zero".to_string());
    }
    let total: f64 = params.values.iter().sum();
    Ok(JobOutput::Data(json!({
        "count": params.values.len(),
        "total": total,
        "mean": total / params.values.len() as f64,
    })))
}

fn fail(ctx: &CallerContext) -> Result<JobOutput, String> {
    simulate_work(ctx);
    Err(ctx.query_param("reason").unwrap_or("work failed").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use offload_core::{CallerIdentity, SessionId};

    fn ctx(handler: &str) -> CallerContext {
        CallerContext::new(
            handler,
            "POST",
            format!("/work/{handler}"),
            CallerIdentity::anonymous(SessionId::new("42").unwrap()),
        )
        .with_query("delay_ms", "0")
    }

    #[test]
    fn report_names_the_caller() {
        assert_eq!(
            report(&ctx("report")).unwrap(),
            JobOutput::content("report for 42 is ready")
        );
    }

    #[test]
    fn export_redirects_to_file() {
        let out = export(&ctx("export").with_query("name", "q3")).unwrap();
        assert_eq!(out, JobOutput::redirect("/files/q3.csv"));
    }

    #[test]
    fn summary_of_nothing_fails() {
        let err = summary(SummaryParams { values: vec![] }, &ctx("summary")).unwrap_err();
        assert_eq!(err, "divide by zero");
    }

    #[test]
    fn summary_computes_mean() {
        let out = summary(SummaryParams { values: vec![1.0, 2.0, 3.0] }, &ctx("summary")).unwrap();
        assert_eq!(out, JobOutput::Data(json!({ "count": 3, "total": 6.0, "mean": 2.0 })));
    }
}
