//! Submits the sample application and polls its status until it finishes.
//!
//! ```text
//! DEALFLOW_STAGE_LATENCY_MS=200 RUST_LOG=info cargo run --example evaluate
//! ```

use anyhow::Context;
use dealflow::observability::{init_tracing, LogFormat};
use dealflow::prelude::*;
use dealflow::testing::sample_application;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing(LogFormat::Pretty).context("installing the tracing subscriber")?;

    let config = OrchestratorConfig::from_env().context("reading DEALFLOW_* configuration")?;
    let evaluations = Arc::new(InMemoryEvaluationStore::new());
    let registry = Arc::new(InMemoryApplicationRegistry::new());
    let orchestrator = Orchestrator::builder()
        .config(config)
        .evaluation_sink(evaluations.clone())
        .entity_sink(registry.clone())
        .build()?;

    let handle = orchestrator.submit(sample_application(EntityId::generate())).await?;
    let id = handle.entity_id().clone();

    while !handle.is_finished() {
        let snapshot = orchestrator.query_status(&id);
        let line: Vec<String> = snapshot
            .iter()
            .map(|s| format!("{}={}({}%)", s.stage_name, s.state, s.progress))
            .collect();
        println!("[{}] {}", snapshot.run_state(), line.join(" "));
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    match handle.wait().await {
        RunOutcome::Evaluated(result) => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        RunOutcome::Failed(error) => anyhow::bail!("evaluation failed: {error}"),
        RunOutcome::Superseded => println!("run was superseded"),
    }

    println!("{}", serde_json::to_string_pretty(&orchestrator.metrics())?);
    Ok(())
}
