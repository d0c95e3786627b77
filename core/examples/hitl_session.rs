//! Human-in-the-loop walkthrough
//!
//! Runs a small release plan where `deploy` needs approval. A background
//! listener prints every pause event and approves the request.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use taskweave_core::api::{
    ExecutionError, Orchestrator, PauseEventKind, Plan, SessionRegistry, Task, TaskExecutor,
};

struct Announce;

#[async_trait]
impl TaskExecutor for Announce {
    async fn execute(&self, task: &Task) -> Result<Value, ExecutionError> {
        println!("   ▶ running {} ({})", task.id, task.tool);
        tokio::time::sleep(tokio::time::Duration::from_millis(150)).await;
        Ok(json!({ "task": task.id, "params": task.params }))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let registry = SessionRegistry::new();

    // Event listener (background task)
    let mut event_rx = registry.subscribe();
    let reviewer = registry.clone();
    tokio::spawn(async move {
        println!("📡 Event listener started\n");
        while let Ok(event) = event_rx.recv().await {
            println!("→ Session {}: {} ({} → {})", event.session_id, event.kind.as_str(), event.from, event.to);
            if event.kind == PauseEventKind::ApprovalRequested {
                println!("   {}", event.payload["message"]);
                tokio::time::sleep(tokio::time::Duration::from_millis(300)).await;
                if let Err(e) = reviewer.approve(&event.session_id, Some("looks good".into())).await {
                    eprintln!("approve failed: {e}");
                }
            }
        }
    });

    let session = registry.create_session(Some("release-42".to_string())).await;

    let mut plan = Plan::build(vec![
        Task::new("build", "cargo"),
        Task::new("test", "cargo").with_dependencies(["build"]),
        Task::new("lint", "cargo").with_dependencies(["build"]),
        Task::new("deploy", "shell")
            .with_description("Push to production")
            .with_param("env", "prod")
            .with_dependencies(["test", "lint"])
            .requiring_approval(),
    ])?;

    println!("🚀 Running plan with strategy {}\n", plan.strategy());
    let summary = Orchestrator::new(Arc::new(Announce))
        .run(&mut plan, &session)
        .await?;

    println!("\n📊 Final Statistics:");
    println!("   Status: {}", summary.status.as_str());
    println!("   Successful: {}/{}", summary.successful, summary.total_tasks);
    println!("   Batches: {}", summary.batches);
    println!("   Transitions: {}", session.history().len());

    Ok(())
}
