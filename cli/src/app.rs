//! CLI assembly: loads plans, applies flag overrides, wires plugins into the orchestrator and answers HITL requests.
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use taskweave_core::api as core_api;
use taskweave_core::error::{CliError, OrchestratorError};
use taskweave_plugins::factory;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::commands::cli::{PlanArgs, RunArgs};

pub fn load_plan(path: &str) -> Result<core_api::Plan, CliError> {
    let raw = std::fs::read_to_string(path)?;
    let doc: core_api::PlanDocument =
        serde_json::from_str(&raw).map_err(|e| CliError::PlanDocument(format!("{path}: {e}")))?;
    Ok(core_api::Plan::from(doc))
}

fn load_valid_plan(path: &str) -> Result<core_api::Plan, CliError> {
    let plan = load_plan(path)?;
    let report = plan.validate();
    if !report.is_ok() {
        return Err(OrchestratorError::InvalidPlan(report).into());
    }
    Ok(plan)
}

pub fn validate_plan(args: &PlanArgs) -> Result<i32, CliError> {
    let plan = load_valid_plan(&args.plan)?;
    println!(
        "plan ok: {} tasks, strategy {}",
        plan.len(),
        plan.strategy()
    );
    Ok(0)
}

pub fn print_levels(args: &PlanArgs) -> Result<i32, CliError> {
    let plan = load_valid_plan(&args.plan)?;
    let levels = plan.parallel_levels().map_err(OrchestratorError::from)?;
    for (idx, level) in levels.iter().enumerate() {
        let ids: Vec<&str> = level.iter().map(|t| t.id.as_str()).collect();
        println!("level {idx}: {}", ids.join(", "));
    }
    let order = plan.topological_order().map_err(OrchestratorError::from)?;
    let ids: Vec<&str> = order.iter().map(|t| t.id.as_str()).collect();
    println!("order: {}", ids.join(" -> "));
    Ok(0)
}

#[tracing::instrument(name = "cli.run_plan", skip(cfg, run_args), fields(plan = %run_args.plan_args.plan))]
pub async fn run_plan(mut cfg: core_api::AppConfig, run_args: RunArgs) -> Result<i32, CliError> {
    let mut plan = load_plan(&run_args.plan_args.plan)?;

    if let Some(n) = run_args.max_parallel {
        cfg.orchestrator.max_parallel = n;
    }
    if let Some(strategy) = run_args.strategy {
        cfg.orchestrator.strategy = Some(strategy);
    }
    if run_args.no_cache {
        cfg.orchestrator.use_cache = false;
        cfg.cache.enabled = false;
    }
    if let Some(ms) = run_args.resume_timeout_ms {
        cfg.orchestrator.resume_timeout_ms = Some(ms);
    }
    if run_args.progress {
        cfg.orchestrator.progress_bar = true;
    }

    let registry = factory::build_registry(run_args.shell_timeout_ms.map(Duration::from_millis));
    let mut builder = core_api::Orchestrator::builder(Arc::new(registry))
        .opts(core_api::ExecutionOpts::from_config(&cfg))
        .renderer(factory::build_renderer(&run_args.stream_format));
    if cfg.orchestrator.use_cache {
        if let Some(cache) = factory::build_cache(&cfg) {
            builder = builder.cache(cache);
        }
    }
    let orchestrator = builder.build();

    let sessions = core_api::SessionRegistry::new();
    let session = sessions.create_session(None).await;
    let session_id = session.session_id().to_string();
    tracing::debug!(session_id = %session_id, "session created");

    let responder = spawn_responder(sessions.clone(), session_id.clone(), run_args.auto_approve);
    let interrupt = spawn_interrupt(sessions.clone(), session_id.clone());

    let outcome = orchestrator.run(&mut plan, &session).await;
    responder.abort();
    interrupt.abort();
    sessions.remove(&session_id).await;

    if let Some(path) = &run_args.state_out {
        let doc = serde_json::to_string_pretty(&plan).map_err(anyhow::Error::from)?;
        std::fs::write(path, doc)?;
        tracing::info!(path = %path, "plan state written");
    }

    let summary = outcome?;
    Ok(exit_code_for_status(summary.status))
}

fn exit_code_for_status(status: core_api::PlanStatus) -> i32 {
    match status {
        core_api::PlanStatus::Completed => 0,
        core_api::PlanStatus::Partial => 3,
        core_api::PlanStatus::Paused => 4,
        core_api::PlanStatus::Cancelled => 5,
    }
}

/// Cancel the session on Ctrl-C.
fn spawn_interrupt(sessions: core_api::SessionRegistry, session_id: String) -> JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!(session_id = %session_id, "interrupted, cancelling session");
            let _ = sessions.cancel(&session_id).await;
        }
    })
}

/// Answers approval and input requests for one session, from the terminal or automatically.
fn spawn_responder(
    sessions: core_api::SessionRegistry,
    session_id: String,
    auto_approve: bool,
) -> JoinHandle<()> {
    let mut rx = sessions.subscribe();
    let interactive = atty::is(atty::Stream::Stdin);
    tokio::spawn(async move {
        loop {
            let event = match rx.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "pause event listener lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };
            if event.session_id != session_id {
                continue;
            }
            if let Err(e) = answer(&sessions, &event, auto_approve, interactive).await {
                tracing::error!(session_id = %session_id, error = %e, "failed to answer pause request");
            }
        }
    })
}

async fn answer(
    sessions: &core_api::SessionRegistry,
    event: &core_api::PauseEvent,
    auto_approve: bool,
    interactive: bool,
) -> anyhow::Result<()> {
    let sid = event.session_id.as_str();
    let text = |key: &str| {
        event
            .payload
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };

    match event.kind {
        core_api::PauseEventKind::ApprovalRequested => {
            let task_id = text("task_id");
            if auto_approve {
                tracing::info!(task_id = %task_id, "auto-approving task");
                sessions.approve(sid, Some("auto-approved".into())).await?;
                return Ok(());
            }
            if !interactive {
                tracing::warn!(task_id = %task_id, "no terminal to ask for approval, rejecting");
                sessions
                    .reject(sid, Some("no interactive terminal".into()))
                    .await?;
                return Ok(());
            }

            let question = format!(
                "{}\napprove task '{}'? [y]es / [n]o [reason] / [m]odify <instruction>: ",
                text("message"),
                task_id
            );
            let decision = tokio::task::spawn_blocking(move || {
                ask_decision(&mut std::io::stdin().lock(), &mut std::io::stderr(), &question)
            })
            .await??;
            match decision {
                Decision::Approve => sessions.approve(sid, None).await?,
                Decision::Reject(reason) => sessions.reject(sid, reason).await?,
                Decision::Modify(instruction) => sessions.modify(sid, instruction, None).await?,
            };
        }
        core_api::PauseEventKind::InputRequested => {
            if !interactive {
                tracing::warn!(field = %text("field"), "no terminal to read input from");
                return Ok(());
            }
            let question = format!("{}\n{}: ", text("message"), text("field"));
            let answer = tokio::task::spawn_blocking(move || {
                let mut stderr = std::io::stderr();
                write!(stderr, "{question}")?;
                stderr.flush()?;
                read_answer(&mut std::io::stdin().lock())
            })
            .await??;
            match answer {
                Some(value) => {
                    sessions.provide_input(sid, Value::String(value), None).await?;
                }
                None => {
                    tracing::warn!(field = %text("field"), "stdin closed while waiting for input, cancelling");
                    sessions.cancel(sid).await?;
                }
            }
        }
        core_api::PauseEventKind::Paused => {
            tracing::info!(reason = %text("reason"), "session paused");
        }
        _ => {}
    }
    Ok(())
}

#[derive(Debug, PartialEq, Eq)]
enum Decision {
    Approve,
    Reject(Option<String>),
    Modify(String),
}

fn parse_decision(line: &str) -> Option<Decision> {
    let line = line.trim();
    let (head, rest) = match line.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (line, ""),
    };
    match head.to_ascii_lowercase().as_str() {
        "y" | "yes" => Some(Decision::Approve),
        "n" | "no" => Some(Decision::Reject((!rest.is_empty()).then(|| rest.to_string()))),
        "m" | "modify" if !rest.is_empty() => Some(Decision::Modify(rest.to_string())),
        _ => None,
    }
}

/// One trimmed line, or `None` once the reader is at end of input.
fn read_answer(reader: &mut impl BufRead) -> io::Result<Option<String>> {
    let mut line = String::new();
    if reader.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

/// Ask until the answer parses. End of input rejects the task.
fn ask_decision(
    reader: &mut impl BufRead,
    writer: &mut impl Write,
    question: &str,
) -> io::Result<Decision> {
    loop {
        write!(writer, "{question}")?;
        writer.flush()?;
        match read_answer(reader)? {
            Some(line) => {
                if let Some(decision) = parse_decision(&line) {
                    return Ok(decision);
                }
            }
            None => return Ok(Decision::Reject(Some("stdin closed".to_string()))),
        }
    }
}
