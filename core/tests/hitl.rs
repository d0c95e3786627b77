mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::{executor, RecordingExecutor, TraceRenderer};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use taskweave_core::api::{
    ExecutionError, ExecutionOpts, HitlResponse, Orchestrator, PauseController, PauseEventKind,
    PauseMode, Plan, PlanStatus, SessionRegistry, Task, TaskExecutor, TaskStatus,
};

#[derive(Clone, Copy)]
enum Decision {
    Approve,
    Reject,
    Modify(&'static str),
}

/// Answers every approval request on the registry with `decision`.
fn spawn_reviewer(registry: SessionRegistry, decision: Decision) {
    let mut rx = registry.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = rx.recv().await {
            if event.kind != PauseEventKind::ApprovalRequested {
                continue;
            }
            let session = event.session_id.clone();
            let answered = match decision {
                Decision::Approve => registry.approve(&session, Some("lgtm".into())).await,
                Decision::Reject => registry.reject(&session, Some("not now".into())).await,
                Decision::Modify(instruction) => registry.modify(&session, instruction, None).await,
            };
            assert!(answered.unwrap());
        }
    });
}

fn release_plan() -> Plan {
    Plan::new(vec![
        Task::new("deploy", "shell")
            .with_param("env", "prod")
            .requiring_approval(),
        Task::new("notify", "slack").with_dependencies(["deploy"]),
        Task::new("audit", "log"),
    ])
}

#[tokio::test]
async fn approved_task_is_dispatched() {
    let registry = SessionRegistry::new();
    let ctl = registry.create_session(Some("approve".into())).await;
    spawn_reviewer(registry.clone(), Decision::Approve);

    let mut plan = release_plan();
    let exec = executor(RecordingExecutor::new());
    let summary = Orchestrator::new(exec.clone())
        .run(&mut plan, &ctl)
        .await
        .unwrap();

    assert_eq!(summary.status, PlanStatus::Completed);
    assert_eq!(summary.successful, 3);

    let trail: Vec<(PauseMode, PauseMode)> =
        ctl.history().iter().map(|r| (r.from, r.to)).collect();
    assert_eq!(
        trail,
        vec![
            (PauseMode::Running, PauseMode::ApprovalWait),
            (PauseMode::ApprovalWait, PauseMode::Running),
        ]
    );
    assert!(exec.position("start:notify") > exec.position("end:deploy"));
}

#[tokio::test]
async fn rejected_task_is_skipped_and_blocks_dependents() {
    let registry = SessionRegistry::new();
    let ctl = registry.create_session(Some("reject".into())).await;
    spawn_reviewer(registry.clone(), Decision::Reject);

    let mut plan = release_plan();
    let exec = executor(RecordingExecutor::new());
    let renderer = Arc::new(TraceRenderer::default());
    let summary = Orchestrator::builder(exec.clone())
        .renderer(renderer.clone())
        .build()
        .run(&mut plan, &ctl)
        .await
        .unwrap();

    assert_eq!(summary.status, PlanStatus::Partial);
    assert_eq!(summary.skipped, vec!["deploy".to_string()]);
    assert_eq!(summary.blocked, vec!["notify".to_string()]);
    assert_eq!(summary.failed, 0);
    assert_eq!(plan.task("deploy").unwrap().error.as_deref(), Some("not now"));
    assert_eq!(plan.task("audit").unwrap().status, TaskStatus::Completed);
    assert_eq!(exec.started(), vec!["audit".to_string()]);
    assert!(renderer
        .events()
        .contains(&"task.skipped:deploy".to_string()));
}

#[tokio::test]
async fn modified_task_runs_with_instruction() {
    let registry = SessionRegistry::new();
    let ctl = registry.create_session(Some("modify".into())).await;
    spawn_reviewer(registry.clone(), Decision::Modify("deploy to staging first"));

    let mut plan = release_plan();
    let summary = Orchestrator::new(executor(RecordingExecutor::new()))
        .run(&mut plan, &ctl)
        .await
        .unwrap();

    assert_eq!(summary.status, PlanStatus::Completed);
    assert_eq!(
        summary.results["deploy"]["params"],
        json!({"env": "prod", "instruction": "deploy to staging first"})
    );
}

#[tokio::test]
async fn unanswered_approval_leaves_plan_paused() {
    let ctl = PauseController::new("silent");
    let mut plan = release_plan();
    let exec = executor(RecordingExecutor::new());

    let summary = Orchestrator::builder(exec.clone())
        .opts(ExecutionOpts::default().with_resume_timeout(Duration::from_millis(30)))
        .build()
        .run(&mut plan, &ctl)
        .await
        .unwrap();

    assert_eq!(summary.status, PlanStatus::Paused);
    assert_eq!(ctl.mode(), PauseMode::ApprovalWait);
    assert_eq!(plan.task("deploy").unwrap().status, TaskStatus::Pending);
    assert_eq!(exec.calls(), 0);
}

#[tokio::test]
async fn pause_lets_in_flight_work_finish_but_starts_nothing_new() {
    let registry = SessionRegistry::new();
    let ctl = registry.create_session(Some("pause".into())).await;

    let mut plan = Plan::new(vec![
        Task::new("a", "t"),
        Task::new("b", "t").with_dependencies(["a"]),
        Task::new("c", "t").with_dependencies(["b"]),
    ]);
    let exec = executor(RecordingExecutor::new().pausing_on("a", ctl.clone()));

    let watcher = {
        let exec = exec.clone();
        let registry = registry.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(80)).await;
            let seen_while_paused = exec.log();
            assert!(registry.resume("pause").await.unwrap());
            seen_while_paused
        })
    };

    let summary = Orchestrator::new(exec.clone())
        .run(&mut plan, &ctl)
        .await
        .unwrap();

    let seen_while_paused = watcher.await.unwrap();
    assert_eq!(seen_while_paused, vec!["start:a", "end:a"]);
    assert_eq!(summary.status, PlanStatus::Completed);
    assert_eq!(exec.started(), vec!["a", "b", "c"]);
}

#[tokio::test]
async fn plan_edit_round_trip_then_resume() {
    let registry = SessionRegistry::new();
    let ctl = registry.create_session(Some("edit".into())).await;

    let mut rx = registry.subscribe();
    let editor = registry.clone();
    tokio::spawn(async move {
        while let Ok(event) = rx.recv().await {
            if event.kind == PauseEventKind::Paused {
                assert!(editor.enter_plan_edit("edit").await.unwrap());
                assert!(editor.exit_plan_edit("edit", false).await.unwrap());
                assert!(editor.resume("edit").await.unwrap());
            }
        }
    });

    let mut plan = Plan::new(vec![
        Task::new("a", "t"),
        Task::new("b", "t").with_dependencies(["a"]),
    ]);
    let exec = executor(RecordingExecutor::new().pausing_on("a", ctl.clone()));
    let summary = Orchestrator::new(exec).run(&mut plan, &ctl).await.unwrap();

    assert_eq!(summary.status, PlanStatus::Completed);
    let modes: Vec<PauseMode> = ctl.history().iter().map(|r| r.to).collect();
    assert_eq!(
        modes,
        vec![
            PauseMode::Paused,
            PauseMode::PlanEdit,
            PauseMode::Paused,
            PauseMode::Running,
        ]
    );
}

#[tokio::test]
async fn cancel_while_paused_cancels_remaining_tasks() {
    let registry = SessionRegistry::new();
    let ctl = registry.create_session(Some("cancel".into())).await;

    let mut rx = registry.subscribe();
    let canceller = registry.clone();
    tokio::spawn(async move {
        while let Ok(event) = rx.recv().await {
            if event.kind == PauseEventKind::Paused {
                assert!(canceller.cancel("cancel").await.unwrap());
            }
        }
    });

    let mut plan = Plan::new(vec![
        Task::new("a", "t"),
        Task::new("b", "t").with_dependencies(["a"]),
        Task::new("c", "t").with_dependencies(["b"]),
    ]);
    let exec = executor(RecordingExecutor::new().pausing_on("a", ctl.clone()));
    let summary = Orchestrator::new(exec).run(&mut plan, &ctl).await.unwrap();

    assert_eq!(summary.status, PlanStatus::Cancelled);
    assert_eq!(plan.task("a").unwrap().status, TaskStatus::Completed);
    assert_eq!(plan.count_status(TaskStatus::Cancelled), 2);
    assert!(!ctl.resume());
}

/// Asks for a value in one task and consumes it in the next.
struct Interviewer {
    ctl: PauseController,
}

#[async_trait]
impl TaskExecutor for Interviewer {
    async fn execute(&self, task: &Task) -> Result<Value, ExecutionError> {
        match task.id.as_str() {
            "ask" => {
                if !self.ctl.request_input("region", "Which region should we target?") {
                    return Err(ExecutionError::failed("session not running"));
                }
                Ok(Value::Null)
            }
            _ => match self.ctl.take_response() {
                Some(HitlResponse::Input { value, .. }) => Ok(value),
                other => Err(ExecutionError::failed(format!("no input: {other:?}"))),
            },
        }
    }
}

#[tokio::test]
async fn input_request_suspends_until_value_provided() {
    let registry = SessionRegistry::new();
    let ctl = registry.create_session(Some("input".into())).await;

    let mut rx = registry.subscribe();
    let responder = registry.clone();
    tokio::spawn(async move {
        while let Ok(event) = rx.recv().await {
            if event.kind == PauseEventKind::InputRequested {
                assert_eq!(event.payload["field"], json!("region"));
                assert!(responder
                    .provide_input("input", json!("eu-west-1"), None)
                    .await
                    .unwrap());
            }
        }
    });

    let mut plan = Plan::new(vec![
        Task::new("ask", "prompt"),
        Task::new("use", "prompt").with_dependencies(["ask"]),
    ]);
    let summary = Orchestrator::new(Arc::new(Interviewer { ctl: ctl.clone() }))
        .run(&mut plan, &ctl)
        .await
        .unwrap();

    assert_eq!(summary.status, PlanStatus::Completed);
    assert_eq!(summary.results["use"], json!("eu-west-1"));
}
