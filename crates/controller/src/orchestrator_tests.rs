// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use async_trait::async_trait;
use drover_core::{
    Agent, AgentHello, Command, ControllerMessage, FakeClock, OutputStream, Plan,
};
use drover_planner::StubPlanner;
use std::collections::BTreeMap;
use tempfile::TempDir;
use tokio::sync::mpsc;

/// Planner that always returns one fixed plan (direct plan injection).
struct ScriptedPlanner {
    plan: Plan,
}

#[async_trait]
impl Planner for ScriptedPlanner {
    async fn plan(&self, _request: &str, _inventory: &[Agent]) -> Result<Plan, PlannerError> {
        Ok(self.plan.clone())
    }

    fn provider_name(&self) -> &'static str {
        "scripted"
    }
}

/// Planner that fails the way a model with unparsable output does.
struct BrokenPlanner;

#[async_trait]
impl Planner for BrokenPlanner {
    async fn plan(&self, _request: &str, _inventory: &[Agent]) -> Result<Plan, PlannerError> {
        Err(PlannerError::Format("expected value at line 1".to_string()))
    }

    fn provider_name(&self) -> &'static str {
        "broken"
    }
}

struct Rig {
    clock: FakeClock,
    orch: Arc<Orchestrator<FakeClock>>,
    audit_dir: PathBuf,
    _tmp: TempDir,
}

fn rig_with(planner: Arc<dyn Planner>) -> Rig {
    let tmp = TempDir::new().unwrap();
    let audit_dir = tmp.path().join("audit");
    let config = ControllerConfig {
        port: 0,
        heartbeat_timeout: Duration::from_secs(60),
        task_retention: Duration::from_secs(168 * 3600),
        network_slack: Duration::from_secs(10),
        cancel_grace: Duration::from_secs(5),
        audit_dir: audit_dir.clone(),
    };
    let clock = FakeClock::new();
    let orch = Orchestrator::new(clock.clone(), planner, config);
    Rig { clock, orch, audit_dir, _tmp: tmp }
}

fn rig() -> Rig {
    rig_with(Arc::new(StubPlanner::new()))
}

fn scripted(runs: &[&str]) -> Arc<dyn Planner> {
    Arc::new(ScriptedPlanner {
        plan: Plan::from_commands(runs.iter().map(|r| Command::new("~", *r)).collect()),
    })
}

impl Rig {
    fn connect(&self, id: &str) -> mpsc::Receiver<ControllerMessage> {
        let (tx, rx) = mpsc::channel(64);
        let hello = AgentHello {
            id: id.into(),
            hostname: format!("{id}.local"),
            display_name: None,
            roles: Vec::new(),
            tags: Vec::new(),
            capabilities: BTreeMap::new(),
        };
        self.orch.registry.register(hello, tx);
        rx
    }

    async fn wait_for_status(&self, id: &TaskId, status: TaskStatus) -> Task {
        tokio::time::timeout(Duration::from_secs(30), async {
            loop {
                if let Some(task) = self.orch.store.get(id) {
                    if task.status == status {
                        return task;
                    }
                    assert!(
                        !(task.is_terminal() && task.status != status),
                        "task reached terminal {} while waiting for {status}",
                        task.status,
                    );
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("timed out waiting for task status")
    }

    fn audit_contents(&self) -> String {
        let mut contents = String::new();
        if let Ok(entries) = std::fs::read_dir(&self.audit_dir) {
            for entry in entries.flatten() {
                contents.push_str(&std::fs::read_to_string(entry.path()).unwrap_or_default());
            }
        }
        contents
    }
}

fn submit_body(request: &str) -> SubmitRequest {
    SubmitRequest {
        request: request.to_string(),
        target_agent_id: None,
        target_role: None,
        skip_approval: false,
    }
}

#[tokio::test(start_paused = true)]
async fn safe_read_bypasses_approval_and_completes() {
    let rig = rig();
    let mut agent_rx = rig.connect("pi-1");

    let submitted = rig.orch.submit(submit_body("check uptime")).await.unwrap();
    assert_eq!(submitted.status, TaskStatus::Ready, "low-risk read skips the gate");
    let plan = submitted.plan.clone().unwrap();
    assert!(!plan.requires_approval);
    assert_eq!(plan.risk_level, RiskLevel::Low);
    assert!(plan.commands[0].run.contains("uptime"));

    // Act as the agent.
    let task_id = submitted.id.clone();
    match agent_rx.recv().await {
        Some(ControllerMessage::CommandExecute { run, .. }) => assert!(run.contains("uptime")),
        other => panic!("expected command_execute, got {other:?}"),
    }
    rig.orch
        .dispatcher
        .deliver_output(&task_id, 0, OutputStream::Stdout, "10:02 up 3 days\n".to_string())
        .await;
    rig.orch.dispatcher.deliver_result(&task_id, 0, 0, None, 15).await;

    let done = rig.wait_for_status(&task_id, TaskStatus::Completed).await;
    assert_eq!(done.command_results.len(), 1);
    assert_eq!(done.command_results[0].exit_code, 0);
    assert_eq!(done.output, "[cmd 0] 10:02 up 3 days\n");
}

#[tokio::test(start_paused = true)]
async fn denied_plan_fails_without_touching_agents() {
    let rig = rig_with(scripted(&["rm -rf /"]));
    let mut agent_rx = rig.connect("pi-1");

    let task = rig.orch.submit(submit_body("clean everything up")).await.unwrap();
    assert_eq!(task.status, TaskStatus::Failed);

    let error = task.error.unwrap();
    assert!(error.contains("rm"), "{error}");
    assert!(!error.contains("rm -rf /"), "public error must not echo the command: {error}");

    assert!(agent_rx.try_recv().is_err(), "no command_execute may be emitted");
    let agent = rig.orch.registry.get(&"pi-1".into()).unwrap();
    assert_eq!(agent.status, drover_core::AgentStatus::Online);
    assert_eq!(rig.orch.registry.active_task_count(&"pi-1".into()), 0);

    // The full command is preserved for the audit trail only.
    let audit = rig.audit_contents();
    assert!(audit.contains("safety_denied"));
    assert!(audit.contains("rm -rf /"));
}

#[tokio::test(start_paused = true)]
async fn denied_plan_ignores_skip_approval() {
    let rig = rig_with(scripted(&["cat /etc/shadow"]));
    let mut body = submit_body("read the shadow file");
    body.skip_approval = true;
    let task = rig.orch.submit(body).await.unwrap();
    assert_eq!(task.status, TaskStatus::Failed);
}

#[tokio::test(start_paused = true)]
async fn approval_gate_holds_and_rejection_is_terminal() {
    let rig = rig_with(scripted(&["apt-get install foo"]));
    let mut agent_rx = rig.connect("pi-1");

    let task = rig.orch.submit(submit_body("install foo")).await.unwrap();
    assert_eq!(task.status, TaskStatus::AwaitingApproval);
    let plan = task.plan.clone().unwrap();
    assert!(plan.requires_approval);
    assert_eq!(plan.risk_level, RiskLevel::Medium);

    let rejected = rig
        .orch
        .approve(
            &task.id,
            ApproveRequest { approved: false, reason: Some("no".to_string()) },
            Some("ops"),
        )
        .unwrap();
    assert_eq!(rejected.status, TaskStatus::Rejected);
    let approval = rejected.approval.unwrap();
    assert!(!approval.approved);
    assert_eq!(approval.reason.as_deref(), Some("no"));
    assert_eq!(approval.actor.as_deref(), Some("ops"));

    assert!(agent_rx.try_recv().is_err(), "rejected tasks never dispatch");

    let audit = rig.audit_contents();
    assert!(audit.contains("plan_attached"));
    assert!(audit.contains("awaiting_approval"));
    assert!(audit.contains("task_rejected"));
}

#[tokio::test(start_paused = true)]
async fn approval_unblocks_dispatch() {
    let rig = rig_with(scripted(&["apt-get install htop"]));
    let mut agent_rx = rig.connect("pi-1");

    let task = rig.orch.submit(submit_body("install htop")).await.unwrap();
    assert_eq!(task.status, TaskStatus::AwaitingApproval);

    let approved = rig
        .orch
        .approve(&task.id, ApproveRequest { approved: true, reason: None }, Some("ops"))
        .unwrap();
    assert_eq!(approved.status, TaskStatus::Ready);

    match agent_rx.recv().await {
        Some(ControllerMessage::CommandExecute { run, .. }) => {
            assert_eq!(run, "apt-get install htop");
        }
        other => panic!("expected command_execute, got {other:?}"),
    }
    rig.orch.dispatcher.deliver_result(&task.id, 0, 0, None, 900).await;
    rig.wait_for_status(&task.id, TaskStatus::Completed).await;
}

#[tokio::test(start_paused = true)]
async fn repeat_approval_conflicts() {
    let rig = rig_with(scripted(&["apt-get install foo"]));
    let task = rig.orch.submit(submit_body("install foo")).await.unwrap();

    rig.orch
        .approve(&task.id, ApproveRequest { approved: true, reason: None }, None)
        .unwrap();
    // Same decision again: the task is no longer awaiting approval, so the
    // repeat is answered 409 rather than 200 (documented choice).
    let err = rig
        .orch
        .approve(&task.id, ApproveRequest { approved: true, reason: None }, None)
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::InvalidTransition(_)));
    assert_eq!(err.status_code(), axum::http::StatusCode::CONFLICT);
}

#[tokio::test(start_paused = true)]
async fn approve_in_wrong_state_conflicts() {
    let rig = rig_with(scripted(&["rm -rf /"]));
    let task = rig.orch.submit(submit_body("x")).await.unwrap();
    assert_eq!(task.status, TaskStatus::Failed);

    let err = rig
        .orch
        .approve(&task.id, ApproveRequest { approved: true, reason: None }, None)
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::InvalidTransition(_)));
}

#[tokio::test(start_paused = true)]
async fn cancel_on_terminal_task_is_a_noop() {
    let rig = rig_with(scripted(&["rm -rf /"]));
    let task = rig.orch.submit(submit_body("x")).await.unwrap();
    assert_eq!(task.status, TaskStatus::Failed);

    let cancelled = rig.orch.cancel(&task.id).unwrap();
    assert_eq!(cancelled.status, TaskStatus::Failed, "terminal state is kept");
    assert_eq!(cancelled.version, task.version, "no mutation on the no-op");
}

#[tokio::test(start_paused = true)]
async fn cancel_while_awaiting_approval() {
    let rig = rig_with(scripted(&["apt-get install foo"]));
    let task = rig.orch.submit(submit_body("install foo")).await.unwrap();
    assert_eq!(task.status, TaskStatus::AwaitingApproval);

    let cancelled = rig.orch.cancel(&task.id).unwrap();
    assert_eq!(cancelled.status, TaskStatus::Cancelled);
}

#[tokio::test(start_paused = true)]
async fn cancel_running_task_is_cooperative() {
    let rig = rig();
    let mut agent_rx = rig.connect("pi-1");
    let submitted = rig.orch.submit(submit_body("check uptime")).await.unwrap();
    let task_id = submitted.id.clone();

    match agent_rx.recv().await {
        Some(ControllerMessage::CommandExecute { .. }) => {}
        other => panic!("expected command_execute, got {other:?}"),
    }
    rig.orch.cancel(&task_id).unwrap();

    match agent_rx.recv().await {
        Some(ControllerMessage::CommandCancel { .. }) => {}
        other => panic!("expected command_cancel, got {other:?}"),
    }
    rig.wait_for_status(&task_id, TaskStatus::Cancelled).await;
}

#[tokio::test(start_paused = true)]
async fn empty_request_is_rejected_without_a_task() {
    let rig = rig();
    let err = rig.orch.submit(submit_body("   ")).await.unwrap_err();
    assert!(matches!(err, OrchestratorError::Validation(_)));
    assert!(rig.orch.store.is_empty(), "no task is created for invalid input");
}

#[tokio::test(start_paused = true)]
async fn planner_format_failure_fails_the_task() {
    let rig = rig_with(Arc::new(BrokenPlanner));
    let task = rig.orch.submit(submit_body("do something")).await.unwrap();
    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(task.error.as_deref(), Some("planner produced unparsable output"));
}

#[tokio::test(start_paused = true)]
async fn zero_timeout_in_a_plan_is_a_validation_failure() {
    let mut plan = Plan::from_commands(vec![Command::new("~", "uptime")]);
    plan.commands[0].timeout_seconds = 0;
    let rig = rig_with(Arc::new(ScriptedPlanner { plan }));

    let task = rig.orch.submit(submit_body("x")).await.unwrap();
    assert_eq!(task.status, TaskStatus::Failed);
    assert!(task.error.unwrap().contains("timeout_seconds"));
}

#[tokio::test(start_paused = true)]
async fn oversized_timeout_is_clamped_and_dispatched() {
    let mut plan = Plan::from_commands(vec![Command::new("~", "uptime")]);
    plan.commands[0].timeout_seconds = 99_999;
    let rig = rig_with(Arc::new(ScriptedPlanner { plan }));
    let mut agent_rx = rig.connect("pi-1");

    let task = rig.orch.submit(submit_body("x")).await.unwrap();
    assert_eq!(task.status, TaskStatus::Ready);
    match agent_rx.recv().await {
        Some(ControllerMessage::CommandExecute { timeout_seconds, .. }) => {
            assert_eq!(timeout_seconds, drover_core::command::MAX_TIMEOUT_SECONDS);
        }
        other => panic!("expected command_execute, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn skip_approval_bypasses_the_gate() {
    let rig = rig_with(scripted(&["apt-get install foo"]));
    let mut agent_rx = rig.connect("pi-1");

    let mut body = submit_body("install foo");
    body.skip_approval = true;
    let task = rig.orch.submit(body).await.unwrap();
    assert_eq!(task.status, TaskStatus::Ready);
    assert!(task.approval.is_none());

    match agent_rx.recv().await {
        Some(ControllerMessage::CommandExecute { .. }) => {}
        other => panic!("expected command_execute, got {other:?}"),
    }
    rig.orch.dispatcher.deliver_result(&task.id, 0, 0, None, 10).await;
    rig.wait_for_status(&task.id, TaskStatus::Completed).await;
}

#[tokio::test(start_paused = true)]
async fn request_level_targeting_overrides_the_plan() {
    let rig = rig();
    let _a = rig.connect("pi-a");
    let mut b_rx = rig.connect("pi-b");

    let mut body = submit_body("check uptime");
    body.target_agent_id = Some("pi-b".into());
    let task = rig.orch.submit(body).await.unwrap();

    match b_rx.recv().await {
        Some(ControllerMessage::CommandExecute { .. }) => {}
        other => panic!("expected command_execute on pi-b, got {other:?}"),
    }
    rig.orch.dispatcher.deliver_result(&task.id, 0, 0, None, 5).await;
    let done = rig.wait_for_status(&task.id, TaskStatus::Completed).await;
    assert_eq!(done.assigned_agent_id, Some("pi-b".into()));
}

#[tokio::test(start_paused = true)]
async fn submitting_twice_creates_two_tasks() {
    let rig = rig_with(scripted(&["apt-get install foo"]));
    let one = rig.orch.submit(submit_body("install foo")).await.unwrap();
    let two = rig.orch.submit(submit_body("install foo")).await.unwrap();
    assert_ne!(one.id, two.id, "no request deduplication is promised");
    assert_eq!(rig.orch.store.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn health_reports_agents_planner_and_audit() {
    let rig = rig();
    rig.connect("pi-1");
    rig.connect("pi-2");
    rig.orch.registry.disconnect(&"pi-2".into());

    let health = rig.orch.health();
    assert_eq!(health.status, "healthy");
    assert_eq!(health.agents.total, 2);
    assert_eq!(health.agents.online, 1);
    assert_eq!(health.agents.available, 1);
    assert_eq!(health.planner.provider, "stub");
    assert_eq!(health.audit.write_failures, 0);
}

#[tokio::test(start_paused = true)]
async fn reaper_marks_silent_agents_offline() {
    let rig = rig();
    rig.connect("pi-1");
    rig.clock.advance(Duration::from_secs(61));

    rig.orch.reap_agents().await;

    let agent = rig.orch.registry.get(&"pi-1".into()).unwrap();
    assert_eq!(agent.status, drover_core::AgentStatus::Offline);
}

#[tokio::test(start_paused = true)]
async fn retention_sweep_prunes_old_terminal_tasks() {
    let rig = rig_with(scripted(&["rm -rf /"]));
    let task = rig.orch.submit(submit_body("x")).await.unwrap();
    assert!(task.is_terminal());

    assert_eq!(rig.orch.sweep_tasks(), 0, "fresh terminal tasks are kept");
    rig.clock.advance(Duration::from_secs(169 * 3600));
    assert_eq!(rig.orch.sweep_tasks(), 1);
    assert!(rig.orch.store.is_empty());
}

#[tokio::test(start_paused = true)]
async fn unknown_task_lookups_are_not_found() {
    let rig = rig();
    let missing = TaskId::new("tsk-missing");
    assert!(matches!(
        rig.orch.get_task(&missing),
        Err(OrchestratorError::TaskNotFound(_))
    ));
    assert!(matches!(rig.orch.cancel(&missing), Err(OrchestratorError::TaskNotFound(_))));
}
