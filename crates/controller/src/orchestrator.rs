// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Orchestrator façade: request intake through planning, safety validation,
//! the approval gate, and dispatch. No policy of its own beyond the glue.

use crate::audit::AuditLog;
use crate::bus::EventBus;
use crate::dispatch::{DispatchConfig, Dispatcher};
use crate::env;
use crate::error::OrchestratorError;
use crate::registry::{AgentCounts, AgentRegistry};
use crate::store::{TaskStore, SWEEP_BATCH};
use drover_core::{AgentId, ApprovalRecord, Clock, RiskLevel, Task, TaskId, TaskStatus};
use drover_planner::{Planner, PlannerError};
use drover_safety::{SafetyValidator, Verdict};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Controller-wide configuration, read once from the environment.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub port: u16,
    pub heartbeat_timeout: Duration,
    pub task_retention: Duration,
    pub network_slack: Duration,
    pub cancel_grace: Duration,
    pub audit_dir: PathBuf,
}

impl ControllerConfig {
    pub fn from_env() -> Self {
        ControllerConfig {
            port: env::port(),
            heartbeat_timeout: env::heartbeat_timeout(),
            task_retention: env::task_retention(),
            network_slack: env::network_slack(),
            cancel_grace: env::cancel_grace(),
            audit_dir: env::audit_log_dir(),
        }
    }
}

/// `POST /api/tasks` body.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitRequest {
    pub request: String,
    #[serde(default)]
    pub target_agent_id: Option<AgentId>,
    #[serde(default)]
    pub target_role: Option<String>,
    #[serde(default)]
    pub skip_approval: bool,
}

/// `POST /api/tasks/{id}/approve` body.
#[derive(Debug, Clone, Deserialize)]
pub struct ApproveRequest {
    pub approved: bool,
    #[serde(default)]
    pub reason: Option<String>,
}

/// `/health` payload.
#[derive(Debug, serde::Serialize)]
pub struct Health {
    pub status: &'static str,
    pub agents: AgentCounts,
    pub planner: PlannerHealth,
    pub audit: AuditHealth,
}

#[derive(Debug, serde::Serialize)]
pub struct PlannerHealth {
    pub provider: &'static str,
}

#[derive(Debug, serde::Serialize)]
pub struct AuditHealth {
    pub write_failures: u64,
}

pub struct Orchestrator<C: Clock> {
    pub clock: C,
    pub bus: Arc<EventBus>,
    pub registry: Arc<AgentRegistry<C>>,
    pub store: Arc<TaskStore<C>>,
    pub dispatcher: Arc<Dispatcher<C>>,
    pub audit: Arc<AuditLog>,
    pub config: ControllerConfig,
    planner: Arc<dyn Planner>,
    validator: SafetyValidator,
}

impl<C: Clock> Orchestrator<C> {
    pub fn new(clock: C, planner: Arc<dyn Planner>, config: ControllerConfig) -> Arc<Self> {
        let bus = Arc::new(EventBus::new());
        let audit = Arc::new(AuditLog::new(config.audit_dir.clone()));
        let registry = Arc::new(AgentRegistry::new(
            clock.clone(),
            Arc::clone(&bus),
            config.heartbeat_timeout,
        ));
        let store = Arc::new(TaskStore::new(
            clock.clone(),
            Arc::clone(&bus),
            Arc::clone(&audit),
        ));
        let dispatcher = Arc::new(Dispatcher::new(
            clock.clone(),
            Arc::clone(&registry),
            Arc::clone(&store),
            Arc::clone(&bus),
            DispatchConfig {
                network_slack: config.network_slack,
                cancel_grace: config.cancel_grace,
            },
        ));
        Arc::new(Orchestrator {
            clock,
            bus,
            registry,
            store,
            dispatcher,
            audit,
            config,
            planner,
            validator: SafetyValidator::new(),
        })
    }

    /// Create a task from a request and take it through planning and the
    /// safety gate. Returns the task in `awaiting_approval`, `ready`
    /// (dispatch spawned), or `failed`.
    pub async fn submit(self: &Arc<Self>, body: SubmitRequest) -> Result<Task, OrchestratorError> {
        let request = body.request.trim().to_string();
        if request.is_empty() {
            return Err(OrchestratorError::Validation("request must not be empty".to_string()));
        }

        let task = self.store.create(request.clone());
        let task_id = task.id.clone();
        self.store.transition(&task_id, TaskStatus::Planning, "task_planning", None)?;

        let inventory = self.registry.snapshot();
        let mut plan = match self.planner.plan(&request, &inventory).await {
            Ok(plan) => plan,
            Err(e) => {
                let error = match &e {
                    PlannerError::Format(_) => "planner produced unparsable output".to_string(),
                    PlannerError::Completion(_) => "planner unavailable".to_string(),
                };
                tracing::error!(%task_id, error = %e, "planning failed");
                let (_, task) = self.store.update(
                    &task_id,
                    "task_failed",
                    None,
                    serde_json::json!({"error": e.to_string()}),
                    |t| {
                        t.error = Some(error.clone());
                        t.transition(TaskStatus::Failed).map_err(Into::into)
                    },
                )?;
                return Ok(task);
            }
        };

        // Request-level targeting overrides whatever the planner chose.
        if body.target_agent_id.is_some() {
            plan.target_agent_id = body.target_agent_id.clone();
        }
        if body.target_role.is_some() {
            plan.target_role = body.target_role.clone();
        }
        plan.normalize();
        if let Err(e) = plan.validate() {
            let (_, task) = self.store.update(
                &task_id,
                "task_failed",
                None,
                serde_json::json!({"error": e.to_string()}),
                |t| {
                    t.error = Some(e.to_string());
                    t.transition(TaskStatus::Failed).map_err(Into::into)
                },
            )?;
            return Ok(task);
        }

        let plan_verdict = self.validator.evaluate_plan(&plan);
        if plan_verdict.verdict == Verdict::Deny {
            // Redaction: the public error names only the rule head; the
            // matched command stays in the audit log.
            let (rule, index) = plan_verdict
                .denied
                .as_ref()
                .map(|d| (d.rule, d.command_index))
                .unwrap_or(("denied", 0));
            let error = format!("plan rejected by safety validator: {rule}");
            let (_, task) = self.store.update(
                &task_id,
                "safety_denied",
                None,
                serde_json::json!({
                    "rule": rule,
                    "command_index": index,
                    "command": plan.commands.get(index).map(|c| c.run.clone()),
                }),
                |t| {
                    t.plan = Some(plan.clone());
                    t.error = Some(error.clone());
                    t.transition(TaskStatus::Failed).map_err(Into::into)
                },
            )?;
            return Ok(task);
        }

        plan.raise_risk(plan_verdict.risk_level);
        plan.requires_approval = plan.requires_approval
            || plan_verdict.verdict == Verdict::RequiresApproval
            || plan.risk_level >= RiskLevel::Medium;

        let needs_gate = plan.requires_approval && !body.skip_approval;
        self.store.update(
            &task_id,
            "plan_attached",
            None,
            serde_json::json!({
                "commands": plan.commands.len(),
                "risk_level": plan.risk_level.to_string(),
                "requires_approval": plan.requires_approval,
                "verdict": plan_verdict.verdict.to_string(),
            }),
            |t| {
                t.plan = Some(plan.clone());
                Ok(())
            },
        )?;

        let task = if needs_gate {
            self.store.transition(&task_id, TaskStatus::AwaitingApproval, "awaiting_approval", None)?
        } else {
            let task =
                self.store.transition(&task_id, TaskStatus::Ready, "task_ready", None)?;
            self.spawn_dispatch(&task_id);
            task
        };
        Ok(task)
    }

    /// Resolve an approval gate. Valid only in `awaiting_approval`; a repeat
    /// decision answers 409 via `InvalidTransition`.
    pub fn approve(
        self: &Arc<Self>,
        task_id: &TaskId,
        body: ApproveRequest,
        actor: Option<&str>,
    ) -> Result<Task, OrchestratorError> {
        let next = if body.approved { TaskStatus::Ready } else { TaskStatus::Rejected };
        let decided_at_ms = self.clock.epoch_ms();
        let (_, task) = self.store.update(
            task_id,
            if body.approved { "task_approved" } else { "task_rejected" },
            actor,
            serde_json::json!({"approved": body.approved, "reason": body.reason}),
            |t| {
                t.transition(next)?;
                t.approval = Some(ApprovalRecord {
                    approved: body.approved,
                    actor: actor.map(String::from),
                    reason: body.reason.clone(),
                    decided_at_ms,
                });
                Ok(())
            },
        )?;
        if body.approved {
            self.spawn_dispatch(task_id);
        }
        Ok(task)
    }

    /// Cancel a task. A no-op on terminal tasks (returns the task as-is);
    /// cooperative when running.
    pub fn cancel(self: &Arc<Self>, task_id: &TaskId) -> Result<Task, OrchestratorError> {
        let task = self
            .store
            .get(task_id)
            .ok_or_else(|| OrchestratorError::TaskNotFound(task_id.to_string()))?;
        if task.is_terminal() {
            return Ok(task);
        }
        if task.status == TaskStatus::Running {
            // The dispatch loop records the cancel result and transitions.
            self.dispatcher.cancel_running(task_id);
            return Ok(task);
        }
        self.store.transition(task_id, TaskStatus::Cancelled, "task_cancelled", None)
    }

    pub fn get_task(&self, task_id: &TaskId) -> Result<Task, OrchestratorError> {
        self.store
            .get(task_id)
            .ok_or_else(|| OrchestratorError::TaskNotFound(task_id.to_string()))
    }

    pub fn remove_agent(&self, agent_id: &AgentId) -> Result<(), OrchestratorError> {
        if self.registry.remove(agent_id) {
            Ok(())
        } else {
            Err(OrchestratorError::AgentNotFound(agent_id.to_string()))
        }
    }

    pub fn health(&self) -> Health {
        Health {
            status: "healthy",
            agents: self.registry.counts(),
            planner: PlannerHealth { provider: self.planner.provider_name() },
            audit: AuditHealth { write_failures: self.audit.write_failures() },
        }
    }

    /// Reap stale agents and fail their in-flight commands.
    pub async fn reap_agents(&self) {
        for agent_id in self.registry.reap() {
            self.dispatcher.fail_agent_routes(&agent_id).await;
        }
    }

    /// One retention sweep tick.
    pub fn sweep_tasks(&self) -> usize {
        self.store.sweep(self.config.task_retention, SWEEP_BATCH)
    }

    fn spawn_dispatch(self: &Arc<Self>, task_id: &TaskId) {
        let orchestrator = Arc::clone(self);
        let task_id = task_id.clone();
        tokio::spawn(async move {
            orchestrator.dispatcher.run_task(&task_id).await;
        });
    }
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;
