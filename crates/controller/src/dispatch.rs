// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scheduler / dispatcher: runs a ready task's plan on its agent.
//!
//! Commands execute strictly sequentially per task. Distinct tasks
//! interleave on one agent only when it advertises `concurrent=true`;
//! otherwise a per-agent async mutex forms the FIFO. Replies from the agent
//! link are routed per (task, command) so each command sees its own chunks
//! in emission order followed by at most one result.
//!
//! Only agent-reported results are appended to a task's `command_results`.
//! Forced failures (timeout, disconnect, cancel without a reply) carry their
//! synthetic exit code in the task error and audit details instead.

use crate::bus::EventBus;
use crate::registry::AgentRegistry;
use crate::store::TaskStore;
use drover_core::{
    Agent, AgentId, Clock, Command, CommandResult, ControllerMessage, Event, OutputStream, Plan,
    Task, TaskId, TaskStatus, EXIT_CANCELLED, EXIT_DISCONNECTED, EXIT_TIMED_OUT,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Dispatcher timing knobs.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Wall-clock allowance added to each command's own timeout.
    pub network_slack: Duration,
    /// How long a cancel waits for the agent's own result.
    pub cancel_grace: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        DispatchConfig {
            network_slack: Duration::from_secs(10),
            cancel_grace: Duration::from_secs(5),
        }
    }
}

/// A reply from the agent link, routed to the command awaiting it.
#[derive(Debug)]
pub enum AgentReply {
    Output { stream: OutputStream, content: String },
    Result { exit_code: i32, stderr: Option<String>, duration_ms: u64 },
    Disconnected,
}

struct RouteEntry {
    agent_id: AgentId,
    tx: mpsc::Sender<AgentReply>,
}

/// Per-(task, command) reply routing table.
#[derive(Default)]
struct ReplyRoutes {
    inner: Mutex<HashMap<(TaskId, usize), RouteEntry>>,
}

impl ReplyRoutes {
    fn register(
        &self,
        task_id: TaskId,
        index: usize,
        agent_id: AgentId,
        tx: mpsc::Sender<AgentReply>,
    ) {
        self.inner.lock().insert((task_id, index), RouteEntry { agent_id, tx });
    }

    fn remove(&self, task_id: &TaskId, index: usize) {
        self.inner.lock().remove(&(task_id.clone(), index));
    }

    fn sender(&self, task_id: &TaskId, index: usize) -> Option<mpsc::Sender<AgentReply>> {
        self.inner
            .lock()
            .get(&(task_id.clone(), index))
            .map(|entry| entry.tx.clone())
    }

    fn senders_for_agent(&self, agent_id: &AgentId) -> Vec<mpsc::Sender<AgentReply>> {
        self.inner
            .lock()
            .values()
            .filter(|entry| entry.agent_id == *agent_id)
            .map(|entry| entry.tx.clone())
            .collect()
    }
}

/// How one command finished, from the dispatch loop's point of view.
enum CommandOutcome {
    /// Advance to the next command.
    Advance,
    /// Stop the task with this error and the synthetic or real exit code.
    Failed { error: String, exit_code: i32 },
    /// Stop the task as cancelled.
    Cancelled,
}

pub struct Dispatcher<C: Clock> {
    clock: C,
    registry: Arc<AgentRegistry<C>>,
    store: Arc<TaskStore<C>>,
    bus: Arc<EventBus>,
    config: DispatchConfig,
    routes: ReplyRoutes,
    /// Per-agent FIFO for agents without `concurrent=true`.
    agent_locks: Mutex<HashMap<AgentId, Arc<tokio::sync::Mutex<()>>>>,
    /// Cancel signals for running tasks.
    cancels: Mutex<HashMap<TaskId, CancellationToken>>,
}

impl<C: Clock> Dispatcher<C> {
    pub fn new(
        clock: C,
        registry: Arc<AgentRegistry<C>>,
        store: Arc<TaskStore<C>>,
        bus: Arc<EventBus>,
        config: DispatchConfig,
    ) -> Self {
        Dispatcher {
            clock,
            registry,
            store,
            bus,
            config,
            routes: ReplyRoutes::default(),
            agent_locks: Mutex::new(HashMap::new()),
            cancels: Mutex::new(HashMap::new()),
        }
    }

    /// Route a streamed output chunk from the agent link.
    pub async fn deliver_output(
        &self,
        task_id: &TaskId,
        command_index: usize,
        stream: OutputStream,
        content: String,
    ) {
        if let Some(tx) = self.routes.sender(task_id, command_index) {
            let _ = tx.send(AgentReply::Output { stream, content }).await;
        } else {
            tracing::debug!(%task_id, command_index, "dropping output for inactive command");
        }
    }

    /// Route a command result from the agent link.
    pub async fn deliver_result(
        &self,
        task_id: &TaskId,
        command_index: usize,
        exit_code: i32,
        stderr: Option<String>,
        duration_ms: u64,
    ) {
        if let Some(tx) = self.routes.sender(task_id, command_index) {
            let _ = tx
                .send(AgentReply::Result { exit_code, stderr, duration_ms })
                .await;
        } else {
            tracing::debug!(%task_id, command_index, "dropping result for inactive command");
        }
    }

    /// Mark the agent offline and fail its in-flight commands.
    pub async fn agent_disconnected(&self, agent_id: &AgentId) {
        self.registry.disconnect(agent_id);
        self.fail_agent_routes(agent_id).await;
    }

    /// Fail in-flight commands for an agent that is already offline
    /// (reaper path).
    pub async fn fail_agent_routes(&self, agent_id: &AgentId) {
        for tx in self.routes.senders_for_agent(agent_id) {
            let _ = tx.send(AgentReply::Disconnected).await;
        }
    }

    /// Signal a running task's dispatch loop to cancel. Returns false when
    /// the task has no dispatch in flight.
    pub fn cancel_running(&self, task_id: &TaskId) -> bool {
        match self.cancels.lock().get(task_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    fn agent_lock(&self, agent_id: &AgentId) -> Arc<tokio::sync::Mutex<()>> {
        Arc::clone(
            self.agent_locks
                .lock()
                .entry(agent_id.clone())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))),
        )
    }

    /// Run a ready task to its terminal state.
    ///
    /// All failures are recorded on the task; this never returns an error.
    pub async fn run_task(&self, task_id: &TaskId) {
        let Some(task) = self.store.get(task_id) else {
            return;
        };
        if task.status != TaskStatus::Ready {
            tracing::debug!(%task_id, status = %task.status, "skipping dispatch of non-ready task");
            return;
        }
        let Some(plan) = task.plan.clone() else {
            self.fail_task(task_id, "task has no plan at dispatch", None);
            return;
        };

        // Agent selection: explicit id first, then role pool, then any.
        let Some(agent) =
            self.registry.select(plan.target_agent_id.as_ref(), plan.target_role.as_deref())
        else {
            self.fail_task(task_id, "no suitable agent available", None);
            return;
        };

        let assign = self.store.update(
            task_id,
            "agent_assigned",
            None,
            serde_json::json!({"agent_id": agent.id.as_str()}),
            |t| {
                t.assigned_agent_id = Some(agent.id.clone());
                Ok(())
            },
        );
        if assign.is_err() {
            return;
        }

        // Empty plan: nothing to dispatch.
        if plan.commands.is_empty() {
            let _ = self.store.transition(task_id, TaskStatus::Completed, "task_completed", None);
            return;
        }

        // Per-agent FIFO unless the agent takes concurrent tasks.
        let serialized = (!agent.supports_concurrent()).then(|| self.agent_lock(&agent.id));
        let _guard = match &serialized {
            Some(lock) => Some(lock.lock().await),
            None => None,
        };

        // The task may have been cancelled while queued behind the lock.
        match self.store.get(task_id) {
            Some(t) if t.status == TaskStatus::Ready => {}
            _ => return,
        }

        let token = CancellationToken::new();
        self.cancels.lock().insert(task_id.clone(), token.clone());
        self.registry.incr_active(&agent.id);

        let outcome = match self.store.transition(task_id, TaskStatus::Running, "task_started", None)
        {
            Ok(_) => self.run_commands(task_id, &agent, &plan, &token).await,
            Err(_) => CommandOutcome::Cancelled,
        };

        match outcome {
            CommandOutcome::Advance => {
                let _ =
                    self.store.transition(task_id, TaskStatus::Completed, "task_completed", None);
            }
            CommandOutcome::Failed { error, exit_code } => {
                self.fail_task(task_id, &error, Some(exit_code));
            }
            CommandOutcome::Cancelled => {
                let _ =
                    self.store.transition(task_id, TaskStatus::Cancelled, "task_cancelled", None);
            }
        }

        self.registry.decr_active(&agent.id);
        self.cancels.lock().remove(task_id);
    }

    fn fail_task(&self, task_id: &TaskId, error: &str, exit_code: Option<i32>) {
        tracing::warn!(%task_id, error, "task failed");
        let _ = self.store.update(
            task_id,
            "task_failed",
            None,
            serde_json::json!({"error": error, "exit_code": exit_code}),
            |t| {
                t.error = Some(error.to_string());
                t.transition(TaskStatus::Failed).map_err(Into::into)
            },
        );
    }

    async fn run_commands(
        &self,
        task_id: &TaskId,
        agent: &Agent,
        plan: &Plan,
        token: &CancellationToken,
    ) -> CommandOutcome {
        for (index, command) in plan.commands.iter().enumerate() {
            let outcome = self.run_one_command(task_id, agent, index, command, token).await;
            self.routes.remove(task_id, index);
            match outcome {
                CommandOutcome::Advance => continue,
                stop => return stop,
            }
        }
        CommandOutcome::Advance
    }

    async fn run_one_command(
        &self,
        task_id: &TaskId,
        agent: &Agent,
        index: usize,
        command: &Command,
        token: &CancellationToken,
    ) -> CommandOutcome {
        let (tx, mut rx) = mpsc::channel(1024);
        self.routes.register(task_id.clone(), index, agent.id.clone(), tx);

        let execute = ControllerMessage::CommandExecute {
            task_id: task_id.clone(),
            command_index: index,
            dir: command.dir.clone(),
            run: command.run.clone(),
            timeout_seconds: command.timeout_seconds,
            env: command.env.clone(),
        };
        let sent = match self.registry.sender(&agent.id) {
            Some(sender) => sender.send(execute).await.is_ok(),
            None => false,
        };
        if !sent {
            return CommandOutcome::Failed {
                error: format!("agent disconnected during command {index}"),
                exit_code: EXIT_DISCONNECTED,
            };
        }

        let deadline = tokio::time::Instant::now()
            + Duration::from_secs(command.timeout_seconds)
            + self.config.network_slack;
        let mut stdout_buf = String::new();
        let mut stderr_buf = String::new();

        loop {
            tokio::select! {
                reply = rx.recv() => match reply {
                    Some(AgentReply::Output { stream, content }) => {
                        match stream {
                            OutputStream::Stdout => stdout_buf.push_str(&content),
                            OutputStream::Stderr => stderr_buf.push_str(&content),
                        }
                        self.store.append_output(task_id, index, stream, &content);
                    }
                    Some(AgentReply::Result { exit_code, stderr, duration_ms }) => {
                        if stderr_buf.is_empty() {
                            if let Some(s) = stderr {
                                stderr_buf = s;
                            }
                        }
                        self.record_result(
                            task_id,
                            index,
                            exit_code,
                            std::mem::take(&mut stdout_buf),
                            std::mem::take(&mut stderr_buf),
                            duration_ms,
                        );
                        if exit_code != 0 && !command.continue_on_error {
                            return CommandOutcome::Failed {
                                error: format!(
                                    "command {index} ({}) exited with {exit_code}",
                                    command.summary(),
                                ),
                                exit_code,
                            };
                        }
                        return CommandOutcome::Advance;
                    }
                    Some(AgentReply::Disconnected) | None => {
                        return CommandOutcome::Failed {
                            error: format!("agent disconnected during command {index}"),
                            exit_code: EXIT_DISCONNECTED,
                        };
                    }
                },

                _ = token.cancelled() => {
                    self.send_cancel(agent, task_id, index).await;
                    // Give the agent a grace period to report its own result;
                    // otherwise the command is closed with the cancel code.
                    let reported = tokio::time::timeout(
                        self.config.cancel_grace,
                        wait_for_result(&mut rx),
                    )
                    .await
                    .ok()
                    .flatten();
                    if let Some((exit_code, stderr, duration_ms)) = reported {
                        if stderr_buf.is_empty() {
                            if let Some(s) = stderr {
                                stderr_buf = s;
                            }
                        }
                        self.record_result(
                            task_id,
                            index,
                            exit_code,
                            std::mem::take(&mut stdout_buf),
                            std::mem::take(&mut stderr_buf),
                            duration_ms,
                        );
                    } else {
                        tracing::debug!(
                            %task_id, command_index = index, exit_code = EXIT_CANCELLED,
                            "no result within cancel grace, closing command"
                        );
                    }
                    return CommandOutcome::Cancelled;
                },

                _ = tokio::time::sleep_until(deadline) => {
                    self.send_cancel(agent, task_id, index).await;
                    return CommandOutcome::Failed {
                        error: format!(
                            "command {index} timed out after {}s",
                            command.timeout_seconds,
                        ),
                        exit_code: EXIT_TIMED_OUT,
                    };
                },
            }
        }
    }

    async fn send_cancel(&self, agent: &Agent, task_id: &TaskId, index: usize) {
        if let Some(sender) = self.registry.sender(&agent.id) {
            let cancel = ControllerMessage::CommandCancel {
                task_id: task_id.clone(),
                command_index: index,
            };
            let _ = sender.send(cancel).await;
        }
    }

    /// Persist a command result: store it on the task, broadcast the
    /// `command_result` event, then the versioned `task_updated`.
    fn record_result(
        &self,
        task_id: &TaskId,
        index: usize,
        exit_code: i32,
        stdout: String,
        stderr: String,
        duration_ms: u64,
    ) {
        let result = CommandResult {
            command_index: index,
            exit_code,
            stdout,
            stderr,
            duration_ms,
            completed_at_ms: self.clock.epoch_ms(),
        };
        self.bus.publish(Event::CommandResult {
            task_id: task_id.clone(),
            result: result.clone(),
        });
        let _ = self.store.update(
            task_id,
            "command_result",
            None,
            serde_json::json!({"command_index": index, "exit_code": exit_code, "duration_ms": duration_ms}),
            |t: &mut Task| {
                t.record_result(result.clone());
                Ok(())
            },
        );
    }
}

/// Drain replies until a result arrives (used inside the cancel grace
/// window). Output chunks seen here are discarded; the command is already
/// being torn down.
async fn wait_for_result(
    rx: &mut mpsc::Receiver<AgentReply>,
) -> Option<(i32, Option<String>, u64)> {
    while let Some(reply) = rx.recv().await {
        if let AgentReply::Result { exit_code, stderr, duration_ms } = reply {
            return Some((exit_code, stderr, duration_ms));
        }
    }
    None
}

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;
