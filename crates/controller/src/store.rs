// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task store: single source of truth for all tasks.
//!
//! A coarse read-write lock guards the index; each task sits behind its own
//! mutex so mutations are serialized per task and the state machine never
//! observes an illegal concurrent transition. Every mutation bumps
//! `version`, stamps `updated_at_ms`, appends an audit record, and
//! broadcasts `task_updated` — except output appends, which broadcast
//! `task_output` instead (the `task_updated` after the command's result
//! covers the accumulated output).

use crate::audit::AuditLog;
use crate::bus::EventBus;
use crate::error::OrchestratorError;
use drover_core::{Clock, Event, OutputStream, Task, TaskId, TaskStatus};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Retention sweep batch bound, so the sweep never starves mutators.
pub const SWEEP_BATCH: usize = 256;

pub struct TaskStore<C: Clock> {
    clock: C,
    bus: Arc<EventBus>,
    audit: Arc<AuditLog>,
    index: RwLock<HashMap<TaskId, Arc<Mutex<Task>>>>,
}

impl<C: Clock> TaskStore<C> {
    pub fn new(clock: C, bus: Arc<EventBus>, audit: Arc<AuditLog>) -> Self {
        TaskStore { clock, bus, audit, index: RwLock::new(HashMap::new()) }
    }

    /// Create a task in `pending` and broadcast it.
    pub fn create(&self, request: impl Into<String>) -> Task {
        let task = Task::new(request, self.clock.epoch_ms());
        let snapshot = task.clone();
        self.index
            .write()
            .insert(task.id.clone(), Arc::new(Mutex::new(task)));
        self.audit.record(
            snapshot.id.as_str(),
            "task_created",
            snapshot.version,
            None,
            serde_json::json!({"request": snapshot.request}),
        );
        self.bus.publish(Event::TaskUpdated { task: Box::new(snapshot.clone()) });
        snapshot
    }

    pub fn get(&self, id: &TaskId) -> Option<Task> {
        let arc = self.index.read().get(id).cloned()?;
        let task = arc.lock();
        Some(task.clone())
    }

    /// List tasks newest first with an optional status filter.
    pub fn list(&self, status: Option<TaskStatus>, limit: usize) -> Vec<Task> {
        let arcs: Vec<Arc<Mutex<Task>>> = self.index.read().values().cloned().collect();
        let mut tasks: Vec<Task> = arcs
            .iter()
            .map(|arc| arc.lock().clone())
            .filter(|t| status.is_none_or(|s| t.status == s))
            .collect();
        tasks.sort_by(|a, b| {
            b.created_at_ms
                .cmp(&a.created_at_ms)
                .then_with(|| b.id.cmp(&a.id))
        });
        tasks.truncate(limit);
        tasks
    }

    /// Apply a mutation under the task's lock.
    ///
    /// On success the task's version is bumped, the mutation is stamped and
    /// audited as `event`, and the updated task is broadcast. On error the
    /// task is left untouched.
    pub fn update<T>(
        &self,
        id: &TaskId,
        event: &str,
        actor: Option<&str>,
        details: serde_json::Value,
        f: impl FnOnce(&mut Task) -> Result<T, OrchestratorError>,
    ) -> Result<(T, Task), OrchestratorError> {
        let arc = self
            .index
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| OrchestratorError::TaskNotFound(id.to_string()))?;

        let mut task = arc.lock();
        let value = f(&mut task)?;
        task.version += 1;
        task.updated_at_ms = self.clock.epoch_ms();
        let snapshot = task.clone();
        drop(task);

        self.audit
            .record(snapshot.id.as_str(), event, snapshot.version, actor, details);
        self.bus.publish(Event::TaskUpdated { task: Box::new(snapshot.clone()) });
        Ok((value, snapshot))
    }

    /// Status transition with standard audit shape.
    pub fn transition(
        &self,
        id: &TaskId,
        next: TaskStatus,
        event: &str,
        actor: Option<&str>,
    ) -> Result<Task, OrchestratorError> {
        let (_, task) = self.update(
            id,
            event,
            actor,
            serde_json::json!({"status": next.to_string()}),
            |task| task.transition(next).map_err(OrchestratorError::from),
        )?;
        Ok(task)
    }

    /// Append a streamed output chunk.
    ///
    /// Bumps the version (it is a mutation) but broadcasts `task_output`
    /// rather than the whole task.
    pub fn append_output(
        &self,
        id: &TaskId,
        command_index: usize,
        stream: OutputStream,
        content: &str,
    ) {
        let Some(arc) = self.index.read().get(id).cloned() else {
            return;
        };
        {
            let mut task = arc.lock();
            task.append_output(command_index, content);
            task.version += 1;
            task.updated_at_ms = self.clock.epoch_ms();
        }
        self.bus.publish(Event::TaskOutput {
            task_id: id.clone(),
            command_index,
            stream,
            content: content.to_string(),
        });
    }

    /// Prune terminal tasks older than `retention` past their last update.
    ///
    /// Bounded batch per tick; runs under the coarse index lock only while
    /// removing.
    pub fn sweep(&self, retention: Duration, max_batch: usize) -> usize {
        let now = self.clock.epoch_ms();
        let cutoff_ms = retention.as_millis() as u64;
        let expired: Vec<TaskId> = {
            let index = self.index.read();
            index
                .values()
                .filter_map(|arc| {
                    let task = arc.lock();
                    (task.is_terminal() && now.saturating_sub(task.updated_at_ms) >= cutoff_ms)
                        .then(|| task.id.clone())
                })
                .take(max_batch)
                .collect()
        };
        if expired.is_empty() {
            return 0;
        }
        let mut index = self.index.write();
        let mut pruned = 0;
        for id in expired {
            if index.remove(&id).is_some() {
                tracing::debug!(task_id = %id, "retention sweep pruned task");
                pruned += 1;
            }
        }
        pruned
    }

    pub fn len(&self) -> usize {
        self.index.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.read().is_empty()
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
