// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent registry: the authoritative `agent_id -> Agent` mapping.
//!
//! A single read-write lock guards the map: many readers for dashboards and
//! selection snapshots, exclusive writers on (dis)connect. `register`,
//! `heartbeat`, `disconnect`, and `select` are linearizable relative to each
//! other. Agents survive reconnection; a newer connection always wins and
//! the stale outbound channel is closed by dropping its sender.

use crate::bus::EventBus;
use drover_core::{Agent, AgentHello, AgentId, AgentStatus, Clock, ControllerMessage, Event, Telemetry};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// Broadcast `agent_updated` on every Nth heartbeat even without a
/// meaningful telemetry delta.
const HEARTBEAT_BROADCAST_EVERY: u64 = 10;

struct AgentEntry {
    agent: Agent,
    outbound: Option<mpsc::Sender<ControllerMessage>>,
    /// Monotonic connection counter; a stale link's disconnect must not
    /// clobber its successor.
    conn: u64,
    active_tasks: u32,
    heartbeat_at: Instant,
    beats: u64,
}

impl AgentEntry {
    fn occupancy_status(&self) -> AgentStatus {
        if self.active_tasks > 0 {
            AgentStatus::Busy
        } else {
            AgentStatus::Online
        }
    }
}

/// Health-endpoint agent counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct AgentCounts {
    pub total: usize,
    pub online: usize,
    pub available: usize,
}

pub struct AgentRegistry<C: Clock> {
    clock: C,
    bus: Arc<EventBus>,
    heartbeat_timeout: Duration,
    inner: RwLock<HashMap<AgentId, AgentEntry>>,
    next_conn: std::sync::atomic::AtomicU64,
}

impl<C: Clock> AgentRegistry<C> {
    pub fn new(clock: C, bus: Arc<EventBus>, heartbeat_timeout: Duration) -> Self {
        AgentRegistry {
            clock,
            bus,
            heartbeat_timeout,
            inner: RwLock::new(HashMap::new()),
            next_conn: std::sync::atomic::AtomicU64::new(1),
        }
    }

    /// Idempotent create-or-update on `agent_hello`.
    ///
    /// Returns the registered agent and a connection token; the token is
    /// required to make a later [`disconnect_conn`] a no-op if a newer
    /// connection has taken over in the meantime.
    pub fn register(
        &self,
        hello: AgentHello,
        outbound: mpsc::Sender<ControllerMessage>,
    ) -> (Agent, u64) {
        let conn = self.next_conn.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        let epoch_ms = self.clock.epoch_ms();
        let now = self.clock.now();
        let mut inner = self.inner.write();

        let entry = inner.entry(hello.id.clone()).or_insert_with(|| AgentEntry {
            agent: Agent::from_hello(hello.clone(), epoch_ms),
            outbound: None,
            conn: 0,
            active_tasks: 0,
            heartbeat_at: now,
            beats: 0,
        });
        entry.agent.apply_hello(hello, epoch_ms);
        entry.agent.status = entry.occupancy_status();
        // Newer connection wins: dropping the previous sender closes the
        // stale writer.
        entry.outbound = Some(outbound);
        entry.conn = conn;
        entry.heartbeat_at = now;

        let agent = entry.agent.clone();
        drop(inner);
        self.bus.publish(Event::AgentConnected { agent: agent.clone() });
        (agent, conn)
    }

    /// Refresh liveness and telemetry. Returns false for unknown agents.
    pub fn heartbeat(&self, id: &AgentId, telemetry: Telemetry) -> bool {
        let epoch_ms = self.clock.epoch_ms();
        let now = self.clock.now();
        let mut inner = self.inner.write();
        let Some(entry) = inner.get_mut(id) else {
            return false;
        };

        let was_offline = entry.agent.status == AgentStatus::Offline;
        let meaningful = telemetry.meaningful_delta(&entry.agent.telemetry);
        entry.agent.telemetry = telemetry;
        entry.agent.last_heartbeat_ms = epoch_ms;
        entry.heartbeat_at = now;
        entry.beats += 1;
        if was_offline {
            entry.agent.status = entry.occupancy_status();
        }
        let broadcast =
            was_offline || meaningful || entry.beats % HEARTBEAT_BROADCAST_EVERY == 0;
        let agent = entry.agent.clone();
        drop(inner);

        if broadcast {
            self.bus.publish(Event::AgentUpdated { agent });
        }
        true
    }

    /// Mark an agent offline and drop its outbound channel.
    pub fn disconnect(&self, id: &AgentId) -> bool {
        let mut inner = self.inner.write();
        let Some(entry) = inner.get_mut(id) else {
            return false;
        };
        if entry.agent.status == AgentStatus::Offline {
            return false;
        }
        entry.agent.status = AgentStatus::Offline;
        entry.outbound = None;
        drop(inner);
        self.bus.publish(Event::AgentDisconnected { agent_id: id.clone() });
        true
    }

    /// Disconnect only if `conn` is still the entry's live connection.
    ///
    /// A reconnect that raced ahead of the old link's close keeps its new
    /// channel.
    pub fn disconnect_conn(&self, id: &AgentId, conn: u64) -> bool {
        {
            let inner = self.inner.read();
            match inner.get(id) {
                Some(entry) if entry.conn == conn => {}
                _ => return false,
            }
        }
        self.disconnect(id)
    }

    /// Explicit admin removal; the agent record is gone for good.
    pub fn remove(&self, id: &AgentId) -> bool {
        let removed = self.inner.write().remove(id).is_some();
        if removed {
            self.bus.publish(Event::AgentDisconnected { agent_id: id.clone() });
        }
        removed
    }

    /// Selection rule, evaluated in order:
    /// 1. explicit ID — must be connected, no fallback;
    /// 2. role filter over connected agents;
    /// 3. any connected agent.
    /// Ties break by lowest active task count, then lowest CPU, then ID.
    pub fn select(&self, explicit: Option<&AgentId>, role: Option<&str>) -> Option<Agent> {
        let inner = self.inner.read();

        if let Some(id) = explicit {
            return inner
                .get(id)
                .filter(|e| e.agent.is_connected())
                .map(|e| e.agent.clone());
        }

        inner
            .values()
            .filter(|e| e.agent.is_connected())
            .filter(|e| role.is_none_or(|r| e.agent.has_role(r)))
            .min_by(|a, b| {
                a.active_tasks
                    .cmp(&b.active_tasks)
                    .then(a.agent.telemetry.cpu_percent.total_cmp(&b.agent.telemetry.cpu_percent))
                    .then(a.agent.id.cmp(&b.agent.id))
            })
            .map(|e| e.agent.clone())
    }

    /// Disconnect every agent whose heartbeat has gone stale. Returns the
    /// reaped IDs so the dispatcher can fail their in-flight commands.
    pub fn reap(&self) -> Vec<AgentId> {
        let now = self.clock.now();
        let stale: Vec<AgentId> = {
            let inner = self.inner.read();
            inner
                .values()
                .filter(|e| {
                    e.agent.is_connected()
                        && now.duration_since(e.heartbeat_at) > self.heartbeat_timeout
                })
                .map(|e| e.agent.id.clone())
                .collect()
        };
        for id in &stale {
            tracing::warn!(agent_id = %id, "heartbeat stale, reaping agent");
            self.disconnect(id);
        }
        stale
    }

    /// Outbound channel for an agent, if connected.
    pub fn sender(&self, id: &AgentId) -> Option<mpsc::Sender<ControllerMessage>> {
        self.inner.read().get(id).and_then(|e| e.outbound.clone())
    }

    pub fn get(&self, id: &AgentId) -> Option<Agent> {
        self.inner.read().get(id).map(|e| e.agent.clone())
    }

    /// All agents, sorted by ID for stable listings.
    pub fn snapshot(&self) -> Vec<Agent> {
        let mut agents: Vec<Agent> =
            self.inner.read().values().map(|e| e.agent.clone()).collect();
        agents.sort_by(|a, b| a.id.cmp(&b.id));
        agents
    }

    pub fn counts(&self) -> AgentCounts {
        let inner = self.inner.read();
        let total = inner.len();
        let online = inner.values().filter(|e| e.agent.is_connected()).count();
        let available = inner
            .values()
            .filter(|e| e.agent.is_connected() && e.active_tasks == 0)
            .count();
        AgentCounts { total, online, available }
    }

    pub fn active_task_count(&self, id: &AgentId) -> u32 {
        self.inner.read().get(id).map_or(0, |e| e.active_tasks)
    }

    /// Track a task starting on an agent; flips status to `busy`.
    pub fn incr_active(&self, id: &AgentId) {
        self.set_active(id, 1);
    }

    /// Track a task finishing on an agent; flips status back to `online`
    /// when nothing is left.
    pub fn decr_active(&self, id: &AgentId) {
        self.set_active(id, -1);
    }

    fn set_active(&self, id: &AgentId, delta: i64) {
        let mut inner = self.inner.write();
        let Some(entry) = inner.get_mut(id) else {
            return;
        };
        entry.active_tasks = (entry.active_tasks as i64 + delta).max(0) as u32;
        if entry.agent.status != AgentStatus::Offline {
            let status = entry.occupancy_status();
            if entry.agent.status != status {
                entry.agent.status = status;
                let agent = entry.agent.clone();
                drop(inner);
                self.bus.publish(Event::AgentUpdated { agent });
            }
        }
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
