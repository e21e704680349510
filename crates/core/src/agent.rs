// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent identity, capabilities, and liveness state.
//!
//! Agents are created on their first `agent_hello` and logically survive
//! reconnection: a later hello with the same ID refreshes the record, and
//! only `status` flips on disconnect.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

crate::define_id! {
    /// Unique identifier for an agent, stable across reconnects.
    ///
    /// Agents choose their own IDs (typically a hostname-derived slug); the
    /// controller accepts them verbatim.
    pub struct AgentId("agt-");
}

/// Connection/occupancy state of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    /// Connected and idle.
    Online,
    /// Connected with at least one task in flight.
    Busy,
    /// Link lost or heartbeat expired.
    Offline,
}

impl AgentStatus {
    /// Whether the agent is reachable (online or busy).
    pub fn is_connected(&self) -> bool {
        !matches!(self, AgentStatus::Offline)
    }
}

crate::simple_display! {
    AgentStatus {
        Online => "online",
        Busy => "busy",
        Offline => "offline",
    }
}

/// Rolling host telemetry reported with each heartbeat.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Telemetry {
    #[serde(default)]
    pub cpu_percent: f64,
    #[serde(default)]
    pub memory_percent: f64,
    #[serde(default)]
    pub disk_percent: f64,
    #[serde(default)]
    pub load_average: f64,
}

impl Telemetry {
    /// Change threshold (percentage points) below which an update is noise.
    pub const MEANINGFUL_DELTA: f64 = 5.0;

    /// Whether this reading differs from `other` enough to be worth
    /// broadcasting to observers.
    pub fn meaningful_delta(&self, other: &Telemetry) -> bool {
        (self.cpu_percent - other.cpu_percent).abs() >= Self::MEANINGFUL_DELTA
            || (self.memory_percent - other.memory_percent).abs() >= Self::MEANINGFUL_DELTA
            || (self.disk_percent - other.disk_percent).abs() >= Self::MEANINGFUL_DELTA
            || (self.load_average - other.load_average).abs() >= Self::MEANINGFUL_DELTA
    }
}

/// Registration payload sent by an agent as its first wire message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentHello {
    pub id: AgentId,
    pub hostname: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub capabilities: BTreeMap<String, String>,
}

/// A remote worker known to the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    pub hostname: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Lowercase role tags (`web`, `worker`, `build`, ...).
    #[serde(default)]
    pub roles: BTreeSet<String>,
    /// Free-form labels.
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// Capability map, e.g. `docker=true`, `python=3.11`, `concurrent=true`.
    #[serde(default)]
    pub capabilities: BTreeMap<String, String>,
    pub status: AgentStatus,
    /// Epoch milliseconds of the most recent heartbeat or hello.
    pub last_heartbeat_ms: u64,
    #[serde(default)]
    pub telemetry: Telemetry,
}

impl Agent {
    /// Create an agent record from its first hello.
    pub fn from_hello(hello: AgentHello, epoch_ms: u64) -> Self {
        let mut agent = Agent {
            id: hello.id.clone(),
            hostname: String::new(),
            display_name: None,
            roles: BTreeSet::new(),
            tags: BTreeSet::new(),
            capabilities: BTreeMap::new(),
            status: AgentStatus::Online,
            last_heartbeat_ms: epoch_ms,
            telemetry: Telemetry::default(),
        };
        agent.apply_hello(hello, epoch_ms);
        agent
    }

    /// Refresh identity fields from a (re)registration hello.
    pub fn apply_hello(&mut self, hello: AgentHello, epoch_ms: u64) {
        self.hostname = hello.hostname;
        self.display_name = hello.display_name;
        self.roles = hello.roles.iter().map(|r| r.trim().to_lowercase()).collect();
        self.roles.retain(|r| !r.is_empty());
        self.tags = hello.tags.into_iter().collect();
        self.capabilities = hello.capabilities;
        self.status = AgentStatus::Online;
        self.last_heartbeat_ms = epoch_ms;
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(&role.trim().to_lowercase())
    }

    /// Whether the agent accepts interleaved tasks (`concurrent=true`).
    pub fn supports_concurrent(&self) -> bool {
        self.capabilities
            .get("concurrent")
            .is_some_and(|v| v.eq_ignore_ascii_case("true"))
    }

    pub fn is_connected(&self) -> bool {
        self.status.is_connected()
    }
}

#[cfg(test)]
#[path = "agent_tests.rs"]
mod tests;
