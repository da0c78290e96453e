// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Capability port the builtin tools use to reach the agent engine.
//!
//! The engine owns the tool registry, and some builtin tools need the engine
//! back (schedule creation buffers into it, agent messaging executes through
//! it).  Tools take this narrow port instead of the engine itself, which
//! breaks the ownership cycle at the type level.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A schedule created by a tool call inside the cognitive loop.
///
/// The tool is a deferred side effect: its observable outcome is the
/// schedule's eventual activation when the heartbeat drains the buffer, not
/// immediate execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingSchedule {
    pub agent_id: String,
    pub title: String,
    pub schedule_type: String,
    pub start_time: DateTime<Utc>,
    pub duration_minutes: u32,
    pub recurring: bool,
}

/// The slice of engine capability exposed to tools.
#[async_trait]
pub trait EnginePort: Send + Sync {
    /// Drive another agent through one full cognitive execution.
    async fn execute(&self, agent_id: &str, message: &str) -> anyhow::Result<String>;

    /// Buffer a schedule for the next heartbeat drain.
    fn add_pending_schedule(&self, schedule: PendingSchedule);

    /// `(id, name)` of every registered agent.
    fn agent_roster(&self) -> Vec<(String, String)>;
}
