// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Tick-driven autonomous agent wakeups.
//!
//! Each world-clock tick does two things: drain the engine's buffered
//! schedules into the world schedule manager, and, at most once per
//! interval, wake every agent with a fixed prompt under a hard per-agent
//! timeout.  Failures are logged, never propagated.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use troupe_core::AgentEngine;
use troupe_tools::PendingSchedule;

pub const HEARTBEAT_PROMPT: &str = "[heartbeat] you are idle; think, recall, or plan";

/// Hard cap on one agent's heartbeat execution.
const AGENT_TIMEOUT: Duration = Duration::from_secs(30);

/// The world-clock contract.
#[async_trait]
pub trait ClockListener: Send + Sync {
    async fn on_tick(&self, world_time: DateTime<Utc>);
}

/// Port to the world schedule manager.
#[async_trait]
pub trait ScheduleSink: Send + Sync {
    async fn add(&self, schedule: PendingSchedule) -> anyhow::Result<()>;
}

/// In-process sink for tests and single-process runs.
#[derive(Default)]
pub struct MemoryScheduleSink {
    schedules: Mutex<Vec<PendingSchedule>>,
}

impl MemoryScheduleSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn schedules(&self) -> Vec<PendingSchedule> {
        self.schedules.lock().unwrap().clone()
    }
}

#[async_trait]
impl ScheduleSink for MemoryScheduleSink {
    async fn add(&self, schedule: PendingSchedule) -> anyhow::Result<()> {
        self.schedules.lock().unwrap().push(schedule);
        Ok(())
    }
}

pub struct Heartbeat {
    engine: Arc<AgentEngine>,
    sink: Arc<dyn ScheduleSink>,
    interval: chrono::Duration,
    agent_timeout: Duration,
    last_beat: Mutex<DateTime<Utc>>,
    /// When set, heartbeats go to exactly these agents instead of the
    /// engine's full roster.
    static_agents: Option<Vec<String>>,
}

impl Heartbeat {
    pub fn new(engine: Arc<AgentEngine>, sink: Arc<dyn ScheduleSink>, interval_secs: i64) -> Self {
        Self {
            engine,
            sink,
            interval: chrono::Duration::seconds(interval_secs),
            agent_timeout: AGENT_TIMEOUT,
            // Seeded in the past so the first elapsed tick fires.
            last_beat: Mutex::new(DateTime::<Utc>::MIN_UTC),
            static_agents: None,
        }
    }

    pub fn with_static_agents(mut self, agent_ids: Vec<String>) -> Self {
        self.static_agents = Some(agent_ids);
        self
    }

    pub fn with_agent_timeout(mut self, timeout: Duration) -> Self {
        self.agent_timeout = timeout;
        self
    }

    /// Admin-triggered cycle; returns how many agents fired successfully.
    pub async fn fire_now(&self) -> usize {
        self.beat().await
    }

    async fn beat(&self) -> usize {
        let agent_ids: Vec<String> = match &self.static_agents {
            Some(ids) => ids.clone(),
            None => self.engine.list().into_iter().map(|a| a.id).collect(),
        };

        let mut fired = 0;
        for agent_id in agent_ids {
            match tokio::time::timeout(
                self.agent_timeout,
                self.engine.execute(&agent_id, HEARTBEAT_PROMPT),
            )
            .await
            {
                Ok(Ok(_)) => fired += 1,
                Ok(Err(e)) => warn!(agent_id = %agent_id, error = %e, "heartbeat execution failed"),
                Err(_) => warn!(agent_id = %agent_id, "heartbeat timed out"),
            }
        }
        debug!(fired, "heartbeat cycle complete");
        fired
    }
}

#[async_trait]
impl ClockListener for Heartbeat {
    async fn on_tick(&self, world_time: DateTime<Utc>) {
        // Buffered schedules are handed over on every tick, unfiltered.
        for schedule in self.engine.drain_schedules() {
            if let Err(e) = self.sink.add(schedule).await {
                warn!(error = %e, "failed to hand schedule to the world manager");
            }
        }

        let due = {
            let mut last = self.last_beat.lock().unwrap();
            if world_time.signed_duration_since(*last) >= self.interval {
                *last = world_time;
                true
            } else {
                false
            }
        };
        if due {
            self.beat().await;
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
