// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Bounded parallel dispatch of sub-tasks onto agents.
//!
//! A counting semaphore caps how many agent executions run at once; the
//! semaphore is the sole admission gate.  `dispatch` fans out one worker per
//! task and returns a channel that yields exactly one `TaskResult` per task
//! before closing.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch, Semaphore};
use tracing::{debug, warn};
use uuid::Uuid;

use troupe_bus::{BusMessage, MessageBus};
use troupe_core::AgentExecutor;

use crate::team::Team;

/// Default concurrent-execution cap inside a team dispatch.
pub const POOL_SIZE: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Done,
    Failed,
    Cancelled,
}

/// One unit of decomposed work.  The final status is terminal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubTask {
    pub id: String,
    pub step_role: String,
    #[serde(default)]
    pub agent_id: String,
    pub input: String,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl SubTask {
    pub fn new(step_role: impl Into<String>, input: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            step_role: step_role.into(),
            agent_id: String::new(),
            input: input.into(),
            status: TaskStatus::Pending,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }
}

/// Completion record posted on the dispatch channel, once per task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    pub task_id: String,
    pub agent_id: String,
    pub role: String,
    pub output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub status: TaskStatus,
}

pub struct TaskScheduler {
    executor: Arc<dyn AgentExecutor>,
    permits: Arc<Semaphore>,
    running: Arc<Mutex<HashMap<String, SubTask>>>,
    bus: Option<Arc<dyn MessageBus>>,
}

impl TaskScheduler {
    pub fn new(executor: Arc<dyn AgentExecutor>) -> Self {
        Self::with_pool_size(executor, POOL_SIZE)
    }

    pub fn with_pool_size(executor: Arc<dyn AgentExecutor>, pool_size: usize) -> Self {
        Self {
            executor,
            permits: Arc::new(Semaphore::new(pool_size)),
            running: Arc::new(Mutex::new(HashMap::new())),
            bus: None,
        }
    }

    /// Mirror every task result onto the bus stream of `steward_agent_id`
    /// as a progress feed.
    pub fn with_bus(mut self, bus: Arc<dyn MessageBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Snapshot of in-flight tasks.
    pub fn running(&self) -> Vec<SubTask> {
        self.running.lock().unwrap().values().cloned().collect()
    }

    /// Pick the agent for a task role within a team.
    ///
    /// Among members whose role matches exactly and whose agent is
    /// registered, the highest priority wins; ties resolve to the first in
    /// the member list.  With no exact match, the first registered member
    /// with `can_delegate` is used.  `None` means no agent matched.
    pub fn match_agent(&self, team: &Team, role: &str) -> Option<String> {
        let mut best: Option<(&str, i32)> = None;
        for m in &team.members {
            if m.role != role || !self.executor.is_registered(&m.agent_id) {
                continue;
            }
            match best {
                Some((_, p)) if m.priority <= p => {}
                _ => best = Some((m.agent_id.as_str(), m.priority)),
            }
        }
        if let Some((id, _)) = best {
            return Some(id.to_string());
        }
        team.members
            .iter()
            .find(|m| m.can_delegate && self.executor.is_registered(&m.agent_id))
            .map(|m| m.agent_id.clone())
    }

    /// Fan out all tasks; the returned channel yields exactly one result per
    /// task and then closes.
    pub fn dispatch(&self, team: &Team, tasks: Vec<SubTask>) -> mpsc::Receiver<TaskResult> {
        // Workers treat a dropped cancel sender as "never cancelled", so the
        // sender can go out of scope here.
        let (_cancel_tx, cancel_rx) = watch::channel(false);
        self.dispatch_with_cancel(team, tasks, cancel_rx)
    }

    /// Like [`dispatch`], propagating the caller's cancellation: flipping the
    /// watch to `true` cancels queued and in-flight workers, and the channel
    /// still closes after emitting one result per task.
    pub fn dispatch_with_cancel(
        &self,
        team: &Team,
        tasks: Vec<SubTask>,
        cancel: watch::Receiver<bool>,
    ) -> mpsc::Receiver<TaskResult> {
        let (tx, rx) = mpsc::channel(tasks.len().max(1));

        for mut task in tasks {
            let tx = tx.clone();
            let role = task.step_role.clone();

            // Assignment happens synchronously so `running()` and the failed
            // result reflect dispatch-time membership.
            let Some(agent_id) = self.match_agent(team, &role) else {
                debug!(role = %role, team = %team.name, "no agent matched");
                let result = TaskResult {
                    task_id: task.id.clone(),
                    agent_id: String::new(),
                    role: role.clone(),
                    output: String::new(),
                    error: Some(format!("no agent matched for role: {role}")),
                    status: TaskStatus::Failed,
                };
                self.post(team, result, tx);
                continue;
            };
            task.agent_id = agent_id.clone();

            let executor = Arc::clone(&self.executor);
            let permits = Arc::clone(&self.permits);
            let running = Arc::clone(&self.running);
            let bus = self.bus.clone();
            let steward_id = team.steward_agent_id.clone();
            let mut cancel = cancel.clone();

            tokio::spawn(async move {
                let permit = tokio::select! {
                    permit = permits.acquire_owned() => permit,
                    _ = wait_cancelled(&mut cancel) => {
                        let _ = tx
                            .send(cancelled_result(&task, &agent_id))
                            .await;
                        return;
                    }
                };
                // The semaphore is never closed.
                let _permit = permit.expect("scheduler semaphore closed");

                task.status = TaskStatus::Running;
                task.started_at = Some(Utc::now());
                running.lock().unwrap().insert(task.id.clone(), task.clone());

                let outcome = tokio::select! {
                    result = executor.execute(&agent_id, &task.input) => Some(result),
                    _ = wait_cancelled(&mut cancel) => None,
                };

                running.lock().unwrap().remove(&task.id);

                let result = match outcome {
                    Some(Ok(output)) => TaskResult {
                        task_id: task.id.clone(),
                        agent_id: agent_id.clone(),
                        role: task.step_role.clone(),
                        output,
                        error: None,
                        status: TaskStatus::Done,
                    },
                    Some(Err(e)) => {
                        warn!(task_id = %task.id, agent_id = %agent_id, error = %e, "sub-task failed");
                        TaskResult {
                            task_id: task.id.clone(),
                            agent_id: agent_id.clone(),
                            role: task.step_role.clone(),
                            output: String::new(),
                            error: Some(e.to_string()),
                            status: TaskStatus::Failed,
                        }
                    }
                    None => cancelled_result(&task, &agent_id),
                };

                if let Some(bus) = bus {
                    if let Ok(payload) = serde_json::to_string(&result) {
                        let _ = bus
                            .publish(BusMessage::new(&agent_id, &steward_id, payload))
                            .await;
                    }
                }

                let _ = tx.send(result).await;
            });
        }

        // All worker clones of `tx` outlive this function; dropping the
        // original here is what lets the channel close once they finish.
        rx
    }

    fn post(&self, team: &Team, result: TaskResult, tx: mpsc::Sender<TaskResult>) {
        let bus = self.bus.clone();
        let steward_id = team.steward_agent_id.clone();
        tokio::spawn(async move {
            if let Some(bus) = bus {
                if let Ok(payload) = serde_json::to_string(&result) {
                    let _ = bus
                        .publish(BusMessage::new("scheduler", &steward_id, payload))
                        .await;
                }
            }
            let _ = tx.send(result).await;
        });
    }
}

fn cancelled_result(task: &SubTask, agent_id: &str) -> TaskResult {
    TaskResult {
        task_id: task.id.clone(),
        agent_id: agent_id.to_string(),
        role: task.step_role.clone(),
        output: String::new(),
        error: Some("cancelled".into()),
        status: TaskStatus::Cancelled,
    }
}

/// Resolve when the watch flips to `true`.  A dropped sender is not a
/// cancellation; the future just never resolves.
async fn wait_cancelled(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use async_trait::async_trait;
    use troupe_core::EngineError;
    use troupe_model::{ChatRequest, ChatResponse};

    use super::*;
    use crate::team::TeamMember;

    struct MockExec {
        registered: HashSet<String>,
        fail_for: HashSet<String>,
        delay_ms: u64,
    }

    impl MockExec {
        fn registered(ids: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                registered: ids.iter().map(|s| s.to_string()).collect(),
                fail_for: HashSet::new(),
                delay_ms: 0,
            })
        }
    }

    #[async_trait]
    impl AgentExecutor for MockExec {
        async fn execute(&self, agent_id: &str, message: &str) -> Result<String, EngineError> {
            if self.delay_ms > 0 {
                tokio::time::sleep(std::time::Duration::from_millis(self.delay_ms)).await;
            }
            if self.fail_for.contains(agent_id) {
                return Err(EngineError::UnknownAgent(agent_id.into()));
            }
            Ok(format!("{agent_id} handled: {message}"))
        }

        async fn route_raw(
            &self,
            _agent_id: &str,
            _req: ChatRequest,
        ) -> Result<ChatResponse, EngineError> {
            Ok(ChatResponse::text("raw"))
        }

        fn is_registered(&self, agent_id: &str) -> bool {
            self.registered.contains(agent_id)
        }
    }

    fn writer_team() -> Team {
        Team::new("writers", "steward-1")
            .with_member(TeamMember {
                agent_id: "agent-a".into(),
                role: "writer".into(),
                can_delegate: true,
                priority: 1,
            })
            .with_member(TeamMember {
                agent_id: "agent-b".into(),
                role: "writer".into(),
                can_delegate: false,
                priority: 2,
            })
    }

    async fn collect(mut rx: mpsc::Receiver<TaskResult>) -> Vec<TaskResult> {
        let mut out = Vec::new();
        while let Some(r) = rx.recv().await {
            out.push(r);
        }
        out
    }

    #[tokio::test]
    async fn highest_priority_wins_role_match() {
        let scheduler = TaskScheduler::new(MockExec::registered(&["agent-a", "agent-b"]));
        let team = writer_team();
        assert_eq!(scheduler.match_agent(&team, "writer").as_deref(), Some("agent-b"));
    }

    #[tokio::test]
    async fn equal_priorities_resolve_to_first_member() {
        let scheduler = TaskScheduler::new(MockExec::registered(&["agent-a", "agent-b"]));
        let mut team = writer_team();
        team.members[1].priority = 1;
        assert_eq!(scheduler.match_agent(&team, "writer").as_deref(), Some("agent-a"));
    }

    #[tokio::test]
    async fn unregistered_agents_fall_back_to_delegate() {
        // agent-b is unregistered; agent-a has can_delegate.
        let scheduler = TaskScheduler::new(MockExec::registered(&["agent-a"]));
        let team = writer_team();
        assert_eq!(scheduler.match_agent(&team, "editor").as_deref(), Some("agent-a"));
    }

    #[tokio::test]
    async fn dispatch_emits_one_result_per_task_then_closes() {
        let scheduler = TaskScheduler::new(MockExec::registered(&["agent-a", "agent-b"]));
        let team = writer_team();
        let tasks = vec![
            SubTask::new("writer", "draft the intro"),
            SubTask::new("writer", "draft the outro"),
        ];
        let results = collect(scheduler.dispatch(&team, tasks)).await;
        assert_eq!(results.len(), 2);
        // Both matched the highest-priority registered writer.
        assert!(results.iter().all(|r| r.agent_id == "agent-b"));
        assert!(results.iter().all(|r| r.status == TaskStatus::Done));
        assert!(scheduler.running().is_empty());
    }

    #[tokio::test]
    async fn unmatched_role_emits_failed_result_without_erroring() {
        let scheduler = TaskScheduler::new(MockExec::registered(&[]));
        let mut team = writer_team();
        team.members.clear();
        let results = collect(scheduler.dispatch(&team, vec![SubTask::new("editor", "x")])).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].status, TaskStatus::Failed);
        assert_eq!(
            results[0].error.as_deref(),
            Some("no agent matched for role: editor")
        );
    }

    #[tokio::test]
    async fn executor_failure_becomes_failed_result() {
        let exec = Arc::new(MockExec {
            registered: ["agent-a"].iter().map(|s| s.to_string()).collect(),
            fail_for: ["agent-a"].iter().map(|s| s.to_string()).collect(),
            delay_ms: 0,
        });
        let scheduler = TaskScheduler::new(exec);
        let mut team = writer_team();
        team.members.truncate(1);
        let results = collect(scheduler.dispatch(&team, vec![SubTask::new("writer", "x")])).await;
        assert_eq!(results[0].status, TaskStatus::Failed);
        assert!(results[0].error.is_some());
    }

    #[tokio::test]
    async fn pool_size_caps_concurrency() {
        let exec = Arc::new(MockExec {
            registered: ["agent-b"].iter().map(|s| s.to_string()).collect(),
            fail_for: HashSet::new(),
            delay_ms: 50,
        });
        let scheduler = TaskScheduler::with_pool_size(exec, 1);
        let team = writer_team();
        let tasks = vec![SubTask::new("writer", "a"), SubTask::new("writer", "b")];
        let start = std::time::Instant::now();
        let results = collect(scheduler.dispatch(&team, tasks)).await;
        assert_eq!(results.len(), 2);
        // Serialized by the single permit: at least two delays back to back.
        assert!(start.elapsed() >= std::time::Duration::from_millis(100));
    }

    #[tokio::test]
    async fn cancellation_yields_cancelled_results_and_closes() {
        let exec = Arc::new(MockExec {
            registered: ["agent-b"].iter().map(|s| s.to_string()).collect(),
            fail_for: HashSet::new(),
            delay_ms: 5_000,
        });
        let scheduler = TaskScheduler::new(exec);
        let team = writer_team();
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let rx = scheduler.dispatch_with_cancel(
            &team,
            vec![SubTask::new("writer", "slow")],
            cancel_rx,
        );
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        cancel_tx.send(true).unwrap();
        let results = collect(rx).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].status, TaskStatus::Cancelled);
    }

    #[tokio::test]
    async fn results_are_mirrored_to_steward_stream() {
        let bus = troupe_bus::MemoryBus::new();
        let scheduler = TaskScheduler::new(MockExec::registered(&["agent-b"]))
            .with_bus(bus.clone());
        let team = writer_team();
        let results = collect(scheduler.dispatch(&team, vec![SubTask::new("writer", "x")])).await;
        assert_eq!(results.len(), 1);
        assert_eq!(bus.stream_len("steward-1").await, 1);
    }
}
