// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! The steward: the meta-agent owning a team.
//!
//! A team task runs in three phases: the steward's own LLM decomposes the
//! request into role-addressed sub-tasks, the scheduler executes them in
//! parallel, and a final LLM call aggregates the outputs.  Both LLM phases
//! degrade deterministically: an unparseable decomposition falls back to
//! direct single-agent execution, and a failed aggregation falls back to
//! concatenating the raw outputs.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use troupe_core::AgentExecutor;
use troupe_model::{ChatMessage, ChatRequest};

use crate::scheduler::{SubTask, TaskResult, TaskScheduler, TaskStatus};
use crate::team::{Team, TeamStore};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Intent {
    pub action: String,
    #[serde(default)]
    pub targets: Vec<String>,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannedTask {
    pub role: String,
    pub instruction: String,
}

/// The strict JSON contract the decomposition prompt demands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecompositionPlan {
    pub intent: Intent,
    #[serde(default)]
    pub tasks: Vec<PlannedTask>,
}

#[derive(Debug)]
pub struct StewardResult {
    pub intent: Intent,
    pub tasks: Vec<TaskResult>,
    pub summary: String,
    pub duration: Duration,
}

pub struct Steward {
    teams: Arc<TeamStore>,
    executor: Arc<dyn AgentExecutor>,
    scheduler: Arc<TaskScheduler>,
}

impl Steward {
    pub fn new(
        teams: Arc<TeamStore>,
        executor: Arc<dyn AgentExecutor>,
        scheduler: Arc<TaskScheduler>,
    ) -> Self {
        Self {
            teams,
            executor,
            scheduler,
        }
    }

    pub fn teams(&self) -> &Arc<TeamStore> {
        &self.teams
    }

    /// Run one team task end to end.
    pub async fn handle(&self, team_id: &str, user_message: &str) -> anyhow::Result<StewardResult> {
        let started = Instant::now();
        let team = self
            .teams
            .get(team_id)
            .with_context(|| format!("unknown team: {team_id}"))?;

        let plan = self.decompose(&team, user_message).await;

        if plan.tasks.is_empty() {
            // Nothing to fan out: the steward's own agent answers directly.
            let summary = self
                .executor
                .execute(&team.steward_agent_id, user_message)
                .await?;
            return Ok(StewardResult {
                intent: plan.intent,
                tasks: Vec::new(),
                summary,
                duration: started.elapsed(),
            });
        }

        debug!(team = %team.name, tasks = plan.tasks.len(), "dispatching decomposed tasks");
        let sub_tasks: Vec<SubTask> = plan
            .tasks
            .iter()
            .map(|t| SubTask::new(&t.role, &t.instruction))
            .collect();
        let mut rx = self.scheduler.dispatch(&team, sub_tasks);
        let mut results = Vec::new();
        while let Some(result) = rx.recv().await {
            results.push(result);
        }

        let summary = self.aggregate(&team, &plan.intent, &results).await;

        Ok(StewardResult {
            intent: plan.intent,
            tasks: results,
            summary,
            duration: started.elapsed(),
        })
    }

    /// Ask the steward's LLM for a decomposition plan.  Any failure (the
    /// provider erroring or the JSON not parsing) degrades to a direct
    /// intent with no tasks.
    async fn decompose(&self, team: &Team, user_message: &str) -> DecompositionPlan {
        let roles: Vec<&str> = team.members.iter().map(|m| m.role.as_str()).collect();
        let system = format!(
            "You are the steward of the team \"{}\". Decompose the user's request \
             into sub-tasks addressed to the available member roles.\n\
             Available roles: {}\n\
             Respond with strict JSON only, no prose:\n\
             {{\"intent\":{{\"action\":\"...\",\"targets\":[\"...\"],\"description\":\"...\"}},\
             \"tasks\":[{{\"role\":\"...\",\"instruction\":\"...\"}}]}}\n\
             Use an empty tasks array when the request needs no delegation.",
            team.name,
            roles.join(", "),
        );
        let req = ChatRequest::new(
            String::new(),
            vec![ChatMessage::system(system), ChatMessage::user(user_message)],
        );

        let fallback = || DecompositionPlan {
            intent: Intent {
                action: "direct".into(),
                targets: Vec::new(),
                description: user_message.to_string(),
            },
            tasks: Vec::new(),
        };

        let response = match self.executor.route_raw(&team.steward_agent_id, req).await {
            Ok(r) => r,
            Err(e) => {
                warn!(team = %team.name, error = %e, "decomposition call failed; running direct");
                return fallback();
            }
        };
        match parse_plan(&response.content) {
            Some(plan) => plan,
            None => {
                warn!(team = %team.name, "decomposition output was not valid JSON; running direct");
                fallback()
            }
        }
    }

    /// Summarize the collected outputs through the steward's LLM, falling
    /// back to plain concatenation when the call fails.
    async fn aggregate(&self, team: &Team, intent: &Intent, results: &[TaskResult]) -> String {
        let rendered: Vec<String> = results.iter().map(render_result).collect();
        let prompt = format!(
            "Original intent: {}\n\nTask outputs:\n{}\n\n\
             Write a single coherent summary of the team's work for the user.",
            intent.description,
            rendered.join("\n"),
        );
        let req = ChatRequest::new(
            String::new(),
            vec![
                ChatMessage::system("You summarize a team's task outputs into one answer."),
                ChatMessage::user(prompt),
            ],
        );
        match self.executor.route_raw(&team.steward_agent_id, req).await {
            Ok(response) if !response.content.is_empty() => response.content,
            Ok(_) => rendered.join("\n---\n"),
            Err(e) => {
                warn!(team = %team.name, error = %e, "aggregation call failed; concatenating outputs");
                rendered.join("\n---\n")
            }
        }
    }
}

fn render_result(result: &TaskResult) -> String {
    match result.status {
        TaskStatus::Done => format!("[{}]: {}", result.agent_id, result.output),
        _ => format!(
            "[{}]: failed - {}",
            result.agent_id,
            result.error.as_deref().unwrap_or("unknown error")
        ),
    }
}

/// Parse the model's decomposition output.  Tolerates prose or code fences
/// around the object by retrying on the outermost brace span.
fn parse_plan(content: &str) -> Option<DecompositionPlan> {
    if let Ok(plan) = serde_json::from_str(content) {
        return Some(plan);
    }
    let start = content.find('{')?;
    let end = content.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&content[start..=end]).ok()
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
