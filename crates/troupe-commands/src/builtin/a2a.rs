// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use async_trait::async_trait;
use tracing::warn;

use troupe_a2a::A2aStatus;

use crate::builtin::{resolve_agent_id, split_word};
use crate::command::{Command, CommandContext, CommandResult};

const DEFAULT_MAX_ROUNDS: u32 = 6;

/// Agent-to-agent task verbs: create a conversation task, query its status.
pub struct A2aCommand;

#[async_trait]
impl Command for A2aCommand {
    fn name(&self) -> &str {
        "a2a"
    }
    fn description(&self) -> &str {
        "Create or inspect an agent-to-agent conversation task"
    }
    fn usage(&self) -> &str {
        "/a2a <create|status> <agent1,agent2|task-id> [description]"
    }

    async fn execute(&self, args: &str, ctx: &CommandContext) -> anyhow::Result<CommandResult> {
        let (verb, rest) = split_word(args);
        match verb {
            "create" => {
                let (agent_list, description) = split_word(rest);
                let mut agent_ids = Vec::new();
                for name in agent_list.split(',').filter(|s| !s.is_empty()) {
                    let Some(id) = resolve_agent_id(ctx, name) else {
                        return Ok(CommandResult::text(format!("Unknown agent: {name}")));
                    };
                    agent_ids.push(id);
                }
                if agent_ids.is_empty() || description.is_empty() {
                    return Ok(CommandResult::text(format!("Usage: {}", self.usage())));
                }

                let store = ctx.handles.a2a.store();
                let task = store.create(description, agent_ids.clone(), DEFAULT_MAX_ROUNDS);
                store.transition(&task.id, A2aStatus::Planning)?;
                store.confirm_agents(&task.id, agent_ids)?;
                store.transition(&task.id, A2aStatus::Confirmed)?;

                // The conversation runs detached; /a2a status observes it.
                let a2a = ctx.handles.a2a.clone();
                let task_id = task.id.clone();
                tokio::spawn(async move {
                    if let Err(e) = a2a.run(&task_id).await {
                        warn!(task_id = %task_id, error = %e, "a2a conversation failed");
                    }
                });

                Ok(CommandResult::text(format!("Created a2a task {}", task.id)))
            }
            "status" => {
                let (task_id, _) = split_word(rest);
                let Some(task) = ctx.handles.a2a.store().get(task_id) else {
                    return Ok(CommandResult::text(format!("Unknown a2a task: {task_id}")));
                };
                let mut text = format!(
                    "Task {} [{}]: {}",
                    task.id,
                    serde_json::to_string(&task.status).unwrap_or_default().trim_matches('"'),
                    task.description,
                );
                if let Some(result) = &task.result {
                    text.push_str(&format!("\nResult: {result}"));
                }
                Ok(CommandResult::text(text))
            }
            _ => Ok(CommandResult::text(format!("Usage: {}", self.usage()))),
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
