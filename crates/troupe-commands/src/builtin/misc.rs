// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};

use troupe_core::memory::CONVERSATIONS_COLLECTION;
use troupe_tools::PendingSchedule;

use crate::builtin::{resolve_agent_id, split_word};
use crate::command::{Command, CommandContext, CommandResult};
use crate::registry::CommandRegistry;

pub struct HelpCommand {
    pub registry: Arc<CommandRegistry>,
}

#[async_trait]
impl Command for HelpCommand {
    fn name(&self) -> &str {
        "help"
    }
    fn description(&self) -> &str {
        "List available commands"
    }
    fn usage(&self) -> &str {
        "/help"
    }

    async fn execute(&self, _args: &str, _ctx: &CommandContext) -> anyhow::Result<CommandResult> {
        let lines: Vec<String> = self
            .registry
            .list()
            .iter()
            .map(|c| format!("{} - {}", c.usage(), c.description()))
            .collect();
        Ok(CommandResult::text(lines.join("\n")))
    }
}

pub struct ListToolsCommand;

#[async_trait]
impl Command for ListToolsCommand {
    fn name(&self) -> &str {
        "list_tools"
    }
    fn description(&self) -> &str {
        "List tools the agents can call"
    }
    fn usage(&self) -> &str {
        "/list_tools"
    }

    async fn execute(&self, _args: &str, ctx: &CommandContext) -> anyhow::Result<CommandResult> {
        let defs = ctx.handles.engine.tools().definitions();
        if defs.is_empty() {
            return Ok(CommandResult::text("No tools registered."));
        }
        let lines: Vec<String> = defs
            .iter()
            .map(|d| format!("- {}: {}", d.name, d.description.lines().next().unwrap_or("")))
            .collect();
        Ok(CommandResult::text(lines.join("\n")))
    }
}

/// Runtime overview: providers, agents, teams.
pub struct StatusCommand;

#[async_trait]
impl Command for StatusCommand {
    fn name(&self) -> &str {
        "status"
    }
    fn description(&self) -> &str {
        "Show runtime status"
    }
    fn usage(&self) -> &str {
        "/status"
    }

    async fn execute(&self, _args: &str, ctx: &CommandContext) -> anyhow::Result<CommandResult> {
        let engine = &ctx.handles.engine;
        let providers = engine.router().ids();
        let text = format!(
            "providers: {}\nagents: {}\nteams: {}\ntools: {}",
            providers.join(", "),
            engine.list().len(),
            ctx.handles.teams.list().len(),
            engine.tools().len(),
        );
        Ok(CommandResult::text(text))
    }
}

pub struct CreateScheduleCommand;

#[async_trait]
impl Command for CreateScheduleCommand {
    fn name(&self) -> &str {
        "create_schedule"
    }
    fn description(&self) -> &str {
        "Schedule a future activity for an agent"
    }
    fn usage(&self) -> &str {
        "/create_schedule <agent> <minutes-from-now> <title>"
    }

    async fn execute(&self, args: &str, ctx: &CommandContext) -> anyhow::Result<CommandResult> {
        let (agent, rest) = split_word(args);
        let (minutes, title) = split_word(rest);
        let Some(agent_id) = resolve_agent_id(ctx, agent) else {
            return Ok(CommandResult::text(format!("Unknown agent: {agent}")));
        };
        let Ok(minutes) = minutes.parse::<i64>() else {
            return Ok(CommandResult::text(format!("Usage: {}", self.usage())));
        };
        if title.is_empty() {
            return Ok(CommandResult::text(format!("Usage: {}", self.usage())));
        }
        ctx.handles.engine.add_pending_schedule(PendingSchedule {
            agent_id,
            title: title.to_string(),
            schedule_type: "task".into(),
            start_time: Utc::now() + Duration::minutes(minutes),
            duration_minutes: 30,
            recurring: false,
        });
        Ok(CommandResult::text(format!(
            "Scheduled \"{title}\" for {agent} in {minutes} minute(s)"
        )))
    }
}

pub struct RagSearchCommand;

#[async_trait]
impl Command for RagSearchCommand {
    fn name(&self) -> &str {
        "rag"
    }
    fn description(&self) -> &str {
        "Search the conversation knowledge store"
    }
    fn usage(&self) -> &str {
        "/rag search <query>"
    }

    async fn execute(&self, args: &str, ctx: &CommandContext) -> anyhow::Result<CommandResult> {
        let (verb, query) = split_word(args);
        if verb != "search" || query.is_empty() {
            return Ok(CommandResult::text(format!("Usage: {}", self.usage())));
        }
        let hits = ctx
            .handles
            .rag
            .search(CONVERSATIONS_COLLECTION, query, 5)
            .await?;
        if hits.is_empty() {
            return Ok(CommandResult::text("No matches."));
        }
        let lines: Vec<String> = hits.iter().map(|h| format!("- {}", h.text)).collect();
        Ok(CommandResult::text(lines.join("\n")))
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
