// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use async_trait::async_trait;

use troupe_core::AgentRecord;

use crate::builtin::{resolve_agent_id, split_word};
use crate::command::{Command, CommandContext, CommandResult};

pub struct ListAgentsCommand;

#[async_trait]
impl Command for ListAgentsCommand {
    fn name(&self) -> &str {
        "list_agents"
    }
    fn description(&self) -> &str {
        "List registered agents"
    }
    fn usage(&self) -> &str {
        "/list_agents"
    }

    async fn execute(&self, _args: &str, ctx: &CommandContext) -> anyhow::Result<CommandResult> {
        let agents = ctx.handles.engine.list();
        if agents.is_empty() {
            return Ok(CommandResult::text("No agents registered."));
        }
        let lines: Vec<String> = agents
            .iter()
            .map(|a| {
                format!(
                    "- {} ({}) [{}] {}",
                    a.name,
                    a.id,
                    serde_json::to_string(&a.status).unwrap_or_default().trim_matches('"'),
                    a.role,
                )
            })
            .collect();
        Ok(CommandResult::text(lines.join("\n")))
    }
}

pub struct CreateAgentCommand;

#[async_trait]
impl Command for CreateAgentCommand {
    fn name(&self) -> &str {
        "create_agent"
    }
    fn description(&self) -> &str {
        "Register a new agent"
    }
    fn usage(&self) -> &str {
        "/create_agent <name> [role]"
    }

    async fn execute(&self, args: &str, ctx: &CommandContext) -> anyhow::Result<CommandResult> {
        let (name, role) = split_word(args);
        if name.is_empty() {
            return Ok(CommandResult::text(format!("Usage: {}", self.usage())));
        }
        let mut agent = AgentRecord::named(name);
        agent.role = role.to_string();
        if let Some(default) = ctx.handles.engine.router().default_id() {
            agent.provider_id = default;
        }
        let agent = ctx.handles.engine.register(agent);
        Ok(CommandResult::text(format!(
            "Created agent {} ({})",
            agent.name, agent.id
        )))
    }
}

/// Admin verbs on one agent: get, remove, skill assignment.
pub struct AgentAdminCommand;

#[async_trait]
impl Command for AgentAdminCommand {
    fn name(&self) -> &str {
        "agent"
    }
    fn description(&self) -> &str {
        "Inspect or administer an agent"
    }
    fn usage(&self) -> &str {
        "/agent <get|remove|assign|unassign> <name> [skill]"
    }

    async fn execute(&self, args: &str, ctx: &CommandContext) -> anyhow::Result<CommandResult> {
        let (verb, rest) = split_word(args);
        let (name, skill_name) = split_word(rest);
        let Some(agent_id) = resolve_agent_id(ctx, name) else {
            return Ok(CommandResult::text(format!("Unknown agent: {name}")));
        };

        match verb {
            "get" => match ctx.handles.engine.get(&agent_id) {
                Some(agent) => Ok(CommandResult::text(
                    serde_json::to_string_pretty(&agent).unwrap_or_default(),
                )),
                None => Ok(CommandResult::text(format!("Unknown agent: {name}"))),
            },
            "remove" => {
                ctx.handles.engine.remove(&agent_id);
                Ok(CommandResult::text(format!("Removed agent {name}")))
            }
            "assign" | "unassign" => {
                let Some(skill) = ctx
                    .handles
                    .skills
                    .list()
                    .into_iter()
                    .find(|s| s.name == skill_name)
                else {
                    return Ok(CommandResult::text(format!("Unknown skill: {skill_name}")));
                };
                let changed = if verb == "assign" {
                    ctx.handles.skills.assign(&agent_id, &skill.id)
                } else {
                    ctx.handles.skills.unassign(&agent_id, &skill.id)
                };
                Ok(CommandResult::text(format!(
                    "{} {} {} ({})",
                    if verb == "assign" { "Assigned" } else { "Unassigned" },
                    skill_name,
                    name,
                    if changed { "changed" } else { "no-op" },
                )))
            }
            _ => Ok(CommandResult::text(format!("Usage: {}", self.usage()))),
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
