// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use async_trait::async_trait;

use troupe_bus::BusMessage;
use troupe_team::{Team, TeamMember};

use crate::builtin::{resolve_agent_id, split_word};
use crate::command::{Command, CommandContext, CommandResult};

pub struct CreateTeamCommand;

#[async_trait]
impl Command for CreateTeamCommand {
    fn name(&self) -> &str {
        "create_team"
    }
    fn description(&self) -> &str {
        "Create a team led by a steward agent"
    }
    fn usage(&self) -> &str {
        "/create_team <name> <steward-agent> [member:role ...]"
    }

    async fn execute(&self, args: &str, ctx: &CommandContext) -> anyhow::Result<CommandResult> {
        let (name, rest) = split_word(args);
        let (steward_name, member_specs) = split_word(rest);
        if name.is_empty() || steward_name.is_empty() {
            return Ok(CommandResult::text(format!("Usage: {}", self.usage())));
        }
        let Some(steward_id) = resolve_agent_id(ctx, steward_name) else {
            return Ok(CommandResult::text(format!("Unknown agent: {steward_name}")));
        };

        let mut team = Team::new(name, steward_id);
        for spec in member_specs.split_whitespace() {
            let Some((member_name, role)) = spec.split_once(':') else {
                return Ok(CommandResult::text(format!("Bad member spec: {spec}")));
            };
            let Some(agent_id) = resolve_agent_id(ctx, member_name) else {
                return Ok(CommandResult::text(format!("Unknown agent: {member_name}")));
            };
            team.members.push(TeamMember {
                agent_id,
                role: role.to_string(),
                can_delegate: false,
                priority: 0,
            });
        }
        let team = ctx.handles.teams.upsert(team);
        Ok(CommandResult::text(format!(
            "Created team {} ({}) with {} member(s)",
            team.name,
            team.id,
            team.members.len()
        )))
    }
}

/// Team verbs: send a message through the steward, or broadcast to members.
pub struct TeamCommand;

#[async_trait]
impl Command for TeamCommand {
    fn name(&self) -> &str {
        "team"
    }
    fn description(&self) -> &str {
        "Message a team or broadcast to its members"
    }
    fn usage(&self) -> &str {
        "/team <message|broadcast> <team-name> <text>"
    }

    async fn execute(&self, args: &str, ctx: &CommandContext) -> anyhow::Result<CommandResult> {
        let (verb, rest) = split_word(args);
        let (team_name, text) = split_word(rest);
        let Some(team) = ctx.handles.teams.find_by_name(team_name) else {
            return Ok(CommandResult::text(format!("Unknown team: {team_name}")));
        };

        match verb {
            "message" => {
                let result = ctx.handles.steward.handle(&team.id, text).await?;
                Ok(CommandResult::text(result.summary))
            }
            "broadcast" => {
                for member in &team.members {
                    ctx.handles
                        .bus
                        .publish(BusMessage::new(&ctx.user_id, &member.agent_id, text))
                        .await?;
                }
                Ok(CommandResult::text(format!(
                    "Broadcast to {} member(s) of {}",
                    team.members.len(),
                    team.name
                )))
            }
            _ => Ok(CommandResult::text(format!("Usage: {}", self.usage()))),
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
