// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use troupe_tools::{Tool, ToolRegistry};

use crate::command::{Command, CommandContext, CommandResult};

/// Slash-command dispatcher.
#[derive(Default)]
pub struct CommandRegistry {
    commands: RwLock<HashMap<String, Arc<dyn Command>>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, command: impl Command + 'static) {
        self.register_arc(Arc::new(command));
    }

    pub fn register_arc(&self, command: Arc<dyn Command>) {
        self.commands
            .write()
            .unwrap()
            .insert(command.name().to_string(), command);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Command>> {
        self.commands.read().unwrap().get(name).cloned()
    }

    /// Registered commands, alphabetically by name.
    pub fn list(&self) -> Vec<Arc<dyn Command>> {
        let mut all: Vec<Arc<dyn Command>> =
            self.commands.read().unwrap().values().cloned().collect();
        all.sort_by(|a, b| a.name().cmp(b.name()));
        all
    }

    /// Parse and dispatch one slash-command input.
    ///
    /// Grammar: `/` + name + optional single space + opaque argument tail.
    /// An unknown name is answered, not errored; the user sees the reply
    /// either way.
    pub async fn dispatch(
        &self,
        input: &str,
        ctx: &CommandContext,
    ) -> anyhow::Result<CommandResult> {
        let stripped = input.strip_prefix('/').unwrap_or(input);
        let (name, args) = match stripped.split_once(' ') {
            Some((name, args)) => (name, args),
            None => (stripped, ""),
        };
        let Some(command) = self.get(name) else {
            return Ok(CommandResult::text(format!(
                "Unknown command: /{name}. Try /help."
            )));
        };
        debug!(command = %name, "dispatching slash command");
        command.execute(args, ctx).await
    }

    /// Re-register every command as an LLM tool on `tools`.
    ///
    /// Tool name: `cmd_<command>`; parameters: one string property `args`
    /// carrying the raw argument tail.  This lets the primary agent invoke
    /// any slash command from within its tool loop.
    pub fn bridge_into(&self, tools: &ToolRegistry, ctx: CommandContext) {
        for command in self.list() {
            tools.register_arc(Arc::new(CommandTool::new(command, ctx.clone())));
        }
    }
}

/// A slash command wrapped as a tool.
struct CommandTool {
    name: String,
    description: String,
    command: Arc<dyn Command>,
    ctx: CommandContext,
}

impl CommandTool {
    fn new(command: Arc<dyn Command>, ctx: CommandContext) -> Self {
        Self {
            name: format!("cmd_{}", command.name()),
            description: format!(
                "Slash command /{}: {}\nUsage: {}",
                command.name(),
                command.description(),
                command.usage(),
            ),
            command,
            ctx,
        }
    }
}

#[async_trait]
impl Tool for CommandTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "args": {
                    "type": "string",
                    "description": "Argument tail passed to the command"
                }
            }
        })
    }

    async fn execute(&self, args: &str) -> anyhow::Result<String> {
        // The model should send {"args":"..."}; a raw string still works.
        let tail = match serde_json::from_str::<Value>(args) {
            Ok(v) => v["args"].as_str().unwrap_or_default().to_string(),
            Err(_) => args.to_string(),
        };
        let result = self.command.execute(&tail, &self.ctx).await?;
        Ok(serde_json::to_string(&result)?)
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
