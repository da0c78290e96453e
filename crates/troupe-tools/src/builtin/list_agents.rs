// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::port::EnginePort;
use crate::tool::Tool;

/// Roster dump: which agents exist and how to address them.
pub struct ListAgentsTool {
    port: Arc<dyn EnginePort>,
}

impl ListAgentsTool {
    pub fn new(port: Arc<dyn EnginePort>) -> Self {
        Self { port }
    }
}

#[async_trait]
impl Tool for ListAgentsTool {
    fn name(&self) -> &str {
        "list_agents"
    }

    fn description(&self) -> &str {
        "List all registered agents as (id, name) pairs."
    }

    fn parameters_schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _args: &str) -> anyhow::Result<String> {
        let agents: Vec<Value> = self
            .port
            .agent_roster()
            .into_iter()
            .map(|(id, name)| json!({ "id": id, "name": name }))
            .collect();
        Ok(json!({ "agents": agents }).to_string())
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
