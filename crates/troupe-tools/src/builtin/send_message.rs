// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::port::EnginePort;
use crate::tool::Tool;

/// Lets one agent send a message to another and read the reply.
///
/// The recipient runs a full cognitive execution; the reply is returned as
/// the tool result so the calling agent can incorporate it.
pub struct SendAgentMessageTool {
    port: Arc<dyn EnginePort>,
}

impl SendAgentMessageTool {
    pub fn new(port: Arc<dyn EnginePort>) -> Self {
        Self { port }
    }
}

#[derive(Deserialize)]
struct Args {
    agent_id: String,
    message: String,
}

#[async_trait]
impl Tool for SendAgentMessageTool {
    fn name(&self) -> &str {
        "send_agent_message"
    }

    fn description(&self) -> &str {
        "Send a message to another agent and return its reply."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "agent_id": { "type": "string", "description": "Recipient agent id" },
                "message": { "type": "string", "description": "Message text" }
            },
            "required": ["agent_id", "message"]
        })
    }

    async fn execute(&self, args: &str) -> anyhow::Result<String> {
        let args: Args = serde_json::from_str(args)?;
        let reply = self.port.execute(&args.agent_id, &args.message).await?;
        Ok(json!({ "agent_id": args.agent_id, "reply": reply }).to_string())
    }
}
