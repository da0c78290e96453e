// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::port::{EnginePort, PendingSchedule};
use crate::tool::Tool;

/// Lets an agent schedule future activity for itself.
///
/// The schedule is buffered in the engine and handed to the world schedule
/// manager on the next heartbeat tick; nothing runs at call time.
pub struct CreateScheduleTool {
    port: Arc<dyn EnginePort>,
}

impl CreateScheduleTool {
    pub fn new(port: Arc<dyn EnginePort>) -> Self {
        Self { port }
    }
}

#[derive(Deserialize)]
struct Args {
    agent_id: String,
    title: String,
    #[serde(default = "default_type")]
    schedule_type: String,
    start_time: DateTime<Utc>,
    #[serde(default = "default_duration")]
    duration_minutes: u32,
    #[serde(default)]
    recurring: bool,
}

fn default_type() -> String {
    "task".into()
}
fn default_duration() -> u32 {
    30
}

#[async_trait]
impl Tool for CreateScheduleTool {
    fn name(&self) -> &str {
        "create_schedule"
    }

    fn description(&self) -> &str {
        "Schedule a future activity for an agent. The schedule activates at \
         start_time; it does not run immediately."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "agent_id": { "type": "string", "description": "Agent the schedule belongs to" },
                "title": { "type": "string", "description": "Short activity title" },
                "schedule_type": { "type": "string", "description": "Activity type, e.g. task, meeting, rest" },
                "start_time": { "type": "string", "format": "date-time", "description": "RFC 3339 start time" },
                "duration_minutes": { "type": "integer", "description": "Duration in minutes (default 30)" },
                "recurring": { "type": "boolean", "description": "Repeat daily at the same time" }
            },
            "required": ["agent_id", "title", "start_time"]
        })
    }

    async fn execute(&self, args: &str) -> anyhow::Result<String> {
        let args: Args = serde_json::from_str(args)?;
        debug!(agent_id = %args.agent_id, title = %args.title, "buffering schedule");
        self.port.add_pending_schedule(PendingSchedule {
            agent_id: args.agent_id.clone(),
            title: args.title.clone(),
            schedule_type: args.schedule_type,
            start_time: args.start_time,
            duration_minutes: args.duration_minutes,
            recurring: args.recurring,
        });
        Ok(json!({
            "status": "scheduled",
            "agent_id": args.agent_id,
            "title": args.title,
        })
        .to_string())
    }
}
