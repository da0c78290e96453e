// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod create_schedule;
mod list_agents;
mod send_message;

pub use create_schedule::CreateScheduleTool;
pub use list_agents::ListAgentsTool;
pub use send_message::SendAgentMessageTool;
