// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Tool definitions, the registry the agent loop executes against, and the
//! builtin tools that reach back into the engine through [`EnginePort`].

pub mod builtin;
pub mod port;
pub mod registry;
pub mod tool;

pub use builtin::{CreateScheduleTool, ListAgentsTool, SendAgentMessageTool};
pub use port::{EnginePort, PendingSchedule};
pub use registry::ToolRegistry;
pub use tool::Tool;
