// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Slash commands: out-of-band directives parsed before any LLM invocation.
//!
//! The registry dispatches `/name args` input, and the bridge re-exposes
//! every command as an LLM tool (`cmd_<name>`) so the primary agent can run
//! slash commands from inside its tool loop.

pub mod builtin;
pub mod command;
pub mod registry;

pub use command::{Command, CommandContext, CommandResult, Handles};
pub use registry::CommandRegistry;
