// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use async_trait::async_trait;
use serde_json::Value;

/// Trait every builtin and bridged tool implements.
///
/// Both sides of `execute` are JSON strings: the model emits a JSON-encoded
/// argument string and expects a JSON result it can read in the next turn.
/// Handlers return `Err` for their own failures; the registry converts those
/// into a `{"error":"..."}` result so the model can observe and recover.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    /// JSON Schema of the parameters object.
    fn parameters_schema(&self) -> Value;
    async fn execute(&self, args: &str) -> anyhow::Result<String>;
}
