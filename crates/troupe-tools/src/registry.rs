// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde_json::json;
use tracing::warn;

use troupe_model::ToolDefinition;

use crate::tool::Tool;

#[derive(Default)]
struct Inner {
    tools: HashMap<String, Arc<dyn Tool>>,
    order: Vec<String>,
}

/// Central registry holding all available tools.
///
/// Registration order is preserved: the model sees tool definitions in the
/// order they were registered, and `filter` keeps that order for subsets.
/// Re-registering a name replaces the handler without changing its position.
///
/// Reads happen on every message while writes are confined to boot and admin
/// operations, so the maps sit behind a read-write lock; lock scopes never
/// span an await point.
#[derive(Default)]
pub struct ToolRegistry {
    inner: RwLock<Inner>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, tool: impl Tool + 'static) {
        self.register_arc(Arc::new(tool));
    }

    pub fn register_arc(&self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        let mut inner = self.inner.write().unwrap();
        if inner.tools.insert(name.clone(), tool).is_none() {
            inner.order.push(name);
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.inner.read().unwrap().tools.get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.inner.read().unwrap().order.clone()
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Definitions for every registered tool, in registration order.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let inner = self.inner.read().unwrap();
        inner
            .order
            .iter()
            .filter_map(|name| inner.tools.get(name))
            .map(definition_of)
            .collect()
    }

    /// Definitions for `allowed` names only, original order preserved.
    /// Names not present in the registry are silently omitted.
    pub fn filter(&self, allowed: &[String]) -> Vec<ToolDefinition> {
        let inner = self.inner.read().unwrap();
        inner
            .order
            .iter()
            .filter(|name| allowed.iter().any(|a| a == *name))
            .filter_map(|name| inner.tools.get(name))
            .map(definition_of)
            .collect()
    }

    /// Execute a tool by name with a JSON-encoded argument string.
    ///
    /// Always returns a JSON string.  Unknown names and handler failures
    /// become `{"error":"..."}` results rather than Rust-level errors: the
    /// model must be able to observe the failure and recover in-loop.
    pub async fn execute(&self, name: &str, args: &str) -> String {
        let tool = self.get(name);
        let Some(tool) = tool else {
            return error_result(format!("unknown tool: {name}"));
        };
        match tool.execute(args).await {
            Ok(result) => result,
            Err(e) => {
                warn!(tool = %name, error = %e, "tool execution failed");
                error_result(e.to_string())
            }
        }
    }
}

fn definition_of(tool: &Arc<dyn Tool>) -> ToolDefinition {
    ToolDefinition {
        name: tool.name().to_string(),
        description: tool.description().to_string(),
        parameters: tool.parameters_schema(),
    }
}

/// Render an error as the JSON result shape tools return on failure.
pub fn error_result(message: impl AsRef<str>) -> String {
    json!({ "error": message.as_ref() }).to_string()
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use serde_json::{json, Value};

    use super::*;

    struct EchoTool {
        name: &'static str,
    }

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            self.name
        }
        fn description(&self) -> &str {
            "echoes its input"
        }
        fn parameters_schema(&self) -> Value {
            json!({ "type": "object" })
        }
        async fn execute(&self, args: &str) -> anyhow::Result<String> {
            Ok(format!(r#"{{"echo":{args}}}"#))
        }
    }

    struct FailingTool;

    #[async_trait]
    impl Tool for FailingTool {
        fn name(&self) -> &str {
            "broken"
        }
        fn description(&self) -> &str {
            "always fails"
        }
        fn parameters_schema(&self) -> Value {
            json!({ "type": "object" })
        }
        async fn execute(&self, _args: &str) -> anyhow::Result<String> {
            anyhow::bail!("handler exploded")
        }
    }

    #[test]
    fn definitions_preserve_registration_order() {
        let reg = ToolRegistry::new();
        reg.register(EchoTool { name: "zeta" });
        reg.register(EchoTool { name: "alpha" });
        reg.register(EchoTool { name: "mid" });
        let names: Vec<String> = reg.definitions().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn reregistration_replaces_without_reordering() {
        let reg = ToolRegistry::new();
        reg.register(EchoTool { name: "a" });
        reg.register(EchoTool { name: "b" });
        reg.register(EchoTool { name: "a" });
        assert_eq!(reg.names(), vec!["a", "b"]);
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn filter_keeps_original_order_and_drops_unknowns() {
        let reg = ToolRegistry::new();
        reg.register(EchoTool { name: "one" });
        reg.register(EchoTool { name: "two" });
        reg.register(EchoTool { name: "three" });
        let allowed = vec!["three".to_string(), "one".to_string(), "ghost".to_string()];
        let names: Vec<String> = reg.filter(&allowed).into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["one", "three"]);
    }

    #[tokio::test]
    async fn execute_unknown_returns_error_json() {
        let reg = ToolRegistry::new();
        let out = reg.execute("missing", "{}").await;
        let v: Value = serde_json::from_str(&out).unwrap();
        assert!(v["error"].as_str().unwrap().contains("unknown tool"));
    }

    #[tokio::test]
    async fn execute_failure_returns_error_json() {
        let reg = ToolRegistry::new();
        reg.register(FailingTool);
        let out = reg.execute("broken", "{}").await;
        let v: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(v["error"], "handler exploded");
    }

    #[tokio::test]
    async fn execute_success_passes_result_through() {
        let reg = ToolRegistry::new();
        reg.register(EchoTool { name: "echo" });
        let out = reg.execute("echo", r#"{"x":"hi"}"#).await;
        let v: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(v["echo"]["x"], "hi");
    }
}
