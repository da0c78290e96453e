// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use serde::{Deserialize, Serialize};

// ─── Message types ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A single message in a conversation sent to (or stored from) a provider.
///
/// Tool interactions use two shapes: the assistant message that *requests*
/// calls carries `tool_calls`, and each result is a separate `Role::Tool`
/// message whose `tool_call_id` binds it back to the originating call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallData>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: text.into(),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: text.into(),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: text.into(),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// The assistant turn that requested tool invocations.
    pub fn assistant_with_tool_calls(text: impl Into<String>, calls: Vec<ToolCallData>) -> Self {
        Self {
            role: Role::Assistant,
            content: text.into(),
            tool_calls: Some(calls),
            tool_call_id: None,
        }
    }

    /// A tool result bound to its originating call id.
    pub fn tool_result(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            tool_calls: None,
            tool_call_id: Some(call_id.into()),
        }
    }
}

/// One function call requested by the model.
///
/// `arguments` is a JSON-*encoded string*, not an object.  The tool handler
/// owns parsing it, and malformed JSON must surface as a recoverable tool
/// failure rather than a transport error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    pub arguments: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallData {
    pub id: String,
    #[serde(rename = "type", default = "function_type")]
    pub call_type: String,
    pub function: FunctionCall,
}

fn function_type() -> String {
    "function".into()
}

impl ToolCallData {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            call_type: function_type(),
            function: FunctionCall {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }
}

/// A tool schema presented to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema of the parameters object.
    pub parameters: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolChoice {
    Auto,
    None,
    Required,
}

// ─── Request / response ───────────────────────────────────────────────────────

/// Request handed to a provider driver.
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub max_tokens: Option<u32>,
    pub stop: Option<Vec<String>>,
    pub tools: Option<Vec<ToolDefinition>>,
    pub tool_choice: Option<ToolChoice>,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            ..Default::default()
        }
    }
}

/// Token accounting for one completion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl TokenUsage {
    pub fn add(&mut self, other: TokenUsage) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.total_tokens += other.total_tokens;
    }
}

/// The finish reason providers report when the model wants tool execution.
pub const FINISH_TOOL_CALLS: &str = "tool_calls";

/// One completed (non-streaming) model turn.
#[derive(Debug, Clone, Default)]
pub struct ChatResponse {
    pub content: String,
    pub tool_calls: Vec<ToolCallData>,
    pub finish_reason: String,
    pub usage: TokenUsage,
}

impl ChatResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tool_calls: Vec::new(),
            finish_reason: "stop".into(),
            usage: TokenUsage::default(),
        }
    }

    /// True when the loop should execute tools and call the model again.
    pub fn wants_tools(&self) -> bool {
        !self.tool_calls.is_empty() && self.finish_reason == FINISH_TOOL_CALLS
    }
}

/// One streamed fragment of a model turn.
#[derive(Debug, Clone)]
pub struct ChatChunk {
    pub delta: String,
    pub finish_reason: Option<String>,
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_set_roles() {
        assert_eq!(ChatMessage::system("s").role, Role::System);
        assert_eq!(ChatMessage::user("u").role, Role::User);
        assert_eq!(ChatMessage::assistant("a").role, Role::Assistant);
        assert_eq!(ChatMessage::tool_result("id", "r").role, Role::Tool);
    }

    #[test]
    fn tool_result_binds_call_id() {
        let m = ChatMessage::tool_result("call-7", "out");
        assert_eq!(m.tool_call_id.as_deref(), Some("call-7"));
        assert!(m.tool_calls.is_none());
    }

    #[test]
    fn assistant_with_tool_calls_carries_calls() {
        let m = ChatMessage::assistant_with_tool_calls(
            "",
            vec![ToolCallData::new("1", "echo", r#"{"x":1}"#)],
        );
        let calls = m.tool_calls.unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].function.name, "echo");
        assert_eq!(calls[0].call_type, "function");
    }

    #[test]
    fn wants_tools_requires_both_signals() {
        let mut r = ChatResponse::text("done");
        assert!(!r.wants_tools());

        r.tool_calls = vec![ToolCallData::new("1", "f", "{}")];
        // finish_reason is still "stop", so the loop must exit.
        assert!(!r.wants_tools());

        r.finish_reason = FINISH_TOOL_CALLS.into();
        assert!(r.wants_tools());
    }

    #[test]
    fn usage_accumulates() {
        let mut total = TokenUsage::default();
        total.add(TokenUsage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        });
        total.add(TokenUsage {
            prompt_tokens: 1,
            completion_tokens: 2,
            total_tokens: 3,
        });
        assert_eq!(total.total_tokens, 18);
    }

    #[test]
    fn message_serialises_without_empty_optionals() {
        let json = serde_json::to_string(&ChatMessage::user("hi")).unwrap();
        assert!(!json.contains("tool_calls"));
        assert!(!json.contains("tool_call_id"));
    }

    #[test]
    fn tool_call_round_trips_through_json() {
        let tc = ToolCallData::new("id-1", "lookup", r#"{"q":"x"}"#);
        let json = serde_json::to_string(&tc).unwrap();
        assert!(json.contains(r#""type":"function""#));
        let back: ToolCallData = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, "id-1");
        assert_eq!(back.function.arguments, r#"{"q":"x"}"#);
    }

    #[test]
    fn role_serialises_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Assistant).unwrap(), "\"assistant\"");
        assert_eq!(serde_json::to_string(&ToolChoice::Auto).unwrap(), "\"auto\"");
    }
}
