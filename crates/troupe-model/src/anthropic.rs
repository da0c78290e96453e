// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Driver for the Anthropic `/v1/messages` API.
//!
//! The wire format differs from OpenAI in three ways the mapping below has to
//! absorb: system messages live in a top-level `system` field, tool calls are
//! `tool_use` content blocks on the assistant turn, and tool results are
//! `tool_result` blocks inside a *user* message.

use anyhow::{bail, Context};
use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{json, Value};
use tracing::debug;

use crate::openai::http_client;
use crate::provider::ChatStream;
use crate::types::{
    ChatChunk, ChatMessage, ChatRequest, ChatResponse, FunctionCall, Role, TokenUsage,
    ToolCallData, ToolChoice, FINISH_TOOL_CALLS,
};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_MAX_TOKENS: u32 = 4096;

pub struct AnthropicProvider {
    id: String,
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl AnthropicProvider {
    pub fn new(id: impl Into<String>, base_url: Option<String>, api_key: Option<String>) -> Self {
        Self {
            id: id.into(),
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.into())
                .trim_end_matches('/')
                .to_string(),
            api_key,
            client: http_client(),
        }
    }

    async fn post_messages(
        &self,
        req: &ChatRequest,
        stream: bool,
    ) -> anyhow::Result<reqwest::Response> {
        let key = self
            .api_key
            .as_deref()
            .context("Anthropic API key not set")?;
        let body = build_body(req, stream);
        debug!(
            provider = %self.id,
            model = %req.model,
            message_count = req.messages.len(),
            "sending anthropic request"
        );
        let resp = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .context("Anthropic request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            bail!("Anthropic error {status}: {text}");
        }
        Ok(resp)
    }
}

/// Serialize a [`ChatRequest`] into the `/v1/messages` body.
///
/// Exposed for wire-format tests; the driver calls it internally.
pub fn build_body(req: &ChatRequest, stream: bool) -> Value {
    let (system, messages) = split_messages(&req.messages);

    let mut body = json!({
        "model": req.model,
        "messages": messages,
        "max_tokens": req.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        "stream": stream,
    });
    if !system.is_empty() {
        body["system"] = json!(system);
    }
    if let Some(t) = req.temperature {
        body["temperature"] = json!(t);
    }
    if let Some(p) = req.top_p {
        body["top_p"] = json!(p);
    }
    if let Some(stop) = &req.stop {
        body["stop_sequences"] = json!(stop);
    }
    if let Some(tools) = &req.tools {
        if !tools.is_empty() {
            body["tools"] = json!(tools
                .iter()
                .map(|t| {
                    json!({
                        "name": t.name,
                        "description": t.description,
                        "input_schema": t.parameters,
                    })
                })
                .collect::<Vec<_>>());
            if let Some(choice) = req.tool_choice {
                body["tool_choice"] = match choice {
                    ToolChoice::Auto => json!({ "type": "auto" }),
                    ToolChoice::None => json!({ "type": "none" }),
                    ToolChoice::Required => json!({ "type": "any" }),
                };
            }
        }
    }
    body
}

/// Split system messages into the `system` field and convert the rest.
fn split_messages(messages: &[ChatMessage]) -> (String, Vec<Value>) {
    let mut system_parts: Vec<&str> = Vec::new();
    let mut converted: Vec<Value> = Vec::new();

    for m in messages {
        match m.role {
            Role::System => system_parts.push(&m.content),
            Role::User => converted.push(json!({ "role": "user", "content": m.content })),
            Role::Assistant => {
                let mut blocks: Vec<Value> = Vec::new();
                if !m.content.is_empty() {
                    blocks.push(json!({ "type": "text", "text": m.content }));
                }
                if let Some(calls) = &m.tool_calls {
                    for c in calls {
                        // tool_use input must be an object; an unparseable
                        // arguments string degrades to {}.
                        let input: Value = serde_json::from_str(&c.function.arguments)
                            .unwrap_or_else(|_| json!({}));
                        blocks.push(json!({
                            "type": "tool_use",
                            "id": c.id,
                            "name": c.function.name,
                            "input": input,
                        }));
                    }
                }
                converted.push(json!({ "role": "assistant", "content": blocks }));
            }
            Role::Tool => {
                converted.push(json!({
                    "role": "user",
                    "content": [{
                        "type": "tool_result",
                        "tool_use_id": m.tool_call_id.clone().unwrap_or_default(),
                        "content": m.content,
                    }]
                }));
            }
        }
    }
    (system_parts.join("\n\n"), converted)
}

/// Parse the non-streaming `/v1/messages` response body.
pub fn parse_response(body: &Value) -> anyhow::Result<ChatResponse> {
    let blocks = body["content"]
        .as_array()
        .context("response carried no content blocks")?;

    let mut content = String::new();
    let mut tool_calls = Vec::new();
    for block in blocks {
        match block["type"].as_str().unwrap_or_default() {
            "text" => content.push_str(block["text"].as_str().unwrap_or_default()),
            "tool_use" => tool_calls.push(ToolCallData {
                id: block["id"].as_str().unwrap_or_default().to_string(),
                call_type: "function".into(),
                function: FunctionCall {
                    name: block["name"].as_str().unwrap_or_default().to_string(),
                    arguments: block["input"].to_string(),
                },
            }),
            _ => {}
        }
    }

    let finish_reason = match body["stop_reason"].as_str().unwrap_or_default() {
        "tool_use" => FINISH_TOOL_CALLS.to_string(),
        "max_tokens" => "length".to_string(),
        // end_turn, stop_sequence, and anything unrecognized terminate the loop.
        _ => "stop".to_string(),
    };

    let prompt = body["usage"]["input_tokens"].as_u64().unwrap_or(0) as u32;
    let completion = body["usage"]["output_tokens"].as_u64().unwrap_or(0) as u32;
    Ok(ChatResponse {
        content,
        tool_calls,
        finish_reason,
        usage: TokenUsage {
            prompt_tokens: prompt,
            completion_tokens: completion,
            total_tokens: prompt + completion,
        },
    })
}

#[async_trait]
impl crate::LlmProvider for AnthropicProvider {
    fn name(&self) -> &str {
        &self.id
    }

    async fn chat(&self, req: ChatRequest) -> anyhow::Result<ChatResponse> {
        let resp = self.post_messages(&req, false).await?;
        let body: Value = resp.json().await.context("decoding anthropic response")?;
        parse_response(&body)
    }

    async fn chat_stream(&self, req: ChatRequest) -> anyhow::Result<ChatStream> {
        let resp = self.post_messages(&req, true).await?;
        let byte_stream = resp.bytes_stream();
        let event_stream = byte_stream
            .scan(String::new(), |buf, chunk| {
                let chunks: Vec<anyhow::Result<ChatChunk>> = match chunk {
                    Ok(b) => {
                        buf.push_str(&String::from_utf8_lossy(&b));
                        drain_sse_lines(buf)
                    }
                    Err(e) => vec![Err(anyhow::anyhow!(e))],
                };
                std::future::ready(Some(chunks))
            })
            .flat_map(futures::stream::iter);
        Ok(Box::pin(event_stream))
    }

    /// Anthropic exposes no public model listing with useful metadata;
    /// the health probe hits `/v1/models` which suffices for liveness.
    async fn list_models(&self) -> anyhow::Result<Vec<String>> {
        let key = self
            .api_key
            .as_deref()
            .context("Anthropic API key not set")?;
        let resp = self
            .client
            .get(format!("{}/v1/models", self.base_url))
            .header("x-api-key", key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .send()
            .await
            .context("Anthropic models request failed")?;
        if !resp.status().is_success() {
            bail!("Anthropic models error {}", resp.status());
        }
        let body: Value = resp.json().await.context("decoding models response")?;
        let mut ids: Vec<String> = body["data"]
            .as_array()
            .map(|data| {
                data.iter()
                    .filter_map(|m| m["id"].as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();
        ids.sort();
        Ok(ids)
    }
}

/// Drain complete SSE lines, emitting text deltas from `content_block_delta`
/// events and a finish marker from `message_delta`.
fn drain_sse_lines(buf: &mut String) -> Vec<anyhow::Result<ChatChunk>> {
    let mut out = Vec::new();
    while let Some(nl) = buf.find('\n') {
        let line: String = buf.drain(..=nl).collect();
        let line = line.trim();
        let Some(data) = line.strip_prefix("data: ") else {
            continue;
        };
        let Ok(v) = serde_json::from_str::<Value>(data) else {
            continue;
        };
        match v["type"].as_str().unwrap_or_default() {
            "content_block_delta" => {
                let delta = v["delta"]["text"].as_str().unwrap_or_default().to_string();
                if !delta.is_empty() {
                    out.push(Ok(ChatChunk {
                        delta,
                        finish_reason: None,
                    }));
                }
            }
            "message_delta" => {
                if let Some(reason) = v["delta"]["stop_reason"].as_str() {
                    out.push(Ok(ChatChunk {
                        delta: String::new(),
                        finish_reason: Some(reason.to_string()),
                    }));
                }
            }
            _ => {}
        }
    }
    out
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChatMessage;
    use serde_json::json;

    #[test]
    fn system_messages_move_to_system_field() {
        let req = ChatRequest::new(
            "claude-x",
            vec![
                ChatMessage::system("prompt one"),
                ChatMessage::system("prompt two"),
                ChatMessage::user("hi"),
            ],
        );
        let body = build_body(&req, false);
        assert_eq!(body["system"], json!("prompt one\n\nprompt two"));
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn tool_calls_become_tool_use_blocks() {
        let req = ChatRequest::new(
            "claude-x",
            vec![
                ChatMessage::user("go"),
                ChatMessage::assistant_with_tool_calls(
                    "",
                    vec![ToolCallData::new("tc1", "echo", r#"{"x":1}"#)],
                ),
                ChatMessage::tool_result("tc1", "1"),
            ],
        );
        let body = build_body(&req, false);
        let msgs = body["messages"].as_array().unwrap();
        assert_eq!(msgs[1]["content"][0]["type"], "tool_use");
        assert_eq!(msgs[1]["content"][0]["input"], json!({"x": 1}));
        assert_eq!(msgs[2]["role"], "user");
        assert_eq!(msgs[2]["content"][0]["type"], "tool_result");
        assert_eq!(msgs[2]["content"][0]["tool_use_id"], "tc1");
    }

    #[test]
    fn parse_response_maps_tool_use_to_tool_calls() {
        let body = json!({
            "content": [
                { "type": "text", "text": "checking" },
                { "type": "tool_use", "id": "tu1", "name": "lookup", "input": {"q": "x"} }
            ],
            "stop_reason": "tool_use",
            "usage": { "input_tokens": 7, "output_tokens": 2 }
        });
        let resp = parse_response(&body).unwrap();
        assert_eq!(resp.content, "checking");
        assert_eq!(resp.tool_calls.len(), 1);
        assert_eq!(resp.tool_calls[0].function.name, "lookup");
        assert_eq!(resp.finish_reason, FINISH_TOOL_CALLS);
        assert_eq!(resp.usage.total_tokens, 9);
    }

    #[test]
    fn end_turn_maps_to_stop() {
        let body = json!({
            "content": [{ "type": "text", "text": "done" }],
            "stop_reason": "end_turn",
            "usage": {}
        });
        let resp = parse_response(&body).unwrap();
        assert_eq!(resp.finish_reason, "stop");
        assert!(!resp.wants_tools());
    }

    #[test]
    fn tool_choice_required_maps_to_any() {
        let mut req = ChatRequest::new("m", vec![ChatMessage::user("x")]);
        req.tools = Some(vec![crate::ToolDefinition {
            name: "t".into(),
            description: "d".into(),
            parameters: json!({"type": "object"}),
        }]);
        req.tool_choice = Some(ToolChoice::Required);
        let body = build_body(&req, false);
        assert_eq!(body["tool_choice"]["type"], "any");
    }
}
