// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Driver for OpenAI-compatible `/chat/completions` APIs.
//!
//! Dozens of backends and gateways speak this wire format; one driver covers
//! them all.  The `path_model` flag accommodates gateways that scope routes
//! by model: when set, the model name is interpolated into the URL path
//! (`{base}/{model}/chat/completions`) and omitted from the request body.

use anyhow::{bail, Context};
use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{json, Value};
use tracing::debug;

use crate::provider::ChatStream;
use crate::types::{
    ChatChunk, ChatMessage, ChatRequest, ChatResponse, FunctionCall, Role, TokenUsage,
    ToolCallData,
};

/// Per-call HTTP timeout for LLM requests.
const LLM_TIMEOUT_SECS: u64 = 120;

pub struct OpenAiProvider {
    id: String,
    base_url: String,
    api_key: Option<String>,
    path_model: bool,
    client: reqwest::Client,
}

impl OpenAiProvider {
    pub fn new(id: impl Into<String>, base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            id: id.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            path_model: false,
            client: http_client(),
        }
    }

    /// Interpolate the model into the URL path instead of the body.
    pub fn with_path_model(mut self, enabled: bool) -> Self {
        self.path_model = enabled;
        self
    }

    fn chat_url(&self, model: &str) -> String {
        if self.path_model {
            format!("{}/{}/chat/completions", self.base_url, model)
        } else {
            format!("{}/chat/completions", self.base_url)
        }
    }

    fn authed(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => req.bearer_auth(key),
            None => req,
        }
    }

    async fn post_chat(&self, req: &ChatRequest, stream: bool) -> anyhow::Result<reqwest::Response> {
        let body = build_body(req, self.path_model, stream);
        debug!(
            provider = %self.id,
            model = %req.model,
            message_count = req.messages.len(),
            tool_count = req.tools.as_ref().map(|t| t.len()).unwrap_or(0),
            "sending chat completion request"
        );
        let resp = self
            .authed(self.client.post(self.chat_url(&req.model)).json(&body))
            .send()
            .await
            .with_context(|| format!("{} request failed", self.id))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            bail!("{} error {status}: {text}", self.id);
        }
        Ok(resp)
    }
}

pub(crate) fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(LLM_TIMEOUT_SECS))
        .build()
        .expect("reqwest client")
}

/// Serialize a [`ChatRequest`] into the `/chat/completions` body.
///
/// Exposed for wire-format tests; drivers call it internally.
pub fn build_body(req: &ChatRequest, path_model: bool, stream: bool) -> Value {
    let messages: Vec<Value> = req.messages.iter().map(build_message).collect();

    let mut body = json!({
        "messages": messages,
        "stream": stream,
    });
    if !path_model {
        body["model"] = json!(req.model);
    }
    if let Some(t) = req.temperature {
        body["temperature"] = json!(t);
    }
    if let Some(p) = req.top_p {
        body["top_p"] = json!(p);
    }
    if let Some(m) = req.max_tokens {
        body["max_tokens"] = json!(m);
    }
    if let Some(stop) = &req.stop {
        body["stop"] = json!(stop);
    }
    if let Some(tools) = &req.tools {
        if !tools.is_empty() {
            let tools: Vec<Value> = tools
                .iter()
                .map(|t| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": t.name,
                            "description": t.description,
                            "parameters": t.parameters,
                        }
                    })
                })
                .collect();
            body["tools"] = json!(tools);
            if let Some(choice) = req.tool_choice {
                body["tool_choice"] = serde_json::to_value(choice).unwrap_or(json!("auto"));
            }
        }
    }
    body
}

fn build_message(m: &ChatMessage) -> Value {
    let role = match m.role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    };
    let mut msg = json!({ "role": role, "content": m.content });
    if let Some(calls) = &m.tool_calls {
        msg["tool_calls"] = json!(calls
            .iter()
            .map(|c| {
                json!({
                    "id": c.id,
                    "type": "function",
                    "function": { "name": c.function.name, "arguments": c.function.arguments },
                })
            })
            .collect::<Vec<_>>());
    }
    if let Some(id) = &m.tool_call_id {
        msg["tool_call_id"] = json!(id);
    }
    msg
}

/// Parse the non-streaming `/chat/completions` response body.
pub fn parse_response(body: &Value) -> anyhow::Result<ChatResponse> {
    let choice = body["choices"]
        .get(0)
        .context("response carried no choices")?;
    let message = &choice["message"];

    let mut tool_calls = Vec::new();
    if let Some(calls) = message["tool_calls"].as_array() {
        for c in calls {
            tool_calls.push(ToolCallData {
                id: c["id"].as_str().unwrap_or_default().to_string(),
                call_type: c["type"].as_str().unwrap_or("function").to_string(),
                function: FunctionCall {
                    name: c["function"]["name"].as_str().unwrap_or_default().to_string(),
                    arguments: c["function"]["arguments"]
                        .as_str()
                        .unwrap_or("{}")
                        .to_string(),
                },
            });
        }
    }

    Ok(ChatResponse {
        content: message["content"].as_str().unwrap_or_default().to_string(),
        tool_calls,
        finish_reason: choice["finish_reason"].as_str().unwrap_or_default().to_string(),
        usage: TokenUsage {
            prompt_tokens: body["usage"]["prompt_tokens"].as_u64().unwrap_or(0) as u32,
            completion_tokens: body["usage"]["completion_tokens"].as_u64().unwrap_or(0) as u32,
            total_tokens: body["usage"]["total_tokens"].as_u64().unwrap_or(0) as u32,
        },
    })
}

#[async_trait]
impl crate::LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        &self.id
    }

    async fn chat(&self, req: ChatRequest) -> anyhow::Result<ChatResponse> {
        let resp = self.post_chat(&req, false).await?;
        let body: Value = resp.json().await.context("decoding chat response")?;
        parse_response(&body)
    }

    async fn chat_stream(&self, req: ChatRequest) -> anyhow::Result<ChatStream> {
        let resp = self.post_chat(&req, true).await?;
        let byte_stream = resp.bytes_stream();
        // SSE events can be split across TCP chunks; carry a line buffer
        // forward and emit chunks only for complete lines.
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

    async fn list_models(&self) -> anyhow::Result<Vec<String>> {
        let resp = self
            .authed(self.client.get(format!("{}/models", self.base_url)))
            .send()
            .await
            .with_context(|| format!("{} models request failed", self.id))?;
        if !resp.status().is_success() {
            bail!("{} models error {}", self.id, resp.status());
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

/// Drain complete SSE lines from `buf`, returning parsed text chunks.
fn drain_sse_lines(buf: &mut String) -> Vec<anyhow::Result<ChatChunk>> {
    let mut out = Vec::new();
    while let Some(nl) = buf.find('\n') {
        let line: String = buf.drain(..=nl).collect();
        let line = line.trim();
        let Some(data) = line.strip_prefix("data: ") else {
            continue;
        };
        if data == "[DONE]" {
            continue;
        }
        let Ok(v) = serde_json::from_str::<Value>(data) else {
            continue;
        };
        let delta = v["choices"][0]["delta"]["content"]
            .as_str()
            .unwrap_or_default()
            .to_string();
        let finish = v["choices"][0]["finish_reason"]
            .as_str()
            .map(str::to_string);
        if !delta.is_empty() || finish.is_some() {
            out.push(Ok(ChatChunk {
                delta,
                finish_reason: finish,
            }));
        }
    }
    out
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
