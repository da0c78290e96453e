// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use futures::stream;

use crate::provider::ChatStream;
use crate::types::{
    ChatChunk, ChatRequest, ChatResponse, Role, ToolCallData, FINISH_TOOL_CALLS,
};

/// Deterministic mock provider for tests: echoes the last user message.
pub struct MockProvider {
    id: String,
}

impl MockProvider {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

#[async_trait]
impl crate::LlmProvider for MockProvider {
    fn name(&self) -> &str {
        &self.id
    }

    async fn chat(&self, req: ChatRequest) -> anyhow::Result<ChatResponse> {
        let reply = req
            .messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or("[no input]");
        Ok(ChatResponse::text(format!("MOCK: {reply}")))
    }

    async fn chat_stream(&self, req: ChatRequest) -> anyhow::Result<ChatStream> {
        let resp = self.chat(req).await?;
        Ok(single_chunk_stream(resp.content))
    }

    async fn list_models(&self) -> anyhow::Result<Vec<String>> {
        Ok(vec!["mock-model".into()])
    }
}

/// One scripted step: either a full response or an error message.
pub enum Script {
    Reply(ChatResponse),
    Fail(String),
}

/// Pre-scripted provider.  Each `chat` call pops the next script from the
/// front of the queue, so tests can specify exact multi-round sequences,
/// including tool-call rounds, without network access.  When the queue runs
/// dry the last-resort behaviour repeats the final configured step.
pub struct ScriptedProvider {
    id: String,
    scripts: Mutex<Vec<Script>>,
    /// Repeated once the queue is exhausted.
    exhausted: Script,
    calls: AtomicUsize,
    /// The last `ChatRequest` seen, for request-shape assertions.
    pub last_request: Mutex<Option<ChatRequest>>,
}

impl ScriptedProvider {
    pub fn new(id: impl Into<String>, scripts: Vec<Script>) -> Self {
        Self {
            id: id.into(),
            scripts: Mutex::new(scripts),
            exhausted: Script::Reply(ChatResponse::text("[no more scripts]")),
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    /// Provider that always returns the same text reply.
    pub fn always_text(id: impl Into<String>, reply: impl Into<String>) -> Self {
        let mut p = Self::new(id, vec![]);
        p.exhausted = Script::Reply(ChatResponse::text(reply.into()));
        p
    }

    /// Provider that fails every chat call.
    pub fn always_failing(id: impl Into<String>, message: impl Into<String>) -> Self {
        let mut p = Self::new(id, vec![]);
        p.exhausted = Script::Fail(message.into());
        p
    }

    /// Provider that emits one tool call, then a final text reply.
    pub fn tool_then_text(
        id: impl Into<String>,
        call_id: impl Into<String>,
        tool: impl Into<String>,
        args_json: impl Into<String>,
        final_text: impl Into<String>,
    ) -> Self {
        Self::new(
            id,
            vec![
                Script::Reply(tool_call_response(call_id, tool, args_json)),
                Script::Reply(ChatResponse::text(final_text.into())),
            ],
        )
    }

    /// Provider that requests the same tool call on every round, never
    /// finishing.  Used to exercise the loop cap.
    pub fn always_tool_calls(
        id: impl Into<String>,
        tool: impl Into<String>,
        args_json: impl Into<String>,
    ) -> Self {
        let mut p = Self::new(id, vec![]);
        p.exhausted = Script::Reply(tool_call_response("loop", tool, args_json));
        p
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

/// A response whose only payload is a single tool call.
pub fn tool_call_response(
    call_id: impl Into<String>,
    tool: impl Into<String>,
    args_json: impl Into<String>,
) -> ChatResponse {
    ChatResponse {
        content: String::new(),
        tool_calls: vec![ToolCallData::new(call_id, tool, args_json)],
        finish_reason: FINISH_TOOL_CALLS.into(),
        usage: Default::default(),
    }
}

#[async_trait]
impl crate::LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        &self.id
    }

    async fn chat(&self, req: ChatRequest) -> anyhow::Result<ChatResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(req);
        let step = {
            let mut scripts = self.scripts.lock().unwrap();
            if scripts.is_empty() {
                None
            } else {
                Some(scripts.remove(0))
            }
        };
        match step.as_ref().unwrap_or(&self.exhausted) {
            Script::Reply(resp) => Ok(resp.clone()),
            Script::Fail(msg) => Err(anyhow::anyhow!("{msg}")),
        }
    }

    async fn chat_stream(&self, req: ChatRequest) -> anyhow::Result<ChatStream> {
        let resp = self.chat(req).await?;
        Ok(single_chunk_stream(resp.content))
    }

    async fn list_models(&self) -> anyhow::Result<Vec<String>> {
        Ok(vec!["scripted-model".into()])
    }
}

fn single_chunk_stream(content: String) -> ChatStream {
    Box::pin(stream::iter(vec![
        Ok(ChatChunk {
            delta: content,
            finish_reason: None,
        }),
        Ok(ChatChunk {
            delta: String::new(),
            finish_reason: Some("stop".into()),
        }),
    ]))
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
