// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! The agent engine: owns the agent registry and drives the bounded
//! tool-calling loop against the provider router.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::oneshot;
use tracing::{debug, warn};
use uuid::Uuid;

use troupe_model::{
    ChatMessage, ChatRequest, ChatResponse, ProviderRouter, TokenUsage, ToolChoice,
};
use troupe_tools::{EnginePort, PendingSchedule, ToolRegistry};

use crate::agent::{AgentRecord, AgentStatus};
use crate::chain::{StepType, ThinkingChain};
use crate::error::EngineError;
use crate::exec::AgentExecutor;
use crate::keywords::extract_keywords;
use crate::memory::{MemoryStore, RagStore, CONVERSATIONS_COLLECTION};
use crate::skills::SkillStore;

/// Hard bound on model→tool→model cycles within one execution.
pub const MAX_TOOL_ROUNDS: u32 = 5;

/// Hits requested from the retrieval collaborator per execution.
const RAG_TOP_K: usize = 5;

/// Everything one completed execution produced.
#[derive(Debug)]
pub struct ExecuteOutcome {
    pub reply: String,
    pub chain: ThinkingChain,
    pub usage: TokenUsage,
}

pub struct AgentEngine {
    agents: RwLock<HashMap<String, AgentRecord>>,
    router: Arc<ProviderRouter>,
    tools: Arc<ToolRegistry>,
    skills: Option<Arc<SkillStore>>,
    memory: Option<Arc<dyn MemoryStore>>,
    rag: Option<Arc<dyn RagStore>>,
    /// Schedules created by tool calls, drained by the heartbeat.
    pending: Mutex<Vec<PendingSchedule>>,
    /// Directory of per-agent profile markdown files.
    profile_dir: Option<PathBuf>,
}

impl AgentEngine {
    pub fn new(router: Arc<ProviderRouter>, tools: Arc<ToolRegistry>) -> Self {
        Self {
            agents: RwLock::new(HashMap::new()),
            router,
            tools,
            skills: None,
            memory: None,
            rag: None,
            pending: Mutex::new(Vec::new()),
            profile_dir: None,
        }
    }

    pub fn with_skills(mut self, skills: Arc<SkillStore>) -> Self {
        self.skills = Some(skills);
        self
    }

    pub fn with_memory(mut self, memory: Arc<dyn MemoryStore>) -> Self {
        self.memory = Some(memory);
        self
    }

    pub fn with_rag(mut self, rag: Arc<dyn RagStore>) -> Self {
        self.rag = Some(rag);
        self
    }

    pub fn with_profile_dir(mut self, dir: PathBuf) -> Self {
        self.profile_dir = Some(dir);
        self
    }

    pub fn tools(&self) -> &Arc<ToolRegistry> {
        &self.tools
    }

    pub fn router(&self) -> &Arc<ProviderRouter> {
        &self.router
    }

    // ── Agent registry ────────────────────────────────────────────────────────

    /// Upsert an agent.  Generates a UUID when the id is absent, stamps
    /// `updated_at`, and binds the agent to its provider in the router.
    pub fn register(&self, mut agent: AgentRecord) -> AgentRecord {
        if agent.id.is_empty() {
            agent.id = Uuid::new_v4().to_string();
        }
        agent.updated_at = Utc::now();
        if !agent.provider_id.is_empty() {
            self.router.bind(&agent.id, &agent.provider_id);
        }
        debug!(agent_id = %agent.id, name = %agent.name, "registered agent");
        self.agents
            .write()
            .unwrap()
            .insert(agent.id.clone(), agent.clone());
        agent
    }

    pub fn get(&self, agent_id: &str) -> Option<AgentRecord> {
        self.agents
            .read()
            .unwrap()
            .get(agent_id)
            .filter(|a| !a.deleted)
            .cloned()
    }

    /// Registered (non-deleted) agents, sorted by name.
    pub fn list(&self) -> Vec<AgentRecord> {
        let mut all: Vec<AgentRecord> = self
            .agents
            .read()
            .unwrap()
            .values()
            .filter(|a| !a.deleted)
            .cloned()
            .collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    /// First registered agent whose name matches exactly.
    pub fn find_by_name(&self, name: &str) -> Option<AgentRecord> {
        self.list().into_iter().find(|a| a.name == name)
    }

    /// Soft-delete: the record is retained so the id stays claimed, but the
    /// agent disappears from `get` and `list`.
    pub fn remove(&self, agent_id: &str) -> bool {
        let mut agents = self.agents.write().unwrap();
        match agents.get_mut(agent_id) {
            Some(agent) if !agent.deleted => {
                agent.deleted = true;
                agent.updated_at = Utc::now();
                true
            }
            _ => false,
        }
    }

    pub fn set_status(&self, agent_id: &str, status: AgentStatus) {
        if let Some(agent) = self.agents.write().unwrap().get_mut(agent_id) {
            agent.status = status;
            agent.updated_at = Utc::now();
        }
    }

    // ── Pending schedules ─────────────────────────────────────────────────────

    pub fn add_pending_schedule(&self, schedule: PendingSchedule) {
        self.pending.lock().unwrap().push(schedule);
    }

    /// Return and clear the pending-schedule buffer.
    pub fn drain_schedules(&self) -> Vec<PendingSchedule> {
        std::mem::take(&mut *self.pending.lock().unwrap())
    }

    // ── Execution ─────────────────────────────────────────────────────────────

    /// One full cognitive execution for an agent.
    pub async fn execute(
        &self,
        agent_id: &str,
        user_message: &str,
    ) -> Result<ExecuteOutcome, EngineError> {
        self.execute_inner(agent_id, user_message, None).await
    }

    /// Like [`execute`], observing a cancellation channel between loop
    /// rounds.  Both an explicit send and a dropped sender cancel.
    pub async fn execute_with_cancel(
        &self,
        agent_id: &str,
        user_message: &str,
        cancel: oneshot::Receiver<()>,
    ) -> Result<ExecuteOutcome, EngineError> {
        self.execute_inner(agent_id, user_message, Some(cancel)).await
    }

    /// Provider routing under an agent's binding, without the loop.  Used by
    /// the steward for decomposition and aggregation calls.
    pub async fn route_raw(
        &self,
        agent_id: &str,
        mut req: ChatRequest,
    ) -> Result<ChatResponse, EngineError> {
        let agent = self
            .get(agent_id)
            .ok_or_else(|| EngineError::UnknownAgent(agent_id.to_string()))?;
        if req.model.is_empty() {
            req.model = agent.model;
        }
        self.router
            .chat_for(agent_id, req)
            .await
            .map_err(EngineError::Provider)
    }

    async fn execute_inner(
        &self,
        agent_id: &str,
        user_message: &str,
        mut cancel: Option<oneshot::Receiver<()>>,
    ) -> Result<ExecuteOutcome, EngineError> {
        let agent = self
            .get(agent_id)
            .ok_or_else(|| EngineError::UnknownAgent(agent_id.to_string()))?;

        self.set_status(&agent.id, AgentStatus::Thinking);
        // Status returns to idle on every exit path, including errors.
        let _reset = StatusReset {
            engine: self,
            agent_id: agent.id.clone(),
        };

        let mut chain = ThinkingChain::new();

        // Memory recall; degraded mode on failure.
        let keywords = extract_keywords(user_message);
        let mut memory_block = None;
        if let Some(memory) = &self.memory {
            match memory.recall(&agent.id, &keywords).await {
                Ok(ctx) if !ctx.is_empty() => {
                    chain.push(
                        StepType::MemoryRecall,
                        format!("recalled context for {} keyword(s)", keywords.len()),
                    );
                    memory_block = Some(ctx);
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(agent_id = %agent.id, error = %e, "memory recall failed; continuing without context");
                }
            }
        }

        // RAG retrieval; degraded mode on failure.
        let mut rag_block = None;
        if let Some(rag) = &self.rag {
            match rag
                .search(CONVERSATIONS_COLLECTION, user_message, RAG_TOP_K)
                .await
            {
                Ok(hits) if !hits.is_empty() => {
                    let mut block = String::from("## Related context\n");
                    for h in &hits {
                        block.push_str(&format!("- {}\n", h.text));
                    }
                    rag_block = Some(block);
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(agent_id = %agent.id, error = %e, "retrieval failed; continuing without context");
                }
            }
        }

        // Initial message array, fixed order.  Every non-user entry is a
        // system message.
        let mut messages = Vec::new();
        if !agent.system_prompt.is_empty() {
            messages.push(ChatMessage::system(&agent.system_prompt));
        }
        if let Some(profile) = self.load_profile(&agent.id) {
            messages.push(ChatMessage::system(profile));
        }
        if let Some(persona) = agent.persona_line() {
            messages.push(ChatMessage::system(persona));
        }
        if let Some(block) = memory_block {
            messages.push(ChatMessage::system(block));
        }
        if let Some(block) = rag_block {
            messages.push(ChatMessage::system(block));
        }
        if let Some(skills) = &self.skills {
            if let Some(block) = skills.prompt_for(&agent.id) {
                messages.push(ChatMessage::system(block));
            }
        }
        messages.push(ChatMessage::user(user_message));

        // Tool set: all definitions, narrowed to the skill allow-set when the
        // agent has one.
        let mut definitions = self.tools.definitions();
        if let Some(skills) = &self.skills {
            let allowed = skills.tool_names_for(&agent.id);
            if !allowed.is_empty() {
                definitions = self.tools.filter(&allowed);
            }
        }

        let mut req = ChatRequest::new(&agent.model, messages);
        if !definitions.is_empty() {
            req.tools = Some(definitions);
            req.tool_choice = Some(ToolChoice::Auto);
        }

        chain.push(
            StepType::Reasoning,
            format!(
                "routing message for {} with {} tool(s) attached",
                agent.name,
                req.tools.as_ref().map(|t| t.len()).unwrap_or(0)
            ),
        );

        // The tool-calling loop.
        let mut usage = TokenUsage::default();
        let mut rounds = 0u32;
        let response = loop {
            if let Some(rx) = cancel.as_mut() {
                match rx.try_recv() {
                    Err(oneshot::error::TryRecvError::Empty) => {}
                    // Explicit send and dropped sender both cancel.
                    _ => return Err(EngineError::Cancelled),
                }
            }

            let resp = self
                .router
                .chat_for(&agent.id, req.clone())
                .await
                .map_err(EngineError::Provider)?;
            usage.add(resp.usage);

            if !resp.wants_tools() {
                break resp;
            }

            // The assistant message carrying tool_calls always precedes its
            // tool results in the conversation array.
            req.messages.push(ChatMessage::assistant_with_tool_calls(
                &resp.content,
                resp.tool_calls.clone(),
            ));
            for tc in &resp.tool_calls {
                chain.push(
                    StepType::ToolCall,
                    format!("{}({})", tc.function.name, tc.function.arguments),
                );
                let result = self
                    .tools
                    .execute(&tc.function.name, &tc.function.arguments)
                    .await;
                chain.push(StepType::ToolResult, result.clone());
                req.messages.push(ChatMessage::tool_result(&tc.id, result));
            }

            rounds += 1;
            if rounds >= MAX_TOOL_ROUNDS {
                // Budget exhausted: the last response stands as-is.
                break resp;
            }
        };

        let reply = response.content.clone();

        // Memory write-back: log on failure, never block the reply.
        if let Some(memory) = &self.memory {
            let reply_keywords = extract_keywords(&reply);
            if let Err(e) = memory.process(&agent.id, &reply, &reply_keywords).await {
                warn!(agent_id = %agent.id, error = %e, "memory write-back failed");
            }
        }

        // Conversation indexing runs detached; errors are suppressed.
        if let Some(rag) = &self.rag {
            let rag = Arc::clone(rag);
            let text = format!("{user_message}\n{reply}");
            let meta = serde_json::json!({ "agent_id": agent.id, "role": "conversation" });
            tokio::spawn(async move {
                let _ = rag.store(CONVERSATIONS_COLLECTION, &text, meta).await;
            });
        }

        chain.push_response(&reply, usage.total_tokens);
        Ok(ExecuteOutcome {
            reply,
            chain,
            usage,
        })
    }

    fn load_profile(&self, agent_id: &str) -> Option<String> {
        let dir = self.profile_dir.as_ref()?;
        let text = std::fs::read_to_string(dir.join(format!("{agent_id}.md"))).ok()?;
        let trimmed = text.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }
}

struct StatusReset<'a> {
    engine: &'a AgentEngine,
    agent_id: String,
}

impl Drop for StatusReset<'_> {
    fn drop(&mut self) {
        self.engine.set_status(&self.agent_id, AgentStatus::Idle);
    }
}

// ── Capability impls ──────────────────────────────────────────────────────────

#[async_trait]
impl EnginePort for AgentEngine {
    async fn execute(&self, agent_id: &str, message: &str) -> anyhow::Result<String> {
        let outcome = AgentEngine::execute(self, agent_id, message).await?;
        Ok(outcome.reply)
    }

    fn add_pending_schedule(&self, schedule: PendingSchedule) {
        AgentEngine::add_pending_schedule(self, schedule);
    }

    fn agent_roster(&self) -> Vec<(String, String)> {
        self.list().into_iter().map(|a| (a.id, a.name)).collect()
    }
}

#[async_trait]
impl AgentExecutor for AgentEngine {
    async fn execute(&self, agent_id: &str, message: &str) -> Result<String, EngineError> {
        AgentEngine::execute(self, agent_id, message)
            .await
            .map(|o| o.reply)
    }

    async fn route_raw(
        &self,
        agent_id: &str,
        req: ChatRequest,
    ) -> Result<ChatResponse, EngineError> {
        AgentEngine::route_raw(self, agent_id, req).await
    }

    fn is_registered(&self, agent_id: &str) -> bool {
        self.get(agent_id).is_some()
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryMemory;
    use crate::skills::{Skill, SkillStore};
    use troupe_model::{Role, ScriptedProvider};
    use troupe_tools::Tool;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "echoes x back"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({
                "type": "object",
                "properties": { "x": { "type": "string" } },
                "required": ["x"]
            })
        }
        async fn execute(&self, args: &str) -> anyhow::Result<String> {
            let v: serde_json::Value = serde_json::from_str(args)?;
            Ok(serde_json::json!({ "x": v["x"] }).to_string())
        }
    }

    fn engine_with(provider: ScriptedProvider) -> (Arc<AgentEngine>, Arc<ScriptedProvider>) {
        let provider = Arc::new(provider);
        let router = Arc::new(ProviderRouter::new());
        router.register(provider.clone());
        let tools = Arc::new(ToolRegistry::new());
        tools.register(EchoTool);
        (Arc::new(AgentEngine::new(router, tools)), provider)
    }

    fn test_agent(engine: &AgentEngine, provider_id: &str) -> AgentRecord {
        let mut agent = AgentRecord::named("Ada");
        agent.provider_id = provider_id.to_string();
        agent.model = "test-model".into();
        engine.register(agent)
    }

    #[tokio::test]
    async fn unknown_agent_is_an_error() {
        let (engine, _) = engine_with(ScriptedProvider::always_text("p", "hi"));
        let err = engine.execute("ghost", "hello").await.unwrap_err();
        assert!(matches!(err, EngineError::UnknownAgent(_)));
    }

    #[tokio::test]
    async fn register_generates_id_and_binds_provider() {
        let (engine, _) = engine_with(ScriptedProvider::always_text("p", "hi"));
        let agent = test_agent(&engine, "p");
        assert!(!agent.id.is_empty());
        assert_eq!(engine.router().resolved_id(&agent.id).as_deref(), Some("p"));
        assert_eq!(engine.get(&agent.id).unwrap().name, "Ada");
    }

    #[tokio::test]
    async fn remove_soft_deletes() {
        let (engine, _) = engine_with(ScriptedProvider::always_text("p", "hi"));
        let agent = test_agent(&engine, "p");
        assert!(engine.remove(&agent.id));
        assert!(engine.get(&agent.id).is_none());
        assert!(engine.list().is_empty());
        assert!(!engine.remove(&agent.id), "second remove is a no-op");
    }

    #[tokio::test]
    async fn tool_loop_terminates_on_plain_reply() {
        let (engine, provider) = engine_with(ScriptedProvider::tool_then_text(
            "p",
            "1",
            "echo",
            r#"{"x":"hi"}"#,
            "final",
        ));
        let agent = test_agent(&engine, "p");

        let outcome = engine.execute(&agent.id, "run the echo").await.unwrap();
        assert_eq!(outcome.reply, "final");
        assert_eq!(outcome.chain.count(StepType::ToolCall), 1);
        assert_eq!(outcome.chain.count(StepType::ToolResult), 1);
        assert_eq!(outcome.chain.count(StepType::Response), 1);
        assert!(outcome.chain.count(StepType::Reasoning) >= 1);
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn tool_loop_preserves_message_ordering() {
        let (engine, provider) = engine_with(ScriptedProvider::tool_then_text(
            "p",
            "1",
            "echo",
            r#"{"x":"hi"}"#,
            "final",
        ));
        let agent = test_agent(&engine, "p");
        engine.execute(&agent.id, "go").await.unwrap();

        // The second request must carry: user, assistant-with-tool-calls,
        // tool-result, in that order.
        let captured = provider.last_request.lock().unwrap();
        let messages = &captured.as_ref().unwrap().messages;
        let roles: Vec<Role> = messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant, Role::Tool]);
        assert!(messages[1].tool_calls.is_some());
        assert_eq!(messages[2].tool_call_id.as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn tool_loop_stops_at_round_cap() {
        let (engine, provider) = engine_with(ScriptedProvider::always_tool_calls(
            "p",
            "echo",
            r#"{"x":"again"}"#,
        ));
        let agent = test_agent(&engine, "p");

        let outcome = engine.execute(&agent.id, "loop forever").await.unwrap();
        assert_eq!(provider.call_count(), MAX_TOOL_ROUNDS as usize);
        assert_eq!(outcome.chain.count(StepType::ToolCall), 5);
        assert_eq!(outcome.chain.count(StepType::ToolResult), 5);
        // The capped response is returned as-is (its content is empty here).
        assert!(outcome.reply.is_empty());
    }

    #[tokio::test]
    async fn tool_failure_becomes_error_result_and_loop_continues() {
        let (engine, _) = engine_with(ScriptedProvider::tool_then_text(
            "p",
            "1",
            "no_such_tool",
            "{}",
            "recovered",
        ));
        let agent = test_agent(&engine, "p");

        let outcome = engine.execute(&agent.id, "go").await.unwrap();
        assert_eq!(outcome.reply, "recovered");
        let result_step = outcome
            .chain
            .steps
            .iter()
            .find(|s| s.step_type == StepType::ToolResult)
            .unwrap();
        assert!(result_step.content.contains("error"));
    }

    #[tokio::test]
    async fn provider_failover_reaches_fallback() {
        let primary = Arc::new(ScriptedProvider::always_failing("primary", "down"));
        let fallback = Arc::new(ScriptedProvider::always_text("fb", "ok"));
        let router = Arc::new(ProviderRouter::new());
        router.register(primary);
        router.register(fallback);
        let engine = Arc::new(AgentEngine::new(router, Arc::new(ToolRegistry::new())));

        let mut agent = AgentRecord::named("Ada");
        agent.provider_id = "primary".into();
        let agent = engine.register(agent);
        engine
            .router()
            .set_fallbacks(&agent.id, vec!["primary".into(), "fb".into()]);

        let outcome = engine.execute(&agent.id, "hello").await.unwrap();
        assert_eq!(outcome.reply, "ok");
    }

    #[tokio::test]
    async fn status_returns_to_idle_after_success_and_failure() {
        let (engine, _) = engine_with(ScriptedProvider::always_text("p", "hi"));
        let agent = test_agent(&engine, "p");
        engine.execute(&agent.id, "x").await.unwrap();
        assert_eq!(engine.get(&agent.id).unwrap().status, AgentStatus::Idle);

        let failing = Arc::new(ScriptedProvider::always_failing("dead", "boom"));
        engine.router().register(failing);
        engine.router().bind(&agent.id, "dead");
        assert!(engine.execute(&agent.id, "x").await.is_err());
        assert_eq!(engine.get(&agent.id).unwrap().status, AgentStatus::Idle);
    }

    #[tokio::test]
    async fn memory_context_is_injected_before_user_message() {
        let provider = Arc::new(ScriptedProvider::always_text("p", "noted"));
        let router = Arc::new(ProviderRouter::new());
        router.register(provider.clone());
        let memory = Arc::new(InMemoryMemory::new());
        let engine = Arc::new(
            AgentEngine::new(router, Arc::new(ToolRegistry::new())).with_memory(memory.clone()),
        );
        let mut agent = AgentRecord::named("Ada");
        agent.provider_id = "p".into();
        let agent = engine.register(agent);

        memory
            .process(&agent.id, "the deploy password is stored in vault", &["deploy".into()])
            .await
            .unwrap();

        let outcome = engine.execute(&agent.id, "how do we deploy this").await.unwrap();
        assert_eq!(outcome.chain.count(StepType::MemoryRecall), 1);

        let captured = provider.last_request.lock().unwrap();
        let messages = &captured.as_ref().unwrap().messages;
        let memory_idx = messages
            .iter()
            .position(|m| m.content.contains("## Recalled memory"))
            .expect("memory block present");
        assert_eq!(messages[memory_idx].role, Role::System);
        assert!(memory_idx < messages.len() - 1, "memory precedes user message");
    }

    #[tokio::test]
    async fn skill_allow_set_filters_tools() {
        let provider = Arc::new(ScriptedProvider::always_text("p", "done"));
        let router = Arc::new(ProviderRouter::new());
        router.register(provider.clone());
        let tools = Arc::new(ToolRegistry::new());
        tools.register(EchoTool);
        let skills = Arc::new(SkillStore::new());
        let engine =
            Arc::new(AgentEngine::new(router, tools).with_skills(skills.clone()));

        let mut agent = AgentRecord::named("Ada");
        agent.provider_id = "p".into();
        let agent = engine.register(agent);

        // Skill allows a tool that is not registered: the filtered set is
        // empty, so no tools are attached at all.
        let mut skill = Skill::new("ghost-skill");
        skill.tools = vec!["ghost_tool".into()];
        let sid = skills.upsert(skill);
        skills.assign(&agent.id, &sid);

        engine.execute(&agent.id, "hello").await.unwrap();
        let captured = provider.last_request.lock().unwrap();
        let req = captured.as_ref().unwrap();
        assert!(req.tools.is_none());
        assert!(req.tool_choice.is_none());
    }

    #[tokio::test]
    async fn drain_schedules_returns_and_clears() {
        let (engine, _) = engine_with(ScriptedProvider::always_text("p", "hi"));
        engine.add_pending_schedule(PendingSchedule {
            agent_id: "a".into(),
            title: "standup".into(),
            schedule_type: "meeting".into(),
            start_time: Utc::now(),
            duration_minutes: 15,
            recurring: true,
        });
        assert_eq!(engine.drain_schedules().len(), 1);
        assert!(engine.drain_schedules().is_empty());
    }

    #[tokio::test]
    async fn concurrent_executions_of_same_agent_both_complete() {
        let (engine, _) = engine_with(ScriptedProvider::always_text("p", "reply"));
        let agent = test_agent(&engine, "p");

        let e1 = engine.clone();
        let e2 = engine.clone();
        let id1 = agent.id.clone();
        let id2 = agent.id.clone();
        let (r1, r2) = tokio::join!(
            tokio::spawn(async move { e1.execute(&id1, "one").await }),
            tokio::spawn(async move { e2.execute(&id2, "two").await }),
        );
        assert!(r1.unwrap().is_ok());
        assert!(r2.unwrap().is_ok());
    }

    #[tokio::test]
    async fn cancelled_execution_returns_cancelled() {
        let (engine, _) = engine_with(ScriptedProvider::always_text("p", "hi"));
        let agent = test_agent(&engine, "p");
        let (tx, rx) = oneshot::channel();
        drop(tx);
        let err = engine
            .execute_with_cancel(&agent.id, "hello", rx)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Cancelled));
        assert_eq!(engine.get(&agent.id).unwrap().status, AgentStatus::Idle);
    }
}
