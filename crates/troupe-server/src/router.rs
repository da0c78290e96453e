// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Priority dispatch of inbound messages:
//! slash command → `@team-` mention → `@agent` mention → single-agent
//! default → "no agent matched" reply.
//!
//! Every stage that can fail answers the user on the originating channel;
//! a request is never silently dropped.  Persistence failures are logged
//! and do not block the reply.

use std::sync::Arc;

use tracing::warn;

use troupe_commands::{CommandContext, CommandRegistry, Handles};
use troupe_core::AgentRecord;
use troupe_team::{StewardResult, Team};

use crate::inbound::{InboundMessage, OutboundGateway, OutboundMessage};
use crate::session::SessionStore;

pub struct InboundRouter {
    commands: Arc<CommandRegistry>,
    handles: Handles,
    sessions: Option<Arc<dyn SessionStore>>,
    gateway: Arc<dyn OutboundGateway>,
}

impl InboundRouter {
    pub fn new(
        commands: Arc<CommandRegistry>,
        handles: Handles,
        gateway: Arc<dyn OutboundGateway>,
    ) -> Self {
        Self {
            commands,
            handles,
            sessions: None,
            gateway,
        }
    }

    pub fn with_sessions(mut self, sessions: Arc<dyn SessionStore>) -> Self {
        self.sessions = Some(sessions);
        self
    }

    /// Dispatch one inbound message to its handler and answer the channel.
    pub async fn handle(&self, inbound: InboundMessage) {
        // 1. Slash commands run before any LLM involvement.
        if inbound.content.starts_with('/') {
            let ctx = CommandContext {
                platform: inbound.platform.clone(),
                channel_id: inbound.channel_id.clone(),
                user_id: inbound.user_id.clone(),
                user_name: inbound.user_name.clone(),
                handles: self.handles.clone(),
            };
            match self.commands.dispatch(&inbound.content, &ctx).await {
                Ok(result) => self.send(&inbound, None, result.content).await,
                Err(e) => self.send(&inbound, None, format!("command error: {e}")).await,
            }
            return;
        }

        // 2. Team mention.
        if let Some((team, stripped)) = self.match_team(&inbound.content) {
            self.send(&inbound, None, "collaborating...".to_string()).await;
            match self.handles.steward.handle(&team.id, stripped.trim()).await {
                Ok(result) => {
                    self.send(&inbound, None, render_steward_result(&result)).await;
                }
                Err(e) => self.send(&inbound, None, format!("team error: {e}")).await,
            }
            return;
        }

        // 3./4. Agent mention, or the single-agent default.
        let Some((agent, content)) = self.match_agent(&inbound.content) else {
            self.send(
                &inbound,
                None,
                "No agent matched. Mention an agent with @Name.".to_string(),
            )
            .await;
            return;
        };

        // 5. Persist, execute, persist, reply.
        let session_id = self.open_session(&agent, &inbound, &content).await;
        match self.handles.engine.execute(&agent.id, &content).await {
            Ok(outcome) => {
                if let (Some(store), Some(sid)) = (&self.sessions, &session_id) {
                    if let Err(e) = store.append(sid, "assistant", &outcome.reply).await {
                        warn!(session_id = %sid, error = %e, "failed to append assistant message");
                    }
                }
                self.send(&inbound, Some(agent.id.clone()), outcome.reply).await;
            }
            Err(e) => {
                self.send(
                    &inbound,
                    Some(agent.id.clone()),
                    format!("execute error: {e}"),
                )
                .await;
            }
        }
    }

    /// First team whose `@team-<name>` mention appears in the content.
    fn match_team(&self, content: &str) -> Option<(Team, String)> {
        for team in self.handles.teams.list() {
            let mention = format!("@team-{}", team.name);
            if content.contains(&mention) {
                let stripped = content.replacen(&mention, "", 1);
                return Some((team, stripped));
            }
        }
        None
    }

    /// First agent whose `@<name>` mention appears; with no mention and
    /// exactly one registered agent, that agent is the default recipient
    /// with unchanged content.
    fn match_agent(&self, content: &str) -> Option<(AgentRecord, String)> {
        let agents = self.handles.engine.list();
        for agent in &agents {
            let mention = format!("@{}", agent.name);
            if content.contains(&mention) {
                let stripped = content.replacen(&mention, "", 1).trim().to_string();
                return Some((agent.clone(), stripped));
            }
        }
        if agents.len() == 1 {
            return Some((agents[0].clone(), content.to_string()));
        }
        None
    }

    async fn open_session(
        &self,
        agent: &AgentRecord,
        inbound: &InboundMessage,
        content: &str,
    ) -> Option<String> {
        let store = self.sessions.as_ref()?;
        match store
            .find_or_create(&agent.id, &inbound.platform, &inbound.channel_id)
            .await
        {
            Ok(session) => {
                if let Err(e) = store.append(&session.id, "user", content).await {
                    warn!(session_id = %session.id, error = %e, "failed to append user message");
                }
                Some(session.id)
            }
            Err(e) => {
                warn!(agent_id = %agent.id, error = %e, "session lookup failed; replying without persistence");
                None
            }
        }
    }

    async fn send(&self, inbound: &InboundMessage, agent_id: Option<String>, content: String) {
        let msg = OutboundMessage {
            platform: inbound.platform.clone(),
            channel_id: inbound.channel_id.clone(),
            agent_id,
            content,
            reply_to: inbound.reply_to.clone(),
        };
        if let Err(e) = self.gateway.send(msg).await {
            warn!(channel = %inbound.channel_id, error = %e, "outbound delivery failed");
        }
    }
}

/// Bulleted agent-by-agent transcript followed by the summary.
fn render_steward_result(result: &StewardResult) -> String {
    let mut text = String::new();
    for task in &result.tasks {
        match &task.error {
            None => text.push_str(&format!("- [{}]: {}\n", task.agent_id, task.output)),
            Some(err) => text.push_str(&format!("- [{}]: failed - {}\n", task.agent_id, err)),
        }
    }
    text.push_str(&result.summary);
    text
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::Utc;

    use troupe_a2a::{A2aStore, ConversationEngine};
    use troupe_bus::MemoryBus;
    use troupe_commands::{Command, CommandResult};
    use troupe_core::{AgentEngine, AgentRecord, InMemoryMemory, InMemoryRag, SkillStore};
    use troupe_model::{ProviderRouter, ScriptedProvider};
    use troupe_team::{Steward, TaskScheduler, TeamMember, TeamStore};
    use troupe_tools::ToolRegistry;

    use super::*;
    use crate::session::MemorySessionStore;

    struct CollectingGateway {
        sent: Mutex<Vec<OutboundMessage>>,
    }

    impl CollectingGateway {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                sent: Mutex::new(Vec::new()),
            })
        }
        fn contents(&self) -> Vec<String> {
            self.sent.lock().unwrap().iter().map(|m| m.content.clone()).collect()
        }
    }

    #[async_trait]
    impl OutboundGateway for CollectingGateway {
        async fn send(&self, msg: OutboundMessage) -> anyhow::Result<()> {
            self.sent.lock().unwrap().push(msg);
            Ok(())
        }
    }

    struct PingCommand;

    #[async_trait]
    impl Command for PingCommand {
        fn name(&self) -> &str {
            "ping"
        }
        fn description(&self) -> &str {
            "replies with pong"
        }
        fn usage(&self) -> &str {
            "/ping <text>"
        }
        async fn execute(
            &self,
            args: &str,
            _ctx: &CommandContext,
        ) -> anyhow::Result<CommandResult> {
            Ok(CommandResult::text(format!("pong: {args}")))
        }
    }

    struct Fixture {
        router: InboundRouter,
        gateway: Arc<CollectingGateway>,
        handles: Handles,
        sessions: Arc<MemorySessionStore>,
    }

    fn fixture(reply: &str) -> Fixture {
        let provider_router = Arc::new(ProviderRouter::new());
        provider_router.register(Arc::new(ScriptedProvider::always_text("p", reply)));
        let tools = Arc::new(ToolRegistry::new());
        let skills = Arc::new(SkillStore::new());
        let engine = Arc::new(
            AgentEngine::new(provider_router, tools).with_skills(skills.clone()),
        );
        let teams = Arc::new(TeamStore::new());
        let scheduler = Arc::new(TaskScheduler::new(engine.clone()));
        let steward = Arc::new(Steward::new(teams.clone(), engine.clone(), scheduler));
        let a2a = Arc::new(ConversationEngine::new(
            engine.clone(),
            Arc::new(A2aStore::new()),
            "steward",
        ));
        let handles = Handles {
            engine,
            skills,
            teams,
            steward,
            a2a,
            memory: Arc::new(InMemoryMemory::new()),
            rag: Arc::new(InMemoryRag::new()),
            bus: MemoryBus::new(),
        };

        let commands = Arc::new(CommandRegistry::new());
        commands.register(PingCommand);

        let gateway = CollectingGateway::new();
        let sessions = Arc::new(MemorySessionStore::new());
        let router = InboundRouter::new(commands, handles.clone(), gateway.clone())
            .with_sessions(sessions.clone());
        Fixture {
            router,
            gateway,
            handles,
            sessions,
        }
    }

    fn seed_agent(handles: &Handles, name: &str) -> String {
        let mut agent = AgentRecord::named(name);
        agent.provider_id = "p".into();
        agent.model = "m".into();
        handles.engine.register(agent).id
    }

    fn inbound(content: &str) -> InboundMessage {
        InboundMessage {
            platform: "test".into(),
            channel_id: "chan-1".into(),
            user_id: "u1".into(),
            user_name: "tester".into(),
            content: content.into(),
            timestamp: Utc::now(),
            reply_to: Some("msg-9".into()),
        }
    }

    #[tokio::test]
    async fn slash_command_passes_through() {
        let f = fixture("unused");
        f.router.handle(inbound("/ping hello")).await;
        assert_eq!(f.gateway.contents(), vec!["pong: hello"]);
    }

    #[tokio::test]
    async fn unknown_command_still_answers() {
        let f = fixture("unused");
        f.router.handle(inbound("/nope")).await;
        assert!(f.gateway.contents()[0].starts_with("Unknown command: /nope"));
    }

    #[tokio::test]
    async fn agent_mention_executes_and_persists_session() {
        let f = fixture("hello from ada");
        let ada = seed_agent(&f.handles, "Ada");
        seed_agent(&f.handles, "Bix");

        f.router.handle(inbound("@Ada are you there")).await;
        let contents = f.gateway.contents();
        assert_eq!(contents, vec!["hello from ada"]);

        let sent = f.gateway.sent.lock().unwrap();
        assert_eq!(sent[0].agent_id.as_deref(), Some(ada.as_str()));
        assert_eq!(sent[0].reply_to.as_deref(), Some("msg-9"));

        let session = f
            .sessions
            .find_or_create(&ada, "test", "chan-1")
            .await
            .unwrap();
        let messages = f.sessions.messages(&session.id).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "user");
        assert_eq!(messages[0].content, "are you there");
        assert_eq!(messages[1].role, "assistant");
    }

    #[tokio::test]
    async fn single_registered_agent_is_default_recipient() {
        let f = fixture("default reply");
        seed_agent(&f.handles, "Solo");
        f.router.handle(inbound("no mention at all")).await;
        assert_eq!(f.gateway.contents(), vec!["default reply"]);
    }

    #[tokio::test]
    async fn no_match_with_multiple_agents_answers_hint() {
        let f = fixture("unused");
        seed_agent(&f.handles, "Ada");
        seed_agent(&f.handles, "Bix");
        f.router.handle(inbound("hello nobody")).await;
        assert_eq!(
            f.gateway.contents(),
            vec!["No agent matched. Mention an agent with @Name."]
        );
    }

    #[tokio::test]
    async fn team_mention_sends_placeholder_then_result() {
        // The provider's reply is not JSON, so decomposition falls back to
        // direct execution through the steward agent.
        let f = fixture("the team answer");
        let stew = seed_agent(&f.handles, "Stew");
        seed_agent(&f.handles, "Ada");
        let mut team = troupe_team::Team::new("builders", stew);
        team.members.push(TeamMember {
            agent_id: "missing".into(),
            role: "builder".into(),
            can_delegate: false,
            priority: 0,
        });
        f.handles.teams.upsert(team);

        f.router.handle(inbound("@team-builders ship it")).await;
        let contents = f.gateway.contents();
        assert_eq!(contents.len(), 2);
        assert_eq!(contents[0], "collaborating...");
        assert!(contents[1].contains("the team answer"));
    }

    #[tokio::test]
    async fn execute_error_is_reported_on_channel() {
        let f = fixture("unused");
        let provider = Arc::new(ScriptedProvider::always_failing("dead", "llm offline"));
        f.handles.engine.router().register(provider);
        let mut agent = AgentRecord::named("Ada");
        agent.provider_id = "dead".into();
        f.handles.engine.register(agent);

        f.router.handle(inbound("@Ada hello")).await;
        let contents = f.gateway.contents();
        assert!(contents[0].starts_with("execute error:"), "{contents:?}");
    }
}
