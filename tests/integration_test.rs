// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! End-to-end tests over the fully wired stack: providers, engine, tools,
//! commands (bridged as tools), teams, and the inbound router, all against
//! scripted providers, no network.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use troupe_a2a::{A2aStore, ConversationEngine};
use troupe_bus::MemoryBus;
use troupe_commands::{builtin::register_builtins, CommandContext, CommandRegistry, Handles};
use troupe_core::{AgentEngine, AgentRecord, InMemoryMemory, InMemoryRag, SkillStore, StepType};
use troupe_model::{ProviderRouter, ScriptedProvider};
use troupe_server::{InboundMessage, InboundRouter, MemorySessionStore, OutboundGateway, OutboundMessage};
use troupe_team::{Steward, TaskScheduler, TeamStore};
use troupe_tools::{EnginePort, ListAgentsTool, ToolRegistry};

struct CollectingGateway {
    sent: Mutex<Vec<OutboundMessage>>,
}

#[async_trait]
impl OutboundGateway for CollectingGateway {
    async fn send(&self, msg: OutboundMessage) -> anyhow::Result<()> {
        self.sent.lock().unwrap().push(msg);
        Ok(())
    }
}

struct Stack {
    engine: Arc<AgentEngine>,
    router: InboundRouter,
    gateway: Arc<CollectingGateway>,
}

/// Wire the whole runtime around one scripted provider, the way the server
/// binary does at boot.
fn stack(provider: ScriptedProvider) -> Stack {
    let provider_router = Arc::new(ProviderRouter::new());
    provider_router.register(Arc::new(provider));

    let tools = Arc::new(ToolRegistry::new());
    let skills = Arc::new(SkillStore::new());
    let engine = Arc::new(
        AgentEngine::new(provider_router, tools.clone()).with_skills(skills.clone()),
    );
    let port: Arc<dyn EnginePort> = engine.clone();
    tools.register(ListAgentsTool::new(port));

    let teams = Arc::new(TeamStore::new());
    let scheduler = Arc::new(TaskScheduler::new(engine.clone()));
    let steward = Arc::new(Steward::new(teams.clone(), engine.clone(), scheduler));
    let a2a = Arc::new(ConversationEngine::new(
        engine.clone(),
        Arc::new(A2aStore::new()),
        "moderator",
    ));
    let handles = Handles {
        engine: engine.clone(),
        skills,
        teams,
        steward,
        a2a,
        memory: Arc::new(InMemoryMemory::new()),
        rag: Arc::new(InMemoryRag::new()),
        bus: MemoryBus::new(),
    };

    let commands = Arc::new(CommandRegistry::new());
    register_builtins(&commands, commands.clone());
    commands.bridge_into(
        &tools,
        CommandContext {
            platform: "internal".into(),
            channel_id: "internal".into(),
            user_id: "system".into(),
            user_name: "system".into(),
            handles: handles.clone(),
        },
    );

    let gateway = Arc::new(CollectingGateway {
        sent: Mutex::new(Vec::new()),
    });
    let router = InboundRouter::new(commands, handles, gateway.clone())
        .with_sessions(Arc::new(MemorySessionStore::new()));
    Stack {
        engine,
        router,
        gateway,
    }
}

fn seed_agent(engine: &AgentEngine, name: &str) -> String {
    let mut agent = AgentRecord::named(name);
    agent.provider_id = "p".into();
    agent.model = "m".into();
    engine.register(agent).id
}

fn inbound(content: &str) -> InboundMessage {
    InboundMessage {
        platform: "test".into(),
        channel_id: "chan".into(),
        user_id: "u1".into(),
        user_name: "tester".into(),
        content: content.into(),
        timestamp: chrono::Utc::now(),
        reply_to: None,
    }
}

#[tokio::test]
async fn slash_status_reports_the_wired_runtime() {
    let s = stack(ScriptedProvider::always_text("p", "unused"));
    seed_agent(&s.engine, "Ada");
    s.router.handle(inbound("/status")).await;
    let sent = s.gateway.sent.lock().unwrap();
    assert!(sent[0].content.contains("providers: p"));
    assert!(sent[0].content.contains("agents: 1"));
}

#[tokio::test]
async fn agent_can_run_a_bridged_slash_command_as_a_tool() {
    // Round 1: the model calls the bridged /list_agents command as a tool.
    // Round 2: it answers with plain text.
    let s = stack(ScriptedProvider::tool_then_text(
        "p",
        "tc1",
        "cmd_list_agents",
        r#"{"args":""}"#,
        "there is one agent",
    ));
    let ada = seed_agent(&s.engine, "Ada");

    let outcome = s.engine.execute(&ada, "who is registered?").await.unwrap();
    assert_eq!(outcome.reply, "there is one agent");
    assert_eq!(outcome.chain.count(StepType::ToolCall), 1);
    let result_step = outcome
        .chain
        .steps
        .iter()
        .find(|step| step.step_type == StepType::ToolResult)
        .unwrap();
    assert!(result_step.content.contains("Ada"), "{}", result_step.content);
}

#[tokio::test]
async fn help_lists_all_builtin_families() {
    let s = stack(ScriptedProvider::always_text("p", "unused"));
    s.router.handle(inbound("/help")).await;
    let sent = s.gateway.sent.lock().unwrap();
    for family in [
        "/list_agents",
        "/create_team",
        "/remember",
        "/provider",
        "/rag search",
        "/a2a",
    ] {
        assert!(sent[0].content.contains(family), "missing {family}");
    }
}

#[tokio::test]
async fn full_chat_round_trip_with_session() {
    let s = stack(ScriptedProvider::always_text("p", "hello tester"));
    seed_agent(&s.engine, "Ada");
    s.router.handle(inbound("@Ada hello")).await;
    s.router.handle(inbound("@Ada hello again")).await;
    let sent = s.gateway.sent.lock().unwrap();
    assert_eq!(sent.len(), 2);
    assert!(sent.iter().all(|m| m.content == "hello tester"));
}
