// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
mod cli;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use cli::{Cli, Commands};
use troupe_a2a::{A2aStore, ConversationEngine};
use troupe_bus::MemoryBus;
use troupe_commands::{builtin::register_builtins, CommandContext, CommandRegistry, Handles};
use troupe_config::{Config, ProviderKind};
use troupe_core::{
    AgentEngine, AgentRecord, InMemoryMemory, InMemoryRag, SkillStore,
};
use troupe_model::{AnthropicProvider, LlmProvider, OpenAiProvider, ProviderRouter};
use troupe_server::{
    serve, ClockListener, Heartbeat, InboundRouter, MemoryScheduleSink, MemorySessionStore,
    RestGateway, RestState,
};
use troupe_team::{Steward, TaskScheduler, Team, TeamMember, TeamStore};
use troupe_tools::{CreateScheduleTool, EnginePort, ListAgentsTool, SendAgentMessageTool, ToolRegistry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = troupe_config::load(cli.config.as_deref())?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::ShowConfig => {
            println!("{}", serde_yaml::to_string(&config).unwrap_or_default());
            Ok(())
        }
        Commands::ListProviders => {
            for p in &config.providers {
                println!(
                    "{:<16} {:?}  {}",
                    p.id,
                    p.kind,
                    p.base_url.as_deref().unwrap_or("(default url)")
                );
            }
            Ok(())
        }
        Commands::Serve => run_serve(config).await,
    }
}

async fn run_serve(config: Config) -> anyhow::Result<()> {
    // ── Providers ────────────────────────────────────────────────────────────
    let router = Arc::new(ProviderRouter::new());
    for p in &config.providers {
        let key = troupe_config::resolve_api_key(p);
        let provider: Arc<dyn LlmProvider> = match p.kind {
            ProviderKind::OpenAi => {
                let base = p
                    .base_url
                    .clone()
                    .unwrap_or_else(|| "https://api.openai.com/v1".into());
                Arc::new(OpenAiProvider::new(&p.id, base, key).with_path_model(p.path_model))
            }
            ProviderKind::Anthropic => {
                Arc::new(AnthropicProvider::new(&p.id, p.base_url.clone(), key))
            }
        };
        router.register(provider);
    }
    if let Some(default) = &config.default_provider {
        router.set_default(default);
    }

    // ── Engine and collaborators ─────────────────────────────────────────────
    let tools = Arc::new(ToolRegistry::new());
    let skills = Arc::new(SkillStore::new());
    let memory = Arc::new(InMemoryMemory::new());
    let rag = Arc::new(InMemoryRag::new());
    let mut engine = AgentEngine::new(router.clone(), tools.clone())
        .with_skills(skills.clone())
        .with_memory(memory.clone())
        .with_rag(rag.clone());
    if let Some(dir) = &config.profile_dir {
        engine = engine.with_profile_dir(dir.clone());
    }
    let engine = Arc::new(engine);

    // Builtin tools reach the engine through its capability port.
    let port: Arc<dyn EnginePort> = engine.clone();
    tools.register(CreateScheduleTool::new(port.clone()));
    tools.register(SendAgentMessageTool::new(port.clone()));
    tools.register(ListAgentsTool::new(port));

    // ── Seed agents and fallback chains ──────────────────────────────────────
    for seed in &config.agents {
        let mut agent = AgentRecord::named(&seed.name);
        agent.role = seed.role.clone();
        agent.personality = seed.personality.clone();
        agent.system_prompt = seed.system_prompt.clone();
        agent.backstory = seed.backstory.clone();
        agent.model = seed.model.clone();
        agent.provider_id = seed
            .provider
            .clone()
            .or_else(|| router.default_id())
            .unwrap_or_default();
        engine.register(agent);
    }
    for (caller, chain) in &config.fallbacks {
        // Callers may be named by agent name or raw id.
        let caller_id = engine
            .find_by_name(caller)
            .map(|a| a.id)
            .unwrap_or_else(|| caller.clone());
        router.set_fallbacks(caller_id, chain.clone());
    }

    // ── Teams ────────────────────────────────────────────────────────────────
    let teams = Arc::new(TeamStore::new());
    for seed in &config.teams {
        let steward_id = engine
            .find_by_name(&seed.steward)
            .map(|a| a.id)
            .with_context(|| format!("team {}: unknown steward {}", seed.name, seed.steward))?;
        let mut team = Team::new(&seed.name, steward_id);
        team.workflow_type = seed.workflow_type.clone();
        for m in &seed.members {
            let agent_id = engine
                .find_by_name(&m.agent)
                .map(|a| a.id)
                .with_context(|| format!("team {}: unknown member {}", seed.name, m.agent))?;
            team.members.push(TeamMember {
                agent_id,
                role: m.role.clone(),
                can_delegate: m.can_delegate,
                priority: m.priority,
            });
        }
        teams.upsert(team);
    }

    let bus = MemoryBus::new();
    let scheduler = Arc::new(
        TaskScheduler::with_pool_size(engine.clone(), config.scheduler.pool_size)
            .with_bus(bus.clone()),
    );
    let steward = Arc::new(Steward::new(teams.clone(), engine.clone(), scheduler));

    // The A2A summarizer runs through the first team's steward, or the
    // first agent when no team exists yet.
    let moderator = teams
        .list()
        .first()
        .map(|t| t.steward_agent_id.clone())
        .or_else(|| engine.list().first().map(|a| a.id.clone()))
        .unwrap_or_default();
    let a2a = Arc::new(ConversationEngine::new(
        engine.clone(),
        Arc::new(A2aStore::new()),
        moderator,
    ));

    let handles = Handles {
        engine: engine.clone(),
        skills,
        teams,
        steward,
        a2a,
        memory,
        rag,
        bus,
    };

    // ── Commands, bridged into the tool registry ─────────────────────────────
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

    // ── Inbound routing + REST surface ───────────────────────────────────────
    let (gateway, pending) = RestGateway::new();
    let inbound_router = Arc::new(
        InboundRouter::new(commands, handles, gateway)
            .with_sessions(Arc::new(MemorySessionStore::new())),
    );

    // ── Heartbeat driven by a coarse local tick ──────────────────────────────
    let heartbeat = Arc::new(
        Heartbeat::new(
            engine,
            MemoryScheduleSink::new(),
            config.heartbeat.interval_secs as i64,
        )
        .with_agent_timeout(Duration::from_secs(config.heartbeat.agent_timeout_secs)),
    );
    tokio::spawn({
        let heartbeat = heartbeat.clone();
        async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(60));
            loop {
                ticker.tick().await;
                heartbeat.on_tick(chrono::Utc::now()).await;
            }
        }
    });

    serve(
        RestState {
            router: inbound_router,
            pending,
            reply_timeout: Duration::from_secs(config.http.reply_timeout_secs),
        },
        &config.http.listen,
    )
    .await
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .try_init();
}
