// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Configuration loading for the troupe server.
//!
//! Everything in the config has a serde default so a partial (or absent) file
//! still yields a usable configuration.  API keys are never stored in the
//! file; each provider names an environment variable via `api_key_env` and
//! the key is resolved at provider-construction time.
//!
//! Search order when no `--config` path is given:
//!
//! 1. `./troupe.yaml`
//! 2. `~/.config/troupe/troupe.yaml`

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Which wire protocol a configured provider speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// OpenAI-compatible `/chat/completions` API.
    OpenAi,
    /// Anthropic `/v1/messages` API.
    Anthropic,
}

/// One LLM backend entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Unique id referenced by agent bindings and fallback chains.
    pub id: String,
    pub kind: ProviderKind,
    /// API base URL.  `None` uses the kind's well-known default.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Environment variable holding the API key.
    #[serde(default)]
    pub api_key_env: Option<String>,
    /// When set, the model name is interpolated into the request URL path
    /// instead of the body.  Needed for gateways that scope routes by model.
    #[serde(default)]
    pub path_model: bool,
}

/// Seed agent registered at boot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentSeed {
    pub name: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub personality: String,
    #[serde(default)]
    pub system_prompt: String,
    #[serde(default)]
    pub backstory: String,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub model: String,
}

/// Seed team member.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamMemberSeed {
    /// Agent name; resolved to an id at boot.
    pub agent: String,
    pub role: String,
    #[serde(default)]
    pub can_delegate: bool,
    #[serde(default)]
    pub priority: i32,
}

/// Seed team registered at boot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamSeed {
    pub name: String,
    /// Steward agent name.
    pub steward: String,
    #[serde(default)]
    pub members: Vec<TeamMemberSeed>,
    #[serde(default = "default_workflow_type")]
    pub workflow_type: String,
}

fn default_workflow_type() -> String {
    "parallel".into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatConfig {
    #[serde(default = "default_heartbeat_interval")]
    pub interval_secs: u64,
    #[serde(default = "default_agent_timeout")]
    pub agent_timeout_secs: u64,
}

fn default_heartbeat_interval() -> u64 {
    300
}
fn default_agent_timeout() -> u64 {
    30
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_heartbeat_interval(),
            agent_timeout_secs: default_agent_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
}

fn default_pool_size() -> usize {
    10
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            pool_size: default_pool_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_listen")]
    pub listen: String,
    /// How long `POST /message` waits for the agent reply before 504.
    #[serde(default = "default_reply_timeout")]
    pub reply_timeout_secs: u64,
}

fn default_listen() -> String {
    "127.0.0.1:8686".into()
}
fn default_reply_timeout() -> u64 {
    60
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            reply_timeout_secs: default_reply_timeout(),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
    /// Provider id used when an agent has no explicit binding.
    #[serde(default)]
    pub default_provider: Option<String>,
    /// Caller id → ordered fallback provider ids.
    #[serde(default)]
    pub fallbacks: std::collections::HashMap<String, Vec<String>>,
    #[serde(default)]
    pub agents: Vec<AgentSeed>,
    #[serde(default)]
    pub teams: Vec<TeamSeed>,
    #[serde(default)]
    pub heartbeat: HeartbeatConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub http: HttpConfig,
    /// Directory holding per-agent profile markdown files, injected into the
    /// system prompt when present.
    #[serde(default)]
    pub profile_dir: Option<PathBuf>,
}

/// Load configuration from `path`, or from the default search locations.
///
/// A missing file is not an error; it yields `Config::default()` so the
/// server can boot with nothing but seed commands.
pub fn load(path: Option<&Path>) -> anyhow::Result<Config> {
    let candidate = match path {
        Some(p) => Some(p.to_path_buf()),
        None => default_paths().into_iter().find(|p| p.exists()),
    };

    let Some(file) = candidate else {
        debug!("no config file found; using defaults");
        return Ok(Config::default());
    };

    let raw = std::fs::read_to_string(&file)
        .with_context(|| format!("reading config file {}", file.display()))?;
    let config: Config = serde_yaml::from_str(&raw)
        .with_context(|| format!("parsing config file {}", file.display()))?;
    debug!(path = %file.display(), "loaded config");
    Ok(config)
}

fn default_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("troupe.yaml")];
    if let Some(cfg) = dirs::config_dir() {
        paths.push(cfg.join("troupe").join("troupe.yaml"));
    }
    paths
}

/// Resolve a provider's API key from its configured environment variable.
pub fn resolve_api_key(provider: &ProviderConfig) -> Option<String> {
    provider
        .api_key_env
        .as_deref()
        .and_then(|var| std::env::var(var).ok())
        .filter(|k| !k.is_empty())
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
