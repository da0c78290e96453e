// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Caller→backend routing with ordered failover.
//!
//! Resolution for a call is `explicit bind > process default`.  The fallback
//! chain is consulted only after the primary chat fails; entries are tried in
//! order and the first success wins.  No error-type inspection happens: any
//! provider error advances the chain, and the last error is surfaced when
//! the chain is exhausted.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use anyhow::{anyhow, Context};
use tracing::warn;

use crate::provider::LlmProvider;
use crate::types::{ChatRequest, ChatResponse};

#[derive(Default)]
pub struct ProviderRouter {
    providers: RwLock<HashMap<String, Arc<dyn LlmProvider>>>,
    /// caller id → provider id (explicit bind).
    bindings: RwLock<HashMap<String, String>>,
    /// caller id → ordered fallback provider ids.
    chains: RwLock<HashMap<String, Vec<String>>>,
    default_id: RwLock<Option<String>>,
}

impl ProviderRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider under its id; re-registration replaces.
    ///
    /// The first registered provider becomes the process default unless one
    /// was already set explicitly.
    pub fn register(&self, provider: Arc<dyn LlmProvider>) {
        let id = provider.name().to_string();
        self.providers.write().unwrap().insert(id.clone(), provider);
        let mut default = self.default_id.write().unwrap();
        if default.is_none() {
            *default = Some(id);
        }
    }

    pub fn set_default(&self, provider_id: impl Into<String>) {
        *self.default_id.write().unwrap() = Some(provider_id.into());
    }

    pub fn default_id(&self) -> Option<String> {
        self.default_id.read().unwrap().clone()
    }

    /// Bind a caller to a specific provider.
    pub fn bind(&self, caller_id: impl Into<String>, provider_id: impl Into<String>) {
        self.bindings
            .write()
            .unwrap()
            .insert(caller_id.into(), provider_id.into());
    }

    /// Install an ordered failover chain for a caller.
    pub fn set_fallbacks(&self, caller_id: impl Into<String>, provider_ids: Vec<String>) {
        self.chains
            .write()
            .unwrap()
            .insert(caller_id.into(), provider_ids);
    }

    pub fn get(&self, provider_id: &str) -> Option<Arc<dyn LlmProvider>> {
        self.providers.read().unwrap().get(provider_id).cloned()
    }

    /// Registered provider ids, sorted.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.providers.read().unwrap().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Provider id a caller currently resolves to (bind > default).
    pub fn resolved_id(&self, caller_id: &str) -> Option<String> {
        self.bindings
            .read()
            .unwrap()
            .get(caller_id)
            .cloned()
            .or_else(|| self.default_id.read().unwrap().clone())
    }

    fn resolve(&self, caller_id: &str) -> anyhow::Result<Arc<dyn LlmProvider>> {
        let id = self
            .resolved_id(caller_id)
            .context("no provider bound and no default provider configured")?;
        self.get(&id)
            .with_context(|| format!("provider {id:?} is not registered"))
    }

    /// Route one chat call for `caller_id`, failing over down the chain.
    pub async fn chat_for(
        &self,
        caller_id: &str,
        req: ChatRequest,
    ) -> anyhow::Result<ChatResponse> {
        let primary = self.resolve(caller_id)?;
        let mut last_err = match primary.chat(req.clone()).await {
            Ok(resp) => return Ok(resp),
            Err(e) => {
                warn!(
                    caller = %caller_id,
                    provider = %primary.name(),
                    error = %e,
                    "primary provider failed; consulting fallback chain"
                );
                e
            }
        };

        let chain = self
            .chains
            .read()
            .unwrap()
            .get(caller_id)
            .cloned()
            .unwrap_or_default();
        for id in chain {
            let Some(provider) = self.get(&id) else {
                last_err = anyhow!("fallback provider {id:?} is not registered");
                continue;
            };
            match provider.chat(req.clone()).await {
                Ok(resp) => return Ok(resp),
                Err(e) => {
                    warn!(caller = %caller_id, provider = %id, error = %e, "fallback provider failed");
                    last_err = e;
                }
            }
        }
        Err(last_err)
    }

    /// Health of every registered provider, sorted by id.
    pub async fn health(&self) -> Vec<(String, anyhow::Result<()>)> {
        let providers: Vec<Arc<dyn LlmProvider>> = {
            let map = self.providers.read().unwrap();
            let mut list: Vec<_> = map.values().cloned().collect();
            list.sort_by(|a, b| a.name().cmp(b.name()));
            list
        };
        let mut out = Vec::with_capacity(providers.len());
        for p in providers {
            let result = p.health_check().await;
            out.push((p.name().to_string(), result));
        }
        out
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::ScriptedProvider;
    use crate::types::ChatMessage;

    fn req() -> ChatRequest {
        ChatRequest::new("m", vec![ChatMessage::user("hi")])
    }

    #[tokio::test]
    async fn first_registered_becomes_default() {
        let router = ProviderRouter::new();
        router.register(Arc::new(ScriptedProvider::always_text("a", "one")));
        router.register(Arc::new(ScriptedProvider::always_text("b", "two")));
        assert_eq!(router.default_id().as_deref(), Some("a"));

        let resp = router.chat_for("anyone", req()).await.unwrap();
        assert_eq!(resp.content, "one");
    }

    #[tokio::test]
    async fn explicit_bind_beats_default() {
        let router = ProviderRouter::new();
        router.register(Arc::new(ScriptedProvider::always_text("a", "one")));
        router.register(Arc::new(ScriptedProvider::always_text("b", "two")));
        router.bind("agent-1", "b");
        let resp = router.chat_for("agent-1", req()).await.unwrap();
        assert_eq!(resp.content, "two");
    }

    #[tokio::test]
    async fn failover_walks_chain_in_order() {
        let router = ProviderRouter::new();
        router.register(Arc::new(ScriptedProvider::always_failing("primary", "down")));
        router.register(Arc::new(ScriptedProvider::always_failing("fb0", "also down")));
        router.register(Arc::new(ScriptedProvider::always_text("fb1", "ok")));
        router.bind("agent-1", "primary");
        router.set_fallbacks("agent-1", vec!["fb0".into(), "fb1".into()]);

        let resp = router.chat_for("agent-1", req()).await.unwrap();
        assert_eq!(resp.content, "ok");
    }

    #[tokio::test]
    async fn chain_including_primary_retries_it() {
        // The chain is opaque: a chain [primary, fb] retries the primary once
        // before moving on, exactly as configured.
        let router = ProviderRouter::new();
        router.register(Arc::new(ScriptedProvider::always_failing("primary", "down")));
        router.register(Arc::new(ScriptedProvider::always_text("fb", "ok")));
        router.bind("agent-1", "primary");
        router.set_fallbacks("agent-1", vec!["primary".into(), "fb".into()]);

        let resp = router.chat_for("agent-1", req()).await.unwrap();
        assert_eq!(resp.content, "ok");
    }

    #[tokio::test]
    async fn exhausted_chain_surfaces_last_error() {
        let router = ProviderRouter::new();
        router.register(Arc::new(ScriptedProvider::always_failing("primary", "e1")));
        router.register(Arc::new(ScriptedProvider::always_failing("fb", "e2")));
        router.bind("agent-1", "primary");
        router.set_fallbacks("agent-1", vec!["fb".into()]);

        let err = router.chat_for("agent-1", req()).await.unwrap_err();
        assert!(err.to_string().contains("e2"));
    }

    #[tokio::test]
    async fn fallback_not_consulted_when_primary_succeeds() {
        let router = ProviderRouter::new();
        let fb = Arc::new(ScriptedProvider::always_text("fb", "fallback"));
        router.register(Arc::new(ScriptedProvider::always_text("primary", "ok")));
        router.register(fb.clone());
        router.bind("agent-1", "primary");
        router.set_fallbacks("agent-1", vec!["fb".into()]);

        let resp = router.chat_for("agent-1", req()).await.unwrap();
        assert_eq!(resp.content, "ok");
        assert_eq!(fb.call_count(), 0);
    }

    #[tokio::test]
    async fn no_providers_is_an_error() {
        let router = ProviderRouter::new();
        assert!(router.chat_for("x", req()).await.is_err());
    }

    #[test]
    fn ids_are_sorted() {
        let router = ProviderRouter::new();
        router.register(Arc::new(ScriptedProvider::always_text("zeta", "")));
        router.register(Arc::new(ScriptedProvider::always_text("alpha", "")));
        assert_eq!(router.ids(), vec!["alpha", "zeta"]);
    }
}
