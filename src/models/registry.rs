//! Logical model registry built from agent discovery
//!
//! Each account exposes agents, and each agent runs one underlying model
//! (`claude-sonnet-4-20250522`, `gpt-4o-2024-08-06`, ...). Agents are grouped
//! into logical models by the first three hyphen-separated tokens of that name,
//! so every account that has a Sonnet 4 agent can serve `claude-sonnet-4`.
//!
//! The registry is rebuilt wholesale by a discovery pass and never mutated
//! afterwards. [`RegistryCell`] publishes it to request handlers, which wait
//! for the first publication instead of seeing an empty registry.

use crate::models::pool::{AccountId, AccountPool};
use crate::upstream::{Agent, UpstreamClient};
use std::sync::Arc;
use tokio::sync::watch;

/// An (account, agent) pair able to serve a logical model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentBinding {
    pub account: AccountId,
    pub agent_id: String,
}

/// One externally visible model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRecord {
    /// Logical id, e.g. `claude-sonnet-4`
    pub id: String,
    /// Display name of the first agent seen for this model
    pub name: String,
    /// Full model name of the first agent seen
    pub model_name: String,
    pub owned_by: &'static str,
    pub bindings: Vec<AgentBinding>,
}

impl ModelRecord {
    /// First agent of `account` bound to this model, in discovery order
    pub fn agent_for(&self, account: AccountId) -> Option<&str> {
        self.bindings
            .iter()
            .find(|b| b.account == account)
            .map(|b| b.agent_id.as_str())
    }

    /// Label shown in model listings: `"{agent name} ({model name})"`
    pub fn display_name(&self) -> String {
        format!("{} ({})", self.name, self.model_name)
    }
}

/// Derive the logical model id from an upstream model name
///
/// Keeps the first three hyphen-separated tokens; shorter names are kept whole.
pub fn logical_model_id(model_name: &str) -> String {
    model_name.split('-').take(3).collect::<Vec<_>>().join("-")
}

/// Vendor family of an upstream model name
pub fn model_owner(model_name: &str) -> &'static str {
    if model_name.to_ascii_lowercase().contains("claude") {
        "anthropic"
    } else {
        "openai"
    }
}

/// Read-only table of logical models
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    models: Vec<ModelRecord>,
    agents_per_account: Vec<(AccountId, usize)>,
}

impl ModelRegistry {
    /// Build a registry from per-account agent lists
    ///
    /// Models appear in first-seen order; bindings keep account order and,
    /// within an account, agent order.
    pub fn from_agents(per_account: Vec<(AccountId, Vec<Agent>)>) -> Self {
        let mut models: Vec<ModelRecord> = Vec::new();
        let mut agents_per_account = Vec::with_capacity(per_account.len());

        for (account, agents) in per_account {
            agents_per_account.push((account, agents.len()));

            for agent in agents {
                let id = logical_model_id(&agent.model);
                let binding = AgentBinding {
                    account,
                    agent_id: agent.id,
                };

                match models.iter_mut().find(|m| m.id == id) {
                    Some(record) => record.bindings.push(binding),
                    None => models.push(ModelRecord {
                        id,
                        name: agent.name,
                        owned_by: model_owner(&agent.model),
                        model_name: agent.model,
                        bindings: vec![binding],
                    }),
                }
            }
        }

        Self {
            models,
            agents_per_account,
        }
    }

    /// Query every account's agents and build a fresh registry
    ///
    /// Discovery is best-effort per account: an account whose agent listing
    /// fails contributes zero agents and the pass continues.
    pub async fn discover(pool: &AccountPool, client: &dyn UpstreamClient) -> Self {
        let lookups = pool.accounts().map(|(account, config)| async move {
            match client.list_agents(config).await {
                Ok(agents) => {
                    tracing::debug!(
                        account = %account,
                        domain = %config.domain_name(),
                        agents = agents.len(),
                        "Discovered agents"
                    );
                    (account, agents)
                }
                Err(e) => {
                    tracing::error!(
                        account = %account,
                        domain = %config.domain_name(),
                        error = %e,
                        "Agent discovery failed, account will serve no models"
                    );
                    (account, Vec::new())
                }
            }
        });

        let per_account = futures::future::join_all(lookups).await;
        let registry = Self::from_agents(per_account);

        tracing::info!(
            models = registry.len(),
            accounts = pool.len(),
            agents = registry.agent_count(),
            "Loaded {} unique model families from {} Retool account(s)",
            registry.len(),
            pool.len()
        );

        registry
    }

    pub fn get(&self, id: &str) -> Option<&ModelRecord> {
        self.models.iter().find(|m| m.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn models(&self) -> &[ModelRecord] {
        &self.models
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Total agents discovered across all accounts
    pub fn agent_count(&self) -> usize {
        self.agents_per_account.iter().map(|(_, n)| n).sum()
    }

    /// Agents discovered per account, in pool order
    pub fn agents_per_account(&self) -> &[(AccountId, usize)] {
        &self.agents_per_account
    }
}

/// Publication point for the current registry
///
/// Holds `None` until the first discovery pass is published.
#[derive(Debug)]
pub struct RegistryCell {
    tx: watch::Sender<Option<Arc<ModelRegistry>>>,
}

impl RegistryCell {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    /// Create a cell that already holds `registry`
    pub fn ready(registry: ModelRegistry) -> Self {
        let cell = Self::new();
        cell.publish(registry);
        cell
    }

    /// Replace the current registry (no merge with the previous one)
    pub fn publish(&self, registry: ModelRegistry) {
        self.tx.send_replace(Some(Arc::new(registry)));
    }

    /// Current registry, if discovery has completed
    pub fn try_snapshot(&self) -> Option<Arc<ModelRegistry>> {
        self.tx.borrow().clone()
    }

    /// Current registry, waiting for the first publication if necessary
    pub async fn snapshot(&self) -> Arc<ModelRegistry> {
        let mut rx = self.tx.subscribe();
        loop {
            if let Some(registry) = rx.borrow_and_update().clone() {
                return registry;
            }
            // The sender lives in `self`, so the channel cannot close while we wait
            if rx.changed().await.is_err() {
                return Arc::new(ModelRegistry::default());
            }
        }
    }
}

impl Default for RegistryCell {
    fn default() -> Self {
        Self::new()
    }
}
