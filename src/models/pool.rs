//! Account pool and least-recently-used selection
//!
//! The pool owns the mutable health state of every configured Retool account.
//! All state lives behind one `tokio::sync::Mutex`: a selection reads
//! eligibility and stamps `last_used` inside a single critical section, so two
//! concurrent requests can never both pick the same least-recently-used
//! account. The lock is never held across an upstream call.
//!
//! Eligibility for a model:
//! - the account is still valid (never rejected by the upstream)
//! - fewer than `max_errors` errors, or at least `cooldown` since last use
//! - the account has an agent bound to the model
//!
//! Eligible accounts are ordered by (last used, error count, pool position);
//! accounts that were never used sort first. Recency is a per-pool selection
//! sequence rather than the clock, so selections stamped with the same
//! `Instant` still rotate.

use crate::config::{AccountConfig, PoolConfig};
use crate::models::registry::ModelRecord;
use crate::upstream::UpstreamError;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Position of an account in the configuration (stable for the process lifetime)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AccountId(pub usize);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "account-{}", self.0)
    }
}

/// Mutable health state of one account
///
/// Fields are private; they only change through [`AccountPool`] methods.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountHealth {
    valid: bool,
    error_count: u32,
    last_used: Option<Instant>,
    /// Selection sequence number of the last use; 0 when never used
    last_sequence: u64,
}

impl AccountHealth {
    fn new() -> Self {
        Self {
            valid: true,
            error_count: 0,
            last_used: None,
            last_sequence: 0,
        }
    }

    /// False once the upstream has rejected this account's credentials
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Errors since the last success
    pub fn error_count(&self) -> u32 {
        self.error_count
    }

    /// When the account was last selected, if ever
    pub fn last_used(&self) -> Option<Instant> {
        self.last_used
    }

    fn is_available(&self, now: Instant, max_errors: u32, cooldown: Duration) -> bool {
        if !self.valid {
            return false;
        }
        if self.error_count < max_errors {
            return true;
        }
        match self.last_used {
            Some(last) => now.saturating_duration_since(last) >= cooldown,
            None => true,
        }
    }
}

#[derive(Debug)]
struct AccountEntry {
    config: Arc<AccountConfig>,
    health: AccountHealth,
}

/// The account and agent chosen for one attempt
#[derive(Debug, Clone)]
pub struct Selection {
    pub account: AccountId,
    pub config: Arc<AccountConfig>,
    pub agent_id: String,
}

impl Selection {
    pub fn domain(&self) -> &str {
        self.config.domain_name()
    }
}

/// Result of recording a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureRecord {
    pub error_count: u32,
    /// True when this failure disabled the account
    pub invalidated: bool,
}

/// Point-in-time view of one account, for status reporting
#[derive(Debug, Clone)]
pub struct AccountStatus {
    pub account: AccountId,
    pub domain: String,
    pub health: AccountHealth,
}

/// Shared pool of Retool accounts
#[derive(Debug)]
pub struct AccountPool {
    entries: Mutex<Vec<AccountEntry>>,
    configs: Vec<Arc<AccountConfig>>,
    max_errors: u32,
    cooldown: Duration,
}

impl AccountPool {
    /// Create a pool with every account valid, error-free, and never used
    pub fn new(accounts: &[AccountConfig], config: &PoolConfig) -> Self {
        let configs: Vec<Arc<AccountConfig>> =
            accounts.iter().cloned().map(Arc::new).collect();
        let entries = configs
            .iter()
            .map(|config| AccountEntry {
                config: config.clone(),
                health: AccountHealth::new(),
            })
            .collect();

        tracing::info!(
            total_accounts = configs.len(),
            max_errors = config.max_errors,
            cooldown_seconds = config.cooldown_seconds,
            "Account pool initialized"
        );

        Self {
            entries: Mutex::new(entries),
            configs,
            max_errors: config.max_errors,
            cooldown: config.cooldown(),
        }
    }

    /// Number of configured accounts (the per-request attempt budget)
    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }

    /// Immutable account configurations in pool order
    pub fn accounts(&self) -> impl Iterator<Item = (AccountId, &Arc<AccountConfig>)> {
        self.configs
            .iter()
            .enumerate()
            .map(|(index, config)| (AccountId(index), config))
    }

    /// Select an account for `model`, stamping it as used now
    pub async fn select(&self, model: &ModelRecord) -> Option<Selection> {
        self.select_at(model, Instant::now()).await
    }

    /// Select an account for `model` that is not in `tried`
    ///
    /// Used for failover within one request: accounts that already failed
    /// the request are skipped even while they are still eligible.
    pub async fn select_excluding(
        &self,
        model: &ModelRecord,
        tried: &HashSet<AccountId>,
    ) -> Option<Selection> {
        self.pick(model, Instant::now(), tried).await
    }

    /// Select an account for `model` as of `now`
    ///
    /// Returns `None` when no account is eligible. The chosen account's
    /// `last_used` is set to `now` before the lock is released.
    pub async fn select_at(&self, model: &ModelRecord, now: Instant) -> Option<Selection> {
        self.pick(model, now, &HashSet::new()).await
    }

    async fn pick(
        &self,
        model: &ModelRecord,
        now: Instant,
        tried: &HashSet<AccountId>,
    ) -> Option<Selection> {
        let mut entries = self.entries.lock().await;

        let chosen = entries
            .iter()
            .enumerate()
            .filter(|(index, _)| !tried.contains(&AccountId(*index)))
            .filter(|(_, entry)| entry.health.is_available(now, self.max_errors, self.cooldown))
            .filter_map(|(index, entry)| {
                model
                    .agent_for(AccountId(index))
                    .map(|agent_id| (index, entry, agent_id))
            })
            .min_by_key(|(index, entry, _)| {
                (entry.health.last_sequence, entry.health.error_count, *index)
            })
            .map(|(index, _, agent_id)| (index, agent_id.to_string()));

        let Some((index, agent_id)) = chosen else {
            tracing::debug!(
                model = %model.id,
                bound_accounts = model.bindings.len(),
                "No eligible account for model"
            );
            return None;
        };

        let sequence = entries
            .iter()
            .map(|e| e.health.last_sequence)
            .max()
            .unwrap_or(0)
            + 1;
        let entry = &mut entries[index];
        entry.health.last_used = Some(now);
        entry.health.last_sequence = sequence;

        tracing::debug!(
            model = %model.id,
            account = %AccountId(index),
            domain = %entry.config.domain_name(),
            agent_id = %agent_id,
            error_count = entry.health.error_count,
            "Selected account"
        );

        Some(Selection {
            account: AccountId(index),
            config: entry.config.clone(),
            agent_id,
        })
    }

    /// Record a successful attempt: the error streak is over
    pub async fn record_success(&self, account: AccountId) {
        let mut entries = self.entries.lock().await;
        let Some(entry) = entries.get_mut(account.0) else {
            tracing::warn!(account = %account, "Attempted to record success for unknown account");
            return;
        };

        if entry.health.error_count > 0 {
            tracing::info!(
                account = %account,
                domain = %entry.config.domain_name(),
                previous_errors = entry.health.error_count,
                "Account recovered"
            );
        }
        entry.health.error_count = 0;
    }

    /// Record a failed attempt
    ///
    /// Every failure counts toward the cool-down threshold. An authorization
    /// failure also disables the account for the rest of the process lifetime.
    pub async fn record_failure(&self, account: AccountId, error: &UpstreamError) -> FailureRecord {
        let mut entries = self.entries.lock().await;
        let Some(entry) = entries.get_mut(account.0) else {
            tracing::warn!(account = %account, "Attempted to record failure for unknown account");
            return FailureRecord {
                error_count: 0,
                invalidated: false,
            };
        };

        entry.health.error_count = entry.health.error_count.saturating_add(1);
        let invalidated = error.is_unauthorized() && entry.health.valid;
        if error.is_unauthorized() {
            entry.health.valid = false;
        }

        if invalidated {
            tracing::warn!(
                account = %account,
                domain = %entry.config.domain_name(),
                error = %error,
                "Account credentials rejected, disabling account"
            );
        } else if entry.health.error_count == self.max_errors {
            tracing::warn!(
                account = %account,
                domain = %entry.config.domain_name(),
                error_count = entry.health.error_count,
                cooldown_seconds = self.cooldown.as_secs(),
                "Account entering cool-down"
            );
        }

        FailureRecord {
            error_count: entry.health.error_count,
            invalidated,
        }
    }

    /// Snapshot every account's health
    pub async fn statuses(&self) -> Vec<AccountStatus> {
        let entries = self.entries.lock().await;
        entries
            .iter()
            .enumerate()
            .map(|(index, entry)| AccountStatus {
                account: AccountId(index),
                domain: entry.config.domain_name().to_string(),
                health: entry.health.clone(),
            })
            .collect()
    }

    /// Accounts that are valid and not cooling down, regardless of model
    pub async fn available_count(&self) -> usize {
        let now = Instant::now();
        let entries = self.entries.lock().await;
        entries
            .iter()
            .filter(|entry| entry.health.is_available(now, self.max_errors, self.cooldown))
            .count()
    }
}
