//! Concurrent account selection
//!
//! Selection reads eligibility and stamps the chosen account under one lock,
//! so simultaneous requests must fan out across the pool instead of piling
//! onto the same least-recently-used account.

use futures::future::join_all;
use rever::config::{AccountConfig, PoolConfig};
use rever::models::{AccountId, AccountPool, ModelRegistry};
use rever::upstream::{Agent, UpstreamError};
use std::collections::HashSet;
use std::sync::Arc;

fn pool_and_registry(size: usize) -> (Arc<AccountPool>, ModelRegistry) {
    let accounts: Vec<AccountConfig> = (0..size)
        .map(|i| AccountConfig::new(format!("team-{}.retool.com", i), "xsrf", "token"))
        .collect();
    let pool = Arc::new(AccountPool::new(&accounts, &PoolConfig::default()));
    let registry = ModelRegistry::from_agents(
        (0..size)
            .map(|i| {
                (
                    AccountId(i),
                    vec![Agent::new(
                        format!("agent-{}", i),
                        "Sonnet",
                        "claude-sonnet-4-20250522",
                    )],
                )
            })
            .collect(),
    );
    (pool, registry)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_selections_pick_distinct_accounts() {
    const ACCOUNTS: usize = 16;
    let (pool, registry) = pool_and_registry(ACCOUNTS);
    let model = Arc::new(registry.get("claude-sonnet-4").unwrap().clone());

    let handles: Vec<_> = (0..ACCOUNTS)
        .map(|_| {
            let pool = pool.clone();
            let model = model.clone();
            tokio::spawn(async move { pool.select(&model).await })
        })
        .collect();

    let picked: Vec<AccountId> = join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.expect("task panicked").expect("an account").account)
        .collect();

    let distinct: HashSet<AccountId> = picked.iter().copied().collect();
    assert_eq!(
        distinct.len(),
        ACCOUNTS,
        "every concurrent request should get its own account: {:?}",
        picked
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_rounds_keep_rotating() {
    const ACCOUNTS: usize = 4;
    const ROUNDS: usize = 5;
    let (pool, registry) = pool_and_registry(ACCOUNTS);
    let model = Arc::new(registry.get("claude-sonnet-4").unwrap().clone());

    for round in 0..ROUNDS {
        let picked: Vec<AccountId> = join_all((0..ACCOUNTS).map(|_| {
            let pool = pool.clone();
            let model = model.clone();
            tokio::spawn(async move { pool.select(&model).await })
        }))
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap().account)
        .collect();

        let distinct: HashSet<AccountId> = picked.iter().copied().collect();
        assert_eq!(distinct.len(), ACCOUNTS, "round {}: {:?}", round, picked);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_failures_are_all_counted() {
    let (pool, _) = pool_and_registry(1);
    let error = UpstreamError::Unreachable {
        domain: "team-0.retool.com".to_string(),
        operation: "open_thread",
        reason: "HTTP 502".to_string(),
    };

    join_all((0..50).map(|_| {
        let pool = pool.clone();
        let error = error.clone();
        tokio::spawn(async move { pool.record_failure(AccountId(0), &error).await })
    }))
    .await;

    assert_eq!(pool.statuses().await[0].health.error_count(), 50);
}
