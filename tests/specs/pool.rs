// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::HashSet;
use std::sync::Arc;

use fleet_core::{AccountId, AccountRecord, AccountState, ReturnOutcome};
use fleet_pool::{PoolConfig, PoolError, PoolStats, SelectionPolicy};
use parking_lot::Mutex;

use crate::prelude::{accounts, static_pool};

#[tokio::test]
async fn most_packs_first_then_stats() {
    let (pool, _) = static_pool(
        PoolConfig::new("packs").policy(SelectionPolicy::most_first("packs")),
        vec![
            AccountRecord::new("B").with_field("packs", 2),
            AccountRecord::new("A").with_field("packs", 5),
        ],
    );

    let first = pool.checkout().await.unwrap();
    let second = pool.checkout().await.unwrap();
    assert_eq!(first.id, "A");
    assert_eq!(second.id, "B");

    pool.return_account(&first.id, ReturnOutcome::Succeeded).unwrap();
    pool.return_account(&second.id, ReturnOutcome::Released).unwrap();

    assert_eq!(
        pool.stats(),
        PoolStats {
            total: 2,
            available: 1,
            in_use: 0,
            completed: 1,
            failed: 0,
        }
    );
    assert!(matches!(pool.try_checkout(), Ok(a) if a.id == "B"));
}

#[tokio::test]
async fn refresh_preserves_in_use_accounts() {
    let (pool, source) = static_pool(PoolConfig::new("main"), accounts(&["a", "b", "c"]));
    let held: Vec<_> = (0..2).map(|_| pool.try_checkout().unwrap().id).collect();

    // Upstream now lists entirely different accounts.
    source.set(accounts(&["x", "y"]));
    let summary = pool.refresh().unwrap();

    let stats = pool.stats();
    assert_eq!(stats.in_use, 2);
    assert_eq!(stats.available, 2);
    for id in &held {
        assert_eq!(pool.account(id).unwrap().state, AccountState::InUse);
    }
    let mut orphaned = summary.orphaned.clone();
    orphaned.sort();
    let mut expected = held.clone();
    expected.sort();
    assert_eq!(orphaned, expected);

    // An orphan leaves the pool once it comes back.
    pool.return_account(&held[0], ReturnOutcome::Succeeded).unwrap();
    assert!(pool.account(&held[0]).is_none());
    assert_eq!(pool.stats().in_use, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_checkout_never_double_assigns() {
    let ids: Vec<String> = (0..4).map(|n| format!("acc-{n}")).collect();
    let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
    let (pool, _) = static_pool(PoolConfig::new("main"), accounts(&refs));
    let held: Arc<Mutex<HashSet<AccountId>>> = Arc::new(Mutex::new(HashSet::new()));

    let tasks: Vec<_> = (0..16)
        .map(|_| {
            let pool = Arc::clone(&pool);
            let held = Arc::clone(&held);
            tokio::spawn(async move {
                let mut done = 0;
                while done < 50 {
                    match pool.try_checkout() {
                        Ok(account) => {
                            assert!(held.lock().insert(account.id.clone()), "{} handed out twice", account.id);
                            tokio::task::yield_now().await;
                            held.lock().remove(&account.id);
                            pool.return_account(&account.id, ReturnOutcome::Released).unwrap();
                            done += 1;
                        }
                        Err(PoolError::ResourceExhausted) => tokio::task::yield_now().await,
                        Err(e) => panic!("unexpected pool error: {e}"),
                    }
                }
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap();
    }

    let stats = pool.stats();
    assert_eq!(stats.available, 4);
    assert_eq!(stats.in_use, 0);
}

#[tokio::test]
async fn closed_pool_refuses_checkout() {
    let (pool, _) = static_pool(PoolConfig::new("main"), accounts(&["a"]));
    pool.close();
    assert!(matches!(pool.try_checkout(), Err(PoolError::PoolClosed)));
}
