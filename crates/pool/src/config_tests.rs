// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[derive(Deserialize)]
struct Wrapper {
    wait: WaitPolicy,
}

#[yare::parameterized(
    fail_fast  = { r#"wait = "fail-fast""#,             WaitPolicy::FailFast },
    indefinite = { r#"wait = "indefinite""#,            WaitPolicy::Indefinite },
    bounded    = { r#"wait = { max_wait = "30s" }"#,    WaitPolicy::Bounded(Duration::from_secs(30)) },
    bounded_ms = { r#"wait = { max_wait = "250ms" }"#,  WaitPolicy::Bounded(Duration::from_millis(250)) },
)]
fn wait_policy_parses(input: &str, expected: WaitPolicy) {
    let w: Wrapper = toml::from_str(input).unwrap();
    assert_eq!(w.wait, expected);
}

#[test]
fn wait_policy_rejects_unknown_keyword() {
    assert!(toml::from_str::<Wrapper>(r#"wait = "forever-ish""#).is_err());
}

#[test]
fn pool_config_defaults() {
    let config: PoolConfig = toml::from_str(r#"name = "main""#).unwrap();
    assert_eq!(config, PoolConfig::new("main"));
    assert_eq!(config.max_failures, 3);
    assert_eq!(config.wait, WaitPolicy::FailFast);
    assert!(!config.retry_failed);
}
