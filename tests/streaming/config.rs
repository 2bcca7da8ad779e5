use std::time::Duration;

use skiff::{Error, JoinConfig, JoinKind, JoinStrategy};
use skiff_test_utils::{assert_error_contains, insert, render, row};

use crate::common::{open, translate, users_orders};

#[test]
fn test_toml_config_enables_mini_batch() {
    let config = JoinConfig::from_toml_str(
        r#"
        [mini_batch]
        enabled = true
        allow_latency_ms = 500
        size = 2

        [state]
        ttl_ms = 60000
        "#,
    )
    .unwrap();
    assert_eq!(config.state.ttl(), Duration::from_secs(60));
    assert_eq!(config.native.max_pairs_per_probe, 8192);

    let join = translate(&users_orders(JoinKind::Left), config).unwrap();
    match join.strategy {
        JoinStrategy::MiniBatch(strategy) => {
            assert!(strategy.left_outer);
            assert!(!strategy.right_outer);
            assert_eq!(strategy.size, 2);
        }
        other => panic!("expected mini-batch strategy, got {}", other),
    }
}

#[test]
fn test_runtime_options_select_strategy() {
    let mut config = JoinConfig::new();
    config.set("table.exec.mini-batch.enabled", "true").unwrap();
    config.set("table.exec.mini-batch.allow-latency", "5 s").unwrap();
    config.set("table.exec.mini-batch.size", "1").unwrap();
    config.set("table.exec.state.ttl", "2 min").unwrap();
    assert_eq!(config.mini_batch.allow_latency_ms, 5_000);
    assert_eq!(config.state.ttl_ms, 120_000);

    let mut op = open(&users_orders(JoinKind::Inner), config);
    assert_eq!(op.name(), "MiniBatchJoin");
    assert!(op.process_left(insert(row![1, "ann"])).unwrap().is_empty());
    let out = op.process_right(insert(row![1, "pen"])).unwrap();
    assert_eq!(render(&out), vec!["+I(1, ann, 1, pen)"]);
}

#[test]
fn test_enabled_mini_batch_needs_size_and_latency() {
    let mut config = JoinConfig::new();
    config.set("table.exec.mini-batch.enabled", "true").unwrap();
    let result = translate(&users_orders(JoinKind::Inner), config);
    assert!(matches!(result, Err(Error::InvalidConfig(_))));
}

#[test]
fn test_invalid_options_are_rejected() {
    let mut config = JoinConfig::new();
    assert_error_contains(config.set("table.exec.mini-batch.size", "many"), &["integer"]);
    assert_error_contains(config.set("table.exec.state.ttl", "3 weeks"), &["unit"]);
    assert_error_contains(config.set("table.exec.mini-batch.enabled", "yes"), &["true or false"]);
    assert_error_contains(config.set("native.unknown", "1"), &["unknown option"]);
    assert_eq!(config, JoinConfig::new());
}

#[test]
fn test_toml_rejects_bad_compaction_threshold() {
    let result = JoinConfig::from_toml_str(
        r#"
        [native]
        compaction_threshold = 1.5
        "#,
    );
    assert_error_contains(result, &["compaction-threshold"]);
}

#[test]
fn test_config_survives_toml_round_trip() {
    let config = JoinConfig::new()
        .with_mini_batch(250, 64)
        .with_state_ttl(Duration::from_secs(30));
    let text = config.to_toml_string().unwrap();
    assert_eq!(JoinConfig::from_toml_str(&text).unwrap(), config);
}
