use std::time::Duration;

use skiff::{JoinConfig, JoinKind, JoinSide};
use skiff_test_utils::{insert, render, row};

use crate::common::{batching, native, open, users_orders};

fn expires_idle_rows(config: JoinConfig) {
    let config = config.with_state_ttl(Duration::from_millis(100));
    let mut op = open(&users_orders(JoinKind::Inner), config);
    op.on_timer(10).unwrap();
    op.process_left(insert(row![1, "ann"])).unwrap();
    op.on_watermark(50).unwrap();
    op.process_left(insert(row![2, "bob"])).unwrap();

    op.on_timer(110).unwrap();
    assert_eq!(op.metrics().get_expired_rows(), 1);

    let mut out = op.process_right(insert(row![1, "pen"])).unwrap();
    out.extend(op.process_right(insert(row![2, "cup"])).unwrap());
    out.extend(op.on_watermark(120).unwrap());
    out.extend(op.close().unwrap());
    assert_eq!(render(&out), vec!["+I(2, bob, 2, cup)"]);
}

#[test]
fn test_native_bridge_expires_idle_rows() {
    expires_idle_rows(native());
}

#[test]
fn test_mini_batch_expires_idle_rows() {
    expires_idle_rows(batching(1));
}

#[test]
fn test_zero_ttl_keeps_state() {
    let mut op = open(&users_orders(JoinKind::Inner), native());
    op.process_left(insert(row![1, "ann"])).unwrap();
    op.on_timer(i64::MAX).unwrap();
    assert_eq!(op.metrics().get_expired_rows(), 0);
    assert_eq!(
        render(&op.process_batch(JoinSide::Right, vec![insert(row![1, "pen"])]).unwrap()),
        vec!["+I(1, ann, 1, pen)"]
    );
}

#[test]
fn test_per_side_hint_overrides_ttl() {
    let request = users_orders(JoinKind::Inner)
        .with_state_ttl_hint(JoinSide::Right, Duration::from_millis(10));
    let mut op = open(&request, native().with_state_ttl(Duration::from_secs(60)));
    op.process_left(insert(row![1, "ann"])).unwrap();
    op.process_right(insert(row![7, "pen"])).unwrap();
    op.on_timer(10).unwrap();
    assert_eq!(op.metrics().get_expired_rows(), 1);
    assert_eq!(
        render(&op.process_right(insert(row![1, "cup"])).unwrap()),
        vec!["+I(1, ann, 1, cup)"]
    );
}
