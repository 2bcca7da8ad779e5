use skiff::{JoinKind, JoinSide, JoinStrategy};
use skiff_test_utils::{delete, insert, render, row, sorted};

use crate::common::{batching, open, translate, users_orders};

#[test]
fn test_batching_selects_mini_batch_strategy() {
    let join = translate(&users_orders(JoinKind::Full), batching(4)).unwrap();
    let JoinStrategy::MiniBatch(strategy) = join.strategy else {
        panic!("expected mini-batch, got {}", join.strategy);
    };
    assert!(strategy.left_outer && strategy.right_outer);
    assert_eq!(strategy.size, 4);
    assert_eq!(join.operator.name(), "MiniBatchJoin");
}

#[test]
fn test_nothing_is_emitted_before_a_trigger() {
    let mut op = open(&users_orders(JoinKind::Inner), batching(100));
    assert!(op.process_left(insert(row![1, "ann"])).unwrap().is_empty());
    assert!(op.process_right(insert(row![1, "pen"])).unwrap().is_empty());
    assert!(op.on_timer(999).unwrap().is_empty());
    assert_eq!(render(&op.on_timer(1_000).unwrap()), vec!["+I(1, ann, 1, pen)"]);
    assert_eq!(op.metrics().get_mini_batch_flushes(), 1);
}

#[test]
fn test_watermark_flushes_left_before_right() {
    let mut op = open(&users_orders(JoinKind::Left), batching(100));
    op.process_right(insert(row![1, "pen"])).unwrap();
    op.process_left(insert(row![1, "ann"])).unwrap();
    assert_eq!(
        render(&op.on_watermark(5).unwrap()),
        vec![
            "+I(1, ann, NULL, NULL)",
            "-D(1, ann, NULL, NULL)",
            "+I(1, ann, 1, pen)",
        ]
    );
}

#[test]
fn test_cancelling_changes_fold_away() {
    let mut op = open(&users_orders(JoinKind::Left), batching(100));
    op.process_batch(
        JoinSide::Left,
        vec![insert(row![1, "ann"]), insert(row![2, "bob"]), delete(row![1, "ann"])],
    )
    .unwrap();
    assert_eq!(sorted(&op.close().unwrap()), vec!["+I(2, bob, NULL, NULL)"]);
    assert_eq!(op.metrics().get_records_in(JoinSide::Left), 3);
}

#[test]
fn test_size_counts_both_inputs() {
    let mut op = open(&users_orders(JoinKind::Inner), batching(3));
    op.process_left(insert(row![1, "ann"])).unwrap();
    op.process_right(insert(row![1, "pen"])).unwrap();
    let out = op.process_right(insert(row![1, "cup"])).unwrap();
    assert_eq!(sorted(&out), vec!["+I(1, ann, 1, cup)", "+I(1, ann, 1, pen)"]);
}
