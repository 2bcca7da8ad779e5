use skiff::{JoinKind, JoinSide, JoinStrategy};
use skiff_test_utils::{delete, insert, render, row, update_before};

use crate::common::{batching, native, open, translate, users, users_orders};

#[test]
fn test_anti_join_with_batching_keeps_left_schema() {
    let join = translate(&users_orders(JoinKind::Anti), batching(10)).unwrap();
    assert!(matches!(join.strategy, JoinStrategy::SemiAnti(_)));
    assert_eq!(join.output_schema, users());
    assert_eq!(join.operator.output_schema(), &users());
    assert!(join.plan.is_none());
}

#[test]
fn test_semi_join_visibility_follows_matches() {
    let mut op = open(&users_orders(JoinKind::Semi), native());
    assert!(
        op.process_batch(JoinSide::Left, vec![insert(row![1, "ann"]), insert(row![2, "bob"])])
            .unwrap()
            .is_empty()
    );
    let out = op
        .process_batch(JoinSide::Right, vec![insert(row![1, "pen"]), insert(row![1, "cup"])])
        .unwrap();
    assert_eq!(render(&out), vec!["+I(1, ann)"]);
    assert!(op.process_right(delete(row![1, "pen"])).unwrap().is_empty());
    assert_eq!(
        render(&op.process_right(delete(row![1, "cup"])).unwrap()),
        vec!["-D(1, ann)"]
    );
}

#[test]
fn test_anti_join_forwards_update_kinds() {
    let mut op = open(&users_orders(JoinKind::Anti), native());
    assert_eq!(render(&op.process_left(insert(row![1, "ann"])).unwrap()), vec!["+I(1, ann)"]);
    assert_eq!(
        render(&op.process_left(update_before(row![1, "ann"])).unwrap()),
        vec!["-U(1, ann)"]
    );
    assert!(op.process_right(insert(row![1, "pen"])).unwrap().is_empty());
    assert!(op.process_left(insert(row![1, "amy"])).unwrap().is_empty());
    assert_eq!(
        render(&op.process_right(delete(row![1, "pen"])).unwrap()),
        vec!["+I(1, amy)"]
    );
}
