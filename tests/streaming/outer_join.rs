use skiff::{JoinConfig, JoinKind, JoinSide, TwoInputOperator};
use skiff_test_utils::{delete, insert, render, row};

use crate::common::{batching, native, open, users_orders};

fn left(op: &mut dyn TwoInputOperator, record: skiff::ChangeRecord) -> Vec<String> {
    render(&op.process_batch(JoinSide::Left, vec![record]).unwrap())
}

fn right(op: &mut dyn TwoInputOperator, record: skiff::ChangeRecord) -> Vec<String> {
    render(&op.process_batch(JoinSide::Right, vec![record]).unwrap())
}

fn left_outer_lifecycle(config: JoinConfig) {
    let mut op = open(&users_orders(JoinKind::Left), config);
    let op = op.as_mut();
    assert_eq!(left(op, insert(row![1, "ann"])), vec!["+I(1, ann, NULL, NULL)"]);
    assert_eq!(
        right(op, insert(row![1, "book"])),
        vec!["-D(1, ann, NULL, NULL)", "+I(1, ann, 1, book)"]
    );
    assert_eq!(right(op, insert(row![1, "pen"])), vec!["+I(1, ann, 1, pen)"]);
    assert_eq!(right(op, delete(row![1, "book"])), vec!["-D(1, ann, 1, book)"]);
    assert_eq!(
        right(op, delete(row![1, "pen"])),
        vec!["-D(1, ann, 1, pen)", "+I(1, ann, NULL, NULL)"]
    );
    assert_eq!(left(op, delete(row![1, "ann"])), vec!["-D(1, ann, NULL, NULL)"]);
    assert!(op.close().unwrap().is_empty());
}

#[test]
fn test_left_outer_retraction_native() {
    left_outer_lifecycle(native());
}

#[test]
fn test_left_outer_retraction_mini_batch_of_one() {
    left_outer_lifecycle(batching(1));
}

#[test]
fn test_right_outer_pads_left_side() {
    let mut op = open(&users_orders(JoinKind::Right), native());
    let op = op.as_mut();
    assert_eq!(right(op, insert(row![2, "cup"])), vec!["+I(NULL, NULL, 2, cup)"]);
    assert!(left(op, insert(row![3, "bob"])).is_empty());
    assert_eq!(
        left(op, insert(row![2, "cat"])),
        vec!["-D(NULL, NULL, 2, cup)", "+I(2, cat, 2, cup)"]
    );
}

#[test]
fn test_full_outer_both_sides() {
    let mut op = open(&users_orders(JoinKind::Full), native());
    let op = op.as_mut();
    assert_eq!(left(op, insert(row![1, "ann"])), vec!["+I(1, ann, NULL, NULL)"]);
    assert_eq!(right(op, insert(row![2, "cup"])), vec!["+I(NULL, NULL, 2, cup)"]);
    assert_eq!(
        right(op, insert(row![1, "pen"])),
        vec!["-D(1, ann, NULL, NULL)", "+I(1, ann, 1, pen)"]
    );
    assert_eq!(
        left(op, delete(row![1, "ann"])),
        vec!["-D(1, ann, 1, pen)", "+I(NULL, NULL, 1, pen)"]
    );
}

#[test]
fn test_null_key_rows_stay_padded() {
    let mut op = open(&users_orders(JoinKind::Full), native());
    let op = op.as_mut();
    assert_eq!(
        left(op, insert(row![None::<i32>, "ann"])),
        vec!["+I(NULL, ann, NULL, NULL)"]
    );
    assert_eq!(
        right(op, insert(row![None::<i32>, "pen"])),
        vec!["+I(NULL, NULL, NULL, pen)"]
    );
}
