use proptest::prelude::*;
use skiff::{
    BinaryOp, ChangeRecord, DataType, Expr, JoinKind, JoinRequest, JoinSide, JoinSpec, Row,
    RowKind, Value,
};
use skiff_test_utils::{net_rows, row};

use crate::common::{batching, native, open, orders, run, users, users_orders};

#[derive(Debug, Clone)]
struct Change {
    side: JoinSide,
    row: Row,
    /// Retracts an earlier accumulate of the same side when one is live.
    retract: bool,
    updating: bool,
}

fn change() -> impl Strategy<Value = Change> {
    (
        any::<bool>(),
        prop::option::weighted(0.85, 0i32..3),
        prop::sample::select(vec!["a", "b"]),
        prop::bool::weighted(0.35),
        any::<bool>(),
    )
        .prop_map(|(left, id, text, retract, updating)| Change {
            side: if left { JoinSide::Left } else { JoinSide::Right },
            row: row![id, text],
            retract,
            updating,
        })
}

/// Upsert key declared on each input.
#[derive(Debug, Clone, Default)]
struct UpsertKeys {
    left: Option<Vec<usize>>,
    right: Option<Vec<usize>>,
}

impl UpsertKeys {
    fn get(&self, side: JoinSide) -> Option<&[usize]> {
        match side {
            JoinSide::Left => self.left.as_deref(),
            JoinSide::Right => self.right.as_deref(),
        }
    }
}

/// No key, the join key column, or the text column.
fn upsert_key() -> impl Strategy<Value = Option<Vec<usize>>> {
    prop::sample::select(vec![None, Some(vec![0]), Some(vec![1])])
}

fn upsert_keys() -> impl Strategy<Value = UpsertKeys> {
    (upsert_key(), upsert_key()).prop_map(|(left, right)| UpsertKeys { left, right })
}

/// Non-equi part of the join condition, over `users ++ orders`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Filter {
    None,
    /// `name <> item`
    TextDiffers,
    /// `id / user_id > 0`; a zero divisor gives NULL.
    PositiveQuotient,
}

impl Filter {
    fn expr(self) -> Option<Expr> {
        match self {
            Filter::None => None,
            Filter::TextDiffers => Some(Expr::binary(
                Expr::input_ref(1, DataType::String),
                BinaryOp::NotEq,
                Expr::input_ref(3, DataType::String),
            )),
            Filter::PositiveQuotient => Some(Expr::gt(
                Expr::binary(
                    Expr::input_ref(0, DataType::Integer),
                    BinaryOp::Divide,
                    Expr::input_ref(2, DataType::Integer),
                ),
                Expr::literal(Value::Integer(0), DataType::Integer),
            )),
        }
    }

    fn accepts(self, l: &Row, r: &Row) -> bool {
        match self {
            Filter::None => true,
            Filter::TextDiffers => l.get(1) != r.get(1),
            Filter::PositiveQuotient => match (l.get(0), r.get(0)) {
                (Some(Value::Integer(a)), Some(Value::Integer(b))) if *b != 0 => a / b > 0,
                _ => false,
            },
        }
    }
}

fn filter() -> impl Strategy<Value = Filter> {
    prop::sample::select(vec![Filter::None, Filter::TextDiffers, Filter::PositiveQuotient])
}

fn request(kind: JoinKind, filter: Filter, keys: &UpsertKeys) -> JoinRequest {
    let mut spec = JoinSpec::new(kind, vec![0], vec![0]);
    if let Some(predicate) = filter.expr() {
        spec = spec.with_non_equi_condition(predicate);
    }
    let mut request = JoinRequest::new(spec, users(), orders());
    for side in [JoinSide::Left, JoinSide::Right] {
        if let Some(key) = keys.get(side) {
            request = request.with_upsert_keys(side, vec![key.to_vec()]);
        }
    }
    request
}

/// Turns raw changes into a valid change log: retractions only target rows
/// that are live on that side, and a side with an upsert key never holds two
/// live rows with the same key. A change to a live key becomes an
/// `-U old` / `+U new` pair.
fn change_log(
    changes: Vec<Change>,
    keys: &UpsertKeys,
) -> (Vec<(JoinSide, ChangeRecord)>, Vec<Row>, Vec<Row>) {
    let mut left: Vec<Row> = Vec::new();
    let mut right: Vec<Row> = Vec::new();
    let mut log = Vec::new();
    for Change { side, row, retract, updating } in changes {
        let live = match side {
            JoinSide::Left => &mut left,
            JoinSide::Right => &mut right,
        };
        let retraction = if updating { RowKind::UpdateBefore } else { RowKind::Delete };
        let accumulation = if updating { RowKind::UpdateAfter } else { RowKind::Insert };

        let Some(key) = keys.get(side) else {
            let kind = match live.iter().position(|r| r == &row) {
                Some(i) if retract => {
                    live.swap_remove(i);
                    retraction
                }
                _ => {
                    live.push(row.clone());
                    accumulation
                }
            };
            log.push((side, ChangeRecord::new(kind, row)));
            continue;
        };

        let identity = row.project(key);
        match live.iter().position(|r| r.project(key) == identity) {
            Some(i) if retract => {
                let old = live.swap_remove(i);
                log.push((side, ChangeRecord::new(retraction, old)));
            }
            Some(i) if live[i] != row => {
                let old = std::mem::replace(&mut live[i], row.clone());
                log.push((side, ChangeRecord::new(RowKind::UpdateBefore, old)));
                log.push((side, ChangeRecord::new(RowKind::UpdateAfter, row)));
            }
            Some(_) => {}
            None => {
                live.push(row.clone());
                log.push((side, ChangeRecord::new(accumulation, row)));
            }
        }
    }
    (log, left, right)
}

fn joins(filter: Filter, l: &Row, r: &Row) -> bool {
    let keys_match = match (l.get(0), r.get(0)) {
        (Some(Value::Null), _) | (_, Some(Value::Null)) => false,
        (a, b) => a == b,
    };
    keys_match && filter.accepts(l, r)
}

/// The join of the final input contents, computed from scratch.
fn recompute(kind: JoinKind, filter: Filter, left: &[Row], right: &[Row]) -> Vec<Row> {
    let mut out = Vec::new();
    if kind.is_semi_or_anti() {
        let anti = kind == JoinKind::Anti;
        for l in left {
            let matched = right.iter().any(|r| joins(filter, l, r));
            if matched != anti {
                out.push(l.clone());
            }
        }
    } else {
        for l in left {
            let partners: Vec<&Row> = right.iter().filter(|r| joins(filter, l, r)).collect();
            out.extend(partners.iter().map(|r| l.concat(r)));
            if partners.is_empty() && kind.is_outer(JoinSide::Left) {
                out.push(l.concat(&Row::nulls(2)));
            }
        }
        if kind.is_outer(JoinSide::Right) {
            for r in right {
                if !left.iter().any(|l| joins(filter, l, r)) {
                    out.push(Row::nulls(2).concat(r));
                }
            }
        }
    }
    out.sort_by_key(ToString::to_string);
    out
}

fn outer_kind() -> impl Strategy<Value = JoinKind> {
    prop::sample::select(vec![JoinKind::Inner, JoinKind::Left, JoinKind::Right, JoinKind::Full])
}

fn semi_or_anti() -> impl Strategy<Value = JoinKind> {
    prop::sample::select(vec![JoinKind::Semi, JoinKind::Anti])
}

#[test]
fn test_zero_divisor_predicate_agrees_across_strategies() {
    let request = request(JoinKind::Left, Filter::PositiveQuotient, &UpsertKeys::default());
    let input = vec![
        (JoinSide::Left, ChangeRecord::insert(row![Some(0), "a"])),
        (JoinSide::Right, ChangeRecord::insert(row![Some(0), "x"])),
        (JoinSide::Left, ChangeRecord::insert(row![Some(2), "b"])),
        (JoinSide::Right, ChangeRecord::insert(row![Some(2), "y"])),
    ];
    let expected = vec![
        row![Some(0), "a", None::<i32>, None::<&str>],
        row![Some(2), "b", Some(2), "y"],
    ];

    let mut bridged = open(&request, native());
    assert_eq!(net_rows(&run(bridged.as_mut(), &input)), expected);

    let mut batched = open(&request, batching(2));
    assert_eq!(net_rows(&run(batched.as_mut(), &input)), expected);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_prop_native_bridge_matches_recomputation(
        kind in outer_kind(),
        changes in prop::collection::vec(change(), 0..40),
    ) {
        let (log, left, right) = change_log(changes, &UpsertKeys::default());
        let mut op = open(&users_orders(kind), native());
        let out = run(op.as_mut(), &log);
        prop_assert!(out.iter().all(|r| matches!(r.kind, RowKind::Insert | RowKind::Delete)));
        prop_assert_eq!(net_rows(&out), recompute(kind, Filter::None, &left, &right));
    }

    #[test]
    fn test_prop_native_bridge_with_keys_and_filter(
        kind in outer_kind(),
        filter in filter(),
        keys in upsert_keys(),
        changes in prop::collection::vec(change(), 0..40),
    ) {
        let (log, left, right) = change_log(changes, &keys);
        let mut op = open(&request(kind, filter, &keys), native());
        let out = run(op.as_mut(), &log);
        prop_assert_eq!(net_rows(&out), recompute(kind, filter, &left, &right));
    }

    #[test]
    fn test_prop_mini_batch_matches_recomputation(
        kind in outer_kind(),
        size in 1usize..6,
        changes in prop::collection::vec(change(), 0..40),
    ) {
        let (log, left, right) = change_log(changes, &UpsertKeys::default());
        let mut op = open(&users_orders(kind), batching(size));
        let out = run(op.as_mut(), &log);
        prop_assert_eq!(net_rows(&out), recompute(kind, Filter::None, &left, &right));
    }

    #[test]
    fn test_prop_mini_batch_with_keys_and_filter(
        kind in outer_kind(),
        filter in filter(),
        keys in upsert_keys(),
        size in 1usize..6,
        changes in prop::collection::vec(change(), 0..40),
    ) {
        let (log, left, right) = change_log(changes, &keys);
        let mut op = open(&request(kind, filter, &keys), batching(size));
        let out = run(op.as_mut(), &log);
        prop_assert_eq!(net_rows(&out), recompute(kind, filter, &left, &right));
    }

    #[test]
    fn test_prop_semi_anti_matches_recomputation(
        kind in semi_or_anti(),
        changes in prop::collection::vec(change(), 0..40),
    ) {
        let (log, left, right) = change_log(changes, &UpsertKeys::default());
        let mut op = open(&users_orders(kind), native());
        let out = run(op.as_mut(), &log);
        prop_assert_eq!(net_rows(&out), recompute(kind, Filter::None, &left, &right));
    }

    #[test]
    fn test_prop_semi_anti_with_keys_and_filter(
        kind in semi_or_anti(),
        filter in filter(),
        keys in upsert_keys(),
        changes in prop::collection::vec(change(), 0..40),
    ) {
        let (log, left, right) = change_log(changes, &keys);
        let mut op = open(&request(kind, filter, &keys), native());
        let out = run(op.as_mut(), &log);
        prop_assert_eq!(net_rows(&out), recompute(kind, filter, &left, &right));
    }
}
