use skiff_common::error::Result;
use skiff_common::row::{ChangeRecord, Row};
use skiff_ir::{JoinKind, JoinSide};
use skiff_planner::{PreparedJoin, StateKeyWiring};
use tracing::trace;

use super::condition::JoinCondition;
use super::state::JoinRecordStateView;

/// Keyed inner/outer join over change-log inputs.
///
/// Each stored row carries the number of other-side rows it joins with. An
/// outer side emits its row padded with nulls while that number is zero; the
/// padded row is retracted when the first partner arrives and emitted again
/// when the last partner goes away.
#[derive(Debug)]
pub struct StreamingJoin {
    kind: JoinKind,
    condition: JoinCondition,
    key_wiring: StateKeyWiring,
    left: JoinRecordStateView,
    right: JoinRecordStateView,
    left_arity: usize,
    right_arity: usize,
}

impl StreamingJoin {
    pub fn new(prepared: &PreparedJoin) -> Self {
        Self {
            kind: prepared.kind(),
            condition: JoinCondition::new(&prepared.spec),
            key_wiring: prepared.key_wiring.clone(),
            left: JoinRecordStateView::new(
                prepared.left_input.clone(),
                prepared.retention.for_side(JoinSide::Left),
            ),
            right: JoinRecordStateView::new(
                prepared.right_input.clone(),
                prepared.retention.for_side(JoinSide::Right),
            ),
            left_arity: prepared.left_type.num_fields(),
            right_arity: prepared.right_type.num_fields(),
        }
    }

    pub fn state(&self, side: JoinSide) -> &JoinRecordStateView {
        match side {
            JoinSide::Left => &self.left,
            JoinSide::Right => &self.right,
        }
    }

    /// Applies one input record, appending the produced changes to `out`.
    pub fn process(
        &mut self,
        side: JoinSide,
        record: &ChangeRecord,
        now: i64,
        out: &mut Vec<ChangeRecord>,
    ) -> Result<()> {
        trace!(%side, record = %record, "streaming join input");
        let key = self.key_wiring.selector(side).get_key(&record.row);
        let input_outer = self.kind.is_outer(side);
        let other_outer = self.kind.is_outer(side.other());
        let accumulate = record.is_accumulate();
        let padding = Padding {
            left_arity: self.left_arity,
            right_arity: self.right_arity,
        };

        let Self {
            condition,
            left,
            right,
            ..
        } = &mut *self;
        let (input_state, other_state) = match side {
            JoinSide::Left => (left, right),
            JoinSide::Right => (right, left),
        };

        let can_match = condition.key_can_match(&key);
        if !accumulate && can_match {
            input_state.retract(&key, &record.row);
        }

        let mut matched = 0u64;
        if can_match {
            for entry in other_state.matching_mut(&key) {
                let (l, r) = ordered(side, &record.row, &entry.row);
                if !condition.matches(l, r)? {
                    continue;
                }
                let joined = l.concat(r);
                if accumulate {
                    if other_outer && entry.associations == 0 {
                        let padded = padding.pad(side.other(), &entry.row);
                        repeat(out, entry.count, || ChangeRecord::delete(padded.clone()));
                    }
                    entry.associations += 1;
                    repeat(out, entry.count, || ChangeRecord::insert(joined.clone()));
                } else {
                    repeat(out, entry.count, || ChangeRecord::delete(joined.clone()));
                    entry.associations = entry.associations.saturating_sub(1);
                    if other_outer && entry.associations == 0 {
                        let padded = padding.pad(side.other(), &entry.row);
                        repeat(out, entry.count, || ChangeRecord::insert(padded.clone()));
                    }
                }
                entry.touch(now);
                matched += entry.count;
            }
        }

        if matched == 0 && input_outer {
            let padded = padding.pad(side, &record.row);
            out.push(if accumulate {
                ChangeRecord::insert(padded)
            } else {
                ChangeRecord::delete(padded)
            });
        }

        if accumulate && can_match {
            input_state.add(key, record.row.clone(), matched, now);
        }
        Ok(())
    }

    /// Expires both sides; returns the number of rows dropped.
    pub fn expire(&mut self, now: i64) -> usize {
        self.left.expire(now) + self.right.expire(now)
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Padding {
    pub left_arity: usize,
    pub right_arity: usize,
}

impl Padding {
    /// `row` from `side` laid out in the output row with the other side null.
    pub fn pad(&self, side: JoinSide, row: &Row) -> Row {
        match side {
            JoinSide::Left => row.concat(&Row::nulls(self.right_arity)),
            JoinSide::Right => Row::nulls(self.left_arity).concat(row),
        }
    }
}

/// Orders an (input, other) pair as (left, right).
pub(crate) fn ordered<'a>(side: JoinSide, input: &'a Row, other: &'a Row) -> (&'a Row, &'a Row) {
    match side {
        JoinSide::Left => (input, other),
        JoinSide::Right => (other, input),
    }
}

fn repeat(out: &mut Vec<ChangeRecord>, count: u64, make: impl Fn() -> ChangeRecord) {
    for _ in 0..count {
        out.push(make());
    }
}
