use std::sync::Arc;

use datafusion::arrow::array::{ArrayRef, BooleanArray, UInt32Array};
use datafusion::arrow::compute::take;
use datafusion::arrow::datatypes::{Field, Schema};
use datafusion::physical_expr::PhysicalExpr;
use skiff_arrow::datatypes::SchemaRef;
use skiff_arrow::{RecordBatch, batch_to_rows};
use skiff_common::error::{Error, Result};
use skiff_common::row::{ChangeRecord, Row, RowKind};
use skiff_ir::{JoinSide, StateRetentionPolicy};
use skiff_planner::{NativeJoinKind, NativeJoinPlan, PlanNodeId};
use tracing::{debug, trace};

use super::buffer::SideBuffer;
use super::engine::{ChangeBatch, NativeTask, NativeTaskOptions};
use super::expr::{create_physical_expr, evaluate_predicate};

/// Executes a [`NativeJoinPlan`] in process.
///
/// Both sides are buffered as Arrow batches. An input row is probed against
/// the other side's buffer in chunks of candidate pairs laid out like the
/// output row, and the plan's condition is evaluated on each chunk. Every
/// buffered row keeps its number of matching partners, which drives the
/// null-padded rows of outer joins.
pub struct ArrowJoinTask {
    join_kind: NativeJoinKind,
    left_node: PlanNodeId,
    right_node: PlanNodeId,
    output_type: SchemaRef,
    pair_schema: SchemaRef,
    condition: Option<Arc<dyn PhysicalExpr>>,
    left: SideBuffer,
    right: SideBuffer,
    retention: StateRetentionPolicy,
    max_pairs_per_probe: usize,
    compaction_threshold: f64,
    outputs: Vec<ChangeBatch>,
    now: i64,
    released: bool,
}

impl ArrowJoinTask {
    pub fn try_new(plan: &NativeJoinPlan, options: NativeTaskOptions) -> Result<Self> {
        let left_probe = plan.probe(JoinSide::Left);
        let right_probe = plan.probe(JoinSide::Right);
        if left_probe.condition != right_probe.condition
            || left_probe.join_kind != right_probe.join_kind
        {
            return Err(Error::plan_assembly(
                "nested-loop join nodes of a stream join must mirror each other",
            ));
        }

        let output_type = plan.output_type().clone();
        let pair_schema: SchemaRef = Arc::new(Schema::new(
            output_type
                .fields()
                .iter()
                .map(|f| Field::new(f.name(), f.data_type().clone(), true))
                .collect::<Vec<_>>(),
        ));
        let condition = left_probe
            .condition
            .as_ref()
            .map(|c| create_physical_expr(c, &pair_schema))
            .transpose()?;

        debug!(
            root = %plan.root_id(),
            kind = %left_probe.join_kind,
            max_pairs = options.max_pairs_per_probe,
            "creating arrow join task"
        );
        Ok(Self {
            join_kind: left_probe.join_kind,
            left_node: plan.input(JoinSide::Left).id,
            right_node: plan.input(JoinSide::Right).id,
            output_type,
            pair_schema,
            condition,
            left: SideBuffer::new(plan.input(JoinSide::Left).output_type.clone()),
            right: SideBuffer::new(plan.input(JoinSide::Right).output_type.clone()),
            retention: options.retention,
            max_pairs_per_probe: options.max_pairs_per_probe.max(1),
            compaction_threshold: options.compaction_threshold,
            outputs: Vec::new(),
            now: 0,
            released: false,
        })
    }

    pub fn buffered(&self, side: JoinSide) -> usize {
        match side {
            JoinSide::Left => self.left.len(),
            JoinSide::Right => self.right.len(),
        }
    }

    fn check_live(&self) -> Result<()> {
        if self.released {
            return Err(Error::native_invocation("native task has been released"));
        }
        Ok(())
    }

    fn side_of(&self, node: PlanNodeId) -> Result<JoinSide> {
        if node == self.left_node {
            Ok(JoinSide::Left)
        } else if node == self.right_node {
            Ok(JoinSide::Right)
        } else {
            Err(Error::native_invocation(format!(
                "plan node {} is not an input of this task",
                node
            )))
        }
    }

    fn pad(&self, side: JoinSide, row: &Row) -> Row {
        let width = |s: JoinSide| match s {
            JoinSide::Left => self.left.schema().fields().len(),
            JoinSide::Right => self.right.schema().fields().len(),
        };
        let nulls = Row::nulls(width(side.other()));
        match side {
            JoinSide::Left => row.concat(&nulls),
            JoinSide::Right => nulls.concat(row),
        }
    }

    /// Slots of the `side.other()` buffer whose pair with `probe` satisfies
    /// the condition, in slot order.
    fn matching_slots(&self, side: JoinSide, probe: &RecordBatch) -> Result<Vec<usize>> {
        let build = match side {
            JoinSide::Left => &self.right,
            JoinSide::Right => &self.left,
        };
        let candidates = build.live_slots()?;
        let Some(condition) = &self.condition else {
            return Ok(candidates.into_iter().map(|s| s as usize).collect());
        };

        let mut matched = Vec::new();
        for chunk in candidates.chunks(self.max_pairs_per_probe) {
            let build_idx = UInt32Array::from(chunk.to_vec());
            let pairs = self.pair_batch(side, probe, build.batch(), &build_idx)?;
            let mask: BooleanArray = evaluate_predicate(condition, &pairs)?;
            matched.extend(
                chunk
                    .iter()
                    .zip(mask.iter())
                    .filter(|(_, hit)| hit.unwrap_or(false))
                    .map(|(&slot, _)| slot as usize),
            );
        }
        Ok(matched)
    }

    fn pair_batch(
        &self,
        side: JoinSide,
        probe: &RecordBatch,
        build: &RecordBatch,
        build_idx: &UInt32Array,
    ) -> Result<RecordBatch> {
        let repeat = UInt32Array::from(vec![0u32; build_idx.len()]);
        let gather = |batch: &RecordBatch, idx: &UInt32Array| {
            batch
                .columns()
                .iter()
                .map(|c| take(c.as_ref(), idx, None))
                .collect::<std::result::Result<Vec<ArrayRef>, _>>()
        };
        let arrow_err = |e: datafusion::arrow::error::ArrowError| {
            Error::native_invocation(format!("building join candidates failed: {}", e))
        };
        let probe_cols = gather(probe, &repeat).map_err(arrow_err)?;
        let build_cols = gather(build, build_idx).map_err(arrow_err)?;
        let columns = match side {
            JoinSide::Left => probe_cols.into_iter().chain(build_cols).collect(),
            JoinSide::Right => build_cols.into_iter().chain(probe_cols).collect(),
        };
        RecordBatch::try_new(self.pair_schema.clone(), columns).map_err(arrow_err)
    }

    fn process_row(
        &mut self,
        side: JoinSide,
        kind: RowKind,
        row: Row,
        slice: RecordBatch,
        out: &mut Vec<ChangeRecord>,
    ) -> Result<()> {
        let accumulate = kind.is_accumulate();
        let input_outer = self.join_kind.is_outer(side);
        let other_outer = self.join_kind.is_outer(side.other());
        let now = self.now;

        if !accumulate {
            self.buffer_mut(side).remove_one(&row);
        }

        let matched = self.matching_slots(side, &slice)?;
        for &slot in &matched {
            let other_row = self.buffer(side.other()).row(slot).clone();
            let joined = match side {
                JoinSide::Left => row.concat(&other_row),
                JoinSide::Right => other_row.concat(&row),
            };
            let padded_other = other_outer.then(|| self.pad(side.other(), &other_row));
            let state = self.buffer_mut(side.other()).slot_mut(slot);
            state.last_access = now;
            if accumulate {
                if let Some(padded) = padded_other.filter(|_| state.associations == 0) {
                    out.push(ChangeRecord::delete(padded));
                }
                state.associations += 1;
                out.push(ChangeRecord::insert(joined));
            } else {
                out.push(ChangeRecord::delete(joined));
                state.associations = state.associations.saturating_sub(1);
                if let Some(padded) = padded_other.filter(|_| state.associations == 0) {
                    out.push(ChangeRecord::insert(padded));
                }
            }
        }

        if matched.is_empty() && input_outer {
            let padded = self.pad(side, &row);
            out.push(if accumulate {
                ChangeRecord::insert(padded)
            } else {
                ChangeRecord::delete(padded)
            });
        }

        if accumulate {
            self.buffer_mut(side)
                .push(slice, row, matched.len() as u64, now);
        }
        Ok(())
    }

    fn buffer(&self, side: JoinSide) -> &SideBuffer {
        match side {
            JoinSide::Left => &self.left,
            JoinSide::Right => &self.right,
        }
    }

    fn buffer_mut(&mut self, side: JoinSide) -> &mut SideBuffer {
        match side {
            JoinSide::Left => &mut self.left,
            JoinSide::Right => &mut self.right,
        }
    }
}

impl NativeTask for ArrowJoinTask {
    fn add_input(&mut self, node: PlanNodeId, input: ChangeBatch) -> Result<()> {
        self.check_live()?;
        let side = self.side_of(node)?;
        let rows = batch_to_rows(input.batch())?;
        trace!(%side, rows = rows.len(), "native join input");

        self.buffer_mut(side.other()).consolidate()?;
        let mut out = Vec::new();
        for (i, (row, &kind)) in rows.into_iter().zip(input.kinds()).enumerate() {
            let slice = input.batch().slice(i, 1);
            self.process_row(side, kind, row, slice, &mut out)?;
        }

        let threshold = self.compaction_threshold;
        let buffer = self.buffer_mut(side);
        buffer.consolidate()?;
        buffer.compact(threshold)?;

        if !out.is_empty() {
            self.outputs
                .push(ChangeBatch::from_records(&out, &self.output_type)?);
        }
        Ok(())
    }

    fn drain_output(&mut self) -> Result<Vec<ChangeBatch>> {
        self.check_live()?;
        Ok(std::mem::take(&mut self.outputs))
    }

    fn advance_time(&mut self, now: i64) -> Result<usize> {
        self.check_live()?;
        self.now = self.now.max(now);
        let mut expired = 0;
        for side in [JoinSide::Left, JoinSide::Right] {
            let retention_ms = self.retention.millis(side);
            let now = self.now;
            let threshold = self.compaction_threshold;
            let buffer = self.buffer_mut(side);
            expired += buffer.expire(now, retention_ms);
            buffer.compact(threshold)?;
        }
        Ok(expired)
    }

    fn release(&mut self) -> Result<()> {
        if self.released {
            return Ok(());
        }
        debug!(
            left = self.left.len(),
            right = self.right.len(),
            "releasing arrow join task"
        );
        self.left.clear();
        self.right.clear();
        self.outputs.clear();
        self.released = true;
        Ok(())
    }
}
