//! The seam between join operators and a native columnar execution engine.

use skiff_arrow::RecordBatch;
use skiff_arrow::datatypes::SchemaRef;
use skiff_arrow::{batch_to_rows, rows_to_batch};
use skiff_common::config::NativeConfig;
use skiff_common::error::{Error, Result};
use skiff_common::row::{ChangeRecord, Row, RowKind};
use skiff_ir::StateRetentionPolicy;
use skiff_planner::{NativeJoinPlan, PlanNodeId};

use super::task::ArrowJoinTask;

/// Change-log rows in columnar form: one [`RowKind`] per batch row.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeBatch {
    kinds: Vec<RowKind>,
    batch: RecordBatch,
}

impl ChangeBatch {
    pub fn try_new(kinds: Vec<RowKind>, batch: RecordBatch) -> Result<Self> {
        if kinds.len() != batch.num_rows() {
            return Err(Error::internal(format!(
                "{} row kinds for a batch of {} rows",
                kinds.len(),
                batch.num_rows()
            )));
        }
        Ok(Self { kinds, batch })
    }

    pub fn from_records(records: &[ChangeRecord], schema: &SchemaRef) -> Result<Self> {
        let kinds = records.iter().map(|r| r.kind).collect();
        let rows: Vec<Row> = records.iter().map(|r| r.row.clone()).collect();
        Self::try_new(kinds, rows_to_batch(&rows, schema)?)
    }

    pub fn to_records(&self) -> Result<Vec<ChangeRecord>> {
        let rows = batch_to_rows(&self.batch)?;
        Ok(self
            .kinds
            .iter()
            .zip(rows)
            .map(|(&kind, row)| ChangeRecord::new(kind, row))
            .collect())
    }

    pub fn kinds(&self) -> &[RowKind] {
        &self.kinds
    }

    pub fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    pub fn num_rows(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}

/// Per-task settings derived from the join configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NativeTaskOptions {
    pub retention: StateRetentionPolicy,
    pub max_pairs_per_probe: usize,
    pub compaction_threshold: f64,
}

impl NativeTaskOptions {
    pub fn new(config: &NativeConfig, retention: StateRetentionPolicy) -> Self {
        Self {
            retention,
            max_pairs_per_probe: config.max_pairs_per_probe.max(1),
            compaction_threshold: config.compaction_threshold,
        }
    }
}

impl Default for NativeTaskOptions {
    fn default() -> Self {
        Self::new(&NativeConfig::default(), StateRetentionPolicy::unbounded())
    }
}

/// A running instance of a native join plan.
///
/// Calls are synchronous. After [`release`](NativeTask::release) every other
/// call fails.
#[cfg_attr(test, mockall::automock)]
pub trait NativeTask: Send {
    /// Feeds a batch to the plan's input node `node`.
    fn add_input(&mut self, node: PlanNodeId, input: ChangeBatch) -> Result<()>;

    /// Takes every output batch produced since the last call, in order.
    fn drain_output(&mut self) -> Result<Vec<ChangeBatch>>;

    /// Advances the task clock and expires state; returns the rows expired.
    fn advance_time(&mut self, now: i64) -> Result<usize>;

    fn release(&mut self) -> Result<()>;
}

#[cfg_attr(test, mockall::automock)]
pub trait NativeEngine: Send + Sync {
    fn create_task(
        &self,
        plan: &NativeJoinPlan,
        options: &NativeTaskOptions,
    ) -> Result<Box<dyn NativeTask>>;
}

/// In-process engine evaluating plans with Arrow kernels and DataFusion
/// physical expressions.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArrowNativeEngine;

impl NativeEngine for ArrowNativeEngine {
    fn create_task(
        &self,
        plan: &NativeJoinPlan,
        options: &NativeTaskOptions,
    ) -> Result<Box<dyn NativeTask>> {
        Ok(Box::new(ArrowJoinTask::try_new(plan, *options)?))
    }
}
