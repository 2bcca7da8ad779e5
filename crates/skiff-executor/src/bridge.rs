use std::time::Instant;

use skiff_arrow::datatypes::SchemaRef;
use skiff_common::error::{Error, Result};
use skiff_common::row::ChangeRecord;
use skiff_common::types::Schema;
use skiff_ir::JoinSide;
use skiff_planner::{NativeJoinPlan, OperatorWiring};
use tracing::{debug, trace, warn};

use crate::metrics::JoinMetrics;
use crate::native::{ChangeBatch, NativeTask};
use crate::operator::TwoInputOperator;

/// Runs a join on a native task.
///
/// Every call hands the arriving rows to the task's input node for that side
/// and returns whatever the task produced, in the order it produced it. A
/// failed native call is fatal: the error is returned and every later call
/// fails too.
pub struct NativeBridgeOperator {
    task: Option<Box<dyn NativeTask>>,
    wiring: OperatorWiring,
    left_type: SchemaRef,
    right_type: SchemaRef,
    output_schema: Schema,
    metrics: JoinMetrics,
    failed: bool,
    now: i64,
}

impl NativeBridgeOperator {
    pub fn new(task: Box<dyn NativeTask>, plan: &NativeJoinPlan, output_schema: Schema) -> Self {
        Self {
            task: Some(task),
            wiring: plan.wiring(),
            left_type: plan.input(JoinSide::Left).output_type.clone(),
            right_type: plan.input(JoinSide::Right).output_type.clone(),
            output_schema,
            metrics: JoinMetrics::new(),
            failed: false,
            now: 0,
        }
    }

    pub fn wiring(&self) -> &OperatorWiring {
        &self.wiring
    }

    pub fn is_failed(&self) -> bool {
        self.failed
    }

    pub fn is_released(&self) -> bool {
        self.task.is_none()
    }

    fn input_type(&self, side: JoinSide) -> &SchemaRef {
        match side {
            JoinSide::Left => &self.left_type,
            JoinSide::Right => &self.right_type,
        }
    }

    /// Runs `call` on the task and drains its output. Any error marks the
    /// operator failed.
    fn invoke<T>(
        &mut self,
        call: impl FnOnce(&mut dyn NativeTask) -> Result<T>,
    ) -> Result<(T, Vec<ChangeRecord>)> {
        if self.failed {
            return Err(Error::native_invocation(
                "native join task failed on an earlier call",
            ));
        }
        let Some(task) = self.task.as_deref_mut() else {
            return Err(Error::native_invocation("native join task was released"));
        };

        let started = Instant::now();
        let result = run(task, call);
        self.metrics.record_native_call(started.elapsed());

        match result {
            Ok((value, out)) => {
                self.metrics.record_output(out.len());
                Ok((value, out))
            }
            Err(e) => {
                warn!(error = %e, "native join task failed");
                self.failed = true;
                Err(e)
            }
        }
    }

    fn release(&mut self) -> Result<()> {
        match self.task.take() {
            Some(mut task) => {
                debug!(root = %self.wiring.root, "releasing native join task");
                task.release()
            }
            None => Ok(()),
        }
    }
}

fn run<T>(
    task: &mut dyn NativeTask,
    call: impl FnOnce(&mut dyn NativeTask) -> Result<T>,
) -> Result<(T, Vec<ChangeRecord>)> {
    let value = call(&mut *task)?;
    let mut out = Vec::new();
    for batch in task.drain_output()? {
        out.extend(batch.to_records()?);
    }
    Ok((value, out))
}

impl TwoInputOperator for NativeBridgeOperator {
    fn name(&self) -> &str {
        "NativeBridgeJoin"
    }

    fn output_schema(&self) -> &Schema {
        &self.output_schema
    }

    fn metrics(&self) -> &JoinMetrics {
        &self.metrics
    }

    fn open(&mut self) -> Result<()> {
        debug!(
            left = %self.wiring.left_input,
            right = %self.wiring.right_input,
            root = %self.wiring.root,
            "opening native bridge join"
        );
        Ok(())
    }

    fn process_batch(
        &mut self,
        side: JoinSide,
        records: Vec<ChangeRecord>,
    ) -> Result<Vec<ChangeRecord>> {
        self.metrics.record_input(side, records.len());
        if records.is_empty() {
            return Ok(Vec::new());
        }
        for record in &records {
            trace!(%side, record = %record, "native bridge input");
        }
        let node = self.wiring.input_for(side);
        let batch = ChangeBatch::from_records(&records, self.input_type(side))?;
        let ((), out) = self.invoke(|task| task.add_input(node, batch))?;
        Ok(out)
    }

    fn on_timer(&mut self, timestamp: i64) -> Result<Vec<ChangeRecord>> {
        self.now = self.now.max(timestamp);
        let now = self.now;
        let (expired, out) = self.invoke(|task| task.advance_time(now))?;
        if expired > 0 {
            debug!(expired, now, "expired native join state");
            self.metrics.record_expired(expired);
        }
        Ok(out)
    }

    fn on_watermark(&mut self, watermark: i64) -> Result<Vec<ChangeRecord>> {
        self.on_timer(watermark)
    }

    fn close(&mut self) -> Result<Vec<ChangeRecord>> {
        if self.failed {
            self.release()?;
            return Err(Error::native_invocation(
                "native join task failed on an earlier call",
            ));
        }
        if self.task.is_none() {
            return Ok(Vec::new());
        }
        let ((), out) = self.invoke(|_| Ok(()))?;
        self.release()?;
        Ok(out)
    }
}

impl Drop for NativeBridgeOperator {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!(error = %e, "releasing native join task failed");
        }
    }
}
