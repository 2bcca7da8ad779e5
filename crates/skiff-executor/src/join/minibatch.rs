use skiff_common::error::Result;
use skiff_common::row::ChangeRecord;
use skiff_common::types::Schema;
use skiff_ir::JoinSide;
use skiff_planner::{MiniBatchStrategy, PreparedJoin};
use tracing::{debug, trace};

use super::buffer::MiniBatchBuffer;
use super::streaming::StreamingJoin;
use crate::metrics::JoinMetrics;
use crate::operator::TwoInputOperator;

/// Buffers both inputs and applies them to a [`StreamingJoin`] in batches,
/// left buffer first.
pub struct MiniBatchJoinOperator {
    join: StreamingJoin,
    left_buffer: MiniBatchBuffer,
    right_buffer: MiniBatchBuffer,
    size: usize,
    allow_latency_ms: i64,
    last_flush: i64,
    now: i64,
    output_schema: Schema,
    metrics: JoinMetrics,
}

impl MiniBatchJoinOperator {
    pub fn new(prepared: &PreparedJoin, strategy: MiniBatchStrategy) -> Self {
        Self {
            join: StreamingJoin::new(prepared),
            left_buffer: MiniBatchBuffer::new(),
            right_buffer: MiniBatchBuffer::new(),
            size: strategy.size.max(1),
            allow_latency_ms: i64::try_from(strategy.allow_latency.as_millis())
                .unwrap_or(i64::MAX),
            last_flush: 0,
            now: 0,
            output_schema: prepared.output_schema.clone(),
            metrics: JoinMetrics::new(),
        }
    }

    pub fn buffered(&self) -> usize {
        self.left_buffer.len() + self.right_buffer.len()
    }

    pub fn join(&self) -> &StreamingJoin {
        &self.join
    }

    fn buffer(&mut self, side: JoinSide) -> &mut MiniBatchBuffer {
        match side {
            JoinSide::Left => &mut self.left_buffer,
            JoinSide::Right => &mut self.right_buffer,
        }
    }

    fn flush(&mut self) -> Result<Vec<ChangeRecord>> {
        let mut out = Vec::new();
        let left = self.left_buffer.drain();
        let right = self.right_buffer.drain();
        debug!(left = left.len(), right = right.len(), "flushing mini-batch");
        for record in &left {
            self.join.process(JoinSide::Left, record, self.now, &mut out)?;
        }
        for record in &right {
            self.join.process(JoinSide::Right, record, self.now, &mut out)?;
        }
        self.last_flush = self.now;
        self.metrics.record_flush();
        self.metrics.record_output(out.len());
        Ok(out)
    }

    fn expire(&mut self) {
        let expired = self.join.expire(self.now);
        if expired > 0 {
            debug!(expired, now = self.now, "expired join state");
            self.metrics.record_expired(expired);
        }
    }
}

impl TwoInputOperator for MiniBatchJoinOperator {
    fn name(&self) -> &str {
        "MiniBatchJoin"
    }

    fn output_schema(&self) -> &Schema {
        &self.output_schema
    }

    fn metrics(&self) -> &JoinMetrics {
        &self.metrics
    }

    fn open(&mut self) -> Result<()> {
        debug!(
            size = self.size,
            allow_latency_ms = self.allow_latency_ms,
            "opening mini-batch join"
        );
        self.last_flush = self.now;
        Ok(())
    }

    fn process_batch(
        &mut self,
        side: JoinSide,
        records: Vec<ChangeRecord>,
    ) -> Result<Vec<ChangeRecord>> {
        self.metrics.record_input(side, records.len());
        let mut out = Vec::new();
        for record in records {
            trace!(%side, record = %record, "buffering");
            self.buffer(side).push(record);
            if self.buffered() >= self.size {
                out.extend(self.flush()?);
            }
        }
        Ok(out)
    }

    fn on_timer(&mut self, timestamp: i64) -> Result<Vec<ChangeRecord>> {
        self.now = self.now.max(timestamp);
        let due = self.now >= self.last_flush.saturating_add(self.allow_latency_ms);
        let out = if due && self.buffered() > 0 {
            self.flush()?
        } else {
            Vec::new()
        };
        self.expire();
        Ok(out)
    }

    fn on_watermark(&mut self, watermark: i64) -> Result<Vec<ChangeRecord>> {
        self.now = self.now.max(watermark);
        let out = if self.buffered() > 0 {
            self.flush()?
        } else {
            Vec::new()
        };
        self.expire();
        Ok(out)
    }

    fn close(&mut self) -> Result<Vec<ChangeRecord>> {
        if self.buffered() > 0 {
            self.flush()
        } else {
            Ok(Vec::new())
        }
    }
}
