use skiff_common::error::Result;
use skiff_common::row::ChangeRecord;
use skiff_common::types::Schema;
use skiff_ir::JoinSide;
use skiff_planner::{PreparedJoin, SemiAntiStrategy, StateKeyWiring};
use tracing::{debug, trace};

use super::condition::JoinCondition;
use super::state::JoinRecordStateView;
use crate::metrics::JoinMetrics;
use crate::operator::TwoInputOperator;

/// Emits left rows that have (semi) or lack (anti) a matching right row.
///
/// Left rows keep the number of matching right rows; a right change that
/// moves that number between zero and one flips the left row's visibility.
pub struct SemiAntiJoinOperator {
    anti: bool,
    condition: JoinCondition,
    key_wiring: StateKeyWiring,
    left: JoinRecordStateView,
    right: JoinRecordStateView,
    now: i64,
    output_schema: Schema,
    metrics: JoinMetrics,
}

impl SemiAntiJoinOperator {
    pub fn new(prepared: &PreparedJoin, strategy: SemiAntiStrategy) -> Self {
        Self {
            anti: strategy.anti,
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
            now: 0,
            output_schema: prepared.output_schema.clone(),
            metrics: JoinMetrics::new(),
        }
    }

    pub fn state(&self, side: JoinSide) -> &JoinRecordStateView {
        match side {
            JoinSide::Left => &self.left,
            JoinSide::Right => &self.right,
        }
    }

    fn visible(&self, matches: u64) -> bool {
        if self.anti { matches == 0 } else { matches > 0 }
    }

    fn process_left_record(
        &mut self,
        record: ChangeRecord,
        out: &mut Vec<ChangeRecord>,
    ) -> Result<()> {
        let key = self.key_wiring.left.get_key(&record.row);
        let can_match = self.condition.key_can_match(&key);
        let mut matches = 0u64;
        if can_match {
            for entry in self.right.matching(&key) {
                if self.condition.matches(&record.row, &entry.row)? {
                    matches += entry.count;
                }
            }
        }

        if can_match {
            if record.is_accumulate() {
                self.left.add(key, record.row.clone(), matches, self.now);
            } else {
                self.left.retract(&key, &record.row);
            }
        }

        if self.visible(matches) {
            out.push(record);
        }
        Ok(())
    }

    fn process_right_record(
        &mut self,
        record: ChangeRecord,
        out: &mut Vec<ChangeRecord>,
    ) -> Result<()> {
        let key = self.key_wiring.right.get_key(&record.row);
        if !self.condition.key_can_match(&key) {
            return Ok(());
        }
        let accumulate = record.is_accumulate();
        let anti = self.anti;
        let now = self.now;

        let Self { condition, left, .. } = &mut *self;
        for entry in left.matching_mut(&key) {
            if !condition.matches(&entry.row, &record.row)? {
                continue;
            }
            let flipped = if accumulate {
                entry.associations += 1;
                entry.associations == 1
            } else if entry.associations > 0 {
                entry.associations -= 1;
                entry.associations == 0
            } else {
                false
            };
            entry.touch(now);
            if flipped {
                // accumulate: semi starts, anti stops showing the row; retract: the reverse
                let emit = if accumulate != anti {
                    ChangeRecord::insert
                } else {
                    ChangeRecord::delete
                };
                for _ in 0..entry.count {
                    out.push(emit(entry.row.clone()));
                }
            }
        }

        if accumulate {
            self.right.add(key, record.row, 0, now);
        } else {
            self.right.retract(&key, &record.row);
        }
        Ok(())
    }

    fn expire(&mut self) {
        let expired = self.left.expire(self.now) + self.right.expire(self.now);
        if expired > 0 {
            debug!(expired, now = self.now, "expired join state");
            self.metrics.record_expired(expired);
        }
    }
}

impl TwoInputOperator for SemiAntiJoinOperator {
    fn name(&self) -> &str {
        if self.anti { "AntiJoin" } else { "SemiJoin" }
    }

    fn output_schema(&self) -> &Schema {
        &self.output_schema
    }

    fn metrics(&self) -> &JoinMetrics {
        &self.metrics
    }

    fn open(&mut self) -> Result<()> {
        debug!(anti = self.anti, "opening semi/anti join");
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
            trace!(%side, record = %record, "semi/anti join input");
            match side {
                JoinSide::Left => self.process_left_record(record, &mut out)?,
                JoinSide::Right => self.process_right_record(record, &mut out)?,
            }
        }
        self.metrics.record_output(out.len());
        Ok(out)
    }

    fn on_timer(&mut self, timestamp: i64) -> Result<Vec<ChangeRecord>> {
        self.now = self.now.max(timestamp);
        self.expire();
        Ok(Vec::new())
    }

    fn on_watermark(&mut self, watermark: i64) -> Result<Vec<ChangeRecord>> {
        self.on_timer(watermark)
    }

    fn close(&mut self) -> Result<Vec<ChangeRecord>> {
        Ok(Vec::new())
    }
}
