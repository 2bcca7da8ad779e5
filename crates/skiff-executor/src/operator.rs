//! The two-input operator contract every join strategy implements.

use skiff_common::error::Result;
use skiff_common::row::ChangeRecord;
use skiff_common::types::Schema;
use skiff_ir::JoinSide;

use crate::metrics::JoinMetrics;

/// A join operator driven by a single runtime thread.
///
/// Every call returns the change records it produced, in emission order.
/// Outputs are laid out as the operator's [`output_schema`](Self::output_schema).
/// Time is an opaque millisecond clock advanced through
/// [`on_timer`](Self::on_timer) and [`on_watermark`](Self::on_watermark);
/// rows written to state are stamped with the latest time seen.
pub trait TwoInputOperator: Send {
    fn name(&self) -> &str;

    fn output_schema(&self) -> &Schema;

    fn metrics(&self) -> &JoinMetrics;

    fn open(&mut self) -> Result<()>;

    fn process_batch(
        &mut self,
        side: JoinSide,
        records: Vec<ChangeRecord>,
    ) -> Result<Vec<ChangeRecord>>;

    fn process_left(&mut self, record: ChangeRecord) -> Result<Vec<ChangeRecord>> {
        self.process_batch(JoinSide::Left, vec![record])
    }

    fn process_right(&mut self, record: ChangeRecord) -> Result<Vec<ChangeRecord>> {
        self.process_batch(JoinSide::Right, vec![record])
    }

    fn process_left_batch(&mut self, records: Vec<ChangeRecord>) -> Result<Vec<ChangeRecord>> {
        self.process_batch(JoinSide::Left, records)
    }

    fn process_right_batch(&mut self, records: Vec<ChangeRecord>) -> Result<Vec<ChangeRecord>> {
        self.process_batch(JoinSide::Right, records)
    }

    /// Processing-time timer; drives retention expiry and latency-bound flushes.
    fn on_timer(&mut self, timestamp: i64) -> Result<Vec<ChangeRecord>>;

    fn on_watermark(&mut self, watermark: i64) -> Result<Vec<ChangeRecord>>;

    /// Emits whatever is still pending and releases operator resources.
    fn close(&mut self) -> Result<Vec<ChangeRecord>>;
}
