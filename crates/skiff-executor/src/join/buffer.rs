use rustc_hash::FxHashMap;
use skiff_common::row::{ChangeRecord, Row};

/// Records of one input waiting for the next mini-batch flush.
///
/// A retraction of a row whose accumulation is still pending cancels it:
/// neither record reaches the join.
#[derive(Debug, Default)]
pub struct MiniBatchBuffer {
    records: Vec<Option<ChangeRecord>>,
    pending_accumulates: FxHashMap<Row, Vec<usize>>,
    live: usize,
}

impl MiniBatchBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Returns `true` when the record folded away a pending accumulation.
    pub fn push(&mut self, record: ChangeRecord) -> bool {
        if record.is_retract() {
            if let Some(slot) = self
                .pending_accumulates
                .get_mut(&record.row)
                .and_then(Vec::pop)
            {
                if self.pending_accumulates.get(&record.row).is_some_and(Vec::is_empty) {
                    self.pending_accumulates.remove(&record.row);
                }
                self.records[slot] = None;
                self.live -= 1;
                return true;
            }
        } else {
            self.pending_accumulates
                .entry(record.row.clone())
                .or_default()
                .push(self.records.len());
        }
        self.records.push(Some(record));
        self.live += 1;
        false
    }

    /// Takes the surviving records in arrival order.
    pub fn drain(&mut self) -> Vec<ChangeRecord> {
        self.pending_accumulates.clear();
        self.live = 0;
        std::mem::take(&mut self.records)
            .into_iter()
            .flatten()
            .collect()
    }
}
