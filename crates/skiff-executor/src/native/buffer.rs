use datafusion::arrow::array::UInt32Array;
use datafusion::arrow::compute::{concat_batches, take_record_batch};
use rustc_hash::FxHashMap;
use skiff_arrow::RecordBatch;
use skiff_arrow::datatypes::SchemaRef;
use skiff_common::error::{Error, Result};
use skiff_common::row::Row;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub associations: u64,
    pub last_access: i64,
    alive: bool,
}

impl Slot {
    pub fn is_alive(&self) -> bool {
        self.alive
    }
}

/// Rows buffered for one side of a native join.
///
/// Rows are kept as one columnar batch addressed by slot. Removed rows leave a
/// dead slot behind until [`compact`](Self::compact) rewrites the batch.
#[derive(Debug)]
pub struct SideBuffer {
    schema: SchemaRef,
    batch: RecordBatch,
    pending: Vec<RecordBatch>,
    rows: Vec<Row>,
    slots: Vec<Slot>,
    index: FxHashMap<Row, Vec<usize>>,
    live: usize,
}

impl SideBuffer {
    pub fn new(schema: SchemaRef) -> Self {
        Self {
            batch: RecordBatch::new_empty(schema.clone()),
            schema,
            pending: Vec::new(),
            rows: Vec::new(),
            slots: Vec::new(),
            index: FxHashMap::default(),
            live: 0,
        }
    }

    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    /// Live rows.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Live and dead slots.
    pub fn num_slots(&self) -> usize {
        self.slots.len()
    }

    /// Appends a single-row batch; returns its slot.
    pub fn push(&mut self, slice: RecordBatch, row: Row, associations: u64, now: i64) -> usize {
        let slot = self.slots.len();
        self.pending.push(slice);
        self.index.entry(row.clone()).or_default().push(slot);
        self.rows.push(row);
        self.slots.push(Slot {
            associations,
            last_access: now,
            alive: true,
        });
        self.live += 1;
        slot
    }

    /// Removes one live instance of `row`, returning its slot state.
    pub fn remove_one(&mut self, row: &Row) -> Option<Slot> {
        let slots = self.index.get_mut(row)?;
        let slot = slots.pop()?;
        if slots.is_empty() {
            self.index.remove(row);
        }
        let state = self.slots[slot];
        self.slots[slot].alive = false;
        self.live -= 1;
        Some(state)
    }

    /// Folds appended rows into the consolidated batch.
    pub fn consolidate(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let batches = std::iter::once(&self.batch).chain(self.pending.iter());
        self.batch = concat_batches(&self.schema, batches)
            .map_err(|e| Error::native_invocation(format!("buffering rows failed: {}", e)))?;
        self.pending.clear();
        Ok(())
    }

    /// The consolidated batch; rows pushed since the last
    /// [`consolidate`](Self::consolidate) are not part of it.
    pub fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    /// Live slots as `take` indices.
    pub fn live_slots(&self) -> Result<Vec<u32>> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.alive)
            .map(|(i, _)| take_index(i))
            .collect()
    }

    pub fn row(&self, slot: usize) -> &Row {
        &self.rows[slot]
    }

    pub fn slot(&self, slot: usize) -> &Slot {
        &self.slots[slot]
    }

    pub fn slot_mut(&mut self, slot: usize) -> &mut Slot {
        &mut self.slots[slot]
    }

    /// Drops rows not accessed within `retention_ms`; zero keeps rows forever.
    pub fn expire(&mut self, now: i64, retention_ms: i64) -> usize {
        if retention_ms <= 0 {
            return 0;
        }
        let mut expired = 0;
        for slot in 0..self.slots.len() {
            let state = self.slots[slot];
            if !state.alive || state.last_access.saturating_add(retention_ms) > now {
                continue;
            }
            self.slots[slot].alive = false;
            if let Some(slots) = self.index.get_mut(&self.rows[slot]) {
                slots.retain(|&s| s != slot);
                if slots.is_empty() {
                    self.index.remove(&self.rows[slot]);
                }
            }
            expired += 1;
        }
        self.live -= expired;
        expired
    }

    /// Rewrites the buffer without dead slots once their share reaches
    /// `threshold`. Returns whether it compacted.
    pub fn compact(&mut self, threshold: f64) -> Result<bool> {
        let dead = self.slots.len() - self.live;
        if dead == 0 || (dead as f64) < threshold * self.slots.len() as f64 {
            return Ok(false);
        }
        self.consolidate()?;
        let keep = self.live_slots()?;
        self.batch = take_record_batch(&self.batch, &UInt32Array::from(keep.clone()))
            .map_err(|e| Error::native_invocation(format!("compacting rows failed: {}", e)))?;

        let mut rows = Vec::with_capacity(keep.len());
        let mut slots = Vec::with_capacity(keep.len());
        self.index.clear();
        for (new_slot, old_slot) in keep.into_iter().enumerate() {
            let old_slot = old_slot as usize;
            let row = self.rows[old_slot].clone();
            self.index.entry(row.clone()).or_default().push(new_slot);
            rows.push(row);
            slots.push(self.slots[old_slot]);
        }
        self.rows = rows;
        self.slots = slots;
        Ok(true)
    }

    pub fn clear(&mut self) {
        self.batch = RecordBatch::new_empty(self.schema.clone());
        self.pending.clear();
        self.rows.clear();
        self.slots.clear();
        self.index.clear();
        self.live = 0;
    }
}

fn take_index(slot: usize) -> Result<u32> {
    u32::try_from(slot).map_err(|_| {
        Error::native_invocation(format!(
            "slot {} exceeds the {} rows a side buffer can address",
            slot,
            u32::MAX
        ))
    })
}
