use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use skiff_ir::JoinSide;

/// Counters shared by every join operator.
pub struct JoinMetrics {
    pub left_records_in: AtomicU64,
    pub right_records_in: AtomicU64,
    pub records_out: AtomicU64,
    pub native_invocations: AtomicU64,
    pub native_time_us: AtomicU64,
    pub expired_rows: AtomicU64,
    pub mini_batch_flushes: AtomicU64,
}

impl JoinMetrics {
    pub fn new() -> Self {
        Self {
            left_records_in: AtomicU64::new(0),
            right_records_in: AtomicU64::new(0),
            records_out: AtomicU64::new(0),
            native_invocations: AtomicU64::new(0),
            native_time_us: AtomicU64::new(0),
            expired_rows: AtomicU64::new(0),
            mini_batch_flushes: AtomicU64::new(0),
        }
    }

    pub fn record_input(&self, side: JoinSide, count: usize) {
        let counter = match side {
            JoinSide::Left => &self.left_records_in,
            JoinSide::Right => &self.right_records_in,
        };
        counter.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_output(&self, count: usize) {
        self.records_out.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_native_call(&self, duration: Duration) {
        self.native_invocations.fetch_add(1, Ordering::Relaxed);
        let micros = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);
        self.native_time_us.fetch_add(micros, Ordering::Relaxed);
    }

    pub fn record_expired(&self, count: usize) {
        self.expired_rows.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_flush(&self) {
        self.mini_batch_flushes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_records_in(&self, side: JoinSide) -> u64 {
        match side {
            JoinSide::Left => self.left_records_in.load(Ordering::Relaxed),
            JoinSide::Right => self.right_records_in.load(Ordering::Relaxed),
        }
    }

    pub fn get_records_out(&self) -> u64 {
        self.records_out.load(Ordering::Relaxed)
    }

    pub fn get_native_invocations(&self) -> u64 {
        self.native_invocations.load(Ordering::Relaxed)
    }

    pub fn get_native_time_us(&self) -> u64 {
        self.native_time_us.load(Ordering::Relaxed)
    }

    pub fn get_average_native_time_us(&self) -> u64 {
        let count = self.get_native_invocations();
        if count == 0 {
            return 0;
        }
        self.get_native_time_us() / count
    }

    pub fn get_expired_rows(&self) -> u64 {
        self.expired_rows.load(Ordering::Relaxed)
    }

    pub fn get_mini_batch_flushes(&self) -> u64 {
        self.mini_batch_flushes.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.left_records_in.store(0, Ordering::Relaxed);
        self.right_records_in.store(0, Ordering::Relaxed);
        self.records_out.store(0, Ordering::Relaxed);
        self.native_invocations.store(0, Ordering::Relaxed);
        self.native_time_us.store(0, Ordering::Relaxed);
        self.expired_rows.store(0, Ordering::Relaxed);
        self.mini_batch_flushes.store(0, Ordering::Relaxed);
    }
}

impl Default for JoinMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for JoinMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JoinMetrics")
            .field("left_records_in", &self.get_records_in(JoinSide::Left))
            .field("right_records_in", &self.get_records_in(JoinSide::Right))
            .field("records_out", &self.get_records_out())
            .field("native_invocations", &self.get_native_invocations())
            .field("native_time_us", &self.get_native_time_us())
            .field("expired_rows", &self.get_expired_rows())
            .field("mini_batch_flushes", &self.get_mini_batch_flushes())
            .finish()
    }
}
