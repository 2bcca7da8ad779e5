use std::time::Duration;

use indexmap::IndexMap;
use rustc_hash::{FxBuildHasher, FxHashMap};
use skiff_common::row::Row;
use skiff_planner::InputSideSpec;

/// One stored input row with its multiplicity and the number of rows of
/// the other side it currently joins with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateEntry {
    pub row: Row,
    pub count: u64,
    pub associations: u64,
    pub last_access: i64,
}

impl StateEntry {
    pub fn touch(&mut self, now: i64) {
        self.last_access = self.last_access.max(now);
    }
}

type Group = IndexMap<Row, StateEntry, FxBuildHasher>;

/// Keyed join state of one input: join key -> row identity -> entry.
///
/// Row identity follows the input's [`InputSideSpec`]: rows with a unique key
/// replace each other, rows without one are counted as a multiset.
#[derive(Debug)]
pub struct JoinRecordStateView {
    input: InputSideSpec,
    retention_ms: i64,
    groups: FxHashMap<Row, Group>,
    rows: usize,
}

impl JoinRecordStateView {
    pub fn new(input: InputSideSpec, retention: Duration) -> Self {
        Self {
            input,
            retention_ms: i64::try_from(retention.as_millis()).unwrap_or(i64::MAX),
            groups: FxHashMap::default(),
            rows: 0,
        }
    }

    pub fn input_spec(&self) -> &InputSideSpec {
        &self.input
    }

    /// Number of stored rows, counting multiplicity.
    pub fn len(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn num_keys(&self) -> usize {
        self.groups.len()
    }

    pub fn add(&mut self, key: Row, row: Row, associations: u64, now: i64) {
        let identity = self.input.identity(&row);
        let multiset = self.input.is_multiset();
        let group = self.groups.entry(key).or_default();
        if multiset {
            if let Some(entry) = group.get_mut(&identity) {
                entry.count += 1;
                entry.associations = associations;
                entry.touch(now);
                self.rows += 1;
                return;
            }
        }
        let entry = StateEntry {
            row,
            count: 1,
            associations,
            last_access: now,
        };
        if let Some(old) = group.insert(identity, entry) {
            self.rows -= old.count as usize;
        }
        self.rows += 1;
    }

    /// Removes one occurrence of `row`. Returns the entry as it was before
    /// the removal, or `None` if nothing was stored under its identity.
    pub fn retract(&mut self, key: &Row, row: &Row) -> Option<StateEntry> {
        let identity = self.input.identity(row);
        let group = self.groups.get_mut(key)?;
        let entry = group.get_mut(&identity)?;
        let before = entry.clone();
        if self.input.is_multiset() && entry.count > 1 {
            entry.count -= 1;
            self.rows -= 1;
        } else {
            self.rows -= entry.count as usize;
            group.shift_remove(&identity);
            if group.is_empty() {
                self.groups.remove(key);
            }
        }
        Some(before)
    }

    pub fn matching(&self, key: &Row) -> impl Iterator<Item = &StateEntry> {
        self.groups.get(key).into_iter().flat_map(|g| g.values())
    }

    pub fn matching_mut(&mut self, key: &Row) -> impl Iterator<Item = &mut StateEntry> {
        self.groups
            .get_mut(key)
            .into_iter()
            .flat_map(|g| g.values_mut())
    }

    pub fn entries(&self) -> impl Iterator<Item = &StateEntry> {
        self.groups.values().flat_map(|g| g.values())
    }

    /// Drops rows whose last write is at least the retention period old.
    /// Returns the number of rows removed.
    pub fn expire(&mut self, now: i64) -> usize {
        if self.retention_ms <= 0 {
            return 0;
        }
        let retention = self.retention_ms;
        let mut removed = 0usize;
        self.groups.retain(|_, group| {
            group.retain(|_, entry| {
                let keep = entry.last_access.saturating_add(retention) > now;
                if !keep {
                    removed += entry.count as usize;
                }
                keep
            });
            !group.is_empty()
        });
        self.rows -= removed;
        removed
    }
}
