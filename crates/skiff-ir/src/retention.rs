use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::join::JoinSide;

/// How long buffered rows of each side stay eligible for matching.
/// A zero duration retains rows indefinitely.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StateRetentionPolicy {
    pub left: Duration,
    pub right: Duration,
}

impl StateRetentionPolicy {
    pub fn new(left: Duration, right: Duration) -> Self {
        Self { left, right }
    }

    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Per-input hints (keyed by input index) take precedence over `default_ttl`.
    pub fn resolve(hints: &BTreeMap<usize, Duration>, default_ttl: Duration) -> Self {
        let pick = |side: JoinSide| {
            hints
                .get(&side.input_index())
                .copied()
                .unwrap_or(default_ttl)
        };
        Self {
            left: pick(JoinSide::Left),
            right: pick(JoinSide::Right),
        }
    }

    pub fn for_side(&self, side: JoinSide) -> Duration {
        match side {
            JoinSide::Left => self.left,
            JoinSide::Right => self.right,
        }
    }

    pub fn retains_forever(&self, side: JoinSide) -> bool {
        self.for_side(side).is_zero()
    }

    pub fn millis(&self, side: JoinSide) -> i64 {
        i64::try_from(self.for_side(side).as_millis()).unwrap_or(i64::MAX)
    }
}
