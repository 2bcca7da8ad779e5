use skiff_common::error::Result;
use skiff_common::row::Row;
use skiff_ir::{Expr, JoinSpec};

use super::evaluator::RowEvaluator;

/// Row-level join condition for the keyed strategies.
///
/// Key equality itself is resolved by the state lookup (rows are grouped by
/// their projected key), so this only tracks which key pairs reject nulls and
/// evaluates the non-equi predicate over the combined row.
#[derive(Debug, Clone)]
pub struct JoinCondition {
    null_filtered_pairs: Vec<usize>,
    predicate: Option<Expr>,
}

impl JoinCondition {
    pub fn new(spec: &JoinSpec) -> Self {
        let null_filtered_pairs = (0..spec.num_keys())
            .filter(|&pair| spec.filters_nulls(pair))
            .collect();
        Self {
            null_filtered_pairs,
            predicate: spec.non_equi_condition.clone(),
        }
    }

    /// A key holding null on a null-rejecting pair never matches anything.
    pub fn key_can_match(&self, key: &Row) -> bool {
        !key.has_null_at(&self.null_filtered_pairs)
    }

    pub fn has_predicate(&self) -> bool {
        self.predicate.is_some()
    }

    pub fn matches(&self, left: &Row, right: &Row) -> Result<bool> {
        match &self.predicate {
            None => Ok(true),
            Some(predicate) => {
                let combined = left.concat(right);
                RowEvaluator::new(&combined).is_true(predicate)
            }
        }
    }
}
