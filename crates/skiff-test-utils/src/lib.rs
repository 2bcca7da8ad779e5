#![allow(dead_code)]

use std::str::FromStr;

use rust_decimal::Decimal;
pub use skiff_common::{ChangeRecord, Error, Result, Row, RowKind, Value};

/// Builds a [`Row`] from anything convertible into [`Value`].
#[macro_export]
macro_rules! row {
    ($($value:expr),* $(,)?) => {
        $crate::Row::new(vec![$($crate::Value::from($value)),*])
    };
}

pub fn insert(row: Row) -> ChangeRecord {
    ChangeRecord::insert(row)
}

pub fn delete(row: Row) -> ChangeRecord {
    ChangeRecord::delete(row)
}

pub fn update_before(row: Row) -> ChangeRecord {
    ChangeRecord::update_before(row)
}

pub fn update_after(row: Row) -> ChangeRecord {
    ChangeRecord::update_after(row)
}

pub fn dec(literal: &str) -> Value {
    match Decimal::from_str(literal) {
        Ok(d) => Value::Decimal(d),
        Err(e) => panic!("invalid decimal literal '{}': {}", literal, e),
    }
}

/// Records in their `+I(1, a)` shorthand.
pub fn render(records: &[ChangeRecord]) -> Vec<String> {
    records.iter().map(ToString::to_string).collect()
}

/// Output rendered and sorted, for comparisons that ignore emission order.
pub fn sorted(records: &[ChangeRecord]) -> Vec<String> {
    let mut out = render(records);
    out.sort();
    out
}

/// Folds a change log into the multiset of rows it leaves behind, sorted by
/// their rendering. Panics when a retraction has nothing to retract.
pub fn net_rows(records: &[ChangeRecord]) -> Vec<Row> {
    let mut live: Vec<Row> = Vec::new();
    for record in records {
        if record.is_accumulate() {
            live.push(record.row.clone());
            continue;
        }
        match live.iter().position(|r| r == &record.row) {
            Some(i) => {
                live.swap_remove(i);
            }
            None => panic!("retraction {} has no matching accumulate", record),
        }
    }
    live.sort_by_key(ToString::to_string);
    live
}

pub fn assert_error_contains<T>(result: Result<T>, keywords: &[&str]) {
    match result {
        Ok(_) => panic!("Expected error but got Ok result"),
        Err(e) => {
            let error_msg = e.to_string().to_lowercase();
            let found = keywords
                .iter()
                .any(|keyword| error_msg.contains(&keyword.to_lowercase()));
            assert!(
                found,
                "Error message '{}' does not contain any of the expected keywords: {:?}",
                e, keywords
            );
        }
    }
}
