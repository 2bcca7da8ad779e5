use rustc_hash::FxHashSet;
use skiff_common::row::Row;
use skiff_common::types::Schema;

/// How rows of one join input are identified inside a join-key group.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyClass {
    /// An upsert key contained in the join key: at most one row per join key.
    UniqueKey(Vec<usize>),
    /// Rows are indexed by the narrowest upsert key inside each join-key group.
    JoinKeyOnly(Vec<usize>),
    /// No key information; rows are kept as a multiset.
    NoKey,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputSideSpec {
    pub class: KeyClass,
    pub row_type: Schema,
}

impl InputSideSpec {
    pub fn has_unique_key(&self) -> bool {
        matches!(self.class, KeyClass::UniqueKey(_))
    }

    pub fn is_multiset(&self) -> bool {
        matches!(self.class, KeyClass::NoKey)
    }

    /// Identity of `row` among the rows sharing its join key.
    pub fn identity(&self, row: &Row) -> Row {
        match &self.class {
            KeyClass::UniqueKey(key) | KeyClass::JoinKeyOnly(key) => row.project(key),
            KeyClass::NoKey => row.clone(),
        }
    }
}

/// Classifies one join input from its join key positions and declared upsert keys.
pub fn analyze_input_side(
    join_key: &[usize],
    upsert_keys: &[Vec<usize>],
    row_type: &Schema,
) -> InputSideSpec {
    let join_key: FxHashSet<usize> = join_key.iter().copied().collect();
    let contained = narrowest(
        upsert_keys
            .iter()
            .filter(|key| key.iter().all(|p| join_key.contains(p))),
    );
    let class = match contained {
        Some(key) => KeyClass::UniqueKey(key),
        None => match narrowest(upsert_keys.iter()) {
            Some(key) => KeyClass::JoinKeyOnly(key),
            None => KeyClass::NoKey,
        },
    };
    InputSideSpec {
        class,
        row_type: row_type.clone(),
    }
}

fn narrowest<'a>(keys: impl Iterator<Item = &'a Vec<usize>>) -> Option<Vec<usize>> {
    keys.min_by_key(|k| k.len()).cloned()
}
