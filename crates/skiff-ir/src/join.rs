use std::collections::HashSet;
use std::fmt;
use std::hash::BuildHasher;

use serde::{Deserialize, Serialize};
use skiff_common::types::{Field, Schema};

use crate::expr::Expr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Full,
    Semi,
    Anti,
}

impl JoinKind {
    /// Left rows survive without a partner (padded with nulls on the right).
    pub fn is_left_outer(self) -> bool {
        matches!(self, JoinKind::Left | JoinKind::Full)
    }

    pub fn is_right_outer(self) -> bool {
        matches!(self, JoinKind::Right | JoinKind::Full)
    }

    pub fn is_semi_or_anti(self) -> bool {
        matches!(self, JoinKind::Semi | JoinKind::Anti)
    }

    pub fn is_outer(self, side: JoinSide) -> bool {
        match side {
            JoinSide::Left => self.is_left_outer(),
            JoinSide::Right => self.is_right_outer(),
        }
    }
}

impl fmt::Display for JoinKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JoinKind::Inner => "INNER",
            JoinKind::Left => "LEFT",
            JoinKind::Right => "RIGHT",
            JoinKind::Full => "FULL",
            JoinKind::Semi => "SEMI",
            JoinKind::Anti => "ANTI",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JoinSide {
    Left,
    Right,
}

impl JoinSide {
    pub fn other(self) -> Self {
        match self {
            JoinSide::Left => JoinSide::Right,
            JoinSide::Right => JoinSide::Left,
        }
    }

    /// Position of this side among the operator's inputs.
    pub fn input_index(self) -> usize {
        match self {
            JoinSide::Left => 0,
            JoinSide::Right => 1,
        }
    }
}

impl fmt::Display for JoinSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinSide::Left => write!(f, "left"),
            JoinSide::Right => write!(f, "right"),
        }
    }
}

/// Declarative description of a two-input join as handed over by the planner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinSpec {
    pub kind: JoinKind,
    pub left_keys: Vec<usize>,
    pub right_keys: Vec<usize>,
    /// Per key pair; `false` makes the pair null-safe.
    pub filter_nulls: Vec<bool>,
    /// Evaluated over the combined left ++ right row.
    pub non_equi_condition: Option<Expr>,
    pub output_schema: Option<Schema>,
}

impl JoinSpec {
    pub fn new(kind: JoinKind, left_keys: Vec<usize>, right_keys: Vec<usize>) -> Self {
        let filter_nulls = vec![true; left_keys.len()];
        Self {
            kind,
            left_keys,
            right_keys,
            filter_nulls,
            non_equi_condition: None,
            output_schema: None,
        }
    }

    pub fn with_filter_nulls(mut self, filter_nulls: Vec<bool>) -> Self {
        self.filter_nulls = filter_nulls;
        self
    }

    pub fn with_non_equi_condition(mut self, condition: Expr) -> Self {
        self.non_equi_condition = Some(condition);
        self
    }

    pub fn with_output_schema(mut self, schema: Schema) -> Self {
        self.output_schema = Some(schema);
        self
    }

    pub fn num_keys(&self) -> usize {
        self.left_keys.len()
    }

    pub fn is_equi_join(&self) -> bool {
        !self.left_keys.is_empty()
    }

    pub fn filters_nulls(&self, pair: usize) -> bool {
        self.filter_nulls.get(pair).copied().unwrap_or(true)
    }

    pub fn keys(&self, side: JoinSide) -> &[usize] {
        match side {
            JoinSide::Left => &self.left_keys,
            JoinSide::Right => &self.right_keys,
        }
    }

    /// The explicit output layout, or the one derived from both inputs.
    pub fn resolve_output_schema(&self, left: &Schema, right: &Schema) -> Schema {
        match &self.output_schema {
            Some(schema) => schema.clone(),
            None => derive_output_schema(self.kind, left, right),
        }
    }
}

/// Semi/anti joins produce the left row type. Other kinds concatenate both
/// sides; colliding right names become `<name><n>` and sides that may be
/// padded with nulls turn nullable.
pub fn derive_output_schema(kind: JoinKind, left: &Schema, right: &Schema) -> Schema {
    if kind.is_semi_or_anti() {
        return left.clone();
    }

    let mut taken: HashSet<String> = left.names().into_iter().map(str::to_string).collect();
    taken.extend(right.names().into_iter().map(str::to_string));

    let mut fields: Vec<Field> = left
        .fields()
        .iter()
        .map(|f| {
            if kind.is_right_outer() {
                f.clone().into_nullable()
            } else {
                f.clone()
            }
        })
        .collect();

    let left_names: HashSet<&str> = left.names().into_iter().collect();
    for field in right.fields() {
        let mut out = if left_names.contains(field.name.as_str()) {
            let fresh = unique_name(&field.name, &taken);
            taken.insert(fresh.clone());
            field.with_name(fresh)
        } else {
            field.clone()
        };
        if kind.is_left_outer() {
            out = out.into_nullable();
        }
        fields.push(out);
    }
    Schema::from_fields(fields)
}

/// First `<base><n>` (n = 0, 1, ...) absent from `taken`.
pub fn unique_name<S: BuildHasher>(base: &str, taken: &HashSet<String, S>) -> String {
    let mut n = 0usize;
    loop {
        let candidate = format!("{}{}", base, n);
        if !taken.contains(&candidate) {
            return candidate;
        }
        n += 1;
    }
}
