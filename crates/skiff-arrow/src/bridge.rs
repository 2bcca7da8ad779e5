use datafusion::arrow::datatypes::SchemaRef;
use rustc_hash::FxHashSet;
use skiff_common::error::Result;
use skiff_common::types::{Field, Schema};
use skiff_ir::{JoinKind, unique_name};
use tracing::debug;

use crate::types::to_arrow_schema;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RightRename {
    pub position: usize,
    pub from: String,
    pub to: String,
}

/// Native (Arrow) schemas of both inputs and the join output, with right
/// field names made disjoint from the left ones.
#[derive(Debug, Clone, PartialEq)]
pub struct BridgedSchemas {
    pub left: SchemaRef,
    pub right: SchemaRef,
    pub output: SchemaRef,
    pub renamed_right: Schema,
    /// The output layout as the native engine produces it.
    pub renamed_output: Schema,
    pub renames: Vec<RightRename>,
}

impl BridgedSchemas {
    pub fn right_name(&self, position: usize) -> Option<&str> {
        self.renamed_right.field(position).map(|f| f.name.as_str())
    }
}

pub struct TypeBridge;

impl TypeBridge {
    /// A colliding right field takes the output layout's name at the same
    /// combined position when that name is free, otherwise `<name><n>`.
    pub fn translate(
        kind: JoinKind,
        left: &Schema,
        right: &Schema,
        output: &Schema,
    ) -> Result<BridgedSchemas> {
        let left_len = left.num_fields();
        let left_names: FxHashSet<&str> = left.names().into_iter().collect();
        let mut taken: FxHashSet<String> = left
            .names()
            .into_iter()
            .chain(right.names())
            .map(str::to_string)
            .collect();

        let mut renames = Vec::new();
        let mut right_fields = Vec::with_capacity(right.num_fields());
        for (i, field) in right.fields().iter().enumerate() {
            if !left_names.contains(field.name.as_str()) {
                right_fields.push(field.clone());
                continue;
            }
            let preferred = output
                .field(left_len + i)
                .map(|f| f.name.as_str())
                .filter(|name| !taken.contains(*name));
            let fresh = match preferred {
                Some(name) => name.to_string(),
                None => unique_name(&field.name, &taken),
            };
            debug!(position = i, from = %field.name, to = %fresh, "renaming right join field");
            taken.insert(fresh.clone());
            renames.push(RightRename {
                position: i,
                from: field.name.clone(),
                to: fresh.clone(),
            });
            right_fields.push(field.with_name(fresh));
        }
        let renamed_right = Schema::from_fields(right_fields);

        let mut output_fields = Vec::with_capacity(output.num_fields());
        for (j, field) in output.fields().iter().enumerate() {
            let mut native = field.clone();
            let (input, padded) = if j < left_len {
                (left.field(j), kind.is_right_outer())
            } else {
                let position = j - left_len;
                if let Some(rename) = renames.iter().find(|r| r.position == position) {
                    native = native.with_name(rename.to.clone());
                }
                (right.field(position), kind.is_left_outer())
            };
            if padded || input.is_some_and(Field::is_nullable) {
                native = native.into_nullable();
            }
            output_fields.push(native);
        }
        let renamed_output = Schema::from_fields(output_fields);

        Ok(BridgedSchemas {
            left: to_arrow_schema(left)?,
            right: to_arrow_schema(&renamed_right)?,
            output: to_arrow_schema(&renamed_output)?,
            renamed_right,
            renamed_output,
            renames,
        })
    }
}
