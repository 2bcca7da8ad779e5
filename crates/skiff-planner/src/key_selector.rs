use skiff_arrow::datatypes::SchemaRef;
use skiff_arrow::to_arrow_schema;
use skiff_common::error::Result;
use skiff_common::row::Row;
use skiff_common::types::Schema;
use skiff_ir::{JoinSide, JoinSpec};

/// Projects the join key out of an input row, for keyed state and partitioning.
#[derive(Debug, Clone, PartialEq)]
pub struct KeySelector {
    positions: Vec<usize>,
    key_type: Schema,
    native_key_type: SchemaRef,
}

impl KeySelector {
    pub fn new(positions: Vec<usize>, row_type: &Schema) -> Result<Self> {
        let key_type = row_type.project(&positions);
        let native_key_type = to_arrow_schema(&key_type)?;
        Ok(Self {
            positions,
            key_type,
            native_key_type,
        })
    }

    pub fn get_key(&self, row: &Row) -> Row {
        row.project(&self.positions)
    }

    pub fn positions(&self) -> &[usize] {
        &self.positions
    }

    pub fn key_type(&self) -> &Schema {
        &self.key_type
    }

    pub fn native_key_type(&self) -> &SchemaRef {
        &self.native_key_type
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StateKeyWiring {
    pub left: KeySelector,
    pub right: KeySelector,
}

impl StateKeyWiring {
    pub fn selector(&self, side: JoinSide) -> &KeySelector {
        match side {
            JoinSide::Left => &self.left,
            JoinSide::Right => &self.right,
        }
    }
}

pub fn derive_key_wiring(spec: &JoinSpec, left: &Schema, right: &Schema) -> Result<StateKeyWiring> {
    Ok(StateKeyWiring {
        left: KeySelector::new(spec.left_keys.clone(), left)?,
        right: KeySelector::new(spec.right_keys.clone(), right)?,
    })
}
