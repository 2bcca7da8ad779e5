use std::collections::BTreeMap;
use std::time::Duration;

use skiff_common::config::JoinConfig;
use skiff_common::error::{Error, Result};
use skiff_arrow::to_arrow_type;
use skiff_common::types::{Field, Schema};
use skiff_ir::{JoinKind, JoinSide, JoinSpec, StateRetentionPolicy};
use tracing::{debug, instrument};

use crate::analyzer::{InputSideSpec, analyze_input_side};
use crate::condition::validate_keys;
use crate::key_selector::{StateKeyWiring, derive_key_wiring};
use crate::strategy::{JoinStrategy, select_strategy};

/// A join to translate, with everything known about its two inputs.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinRequest {
    pub spec: JoinSpec,
    pub left_type: Schema,
    pub right_type: Schema,
    pub left_upsert_keys: Vec<Vec<usize>>,
    pub right_upsert_keys: Vec<Vec<usize>>,
    /// Retention hints keyed by input index (0 = left, 1 = right).
    pub state_ttl_hints: BTreeMap<usize, Duration>,
}

impl JoinRequest {
    pub fn new(spec: JoinSpec, left_type: Schema, right_type: Schema) -> Self {
        Self {
            spec,
            left_type,
            right_type,
            left_upsert_keys: Vec::new(),
            right_upsert_keys: Vec::new(),
            state_ttl_hints: BTreeMap::new(),
        }
    }

    pub fn with_upsert_keys(mut self, side: JoinSide, keys: Vec<Vec<usize>>) -> Self {
        match side {
            JoinSide::Left => self.left_upsert_keys = keys,
            JoinSide::Right => self.right_upsert_keys = keys,
        }
        self
    }

    pub fn with_state_ttl_hint(mut self, side: JoinSide, ttl: Duration) -> Self {
        self.state_ttl_hints.insert(side.input_index(), ttl);
        self
    }

    pub fn input_type(&self, side: JoinSide) -> &Schema {
        match side {
            JoinSide::Left => &self.left_type,
            JoinSide::Right => &self.right_type,
        }
    }
}

/// Strategy-independent result of planning a join.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedJoin {
    pub spec: JoinSpec,
    pub left_type: Schema,
    pub right_type: Schema,
    pub output_schema: Schema,
    pub left_input: InputSideSpec,
    pub right_input: InputSideSpec,
    pub strategy: JoinStrategy,
    pub retention: StateRetentionPolicy,
    pub key_wiring: StateKeyWiring,
}

impl PreparedJoin {
    pub fn kind(&self) -> JoinKind {
        self.spec.kind
    }

    pub fn input_spec(&self, side: JoinSide) -> &InputSideSpec {
        match side {
            JoinSide::Left => &self.left_input,
            JoinSide::Right => &self.right_input,
        }
    }
}

/// Validates the request and derives everything every strategy shares.
#[instrument(level = "debug", skip_all, fields(kind = %request.spec.kind))]
pub fn prepare_join(request: &JoinRequest, config: &JoinConfig) -> Result<PreparedJoin> {
    config.validate()?;
    let spec = &request.spec;

    validate_keys(spec, &request.left_type, &request.right_type)?;
    validate_predicate(request)?;

    let strategy = select_strategy(spec.kind, config);
    if !spec.is_equi_join() && strategy.uses_keyed_state() {
        return Err(Error::plan_assembly(format!(
            "{} strategy keeps keyed state and needs at least one equi-join key",
            strategy
        )));
    }

    let output_schema = conform_output_layout(spec, &request.left_type, &request.right_type)?;
    let left_input = analyze_input_side(
        &spec.left_keys,
        &request.left_upsert_keys,
        &request.left_type,
    );
    let right_input = analyze_input_side(
        &spec.right_keys,
        &request.right_upsert_keys,
        &request.right_type,
    );
    let retention = StateRetentionPolicy::resolve(&request.state_ttl_hints, config.state.ttl());
    let key_wiring = derive_key_wiring(spec, &request.left_type, &request.right_type)?;

    debug!(
        strategy = %strategy,
        left = ?left_input.class,
        right = ?right_input.class,
        "selected join strategy"
    );

    Ok(PreparedJoin {
        spec: spec.clone(),
        left_type: request.left_type.clone(),
        right_type: request.right_type.clone(),
        output_schema,
        left_input,
        right_input,
        strategy,
        retention,
        key_wiring,
    })
}

/// Resolves the output layout and checks an explicit one against the inputs:
/// one field per input field, each of the same native type. A position turns
/// nullable when its input field is nullable or its side may be null-padded.
fn conform_output_layout(spec: &JoinSpec, left: &Schema, right: &Schema) -> Result<Schema> {
    let layout = spec.resolve_output_schema(left, right);
    let inputs: Vec<(&Field, bool)> = if spec.kind.is_semi_or_anti() {
        left.fields().iter().map(|f| (f, false)).collect()
    } else {
        left.fields()
            .iter()
            .map(|f| (f, spec.kind.is_right_outer()))
            .chain(right.fields().iter().map(|f| (f, spec.kind.is_left_outer())))
            .collect()
    };
    if layout.num_fields() != inputs.len() {
        return Err(Error::plan_assembly(format!(
            "{} join outputs {} fields, layout has {}",
            spec.kind,
            inputs.len(),
            layout.num_fields()
        )));
    }

    let mut fields = Vec::with_capacity(inputs.len());
    for (position, (out, (input, padded))) in layout.fields().iter().zip(inputs).enumerate() {
        if to_arrow_type(&out.data_type)? != to_arrow_type(&input.data_type)? {
            return Err(Error::plan_assembly(format!(
                "output field '{}' at position {} is {}, its input field '{}' is {}",
                out.name, position, out.data_type, input.name, input.data_type
            )));
        }
        fields.push(if padded || input.is_nullable() {
            out.clone().into_nullable()
        } else {
            out.clone()
        });
    }
    Ok(Schema::from_fields(fields))
}

fn validate_predicate(request: &JoinRequest) -> Result<()> {
    let spec = &request.spec;
    let width = request.left_type.num_fields() + request.right_type.num_fields();
    match &spec.non_equi_condition {
        None if !spec.is_equi_join() => Err(Error::condition_compilation(
            "join has neither equi-join keys nor a join predicate",
        )),
        None => Ok(()),
        Some(predicate) => match predicate.referenced_inputs().into_iter().find(|&i| i >= width) {
            Some(index) => Err(Error::condition_compilation(format!(
                "unresolved field reference ${} in join predicate over {} fields",
                index, width
            ))),
            None => Ok(()),
        },
    }
}
