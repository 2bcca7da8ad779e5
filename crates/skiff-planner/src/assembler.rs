use rustc_hash::FxHashSet;
use skiff_arrow::{BridgedSchemas, TypeBridge};
use skiff_common::error::{Error, Result};
use skiff_common::types::Schema;
use skiff_ir::{JoinKind, JoinSide, JoinSpec};
use tracing::debug;

use crate::condition::compile_join_condition;
use crate::plan::{
    InputNode, NativeJoinKind, NativeJoinPlan, NestedLoopJoinNode, OperatorWiring,
    PlanNodeIdGenerator, StreamJoinNode,
};
use crate::typed_expr::TypedExpr;

/// Everything the bridge operator needs from planning.
#[derive(Debug, Clone)]
pub struct NativePlanParts {
    pub schemas: BridgedSchemas,
    pub condition: Option<TypedExpr>,
    pub plan: NativeJoinPlan,
    pub wiring: OperatorWiring,
}

/// Type bridge, condition compilation and plan assembly for the native bridge.
pub fn plan_native_join(
    spec: &JoinSpec,
    left: &Schema,
    right: &Schema,
    output: &Schema,
    ids: &mut PlanNodeIdGenerator,
) -> Result<NativePlanParts> {
    NativeJoinKind::from_join_kind(spec.kind)?;
    let schemas = TypeBridge::translate(spec.kind, left, right, output)?;
    let condition = compile_join_condition(spec, left, right, &schemas.output)?;
    let plan = assemble_native_plan(spec.kind, &schemas, condition.clone(), ids)?;
    let wiring = plan.wiring();
    Ok(NativePlanParts {
        schemas,
        condition,
        plan,
        wiring,
    })
}

/// Builds the two input placeholders, the mirrored nested-loop join nodes and
/// the coordinating stream join node. Ids are allocated only once every check
/// has passed.
pub fn assemble_native_plan(
    kind: JoinKind,
    schemas: &BridgedSchemas,
    condition: Option<TypedExpr>,
    ids: &mut PlanNodeIdGenerator,
) -> Result<NativeJoinPlan> {
    let join_kind = NativeJoinKind::from_join_kind(kind)?;

    let expected = schemas.left.fields().len() + schemas.right.fields().len();
    let output = &schemas.output;
    if output.fields().len() != expected {
        return Err(Error::plan_assembly(format!(
            "output layout has {} fields, inputs provide {}",
            output.fields().len(),
            expected
        )));
    }

    let inputs = schemas.left.fields().iter().chain(schemas.right.fields());
    for (position, (out, input)) in output.fields().iter().zip(inputs).enumerate() {
        if out.data_type() != input.data_type() {
            return Err(Error::plan_assembly(format!(
                "output field '{}' at position {} is {}, its input field '{}' is {}",
                out.name(),
                position,
                out.data_type(),
                input.name(),
                input.data_type()
            )));
        }
    }

    let mut seen = FxHashSet::default();
    for field in output.fields() {
        if !seen.insert(field.name().as_str()) {
            return Err(Error::plan_assembly(format!(
                "duplicate output field name '{}'",
                field.name()
            )));
        }
    }

    if let Some(cond) = &condition {
        if let Some(missing) = cond
            .referenced_names()
            .into_iter()
            .find(|name| !seen.contains(name))
        {
            return Err(Error::plan_assembly(format!(
                "condition references '{}' which the output layout does not define",
                missing
            )));
        }
    }

    let left_input = InputNode {
        id: ids.next_id(),
        side: JoinSide::Left,
        output_type: schemas.left.clone(),
    };
    let right_input = InputNode {
        id: ids.next_id(),
        side: JoinSide::Right,
        output_type: schemas.right.clone(),
    };
    let left_probe = NestedLoopJoinNode {
        id: ids.next_id(),
        join_kind,
        condition: condition.clone(),
        probe_side: JoinSide::Left,
        probe_type: schemas.left.clone(),
        build_type: schemas.right.clone(),
        output_type: output.clone(),
    };
    let right_probe = NestedLoopJoinNode {
        id: ids.next_id(),
        join_kind,
        condition,
        probe_side: JoinSide::Right,
        probe_type: schemas.right.clone(),
        build_type: schemas.left.clone(),
        output_type: output.clone(),
    };
    let root = StreamJoinNode {
        id: ids.next_id(),
        left_input,
        right_input,
        left_probe,
        right_probe,
        output_type: output.clone(),
    };
    debug!(root = %root.id, kind = %join_kind, "assembled native join plan");
    Ok(NativeJoinPlan { root })
}
