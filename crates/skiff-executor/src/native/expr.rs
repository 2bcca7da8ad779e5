use std::sync::Arc;

use datafusion::common::ScalarValue;
use datafusion::error::DataFusionError;
use datafusion::logical_expr::Operator;
use datafusion::physical_expr::PhysicalExpr;
use datafusion::physical_expr::expressions::{
    BinaryExpr, CaseExpr, CastExpr, Column, IsNotNullExpr, IsNullExpr, LikeExpr, Literal,
    NegativeExpr, NotExpr,
};
use skiff_arrow::RecordBatch;
use skiff_arrow::array::{AsArray, BooleanArray};
use skiff_arrow::datatypes::{Schema, SchemaRef};
use skiff_arrow::values_to_array;
use skiff_common::error::{Error, Result};
use skiff_planner::{NativeFunction, TypedExpr};

/// Lowers a native expression to a DataFusion physical expression over `schema`.
pub fn create_physical_expr(expr: &TypedExpr, schema: &SchemaRef) -> Result<Arc<dyn PhysicalExpr>> {
    match expr {
        TypedExpr::Field { name, .. } => {
            let index = schema.index_of(name).map_err(|_| {
                Error::condition_compilation(format!("field '{}' is not in the native row type", name))
            })?;
            Ok(Arc::new(Column::new(name, index)))
        }
        TypedExpr::Literal { value, data_type } => {
            let array = values_to_array(&[value], data_type)?;
            let scalar = ScalarValue::try_from_array(array.as_ref(), 0)
                .map_err(|e| Error::condition_compilation(e.to_string()))?;
            Ok(Arc::new(Literal::new(scalar)))
        }
        TypedExpr::Cast { expr, data_type } => {
            let inner = create_physical_expr(expr, schema)?;
            Ok(Arc::new(CastExpr::new(inner, data_type.clone(), None)))
        }
        TypedExpr::Call { function, args, .. } => {
            let args = args
                .iter()
                .map(|arg| create_physical_expr(arg, schema))
                .collect::<Result<Vec<_>>>()?;
            create_call(*function, args, schema)
        }
    }
}

fn create_call(
    function: NativeFunction,
    args: Vec<Arc<dyn PhysicalExpr>>,
    schema: &Schema,
) -> Result<Arc<dyn PhysicalExpr>> {
    let operator = match function {
        NativeFunction::EqualTo => Some(Operator::Eq),
        NativeFunction::NotEqualTo => Some(Operator::NotEq),
        NativeFunction::LessThan => Some(Operator::Lt),
        NativeFunction::LessThanOrEqual => Some(Operator::LtEq),
        NativeFunction::GreaterThan => Some(Operator::Gt),
        NativeFunction::GreaterThanOrEqual => Some(Operator::GtEq),
        NativeFunction::DistinctFrom => Some(Operator::IsDistinctFrom),
        NativeFunction::NotDistinctFrom => Some(Operator::IsNotDistinctFrom),
        NativeFunction::And => Some(Operator::And),
        NativeFunction::Or => Some(Operator::Or),
        NativeFunction::Plus => Some(Operator::Plus),
        NativeFunction::Minus => Some(Operator::Minus),
        NativeFunction::Multiply => Some(Operator::Multiply),
        NativeFunction::Divide => Some(Operator::Divide),
        NativeFunction::Modulus => Some(Operator::Modulo),
        NativeFunction::Not
        | NativeFunction::IsNull
        | NativeFunction::IsNotNull
        | NativeFunction::Negate
        | NativeFunction::Like => None,
    };

    if let Some(op) = operator {
        let [lhs, rhs] = arguments::<2>(function, args)?;
        if matches!(op, Operator::Divide | Operator::Modulo) {
            return null_on_zero_divisor(lhs, op, rhs, schema);
        }
        return Ok(Arc::new(BinaryExpr::new(lhs, op, rhs)));
    }

    match function {
        NativeFunction::Like => {
            let [value, pattern] = arguments::<2>(function, args)?;
            Ok(Arc::new(LikeExpr::new(false, false, value, pattern)))
        }
        NativeFunction::Not => {
            let [arg] = arguments::<1>(function, args)?;
            Ok(Arc::new(NotExpr::new(arg)))
        }
        NativeFunction::IsNull => {
            let [arg] = arguments::<1>(function, args)?;
            Ok(Arc::new(IsNullExpr::new(arg)))
        }
        NativeFunction::IsNotNull => {
            let [arg] = arguments::<1>(function, args)?;
            Ok(Arc::new(IsNotNullExpr::new(arg)))
        }
        NativeFunction::Negate => {
            let [arg] = arguments::<1>(function, args)?;
            Ok(Arc::new(NegativeExpr::new(arg)))
        }
        other => Err(Error::internal(format!(
            "{} has no physical lowering",
            other
        ))),
    }
}

/// `CASE WHEN rhs = 0 THEN NULL ELSE lhs op rhs END`; the quotient is only
/// evaluated on rows whose divisor is non-zero.
fn null_on_zero_divisor(
    lhs: Arc<dyn PhysicalExpr>,
    op: Operator,
    rhs: Arc<dyn PhysicalExpr>,
    schema: &Schema,
) -> Result<Arc<dyn PhysicalExpr>> {
    let compile = |e: DataFusionError| Error::condition_compilation(e.to_string());
    let divisor_type = rhs.data_type(schema).map_err(compile)?;
    let zero = ScalarValue::new_zero(&divisor_type).map_err(compile)?;
    let is_zero: Arc<dyn PhysicalExpr> =
        Arc::new(BinaryExpr::new(Arc::clone(&rhs), Operator::Eq, Arc::new(Literal::new(zero))));
    let quotient: Arc<dyn PhysicalExpr> = Arc::new(BinaryExpr::new(lhs, op, rhs));
    let null = ScalarValue::try_from(&quotient.data_type(schema).map_err(compile)?)
        .map_err(compile)?;
    let case = CaseExpr::try_new(
        None,
        vec![(is_zero, Arc::new(Literal::new(null)) as Arc<dyn PhysicalExpr>)],
        Some(quotient),
    )
    .map_err(compile)?;
    Ok(Arc::new(case))
}

fn arguments<const N: usize>(
    function: NativeFunction,
    args: Vec<Arc<dyn PhysicalExpr>>,
) -> Result<[Arc<dyn PhysicalExpr>; N]> {
    let count = args.len();
    args.try_into().map_err(|_| {
        Error::condition_compilation(format!(
            "{} takes {} arguments, got {}",
            function, N, count
        ))
    })
}

/// Evaluates a boolean predicate; `NULL` results count as not matching.
pub fn evaluate_predicate(expr: &Arc<dyn PhysicalExpr>, batch: &RecordBatch) -> Result<BooleanArray> {
    let result = expr
        .evaluate(batch)
        .and_then(|value| value.into_array(batch.num_rows()))
        .map_err(|e| Error::native_invocation(e.to_string()))?;
    let mask = result.as_boolean_opt().ok_or_else(|| {
        Error::native_invocation(format!(
            "join condition evaluated to {}, expected Boolean",
            result.data_type()
        ))
    })?;
    Ok(mask.clone())
}
