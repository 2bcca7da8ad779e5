use skiff_arrow::arrow::compute::can_cast_types;
use skiff_arrow::datatypes::{DataType as ArrowDataType, SchemaRef};
use skiff_arrow::to_arrow_type;
use skiff_common::error::{Error, Result};
use skiff_common::types::Schema;
use skiff_ir::{BinaryOp, Expr, JoinSpec, UnaryOp};

use crate::typed_expr::{NativeFunction, TypedExpr};

/// Checks the key position sequences of `spec` against both input row types.
pub fn validate_keys(spec: &JoinSpec, left: &Schema, right: &Schema) -> Result<()> {
    if spec.left_keys.len() != spec.right_keys.len() {
        return Err(Error::condition_compilation(format!(
            "join key lengths differ: {} left keys, {} right keys",
            spec.left_keys.len(),
            spec.right_keys.len()
        )));
    }
    if spec.filter_nulls.len() != spec.left_keys.len() {
        return Err(Error::condition_compilation(format!(
            "expected {} null filtering flags, got {}",
            spec.left_keys.len(),
            spec.filter_nulls.len()
        )));
    }
    for (pair, (&l, &r)) in spec.left_keys.iter().zip(&spec.right_keys).enumerate() {
        let left_field = left.field(l).ok_or_else(|| {
            Error::condition_compilation(format!(
                "left key {} out of range for {} fields",
                l,
                left.num_fields()
            ))
        })?;
        let right_field = right.field(r).ok_or_else(|| {
            Error::condition_compilation(format!(
                "right key {} out of range for {} fields",
                r,
                right.num_fields()
            ))
        })?;
        if left_field.data_type == right_field.data_type {
            continue;
        }
        let left_native = to_arrow_type(&left_field.data_type)?;
        let right_native = to_arrow_type(&right_field.data_type)?;
        if left_native != right_native {
            return Err(Error::condition_compilation(format!(
                "key pair {} has different types: {} {} vs {} {}",
                pair, left_field.name, left_field.data_type, right_field.name, right_field.data_type
            )));
        }
    }
    Ok(())
}

/// Builds one equality per key pair against the combined native output row
/// type and conjoins the compiled non-equi predicate after them.
pub fn compile_join_condition(
    spec: &JoinSpec,
    left: &Schema,
    right: &Schema,
    output: &SchemaRef,
) -> Result<Option<TypedExpr>> {
    validate_keys(spec, left, right)?;
    let left_len = left.num_fields();

    let mut conjuncts = Vec::with_capacity(spec.num_keys() + 1);
    for (pair, (&l, &r)) in spec.left_keys.iter().zip(&spec.right_keys).enumerate() {
        let function = if spec.filters_nulls(pair) {
            NativeFunction::EqualTo
        } else {
            NativeFunction::NotDistinctFrom
        };
        let lhs = output_field(output, l)?;
        let rhs = output_field(output, left_len + r)?;
        conjuncts.push(TypedExpr::predicate(function, vec![lhs, rhs]));
    }

    if let Some(predicate) = &spec.non_equi_condition {
        let compiled = compile_predicate(predicate, output)?;
        if compiled.data_type() != &ArrowDataType::Boolean {
            return Err(Error::condition_compilation(format!(
                "join predicate {} is {}, expected Boolean",
                predicate,
                compiled.data_type()
            )));
        }
        conjuncts.push(compiled);
    }

    Ok(TypedExpr::conjunction(conjuncts))
}

fn output_field(output: &SchemaRef, index: usize) -> Result<TypedExpr> {
    if index >= output.fields().len() {
        return Err(Error::condition_compilation(format!(
            "unresolved field reference ${} (output has {} fields)",
            index,
            output.fields().len()
        )));
    }
    let field = output.field(index);
    Ok(TypedExpr::field(field.name(), field.data_type().clone()))
}

/// Compiles a relational predicate whose input references address `output`.
pub fn compile_predicate(expr: &Expr, output: &SchemaRef) -> Result<TypedExpr> {
    match expr {
        Expr::InputRef { index, .. } => output_field(output, *index),
        Expr::Literal { value, data_type } => {
            let native = to_arrow_type(data_type)
                .map_err(|e| Error::condition_compilation(e.to_string()))?;
            Ok(TypedExpr::literal(value.clone(), native))
        }
        Expr::Cast { expr: inner, data_type } => {
            let compiled = compile_predicate(inner, output)?;
            let target = to_arrow_type(data_type)
                .map_err(|e| Error::condition_compilation(e.to_string()))?;
            if !can_cast_types(compiled.data_type(), &target) {
                return Err(Error::condition_compilation(format!(
                    "cannot cast {} to {}",
                    compiled.data_type(),
                    target
                )));
            }
            Ok(TypedExpr::cast(compiled, target))
        }
        Expr::UnaryOp { op, expr: inner } => {
            let compiled = compile_predicate(inner, output)?;
            match op {
                UnaryOp::Not => {
                    expect_boolean(&compiled, "NOT")?;
                    Ok(TypedExpr::predicate(NativeFunction::Not, vec![compiled]))
                }
                UnaryOp::IsNull => Ok(TypedExpr::predicate(NativeFunction::IsNull, vec![compiled])),
                UnaryOp::IsNotNull => {
                    Ok(TypedExpr::predicate(NativeFunction::IsNotNull, vec![compiled]))
                }
                UnaryOp::Negate => {
                    if !is_numeric(compiled.data_type()) {
                        return Err(incompatible("negate", compiled.data_type(), None));
                    }
                    let data_type = compiled.data_type().clone();
                    Ok(TypedExpr::call(NativeFunction::Negate, vec![compiled], data_type))
                }
            }
        }
        Expr::BinaryOp { left, op, right } => {
            let lhs = compile_predicate(left, output)?;
            let rhs = compile_predicate(right, output)?;
            compile_binary(*op, lhs, rhs)
        }
        Expr::Call { name, args, .. } => {
            if !name.eq_ignore_ascii_case("like") || args.len() != 2 {
                return Err(Error::condition_compilation(format!(
                    "unsupported function {}/{}",
                    name,
                    args.len()
                )));
            }
            let compiled = args
                .iter()
                .map(|a| compile_predicate(a, output))
                .collect::<Result<Vec<_>>>()?;
            for arg in &compiled {
                if !is_string(arg.data_type()) {
                    return Err(incompatible("like", arg.data_type(), None));
                }
            }
            Ok(TypedExpr::predicate(NativeFunction::Like, compiled))
        }
    }
}

fn compile_binary(op: BinaryOp, lhs: TypedExpr, rhs: TypedExpr) -> Result<TypedExpr> {
    if op.is_logical() {
        expect_boolean(&lhs, op.symbol())?;
        expect_boolean(&rhs, op.symbol())?;
        let function = match op {
            BinaryOp::And => NativeFunction::And,
            _ => NativeFunction::Or,
        };
        return Ok(TypedExpr::predicate(function, vec![lhs, rhs]));
    }

    let (lhs, rhs) = if op.is_arithmetic() {
        widen_arithmetic(op, lhs, rhs)?
    } else {
        coerce(op, lhs, rhs)?
    };
    let function = match op {
        BinaryOp::Eq => NativeFunction::EqualTo,
        BinaryOp::NotEq => NativeFunction::NotEqualTo,
        BinaryOp::Lt => NativeFunction::LessThan,
        BinaryOp::LtEq => NativeFunction::LessThanOrEqual,
        BinaryOp::Gt => NativeFunction::GreaterThan,
        BinaryOp::GtEq => NativeFunction::GreaterThanOrEqual,
        BinaryOp::IsDistinctFrom => NativeFunction::DistinctFrom,
        BinaryOp::IsNotDistinctFrom => NativeFunction::NotDistinctFrom,
        BinaryOp::Plus => NativeFunction::Plus,
        BinaryOp::Minus => NativeFunction::Minus,
        BinaryOp::Multiply => NativeFunction::Multiply,
        BinaryOp::Divide => NativeFunction::Divide,
        BinaryOp::Modulo => NativeFunction::Modulus,
        BinaryOp::And => NativeFunction::And,
        BinaryOp::Or => NativeFunction::Or,
    };
    if op.is_arithmetic() {
        if !is_numeric(lhs.data_type()) {
            return Err(incompatible(op.symbol(), lhs.data_type(), Some(rhs.data_type())));
        }
        let data_type = lhs.data_type().clone();
        Ok(TypedExpr::call(function, vec![lhs, rhs], data_type))
    } else {
        Ok(TypedExpr::predicate(function, vec![lhs, rhs]))
    }
}

/// Integer arithmetic runs on BIGINT and float arithmetic on DOUBLE, whatever the operand widths.
fn widen_arithmetic(op: BinaryOp, lhs: TypedExpr, rhs: TypedExpr) -> Result<(TypedExpr, TypedExpr)> {
    let (lt, rt) = (lhs.data_type(), rhs.data_type());
    let target = if is_integer(lt) && is_integer(rt) {
        ArrowDataType::Int64
    } else if is_float(lt) || is_float(rt) {
        if !is_numeric(lt) || !is_numeric(rt) {
            return Err(incompatible(op.symbol(), lt, Some(rt)));
        }
        ArrowDataType::Float64
    } else {
        return coerce(op, lhs, rhs);
    };
    Ok((
        TypedExpr::cast(lhs, target.clone()),
        TypedExpr::cast(rhs, target),
    ))
}

/// Brings both operands to one type; mixed numeric widths widen to BIGINT or DOUBLE.
fn coerce(op: BinaryOp, lhs: TypedExpr, rhs: TypedExpr) -> Result<(TypedExpr, TypedExpr)> {
    let (lt, rt) = (lhs.data_type(), rhs.data_type());
    if lt == rt {
        return Ok((lhs, rhs));
    }
    if is_numeric(lt) && is_numeric(rt) {
        let target = if is_integer(lt) && is_integer(rt) {
            ArrowDataType::Int64
        } else {
            ArrowDataType::Float64
        };
        return Ok((
            TypedExpr::cast(lhs, target.clone()),
            TypedExpr::cast(rhs, target),
        ));
    }
    if is_string(lt) && is_string(rt) {
        return Ok((
            TypedExpr::cast(lhs, ArrowDataType::Utf8),
            TypedExpr::cast(rhs, ArrowDataType::Utf8),
        ));
    }
    Err(incompatible(op.symbol(), lt, Some(rt)))
}

fn expect_boolean(expr: &TypedExpr, op: &str) -> Result<()> {
    if expr.data_type() == &ArrowDataType::Boolean {
        Ok(())
    } else {
        Err(incompatible(op, expr.data_type(), None))
    }
}

fn incompatible(op: &str, lt: &ArrowDataType, rt: Option<&ArrowDataType>) -> Error {
    match rt {
        Some(rt) => Error::condition_compilation(format!(
            "incompatible operand types for {}: {} and {}",
            op, lt, rt
        )),
        None => Error::condition_compilation(format!("incompatible operand type for {}: {}", op, lt)),
    }
}

fn is_integer(dt: &ArrowDataType) -> bool {
    matches!(
        dt,
        ArrowDataType::Int8 | ArrowDataType::Int16 | ArrowDataType::Int32 | ArrowDataType::Int64
    )
}

fn is_float(dt: &ArrowDataType) -> bool {
    matches!(dt, ArrowDataType::Float32 | ArrowDataType::Float64)
}

fn is_numeric(dt: &ArrowDataType) -> bool {
    is_integer(dt)
        || matches!(
            dt,
            ArrowDataType::Float32 | ArrowDataType::Float64 | ArrowDataType::Decimal128(_, _)
        )
}

fn is_string(dt: &ArrowDataType) -> bool {
    matches!(dt, ArrowDataType::Utf8 | ArrowDataType::LargeUtf8)
}
