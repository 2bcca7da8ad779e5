use std::cell::RefCell;
use std::cmp::Ordering;
use std::num::NonZeroUsize;

use lru::LruCache;
use ordered_float::OrderedFloat;
use rust_decimal::Decimal;
use skiff_common::error::{Error, Result};
use skiff_common::row::Row;
use skiff_common::types::{DataType, Value};
use skiff_ir::{BinaryOp, Expr, UnaryOp};

const LIKE_CACHE_SIZE: NonZeroUsize = NonZeroUsize::MIN.saturating_add(255);

thread_local! {
    static LIKE_REGEX_CACHE: RefCell<LruCache<String, regex::Regex>> =
        RefCell::new(LruCache::new(LIKE_CACHE_SIZE));
}

/// Evaluates relational predicates over a combined (left ++ right) row.
pub struct RowEvaluator<'a> {
    row: &'a Row,
}

impl<'a> RowEvaluator<'a> {
    pub fn new(row: &'a Row) -> Self {
        Self { row }
    }

    /// SQL truth: only `TRUE` passes, `NULL` and `FALSE` do not.
    pub fn is_true(&self, expr: &Expr) -> Result<bool> {
        match self.evaluate(expr)? {
            Value::Boolean(b) => Ok(b),
            Value::Null => Ok(false),
            other => Err(Error::type_mismatch("BOOLEAN", other.type_name())),
        }
    }

    pub fn evaluate(&self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::InputRef { index, .. } => self.row.get(*index).cloned().ok_or_else(|| {
                Error::internal(format!(
                    "input reference ${} outside row of {} values",
                    index,
                    self.row.len()
                ))
            }),
            Expr::Literal { value, .. } => Ok(value.clone()),
            Expr::BinaryOp { left, op, right } => self.eval_binary_op(left, *op, right),
            Expr::UnaryOp { op, expr } => self.eval_unary_op(*op, expr),
            Expr::Cast { expr, data_type } => cast_value(self.evaluate(expr)?, data_type),
            Expr::Call { name, args, .. } => self.eval_call(name, args),
        }
    }

    fn eval_binary_op(&self, left: &Expr, op: BinaryOp, right: &Expr) -> Result<Value> {
        let left_val = self.evaluate(left)?;
        let right_val = self.evaluate(right)?;

        match op {
            BinaryOp::And => match (&left_val, &right_val) {
                (Value::Boolean(false), _) | (_, Value::Boolean(false)) => {
                    Ok(Value::Boolean(false))
                }
                (Value::Boolean(true), Value::Boolean(true)) => Ok(Value::Boolean(true)),
                (Value::Null, _) | (_, Value::Null) => Ok(Value::Null),
                _ => Err(Error::type_mismatch(
                    "BOOLEAN",
                    format!("{} AND {}", left_val.type_name(), right_val.type_name()),
                )),
            },
            BinaryOp::Or => match (&left_val, &right_val) {
                (Value::Boolean(true), _) | (_, Value::Boolean(true)) => Ok(Value::Boolean(true)),
                (Value::Boolean(false), Value::Boolean(false)) => Ok(Value::Boolean(false)),
                (Value::Null, _) | (_, Value::Null) => Ok(Value::Null),
                _ => Err(Error::type_mismatch(
                    "BOOLEAN",
                    format!("{} OR {}", left_val.type_name(), right_val.type_name()),
                )),
            },
            BinaryOp::Eq => Ok(compare_with(&left_val, &right_val, Ordering::is_eq)),
            BinaryOp::NotEq => Ok(compare_with(&left_val, &right_val, Ordering::is_ne)),
            BinaryOp::Lt => Ok(compare_with(&left_val, &right_val, Ordering::is_lt)),
            BinaryOp::LtEq => Ok(compare_with(&left_val, &right_val, Ordering::is_le)),
            BinaryOp::Gt => Ok(compare_with(&left_val, &right_val, Ordering::is_gt)),
            BinaryOp::GtEq => Ok(compare_with(&left_val, &right_val, Ordering::is_ge)),
            BinaryOp::IsDistinctFrom => {
                Ok(Value::Boolean(!not_distinct(&left_val, &right_val)))
            }
            BinaryOp::IsNotDistinctFrom => {
                Ok(Value::Boolean(not_distinct(&left_val, &right_val)))
            }
            BinaryOp::Plus => arithmetic(op, &left_val, &right_val),
            BinaryOp::Minus => arithmetic(op, &left_val, &right_val),
            BinaryOp::Multiply => arithmetic(op, &left_val, &right_val),
            BinaryOp::Divide => arithmetic(op, &left_val, &right_val),
            BinaryOp::Modulo => arithmetic(op, &left_val, &right_val),
        }
    }

    fn eval_unary_op(&self, op: UnaryOp, expr: &Expr) -> Result<Value> {
        let val = self.evaluate(expr)?;
        match op {
            UnaryOp::Not => match val {
                Value::Null => Ok(Value::Null),
                Value::Boolean(b) => Ok(Value::Boolean(!b)),
                other => Err(Error::type_mismatch("BOOLEAN", other.type_name())),
            },
            UnaryOp::IsNull => Ok(Value::Boolean(val.is_null())),
            UnaryOp::IsNotNull => Ok(Value::Boolean(!val.is_null())),
            UnaryOp::Negate => match val {
                Value::Null => Ok(Value::Null),
                Value::TinyInt(n) => Ok(Value::TinyInt(n.wrapping_neg())),
                Value::SmallInt(n) => Ok(Value::SmallInt(n.wrapping_neg())),
                Value::Integer(n) => Ok(Value::Integer(n.wrapping_neg())),
                Value::BigInt(n) => Ok(Value::BigInt(n.wrapping_neg())),
                Value::Float(f) => Ok(Value::Float(OrderedFloat(-f.0))),
                Value::Double(f) => Ok(Value::Double(OrderedFloat(-f.0))),
                Value::Decimal(d) => Ok(Value::Decimal(-d)),
                other => Err(Error::type_mismatch("numeric", other.type_name())),
            },
        }
    }

    fn eval_call(&self, name: &str, args: &[Expr]) -> Result<Value> {
        match (name.to_ascii_lowercase().as_str(), args) {
            ("like", [value, pattern]) => {
                match (self.evaluate(value)?, self.evaluate(pattern)?) {
                    (Value::Null, _) | (_, Value::Null) => Ok(Value::Null),
                    (Value::String(s), Value::String(p)) => Ok(Value::Boolean(like_match(&s, &p)?)),
                    (v, p) => Err(Error::type_mismatch(
                        "STRING",
                        format!("like({}, {})", v.type_name(), p.type_name()),
                    )),
                }
            }
            _ => Err(Error::internal(format!(
                "function {}/{} cannot be evaluated",
                name,
                args.len()
            ))),
        }
    }
}

fn compare_with(a: &Value, b: &Value, accept: fn(Ordering) -> bool) -> Value {
    match a.compare(b) {
        Some(ord) => Value::Boolean(accept(ord)),
        None => Value::Null,
    }
}

fn not_distinct(a: &Value, b: &Value) -> bool {
    match (a.is_null(), b.is_null()) {
        (true, true) => true,
        (false, false) => a.compare(b) == Some(Ordering::Equal),
        _ => false,
    }
}

fn arithmetic(op: BinaryOp, a: &Value, b: &Value) -> Result<Value> {
    if a.is_null() || b.is_null() {
        return Ok(Value::Null);
    }
    let is_float = |v: &Value| matches!(v, Value::Float(_) | Value::Double(_));
    let is_decimal = |v: &Value| matches!(v, Value::Decimal(_));

    if is_float(a) || is_float(b) {
        let (x, y) = match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => (x, y),
            _ => return Err(numeric_mismatch(op, a, b)),
        };
        let result = match op {
            BinaryOp::Plus => x + y,
            BinaryOp::Minus => x - y,
            BinaryOp::Multiply => x * y,
            BinaryOp::Divide if y == 0.0 => return Ok(Value::Null),
            BinaryOp::Divide => x / y,
            BinaryOp::Modulo if y == 0.0 => return Ok(Value::Null),
            BinaryOp::Modulo => x % y,
            _ => return Err(numeric_mismatch(op, a, b)),
        };
        return Ok(Value::double(result));
    }

    if is_decimal(a) || is_decimal(b) {
        let (x, y): (Decimal, Decimal) = match (a.as_decimal(), b.as_decimal()) {
            (Some(x), Some(y)) => (x, y),
            _ => return Err(numeric_mismatch(op, a, b)),
        };
        let result = match op {
            BinaryOp::Plus => x.checked_add(y),
            BinaryOp::Minus => x.checked_sub(y),
            BinaryOp::Multiply => x.checked_mul(y),
            BinaryOp::Divide => x.checked_div(y),
            BinaryOp::Modulo => x.checked_rem(y),
            _ => return Err(numeric_mismatch(op, a, b)),
        };
        return Ok(result.map_or(Value::Null, Value::Decimal));
    }

    let (x, y) = match (a.as_i64(), b.as_i64()) {
        (Some(x), Some(y)) => (x, y),
        _ => return Err(numeric_mismatch(op, a, b)),
    };
    // Integer arithmetic is BIGINT and wraps; a zero divisor yields NULL.
    let result = match op {
        BinaryOp::Plus => Some(x.wrapping_add(y)),
        BinaryOp::Minus => Some(x.wrapping_sub(y)),
        BinaryOp::Multiply => Some(x.wrapping_mul(y)),
        BinaryOp::Divide => x.checked_div(y),
        BinaryOp::Modulo => x.checked_rem(y),
        _ => return Err(numeric_mismatch(op, a, b)),
    };
    Ok(result.map_or(Value::Null, Value::BigInt))
}

fn numeric_mismatch(op: BinaryOp, a: &Value, b: &Value) -> Error {
    Error::type_mismatch(
        "numeric",
        format!("{} {} {}", a.type_name(), op.symbol(), b.type_name()),
    )
}

fn cast_value(value: Value, target: &DataType) -> Result<Value> {
    if value.is_null() {
        return Ok(Value::Null);
    }
    let out_of_range = |v: &Value| Error::type_mismatch(target.to_string(), v.to_string());
    match target {
        DataType::Boolean => value
            .as_bool()
            .map(Value::Boolean)
            .ok_or_else(|| out_of_range(&value)),
        DataType::TinyInt => value
            .as_i64()
            .and_then(|n| i8::try_from(n).ok())
            .map(Value::TinyInt)
            .ok_or_else(|| out_of_range(&value)),
        DataType::SmallInt => value
            .as_i64()
            .and_then(|n| i16::try_from(n).ok())
            .map(Value::SmallInt)
            .ok_or_else(|| out_of_range(&value)),
        DataType::Integer => value
            .as_i64()
            .and_then(|n| i32::try_from(n).ok())
            .map(Value::Integer)
            .ok_or_else(|| out_of_range(&value)),
        DataType::BigInt => value
            .as_i64()
            .map(Value::BigInt)
            .ok_or_else(|| out_of_range(&value)),
        DataType::Float => value
            .as_f64()
            .map(|f| Value::float(f as f32))
            .ok_or_else(|| out_of_range(&value)),
        DataType::Double => value
            .as_f64()
            .map(Value::double)
            .ok_or_else(|| out_of_range(&value)),
        DataType::Decimal { scale, .. } => value
            .as_decimal()
            .map(|d| Value::Decimal(d.round_dp(u32::from(*scale))))
            .ok_or_else(|| out_of_range(&value)),
        DataType::Char(_) | DataType::String => match value {
            Value::String(s) => Ok(Value::String(s)),
            other => Ok(Value::String(other.to_string())),
        },
        _ => Err(Error::type_mismatch(target.to_string(), value.type_name())),
    }
}

/// SQL `LIKE` with `%` and `_` wildcards; every other character matches itself.
fn like_match(s: &str, pattern: &str) -> Result<bool> {
    LIKE_REGEX_CACHE.with(|cache| {
        let mut cache = cache.borrow_mut();
        if let Some(re) = cache.get(pattern) {
            return Ok(re.is_match(s));
        }
        let mut regex_pattern = String::with_capacity(pattern.len() + 8);
        regex_pattern.push_str("(?s)^");
        for ch in pattern.chars() {
            match ch {
                '%' => regex_pattern.push_str(".*"),
                '_' => regex_pattern.push('.'),
                other => regex_pattern.push_str(&regex::escape(other.encode_utf8(&mut [0; 4]))),
            }
        }
        regex_pattern.push('$');
        let re = regex::Regex::new(&regex_pattern)
            .map_err(|e| Error::internal(format!("LIKE pattern '{}': {}", pattern, e)))?;
        let result = re.is_match(s);
        cache.put(pattern.to_string(), re);
        Ok(result)
    })
}
