use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use skiff_common::types::{DataType, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
    Plus,
    Minus,
    Multiply,
    Divide,
    Modulo,
    IsDistinctFrom,
    IsNotDistinctFrom,
}

impl BinaryOp {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq
                | BinaryOp::NotEq
                | BinaryOp::Lt
                | BinaryOp::LtEq
                | BinaryOp::Gt
                | BinaryOp::GtEq
                | BinaryOp::IsDistinctFrom
                | BinaryOp::IsNotDistinctFrom
        )
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }

    pub fn is_arithmetic(self) -> bool {
        matches!(
            self,
            BinaryOp::Plus
                | BinaryOp::Minus
                | BinaryOp::Multiply
                | BinaryOp::Divide
                | BinaryOp::Modulo
        )
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Eq => "=",
            BinaryOp::NotEq => "<>",
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtEq => ">=",
            BinaryOp::And => "AND",
            BinaryOp::Or => "OR",
            BinaryOp::Plus => "+",
            BinaryOp::Minus => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Modulo => "%",
            BinaryOp::IsDistinctFrom => "IS DISTINCT FROM",
            BinaryOp::IsNotDistinctFrom => "IS NOT DISTINCT FROM",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    Not,
    IsNull,
    IsNotNull,
    Negate,
}

/// Predicate expression over the combined (left ++ right) input row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Expr {
    InputRef {
        index: usize,
        data_type: DataType,
    },
    Literal {
        value: Value,
        data_type: DataType,
    },
    BinaryOp {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },
    UnaryOp {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Cast {
        expr: Box<Expr>,
        data_type: DataType,
    },
    Call {
        name: String,
        args: Vec<Expr>,
        return_type: DataType,
    },
}

impl Expr {
    pub fn input_ref(index: usize, data_type: DataType) -> Self {
        Expr::InputRef { index, data_type }
    }

    pub fn literal(value: Value, data_type: DataType) -> Self {
        Expr::Literal { value, data_type }
    }

    pub fn binary(left: Expr, op: BinaryOp, right: Expr) -> Self {
        Expr::BinaryOp {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    pub fn unary(op: UnaryOp, expr: Expr) -> Self {
        Expr::UnaryOp {
            op,
            expr: Box::new(expr),
        }
    }

    pub fn cast(expr: Expr, data_type: DataType) -> Self {
        Expr::Cast {
            expr: Box::new(expr),
            data_type,
        }
    }

    pub fn call(name: impl Into<String>, args: Vec<Expr>, return_type: DataType) -> Self {
        Expr::Call {
            name: name.into(),
            args,
            return_type,
        }
    }

    pub fn eq(left: Expr, right: Expr) -> Self {
        Self::binary(left, BinaryOp::Eq, right)
    }

    pub fn gt(left: Expr, right: Expr) -> Self {
        Self::binary(left, BinaryOp::Gt, right)
    }

    pub fn lt(left: Expr, right: Expr) -> Self {
        Self::binary(left, BinaryOp::Lt, right)
    }

    pub fn and(left: Expr, right: Expr) -> Self {
        Self::binary(left, BinaryOp::And, right)
    }

    pub fn data_type(&self) -> DataType {
        match self {
            Expr::InputRef { data_type, .. }
            | Expr::Literal { data_type, .. }
            | Expr::Cast { data_type, .. } => data_type.clone(),
            Expr::Call { return_type, .. } => return_type.clone(),
            Expr::UnaryOp { op, expr } => match op {
                UnaryOp::Negate => expr.data_type(),
                _ => DataType::Boolean,
            },
            Expr::BinaryOp { left, op, right } => {
                if op.is_arithmetic() {
                    arithmetic_result_type(&left.data_type(), &right.data_type())
                } else {
                    DataType::Boolean
                }
            }
        }
    }

    /// Positions of the combined input row this expression reads.
    pub fn referenced_inputs(&self) -> BTreeSet<usize> {
        let mut refs = BTreeSet::new();
        self.collect_inputs(&mut refs);
        refs
    }

    fn collect_inputs(&self, refs: &mut BTreeSet<usize>) {
        match self {
            Expr::InputRef { index, .. } => {
                refs.insert(*index);
            }
            Expr::Literal { .. } => {}
            Expr::BinaryOp { left, right, .. } => {
                left.collect_inputs(refs);
                right.collect_inputs(refs);
            }
            Expr::UnaryOp { expr, .. } | Expr::Cast { expr, .. } => expr.collect_inputs(refs),
            Expr::Call { args, .. } => {
                for arg in args {
                    arg.collect_inputs(refs);
                }
            }
        }
    }

    pub fn conjuncts(&self) -> Vec<&Expr> {
        match self {
            Expr::BinaryOp {
                left,
                op: BinaryOp::And,
                right,
            } => {
                let mut out = left.conjuncts();
                out.extend(right.conjuncts());
                out
            }
            other => vec![other],
        }
    }
}

fn arithmetic_result_type(left: &DataType, right: &DataType) -> DataType {
    match (left, right) {
        (l, r) if l == r => l.clone(),
        (l, r) if l.is_integer() && r.is_integer() => DataType::BigInt,
        (DataType::Decimal { .. }, r) if r.is_integer() => left.clone(),
        (l, DataType::Decimal { .. }) if l.is_integer() => right.clone(),
        _ => DataType::Double,
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::InputRef { index, .. } => write!(f, "${}", index),
            Expr::Literal { value, .. } => match value {
                Value::String(s) => write!(f, "'{}'", s),
                other => write!(f, "{}", other),
            },
            Expr::BinaryOp { left, op, right } => write!(f, "({} {} {})", left, op.symbol(), right),
            Expr::UnaryOp { op, expr } => match op {
                UnaryOp::Not => write!(f, "NOT {}", expr),
                UnaryOp::IsNull => write!(f, "{} IS NULL", expr),
                UnaryOp::IsNotNull => write!(f, "{} IS NOT NULL", expr),
                UnaryOp::Negate => write!(f, "-{}", expr),
            },
            Expr::Cast { expr, data_type } => write!(f, "CAST({} AS {})", expr, data_type),
            Expr::Call { name, args, .. } => {
                write!(f, "{}(", name)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
        }
    }
}
