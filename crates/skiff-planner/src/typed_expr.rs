use std::collections::BTreeSet;
use std::fmt;

use skiff_arrow::datatypes::DataType as ArrowDataType;
use skiff_common::types::Value;

/// Functions the native engine evaluates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeFunction {
    EqualTo,
    NotEqualTo,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    DistinctFrom,
    NotDistinctFrom,
    And,
    Or,
    Not,
    IsNull,
    IsNotNull,
    Plus,
    Minus,
    Multiply,
    Divide,
    Modulus,
    Negate,
    Like,
}

impl NativeFunction {
    pub fn name(self) -> &'static str {
        match self {
            NativeFunction::EqualTo => "equalto",
            NativeFunction::NotEqualTo => "notequalto",
            NativeFunction::LessThan => "lessthan",
            NativeFunction::LessThanOrEqual => "lessthanorequal",
            NativeFunction::GreaterThan => "greaterthan",
            NativeFunction::GreaterThanOrEqual => "greaterthanorequal",
            NativeFunction::DistinctFrom => "distinct_from",
            NativeFunction::NotDistinctFrom => "not_distinct_from",
            NativeFunction::And => "and",
            NativeFunction::Or => "or",
            NativeFunction::Not => "not",
            NativeFunction::IsNull => "is_null",
            NativeFunction::IsNotNull => "is_not_null",
            NativeFunction::Plus => "plus",
            NativeFunction::Minus => "minus",
            NativeFunction::Multiply => "multiply",
            NativeFunction::Divide => "divide",
            NativeFunction::Modulus => "mod",
            NativeFunction::Negate => "negate",
            NativeFunction::Like => "like",
        }
    }
}

impl fmt::Display for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Native expression tree. Fields are referenced by name in the row type the
/// expression is evaluated against.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypedExpr {
    Field {
        name: String,
        data_type: ArrowDataType,
    },
    Literal {
        value: Value,
        data_type: ArrowDataType,
    },
    Call {
        function: NativeFunction,
        args: Vec<TypedExpr>,
        data_type: ArrowDataType,
    },
    Cast {
        expr: Box<TypedExpr>,
        data_type: ArrowDataType,
    },
}

impl TypedExpr {
    pub fn field(name: impl Into<String>, data_type: ArrowDataType) -> Self {
        TypedExpr::Field {
            name: name.into(),
            data_type,
        }
    }

    pub fn literal(value: Value, data_type: ArrowDataType) -> Self {
        TypedExpr::Literal { value, data_type }
    }

    pub fn call(function: NativeFunction, args: Vec<TypedExpr>, data_type: ArrowDataType) -> Self {
        TypedExpr::Call {
            function,
            args,
            data_type,
        }
    }

    pub fn predicate(function: NativeFunction, args: Vec<TypedExpr>) -> Self {
        Self::call(function, args, ArrowDataType::Boolean)
    }

    pub fn cast(expr: TypedExpr, data_type: ArrowDataType) -> Self {
        if expr.data_type() == &data_type {
            return expr;
        }
        TypedExpr::Cast {
            expr: Box::new(expr),
            data_type,
        }
    }

    pub fn and(left: TypedExpr, right: TypedExpr) -> Self {
        Self::predicate(NativeFunction::And, vec![left, right])
    }

    /// Left-deep conjunction of `exprs` in order; `None` when empty.
    pub fn conjunction(exprs: impl IntoIterator<Item = TypedExpr>) -> Option<Self> {
        exprs.into_iter().reduce(TypedExpr::and)
    }

    pub fn data_type(&self) -> &ArrowDataType {
        match self {
            TypedExpr::Field { data_type, .. }
            | TypedExpr::Literal { data_type, .. }
            | TypedExpr::Call { data_type, .. }
            | TypedExpr::Cast { data_type, .. } => data_type,
        }
    }

    pub fn conjuncts(&self) -> Vec<&TypedExpr> {
        match self {
            TypedExpr::Call {
                function: NativeFunction::And,
                args,
                ..
            } => args.iter().flat_map(TypedExpr::conjuncts).collect(),
            other => vec![other],
        }
    }

    pub fn referenced_names(&self) -> BTreeSet<&str> {
        let mut names = BTreeSet::new();
        self.collect_names(&mut names);
        names
    }

    fn collect_names<'a>(&'a self, names: &mut BTreeSet<&'a str>) {
        match self {
            TypedExpr::Field { name, .. } => {
                names.insert(name.as_str());
            }
            TypedExpr::Literal { .. } => {}
            TypedExpr::Call { args, .. } => {
                for arg in args {
                    arg.collect_names(names);
                }
            }
            TypedExpr::Cast { expr, .. } => expr.collect_names(names),
        }
    }
}

impl fmt::Display for TypedExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypedExpr::Field { name, .. } => write!(f, "{}", name),
            TypedExpr::Literal { value, .. } => match value {
                Value::String(s) => write!(f, "'{}'", s),
                other => write!(f, "{}", other),
            },
            TypedExpr::Call { function, args, .. } => {
                write!(f, "{}(", function)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
            TypedExpr::Cast { expr, data_type } => write!(f, "cast({} as {})", expr, data_type),
        }
    }
}
