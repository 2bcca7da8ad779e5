use std::sync::Arc;

use datafusion::arrow::datatypes::{
    DataType as ArrowDataType, Field as ArrowField, Schema as ArrowSchema, SchemaRef, TimeUnit,
};
use skiff_common::error::{Error, Result};
use skiff_common::types::{DataType, Field, Schema};

pub const MAX_DECIMAL_PRECISION: u8 = 38;

pub fn to_arrow_type(dt: &DataType) -> Result<ArrowDataType> {
    let arrow = match dt {
        DataType::Boolean => ArrowDataType::Boolean,
        DataType::TinyInt => ArrowDataType::Int8,
        DataType::SmallInt => ArrowDataType::Int16,
        DataType::Integer => ArrowDataType::Int32,
        DataType::BigInt => ArrowDataType::Int64,
        DataType::Float => ArrowDataType::Float32,
        DataType::Double => ArrowDataType::Float64,
        DataType::Decimal { precision, scale } => {
            if *precision == 0 || *precision > MAX_DECIMAL_PRECISION {
                return Err(Error::schema_translation(format!(
                    "{} has no native representation: precision must be in 1..={}",
                    dt, MAX_DECIMAL_PRECISION
                )));
            }
            if scale > precision {
                return Err(Error::schema_translation(format!(
                    "{} has no native representation: scale exceeds precision",
                    dt
                )));
            }
            ArrowDataType::Decimal128(*precision, *scale as i8)
        }
        DataType::Char(_) | DataType::String => ArrowDataType::Utf8,
        DataType::Binary => ArrowDataType::Binary,
        DataType::Date => ArrowDataType::Date32,
        DataType::Time => ArrowDataType::Time64(TimeUnit::Microsecond),
        DataType::Timestamp => ArrowDataType::Timestamp(TimeUnit::Microsecond, None),
        DataType::TimestampLtz => {
            ArrowDataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into()))
        }
        DataType::Array(inner) => {
            ArrowDataType::List(Arc::new(ArrowField::new("item", to_arrow_type(inner)?, true)))
        }
        DataType::Row(fields) => {
            let arrow_fields = fields
                .iter()
                .map(|sf| Ok(ArrowField::new(&sf.name, to_arrow_type(&sf.data_type)?, true)))
                .collect::<Result<Vec<_>>>()?;
            ArrowDataType::Struct(arrow_fields.into())
        }
        DataType::Multiset(_) | DataType::Raw(_) => {
            return Err(Error::schema_translation(format!(
                "{} has no native representation",
                dt
            )));
        }
    };
    Ok(arrow)
}

pub fn to_arrow_field(field: &Field) -> Result<ArrowField> {
    let data_type = to_arrow_type(&field.data_type).map_err(|e| match e {
        Error::SchemaTranslation(msg) => {
            Error::schema_translation(format!("field '{}': {}", field.name, msg))
        }
        other => other,
    })?;
    Ok(ArrowField::new(&field.name, data_type, field.is_nullable()))
}

pub fn to_arrow_schema(schema: &Schema) -> Result<SchemaRef> {
    let fields = schema
        .fields()
        .iter()
        .map(to_arrow_field)
        .collect::<Result<Vec<_>>>()?;
    Ok(Arc::new(ArrowSchema::new(fields)))
}
