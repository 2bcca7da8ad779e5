//! Conversion between change-log rows and Arrow record batches.

use std::sync::Arc;

use datafusion::arrow::array::{
    Array, ArrayRef, AsArray, BinaryArray, BooleanArray, Date32Array, Decimal128Array,
    Float32Array, Float64Array, Int8Array, Int16Array, Int32Array, Int64Array, ListArray,
    StringArray, StructArray, Time64MicrosecondArray, TimestampMicrosecondArray,
};
use datafusion::arrow::buffer::{NullBuffer, OffsetBuffer};
use datafusion::arrow::datatypes::{
    DataType as ArrowDataType, Date32Type, Decimal128Type, Float32Type, Float64Type, Int8Type,
    Int16Type, Int32Type, Int64Type, SchemaRef, Time64MicrosecondType, TimeUnit,
    TimestampMicrosecondType,
};
use datafusion::arrow::record_batch::{RecordBatch, RecordBatchOptions};
use ordered_float::OrderedFloat;
use rust_decimal::Decimal;
use skiff_common::error::{Error, Result};
use skiff_common::row::Row;
use skiff_common::types::Value;

static NULL: Value = Value::Null;

pub fn rows_to_batch(rows: &[Row], schema: &SchemaRef) -> Result<RecordBatch> {
    let width = schema.fields().len();
    if let Some(bad) = rows.iter().find(|r| r.len() != width) {
        return Err(Error::internal(format!(
            "row {} has {} values, schema expects {}",
            bad,
            bad.len(),
            width
        )));
    }
    let columns = schema
        .fields()
        .iter()
        .enumerate()
        .map(|(i, field)| {
            let column: Vec<&Value> = rows.iter().map(|r| r.get(i).unwrap_or(&NULL)).collect();
            values_to_array(&column, field.data_type())
        })
        .collect::<Result<Vec<_>>>()?;
    let options = RecordBatchOptions::new().with_row_count(Some(rows.len()));
    RecordBatch::try_new_with_options(schema.clone(), columns, &options)
        .map_err(|e| Error::internal(e.to_string()))
}

pub fn batch_to_rows(batch: &RecordBatch) -> Result<Vec<Row>> {
    (0..batch.num_rows())
        .map(|row| {
            batch
                .columns()
                .iter()
                .map(|col| array_value(col.as_ref(), row))
                .collect::<Result<Vec<_>>>()
                .map(Row::new)
        })
        .collect()
}

fn collect<'a, T>(
    values: &[&'a Value],
    expected: &ArrowDataType,
    f: impl Fn(&'a Value) -> Option<T>,
) -> Result<Vec<Option<T>>> {
    values
        .iter()
        .map(|&v| {
            if v.is_null() {
                Ok(None)
            } else {
                f(v).map(Some)
                    .ok_or_else(|| Error::type_mismatch(expected.to_string(), v.type_name()))
            }
        })
        .collect()
}

fn int<T: TryFrom<i64>>(v: &Value) -> Option<T> {
    v.as_i64().and_then(|i| T::try_from(i).ok())
}

pub fn values_to_array(values: &[&Value], data_type: &ArrowDataType) -> Result<ArrayRef> {
    let array: ArrayRef = match data_type {
        ArrowDataType::Boolean => Arc::new(BooleanArray::from(collect(
            values,
            data_type,
            Value::as_bool,
        )?)),
        ArrowDataType::Int8 => Arc::new(Int8Array::from(collect(values, data_type, int::<i8>)?)),
        ArrowDataType::Int16 => {
            Arc::new(Int16Array::from(collect(values, data_type, int::<i16>)?))
        }
        ArrowDataType::Int32 => {
            Arc::new(Int32Array::from(collect(values, data_type, int::<i32>)?))
        }
        ArrowDataType::Int64 => {
            Arc::new(Int64Array::from(collect(values, data_type, int::<i64>)?))
        }
        ArrowDataType::Float32 => Arc::new(Float32Array::from(collect(values, data_type, |v| {
            v.as_f64().map(|f| f as f32)
        })?)),
        ArrowDataType::Float64 => {
            Arc::new(Float64Array::from(collect(values, data_type, Value::as_f64)?))
        }
        ArrowDataType::Decimal128(precision, scale) => {
            let target = (*scale).max(0) as u32;
            let mantissas = collect(values, data_type, |v| {
                v.as_decimal().map(|mut d| {
                    d.rescale(target);
                    d.mantissa()
                })
            })?;
            Arc::new(
                Decimal128Array::from(mantissas)
                    .with_precision_and_scale(*precision, *scale)
                    .map_err(|e| Error::internal(e.to_string()))?,
            )
        }
        ArrowDataType::Utf8 => Arc::new(StringArray::from(collect(values, data_type, Value::as_str)?)),
        ArrowDataType::Binary => {
            let bytes = collect(values, data_type, |v| match v {
                Value::Binary(b) => Some(b.as_slice()),
                _ => None,
            })?;
            Arc::new(BinaryArray::from_opt_vec(bytes))
        }
        ArrowDataType::Date32 => Arc::new(Date32Array::from(collect(values, data_type, |v| {
            match v {
                Value::Date(d) => Some(*d),
                _ => None,
            }
        })?)),
        ArrowDataType::Time64(TimeUnit::Microsecond) => {
            Arc::new(Time64MicrosecondArray::from(collect(values, data_type, |v| {
                match v {
                    Value::Time(t) => Some(*t),
                    _ => None,
                }
            })?))
        }
        ArrowDataType::Timestamp(TimeUnit::Microsecond, tz) => {
            let micros = collect(values, data_type, |v| match v {
                Value::Timestamp(t) => Some(*t),
                _ => None,
            })?;
            Arc::new(TimestampMicrosecondArray::from(micros).with_timezone_opt(tz.clone()))
        }
        ArrowDataType::List(field) => {
            let mut lengths = Vec::with_capacity(values.len());
            let mut validity = Vec::with_capacity(values.len());
            let mut children: Vec<&Value> = Vec::new();
            for v in values {
                match v {
                    Value::Null => {
                        lengths.push(0);
                        validity.push(false);
                    }
                    Value::Array(items) => {
                        lengths.push(items.len());
                        validity.push(true);
                        children.extend(items.iter());
                    }
                    other => {
                        return Err(Error::type_mismatch(data_type.to_string(), other.type_name()));
                    }
                }
            }
            let child = values_to_array(&children, field.data_type())?;
            Arc::new(
                ListArray::try_new(
                    field.clone(),
                    OffsetBuffer::from_lengths(lengths),
                    child,
                    Some(NullBuffer::from(validity)),
                )
                .map_err(|e| Error::internal(e.to_string()))?,
            )
        }
        ArrowDataType::Struct(fields) => {
            let mut validity = Vec::with_capacity(values.len());
            for v in values {
                match v {
                    Value::Null => validity.push(false),
                    Value::Row(_) => validity.push(true),
                    other => {
                        return Err(Error::type_mismatch(data_type.to_string(), other.type_name()));
                    }
                }
            }
            let columns = fields
                .iter()
                .enumerate()
                .map(|(k, field)| {
                    let column: Vec<&Value> = values
                        .iter()
                        .map(|v| match v {
                            Value::Row(items) => items.get(k).unwrap_or(&NULL),
                            _ => &NULL,
                        })
                        .collect();
                    values_to_array(&column, field.data_type())
                })
                .collect::<Result<Vec<_>>>()?;
            Arc::new(
                StructArray::try_new(fields.clone(), columns, Some(NullBuffer::from(validity)))
                    .map_err(|e| Error::internal(e.to_string()))?,
            )
        }
        other => {
            return Err(Error::internal(format!(
                "no row conversion for native type {}",
                other
            )));
        }
    };
    Ok(array)
}

pub fn array_value(array: &dyn Array, row: usize) -> Result<Value> {
    if array.is_null(row) {
        return Ok(Value::Null);
    }
    let value = match array.data_type() {
        ArrowDataType::Boolean => Value::Boolean(array.as_boolean().value(row)),
        ArrowDataType::Int8 => Value::TinyInt(array.as_primitive::<Int8Type>().value(row)),
        ArrowDataType::Int16 => Value::SmallInt(array.as_primitive::<Int16Type>().value(row)),
        ArrowDataType::Int32 => Value::Integer(array.as_primitive::<Int32Type>().value(row)),
        ArrowDataType::Int64 => Value::BigInt(array.as_primitive::<Int64Type>().value(row)),
        ArrowDataType::Float32 => {
            Value::Float(OrderedFloat(array.as_primitive::<Float32Type>().value(row)))
        }
        ArrowDataType::Float64 => {
            Value::Double(OrderedFloat(array.as_primitive::<Float64Type>().value(row)))
        }
        ArrowDataType::Decimal128(_, scale) => {
            let mantissa = array.as_primitive::<Decimal128Type>().value(row);
            Value::Decimal(
                Decimal::try_from_i128_with_scale(mantissa, (*scale).max(0) as u32)
                    .map_err(|e| Error::internal(e.to_string()))?,
            )
        }
        ArrowDataType::Utf8 => Value::String(array.as_string::<i32>().value(row).to_string()),
        ArrowDataType::LargeUtf8 => Value::String(array.as_string::<i64>().value(row).to_string()),
        ArrowDataType::Binary => Value::Binary(array.as_binary::<i32>().value(row).to_vec()),
        ArrowDataType::Date32 => Value::Date(array.as_primitive::<Date32Type>().value(row)),
        ArrowDataType::Time64(TimeUnit::Microsecond) => {
            Value::Time(array.as_primitive::<Time64MicrosecondType>().value(row))
        }
        ArrowDataType::Timestamp(TimeUnit::Microsecond, _) => {
            Value::Timestamp(array.as_primitive::<TimestampMicrosecondType>().value(row))
        }
        ArrowDataType::List(_) => {
            let items = array.as_list::<i32>().value(row);
            Value::Array(
                (0..items.len())
                    .map(|i| array_value(items.as_ref(), i))
                    .collect::<Result<Vec<_>>>()?,
            )
        }
        ArrowDataType::Struct(_) => Value::Row(
            array
                .as_struct()
                .columns()
                .iter()
                .map(|col| array_value(col.as_ref(), row))
                .collect::<Result<Vec<_>>>()?,
        ),
        other => {
            return Err(Error::internal(format!(
                "no row conversion for native type {}",
                other
            )));
        }
    };
    Ok(value)
}
