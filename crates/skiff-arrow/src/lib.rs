//! Arrow/DataFusion utilities for skiff: relational to Arrow type mapping,
//! the join type bridge and row/batch conversion.

#![warn(rustdoc::missing_crate_level_docs)]
#![warn(rustdoc::broken_intra_doc_links)]

pub mod bridge;
pub mod convert;
pub mod types;

pub use bridge::{BridgedSchemas, RightRename, TypeBridge};
pub use convert::{array_value, batch_to_rows, rows_to_batch, values_to_array};
pub use datafusion;
pub use datafusion::arrow;
pub use datafusion::arrow::array;
pub use datafusion::arrow::datatypes;
pub use datafusion::arrow::record_batch::RecordBatch;
pub use types::{to_arrow_field, to_arrow_schema, to_arrow_type};
