//! Common types, change-log rows, configuration and error handling for skiff.

#![warn(rustdoc::missing_crate_level_docs)]
#![warn(rustdoc::broken_intra_doc_links)]

pub mod config;
pub mod error;
pub mod row;
pub mod types;

pub use config::{JoinConfig, MiniBatchConfig, NativeConfig, StateConfig};
pub use error::{Error, Result};
pub use row::{ChangeRecord, Row, RowKind};
pub use types::{DataType, Field, FieldMode, Schema, StructField, Value};
