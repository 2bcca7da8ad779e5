//! Skiff - streaming join translation with a native columnar execution bridge.
//!
//! A join between two change-log streams is described by a [`JoinSpec`] and
//! the row types of both inputs. Translation validates the request, picks an
//! execution strategy and builds a [`TwoInputOperator`] for it:
//! ```text
//! JoinRequest → prepare_join → JoinStrategy ─┬─ SemiAnti    → SemiAntiJoinOperator
//!                                            ├─ MiniBatch   → MiniBatchJoinOperator
//!                                            └─ NativeBridge → TypeBridge + condition
//!                                                              → NativeJoinPlan → NativeBridgeOperator
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use skiff::{
//!     ChangeRecord, DataType, Field, JoinConfig, JoinKind, JoinRequest, JoinSpec,
//!     PlanNodeIdGenerator, Row, Schema, StreamJoinTranslator, Value,
//! };
//!
//! let users = Schema::from_fields(vec![
//!     Field::required("id", DataType::Integer),
//!     Field::required("name", DataType::String),
//! ]);
//! let request = JoinRequest::new(
//!     JoinSpec::new(JoinKind::Inner, vec![0], vec![0]),
//!     users.clone(),
//!     users,
//! );
//! let translator = StreamJoinTranslator::new(JoinConfig::new());
//! let mut join = translator
//!     .translate(&request, &mut PlanNodeIdGenerator::for_operator())
//!     .unwrap();
//!
//! join.operator.open().unwrap();
//! let row = Row::new(vec![Value::Integer(1), Value::string("ann")]);
//! join.operator.process_left(ChangeRecord::insert(row.clone())).unwrap();
//! let out = join.operator.process_right(ChangeRecord::insert(row)).unwrap();
//! assert_eq!(out.len(), 1);
//! ```

#![warn(rustdoc::missing_crate_level_docs)]
#![warn(rustdoc::broken_intra_doc_links)]

pub use skiff_arrow::{BridgedSchemas, RecordBatch, TypeBridge, arrow, datafusion};
pub use skiff_common::config::{JoinConfig, MiniBatchConfig, NativeConfig, StateConfig};
pub use skiff_common::error::{Error, Result};
pub use skiff_common::row::{ChangeRecord, Row, RowKind};
pub use skiff_common::types::{DataType, Field, Schema, Value};
pub use skiff_executor::{
    ArrowNativeEngine, ChangeBatch, JoinMetrics, MiniBatchJoinOperator, NativeBridgeOperator,
    NativeEngine, NativeTask, NativeTaskOptions, SemiAntiJoinOperator, StreamJoinTranslator,
    TranslatedJoin, TwoInputOperator,
};
pub use skiff_ir::{BinaryOp, Expr, JoinKind, JoinSide, JoinSpec, StateRetentionPolicy, UnaryOp};
pub use skiff_planner::{
    JoinRequest, JoinStrategy, KeySelector, NativeFunction, NativeJoinKind, NativeJoinPlan,
    PlanNodeId, PlanNodeIdGenerator, PreparedJoin, StateKeyWiring, TypedExpr, prepare_join,
};
