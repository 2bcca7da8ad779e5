//! Streaming join operators for skiff: keyed incremental joins, mini-batch
//! joins, semi/anti joins and the bridge to a native columnar engine.

#![warn(rustdoc::missing_crate_level_docs)]
#![warn(rustdoc::broken_intra_doc_links)]

pub mod bridge;
pub mod join;
pub mod metrics;
pub mod native;
pub mod operator;
pub mod translator;

pub use bridge::NativeBridgeOperator;
pub use join::{
    JoinCondition, JoinRecordStateView, MiniBatchBuffer, MiniBatchJoinOperator, RowEvaluator,
    SemiAntiJoinOperator, StreamingJoin,
};
pub use metrics::JoinMetrics;
pub use native::{
    ArrowJoinTask, ArrowNativeEngine, ChangeBatch, NativeEngine, NativeTask, NativeTaskOptions,
};
pub use operator::TwoInputOperator;
pub use translator::{StreamJoinTranslator, TranslatedJoin};
