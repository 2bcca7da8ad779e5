//! Keyed join operators working on relational rows.

pub mod buffer;
pub mod condition;
pub mod evaluator;
pub mod minibatch;
pub mod semi_anti;
pub mod state;
pub mod streaming;

pub use buffer::MiniBatchBuffer;
pub use condition::JoinCondition;
pub use evaluator::RowEvaluator;
pub use minibatch::MiniBatchJoinOperator;
pub use semi_anti::SemiAntiJoinOperator;
pub use state::{JoinRecordStateView, StateEntry};
pub use streaming::StreamingJoin;
