//! The native execution bridge: engine and task contracts, plus an in-process
//! engine built on Arrow kernels and DataFusion physical expressions.

pub mod buffer;
pub mod engine;
pub mod expr;
pub mod task;

pub use buffer::{SideBuffer, Slot};
pub use engine::{ArrowNativeEngine, ChangeBatch, NativeEngine, NativeTask, NativeTaskOptions};
pub use expr::{create_physical_expr, evaluate_predicate};
pub use task::ArrowJoinTask;

#[cfg(test)]
pub use engine::{MockNativeEngine, MockNativeTask};
