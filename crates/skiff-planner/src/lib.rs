//! Translation of a relational join specification into an execution strategy,
//! a compiled native join condition and a native join plan.

#![warn(rustdoc::missing_crate_level_docs)]
#![warn(rustdoc::broken_intra_doc_links)]

pub mod analyzer;
pub mod assembler;
pub mod condition;
pub mod key_selector;
pub mod plan;
pub mod request;
pub mod strategy;
pub mod typed_expr;

pub use analyzer::{InputSideSpec, KeyClass, analyze_input_side};
pub use assembler::{NativePlanParts, assemble_native_plan, plan_native_join};
pub use condition::{compile_join_condition, compile_predicate, validate_keys};
pub use key_selector::{KeySelector, StateKeyWiring, derive_key_wiring};
pub use plan::{
    InputNode, NativeJoinKind, NativeJoinPlan, NestedLoopJoinNode, OperatorWiring, PlanNodeId,
    PlanNodeIdGenerator, StreamJoinNode,
};
pub use request::{JoinRequest, PreparedJoin, prepare_join};
pub use strategy::{
    JoinStrategy, MiniBatchStrategy, NativeBridgeStrategy, SemiAntiStrategy, select_strategy,
};
pub use typed_expr::{NativeFunction, TypedExpr};

#[cfg(test)]
mod tests;
