//! Relational join specifications, predicate expressions and retention policies.

#![warn(rustdoc::missing_crate_level_docs)]
#![warn(rustdoc::broken_intra_doc_links)]

pub mod expr;
pub mod join;
pub mod retention;

pub use expr::{BinaryOp, Expr, UnaryOp};
pub use join::{JoinKind, JoinSide, JoinSpec, derive_output_schema, unique_name};
pub use retention::StateRetentionPolicy;
