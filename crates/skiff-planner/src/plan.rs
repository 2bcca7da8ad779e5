//! Native join plan nodes and node id allocation.

use std::fmt::{self, Write};
use std::sync::atomic::{AtomicU64, Ordering};

use skiff_arrow::datatypes::SchemaRef;
use skiff_common::error::{Error, Result};
use skiff_ir::{JoinKind, JoinSide};

use crate::typed_expr::TypedExpr;

static NEXT_NAMESPACE: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlanNodeId {
    pub namespace: u64,
    pub local: u32,
}

impl fmt::Display for PlanNodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.namespace, self.local)
    }
}

/// Hands out node ids unique within one namespace. Ids are never reused.
#[derive(Debug)]
pub struct PlanNodeIdGenerator {
    namespace: u64,
    next: u32,
}

impl PlanNodeIdGenerator {
    pub fn new(namespace: u64) -> Self {
        Self { namespace, next: 0 }
    }

    /// A generator in a fresh process-wide namespace.
    pub fn for_operator() -> Self {
        Self::new(NEXT_NAMESPACE.fetch_add(1, Ordering::Relaxed))
    }

    pub fn namespace(&self) -> u64 {
        self.namespace
    }

    pub fn allocated(&self) -> u32 {
        self.next
    }

    pub fn next_id(&mut self) -> PlanNodeId {
        let id = PlanNodeId {
            namespace: self.namespace,
            local: self.next,
        };
        self.next += 1;
        id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeJoinKind {
    Inner,
    LeftOuter,
    RightOuter,
    FullOuter,
}

impl NativeJoinKind {
    pub fn from_join_kind(kind: JoinKind) -> Result<Self> {
        match kind {
            JoinKind::Inner => Ok(NativeJoinKind::Inner),
            JoinKind::Left => Ok(NativeJoinKind::LeftOuter),
            JoinKind::Right => Ok(NativeJoinKind::RightOuter),
            JoinKind::Full => Ok(NativeJoinKind::FullOuter),
            JoinKind::Semi | JoinKind::Anti => Err(Error::plan_assembly(format!(
                "{} join has no native nested-loop equivalent",
                kind
            ))),
        }
    }

    pub fn is_outer(self, side: JoinSide) -> bool {
        match side {
            JoinSide::Left => matches!(self, NativeJoinKind::LeftOuter | NativeJoinKind::FullOuter),
            JoinSide::Right => {
                matches!(self, NativeJoinKind::RightOuter | NativeJoinKind::FullOuter)
            }
        }
    }
}

impl fmt::Display for NativeJoinKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NativeJoinKind::Inner => "INNER",
            NativeJoinKind::LeftOuter => "LEFT",
            NativeJoinKind::RightOuter => "RIGHT",
            NativeJoinKind::FullOuter => "FULL",
        };
        write!(f, "{}", s)
    }
}

/// Placeholder fed with batches from one logical input edge.
#[derive(Debug, Clone, PartialEq)]
pub struct InputNode {
    pub id: PlanNodeId,
    pub side: JoinSide,
    pub output_type: SchemaRef,
}

/// Probes rows of `probe_side` against the buffered rows of the other side.
#[derive(Debug, Clone, PartialEq)]
pub struct NestedLoopJoinNode {
    pub id: PlanNodeId,
    pub join_kind: NativeJoinKind,
    pub condition: Option<TypedExpr>,
    pub probe_side: JoinSide,
    pub probe_type: SchemaRef,
    pub build_type: SchemaRef,
    pub output_type: SchemaRef,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StreamJoinNode {
    pub id: PlanNodeId,
    pub left_input: InputNode,
    pub right_input: InputNode,
    pub left_probe: NestedLoopJoinNode,
    pub right_probe: NestedLoopJoinNode,
    pub output_type: SchemaRef,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NativeJoinPlan {
    pub root: StreamJoinNode,
}

impl NativeJoinPlan {
    pub fn root_id(&self) -> PlanNodeId {
        self.root.id
    }

    pub fn output_type(&self) -> &SchemaRef {
        &self.root.output_type
    }

    pub fn input(&self, side: JoinSide) -> &InputNode {
        match side {
            JoinSide::Left => &self.root.left_input,
            JoinSide::Right => &self.root.right_input,
        }
    }

    pub fn probe(&self, side: JoinSide) -> &NestedLoopJoinNode {
        match side {
            JoinSide::Left => &self.root.left_probe,
            JoinSide::Right => &self.root.right_probe,
        }
    }

    pub fn wiring(&self) -> OperatorWiring {
        OperatorWiring {
            left_input: self.root.left_input.id,
            right_input: self.root.right_input.id,
            root: self.root.id,
            output_type: self.root.output_type.clone(),
        }
    }

    /// Plan rendering without node ids.
    pub fn explain(&self) -> String {
        self.render(false)
    }

    pub fn explain_verbose(&self) -> String {
        self.render(true)
    }

    fn render(&self, with_ids: bool) -> String {
        let id = |id: PlanNodeId| {
            if with_ids {
                format!(" #{}", id)
            } else {
                String::new()
            }
        };
        let mut out = String::new();
        let root = &self.root;
        let _ = writeln!(
            out,
            "StreamJoin{}: output={}",
            id(root.id),
            render_type(&root.output_type)
        );
        for probe in [&root.left_probe, &root.right_probe] {
            let condition = probe
                .condition
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_else(|| "true".to_string());
            let _ = writeln!(
                out,
                "  NestedLoopJoin{}: kind={} probe={} condition={}",
                id(probe.id),
                probe.join_kind,
                probe.probe_side,
                condition
            );
        }
        for input in [&root.left_input, &root.right_input] {
            let _ = writeln!(
                out,
                "  Input{}: side={} type={}",
                id(input.id),
                input.side,
                render_type(&input.output_type)
            );
        }
        out
    }
}

fn render_type(schema: &SchemaRef) -> String {
    let fields: Vec<String> = schema
        .fields()
        .iter()
        .map(|f| {
            let null = if f.is_nullable() { "" } else { " NOT NULL" };
            format!("{}:{}{}", f.name(), f.data_type(), null)
        })
        .collect();
    format!("[{}]", fields.join(", "))
}

/// Maps logical input edges to native input node ids and the root node to
/// the operator's output type.
#[derive(Debug, Clone, PartialEq)]
pub struct OperatorWiring {
    pub left_input: PlanNodeId,
    pub right_input: PlanNodeId,
    pub root: PlanNodeId,
    pub output_type: SchemaRef,
}

impl OperatorWiring {
    pub fn input_for(&self, side: JoinSide) -> PlanNodeId {
        match side {
            JoinSide::Left => self.left_input,
            JoinSide::Right => self.right_input,
        }
    }
}
