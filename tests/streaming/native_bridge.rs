use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use skiff::{
    ArrowNativeEngine, BinaryOp, ChangeBatch, DataType, Error, Expr, JoinKind, JoinRequest,
    JoinSide, JoinSpec, JoinStrategy, NativeEngine, NativeJoinPlan, NativeTask, NativeTaskOptions,
    PlanNodeId, PlanNodeIdGenerator, Result, StreamJoinTranslator,
};
use skiff_test_utils::{assert_error_contains, insert, render, row, sorted};

use crate::common::{batching, native, open, orders, translate, users, users_orders};

#[test]
fn test_duplicate_names_inner_join_plan() {
    let request = JoinRequest::new(JoinSpec::new(JoinKind::Inner, vec![0], vec![0]), users(), users());
    let join = translate(&request, native()).unwrap();

    assert!(matches!(join.strategy, JoinStrategy::NativeBridge(_)));
    assert_eq!(join.output_schema.names(), vec!["id", "name", "id0", "name0"]);
    let plan = join.plan.unwrap();
    let explain = plan.explain();
    assert_eq!(explain.matches("NestedLoopJoin").count(), 2);
    assert_eq!(explain.matches("condition=equalto(id, id0)").count(), 2);
    assert_eq!(
        plan.probe(JoinSide::Left).condition,
        plan.probe(JoinSide::Right).condition
    );
}

#[test]
fn test_translation_is_idempotent_up_to_ids() {
    let request = users_orders(JoinKind::Full);
    let translator = StreamJoinTranslator::new(native());
    let first = translator.translate(&request, &mut PlanNodeIdGenerator::new(1)).unwrap();
    let second = translator.translate(&request, &mut PlanNodeIdGenerator::new(2)).unwrap();
    let (first, second) = (first.plan.unwrap(), second.plan.unwrap());
    assert_eq!(first.explain(), second.explain());
    assert_ne!(first.explain_verbose(), second.explain_verbose());
}

#[test]
fn test_unequal_keys_fail_before_assembly() {
    let spec = JoinSpec::new(JoinKind::Inner, vec![0, 1], vec![0]);
    let request = JoinRequest::new(spec, users(), orders());
    let mut ids = PlanNodeIdGenerator::new(9);
    let result = StreamJoinTranslator::new(native()).translate(&request, &mut ids);
    assert!(matches!(result, Err(Error::ConditionCompilation(_))));
    assert_eq!(ids.allocated(), 0);
}

fn less_than_predicate() -> Expr {
    Expr::binary(
        Expr::input_ref(0, DataType::Integer),
        BinaryOp::Lt,
        Expr::input_ref(2, DataType::Integer),
    )
}

#[test]
fn test_keyless_join_runs_on_native_bridge() {
    let spec = JoinSpec::new(JoinKind::Inner, vec![], vec![])
        .with_non_equi_condition(less_than_predicate());
    let request = JoinRequest::new(spec, users(), orders());
    let mut op = open(&request, native());
    op.process_batch(JoinSide::Left, vec![insert(row![1, "ann"]), insert(row![5, "eve"])])
        .unwrap();
    let out = op.process_right(insert(row![3, "pen"])).unwrap();
    assert_eq!(render(&out), vec!["+I(1, ann, 3, pen)"]);
}

#[test]
fn test_keyless_join_needs_native_bridge() {
    let spec = JoinSpec::new(JoinKind::Inner, vec![], vec![])
        .with_non_equi_condition(less_than_predicate());
    let request = JoinRequest::new(spec, users(), orders());
    assert_error_contains(translate(&request, batching(10)), &["equi-join key"]);
}

#[test]
fn test_join_without_keys_or_predicate_is_rejected() {
    let spec = JoinSpec::new(JoinKind::Inner, vec![], vec![]);
    let result = translate(&JoinRequest::new(spec, users(), orders()), native());
    assert!(matches!(result, Err(Error::ConditionCompilation(_))));
}

#[test]
fn test_batched_input_is_one_native_call() {
    let mut op = open(&users_orders(JoinKind::Inner), native());
    op.process_batch(
        JoinSide::Right,
        vec![insert(row![1, "pen"]), insert(row![2, "cup"]), insert(row![1, "ink"])],
    )
    .unwrap();
    let out = op.process_left(insert(row![1, "ann"])).unwrap();
    assert_eq!(sorted(&out), vec!["+I(1, ann, 1, ink)", "+I(1, ann, 1, pen)"]);
    assert_eq!(op.metrics().get_native_invocations(), 2);
    assert_eq!(op.metrics().get_records_in(JoinSide::Right), 3);
}

/// Delegates to the in-process engine and fails every input after the first
/// `healthy_inputs` ones.
struct FlakyEngine {
    healthy_inputs: usize,
    released: Arc<AtomicUsize>,
}

struct FlakyTask {
    inner: Box<dyn NativeTask>,
    remaining: usize,
    released: Arc<AtomicUsize>,
}

impl NativeEngine for FlakyEngine {
    fn create_task(
        &self,
        plan: &NativeJoinPlan,
        options: &NativeTaskOptions,
    ) -> Result<Box<dyn NativeTask>> {
        Ok(Box::new(FlakyTask {
            inner: ArrowNativeEngine.create_task(plan, options)?,
            remaining: self.healthy_inputs,
            released: Arc::clone(&self.released),
        }))
    }
}

impl NativeTask for FlakyTask {
    fn add_input(&mut self, node: PlanNodeId, input: ChangeBatch) -> Result<()> {
        if self.remaining == 0 {
            return Err(Error::native_invocation("worker lost"));
        }
        self.remaining -= 1;
        self.inner.add_input(node, input)
    }

    fn drain_output(&mut self) -> Result<Vec<ChangeBatch>> {
        self.inner.drain_output()
    }

    fn advance_time(&mut self, now: i64) -> Result<usize> {
        self.inner.advance_time(now)
    }

    fn release(&mut self) -> Result<()> {
        self.released.fetch_add(1, Ordering::SeqCst);
        self.inner.release()
    }
}

#[test]
fn test_native_failure_is_fatal() {
    let released = Arc::new(AtomicUsize::new(0));
    let engine = FlakyEngine {
        healthy_inputs: 1,
        released: Arc::clone(&released),
    };
    let translator = StreamJoinTranslator::new(native()).with_engine(Arc::new(engine));
    let mut join = translator
        .translate(&users_orders(JoinKind::Inner), &mut PlanNodeIdGenerator::new(4))
        .unwrap();
    let op = join.operator.as_mut();
    op.open().unwrap();

    assert!(op.process_left(insert(row![1, "ann"])).unwrap().is_empty());
    assert_error_contains(op.process_right(insert(row![1, "pen"])), &["worker lost"]);
    assert_error_contains(op.process_left(insert(row![2, "bob"])), &["earlier call"]);
    assert_error_contains(op.on_watermark(10), &["earlier call"]);
    assert!(op.close().is_err());
    assert_eq!(released.load(Ordering::SeqCst), 1);

    drop(join);
    assert_eq!(released.load(Ordering::SeqCst), 1);
}

#[test]
fn test_dropping_operator_releases_task() {
    let released = Arc::new(AtomicUsize::new(0));
    let engine = FlakyEngine {
        healthy_inputs: usize::MAX,
        released: Arc::clone(&released),
    };
    let translator = StreamJoinTranslator::new(native()).with_engine(Arc::new(engine));
    let join = translator
        .translate(&users_orders(JoinKind::Left), &mut PlanNodeIdGenerator::new(4))
        .unwrap();
    drop(join);
    assert_eq!(released.load(Ordering::SeqCst), 1);
}
