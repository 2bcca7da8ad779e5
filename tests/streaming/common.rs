use std::sync::Once;

use skiff::{
    ChangeRecord, DataType, Field, JoinConfig, JoinKind, JoinRequest, JoinSpec,
    PlanNodeIdGenerator, Result, Schema, StreamJoinTranslator, TranslatedJoin, TwoInputOperator,
};

static TRACING: Once = Once::new();

pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub fn users() -> Schema {
    Schema::from_fields(vec![
        Field::nullable("id", DataType::Integer),
        Field::nullable("name", DataType::String),
    ])
}

pub fn orders() -> Schema {
    Schema::from_fields(vec![
        Field::nullable("user_id", DataType::Integer),
        Field::nullable("item", DataType::String),
    ])
}

/// `users JOIN orders ON users.id = orders.user_id`.
pub fn users_orders(kind: JoinKind) -> JoinRequest {
    JoinRequest::new(JoinSpec::new(kind, vec![0], vec![0]), users(), orders())
}

pub fn translate(request: &JoinRequest, config: JoinConfig) -> Result<TranslatedJoin> {
    init_tracing();
    let translator = StreamJoinTranslator::new(config);
    translator.translate(request, &mut PlanNodeIdGenerator::for_operator())
}

pub fn open(request: &JoinRequest, config: JoinConfig) -> Box<dyn TwoInputOperator> {
    let mut join = translate(request, config).unwrap();
    join.operator.open().unwrap();
    join.operator
}

pub fn native() -> JoinConfig {
    JoinConfig::new()
}

pub fn batching(size: usize) -> JoinConfig {
    JoinConfig::new().with_mini_batch(1_000, size)
}

/// Feeds `input` in order and collects every output, flushing on close.
pub fn run(
    op: &mut dyn TwoInputOperator,
    input: &[(skiff::JoinSide, ChangeRecord)],
) -> Vec<ChangeRecord> {
    let mut out = Vec::new();
    for (side, record) in input {
        out.extend(op.process_batch(*side, vec![record.clone()]).unwrap());
    }
    out.extend(op.close().unwrap());
    out
}
