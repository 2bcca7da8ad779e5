use skiff::{
    DataType, Error, Field, JoinKind, JoinRequest, JoinSpec, PlanNodeIdGenerator, Schema,
    StreamJoinTranslator, Value,
};
use skiff_test_utils::{insert, render, row};

use crate::common::{batching, native, open, orders, translate, users};

fn layout(fields: Vec<Field>) -> Schema {
    Schema::from_fields(fields)
}

fn users_orders_with(kind: JoinKind, output: Schema) -> JoinRequest {
    let spec = JoinSpec::new(kind, vec![0], vec![0]).with_output_schema(output);
    JoinRequest::new(spec, users(), orders())
}

/// Same width as the inputs but `user_id` declared as a string.
fn mistyped_layout() -> Schema {
    layout(vec![
        Field::nullable("id", DataType::Integer),
        Field::nullable("name", DataType::String),
        Field::nullable("user_id", DataType::String),
        Field::nullable("item", DataType::String),
    ])
}

#[test]
fn test_short_layout_rejected_for_mini_batch() {
    let request = users_orders_with(
        JoinKind::Inner,
        layout(vec![Field::nullable("id", DataType::Integer)]),
    );
    let result = translate(&request, batching(10));
    assert!(matches!(result, Err(Error::PlanAssembly(_))));
}

#[test]
fn test_short_layout_rejected_for_native_bridge() {
    let request = users_orders_with(
        JoinKind::Left,
        layout(vec![Field::nullable("id", DataType::Integer)]),
    );
    let mut ids = PlanNodeIdGenerator::new(3);
    let result = StreamJoinTranslator::new(native()).translate(&request, &mut ids);
    assert!(matches!(result, Err(Error::PlanAssembly(_))));
    assert_eq!(ids.allocated(), 0);
}

#[test]
fn test_mistyped_layout_rejected_before_any_input() {
    for config in [native(), batching(10)] {
        let request = users_orders_with(JoinKind::Inner, mistyped_layout());
        let mut ids = PlanNodeIdGenerator::new(3);
        let err = StreamJoinTranslator::new(config)
            .translate(&request, &mut ids)
            .unwrap_err();
        assert!(matches!(err, Error::PlanAssembly(_)));
        assert!(err.to_string().contains("'user_id' at position 2"));
        assert_eq!(ids.allocated(), 0);
    }
}

#[test]
fn test_semi_layout_type_checked_against_left() {
    let spec = JoinSpec::new(JoinKind::Semi, vec![0], vec![0]).with_output_schema(layout(vec![
        Field::nullable("id", DataType::BigInt),
        Field::nullable("name", DataType::String),
    ]));
    let result = translate(&JoinRequest::new(spec, users(), orders()), batching(10));
    assert!(matches!(result, Err(Error::PlanAssembly(_))));
}

#[test]
fn test_native_output_schema_matches_emitted_rows() {
    let explicit = layout(vec![
        Field::required("id", DataType::Integer),
        Field::required("name", DataType::String),
        Field::required("id", DataType::Integer),
        Field::required("name", DataType::String),
    ]);
    let spec = JoinSpec::new(JoinKind::Left, vec![0], vec![0]).with_output_schema(explicit);
    let request = JoinRequest::new(spec, users(), users());

    let join = translate(&request, native()).unwrap();
    assert_eq!(join.output_schema.names(), vec!["id", "name", "id0", "name0"]);
    assert_eq!(join.operator.output_schema(), &join.output_schema);
    assert!(join.output_schema.fields().iter().all(Field::is_nullable));

    let mut op = open(&request, native());
    let out = op.process_left(insert(row![None::<i32>, "ann"])).unwrap();
    assert_eq!(render(&out), vec!["+I(NULL, ann, NULL, NULL)"]);
    assert_eq!(out[0].row.get(0), Some(&Value::Null));
}

#[test]
fn test_required_layout_widens_for_keyed_strategies() {
    let explicit = layout(vec![
        Field::required("uid", DataType::Integer),
        Field::required("uname", DataType::String),
        Field::required("oid", DataType::Integer),
        Field::required("oitem", DataType::String),
    ]);
    let join = translate(&users_orders_with(JoinKind::Inner, explicit), batching(1)).unwrap();
    assert_eq!(join.output_schema.names(), vec!["uid", "uname", "oid", "oitem"]);
    assert!(join.output_schema.fields().iter().all(Field::is_nullable));
}
