use proptest::prelude::*;
use skiff_common::config::JoinConfig;
use skiff_common::types::{DataType, Field, Schema};
use skiff_ir::{Expr, JoinKind, JoinSpec};

use crate::*;

fn join_kind() -> impl Strategy<Value = JoinKind> {
    prop_oneof![
        Just(JoinKind::Inner),
        Just(JoinKind::Left),
        Just(JoinKind::Right),
        Just(JoinKind::Full),
        Just(JoinKind::Semi),
        Just(JoinKind::Anti),
    ]
}

fn outer_kind() -> impl Strategy<Value = JoinKind> {
    prop_oneof![
        Just(JoinKind::Inner),
        Just(JoinKind::Left),
        Just(JoinKind::Right),
        Just(JoinKind::Full),
    ]
}

fn column_type() -> impl Strategy<Value = DataType> {
    prop_oneof![
        Just(DataType::Integer),
        Just(DataType::BigInt),
        Just(DataType::String),
        Just(DataType::Double),
    ]
}

/// Schemas drawn from a small name pool so that collisions are frequent.
fn schema() -> impl Strategy<Value = Schema> {
    proptest::collection::vec(
        (prop::sample::select(vec!["id", "name", "id0", "ts", "v"]), column_type()),
        1..5,
    )
    .prop_map(|cols| {
        let mut fields: Vec<Field> = Vec::new();
        for (name, dt) in cols {
            if fields.iter().all(|f| f.name != name) {
                fields.push(Field::nullable(name, dt));
            }
        }
        Schema::from_fields(fields)
    })
}

/// Two schemas sharing a prefix of key columns with identical types.
fn keyed_inputs() -> impl Strategy<Value = (Schema, Schema, usize)> {
    (schema(), schema()).prop_flat_map(|(left, right)| {
        let max = left.num_fields().min(right.num_fields());
        (Just(left), Just(right), 1..=max)
    })
    .prop_map(|(left, right, keys)| {
        let fields = right
            .fields()
            .iter()
            .enumerate()
            .map(|(i, f)| {
                if i < keys {
                    Field::nullable(f.name.clone(), left.fields()[i].data_type.clone())
                } else {
                    f.clone()
                }
            })
            .collect();
        (left, Schema::from_fields(fields), keys)
    })
}

proptest! {
    #[test]
    fn test_prop_semi_anti_strategy(enabled in any::<bool>(), anti in any::<bool>()) {
        let kind = if anti { JoinKind::Anti } else { JoinKind::Semi };
        let config = if enabled { JoinConfig::new().with_mini_batch(5, 5) } else { JoinConfig::new() };
        prop_assert_eq!(
            select_strategy(kind, &config),
            JoinStrategy::SemiAnti(SemiAntiStrategy { anti })
        );
    }

    #[test]
    fn test_prop_batching_selects_mini_batch(kind in outer_kind(), enabled in any::<bool>()) {
        let config = if enabled { JoinConfig::new().with_mini_batch(5, 5) } else { JoinConfig::new() };
        let strategy = select_strategy(kind, &config);
        prop_assert_eq!(matches!(strategy, JoinStrategy::MiniBatch(_)), enabled);
        prop_assert_eq!(matches!(strategy, JoinStrategy::NativeBridge(_)), !enabled);
    }

    #[test]
    fn test_prop_conjuncts_follow_key_pairs(
        (left, right, keys) in keyed_inputs(),
        kind in outer_kind(),
        with_predicate in any::<bool>(),
    ) {
        let positions: Vec<usize> = (0..keys).collect();
        let mut spec = JoinSpec::new(kind, positions.clone(), positions);
        if with_predicate {
            let first_right = left.num_fields();
            spec = spec.with_non_equi_condition(Expr::unary(
                skiff_ir::UnaryOp::IsNotNull,
                Expr::input_ref(first_right, right.fields()[0].data_type.clone()),
            ));
        }
        let output = spec.resolve_output_schema(&left, &right);
        let mut ids = PlanNodeIdGenerator::new(0);
        let parts = plan_native_join(&spec, &left, &right, &output, &mut ids).unwrap();
        let condition = parts.condition.unwrap();
        let conjuncts = condition.conjuncts();

        prop_assert_eq!(conjuncts.len(), keys + usize::from(with_predicate));
        for (i, conjunct) in conjuncts.iter().take(keys).enumerate() {
            let expected = format!(
                "equalto({}, {})",
                left.fields()[i].name,
                parts.schemas.right_name(i).unwrap()
            );
            prop_assert_eq!(conjunct.to_string(), expected);
        }
        if with_predicate {
            let last = conjuncts[keys].to_string();
            prop_assert!(last.starts_with("is_not_null("));
        }
    }

    #[test]
    fn test_prop_renamed_names_are_disjoint((left, right, keys) in keyed_inputs(), kind in outer_kind()) {
        let positions: Vec<usize> = (0..keys).collect();
        let spec = JoinSpec::new(kind, positions.clone(), positions);
        let output = spec.resolve_output_schema(&left, &right);
        let mut ids = PlanNodeIdGenerator::new(0);
        let parts = plan_native_join(&spec, &left, &right, &output, &mut ids).unwrap();

        let left_names = left.names();
        let mut known: Vec<String> = left_names.iter().map(|s| s.to_string()).collect();
        for field in parts.schemas.right.fields() {
            prop_assert!(!left_names.contains(&field.name().as_str()));
            known.push(field.name().clone());
        }
        for field in parts.schemas.output.fields() {
            prop_assert!(known.contains(field.name()));
        }
        for name in parts.condition.as_ref().unwrap().referenced_names() {
            prop_assert!(known.iter().any(|k| k == name));
        }
    }

    #[test]
    fn test_prop_translation_is_idempotent((left, right, keys) in keyed_inputs(), kind in outer_kind()) {
        let positions: Vec<usize> = (0..keys).collect();
        let spec = JoinSpec::new(kind, positions.clone(), positions);
        let output = spec.resolve_output_schema(&left, &right);
        let first = plan_native_join(&spec, &left, &right, &output, &mut PlanNodeIdGenerator::for_operator()).unwrap();
        let second = plan_native_join(&spec, &left, &right, &output, &mut PlanNodeIdGenerator::for_operator()).unwrap();
        prop_assert_eq!(first.plan.explain(), second.plan.explain());
        prop_assert_eq!(first.schemas, second.schemas);
        prop_assert_eq!(first.condition, second.condition);
        prop_assert_ne!(first.plan.root_id(), second.plan.root_id());
    }

    #[test]
    fn test_prop_unequal_keys_never_allocate(kind in join_kind(), extra in 1usize..3) {
        let left = Schema::from_fields(vec![
            Field::required("a", DataType::Integer),
            Field::required("b", DataType::Integer),
            Field::required("c", DataType::Integer),
        ]);
        let spec = JoinSpec::new(kind, (0..extra).collect(), vec![0, 1, 2].into_iter().take(extra + 1).collect());
        let request = JoinRequest::new(spec, left.clone(), left);
        let err = prepare_join(&request, &JoinConfig::new()).unwrap_err();
        prop_assert!(matches!(err, skiff_common::Error::ConditionCompilation(_)));
    }
}

#[test]
fn test_scenario_duplicate_names_inner_join() {
    let users = Schema::from_fields(vec![
        Field::required("id", DataType::Integer),
        Field::required("name", DataType::String),
    ]);
    let request = JoinRequest::new(
        JoinSpec::new(JoinKind::Inner, vec![0], vec![0]),
        users.clone(),
        users,
    );
    let prepared = prepare_join(&request, &JoinConfig::new()).unwrap();
    let mut ids = PlanNodeIdGenerator::new(0);
    let parts = plan_native_join(
        &prepared.spec,
        &prepared.left_type,
        &prepared.right_type,
        &prepared.output_schema,
        &mut ids,
    )
    .unwrap();

    let names: Vec<&str> = parts
        .schemas
        .output
        .fields()
        .iter()
        .map(|f| f.name().as_str())
        .filter(|n| n.starts_with("name"))
        .collect();
    assert_eq!(names, vec!["name", "name0"]);

    let left = parts.plan.probe(skiff_ir::JoinSide::Left);
    let right = parts.plan.probe(skiff_ir::JoinSide::Right);
    assert_eq!(left.condition, right.condition);
    assert_eq!(left.condition.as_ref().unwrap().to_string(), "equalto(id, id0)");
}
