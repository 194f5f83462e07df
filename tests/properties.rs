use component_accumulator::{
    Accumulator, ComponentSpec, ConfigError, PropertyValue, Sequence, ToolHandle, job, materialize,
};
use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet};

fn arb_value() -> impl Strategy<Value = PropertyValue> {
    prop_oneof![
        any::<bool>().prop_map(PropertyValue::Bool),
        any::<i64>().prop_map(PropertyValue::Int),
        (-1.0e6f64..1.0e6).prop_map(PropertyValue::Float),
        "[a-zA-Z0-9_]{0,8}".prop_map(PropertyValue::Str),
        prop::collection::vec(any::<i32>(), 0..4).prop_map(PropertyValue::from),
    ]
}

fn arb_finite_f64() -> impl Strategy<Value = f64> {
    any::<f64>().prop_filter("finite", |x| x.is_finite())
}

fn arb_scalar() -> impl Strategy<Value = PropertyValue> {
    prop_oneof![
        any::<bool>().prop_map(PropertyValue::Bool),
        any::<i64>().prop_map(PropertyValue::Int),
        arb_finite_f64().prop_map(PropertyValue::Float),
        any::<String>().prop_map(PropertyValue::Str),
    ]
}

/// Scalars, lists and private tools nested a few levels deep. Every private
/// tool is a fresh object, so ownership always holds.
fn arb_nested_value() -> impl Strategy<Value = PropertyValue> {
    arb_scalar().prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(PropertyValue::List),
            (
                "[A-Z][a-zA-Z]{0,6}Tool",
                "[a-z]{1,6}",
                prop::collection::btree_map("[A-Z][a-zA-Z]{0,6}", inner, 0..3),
            )
                .prop_map(|(ty, name, props)| {
                    let tool = props.into_iter().fold(
                        ComponentSpec::private_tool(ty).named(name),
                        |spec, (k, v)| spec.with_property(k, v),
                    );
                    PropertyValue::Tool(ToolHandle::private(tool))
                }),
        ]
    })
}

fn arb_properties() -> impl Strategy<Value = BTreeMap<String, PropertyValue>> {
    prop::collection::btree_map("[A-Z][a-zA-Z]{0,6}", arb_nested_value(), 0..4)
}

fn arb_spec() -> impl Strategy<Value = ComponentSpec> {
    (
        "[A-Z][a-zA-Z]{0,6}Svc",
        "[a-z]{1,6}",
        prop::collection::btree_map("[A-Z][a-zA-Z]{0,6}", arb_value(), 0..4),
    )
        .prop_map(|(ty, name, props)| {
            props
                .into_iter()
                .fold(ComponentSpec::service(ty).named(name), |spec, (k, v)| {
                    spec.with_property(k, v)
                })
        })
}

fn with_properties(spec: ComponentSpec, props: BTreeMap<String, PropertyValue>) -> ComponentSpec {
    props
        .into_iter()
        .fold(spec, |spec, (k, v)| spec.with_property(k, v))
}

proptest! {
    #[test]
    fn materialized_jobs_survive_the_json_round_trip(
        services in prop::collection::btree_map("[a-z]{1,6}", arb_properties(), 0..4),
        algorithms in prop::collection::btree_map("[a-z]{1,6}", arb_properties(), 0..4),
        public in prop::collection::btree_map("[a-z]{1,6}", arb_properties(), 0..3),
        app in prop::collection::btree_map("[A-Z][a-zA-Z]{0,8}", arb_scalar(), 0..3),
    ) {
        let mut acc = Accumulator::new();
        for (name, props) in services {
            acc.add_service(with_properties(ComponentSpec::service("DummySvc").named(name), props)).unwrap();
        }
        let mut handles = Vec::new();
        for (name, props) in public {
            let spec = with_properties(ComponentSpec::public_tool("HelloTool").named(name), props);
            handles.push(acc.add_public_tool(spec).unwrap());
        }
        acc.add_sequence(Sequence::seq_or("filters")).unwrap();
        for (i, (name, props)) in algorithms.into_iter().enumerate() {
            let spec = with_properties(ComponentSpec::event_algorithm("HelloAlg").named(name), props)
                .with_property("PublicTools", handles.clone());
            let sequence = if i % 2 == 0 { "filters" } else { "AthAlgSeq" };
            acc.add_event_algo_to(spec, sequence).unwrap();
        }
        for (name, value) in app {
            acc.set_app_property(name, value).unwrap();
        }

        let original = materialize(&mut acc).unwrap();
        let text = job::to_json(&original).unwrap();
        let decoded = job::from_json(&text).unwrap();
        prop_assert_eq!(decoded, original);
    }

    #[test]
    fn identical_declarations_collapse(spec in arb_spec()) {
        let mut a = Accumulator::new();
        a.add_service(spec.clone()).unwrap();
        let mut b = Accumulator::new();
        b.add_service(spec.clone()).unwrap();

        a.merge(&mut b).unwrap();
        prop_assert_eq!(a.services(), &[spec][..]);
        a.discard();
    }

    #[test]
    fn differing_declarations_conflict_without_side_effects(
        spec in arb_spec(),
        value in arb_value(),
    ) {
        let changed = spec.clone().with_property("ExtraKnob", value);
        prop_assume!(changed != spec);

        let mut a = Accumulator::new();
        a.add_service(spec.clone()).unwrap();
        let mut b = Accumulator::new();
        b.add_service(changed).unwrap();

        let conflict = matches!(a.merge(&mut b), Err(ConfigError::Conflict { .. }));
        prop_assert!(conflict);
        prop_assert_eq!(a.services(), &[spec][..]);
        prop_assert!(!b.is_merged());
        a.discard();
        b.discard();
    }

    #[test]
    fn merge_appends_in_order(
        left in prop::collection::btree_set("[a-z]{1,5}", 0..6),
        right in prop::collection::btree_set("[A-Z]{1,5}", 0..6),
    ) {
        let alg = |name: &String| ComponentSpec::event_algorithm("HelloAlg").named(name.as_str());

        let mut a = Accumulator::new();
        a.add_event_algos(left.iter().map(alg)).unwrap();
        let mut b = Accumulator::new();
        b.add_event_algos(right.iter().map(alg)).unwrap();

        a.merge(&mut b).unwrap();
        let names: Vec<String> = a
            .event_algos()
            .iter()
            .map(|s| s.instance_name().to_string())
            .collect();
        let expected: Vec<String> = left.iter().chain(right.iter()).cloned().collect();
        prop_assert_eq!(names, expected);
        a.discard();
    }

    #[test]
    fn merging_a_subset_changes_nothing(names in prop::collection::btree_set("[a-z]{1,5}", 1..6)) {
        let alg = |name: &String| ComponentSpec::event_algorithm("HelloAlg").named(name.as_str());
        let mut a = Accumulator::new();
        a.add_event_algos(names.iter().map(alg)).unwrap();

        let subset: BTreeSet<&String> = names.iter().step_by(2).collect();
        let mut b = Accumulator::new();
        b.add_event_algos(subset.into_iter().map(alg)).unwrap();

        a.merge(&mut b).unwrap();
        prop_assert_eq!(a.event_algos().len(), names.len());
        a.discard();
    }
}
