// crates/flowschema/tests/properties.rs

use flowschema::{
    is_valid_key, sanitize, Edge, FlowGraph, FlowNode, NodeConfig, VariableSchema, VariableType,
    INPUT_NODE_TYPE,
};
use proptest::prelude::*;
use std::collections::HashSet;

#[derive(Debug, Clone)]
enum Op {
    Add(String),
    Delete(usize),
    Rename(usize, String),
    Connect(usize),
}

fn raw_name() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-c]{1,2}",
        "[a-c ]{1,4}",
        "[0-9a-z _!-]{0,6}",
        Just("!!".to_string()),
    ]
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        raw_name().prop_map(Op::Add),
        (0usize..8).prop_map(Op::Delete),
        ((0usize..8), raw_name()).prop_map(|(i, n)| Op::Rename(i, n)),
        (0usize..8).prop_map(Op::Connect),
    ]
}

fn pick(graph: &FlowGraph, index: usize) -> Option<String> {
    let keys = graph.schema("in")?.keys();
    if keys.is_empty() {
        None
    } else {
        Some(keys[index % keys.len()].clone())
    }
}

fn apply(graph: &mut FlowGraph, op: &Op) {
    match op {
        Op::Add(raw) => {
            let _ = graph.add_variable("in", raw, VariableType::String);
        }
        Op::Delete(i) => {
            if let Some(key) = pick(graph, *i) {
                let _ = graph.delete_variable("in", &key);
            }
        }
        Op::Rename(i, raw) => {
            if let Some(key) = pick(graph, *i) {
                let _ = graph.rename_variable("in", &key, raw);
            }
        }
        Op::Connect(i) => {
            if let Some(key) = pick(graph, *i) {
                let _ = graph.connect(Edge::new("in", Some(key), "out", format!("h{}", i)));
            }
        }
    }
}

fn fresh_graph(schema: VariableSchema) -> FlowGraph {
    let mut graph = FlowGraph::new();
    graph
        .add_node(
            FlowNode::new(INPUT_NODE_TYPE).with_id("in"),
            NodeConfig::new("Inputs").with_schema(schema),
        )
        .unwrap();
    graph
        .add_node(FlowNode::new("Passthrough").with_id("out"), NodeConfig::new("Out"))
        .unwrap();
    graph
}

proptest! {
    #[test]
    fn sanitize_is_idempotent(raw in ".*") {
        let once = sanitize(&raw);
        let twice = sanitize(&once.key);
        prop_assert_eq!(&twice.key, &once.key);
        prop_assert!(!twice.changed);
        prop_assert_eq!(once.changed, once.key != raw);
    }

    #[test]
    fn sanitize_output_matches_grammar(raw in ".+") {
        let out = sanitize(&raw);
        prop_assert!(is_valid_key(&out.key), "{:?} -> {:?}", raw, out.key);
    }

    #[test]
    fn random_edits_keep_invariants(ops in prop::collection::vec(op(), 0..40)) {
        let mut graph = fresh_graph(VariableSchema::new());
        for op in &ops {
            apply(&mut graph, op);

            let violations = graph.check_invariants();
            prop_assert!(violations.is_empty(), "{:?} after {:?}", violations, op);

            let keys = graph.schema("in").unwrap().keys();
            let unique: HashSet<_> = keys.iter().collect();
            prop_assert_eq!(unique.len(), keys.len());
        }
    }

    #[test]
    fn fixed_schema_never_changes(ops in prop::collection::vec(op(), 0..30)) {
        let schema = VariableSchema::fixed(vec![
            ("alpha", VariableType::String),
            ("beta", VariableType::Integer),
        ]);
        let mut graph = fresh_graph(schema.clone());
        for op in &ops {
            apply(&mut graph, op);
            prop_assert_eq!(graph.schema("in").unwrap(), &schema);
        }
    }
}
