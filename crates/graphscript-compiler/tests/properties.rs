//! Property tests for the graph passes.
//!
//! Random acyclic graphs are built from an entry, impure calls joined by
//! control edges, and pure calls feeding them through data edges. The
//! results of pruning and scheduling are checked against reachability
//! computed directly from the generated edge lists.

use std::collections::{HashMap, HashSet};
use std::iter;

use proptest::prelude::*;
use proptest::sample::Index;

use graphscript_compiler::assemble::resolve_signature;
use graphscript_compiler::prune::{compute_live_set, prune, RegistryPolicy};
use graphscript_compiler::provenance::Provenance;
use graphscript_compiler::schedule::schedule;
use graphscript_compiler::schema::ClassSchema;
use graphscript_compiler::{CompileOptions, FunctionContext, FunctionRole, HandlerRegistry};
use graphscript_core::{
    FunctionSignature, Graph, Node, NodeId, ParamSig, PinType, Port, PortRef, TypeDesc,
};

// ---------------------------------------------------------------------------
// Generators
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct Shape {
    impure: usize,
    pure: usize,
    control: Vec<(Index, Index)>,
    data: Vec<(Index, Index)>,
}

fn arb_shape() -> impl Strategy<Value = Shape> {
    (
        1usize..8,
        1usize..6,
        prop::collection::vec((any::<Index>(), any::<Index>()), 0..16),
        prop::collection::vec((any::<Index>(), any::<Index>()), 0..12),
    )
        .prop_map(|(impure, pure, control, data)| Shape {
            impure,
            pure,
            control,
            data,
        })
}

struct Built {
    graph: Graph,
    entry: NodeId,
    impure: Vec<NodeId>,
    pure: Vec<NodeId>,
    control: Vec<(NodeId, NodeId)>,
    data: Vec<(NodeId, NodeId)>,
}

fn int() -> PinType {
    PinType::of(TypeDesc::Int)
}

/// Edges only run from lower to higher index, so the result is acyclic.
fn build(shape: &Shape) -> Built {
    let mut graph = Graph::new("Prop");
    let entry = graph.add_node(Node::entry("Prop"));
    let impure: Vec<NodeId> = (0..shape.impure)
        .map(|i| graph.add_node(Node::call(format!("N{i}")).with_port(Port::data_in("x", int()))))
        .collect();
    let pure: Vec<NodeId> = (0..shape.pure)
        .map(|i| {
            graph.add_node(
                Node::pure_call(format!("P{i}"))
                    .with_port(Port::data_in("x", int()))
                    .with_port(Port::data_out("v", int())),
            )
        })
        .collect();

    let exec: Vec<NodeId> = iter::once(entry).chain(impure.iter().copied()).collect();
    let mut control = Vec::new();
    for (a, b) in &shape.control {
        let (a, b) = (a.index(exec.len()), b.index(exec.len()));
        if a >= b {
            continue;
        }
        let then = if a == 0 { 0 } else { 1 };
        graph
            .connect(PortRef::new(exec[a], then), PortRef::new(exec[b], 0))
            .unwrap();
        control.push((exec[a], exec[b]));
    }

    let mut data = Vec::new();
    for (s, t) in &shape.data {
        let source = s.index(pure.len());
        let target = t.index(pure.len() + impure.len());
        let (to, port) = if target < pure.len() {
            if target <= source {
                continue;
            }
            (pure[target], 0)
        } else {
            (impure[target - pure.len()], 2)
        };
        graph
            .connect(PortRef::new(pure[source], 1), PortRef::new(to, port))
            .unwrap();
        data.push((pure[source], to));
    }

    Built {
        graph,
        entry,
        impure,
        pure,
        control,
        data,
    }
}

// ---------------------------------------------------------------------------
// Reference computations
// ---------------------------------------------------------------------------

fn control_reachable(built: &Built) -> HashSet<NodeId> {
    let mut seen = HashSet::from([built.entry]);
    loop {
        let before = seen.len();
        for (a, b) in &built.control {
            if seen.contains(a) {
                seen.insert(*b);
            }
        }
        if seen.len() == before {
            return seen;
        }
    }
}

/// Pure nodes with a data path into any of `sinks`.
fn feeding(built: &Built, sinks: &HashSet<NodeId>) -> HashSet<NodeId> {
    let mut found = HashSet::new();
    loop {
        let before = found.len();
        for (s, t) in &built.data {
            if sinks.contains(t) || found.contains(t) {
                found.insert(*s);
            }
        }
        if found.len() == before {
            return found;
        }
    }
}

fn is_pure(node: &Node) -> bool {
    HandlerRegistry::standard().is_pure(node)
}

fn position(order: &[NodeId]) -> HashMap<NodeId, usize> {
    order.iter().enumerate().map(|(i, id)| (*id, i)).collect()
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn live_set_is_control_reach_plus_feeding_pure_nodes(shape in arb_shape()) {
        let built = build(&shape);
        let options = CompileOptions::default();
        let policy = RegistryPolicy::new(HandlerRegistry::standard(), &options);
        let live = compute_live_set(&built.graph, &[built.entry], &policy);

        let control = control_reachable(&built);
        let data = feeding(&built, &control);
        prop_assert_eq!(&live.control, &control);
        prop_assert_eq!(&live.data, &data);
        prop_assert!(live.forced.is_empty());
    }

    #[test]
    fn pruning_keeps_exactly_the_live_set(shape in arb_shape()) {
        let built = build(&shape);
        let options = CompileOptions::default();
        let schema = ClassSchema::default();
        let mut ctx = FunctionContext::new(
            "Prop",
            FunctionRole::Function,
            built.graph.clone(),
            Provenance::new(),
            HandlerRegistry::standard(),
            &options,
            &schema,
        );
        let report = prune(&mut ctx, &[built.entry]);

        let control = control_reachable(&built);
        let expected: HashSet<NodeId> = control
            .iter()
            .copied()
            .chain(feeding(&built, &control))
            .collect();
        let kept: HashSet<NodeId> = ctx.graph.node_ids().into_iter().collect();
        prop_assert_eq!(&kept, &expected);
        prop_assert_eq!(report.removed.len(), built.graph.node_count() - expected.len());
        prop_assert!(!ctx.has_errors());
    }

    #[test]
    fn schedule_respects_control_edges(shape in arb_shape()) {
        let built = build(&shape);
        let order = schedule(&built.graph, Some(built.entry), &is_pure).unwrap();

        prop_assert_eq!(order.linear.len(), built.impure.len() + 1);
        prop_assert_eq!(order.linear[0], built.entry);
        let pos = position(&order.linear);
        for (a, b) in &built.control {
            prop_assert!(pos[a] < pos[b], "{:?} scheduled after {:?}", a, b);
        }
    }

    #[test]
    fn preludes_hold_every_upstream_pure_node_in_order(shape in arb_shape()) {
        let built = build(&shape);
        let order = schedule(&built.graph, Some(built.entry), &is_pure).unwrap();

        for &id in &order.linear {
            let prelude = order.prelude(id);
            let expected = feeding(&built, &HashSet::from([id]));
            let actual: HashSet<NodeId> = prelude.iter().copied().collect();
            prop_assert_eq!(prelude.len(), actual.len(), "prelude repeats a node");
            prop_assert_eq!(&actual, &expected);

            let pos = position(prelude);
            for (s, t) in &built.data {
                if let (Some(ps), Some(pt)) = (pos.get(s), pos.get(t)) {
                    prop_assert!(ps < pt, "producer {:?} after consumer {:?}", s, t);
                }
            }
        }
    }

    #[test]
    fn pure_nodes_are_emitted_once_per_consumer(shape in arb_shape()) {
        let built = build(&shape);
        let order = schedule(&built.graph, Some(built.entry), &is_pure).unwrap();
        let emitted = order.emission_order();

        for &p in &built.pure {
            let consumers = order
                .linear
                .iter()
                .filter(|c| feeding(&built, &HashSet::from([**c])).contains(&p))
                .count();
            let copies = emitted.iter().filter(|id| **id == p).count();
            prop_assert_eq!(copies, consumers);
        }
    }

    #[test]
    fn overrides_take_the_inherited_parameter_order(
        params in prop::collection::vec(any::<bool>(), 1..6)
            .prop_map(|kinds| {
                kinds
                    .into_iter()
                    .enumerate()
                    .map(|(i, is_int)| {
                        let ty = if is_int { TypeDesc::Int } else { TypeDesc::Float };
                        ParamSig::input(format!("p{i}"), PinType::of(ty))
                    })
                    .collect::<Vec<_>>()
            })
            .prop_flat_map(|params| (Just(params.clone()), Just(params).prop_shuffle())),
    ) {
        let (inherited, shuffled) = params;
        let parent = inherited
            .iter()
            .cloned()
            .fold(FunctionSignature::new("F"), FunctionSignature::with_param);
        let declared = shuffled
            .into_iter()
            .fold(FunctionSignature::new("F"), FunctionSignature::with_param);

        let matched = resolve_signature(declared, Some(("Base", &parent)), false);
        prop_assert!(!matched.has_errors(), "{:?}", matched.issues);
        prop_assert_eq!(matched.signature.param_names(), parent.param_names());
        prop_assert_eq!(matched.override_of.as_deref(), Some("Base"));
    }
}
