//! Reachability analysis and dead node removal.
//!
//! Liveness is computed in two passes:
//!
//! 1. **Control**: depth-first from the root set along control edges.
//! 2. **Data**: backwards along data edges from every impure node the first
//!    pass reached, collecting the pure nodes that feed live computation.
//!
//! Everything else is removed, except nodes whose handler asks to be kept.
//! Pure nodes connected only to dead consumers are removed too.

use std::collections::HashSet;

use graphscript_core::{Graph, Node, NodeId, PortDirection, PortRef, PortRole};

use crate::context::FunctionContext;
use crate::diagnostics::Issue;
use crate::handler::HandlerRegistry;
use crate::options::CompileOptions;

/// Node classification consulted by the reachability passes.
pub trait PrunePolicy {
    fn is_pure(&self, node: &Node) -> bool;
    fn force_keep(&self, node: &Node) -> bool;
    fn is_root(&self, node: &Node) -> bool;
}

/// Classification through the registered handlers.
pub struct RegistryPolicy<'a> {
    registry: &'a HandlerRegistry,
    options: &'a CompileOptions,
}

impl<'a> RegistryPolicy<'a> {
    pub fn new(registry: &'a HandlerRegistry, options: &'a CompileOptions) -> Self {
        RegistryPolicy { registry, options }
    }
}

impl PrunePolicy for RegistryPolicy<'_> {
    fn is_pure(&self, node: &Node) -> bool {
        self.registry.is_pure(node)
    }

    fn force_keep(&self, node: &Node) -> bool {
        self.registry
            .handler_for(node)
            .map(|h| h.force_keep(node, self.options))
            .unwrap_or(false)
    }

    fn is_root(&self, node: &Node) -> bool {
        node.kind.is_entry()
            || self
                .registry
                .handler_for(node)
                .map(|h| h.is_root(node))
                .unwrap_or(false)
    }
}

/// Root set of a graph: nodes that are reachable by definition. With
/// `include_potential_roots`, impure nodes without a control input join it.
pub fn find_roots(
    graph: &Graph,
    policy: &dyn PrunePolicy,
    include_potential_roots: bool,
) -> Vec<NodeId> {
    graph.find_nodes(|n| {
        policy.is_root(n)
            || (include_potential_roots && !policy.is_pure(n) && !n.has_control_input())
    })
}

/// Nodes that survive pruning, by the pass that kept them.
#[derive(Debug, Clone, Default)]
pub struct LiveSet {
    pub control: HashSet<NodeId>,
    pub data: HashSet<NodeId>,
    pub forced: HashSet<NodeId>,
}

impl LiveSet {
    pub fn contains(&self, id: NodeId) -> bool {
        self.control.contains(&id) || self.data.contains(&id) || self.forced.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.control.len() + self.data.len() + self.forced.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub fn compute_live_set(graph: &Graph, roots: &[NodeId], policy: &dyn PrunePolicy) -> LiveSet {
    let mut live = LiveSet::default();

    let mut stack: Vec<NodeId> = roots.iter().rev().copied().collect();
    while let Some(id) = stack.pop() {
        if !graph.contains(id) || !live.control.insert(id) {
            continue;
        }
        for next in graph.successors(id, PortRole::Control).into_iter().rev() {
            if !live.control.contains(&next) {
                stack.push(next);
            }
        }
    }

    for (id, node) in graph.nodes() {
        if !live.control.contains(&id) && policy.force_keep(node) {
            live.forced.insert(id);
        }
    }

    let mut work: Vec<NodeId> = graph
        .nodes()
        .into_iter()
        .filter(|(id, node)| {
            (live.control.contains(id) || live.forced.contains(id)) && !policy.is_pure(node)
        })
        .map(|(id, _)| id)
        .collect();
    while let Some(id) = work.pop() {
        for source in graph.predecessors(id, PortRole::Data) {
            let Some(node) = graph.node(source) else {
                continue;
            };
            if policy.is_pure(node) && !live.contains(source) {
                live.data.insert(source);
                work.push(source);
            }
        }
    }

    live
}

/// What pruning did to one graph.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PruneReport {
    pub removed: Vec<NodeId>,
    /// `(removed producer, live consumer)` pairs whose value reads as default.
    pub read_as_default: Vec<(NodeId, NodeId)>,
    /// Impure nodes without control ports that nothing reached.
    pub inconsistent: Vec<NodeId>,
}

/// Removes every node of the working graph that is not live from `roots`,
/// reporting the warnings removal implies.
pub fn prune(ctx: &mut FunctionContext<'_>, roots: &[NodeId]) -> PruneReport {
    let policy = RegistryPolicy::new(ctx.registry, ctx.options);
    let live = compute_live_set(&ctx.graph, roots, &policy);
    let mut report = PruneReport::default();

    for (id, node) in ctx.graph.nodes() {
        if live.contains(id) {
            continue;
        }
        if !policy.is_pure(node) && !node.has_control_ports() {
            report.inconsistent.push(id);
        }
        report.removed.push(id);
    }

    for id in report.inconsistent.clone() {
        let title = ctx.graph.node(id).map(|n| n.title.clone()).unwrap_or_default();
        ctx.report(Issue::NonPureWithoutControl { node: title }, Some(id), None);
    }

    for &id in &report.removed {
        let Some(node) = ctx.graph.node(id) else {
            continue;
        };
        for (index, _) in node.ports_where(PortRole::Data, PortDirection::Out) {
            for consumer in ctx.graph.links(PortRef::new(id, index)) {
                if live.contains(consumer.node) {
                    report.read_as_default.push((id, consumer.node));
                }
            }
        }
    }
    for (producer, consumer) in report.read_as_default.clone() {
        let title = |n: NodeId| {
            ctx.graph
                .node(n)
                .map(|node| node.title.clone())
                .unwrap_or_default()
        };
        let issue = Issue::PrunedValueReadAsDefault {
            node: title(producer),
            consumer: title(consumer),
        };
        ctx.report(issue, Some(consumer), None);
    }

    for &id in &report.removed {
        // Ids come from the live graph; a failure means it was already gone.
        let _ = ctx.graph.remove_node(id);
        ctx.provenance.forget(id);
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::testing::context;
    use crate::schema::ClassSchema;
    use graphscript_core::{NodeKind, PinType, Port, TypeDesc};
    use indexmap::IndexMap;

    fn int() -> PinType {
        PinType::of(TypeDesc::Int)
    }

    #[test]
    fn data_pass_keeps_only_consumed_pure_nodes() {
        let mut g = Graph::new("F");
        let entry = g.add_node(Node::entry("F"));
        let print = g.add_node(Node::call("Print").with_port(Port::data_in("v", int())));
        let used = g.add_node(Node::literal(int(), "1"));
        let chain = g.add_node(
            Node::pure_call("Negate")
                .with_port(Port::data_in("x", int()))
                .with_port(Port::data_out("r", int())),
        );
        let unused = g.add_node(Node::literal(int(), "2"));
        let dead_call = g.add_node(Node::call("Dead").with_port(Port::data_in("v", int())));
        let feeds_dead = g.add_node(Node::literal(int(), "3"));
        g.connect(PortRef::new(entry, 0), PortRef::new(print, 0)).unwrap();
        g.connect(PortRef::new(used, 0), PortRef::new(chain, 0)).unwrap();
        g.connect(PortRef::new(chain, 1), PortRef::new(print, 2)).unwrap();
        g.connect(PortRef::new(feeds_dead, 0), PortRef::new(dead_call, 2)).unwrap();

        let registry = HandlerRegistry::standard();
        let options = CompileOptions::default();
        let policy = RegistryPolicy::new(registry, &options);
        let roots = find_roots(&g, &policy, false);
        assert_eq!(roots, vec![entry]);

        let live = compute_live_set(&g, &roots, &policy);
        assert!(live.control.contains(&entry) && live.control.contains(&print));
        assert!(live.data.contains(&used) && live.data.contains(&chain));
        for dead in [unused, dead_call, feeds_dead] {
            assert!(!live.contains(dead));
        }
    }

    #[test]
    fn removing_a_live_producer_warns() {
        let mut g = Graph::new("F");
        let entry = g.add_node(Node::entry("F"));
        let print = g.add_node(Node::call("Print").with_port(Port::data_in("v", int())));
        // Impure producer nothing executes.
        let roll = g.add_node(Node::call("Roll").with_port(Port::data_out("value", int())));
        g.connect(PortRef::new(entry, 0), PortRef::new(print, 0)).unwrap();
        g.connect(PortRef::new(roll, 2), PortRef::new(print, 2)).unwrap();

        let options = CompileOptions::default();
        let schema = ClassSchema::default();
        let mut ctx = context(g, &options, &schema);
        let report = prune(&mut ctx, &[entry]);
        assert_eq!(report.removed, vec![roll]);
        assert_eq!(report.read_as_default, vec![(roll, print)]);
        assert!(!ctx.graph.contains(roll));
        assert!(!ctx.graph.is_linked(PortRef::new(print, 2)));
        assert!(matches!(
            ctx.diagnostics()[0].issue,
            Issue::PrunedValueReadAsDefault { .. }
        ));
        assert!(!ctx.has_errors());
    }

    #[test]
    fn impure_node_without_control_ports() {
        let mut g = Graph::new("F");
        let entry = g.add_node(Node::entry("F"));
        let odd = g.add_node(Node::new(
            NodeKind::Custom {
                name: "Probe".into(),
                properties: IndexMap::new(),
            },
            "Probe",
        ));

        let options = CompileOptions::default();
        let schema = ClassSchema::default();
        let mut ctx = context(g.clone(), &options, &schema);
        let report = prune(&mut ctx, &[entry]);
        assert_eq!(report.inconsistent, vec![odd]);
        assert!(matches!(
            ctx.diagnostics()[0].issue,
            Issue::NonPureWithoutControl { .. }
        ));

        // As a potential root it survives.
        let registry = HandlerRegistry::standard();
        let policy = RegistryPolicy::new(registry, &options);
        let roots = find_roots(&g, &policy, true);
        assert_eq!(roots, vec![entry, odd]);
    }

    #[test]
    fn comments_are_kept_when_requested() {
        let mut g = Graph::new("F");
        let entry = g.add_node(Node::entry("F"));
        let note = g.add_node(Node::comment("explains things"));

        let keep = CompileOptions {
            save_intermediate_products: true,
            ..CompileOptions::default()
        };
        let schema = ClassSchema::default();
        let mut ctx = context(g.clone(), &keep, &schema);
        assert!(prune(&mut ctx, &[entry]).removed.is_empty());

        let options = CompileOptions::default();
        let mut ctx = context(g, &options, &schema);
        assert_eq!(prune(&mut ctx, &[entry]).removed, vec![note]);
    }
}
