//! Execution order scheduling.
//!
//! Impure nodes are ordered by a topological walk of the control edges
//! (Kahn's algorithm), starting at the entry and breaking ties by authoring
//! order so the result is stable for a given graph. Pure nodes are never
//! scheduled on their own: each impure node gets a prelude holding every
//! pure node it transitively reads from, producers first. A pure node read
//! by several impure nodes appears in each of their preludes.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

use graphscript_core::{Graph, Node, NodeId, PortRole};
use indexmap::IndexMap;
use petgraph::algo::tarjan_scc;
use petgraph::graphmap::DiGraphMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    #[error("control flow cycle through nodes {nodes:?}")]
    ControlCycle { nodes: Vec<NodeId> },

    #[error("data dependency cycle through pure nodes {nodes:?}")]
    DataCycle { nodes: Vec<NodeId> },
}

impl ScheduleError {
    pub fn nodes(&self) -> &[NodeId] {
        match self {
            ScheduleError::ControlCycle { nodes } | ScheduleError::DataCycle { nodes } => nodes,
        }
    }
}

/// Linear execution list plus the pure prelude of each scheduled node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schedule {
    pub linear: Vec<NodeId>,
    pub preludes: IndexMap<NodeId, Vec<NodeId>>,
}

impl Schedule {
    pub fn prelude(&self, id: NodeId) -> &[NodeId] {
        self.preludes.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every node in the order its statements are emitted, preludes
    /// included. Pure nodes may appear more than once.
    pub fn emission_order(&self) -> Vec<NodeId> {
        let mut order = Vec::new();
        for id in &self.linear {
            order.extend_from_slice(self.prelude(*id));
            order.push(*id);
        }
        order
    }
}

/// Schedules `graph`. `entry` goes first when given.
pub fn schedule(
    graph: &Graph,
    entry: Option<NodeId>,
    is_pure: &dyn Fn(&Node) -> bool,
) -> Result<Schedule, ScheduleError> {
    let nodes = graph.nodes();
    let impure: HashSet<NodeId> = nodes
        .iter()
        .filter(|(_, n)| !is_pure(n))
        .map(|(id, _)| *id)
        .collect();
    let pure: HashSet<NodeId> = nodes
        .iter()
        .filter(|(id, _)| !impure.contains(id))
        .map(|(id, _)| *id)
        .collect();
    let order_of = |id: NodeId| graph.node(id).map(|n| n.order).unwrap_or(u32::MAX);

    let linear = topo_order(
        graph,
        &impure,
        PortRole::Control,
        |id| (u8::from(Some(id) != entry), order_of(id), id),
    )
    .map_err(|nodes| ScheduleError::ControlCycle { nodes })?;

    let pure_order = topo_order(graph, &pure, PortRole::Data, |id| (0u8, order_of(id), id))
        .map_err(|nodes| ScheduleError::DataCycle { nodes })?;
    let rank: HashMap<NodeId, usize> = pure_order
        .iter()
        .enumerate()
        .map(|(i, id)| (*id, i))
        .collect();

    let mut preludes = IndexMap::new();
    for &id in &linear {
        let mut found: HashSet<NodeId> = HashSet::new();
        let mut stack = graph.predecessors(id, PortRole::Data);
        while let Some(source) = stack.pop() {
            if !pure.contains(&source) || !found.insert(source) {
                continue;
            }
            stack.extend(graph.predecessors(source, PortRole::Data));
        }
        let mut prelude: Vec<NodeId> = found.into_iter().collect();
        prelude.sort_by_key(|p| rank.get(p).copied().unwrap_or(usize::MAX));
        preludes.insert(id, prelude);
    }

    Ok(Schedule { linear, preludes })
}

/// Kahn's algorithm over the members of `set` using edges of `role`. On a
/// cycle, returns the members of every strongly connected component that
/// kept the walk from finishing.
fn topo_order<K: Ord + Copy>(
    graph: &Graph,
    set: &HashSet<NodeId>,
    role: PortRole,
    key: impl Fn(NodeId) -> K,
) -> Result<Vec<NodeId>, Vec<NodeId>> {
    let mut in_degree: HashMap<NodeId, usize> = set.iter().map(|id| (*id, 0)).collect();
    for &id in set {
        for next in graph.successors(id, role) {
            if let Some(d) = in_degree.get_mut(&next) {
                *d += 1;
            }
        }
    }

    let mut ready: BinaryHeap<Reverse<(K, NodeId)>> = in_degree
        .iter()
        .filter(|(_, d)| **d == 0)
        .map(|(id, _)| Reverse((key(*id), *id)))
        .collect();
    let mut out = Vec::with_capacity(set.len());
    while let Some(Reverse((_, id))) = ready.pop() {
        out.push(id);
        for next in graph.successors(id, role) {
            if let Some(d) = in_degree.get_mut(&next) {
                *d -= 1;
                if *d == 0 {
                    ready.push(Reverse((key(next), next)));
                }
            }
        }
    }

    if out.len() == set.len() {
        return Ok(out);
    }

    let done: HashSet<NodeId> = out.into_iter().collect();
    let mut remaining: DiGraphMap<NodeId, ()> = DiGraphMap::new();
    for &id in set.iter().filter(|id| !done.contains(id)) {
        remaining.add_node(id);
        for next in graph.successors(id, role) {
            if set.contains(&next) && !done.contains(&next) {
                remaining.add_edge(id, next, ());
            }
        }
    }
    let mut cycle: Vec<NodeId> = tarjan_scc(&remaining)
        .into_iter()
        .filter(|scc| scc.len() > 1 || remaining.contains_edge(scc[0], scc[0]))
        .flatten()
        .collect();
    cycle.sort();
    Err(cycle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphscript_core::{PinType, Port, PortRef, TypeDesc};

    fn int() -> PinType {
        PinType::of(TypeDesc::Int)
    }

    fn pure(node: &Node) -> bool {
        node.pure
    }

    fn reader(name: &str) -> Node {
        Node::call(name).with_port(Port::data_in("v", int()))
    }

    fn chain(g: &mut Graph, ids: &[NodeId]) {
        for pair in ids.windows(2) {
            let out = if g.node(pair[0]).unwrap().kind.is_entry() { 0 } else { 1 };
            g.connect(PortRef::new(pair[0], out), PortRef::new(pair[1], 0)).unwrap();
        }
    }

    #[test]
    fn entry_goes_first_then_control_order() {
        let mut g = Graph::new("F");
        let b = g.add_node(Node::call("B"));
        let entry = g.add_node(Node::entry("F"));
        let a = g.add_node(Node::call("A"));
        chain(&mut g, &[entry, a, b]);
        let s = schedule(&g, Some(entry), &pure).unwrap();
        assert_eq!(s.linear, vec![entry, a, b]);
    }

    #[test]
    fn shared_pure_node_is_in_each_prelude() {
        let mut g = Graph::new("F");
        let entry = g.add_node(Node::entry("F"));
        let c1 = g.add_node(reader("C1"));
        let c2 = g.add_node(reader("C2"));
        let p = g.add_node(Node::literal(int(), "1"));
        chain(&mut g, &[entry, c1, c2]);
        g.connect(PortRef::new(p, 0), PortRef::new(c1, 2)).unwrap();
        g.connect(PortRef::new(p, 0), PortRef::new(c2, 2)).unwrap();

        let s = schedule(&g, Some(entry), &pure).unwrap();
        assert_eq!(s.prelude(c1), &[p]);
        assert_eq!(s.prelude(c2), &[p]);
        assert_eq!(s.emission_order(), vec![entry, p, c1, p, c2]);
    }

    #[test]
    fn prelude_orders_producers_first() {
        let mut g = Graph::new("F");
        let entry = g.add_node(Node::entry("F"));
        let c = g.add_node(reader("C"));
        let neg = g.add_node(
            Node::pure_call("Negate")
                .with_port(Port::data_in("x", int()))
                .with_port(Port::data_out("r", int())),
        );
        let lit = g.add_node(Node::literal(int(), "4"));
        chain(&mut g, &[entry, c]);
        g.connect(PortRef::new(neg, 1), PortRef::new(c, 2)).unwrap();
        g.connect(PortRef::new(lit, 0), PortRef::new(neg, 0)).unwrap();

        let s = schedule(&g, Some(entry), &pure).unwrap();
        assert_eq!(s.prelude(c), &[lit, neg]);
    }

    #[test]
    fn control_cycle_is_reported() {
        let mut g = Graph::new("F");
        let entry = g.add_node(Node::entry("F"));
        let a = g.add_node(Node::call("A"));
        let b = g.add_node(Node::call("B"));
        chain(&mut g, &[entry, a, b]);
        g.connect(PortRef::new(b, 1), PortRef::new(a, 0)).unwrap();

        let err = schedule(&g, Some(entry), &pure).unwrap_err();
        assert_eq!(err, ScheduleError::ControlCycle { nodes: vec![a, b] });
    }
}
