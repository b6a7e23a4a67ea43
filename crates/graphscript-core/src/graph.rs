//! Graph: the arena holding one authored script graph.
//!
//! [`Graph`] wraps a petgraph `StableGraph<Node, FlowEdge>`. Nodes own their
//! ports; edges are index pairs between ports, stored once in the arena and
//! queried from either end. All mutations go through `Graph` methods so that
//! edge direction (output port to input port) and role agreement are always
//! enforced.
//!
//! # Ordering
//!
//! Every node carries an `order` key assigned when it is added. Iteration
//! through [`Graph::nodes`] follows that key, not arena slots, so removal and
//! slot reuse never change the relative order of surviving nodes. Passes that
//! need deterministic tie-breaking rely on it.
//!
//! # Cloning
//!
//! [`Graph::clone_graph`] and [`Graph::merge_from`] copy nodes into fresh
//! slots and return a [`CloneMap`] from source ids to the new ids. Nothing is
//! shared between source and copy.

use indexmap::IndexMap;
use petgraph::graph::{EdgeIndex, NodeIndex};
use petgraph::stable_graph::StableGraph;
use petgraph::visit::EdgeRef;
use petgraph::{Directed, Direction};
use serde::{Deserialize, Serialize};

use crate::edge::FlowEdge;
use crate::error::CoreError;
use crate::id::{EdgeId, NodeId, PortRef};
use crate::node::{Node, Port, PortDirection, PortRole};

/// One script graph: a function body, an event page, a macro body or a
/// composite region.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Graph {
    name: String,
    arena: StableGraph<Node, FlowEdge, Directed, u32>,
    #[serde(default)]
    next_order: u32,
}

/// Mapping from nodes of a source graph to their copies.
#[derive(Debug, Clone, Default)]
pub struct CloneMap {
    forward: IndexMap<NodeId, NodeId>,
}

impl CloneMap {
    /// The copy of `source`.
    pub fn get(&self, source: NodeId) -> Option<NodeId> {
        self.forward.get(&source).copied()
    }

    /// The source a copy was made from.
    pub fn source_of(&self, copy: NodeId) -> Option<NodeId> {
        self.forward
            .iter()
            .find(|(_, c)| **c == copy)
            .map(|(s, _)| *s)
    }

    /// `(source, copy)` pairs in source authoring order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, NodeId)> + '_ {
        self.forward.iter().map(|(s, c)| (*s, *c))
    }

    pub fn copies(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.forward.values().copied()
    }

    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }
}

impl Graph {
    pub fn new(name: impl Into<String>) -> Self {
        Graph {
            name: name.into(),
            arena: StableGraph::new(),
            next_order: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn node_count(&self) -> usize {
        self.arena.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.arena.edge_count()
    }

    // -----------------------------------------------------------------------
    // Nodes
    // -----------------------------------------------------------------------

    fn allocate_order(&mut self) -> u32 {
        // Deserialized graphs start with a zero counter; continue after the
        // highest key already present.
        if self.next_order == 0 {
            self.next_order = self
                .arena
                .node_indices()
                .map(|idx| self.arena[idx].order + 1)
                .max()
                .unwrap_or(0);
        }
        let order = self.next_order;
        self.next_order += 1;
        order
    }

    /// Adds a node and assigns it the next authoring order key.
    pub fn add_node(&mut self, mut node: Node) -> NodeId {
        node.order = self.allocate_order();
        NodeId::from(self.arena.add_node(node))
    }

    /// Removes a node together with every edge attached to its ports.
    pub fn remove_node(&mut self, id: NodeId) -> Result<Node, CoreError> {
        self.arena
            .remove_node(NodeIndex::from(id))
            .ok_or(CoreError::NodeNotFound { id })
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.arena.contains_node(NodeIndex::from(id))
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.arena.node_weight(NodeIndex::from(id))
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.arena.node_weight_mut(NodeIndex::from(id))
    }

    /// Node ids in authoring order.
    pub fn node_ids(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self.arena.node_indices().map(NodeId::from).collect();
        ids.sort_by_key(|id| (self.arena[NodeIndex::from(*id)].order, *id));
        ids
    }

    /// Nodes in authoring order.
    pub fn nodes(&self) -> Vec<(NodeId, &Node)> {
        self.node_ids()
            .into_iter()
            .map(|id| (id, &self.arena[NodeIndex::from(id)]))
            .collect()
    }

    /// Ids of nodes matching `pred`, in authoring order.
    pub fn find_nodes(&self, pred: impl Fn(&Node) -> bool) -> Vec<NodeId> {
        self.nodes()
            .into_iter()
            .filter(|(_, n)| pred(n))
            .map(|(id, _)| id)
            .collect()
    }

    /// Function entries and events.
    pub fn entry_nodes(&self) -> Vec<NodeId> {
        self.find_nodes(|n| n.kind.is_entry())
    }

    // -----------------------------------------------------------------------
    // Ports
    // -----------------------------------------------------------------------

    /// Ports of a node; empty when the node does not exist.
    pub fn ports(&self, id: NodeId) -> &[Port] {
        self.node(id).map(|n| n.ports.as_slice()).unwrap_or(&[])
    }

    pub fn port(&self, port: PortRef) -> Option<&Port> {
        self.node(port.node).and_then(|n| n.port(port.index))
    }

    pub fn port_mut(&mut self, port: PortRef) -> Option<&mut Port> {
        self.node_mut(port.node)
            .and_then(|n| n.ports.get_mut(port.index as usize))
    }

    pub fn find_port(&self, node: NodeId, name: &str, direction: PortDirection) -> Option<PortRef> {
        self.node(node)
            .and_then(|n| n.find_port(name, direction))
            .map(|index| PortRef::new(node, index))
    }

    // -----------------------------------------------------------------------
    // Edges
    // -----------------------------------------------------------------------

    /// Edges attached to `port`, each paired with the port at the far end.
    /// Sorted by far end.
    pub fn edges(&self, port: PortRef) -> Vec<(EdgeId, PortRef)> {
        let Some(p) = self.port(port) else {
            return Vec::new();
        };
        let idx = NodeIndex::from(port.node);
        let mut out: Vec<(EdgeId, PortRef)> = match p.direction {
            PortDirection::Out => self
                .arena
                .edges_directed(idx, Direction::Outgoing)
                .filter(|e| e.weight().source_port() == port.index)
                .map(|e| {
                    (
                        EdgeId::from(e.id()),
                        PortRef::new(NodeId::from(e.target()), e.weight().target_port()),
                    )
                })
                .collect(),
            PortDirection::In => self
                .arena
                .edges_directed(idx, Direction::Incoming)
                .filter(|e| e.weight().target_port() == port.index)
                .map(|e| {
                    (
                        EdgeId::from(e.id()),
                        PortRef::new(NodeId::from(e.source()), e.weight().source_port()),
                    )
                })
                .collect(),
        };
        out.sort_by_key(|(_, far)| *far);
        out
    }

    /// Ports linked to `port`.
    pub fn links(&self, port: PortRef) -> Vec<PortRef> {
        self.edges(port).into_iter().map(|(_, far)| far).collect()
    }

    pub fn is_linked(&self, port: PortRef) -> bool {
        !self.edges(port).is_empty()
    }

    /// Links two ports. Accepts the ports in either order; the edge is stored
    /// from the output to the input. Linking an already linked pair returns
    /// the existing edge.
    pub fn connect(&mut self, a: PortRef, b: PortRef) -> Result<EdgeId, CoreError> {
        let pa = self.port(a).ok_or(CoreError::PortNotFound { port: a })?;
        let pb = self.port(b).ok_or(CoreError::PortNotFound { port: b })?;

        if a.node == b.node {
            return Err(CoreError::InvalidEdge {
                reason: format!("cannot link node {} to itself", a.node),
            });
        }
        if pa.role != pb.role {
            return Err(CoreError::InvalidEdge {
                reason: format!(
                    "cannot link {:?} port '{}' to {:?} port '{}'",
                    pa.role, pa.name, pb.role, pb.name
                ),
            });
        }
        let role = pa.role;
        let (out, inp) = match (pa.direction, pb.direction) {
            (PortDirection::Out, PortDirection::In) => (a, b),
            (PortDirection::In, PortDirection::Out) => (b, a),
            (dir, _) => {
                return Err(CoreError::InvalidEdge {
                    reason: format!(
                        "cannot link '{}' to '{}': both ports are {:?}",
                        pa.name, pb.name, dir
                    ),
                })
            }
        };

        if let Some((id, _)) = self.edges(out).into_iter().find(|(_, far)| *far == inp) {
            return Ok(id);
        }

        let weight = match role {
            PortRole::Control => FlowEdge::Control {
                source_port: out.index,
                target_port: inp.index,
            },
            PortRole::Data => FlowEdge::Data {
                source_port: out.index,
                target_port: inp.index,
            },
        };
        let edge = self
            .arena
            .add_edge(NodeIndex::from(out.node), NodeIndex::from(inp.node), weight);
        Ok(EdgeId::from(edge))
    }

    /// Removes every link of `port`. Returns how many were removed.
    pub fn disconnect(&mut self, port: PortRef) -> usize {
        let edges = self.edges(port);
        for (id, _) in &edges {
            self.arena.remove_edge(EdgeIndex::from(*id));
        }
        edges.len()
    }

    /// Removes the link between two specific ports, if present.
    pub fn disconnect_pair(&mut self, a: PortRef, b: PortRef) -> bool {
        match self.edges(a).into_iter().find(|(_, far)| *far == b) {
            Some((id, _)) => self.arena.remove_edge(EdgeIndex::from(id)).is_some(),
            None => false,
        }
    }

    /// Re-links everything attached to `from` onto `to`, leaving `from`
    /// unlinked.
    pub fn move_links(&mut self, from: PortRef, to: PortRef) -> Result<(), CoreError> {
        let links = self.links(from);
        self.disconnect(from);
        for far in links {
            self.connect(to, far)?;
        }
        Ok(())
    }

    /// Links `to` to everything `from` is linked to.
    pub fn copy_links(&mut self, from: PortRef, to: PortRef) -> Result<(), CoreError> {
        for far in self.links(from) {
            self.connect(to, far)?;
        }
        Ok(())
    }

    /// Distinct nodes reached through outgoing edges of one role, ordered by
    /// source port and then by target authoring order.
    pub fn successors(&self, id: NodeId, role: PortRole) -> Vec<NodeId> {
        self.neighbors(id, role, Direction::Outgoing)
    }

    /// Distinct nodes feeding this node through edges of one role.
    pub fn predecessors(&self, id: NodeId, role: PortRole) -> Vec<NodeId> {
        self.neighbors(id, role, Direction::Incoming)
    }

    fn neighbors(&self, id: NodeId, role: PortRole, dir: Direction) -> Vec<NodeId> {
        if !self.contains(id) {
            return Vec::new();
        }
        let mut found: Vec<(u16, u32, NodeId)> = self
            .arena
            .edges_directed(NodeIndex::from(id), dir)
            .filter(|e| match role {
                PortRole::Control => e.weight().is_control(),
                PortRole::Data => e.weight().is_data(),
            })
            .map(|e| {
                let (port, other) = match dir {
                    Direction::Outgoing => (e.weight().source_port(), e.target()),
                    Direction::Incoming => (e.weight().target_port(), e.source()),
                };
                (port, self.arena[other].order, NodeId::from(other))
            })
            .collect();
        found.sort();
        let mut out: Vec<NodeId> = Vec::with_capacity(found.len());
        for (_, _, node) in found {
            if !out.contains(&node) {
                out.push(node);
            }
        }
        out
    }

    // -----------------------------------------------------------------------
    // Cloning
    // -----------------------------------------------------------------------

    /// Deep copy into fresh slots, preserving authoring order.
    pub fn clone_graph(&self) -> (Graph, CloneMap) {
        let mut copy = Graph::new(self.name.clone());
        let map = copy.merge_from(self);
        (copy, map)
    }

    /// Copies every node and edge of `other` into this graph. The copies are
    /// ordered after all existing nodes, keeping their relative order.
    pub fn merge_from(&mut self, other: &Graph) -> CloneMap {
        let mut map = CloneMap::default();
        for (id, node) in other.nodes() {
            let copy = self.add_node(node.clone());
            map.forward.insert(id, copy);
        }

        let mut edges: Vec<EdgeIndex<u32>> = other.arena.edge_indices().collect();
        edges.sort();
        for edge in edges {
            let (Some((s, t)), Some(weight)) =
                (other.arena.edge_endpoints(edge), other.arena.edge_weight(edge))
            else {
                continue;
            };
            let (Some(s), Some(t)) = (map.get(NodeId::from(s)), map.get(NodeId::from(t))) else {
                continue;
            };
            self.arena
                .add_edge(NodeIndex::from(s), NodeIndex::from(t), *weight);
        }
        map
    }
}
