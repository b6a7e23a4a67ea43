//! Stable ID newtypes for graph entities.
//!
//! Node and edge IDs are distinct newtype wrappers over `u32` so that a
//! `NodeId` cannot be used where an `EdgeId` is expected. Ports are not
//! separately allocated: a [`PortRef`] addresses a port by its owning node
//! and its index in that node's port list.

use std::fmt;

use petgraph::graph::{EdgeIndex, NodeIndex};
use serde::{Deserialize, Serialize};

/// Stable node identifier. Maps to a petgraph `NodeIndex<u32>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u32);

/// Stable edge identifier. Maps to a petgraph `EdgeIndex<u32>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EdgeId(pub u32);

/// Address of one port: the owning node plus the port's index on that node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PortRef {
    pub node: NodeId,
    pub index: u16,
}

impl PortRef {
    pub fn new(node: NodeId, index: u16) -> Self {
        PortRef { node, index }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for PortRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.node, self.index)
    }
}

// Bridge between the ID newtypes and petgraph's indices.

impl From<NodeIndex<u32>> for NodeId {
    fn from(idx: NodeIndex<u32>) -> Self {
        NodeId(idx.index() as u32)
    }
}

impl From<NodeId> for NodeIndex<u32> {
    fn from(id: NodeId) -> Self {
        NodeIndex::new(id.0 as usize)
    }
}

impl From<EdgeIndex<u32>> for EdgeId {
    fn from(idx: EdgeIndex<u32>) -> Self {
        EdgeId(idx.index() as u32)
    }
}

impl From<EdgeId> for EdgeIndex<u32> {
    fn from(id: EdgeId) -> Self {
        EdgeIndex::new(id.0 as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_id_to_node_index_roundtrip() {
        let idx = NodeIndex::<u32>::new(42);
        let node_id = NodeId::from(idx);
        assert_eq!(node_id.0, 42);

        let back: NodeIndex<u32> = node_id.into();
        assert_eq!(back.index(), 42);
    }

    #[test]
    fn port_ref_display() {
        assert_eq!(format!("{}", PortRef::new(NodeId(3), 1)), "3:1");
    }

    #[test]
    fn port_refs_order_by_node_then_index() {
        let mut ports = vec![
            PortRef::new(NodeId(2), 0),
            PortRef::new(NodeId(1), 4),
            PortRef::new(NodeId(1), 0),
        ];
        ports.sort();
        assert_eq!(
            ports,
            vec![
                PortRef::new(NodeId(1), 0),
                PortRef::new(NodeId(1), 4),
                PortRef::new(NodeId(2), 0),
            ]
        );
    }

    #[test]
    fn serde_roundtrip() {
        let port = PortRef::new(NodeId(9), 2);
        let json = serde_json::to_string(&port).unwrap();
        let back: PortRef = serde_json::from_str(&json).unwrap();
        assert_eq!(port, back);
    }
}
