//! Edge types of the script graph.
//!
//! An edge always runs from an output port to an input port. Control edges
//! carry execution order; data edges carry values. Both are stored in the
//! same petgraph arena and told apart by [`FlowEdge`], which lets passes walk
//! either flow independently.

use serde::{Deserialize, Serialize};

/// A link between two ports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowEdge {
    /// Execution order: the target node runs after the source node.
    Control {
        /// Control-out port index on the source node.
        source_port: u16,
        /// Control-in port index on the target node.
        target_port: u16,
    },

    /// Value flow from a data-out port to a data-in port.
    Data {
        /// Data-out port index on the source node.
        source_port: u16,
        /// Data-in port index on the target node.
        target_port: u16,
    },
}

impl FlowEdge {
    /// Returns `true` if this is a data flow edge.
    pub fn is_data(&self) -> bool {
        matches!(self, FlowEdge::Data { .. })
    }

    /// Returns `true` if this is a control flow edge.
    pub fn is_control(&self) -> bool {
        matches!(self, FlowEdge::Control { .. })
    }

    pub fn source_port(&self) -> u16 {
        match self {
            FlowEdge::Control { source_port, .. } | FlowEdge::Data { source_port, .. } => {
                *source_port
            }
        }
    }

    pub fn target_port(&self) -> u16 {
        match self {
            FlowEdge::Control { target_port, .. } | FlowEdge::Data { target_port, .. } => {
                *target_port
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flow_edge_kinds() {
        let data = FlowEdge::Data {
            source_port: 0,
            target_port: 2,
        };
        assert!(data.is_data());
        assert!(!data.is_control());

        let ctrl = FlowEdge::Control {
            source_port: 1,
            target_port: 0,
        };
        assert!(ctrl.is_control());
        assert!(!ctrl.is_data());
    }

    #[test]
    fn port_accessors() {
        let edge = FlowEdge::Data {
            source_port: 3,
            target_port: 5,
        };
        assert_eq!(edge.source_port(), 3);
        assert_eq!(edge.target_port(), 5);
    }
}
