//! Core error types for graphscript-core.
//!
//! Uses `thiserror` for structured, matchable error variants covering
//! misuse of the graph model API. Problems in the authored program itself
//! are not errors here; the compiler reports those as diagnostics.

use crate::id::{NodeId, PortRef};
use thiserror::Error;

/// Core errors produced by the graphscript-core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A node index was not found in the graph.
    #[error("node not found: NodeId({id})", id = id.0)]
    NodeNotFound { id: NodeId },

    /// A port index was out of range for its node.
    #[error("port not found: {port}")]
    PortNotFound { port: PortRef },

    /// An edge failed validation.
    #[error("invalid edge: {reason}")]
    InvalidEdge { reason: String },

    /// Two declarations share a name where names must be unique.
    #[error("duplicate name: '{name}'")]
    DuplicateName { name: String },

    /// A compilation unit could not be decoded.
    #[error("invalid unit description: {0}")]
    Json(#[from] serde_json::Error),
}
