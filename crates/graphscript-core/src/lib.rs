//! Graph model of the graphscript visual-script compiler.
//!
//! An authored program is a set of [`Graph`]s of [`Node`]s connected port to
//! port by control and data [`FlowEdge`]s, bundled with its class declaration
//! into a [`CompilationUnit`]. This crate only models that input; the
//! `graphscript-compiler` crate turns it into scheduled statement lists.

pub mod edge;
pub mod error;
pub mod graph;
pub mod id;
pub mod node;
pub mod signature;
pub mod types;
pub mod unit;

// Re-export commonly used types
pub use edge::FlowEdge;
pub use error::CoreError;
pub use graph::{CloneMap, Graph};
pub use id::{EdgeId, NodeId, PortRef};
pub use node::{
    BoundarySite, EntrySpec, EventSpec, KindTag, LocalDecl, Node, NodeKind, Port, PortDirection,
    PortRole, TunnelSide,
};
pub use signature::{FunctionFlags, FunctionSignature, ParamDirection, ParamSig};
pub use types::{Container, PinType, TypeDesc};
pub use unit::{
    CompilationUnit, ComponentDecl, InterfaceDecl, MacroLibrary, ParentClass, VariableDecl,
};
