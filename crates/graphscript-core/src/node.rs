//! Nodes and ports of the script graph.
//!
//! A [`Node`] owns its ports. Its [`NodeKind`] selects the handler that
//! registers terms and emits statements for it; [`KindTag`] is the
//! payload-free key the handler registry is indexed by.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::graph::Graph;
use crate::signature::FunctionFlags;
use crate::types::{PinType, TypeDesc};

// ---------------------------------------------------------------------------
// Ports
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortDirection {
    In,
    Out,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortRole {
    Control,
    Data,
}

/// A typed connection point on a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Port {
    pub name: String,
    pub direction: PortDirection,
    pub role: PortRole,
    pub ty: PinType,
    /// Literal used when a data input has no incoming link.
    #[serde(default)]
    pub default_value: Option<String>,
}

impl Port {
    pub fn exec_in(name: impl Into<String>) -> Self {
        Port {
            name: name.into(),
            direction: PortDirection::In,
            role: PortRole::Control,
            ty: PinType::exec(),
            default_value: None,
        }
    }

    pub fn exec_out(name: impl Into<String>) -> Self {
        Port {
            name: name.into(),
            direction: PortDirection::Out,
            role: PortRole::Control,
            ty: PinType::exec(),
            default_value: None,
        }
    }

    pub fn data_in(name: impl Into<String>, ty: PinType) -> Self {
        Port {
            name: name.into(),
            direction: PortDirection::In,
            role: PortRole::Data,
            ty,
            default_value: None,
        }
    }

    pub fn data_out(name: impl Into<String>, ty: PinType) -> Self {
        Port {
            name: name.into(),
            direction: PortDirection::Out,
            role: PortRole::Data,
            ty,
            default_value: None,
        }
    }

    pub fn with_default(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    pub fn is_control(&self) -> bool {
        self.role == PortRole::Control
    }

    pub fn is_data(&self) -> bool {
        self.role == PortRole::Data
    }

    pub fn is_input(&self) -> bool {
        self.direction == PortDirection::In
    }

    pub fn is_output(&self) -> bool {
        self.direction == PortDirection::Out
    }
}

// ---------------------------------------------------------------------------
// Node kinds
// ---------------------------------------------------------------------------

/// A local variable declared on a function entry node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalDecl {
    pub name: String,
    pub ty: PinType,
    #[serde(default)]
    pub default_value: Option<String>,
}

/// Payload of a function entry node.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EntrySpec {
    pub function: String,
    #[serde(default)]
    pub locals: Vec<LocalDecl>,
    #[serde(default)]
    pub flags: FunctionFlags,
    /// Dispatch on the first parameter instead of falling through. Used by
    /// the entry of the consolidated event graph.
    #[serde(default)]
    pub computed_dispatch: bool,
}

/// Payload of an event node.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EventSpec {
    pub name: String,
    /// Implements a function declared by the parent class or an interface.
    #[serde(default)]
    pub is_override: bool,
    #[serde(default)]
    pub flags: FunctionFlags,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TunnelSide {
    /// Entry side of a region. Its outputs are the region's inputs.
    Input,
    /// Exit side of a region. Its inputs are the region's outputs.
    Output,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BoundarySite {
    Entry,
    Exit,
}

/// What a node does. Selects its handler through [`KindTag`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum NodeKind {
    FunctionEntry(EntrySpec),
    FunctionResult,
    Event(EventSpec),
    CallFunction {
        function: String,
    },
    VariableGet {
        variable: String,
    },
    VariableSet {
        variable: String,
    },
    Branch,
    Sequence,
    Literal,
    MakeArray,
    EnumLiteral {
        enum_name: String,
    },
    Comment,
    /// Call to a reusable subgraph from the macro library.
    MacroInstance {
        macro_name: String,
        /// Concrete type the instance resolved its wildcard ports to.
        #[serde(default)]
        resolved_type: Option<PinType>,
    },
    /// A collapsed region that carries its own body.
    Composite {
        body: Box<Graph>,
    },
    Tunnel(TunnelSide),
    TunnelBoundary {
        site: BoundarySite,
    },
    /// Copies its data inputs into persistent frame slots of the same name.
    PersistentFrameAssign,
    /// Calls into the consolidated event graph at the entry of `event`.
    CallEventGraph {
        event: String,
    },
    /// A kind provided by an embedder-registered handler.
    Custom {
        name: String,
        #[serde(default)]
        properties: IndexMap<String, String>,
    },
}

/// Payload-free discriminant of [`NodeKind`]. Key of the handler registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KindTag {
    FunctionEntry,
    FunctionResult,
    Event,
    CallFunction,
    VariableGet,
    VariableSet,
    Branch,
    Sequence,
    Literal,
    MakeArray,
    EnumLiteral,
    Comment,
    MacroInstance,
    Composite,
    Tunnel,
    TunnelBoundary,
    PersistentFrameAssign,
    CallEventGraph,
    Custom(String),
}

impl NodeKind {
    pub fn tag(&self) -> KindTag {
        match self {
            NodeKind::FunctionEntry(_) => KindTag::FunctionEntry,
            NodeKind::FunctionResult => KindTag::FunctionResult,
            NodeKind::Event(_) => KindTag::Event,
            NodeKind::CallFunction { .. } => KindTag::CallFunction,
            NodeKind::VariableGet { .. } => KindTag::VariableGet,
            NodeKind::VariableSet { .. } => KindTag::VariableSet,
            NodeKind::Branch => KindTag::Branch,
            NodeKind::Sequence => KindTag::Sequence,
            NodeKind::Literal => KindTag::Literal,
            NodeKind::MakeArray => KindTag::MakeArray,
            NodeKind::EnumLiteral { .. } => KindTag::EnumLiteral,
            NodeKind::Comment => KindTag::Comment,
            NodeKind::MacroInstance { .. } => KindTag::MacroInstance,
            NodeKind::Composite { .. } => KindTag::Composite,
            NodeKind::Tunnel(_) => KindTag::Tunnel,
            NodeKind::TunnelBoundary { .. } => KindTag::TunnelBoundary,
            NodeKind::PersistentFrameAssign => KindTag::PersistentFrameAssign,
            NodeKind::CallEventGraph { .. } => KindTag::CallEventGraph,
            NodeKind::Custom { name, .. } => KindTag::Custom(name.clone()),
        }
    }

    /// Instances that expansion replaces with their body.
    pub fn is_instance(&self) -> bool {
        matches!(
            self,
            NodeKind::MacroInstance { .. } | NodeKind::Composite { .. }
        )
    }

    pub fn is_tunnel(&self) -> bool {
        matches!(self, NodeKind::Tunnel(_))
    }

    /// Entry points of a graph: function entries and events.
    pub fn is_entry(&self) -> bool {
        matches!(self, NodeKind::FunctionEntry(_) | NodeKind::Event(_))
    }
}

impl fmt::Display for KindTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KindTag::Custom(name) => write!(f, "Custom({name})"),
            other => write!(f, "{other:?}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

/// A block in the authored graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub kind: NodeKind,
    pub title: String,
    #[serde(default)]
    pub ports: SmallVec<[Port; 4]>,
    /// No control ports and no side effects.
    #[serde(default)]
    pub pure: bool,
    /// Editor position. Only used in diagnostics.
    #[serde(default)]
    pub position: (i32, i32),
    #[serde(default)]
    pub deprecated: bool,
    #[serde(default)]
    pub comment: Option<String>,
    /// Authoring order key, assigned by [`Graph::add_node`].
    #[serde(default)]
    pub order: u32,
}

impl Node {
    pub fn new(kind: NodeKind, title: impl Into<String>) -> Self {
        Node {
            kind,
            title: title.into(),
            ports: SmallVec::new(),
            pure: false,
            position: (0, 0),
            deprecated: false,
            comment: None,
            order: 0,
        }
    }

    pub fn with_port(mut self, port: Port) -> Self {
        self.ports.push(port);
        self
    }

    pub fn with_ports(mut self, ports: impl IntoIterator<Item = Port>) -> Self {
        self.ports.extend(ports);
        self
    }

    pub fn into_pure(mut self) -> Self {
        self.pure = true;
        self
    }

    pub fn entry(function: impl Into<String>) -> Self {
        let function = function.into();
        Node::new(
            NodeKind::FunctionEntry(EntrySpec {
                function: function.clone(),
                ..EntrySpec::default()
            }),
            function,
        )
        .with_port(Port::exec_out("then"))
    }

    pub fn result() -> Self {
        Node::new(NodeKind::FunctionResult, "Return").with_port(Port::exec_in("exec"))
    }

    pub fn event(name: impl Into<String>) -> Self {
        let name = name.into();
        Node::new(
            NodeKind::Event(EventSpec {
                name: name.clone(),
                ..EventSpec::default()
            }),
            name,
        )
        .with_port(Port::exec_out("then"))
    }

    /// An impure call with one control input and one control output.
    pub fn call(function: impl Into<String>) -> Self {
        let function = function.into();
        Node::new(
            NodeKind::CallFunction {
                function: function.clone(),
            },
            function,
        )
        .with_port(Port::exec_in("exec"))
        .with_port(Port::exec_out("then"))
    }

    pub fn pure_call(function: impl Into<String>) -> Self {
        let function = function.into();
        Node::new(
            NodeKind::CallFunction {
                function: function.clone(),
            },
            function,
        )
        .into_pure()
    }

    pub fn branch() -> Self {
        Node::new(NodeKind::Branch, "Branch")
            .with_port(Port::exec_in("exec"))
            .with_port(Port::data_in("condition", PinType::of(TypeDesc::Bool)))
            .with_port(Port::exec_out("true"))
            .with_port(Port::exec_out("false"))
    }

    pub fn sequence(outputs: usize) -> Self {
        let mut node = Node::new(NodeKind::Sequence, "Sequence").with_port(Port::exec_in("exec"));
        for i in 0..outputs {
            node.ports.push(Port::exec_out(format!("then_{i}")));
        }
        node
    }

    pub fn variable_get(variable: impl Into<String>, ty: PinType) -> Self {
        let variable = variable.into();
        Node::new(
            NodeKind::VariableGet {
                variable: variable.clone(),
            },
            format!("Get {variable}"),
        )
        .with_port(Port::data_out("value", ty))
        .into_pure()
    }

    pub fn variable_set(variable: impl Into<String>, ty: PinType) -> Self {
        let variable = variable.into();
        Node::new(
            NodeKind::VariableSet {
                variable: variable.clone(),
            },
            format!("Set {variable}"),
        )
        .with_port(Port::exec_in("exec"))
        .with_port(Port::exec_out("then"))
        .with_port(Port::data_in("value", ty.clone()))
        .with_port(Port::data_out("output", ty))
    }

    pub fn literal(ty: PinType, value: impl Into<String>) -> Self {
        let value = value.into();
        Node::new(NodeKind::Literal, value.clone())
            .with_port(Port::data_out("value", ty).with_default(value))
            .into_pure()
    }

    /// Array construction with `elements` inputs of type `element`.
    pub fn make_array(element: TypeDesc, elements: usize) -> Self {
        let mut node = Node::new(NodeKind::MakeArray, "Make Array").into_pure();
        for i in 0..elements {
            node.ports
                .push(Port::data_in(format!("[{i}]"), PinType::of(element.clone())));
        }
        node.ports
            .push(Port::data_out("array", PinType::array(element)));
        node
    }

    pub fn enum_literal(enum_name: impl Into<String>, value: impl Into<String>) -> Self {
        let enum_name = enum_name.into();
        Node::new(
            NodeKind::EnumLiteral {
                enum_name: enum_name.clone(),
            },
            format!("Literal {enum_name}"),
        )
        .with_port(Port::data_in("value", PinType::of(TypeDesc::Name)).with_default(value))
        .with_port(Port::data_out(
            "enum",
            PinType::of(TypeDesc::Enum(enum_name)),
        ))
        .into_pure()
    }

    pub fn comment(text: impl Into<String>) -> Self {
        let text = text.into();
        let mut node = Node::new(NodeKind::Comment, text.clone()).into_pure();
        node.comment = Some(text);
        node
    }

    /// A macro instance without ports; callers add the ports mirroring the
    /// macro's tunnels.
    pub fn macro_instance(macro_name: impl Into<String>) -> Self {
        let macro_name = macro_name.into();
        Node::new(
            NodeKind::MacroInstance {
                macro_name: macro_name.clone(),
                resolved_type: None,
            },
            macro_name,
        )
    }

    pub fn composite(body: Graph) -> Self {
        let title = body.name().to_string();
        Node::new(
            NodeKind::Composite {
                body: Box::new(body),
            },
            title,
        )
    }

    pub fn tunnel(side: TunnelSide) -> Self {
        let title = match side {
            TunnelSide::Input => "Inputs",
            TunnelSide::Output => "Outputs",
        };
        Node::new(NodeKind::Tunnel(side), title)
    }

    pub fn tunnel_boundary(site: BoundarySite) -> Self {
        Node::new(NodeKind::TunnelBoundary { site }, format!("{site:?} boundary"))
            .with_port(Port::exec_in("exec"))
            .with_port(Port::exec_out("then"))
    }

    pub fn persistent_frame_assign() -> Self {
        Node::new(NodeKind::PersistentFrameAssign, "Assign persistent frame")
            .with_port(Port::exec_in("exec"))
            .with_port(Port::exec_out("then"))
    }

    pub fn call_event_graph(event: impl Into<String>) -> Self {
        let event = event.into();
        Node::new(
            NodeKind::CallEventGraph {
                event: event.clone(),
            },
            format!("Call event graph ({event})"),
        )
        .with_port(Port::exec_in("exec"))
        .with_port(Port::exec_out("then"))
    }

    pub fn tag(&self) -> KindTag {
        self.kind.tag()
    }

    pub fn port(&self, index: u16) -> Option<&Port> {
        self.ports.get(index as usize)
    }

    /// Index of the first port with the given name and direction.
    pub fn find_port(&self, name: &str, direction: PortDirection) -> Option<u16> {
        self.ports
            .iter()
            .position(|p| p.name == name && p.direction == direction)
            .map(|i| i as u16)
    }

    pub fn has_control_ports(&self) -> bool {
        self.ports.iter().any(Port::is_control)
    }

    pub fn has_control_input(&self) -> bool {
        self.ports.iter().any(|p| p.is_control() && p.is_input())
    }

    /// `(index, port)` pairs matching a role and direction, in port order.
    pub fn ports_where(
        &self,
        role: PortRole,
        direction: PortDirection,
    ) -> impl Iterator<Item = (u16, &Port)> {
        self.ports
            .iter()
            .enumerate()
            .filter(move |(_, p)| p.role == role && p.direction == direction)
            .map(|(i, p)| (i as u16, p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn branch_shape() {
        let node = Node::branch();
        assert_eq!(node.find_port("exec", PortDirection::In), Some(0));
        assert_eq!(node.find_port("false", PortDirection::Out), Some(3));
        assert!(node.has_control_input());
        assert!(!node.pure);
    }

    #[test]
    fn pure_nodes_have_no_control_ports() {
        for node in [
            Node::literal(PinType::of(TypeDesc::Int), "3"),
            Node::make_array(TypeDesc::Int, 2),
            Node::variable_get("Health", PinType::of(TypeDesc::Float)),
            Node::enum_literal("Color", "Red"),
            Node::pure_call("Sqrt"),
        ] {
            assert!(node.pure);
            assert!(!node.has_control_ports(), "{} has control ports", node.title);
        }
    }

    #[test]
    fn sequence_outputs_are_numbered() {
        let node = Node::sequence(3);
        let outs: Vec<_> = node
            .ports_where(PortRole::Control, PortDirection::Out)
            .map(|(_, p)| p.name.clone())
            .collect();
        assert_eq!(outs, vec!["then_0", "then_1", "then_2"]);
    }

    #[test]
    fn kind_tags() {
        assert_eq!(Node::entry("Foo").tag(), KindTag::FunctionEntry);
        let custom = Node::new(
            NodeKind::Custom {
                name: "Delay".into(),
                properties: IndexMap::new(),
            },
            "Delay",
        );
        assert_eq!(custom.tag(), KindTag::Custom("Delay".into()));
        assert_eq!(custom.tag().to_string(), "Custom(Delay)");
        assert_eq!(KindTag::Branch.to_string(), "Branch");
    }

    #[test]
    fn make_array_output_is_array() {
        let node = Node::make_array(TypeDesc::Float, 0);
        assert_eq!(node.ports.len(), 1);
        assert_eq!(node.ports[0].ty, PinType::array(TypeDesc::Float));
    }
}
