//! Compilation units: everything the compiler needs to build one class.
//!
//! A unit bundles the class declaration (parent, interfaces, member
//! variables, components) with its authored graphs (function graphs, event
//! pages) and the macro library its graphs instantiate. Units are usually
//! loaded from JSON produced by the authoring layer.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::graph::Graph;
use crate::signature::FunctionSignature;
use crate::types::PinType;

/// The class a unit derives from, as seen through its skeleton.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParentClass {
    pub name: String,
    #[serde(default)]
    pub functions: Vec<FunctionSignature>,
}

impl ParentClass {
    pub fn function(&self, name: &str) -> Option<&FunctionSignature> {
        self.functions.iter().find(|f| f.name == name)
    }
}

/// An interface the class implements.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterfaceDecl {
    pub name: String,
    #[serde(default)]
    pub functions: Vec<FunctionSignature>,
}

/// A member variable declared on the class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableDecl {
    pub name: String,
    pub ty: PinType,
    /// Default as authored text; parsed when the default object is built.
    #[serde(default)]
    pub default_value: Option<String>,
}

/// A component instance owned by the class. Object defaults may refer to
/// components by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentDecl {
    pub name: String,
    pub class: String,
}

/// Reusable subgraphs addressable by name from macro instance nodes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MacroLibrary {
    graphs: IndexMap<String, Graph>,
}

impl MacroLibrary {
    pub fn new() -> Self {
        MacroLibrary::default()
    }

    /// Adds a macro under its graph name.
    pub fn insert(&mut self, graph: Graph) -> Result<(), CoreError> {
        let name = graph.name().to_string();
        if self.graphs.contains_key(&name) {
            return Err(CoreError::DuplicateName { name });
        }
        self.graphs.insert(name, graph);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Graph> {
        self.graphs.get(name)
    }

    pub fn len(&self) -> usize {
        self.graphs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.graphs.is_empty()
    }
}

/// The input of one class compilation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompilationUnit {
    pub name: String,
    #[serde(default)]
    pub parent: Option<ParentClass>,
    #[serde(default)]
    pub interfaces: Vec<InterfaceDecl>,
    #[serde(default)]
    pub variables: Vec<VariableDecl>,
    #[serde(default)]
    pub components: Vec<ComponentDecl>,
    /// One graph per function; each holds exactly one entry node.
    #[serde(default)]
    pub function_graphs: Vec<Graph>,
    /// Event pages, merged into one shared graph by a full compile.
    #[serde(default)]
    pub event_graphs: Vec<Graph>,
    #[serde(default)]
    pub macros: MacroLibrary,
}

impl CompilationUnit {
    pub fn new(name: impl Into<String>) -> Self {
        CompilationUnit {
            name: name.into(),
            parent: None,
            interfaces: Vec::new(),
            variables: Vec::new(),
            components: Vec::new(),
            function_graphs: Vec::new(),
            event_graphs: Vec::new(),
            macros: MacroLibrary::new(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, CoreError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, CoreError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Finds the signature `name` overrides, searching the parent class first
    /// and then the implemented interfaces.
    pub fn inherited_signature(&self, name: &str) -> Option<(&str, &FunctionSignature)> {
        if let Some(parent) = &self.parent {
            if let Some(sig) = parent.function(name) {
                return Some((parent.name.as_str(), sig));
            }
        }
        self.interfaces.iter().find_map(|iface| {
            iface
                .functions
                .iter()
                .find(|f| f.name == name)
                .map(|sig| (iface.name.as_str(), sig))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Node;
    use crate::signature::ParamSig;
    use crate::types::TypeDesc;

    #[test]
    fn macro_names_are_unique() {
        let mut lib = MacroLibrary::new();
        lib.insert(Graph::new("Clamp")).unwrap();
        let err = lib.insert(Graph::new("Clamp"));
        assert!(matches!(err, Err(CoreError::DuplicateName { .. })));
        assert_eq!(lib.len(), 1);
    }

    #[test]
    fn inherited_signature_prefers_parent() {
        let mut unit = CompilationUnit::new("Door");
        unit.parent = Some(ParentClass {
            name: "Actor".into(),
            functions: vec![FunctionSignature::new("Open")],
        });
        unit.interfaces.push(InterfaceDecl {
            name: "Usable".into(),
            functions: vec![
                FunctionSignature::new("Open")
                    .with_param(ParamSig::input("by", PinType::of(TypeDesc::Name))),
                FunctionSignature::new("Use"),
            ],
        });

        let (owner, sig) = unit.inherited_signature("Open").unwrap();
        assert_eq!(owner, "Actor");
        assert!(sig.params.is_empty());
        assert_eq!(unit.inherited_signature("Use").unwrap().0, "Usable");
        assert!(unit.inherited_signature("Close").is_none());
    }

    #[test]
    fn json_roundtrip() {
        let mut unit = CompilationUnit::new("Door");
        let mut graph = Graph::new("Open");
        graph.add_node(Node::entry("Open"));
        unit.function_graphs.push(graph);
        unit.variables.push(VariableDecl {
            name: "Angle".into(),
            ty: PinType::of(TypeDesc::Float),
            default_value: Some("90.0".into()),
        });

        let json = unit.to_json().unwrap();
        let back = CompilationUnit::from_json(&json).unwrap();
        assert_eq!(back.name, "Door");
        assert_eq!(back.function_graphs[0].node_count(), 1);
        assert_eq!(back.variables, unit.variables);
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(matches!(
            CompilationUnit::from_json("{\"name\": 3}"),
            Err(CoreError::Json(_))
        ));
    }
}
