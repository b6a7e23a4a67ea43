//! Class schema: the resolved names of a unit.
//!
//! Built first by the orchestrator. It settles which functions exist, which
//! member variables and components the class has, and renames members that
//! collide with other declarations so every later phase can resolve names
//! without re-checking for conflicts.

use std::collections::HashSet;

use graphscript_core::{CompilationUnit, Graph, NodeKind, PinType, TypeDesc, VariableDecl};
use indexmap::IndexMap;

use crate::diagnostics::Issue;

/// A member variable or component as stored on the class.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberDecl {
    pub name: String,
    pub ty: PinType,
    pub is_component: bool,
    pub default_value: Option<String>,
}

/// Name of the consolidated event graph function of `class`.
pub fn event_graph_function_name(class: &str) -> String {
    format!("ExecuteEventGraph_{class}")
}

/// Function name declared by a function graph: the first entry node's
/// function, or the graph name when there is none.
pub fn declared_function_name(graph: &Graph) -> String {
    graph
        .nodes()
        .into_iter()
        .find_map(|(_, n)| match &n.kind {
            NodeKind::FunctionEntry(spec) => Some(spec.function.clone()),
            _ => None,
        })
        .unwrap_or_else(|| graph.name().to_string())
}

#[derive(Debug, Clone, Default)]
pub struct ClassSchema {
    pub name: String,
    pub parent: Option<String>,
    pub members: IndexMap<String, MemberDecl>,
    /// Authored member names that were renamed away from a function name.
    pub renamed: IndexMap<String, String>,
    /// Function graphs to compile, by function name, with their index in
    /// the unit. Duplicates are excluded.
    pub functions: IndexMap<String, usize>,
    /// Names of events authored across all event pages.
    pub events: Vec<String>,
    pub event_graph_function: String,
}

impl ClassSchema {
    /// Resolves the schema of `unit`, returning warnings and errors found
    /// along the way with the graph they concern.
    pub fn build(unit: &CompilationUnit) -> (ClassSchema, Vec<(String, Issue)>) {
        let mut issues = Vec::new();
        let mut schema = ClassSchema {
            name: unit.name.clone(),
            parent: unit.parent.as_ref().map(|p| p.name.clone()),
            event_graph_function: event_graph_function_name(&unit.name),
            ..ClassSchema::default()
        };

        for (index, graph) in unit.function_graphs.iter().enumerate() {
            let name = declared_function_name(graph);
            if schema.functions.contains_key(&name) {
                issues.push((
                    graph.name().to_string(),
                    Issue::DuplicateFunction { name },
                ));
                continue;
            }
            schema.functions.insert(name, index);
        }

        for page in &unit.event_graphs {
            for (_, node) in page.nodes() {
                if let NodeKind::Event(spec) = &node.kind {
                    if !schema.events.contains(&spec.name) {
                        schema.events.push(spec.name.clone());
                    }
                }
            }
        }

        let callables: HashSet<String> = schema
            .functions
            .keys()
            .cloned()
            .chain(schema.events.iter().cloned())
            .chain(std::iter::once(schema.event_graph_function.clone()))
            .collect();

        let components = unit.components.iter().map(|c| VariableDecl {
            name: c.name.clone(),
            ty: PinType::of(TypeDesc::Object(c.class.clone())),
            default_value: None,
        });
        let declared: Vec<(VariableDecl, bool)> = components
            .map(|c| (c, true))
            .chain(unit.variables.iter().cloned().map(|v| (v, false)))
            .collect();

        for (decl, is_component) in declared {
            let clashes_callable = callables.contains(&decl.name);
            let mut name = decl.name.clone();
            if clashes_callable || schema.members.contains_key(&name) {
                let mut n = 1;
                while callables.contains(&name) || schema.members.contains_key(&name) {
                    name = format!("{}_{n}", decl.name);
                    n += 1;
                }
                issues.push((
                    unit.name.clone(),
                    Issue::NameAutoRenamed {
                        from: decl.name.clone(),
                        to: name.clone(),
                    },
                ));
                if clashes_callable {
                    schema.renamed.insert(decl.name.clone(), name.clone());
                }
            }
            schema.members.insert(
                name.clone(),
                MemberDecl {
                    name,
                    ty: decl.ty,
                    is_component,
                    default_value: decl.default_value,
                },
            );
        }

        (schema, issues)
    }

    /// Resolves an authored member reference, following renames.
    pub fn member(&self, name: &str) -> Option<&MemberDecl> {
        self.members
            .get(name)
            .or_else(|| self.renamed.get(name).and_then(|n| self.members.get(n)))
    }

    pub fn component(&self, name: &str) -> Option<&MemberDecl> {
        self.members.get(name).filter(|m| m.is_component)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphscript_core::{ComponentDecl, Node};

    fn unit_with_function(name: &str) -> CompilationUnit {
        let mut unit = CompilationUnit::new("Door");
        let mut g = Graph::new(name);
        g.add_node(Node::entry(name));
        unit.function_graphs.push(g);
        unit
    }

    #[test]
    fn duplicate_functions_are_reported_and_skipped() {
        let mut unit = unit_with_function("Open");
        let mut dup = Graph::new("Open (copy)");
        dup.add_node(Node::entry("Open"));
        unit.function_graphs.push(dup);

        let (schema, issues) = ClassSchema::build(&unit);
        assert_eq!(schema.functions.len(), 1);
        assert_eq!(schema.functions["Open"], 0);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].0, "Open (copy)");
        assert!(matches!(issues[0].1, Issue::DuplicateFunction { .. }));
    }

    #[test]
    fn member_clashing_with_function_is_renamed() {
        let mut unit = unit_with_function("Open");
        unit.variables.push(VariableDecl {
            name: "Open".into(),
            ty: PinType::of(TypeDesc::Bool),
            default_value: None,
        });
        let (schema, issues) = ClassSchema::build(&unit);
        assert!(schema.members.contains_key("Open_1"));
        assert_eq!(schema.member("Open").unwrap().name, "Open_1");
        assert!(matches!(
            &issues[0].1,
            Issue::NameAutoRenamed { from, to } if from == "Open" && to == "Open_1"
        ));
    }

    #[test]
    fn duplicate_member_resolves_to_first() {
        let mut unit = CompilationUnit::new("Door");
        unit.components.push(ComponentDecl {
            name: "Mesh".into(),
            class: "StaticMesh".into(),
        });
        unit.variables.push(VariableDecl {
            name: "Mesh".into(),
            ty: PinType::of(TypeDesc::Int),
            default_value: None,
        });
        let (schema, issues) = ClassSchema::build(&unit);
        assert_eq!(issues.len(), 1);
        assert!(schema.member("Mesh").unwrap().is_component);
        assert!(schema.component("Mesh").is_some());
        assert_eq!(schema.member("Mesh_1").unwrap().ty, PinType::of(TypeDesc::Int));
        assert!(schema.renamed.is_empty());
    }

    #[test]
    fn event_graph_function_is_named_after_class() {
        let (schema, _) = ClassSchema::build(&CompilationUnit::new("Door"));
        assert_eq!(schema.event_graph_function, "ExecuteEventGraph_Door");
    }
}
