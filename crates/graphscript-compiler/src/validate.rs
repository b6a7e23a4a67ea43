//! Structural and type validation of a working graph.
//!
//! Runs after expansion and pruning, so every check sees exactly the nodes
//! that will be scheduled. All problems are reported; validation never
//! stops at the first one.

use graphscript_core::{NodeKind, PortDirection, PortRef, PortRole, TypeDesc};

use crate::context::{FunctionContext, FunctionRole};
use crate::diagnostics::Issue;

/// Checks that the graph has exactly one function entry. Event graphs may
/// hold any number of events but still need their dispatch entry.
pub fn validate_entries(ctx: &mut FunctionContext<'_>) {
    let entries = ctx
        .graph
        .find_nodes(|n| matches!(n.kind, NodeKind::FunctionEntry(_)));
    match entries.len() {
        0 => ctx.report(
            Issue::MissingEntry {
                graph: ctx.source_graph.clone(),
            },
            None,
            None,
        ),
        1 => {}
        count => {
            let graph = ctx.source_graph.clone();
            ctx.report(Issue::MultipleEntries { graph, count }, Some(entries[1]), None);
        }
    }
    if ctx.role == FunctionRole::EventGraph {
        return;
    }
    let events = ctx.graph.find_nodes(|n| matches!(n.kind, NodeKind::Event(_)));
    if let Some(event) = events.first() {
        let count = entries.len() + events.len();
        let graph = ctx.source_graph.clone();
        ctx.report(Issue::MultipleEntries { graph, count }, Some(*event), None);
    }
}

/// Validates every node and link of the working graph.
pub fn validate_graph(ctx: &mut FunctionContext<'_>) {
    for id in ctx.graph.node_ids() {
        let Some(node) = ctx.graph.node(id).cloned() else {
            continue;
        };
        if ctx.registry.handler_for(&node).is_none() {
            ctx.report(
                Issue::UnknownNodeKind {
                    node: node.title.clone(),
                    kind: node.tag().to_string(),
                },
                Some(id),
                None,
            );
        }
        if node.deprecated {
            ctx.report(
                Issue::DeprecatedNode {
                    node: node.title.clone(),
                },
                Some(id),
                None,
            );
        }

        for (index, port) in node.ports.iter().enumerate() {
            let index = index as u16;
            let links = ctx.graph.links(PortRef::new(id, index));
            match (port.role, port.direction) {
                (PortRole::Control, PortDirection::Out) if links.len() > 1 => ctx.report(
                    Issue::ControlFanOut {
                        node: node.title.clone(),
                        port: port.name.clone(),
                        count: links.len(),
                    },
                    Some(id),
                    Some(index),
                ),
                (PortRole::Data, PortDirection::In) => {
                    if links.len() > 1 {
                        ctx.report(
                            Issue::DataFanIn {
                                node: node.title.clone(),
                                port: port.name.clone(),
                                count: links.len(),
                            },
                            Some(id),
                            Some(index),
                        );
                    }
                    if port.ty.is_wildcard() {
                        ctx.report(
                            Issue::UnresolvedWildcard {
                                node: node.title.clone(),
                                port: port.name.clone(),
                            },
                            Some(id),
                            Some(index),
                        );
                        continue;
                    }
                    let Some(source) = links.first() else {
                        continue;
                    };
                    let (Some(source_node), Some(source_port)) =
                        (ctx.graph.node(source.node), ctx.graph.port(*source))
                    else {
                        continue;
                    };
                    let issue = if source_port.ty.is_interface_to_object(&port.ty) {
                        Some(Issue::InterfaceToObject {
                            node: node.title.clone(),
                            port: port.name.clone(),
                            interface: type_name(&source_port.ty.base),
                            class: type_name(&port.ty.base),
                        })
                    } else if !source_port.ty.is_compatible_with(&port.ty) {
                        Some(Issue::TypeMismatch {
                            from_node: source_node.title.clone(),
                            from_port: source_port.name.clone(),
                            to_node: node.title.clone(),
                            to_port: port.name.clone(),
                            expected: port.ty.to_string(),
                            actual: source_port.ty.to_string(),
                        })
                    } else {
                        None
                    };
                    if let Some(issue) = issue {
                        ctx.report(issue, Some(id), Some(index));
                    }
                }
                (PortRole::Data, PortDirection::Out)
                    if port.ty.is_wildcard() && !links.is_empty() =>
                {
                    ctx.report(
                        Issue::UnresolvedWildcard {
                            node: node.title.clone(),
                            port: port.name.clone(),
                        },
                        Some(id),
                        Some(index),
                    )
                }
                _ => {}
            }
        }
    }
}

fn type_name(ty: &TypeDesc) -> String {
    match ty {
        TypeDesc::Object(name)
        | TypeDesc::Interface(name)
        | TypeDesc::Struct(name)
        | TypeDesc::Enum(name) => name.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::DiagnosticKind;
    use crate::handlers::testing::context;
    use crate::options::CompileOptions;
    use crate::schema::ClassSchema;
    use graphscript_core::{Graph, Node, NodeKind, PinType, Port};
    use indexmap::IndexMap;

    fn issues(graph: Graph) -> Vec<Issue> {
        let options = CompileOptions::default();
        let schema = ClassSchema::default();
        let mut ctx = context(graph, &options, &schema);
        validate_entries(&mut ctx);
        validate_graph(&mut ctx);
        ctx.take_diagnostics().into_iter().map(|d| d.issue).collect()
    }

    #[test]
    fn clean_graph_has_no_issues() {
        let mut g = Graph::new("F");
        let entry = g.add_node(Node::entry("F"));
        let ret = g.add_node(Node::result());
        g.connect(PortRef::new(entry, 0), PortRef::new(ret, 0)).unwrap();
        assert!(issues(g).is_empty());
    }

    #[test]
    fn missing_and_multiple_entries() {
        let g = Graph::new("Empty");
        assert!(matches!(issues(g)[0], Issue::MissingEntry { .. }));

        let mut g = Graph::new("Two");
        g.add_node(Node::entry("Two"));
        g.add_node(Node::entry("Two"));
        assert!(matches!(issues(g)[0], Issue::MultipleEntries { count: 2, .. }));
    }

    #[test]
    fn control_fan_out_is_an_error() {
        let mut g = Graph::new("F");
        let entry = g.add_node(Node::entry("F"));
        let a = g.add_node(Node::call("A"));
        let b = g.add_node(Node::call("B"));
        g.connect(PortRef::new(entry, 0), PortRef::new(a, 0)).unwrap();
        g.connect(PortRef::new(entry, 0), PortRef::new(b, 0)).unwrap();
        let found = issues(g);
        assert_eq!(found.len(), 1);
        assert!(matches!(found[0], Issue::ControlFanOut { count: 2, .. }));
        assert_eq!(found[0].kind(), DiagnosticKind::Structural);
    }

    #[test]
    fn type_checks_on_links() {
        let mut g = Graph::new("F");
        g.add_node(Node::entry("F"));
        let text = g.add_node(Node::literal(PinType::of(TypeDesc::String), "hi"));
        let iface = g.add_node(
            Node::pure_call("GetTarget")
                .with_port(Port::data_out(
                    "target",
                    PinType::of(TypeDesc::Interface("Usable".into())),
                )),
        );
        let call = g.add_node(
            Node::call("Use")
                .with_port(Port::data_in("count", PinType::of(TypeDesc::Int)))
                .with_port(Port::data_in("actor", PinType::of(TypeDesc::Object("Actor".into())))),
        );
        g.connect(PortRef::new(text, 0), PortRef::new(call, 2)).unwrap();
        g.connect(PortRef::new(iface, 0), PortRef::new(call, 3)).unwrap();

        let found = issues(g);
        assert_eq!(found.len(), 2);
        assert!(matches!(&found[0], Issue::TypeMismatch { expected, actual, .. }
            if expected == "int" && actual == "string"));
        assert!(matches!(&found[1], Issue::InterfaceToObject { interface, class, .. }
            if interface == "Usable" && class == "Actor"));
        assert_eq!(found[1].kind(), DiagnosticKind::Type);
    }

    #[test]
    fn wildcards_and_unknown_kinds() {
        let mut g = Graph::new("F");
        g.add_node(Node::entry("F"));
        g.add_node(Node::call("Print").with_port(Port::data_in("value", PinType::wildcard())));
        let mut old = Node::new(
            NodeKind::Custom {
                name: "Legacy".into(),
                properties: IndexMap::new(),
            },
            "Legacy",
        );
        old.deprecated = true;
        g.add_node(old);

        let found = issues(g);
        assert!(matches!(found[0], Issue::UnresolvedWildcard { .. }));
        assert!(matches!(found[1], Issue::UnknownNodeKind { .. }));
        assert!(matches!(found[2], Issue::DeprecatedNode { .. }));
    }
}
