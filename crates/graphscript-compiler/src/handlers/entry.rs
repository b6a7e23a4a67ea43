//! Signature-defining nodes: function entries, results and events.

use graphscript_core::{Node, NodeId, NodeKind, PortDirection, PortRef, PortRole};

use crate::context::FunctionContext;
use crate::handler::NodeHandler;
use crate::statement::Statement;
use crate::term::{persistent_slot_name, TermKind};

/// Data outputs of the entry become the function's input parameters, in
/// port order. Declared locals are registered with their initial values.
pub struct FunctionEntryHandler;

impl NodeHandler for FunctionEntryHandler {
    fn register_terms(&self, ctx: &mut FunctionContext<'_>, id: NodeId, node: &Node) {
        for (index, port) in node.ports_where(PortRole::Data, PortDirection::Out) {
            let term = ctx
                .terms
                .add(TermKind::Parameter, &port.name, port.ty.clone());
            ctx.terms.bind(PortRef::new(id, index), term);
        }
        if let NodeKind::FunctionEntry(spec) = &node.kind {
            for local in &spec.locals {
                ctx.terms
                    .add_local(&local.name, local.ty.clone(), local.default_value.clone());
            }
        }
    }

    fn emit_statements(&self, ctx: &mut FunctionContext<'_>, id: NodeId, node: &Node) {
        let NodeKind::FunctionEntry(spec) = &node.kind else {
            return;
        };
        for local in &spec.locals {
            let (Some(term), Some(value)) = (
                ctx.terms.find(TermKind::Local, &local.name),
                local.default_value.as_ref(),
            ) else {
                continue;
            };
            let literal = ctx.terms.literal(local.ty.clone(), value.clone());
            ctx.emit(Statement::Assign {
                dest: term,
                src: literal,
            });
        }

        if spec.computed_dispatch {
            let index = node
                .ports_where(PortRole::Data, PortDirection::Out)
                .find_map(|(i, _)| ctx.output_term(id, i));
            if let Some(index) = index {
                ctx.emit(Statement::ComputedGoto { index });
                return;
            }
        }
        ctx.emit_follow(id, "then");
    }

    fn requires_terms_before_scheduling(&self) -> bool {
        true
    }

    fn is_root(&self, _node: &Node) -> bool {
        true
    }
}

/// Data inputs of a result node become output parameters. Several result
/// nodes of one function share the same output terms by name.
pub struct FunctionResultHandler;

impl NodeHandler for FunctionResultHandler {
    fn register_terms(&self, ctx: &mut FunctionContext<'_>, id: NodeId, node: &Node) {
        for (index, port) in node.ports_where(PortRole::Data, PortDirection::In) {
            let term = match ctx.terms.find(TermKind::Output, &port.name) {
                Some(term) => term,
                None => ctx.terms.add(TermKind::Output, &port.name, port.ty.clone()),
            };
            ctx.terms.bind(PortRef::new(id, index), term);
        }
    }

    fn emit_statements(&self, ctx: &mut FunctionContext<'_>, id: NodeId, node: &Node) {
        let inputs: Vec<u16> = node
            .ports_where(PortRole::Data, PortDirection::In)
            .map(|(i, _)| i)
            .collect();
        for index in inputs {
            let Some(dest) = ctx.output_term(id, index) else {
                continue;
            };
            let src = ctx.input_term(id, index);
            ctx.emit(Statement::Assign { dest, src });
        }
        ctx.emit(Statement::Return);
    }

    fn requires_terms_before_scheduling(&self) -> bool {
        true
    }
}

/// Event parameters live in persistent frame slots so the shared event
/// graph can read them after the stub has stored them.
pub struct EventHandler;

impl NodeHandler for EventHandler {
    fn register_terms(&self, ctx: &mut FunctionContext<'_>, id: NodeId, node: &Node) {
        let NodeKind::Event(spec) = &node.kind else {
            return;
        };
        for (index, port) in node.ports_where(PortRole::Data, PortDirection::Out) {
            let term = ctx.class_slot(
                TermKind::PersistentFrame,
                &persistent_slot_name(&spec.name, &port.name),
                port.ty.clone(),
                id,
            );
            ctx.terms.bind(PortRef::new(id, index), term);
        }
    }

    fn emit_statements(&self, ctx: &mut FunctionContext<'_>, id: NodeId, _node: &Node) {
        ctx.emit_follow(id, "then");
    }

    fn requires_terms_before_scheduling(&self) -> bool {
        true
    }

    fn is_root(&self, _node: &Node) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::testing::{context, register_all};
    use crate::options::CompileOptions;
    use crate::schema::ClassSchema;
    use crate::statement::JumpTarget;
    use graphscript_core::{Graph, LocalDecl, PinType, Port, TypeDesc};

    fn float() -> PinType {
        PinType::of(TypeDesc::Float)
    }

    #[test]
    fn entry_outputs_become_parameters() {
        let mut graph = Graph::new("Tick");
        let mut entry = Node::entry("Tick").with_port(Port::data_out("delta", float()));
        if let NodeKind::FunctionEntry(spec) = &mut entry.kind {
            spec.locals.push(LocalDecl {
                name: "count".into(),
                ty: PinType::of(TypeDesc::Int),
                default_value: Some("1".into()),
            });
        }
        let entry = graph.add_node(entry);
        let ret = graph.add_node(Node::result());
        graph
            .connect(PortRef::new(entry, 0), PortRef::new(ret, 0))
            .unwrap();

        let options = CompileOptions::default();
        let schema = ClassSchema::default();
        let mut ctx = context(graph, &options, &schema);
        register_all(&mut ctx);

        let params: Vec<&str> = ctx
            .terms
            .of_kind(TermKind::Parameter)
            .map(|t| t.declared_name.as_str())
            .collect();
        assert_eq!(params, vec!["delta"]);

        let statements = ctx.emit_node(entry);
        assert!(matches!(statements[0], Statement::Assign { .. }));
        assert_eq!(statements[1], Statement::Goto(JumpTarget::Node(ret)));
    }

    #[test]
    fn result_assigns_outputs_then_returns() {
        let mut graph = Graph::new("Get");
        let ret = graph.add_node(
            Node::result().with_port(Port::data_in("value", float()).with_default("2.5")),
        );
        let options = CompileOptions::default();
        let schema = ClassSchema::default();
        let mut ctx = context(graph, &options, &schema);
        register_all(&mut ctx);

        let out = ctx.terms.find(TermKind::Output, "value").unwrap();
        let statements = ctx.emit_node(ret);
        assert_eq!(statements.len(), 2);
        assert!(matches!(statements[0], Statement::Assign { dest, .. } if dest == out));
        assert_eq!(statements[1], Statement::Return);
    }

    #[test]
    fn event_parameters_use_persistent_slots() {
        let mut graph = Graph::new("EventGraph");
        let event =
            graph.add_node(Node::event("OnHit").with_port(Port::data_out("damage", float())));
        let options = CompileOptions::default();
        let schema = ClassSchema::default();
        let mut ctx = context(graph, &options, &schema);
        register_all(&mut ctx);

        let slot = ctx.output_term(event, 1).unwrap();
        let term = ctx.terms.get(slot).unwrap();
        assert_eq!(term.kind, TermKind::PersistentFrame);
        assert_eq!(term.name, "OnHit_damage");
        assert_eq!(ctx.emit_node(event), vec![Statement::EndOfThread]);
    }
}
