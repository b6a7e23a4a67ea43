//! Variable access and persistent frame stores.

use graphscript_core::{Node, NodeId, NodeKind, PortDirection, PortRef, PortRole};

use crate::context::FunctionContext;
use crate::diagnostics::Issue;
use crate::handler::NodeHandler;
use crate::statement::Statement;
use crate::term::TermKind;

/// Binds its output directly to the variable's term; emits nothing.
pub struct VariableGetHandler;

impl NodeHandler for VariableGetHandler {
    fn register_terms(&self, ctx: &mut FunctionContext<'_>, id: NodeId, node: &Node) {
        let NodeKind::VariableGet { variable } = &node.kind else {
            return;
        };
        let Some(term) = ctx.resolve_variable(variable, id) else {
            ctx.report(
                Issue::UnknownVariable {
                    node: node.title.clone(),
                    variable: variable.clone(),
                },
                Some(id),
                None,
            );
            return;
        };
        for (index, _) in node.ports_where(PortRole::Data, PortDirection::Out) {
            ctx.terms.bind(PortRef::new(id, index), term);
        }
    }

    fn emit_statements(&self, _ctx: &mut FunctionContext<'_>, _id: NodeId, _node: &Node) {}
}

pub struct VariableSetHandler;

impl NodeHandler for VariableSetHandler {
    fn register_terms(&self, ctx: &mut FunctionContext<'_>, id: NodeId, node: &Node) {
        let NodeKind::VariableSet { variable } = &node.kind else {
            return;
        };
        let Some(term) = ctx.resolve_variable(variable, id) else {
            ctx.report(
                Issue::UnknownVariable {
                    node: node.title.clone(),
                    variable: variable.clone(),
                },
                Some(id),
                None,
            );
            return;
        };
        if let Some(output) = node.find_port("output", PortDirection::Out) {
            ctx.terms.bind(PortRef::new(id, output), term);
        }
    }

    fn emit_statements(&self, ctx: &mut FunctionContext<'_>, id: NodeId, node: &Node) {
        let NodeKind::VariableSet { variable } = &node.kind else {
            return;
        };
        if let (Some(dest), Some(value)) = (
            ctx.resolve_variable(variable, id),
            node.find_port("value", PortDirection::In),
        ) {
            let src = ctx.input_term(id, value);
            ctx.emit(Statement::Assign { dest, src });
        }
        ctx.emit_follow(id, "then");
    }
}

/// Stores each data input in the persistent frame slot named after the
/// input port.
pub struct PersistentFrameAssignHandler;

impl NodeHandler for PersistentFrameAssignHandler {
    fn register_terms(&self, _ctx: &mut FunctionContext<'_>, _id: NodeId, _node: &Node) {}

    fn emit_statements(&self, ctx: &mut FunctionContext<'_>, id: NodeId, node: &Node) {
        for (index, port) in node.ports_where(PortRole::Data, PortDirection::In) {
            let dest = ctx.class_slot(TermKind::PersistentFrame, &port.name, port.ty.clone(), id);
            let src = ctx.input_term(id, index);
            ctx.emit(Statement::Assign { dest, src });
        }
        ctx.emit_follow(id, "then");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::testing::{context, register_all};
    use crate::options::CompileOptions;
    use crate::schema::{ClassSchema, MemberDecl};
    use graphscript_core::{Graph, PinType, Port, TypeDesc};

    fn float() -> PinType {
        PinType::of(TypeDesc::Float)
    }

    fn schema_with_health() -> ClassSchema {
        let mut schema = ClassSchema::default();
        schema.members.insert(
            "Health".into(),
            MemberDecl {
                name: "Health".into(),
                ty: float(),
                is_component: false,
                default_value: Some("100".into()),
            },
        );
        schema
    }

    #[test]
    fn get_and_set_share_the_member_term() {
        let mut graph = Graph::new("Heal");
        let get = graph.add_node(Node::variable_get("Health", float()));
        let set = graph.add_node(Node::variable_set("Health", float()));
        graph.connect(PortRef::new(get, 0), PortRef::new(set, 2)).unwrap();

        let options = CompileOptions::default();
        let schema = schema_with_health();
        let mut ctx = context(graph, &options, &schema);
        register_all(&mut ctx);

        let member = ctx.output_term(get, 0).unwrap();
        assert_eq!(ctx.terms.get(member).unwrap().kind, TermKind::Member);
        assert_eq!(ctx.output_term(set, 3), Some(member));
        assert!(ctx.emit_node(get).is_empty());
        assert_eq!(
            ctx.emit_node(set)[0],
            Statement::Assign {
                dest: member,
                src: member
            }
        );
    }

    #[test]
    fn unknown_variable_is_reported() {
        let mut graph = Graph::new("F");
        graph.add_node(Node::variable_get("Missing", float()));
        let options = CompileOptions::default();
        let schema = ClassSchema::default();
        let mut ctx = context(graph, &options, &schema);
        register_all(&mut ctx);
        assert!(ctx.has_errors());
        assert!(matches!(
            ctx.diagnostics()[0].issue,
            Issue::UnknownVariable { .. }
        ));
    }

    #[test]
    fn frame_assign_targets_named_slots() {
        let mut graph = Graph::new("OnHit");
        let assign = graph.add_node(
            Node::persistent_frame_assign()
                .with_port(Port::data_in("OnHit_damage", float()).with_default("3")),
        );
        let options = CompileOptions::default();
        let schema = ClassSchema::default();
        let mut ctx = context(graph, &options, &schema);
        let statements = ctx.emit_node(assign);
        let slot = ctx
            .terms
            .find(TermKind::PersistentFrame, "OnHit_damage")
            .unwrap();
        assert!(matches!(statements[0], Statement::Assign { dest, .. } if dest == slot));
    }
}
