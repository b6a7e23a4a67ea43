//! Function calls and calls into the consolidated event graph.

use graphscript_core::{Node, NodeId, NodeKind};

use crate::context::FunctionContext;
use crate::handler::NodeHandler;
use crate::statement::Statement;

/// Calls a function with its data inputs as arguments, storing results in
/// locals bound to its data outputs. Pure calls have no control ports and
/// end after the call.
pub struct CallFunctionHandler;

impl NodeHandler for CallFunctionHandler {
    fn emit_statements(&self, ctx: &mut FunctionContext<'_>, id: NodeId, node: &Node) {
        let NodeKind::CallFunction { function } = &node.kind else {
            return;
        };
        let args = ctx.data_inputs(id);
        let results = ctx.data_outputs(id);
        ctx.emit(Statement::CallFunction {
            function: function.clone(),
            args,
            results,
        });
        if node.has_control_ports() {
            ctx.emit_follow(id, "then");
        }
    }
}

/// Enters the class's event graph at the entry of one event. The entry
/// offset is filled in once the event graph body is linked.
pub struct CallEventGraphHandler;

impl NodeHandler for CallEventGraphHandler {
    fn register_terms(&self, _ctx: &mut FunctionContext<'_>, _id: NodeId, _node: &Node) {}

    fn emit_statements(&self, ctx: &mut FunctionContext<'_>, id: NodeId, node: &Node) {
        let NodeKind::CallEventGraph { event } = &node.kind else {
            return;
        };
        ctx.emit(Statement::CallEventGraph {
            function: ctx.schema.event_graph_function.clone(),
            event: event.clone(),
            entry_offset: None,
        });
        ctx.emit_follow(id, "then");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::testing::{context, register_all};
    use crate::options::CompileOptions;
    use crate::schema::ClassSchema;
    use crate::term::TermKind;
    use graphscript_core::{Graph, PinType, Port, PortRef, TypeDesc};

    fn int() -> PinType {
        PinType::of(TypeDesc::Int)
    }

    #[test]
    fn call_passes_producer_terms() {
        let mut graph = Graph::new("F");
        let sum = graph.add_node(
            Node::pure_call("Add")
                .with_port(Port::data_in("a", int()).with_default("1"))
                .with_port(Port::data_in("b", int()).with_default("2"))
                .with_port(Port::data_out("result", int())),
        );
        let print = graph.add_node(Node::call("Print").with_port(Port::data_in("value", int())));
        graph
            .connect(PortRef::new(sum, 2), PortRef::new(print, 2))
            .unwrap();

        let options = CompileOptions::default();
        let schema = ClassSchema::default();
        let mut ctx = context(graph, &options, &schema);
        register_all(&mut ctx);

        let result = ctx.output_term(sum, 2).unwrap();
        assert_eq!(ctx.terms.get(result).unwrap().kind, TermKind::Local);
        assert_eq!(ctx.terms.get(result).unwrap().name, "Add_result");

        let pure = ctx.emit_node(sum);
        assert_eq!(pure.len(), 1, "pure calls do not jump");

        let statements = ctx.emit_node(print);
        assert_eq!(
            statements[0],
            Statement::CallFunction {
                function: "Print".into(),
                args: vec![result],
                results: vec![],
            }
        );
        assert_eq!(statements[1], Statement::EndOfThread);
    }

    #[test]
    fn call_event_graph_names_the_class_function() {
        let mut graph = Graph::new("OnHit");
        let call = graph.add_node(Node::call_event_graph("OnHit"));
        let options = CompileOptions::default();
        let schema = ClassSchema {
            event_graph_function: "ExecuteEventGraph_Door".into(),
            ..ClassSchema::default()
        };
        let mut ctx = context(graph, &options, &schema);
        let statements = ctx.emit_node(call);
        assert_eq!(
            statements[0],
            Statement::CallEventGraph {
                function: "ExecuteEventGraph_Door".into(),
                event: "OnHit".into(),
                entry_offset: None,
            }
        );
    }
}
