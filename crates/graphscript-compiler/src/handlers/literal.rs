//! Value producers: literals, array construction, enum literals and
//! comments.

use graphscript_core::{Node, NodeId, PortDirection, PortRef, PortRole};

use crate::context::FunctionContext;
use crate::handler::NodeHandler;
use crate::options::CompileOptions;
use crate::statement::Statement;

/// Binds its output to a literal term; emits nothing.
pub struct LiteralHandler;

impl NodeHandler for LiteralHandler {
    fn register_terms(&self, ctx: &mut FunctionContext<'_>, id: NodeId, node: &Node) {
        for (index, port) in node.ports_where(PortRole::Data, PortDirection::Out) {
            let value = port
                .default_value
                .clone()
                .unwrap_or_else(|| node.title.clone());
            let term = ctx.terms.literal(port.ty.clone(), value);
            ctx.terms.bind(PortRef::new(id, index), term);
        }
    }

    fn emit_statements(&self, _ctx: &mut FunctionContext<'_>, _id: NodeId, _node: &Node) {}
}

pub struct MakeArrayHandler;

impl NodeHandler for MakeArrayHandler {
    fn emit_statements(&self, ctx: &mut FunctionContext<'_>, id: NodeId, _node: &Node) {
        let elements = ctx.data_inputs(id);
        if let Some(dest) = ctx.data_outputs(id).first().copied() {
            ctx.emit(Statement::CreateArray { dest, elements });
        }
    }
}

/// Widens a name back into an enum value.
pub struct EnumLiteralHandler;

impl NodeHandler for EnumLiteralHandler {
    fn emit_statements(&self, ctx: &mut FunctionContext<'_>, id: NodeId, node: &Node) {
        let (Some(input), Some(dest)) = (
            node.find_port("value", PortDirection::In),
            ctx.data_outputs(id).first().copied(),
        ) else {
            return;
        };
        let src = ctx.input_term(id, input);
        ctx.emit(Statement::Assign { dest, src });
    }
}

/// Comments never reach the body; they survive pruning only when the
/// intermediate graph is being kept for inspection.
pub struct CommentHandler;

impl NodeHandler for CommentHandler {
    fn register_terms(&self, _ctx: &mut FunctionContext<'_>, _id: NodeId, _node: &Node) {}

    fn emit_statements(&self, _ctx: &mut FunctionContext<'_>, _id: NodeId, _node: &Node) {}

    fn is_pure(&self, _node: &Node) -> bool {
        true
    }

    fn force_keep(&self, _node: &Node, options: &CompileOptions) -> bool {
        options.save_intermediate_products
    }
}
