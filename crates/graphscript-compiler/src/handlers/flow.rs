//! Control flow nodes.

use graphscript_core::{Node, NodeId, NodeKind, PinType, PortDirection, PortRole, TypeDesc};

use crate::context::FunctionContext;
use crate::handler::NodeHandler;
use crate::statement::{JumpTarget, Statement};

pub struct BranchHandler;

impl NodeHandler for BranchHandler {
    fn register_terms(&self, _ctx: &mut FunctionContext<'_>, _id: NodeId, _node: &Node) {}

    fn emit_statements(&self, ctx: &mut FunctionContext<'_>, id: NodeId, node: &Node) {
        let condition = match node.find_port("condition", PortDirection::In) {
            Some(index) => ctx.input_term(id, index),
            None => ctx.terms.literal(PinType::of(TypeDesc::Bool), "false"),
        };
        let on_false = ctx.follow(id, "false");
        ctx.emit(Statement::GotoIfNot {
            condition,
            target: on_false,
        });
        ctx.emit_follow(id, "true");
    }
}

/// Runs each linked output in turn: later outputs are pushed as pending
/// flows, then execution jumps to the first.
pub struct SequenceHandler;

impl NodeHandler for SequenceHandler {
    fn register_terms(&self, _ctx: &mut FunctionContext<'_>, _id: NodeId, _node: &Node) {}

    fn emit_statements(&self, ctx: &mut FunctionContext<'_>, id: NodeId, node: &Node) {
        let targets: Vec<JumpTarget> = node
            .ports_where(PortRole::Control, PortDirection::Out)
            .map(|(_, port)| ctx.follow(id, &port.name))
            .filter(|target| *target != JumpTarget::EndOfThread)
            .collect();
        let Some((first, rest)) = targets.split_first() else {
            ctx.emit(Statement::EndOfThread);
            return;
        };
        for target in rest.iter().rev() {
            ctx.emit(Statement::PushFlow(*target));
        }
        ctx.emit_jump(*first);
    }
}

/// Marks execution entering or leaving an inlined macro body, attributed to
/// the outermost authored call site.
pub struct TunnelBoundaryHandler;

impl NodeHandler for TunnelBoundaryHandler {
    fn register_terms(&self, _ctx: &mut FunctionContext<'_>, _id: NodeId, _node: &Node) {}

    fn emit_statements(&self, ctx: &mut FunctionContext<'_>, id: NodeId, node: &Node) {
        let NodeKind::TunnelBoundary { site } = node.kind else {
            return;
        };
        let call_site = ctx.provenance.outermost_call_site(id).cloned();
        ctx.emit(Statement::InstrumentationBoundary { site, call_site });
        ctx.emit_follow(id, "then");
    }
}
