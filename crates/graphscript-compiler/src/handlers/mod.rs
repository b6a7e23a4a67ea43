//! Built-in node handlers.
//!
//! One handler type per node kind the compiler understands out of the box.
//! Macro instances, composites and tunnels have no handler: expansion
//! removes them before any handler runs, and a leftover one is reported as
//! an unknown node kind.

mod call;
mod entry;
mod flow;
mod literal;
mod variable;

use graphscript_core::KindTag;

use crate::handler::RegistryBuilder;

pub use call::{CallEventGraphHandler, CallFunctionHandler};
pub use entry::{EventHandler, FunctionEntryHandler, FunctionResultHandler};
pub use flow::{BranchHandler, SequenceHandler, TunnelBoundaryHandler};
pub use literal::{CommentHandler, EnumLiteralHandler, LiteralHandler, MakeArrayHandler};
pub use variable::{PersistentFrameAssignHandler, VariableGetHandler, VariableSetHandler};

pub(crate) fn register_standard(builder: &mut RegistryBuilder) {
    builder
        .register(KindTag::FunctionEntry, FunctionEntryHandler)
        .register(KindTag::FunctionResult, FunctionResultHandler)
        .register(KindTag::Event, EventHandler)
        .register(KindTag::CallFunction, CallFunctionHandler)
        .register(KindTag::CallEventGraph, CallEventGraphHandler)
        .register(KindTag::VariableGet, VariableGetHandler)
        .register(KindTag::VariableSet, VariableSetHandler)
        .register(KindTag::PersistentFrameAssign, PersistentFrameAssignHandler)
        .register(KindTag::Branch, BranchHandler)
        .register(KindTag::Sequence, SequenceHandler)
        .register(KindTag::TunnelBoundary, TunnelBoundaryHandler)
        .register(KindTag::Literal, LiteralHandler)
        .register(KindTag::MakeArray, MakeArrayHandler)
        .register(KindTag::EnumLiteral, EnumLiteralHandler)
        .register(KindTag::Comment, CommentHandler);
}

#[cfg(test)]
pub(crate) mod testing {
    //! Shared fixtures for handler tests.

    use graphscript_core::Graph;

    use crate::context::{FunctionContext, FunctionRole};
    use crate::handler::HandlerRegistry;
    use crate::options::CompileOptions;
    use crate::provenance::Provenance;
    use crate::schema::ClassSchema;

    pub fn context<'a>(
        graph: Graph,
        options: &'a CompileOptions,
        schema: &'a ClassSchema,
    ) -> FunctionContext<'a> {
        FunctionContext::new(
            graph.name().to_string(),
            FunctionRole::Function,
            graph,
            Provenance::new(),
            HandlerRegistry::standard(),
            options,
            schema,
        )
    }

    /// Registers terms for every node in authoring order.
    pub fn register_all(ctx: &mut FunctionContext<'_>) {
        for id in ctx.graph.node_ids() {
            ctx.register_node_terms(id);
        }
    }
}
