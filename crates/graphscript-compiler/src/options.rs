//! Options controlling one compilation.

use serde::{Deserialize, Serialize};

use crate::error::CompileError;

/// How much of the pipeline runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CompileMode {
    /// Stop once the class layout and function signatures exist.
    SkeletonOnly,
    /// Compile every body, consolidating event pages into one graph.
    #[default]
    Full,
}

/// Options controlling the compilation pipeline.
///
/// Every field has a default, so a JSON options file only needs to name the
/// fields it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileOptions {
    pub mode: CompileMode,

    /// Insert tunnel boundary markers around inlined macro bodies and emit a
    /// debug site before every impure node.
    pub debug_instrumentation: bool,

    /// Emit a comment statement naming each node before its statements.
    pub emit_node_comments: bool,

    /// Keep comment nodes through pruning and attach the final working graph
    /// of each function to the result.
    pub save_intermediate_products: bool,

    /// Treat impure nodes without a control input as roots.
    pub include_potential_roots: bool,

    /// Store event graph locals at class scope so they survive between
    /// event invocations.
    pub persistent_event_graph_frame: bool,

    /// Deepest allowed chain of nested macro instances.
    pub max_expansion_depth: u32,

    /// Largest working graph expansion may produce.
    pub max_expanded_nodes: usize,
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions {
            mode: CompileMode::Full,
            debug_instrumentation: false,
            emit_node_comments: false,
            save_intermediate_products: false,
            include_potential_roots: false,
            persistent_event_graph_frame: true,
            max_expansion_depth: 32,
            max_expanded_nodes: 50_000,
        }
    }
}

impl CompileOptions {
    pub fn skeleton() -> Self {
        CompileOptions {
            mode: CompileMode::SkeletonOnly,
            ..CompileOptions::default()
        }
    }

    pub fn from_json(json: &str) -> Result<Self, CompileError> {
        let options: CompileOptions = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<(), CompileError> {
        if self.max_expansion_depth == 0 {
            return Err(CompileError::Options(
                "max_expansion_depth must be at least 1".into(),
            ));
        }
        if self.max_expanded_nodes == 0 {
            return Err(CompileError::Options(
                "max_expanded_nodes must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
