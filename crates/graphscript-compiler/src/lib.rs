//! Compiler from authored graphs to scheduled, typed statement lists.
//!
//! The pipeline for one function is: clone the authored graph, expand
//! macro instances, prune dead nodes, validate, register terms, schedule,
//! emit statements through the per-kind [`NodeHandler`]s, and link. The
//! [`Compiler`] drives that pipeline for every function and event of a
//! [`CompilationUnit`](graphscript_core::CompilationUnit).
//!
//! # Modules
//!
//! - [`compiler`] -- the orchestrator and its state machine
//! - [`handler`] / [`handlers`] -- node handler capability, registry and
//!   built-in handlers
//! - [`prune`], [`expand`], [`schedule`] -- graph passes
//! - [`assemble`], [`layout`] -- signatures, symbols, class layout
//! - [`diagnostics`] -- issues reported against authored content
//! - [`listing`] -- backend trait and a text listing backend

pub mod assemble;
pub mod batch;
pub mod compiler;
pub mod context;
pub mod diagnostics;
pub mod error;
pub mod event_graph;
pub mod expand;
pub mod handler;
pub mod handlers;
pub mod hash;
pub mod layout;
pub mod listing;
pub mod options;
pub mod provenance;
pub mod prune;
pub mod schedule;
pub mod schema;
pub mod statement;
pub mod term;
pub mod validate;

pub use batch::compile_batch;
pub use compiler::{
    compile_unit, CancellationToken, CompileState, CompiledClass, CompiledFunction, Compiler,
};
pub use context::{FunctionAbandoned, FunctionContext, FunctionRole};
pub use diagnostics::{Diagnostic, DiagnosticKind, Issue, MessageLog, Severity, SourceLocation};
pub use error::CompileError;
pub use handler::{HandlerRegistry, NodeHandler, RegistryBuilder};
pub use listing::{Backend, ListingBackend};
pub use options::{CompileMode, CompileOptions};
pub use statement::{Body, JumpTarget, Statement};
pub use term::{TermId, TermKind};
