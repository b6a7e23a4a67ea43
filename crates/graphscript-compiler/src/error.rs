//! Session-level error types.
//!
//! [`CompileError`] covers failures of the compilation call itself. Problems
//! in the authored graphs never surface here; they are accumulated as
//! [`Diagnostic`](crate::diagnostics::Diagnostic)s on the compiled class.

use graphscript_core::CoreError;
use thiserror::Error;

use crate::compiler::CompileState;

/// Errors that stop a compilation call outright.
#[derive(Debug, Error)]
pub enum CompileError {
    /// The cancellation token fired before entering `phase`.
    #[error("compilation cancelled before {phase:?}")]
    Cancelled { phase: CompileState },

    /// A state transition skipped or repeated a state.
    #[error("invalid state transition: expected {expected:?}, got {found:?}")]
    StateOrder {
        expected: CompileState,
        found: CompileState,
    },

    /// Options failed validation.
    #[error("invalid options: {0}")]
    Options(String),

    /// A batch worker thread panicked.
    #[error("worker thread panicked while compiling '{unit}'")]
    WorkerPanicked { unit: String },

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
