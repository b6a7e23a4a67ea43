//! Compiling several independent units in parallel.
//!
//! Units share nothing but the compiler's read-only handler registry and
//! options, so each one is compiled on its own scoped worker thread.
//! Results come back in input order.

use std::thread;

use graphscript_core::CompilationUnit;
use tracing::debug;

use crate::compiler::{CompiledClass, Compiler};
use crate::error::CompileError;

/// Compiles every unit, running at most `available_parallelism` workers
/// at a time.
pub fn compile_batch(
    compiler: &Compiler<'_>,
    units: &[CompilationUnit],
) -> Vec<Result<CompiledClass, CompileError>> {
    let workers = thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .max(1);
    debug!(units = units.len(), workers, "batch compile");

    let mut results = Vec::with_capacity(units.len());
    for chunk in units.chunks(workers) {
        thread::scope(|scope| {
            let handles: Vec<_> = chunk
                .iter()
                .map(|unit| (unit, scope.spawn(move || compiler.compile(unit))))
                .collect();
            for (unit, handle) in handles {
                let result = handle.join().unwrap_or_else(|_| {
                    Err(CompileError::WorkerPanicked {
                        unit: unit.name.clone(),
                    })
                });
                results.push(result);
            }
        });
    }
    results
}
