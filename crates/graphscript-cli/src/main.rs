//! graphscript compiler CLI.
//!
//! Provides the `graphscript` binary. `compile` loads a compilation unit
//! from JSON, compiles it and prints a listing (or the compiled class as
//! JSON); `check` runs a full compile and only reports diagnostics.
//!
//! Logging goes to stderr and is filtered through `RUST_LOG`.

use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use graphscript_compiler::{
    compile_unit, Backend, CompileError, CompileMode, CompileOptions, CompiledClass,
    ListingBackend,
};
use graphscript_core::CompilationUnit;

/// graphscript visual-script compiler.
#[derive(Parser)]
#[command(name = "graphscript", about = "graphscript visual-script compiler")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Compile a unit and print its listing.
    Compile {
        /// Path to the compilation unit (JSON).
        unit: PathBuf,

        /// Only produce signatures and the class layout.
        #[arg(long)]
        skeleton: bool,

        /// Insert debug sites and tunnel boundaries.
        #[arg(long)]
        debug: bool,

        /// Emit a comment statement per node.
        #[arg(long)]
        comments: bool,

        /// Options file (JSON); flags override its values.
        #[arg(long)]
        options: Option<PathBuf>,

        /// Print the compiled class as JSON instead of a listing.
        #[arg(long)]
        json: bool,

        /// Annotate listing statements with their authored origin.
        #[arg(long)]
        origins: bool,
    },
    /// Compile a unit and report diagnostics only.
    Check {
        /// Path to the compilation unit (JSON).
        unit: PathBuf,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let exit_code = match cli.command {
        Commands::Compile {
            unit,
            skeleton,
            debug,
            comments,
            options,
            json,
            origins,
        } => run_compile(&unit, skeleton, debug, comments, options.as_deref(), json, origins),
        Commands::Check { unit } => run_check(&unit),
    };
    process::exit(exit_code);
}

/// Execute the compile subcommand.
///
/// Returns exit code: 0 = success, 1 = the unit has errors,
/// 2 = invalid options or failed compilation call, 3 = I/O error.
fn run_compile(
    unit_path: &Path,
    skeleton: bool,
    debug: bool,
    comments: bool,
    options_path: Option<&Path>,
    json: bool,
    origins: bool,
) -> i32 {
    let mut options = match options_path {
        Some(path) => match load_options(path) {
            Ok(options) => options,
            Err(code) => return code,
        },
        None => CompileOptions::default(),
    };
    if skeleton {
        options.mode = CompileMode::SkeletonOnly;
    }
    options.debug_instrumentation |= debug;
    options.emit_node_comments |= comments;
    debug!(?options, "compile options");

    let unit = match load_unit(unit_path) {
        Ok(unit) => unit,
        Err(code) => return code,
    };
    let class = match compile_unit(&unit, &options) {
        Ok(class) => class,
        Err(e) => {
            eprintln!("Compilation error: {}", e);
            return 2;
        }
    };

    if json {
        let text = serde_json::to_string_pretty(&class).unwrap_or_else(|e| {
            format!("{{\"error\": \"failed to serialize result: {}\"}}", e)
        });
        println!("{}", text);
    } else {
        let mut backend = ListingBackend {
            show_origins: origins,
        };
        println!("{}", backend.emit_class(&class));
    }
    report(&class)
}

/// Execute the check subcommand. Exit codes as for `compile`.
fn run_check(unit_path: &Path) -> i32 {
    let unit = match load_unit(unit_path) {
        Ok(unit) => unit,
        Err(code) => return code,
    };
    match compile_unit(&unit, &CompileOptions::default()) {
        Ok(class) => report(&class),
        Err(e) => {
            eprintln!("Compilation error: {}", e);
            2
        }
    }
}

/// Prints diagnostics to stderr and maps the outcome to an exit code.
fn report(class: &CompiledClass) -> i32 {
    for diagnostic in class.diagnostics.iter() {
        eprintln!("{}", diagnostic);
    }
    let errors = class.diagnostics.error_count();
    let warnings = class.diagnostics.len() - errors;
    info!(
        class = %class.name,
        functions = class.functions.len(),
        errors,
        warnings,
        "compiled"
    );
    if class.is_success() {
        0
    } else {
        1
    }
}

fn load_unit(path: &Path) -> Result<CompilationUnit, i32> {
    let text = fs::read_to_string(path).map_err(|e| {
        eprintln!("Error: failed to read '{}': {}", path.display(), e);
        3
    })?;
    CompilationUnit::from_json(&text).map_err(|e| {
        eprintln!("Error: invalid compilation unit '{}': {}", path.display(), e);
        2
    })
}

fn load_options(path: &Path) -> Result<CompileOptions, i32> {
    let text = fs::read_to_string(path).map_err(|e| {
        eprintln!("Error: failed to read '{}': {}", path.display(), e);
        3
    })?;
    CompileOptions::from_json(&text).map_err(|e: CompileError| {
        eprintln!("Error: {}", e);
        2
    })
}
