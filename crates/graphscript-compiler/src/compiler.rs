//! Top-level compilation pipeline for one compilation unit (one class).
//!
//! The [`Compiler`] walks a unit through a fixed sequence of states:
//!
//! 1. `SchemaReady`: resolve function, event and member names
//! 2. `ClassLayoutBuilt`: register signature-defining terms, match
//!    overrides and lay out the class. Skeleton compiles stop here.
//! 3. `FunctionsPrecompiled`: per function, expand macros, prune, validate
//!    and register the remaining terms
//! 4. `FunctionsCompiled`: schedule, emit and link each body, then point
//!    the event stubs at their event graph offsets
//! 5. `ClassFinalized`: append promoted members, build the default object
//!    and compute fingerprints
//!
//! Errors in one function abandon that function only: it gets a stub body
//! and its siblings keep compiling. The class is still produced, but it is
//! not a successful build while its message log holds errors.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use graphscript_core::{
    CompilationUnit, FunctionFlags, FunctionSignature, Graph, Node, NodeId, NodeKind,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, debug_span, warn};

use crate::assemble::{
    assemble_symbols, declared_signature, resolve_signature, PromotedMember, SymbolTable,
};
use crate::context::{FunctionAbandoned, FunctionContext, FunctionRole};
use crate::diagnostics::{Diagnostic, Issue, MessageLog, SourceLocation};
use crate::error::CompileError;
use crate::event_graph::{build_stub, consolidate};
use crate::expand::expand;
use crate::handler::HandlerRegistry;
use crate::hash;
use crate::layout::{build_default_object, ClassLayout, DefaultObject};
use crate::options::{CompileMode, CompileOptions};
use crate::prune::{find_roots, prune, RegistryPolicy};
use crate::schedule::schedule;
use crate::schema::ClassSchema;
use crate::statement::{link_blocks, Block, Body, Statement};
use crate::validate::{validate_entries, validate_graph};

/// States of one unit compilation, in the order they are entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompileState {
    Idle,
    SchemaReady,
    ClassLayoutBuilt,
    FunctionsPrecompiled,
    FunctionsCompiled,
    ClassFinalized,
}

impl CompileState {
    pub fn next(self) -> Option<CompileState> {
        use CompileState::*;
        match self {
            Idle => Some(SchemaReady),
            SchemaReady => Some(ClassLayoutBuilt),
            ClassLayoutBuilt => Some(FunctionsPrecompiled),
            FunctionsPrecompiled => Some(FunctionsCompiled),
            FunctionsCompiled => Some(ClassFinalized),
            ClassFinalized => None,
        }
    }
}

/// Cooperative cancellation, checked at every state transition.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        CancellationToken::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct CompiledFunction {
    pub name: String,
    pub role: FunctionRole,
    pub signature: FunctionSignature,
    /// Class or interface whose function this one overrides.
    pub override_of: Option<String>,
    pub symbols: SymbolTable,
    /// Empty for skeleton compiles; a stub when `abandoned`.
    pub body: Body,
    pub abandoned: bool,
    /// Authored graph the function was compiled from.
    pub source_graph: String,
    /// Hex blake3 of the signature.
    pub signature_hash: String,
    /// Hex blake3 of the linked body and symbols. Empty for skeleton
    /// compiles.
    pub fingerprint: String,
    /// The final working graph, kept with `save_intermediate_products`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intermediate_graph: Option<Graph>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompiledClass {
    pub name: String,
    pub mode: CompileMode,
    /// Last state the compilation reached.
    pub state: CompileState,
    pub layout: ClassLayout,
    pub functions: Vec<CompiledFunction>,
    /// Only built by full compiles.
    pub default_object: Option<DefaultObject>,
    pub diagnostics: MessageLog,
    /// Hex blake3 of the externally visible layout.
    pub skeleton_hash: String,
}

impl CompiledClass {
    /// Whether the class reached its final state without errors and can be
    /// loaded.
    pub fn is_success(&self) -> bool {
        let finished = match self.mode {
            CompileMode::SkeletonOnly => self.state == CompileState::ClassLayoutBuilt,
            CompileMode::Full => self.state == CompileState::ClassFinalized,
        };
        finished && !self.diagnostics.has_errors()
    }

    pub fn function(&self, name: &str) -> Option<&CompiledFunction> {
        self.functions.iter().find(|f| f.name == name)
    }
}

// ---------------------------------------------------------------------------
// Compiler
// ---------------------------------------------------------------------------

/// Compiles units against a shared, read-only handler registry.
#[derive(Debug, Clone)]
pub struct Compiler<'r> {
    registry: &'r HandlerRegistry,
    options: CompileOptions,
    cancel: CancellationToken,
}

/// One function in flight.
struct FunctionJob<'a> {
    ctx: FunctionContext<'a>,
    must_override: bool,
    signature: FunctionSignature,
    override_of: Option<String>,
    body: Option<Body>,
    symbols: SymbolTable,
    abandoned: bool,
}

impl<'a> FunctionJob<'a> {
    fn new(ctx: FunctionContext<'a>, must_override: bool) -> Self {
        let signature = FunctionSignature::new(ctx.function.clone());
        FunctionJob {
            ctx,
            must_override,
            signature,
            override_of: None,
            body: None,
            symbols: SymbolTable::default(),
            abandoned: false,
        }
    }

    fn abandon(&mut self, reason: FunctionAbandoned) {
        debug!(function = %reason.function, errors = reason.errors, "function abandoned");
        self.abandoned = true;
    }
}

/// Compiles `unit` with the built-in handlers.
pub fn compile_unit(
    unit: &CompilationUnit,
    options: &CompileOptions,
) -> Result<CompiledClass, CompileError> {
    Compiler::new(HandlerRegistry::standard(), options.clone()).compile(unit)
}

impl<'r> Compiler<'r> {
    pub fn new(registry: &'r HandlerRegistry, options: CompileOptions) -> Self {
        Compiler {
            registry,
            options,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    pub fn registry(&self) -> &'r HandlerRegistry {
        self.registry
    }

    fn advance(&self, state: &mut CompileState, to: CompileState) -> Result<(), CompileError> {
        if self.cancel.is_cancelled() {
            return Err(CompileError::Cancelled { phase: to });
        }
        match state.next() {
            Some(expected) if expected == to => {
                let from = *state;
                debug!(?from, ?to, "state transition");
                *state = to;
                Ok(())
            }
            expected => Err(CompileError::StateOrder {
                expected: expected.unwrap_or(*state),
                found: to,
            }),
        }
    }

    /// Compiles one unit.
    ///
    /// Returns `Err` only when the call itself fails (invalid options,
    /// cancellation). Problems in the unit are diagnostics on the result.
    pub fn compile(&self, unit: &CompilationUnit) -> Result<CompiledClass, CompileError> {
        let span = debug_span!("compile_unit", unit = %unit.name, mode = ?self.options.mode);
        let _enter = span.enter();
        let start = Instant::now();
        self.options.validate()?;

        let mut state = CompileState::Idle;
        let mut log = MessageLog::new();

        // 1. Names
        self.advance(&mut state, CompileState::SchemaReady)?;
        let (schema, schema_issues) = ClassSchema::build(unit);
        for (graph, issue) in schema_issues {
            log.push(Diagnostic::new(issue, SourceLocation::function(graph)));
        }

        // 2. Signatures and layout
        self.advance(&mut state, CompileState::ClassLayoutBuilt)?;
        let mut layout = ClassLayout::from_schema(unit, &schema);
        let mut jobs = self.prepare_jobs(unit, &schema);
        for job in &mut jobs {
            self.register_signature(unit, job);
            layout.add_function(job.signature.clone());
        }

        if self.options.mode == CompileMode::SkeletonOnly {
            let functions = jobs
                .into_iter()
                .map(|job| self.finish_function(job, &mut log))
                .collect::<Result<Vec<_>, _>>()?;
            let skeleton_hash = hash::skeleton_hash(&layout)?.to_hex().to_string();
            debug!(
                functions = functions.len(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "skeleton compiled"
            );
            return Ok(CompiledClass {
                name: unit.name.clone(),
                mode: self.options.mode,
                state,
                layout,
                functions,
                default_object: None,
                diagnostics: log,
                skeleton_hash,
            });
        }

        // 3. Expansion, pruning, validation
        self.advance(&mut state, CompileState::FunctionsPrecompiled)?;
        for job in &mut jobs {
            if let Err(abandoned) = precompile(&mut job.ctx, unit) {
                job.abandon(abandoned);
            }
        }

        // 4. Bodies
        self.advance(&mut state, CompileState::FunctionsCompiled)?;
        let mut promoted: Vec<PromotedMember> = Vec::new();
        for job in &mut jobs {
            let promote = job.ctx.role == FunctionRole::EventGraph
                && self.options.persistent_event_graph_frame;
            let (symbols, members) = assemble_symbols(&job.ctx.terms, &job.signature, promote);
            job.symbols = symbols;
            promoted.extend(members);
            if job.abandoned {
                continue;
            }
            match compile_body(&mut job.ctx) {
                Ok(body) => job.body = Some(body),
                Err(abandoned) => job.abandon(abandoned),
            }
        }
        patch_event_offsets(&mut jobs);

        // 5. Class
        self.advance(&mut state, CompileState::ClassFinalized)?;
        layout.add_promoted(&promoted);
        let (default_object, default_issues) = build_default_object(&layout, &schema);
        for issue in default_issues {
            log.push(Diagnostic::new(issue, SourceLocation::function(unit.name.clone())));
        }
        layout.finalized = true;

        let functions = jobs
            .into_iter()
            .map(|job| self.finish_function(job, &mut log))
            .collect::<Result<Vec<_>, _>>()?;
        let skeleton_hash = hash::skeleton_hash(&layout)?.to_hex().to_string();
        debug!(
            functions = functions.len(),
            errors = log.error_count(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "class compiled"
        );

        Ok(CompiledClass {
            name: unit.name.clone(),
            mode: self.options.mode,
            state,
            layout,
            functions,
            default_object: Some(default_object),
            diagnostics: log,
            skeleton_hash,
        })
    }

    /// One job per function graph, one per event stub and one for the
    /// consolidated event graph, in that order.
    fn prepare_jobs<'a>(
        &'a self,
        unit: &'a CompilationUnit,
        schema: &'a ClassSchema,
    ) -> Vec<FunctionJob<'a>> {
        let mut jobs = Vec::new();
        for (name, index) in &schema.functions {
            let Some(graph) = unit.function_graphs.get(*index) else {
                warn!(function = %name, index, "function graph index out of range");
                continue;
            };
            let ctx = FunctionContext::for_graph(
                name.clone(),
                FunctionRole::Function,
                graph,
                self.registry,
                &self.options,
                schema,
            );
            jobs.push(FunctionJob::new(ctx, false));
        }

        let (merged, issues) = consolidate(unit, schema);
        if merged.events.is_empty() && unit.event_graphs.is_empty() {
            return jobs;
        }
        for info in merged.events.values() {
            let stub = build_stub(info);
            let ctx = FunctionContext::new(
                stub.event.clone(),
                FunctionRole::EventStub,
                stub.graph,
                stub.provenance,
                self.registry,
                &self.options,
                schema,
            );
            jobs.push(FunctionJob::new(ctx, stub.spec.is_override));
        }
        let mut ctx = FunctionContext::new(
            schema.event_graph_function.clone(),
            FunctionRole::EventGraph,
            merged.graph,
            merged.provenance,
            self.registry,
            &self.options,
            schema,
        );
        for (issue, node) in issues {
            ctx.report(issue, Some(node), None);
        }
        jobs.push(FunctionJob::new(ctx, false));
        jobs
    }

    /// Registers the signature-defining terms of a job and resolves its
    /// signature against whatever it overrides.
    fn register_signature(&self, unit: &CompilationUnit, job: &mut FunctionJob<'_>) {
        let _span = debug_span!("signature", function = %job.ctx.function).entered();
        let ctx = &mut job.ctx;
        validate_entries(ctx);
        for id in ctx.graph.node_ids() {
            if ctx
                .handler_for(id)
                .is_some_and(|h| h.requires_terms_before_scheduling())
            {
                ctx.register_node_terms(id);
            }
        }

        let flags = ctx
            .entry
            .and_then(|id| ctx.graph.node(id))
            .and_then(|n| match &n.kind {
                NodeKind::FunctionEntry(spec) => Some(spec.flags),
                _ => None,
            })
            .unwrap_or(FunctionFlags::empty());
        let declared = declared_signature(&ctx.function, &ctx.terms, flags);
        let inherited = match ctx.role {
            FunctionRole::EventGraph => None,
            _ => unit.inherited_signature(&ctx.function),
        };
        let matched = resolve_signature(declared, inherited, job.must_override);
        let entry = ctx.entry;
        for issue in matched.issues {
            ctx.report(issue, entry, None);
        }
        job.signature = matched.signature;
        job.override_of = matched.override_of;
    }

    fn finish_function(
        &self,
        mut job: FunctionJob<'_>,
        log: &mut MessageLog,
    ) -> Result<CompiledFunction, CompileError> {
        log.extend(job.ctx.take_diagnostics());
        let abandoned = job.abandoned || job.ctx.has_errors();
        let body = match (self.options.mode, job.body.take()) {
            (CompileMode::SkeletonOnly, _) => Body::default(),
            (CompileMode::Full, Some(body)) if !abandoned => body,
            (CompileMode::Full, _) => Body::stub(),
        };
        let fingerprint = match self.options.mode {
            CompileMode::SkeletonOnly => String::new(),
            CompileMode::Full => hash::function_fingerprint(&body, &job.symbols)?
                .to_hex()
                .to_string(),
        };
        let intermediate_graph = self
            .options
            .save_intermediate_products
            .then(|| job.ctx.graph.clone());
        Ok(CompiledFunction {
            signature_hash: hash::hash_value(&job.signature)?.to_hex().to_string(),
            name: job.ctx.function.clone(),
            role: job.ctx.role,
            signature: job.signature,
            override_of: job.override_of,
            symbols: job.symbols,
            body,
            abandoned,
            source_graph: job.ctx.source_graph.clone(),
            fingerprint,
            intermediate_graph,
        })
    }
}

// ---------------------------------------------------------------------------
// Per-function phases
// ---------------------------------------------------------------------------

/// Expansion, pruning, validation and term registration of one function.
fn precompile(
    ctx: &mut FunctionContext<'_>,
    unit: &CompilationUnit,
) -> Result<(), FunctionAbandoned> {
    let _span = debug_span!("precompile", function = %ctx.function).entered();
    ctx.checkpoint()?;

    let before = ctx.graph.node_count();
    let stats = expand(ctx, &unit.macros);
    ctx.checkpoint()?;

    let policy = RegistryPolicy::new(ctx.registry, ctx.options);
    let roots = find_roots(&ctx.graph, &policy, ctx.options.include_potential_roots);
    let report = prune(ctx, &roots);
    debug!(
        nodes_before = before,
        expanded = stats.instances_expanded,
        pruned = report.removed.len(),
        nodes = ctx.graph.node_count(),
        "graph prepared"
    );

    validate_graph(ctx);
    ctx.checkpoint()?;

    for id in ctx.graph.node_ids() {
        let early = ctx
            .handler_for(id)
            .is_some_and(|h| h.requires_terms_before_scheduling());
        if !early {
            ctx.register_node_terms(id);
        }
    }
    ctx.checkpoint()
}

/// Schedules, emits and links one function body.
fn compile_body(ctx: &mut FunctionContext<'_>) -> Result<Body, FunctionAbandoned> {
    let _span = debug_span!("compile_body", function = %ctx.function).entered();
    let registry = ctx.registry;
    let is_pure = |node: &Node| registry.is_pure(node);
    let schedule = match schedule(&ctx.graph, ctx.entry, &is_pure) {
        Ok(schedule) => schedule,
        Err(err) => {
            let nodes = err
                .nodes()
                .iter()
                .filter_map(|id| ctx.graph.node(*id).map(|n| n.title.clone()))
                .collect();
            let at = err.nodes().first().copied();
            ctx.report(Issue::ScheduleCycle { nodes }, at, None);
            return Err(FunctionAbandoned {
                function: ctx.function.clone(),
                errors: ctx.error_count(),
            });
        }
    };

    let mut blocks = Vec::with_capacity(schedule.linear.len());
    for &id in &schedule.linear {
        let mut statements = Vec::new();
        for &pure in schedule.prelude(id) {
            emit_into(ctx, pure, &mut statements);
        }
        emit_into(ctx, id, &mut statements);
        blocks.push(Block { node: id, statements });
    }
    ctx.checkpoint()?;

    let provenance = &ctx.provenance;
    let body = link_blocks(blocks, |node| provenance.origin(node).cloned());
    debug!(
        scheduled = schedule.linear.len(),
        statements = body.len(),
        "body linked"
    );
    Ok(body)
}

fn emit_into(ctx: &mut FunctionContext<'_>, id: NodeId, out: &mut Vec<(NodeId, Statement)>) {
    if ctx.options.emit_node_comments {
        if let Some(node) = ctx.graph.node(id) {
            out.push((id, Statement::Comment(node.title.clone())));
        }
    }
    if ctx.options.debug_instrumentation && !ctx.is_pure(id) {
        out.push((id, Statement::DebugSite(id)));
    }
    out.extend(ctx.emit_node(id).into_iter().map(|s| (id, s)));
}

/// Points every stub's event graph call at the block of its event.
fn patch_event_offsets(jobs: &mut [FunctionJob<'_>]) {
    let Some(event_graph) = jobs
        .iter()
        .find(|j| j.ctx.role == FunctionRole::EventGraph && !j.abandoned)
    else {
        return;
    };
    let Some(body) = &event_graph.body else {
        return;
    };
    let offsets: Vec<(String, usize)> = event_graph
        .ctx
        .graph
        .nodes()
        .into_iter()
        .filter_map(|(id, node)| match &node.kind {
            NodeKind::Event(spec) => body.block_start(id).map(|o| (spec.name.clone(), o)),
            _ => None,
        })
        .collect();

    for job in jobs.iter_mut().filter(|j| j.ctx.role == FunctionRole::EventStub) {
        let Some(body) = job.body.as_mut() else {
            continue;
        };
        for statement in &mut body.statements {
            if let Statement::CallEventGraph {
                event,
                entry_offset,
                ..
            } = statement
            {
                *entry_offset = offsets
                    .iter()
                    .find(|(name, _)| name == event)
                    .map(|(_, offset)| *offset);
            }
        }
    }
}
