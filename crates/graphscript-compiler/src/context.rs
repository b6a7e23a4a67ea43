//! Per-function compilation state.
//!
//! A [`FunctionContext`] owns everything one function needs while it is
//! being compiled: its private working copy of the authored graph, the
//! provenance of every working node, its term table and its diagnostics.
//! Nothing in it is shared with sibling functions. Handlers receive the
//! context mutably and use the helpers here to resolve inputs, bind outputs
//! and emit statements.

use graphscript_core::{Graph, Node, NodeId, PinType, PortDirection, PortRef, PortRole};
use thiserror::Error;

use crate::diagnostics::{Diagnostic, Issue, SourceLocation};
use crate::handler::{HandlerRegistry, NodeHandler};
use crate::options::CompileOptions;
use crate::provenance::Provenance;
use crate::schema::ClassSchema;
use crate::statement::{JumpTarget, Statement};
use crate::term::{zero_literal, TermId, TermKind, TermTable};

/// What a compiled function is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum FunctionRole {
    /// An authored function graph.
    Function,
    /// The consolidated body shared by all events of the class.
    EventGraph,
    /// Per-event entry point that forwards into the event graph.
    EventStub,
}

/// A function stopped compiling because of errors. Its diagnostics stay in
/// the context; the orchestrator substitutes a stub body.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("compilation of '{function}' abandoned after {errors} error(s)")]
pub struct FunctionAbandoned {
    pub function: String,
    pub errors: usize,
}

pub struct FunctionContext<'a> {
    pub function: String,
    pub role: FunctionRole,
    /// Name of the authored graph the working graph was cloned from.
    pub source_graph: String,
    pub graph: Graph,
    pub provenance: Provenance,
    pub terms: TermTable,
    pub registry: &'a HandlerRegistry,
    pub options: &'a CompileOptions,
    pub schema: &'a ClassSchema,
    /// The entry node, once located.
    pub entry: Option<NodeId>,
    diagnostics: Vec<Diagnostic>,
    emitted: Vec<Statement>,
}

impl<'a> FunctionContext<'a> {
    /// Context over an already prepared working graph.
    pub fn new(
        function: impl Into<String>,
        role: FunctionRole,
        graph: Graph,
        provenance: Provenance,
        registry: &'a HandlerRegistry,
        options: &'a CompileOptions,
        schema: &'a ClassSchema,
    ) -> Self {
        let source_graph = graph.name().to_string();
        let entry = graph
            .nodes()
            .into_iter()
            .find(|(_, n)| n.kind.is_entry())
            .map(|(id, _)| id);
        FunctionContext {
            function: function.into(),
            role,
            source_graph,
            graph,
            provenance,
            terms: TermTable::new(),
            registry,
            options,
            schema,
            entry,
            diagnostics: Vec::new(),
            emitted: Vec::new(),
        }
    }

    /// Context over a private copy of an authored graph.
    pub fn for_graph(
        function: impl Into<String>,
        role: FunctionRole,
        authored: &Graph,
        registry: &'a HandlerRegistry,
        options: &'a CompileOptions,
        schema: &'a ClassSchema,
    ) -> Self {
        let (graph, map) = authored.clone_graph();
        let mut provenance = Provenance::new();
        provenance.record_clone(&map, authored.name());
        FunctionContext::new(function, role, graph, provenance, registry, options, schema)
    }

    // -----------------------------------------------------------------------
    // Diagnostics
    // -----------------------------------------------------------------------

    /// Records an issue against a working node, located at its authored
    /// origin.
    pub fn report(&mut self, issue: Issue, node: Option<NodeId>, port: Option<u16>) {
        let mut location = SourceLocation::function(self.function.clone());
        if let Some(id) = node {
            if let Some(origin) = self.provenance.origin(id) {
                location.source = Some(origin.source.clone());
                location.call_site = origin.call_site().cloned();
            }
            location.port = port
                .and_then(|index| self.graph.port(PortRef::new(id, index)))
                .map(|p| p.name.clone());
        }
        self.diagnostics.push(Diagnostic::new(issue, location));
    }

    pub fn error_count(&self) -> usize {
        self.diagnostics.iter().filter(|d| d.is_error()).count()
    }

    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }

    /// Phase boundary: fails once any error has been reported.
    pub fn checkpoint(&self) -> Result<(), FunctionAbandoned> {
        match self.error_count() {
            0 => Ok(()),
            errors => Err(FunctionAbandoned {
                function: self.function.clone(),
                errors,
            }),
        }
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    // -----------------------------------------------------------------------
    // Handlers
    // -----------------------------------------------------------------------

    pub fn handler_for(&self, id: NodeId) -> Option<&'a dyn NodeHandler> {
        let registry = self.registry;
        self.graph.node(id).and_then(|n| registry.handler_for(n))
    }

    pub fn is_pure(&self, id: NodeId) -> bool {
        self.graph
            .node(id)
            .map(|n| self.registry.is_pure(n))
            .unwrap_or(false)
    }

    /// Runs the registered handler's term registration for `id`.
    pub fn register_node_terms(&mut self, id: NodeId) {
        let (Some(handler), Some(node)) = (self.handler_for(id), self.graph.node(id).cloned())
        else {
            return;
        };
        handler.register_terms(self, id, &node);
    }

    /// Runs the registered handler's emission for `id` and returns what it
    /// emitted.
    pub fn emit_node(&mut self, id: NodeId) -> Vec<Statement> {
        if let (Some(handler), Some(node)) = (self.handler_for(id), self.graph.node(id).cloned()) {
            handler.emit_statements(self, id, &node);
        }
        std::mem::take(&mut self.emitted)
    }

    pub fn emit(&mut self, statement: Statement) {
        self.emitted.push(statement);
    }

    // -----------------------------------------------------------------------
    // Terms
    // -----------------------------------------------------------------------

    /// The term feeding data input `index` of `id`: the net of the linked
    /// producer, or a literal built from the port default.
    pub fn input_term(&mut self, id: NodeId, index: u16) -> TermId {
        let port = PortRef::new(id, index);
        if let Some(term) = self
            .graph
            .links(port)
            .first()
            .and_then(|source| self.terms.net(*source))
        {
            return term;
        }
        let (ty, value) = match self.graph.port(port) {
            Some(p) => {
                let value = p
                    .default_value
                    .clone()
                    .unwrap_or_else(|| zero_literal(&p.ty).to_string());
                (p.ty.clone(), value)
            }
            None => (graphscript_core::PinType::wildcard(), String::new()),
        };
        self.terms.literal(ty, value)
    }

    pub fn output_term(&self, id: NodeId, index: u16) -> Option<TermId> {
        self.terms.net(PortRef::new(id, index))
    }

    /// Terms of every data input, in port order.
    pub fn data_inputs(&mut self, id: NodeId) -> Vec<TermId> {
        let indices: Vec<u16> = self
            .graph
            .node(id)
            .map(|n| {
                n.ports_where(PortRole::Data, PortDirection::In)
                    .map(|(i, _)| i)
                    .collect()
            })
            .unwrap_or_default();
        indices.into_iter().map(|i| self.input_term(id, i)).collect()
    }

    /// Bound terms of every data output, in port order.
    pub fn data_outputs(&self, id: NodeId) -> Vec<TermId> {
        self.graph
            .node(id)
            .map(|n| {
                n.ports_where(PortRole::Data, PortDirection::Out)
                    .filter_map(|(i, _)| self.output_term(id, i))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Binds every unbound data output of `node` to a fresh local.
    pub fn register_output_locals(&mut self, id: NodeId, node: &Node) {
        for (index, port) in node.ports_where(PortRole::Data, PortDirection::Out) {
            let port_ref = PortRef::new(id, index);
            if self.terms.net(port_ref).is_some() {
                continue;
            }
            let term = self.terms.add(
                TermKind::Local,
                &format!("{}_{}", node.title, port.name),
                port.ty.clone(),
            );
            self.terms.bind(port_ref, term);
        }
    }

    /// Resolves a variable reference: a local of this function first, then
    /// a member of the class.
    pub fn resolve_variable(&mut self, name: &str, node: NodeId) -> Option<TermId> {
        if let Some(local) = self.terms.find(TermKind::Local, name) {
            return Some(local);
        }
        let member = self.schema.member(name)?;
        let (name, ty) = (member.name.clone(), member.ty.clone());
        Some(self.class_slot(TermKind::Member, &name, ty, node))
    }

    /// The term for a class-scope slot. A clash with another kind of slot is
    /// reported against `node` and answered with a private term so emission
    /// can continue.
    pub fn class_slot(&mut self, kind: TermKind, name: &str, ty: PinType, node: NodeId) -> TermId {
        match self.terms.member(kind, name, ty.clone()) {
            Ok(term) => term,
            Err(clash) => {
                self.report(Issue::ClassSlotClash { name: clash.name }, Some(node), None);
                self.terms.add(kind, name, ty)
            }
        }
    }

    // -----------------------------------------------------------------------
    // Control flow
    // -----------------------------------------------------------------------

    /// Where execution continues after leaving control output `port`.
    pub fn follow(&self, id: NodeId, port: &str) -> JumpTarget {
        self.graph
            .find_port(id, port, PortDirection::Out)
            .and_then(|p| self.graph.links(p).first().copied())
            .map(|far| JumpTarget::Node(far.node))
            .unwrap_or(JumpTarget::EndOfThread)
    }

    pub fn emit_jump(&mut self, target: JumpTarget) {
        match target {
            JumpTarget::EndOfThread => self.emit(Statement::EndOfThread),
            target => self.emit(Statement::Goto(target)),
        }
    }

    pub fn emit_follow(&mut self, id: NodeId, port: &str) {
        let target = self.follow(id, port);
        self.emit_jump(target);
    }
}
