//! Node handler capability and registry.
//!
//! Each node kind is compiled by a [`NodeHandler`] looked up through its
//! [`KindTag`]. The registry is built once, before any compilation starts,
//! and is only read afterwards, so one registry can serve any number of
//! concurrent compilations.

use std::collections::HashMap;
use std::sync::OnceLock;

use graphscript_core::{KindTag, Node, NodeId};

use crate::context::FunctionContext;
use crate::handlers;
use crate::options::CompileOptions;

/// Compiles one kind of node.
pub trait NodeHandler: Send + Sync {
    /// Declares the terms the node needs and binds its data outputs. The
    /// default binds every data output to a fresh local.
    fn register_terms(&self, ctx: &mut FunctionContext<'_>, id: NodeId, node: &Node) {
        ctx.register_output_locals(id, node);
    }

    /// Appends the node's statements through [`FunctionContext::emit`].
    fn emit_statements(&self, ctx: &mut FunctionContext<'_>, id: NodeId, node: &Node);

    fn is_pure(&self, node: &Node) -> bool {
        node.pure
    }

    /// Terms of this kind define the external signature and are registered
    /// ahead of everything else, in skeleton compiles too.
    fn requires_terms_before_scheduling(&self) -> bool {
        false
    }

    /// Survives pruning even when unreachable.
    fn force_keep(&self, _node: &Node, _options: &CompileOptions) -> bool {
        false
    }

    /// Reachable by definition.
    fn is_root(&self, _node: &Node) -> bool {
        false
    }
}

/// Immutable map from node kind to handler.
pub struct HandlerRegistry {
    handlers: HashMap<KindTag, Box<dyn NodeHandler>>,
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<String> = self.handlers.keys().map(|k| k.to_string()).collect();
        kinds.sort();
        f.debug_struct("HandlerRegistry")
            .field("kinds", &kinds)
            .finish()
    }
}

impl HandlerRegistry {
    /// The shared registry of built-in handlers.
    pub fn standard() -> &'static HandlerRegistry {
        static STANDARD: OnceLock<HandlerRegistry> = OnceLock::new();
        STANDARD.get_or_init(|| RegistryBuilder::new().with_standard_handlers().build())
    }

    pub fn get(&self, tag: &KindTag) -> Option<&dyn NodeHandler> {
        self.handlers.get(tag).map(|h| h.as_ref())
    }

    pub fn handler_for(&self, node: &Node) -> Option<&dyn NodeHandler> {
        self.get(&node.tag())
    }

    /// Purity as classified by the node's handler, falling back to the
    /// node's own flag for unregistered kinds.
    pub fn is_pure(&self, node: &Node) -> bool {
        self.handler_for(node)
            .map(|h| h.is_pure(node))
            .unwrap_or(node.pure)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

/// Collects handlers during the registration phase.
#[derive(Default)]
pub struct RegistryBuilder {
    handlers: HashMap<KindTag, Box<dyn NodeHandler>>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        RegistryBuilder::default()
    }

    pub fn with_standard_handlers(mut self) -> Self {
        handlers::register_standard(&mut self);
        self
    }

    /// Registers `handler` for `tag`, replacing any earlier registration.
    pub fn register(&mut self, tag: KindTag, handler: impl NodeHandler + 'static) -> &mut Self {
        self.handlers.insert(tag, Box::new(handler));
        self
    }

    pub fn build(self) -> HandlerRegistry {
        HandlerRegistry {
            handlers: self.handlers,
        }
    }
}
