//! Provenance side table: where every working-graph node came from.
//!
//! Compilation works on private copies of authored graphs, and expansion
//! splices further copies of macro bodies into them. Diagnostics and debug
//! information must still point at authored content, so each working node
//! is recorded here with its [`Origin`]: the authored node it was copied
//! from plus the chain of authored call sites it was inlined through.
//!
//! Origins store authored references by value. Working nodes are removed
//! and their arena slots reused as passes run; nothing in this table refers
//! to a working id other than its key.

use std::collections::HashMap;

use graphscript_core::{CloneMap, NodeId};
use serde::{Deserialize, Serialize};

/// An authored node: graph name plus node id in that graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceRef {
    pub graph: String,
    pub node: NodeId,
}

impl SourceRef {
    pub fn new(graph: impl Into<String>, node: NodeId) -> Self {
        SourceRef {
            graph: graph.into(),
            node,
        }
    }
}

impl std::fmt::Display for SourceRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.graph, self.node)
    }
}

/// Where one working node came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Origin {
    /// The authored node this node copies, or the node it was synthesized
    /// on behalf of.
    pub source: SourceRef,
    /// Authored call sites the node was inlined through, outermost first.
    pub call_sites: Vec<SourceRef>,
    /// Created by the compiler rather than copied.
    pub synthesized: bool,
}

impl Origin {
    pub fn authored(source: SourceRef) -> Self {
        Origin {
            source,
            call_sites: Vec::new(),
            synthesized: false,
        }
    }

    /// The outermost call site, in the function's own authored graph.
    pub fn call_site(&self) -> Option<&SourceRef> {
        self.call_sites.first()
    }

    /// Number of macro instances this node was inlined through.
    pub fn depth(&self) -> usize {
        self.call_sites.len()
    }

    /// Origin of something produced by expanding the instance with this
    /// origin: the instance becomes the innermost call site.
    fn through(&self, source: SourceRef, synthesized: bool) -> Origin {
        let mut call_sites = self.call_sites.clone();
        call_sites.push(self.source.clone());
        Origin {
            source,
            call_sites,
            synthesized,
        }
    }
}

/// Side table from working node ids to their origins.
#[derive(Debug, Clone, Default)]
pub struct Provenance {
    origins: HashMap<NodeId, Origin>,
}

impl Provenance {
    pub fn new() -> Self {
        Provenance::default()
    }

    pub fn record(&mut self, node: NodeId, origin: Origin) {
        self.origins.insert(node, origin);
    }

    /// Records a straight copy of authored graph `graph`.
    pub fn record_clone(&mut self, map: &CloneMap, graph: &str) {
        for (source, copy) in map.iter() {
            self.record(copy, Origin::authored(SourceRef::new(graph, source)));
        }
    }

    /// Records the nodes of `body` spliced in place of `call_site`.
    pub fn record_expansion(&mut self, map: &CloneMap, body: &str, call_site: NodeId) {
        let site = self.origin_or_self(call_site);
        for (source, copy) in map.iter() {
            self.record(copy, site.through(SourceRef::new(body, source), false));
        }
    }

    /// Records a node the compiler created while expanding `call_site`.
    pub fn record_synthesized(&mut self, node: NodeId, call_site: NodeId) {
        let site = self.origin_or_self(call_site);
        let source = site.source.clone();
        self.record(node, site.through(source, true));
    }

    /// Records a node created on behalf of an existing origin, without
    /// adding a call site.
    pub fn record_alias(&mut self, node: NodeId, origin: &Origin) {
        let mut origin = origin.clone();
        origin.synthesized = true;
        self.record(node, origin);
    }

    pub fn forget(&mut self, node: NodeId) {
        self.origins.remove(&node);
    }

    pub fn origin(&self, node: NodeId) -> Option<&Origin> {
        self.origins.get(&node)
    }

    /// Nesting depth of a node; zero for nodes of the function's own graph.
    pub fn depth(&self, node: NodeId) -> usize {
        self.origin(node).map(Origin::depth).unwrap_or(0)
    }

    pub fn call_site_chain(&self, node: NodeId) -> &[SourceRef] {
        self.origin(node)
            .map(|o| o.call_sites.as_slice())
            .unwrap_or(&[])
    }

    pub fn outermost_call_site(&self, node: NodeId) -> Option<&SourceRef> {
        self.origin(node).and_then(Origin::call_site)
    }

    fn origin_or_self(&self, node: NodeId) -> Origin {
        self.origin(node)
            .cloned()
            .unwrap_or_else(|| Origin::authored(SourceRef::new("<unknown>", node)))
    }

    pub fn len(&self) -> usize {
        self.origins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.origins.is_empty()
    }
}
