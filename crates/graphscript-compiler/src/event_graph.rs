//! Event graph consolidation.
//!
//! A full compile merges every event page of a class into one shared
//! function, entered through a dispatch entry that jumps to the event's
//! offset. Each event then gets a small stub function with the event's
//! signature:
//!
//! ```text
//! entry(params) -> persistent frame assign -> call event graph -> return
//! ```
//!
//! The stub stores its parameters into class-scope slots, which the event
//! node in the shared graph reads back, and calls the shared graph at the
//! event's entry offset once that offset is known.

use graphscript_core::{
    CompilationUnit, EntrySpec, EventSpec, FunctionFlags, Graph, Node, NodeId, NodeKind,
    ParamSig, PinType, Port, PortDirection, PortRef, PortRole, TypeDesc,
};
use indexmap::IndexMap;
use tracing::debug;

use crate::diagnostics::Issue;
use crate::provenance::{Origin, Provenance, SourceRef};
use crate::schema::ClassSchema;
use crate::term::persistent_slot_name;

/// Name of the dispatch parameter of the event graph entry.
pub const ENTRY_POINT_PARAM: &str = "EntryPoint";

/// An event implemented in the consolidated graph.
#[derive(Debug, Clone)]
pub struct EventInfo {
    /// Event node in the consolidated graph.
    pub node: NodeId,
    pub spec: EventSpec,
    /// The event's data outputs, which become the stub's parameters.
    pub params: Vec<ParamSig>,
    pub origin: Option<Origin>,
}

/// All event pages of a class merged into one graph.
#[derive(Debug, Clone)]
pub struct EventGraph {
    pub graph: Graph,
    pub provenance: Provenance,
    pub entry: NodeId,
    pub events: IndexMap<String, EventInfo>,
}

/// A per-event entry point forwarding into the event graph.
#[derive(Debug, Clone)]
pub struct EventStub {
    pub event: String,
    pub spec: EventSpec,
    pub graph: Graph,
    pub provenance: Provenance,
}

/// Merges the unit's event pages into one graph. Issues are returned with
/// the consolidated node they concern.
pub fn consolidate(
    unit: &CompilationUnit,
    schema: &ClassSchema,
) -> (EventGraph, Vec<(Issue, NodeId)>) {
    let function = schema.event_graph_function.clone();
    let mut graph = Graph::new(function.clone());
    let mut provenance = Provenance::new();
    let mut issues = Vec::new();

    let entry = graph.add_node(
        Node::new(
            NodeKind::FunctionEntry(EntrySpec {
                function: function.clone(),
                locals: Vec::new(),
                flags: FunctionFlags::PRIVATE | FunctionFlags::FINAL | FunctionFlags::EVENT_GRAPH,
                computed_dispatch: true,
            }),
            function.clone(),
        )
        .with_port(Port::exec_out("then"))
        .with_port(Port::data_out(ENTRY_POINT_PARAM, PinType::of(TypeDesc::Int))),
    );
    let mut entry_origin = Origin::authored(SourceRef::new(function.clone(), entry));
    entry_origin.synthesized = true;
    provenance.record(entry, entry_origin.clone());

    for page in &unit.event_graphs {
        let map = graph.merge_from(page);
        provenance.record_clone(&map, page.name());
        debug!(page = page.name(), nodes = map.len(), "merged event page");
    }

    let mut events: IndexMap<String, EventInfo> = IndexMap::new();
    for (id, node) in graph.nodes() {
        let NodeKind::Event(spec) = &node.kind else {
            continue;
        };
        if events.contains_key(&spec.name) {
            issues.push((
                Issue::DuplicateEvent {
                    name: spec.name.clone(),
                },
                id,
            ));
            continue;
        }
        events.insert(
            spec.name.clone(),
            EventInfo {
                node: id,
                spec: spec.clone(),
                params: event_params(node),
                origin: provenance.origin(id).cloned(),
            },
        );
    }

    // Interface functions that could be events but have no implementation
    // get an empty one.
    for iface in &unit.interfaces {
        for signature in iface.functions.iter().filter(|f| f.can_be_event()) {
            if events.contains_key(&signature.name)
                || schema.functions.contains_key(&signature.name)
            {
                continue;
            }
            let mut node = Node::new(
                NodeKind::Event(EventSpec {
                    name: signature.name.clone(),
                    is_override: true,
                    flags: FunctionFlags::EVENT,
                }),
                signature.name.clone(),
            )
            .with_port(Port::exec_out("then"));
            for param in signature.inputs() {
                node.ports.push(Port::data_out(param.name.clone(), param.ty.clone()));
            }
            let params = event_params(&node);
            let spec = match &node.kind {
                NodeKind::Event(spec) => spec.clone(),
                _ => EventSpec::default(),
            };
            let id = graph.add_node(node);
            provenance.record_alias(id, &entry_origin);
            debug!(event = %signature.name, interface = %iface.name, "added empty interface event");
            events.insert(
                signature.name.clone(),
                EventInfo {
                    node: id,
                    spec,
                    params,
                    origin: provenance.origin(id).cloned(),
                },
            );
        }
    }

    (
        EventGraph {
            graph,
            provenance,
            entry,
            events,
        },
        issues,
    )
}

fn event_params(node: &Node) -> Vec<ParamSig> {
    node.ports_where(PortRole::Data, PortDirection::Out)
        .map(|(_, p)| ParamSig::input(p.name.clone(), p.ty.clone()))
        .collect()
}

/// Builds the stub function of one event.
pub fn build_stub(info: &EventInfo) -> EventStub {
    let event = info.spec.name.clone();
    let mut graph = Graph::new(event.clone());

    let mut entry = Node::new(
        NodeKind::FunctionEntry(EntrySpec {
            function: event.clone(),
            locals: Vec::new(),
            flags: info.spec.flags | FunctionFlags::EVENT,
            computed_dispatch: false,
        }),
        event.clone(),
    )
    .with_port(Port::exec_out("then"));
    let mut assign = Node::persistent_frame_assign();
    for param in &info.params {
        entry.ports.push(Port::data_out(param.name.clone(), param.ty.clone()));
        assign.ports.push(Port::data_in(
            persistent_slot_name(&event, &param.name),
            param.ty.clone(),
        ));
    }

    let entry = graph.add_node(entry);
    let assign = graph.add_node(assign);
    let call = graph.add_node(Node::call_event_graph(event.clone()));
    let result = graph.add_node(Node::result());

    let mut links = vec![
        (PortRef::new(entry, 0), PortRef::new(assign, 0)),
        (PortRef::new(assign, 1), PortRef::new(call, 0)),
        (PortRef::new(call, 1), PortRef::new(result, 0)),
    ];
    for i in 0..info.params.len() as u16 {
        links.push((PortRef::new(entry, 1 + i), PortRef::new(assign, 2 + i)));
    }
    for (from, to) in links {
        // Freshly built ports of matching kinds; connect cannot fail here.
        let _ = graph.connect(from, to);
    }

    let mut provenance = Provenance::new();
    if let Some(origin) = &info.origin {
        for id in [entry, assign, call, result] {
            provenance.record_alias(id, origin);
        }
    }

    EventStub {
        event,
        spec: info.spec.clone(),
        graph,
        provenance,
    }
}
