//! Macro and tunnel expansion.
//!
//! Macro instances and composite nodes are replaced by a copy of their body
//! graph. The body's input and output tunnels are collapsed by wiring the
//! instance's outer links straight to the body's inner links, port by port
//! and name by name. Expansion repeats until no instance or tunnel is left,
//! since a body may itself contain instances.
//!
//! Every node expansion creates is recorded in the provenance table with
//! the call site it was inlined through, including the nodes synthesized
//! for unlinked inputs: an empty `MakeArray` for array inputs and an
//! `EnumLiteral` for enum inputs with a default.

use graphscript_core::{
    BoundarySite, Graph, MacroLibrary, Node, NodeId, NodeKind, PinType, PortDirection, PortRef,
    PortRole, TunnelSide,
};
use tracing::debug;

use crate::context::FunctionContext;
use crate::diagnostics::Issue;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExpansionStats {
    pub instances_expanded: usize,
    pub tunnels_collapsed: usize,
    pub nodes_synthesized: usize,
    pub rounds: usize,
}

/// A ceiling was hit; the graph is left partially expanded.
struct Halted;

/// Expands the working graph of `ctx` to a fixed point.
pub fn expand(ctx: &mut FunctionContext<'_>, macros: &MacroLibrary) -> ExpansionStats {
    let mut stats = ExpansionStats::default();
    loop {
        let instances = ctx.graph.find_nodes(|n| n.kind.is_instance());
        let tunnels = ctx.graph.find_nodes(|n| n.kind.is_tunnel());
        if instances.is_empty() && tunnels.is_empty() {
            break;
        }
        stats.rounds += 1;

        if instances.is_empty() {
            for id in tunnels {
                collapse_tunnel(ctx, id, &mut stats);
            }
            continue;
        }
        for id in instances {
            if expand_instance(ctx, macros, id, &mut stats).is_err() {
                debug!(function = %ctx.function, rounds = stats.rounds, "expansion halted");
                return stats;
            }
        }
    }
    debug!(
        function = %ctx.function,
        instances = stats.instances_expanded,
        tunnels = stats.tunnels_collapsed,
        synthesized = stats.nodes_synthesized,
        "expansion finished"
    );
    stats
}

fn remove_working(ctx: &mut FunctionContext<'_>, id: NodeId) {
    // Only called with ids read from the live graph.
    let _ = ctx.graph.remove_node(id);
    ctx.provenance.forget(id);
}

fn expand_instance(
    ctx: &mut FunctionContext<'_>,
    macros: &MacroLibrary,
    id: NodeId,
    stats: &mut ExpansionStats,
) -> Result<(), Halted> {
    let Some(instance) = ctx.graph.node(id).cloned() else {
        return Ok(());
    };
    let (body, resolved): (Graph, Option<PinType>) = match &instance.kind {
        NodeKind::MacroInstance {
            macro_name,
            resolved_type,
        } => match macros.get(macro_name) {
            Some(body) => (body.clone(), resolved_type.clone()),
            None => {
                ctx.report(
                    Issue::MissingMacro {
                        node: instance.title.clone(),
                        macro_name: macro_name.clone(),
                    },
                    Some(id),
                    None,
                );
                remove_working(ctx, id);
                return Ok(());
            }
        },
        NodeKind::Composite { body } => ((**body).clone(), None),
        _ => return Ok(()),
    };
    let body_name = body.name().to_string();

    let max_depth = ctx.options.max_expansion_depth as usize;
    if ctx.provenance.depth(id) >= max_depth {
        ctx.report(
            Issue::RecursiveExpansion {
                macro_name: body_name,
                detail: format!("instances nest deeper than {max_depth} levels"),
            },
            Some(id),
            None,
        );
        return Err(Halted);
    }

    let map = ctx.graph.merge_from(&body);
    ctx.provenance.record_expansion(&map, &body_name, id);
    stats.instances_expanded += 1;

    let max_nodes = ctx.options.max_expanded_nodes;
    if ctx.graph.node_count() > max_nodes {
        ctx.report(
            Issue::RecursiveExpansion {
                macro_name: body_name,
                detail: format!("expanded graph exceeds {max_nodes} nodes"),
            },
            Some(id),
            None,
        );
        return Err(Halted);
    }

    let copies: Vec<NodeId> = map.copies().collect();
    if let Some(resolved) = &resolved {
        for &copy in &copies {
            if let Some(node) = ctx.graph.node_mut(copy) {
                for port in node.ports.iter_mut() {
                    port.ty = port.ty.resolve_wildcard(resolved);
                }
            }
        }
    }

    let tunnel_of = |ctx: &FunctionContext<'_>, side: TunnelSide| -> Vec<NodeId> {
        copies
            .iter()
            .copied()
            .filter(|c| {
                matches!(
                    ctx.graph.node(*c).map(|n| &n.kind),
                    Some(NodeKind::Tunnel(s)) if *s == side
                )
            })
            .collect()
    };
    let inputs = tunnel_of(ctx, TunnelSide::Input);
    let outputs = tunnel_of(ctx, TunnelSide::Output);
    if inputs.len() > 1 || outputs.len() > 1 {
        ctx.report(
            Issue::TunnelCollapse {
                node: instance.title.clone(),
                reason: format!(
                    "body '{body_name}' has {} input and {} output tunnels; \
                     expected at most one of each",
                    inputs.len(),
                    outputs.len()
                ),
            },
            Some(id),
            None,
        );
        for copy in copies {
            remove_working(ctx, copy);
        }
        remove_working(ctx, id);
        return Ok(());
    }

    for (index, port) in instance.ports.iter().enumerate() {
        let outer = PortRef::new(id, index as u16);
        let (tunnel, inner_direction, site) = match port.direction {
            PortDirection::In => (inputs.first(), PortDirection::Out, BoundarySite::Entry),
            PortDirection::Out => (outputs.first(), PortDirection::In, BoundarySite::Exit),
        };
        let inner = tunnel.and_then(|t| ctx.graph.find_port(*t, &port.name, inner_direction));
        let Some(inner) = inner else {
            if ctx.graph.is_linked(outer) {
                ctx.report(
                    Issue::MissingTunnelPort {
                        node: instance.title.clone(),
                        macro_name: body_name.clone(),
                        port: port.name.clone(),
                    },
                    Some(id),
                    Some(index as u16),
                );
            }
            continue;
        };
        match port.direction {
            PortDirection::In => splice(ctx, outer, inner, Some(site), id, stats),
            PortDirection::Out => splice(ctx, inner, outer, Some(site), id, stats),
        }
    }

    for &copy in &copies {
        let Some(node) = ctx.graph.node(copy) else {
            continue;
        };
        if node.kind.is_tunnel() {
            continue;
        }
        let unlinked: Vec<(u16, PinType, Option<String>)> = node
            .ports_where(PortRole::Data, PortDirection::In)
            .filter(|(i, _)| !ctx.graph.is_linked(PortRef::new(copy, *i)))
            .map(|(i, p)| (i, p.ty.clone(), p.default_value.clone()))
            .collect();
        for (index, ty, default) in unlinked {
            let (literal, out) = if ty.is_array() {
                (Node::make_array(ty.base.clone(), 0), 0)
            } else if let (Some(enum_name), Some(default)) = (ty.enum_name(), default) {
                (Node::enum_literal(enum_name, default), 1)
            } else {
                continue;
            };
            let synthesized = ctx.graph.add_node(literal);
            ctx.provenance.record_synthesized(synthesized, id);
            stats.nodes_synthesized += 1;
            if let Err(err) = ctx
                .graph
                .connect(PortRef::new(synthesized, out), PortRef::new(copy, index))
            {
                ctx.report(
                    Issue::InvalidLink {
                        reason: err.to_string(),
                    },
                    Some(copy),
                    Some(index),
                );
            }
        }
    }

    for tunnel in inputs.into_iter().chain(outputs) {
        remove_working(ctx, tunnel);
        stats.tunnels_collapsed += 1;
    }
    remove_working(ctx, id);
    Ok(())
}

/// Wires everything linked to input port `upstream` straight to everything
/// linked to output port `downstream`, then unlinks both. Unlinked data
/// inputs hand their default on to the downstream consumers.
fn splice(
    ctx: &mut FunctionContext<'_>,
    upstream: PortRef,
    downstream: PortRef,
    site: Option<BoundarySite>,
    call_site: NodeId,
    stats: &mut ExpansionStats,
) {
    let Some(port) = ctx.graph.port(upstream).cloned() else {
        return;
    };
    let sources = ctx.graph.links(upstream);
    let sinks = ctx.graph.links(downstream);
    ctx.graph.disconnect(upstream);
    ctx.graph.disconnect(downstream);

    if port.role == PortRole::Data && sources.is_empty() {
        if let Some(default) = &port.default_value {
            for sink in &sinks {
                if let Some(p) = ctx.graph.port_mut(*sink) {
                    p.default_value = Some(default.clone());
                }
            }
        }
        return;
    }

    let mut targets = vec![(sources, sinks)];
    if let (PortRole::Control, Some(site)) = (port.role, site) {
        let (sources, sinks) = &targets[0];
        if ctx.options.debug_instrumentation && !sources.is_empty() && !sinks.is_empty() {
            let boundary = ctx.graph.add_node(Node::tunnel_boundary(site));
            ctx.provenance.record_synthesized(boundary, call_site);
            stats.nodes_synthesized += 1;
            let entry = PortRef::new(boundary, 0);
            let exit = PortRef::new(boundary, 1);
            targets = vec![
                (sources.clone(), vec![entry]),
                (vec![exit], sinks.clone()),
            ];
        }
    }

    for (sources, sinks) in targets {
        for source in &sources {
            for sink in &sinks {
                if let Err(err) = ctx.graph.connect(*source, *sink) {
                    ctx.report(
                        Issue::InvalidLink {
                            reason: err.to_string(),
                        },
                        Some(sink.node),
                        Some(sink.index),
                    );
                }
            }
        }
    }
}

/// Collapses a tunnel that is not the boundary of an instance being
/// expanded: each input is wired through to the output of the same name.
fn collapse_tunnel(ctx: &mut FunctionContext<'_>, id: NodeId, stats: &mut ExpansionStats) {
    let Some(node) = ctx.graph.node(id).cloned() else {
        return;
    };
    for (index, port) in node.ports.iter().enumerate() {
        let this = PortRef::new(id, index as u16);
        let opposite = match port.direction {
            PortDirection::In => PortDirection::Out,
            PortDirection::Out => PortDirection::In,
        };
        match ctx.graph.find_port(id, &port.name, opposite) {
            Some(other) if port.direction == PortDirection::In => {
                splice(ctx, this, other, None, id, stats)
            }
            Some(_) => {}
            None if ctx.graph.is_linked(this) => ctx.report(
                Issue::TunnelCollapse {
                    node: node.title.clone(),
                    reason: format!("port '{}' has no counterpart to pass through", port.name),
                },
                Some(id),
                Some(index as u16),
            ),
            None => {}
        }
    }
    remove_working(ctx, id);
    stats.tunnels_collapsed += 1;
}
