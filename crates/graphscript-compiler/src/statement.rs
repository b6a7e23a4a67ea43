//! Abstract statements and function bodies.
//!
//! Handlers emit statements per node with jumps addressed to nodes. Once
//! the schedule is known, [`link_blocks`] lays the per-node blocks out in
//! execution order, drops jumps that would only fall through to the next
//! block, and resolves node targets to statement offsets.

use graphscript_core::{BoundarySite, NodeId};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::provenance::{Origin, SourceRef};
use crate::term::TermId;

/// Destination of a jump.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JumpTarget {
    /// First statement of a node's block. Only present before linking.
    Node(NodeId),
    Offset(usize),
    /// Resume the next pushed flow, or return when none is left.
    EndOfThread,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Statement {
    Comment(String),
    /// Debugger stop point for the node that emitted it.
    DebugSite(NodeId),
    /// Execution enters or leaves an inlined macro body.
    InstrumentationBoundary {
        site: BoundarySite,
        call_site: Option<SourceRef>,
    },
    CallFunction {
        function: String,
        args: Vec<TermId>,
        results: Vec<TermId>,
    },
    Assign {
        dest: TermId,
        src: TermId,
    },
    CreateArray {
        dest: TermId,
        elements: Vec<TermId>,
    },
    Goto(JumpTarget),
    GotoIfNot {
        condition: TermId,
        target: JumpTarget,
    },
    /// Remember a target to continue at after the current thread ends.
    PushFlow(JumpTarget),
    EndOfThread,
    /// Jump to the statement offset held in `index`.
    ComputedGoto {
        index: TermId,
    },
    /// Call the shared event graph at the entry of `event`.
    CallEventGraph {
        function: String,
        event: String,
        entry_offset: Option<usize>,
    },
    Return,
    Custom {
        name: String,
        args: Vec<TermId>,
    },
}

impl Statement {
    fn jump_target_mut(&mut self) -> Option<&mut JumpTarget> {
        match self {
            Statement::Goto(target)
            | Statement::PushFlow(target)
            | Statement::GotoIfNot { target, .. } => Some(target),
            _ => None,
        }
    }

    pub fn jump_target(&self) -> Option<JumpTarget> {
        match self {
            Statement::Goto(target)
            | Statement::PushFlow(target)
            | Statement::GotoIfNot { target, .. } => Some(*target),
            _ => None,
        }
    }
}

/// Statements of one scheduled node, with any pure prelude copied in front.
/// Each statement is tagged with the node that emitted it.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub node: NodeId,
    pub statements: Vec<(NodeId, Statement)>,
}

/// A linked function body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Body {
    pub statements: Vec<Statement>,
    /// Offset of each scheduled node's block.
    pub block_starts: IndexMap<NodeId, usize>,
    /// Emitting node of each statement.
    pub statement_nodes: Vec<NodeId>,
    /// Authored origin of each statement, for debugger correlation.
    pub origins: Vec<Option<Origin>>,
}

impl Body {
    /// Body substituted for a function whose compilation was abandoned.
    pub fn stub() -> Self {
        Body {
            statements: vec![Statement::Return],
            ..Body::default()
        }
    }

    pub fn block_start(&self, node: NodeId) -> Option<usize> {
        self.block_starts.get(&node).copied()
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}

/// Lays out blocks in order and resolves node jumps to offsets.
pub fn link_blocks(mut blocks: Vec<Block>, origin_of: impl Fn(NodeId) -> Option<Origin>) -> Body {
    for i in 0..blocks.len() {
        let next = blocks.get(i + 1).map(|b| b.node);
        let falls_through = matches!(
            blocks[i].statements.last(),
            Some((_, Statement::Goto(JumpTarget::Node(target)))) if Some(*target) == next
        );
        if falls_through {
            blocks[i].statements.pop();
        }
    }

    let mut block_starts = IndexMap::with_capacity(blocks.len());
    let mut offset = 0;
    for block in &blocks {
        block_starts.insert(block.node, offset);
        offset += block.statements.len();
    }

    let mut body = Body {
        statements: Vec::with_capacity(offset),
        block_starts,
        statement_nodes: Vec::with_capacity(offset),
        origins: Vec::with_capacity(offset),
    };
    for block in blocks {
        for (node, mut statement) in block.statements {
            if let Some(target) = statement.jump_target_mut() {
                if let JumpTarget::Node(to) = *target {
                    *target = match body.block_starts.get(&to) {
                        Some(offset) => JumpTarget::Offset(*offset),
                        None => JumpTarget::EndOfThread,
                    };
                }
            }
            body.statements.push(statement);
            body.statement_nodes.push(node);
            body.origins.push(origin_of(node));
        }
    }
    body
}
