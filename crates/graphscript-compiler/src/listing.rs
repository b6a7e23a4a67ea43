//! Backends consuming compiled classes.
//!
//! A backend turns the statement lists of a [`CompiledClass`] into its own
//! output format. The only backend shipped here is [`ListingBackend`], a
//! deterministic text rendering used by the CLI and by tests.

use std::fmt::Write as _;

use graphscript_core::{FunctionFlags, FunctionSignature, ParamDirection};

use crate::assemble::{Storage, SymbolTable};
use crate::compiler::{CompiledClass, CompiledFunction};
use crate::layout::{DefaultValue, MemberOrigin};
use crate::statement::{JumpTarget, Statement};
use crate::term::TermId;

/// Consumes compiled classes.
pub trait Backend {
    type Output;

    fn emit_class(&mut self, class: &CompiledClass) -> Self::Output;
}

/// Renders a class as a human-readable listing.
#[derive(Debug, Clone, Default)]
pub struct ListingBackend {
    /// Append the authored origin of each statement.
    pub show_origins: bool,
}

impl ListingBackend {
    pub fn new() -> Self {
        ListingBackend::default()
    }

    pub fn with_origins(mut self) -> Self {
        self.show_origins = true;
        self
    }

    fn render_function(&self, function: &CompiledFunction, lines: &mut Vec<String>) {
        lines.push(format!(
            "function {}{}",
            signature_text(&function.signature),
            flags_text(function.signature.flags)
        ));
        if let Some(owner) = &function.override_of {
            lines.push(format!("  overrides {owner}"));
        }
        if function.abandoned {
            lines.push("  abandoned".to_string());
        }
        let width = function.body.len().saturating_sub(1).to_string().len();
        for (offset, statement) in function.body.statements.iter().enumerate() {
            let mut line = format!(
                "  {offset:>width$}: {}",
                statement_text(statement, &function.symbols)
            );
            if self.show_origins {
                if let Some(Some(origin)) = function.body.origins.get(offset) {
                    let _ = write!(line, "  ; {}", origin.source);
                    if let Some(site) = origin.call_site() {
                        let _ = write!(line, " via {site}");
                    }
                }
            }
            lines.push(line);
        }
    }
}

impl Backend for ListingBackend {
    type Output = String;

    fn emit_class(&mut self, class: &CompiledClass) -> String {
        let mut lines = Vec::new();
        match &class.layout.parent {
            Some(parent) => lines.push(format!("class {} : {parent}", class.name)),
            None => lines.push(format!("class {}", class.name)),
        }
        if !class.layout.interfaces.is_empty() {
            lines.push(format!("  implements {}", class.layout.interfaces.join(", ")));
        }
        for member in class.layout.members.values() {
            let kind = match member.origin {
                MemberOrigin::Variable => "var",
                MemberOrigin::Component => "component",
                MemberOrigin::PersistentFrame => "frame",
            };
            let default = class
                .default_object
                .as_ref()
                .and_then(|o| o.get(&member.name))
                .map(value_text)
                .or_else(|| member.default_value.clone())
                .unwrap_or_else(|| "-".to_string());
            lines.push(format!("  {kind} {}: {} = {default}", member.name, member.ty));
        }
        for function in &class.functions {
            self.render_function(function, &mut lines);
        }
        lines.join("\n")
    }
}

fn signature_text(signature: &FunctionSignature) -> String {
    let params: Vec<String> = signature
        .params
        .iter()
        .map(|p| match p.direction {
            ParamDirection::Input => format!("{}: {}", p.name, p.ty),
            ParamDirection::Output => format!("out {}: {}", p.name, p.ty),
        })
        .collect();
    format!("{}({})", signature.name, params.join(", "))
}

fn flags_text(flags: FunctionFlags) -> String {
    flags
        .iter_names()
        .map(|(name, _)| format!(" {}", name.to_ascii_lowercase()))
        .collect()
}

fn term_text(term: TermId, symbols: &SymbolTable) -> String {
    match symbols.get(term) {
        Some(symbol) => match &symbol.storage {
            Storage::Literal(value) if value.is_empty() => "\"\"".to_string(),
            Storage::Literal(value) => value.clone(),
            Storage::Member(name) => format!("self.{name}"),
            Storage::Parameter(_) | Storage::Local(_) => symbol.name.clone(),
        },
        None => term.to_string(),
    }
}

fn terms_text(terms: &[TermId], symbols: &SymbolTable) -> String {
    terms
        .iter()
        .map(|t| term_text(*t, symbols))
        .collect::<Vec<_>>()
        .join(", ")
}

fn target_text(target: &JumpTarget) -> String {
    match target {
        JumpTarget::Node(node) => format!("node {node}"),
        JumpTarget::Offset(offset) => format!("@{offset}"),
        JumpTarget::EndOfThread => "end".to_string(),
    }
}

fn statement_text(statement: &Statement, symbols: &SymbolTable) -> String {
    match statement {
        Statement::Comment(text) => format!("// {text}"),
        Statement::DebugSite(node) => format!("debug_site {node}"),
        Statement::InstrumentationBoundary { site, call_site } => match call_site {
            Some(site_ref) => format!("boundary {site:?} via {site_ref}"),
            None => format!("boundary {site:?}"),
        },
        Statement::CallFunction {
            function,
            args,
            results,
        } => {
            let call = format!("call {function}({})", terms_text(args, symbols));
            if results.is_empty() {
                call
            } else {
                format!("{call} -> {}", terms_text(results, symbols))
            }
        }
        Statement::Assign { dest, src } => {
            format!("{} = {}", term_text(*dest, symbols), term_text(*src, symbols))
        }
        Statement::CreateArray { dest, elements } => format!(
            "{} = [{}]",
            term_text(*dest, symbols),
            terms_text(elements, symbols)
        ),
        Statement::Goto(target) => format!("goto {}", target_text(target)),
        Statement::GotoIfNot { condition, target } => format!(
            "if not {} goto {}",
            term_text(*condition, symbols),
            target_text(target)
        ),
        Statement::PushFlow(target) => format!("push_flow {}", target_text(target)),
        Statement::EndOfThread => "end_of_thread".to_string(),
        Statement::ComputedGoto { index } => format!("goto *{}", term_text(*index, symbols)),
        Statement::CallEventGraph {
            function,
            event,
            entry_offset,
        } => {
            let offset = entry_offset
                .map(|o| format!("@{o}"))
                .unwrap_or_else(|| "@?".to_string());
            format!("call_event_graph {function} {offset} ({event})")
        }
        Statement::Return => "return".to_string(),
        Statement::Custom { name, args } => format!("{name}({})", terms_text(args, symbols)),
    }
}

fn value_text(value: &DefaultValue) -> String {
    match value {
        DefaultValue::Bool(b) => b.to_string(),
        DefaultValue::Int(i) => i.to_string(),
        DefaultValue::Float(f) => format!("{f:?}"),
        DefaultValue::Str(s) => format!("{s:?}"),
        DefaultValue::Name(n) => n.clone(),
        DefaultValue::Enum { enum_name, value } => format!("{enum_name}::{value}"),
        DefaultValue::Struct(text) => format!("({text})"),
        DefaultValue::Object(Some(name)) => name.clone(),
        DefaultValue::Object(None) | DefaultValue::None => "None".to_string(),
        DefaultValue::Array(items) => format!(
            "({})",
            items.iter().map(value_text).collect::<Vec<_>>().join(", ")
        ),
    }
}
