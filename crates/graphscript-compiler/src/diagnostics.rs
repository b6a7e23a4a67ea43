//! Compiler diagnostics with authored source locations.
//!
//! [`Issue`] enumerates everything the compiler can report about an authored
//! unit, with enough context to explain the problem without further graph
//! queries. A [`Diagnostic`] pairs an issue with a [`SourceLocation`] that
//! always refers to authored content, resolved through the provenance table.
//!
//! Every issue belongs to one [`DiagnosticKind`]. Structural, type and
//! signature issues are errors and abandon the function they occur in;
//! warning-class issues never stop compilation.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::provenance::SourceRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagnosticKind {
    /// Malformed graph.
    Structural,
    /// Unresolved or incompatible types.
    Type,
    /// An override diverges from the signature it overrides.
    SignatureMismatch,
    /// Recorded with a fallback applied.
    Warning,
}

impl DiagnosticKind {
    pub fn severity(self) -> Severity {
        match self {
            DiagnosticKind::Warning => Severity::Warning,
            _ => Severity::Error,
        }
    }
}

/// Something wrong with the authored unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum Issue {
    // -- structural ----------------------------------------------------------
    #[error("could not find a root node in graph '{graph}'")]
    MissingEntry { graph: String },

    #[error("graph '{graph}' has {count} entry nodes; a function has exactly one")]
    MultipleEntries { graph: String, count: usize },

    #[error("function '{name}' is defined more than once")]
    DuplicateFunction { name: String },

    #[error("event '{name}' is implemented more than once")]
    DuplicateEvent { name: String },

    #[error("control output '{port}' of '{node}' has {count} links; at most one is allowed")]
    ControlFanOut {
        node: String,
        port: String,
        count: usize,
    },

    #[error("data input '{port}' of '{node}' has {count} links; at most one is allowed")]
    DataFanIn {
        node: String,
        port: String,
        count: usize,
    },

    #[error("control flow cycle through {nodes:?} without a loop node")]
    ScheduleCycle { nodes: Vec<String> },

    #[error("macro node '{node}' is pointing at an invalid macro graph '{macro_name}'")]
    MissingMacro { node: String, macro_name: String },

    #[error("recursive expansion of '{macro_name}': {detail}")]
    RecursiveExpansion { macro_name: String, detail: String },

    #[error("macro '{macro_name}' has no port '{port}' used by instance '{node}'")]
    MissingTunnelPort {
        node: String,
        macro_name: String,
        port: String,
    },

    #[error("failed to collapse tunnel '{node}': {reason}")]
    TunnelCollapse { node: String, reason: String },

    #[error("'{name}' names both a class member and a persistent frame slot")]
    ClassSlotClash { name: String },

    #[error("unexpected node type {kind} on '{node}': no handler is registered")]
    UnknownNodeKind { node: String, kind: String },

    #[error("'{node}' refers to unknown variable '{variable}'")]
    UnknownVariable { node: String, variable: String },

    #[error("could not rewire links: {reason}")]
    InvalidLink { reason: String },

    // -- type ----------------------------------------------------------------
    #[error("'{from_node}'.{from_port} ({actual}) cannot connect to '{to_node}'.{to_port} ({expected})")]
    TypeMismatch {
        from_node: String,
        from_port: String,
        to_node: String,
        to_port: String,
        expected: String,
        actual: String,
    },

    #[error("interface '{interface}' connected to object input '{node}'.{port} ({class}); use an explicit cast")]
    InterfaceToObject {
        node: String,
        port: String,
        interface: String,
        class: String,
    },

    #[error("port '{port}' of '{node}' still has a wildcard type after expansion")]
    UnresolvedWildcard { node: String, port: String },

    // -- signature -----------------------------------------------------------
    #[error("cannot order parameters {param} in function {function}")]
    ParameterOrder { function: String, param: String },

    #[error("parameter '{param}' of {function} does not exist in the overridden signature")]
    UnexpectedParameter { function: String, param: String },

    #[error("parameter '{param}' of {function} is {actual}; the overridden signature declares {expected}")]
    ParameterType {
        function: String,
        param: String,
        expected: String,
        actual: String,
    },

    #[error("{function} declares network flags that differ from {parent}")]
    NetFlagMismatch { function: String, parent: String },

    #[error("{function} is marked as an override but nothing named so is inherited")]
    MissingOverrideTarget { function: String },

    // -- warnings ------------------------------------------------------------
    #[error("'{node}' was pruned; '{consumer}' will read its value as default")]
    PrunedValueReadAsDefault { node: String, consumer: String },

    #[error("'{node}' is not pure but has no control ports and was not reached")]
    NonPureWithoutControl { node: String },

    #[error("'{from}' conflicts with an existing name and was renamed to '{to}'")]
    NameAutoRenamed { from: String, to: String },

    #[error("'{node}' is deprecated")]
    DeprecatedNode { node: String },

    #[error("default '{value}' of '{member}' is not a valid {ty}; using the type's zero value")]
    UnparsableDefault {
        member: String,
        value: String,
        ty: String,
    },

    #[error("access specifier of {function} differs from {parent}; inherited specifier used")]
    AccessSpecifierMismatch { function: String, parent: String },
}

impl Issue {
    pub fn kind(&self) -> DiagnosticKind {
        use Issue::*;
        match self {
            MissingEntry { .. }
            | MultipleEntries { .. }
            | DuplicateFunction { .. }
            | DuplicateEvent { .. }
            | ControlFanOut { .. }
            | DataFanIn { .. }
            | ScheduleCycle { .. }
            | MissingMacro { .. }
            | RecursiveExpansion { .. }
            | MissingTunnelPort { .. }
            | TunnelCollapse { .. }
            | ClassSlotClash { .. }
            | UnknownNodeKind { .. }
            | UnknownVariable { .. }
            | InvalidLink { .. } => DiagnosticKind::Structural,
            TypeMismatch { .. } | InterfaceToObject { .. } | UnresolvedWildcard { .. } => {
                DiagnosticKind::Type
            }
            ParameterOrder { .. }
            | UnexpectedParameter { .. }
            | ParameterType { .. }
            | NetFlagMismatch { .. }
            | MissingOverrideTarget { .. } => DiagnosticKind::SignatureMismatch,
            PrunedValueReadAsDefault { .. }
            | NonPureWithoutControl { .. }
            | NameAutoRenamed { .. }
            | DeprecatedNode { .. }
            | UnparsableDefault { .. }
            | AccessSpecifierMismatch { .. } => DiagnosticKind::Warning,
        }
    }
}

/// Where a diagnostic points in authored content.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    /// Function (or class, for unit-level issues) being compiled.
    pub function: String,
    pub source: Option<SourceRef>,
    pub port: Option<String>,
    /// Outermost call site when the node was inlined from a macro.
    pub call_site: Option<SourceRef>,
}

impl SourceLocation {
    pub fn function(function: impl Into<String>) -> Self {
        SourceLocation {
            function: function.into(),
            ..SourceLocation::default()
        }
    }
}

/// An issue with its location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub issue: Issue,
    pub location: SourceLocation,
}

impl Diagnostic {
    pub fn new(issue: Issue, location: SourceLocation) -> Self {
        Diagnostic { issue, location }
    }

    pub fn kind(&self) -> DiagnosticKind {
        self.issue.kind()
    }

    pub fn severity(&self) -> Severity {
        self.kind().severity()
    }

    pub fn is_error(&self) -> bool {
        self.severity() == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let severity = match self.severity() {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(f, "{severity}: {} [{}", self.issue, self.location.function)?;
        if let Some(source) = &self.location.source {
            write!(f, " at {source}")?;
        }
        if let Some(port) = &self.location.port {
            write!(f, ".{port}")?;
        }
        if let Some(site) = &self.location.call_site {
            write!(f, " via {site}")?;
        }
        write!(f, "]")
    }
}

/// Diagnostics accumulated for a whole unit, in report order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageLog {
    diagnostics: Vec<Diagnostic>,
}

impl MessageLog {
    pub fn new() -> Self {
        MessageLog::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub fn extend(&mut self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        self.diagnostics.extend(diagnostics);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter()
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| !d.is_error())
    }

    pub fn has_errors(&self) -> bool {
        self.errors().next().is_some()
    }

    pub fn error_count(&self) -> usize {
        self.errors().count()
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// Diagnostics reported against one function.
    pub fn for_function<'a>(&'a self, function: &'a str) -> impl Iterator<Item = &'a Diagnostic> {
        self.diagnostics
            .iter()
            .filter(move |d| d.location.function == function)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphscript_core::NodeId;

    #[test]
    fn kinds_map_to_severity() {
        let warn = Issue::DeprecatedNode { node: "Delay".into() };
        assert_eq!(warn.kind(), DiagnosticKind::Warning);
        assert_eq!(warn.kind().severity(), Severity::Warning);

        let sig = Issue::ParameterOrder {
            function: "Tick".into(),
            param: "delta".into(),
        };
        assert_eq!(sig.kind(), DiagnosticKind::SignatureMismatch);
        assert_eq!(sig.kind().severity(), Severity::Error);
    }

    #[test]
    fn display_includes_location() {
        let diag = Diagnostic::new(
            Issue::ControlFanOut {
                node: "Branch".into(),
                port: "true".into(),
                count: 2,
            },
            SourceLocation {
                function: "Main".into(),
                source: Some(SourceRef::new("Main", NodeId(3))),
                port: Some("true".into()),
                call_site: Some(SourceRef::new("Main", NodeId(1))),
            },
        );
        assert_eq!(
            diag.to_string(),
            "error: control output 'true' of 'Branch' has 2 links; at most one is allowed \
             [Main at Main#3.true via Main#1]"
        );
    }

    #[test]
    fn log_counts_errors_and_warnings() {
        let mut log = MessageLog::new();
        log.push(Diagnostic::new(
            Issue::DeprecatedNode { node: "A".into() },
            SourceLocation::function("F"),
        ));
        assert!(!log.has_errors());
        log.push(Diagnostic::new(
            Issue::MissingEntry { graph: "G".into() },
            SourceLocation::function("G"),
        ));
        assert!(log.has_errors());
        assert_eq!(log.error_count(), 1);
        assert_eq!(log.warnings().count(), 1);
        assert_eq!(log.for_function("G").count(), 1);
    }
}
