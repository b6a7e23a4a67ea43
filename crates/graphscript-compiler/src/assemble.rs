//! Function assembly: signatures and symbol tables.
//!
//! The declared signature of a function comes from its parameter and output
//! terms. When the function overrides an inherited signature, its
//! parameters are reordered to the inherited order, matched by name, and
//! its flags are reconciled with the inherited ones. Terms are then given
//! concrete storage: parameter slots in signature order, function locals,
//! class members, or literals.

use graphscript_core::{FunctionFlags, FunctionSignature, ParamDirection, ParamSig, PinType};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::diagnostics::{Issue, Severity};
use crate::term::{TermId, TermKind, TermTable};

/// Signature as declared by the function's own terms: inputs then outputs,
/// each in registration order.
pub fn declared_signature(
    name: &str,
    terms: &TermTable,
    flags: FunctionFlags,
) -> FunctionSignature {
    let inputs = terms
        .of_kind(TermKind::Parameter)
        .map(|t| ParamSig::input(t.declared_name.clone(), t.ty.clone()));
    let outputs = terms
        .of_kind(TermKind::Output)
        .map(|t| ParamSig::output(t.declared_name.clone(), t.ty.clone()));
    FunctionSignature {
        name: name.to_string(),
        params: inputs.chain(outputs).collect(),
        flags,
    }
}

/// A signature after reconciliation with what it overrides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureMatch {
    pub signature: FunctionSignature,
    /// Class or interface declaring the overridden signature.
    pub override_of: Option<String>,
    pub issues: Vec<Issue>,
}

impl SignatureMatch {
    pub fn has_errors(&self) -> bool {
        self.issues.iter().any(|i| i.kind().severity() == Severity::Error)
    }
}

/// Reconciles `declared` with the inherited signature, if any.
///
/// `must_override` is set for events flagged as overrides; finding nothing
/// to override is then an error.
pub fn resolve_signature(
    declared: FunctionSignature,
    inherited: Option<(&str, &FunctionSignature)>,
    must_override: bool,
) -> SignatureMatch {
    let function = declared.name.clone();
    let Some((owner, parent)) = inherited else {
        let mut issues = Vec::new();
        if must_override {
            issues.push(Issue::MissingOverrideTarget {
                function: function.clone(),
            });
        }
        let flags = own_flags(declared.flags);
        return SignatureMatch {
            signature: FunctionSignature { flags, ..declared },
            override_of: None,
            issues,
        };
    };

    let mut issues = Vec::new();
    let mut ordered = Vec::with_capacity(parent.params.len());
    for expected in &parent.params {
        match declared.param(&expected.name) {
            None => issues.push(Issue::ParameterOrder {
                function: function.clone(),
                param: expected.name.clone(),
            }),
            Some(actual) if actual.ty != expected.ty || actual.direction != expected.direction => {
                issues.push(Issue::ParameterType {
                    function: function.clone(),
                    param: expected.name.clone(),
                    expected: describe(expected),
                    actual: describe(actual),
                })
            }
            Some(actual) => ordered.push(actual.clone()),
        }
    }
    for extra in declared
        .params
        .iter()
        .filter(|p| parent.param(&p.name).is_none())
    {
        issues.push(Issue::UnexpectedParameter {
            function: function.clone(),
            param: extra.name.clone(),
        });
    }
    let params = if issues.is_empty() {
        ordered
    } else {
        declared.params.clone()
    };

    let mut flags = declared.flags;
    let declared_access = declared.flags.access();
    let parent_access = match parent.flags.access() {
        access if access.is_empty() => FunctionFlags::PUBLIC,
        access => access,
    };
    if !declared_access.is_empty() && declared_access != parent_access {
        issues.push(Issue::AccessSpecifierMismatch {
            function: function.clone(),
            parent: owner.to_string(),
        });
    }
    flags.remove(FunctionFlags::ACCESS);
    flags.insert(parent_access);

    if !declared.flags.net().is_empty() && declared.flags.net() != parent.flags.net() {
        issues.push(Issue::NetFlagMismatch {
            function: function.clone(),
            parent: owner.to_string(),
        });
    }
    flags.remove(FunctionFlags::NET_FUNC);
    flags.insert(parent.flags.net());

    let inherited_bits = FunctionFlags::PURE | FunctionFlags::CONST | FunctionFlags::OVERRIDABLE;
    flags.insert(parent.flags & inherited_bits);

    SignatureMatch {
        signature: FunctionSignature {
            name: declared.name,
            params,
            flags,
        },
        override_of: Some(owner.to_string()),
        issues,
    }
}

/// Flags of a function that overrides nothing: public unless stated, and
/// overridable unless final, private or part of the event graph.
fn own_flags(mut flags: FunctionFlags) -> FunctionFlags {
    if flags.access().is_empty() {
        flags.insert(FunctionFlags::PUBLIC);
    }
    let sealed = FunctionFlags::FINAL
        | FunctionFlags::PRIVATE
        | FunctionFlags::EVENT_GRAPH
        | FunctionFlags::EVENT;
    if !flags.intersects(sealed) {
        flags.insert(FunctionFlags::OVERRIDABLE);
    }
    flags
}

fn describe(param: &ParamSig) -> String {
    match param.direction {
        ParamDirection::Input => param.ty.to_string(),
        ParamDirection::Output => format!("out {}", param.ty),
    }
}

// ---------------------------------------------------------------------------
// Symbols
// ---------------------------------------------------------------------------

/// Where a term lives at run time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Storage {
    /// Slot in the signature's parameter list.
    Parameter(usize),
    /// Slot in the function's local frame.
    Local(usize),
    /// Class member of this name.
    Member(String),
    Literal(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbol {
    pub term: TermId,
    pub name: String,
    pub ty: PinType,
    pub storage: Storage,
}

/// Finalized storage of every term of one function.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolTable {
    pub symbols: IndexMap<TermId, Symbol>,
    /// Parameter terms in signature order.
    pub parameters: Vec<TermId>,
    pub locals: Vec<TermId>,
    /// Initial values of locals, by symbol name. Applied after the table is
    /// final.
    pub defaults: IndexMap<String, String>,
}

impl SymbolTable {
    pub fn get(&self, term: TermId) -> Option<&Symbol> {
        self.symbols.get(&term)
    }

    pub fn parameter_names(&self) -> Vec<&str> {
        self.parameters
            .iter()
            .filter_map(|t| self.symbols.get(t))
            .map(|s| s.name.as_str())
            .collect()
    }
}

/// A term moved to class scope: event parameters and, for the event graph,
/// its locals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromotedMember {
    pub name: String,
    pub ty: PinType,
    pub default_value: Option<String>,
}

/// Prefix of event graph locals promoted to class members.
pub const FRAME_PREFIX: &str = "Frame_";

/// Gives every term of `terms` its storage. Parameters follow `signature`.
/// With `promote_locals`, locals become class members.
pub fn assemble_symbols(
    terms: &TermTable,
    signature: &FunctionSignature,
    promote_locals: bool,
) -> (SymbolTable, Vec<PromotedMember>) {
    let mut table = SymbolTable::default();
    let mut promoted: Vec<PromotedMember> = Vec::new();
    let mut promote = |member: PromotedMember| {
        if !promoted.iter().any(|m| m.name == member.name) {
            promoted.push(member);
        }
    };

    for param in &signature.params {
        let kind = match param.direction {
            ParamDirection::Input => TermKind::Parameter,
            ParamDirection::Output => TermKind::Output,
        };
        if let Some(term) = terms.find(kind, &param.name) {
            table.parameters.push(term);
        }
    }
    for term in terms.iter() {
        if matches!(term.kind, TermKind::Parameter | TermKind::Output)
            && !table.parameters.contains(&term.id)
        {
            table.parameters.push(term.id);
        }
    }
    for (slot, id) in table.parameters.iter().enumerate() {
        if let Some(term) = terms.get(*id) {
            table.symbols.insert(
                *id,
                Symbol {
                    term: *id,
                    name: term.name.clone(),
                    ty: term.ty.clone(),
                    storage: Storage::Parameter(slot),
                },
            );
        }
    }

    for term in terms.iter() {
        let (name, storage) = match term.kind {
            TermKind::Parameter | TermKind::Output => continue,
            TermKind::Local if promote_locals => {
                let name = format!("{FRAME_PREFIX}{}", term.name);
                promote(PromotedMember {
                    name: name.clone(),
                    ty: term.ty.clone(),
                    default_value: terms.initial_value(term.id).map(str::to_string),
                });
                (name.clone(), Storage::Member(name))
            }
            TermKind::Local => {
                let slot = table.locals.len();
                table.locals.push(term.id);
                if let Some(value) = terms.initial_value(term.id) {
                    table.defaults.insert(term.name.clone(), value.to_string());
                }
                (term.name.clone(), Storage::Local(slot))
            }
            TermKind::Literal => (
                term.name.clone(),
                Storage::Literal(term.literal.clone().unwrap_or_default()),
            ),
            TermKind::Member => (term.name.clone(), Storage::Member(term.name.clone())),
            TermKind::PersistentFrame => {
                promote(PromotedMember {
                    name: term.name.clone(),
                    ty: term.ty.clone(),
                    default_value: None,
                });
                (term.name.clone(), Storage::Member(term.name.clone()))
            }
        };
        table.symbols.insert(
            term.id,
            Symbol {
                term: term.id,
                name,
                ty: term.ty.clone(),
                storage,
            },
        );
    }

    (table, promoted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphscript_core::TypeDesc;

    fn int() -> PinType {
        PinType::of(TypeDesc::Int)
    }

    fn float() -> PinType {
        PinType::of(TypeDesc::Float)
    }

    fn base() -> FunctionSignature {
        FunctionSignature::new("Apply")
            .with_param(ParamSig::input("a", int()))
            .with_param(ParamSig::input("b", float()))
            .with_flags(FunctionFlags::PROTECTED | FunctionFlags::OVERRIDABLE)
    }

    #[test]
    fn override_parameters_follow_inherited_order() {
        let declared = FunctionSignature::new("Apply")
            .with_param(ParamSig::input("b", float()))
            .with_param(ParamSig::input("a", int()));
        let parent = base();
        let matched = resolve_signature(declared, Some(("Base", &parent)), false);
        assert!(matched.issues.is_empty(), "{:?}", matched.issues);
        assert_eq!(matched.signature.param_names(), vec!["a", "b"]);
        assert_eq!(matched.override_of.as_deref(), Some("Base"));
        assert_eq!(
            matched.signature.flags.access(),
            FunctionFlags::PROTECTED
        );
        assert!(matched.signature.flags.contains(FunctionFlags::OVERRIDABLE));
    }

    #[test]
    fn missing_extra_and_mistyped_parameters() {
        let declared = FunctionSignature::new("Apply")
            .with_param(ParamSig::input("a", float()))
            .with_param(ParamSig::input("c", int()));
        let parent = base();
        let matched = resolve_signature(declared, Some(("Base", &parent)), false);
        assert!(matched.has_errors());
        assert!(matches!(&matched.issues[0], Issue::ParameterType { param, .. } if param == "a"));
        assert!(matches!(&matched.issues[1], Issue::ParameterOrder { param, .. } if param == "b"));
        assert!(matches!(
            &matched.issues[2],
            Issue::UnexpectedParameter { param, .. } if param == "c"
        ));
        // Declared order is kept when matching fails.
        assert_eq!(matched.signature.param_names(), vec!["a", "c"]);
    }

    #[test]
    fn flag_reconciliation() {
        let declared = FunctionSignature::new("Apply")
            .with_param(ParamSig::input("a", int()))
            .with_param(ParamSig::input("b", float()))
            .with_flags(FunctionFlags::PUBLIC | FunctionFlags::NET | FunctionFlags::NET_SERVER);
        let parent = base();
        let matched = resolve_signature(declared, Some(("Base", &parent)), false);
        assert!(matches!(matched.issues[0], Issue::AccessSpecifierMismatch { .. }));
        assert!(matches!(matched.issues[1], Issue::NetFlagMismatch { .. }));
        assert_eq!(matched.signature.flags.access(), FunctionFlags::PROTECTED);
        assert!(matched.signature.flags.net().is_empty());
    }

    #[test]
    fn own_functions_become_overridable() {
        let matched = resolve_signature(FunctionSignature::new("Open"), None, false);
        assert!(matched.issues.is_empty());
        assert!(matched
            .signature
            .flags
            .contains(FunctionFlags::PUBLIC | FunctionFlags::OVERRIDABLE));

        let sealed = FunctionSignature::new("Close").with_flags(FunctionFlags::FINAL);
        let matched = resolve_signature(sealed, None, false);
        assert!(!matched.signature.flags.contains(FunctionFlags::OVERRIDABLE));

        let matched = resolve_signature(FunctionSignature::new("OnHit"), None, true);
        assert!(matches!(matched.issues[0], Issue::MissingOverrideTarget { .. }));
    }

    #[test]
    fn symbols_follow_signature_order() {
        let mut terms = TermTable::new();
        let b = terms.add(TermKind::Parameter, "b", float());
        let a = terms.add(TermKind::Parameter, "a", int());
        let local = terms.add_local("count", int(), Some("3".into()));
        let lit = terms.literal(int(), "7");
        let frame = terms
            .member(TermKind::PersistentFrame, "OnHit_damage", float())
            .unwrap();

        let (table, promoted) = assemble_symbols(&terms, &base(), false);
        assert_eq!(table.parameters, vec![a, b]);
        assert_eq!(table.parameter_names(), vec!["a", "b"]);
        assert_eq!(table.get(local).unwrap().storage, Storage::Local(0));
        assert_eq!(table.defaults["count"], "3");
        assert_eq!(table.get(lit).unwrap().storage, Storage::Literal("7".into()));
        assert_eq!(
            table.get(frame).unwrap().storage,
            Storage::Member("OnHit_damage".into())
        );
        assert_eq!(promoted.len(), 1);

        let (table, promoted) = assemble_symbols(&terms, &base(), true);
        assert!(table.locals.is_empty());
        assert_eq!(
            table.get(local).unwrap().storage,
            Storage::Member("Frame_count".into())
        );
        assert_eq!(promoted[0].default_value.as_deref(), Some("3"));
    }
}
