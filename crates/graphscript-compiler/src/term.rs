//! Terms: compiler-internal value slots backing data ports.
//!
//! Handlers register terms while a function is being prepared and bind the
//! data-out ports they produce to them ("nets"). Consumers resolve their
//! inputs through the net of the linked producer port, or fall back to a
//! literal term built from the port's default. The assembler later turns
//! every term into a concrete storage location.

use std::collections::HashMap;
use std::fmt;

use graphscript_core::{PinType, PortRef, TypeDesc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TermId(pub u32);

impl fmt::Display for TermId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TermKind {
    /// Input parameter of the function.
    Parameter,
    /// Output parameter of the function.
    Output,
    Local,
    Literal,
    /// Class member variable or component.
    Member,
    /// Event parameter kept at class scope for the shared event graph.
    PersistentFrame,
}

impl TermKind {
    /// Backed by a class member rather than function storage.
    pub fn is_class_scope(self) -> bool {
        matches!(self, TermKind::Member | TermKind::PersistentFrame)
    }
}

/// Two class-scope slots of different kinds asked for the same name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("class-scope name '{name}' is already held by a {held_by:?} term")]
pub struct NameClash {
    pub name: String,
    pub held_by: TermKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Term {
    pub id: TermId,
    /// Unique within the function (members keep their member name).
    pub name: String,
    /// Name as requested by the handler; parameters are matched on it.
    pub declared_name: String,
    pub ty: PinType,
    pub kind: TermKind,
    /// Literal text; only set for literal terms.
    pub literal: Option<String>,
}

/// Hands out unique, identifier-safe names.
#[derive(Debug, Clone, Default)]
pub struct NetNameMap {
    used: HashMap<String, u32>,
}

impl NetNameMap {
    pub fn sanitize(base: &str) -> String {
        let mut name: String = base
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
            .collect();
        if name.is_empty() {
            name.push_str("Term");
        }
        if name.starts_with(|c: char| c.is_ascii_digit()) {
            name.insert(0, '_');
        }
        name
    }

    pub fn make_unique(&mut self, base: &str) -> String {
        let base = Self::sanitize(base);
        let mut candidate = base.clone();
        while let Some(count) = self.used.get_mut(&candidate) {
            *count += 1;
            candidate = format!("{base}_{count}");
        }
        self.used.insert(candidate.clone(), 0);
        candidate
    }

    /// Claims a name verbatim. Returns `false` when it was already taken.
    pub fn reserve(&mut self, name: &str) -> bool {
        if self.used.contains_key(name) {
            return false;
        }
        self.used.insert(name.to_string(), 0);
        true
    }
}

/// Terms of one function plus the port-to-term net bindings.
#[derive(Debug, Clone, Default)]
pub struct TermTable {
    terms: Vec<Term>,
    nets: IndexMap<PortRef, TermId>,
    declared: IndexMap<(TermKind, String), TermId>,
    /// Initial values of locals.
    initial_values: IndexMap<TermId, String>,
    names: NetNameMap,
    literal_count: u32,
}

impl TermTable {
    pub fn new() -> Self {
        TermTable::default()
    }

    fn push(
        &mut self,
        kind: TermKind,
        name: String,
        declared: &str,
        ty: PinType,
        literal: Option<String>,
    ) -> TermId {
        let id = TermId(self.terms.len() as u32);
        self.terms.push(Term {
            id,
            name,
            declared_name: declared.to_string(),
            ty,
            kind,
            literal,
        });
        id
    }

    /// Adds a parameter, output or local term under a unique name. Later
    /// lookups by `(kind, declared)` return the first term registered.
    pub fn add(&mut self, kind: TermKind, declared: &str, ty: PinType) -> TermId {
        let name = self.names.make_unique(declared);
        let id = self.push(kind, name, declared, ty, None);
        self.declared.entry((kind, declared.to_string())).or_insert(id);
        id
    }

    pub fn add_local(&mut self, declared: &str, ty: PinType, initial: Option<String>) -> TermId {
        let id = self.add(TermKind::Local, declared, ty);
        if let Some(initial) = initial {
            self.initial_values.insert(id, initial);
        }
        id
    }

    pub fn initial_value(&self, id: TermId) -> Option<&str> {
        self.initial_values.get(&id).map(String::as_str)
    }

    /// A literal term carrying `value`.
    pub fn literal(&mut self, ty: PinType, value: impl Into<String>) -> TermId {
        let declared = format!("Literal_{}", self.literal_count);
        self.literal_count += 1;
        let name = self.names.make_unique(&declared);
        self.push(TermKind::Literal, name, &declared, ty, Some(value.into()))
    }

    /// The term for a class-scope slot, created on first use. Member names
    /// are never altered: a function-scope term already holding the name is
    /// renamed instead. Fails when another kind of class-scope slot holds it.
    pub fn member(&mut self, kind: TermKind, name: &str, ty: PinType) -> Result<TermId, NameClash> {
        if let Some(id) = self.declared.get(&(kind, name.to_string())) {
            return Ok(*id);
        }
        if !self.names.reserve(name) {
            if let Some(holder) = self.terms.iter().position(|t| t.name == name) {
                let held_by = self.terms[holder].kind;
                if held_by.is_class_scope() {
                    return Err(NameClash {
                        name: name.to_string(),
                        held_by,
                    });
                }
                self.terms[holder].name = self.names.make_unique(name);
            }
        }
        let id = self.push(kind, name.to_string(), name, ty, None);
        self.declared.insert((kind, name.to_string()), id);
        Ok(id)
    }

    pub fn find(&self, kind: TermKind, declared: &str) -> Option<TermId> {
        self.declared.get(&(kind, declared.to_string())).copied()
    }

    pub fn get(&self, id: TermId) -> Option<&Term> {
        self.terms.get(id.0 as usize)
    }

    pub fn bind(&mut self, port: PortRef, term: TermId) {
        self.nets.insert(port, term);
    }

    pub fn net(&self, port: PortRef) -> Option<TermId> {
        self.nets.get(&port).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Term> {
        self.terms.iter()
    }

    pub fn of_kind(&self, kind: TermKind) -> impl Iterator<Item = &Term> {
        self.terms.iter().filter(move |t| t.kind == kind)
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

/// Class-scope slot holding parameter `param` of event `event`.
pub fn persistent_slot_name(event: &str, param: &str) -> String {
    format!("{}_{}", NetNameMap::sanitize(event), NetNameMap::sanitize(param))
}

/// Literal text of a type's zero value, used for unlinked inputs without a
/// default.
pub fn zero_literal(ty: &PinType) -> &'static str {
    if ty.is_array() {
        return "()";
    }
    match ty.base {
        TypeDesc::Bool => "false",
        TypeDesc::Byte | TypeDesc::Int | TypeDesc::Int64 | TypeDesc::Enum(_) => "0",
        TypeDesc::Float => "0.0",
        TypeDesc::Name | TypeDesc::String | TypeDesc::Text => "",
        TypeDesc::Struct(_) => "()",
        TypeDesc::Object(_) | TypeDesc::Interface(_) => "None",
        TypeDesc::Exec | TypeDesc::Wildcard => "",
    }
}
