//! Pin type descriptors.
//!
//! The compiler core treats types as mostly opaque: it needs equality, the
//! wildcard check, the array container flag, and a small connection
//! compatibility rule. Everything else (layout, conversions) belongs to the
//! backend.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Base category of a pin type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeDesc {
    /// Execution wire. Only valid on control ports.
    Exec,
    /// Not yet resolved. Must be concretized by macro expansion.
    Wildcard,
    Bool,
    Byte,
    Int,
    Int64,
    Float,
    Name,
    String,
    Text,
    /// Named enumeration. Stored as a byte at runtime.
    Enum(String),
    Struct(String),
    /// Reference to an object of the named class.
    Object(String),
    /// Reference to an object implementing the named interface.
    Interface(String),
}

/// Name of the root object class every object reference converts to.
pub const ROOT_OBJECT_CLASS: &str = "Object";

/// Container wrapping a base type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Container {
    #[default]
    Single,
    Array,
}

/// Full type of a port: base category plus container.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PinType {
    pub base: TypeDesc,
    #[serde(default)]
    pub container: Container,
}

impl PinType {
    pub fn of(base: TypeDesc) -> Self {
        PinType {
            base,
            container: Container::Single,
        }
    }

    pub fn array(base: TypeDesc) -> Self {
        PinType {
            base,
            container: Container::Array,
        }
    }

    pub fn exec() -> Self {
        PinType::of(TypeDesc::Exec)
    }

    pub fn wildcard() -> Self {
        PinType::of(TypeDesc::Wildcard)
    }

    pub fn is_exec(&self) -> bool {
        self.base == TypeDesc::Exec
    }

    pub fn is_wildcard(&self) -> bool {
        self.base == TypeDesc::Wildcard
    }

    pub fn is_array(&self) -> bool {
        self.container == Container::Array
    }

    /// Returns the enum name when this is a single enum value.
    pub fn enum_name(&self) -> Option<&str> {
        match (&self.base, self.container) {
            (TypeDesc::Enum(name), Container::Single) => Some(name),
            _ => None,
        }
    }

    /// Concretizes a wildcard pin against the type resolved at a call site.
    ///
    /// Only the base category is taken from `resolved`; the pin keeps its own
    /// container, so a wildcard array stays an array. Non-wildcard pins are
    /// returned unchanged.
    pub fn resolve_wildcard(&self, resolved: &PinType) -> PinType {
        if !self.is_wildcard() {
            return self.clone();
        }
        PinType {
            base: resolved.base.clone(),
            container: self.container,
        }
    }

    /// Whether a value of type `self` (an output) may flow into an input of
    /// type `target`.
    pub fn is_compatible_with(&self, target: &PinType) -> bool {
        if self.is_wildcard() || target.is_wildcard() {
            return true;
        }
        if self.is_exec() || target.is_exec() {
            return self.is_exec() && target.is_exec();
        }
        if self.container != target.container {
            return false;
        }
        match (&self.base, &target.base) {
            (a, b) if a == b => true,
            (TypeDesc::Byte, TypeDesc::Enum(_)) | (TypeDesc::Enum(_), TypeDesc::Byte) => true,
            (TypeDesc::Object(_), TypeDesc::Object(root)) => root == ROOT_OBJECT_CLASS,
            _ => false,
        }
    }

    /// An interface reference wired straight into an object input. This needs
    /// an explicit cast and is reported separately from a plain mismatch.
    pub fn is_interface_to_object(&self, target: &PinType) -> bool {
        matches!(
            (&self.base, &target.base),
            (TypeDesc::Interface(_), TypeDesc::Object(_))
        )
    }
}

impl fmt::Display for TypeDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeDesc::Exec => write!(f, "exec"),
            TypeDesc::Wildcard => write!(f, "wildcard"),
            TypeDesc::Bool => write!(f, "bool"),
            TypeDesc::Byte => write!(f, "byte"),
            TypeDesc::Int => write!(f, "int"),
            TypeDesc::Int64 => write!(f, "int64"),
            TypeDesc::Float => write!(f, "float"),
            TypeDesc::Name => write!(f, "name"),
            TypeDesc::String => write!(f, "string"),
            TypeDesc::Text => write!(f, "text"),
            TypeDesc::Enum(name) => write!(f, "enum<{name}>"),
            TypeDesc::Struct(name) => write!(f, "struct<{name}>"),
            TypeDesc::Object(name) => write!(f, "object<{name}>"),
            TypeDesc::Interface(name) => write!(f, "interface<{name}>"),
        }
    }
}

impl fmt::Display for PinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.container {
            Container::Single => write!(f, "{}", self.base),
            Container::Array => write!(f, "array<{}>", self.base),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_resolution_keeps_container() {
        let pin = PinType::array(TypeDesc::Wildcard);
        let resolved = pin.resolve_wildcard(&PinType::of(TypeDesc::Int));
        assert_eq!(resolved, PinType::array(TypeDesc::Int));

        let single = PinType::wildcard().resolve_wildcard(&PinType::array(TypeDesc::Float));
        assert_eq!(single, PinType::of(TypeDesc::Float));
    }

    #[test]
    fn concrete_pin_ignores_resolution() {
        let pin = PinType::of(TypeDesc::Bool);
        assert_eq!(pin.resolve_wildcard(&PinType::of(TypeDesc::Int)), pin);
    }

    #[test]
    fn compatibility_rules() {
        let int = PinType::of(TypeDesc::Int);
        let float = PinType::of(TypeDesc::Float);
        assert!(int.is_compatible_with(&int));
        assert!(!int.is_compatible_with(&float));
        assert!(int.is_compatible_with(&PinType::wildcard()));
        assert!(!int.is_compatible_with(&PinType::array(TypeDesc::Int)));
        assert!(!PinType::exec().is_compatible_with(&int));

        let byte = PinType::of(TypeDesc::Byte);
        let color = PinType::of(TypeDesc::Enum("Color".into()));
        assert!(byte.is_compatible_with(&color));
        assert!(color.is_compatible_with(&byte));

        let actor = PinType::of(TypeDesc::Object("Actor".into()));
        let object = PinType::of(TypeDesc::Object(ROOT_OBJECT_CLASS.into()));
        assert!(actor.is_compatible_with(&object));
        assert!(!object.is_compatible_with(&actor));
    }

    #[test]
    fn interface_to_object_is_flagged() {
        let iface = PinType::of(TypeDesc::Interface("Damageable".into()));
        let actor = PinType::of(TypeDesc::Object("Actor".into()));
        assert!(iface.is_interface_to_object(&actor));
        assert!(!iface.is_compatible_with(&actor));
    }

    #[test]
    fn display() {
        assert_eq!(PinType::array(TypeDesc::Int).to_string(), "array<int>");
        assert_eq!(
            PinType::of(TypeDesc::Object("Actor".into())).to_string(),
            "object<Actor>"
        );
    }
}
