//! Class layout and the class default object.
//!
//! The layout is the part of a compiled class other units depend on: its
//! members with their types and its function signatures. It is complete
//! after the skeleton phase except for members promoted from the event
//! graph, which are appended before the class is finalized.

use graphscript_core::{CompilationUnit, FunctionSignature, PinType, TypeDesc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::assemble::PromotedMember;
use crate::diagnostics::Issue;
use crate::schema::ClassSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MemberOrigin {
    Variable,
    Component,
    /// Event parameter or event graph local kept at class scope.
    PersistentFrame,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberSlot {
    pub name: String,
    pub ty: PinType,
    pub origin: MemberOrigin,
    pub default_value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassLayout {
    pub name: String,
    pub parent: Option<String>,
    pub interfaces: Vec<String>,
    pub members: IndexMap<String, MemberSlot>,
    pub functions: IndexMap<String, FunctionSignature>,
    pub finalized: bool,
}

impl ClassLayout {
    /// Layout with the unit's declared members, in schema order.
    pub fn from_schema(unit: &CompilationUnit, schema: &ClassSchema) -> Self {
        let members = schema
            .members
            .values()
            .map(|m| {
                let slot = MemberSlot {
                    name: m.name.clone(),
                    ty: m.ty.clone(),
                    origin: if m.is_component {
                        MemberOrigin::Component
                    } else {
                        MemberOrigin::Variable
                    },
                    default_value: m.default_value.clone(),
                };
                (m.name.clone(), slot)
            })
            .collect();
        ClassLayout {
            name: schema.name.clone(),
            parent: schema.parent.clone(),
            interfaces: unit.interfaces.iter().map(|i| i.name.clone()).collect(),
            members,
            functions: IndexMap::new(),
            finalized: false,
        }
    }

    pub fn add_function(&mut self, signature: FunctionSignature) {
        self.functions.insert(signature.name.clone(), signature);
    }

    pub fn function(&self, name: &str) -> Option<&FunctionSignature> {
        self.functions.get(name)
    }

    pub fn member(&self, name: &str) -> Option<&MemberSlot> {
        self.members.get(name)
    }

    /// Appends promoted members. Names already present are left alone.
    pub fn add_promoted(&mut self, promoted: &[PromotedMember]) {
        for member in promoted {
            self.members
                .entry(member.name.clone())
                .or_insert_with(|| MemberSlot {
                    name: member.name.clone(),
                    ty: member.ty.clone(),
                    origin: MemberOrigin::PersistentFrame,
                    default_value: member.default_value.clone(),
                });
        }
    }
}

// ---------------------------------------------------------------------------
// Default object
// ---------------------------------------------------------------------------

/// Parsed default of one member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DefaultValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Name(String),
    Enum { enum_name: String, value: String },
    /// Opaque struct literal text.
    Struct(String),
    /// A reference to a component of the class, or none.
    Object(Option<String>),
    Array(Vec<DefaultValue>),
    None,
}

/// The prototype instance of a compiled class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefaultObject {
    pub class: String,
    pub values: IndexMap<String, DefaultValue>,
}

impl DefaultObject {
    pub fn get(&self, member: &str) -> Option<&DefaultValue> {
        self.values.get(member)
    }
}

/// Builds the default object from member defaults. Components default to
/// themselves. A default that does not parse as its member's type falls
/// back to the type's zero value with a warning.
pub fn build_default_object(
    layout: &ClassLayout,
    schema: &ClassSchema,
) -> (DefaultObject, Vec<Issue>) {
    let mut issues = Vec::new();
    let mut values = IndexMap::new();
    for slot in layout.members.values() {
        let value = if slot.origin == MemberOrigin::Component {
            DefaultValue::Object(Some(slot.name.clone()))
        } else {
            match &slot.default_value {
                None => zero_value(&slot.ty),
                Some(text) => parse_default(&slot.ty, text, schema).unwrap_or_else(|| {
                    issues.push(Issue::UnparsableDefault {
                        member: slot.name.clone(),
                        value: text.clone(),
                        ty: slot.ty.to_string(),
                    });
                    zero_value(&slot.ty)
                }),
            }
        };
        values.insert(slot.name.clone(), value);
    }
    (
        DefaultObject {
            class: layout.name.clone(),
            values,
        },
        issues,
    )
}

pub fn zero_value(ty: &PinType) -> DefaultValue {
    if ty.is_array() {
        return DefaultValue::Array(Vec::new());
    }
    match &ty.base {
        TypeDesc::Bool => DefaultValue::Bool(false),
        TypeDesc::Byte | TypeDesc::Int | TypeDesc::Int64 => DefaultValue::Int(0),
        TypeDesc::Float => DefaultValue::Float(0.0),
        TypeDesc::String | TypeDesc::Text => DefaultValue::Str(String::new()),
        TypeDesc::Name => DefaultValue::Name(String::new()),
        TypeDesc::Enum(name) => DefaultValue::Enum {
            enum_name: name.clone(),
            value: String::new(),
        },
        TypeDesc::Struct(_) => DefaultValue::Struct(String::new()),
        TypeDesc::Object(_) | TypeDesc::Interface(_) => DefaultValue::Object(None),
        TypeDesc::Exec | TypeDesc::Wildcard => DefaultValue::None,
    }
}

/// Parses authored default text as a value of `ty`.
pub fn parse_default(ty: &PinType, text: &str, schema: &ClassSchema) -> Option<DefaultValue> {
    let text = text.trim();
    if ty.is_array() {
        let inner = text.strip_prefix('(')?.strip_suffix(')')?.trim();
        if inner.is_empty() {
            return Some(DefaultValue::Array(Vec::new()));
        }
        let element = PinType::of(ty.base.clone());
        return inner
            .split(',')
            .map(|item| parse_default(&element, item, schema))
            .collect::<Option<Vec<_>>>()
            .map(DefaultValue::Array);
    }
    match &ty.base {
        TypeDesc::Bool => match text.to_ascii_lowercase().as_str() {
            "true" => Some(DefaultValue::Bool(true)),
            "false" => Some(DefaultValue::Bool(false)),
            _ => None,
        },
        TypeDesc::Byte => text
            .parse::<u8>()
            .ok()
            .map(|v| DefaultValue::Int(i64::from(v))),
        TypeDesc::Int => text
            .parse::<i32>()
            .ok()
            .map(|v| DefaultValue::Int(i64::from(v))),
        TypeDesc::Int64 => text.parse::<i64>().ok().map(DefaultValue::Int),
        TypeDesc::Float => text.parse::<f64>().ok().map(DefaultValue::Float),
        TypeDesc::String | TypeDesc::Text => Some(DefaultValue::Str(text.to_string())),
        TypeDesc::Name => Some(DefaultValue::Name(text.to_string())),
        TypeDesc::Enum(name) => is_identifier(text).then(|| DefaultValue::Enum {
            enum_name: name.clone(),
            value: text.to_string(),
        }),
        TypeDesc::Struct(_) => Some(DefaultValue::Struct(text.to_string())),
        TypeDesc::Object(_) | TypeDesc::Interface(_) => match text {
            "" | "None" => Some(DefaultValue::Object(None)),
            name => schema
                .component(name)
                .map(|c| DefaultValue::Object(Some(c.name.clone()))),
        },
        TypeDesc::Exec | TypeDesc::Wildcard => None,
    }
}

fn is_identifier(text: &str) -> bool {
    !text.is_empty()
        && !text.starts_with(|c: char| c.is_ascii_digit())
        && text.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphscript_core::{ComponentDecl, VariableDecl};

    fn unit() -> CompilationUnit {
        let mut unit = CompilationUnit::new("Door");
        unit.components.push(ComponentDecl {
            name: "Mesh".into(),
            class: "StaticMesh".into(),
        });
        let mut var = |name: &str, ty: PinType, default: Option<&str>| {
            unit.variables.push(VariableDecl {
                name: name.into(),
                ty,
                default_value: default.map(String::from),
            })
        };
        var("Open", PinType::of(TypeDesc::Bool), Some("True"));
        var("Angle", PinType::of(TypeDesc::Float), Some("ninety"));
        var("Visual", PinType::of(TypeDesc::Object("StaticMesh".into())), Some("Mesh"));
        var("Tags", PinType::array(TypeDesc::Int), Some("(1, 2)"));
        var("State", PinType::of(TypeDesc::Enum("DoorState".into())), None);
        unit
    }

    #[test]
    fn layout_follows_schema_order() {
        let unit = unit();
        let (schema, _) = ClassSchema::build(&unit);
        let layout = ClassLayout::from_schema(&unit, &schema);
        let names: Vec<_> = layout.members.keys().cloned().collect();
        assert_eq!(names, vec!["Mesh", "Open", "Angle", "Visual", "Tags", "State"]);
        assert_eq!(layout.members["Mesh"].origin, MemberOrigin::Component);
    }

    #[test]
    fn default_object_parses_by_type() {
        let unit = unit();
        let (schema, _) = ClassSchema::build(&unit);
        let layout = ClassLayout::from_schema(&unit, &schema);
        let (object, issues) = build_default_object(&layout, &schema);

        assert_eq!(object.get("Mesh"), Some(&DefaultValue::Object(Some("Mesh".into()))));
        assert_eq!(object.get("Open"), Some(&DefaultValue::Bool(true)));
        assert_eq!(object.get("Angle"), Some(&DefaultValue::Float(0.0)));
        assert_eq!(object.get("Visual"), Some(&DefaultValue::Object(Some("Mesh".into()))));
        assert_eq!(
            object.get("Tags"),
            Some(&DefaultValue::Array(vec![DefaultValue::Int(1), DefaultValue::Int(2)]))
        );
        assert!(matches!(object.get("State"), Some(DefaultValue::Enum { .. })));

        assert_eq!(issues.len(), 1);
        assert!(matches!(&issues[0], Issue::UnparsableDefault { member, .. } if member == "Angle"));
    }

    #[test]
    fn promoted_members_are_appended_once() {
        let unit = unit();
        let (schema, _) = ClassSchema::build(&unit);
        let mut layout = ClassLayout::from_schema(&unit, &schema);
        let promoted = PromotedMember {
            name: "OnHit_damage".into(),
            ty: PinType::of(TypeDesc::Float),
            default_value: None,
        };
        layout.add_promoted(&[promoted.clone(), promoted]);
        assert_eq!(layout.members.len(), 7);
        assert_eq!(
            layout.members["OnHit_damage"].origin,
            MemberOrigin::PersistentFrame
        );
    }
}
