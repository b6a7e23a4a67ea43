//! Deterministic fingerprints of compiled artifacts using blake3.
//!
//! Dependent units recompile when the skeleton hash of a class they use
//! changes, so the skeleton hash covers exactly the externally visible
//! layout: class name, parent, interfaces, members and function signatures.
//! Persistent-frame members only exist after a full compile, so they are left
//! out and both compile modes agree on the hash.
//! Function fingerprints cover a linked body and its symbols.
//!
//! Values are serialized with `serde_json::to_vec` before hashing. Every
//! hashed type keeps its collections in `Vec` or `IndexMap`, so the bytes
//! only depend on content and insertion order.

use serde::Serialize;

use crate::assemble::SymbolTable;
use crate::error::CompileError;
use crate::layout::{ClassLayout, MemberOrigin};
use crate::statement::Body;

/// Hashes any serializable value.
pub fn hash_value<T: Serialize + ?Sized>(value: &T) -> Result<blake3::Hash, CompileError> {
    let bytes = serde_json::to_vec(value)?;
    Ok(blake3::hash(&bytes))
}

/// Hash of everything other units can observe about a class.
pub fn skeleton_hash(layout: &ClassLayout) -> Result<blake3::Hash, CompileError> {
    let mut hasher = blake3::Hasher::new();
    hasher.update(layout.name.as_bytes());
    hasher.update(&[0]);
    hasher.update(layout.parent.as_deref().unwrap_or("").as_bytes());
    hasher.update(&serde_json::to_vec(&layout.interfaces)?);
    for member in layout
        .members
        .values()
        .filter(|m| m.origin != MemberOrigin::PersistentFrame)
    {
        hasher.update(&serde_json::to_vec(&(&member.name, &member.ty))?);
    }
    for signature in layout.functions.values() {
        hasher.update(&serde_json::to_vec(signature)?);
    }
    Ok(hasher.finalize())
}

/// Hash of a linked function: its body and the storage of its terms.
pub fn function_fingerprint(
    body: &Body,
    symbols: &SymbolTable,
) -> Result<blake3::Hash, CompileError> {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&serde_json::to_vec(&body.statements)?);
    hasher.update(&serde_json::to_vec(symbols)?);
    Ok(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assemble::PromotedMember;
    use crate::schema::ClassSchema;
    use graphscript_core::{CompilationUnit, FunctionSignature, PinType, TypeDesc, VariableDecl};

    fn layout(default: &str) -> ClassLayout {
        let mut unit = CompilationUnit::new("Door");
        unit.variables.push(VariableDecl {
            name: "Angle".into(),
            ty: PinType::of(TypeDesc::Float),
            default_value: Some(default.into()),
        });
        let (schema, _) = ClassSchema::build(&unit);
        let mut layout = ClassLayout::from_schema(&unit, &schema);
        layout.add_function(FunctionSignature::new("Open"));
        layout
    }

    #[test]
    fn skeleton_hash_ignores_defaults() {
        let a = skeleton_hash(&layout("0.0")).unwrap();
        let b = skeleton_hash(&layout("90.0")).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn skeleton_hash_tracks_signatures() {
        let base = layout("0.0");
        let mut changed = base.clone();
        changed.add_function(FunctionSignature::new("Close"));
        assert_ne!(skeleton_hash(&base).unwrap(), skeleton_hash(&changed).unwrap());
    }

    #[test]
    fn skeleton_hash_ignores_persistent_frame_members() {
        let base = layout("0.0");
        let mut promoted = base.clone();
        promoted.add_promoted(&[PromotedMember {
            name: "OnHit_damage".into(),
            ty: PinType::of(TypeDesc::Float),
            default_value: None,
        }]);
        assert_eq!(promoted.members.len(), base.members.len() + 1);
        assert_eq!(skeleton_hash(&base).unwrap(), skeleton_hash(&promoted).unwrap());
    }

    #[test]
    fn stub_bodies_share_a_fingerprint() {
        let a = function_fingerprint(&Body::stub(), &SymbolTable::default()).unwrap();
        let b = function_fingerprint(&Body::stub(), &SymbolTable::default()).unwrap();
        assert_eq!(a, b);
        assert_eq!(hash_value(&1u32).unwrap(), hash_value(&1u32).unwrap());
    }
}
