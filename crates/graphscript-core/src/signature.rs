//! External call signatures of compiled functions.
//!
//! A [`FunctionSignature`] is what other compilation units see of a
//! function: its name, its ordered parameters, and its [`FunctionFlags`].
//! Skeleton compiles produce nothing else.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::types::PinType;

bitflags! {
    /// Visibility, overridability, purity and network replication flags of a
    /// function.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct FunctionFlags: u32 {
        const PUBLIC = 1 << 0;
        const PROTECTED = 1 << 1;
        const PRIVATE = 1 << 2;
        /// Subclasses may provide their own body.
        const OVERRIDABLE = 1 << 3;
        /// No side effects; callers may reorder or duplicate calls.
        const PURE = 1 << 4;
        const CONST = 1 << 5;
        /// Entry point that can be triggered from outside (events and stubs).
        const EVENT = 1 << 6;
        /// The consolidated body shared by all events of a class.
        const EVENT_GRAPH = 1 << 7;
        const FINAL = 1 << 8;
        /// Replicated across the network.
        const NET = 1 << 9;
        const NET_MULTICAST = 1 << 10;
        const NET_SERVER = 1 << 11;
        const NET_CLIENT = 1 << 12;
        const NET_RELIABLE = 1 << 13;

        const ACCESS = Self::PUBLIC.bits() | Self::PROTECTED.bits() | Self::PRIVATE.bits();
        const NET_FUNC = Self::NET.bits()
            | Self::NET_MULTICAST.bits()
            | Self::NET_SERVER.bits()
            | Self::NET_CLIENT.bits()
            | Self::NET_RELIABLE.bits();
    }
}

impl FunctionFlags {
    /// The access specifier bits only.
    pub fn access(self) -> FunctionFlags {
        self & FunctionFlags::ACCESS
    }

    /// The network replication bits only.
    pub fn net(self) -> FunctionFlags {
        self & FunctionFlags::NET_FUNC
    }
}

/// Whether a parameter is passed into or returned from the function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParamDirection {
    Input,
    Output,
}

/// One parameter of a signature. `name` is the identity key used to match
/// parameters between an override and the signature it overrides.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParamSig {
    pub name: String,
    pub ty: PinType,
    pub direction: ParamDirection,
}

impl ParamSig {
    pub fn input(name: impl Into<String>, ty: PinType) -> Self {
        ParamSig {
            name: name.into(),
            ty,
            direction: ParamDirection::Input,
        }
    }

    pub fn output(name: impl Into<String>, ty: PinType) -> Self {
        ParamSig {
            name: name.into(),
            ty,
            direction: ParamDirection::Output,
        }
    }
}

/// The external call signature of a function or event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FunctionSignature {
    pub name: String,
    pub params: Vec<ParamSig>,
    #[serde(default)]
    pub flags: FunctionFlags,
}

impl FunctionSignature {
    pub fn new(name: impl Into<String>) -> Self {
        FunctionSignature {
            name: name.into(),
            params: Vec::new(),
            flags: FunctionFlags::empty(),
        }
    }

    pub fn with_param(mut self, param: ParamSig) -> Self {
        self.params.push(param);
        self
    }

    pub fn with_flags(mut self, flags: FunctionFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn param(&self, name: &str) -> Option<&ParamSig> {
        self.params.iter().find(|p| p.name == name)
    }

    pub fn inputs(&self) -> impl Iterator<Item = &ParamSig> {
        self.params
            .iter()
            .filter(|p| p.direction == ParamDirection::Input)
    }

    pub fn outputs(&self) -> impl Iterator<Item = &ParamSig> {
        self.params
            .iter()
            .filter(|p| p.direction == ParamDirection::Output)
    }

    pub fn param_names(&self) -> Vec<&str> {
        self.params.iter().map(|p| p.name.as_str()).collect()
    }

    /// A function with no outputs can be implemented as an event.
    pub fn can_be_event(&self) -> bool {
        self.outputs().next().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeDesc;

    #[test]
    fn flag_masks() {
        let flags = FunctionFlags::PUBLIC | FunctionFlags::NET | FunctionFlags::NET_SERVER;
        assert_eq!(flags.access(), FunctionFlags::PUBLIC);
        assert_eq!(flags.net(), FunctionFlags::NET | FunctionFlags::NET_SERVER);
    }

    #[test]
    fn events_have_no_outputs() {
        let event = FunctionSignature::new("OnHit")
            .with_param(ParamSig::input("damage", PinType::of(TypeDesc::Float)));
        assert!(event.can_be_event());

        let func = event
            .clone()
            .with_param(ParamSig::output("handled", PinType::of(TypeDesc::Bool)));
        assert!(!func.can_be_event());
        assert_eq!(func.param_names(), vec!["damage", "handled"]);
    }

    #[test]
    fn serde_roundtrip() {
        let sig = FunctionSignature::new("Tick")
            .with_param(ParamSig::input("delta", PinType::of(TypeDesc::Float)))
            .with_flags(FunctionFlags::PUBLIC | FunctionFlags::OVERRIDABLE);
        let json = serde_json::to_string(&sig).unwrap();
        let back: FunctionSignature = serde_json::from_str(&json).unwrap();
        assert_eq!(sig, back);
    }
}
