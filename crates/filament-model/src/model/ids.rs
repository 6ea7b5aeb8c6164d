//! Arena ids and the declared/hosted reference sums.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::registry::Registry;

/// Index of a module in the [`Registry`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct ModuleId(pub u32);

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m{}", self.0)
    }
}

/// Index of a capability in the [`Registry`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct CapabilityId(pub u32);

impl fmt::Display for CapabilityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c{}", self.0)
    }
}

/// Index of a requirement in the [`Registry`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct RequirementId(pub u32);

impl fmt::Display for RequirementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

/// Reference to a capability, either as declared or as contributed to a
/// host by an attached fragment.
///
/// Two hosted refs over the same declaration with different hosts are
/// distinct values — the same fragment export attached to two hosts is two
/// capabilities as far as resolution is concerned.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum CapRef {
    Declared(CapabilityId),
    Hosted {
        declared: CapabilityId,
        host: ModuleId,
    },
}

impl CapRef {
    /// The underlying declaration, hosted or not.
    pub fn declared_id(self) -> CapabilityId {
        match self {
            CapRef::Declared(id) | CapRef::Hosted { declared: id, .. } => id,
        }
    }

    /// The module that owns this capability during resolution: the host for
    /// a hosted ref, the declaring module otherwise.
    pub fn effective_owner(self, registry: &Registry) -> ModuleId {
        match self {
            CapRef::Declared(id) => registry.capability(id).owner,
            CapRef::Hosted { host, .. } => host,
        }
    }

    /// The module that declared the capability, ignoring attachment.
    pub fn declared_owner(self, registry: &Registry) -> ModuleId {
        registry.capability(self.declared_id()).owner
    }
}

/// Reference to a requirement, either as declared or as re-expressed on a
/// host by an attached fragment.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum ReqRef {
    Declared(RequirementId),
    Hosted {
        declared: RequirementId,
        host: ModuleId,
    },
}

impl ReqRef {
    pub fn declared_id(self) -> RequirementId {
        match self {
            ReqRef::Declared(id) | ReqRef::Hosted { declared: id, .. } => id,
        }
    }

    pub fn effective_owner(self, registry: &Registry) -> ModuleId {
        match self {
            ReqRef::Declared(id) => registry.requirement(id).owner,
            ReqRef::Hosted { host, .. } => host,
        }
    }

    pub fn declared_owner(self, registry: &Registry) -> ModuleId {
        registry.requirement(self.declared_id()).owner
    }

    pub fn is_hosted(self) -> bool {
        matches!(self, ReqRef::Hosted { .. })
    }
}
