//! Wires and the wiring of already-resolved modules.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::{CapRef, CapabilityId, ModuleId, ReqRef, RequirementId};

/// A realized requirement → capability edge between two modules.
///
/// Wires always carry declared ids: the requirer of a fragment-declared
/// requirement is the host module, while `requirement` still names the
/// fragment's declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wire {
    pub requirer: ModuleId,
    pub requirement: RequirementId,
    pub provider: ModuleId,
    pub capability: CapabilityId,
}

impl fmt::Display for Wire {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{} -> {}.{}",
            self.requirer, self.requirement, self.provider, self.capability
        )
    }
}

/// The finalized state of an already-resolved module.
///
/// The capability and requirement lists are the module's *effective* view:
/// its own declarations followed by any attached fragment's contributions,
/// in attachment order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wiring {
    pub module: ModuleId,
    pub required_wires: Vec<Wire>,
    pub capabilities: Vec<CapRef>,
    pub requirements: Vec<ReqRef>,
}

impl Wiring {
    pub fn new(module: ModuleId) -> Self {
        Self {
            module,
            required_wires: Vec::new(),
            capabilities: Vec::new(),
            requirements: Vec::new(),
        }
    }
}
