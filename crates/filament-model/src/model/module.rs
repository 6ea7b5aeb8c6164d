//! Modules: versioned units declaring capabilities and requirements.

use serde::{Deserialize, Serialize};

use crate::foundation::Version;
use crate::model::{CapabilityId, ModuleId, RequirementId};

/// A versioned unit declaring capabilities and requirements.
///
/// A module is a *fragment* iff it declares a host-namespace requirement;
/// its declarations are then re-expressed on the chosen host during
/// resolution. A `singleton` module tolerates at most one resolved module
/// per symbolic name among singletons.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    pub id: ModuleId,
    pub symbolic_name: String,
    pub version: Version,
    pub singleton: bool,
    pub capabilities: Vec<CapabilityId>,
    pub requirements: Vec<RequirementId>,
}
