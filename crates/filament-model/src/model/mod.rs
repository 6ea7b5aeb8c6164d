//! Entity model: ids, capabilities, requirements, modules, and wires.

mod capability;
pub mod directives;
mod ids;
mod module;
mod requirement;
mod wiring;

pub use capability::Capability;
pub use ids::{CapRef, CapabilityId, ModuleId, ReqRef, RequirementId};
pub use module::Module;
pub use requirement::{Requirement, Resolution};
pub use wiring::{Wire, Wiring};

use indexmap::IndexMap;

/// Directive map carried by capabilities and requirements.
pub type Directives = IndexMap<String, String>;
