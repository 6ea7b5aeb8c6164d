//! Requirements: what a module needs.

use serde::{Deserialize, Serialize};

use crate::foundation::Filter;
use crate::model::directives::{
    EFFECTIVE_DIRECTIVE, EFFECTIVE_RESOLVE, RESOLUTION_DIRECTIVE, RESOLUTION_DYNAMIC,
    RESOLUTION_OPTIONAL, VISIBILITY_DIRECTIVE, VISIBILITY_REEXPORT,
};
use crate::model::{Capability, Directives, ModuleId, RequirementId};

/// How strongly a requirement binds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Resolution {
    /// Must be satisfied for the owner to resolve. The default.
    Mandatory,
    /// May be left unsatisfied.
    Optional,
    /// Satisfied on demand against an already-resolved owner.
    Dynamic,
}

/// Demand that matches a capability by namespace and filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirement {
    pub id: RequirementId,
    pub owner: ModuleId,
    pub namespace: String,
    pub filter: Filter,
    pub directives: Directives,
}

impl Requirement {
    pub fn directive(&self, name: &str) -> Option<&str> {
        self.directives.get(name).map(String::as_str)
    }

    pub fn resolution(&self) -> Resolution {
        match self.directive(RESOLUTION_DIRECTIVE) {
            Some(RESOLUTION_OPTIONAL) => Resolution::Optional,
            Some(RESOLUTION_DYNAMIC) => Resolution::Dynamic,
            _ => Resolution::Mandatory,
        }
    }

    /// Whether a bundle requirement re-exports the provider's packages to
    /// the owner's own dependents.
    pub fn is_reexport(&self) -> bool {
        self.directive(VISIBILITY_DIRECTIVE) == Some(VISIBILITY_REEXPORT)
    }

    /// Whether the requirement participates in resolution at all.
    pub fn is_effective_resolve(&self) -> bool {
        self.directive(EFFECTIVE_DIRECTIVE)
            .map_or(true, |v| v == EFFECTIVE_RESOLVE)
    }

    /// Namespace equality plus filter match.
    pub fn matches(&self, capability: &Capability) -> bool {
        self.namespace == capability.namespace && self.filter.matches(&capability.attributes)
    }
}
