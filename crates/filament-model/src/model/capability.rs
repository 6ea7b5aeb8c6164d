//! Capabilities: what a module provides.

use serde::{Deserialize, Serialize};

use crate::foundation::Attrs;
use crate::model::directives::{
    EFFECTIVE_DIRECTIVE, EFFECTIVE_RESOLVE, PACKAGE_ATTR, PACKAGE_NAMESPACE,
};
use crate::model::{CapabilityId, Directives, ModuleId};

/// Advertisement of a provided facet in some namespace.
///
/// `uses` is the ordered list of package names whose providers must be seen
/// identically by this capability's owner and by anyone the capability is
/// wired to. It is meaningful on package capabilities and, for generic uses
/// propagation, on capabilities in any other namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capability {
    pub id: CapabilityId,
    pub owner: ModuleId,
    pub namespace: String,
    pub attributes: Attrs,
    pub directives: Directives,
    pub uses: Vec<String>,
}

impl Capability {
    pub fn directive(&self, name: &str) -> Option<&str> {
        self.directives.get(name).map(String::as_str)
    }

    pub fn is_package(&self) -> bool {
        self.namespace == PACKAGE_NAMESPACE
    }

    /// The package this capability exports, if it is a package capability
    /// with a well-formed package attribute.
    pub fn package_name(&self) -> Option<&str> {
        if !self.is_package() {
            return None;
        }
        self.attributes.get(PACKAGE_ATTR).and_then(|v| v.as_str())
    }

    /// Whether the capability participates in resolution at all.
    pub fn is_effective_resolve(&self) -> bool {
        self.directive(EFFECTIVE_DIRECTIVE)
            .map_or(true, |v| v == EFFECTIVE_RESOLVE)
    }
}
