//! The environment seam between the resolver and its host.
//!
//! The resolver is a pure function of environment state and a root request.
//! The environment owns the registry, answers candidate queries in its own
//! preference order, and knows which modules are already resolved. The
//! resolver never reorders candidates and never mutates the environment.

use indexmap::IndexMap;

use crate::model::directives::MANDATORY_DIRECTIVE;
use crate::model::{CapRef, Capability, CapabilityId, ModuleId, ReqRef, RequirementId, Wire, Wiring};
use crate::registry::Registry;

/// What the resolver needs from its host.
pub trait Environment {
    fn registry(&self) -> &Registry;

    /// Providers for a requirement, in preference order. With
    /// `obey_mandatory` set, capabilities that insist on attributes the
    /// requirement's filter does not constrain are excluded.
    fn candidates(&self, requirement: RequirementId, obey_mandatory: bool) -> Vec<CapabilityId>;

    /// The finalized wiring of an already-resolved module, if any.
    fn wiring(&self, module: ModuleId) -> Option<&Wiring>;

    fn is_wired(&self, module: ModuleId) -> bool {
        self.wiring(module).is_some()
    }
}

/// Reference environment over a plain [`Registry`].
///
/// Candidate preference order is capability declaration order. Good enough
/// for embedding and for tests; a production host would typically index
/// capabilities per namespace instead of scanning.
#[derive(Debug, Clone, Default)]
pub struct StaticEnvironment {
    registry: Registry,
    wirings: IndexMap<ModuleId, Wiring>,
}

impl StaticEnvironment {
    pub fn new(registry: Registry) -> Self {
        Self {
            registry,
            wirings: IndexMap::new(),
        }
    }

    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    pub fn set_wiring(&mut self, wiring: Wiring) {
        self.wirings.insert(wiring.module, wiring);
    }

    /// Marks a module as resolved with the given wires, deriving its
    /// effective capability and requirement views from its declarations.
    pub fn wire_resolved(&mut self, module: ModuleId, wires: Vec<Wire>) {
        let wiring = Wiring {
            module,
            required_wires: wires,
            capabilities: self
                .registry
                .declared_capabilities(module, None)
                .into_iter()
                .map(CapRef::Declared)
                .collect(),
            requirements: self
                .registry
                .declared_requirements(module, None)
                .into_iter()
                .map(ReqRef::Declared)
                .collect(),
        };
        self.wirings.insert(module, wiring);
    }

    /// Installs the outcome of a resolve: every module in the wire map
    /// becomes wired with its emitted wires.
    pub fn install(&mut self, wire_map: &IndexMap<ModuleId, Vec<Wire>>) {
        for (&module, wires) in wire_map {
            self.wire_resolved(module, wires.clone());
        }
    }
}

fn mandatory_satisfied(capability: &Capability, requirement_filter: &crate::Filter) -> bool {
    match capability.directive(MANDATORY_DIRECTIVE) {
        None => true,
        Some(list) => list
            .split(',')
            .map(str::trim)
            .filter(|attr| !attr.is_empty())
            .all(|attr| requirement_filter.references(attr)),
    }
}

impl Environment for StaticEnvironment {
    fn registry(&self) -> &Registry {
        &self.registry
    }

    fn candidates(&self, requirement: RequirementId, obey_mandatory: bool) -> Vec<CapabilityId> {
        let req = self.registry.requirement(requirement);
        let mut out = Vec::new();
        for cap in self.registry.capabilities() {
            if !cap.is_effective_resolve() {
                continue;
            }
            if obey_mandatory && !mandatory_satisfied(cap, &req.filter) {
                continue;
            }
            if req.matches(cap) {
                out.push(cap.id);
            }
        }
        out
    }

    fn wiring(&self, module: ModuleId) -> Option<&Wiring> {
        self.wirings.get(&module)
    }
}
