//! The entity arena.
//!
//! Modules, capabilities, and requirements form a cyclic object graph, so
//! the graph is flattened: every entity lives in the [`Registry`] and all
//! cross-references are ids. Ids are only minted by the registry, so the
//! plain-index accessors cannot dangle.

use serde::{Deserialize, Serialize};

use crate::foundation::{Attrs, Filter, Version};
use crate::model::directives::HOST_NAMESPACE;
use crate::model::{
    Capability, CapabilityId, Directives, Module, ModuleId, Requirement, RequirementId,
};

/// Arena of every declared module, capability, and requirement.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Registry {
    modules: Vec<Module>,
    capabilities: Vec<Capability>,
    requirements: Vec<Requirement>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn module(&self, id: ModuleId) -> &Module {
        &self.modules[id.0 as usize]
    }

    pub fn capability(&self, id: CapabilityId) -> &Capability {
        &self.capabilities[id.0 as usize]
    }

    pub fn requirement(&self, id: RequirementId) -> &Requirement {
        &self.requirements[id.0 as usize]
    }

    pub fn modules(&self) -> impl Iterator<Item = &Module> {
        self.modules.iter()
    }

    pub fn capabilities(&self) -> impl Iterator<Item = &Capability> {
        self.capabilities.iter()
    }

    /// Starts a new module; declarations are added through the returned
    /// builder.
    pub fn add_module(&mut self, symbolic_name: &str, version: Version) -> ModuleBuilder<'_> {
        let id = ModuleId(self.modules.len() as u32);
        self.modules.push(Module {
            id,
            symbolic_name: symbolic_name.to_string(),
            version,
            singleton: false,
            capabilities: Vec::new(),
            requirements: Vec::new(),
        });
        ModuleBuilder { registry: self, id }
    }

    /// Looks a module up by symbolic name; first declaration wins.
    pub fn find_module(&self, symbolic_name: &str) -> Option<ModuleId> {
        self.modules
            .iter()
            .find(|m| m.symbolic_name == symbolic_name)
            .map(|m| m.id)
    }

    /// Declared capabilities of a module, optionally restricted to one
    /// namespace, in declaration order.
    pub fn declared_capabilities(
        &self,
        module: ModuleId,
        namespace: Option<&str>,
    ) -> Vec<CapabilityId> {
        self.module(module)
            .capabilities
            .iter()
            .copied()
            .filter(|&c| namespace.map_or(true, |ns| self.capability(c).namespace == ns))
            .collect()
    }

    /// Declared requirements of a module, optionally restricted to one
    /// namespace, in declaration order.
    pub fn declared_requirements(
        &self,
        module: ModuleId,
        namespace: Option<&str>,
    ) -> Vec<RequirementId> {
        self.module(module)
            .requirements
            .iter()
            .copied()
            .filter(|&r| namespace.map_or(true, |ns| self.requirement(r).namespace == ns))
            .collect()
    }

    /// The host requirement of a fragment, if the module is one.
    pub fn host_requirement(&self, module: ModuleId) -> Option<RequirementId> {
        self.module(module)
            .requirements
            .iter()
            .copied()
            .find(|&r| self.requirement(r).namespace == HOST_NAMESPACE)
    }

    pub fn is_fragment(&self, module: ModuleId) -> bool {
        self.host_requirement(module).is_some()
    }
}

/// Incremental declaration of one module's capabilities and requirements.
pub struct ModuleBuilder<'a> {
    registry: &'a mut Registry,
    id: ModuleId,
}

impl<'a> ModuleBuilder<'a> {
    pub fn singleton(self) -> Self {
        self.registry.modules[self.id.0 as usize].singleton = true;
        self
    }

    pub fn capability(
        self,
        namespace: &str,
        attributes: Attrs,
        directives: Directives,
        uses: Vec<String>,
    ) -> Self {
        let cap_id = CapabilityId(self.registry.capabilities.len() as u32);
        self.registry.capabilities.push(Capability {
            id: cap_id,
            owner: self.id,
            namespace: namespace.to_string(),
            attributes,
            directives,
            uses,
        });
        self.registry.modules[self.id.0 as usize].capabilities.push(cap_id);
        self
    }

    pub fn requirement(self, namespace: &str, filter: Filter, directives: Directives) -> Self {
        let req_id = RequirementId(self.registry.requirements.len() as u32);
        self.registry.requirements.push(Requirement {
            id: req_id,
            owner: self.id,
            namespace: namespace.to_string(),
            filter,
            directives,
        });
        self.registry.modules[self.id.0 as usize].requirements.push(req_id);
        self
    }

    pub fn build(self) -> ModuleId {
        self.id
    }
}
