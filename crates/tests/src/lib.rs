//! Integration test harness for Filament.
//!
//! This crate provides utilities for end-to-end testing of the full
//! resolution pipeline: declare modules → resolve → inspect wires. The
//! harness wraps a [`StaticEnvironment`] with a fluent scenario builder so
//! tests read close to the prose they verify.

use filament_model::model::directives::{
    host_filter, package_filter, BUNDLE_ATTR, BUNDLE_NAMESPACE, HOST_NAMESPACE, PACKAGE_ATTR,
    PACKAGE_NAMESPACE, RESOLUTION_DIRECTIVE, RESOLUTION_DYNAMIC, RESOLUTION_OPTIONAL,
    VERSION_ATTR, VISIBILITY_DIRECTIVE, VISIBILITY_REEXPORT,
};
use filament_model::{
    Attrs, Directives, Environment, Filter, ModuleBuilder, ModuleId, StaticEnvironment, Value,
    Version,
};
use filament_resolver::{ResolveError, Resolver, WireMap};

/// Test harness for declaring module scenarios and resolving them.
pub struct TestHarness {
    env: StaticEnvironment,
    resolver: Resolver,
}

impl TestHarness {
    pub fn new() -> Self {
        Self {
            env: StaticEnvironment::default(),
            resolver: Resolver::new(),
        }
    }

    /// Declares a module at version 1.0.0.
    pub fn module(&mut self, name: &str) -> ModuleDecl<'_> {
        self.module_at(name, "1.0.0")
    }

    /// Declares a module at an explicit version. Every module gets a
    /// bundle capability so require-bundle edges can find it.
    pub fn module_at(&mut self, name: &str, version: &str) -> ModuleDecl<'_> {
        let version: Version = version.parse().expect("valid version");
        let bundle_attrs: Attrs = [
            (BUNDLE_ATTR.to_string(), Value::from(name)),
            (VERSION_ATTR.to_string(), Value::from(version.clone())),
        ]
        .into_iter()
        .collect();
        let builder = self
            .env
            .registry_mut()
            .add_module(name, version)
            .capability(BUNDLE_NAMESPACE, bundle_attrs, Directives::new(), vec![]);
        ModuleDecl {
            builder,
            name: name.to_string(),
        }
    }

    /// Looks up a module id by symbolic name; first declaration wins.
    pub fn id(&self, name: &str) -> ModuleId {
        self.env
            .registry()
            .find_module(name)
            .unwrap_or_else(|| panic!("module '{}' not declared", name))
    }

    pub fn env(&self) -> &StaticEnvironment {
        &self.env
    }

    /// Marks a module as already resolved, with no wires of its own.
    pub fn mark_resolved(&mut self, name: &str) {
        let id = self.id(name);
        self.env.wire_resolved(id, vec![]);
    }

    /// Installs a resolve outcome: every module in the map becomes wired.
    pub fn install(&mut self, wire_map: &WireMap) {
        self.env.install(wire_map);
    }

    pub fn resolve(&mut self, root: &str) -> Result<WireMap, ResolveError> {
        let root = self.id(root);
        self.resolver.resolve(&self.env, root, &[])
    }

    pub fn resolve_with_optionals(
        &mut self,
        root: &str,
        optionals: &[&str],
    ) -> Result<WireMap, ResolveError> {
        let root = self.id(root);
        let optionals: Vec<ModuleId> = optionals.iter().map(|name| self.id(name)).collect();
        self.resolver.resolve(&self.env, root, &optionals)
    }

    pub fn resolve_dynamic(&mut self, root: &str, package: &str) -> Option<WireMap> {
        let root = self.id(root);
        self.resolver.resolve_dynamic(&self.env, root, package, &[])
    }

    /// The symbolic name of the provider wired for `module`'s view of
    /// `package`, if the wire map has one.
    pub fn provider_of(&self, wire_map: &WireMap, module: &str, package: &str) -> Option<String> {
        let reg = self.env.registry();
        let wires = wire_map.get(&self.id(module))?;
        wires.iter().find_map(|wire| {
            let cap = reg.capability(wire.capability);
            (cap.package_name() == Some(package))
                .then(|| reg.module(wire.provider).symbolic_name.clone())
        })
    }

    /// How many wires a module got, zero if absent from the map.
    pub fn wire_count(&self, wire_map: &WireMap, module: &str) -> usize {
        wire_map
            .get(&self.id(module))
            .map(Vec::len)
            .unwrap_or_default()
    }

    /// Whether the wire map contains the module at all.
    pub fn emitted(&self, wire_map: &WireMap, module: &str) -> bool {
        wire_map.contains_key(&self.id(module))
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Fluent declaration of one module.
pub struct ModuleDecl<'a> {
    builder: ModuleBuilder<'a>,
    name: String,
}

impl<'a> ModuleDecl<'a> {
    fn map(self, f: impl FnOnce(ModuleBuilder<'a>) -> ModuleBuilder<'a>) -> Self {
        Self {
            builder: f(self.builder),
            name: self.name,
        }
    }

    fn package_attrs(package: &str) -> Attrs {
        [(PACKAGE_ATTR.to_string(), Value::from(package))]
            .into_iter()
            .collect()
    }

    pub fn singleton(self) -> Self {
        self.map(|b| b.singleton())
    }

    /// Exports a package.
    pub fn export(self, package: &str) -> Self {
        self.map(|b| {
            b.capability(
                PACKAGE_NAMESPACE,
                Self::package_attrs(package),
                Directives::new(),
                vec![],
            )
        })
    }

    /// Exports a package at a version.
    pub fn export_at(self, package: &str, version: &str) -> Self {
        let version: Version = version.parse().expect("valid version");
        let attrs: Attrs = [
            (PACKAGE_ATTR.to_string(), Value::from(package)),
            (VERSION_ATTR.to_string(), Value::from(version)),
        ]
        .into_iter()
        .collect();
        self.map(|b| b.capability(PACKAGE_NAMESPACE, attrs, Directives::new(), vec![]))
    }

    /// Exports a package that uses other packages.
    pub fn export_uses(self, package: &str, uses: &[&str]) -> Self {
        let uses = uses.iter().map(|s| s.to_string()).collect();
        self.map(|b| {
            b.capability(
                PACKAGE_NAMESPACE,
                Self::package_attrs(package),
                Directives::new(),
                uses,
            )
        })
    }

    /// Exports a package with an explicit `effective` directive.
    pub fn export_effective(self, package: &str, effective: &str) -> Self {
        let directives: Directives = [(
            filament_model::model::directives::EFFECTIVE_DIRECTIVE.to_string(),
            effective.to_string(),
        )]
        .into_iter()
        .collect();
        self.map(|b| {
            b.capability(
                PACKAGE_NAMESPACE,
                Self::package_attrs(package),
                directives,
                vec![],
            )
        })
    }

    /// Imports a package.
    pub fn import(self, package: &str) -> Self {
        self.map(|b| b.requirement(PACKAGE_NAMESPACE, package_filter(package), Directives::new()))
    }

    /// Imports a package at or above a minimum version.
    pub fn import_min(self, package: &str, version: &str) -> Self {
        let version: Version = version.parse().expect("valid version");
        let filter = Filter::And(vec![
            package_filter(package),
            Filter::Gte(VERSION_ATTR.to_string(), Value::from(version)),
        ]);
        self.map(|b| b.requirement(PACKAGE_NAMESPACE, filter, Directives::new()))
    }

    /// Imports a package at or below a maximum version.
    pub fn import_max(self, package: &str, version: &str) -> Self {
        let version: Version = version.parse().expect("valid version");
        let filter = Filter::And(vec![
            package_filter(package),
            Filter::Lte(VERSION_ATTR.to_string(), Value::from(version)),
        ]);
        self.map(|b| b.requirement(PACKAGE_NAMESPACE, filter, Directives::new()))
    }

    pub fn import_optional(self, package: &str) -> Self {
        let directives: Directives = [(
            RESOLUTION_DIRECTIVE.to_string(),
            RESOLUTION_OPTIONAL.to_string(),
        )]
        .into_iter()
        .collect();
        self.map(|b| b.requirement(PACKAGE_NAMESPACE, package_filter(package), directives))
    }

    /// Declares a wildcard dynamic import.
    pub fn dynamic_import_any(self) -> Self {
        let directives: Directives = [(
            RESOLUTION_DIRECTIVE.to_string(),
            RESOLUTION_DYNAMIC.to_string(),
        )]
        .into_iter()
        .collect();
        self.map(|b| {
            b.requirement(
                PACKAGE_NAMESPACE,
                Filter::Prefix(PACKAGE_ATTR.to_string(), String::new()),
                directives,
            )
        })
    }

    /// Requires another bundle by symbolic name.
    pub fn require(self, bundle: &str) -> Self {
        self.map(|b| {
            b.requirement(
                BUNDLE_NAMESPACE,
                filament_model::model::directives::bundle_filter(bundle),
                Directives::new(),
            )
        })
    }

    /// Requires another bundle with reexport visibility.
    pub fn require_reexport(self, bundle: &str) -> Self {
        let directives: Directives = [(
            VISIBILITY_DIRECTIVE.to_string(),
            VISIBILITY_REEXPORT.to_string(),
        )]
        .into_iter()
        .collect();
        self.map(|b| {
            b.requirement(
                BUNDLE_NAMESPACE,
                filament_model::model::directives::bundle_filter(bundle),
                directives,
            )
        })
    }

    /// Accepts fragments: declares a host capability.
    pub fn host(self) -> Self {
        let name = self.name.clone();
        let attrs: Attrs = [(BUNDLE_ATTR.to_string(), Value::from(name.as_str()))]
            .into_iter()
            .collect();
        self.map(|b| b.capability(HOST_NAMESPACE, attrs, Directives::new(), vec![]))
    }

    /// Turns the module into a fragment of the named host.
    pub fn fragment_of(self, host: &str) -> Self {
        self.map(|b| b.requirement(HOST_NAMESPACE, host_filter(host), Directives::new()))
    }

    pub fn build(self) -> ModuleId {
        self.builder.build()
    }
}
