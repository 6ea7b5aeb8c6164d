//! Dynamic import pre-conditions and candidate probing.
//!
//! A dynamic import only applies when the target module is already wired,
//! the package is named, not already sourced (directly or through
//! require-bundle re-exports), and not exported by the target itself. The
//! probe then picks the first `resolution=dynamic` requirement, in
//! declaration order, whose filter admits a provider of exactly the
//! requested package.

use indexmap::IndexSet;
use tracing::trace;

use filament_model::model::directives::BUNDLE_NAMESPACE;
use filament_model::{CapabilityId, Environment, ModuleId, ReqRef, Resolution, Wiring};

use crate::resolve::candidates::Candidates;

/// Checks the pre-conditions and seeds a candidate map for the dynamic
/// import. `None` means the dynamic import is inapplicable.
pub(crate) fn dynamic_import_probe<E: Environment>(
    env: &E,
    module: ModuleId,
    package: &str,
) -> Option<(ReqRef, Candidates)> {
    let wiring = env.wiring(module)?;
    if package.is_empty() {
        return None;
    }
    let reg = env.registry();

    // A module never dynamically imports what it already exports.
    for cap in &wiring.capabilities {
        if reg.capability(cap.declared_id()).package_name() == Some(package) {
            return None;
        }
    }
    if has_package_source(env, wiring, package) {
        return None;
    }

    for &req in &wiring.requirements {
        if reg.requirement(req.declared_id()).resolution() != Resolution::Dynamic {
            continue;
        }
        let matching: Vec<CapabilityId> = env
            .candidates(req.declared_id(), false)
            .into_iter()
            .filter(|&cap| reg.capability(cap).package_name() == Some(package))
            .collect();
        if matching.is_empty() {
            continue;
        }
        let candidates = Candidates::seed_dynamic(env, module, req, matching)?;
        trace!(
            module = %reg.module(module).symbolic_name,
            package,
            "dynamic import probe matched"
        );
        return Some((req, candidates));
    }
    None
}

/// Whether the module already sees the package, either through a direct
/// package wire or through the exports of a required bundle (following
/// reexport-visibility edges).
fn has_package_source<E: Environment>(env: &E, wiring: &Wiring, package: &str) -> bool {
    let reg = env.registry();
    for wire in &wiring.required_wires {
        let cap = reg.capability(wire.capability);
        if cap.package_name() == Some(package) {
            return true;
        }
        if cap.namespace == BUNDLE_NAMESPACE {
            let mut seen = IndexSet::new();
            if bundle_exports(env, wire.provider, package, &mut seen) {
                return true;
            }
        }
    }
    false
}

fn bundle_exports<E: Environment>(
    env: &E,
    module: ModuleId,
    package: &str,
    seen: &mut IndexSet<ModuleId>,
) -> bool {
    if !seen.insert(module) {
        return false;
    }
    let reg = env.registry();
    let exports_it = match env.wiring(module) {
        Some(wiring) => wiring
            .capabilities
            .iter()
            .any(|cap| reg.capability(cap.declared_id()).package_name() == Some(package)),
        None => reg
            .declared_capabilities(module, None)
            .into_iter()
            .any(|cap| reg.capability(cap).package_name() == Some(package)),
    };
    if exports_it {
        return true;
    }
    if let Some(wiring) = env.wiring(module) {
        for wire in &wiring.required_wires {
            let decl = reg.requirement(wire.requirement);
            if decl.namespace == BUNDLE_NAMESPACE
                && decl.is_reexport()
                && bundle_exports(env, wire.provider, package, seen)
            {
                return true;
            }
        }
    }
    false
}
