//! Wire emission: the winning candidate map as a per-module wire list.
//!
//! Hosted wrappers are unwrapped here — consumers see declared ids, with
//! the requirer of a fragment-declared requirement being the host. Wires
//! per module are ordered package, then bundle, then generic, stable by
//! declaration order within each group.

use indexmap::IndexMap;

use filament_model::model::directives::{BUNDLE_NAMESPACE, PACKAGE_NAMESPACE};
use filament_model::{Environment, ModuleId, ReqRef, Wire};

use crate::resolve::candidates::Candidates;
use crate::resolve::spaces::SpaceMap;

/// The resolver's output: for every newly resolved module, its wires.
pub type WireMap = IndexMap<ModuleId, Vec<Wire>>;

/// Emits wires for `module` and, recursively, for every unresolved
/// provider it was wired to.
pub(crate) fn populate_wire_map<E: Environment>(
    env: &E,
    candidates: &Candidates,
    module: ModuleId,
    wire_map: &mut WireMap,
) {
    if env.wiring(module).is_some() || wire_map.contains_key(&module) {
        return;
    }
    // Placeholder entry guards against dependency cycles through wired
    // modules re-entering this module.
    wire_map.insert(module, Vec::new());

    let reg = env.registry();
    let mut package_wires: Vec<Wire> = Vec::new();
    let mut bundle_wires: Vec<Wire> = Vec::new();
    let mut generic_wires: Vec<Wire> = Vec::new();

    for req in candidates.effective_requirements(reg, module) {
        let Some(cap) = candidates.chosen(req) else {
            continue;
        };
        let provider = cap.effective_owner(reg);
        if provider != module && env.wiring(provider).is_none() {
            populate_wire_map(env, candidates, provider, wire_map);
        }
        let wire = Wire {
            requirer: module,
            requirement: req.declared_id(),
            provider,
            capability: cap.declared_id(),
        };
        match reg.requirement(req.declared_id()).namespace.as_str() {
            PACKAGE_NAMESPACE => package_wires.push(wire),
            BUNDLE_NAMESPACE => bundle_wires.push(wire),
            _ => generic_wires.push(wire),
        }
    }

    package_wires.extend(bundle_wires);
    package_wires.extend(generic_wires);
    wire_map.insert(module, package_wires);

    // Every attached fragment gets a host wire of its own.
    for &fragment in candidates.fragments_of(module) {
        let Some(host_req) = reg.host_requirement(fragment) else {
            continue;
        };
        let Some(host_cap) = candidates.chosen(ReqRef::Declared(host_req)) else {
            continue;
        };
        wire_map.entry(fragment).or_default().push(Wire {
            requirer: fragment,
            requirement: host_req,
            provider: module,
            capability: host_cap.declared_id(),
        });
    }
}

/// Emits the single-package wire list of a dynamic import. The matched
/// dynamic requirement's id is reused on every emitted wire.
pub(crate) fn populate_dynamic_wire_map<E: Environment>(
    env: &E,
    candidates: &Candidates,
    spaces: &SpaceMap,
    module: ModuleId,
    package: &str,
    dynamic_req: ReqRef,
) -> WireMap {
    let reg = env.registry();
    let mut wire_map = WireMap::new();
    wire_map.insert(module, Vec::new());

    let mut wires: Vec<Wire> = Vec::new();
    if let Some(space) = spaces.get(&module) {
        for blames in space.imported.values() {
            for blame in blames {
                let provider = blame.cap.effective_owner(reg);
                if provider == module {
                    continue;
                }
                if reg.capability(blame.cap.declared_id()).package_name() != Some(package) {
                    continue;
                }
                if env.wiring(provider).is_none() {
                    populate_wire_map(env, candidates, provider, &mut wire_map);
                }
                wires.push(Wire {
                    requirer: module,
                    requirement: dynamic_req.declared_id(),
                    provider,
                    capability: blame.cap.declared_id(),
                });
            }
        }
    }
    wire_map.insert(module, wires);
    wire_map
}
