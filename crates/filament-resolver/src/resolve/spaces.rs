//! Package spaces: each module's view of the package universe.
//!
//! A module's space records which packages it exports, imports, pulls in
//! through require-bundle edges, and is *exposed to* transitively through
//! `uses` directives. Every entry carries a [`Blame`] — the capability plus
//! the requirement chain explaining why it is visible — so the consistency
//! checker can both detect conflicts and explain them.
//!
//! Spaces are built in a strict four-phase walk per module, because later
//! phases read earlier ones:
//!
//! 1. exports (with substitutable exports elided)
//! 2. imports and required packages from the chosen candidates
//! 3. recursion into every chosen provider
//! 4. the transitive uses closure — only for modules that are resolving or
//!    dynamically importing; a wired module's space is consistent by
//!    definition

use std::collections::HashMap;

use indexmap::{IndexMap, IndexSet};

use filament_model::model::directives::{BUNDLE_NAMESPACE, PACKAGE_NAMESPACE};
use filament_model::{CapRef, Environment, ModuleId, ReqRef, Resolution};

use crate::resolve::candidates::Candidates;

/// A capability plus the requirement chain that makes it visible to the
/// subject module. An empty path means the subject exports it directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Blame {
    pub cap: CapRef,
    pub path: Vec<ReqRef>,
}

impl Blame {
    fn export(cap: CapRef) -> Self {
        Self {
            cap,
            path: Vec::new(),
        }
    }
}

/// One module's view of the package universe.
#[derive(Debug, Clone, Default)]
pub(crate) struct PackageSpace {
    pub exported: IndexMap<String, Blame>,
    pub imported: IndexMap<String, Vec<Blame>>,
    pub required: IndexMap<String, Vec<Blame>>,
    pub used: IndexMap<String, Vec<Blame>>,
}

pub(crate) type SpaceMap = IndexMap<ModuleId, PackageSpace>;

/// Memoized package sources, valid for one permutation attempt. The chosen
/// candidate map changes between attempts, so the driver clears this before
/// every attempt.
#[derive(Debug, Default)]
pub(crate) struct SourceCache {
    map: HashMap<CapRef, Vec<CapRef>>,
}

impl SourceCache {
    pub(crate) fn clear(&mut self) {
        self.map.clear();
    }
}

/// A module's effective capabilities: installed wiring for wired modules,
/// the candidate map's host-merged view otherwise.
pub(crate) fn effective_capabilities_of<E: Environment>(
    env: &E,
    candidates: &Candidates,
    module: ModuleId,
) -> Vec<CapRef> {
    match env.wiring(module) {
        Some(wiring) => wiring.capabilities.clone(),
        None => candidates.effective_capabilities(env.registry(), module),
    }
}

/// A module's effective requirements, symmetrically.
pub(crate) fn effective_requirements_of<E: Environment>(
    env: &E,
    candidates: &Candidates,
    module: ModuleId,
) -> Vec<ReqRef> {
    match env.wiring(module) {
        Some(wiring) => wiring.requirements.clone(),
        None => candidates.effective_requirements(env.registry(), module),
    }
}

/// The *package sources* of a capability: every same-named package
/// capability of its owner, plus transitively anything reachable through
/// the owner's required packages. For a non-package capability a non-empty
/// `uses` list makes the capability its own source; otherwise there are
/// none.
pub(crate) fn package_sources<E: Environment>(
    env: &E,
    candidates: &Candidates,
    spaces: &SpaceMap,
    cache: &mut SourceCache,
    cap: CapRef,
) -> Vec<CapRef> {
    let reg = env.registry();
    let decl = reg.capability(cap.declared_id());
    if decl.namespace == PACKAGE_NAMESPACE {
        if let Some(cached) = cache.map.get(&cap) {
            return cached.clone();
        }
        let mut out = Vec::new();
        let mut cycle = IndexSet::new();
        collect_package_sources(env, candidates, spaces, cap, &mut out, &mut cycle);
        cache.map.insert(cap, out.clone());
        return out;
    }
    if !decl.uses.is_empty() {
        return vec![cap];
    }
    Vec::new()
}

fn collect_package_sources<E: Environment>(
    env: &E,
    candidates: &Candidates,
    spaces: &SpaceMap,
    cap: CapRef,
    out: &mut Vec<CapRef>,
    cycle: &mut IndexSet<CapRef>,
) {
    let reg = env.registry();
    let decl = reg.capability(cap.declared_id());
    if decl.namespace != PACKAGE_NAMESPACE || !cycle.insert(cap) {
        return;
    }
    let Some(pkg) = decl.package_name() else {
        return;
    };

    // A module can export the same package more than once; take them all.
    let owner = cap.effective_owner(reg);
    for candidate in effective_capabilities_of(env, candidates, owner) {
        let d = reg.capability(candidate.declared_id());
        if d.package_name() == Some(pkg) && !out.contains(&candidate) {
            out.push(candidate);
        }
    }

    if let Some(space) = spaces.get(&owner) {
        if let Some(blames) = space.required.get(pkg) {
            for blame in blames {
                collect_package_sources(env, candidates, spaces, blame.cap, out, cycle);
            }
        }
    }
}

/// Builds the package spaces of the target module and of everything
/// transitively chosen from it.
pub(crate) fn build_spaces<E: Environment>(
    env: &E,
    candidates: &Candidates,
    sources: &mut SourceCache,
    target: ModuleId,
) -> SpaceMap {
    let mut builder = SpaceBuilder {
        env,
        candidates,
        sources,
        spaces: SpaceMap::new(),
        uses_cycles: IndexMap::new(),
        visited: IndexSet::new(),
    };
    builder.build(target);
    builder.spaces
}

struct SpaceBuilder<'a, E: Environment> {
    env: &'a E,
    candidates: &'a Candidates,
    sources: &'a mut SourceCache,
    spaces: SpaceMap,
    /// Capability → subjects already merged for it; bounds the uses
    /// recursion.
    uses_cycles: IndexMap<CapRef, Vec<ModuleId>>,
    visited: IndexSet<ModuleId>,
}

impl<'a, E: Environment> SpaceBuilder<'a, E> {
    fn build(&mut self, module: ModuleId) {
        if !self.visited.insert(module) {
            return;
        }
        let env = self.env;
        let reg = env.registry();

        // Pair each requirement with its chosen provider: installed wires
        // (re-wrapped as hosted where a fragment declared them) for wired
        // modules, the candidate map's first choice otherwise. A wired
        // module can additionally be mid dynamic import.
        let mut pairs: Vec<(ReqRef, CapRef)> = Vec::new();
        let mut dynamic_importing = false;
        if let Some(wiring) = env.wiring(module) {
            for wire in &wiring.required_wires {
                let req = if reg.requirement(wire.requirement).owner == wire.requirer {
                    ReqRef::Declared(wire.requirement)
                } else {
                    ReqRef::Hosted {
                        declared: wire.requirement,
                        host: wire.requirer,
                    }
                };
                let cap = if reg.capability(wire.capability).owner == wire.provider {
                    CapRef::Declared(wire.capability)
                } else {
                    CapRef::Hosted {
                        declared: wire.capability,
                        host: wire.provider,
                    }
                };
                pairs.push((req, cap));
            }
            for &req in &wiring.requirements {
                if reg.requirement(req.declared_id()).resolution() != Resolution::Dynamic {
                    continue;
                }
                if let Some(cap) = self.candidates.chosen(req) {
                    pairs.push((req, cap));
                    dynamic_importing = true;
                    // One dynamic import at a time.
                    break;
                }
            }
        } else {
            for req in self.candidates.effective_requirements(reg, module) {
                if reg.requirement(req.declared_id()).resolution() == Resolution::Dynamic {
                    continue;
                }
                if let Some(cap) = self.candidates.chosen(req) {
                    pairs.push((req, cap));
                }
            }
        }

        // Phase 1: the module's own exports.
        self.calculate_exports(module);

        // Phase 2: imported and required packages.
        for &(req, cap) in &pairs {
            self.calculate_exports(cap.effective_owner(reg));
            let mut guard = IndexSet::new();
            self.merge_candidate(module, req, cap, &mut guard);
        }

        // Phase 3: recurse into every chosen provider.
        for &(_, cap) in &pairs {
            self.build(cap.effective_owner(reg));
        }

        // Phase 4: the uses closure. Wired modules are consistent by
        // definition unless they are dynamically importing right now.
        if env.wiring(module).is_none() || dynamic_importing {
            for &(req, cap) in &pairs {
                if cap.effective_owner(reg) == module {
                    continue;
                }
                self.merge_uses(module, cap, &[req]);
            }
            let imported: Vec<(CapRef, ReqRef)> = self
                .spaces
                .get(&module)
                .map(|space| {
                    space
                        .imported
                        .values()
                        .flatten()
                        .filter_map(|blame| Some((blame.cap, *blame.path.first()?)))
                        .collect()
                })
                .unwrap_or_default();
            for (cap, first) in imported {
                if cap.effective_owner(reg) != module {
                    self.merge_uses(module, cap, &[first]);
                }
            }
            let required: Vec<(CapRef, ReqRef)> = self
                .spaces
                .get(&module)
                .map(|space| {
                    space
                        .required
                        .values()
                        .flatten()
                        .filter_map(|blame| Some((blame.cap, *blame.path.first()?)))
                        .collect()
                })
                .unwrap_or_default();
            for (cap, first) in required {
                self.merge_uses(module, cap, &[first]);
            }
        }
    }

    /// Phase 1: declared (or wired) package capabilities, minus
    /// substitutable exports that the module imports from another module.
    fn calculate_exports(&mut self, module: ModuleId) {
        if self.spaces.contains_key(&module) {
            return;
        }
        let env = self.env;
        let reg = env.registry();

        let mut exports: IndexMap<String, CapRef> = IndexMap::new();
        for cap in effective_capabilities_of(env, self.candidates, module) {
            let decl = reg.capability(cap.declared_id());
            if !decl.is_effective_resolve() {
                continue;
            }
            if let Some(pkg) = decl.package_name() {
                exports.insert(pkg.to_string(), cap);
            }
        }

        if !exports.is_empty() {
            match env.wiring(module) {
                Some(wiring) => {
                    for wire in &wiring.required_wires {
                        if let Some(pkg) = reg.capability(wire.capability).package_name() {
                            exports.shift_remove(pkg);
                        }
                    }
                }
                None => {
                    for req in self.candidates.effective_requirements(reg, module) {
                        if reg.requirement(req.declared_id()).namespace != PACKAGE_NAMESPACE {
                            continue;
                        }
                        let Some(chosen) = self.candidates.chosen(req) else {
                            continue;
                        };
                        // Substitution only counts when the provider is
                        // another module.
                        if chosen.effective_owner(reg) == module {
                            continue;
                        }
                        if let Some(pkg) = reg.capability(chosen.declared_id()).package_name() {
                            exports.shift_remove(pkg);
                        }
                    }
                }
            }
        }

        let mut space = PackageSpace::default();
        for (pkg, cap) in exports {
            space.exported.insert(pkg, Blame::export(cap));
        }
        self.spaces.insert(module, space);
    }

    /// Phase 2 worker: a package candidate lands in `imported`; a bundle
    /// candidate merges the provider's whole export set into `required`,
    /// recursing through the provider's reexport-visibility bundle edges.
    fn merge_candidate(
        &mut self,
        current: ModuleId,
        req: ReqRef,
        cap: CapRef,
        guard: &mut IndexSet<CapRef>,
    ) {
        let env = self.env;
        let reg = env.registry();
        if cap.effective_owner(reg) == current {
            // Self-imports contribute nothing to the space.
            return;
        }
        let namespace = reg.capability(cap.declared_id()).namespace.as_str();
        if namespace == PACKAGE_NAMESPACE {
            self.merge_candidate_package(current, false, req, cap);
        } else if namespace == BUNDLE_NAMESPACE {
            if !guard.insert(cap) {
                return;
            }
            let provider = cap.effective_owner(reg);
            self.calculate_exports(provider);
            let exported: Vec<CapRef> = self.spaces[&provider]
                .exported
                .values()
                .map(|blame| blame.cap)
                .collect();
            for package_cap in exported {
                self.merge_candidate_package(current, true, req, package_cap);
            }

            for provider_req in effective_requirements_of(env, self.candidates, provider) {
                let decl = reg.requirement(provider_req.declared_id());
                if decl.namespace != BUNDLE_NAMESPACE || !decl.is_reexport() {
                    continue;
                }
                let next = match env.wiring(provider) {
                    Some(wiring) => wiring
                        .required_wires
                        .iter()
                        .find(|wire| wire.requirement == provider_req.declared_id())
                        .map(|wire| {
                            if reg.capability(wire.capability).owner == wire.provider {
                                CapRef::Declared(wire.capability)
                            } else {
                                CapRef::Hosted {
                                    declared: wire.capability,
                                    host: wire.provider,
                                }
                            }
                        }),
                    None => self.candidates.chosen(provider_req),
                };
                if let Some(next) = next {
                    self.merge_candidate(current, req, next, guard);
                }
            }
        }
    }

    fn merge_candidate_package(
        &mut self,
        current: ModuleId,
        requires: bool,
        req: ReqRef,
        cap: CapRef,
    ) {
        let reg = self.env.registry();
        let Some(pkg) = reg.capability(cap.declared_id()).package_name() else {
            return;
        };
        let pkg = pkg.to_string();
        let space = self.spaces.entry(current).or_default();
        let bucket = if requires {
            &mut space.required
        } else {
            &mut space.imported
        };
        bucket.entry(pkg).or_default().push(Blame {
            cap,
            path: vec![req],
        });
    }

    /// Phase 4 worker: fold the `uses` constraints reachable through `cap`
    /// into the subject's `used` map, extending the blame path as the
    /// recursion deepens.
    fn merge_uses(&mut self, current: ModuleId, cap: CapRef, path: &[ReqRef]) {
        let env = self.env;
        let reg = env.registry();
        if cap.effective_owner(reg) == current {
            return;
        }
        {
            let visited = self.uses_cycles.entry(cap).or_default();
            if visited.contains(&current) {
                return;
            }
            visited.push(current);
        }

        let sources = package_sources(env, self.candidates, &self.spaces, self.sources, cap);
        for source in sources {
            let source_owner = source.effective_owner(reg);
            let uses = reg.capability(source.declared_id()).uses.clone();
            for used_pkg in &uses {
                // The source owner's own view of the used package: its
                // export if it has one, its imports otherwise.
                let blames: Vec<Blame> = match self.spaces.get(&source_owner) {
                    Some(space) => match space.exported.get(used_pkg) {
                        Some(blame) => vec![blame.clone()],
                        None => space.imported.get(used_pkg).cloned().unwrap_or_default(),
                    },
                    None => Vec::new(),
                };
                for blame in blames {
                    let mut extended = path.to_vec();
                    if let Some(&last) = blame.path.last() {
                        extended.push(last);
                    }
                    self.spaces
                        .entry(current)
                        .or_default()
                        .used
                        .entry(used_pkg.clone())
                        .or_default()
                        .push(Blame {
                            cap: blame.cap,
                            path: extended.clone(),
                        });
                    self.merge_uses(current, blame.cap, &extended);
                }
            }
        }
    }
}
