//! The candidate map: the resolver's mutable assignment.
//!
//! For each open requirement the map holds an ordered list of still-viable
//! provider capabilities; the first element is the current choice. Ordering
//! comes from the environment — the resolver only ever removes elements,
//! never reorders.
//!
//! The map is built in two steps:
//!
//! 1. **Population** walks the requirement graph from the root, querying
//!    the environment for candidates and recursing into every chosen
//!    provider that is not already wired. A mandatory requirement with no
//!    viable candidate fails its owner; failed owners are dropped from the
//!    candidate lists that reached them.
//! 2. **Prepare** merges fragments into their hosts: a fragment's
//!    declarations are re-expressed as hosted capabilities and requirements
//!    owned by the host, candidate entries are re-keyed accordingly, and
//!    unattachable fragments (and singletons colliding with a wired
//!    singleton) are expelled from the candidate space.
//!
//! Snapshots are cheap by design: the lists sit behind `Arc`, so `clone`
//! copies the map skeleton and shares every list until a permutation
//! actually mutates one.

use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use tracing::{debug, trace};

use filament_model::model::directives::HOST_NAMESPACE;
use filament_model::{
    CapRef, Environment, ModuleId, Registry, ReqRef, RequirementId, Resolution,
};

use crate::error::{ResolveError, Result};

#[derive(Debug, Clone)]
enum PopulateState {
    InProgress,
    Done,
    Failed(ResolveError),
}

/// A host's merged declaration view after fragment attachment.
#[derive(Debug, Clone, Default)]
pub(crate) struct HostView {
    pub fragments: Vec<ModuleId>,
    pub capabilities: Vec<CapRef>,
    pub requirements: Vec<ReqRef>,
}

/// Mutable assignment of providers to open requirements.
#[derive(Debug, Clone, Default)]
pub(crate) struct Candidates {
    map: IndexMap<ReqRef, Arc<Vec<CapRef>>>,
    populated: IndexMap<ModuleId, PopulateState>,
    /// Fragment → host, fixed by `prepare`.
    attachments: IndexMap<ModuleId, ModuleId>,
    /// Host → merged view, for hosts with at least one attachment.
    hosts: IndexMap<ModuleId, HostView>,
}

impl Candidates {
    /// Seeds the map from the root module. Fails if the root (or anything
    /// it transitively needs) has a mandatory requirement without viable
    /// candidates.
    pub(crate) fn populate_root<E: Environment>(env: &E, root: ModuleId) -> Result<Self> {
        let mut candidates = Self::default();
        candidates.populate(env, root)?;
        Ok(candidates)
    }

    /// Populates an optional module with the same algorithm. The caller is
    /// expected to swallow a failure and drop the optional.
    pub(crate) fn populate_optional<E: Environment>(
        &mut self,
        env: &E,
        module: ModuleId,
    ) -> Result<()> {
        if env.wiring(module).is_some() {
            return Ok(());
        }
        self.populate(env, module)
    }

    fn populate<E: Environment>(&mut self, env: &E, module: ModuleId) -> Result<()> {
        if let Some(state) = self.populated.get(&module).cloned() {
            return match state {
                PopulateState::Done | PopulateState::InProgress => Ok(()),
                PopulateState::Failed(err) => Err(err),
            };
        }
        self.populated.insert(module, PopulateState::InProgress);

        let reg = env.registry();
        let mut local: Vec<(RequirementId, Vec<CapRef>)> = Vec::new();
        for req_id in reg.declared_requirements(module, None) {
            let req = reg.requirement(req_id);
            if req.resolution() == Resolution::Dynamic || !req.is_effective_resolve() {
                continue;
            }

            let mut keep: Vec<CapRef> = Vec::new();
            for cap_id in env.candidates(req_id, true) {
                let owner = reg.capability(cap_id).owner;
                if owner == module || env.wiring(owner).is_some() {
                    keep.push(CapRef::Declared(cap_id));
                    continue;
                }
                match self.populated.get(&owner).cloned() {
                    Some(PopulateState::InProgress) => {
                        // Mutually-recursive unresolved modules cannot
                        // satisfy each other.
                        trace!(
                            module = %reg.module(module).symbolic_name,
                            candidate = %reg.module(owner).symbolic_name,
                            "rejecting candidate from unresolved dependency cycle"
                        );
                        continue;
                    }
                    Some(PopulateState::Failed(_)) => continue,
                    Some(PopulateState::Done) => {
                        keep.push(CapRef::Declared(cap_id));
                        continue;
                    }
                    None => {}
                }
                match self.populate(env, owner) {
                    Ok(()) => keep.push(CapRef::Declared(cap_id)),
                    Err(err) => {
                        trace!(
                            candidate = %reg.module(owner).symbolic_name,
                            %err,
                            "candidate owner failed to populate"
                        );
                    }
                }
            }

            if keep.is_empty() {
                if req.resolution() == Resolution::Mandatory {
                    let err = ResolveError::unsatisfied(reg, module, req_id);
                    self.populated
                        .insert(module, PopulateState::Failed(err.clone()));
                    return Err(err);
                }
                // Unsatisfied optional: no entry at all.
                continue;
            }
            local.push((req_id, keep));
        }

        for (req, caps) in local {
            self.map.insert(ReqRef::Declared(req), Arc::new(caps));
        }
        self.populated.insert(module, PopulateState::Done);
        Ok(())
    }

    /// Seeds a map for a dynamic import: a single entry for the matched
    /// dynamic requirement, populated through each candidate's owner.
    /// Returns `None` when no candidate owner survives population.
    pub(crate) fn seed_dynamic<E: Environment>(
        env: &E,
        module: ModuleId,
        requirement: ReqRef,
        capabilities: Vec<filament_model::CapabilityId>,
    ) -> Option<Self> {
        let mut candidates = Self::default();
        let reg = env.registry();
        let mut keep: Vec<CapRef> = Vec::new();
        for cap_id in capabilities {
            let owner = reg.capability(cap_id).owner;
            if owner == module {
                continue;
            }
            if env.wiring(owner).is_some() {
                keep.push(CapRef::Declared(cap_id));
                continue;
            }
            if candidates.populate(env, owner).is_ok() {
                keep.push(CapRef::Declared(cap_id));
            }
        }
        if keep.is_empty() {
            return None;
        }
        candidates.map.insert(requirement, Arc::new(keep));
        Some(candidates)
    }

    /// Merges fragments into hosts, expels unattachable fragments and
    /// colliding singletons, and fails if an expulsion starves a mandatory
    /// requirement (or the root itself).
    pub(crate) fn prepare<E: Environment>(&mut self, env: &E, root: ModuleId) -> Result<()> {
        let reg = env.registry();
        let done: Vec<ModuleId> = self
            .populated
            .iter()
            .filter(|(_, state)| matches!(state, PopulateState::Done))
            .map(|(&m, _)| m)
            .collect();

        let mut expelled: IndexMap<ModuleId, ResolveError> = IndexMap::new();

        // Unresolved singletons colliding with a wired singleton lose.
        for &module in &done {
            let m = reg.module(module);
            if !m.singleton {
                continue;
            }
            let collides = reg.modules().any(|other| {
                other.id != module
                    && other.singleton
                    && other.symbolic_name == m.symbolic_name
                    && env.wiring(other.id).is_some()
            });
            if collides {
                debug!(module = %m.symbolic_name, "expelling singleton colliding with a wired singleton");
                expelled.insert(module, ResolveError::singleton_collision(reg, module));
            }
        }

        // Pick a direct host for every populated fragment.
        let mut direct: IndexMap<ModuleId, ModuleId> = IndexMap::new();
        for &module in &done {
            if expelled.contains_key(&module) {
                continue;
            }
            let Some(host_req) = reg.host_requirement(module) else {
                continue;
            };
            let chosen = self
                .map
                .get(&ReqRef::Declared(host_req))
                .and_then(|caps| caps.first().copied());
            match chosen {
                Some(cap) => {
                    direct.insert(module, cap.declared_owner(reg));
                }
                None => {
                    debug!(
                        fragment = %reg.module(module).symbolic_name,
                        "expelling fragment with no host candidate"
                    );
                    expelled.insert(module, ResolveError::unsatisfied(reg, module, host_req));
                }
            }
        }

        // Follow fragment-host chains to a terminal non-fragment host;
        // cycles are fatal, dead ends expel the fragment.
        let mut attachments: IndexMap<ModuleId, ModuleId> = IndexMap::new();
        for (&fragment, &first_host) in &direct {
            let Some(host_req) = reg.host_requirement(fragment) else {
                continue;
            };
            let mut seen: IndexSet<ModuleId> = IndexSet::new();
            seen.insert(fragment);
            let mut host = first_host;
            loop {
                if !seen.insert(host) {
                    return Err(ResolveError::circular_attachment(reg, fragment));
                }
                if expelled.contains_key(&host) {
                    expelled.insert(fragment, ResolveError::unsatisfied(reg, fragment, host_req));
                    break;
                }
                if let Some(&next) = direct.get(&host) {
                    host = next;
                    continue;
                }
                if reg.is_fragment(host) {
                    // Host is itself a fragment that never attached.
                    expelled.insert(fragment, ResolveError::unsatisfied(reg, fragment, host_req));
                    break;
                }
                attachments.insert(fragment, host);
                break;
            }
        }

        if let Some(err) = expelled.get(&root) {
            return Err(err.clone());
        }
        if !expelled.is_empty() {
            self.expel(reg, &expelled)?;
            attachments.retain(|fragment, _| !expelled.contains_key(fragment));
        }

        // Build the merged host views, in attachment order, coalescing by
        // underlying declaration.
        for (&fragment, &host) in &attachments {
            let view = self.hosts.entry(host).or_insert_with(|| HostView {
                fragments: Vec::new(),
                capabilities: reg
                    .declared_capabilities(host, None)
                    .into_iter()
                    .map(CapRef::Declared)
                    .collect(),
                requirements: reg
                    .declared_requirements(host, None)
                    .into_iter()
                    .map(ReqRef::Declared)
                    .collect(),
            });
            if view.fragments.contains(&fragment) {
                continue;
            }
            view.fragments.push(fragment);
            for cap in reg.declared_capabilities(fragment, None) {
                let hosted = CapRef::Hosted {
                    declared: cap,
                    host,
                };
                if !view.capabilities.contains(&hosted) {
                    view.capabilities.push(hosted);
                }
            }
            for req in reg.declared_requirements(fragment, None) {
                if reg.requirement(req).namespace == HOST_NAMESPACE {
                    continue;
                }
                let hosted = ReqRef::Hosted {
                    declared: req,
                    host,
                };
                if !view.requirements.contains(&hosted) {
                    view.requirements.push(hosted);
                }
            }
        }

        // Pin each fragment's host choice so a permutation cannot silently
        // re-host mid-search.
        for &fragment in attachments.keys() {
            if let Some(host_req) = reg.host_requirement(fragment) {
                if let Some(caps) = self.map.get_mut(&ReqRef::Declared(host_req)) {
                    if caps.len() > 1 {
                        Arc::make_mut(caps).truncate(1);
                    }
                }
            }
        }

        // Re-key attached fragments' requirement entries to their hosted
        // form.
        let rekeys: Vec<(ReqRef, ReqRef)> = self
            .map
            .keys()
            .filter_map(|&key| match key {
                ReqRef::Declared(req) if reg.requirement(req).namespace != HOST_NAMESPACE => {
                    attachments
                        .get(&reg.requirement(req).owner)
                        .map(|&host| (key, ReqRef::Hosted { declared: req, host }))
                }
                _ => None,
            })
            .collect();
        for (old, new) in rekeys {
            if let Some(caps) = self.map.shift_remove(&old) {
                self.map.insert(new, caps);
            }
        }

        // Rewrite every candidate owned by an attached fragment to its
        // hosted form.
        for caps in self.map.values_mut() {
            let needs_rewrite = caps.iter().any(|cap| {
                matches!(*cap, CapRef::Declared(id) if attachments.contains_key(&reg.capability(id).owner))
            });
            if !needs_rewrite {
                continue;
            }
            for cap in Arc::make_mut(caps).iter_mut() {
                if let CapRef::Declared(id) = *cap {
                    if let Some(&host) = attachments.get(&reg.capability(id).owner) {
                        *cap = CapRef::Hosted { declared: id, host };
                    }
                }
            }
        }

        self.attachments = attachments;
        Ok(())
    }

    /// Removes expelled modules and every candidate they provided. A
    /// mandatory requirement starved by the removal fails its owner.
    fn expel(
        &mut self,
        reg: &Registry,
        expelled: &IndexMap<ModuleId, ResolveError>,
    ) -> Result<()> {
        self.map
            .retain(|req, _| !expelled.contains_key(&req.declared_owner(reg)));

        let mut emptied: Vec<ReqRef> = Vec::new();
        for (&req, caps) in self.map.iter_mut() {
            let has_expelled = caps
                .iter()
                .any(|cap| expelled.contains_key(&cap.declared_owner(reg)));
            if !has_expelled {
                continue;
            }
            let list = Arc::make_mut(caps);
            list.retain(|cap| !expelled.contains_key(&cap.declared_owner(reg)));
            if list.is_empty() {
                emptied.push(req);
            }
        }
        for req in emptied {
            self.map.shift_remove(&req);
            let decl = reg.requirement(req.declared_id());
            if decl.resolution() == Resolution::Mandatory {
                return Err(ResolveError::unsatisfied(reg, decl.owner, req.declared_id()));
            }
        }

        for (&module, err) in expelled {
            self.populated
                .insert(module, PopulateState::Failed(err.clone()));
        }
        Ok(())
    }

    /// Current providers for a requirement, best first.
    pub(crate) fn candidates(&self, requirement: ReqRef) -> Option<&[CapRef]> {
        self.map.get(&requirement).map(|caps| caps.as_slice())
    }

    /// The currently chosen provider for a requirement.
    pub(crate) fn chosen(&self, requirement: ReqRef) -> Option<CapRef> {
        self.map
            .get(&requirement)
            .and_then(|caps| caps.first().copied())
    }

    /// Drops the current choice, promoting the runner-up. Path-copies only
    /// the affected list; every other list stays shared with snapshots.
    pub(crate) fn remove_first(&mut self, requirement: ReqRef) {
        if let Some(caps) = self.map.get_mut(&requirement) {
            if !caps.is_empty() {
                Arc::make_mut(caps).remove(0);
            }
        }
    }

    /// The module's requirements as seen during resolution: the merged host
    /// view when fragments are attached, plain declarations otherwise.
    pub(crate) fn effective_requirements(&self, reg: &Registry, module: ModuleId) -> Vec<ReqRef> {
        match self.hosts.get(&module) {
            Some(view) => view.requirements.clone(),
            None => reg
                .declared_requirements(module, None)
                .into_iter()
                .map(ReqRef::Declared)
                .collect(),
        }
    }

    /// The module's capabilities as seen during resolution.
    pub(crate) fn effective_capabilities(&self, reg: &Registry, module: ModuleId) -> Vec<CapRef> {
        match self.hosts.get(&module) {
            Some(view) => view.capabilities.clone(),
            None => reg
                .declared_capabilities(module, None)
                .into_iter()
                .map(CapRef::Declared)
                .collect(),
        }
    }

    /// Fragments attached to a host, in attachment order.
    pub(crate) fn fragments_of(&self, module: ModuleId) -> &[ModuleId] {
        self.hosts
            .get(&module)
            .map(|view| view.fragments.as_slice())
            .unwrap_or(&[])
    }

    /// The host a fragment attached to, if any.
    pub(crate) fn host_of(&self, fragment: ModuleId) -> Option<ModuleId> {
        self.attachments.get(&fragment).copied()
    }
}
