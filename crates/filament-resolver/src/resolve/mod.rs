//! The resolve driver.
//!
//! One `resolve` call runs to completion on the calling thread: seed the
//! candidate map, attach fragments, then pop candidate maps off the
//! permutation stacks — uses-level permutations first — building package
//! spaces and checking consistency until an attempt passes or the stacks
//! drain. A surfaced failure blamed on an optional module retracts the
//! optional and restarts the whole resolve.
//!
//! Termination: every queued permutation strictly shrinks one candidate
//! list, so the number of attempts is bounded by the total candidate count.

pub(crate) mod candidates;
pub(crate) mod consistency;
pub(crate) mod dynamic;
pub(crate) mod spaces;
pub(crate) mod wires;

use indexmap::IndexSet;
use tracing::debug;

use filament_model::{Environment, ModuleId, Registry, ReqRef};

use crate::error::{ErrorKind, ResolveError, Result};
use crate::resolve::candidates::Candidates;
use crate::resolve::consistency::Checker;
use crate::resolve::dynamic::dynamic_import_probe;
use crate::resolve::spaces::{build_spaces, SourceCache, SpaceMap};
use crate::resolve::wires::{populate_dynamic_wire_map, populate_wire_map};

pub use crate::resolve::wires::WireMap;

/// The resolver. Holds the permutation stacks and the package-sources
/// cache across one call; both are cleared on entry and exit, and `&mut
/// self` keeps a single instance out of concurrent resolves.
#[derive(Debug, Default)]
pub struct Resolver {
    uses_permutations: Vec<Candidates>,
    import_permutations: Vec<Candidates>,
    sources: SourceCache,
}

impl Resolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves the root module against the environment. `optional`
    /// modules (typically fragments) are pulled into the candidate space
    /// opportunistically and retracted if they turn out to be to blame for
    /// a failure. An already-wired root resolves to an empty wire map.
    pub fn resolve<E: Environment>(
        &mut self,
        env: &E,
        root: ModuleId,
        optional: &[ModuleId],
    ) -> Result<WireMap> {
        self.clear();
        let outcome = self.run(env, root, optional);
        self.clear();
        outcome
    }

    /// Resolves a dynamic import of `package` against an already-wired
    /// root. Returns `None` when the dynamic import is inapplicable or
    /// unresolvable; the diagnostic for an unresolvable import goes to the
    /// log.
    pub fn resolve_dynamic<E: Environment>(
        &mut self,
        env: &E,
        root: ModuleId,
        package: &str,
        optional: &[ModuleId],
    ) -> Option<WireMap> {
        self.clear();
        let outcome = self.run_dynamic(env, root, package, optional);
        self.clear();
        match outcome {
            Ok(map) => map,
            Err(err) => {
                debug!(%err, "dynamic import failed to resolve");
                None
            }
        }
    }

    fn clear(&mut self) {
        self.uses_permutations.clear();
        self.import_permutations.clear();
        self.sources.clear();
    }

    fn run<E: Environment>(
        &mut self,
        env: &E,
        root: ModuleId,
        optional: &[ModuleId],
    ) -> Result<WireMap> {
        let reg = env.registry();
        if env.wiring(root).is_some() {
            return Ok(WireMap::new());
        }
        let mut optionals: IndexSet<ModuleId> = optional.iter().copied().collect();
        loop {
            self.clear();
            let mut candidates = Candidates::populate_root(env, root)?;
            for &module in &optionals {
                if let Err(err) = candidates.populate_optional(env, module) {
                    debug!(
                        module = %reg.module(module).symbolic_name,
                        %err,
                        "optional module failed to populate; dropping it"
                    );
                }
            }
            if let Err(err) = candidates.prepare(env, root) {
                match retractable(reg, &err, &optionals) {
                    Some(faulty) => {
                        debug!(
                            module = %reg.module(faulty).symbolic_name,
                            "retracting optional module and retrying"
                        );
                        optionals.shift_remove(&faulty);
                        continue;
                    }
                    None => return Err(err),
                }
            }
            match self.search(env, root, candidates, false) {
                Ok((winning, _spaces, target)) => {
                    let mut wire_map = WireMap::new();
                    populate_wire_map(env, &winning, target, &mut wire_map);
                    return Ok(wire_map);
                }
                Err(err) => match retractable(reg, &err, &optionals) {
                    Some(faulty) => {
                        debug!(
                            module = %reg.module(faulty).symbolic_name,
                            "retracting optional module and retrying"
                        );
                        optionals.shift_remove(&faulty);
                        continue;
                    }
                    None => return Err(err),
                },
            }
        }
    }

    fn run_dynamic<E: Environment>(
        &mut self,
        env: &E,
        root: ModuleId,
        package: &str,
        optional: &[ModuleId],
    ) -> Result<Option<WireMap>> {
        let reg = env.registry();
        let mut optionals: IndexSet<ModuleId> = optional.iter().copied().collect();
        loop {
            self.clear();
            let Some((dynamic_req, mut candidates)) = dynamic_import_probe(env, root, package)
            else {
                return Ok(None);
            };
            for &module in &optionals {
                if let Err(err) = candidates.populate_optional(env, module) {
                    debug!(
                        module = %reg.module(module).symbolic_name,
                        %err,
                        "optional module failed to populate; dropping it"
                    );
                }
            }
            if let Err(err) = candidates.prepare(env, root) {
                match retractable(reg, &err, &optionals) {
                    Some(faulty) => {
                        optionals.shift_remove(&faulty);
                        continue;
                    }
                    None => return Err(err),
                }
            }
            match self.search(env, root, candidates, true) {
                Ok((winning, spaces, target)) => {
                    return Ok(Some(populate_dynamic_wire_map(
                        env,
                        &winning,
                        &spaces,
                        target,
                        package,
                        dynamic_req,
                    )));
                }
                Err(err) => match retractable(reg, &err, &optionals) {
                    Some(faulty) => {
                        optionals.shift_remove(&faulty);
                        continue;
                    }
                    None => return Err(err),
                },
            }
        }
    }

    /// The permutation loop: pop a candidate map (uses stack first), build
    /// spaces, check consistency; the checker queues further permutations
    /// as it finds conflicts.
    fn search<E: Environment>(
        &mut self,
        env: &E,
        root: ModuleId,
        initial: Candidates,
        dynamic: bool,
    ) -> Result<(Candidates, SpaceMap, ModuleId)> {
        let reg = env.registry();
        let root_host_req = if dynamic {
            None
        } else {
            reg.host_requirement(root)
        };
        self.uses_permutations.push(initial);

        let mut attempt = 0u32;
        let mut failure: Option<ResolveError> = None;
        while let Some(candidates) = self.next_attempt() {
            attempt += 1;
            // The chosen candidate map changed; cached sources are stale.
            self.sources.clear();

            // A fragment root is verified through its attached host.
            let target = match root_host_req {
                Some(host_req) => {
                    match candidates.chosen(ReqRef::Declared(host_req)) {
                        Some(cap) => cap.effective_owner(reg),
                        None => {
                            failure =
                                Some(ResolveError::unsatisfied(reg, root, host_req));
                            continue;
                        }
                    }
                }
                None => root,
            };

            let spaces = build_spaces(env, &candidates, &mut self.sources, target);
            let mut checker = Checker {
                env,
                candidates: &candidates,
                spaces: &spaces,
                sources: &mut self.sources,
                uses_permutations: &mut self.uses_permutations,
                import_permutations: &mut self.import_permutations,
                checked: IndexSet::new(),
            };
            match checker.check(target, dynamic) {
                Ok(()) => {
                    debug!(attempt, "candidate map is consistent");
                    return Ok((candidates, spaces, target));
                }
                Err(err) => {
                    failure = Some(err);
                }
            }
        }

        Err(failure.unwrap_or_else(|| {
            ResolveError::new(
                ErrorKind::UnsatisfiedRequirement,
                root,
                None,
                format!(
                    "Unable to resolve module {}: no candidate maps left to try.",
                    reg.module(root).symbolic_name
                ),
            )
        }))
    }

    fn next_attempt(&mut self) -> Option<Candidates> {
        self.uses_permutations
            .pop()
            .or_else(|| self.import_permutations.pop())
    }
}

/// The module a surfaced failure blames: the declarer of a hosted
/// requirement (the fragment), else the failure's module — if that module
/// was pulled in optionally, it can be retracted.
fn retractable(
    reg: &Registry,
    err: &ResolveError,
    optionals: &IndexSet<ModuleId>,
) -> Option<ModuleId> {
    let blamed = match err.requirement {
        Some(ReqRef::Hosted { declared, .. }) => reg.requirement(declared).owner,
        _ => err.module,
    };
    optionals.contains(&blamed).then_some(blamed)
}
