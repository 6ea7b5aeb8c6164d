//! Consistency checking and the permutation policy.
//!
//! After spaces are built, the checker walks every resolving module
//! reachable from the target and looks for three shapes of conflict:
//!
//! - **A** — the same package imported from two providers (only possible
//!   through fragment contributions);
//! - **B** — a module exports a package it is also exposed to through a
//!   `uses` chain, from an incompatible provider;
//! - **C** — a module imports a package and is exposed to it through a
//!   `uses` chain, from incompatible providers.
//!
//! A conflict does not end the search: the checker queues *permutations*,
//! alternative candidate maps that differ in at least one choice, and
//! raises a failure for the driver to catch. Uses-level mutations go on the
//! high-priority stack (drained first); backtracking an original import
//! decision goes on the low-priority import stack.
//!
//! Two capabilities are compatible when their package source sets are
//! subset-related — the same package name sourced from two disjoint
//! provider sets is exactly the class-space split this check exists to
//! prevent.

use indexmap::IndexSet;
use tracing::debug;

use filament_model::model::directives::{PACKAGE_ATTR, PACKAGE_NAMESPACE};
use filament_model::{CapRef, Environment, ModuleId, ReqRef};

use crate::error::{ErrorKind, ResolveError, Result};
use crate::resolve::candidates::Candidates;
use crate::resolve::spaces::{package_sources, Blame, SourceCache, SpaceMap};

/// Queues a permutation that drops the current choice for `req`, if there
/// is a runner-up to promote.
pub(crate) fn permute(candidates: &Candidates, req: ReqRef, stack: &mut Vec<Candidates>) {
    if candidates.candidates(req).map_or(0, |caps| caps.len()) > 1 {
        let mut permutation = candidates.clone();
        permutation.remove_first(req);
        stack.push(permutation);
    }
}

/// Like [`permute`], but skipped when some queued permutation already leads
/// with a different candidate for `req`. Uses conflicts with existing
/// import decisions tend to blame the same import over and over; one
/// backtrack per decision is enough.
pub(crate) fn permute_if_needed(
    candidates: &Candidates,
    req: ReqRef,
    stack: &mut Vec<Candidates>,
) {
    let Some(caps) = candidates.candidates(req) else {
        return;
    };
    if caps.len() <= 1 {
        return;
    }
    let current = caps[0];
    let already_permuted = stack
        .iter()
        .any(|perm| perm.chosen(req).map_or(false, |cap| cap != current));
    if !already_permuted {
        permute(candidates, req, stack);
    }
}

pub(crate) struct Checker<'a, E: Environment> {
    pub env: &'a E,
    pub candidates: &'a Candidates,
    pub spaces: &'a SpaceMap,
    pub sources: &'a mut SourceCache,
    pub uses_permutations: &'a mut Vec<Candidates>,
    pub import_permutations: &'a mut Vec<Candidates>,
    pub checked: IndexSet<ModuleId>,
}

impl<'a, E: Environment> Checker<'a, E> {
    /// Checks one module and, recursively, everything it imports from.
    /// `dynamic` marks the root of a dynamic import, which is wired but
    /// must still be checked.
    pub(crate) fn check(&mut self, module: ModuleId, dynamic: bool) -> Result<()> {
        if self.env.wiring(module).is_some() && !dynamic {
            return Ok(());
        }
        if self.checked.contains(&module) {
            return Ok(());
        }
        let env = self.env;
        let reg = env.registry();
        let candidates = self.candidates;
        let spaces = self.spaces;
        let Some(pkgs) = spaces.get(&module) else {
            return Ok(());
        };

        // Check A: the same package from two providers, via fragments.
        for (pkg, blames) in &pkgs.imported {
            if blames.len() < 2 {
                continue;
            }
            let first = &blames[0];
            for other in &blames[1..] {
                if other.cap.effective_owner(reg) == first.cap.effective_owner(reg) {
                    continue;
                }
                if let Some(&req) = other.path.first() {
                    permute(candidates, req, self.import_permutations);
                }
                if let Some(&req) = first.path.first() {
                    permute(candidates, req, self.import_permutations);
                }
                debug!(
                    module = %reg.module(module).symbolic_name,
                    package = %pkg,
                    "candidate permutation failed due to a conflict with a fragment import; will try another if possible"
                );
                return Err(exposed_twice_conflict(
                    env,
                    candidates,
                    ErrorKind::FragmentConflict,
                    module,
                    pkg,
                    first,
                    other,
                ));
            }
        }

        // Check B: a module's own export vs what uses chains expose it to.
        for (pkg, export_blame) in &pkgs.exported {
            let Some(used) = pkgs.used.get(pkg) else {
                continue;
            };
            let mut permutation: Option<Candidates> = None;
            let mut mutated: IndexSet<ReqRef> = IndexSet::new();
            let mut failure: Option<ResolveError> = None;
            for used_blame in used {
                if self.compatible(export_blame.cap, used_blame.cap) {
                    continue;
                }
                if failure.is_none() {
                    failure = Some(export_used_conflict(env, candidates, module, pkg, used_blame));
                }
                let perm = permutation.get_or_insert_with(|| candidates.clone());
                mutate_used_chain(perm, used_blame, &mut mutated);
            }
            if let Some(err) = failure {
                if let Some(perm) = permutation {
                    if !mutated.is_empty() {
                        self.uses_permutations.push(perm);
                    }
                }
                debug!(
                    module = %reg.module(module).symbolic_name,
                    package = %pkg,
                    "candidate permutation failed due to a conflict between an export and a uses constraint; will try another if possible"
                );
                return Err(err);
            }
        }

        // Check C: an import vs what uses chains expose the module to.
        for (pkg, import_blames) in &pkgs.imported {
            let Some(used) = pkgs.used.get(pkg) else {
                continue;
            };
            for import_blame in import_blames {
                let mut permutation: Option<Candidates> = None;
                let mut mutated: IndexSet<ReqRef> = IndexSet::new();
                let mut failure: Option<ResolveError> = None;
                for used_blame in used {
                    if self.compatible(import_blame.cap, used_blame.cap) {
                        continue;
                    }
                    if failure.is_none() {
                        failure = Some(import_used_conflict(
                            env,
                            candidates,
                            module,
                            pkg,
                            import_blame,
                            used_blame,
                        ));
                    }
                    let perm = permutation.get_or_insert_with(|| candidates.clone());
                    mutate_used_chain(perm, used_blame, &mut mutated);
                }
                if let Some(err) = failure {
                    if let Some(perm) = permutation {
                        if !mutated.is_empty() {
                            self.uses_permutations.push(perm);
                        }
                    }
                    // Also backtrack the original import decision, once,
                    // for when the uses-level mutations run dry.
                    if let Some(&first) = import_blame.path.first() {
                        if !mutated.contains(&first) {
                            permute_if_needed(candidates, first, self.import_permutations);
                        }
                    }
                    debug!(
                        module = %reg.module(module).symbolic_name,
                        package = %pkg,
                        "candidate permutation failed due to a conflict between imports; will try another if possible"
                    );
                    return Err(err);
                }
            }
        }

        self.checked.insert(module);

        // Check D: recurse into every import's provider. If a deeper
        // failure queued nothing, backtrack this level's import so the
        // search always makes progress.
        let queued = self.uses_permutations.len() + self.import_permutations.len();
        for blames in pkgs.imported.values() {
            for blame in blames {
                let provider = blame.cap.effective_owner(reg);
                if provider == module {
                    continue;
                }
                if let Err(err) = self.check(provider, false) {
                    if queued == self.uses_permutations.len() + self.import_permutations.len() {
                        if let Some(&first) = blame.path.first() {
                            permute(candidates, first, self.import_permutations);
                        }
                    }
                    return Err(err);
                }
            }
        }
        Ok(())
    }

    /// Equal capabilities are compatible; otherwise the package source sets
    /// must be subset-related in one direction or the other.
    fn compatible(&mut self, current: CapRef, candidate: CapRef) -> bool {
        if current == candidate {
            return true;
        }
        let current_sources = package_sources(
            self.env,
            self.candidates,
            self.spaces,
            self.sources,
            current,
        );
        let candidate_sources = package_sources(
            self.env,
            self.candidates,
            self.spaces,
            self.sources,
            candidate,
        );
        is_subset(&current_sources, &candidate_sources)
            || is_subset(&candidate_sources, &current_sources)
    }
}

fn is_subset(inner: &[CapRef], outer: &[CapRef]) -> bool {
    inner.iter().all(|cap| outer.contains(cap))
}

/// Walks the used-blame chain from the deepest requirement back towards
/// the subject and drops the top candidate from the first requirement that
/// still has a choice and has not been mutated in this failure.
fn mutate_used_chain(
    permutation: &mut Candidates,
    used_blame: &Blame,
    mutated: &mut IndexSet<ReqRef>,
) {
    for &req in used_blame.path.iter().rev() {
        if mutated.contains(&req) {
            break;
        }
        if permutation.candidates(req).map_or(0, |caps| caps.len()) > 1 {
            mutated.insert(req);
            permutation.remove_first(req);
            break;
        }
    }
}

/// The capability currently satisfying a requirement: the candidate map's
/// choice, or the installed wire for a wired owner.
fn satisfying_cap<E: Environment>(
    env: &E,
    candidates: &Candidates,
    req: ReqRef,
) -> Option<CapRef> {
    if let Some(cap) = candidates.chosen(req) {
        return Some(cap);
    }
    let reg = env.registry();
    let owner = req.effective_owner(reg);
    let wiring = env.wiring(owner)?;
    wiring
        .required_wires
        .iter()
        .find(|wire| wire.requirement == req.declared_id())
        .map(|wire| {
            if reg.capability(wire.capability).owner == wire.provider {
                CapRef::Declared(wire.capability)
            } else {
                CapRef::Hosted {
                    declared: wire.capability,
                    host: wire.provider,
                }
            }
        })
}

/// Renders a blame as an indented requirement/capability ladder.
pub(crate) fn format_blame<E: Environment>(
    env: &E,
    candidates: &Candidates,
    blame: &Blame,
) -> String {
    let reg = env.registry();
    if blame.path.is_empty() {
        let owner = reg.module(blame.cap.effective_owner(reg));
        return format!("  {} [{}]", owner.symbolic_name, owner.version);
    }

    let mut out = String::new();
    for (i, &req) in blame.path.iter().enumerate() {
        let owner = reg.module(req.effective_owner(reg));
        let decl = reg.requirement(req.declared_id());
        let verb = if decl.namespace == PACKAGE_NAMESPACE {
            "import"
        } else {
            "require"
        };
        out.push_str(&format!("  {} [{}]\n", owner.symbolic_name, owner.version));
        out.push_str(&format!("    {}: {}\n     |\n", verb, decl.filter));

        let last = i + 1 == blame.path.len();
        let satisfied = satisfying_cap(env, candidates, req).unwrap_or(blame.cap);
        let sat_decl = reg.capability(satisfied.declared_id());
        let blamed_pkg = reg.capability(blame.cap.declared_id()).package_name();
        match sat_decl.package_name() {
            Some(pkg) if last && blamed_pkg.is_some() && blamed_pkg != Some(pkg) => {
                // The conflict arrived through a uses directive rather
                // than the direct export.
                out.push_str(&format!(
                    "    export: {}={}; uses:={}\n",
                    PACKAGE_ATTR,
                    pkg,
                    blamed_pkg.unwrap_or_default()
                ));
                out.push_str(&format!(
                    "    export: {}={}\n",
                    PACKAGE_ATTR,
                    blamed_pkg.unwrap_or_default()
                ));
            }
            Some(pkg) => {
                out.push_str(&format!("    export: {}={}\n", PACKAGE_ATTR, pkg));
            }
            None => {
                out.push_str(&format!("    provide: {}\n", sat_decl.namespace));
            }
        }
    }
    let provider = reg.module(blame.cap.effective_owner(reg));
    out.push_str(&format!("  {} [{}]", provider.symbolic_name, provider.version));
    out
}

fn export_used_conflict<E: Environment>(
    env: &E,
    candidates: &Candidates,
    module: ModuleId,
    pkg: &str,
    used_blame: &Blame,
) -> ResolveError {
    let reg = env.registry();
    let m = reg.module(module);
    let provider = reg.module(used_blame.cap.effective_owner(reg));
    ResolveError::new(
        ErrorKind::UsesViolation,
        module,
        None,
        format!(
            "Uses constraint violation. Unable to resolve module {} [{}] because it \
             exports package '{}' and is also exposed to it from module {} [{}] via \
             the following dependency chain:\n\n{}",
            m.symbolic_name,
            m.version,
            pkg,
            provider.symbolic_name,
            provider.version,
            format_blame(env, candidates, used_blame)
        ),
    )
}

fn import_used_conflict<E: Environment>(
    env: &E,
    candidates: &Candidates,
    module: ModuleId,
    pkg: &str,
    import_blame: &Blame,
    used_blame: &Blame,
) -> ResolveError {
    let mut err = exposed_twice_conflict(
        env,
        candidates,
        ErrorKind::UsesViolation,
        module,
        pkg,
        import_blame,
        used_blame,
    );
    err.requirement = import_blame.path.first().copied();
    err
}

fn exposed_twice_conflict<E: Environment>(
    env: &E,
    candidates: &Candidates,
    kind: ErrorKind,
    module: ModuleId,
    pkg: &str,
    first: &Blame,
    second: &Blame,
) -> ResolveError {
    let reg = env.registry();
    let m = reg.module(module);
    let provider_a = reg.module(first.cap.effective_owner(reg));
    let provider_b = reg.module(second.cap.effective_owner(reg));
    ResolveError::new(
        kind,
        module,
        second.path.first().copied(),
        format!(
            "Uses constraint violation. Unable to resolve module {} [{}] because it \
             is exposed to package '{}' from modules {} [{}] and {} [{}] via two \
             dependency chains.\n\nChain 1:\n{}\n\nChain 2:\n{}",
            m.symbolic_name,
            m.version,
            pkg,
            provider_a.symbolic_name,
            provider_a.version,
            provider_b.symbolic_name,
            provider_b.version,
            format_blame(env, candidates, first),
            format_blame(env, candidates, second)
        ),
    )
}
