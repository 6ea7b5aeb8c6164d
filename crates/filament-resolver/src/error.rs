//! Resolution failures.

use thiserror::Error;

use filament_model::{ModuleId, Registry, ReqRef, RequirementId};

/// Resolver result type.
pub type Result<T> = std::result::Result<T, ResolveError>;

/// What went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A mandatory requirement ran out of candidates with no permutations
    /// left to try.
    UnsatisfiedRequirement,
    /// An export/used or import/used incompatibility survived every
    /// permutation.
    UsesViolation,
    /// The same package reached a module from two providers through
    /// fragment contributions.
    FragmentConflict,
    /// A fragment's host chain leads back to itself.
    CircularAttachment,
}

/// A resolution failure with its blame.
///
/// `message` is the full human-readable diagnostic, dependency chains
/// included, so `Display` is just the message.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ResolveError {
    pub kind: ErrorKind,
    pub module: ModuleId,
    pub requirement: Option<ReqRef>,
    pub message: String,
}

impl ResolveError {
    pub(crate) fn new(
        kind: ErrorKind,
        module: ModuleId,
        requirement: Option<ReqRef>,
        message: String,
    ) -> Self {
        Self {
            kind,
            module,
            requirement,
            message,
        }
    }

    pub(crate) fn unsatisfied(
        registry: &Registry,
        module: ModuleId,
        requirement: RequirementId,
    ) -> Self {
        let m = registry.module(module);
        let req = registry.requirement(requirement);
        Self::new(
            ErrorKind::UnsatisfiedRequirement,
            module,
            Some(ReqRef::Declared(requirement)),
            format!(
                "Unable to resolve module {} [{}]: missing requirement {} in namespace {}.",
                m.symbolic_name, m.version, req.filter, req.namespace
            ),
        )
    }

    pub(crate) fn circular_attachment(registry: &Registry, fragment: ModuleId) -> Self {
        let m = registry.module(fragment);
        Self::new(
            ErrorKind::CircularAttachment,
            fragment,
            registry.host_requirement(fragment).map(ReqRef::Declared),
            format!(
                "Unable to attach fragment {} [{}]: its host chain leads back to itself.",
                m.symbolic_name, m.version
            ),
        )
    }

    pub(crate) fn singleton_collision(registry: &Registry, module: ModuleId) -> Self {
        let m = registry.module(module);
        Self::new(
            ErrorKind::UnsatisfiedRequirement,
            module,
            None,
            format!(
                "Unable to resolve module {} [{}]: another singleton with the same symbolic name is already resolved.",
                m.symbolic_name, m.version
            ),
        )
    }
}
