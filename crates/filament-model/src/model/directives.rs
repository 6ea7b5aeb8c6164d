//! Reserved namespace, attribute, and directive names.
//!
//! Namespaces are opaque strings; these three get special treatment in the
//! resolver. Package capabilities are subject to uses-constraint
//! propagation, bundle requirements pull in a provider's whole export set,
//! and host requirements attach fragments to hosts. Everything else is
//! wired generically.

use crate::foundation::{Filter, Value};

/// Namespace of exported/imported packages.
pub const PACKAGE_NAMESPACE: &str = "osgi.wiring.package";
/// Namespace of require-bundle edges.
pub const BUNDLE_NAMESPACE: &str = "osgi.wiring.bundle";
/// Namespace of fragment → host attachment.
pub const HOST_NAMESPACE: &str = "osgi.wiring.host";

/// Attribute naming the package on a package capability.
pub const PACKAGE_ATTR: &str = "osgi.wiring.package";
/// Attribute naming the symbolic name on bundle and host capabilities.
pub const BUNDLE_ATTR: &str = "osgi.wiring.bundle";
/// Attribute carrying a version on any capability.
pub const VERSION_ATTR: &str = "version";

pub const RESOLUTION_DIRECTIVE: &str = "resolution";
pub const RESOLUTION_MANDATORY: &str = "mandatory";
pub const RESOLUTION_OPTIONAL: &str = "optional";
pub const RESOLUTION_DYNAMIC: &str = "dynamic";

pub const VISIBILITY_DIRECTIVE: &str = "visibility";
pub const VISIBILITY_PRIVATE: &str = "private";
pub const VISIBILITY_REEXPORT: &str = "reexport";

/// Capabilities and requirements whose `effective` directive is set to
/// anything other than `resolve` are invisible to the resolver.
pub const EFFECTIVE_DIRECTIVE: &str = "effective";
pub const EFFECTIVE_RESOLVE: &str = "resolve";

/// Comma-separated attribute names a matching filter must constrain.
pub const MANDATORY_DIRECTIVE: &str = "mandatory";

/// Filter matching a package capability by package name.
pub fn package_filter(package: &str) -> Filter {
    Filter::Eq(PACKAGE_ATTR.to_string(), Value::from(package))
}

/// Filter matching a bundle capability by symbolic name.
pub fn bundle_filter(symbolic_name: &str) -> Filter {
    Filter::Eq(BUNDLE_ATTR.to_string(), Value::from(symbolic_name))
}

/// Filter matching a host capability by the host's symbolic name.
pub fn host_filter(symbolic_name: &str) -> Filter {
    Filter::Eq(BUNDLE_ATTR.to_string(), Value::from(symbolic_name))
}
