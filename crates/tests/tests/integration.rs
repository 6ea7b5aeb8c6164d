//! End-to-end resolution scenarios.
//!
//! These tests drive the full pipeline through the harness: declare
//! modules → resolve → inspect the emitted wires.

use filament_model::model::directives::{BUNDLE_NAMESPACE, HOST_NAMESPACE};
use filament_model::Environment;
use filament_resolver::ErrorKind;
use filament_tests::TestHarness;

/// The trivial case: one exporter, one importer.
#[test]
fn test_trivial_import_wire() {
    let mut h = TestHarness::new();
    h.module("demo.a").export("p").build();
    h.module("demo.b").import("p").build();

    let wires = h.resolve("demo.b").expect("resolve");
    assert_eq!(h.wire_count(&wires, "demo.b"), 1);
    assert_eq!(h.provider_of(&wires, "demo.b", "p").as_deref(), Some("demo.a"));
    // The unresolved provider is co-resolved, with no wires of its own.
    assert!(h.emitted(&wires, "demo.a"));
    assert_eq!(h.wire_count(&wires, "demo.a"), 0);
}

/// An already-wired provider stays out of the output.
#[test]
fn test_wired_provider_not_emitted() {
    let mut h = TestHarness::new();
    h.module("demo.a").export("p").build();
    h.module("demo.b").import("p").build();
    h.mark_resolved("demo.a");

    let wires = h.resolve("demo.b").expect("resolve");
    assert_eq!(h.provider_of(&wires, "demo.b", "p").as_deref(), Some("demo.a"));
    assert!(!h.emitted(&wires, "demo.a"));
}

/// A module that both exports and imports a package silently substitutes
/// the import: only one provider of `p` is observable end-to-end.
#[test]
fn test_substitutable_export_chain() {
    let mut h = TestHarness::new();
    // Declared first, so the consumer prefers it; its own import only
    // accepts the 2.0.0 export.
    h.module("demo.b")
        .export_at("p", "1.0.0")
        .import_min("p", "2.0.0")
        .build();
    h.module_at("demo.a", "2.0.0").export_at("p", "2.0.0").build();
    h.module("demo.c").import("p").build();

    let wires = h.resolve("demo.c").expect("resolve");
    assert_eq!(h.provider_of(&wires, "demo.c", "p").as_deref(), Some("demo.b"));
    assert_eq!(h.provider_of(&wires, "demo.b", "p").as_deref(), Some("demo.a"));
}

/// A uses violation forces the checker to backtrack the consumer's import
/// onto the provider the uses chain pinned.
#[test]
fn test_uses_violation_forces_permutation() {
    let mut h = TestHarness::new();
    // a2 declared first: the consumer's plain import of p prefers it.
    h.module_at("demo.a2", "2.0.0").export_at("p", "2.0.0").build();
    h.module_at("demo.a1", "1.0.0").export_at("p", "1.0.0").build();
    // The utility pins p to a1 and advertises that through uses.
    h.module("demo.util")
        .export_uses("q", &["p"])
        .import_max("p", "1.0.0")
        .build();
    h.module("demo.consumer").import("q").import("p").build();

    let wires = h.resolve("demo.consumer").expect("resolve");
    assert_eq!(
        h.provider_of(&wires, "demo.consumer", "q").as_deref(),
        Some("demo.util")
    );
    // Not a2, even though the environment preferred it.
    assert_eq!(
        h.provider_of(&wires, "demo.consumer", "p").as_deref(),
        Some("demo.a1")
    );
    assert_eq!(
        h.provider_of(&wires, "demo.util", "p").as_deref(),
        Some("demo.a1")
    );
}

/// With no slack anywhere, the uses violation surfaces with both blame
/// chains in the message.
#[test]
fn test_uses_violation_unresolvable() {
    let mut h = TestHarness::new();
    h.module_at("demo.a1", "1.0.0").export_at("p", "1.0.0").build();
    h.module_at("demo.a2", "2.0.0").export_at("p", "2.0.0").build();
    h.module("demo.util")
        .export_uses("q", &["p"])
        .import_max("p", "1.0.0")
        .build();
    // The consumer insists on the 2.0.0 provider; nothing can move.
    h.module("demo.consumer")
        .import("q")
        .import_min("p", "2.0.0")
        .build();

    let err = h.resolve("demo.consumer").unwrap_err();
    assert_eq!(err.kind, ErrorKind::UsesViolation);
    assert!(err.message.contains("demo.consumer"));
    assert!(err.message.contains("demo.a1"));
    assert!(err.message.contains("demo.a2"));
    assert!(err.message.contains("Chain 1"));
    assert!(err.message.contains("Chain 2"));
}

/// Mutually-recursive unresolved modules cannot satisfy each other.
#[test]
fn test_unresolved_cycle_fails() {
    let mut h = TestHarness::new();
    h.module("demo.x").export("x").import("y").build();
    h.module("demo.y").export("y").import("x").build();

    let err = h.resolve("demo.x").unwrap_err();
    assert_eq!(err.kind, ErrorKind::UnsatisfiedRequirement);
}

/// The same shape resolves once one side is already wired.
#[test]
fn test_cycle_through_wired_module_resolves() {
    let mut h = TestHarness::new();
    h.module("demo.x").export("x").import("y").build();
    h.module("demo.y").export("y").import("x").build();
    h.mark_resolved("demo.y");

    let wires = h.resolve("demo.x").expect("resolve");
    assert_eq!(h.provider_of(&wires, "demo.x", "y").as_deref(), Some("demo.y"));
}

/// An optional fragment whose import cannot be satisfied is dropped and
/// the host resolves alone.
#[test]
fn test_optional_fragment_dropped() {
    let mut h = TestHarness::new();
    h.module("demo.host").host().build();
    h.module("demo.fragment")
        .fragment_of("demo.host")
        .import("no.such.pkg")
        .build();

    let wires = h
        .resolve_with_optionals("demo.host", &["demo.fragment"])
        .expect("resolve");
    assert!(h.emitted(&wires, "demo.host"));
    assert_eq!(h.wire_count(&wires, "demo.host"), 0);
    assert!(!h.emitted(&wires, "demo.fragment"));
}

/// An attachable fragment contributes its imports and exports to the
/// host, and gets a host wire of its own.
#[test]
fn test_fragment_attaches_and_contributes() {
    let mut h = TestHarness::new();
    h.module("demo.provider").export("p").build();
    h.module("demo.host").host().build();
    h.module("demo.overlay")
        .fragment_of("demo.host")
        .import("p")
        .export("overlay.extra")
        .build();

    let wires = h
        .resolve_with_optionals("demo.host", &["demo.overlay"])
        .expect("resolve");
    // The host carries the fragment's import.
    assert_eq!(
        h.provider_of(&wires, "demo.host", "p").as_deref(),
        Some("demo.provider")
    );
    // The fragment's only wire is its attachment to the host.
    assert_eq!(h.wire_count(&wires, "demo.overlay"), 1);
    let overlay_wires = &wires[&h.id("demo.overlay")];
    let reg = h.env().registry();
    assert_eq!(
        reg.requirement(overlay_wires[0].requirement).namespace,
        HOST_NAMESPACE
    );
    assert_eq!(overlay_wires[0].provider, h.id("demo.host"));
}

/// Resolving the fragment itself verifies and emits through its host.
#[test]
fn test_fragment_root_resolves_through_host() {
    let mut h = TestHarness::new();
    h.module("demo.provider").export("p").build();
    h.module("demo.host").host().build();
    h.module("demo.overlay")
        .fragment_of("demo.host")
        .import("p")
        .build();

    let wires = h.resolve("demo.overlay").expect("resolve");
    assert_eq!(
        h.provider_of(&wires, "demo.host", "p").as_deref(),
        Some("demo.provider")
    );
    assert_eq!(h.wire_count(&wires, "demo.overlay"), 1);
}

/// Two fragments importing the same package from different providers
/// conflict; the permutation forces both onto one provider.
#[test]
fn test_fragment_import_conflict_permutes() {
    let mut h = TestHarness::new();
    h.module_at("demo.a1", "1.0.0").export_at("p", "1.0.0").build();
    h.module_at("demo.a2", "2.0.0").export_at("p", "2.0.0").build();
    h.module("demo.host").host().build();
    h.module("demo.f1").fragment_of("demo.host").import("p").build();
    h.module("demo.f2")
        .fragment_of("demo.host")
        .import_min("p", "2.0.0")
        .build();

    let wires = h
        .resolve_with_optionals("demo.host", &["demo.f1", "demo.f2"])
        .expect("resolve");
    // f1 preferred a1, but f2 only accepts a2; the conflict permutes f1
    // onto a2.
    assert_eq!(h.provider_of(&wires, "demo.host", "p").as_deref(), Some("demo.a2"));
    assert_eq!(h.wire_count(&wires, "demo.f1"), 1);
    assert_eq!(h.wire_count(&wires, "demo.f2"), 1);
}

/// Require-bundle pulls in the provider's exports; reexport visibility
/// extends them transitively without extra wires.
#[test]
fn test_require_bundle_chain() {
    let mut h = TestHarness::new();
    h.module("demo.base").export("base.pkg").build();
    h.module("demo.middle")
        .export("middle.pkg")
        .require_reexport("demo.base")
        .build();
    h.module("demo.top").require("demo.middle").build();

    let wires = h.resolve("demo.top").expect("resolve");
    assert_eq!(h.wire_count(&wires, "demo.top"), 1);
    let reg = h.env().registry();
    let top_wires = &wires[&h.id("demo.top")];
    assert_eq!(top_wires[0].provider, h.id("demo.middle"));
    assert_eq!(
        reg.requirement(top_wires[0].requirement).namespace,
        BUNDLE_NAMESPACE
    );
}

/// Dynamic import against an already-wired module.
#[test]
fn test_dynamic_import() {
    let mut h = TestHarness::new();
    h.module("demo.dynhost").dynamic_import_any().build();
    h.module("demo.provider").export("p").build();
    h.mark_resolved("demo.dynhost");

    // The empty package name is never dynamically importable.
    assert!(h.resolve_dynamic("demo.dynhost", "").is_none());

    let wires = h.resolve_dynamic("demo.dynhost", "p").expect("dynamic resolve");
    assert_eq!(h.wire_count(&wires, "demo.dynhost"), 1);
    assert_eq!(
        h.provider_of(&wires, "demo.dynhost", "p").as_deref(),
        Some("demo.provider")
    );
    assert!(h.emitted(&wires, "demo.provider"));

    // Once installed, the package is sourced and a second dynamic import
    // is inapplicable.
    h.install(&wires);
    assert!(h.resolve_dynamic("demo.dynhost", "p").is_none());
}

/// A dynamic import of a package nobody exports is unresolvable.
#[test]
fn test_dynamic_import_no_provider() {
    let mut h = TestHarness::new();
    h.module("demo.dynhost").dynamic_import_any().build();
    h.mark_resolved("demo.dynhost");
    assert!(h.resolve_dynamic("demo.dynhost", "ghost.pkg").is_none());
}

/// An unresolved singleton colliding with a wired one is expelled from
/// the candidate space.
#[test]
fn test_singleton_collision() {
    let mut h = TestHarness::new();
    h.module_at("demo.single", "1.0.0")
        .singleton()
        .export_at("p", "1.0.0")
        .build();
    h.module_at("demo.single", "2.0.0")
        .singleton()
        .export_at("p", "2.0.0")
        .build();
    h.module("demo.wants.new").import_min("p", "2.0.0").build();
    h.module("demo.wants.any").import("p").build();
    // `mark_resolved` finds the 1.0.0 declaration first.
    h.mark_resolved("demo.single");

    // Only the expelled 2.0.0 singleton could have satisfied this.
    let err = h.resolve("demo.wants.new").unwrap_err();
    assert_eq!(err.kind, ErrorKind::UnsatisfiedRequirement);

    // The plain import falls back to the wired singleton.
    let wires = h.resolve("demo.wants.any").expect("resolve");
    assert_eq!(
        h.provider_of(&wires, "demo.wants.any", "p").as_deref(),
        Some("demo.single")
    );
}

/// Capabilities with a foreign `effective` directive are invisible.
#[test]
fn test_effective_directive_hides_capability() {
    let mut h = TestHarness::new();
    h.module("demo.hidden").export_effective("p", "active").build();
    h.module("demo.importer").import("p").build();

    let err = h.resolve("demo.importer").unwrap_err();
    assert_eq!(err.kind, ErrorKind::UnsatisfiedRequirement);
}

/// Unsatisfied optional imports leave no wire and no failure.
#[test]
fn test_optional_import_left_open() {
    let mut h = TestHarness::new();
    h.module("demo.relaxed")
        .export("r")
        .import_optional("no.such.pkg")
        .build();

    let wires = h.resolve("demo.relaxed").expect("resolve");
    assert_eq!(h.wire_count(&wires, "demo.relaxed"), 0);
}

/// Resolving twice against an unchanged environment yields identical
/// wire maps, and the environment's candidate order is respected.
#[test]
fn test_resolve_is_idempotent_and_deterministic() {
    let mut h = TestHarness::new();
    h.module("demo.first").export("p").build();
    h.module("demo.second").export("p").build();
    h.module("demo.util")
        .export_uses("q", &["p"])
        .import("p")
        .build();
    h.module("demo.consumer").import("q").import("p").build();

    let first = h.resolve("demo.consumer").expect("first resolve");
    let second = h.resolve("demo.consumer").expect("second resolve");

    let flatten = |map: &filament_resolver::WireMap| {
        map.iter()
            .map(|(module, wires)| (*module, wires.clone()))
            .collect::<Vec<_>>()
    };
    assert_eq!(flatten(&first), flatten(&second));

    // Both imports of p agree on the environment's first choice.
    assert_eq!(
        h.provider_of(&first, "demo.consumer", "p").as_deref(),
        Some("demo.first")
    );
    assert_eq!(
        h.provider_of(&first, "demo.util", "p").as_deref(),
        Some("demo.first")
    );
}
