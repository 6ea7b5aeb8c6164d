//! # Filament resolver
//!
//! Given an [`Environment`](filament_model::Environment) and a root module,
//! decide whether a consistent assignment of one provider per requirement
//! exists such that every transitively reachable module sees a single,
//! coherent view of every exported package — and if so, emit the wires that
//! realize it.
//!
//! The search backtracks over candidate permutations. A failed consistency
//! check queues alternative candidate maps (uses-level mutations first,
//! import-level backtracking second) and the driver retries until a map
//! checks out or the permutation stacks drain.
//!
//! ## Pipeline
//!
//! ```text
//! seed candidates → attach fragments → build package spaces →
//!        ^                                    |
//!        |                                    v
//!   pop permutation  ←  queue permutations ← check consistency
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use filament_resolver::Resolver;
//!
//! let mut resolver = Resolver::new();
//! let wires = resolver.resolve(&env, root, &[])?;
//! for (module, module_wires) in &wires {
//!     // install the wires
//! }
//! ```

pub mod error;
pub mod resolve;

pub use error::{ErrorKind, ResolveError, Result};
pub use resolve::{Resolver, WireMap};
