//! # Filament entity model
//!
//! Shared data model for the Filament module resolver.
//!
//! This crate holds everything the resolve engine reasons about but does not
//! own: modules, the capabilities they provide, the requirements they need,
//! and the wires that connect them once resolution succeeds. The engine
//! itself lives in `filament-resolver`.
//!
//! ## Architecture
//!
//! ```text
//! foundation/   - value, version, and filter primitives
//! model/        - ids, capabilities, requirements, modules, wires
//! registry      - arena holding every declared entity, keyed by id
//! env           - the Environment trait the resolver consumes
//! ```
//!
//! The object graph (modules ↔ capabilities ↔ requirements) is cyclic, so it
//! is flattened into the [`Registry`] arena and every cross-reference is an
//! id. Fragment attachment is modeled by the [`CapRef`]/[`ReqRef`] sums: a
//! `Hosted` ref keeps the underlying declaration but answers with the host
//! as its effective owner.

pub mod env;
pub mod foundation;
pub mod model;
pub mod registry;

pub use env::{Environment, StaticEnvironment};
pub use foundation::{Attrs, Filter, Value, Version};
pub use model::{
    CapRef, Capability, CapabilityId, Directives, Module, ModuleId, ReqRef, Requirement,
    RequirementId, Resolution, Wire, Wiring,
};
pub use registry::{ModuleBuilder, Registry};
