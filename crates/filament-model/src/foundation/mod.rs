//! Foundation types: attribute values, versions, and match filters.

mod filter;
mod value;
mod version;

pub use filter::{Attrs, Filter};
pub use value::Value;
pub use version::{ParseVersionError, Version};
