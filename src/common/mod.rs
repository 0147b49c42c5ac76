pub mod conditions;
pub mod errors;
pub mod gateway_api;
pub mod reference_grants;
mod resource_key;

pub use errors::{ReferenceError, ValidationError};
pub use resource_key::{sort_by_creation, ResourceKey, DEFAULT_GROUP_NAME, DEFAULT_KIND_NAME, DEFAULT_NAMESPACE_NAME};
