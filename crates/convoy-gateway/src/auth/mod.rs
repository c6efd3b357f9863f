//! Authentication against the external identity service.

pub mod claims;
pub mod identity;
pub mod middleware;

pub use identity::{HttpIdentityService, IdentityError, IdentityService};
pub use middleware::{auth_middleware, authenticate};
