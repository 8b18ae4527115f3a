// Gateway module for the REST API - follows the Train Station Pattern
// All external access must go through this gateway

// Private submodules - not directly accessible from outside
mod envelope;
mod http;
mod traits;
mod wire;

#[cfg(test)]
pub(crate) mod fake;

// Public re-exports - the ONLY way to access gateway functionality
pub use envelope::unwrap_envelope;
pub use http::HttpGateway;
pub use traits::ApiGateway;
pub use wire::AuthGrant;

pub(crate) use http::{endpoint, parse_base_url};

#[cfg(test)]
pub use traits::MockApiGateway;
