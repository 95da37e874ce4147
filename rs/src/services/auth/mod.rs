pub mod authorizer;
pub mod binding_cache;
pub mod factory;
pub mod introspection;
pub mod replay;
pub mod request;
pub mod types;

pub use authorizer::DpopAuthorizer;
pub use binding_cache::TokenBindingCache;
pub use factory::{build_authorizer, build_cache_client};
pub use introspection::{IntrospectionClient, IntrospectionError, TokenIntrospector};
pub use request::DpopRequest;
pub use types::{Authorized, Rejection, TokenBindingFact};
