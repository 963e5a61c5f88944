//! # Konnect
//!
//! Konnect API client and the resource adapters that let the
//! [`declarative`] engine apply plans against it.
//!
//! ## Example
//!
//! ```ignore
//! use konnect::{HttpClient, register_all};
//! use declarative::{Executor, Plan};
//! use std::sync::Arc;
//!
//! let api = Arc::new(HttpClient::new(token));
//! let mut executor = Executor::new(false).with_registry(register_all(api));
//! let result = executor.execute(&mut plan)?;
//! ```
//!
//! ## Testing
//!
//! [`MemoryApi`] implements [`KonnectApi`] in memory, so adapters and whole
//! plans can be exercised without network access.

pub mod adapters;
pub mod client;
pub mod error;
pub mod memory;
pub mod types;

pub use adapters::{
    ApiAdapter, ApiImplementationAdapter, ApiPublicationAdapter, ApiVersionAdapter,
    AuthStrategyAdapter, ControlPlaneAdapter, GatewayServiceAdapter, PortalAdapter,
};
pub use client::{DEFAULT_BASE_URL, DEFAULT_TIMEOUT, HttpClient, KonnectApi};
pub use error::{Error, ErrorCategory, Result};
pub use memory::MemoryApi;

use declarative::{BaseExecutor, HandlerRegistry};
use std::sync::Arc;

/// Resource types with a registered adapter.
pub const RESOURCE_TYPES: &[&str] = &[
    "portal",
    "control_plane",
    "api",
    "api_version",
    "api_publication",
    "api_implementation",
    "application_auth_strategy",
    "gateway_service",
];

/// Registry with an adapter for every supported resource type.
pub fn register_all(api: Arc<dyn KonnectApi>) -> HandlerRegistry {
    let mut registry = HandlerRegistry::new();
    registry.register(BaseExecutor::boxed(PortalAdapter::new(api.clone())));
    registry.register(BaseExecutor::boxed(ControlPlaneAdapter::new(api.clone())));
    registry.register(BaseExecutor::boxed(ApiAdapter::new(api.clone())));
    registry.register(BaseExecutor::boxed(ApiVersionAdapter::new(api.clone())));
    registry.register(BaseExecutor::boxed(ApiPublicationAdapter::new(api.clone())));
    registry.register(BaseExecutor::boxed(ApiImplementationAdapter::new(api.clone())));
    registry.register(BaseExecutor::boxed(AuthStrategyAdapter::new(api.clone())));
    registry.register(BaseExecutor::boxed(GatewayServiceAdapter::new(api)));
    registry
}
