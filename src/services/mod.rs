//! Service definitions module.
//!
//! Contains service definitions and the service registry.
//!
//! ## Adding a New Service
//!
//! 1. Create a new file in this directory (e.g., `newservice.rs`)
//! 2. Implement the `ManagedService` trait
//! 3. Register the service in `ServiceRegistry::new()`

mod elasticsearch;
mod kibana;
mod registry;
mod traits;

pub use elasticsearch::{ElasticsearchService, LIMITS_TEMPLATE, SITE_TEMPLATE};
pub use kibana::KibanaService;
pub use registry::ServiceRegistry;
pub use traits::{ConfigLayout, ManagedService, ServiceAccount, ServiceDescriptor};
