//! Service registry.
//!
//! Central registry for all service definitions.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use crate::config::Settings;
use crate::error::{AgentError, ValidationErrorKind};

use super::elasticsearch::ElasticsearchService;
use super::kibana::KibanaService;
use super::traits::ManagedService;

/// Registry of all available service definitions.
pub struct ServiceRegistry {
    services: HashMap<String, Arc<dyn ManagedService>>,
    kibana: Arc<KibanaService>,
}

impl ServiceRegistry {
    /// Create a new service registry with all built-in services.
    pub fn new(settings: &Settings) -> Self {
        let kibana = Arc::new(KibanaService::new(settings));
        let mut registry = Self {
            services: HashMap::new(),
            kibana: Arc::clone(&kibana),
        };

        registry.register(Arc::new(ElasticsearchService::new(settings)));
        registry.register(kibana);

        info!(services = ?registry.list(), "Service registry initialized");

        registry
    }

    /// Register a service definition.
    fn register(&mut self, service: Arc<dyn ManagedService>) {
        let name = service.descriptor().name.clone();
        self.services.insert(name, service);
    }

    /// Get a service definition by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn ManagedService>> {
        self.services.get(name).cloned()
    }

    /// Like [`get`](Self::get), but an unknown name is an error.
    pub fn require(&self, name: &str) -> Result<Arc<dyn ManagedService>, AgentError> {
        self.get(name).ok_or_else(|| AgentError::Validation {
            kind: ValidationErrorKind::UnknownService {
                service: name.to_string(),
            },
        })
    }

    /// The Kibana definition, which also owns the dashboard loader.
    pub fn kibana(&self) -> Arc<KibanaService> {
        Arc::clone(&self.kibana)
    }

    /// List all registered service names, sorted.
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.services.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::new(&Settings::default())
    }
}
