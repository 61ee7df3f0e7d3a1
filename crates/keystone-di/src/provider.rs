//! Service providers
//!
//! A provider is how a host hands the container its role bindings: each
//! provider registers the roles of one subsystem.
//!
//! ```
//! use std::sync::Arc;
//! use keystone_di::{Component, Container, ContainerResult, ServiceProvider, ServiceProviderRegistry};
//!
//! struct Store;
//! impl Component for Store {}
//!
//! struct StorageProvider;
//!
//! impl ServiceProvider for StorageProvider {
//!     fn name(&self) -> &'static str {
//!         "storage"
//!     }
//!
//!     fn register(&self, container: &Container) -> ContainerResult<()> {
//!         container.register_singleton("store", |_| Ok(Arc::new(Store)))
//!     }
//! }
//!
//! let container = Container::with_defaults();
//! let mut providers = ServiceProviderRegistry::new();
//! providers.add(StorageProvider);
//! providers.register_all(&container).unwrap();
//! assert!(container.is_registered("store"));
//! ```

use std::sync::Arc;

use tracing::{debug, info};

use crate::container::Container;
use crate::error::ContainerResult;

/// Registers one subsystem's roles with a container
pub trait ServiceProvider: Send + Sync {
    /// Used for logging and diagnostics
    fn name(&self) -> &'static str;

    /// Lower values are registered first. Default is 100.
    fn priority(&self) -> u32 {
        100
    }

    fn register(&self, container: &Container) -> ContainerResult<()>;

    /// Called after every provider has registered
    #[allow(unused_variables)]
    fn validate(&self, container: &Container) -> ContainerResult<()> {
        Ok(())
    }
}

/// Ordered collection of providers
pub struct ServiceProviderRegistry {
    providers: Vec<Arc<dyn ServiceProvider>>,
}

impl ServiceProviderRegistry {
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
        }
    }

    pub fn add<P: ServiceProvider + 'static>(&mut self, provider: P) -> &mut Self {
        self.providers.push(Arc::new(provider));
        self
    }

    pub fn add_shared(&mut self, provider: Arc<dyn ServiceProvider>) -> &mut Self {
        self.providers.push(provider);
        self
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Names in registration order
    pub fn provider_names(&self) -> Vec<&'static str> {
        self.sorted().iter().map(|p| p.name()).collect()
    }

    /// Register every provider by priority, then validate each.
    ///
    /// Providers with equal priority keep the order they were added in.
    pub fn register_all(&self, container: &Container) -> ContainerResult<()> {
        let sorted = self.sorted();
        info!("Registering {} service providers", sorted.len());

        for provider in &sorted {
            debug!(
                "Registering provider '{}' (priority: {})",
                provider.name(),
                provider.priority()
            );
            provider.register(container)?;
        }

        for provider in &sorted {
            provider.validate(container)?;
        }

        info!("All service providers registered successfully");
        Ok(())
    }

    fn sorted(&self) -> Vec<&Arc<dyn ServiceProvider>> {
        let mut sorted: Vec<_> = self.providers.iter().collect();
        sorted.sort_by_key(|p| p.priority());
        sorted
    }
}

impl Default for ServiceProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}
