//! The container: a registry plus the logger and context it hands out
//!
//! ```
//! use std::sync::Arc;
//! use keystone_di::{Capabilities, Component, Container, StageResult};
//!
//! struct Clock;
//!
//! impl Component for Clock {
//!     fn capabilities() -> Capabilities {
//!         Capabilities::STARTABLE
//!     }
//!
//!     fn start(&self) -> StageResult {
//!         Ok(())
//!     }
//! }
//!
//! let container = Container::with_defaults();
//! container.register_singleton("clock", |_| Ok(Arc::new(Clock))).unwrap();
//!
//! let clock = container.lookup_as::<Clock>("clock").unwrap();
//! let report = container.stop().unwrap();
//! assert_eq!(report.disposed.len(), 1);
//! # drop(clock);
//! ```

use std::fmt;
use std::sync::Arc;

use keystone_common::Logger;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info};

use crate::capability::Component;
use crate::config::ContainerConfig;
use crate::context::{Context, CONTAINER_KEY};
use crate::error::{ContainerError, ContainerResult};
use crate::registration::{Registration, Role};
use crate::registry::ServiceRegistry;
use crate::selector::ComponentSelector;
use crate::view::{ComponentHandle, Resolver};

/// Outcome of [`Container::stop`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Shut down cleanly, in teardown order
    pub disposed: Vec<Role>,
    /// Shut down with an error; the instance still ends disposed
    pub failed: Vec<(Role, String)>,
    /// Skipped because the shutdown timeout expired
    pub abandoned: Vec<Role>,
}

impl ShutdownReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.abandoned.is_empty()
    }

    pub(crate) fn merge(&mut self, other: ShutdownReport) {
        self.disposed.extend(other.disposed);
        self.failed.extend(other.failed);
        self.abandoned.extend(other.abandoned);
    }
}

/// Point-in-time counters for one container scope
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ContainerStats {
    pub name: String,
    pub registered_roles: usize,
    pub aliases: usize,
    pub active_singletons: usize,
    pub tracked_instances: usize,
    pub lookups: u64,
    pub failed_lookups: u64,
}

/// Component container
pub struct Container {
    config: ContainerConfig,
    registry: Arc<ServiceRegistry>,
}

impl Container {
    /// Create a container; the configuration is validated first
    pub fn new(config: ContainerConfig) -> ContainerResult<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    pub fn with_defaults() -> Self {
        Self::build(ContainerConfig::default())
    }

    pub fn builder() -> ContainerBuilder {
        ContainerBuilder::new()
    }

    fn build(config: ContainerConfig) -> Self {
        let logger = Logger::root(config.name.clone(), config.level());
        let context = Context::new().with(CONTAINER_KEY, json!(config.name));
        let registry = ServiceRegistry::new(
            config.name.clone(),
            logger,
            context,
            config.max_resolution_depth,
        );
        info!("Created container '{}'", config.name);
        Self { config, registry }
    }

    pub fn name(&self) -> &str {
        self.registry.name()
    }

    pub fn config(&self) -> &ContainerConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<ServiceRegistry> {
        &self.registry
    }

    /// Root of this container's logger hierarchy
    pub fn logger(&self) -> &Logger {
        self.registry.logger()
    }

    pub fn register(&self, registration: Registration) -> ContainerResult<()> {
        self.registry.register(registration)
    }

    pub fn register_singleton<T, F>(&self, role: impl Into<Role>, factory: F) -> ContainerResult<()>
    where
        T: Component,
        F: Fn(&Resolver) -> ContainerResult<Arc<T>> + Send + Sync + 'static,
    {
        self.register(Registration::singleton(role, factory))
    }

    pub fn register_per_lookup<T, F>(&self, role: impl Into<Role>, factory: F) -> ContainerResult<()>
    where
        T: Component,
        F: Fn(&Resolver) -> ContainerResult<Arc<T>> + Send + Sync + 'static,
    {
        self.register(Registration::per_lookup(role, factory))
    }

    /// Register an existing instance as a singleton; it is driven on first lookup
    pub fn register_instance<T: Component>(&self, role: impl Into<Role>, instance: Arc<T>) -> ContainerResult<()> {
        self.register(Registration::instance(role, instance))
    }

    pub fn alias(&self, old: impl Into<Role>, new: impl Into<Role>) -> ContainerResult<()> {
        self.registry.alias(old, new)
    }

    pub fn unregister(&self, role: impl Into<Role>) -> ContainerResult<()> {
        self.registry.unregister(role)
    }

    pub fn is_registered(&self, role: impl Into<Role>) -> bool {
        self.registry.is_registered(&role.into())
    }

    pub fn lookup(&self, role: impl Into<Role>) -> ContainerResult<ComponentHandle> {
        self.registry.lookup(role)
    }

    /// Look up and downcast to the implementing type
    pub fn lookup_as<T: Component>(&self, role: impl Into<Role>) -> ContainerResult<Arc<T>> {
        self.lookup(role)?.downcast_or_err::<T>()
    }

    /// Look up the component bound under `hint` by the selector at `role`
    pub fn lookup_hint(&self, role: impl Into<Role>, hint: impl Into<Role>) -> ContainerResult<ComponentHandle> {
        self.lookup_as::<ComponentSelector>(role)?.select(hint)
    }

    pub fn release(&self, handle: &ComponentHandle) -> ContainerResult<()> {
        self.registry.release(handle)
    }

    pub fn suspend(&self, handle: &ComponentHandle) -> ContainerResult<()> {
        self.registry.suspend(handle)
    }

    pub fn resume(&self, handle: &ComponentHandle) -> ContainerResult<()> {
        self.registry.resume(handle)
    }

    /// Every declared cycle and missing required dependency; empty when sound
    pub fn validate(&self) -> Vec<ContainerError> {
        self.registry.validate()
    }

    pub fn stats(&self) -> ContainerStats {
        self.registry.stats()
    }

    /// Roles of live tracked instances in the order they became active
    pub fn activation_order(&self) -> Vec<Role> {
        self.registry.activation_order()
    }

    pub fn is_stopping(&self) -> bool {
        self.registry.is_closing()
    }

    /// A nested container; lookups it cannot satisfy fall through to this one
    pub fn child(&self, name: &str) -> Container {
        let registry = self.registry.child(name);
        let config = ContainerConfig {
            name: registry.name().to_string(),
            ..self.config.clone()
        };
        Container { config, registry }
    }

    /// Construct and drive every eager role, in registration order
    pub fn start(&self) -> ContainerResult<()> {
        let eager = self.registry.eager_roles();
        let _timer = self.logger().time("start", None);
        debug!("Starting container '{}' with {} eager roles", self.name(), eager.len());
        for role in eager {
            self.lookup(role)?;
        }
        info!("Container '{}' started", self.name());
        Ok(())
    }

    /// Tear down this container and its children.
    ///
    /// Lookups are rejected from here on. Returns
    /// [`ContainerError::Teardown`] carrying the report when an instance
    /// failed to shut down or was abandoned at the timeout. Calling it again
    /// returns an empty report.
    pub fn stop(&self) -> ContainerResult<ShutdownReport> {
        let _timer = self.logger().time("stop", None);
        let report = self.registry.shutdown(self.config.shutdown_timeout());
        if report.is_clean() {
            Ok(report)
        } else {
            Err(ContainerError::Teardown { report })
        }
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .finish()
    }
}

/// Collects registrations and aliases, then creates the container in one step
pub struct ContainerBuilder {
    config: ContainerConfig,
    registrations: Vec<Registration>,
    aliases: Vec<(Role, Role)>,
}

impl ContainerBuilder {
    pub fn new() -> Self {
        Self {
            config: ContainerConfig::default(),
            registrations: Vec::new(),
            aliases: Vec::new(),
        }
    }

    pub fn config(mut self, config: ContainerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn register(mut self, registration: Registration) -> Self {
        self.registrations.push(registration);
        self
    }

    pub fn alias(mut self, old: impl Into<Role>, new: impl Into<Role>) -> Self {
        self.aliases.push((old.into(), new.into()));
        self
    }

    /// Fails on an invalid configuration or the first rejected registration
    pub fn build(self) -> ContainerResult<Container> {
        let container = Container::new(self.config)?;
        for registration in self.registrations {
            container.register(registration)?;
        }
        for (old, new) in self.aliases {
            container.alias(old, new)?;
        }
        Ok(container)
    }
}

impl Default for ContainerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
