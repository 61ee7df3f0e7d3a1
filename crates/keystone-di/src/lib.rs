//! Component lifecycle and service-location container
//!
//! Components are registered under a [`Role`] with a factory, a [`Scope`]
//! and a statically declared [`Capabilities`] set. On lookup the container
//! constructs the component and drives it through the lifecycle stages its
//! capabilities name, in a fixed order, handing each stage what it needs:
//! a [`Logger`](keystone_common::Logger), a [`Context`], [`Parameters`] or a
//! [`Configuration`], and a [`ServiceView`] for declared dependencies.
//! Teardown walks the activation order in reverse.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use keystone_di::{
//!     Capabilities, Component, Container, Registration, ServiceView, StageResult,
//! };
//!
//! struct Store;
//! impl Component for Store {}
//!
//! struct Catalog;
//!
//! impl Component for Catalog {
//!     fn capabilities() -> Capabilities {
//!         Capabilities::SERVICEABLE | Capabilities::DISPOSABLE
//!     }
//!
//!     fn service(&self, services: ServiceView) -> StageResult {
//!         services.lookup_as::<Store>("store")?;
//!         Ok(())
//!     }
//! }
//!
//! let container = Container::with_defaults();
//! container.register_singleton("store", |_| Ok(Arc::new(Store))).unwrap();
//! container
//!     .register(Registration::singleton("catalog", |_| Ok(Arc::new(Catalog))).depends_on("store"))
//!     .unwrap();
//!
//! container.lookup("catalog").unwrap();
//! let report = container.stop().unwrap();
//! assert_eq!(report.disposed.len(), 2);
//! ```

pub mod capability;
pub mod config;
pub mod configuration;
mod construction;
pub mod container;
pub mod context;
pub mod error;
pub mod graph;
pub mod lifecycle;
pub mod parameters;
pub mod provider;
pub mod registration;
pub mod registry;
pub mod selector;
pub mod view;

pub use capability::{Capabilities, Component};
pub use config::{ConfigError, ContainerConfig};
pub use configuration::{Configuration, ConfigurationError};
pub use container::{Container, ContainerBuilder, ContainerStats, ShutdownReport};
pub use context::{Context, ContextError};
pub use error::{ComponentError, ContainerError, ContainerResult, StageResult};
pub use graph::DependencyGraph;
pub use lifecycle::{DriveInputs, LifecycleDriver, LifecycleState, ManagedComponent, Stage};
pub use parameters::{ParameterError, Parameters};
pub use provider::{ServiceProvider, ServiceProviderRegistry};
pub use registration::{Dependency, Registration, Role, Scope};
pub use registry::ServiceRegistry;
pub use selector::ComponentSelector;
pub use view::{ComponentHandle, Resolver, ServiceView};
