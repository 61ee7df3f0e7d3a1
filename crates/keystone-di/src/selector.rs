//! Hint-keyed component selection
//!
//! A selector is a singleton bound to one role whose instance is itself a
//! small registry: several implementations of the same contract, each
//! bound under a hint. The hints live in a nested scope, so their own
//! lookups fall through to the enclosing registry. The selector declares
//! every dependency its hints have outside the selector and looks them up
//! at its service stage, so they are active before it is. The nested scope
//! is stopped when the selector is disposed, which puts the hinted
//! components at the selector's place in teardown order.
//!
//! ```
//! use std::sync::Arc;
//! use keystone_di::{Component, Container, Registration};
//!
//! struct Memory;
//! impl Component for Memory {}
//!
//! struct Disk;
//! impl Component for Disk {}
//!
//! let container = Container::with_defaults();
//! container
//!     .register(Registration::selector(
//!         "storage",
//!         vec![
//!             Registration::singleton("memory", |_| Ok(Arc::new(Memory))),
//!             Registration::per_lookup("disk", |_| Ok(Arc::new(Disk))),
//!         ],
//!     ))
//!     .unwrap();
//!
//! let memory = container.lookup_hint("storage", "memory").unwrap();
//! assert!(memory.downcast::<Memory>().is_some());
//! assert!(container.lookup_hint("storage", "tape").is_err());
//! ```

use std::fmt;
use std::sync::Arc;

use crate::capability::{Capabilities, Component};
use crate::error::{ContainerError, ContainerResult, StageResult};
use crate::registration::{Dependency, Registration, Role};
use crate::registry::ServiceRegistry;
use crate::view::{ComponentHandle, Resolver, ServiceView};

/// Components of one role, selected by hint
pub struct ComponentSelector {
    role: Role,
    registry: Arc<ServiceRegistry>,
}

impl ComponentSelector {
    pub fn role(&self) -> &Role {
        &self.role
    }

    /// Look up the component bound under `hint`
    pub fn select(&self, hint: impl Into<Role>) -> ContainerResult<ComponentHandle> {
        let hint = hint.into();
        // an unbound hint must not fall through to the enclosing registry
        if !self.registry.binds(&hint) {
            return Err(ContainerError::UnresolvedRole {
                role: Role::new(format!("{}/{}", self.role, hint)),
            });
        }
        self.registry.lookup(hint)
    }

    pub fn select_as<T: Component>(&self, hint: impl Into<Role>) -> ContainerResult<Arc<T>> {
        self.select(hint)?.downcast_or_err::<T>()
    }

    pub fn has_component(&self, hint: impl Into<Role>) -> bool {
        self.registry.binds(&hint.into())
    }

    /// Bound hints, in registration order
    pub fn hints(&self) -> Vec<Role> {
        self.registry.roles()
    }

    /// Hand back a per-lookup component obtained from [`select`](Self::select)
    pub fn release(&self, handle: &ComponentHandle) -> ContainerResult<()> {
        self.registry.release(handle)
    }
}

impl Component for ComponentSelector {
    fn capabilities() -> Capabilities {
        Capabilities::SERVICEABLE | Capabilities::DISPOSABLE | Capabilities::THREAD_SAFE
    }

    fn service(&self, services: ServiceView) -> StageResult {
        for dependency in services.declared() {
            if dependency.required || services.has(&dependency.role) {
                services.lookup(&dependency.role)?;
            }
        }
        Ok(())
    }

    fn dispose(&self) -> StageResult {
        let report = self.registry.shutdown(None);
        if report.is_clean() {
            Ok(())
        } else {
            Err(ContainerError::Teardown { report }.into())
        }
    }
}

impl fmt::Debug for ComponentSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentSelector")
            .field("role", &self.role)
            .field("hints", &self.hints())
            .finish()
    }
}

impl Registration {
    /// Bind `role` to a selector over `hints`; each registration's role is its hint
    pub fn selector(role: impl Into<Role>, hints: impl IntoIterator<Item = Registration>) -> Self {
        let role = role.into();
        let hints: Arc<[Registration]> = hints.into_iter().collect();
        let selector_role = role.clone();

        let mut external: Vec<Dependency> = Vec::new();
        for dependency in hints.iter().flat_map(|hint| hint.dependencies.iter()) {
            if !hints.iter().any(|hint| hint.role == dependency.role) {
                external.push(dependency.clone());
            }
        }

        let registration = Self::singleton(
            role,
            move |resolver: &Resolver| -> ContainerResult<Arc<ComponentSelector>> {
                let registry = resolver.registry().nested(selector_role.as_str());
                for hint in hints.iter() {
                    registry.register(hint.clone())?;
                }
                Ok(Arc::new(ComponentSelector {
                    role: selector_role.clone(),
                    registry,
                }))
            },
        );
        external.into_iter().fold(registration, |registration, dependency| {
            if dependency.required {
                registration.depends_on(dependency.role)
            } else {
                registration.optional_dependency(dependency.role)
            }
        })
    }
}
