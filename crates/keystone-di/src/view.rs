//! What components see of the registry
//!
//! Factories get a [`Resolver`], which may look up any role in scope.
//! Components get a [`ServiceView`] at their `service` stage, limited to
//! the roles they declared. Both carry the chain of roles under
//! construction, so a dependency cycle is reported instead of recursing.

use std::fmt;
use std::sync::Arc;

use crate::capability::{Capabilities, Component};
use crate::error::{ContainerError, ContainerResult};
use crate::lifecycle::{LifecycleState, ManagedComponent};
use crate::registration::{Dependency, Role, Scope};
use crate::registry::{BindingNode, ServiceRegistry};
use crate::selector::ComponentSelector;

/// A looked-up component
#[derive(Clone)]
pub struct ComponentHandle {
    managed: Arc<ManagedComponent>,
}

impl ComponentHandle {
    pub(crate) fn new(managed: Arc<ManagedComponent>) -> Self {
        Self { managed }
    }

    pub fn role(&self) -> &Role {
        self.managed.role()
    }

    /// Unique per instance; per-lookup handles for the same role differ
    pub fn id(&self) -> u64 {
        self.managed.id()
    }

    pub fn scope(&self) -> Scope {
        self.managed.scope()
    }

    pub fn capabilities(&self) -> Capabilities {
        self.managed.capabilities()
    }

    pub fn state(&self) -> LifecycleState {
        self.managed.state()
    }

    /// Typed access to the instance; `None` if it is not a `T`
    pub fn downcast<T: Component>(&self) -> Option<Arc<T>> {
        self.managed.downcast::<T>()
    }

    /// Like [`downcast`](Self::downcast), with a typed error
    pub fn downcast_or_err<T: Component>(&self) -> ContainerResult<Arc<T>> {
        self.downcast::<T>()
            .ok_or_else(|| ContainerError::ServiceTypeMismatch {
                role: self.role().clone(),
                expected: std::any::type_name::<T>(),
            })
    }

    pub(crate) fn managed(&self) -> &Arc<ManagedComponent> {
        &self.managed
    }
}

impl fmt::Debug for ComponentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentHandle")
            .field("role", self.role())
            .field("id", &self.id())
            .field("scope", &self.scope())
            .field("state", &self.state())
            .finish()
    }
}

/// Unrestricted lookups, handed to factories
#[derive(Clone)]
pub struct Resolver {
    registry: Arc<ServiceRegistry>,
    chain: Arc<[BindingNode]>,
}

impl Resolver {
    pub(crate) fn new(registry: Arc<ServiceRegistry>, chain: Vec<BindingNode>) -> Self {
        Self {
            registry,
            chain: chain.into(),
        }
    }

    pub fn lookup(&self, role: impl Into<Role>) -> ContainerResult<ComponentHandle> {
        self.registry.resolve(&role.into(), &self.chain)
    }

    pub fn lookup_as<T: Component>(&self, role: impl Into<Role>) -> ContainerResult<Arc<T>> {
        self.lookup(role)?.downcast_or_err::<T>()
    }

    /// Whether `role` is registered here or in an ancestor
    pub fn has(&self, role: impl Into<Role>) -> bool {
        self.registry.is_registered(&role.into())
    }

    pub fn release(&self, handle: &ComponentHandle) -> ContainerResult<()> {
        self.registry.release(handle)
    }

    /// Roles under construction on this call path, outermost first
    pub fn chain(&self) -> Vec<Role> {
        self.chain.iter().map(|link| link.role.clone()).collect()
    }

    pub(crate) fn registry(&self) -> &Arc<ServiceRegistry> {
        &self.registry
    }
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("registry", &self.registry.name())
            .field("chain", &self.chain())
            .finish()
    }
}

/// Lookups limited to a component's declared dependencies.
///
/// Asking for an undeclared role fails with
/// [`ContainerError::UndeclaredDependency`] even when the role is
/// registered, so a component cannot reach past what it declared.
#[derive(Clone)]
pub struct ServiceView {
    owner: Role,
    declared: Arc<[Dependency]>,
    resolver: Option<Resolver>,
}

impl ServiceView {
    pub(crate) fn new(owner: Role, declared: Vec<Dependency>, resolver: Resolver) -> Self {
        Self {
            owner,
            declared: declared.into(),
            resolver: Some(resolver),
        }
    }

    /// A view with no registry behind it; every lookup fails
    pub fn detached(owner: Role) -> Self {
        Self {
            owner,
            declared: Arc::from(Vec::new()),
            resolver: None,
        }
    }

    /// Role of the component this view was handed to
    pub fn owner(&self) -> &Role {
        &self.owner
    }

    pub fn declared(&self) -> &[Dependency] {
        &self.declared
    }

    pub fn lookup(&self, role: impl Into<Role>) -> ContainerResult<ComponentHandle> {
        let role = role.into();
        if !self.declares(&role) {
            return Err(ContainerError::UndeclaredDependency {
                role: self.owner.clone(),
                requested: role,
            });
        }
        match &self.resolver {
            Some(resolver) => resolver.lookup(role),
            None => Err(ContainerError::UnresolvedRole { role }),
        }
    }

    pub fn lookup_as<T: Component>(&self, role: impl Into<Role>) -> ContainerResult<Arc<T>> {
        self.lookup(role)?.downcast_or_err::<T>()
    }

    /// Select by hint from a declared selector role
    pub fn lookup_hint(&self, role: impl Into<Role>, hint: impl Into<Role>) -> ContainerResult<ComponentHandle> {
        self.lookup_as::<ComponentSelector>(role)?.select(hint)
    }

    /// Declared and registered; optional dependencies may be absent
    pub fn has(&self, role: impl Into<Role>) -> bool {
        let role = role.into();
        self.declares(&role)
            && self
                .resolver
                .as_ref()
                .map(|resolver| resolver.has(role))
                .unwrap_or(false)
    }

    /// Hand back a per-lookup dependency; singletons are left alone
    pub fn release(&self, handle: &ComponentHandle) -> ContainerResult<()> {
        match &self.resolver {
            Some(resolver) => resolver.release(handle),
            None => Err(ContainerError::DisposedComponent {
                role: handle.role().clone(),
            }),
        }
    }

    fn declares(&self, role: &Role) -> bool {
        if self.declared.iter().any(|dep| &dep.role == role) {
            return true;
        }
        // a dependency may be declared under a renamed role
        match &self.resolver {
            Some(resolver) => {
                let registry = resolver.registry();
                let wanted = registry.canonical(role);
                self.declared
                    .iter()
                    .any(|dep| registry.canonical(&dep.role) == wanted)
            }
            None => false,
        }
    }
}

impl fmt::Debug for ServiceView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceView")
            .field("owner", &self.owner)
            .field("declared", &self.declared)
            .finish()
    }
}
