//! Role bindings: what the registry knows about a role before any instance exists

use std::any::Any;
use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::capability::{Capabilities, Component};
use crate::configuration::Configuration;
use crate::error::ContainerResult;
use crate::parameters::Parameters;
use crate::view::Resolver;

/// Logical name of a service contract, independent of any implementing type
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Role(Arc<str>);

impl Role {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", &*self.0)
    }
}

impl From<&str> for Role {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Role {
    fn from(name: String) -> Self {
        Self(Arc::from(name))
    }
}

impl From<&Role> for Role {
    fn from(role: &Role) -> Self {
        role.clone()
    }
}

impl Borrow<str> for Role {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Role {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Binding behavior of a registry entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// One instance for the container's lifetime, constructed on first lookup
    Singleton,
    /// A fresh instance on every lookup, each managed separately
    PerLookup,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Singleton => f.write_str("singleton"),
            Scope::PerLookup => f.write_str("per-lookup"),
        }
    }
}

/// One entry of a dependency declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub role: Role,
    pub required: bool,
}

/// A constructed, not yet driven, component
pub(crate) struct ErasedInstance {
    pub(crate) component: Arc<dyn Component>,
    pub(crate) any: Arc<dyn Any + Send + Sync>,
}

pub(crate) type ErasedFactory =
    Arc<dyn Fn(&Resolver) -> ContainerResult<ErasedInstance> + Send + Sync>;

/// Everything the registry needs to construct and drive instances of a role.
///
/// ```
/// use std::sync::Arc;
/// use keystone_di::{Capabilities, Component, Parameters, Registration, StageResult};
///
/// struct Random;
///
/// impl Component for Random {
///     fn capabilities() -> Capabilities {
///         Capabilities::PARAMETERIZABLE
///     }
///
///     fn parameterize(&self, parameters: &Parameters) -> StageResult {
///         parameters.get_as_integer("seed")?;
///         Ok(())
///     }
/// }
///
/// let registration = Registration::singleton("random", |_| Ok(Arc::new(Random)))
///     .with_parameter("seed", "42")
///     .depends_on("clock");
/// assert_eq!(registration.role().as_str(), "random");
/// ```
#[derive(Clone)]
pub struct Registration {
    pub(crate) role: Role,
    pub(crate) scope: Scope,
    pub(crate) capabilities: Capabilities,
    pub(crate) type_name: &'static str,
    pub(crate) factory: ErasedFactory,
    pub(crate) dependencies: Vec<Dependency>,
    pub(crate) parameters: Parameters,
    pub(crate) configuration: Configuration,
    pub(crate) context: BTreeMap<String, serde_json::Value>,
    pub(crate) eager: bool,
}

impl Registration {
    /// Bind `role` to a factory producing `T`
    pub fn new<T, F>(role: impl Into<Role>, scope: Scope, factory: F) -> Self
    where
        T: Component,
        F: Fn(&Resolver) -> ContainerResult<Arc<T>> + Send + Sync + 'static,
    {
        let role = role.into();
        let wrapped_factory: ErasedFactory = Arc::new(move |resolver: &Resolver| -> ContainerResult<ErasedInstance> {
            let instance = factory(resolver)?;
            Ok(ErasedInstance {
                component: instance.clone() as Arc<dyn Component>,
                any: instance as Arc<dyn Any + Send + Sync>,
            })
        });

        Self {
            configuration: Configuration::new(role.as_str()),
            role,
            scope,
            capabilities: T::capabilities(),
            type_name: std::any::type_name::<T>(),
            factory: wrapped_factory,
            dependencies: Vec::new(),
            parameters: Parameters::new(),
            context: BTreeMap::new(),
            eager: false,
        }
    }

    pub fn singleton<T, F>(role: impl Into<Role>, factory: F) -> Self
    where
        T: Component,
        F: Fn(&Resolver) -> ContainerResult<Arc<T>> + Send + Sync + 'static,
    {
        Self::new(role, Scope::Singleton, factory)
    }

    pub fn per_lookup<T, F>(role: impl Into<Role>, factory: F) -> Self
    where
        T: Component,
        F: Fn(&Resolver) -> ContainerResult<Arc<T>> + Send + Sync + 'static,
    {
        Self::new(role, Scope::PerLookup, factory)
    }

    /// Bind `role` to an already constructed instance; it is still driven on first lookup
    pub fn instance<T: Component>(role: impl Into<Role>, instance: Arc<T>) -> Self {
        Self::new(role, Scope::Singleton, move |_| Ok(instance.clone()))
    }

    /// Declare a required dependency; lookup fails fast if it is not registered
    pub fn depends_on(self, role: impl Into<Role>) -> Self {
        self.declare(role.into(), true)
    }

    /// Declare a dependency the component can live without
    pub fn optional_dependency(self, role: impl Into<Role>) -> Self {
        self.declare(role.into(), false)
    }

    pub fn with_parameters(mut self, parameters: Parameters) -> Self {
        self.parameters = self.parameters.merge(&parameters);
        self
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters = self.parameters.with(name, value);
        self
    }

    pub fn with_configuration(mut self, configuration: Configuration) -> Self {
        self.configuration = configuration;
        self
    }

    pub fn with_context_entry(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.context.insert(key.into(), value);
        self
    }

    /// Construct and drive this role when the container starts
    pub fn eager(mut self) -> Self {
        self.eager = true;
        self
    }

    pub fn role(&self) -> &Role {
        &self.role
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }

    pub fn is_eager(&self) -> bool {
        self.eager
    }

    /// Implementing type, for diagnostics
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    fn declare(mut self, role: Role, required: bool) -> Self {
        match self.dependencies.iter_mut().find(|d| d.role == role) {
            Some(existing) => existing.required |= required,
            None => self.dependencies.push(Dependency { role, required }),
        }
        self
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("role", &self.role)
            .field("scope", &self.scope)
            .field("type_name", &self.type_name)
            .field("capabilities", &self.capabilities)
            .field("dependencies", &self.dependencies)
            .field("eager", &self.eager)
            .finish()
    }
}
