//! Capability flags and the component trait
//!
//! A component opts into lifecycle stages by declaring a [`Capabilities`]
//! set. The set is a property of the component *type*
//! ([`Component::capabilities`]), so the registry can validate it before any
//! instance exists. The lifecycle driver only ever looks at the flags: a
//! stage method that is overridden but not declared is never called.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use keystone_common::Logger;

use crate::configuration::Configuration;
use crate::context::Context;
use crate::error::{ContainerError, ContainerResult, StageResult};
use crate::parameters::Parameters;
use crate::registration::{Role, Scope};
use crate::view::ServiceView;

/// Flat set of lifecycle capabilities a component declares
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Capabilities(u16);

impl Capabilities {
    /// Receives a logger bound to the component's role path
    pub const LOGGABLE: Self = Self(1 << 0);
    /// Receives environment/identity context
    pub const CONTEXTUALIZABLE: Self = Self(1 << 1);
    /// Receives flat key/value parameters
    pub const PARAMETERIZABLE: Self = Self(1 << 2);
    /// Receives a configuration tree
    pub const CONFIGURABLE: Self = Self(1 << 3);
    /// Receives a restricted view of its declared dependencies
    pub const SERVICEABLE: Self = Self(1 << 4);
    /// One-time setup
    pub const INITIALIZABLE: Self = Self(1 << 5);
    /// Start/stop
    pub const STARTABLE: Self = Self(1 << 6);
    /// Suspend/resume while active
    pub const SUSPENDABLE: Self = Self(1 << 7);
    /// Terminal teardown
    pub const DISPOSABLE: Self = Self(1 << 8);
    /// Marker: one instance may serve every caller
    pub const THREAD_SAFE: Self = Self(1 << 9);
    /// Marker: an instance must not be shared between callers
    pub const SINGLE_THREADED: Self = Self(1 << 10);

    const NAMES: [(Capabilities, &'static str); 11] = [
        (Self::LOGGABLE, "LOGGABLE"),
        (Self::CONTEXTUALIZABLE, "CONTEXTUALIZABLE"),
        (Self::PARAMETERIZABLE, "PARAMETERIZABLE"),
        (Self::CONFIGURABLE, "CONFIGURABLE"),
        (Self::SERVICEABLE, "SERVICEABLE"),
        (Self::INITIALIZABLE, "INITIALIZABLE"),
        (Self::STARTABLE, "STARTABLE"),
        (Self::SUSPENDABLE, "SUSPENDABLE"),
        (Self::DISPOSABLE, "DISPOSABLE"),
        (Self::THREAD_SAFE, "THREAD_SAFE"),
        (Self::SINGLE_THREADED, "SINGLE_THREADED"),
    ];

    /// No capabilities: the component is constructed and handed out as is
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Every lifecycle stage (markers excluded)
    pub const fn full_lifecycle() -> Self {
        Self::LOGGABLE
            .union(Self::CONTEXTUALIZABLE)
            .union(Self::PARAMETERIZABLE)
            .union(Self::SERVICEABLE)
            .union(Self::INITIALIZABLE)
            .union(Self::STARTABLE)
            .union(Self::SUSPENDABLE)
            .union(Self::DISPOSABLE)
    }

    /// Set union, usable in `const` context
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Whether every flag of `other` is present
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Names of the flags in declaration order
    pub fn names(self) -> Vec<&'static str> {
        Self::NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect()
    }

    /// Check the set for mutually exclusive flags and for a scope it cannot be bound in
    pub(crate) fn validate(self, role: &Role, scope: Scope) -> ContainerResult<()> {
        let incompatible = |reason: &str| ContainerError::IncompatibleLifecycle {
            role: role.clone(),
            reason: reason.to_string(),
        };

        if self.contains(Self::PARAMETERIZABLE.union(Self::CONFIGURABLE)) {
            return Err(incompatible(
                "PARAMETERIZABLE and CONFIGURABLE are mutually exclusive",
            ));
        }
        if self.contains(Self::THREAD_SAFE.union(Self::SINGLE_THREADED)) {
            return Err(incompatible(
                "THREAD_SAFE and SINGLE_THREADED are mutually exclusive",
            ));
        }
        if self.contains(Self::SINGLE_THREADED) && scope == Scope::Singleton {
            return Err(incompatible(
                "SINGLE_THREADED components cannot be bound as singletons",
            ));
        }
        Ok(())
    }
}

impl BitOr for Capabilities {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl BitOrAssign for Capabilities {
    fn bitor_assign(&mut self, rhs: Self) {
        *self = self.union(rhs);
    }
}

impl fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = self.names();
        if names.is_empty() {
            f.write_str("Capabilities(empty)")
        } else {
            write!(f, "Capabilities({})", names.join(" | "))
        }
    }
}

/// A container-managed component.
///
/// Every stage method defaults to a no-op; the driver only calls the ones
/// whose flag appears in [`Component::capabilities`]. Stage methods take
/// `&self`: the container serializes transitions per instance, and the
/// instance is shared with callers once it is active, so mutable state
/// belongs behind interior mutability.
///
/// ```
/// use std::sync::atomic::{AtomicBool, Ordering};
/// use keystone_di::{Capabilities, Component, StageResult};
///
/// #[derive(Default)]
/// struct Ticker {
///     running: AtomicBool,
/// }
///
/// impl Component for Ticker {
///     fn capabilities() -> Capabilities {
///         Capabilities::STARTABLE
///     }
///
///     fn start(&self) -> StageResult {
///         self.running.store(true, Ordering::SeqCst);
///         Ok(())
///     }
///
///     fn stop(&self) -> StageResult {
///         self.running.store(false, Ordering::SeqCst);
///         Ok(())
///     }
/// }
/// ```
#[allow(unused_variables)]
pub trait Component: Send + Sync + 'static {
    /// Capabilities this component type opts into
    fn capabilities() -> Capabilities
    where
        Self: Sized,
    {
        Capabilities::empty()
    }

    fn enable_logging(&self, logger: Logger) -> StageResult {
        Ok(())
    }

    fn contextualize(&self, context: &Context) -> StageResult {
        Ok(())
    }

    fn parameterize(&self, parameters: &Parameters) -> StageResult {
        Ok(())
    }

    fn configure(&self, configuration: &Configuration) -> StageResult {
        Ok(())
    }

    /// Receive the restricted view of declared dependencies; the view may be kept
    fn service(&self, services: ServiceView) -> StageResult {
        Ok(())
    }

    fn initialize(&self) -> StageResult {
        Ok(())
    }

    fn start(&self) -> StageResult {
        Ok(())
    }

    fn suspend(&self) -> StageResult {
        Ok(())
    }

    fn resume(&self) -> StageResult {
        Ok(())
    }

    fn stop(&self) -> StageResult {
        Ok(())
    }

    fn dispose(&self) -> StageResult {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_union_and_contains() {
        let caps = Capabilities::LOGGABLE | Capabilities::STARTABLE;
        assert!(caps.contains(Capabilities::LOGGABLE));
        assert!(caps.contains(Capabilities::STARTABLE));
        assert!(!caps.contains(Capabilities::DISPOSABLE));
        assert!(Capabilities::empty().is_empty());
    }

    #[test]
    fn test_debug_lists_flag_names() {
        let caps = Capabilities::INITIALIZABLE | Capabilities::LOGGABLE;
        assert_eq!(format!("{:?}", caps), "Capabilities(LOGGABLE | INITIALIZABLE)");
        assert_eq!(format!("{:?}", Capabilities::empty()), "Capabilities(empty)");
    }

    #[test]
    fn test_parameterize_and_configure_are_exclusive() {
        let role = Role::from("settings");
        let caps = Capabilities::PARAMETERIZABLE | Capabilities::CONFIGURABLE;
        let result = caps.validate(&role, Scope::Singleton);
        assert!(matches!(result, Err(ContainerError::IncompatibleLifecycle { .. })));
    }

    #[test]
    fn test_threading_markers_are_exclusive() {
        let role = Role::from("worker");
        let caps = Capabilities::THREAD_SAFE | Capabilities::SINGLE_THREADED;
        assert!(caps.validate(&role, Scope::PerLookup).is_err());
    }

    #[test]
    fn test_single_threaded_requires_per_lookup() {
        let role = Role::from("parser");
        let caps = Capabilities::SINGLE_THREADED | Capabilities::INITIALIZABLE;
        assert!(caps.validate(&role, Scope::Singleton).is_err());
        assert!(caps.validate(&role, Scope::PerLookup).is_ok());
    }

    #[test]
    fn test_full_lifecycle_is_valid() {
        let role = Role::from("service");
        assert!(Capabilities::full_lifecycle()
            .validate(&role, Scope::Singleton)
            .is_ok());
    }
}
