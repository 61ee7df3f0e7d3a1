//! Error types for container operations

use crate::config::ConfigError;
use crate::container::ShutdownReport;
use crate::lifecycle::{LifecycleState, Stage};
use crate::registration::Role;

/// Error a component returns from one of its stage methods
pub type ComponentError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result of a component stage method
pub type StageResult = Result<(), ComponentError>;

/// Errors that can occur while registering, resolving or driving components
#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    #[error("Role already registered in this scope: {role}")]
    DuplicateRole { role: Role },

    #[error("Role not registered: {role}")]
    UnresolvedRole { role: Role },

    #[error("Circular dependency detected: {}", format_chain(.chain))]
    CircularDependency { chain: Vec<Role> },

    #[error("Incompatible lifecycle for role '{role}': {reason}")]
    IncompatibleLifecycle { role: Role, reason: String },

    #[error("Role '{requested}' is not a declared dependency of '{role}'")]
    UndeclaredDependency { role: Role, requested: Role },

    #[error("Component '{role}' cannot be initialized twice (state: {state})")]
    DoubleInitialization { role: Role, state: LifecycleState },

    #[error("Invalid state transition for '{role}': cannot {stage} while {state}")]
    InvalidStateTransition {
        role: Role,
        stage: Stage,
        state: LifecycleState,
    },

    #[error("Component '{role}' has been disposed")]
    DisposedComponent { role: Role },

    #[error("Lifecycle stage '{stage}' failed for role '{role}': {source}")]
    LifecycleStage {
        role: Role,
        stage: Stage,
        #[source]
        source: ComponentError,
        unwind_errors: Vec<String>,
    },

    #[error("Factory for role '{role}' failed: {source}")]
    FactoryFailed {
        role: Role,
        #[source]
        source: ComponentError,
    },

    #[error("Role '{role}' is not bound to a {expected}")]
    ServiceTypeMismatch { role: Role, expected: &'static str },

    #[error("Component '{role}' does not support {stage}")]
    UnsupportedCapability { role: Role, stage: Stage },

    #[error("Container '{container}' is shutting down")]
    ShuttingDown { container: String },

    #[error("Drive of '{role}' cancelled before stage '{stage}'")]
    DriveCancelled { role: Role, stage: Stage },

    #[error("Resolution depth limit {limit} exceeded while resolving '{role}'")]
    ResolutionDepthExceeded { role: Role, limit: usize },

    #[error(
        "Container teardown incomplete: {} failed, {} abandoned",
        .report.failed.len(),
        .report.abandoned.len()
    )]
    Teardown { report: ShutdownReport },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Result alias for container operations
pub type ContainerResult<T> = Result<T, ContainerError>;

impl ContainerError {
    /// Role the error is about, when there is a single one
    pub fn role(&self) -> Option<&Role> {
        match self {
            ContainerError::DuplicateRole { role }
            | ContainerError::UnresolvedRole { role }
            | ContainerError::IncompatibleLifecycle { role, .. }
            | ContainerError::UndeclaredDependency { role, .. }
            | ContainerError::DoubleInitialization { role, .. }
            | ContainerError::InvalidStateTransition { role, .. }
            | ContainerError::DisposedComponent { role }
            | ContainerError::LifecycleStage { role, .. }
            | ContainerError::FactoryFailed { role, .. }
            | ContainerError::ServiceTypeMismatch { role, .. }
            | ContainerError::UnsupportedCapability { role, .. }
            | ContainerError::DriveCancelled { role, .. }
            | ContainerError::ResolutionDepthExceeded { role, .. } => Some(role),
            ContainerError::CircularDependency { chain } => chain.last(),
            ContainerError::ShuttingDown { .. }
            | ContainerError::Teardown { .. }
            | ContainerError::Config(_) => None,
        }
    }

    /// Stage tag of a [`ContainerError::LifecycleStage`]
    pub fn stage(&self) -> Option<Stage> {
        match self {
            ContainerError::LifecycleStage { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Whether this error reports a dependency cycle
    pub fn is_circular(&self) -> bool {
        matches!(self, ContainerError::CircularDependency { .. })
    }

    /// Recover a container error that travelled through a component stage
    pub(crate) fn from_component(error: ComponentError) -> Result<ContainerError, ComponentError> {
        error.downcast::<ContainerError>().map(|boxed| *boxed)
    }
}

fn format_chain(chain: &[Role]) -> String {
    chain
        .iter()
        .map(|role| role.as_str())
        .collect::<Vec<_>>()
        .join(" -> ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_circular_message_lists_chain() {
        let err = ContainerError::CircularDependency {
            chain: vec![Role::from("a"), Role::from("b"), Role::from("a")],
        };
        assert_eq!(err.to_string(), "Circular dependency detected: a -> b -> a");
        assert!(err.is_circular());
        assert_eq!(err.role().map(Role::as_str), Some("a"));
    }

    #[test]
    fn test_round_trip_through_component_error() {
        let original = ContainerError::UnresolvedRole {
            role: Role::from("cache"),
        };
        let boxed: ComponentError = Box::new(original);
        let recovered = ContainerError::from_component(boxed).unwrap();
        assert!(matches!(recovered, ContainerError::UnresolvedRole { .. }));
    }

    #[test]
    fn test_foreign_error_is_not_recovered() {
        let boxed: ComponentError = "socket closed".into();
        assert!(ContainerError::from_component(boxed).is_err());
    }
}
