//! Lifecycle driver
//!
//! The driver walks a component through the stages its capability set
//! declares, in a fixed order:
//!
//! ```text
//! enable-logging -> contextualize -> parameterize | configure -> service
//!     -> initialize -> start -> (suspend <-> resume)* -> stop -> dispose
//! ```
//!
//! and tracks the resulting [`LifecycleState`] behind a per-instance lock,
//! so transitions on one instance never overlap. A failing stage leaves the
//! instance `Disposed`: completed stages with a natural inverse are unwound
//! in reverse order first, and secondary unwind failures are collected into
//! the reported error rather than replacing it.

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use keystone_common::{format_error, LogLevel, Logger};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::debug;

use crate::capability::{Capabilities, Component};
use crate::configuration::Configuration;
use crate::context::Context;
use crate::error::{ComponentError, ContainerError, ContainerResult, StageResult};
use crate::parameters::Parameters;
use crate::registration::{ErasedInstance, Role, Scope};
use crate::view::ServiceView;

/// Lifecycle state of a managed instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Created,
    Logged,
    Contextualized,
    Parameterized,
    Composed,
    Initialized,
    Started,
    Suspended,
    Stopped,
    Disposed,
    Failed,
}

impl LifecycleState {
    /// Fully driven and not yet torn down
    pub fn is_active(self) -> bool {
        matches!(
            self,
            LifecycleState::Initialized | LifecycleState::Started | LifecycleState::Suspended
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LifecycleState::Created => "created",
            LifecycleState::Logged => "logged",
            LifecycleState::Contextualized => "contextualized",
            LifecycleState::Parameterized => "parameterized",
            LifecycleState::Composed => "composed",
            LifecycleState::Initialized => "initialized",
            LifecycleState::Started => "started",
            LifecycleState::Suspended => "suspended",
            LifecycleState::Stopped => "stopped",
            LifecycleState::Disposed => "disposed",
            LifecycleState::Failed => "failed",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A lifecycle stage; the tag carried by stage errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    EnableLogging,
    Contextualize,
    Parameterize,
    Configure,
    Service,
    Initialize,
    Start,
    Suspend,
    Resume,
    Stop,
    Dispose,
}

impl Stage {
    /// Stages run by [`LifecycleDriver::drive`], in order
    pub const DRIVE_ORDER: [Stage; 7] = [
        Stage::EnableLogging,
        Stage::Contextualize,
        Stage::Parameterize,
        Stage::Configure,
        Stage::Service,
        Stage::Initialize,
        Stage::Start,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Stage::EnableLogging => "enable-logging",
            Stage::Contextualize => "contextualize",
            Stage::Parameterize => "parameterize",
            Stage::Configure => "configure",
            Stage::Service => "service",
            Stage::Initialize => "initialize",
            Stage::Start => "start",
            Stage::Suspend => "suspend",
            Stage::Resume => "resume",
            Stage::Stop => "stop",
            Stage::Dispose => "dispose",
        }
    }

    /// Capability a component must declare for this stage to run
    pub fn capability(self) -> Capabilities {
        match self {
            Stage::EnableLogging => Capabilities::LOGGABLE,
            Stage::Contextualize => Capabilities::CONTEXTUALIZABLE,
            Stage::Parameterize => Capabilities::PARAMETERIZABLE,
            Stage::Configure => Capabilities::CONFIGURABLE,
            Stage::Service => Capabilities::SERVICEABLE,
            Stage::Initialize => Capabilities::INITIALIZABLE,
            Stage::Start | Stage::Stop => Capabilities::STARTABLE,
            Stage::Suspend | Stage::Resume => Capabilities::SUSPENDABLE,
            Stage::Dispose => Capabilities::DISPOSABLE,
        }
    }

    /// Stage that releases what this one acquired
    pub fn inverse(self) -> Option<Stage> {
        match self {
            Stage::Start => Some(Stage::Stop),
            Stage::Suspend => Some(Stage::Resume),
            _ => None,
        }
    }

    fn reached_state(self) -> LifecycleState {
        match self {
            Stage::EnableLogging => LifecycleState::Logged,
            Stage::Contextualize => LifecycleState::Contextualized,
            Stage::Parameterize | Stage::Configure => LifecycleState::Parameterized,
            Stage::Service => LifecycleState::Composed,
            Stage::Initialize => LifecycleState::Initialized,
            Stage::Start | Stage::Resume => LifecycleState::Started,
            Stage::Suspend => LifecycleState::Suspended,
            Stage::Stop => LifecycleState::Stopped,
            Stage::Dispose => LifecycleState::Disposed,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A constructed instance together with its lifecycle state
pub struct ManagedComponent {
    id: u64,
    role: Role,
    scope: Scope,
    capabilities: Capabilities,
    component: Arc<dyn Component>,
    any: Arc<dyn Any + Send + Sync>,
    state: Mutex<LifecycleState>,
}

impl ManagedComponent {
    /// Wrap an instance for driving outside a registry
    pub fn new<T: Component>(id: u64, role: impl Into<Role>, scope: Scope, instance: Arc<T>) -> Self {
        Self::from_erased(
            id,
            role.into(),
            scope,
            T::capabilities(),
            ErasedInstance {
                component: instance.clone() as Arc<dyn Component>,
                any: instance as Arc<dyn Any + Send + Sync>,
            },
        )
    }

    pub(crate) fn from_erased(
        id: u64,
        role: Role,
        scope: Scope,
        capabilities: Capabilities,
        instance: ErasedInstance,
    ) -> Self {
        Self {
            id,
            role,
            scope,
            capabilities,
            component: instance.component,
            any: instance.any,
            state: Mutex::new(LifecycleState::Created),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
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

    /// Snapshot of the current state
    pub fn state(&self) -> LifecycleState {
        *self.state.lock()
    }

    /// Typed access to the instance
    pub fn downcast<T: Component>(&self) -> Option<Arc<T>> {
        self.any.clone().downcast::<T>().ok()
    }

    fn invoke(&self, stage: Stage) -> StageResult {
        match stage {
            Stage::Initialize => self.component.initialize(),
            Stage::Start => self.component.start(),
            Stage::Suspend => self.component.suspend(),
            Stage::Resume => self.component.resume(),
            Stage::Stop => self.component.stop(),
            Stage::Dispose => self.component.dispose(),
            // stages that need inputs are invoked by the driver directly
            Stage::EnableLogging
            | Stage::Contextualize
            | Stage::Parameterize
            | Stage::Configure
            | Stage::Service => Ok(()),
        }
    }
}

impl fmt::Debug for ManagedComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedComponent")
            .field("id", &self.id)
            .field("role", &self.role)
            .field("scope", &self.scope)
            .field("capabilities", &self.capabilities)
            .field("state", &self.state())
            .finish()
    }
}

/// What the driver hands to a component's input-taking stages
pub struct DriveInputs {
    pub logger: Logger,
    pub context: Context,
    pub parameters: Parameters,
    pub configuration: Configuration,
    pub services: ServiceView,
}

impl DriveInputs {
    /// Inputs for driving `role` outside a container: empty data, no dependencies
    pub fn detached(role: &Role) -> Self {
        Self {
            logger: Logger::root(role.as_str(), LogLevel::Info),
            context: Context::new().with(crate::context::ROLE_KEY, serde_json::json!(role.as_str())),
            parameters: Parameters::new(),
            configuration: Configuration::new(role.as_str()),
            services: ServiceView::detached(role.clone()),
        }
    }
}

/// Drives managed components through their lifecycle
#[derive(Debug, Clone, Copy, Default)]
pub struct LifecycleDriver;

impl LifecycleDriver {
    pub fn new() -> Self {
        Self
    }

    /// Run every declared stage from logging through start.
    ///
    /// `cancel` is checked before every stage after the first; a stage that
    /// has begun always runs to completion.
    pub fn drive(
        &self,
        managed: &ManagedComponent,
        inputs: DriveInputs,
        cancel: &AtomicBool,
    ) -> ContainerResult<()> {
        let mut state = managed.state.lock();
        match *state {
            LifecycleState::Created => {}
            LifecycleState::Disposed | LifecycleState::Failed => {
                return Err(ContainerError::DisposedComponent {
                    role: managed.role.clone(),
                });
            }
            other => {
                return Err(ContainerError::DoubleInitialization {
                    role: managed.role.clone(),
                    state: other,
                });
            }
        }

        let DriveInputs {
            logger,
            context,
            mut parameters,
            configuration,
            services,
        } = inputs;
        parameters.make_read_only();

        let capabilities = managed.capabilities;
        let mut completed: Vec<Stage> = Vec::new();

        for stage in Stage::DRIVE_ORDER {
            if !capabilities.contains(stage.capability()) {
                continue;
            }

            if !completed.is_empty() && cancel.load(Ordering::SeqCst) {
                *state = LifecycleState::Failed;
                let unwind_errors = self.unwind(managed, &completed);
                *state = LifecycleState::Disposed;
                for message in &unwind_errors {
                    debug!("Unwind of '{}' reported: {}", managed.role, message);
                }
                return Err(ContainerError::DriveCancelled {
                    role: managed.role.clone(),
                    stage,
                });
            }

            debug!("Driving '{}' through {}", managed.role, stage);
            let result = match stage {
                Stage::EnableLogging => managed.component.enable_logging(logger.clone()),
                Stage::Contextualize => managed.component.contextualize(&context),
                Stage::Parameterize => managed.component.parameterize(&parameters),
                Stage::Configure => managed.component.configure(&configuration),
                Stage::Service => managed.component.service(services.clone()),
                other => managed.invoke(other),
            };

            match result {
                Ok(()) => {
                    completed.push(stage);
                    *state = stage.reached_state();
                }
                Err(source) => {
                    *state = LifecycleState::Failed;
                    let unwind_errors = self.unwind(managed, &completed);
                    *state = LifecycleState::Disposed;
                    return Err(stage_error(&managed.role, stage, source, unwind_errors));
                }
            }
        }

        *state = if capabilities.contains(Capabilities::STARTABLE) {
            LifecycleState::Started
        } else {
            LifecycleState::Initialized
        };
        debug!("Component '{}' is {}", managed.role, *state);
        Ok(())
    }

    /// Pause an active component; it keeps its state and can be resumed
    pub fn suspend(&self, managed: &ManagedComponent) -> ContainerResult<()> {
        let mut state = managed.state.lock();
        self.check_not_disposed(managed, *state)?;
        self.check_capability(managed, Stage::Suspend)?;

        match *state {
            LifecycleState::Initialized | LifecycleState::Started => {}
            other => {
                return Err(ContainerError::InvalidStateTransition {
                    role: managed.role.clone(),
                    stage: Stage::Suspend,
                    state: other,
                });
            }
        }

        managed
            .invoke(Stage::Suspend)
            .map_err(|source| stage_error(&managed.role, Stage::Suspend, source, Vec::new()))?;
        *state = LifecycleState::Suspended;
        debug!("Component '{}' suspended", managed.role);
        Ok(())
    }

    /// Resume a suspended component
    pub fn resume(&self, managed: &ManagedComponent) -> ContainerResult<()> {
        let mut state = managed.state.lock();
        self.check_not_disposed(managed, *state)?;
        self.check_capability(managed, Stage::Resume)?;

        if *state != LifecycleState::Suspended {
            return Err(ContainerError::InvalidStateTransition {
                role: managed.role.clone(),
                stage: Stage::Resume,
                state: *state,
            });
        }

        managed
            .invoke(Stage::Resume)
            .map_err(|source| stage_error(&managed.role, Stage::Resume, source, Vec::new()))?;
        *state = if managed.capabilities.contains(Capabilities::STARTABLE) {
            LifecycleState::Started
        } else {
            LifecycleState::Initialized
        };
        debug!("Component '{}' resumed", managed.role);
        Ok(())
    }

    /// Stop a started or suspended component without disposing it
    pub fn stop(&self, managed: &ManagedComponent) -> ContainerResult<()> {
        let mut state = managed.state.lock();
        self.check_not_disposed(managed, *state)?;
        self.check_capability(managed, Stage::Stop)?;

        match *state {
            LifecycleState::Started | LifecycleState::Suspended => {}
            other => {
                return Err(ContainerError::InvalidStateTransition {
                    role: managed.role.clone(),
                    stage: Stage::Stop,
                    state: other,
                });
            }
        }

        managed
            .invoke(Stage::Stop)
            .map_err(|source| stage_error(&managed.role, Stage::Stop, source, Vec::new()))?;
        *state = LifecycleState::Stopped;
        Ok(())
    }

    /// Terminal teardown: stop if still running, then dispose.
    ///
    /// The instance ends `Disposed` even when a stage fails; the first failure
    /// is reported and later ones are attached as unwind errors.
    pub fn shutdown(&self, managed: &ManagedComponent) -> ContainerResult<()> {
        let mut state = managed.state.lock();
        self.check_not_disposed(managed, *state)?;

        let capabilities = managed.capabilities;
        let mut failure: Option<(Stage, ComponentError)> = None;
        let mut secondary: Vec<String> = Vec::new();

        let running = matches!(*state, LifecycleState::Started | LifecycleState::Suspended);
        if running && capabilities.contains(Capabilities::STARTABLE) {
            match managed.invoke(Stage::Stop) {
                Ok(()) => *state = LifecycleState::Stopped,
                Err(err) => failure = Some((Stage::Stop, err)),
            }
        }

        // never driven: nothing was acquired, nothing to dispose
        let driven = *state != LifecycleState::Created;
        if driven && capabilities.contains(Capabilities::DISPOSABLE) {
            if let Err(err) = managed.invoke(Stage::Dispose) {
                match failure {
                    None => failure = Some((Stage::Dispose, err)),
                    Some(_) => secondary.push(format!("{}: {}", Stage::Dispose, format_error(&*err))),
                }
            }
        }

        *state = LifecycleState::Disposed;
        debug!("Component '{}' disposed", managed.role);

        match failure {
            Some((stage, source)) => Err(stage_error(&managed.role, stage, source, secondary)),
            None => Ok(()),
        }
    }

    /// Invoke inverses of completed stages, newest first, collecting failures
    fn unwind(&self, managed: &ManagedComponent, completed: &[Stage]) -> Vec<String> {
        let mut errors = Vec::new();
        for inverse in completed.iter().rev().filter_map(|stage| stage.inverse()) {
            debug!("Unwinding '{}' through {}", managed.role, inverse);
            if let Err(err) = managed.invoke(inverse) {
                errors.push(format!("{}: {}", inverse, format_error(&*err)));
            }
        }
        errors
    }

    fn check_not_disposed(&self, managed: &ManagedComponent, state: LifecycleState) -> ContainerResult<()> {
        if matches!(state, LifecycleState::Disposed | LifecycleState::Failed) {
            return Err(ContainerError::DisposedComponent {
                role: managed.role.clone(),
            });
        }
        Ok(())
    }

    fn check_capability(&self, managed: &ManagedComponent, stage: Stage) -> ContainerResult<()> {
        if !managed.capabilities.contains(stage.capability()) {
            return Err(ContainerError::UnsupportedCapability {
                role: managed.role.clone(),
                stage,
            });
        }
        Ok(())
    }
}

/// Tag a component failure with its stage; dependency cycles pass through untouched
fn stage_error(role: &Role, stage: Stage, source: ComponentError, unwind_errors: Vec<String>) -> ContainerError {
    match ContainerError::from_component(source) {
        Ok(err) if err.is_circular() => err,
        Ok(err) => ContainerError::LifecycleStage {
            role: role.clone(),
            stage,
            source: Box::new(err),
            unwind_errors,
        },
        Err(source) => ContainerError::LifecycleStage {
            role: role.clone(),
            stage,
            source,
            unwind_errors,
        },
    }
}
