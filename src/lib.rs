//! Shared fixtures for the cross-crate scenarios under `tests/`

use std::fmt;
use std::sync::Arc;

use anyhow::anyhow;
use keystone_di::{
    Capabilities, Component, Context, Parameters, Registration, ServiceView, Stage, StageResult,
};
use parking_lot::Mutex;

/// Ordered record of `role:stage` events, shared between recorders
#[derive(Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, event: impl Into<String>) {
        self.0.lock().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    /// Stage names recorded for `role`, in order
    pub fn stages_of(&self, role: &str) -> Vec<String> {
        let prefix = format!("{}:", role);
        self.events()
            .into_iter()
            .filter_map(|event| event.strip_prefix(&prefix).map(str::to_string))
            .collect()
    }

    /// Roles that recorded `stage`, in order
    pub fn roles_at(&self, stage: Stage) -> Vec<String> {
        let suffix = format!(":{}", stage);
        self.events()
            .into_iter()
            .filter_map(|event| event.strip_suffix(&suffix).map(str::to_string))
            .collect()
    }

    pub fn contains(&self, event: &str) -> bool {
        self.0.lock().iter().any(|e| e == event)
    }
}

impl fmt::Debug for EventLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.events()).finish()
    }
}

/// Component that records every stage it goes through
pub struct Recorder {
    role: String,
    log: EventLog,
    fail_on: Option<Stage>,
    lookups: Vec<String>,
    seen_context: Mutex<Option<Context>>,
    seen_parameters: Mutex<Option<Parameters>>,
}

impl Recorder {
    pub fn new(role: impl Into<String>, log: EventLog) -> Self {
        Self {
            role: role.into(),
            log,
            fail_on: None,
            lookups: Vec::new(),
            seen_context: Mutex::new(None),
            seen_parameters: Mutex::new(None),
        }
    }

    /// Fail when asked to run `stage`
    pub fn failing_on(mut self, stage: Stage) -> Self {
        self.fail_on = Some(stage);
        self
    }

    /// Look up `role` through the service view during the service stage
    pub fn looking_up(mut self, role: impl Into<String>) -> Self {
        self.lookups.push(role.into());
        self
    }

    pub fn seen_context(&self) -> Option<Context> {
        self.seen_context.lock().clone()
    }

    pub fn seen_parameters(&self) -> Option<Parameters> {
        self.seen_parameters.lock().clone()
    }

    fn step(&self, stage: Stage) -> StageResult {
        self.log.record(format!("{}:{}", self.role, stage));
        if self.fail_on == Some(stage) {
            return Err(anyhow!("{} refused to {}", self.role, stage).into());
        }
        Ok(())
    }
}

impl Component for Recorder {
    fn capabilities() -> Capabilities {
        Capabilities::full_lifecycle()
    }

    fn enable_logging(&self, _logger: keystone_common::Logger) -> StageResult {
        self.step(Stage::EnableLogging)
    }

    fn contextualize(&self, context: &Context) -> StageResult {
        *self.seen_context.lock() = Some(context.clone());
        self.step(Stage::Contextualize)
    }

    fn parameterize(&self, parameters: &Parameters) -> StageResult {
        *self.seen_parameters.lock() = Some(parameters.clone());
        self.step(Stage::Parameterize)
    }

    fn service(&self, services: ServiceView) -> StageResult {
        for role in &self.lookups {
            services.lookup(role.as_str())?;
        }
        self.step(Stage::Service)
    }

    fn initialize(&self) -> StageResult {
        self.step(Stage::Initialize)
    }

    fn start(&self) -> StageResult {
        self.step(Stage::Start)
    }

    fn suspend(&self) -> StageResult {
        self.step(Stage::Suspend)
    }

    fn resume(&self) -> StageResult {
        self.step(Stage::Resume)
    }

    fn stop(&self) -> StageResult {
        self.step(Stage::Stop)
    }

    fn dispose(&self) -> StageResult {
        self.step(Stage::Dispose)
    }
}

/// Singleton recorder registration for `role` that looks up each of `dependencies`
pub fn recorder(role: &str, log: &EventLog, dependencies: &[&str]) -> Registration {
    let name = role.to_string();
    let log = log.clone();
    let lookups: Vec<String> = dependencies.iter().map(|d| d.to_string()).collect();

    let mut registration = Registration::singleton(role, move |_| {
        let recorder = lookups
            .iter()
            .fold(Recorder::new(name.clone(), log.clone()), |recorder, dep| recorder.looking_up(dep.clone()));
        Ok(Arc::new(recorder))
    });
    for dependency in dependencies {
        registration = registration.depends_on(*dependency);
    }
    registration
}
