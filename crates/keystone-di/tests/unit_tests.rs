//! Unit tests for registration, resolution and the service view
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use keystone_di::*;
use parking_lot::Mutex;

struct Plain;
impl Component for Plain {}

#[derive(Default)]
struct Settings {
    port: Mutex<Option<i64>>,
    host: Mutex<Option<String>>,
}

impl Component for Settings {
    fn capabilities() -> Capabilities {
        Capabilities::CONFIGURABLE
    }

    fn configure(&self, configuration: &Configuration) -> StageResult {
        let listener = configuration.require_child("listener")?;
        *self.port.lock() = Some(listener.attribute_as_integer("port")?);
        *self.host.lock() = Some(listener.value_or("localhost").to_string());
        Ok(())
    }
}

struct Both;

impl Component for Both {
    fn capabilities() -> Capabilities {
        Capabilities::PARAMETERIZABLE | Capabilities::CONFIGURABLE
    }
}

/// Keeps its service view and looks things up later
#[derive(Default)]
struct Holder {
    view: Mutex<Option<ServiceView>>,
}

impl Component for Holder {
    fn capabilities() -> Capabilities {
        Capabilities::SERVICEABLE
    }

    fn service(&self, services: ServiceView) -> StageResult {
        *self.view.lock() = Some(services);
        Ok(())
    }
}

#[test]
fn test_register_and_lookup_singleton() {
    let container = Container::with_defaults();
    container
        .register_singleton("plain", |_| Ok(Arc::new(Plain)))
        .unwrap();

    let first = container.lookup_as::<Plain>("plain").unwrap();
    let second = container.lookup_as::<Plain>("plain").unwrap();
    assert!(Arc::ptr_eq(&first, &second));
}

#[test]
fn test_register_per_lookup() {
    let container = Container::with_defaults();
    container
        .register_per_lookup("plain", |_| Ok(Arc::new(Plain)))
        .unwrap();

    let first = container.lookup_as::<Plain>("plain").unwrap();
    let second = container.lookup_as::<Plain>("plain").unwrap();
    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(container.stats().tracked_instances, 2);
}

#[test]
fn test_role_not_registered() {
    let container = Container::with_defaults();
    let result = container.lookup("nothing");
    assert!(matches!(result, Err(ContainerError::UnresolvedRole { .. })));
    assert_eq!(container.stats().failed_lookups, 1);
}

#[test]
fn test_role_already_registered() {
    let container = Container::with_defaults();
    container
        .register_singleton("plain", |_| Ok(Arc::new(Plain)))
        .unwrap();

    let result = container.register_singleton("plain", |_| Ok(Arc::new(Plain)));
    assert!(matches!(result, Err(ContainerError::DuplicateRole { .. })));
}

#[test]
fn test_parameterize_and_configure_together_rejected() {
    let container = Container::with_defaults();
    let result = container.register_singleton("both", |_| Ok(Arc::new(Both)));
    assert!(matches!(
        result,
        Err(ContainerError::IncompatibleLifecycle { .. })
    ));
    assert_eq!(container.stats().registered_roles, 0);
}

#[test]
fn test_configure_stage_receives_configuration() {
    let container = Container::with_defaults();
    let configuration = Configuration::new("settings").with_child(
        Configuration::new("listener")
            .with_attribute("port", "8080")
            .with_value("0.0.0.0"),
    );
    container
        .register(
            Registration::singleton("settings", |_| Ok(Arc::new(Settings::default())))
                .with_configuration(configuration),
        )
        .unwrap();

    let settings = container.lookup_as::<Settings>("settings").unwrap();
    assert_eq!(*settings.port.lock(), Some(8080));
    assert_eq!(settings.host.lock().as_deref(), Some("0.0.0.0"));
}

#[test]
fn test_configure_failure_names_the_stage() {
    let container = Container::with_defaults();
    container
        .register_singleton("settings", |_| Ok(Arc::new(Settings::default())))
        .unwrap();

    let err = container.lookup("settings").err().unwrap();
    assert_eq!(err.stage(), Some(Stage::Configure));
}

#[test]
fn test_factory_error_propagates() {
    let container = Container::with_defaults();
    container
        .register_singleton("broken", |_| -> ContainerResult<Arc<Plain>> {
            Err(ContainerError::FactoryFailed {
                role: Role::from("broken"),
                source: "disk full".into(),
            })
        })
        .unwrap();

    let err = container.lookup("broken").unwrap_err();
    assert!(matches!(err, ContainerError::FactoryFailed { .. }));
    assert!(err.to_string().contains("disk full"));
}

#[test]
fn test_failed_singleton_is_retried_on_next_lookup() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = attempts.clone();
    let container = Container::with_defaults();
    container
        .register_singleton("flaky", move |_| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(ContainerError::FactoryFailed {
                    role: Role::from("flaky"),
                    source: "not yet".into(),
                });
            }
            Ok(Arc::new(Plain))
        })
        .unwrap();

    assert!(container.lookup("flaky").is_err());
    assert!(container.lookup("flaky").is_ok());
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

#[test]
fn test_service_view_outlives_service_stage() {
    let container = Container::with_defaults();
    container
        .register_per_lookup("session", |_| Ok(Arc::new(Plain)))
        .unwrap();
    container
        .register_singleton("other", |_| Ok(Arc::new(Plain)))
        .unwrap();
    container
        .register(
            Registration::singleton("holder", |_| Ok(Arc::new(Holder::default())))
                .depends_on("session"),
        )
        .unwrap();

    let holder = container.lookup_as::<Holder>("holder").unwrap();
    let view = holder.view.lock().clone().unwrap();

    assert_eq!(view.owner().as_str(), "holder");
    assert!(view.has("session"));
    assert!(!view.has("other"));

    let session = view.lookup("session").unwrap();
    assert_eq!(session.scope(), Scope::PerLookup);
    view.release(&session).unwrap();
    assert_eq!(session.state(), LifecycleState::Disposed);

    let err = view.lookup("other").unwrap_err();
    assert!(matches!(err, ContainerError::UndeclaredDependency { .. }));
}

#[test]
fn test_factory_cycle_is_detected() {
    let container = Container::with_defaults();
    container
        .register_singleton("a", |resolver| {
            resolver.lookup("b")?;
            Ok(Arc::new(Plain))
        })
        .unwrap();
    container
        .register_singleton("b", |resolver| {
            resolver.lookup("a")?;
            Ok(Arc::new(Plain))
        })
        .unwrap();

    let err = container.lookup("a").unwrap_err();
    let ContainerError::CircularDependency { chain } = err else {
        panic!("expected a cycle");
    };
    assert_eq!(chain, vec![Role::from("a"), Role::from("b"), Role::from("a")]);
}

#[test]
fn test_resolution_depth_is_capped() {
    let config = ContainerConfig::default().with_max_resolution_depth(3);
    let container = Container::new(config).unwrap();
    for level in 0..5 {
        let next = format!("level-{}", level + 1);
        container
            .register_singleton(format!("level-{}", level), move |resolver| {
                if resolver.has(next.as_str()) {
                    resolver.lookup(next.as_str())?;
                }
                Ok(Arc::new(Plain))
            })
            .unwrap();
    }

    let err = container.lookup("level-0").unwrap_err();
    assert!(matches!(
        err,
        ContainerError::ResolutionDepthExceeded { limit: 3, .. }
    ));
    assert!(container.lookup("level-2").is_ok());
}

#[test]
fn test_stats_reflect_activity() {
    let container = Container::with_defaults();
    container
        .register_singleton("plain", |_| Ok(Arc::new(Plain)))
        .unwrap();
    container.alias("old-plain", "plain").unwrap();

    container.lookup("old-plain").unwrap();
    let _ = container.lookup("missing");

    let stats = container.stats();
    assert_eq!(stats.registered_roles, 1);
    assert_eq!(stats.aliases, 1);
    assert_eq!(stats.active_singletons, 1);
    assert_eq!(stats.lookups, 2);
    assert_eq!(stats.failed_lookups, 1);

    let json = serde_json::to_value(&stats).unwrap();
    assert_eq!(json["name"], "keystone");
}

#[test]
fn test_validate_reports_missing_dependencies() {
    let container = Container::with_defaults();
    container
        .register(
            Registration::singleton("reporter", |_| Ok(Arc::new(Plain)))
                .depends_on("mailer")
                .optional_dependency("metrics"),
        )
        .unwrap();

    let problems = container.validate();
    assert_eq!(problems.len(), 1);
    assert!(matches!(
        &problems[0],
        ContainerError::UnresolvedRole { role } if role.as_str() == "mailer"
    ));
}

struct Migrator;

impl Component for Migrator {
    fn capabilities() -> Capabilities {
        Capabilities::INITIALIZABLE
    }

    fn initialize(&self) -> StageResult {
        use anyhow::Context as _;
        let _version: u32 = "v7"
            .parse()
            .context("schema version is not a number")?;
        Ok(())
    }
}

#[test]
fn test_anyhow_errors_flow_through_stages() {
    let container = Container::with_defaults();
    container
        .register_singleton("migrator", |_| Ok(Arc::new(Migrator)))
        .unwrap();

    let err = container.lookup("migrator").unwrap_err();
    assert_eq!(err.stage(), Some(Stage::Initialize));
    assert!(err.to_string().contains("schema version is not a number"));
}
