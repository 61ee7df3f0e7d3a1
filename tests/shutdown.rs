//! Teardown: ordering, failures, timeouts and release

use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use keystone_di::*;
use keystone_integration_tests::{recorder, EventLog, Recorder};
use parking_lot::Mutex;

/// Blocks in `initialize` long enough for a stop to time out
struct Slow {
    entered: Mutex<Option<mpsc::Sender<()>>>,
}

impl Component for Slow {
    fn capabilities() -> Capabilities {
        Capabilities::INITIALIZABLE | Capabilities::STARTABLE | Capabilities::DISPOSABLE
    }

    fn initialize(&self) -> StageResult {
        if let Some(entered) = self.entered.lock().take() {
            entered.send(())?;
        }
        thread::sleep(Duration::from_millis(300));
        Ok(())
    }
}

#[test]
fn test_timeout_abandons_remaining_disposals() {
    let log = EventLog::new();
    let config = ContainerConfig::new("bounded").with_shutdown_timeout(Duration::from_millis(50));
    let container = Arc::new(Container::new(config).unwrap());
    container.register(recorder("fast", &log, &[])).unwrap();
    container.lookup("fast").unwrap();

    let (entered_tx, entered_rx) = mpsc::channel();
    let entered = Mutex::new(Some(entered_tx));
    let slow = Arc::new(Slow { entered });
    container.register_instance("slow", slow).unwrap();

    let looker = {
        let container = container.clone();
        thread::spawn(move || container.lookup("slow"))
    };
    entered_rx.recv().unwrap();

    let err = container.stop().unwrap_err();
    match err {
        ContainerError::Teardown { report } => {
            assert_eq!(report.abandoned, vec![Role::from("fast")]);
            assert!(report.disposed.is_empty());
        }
        other => panic!("expected teardown error, got {other}"),
    }
    assert!(!log.contains("fast:dispose"));

    // the in-flight drive notices the stop before its next stage
    let outcome = looker.join().unwrap();
    assert!(matches!(
        outcome,
        Err(ContainerError::DriveCancelled {
            stage: Stage::Start,
            ..
        })
    ));
}

#[test]
fn test_dispose_failure_is_reported_and_others_still_disposed() {
    let log = EventLog::new();
    let container = Container::with_defaults();
    let failing_log = log.clone();
    container
        .register_singleton("brittle", move |_| {
            Ok(Arc::new(
                Recorder::new("brittle", failing_log.clone()).failing_on(Stage::Dispose),
            ))
        })
        .unwrap();
    container.register(recorder("sturdy", &log, &[])).unwrap();

    let brittle = container.lookup("brittle").unwrap();
    container.lookup("sturdy").unwrap();

    let err = container.stop().unwrap_err();
    let ContainerError::Teardown { report } = err else {
        panic!("expected teardown error");
    };
    assert_eq!(report.disposed, vec![Role::from("sturdy")]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0.as_str(), "brittle");
    assert!(report.failed[0].1.contains("brittle refused to dispose"));
    assert_eq!(brittle.state(), LifecycleState::Disposed);

    // second stop has nothing left to do
    assert!(container.stop().unwrap().is_clean());
}

#[test]
fn test_release_per_lookup_instance() {
    let log = EventLog::new();
    let container = Container::with_defaults();
    let recorder_log = log.clone();
    container
        .register_per_lookup("session", move |_| Ok(Arc::new(Recorder::new("session", recorder_log.clone()))))
        .unwrap();

    let first = container.lookup("session").unwrap();
    let second = container.lookup("session").unwrap();
    assert_ne!(first.id(), second.id());

    container.release(&first).unwrap();
    assert_eq!(first.state(), LifecycleState::Disposed);
    assert_eq!(second.state(), LifecycleState::Started);
    assert!(matches!(
        container.release(&first),
        Err(ContainerError::DisposedComponent { .. })
    ));

    let report = container.stop().unwrap();
    assert_eq!(report.disposed, vec![Role::from("session")]);
    assert_eq!(log.roles_at(Stage::Dispose).len(), 2);
}

#[test]
fn test_release_singleton_is_noop() {
    let log = EventLog::new();
    let container = Container::with_defaults();
    container.register(recorder("config", &log, &[])).unwrap();

    let handle = container.lookup("config").unwrap();
    container.release(&handle).unwrap();
    container.release(&handle).unwrap();
    assert_eq!(handle.state(), LifecycleState::Started);
    assert!(!log.contains("config:dispose"));
}

#[test]
fn test_eager_start_failure_is_returned() {
    let log = EventLog::new();
    let container = Container::with_defaults();
    container
        .register(recorder("listener", &log, &["socket"]).eager())
        .unwrap();

    let err = container.start().unwrap_err();
    assert!(matches!(err, ContainerError::UnresolvedRole { ref role } if role.as_str() == "socket"));
}

#[test]
fn test_lookup_after_stop_is_rejected() {
    let log = EventLog::new();
    let container = Container::new(ContainerConfig::new("closing")).unwrap();
    container.register(recorder("late", &log, &[])).unwrap();

    container.stop().unwrap();
    let err = container.lookup("late").unwrap_err();
    assert!(matches!(err, ContainerError::ShuttingDown { ref container } if container == "closing"));
    assert!(log.events().is_empty());
}
