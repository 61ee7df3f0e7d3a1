//! Property-based tests for ordering, cycles and instance tracking

use proptest::prelude::*;
use keystone_di::*;
use parking_lot::Mutex;
use std::sync::Arc;

/// Records its role on every stage that matters for ordering
struct Link {
    role: String,
    events: Arc<Mutex<Vec<String>>>,
}

impl Component for Link {
    fn capabilities() -> Capabilities {
        Capabilities::STARTABLE | Capabilities::DISPOSABLE
    }

    fn start(&self) -> StageResult {
        self.events.lock().push(format!("start:{}", self.role));
        Ok(())
    }

    fn dispose(&self) -> StageResult {
        self.events.lock().push(format!("dispose:{}", self.role));
        Ok(())
    }
}

fn link_role(index: usize) -> String {
    format!("link-{}", index)
}

/// Chain `link-0 -> link-1 -> ... -> link-(len - 1)`, each resolving the next in its factory
fn register_chain(container: &Container, len: usize, events: &Arc<Mutex<Vec<String>>>) {
    for index in 0..len {
        let role = link_role(index);
        let next = (index + 1 < len).then(|| link_role(index + 1));
        let events = events.clone();
        let mut registration = Registration::singleton(role.clone(), move |resolver| {
            if let Some(next) = &next {
                resolver.lookup(next.as_str())?;
            }
            Ok(Arc::new(Link {
                role: role.clone(),
                events: events.clone(),
            }))
        });
        if index + 1 < len {
            registration = registration.depends_on(link_role(index + 1));
        }
        container.register(registration).unwrap();
    }
}

proptest! {
    /// Teardown order is exactly the reverse of activation order
    #[test]
    fn test_disposal_reverses_activation(len in 1usize..8, entry in 0usize..8) {
        let entry = entry % len;
        let events = Arc::new(Mutex::new(Vec::new()));
        let container = Container::with_defaults();
        register_chain(&container, len, &events);

        container.lookup(link_role(entry)).unwrap();
        let activated = container.activation_order();
        prop_assert_eq!(activated.len(), len - entry);

        let report = container.stop().unwrap();
        let mut expected = activated.clone();
        expected.reverse();
        prop_assert_eq!(report.disposed, expected);

        let events = events.lock().clone();
        let starts: Vec<&String> = events.iter().filter(|e| e.starts_with("start:")).collect();
        let disposals: Vec<&String> = events.iter().filter(|e| e.starts_with("dispose:")).collect();
        prop_assert_eq!(starts.len(), disposals.len());
        for (start, dispose) in starts.iter().zip(disposals.iter().rev()) {
            prop_assert_eq!(&start["start:".len()..], &dispose["dispose:".len()..]);
        }
    }
}

proptest! {
    /// Any declared cycle of length two or more is reported, from any member, with no construction
    #[test]
    fn test_declared_cycles_are_detected(len in 2usize..7, entry in 0usize..7) {
        let entry = entry % len;
        let constructed = Arc::new(Mutex::new(0usize));
        let container = Container::with_defaults();

        for index in 0..len {
            let counter = constructed.clone();
            let registration = Registration::singleton(format!("node-{}", index), move |_| {
                *counter.lock() += 1;
                Ok(Arc::new(Link { role: String::new(), events: Arc::new(Mutex::new(Vec::new())) }))
            })
            .depends_on(format!("node-{}", (index + 1) % len));
            container.register(registration).unwrap();
        }

        let err = container.lookup(format!("node-{}", entry)).unwrap_err();
        match err {
            ContainerError::CircularDependency { chain } => {
                prop_assert_eq!(chain.len(), len + 1);
                prop_assert_eq!(chain.first(), chain.last());
                prop_assert_eq!(chain[0].as_str(), format!("node-{}", entry));
            }
            other => prop_assert!(false, "expected a cycle, got {}", other),
        }
        prop_assert_eq!(*constructed.lock(), 0);
        prop_assert_eq!(container.validate().len(), 1);
    }
}

proptest! {
    /// Every per-lookup instance is distinct and tracked until released
    #[test]
    fn test_per_lookup_tracking(count in 1usize..20, released in 0usize..20) {
        let released = released.min(count);
        let container = Container::with_defaults();
        container
            .register_per_lookup("scratch", |_| {
                Ok(Arc::new(Link { role: "scratch".to_string(), events: Arc::new(Mutex::new(Vec::new())) }))
            })
            .unwrap();

        let handles: Vec<ComponentHandle> = (0..count).map(|_| container.lookup("scratch").unwrap()).collect();
        let mut ids: Vec<u64> = handles.iter().map(ComponentHandle::id).collect();
        ids.sort_unstable();
        ids.dedup();
        prop_assert_eq!(ids.len(), count);

        for handle in handles.iter().take(released) {
            container.release(handle).unwrap();
        }
        prop_assert_eq!(container.stats().tracked_instances, count - released);

        let report = container.stop().unwrap();
        prop_assert_eq!(report.disposed.len(), count - released);
        prop_assert!(handles.iter().all(|h| h.state() == LifecycleState::Disposed));
    }
}

proptest! {
    /// Integer parameters accept decimal and prefixed forms alike
    #[test]
    fn test_integer_parameter_forms(value in 0i64..1_000_000) {
        let parameters = Parameters::new()
            .with("dec", value.to_string())
            .with("hex", format!("0x{:x}", value))
            .with("bin", format!("0b{:b}", value));

        prop_assert_eq!(parameters.get_as_integer("dec").unwrap(), value);
        prop_assert_eq!(parameters.get_as_integer("hex").unwrap(), value);
        prop_assert_eq!(parameters.get_as_integer("bin").unwrap(), value);
    }
}
