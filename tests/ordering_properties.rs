//! Teardown ordering over arbitrary dependency graphs

use keystone_di::*;
use keystone_integration_tests::{recorder, EventLog};
use proptest::prelude::*;

const MAX_NODES: usize = 8;

fn role(index: usize) -> String {
    format!("n{}", index)
}

proptest! {
    /// In any acyclic graph, a dependent is disposed before each of its dependencies
    #[test]
    fn test_dependents_dispose_before_dependencies(
        nodes in 2usize..=MAX_NODES,
        edges in prop::collection::vec(prop::collection::vec(any::<bool>(), MAX_NODES), MAX_NODES),
        lookups in prop::collection::vec(0usize..MAX_NODES, 1..MAX_NODES),
    ) {
        let log = EventLog::new();
        let container = Container::with_defaults();

        // edges only point to higher indices, so the graph is acyclic
        let mut dependencies: Vec<Vec<String>> = Vec::new();
        for from in 0..nodes {
            let deps: Vec<String> = ((from + 1)..nodes).filter(|&to| edges[from][to]).map(role).collect();
            let deps_ref: Vec<&str> = deps.iter().map(String::as_str).collect();
            container.register(recorder(&role(from), &log, &deps_ref)).unwrap();
            dependencies.push(deps);
        }
        prop_assert!(container.validate().is_empty());

        for index in lookups {
            container.lookup(role(index % nodes)).unwrap();
        }

        let report = container.stop().unwrap();
        let disposed: Vec<String> = log.roles_at(Stage::Dispose);
        prop_assert_eq!(disposed.len(), report.disposed.len());

        let position = |name: &str| disposed.iter().position(|r| r == name);
        for (from, deps) in dependencies.iter().enumerate() {
            let Some(dependent_at) = position(&role(from)) else { continue };
            for dep in deps {
                let dependency_at = position(dep);
                prop_assert!(dependency_at.is_some(), "{} was active but {} was not", role(from), dep);
                prop_assert!(dependent_at < dependency_at.unwrap_or(usize::MAX));
            }
        }
    }
}
