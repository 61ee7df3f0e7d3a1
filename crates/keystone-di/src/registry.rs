//! Service registry
//!
//! Maps roles to registrations within one scope, optionally chained to a
//! parent scope. Lookups search this scope, then ancestors. Singletons are
//! constructed and driven at most once, on first lookup, even when several
//! threads ask at the same time; per-lookup roles produce a fresh instance
//! every time. Every instance that completes its drive is appended to the
//! activation ledger, which teardown walks in reverse.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use keystone_common::{format_error, Logger};
use once_cell::sync::OnceCell;
use parking_lot::{Condvar, Mutex, RwLock};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::construction::{Claim, Constructions};
use crate::container::{ContainerStats, ShutdownReport};
use crate::context::{Context, CONTAINER_KEY, ROLE_KEY};
use crate::error::{ContainerError, ContainerResult};
use crate::graph::DependencyGraph;
use crate::lifecycle::{DriveInputs, LifecycleDriver, LifecycleState, ManagedComponent};
use crate::registration::{Dependency, Registration, Role, Scope};
use crate::view::{ComponentHandle, Resolver, ServiceView};

/// Longest alias chain followed before giving up
const MAX_ALIAS_HOPS: usize = 16;

struct Entry {
    id: u64,
    registration: Registration,
    instance: OnceCell<Arc<ManagedComponent>>,
}

/// Declared-dependency graph of a lineage, valid for one binding generation
struct CachedGraph {
    generation: u64,
    graph: Arc<DependencyGraph<BindingNode>>,
    missing: Vec<(Role, Role)>,
}

#[derive(Default)]
struct Ledger {
    instances: Vec<Arc<ManagedComponent>>,
    drained: bool,
}

/// A binding within a lineage: depth of the owning registry, then role
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct BindingNode {
    pub(crate) depth: usize,
    pub(crate) role: Role,
}

/// Role bindings of one scope plus the instances it owns
pub struct ServiceRegistry {
    name: String,
    depth: usize,
    parent: Option<Arc<ServiceRegistry>>,
    children: Mutex<Vec<Weak<ServiceRegistry>>>,
    stopped_with_parent: bool,
    entries: RwLock<HashMap<Role, Arc<Entry>>>,
    order: RwLock<Vec<Role>>,
    aliases: RwLock<HashMap<Role, Role>>,
    ledger: Mutex<Ledger>,
    in_flight: Mutex<usize>,
    idle: Condvar,
    closing: AtomicBool,
    next_id: Arc<AtomicU64>,
    generation: Arc<AtomicU64>,
    graph_cache: Mutex<Option<CachedGraph>>,
    constructions: Arc<Constructions>,
    lookups: AtomicU64,
    failed_lookups: AtomicU64,
    logger: Logger,
    context: Arc<Context>,
    driver: LifecycleDriver,
    max_depth: usize,
}

impl ServiceRegistry {
    /// Create a root registry
    pub fn new(name: impl Into<String>, logger: Logger, context: Context, max_depth: usize) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            depth: 0,
            parent: None,
            children: Mutex::new(Vec::new()),
            stopped_with_parent: false,
            entries: RwLock::new(HashMap::new()),
            order: RwLock::new(Vec::new()),
            aliases: RwLock::new(HashMap::new()),
            ledger: Mutex::new(Ledger::default()),
            in_flight: Mutex::new(0),
            idle: Condvar::new(),
            closing: AtomicBool::new(false),
            next_id: Arc::new(AtomicU64::new(1)),
            generation: Arc::new(AtomicU64::new(0)),
            graph_cache: Mutex::new(None),
            constructions: Arc::new(Constructions::new()),
            lookups: AtomicU64::new(0),
            failed_lookups: AtomicU64::new(0),
            logger,
            context: Arc::new(context),
            driver: LifecycleDriver::new(),
            max_depth,
        })
    }

    /// Create a nested scope whose lookups fall through to this one
    pub fn child(self: &Arc<Self>, name: &str) -> Arc<Self> {
        self.scope(name, true)
    }

    /// A child scope this one does not stop; its owner shuts it down
    pub(crate) fn nested(self: &Arc<Self>, name: &str) -> Arc<Self> {
        self.scope(name, false)
    }

    fn scope(self: &Arc<Self>, name: &str, stopped_with_parent: bool) -> Arc<Self> {
        let logger = self.logger.child(name);
        let context = Context::with_parent(self.context.clone())
            .with(CONTAINER_KEY, json!(logger.path()));

        let child = Arc::new(Self {
            name: logger.path().to_string(),
            depth: self.depth + 1,
            parent: Some(self.clone()),
            children: Mutex::new(Vec::new()),
            stopped_with_parent,
            entries: RwLock::new(HashMap::new()),
            order: RwLock::new(Vec::new()),
            aliases: RwLock::new(HashMap::new()),
            ledger: Mutex::new(Ledger::default()),
            in_flight: Mutex::new(0),
            idle: Condvar::new(),
            closing: AtomicBool::new(false),
            next_id: self.next_id.clone(),
            generation: self.generation.clone(),
            graph_cache: Mutex::new(None),
            constructions: self.constructions.clone(),
            lookups: AtomicU64::new(0),
            failed_lookups: AtomicU64::new(0),
            logger,
            context: Arc::new(context),
            driver: self.driver,
            max_depth: self.max_depth,
        });

        let mut children = self.children.lock();
        children.retain(|weak| weak.strong_count() > 0);
        children.push(Arc::downgrade(&child));
        debug!("Created child scope '{}'", child.name);
        child
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<&Arc<ServiceRegistry>> {
        self.parent.as_ref()
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    pub fn context(&self) -> &Arc<Context> {
        &self.context
    }

    pub fn is_closing(&self) -> bool {
        self.closing.load(Ordering::SeqCst)
    }

    /// Bind a role in this scope.
    ///
    /// The capability set is validated first; a failed registration leaves
    /// the registry unchanged. A child scope may shadow an ancestor's role.
    pub fn register(&self, registration: Registration) -> ContainerResult<()> {
        registration
            .capabilities
            .validate(&registration.role, registration.scope)?;

        let role = registration.role.clone();
        let mut entries = self.entries.write();
        if entries.contains_key(&role) || self.aliases.read().contains_key(&role) {
            return Err(ContainerError::DuplicateRole { role });
        }

        debug!(
            "Registered component: {} ({}, {})",
            role, registration.scope, registration.type_name
        );
        entries.insert(
            role.clone(),
            Arc::new(Entry {
                id: self.next_id.fetch_add(1, Ordering::SeqCst),
                registration,
                instance: OnceCell::new(),
            }),
        );
        self.order.write().push(role);
        self.bindings_changed();
        Ok(())
    }

    /// Make `old` resolve to `new`; a shim for renamed roles
    pub fn alias(&self, old: impl Into<Role>, new: impl Into<Role>) -> ContainerResult<()> {
        let old = old.into();
        let new = new.into();

        if self.entries.read().contains_key(&old) {
            return Err(ContainerError::DuplicateRole { role: old });
        }
        let mut aliases = self.aliases.write();
        if aliases.contains_key(&old) {
            return Err(ContainerError::DuplicateRole { role: old });
        }

        debug!("Aliased role: {} -> {}", old, new);
        aliases.insert(old, new);
        self.bindings_changed();
        Ok(())
    }

    /// Remove a binding from this scope, tearing down its singleton if active
    pub fn unregister(&self, role: impl Into<Role>) -> ContainerResult<()> {
        let role = self.canonical(&role.into());
        let entry = self
            .entries
            .write()
            .remove(&role)
            .ok_or_else(|| ContainerError::UnresolvedRole { role: role.clone() })?;
        self.order.write().retain(|r| r != &role);
        self.bindings_changed();
        debug!("Unregistered component: {}", role);

        if let Some(managed) = entry.instance.get() {
            if self.untrack(managed.id()).is_some() {
                self.driver.shutdown(managed)?;
            }
        }
        Ok(())
    }

    fn bindings_changed(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Whether `role` (or the role it aliases) is bound in this scope itself
    pub(crate) fn binds(&self, role: &Role) -> bool {
        let role = self.canonical(role);
        self.entries.read().contains_key(&role)
    }

    /// Whether `role` (or the role it aliases) is bound here or in an ancestor
    pub fn is_registered(&self, role: &Role) -> bool {
        let role = self.canonical(role);
        if self.entries.read().contains_key(&role) {
            return true;
        }
        match &self.parent {
            Some(parent) => parent.is_registered(&role),
            None => false,
        }
    }

    /// Translate aliases, this scope first, then ancestors
    pub fn canonical(&self, role: &Role) -> Role {
        let mut current = role.clone();
        for _ in 0..MAX_ALIAS_HOPS {
            match self.alias_target(&current) {
                Some(next) if next != current => current = next,
                _ => break,
            }
        }
        current
    }

    fn alias_target(&self, role: &Role) -> Option<Role> {
        if let Some(target) = self.aliases.read().get(role) {
            return Some(target.clone());
        }
        self.parent.as_ref().and_then(|parent| parent.alias_target(role))
    }

    /// Roles bound in this scope, in registration order
    pub fn roles(&self) -> Vec<Role> {
        self.order.read().clone()
    }

    /// Roles marked eager, in registration order
    pub fn eager_roles(&self) -> Vec<Role> {
        let entries = self.entries.read();
        self.order
            .read()
            .iter()
            .filter(|role| {
                entries
                    .get(*role)
                    .map(|entry| entry.registration.eager)
                    .unwrap_or(false)
            })
            .cloned()
            .collect()
    }

    /// Roles of tracked instances, in the order they finished their drive
    pub fn activation_order(&self) -> Vec<Role> {
        self.ledger
            .lock()
            .instances
            .iter()
            .map(|managed| managed.role().clone())
            .collect()
    }

    pub fn lookup(self: &Arc<Self>, role: impl Into<Role>) -> ContainerResult<ComponentHandle> {
        self.resolve(&role.into(), &[])
    }

    pub(crate) fn resolve(
        self: &Arc<Self>,
        role: &Role,
        chain: &[BindingNode],
    ) -> ContainerResult<ComponentHandle> {
        let _in_flight = self.enter();
        if self.is_closing() {
            return Err(ContainerError::ShuttingDown {
                container: self.name.clone(),
            });
        }

        self.lookups.fetch_add(1, Ordering::Relaxed);
        let result = self.resolve_in_scope(role, chain);
        if let Err(err) = &result {
            self.failed_lookups.fetch_add(1, Ordering::Relaxed);
            debug!("Lookup of '{}' in '{}' failed: {}", role, self.name, err);
        }
        result
    }

    fn resolve_in_scope(
        self: &Arc<Self>,
        role: &Role,
        chain: &[BindingNode],
    ) -> ContainerResult<ComponentHandle> {
        let role = self.canonical(role);
        let entry = self.entries.read().get(&role).cloned();
        match entry {
            Some(entry) => self.resolve_entry(&entry, chain),
            None => match &self.parent {
                Some(parent) => parent.resolve(&role, chain),
                None => Err(ContainerError::UnresolvedRole { role }),
            },
        }
    }

    fn resolve_entry(
        self: &Arc<Self>,
        entry: &Arc<Entry>,
        chain: &[BindingNode],
    ) -> ContainerResult<ComponentHandle> {
        let registration = &entry.registration;
        let role = &registration.role;

        if let Some(managed) = entry.instance.get() {
            return Ok(ComponentHandle::new(managed.clone()));
        }

        let node = BindingNode {
            depth: self.depth,
            role: role.clone(),
        };
        if let Some(position) = chain.iter().position(|link| link == &node) {
            let mut cycle: Vec<Role> = chain[position..].iter().map(|link| link.role.clone()).collect();
            cycle.push(role.clone());
            return Err(ContainerError::CircularDependency { chain: cycle });
        }
        if chain.len() >= self.max_depth {
            return Err(ContainerError::ResolutionDepthExceeded {
                role: role.clone(),
                limit: self.max_depth,
            });
        }

        self.check_required(registration)?;
        if !registration.dependencies.is_empty() {
            let (graph, _) = self.dependency_graph();
            if let Some(cycle) = graph.find_cycle_from(&node) {
                return Err(ContainerError::CircularDependency {
                    chain: cycle.into_iter().map(|link| link.role).collect(),
                });
            }
        }

        let mut next_chain = chain.to_vec();
        next_chain.push(node);

        let managed = match registration.scope {
            Scope::Singleton => self.resolve_singleton(entry, chain, next_chain)?,
            Scope::PerLookup => self.construct(registration, next_chain)?,
        };
        Ok(ComponentHandle::new(managed))
    }

    /// Construct a singleton at most once, even across threads.
    ///
    /// A thread that would wait on a construction which is itself, through
    /// other threads, waiting on this thread gets the cycle instead.
    fn resolve_singleton(
        self: &Arc<Self>,
        entry: &Arc<Entry>,
        chain: &[BindingNode],
        next_chain: Vec<BindingNode>,
    ) -> ContainerResult<Arc<ManagedComponent>> {
        let registration = &entry.registration;
        let claim = self
            .constructions
            .claim(entry.id, &registration.role, || entry.instance.get().is_some())
            .map_err(|waits| ContainerError::CircularDependency {
                chain: wait_cycle(chain, waits),
            })?;

        match claim {
            Claim::Ready => entry.instance.get().cloned().ok_or_else(|| {
                ContainerError::UnresolvedRole {
                    role: registration.role.clone(),
                }
            }),
            Claim::Owned(_claim) => {
                let managed = self.construct(registration, next_chain)?;
                Ok(entry.instance.get_or_init(|| managed).clone())
            }
        }
    }

    /// Every required dependency must be bound before anything is constructed
    fn check_required(&self, registration: &Registration) -> ContainerResult<()> {
        for dependency in registration.dependencies.iter().filter(|dep| dep.required) {
            if !self.is_registered(&dependency.role) {
                return Err(ContainerError::UnresolvedRole {
                    role: self.canonical(&dependency.role),
                });
            }
        }
        Ok(())
    }

    fn construct(
        self: &Arc<Self>,
        registration: &Registration,
        chain: Vec<BindingNode>,
    ) -> ContainerResult<Arc<ManagedComponent>> {
        let role = registration.role.clone();
        let resolver = Resolver::new(self.clone(), chain);

        debug!(
            "Constructing '{}' ({}) in '{}'",
            role, registration.scope, self.name
        );
        let instance = (registration.factory)(&resolver)?;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let managed = Arc::new(ManagedComponent::from_erased(
            id,
            role.clone(),
            registration.scope,
            registration.capabilities,
            instance,
        ));

        let inputs = DriveInputs {
            logger: self.logger.child(role.as_str()),
            context: self.component_context(registration),
            parameters: registration.parameters.clone(),
            configuration: registration.configuration.clone(),
            services: ServiceView::new(role.clone(), registration.dependencies.clone(), resolver),
        };
        self.driver.drive(&managed, inputs, &self.closing)?;

        let mut ledger = self.ledger.lock();
        if ledger.drained {
            drop(ledger);
            // teardown already walked the ledger; this instance would be missed
            if let Err(err) = self.driver.shutdown(&managed) {
                warn!("Late instance of '{}' failed to shut down: {}", role, format_error(&err));
            }
            return Err(ContainerError::ShuttingDown {
                container: self.name.clone(),
            });
        }
        ledger.instances.push(managed.clone());
        Ok(managed)
    }

    fn component_context(&self, registration: &Registration) -> Context {
        let mut context = Context::with_parent(self.context.clone())
            .with(ROLE_KEY, json!(registration.role.as_str()))
            .with(CONTAINER_KEY, json!(self.name));
        for (key, value) in &registration.context {
            context.insert(key.clone(), value.clone());
        }
        context
    }

    /// Tear down a per-lookup instance now; singletons are left alone
    pub fn release(&self, handle: &ComponentHandle) -> ContainerResult<()> {
        if handle.scope() == Scope::Singleton {
            return Ok(());
        }

        match self.untrack(handle.id()) {
            Some(managed) => {
                debug!("Releasing '{}' (instance {})", managed.role(), managed.id());
                self.driver.shutdown(&managed)
            }
            None => Err(ContainerError::DisposedComponent {
                role: handle.role().clone(),
            }),
        }
    }

    pub fn suspend(&self, handle: &ComponentHandle) -> ContainerResult<()> {
        self.driver.suspend(handle.managed())
    }

    pub fn resume(&self, handle: &ComponentHandle) -> ContainerResult<()> {
        self.driver.resume(handle.managed())
    }

    /// Remove an instance from whichever scope of this tree tracks it
    fn untrack(&self, id: u64) -> Option<Arc<ManagedComponent>> {
        self.untrack_below(id)
            .or_else(|| self.parent.as_ref().and_then(|parent| parent.untrack(id)))
    }

    /// This scope, then its live children
    fn untrack_below(&self, id: u64) -> Option<Arc<ManagedComponent>> {
        let found = {
            let mut ledger = self.ledger.lock();
            ledger
                .instances
                .iter()
                .position(|managed| managed.id() == id)
                .map(|index| ledger.instances.remove(index))
        };
        if found.is_some() {
            return found;
        }

        let children: Vec<Arc<ServiceRegistry>> = self
            .children
            .lock()
            .iter()
            .filter_map(Weak::upgrade)
            .collect();
        children.iter().find_map(|child| child.untrack_below(id))
    }

    /// Report every declared cycle and missing required dependency, constructing nothing
    pub fn validate(self: &Arc<Self>) -> Vec<ContainerError> {
        let (graph, missing) = self.dependency_graph();
        let mut problems = Vec::new();

        for cycle in graph.find_cycles() {
            problems.push(ContainerError::CircularDependency {
                chain: cycle.into_iter().map(|node| node.role).collect(),
            });
        }
        for (dependent, dependency) in missing {
            warn!("'{}' requires unregistered role '{}'", dependent, dependency);
            problems.push(ContainerError::UnresolvedRole { role: dependency });
        }

        if problems.is_empty() {
            debug!("Registry '{}' validated", self.name);
        }
        problems
    }

    /// Registries from the root down to this one; index equals depth
    fn lineage(self: &Arc<Self>) -> Vec<Arc<ServiceRegistry>> {
        let mut levels = vec![self.clone()];
        let mut current = self.parent.clone();
        while let Some(registry) = current {
            current = registry.parent.clone();
            levels.push(registry);
        }
        levels.reverse();
        levels
    }

    /// Declared-dependency graph over every binding visible from this scope,
    /// plus the required dependencies that are bound nowhere.
    ///
    /// Cached until a binding anywhere in the tree changes.
    fn dependency_graph(self: &Arc<Self>) -> (Arc<DependencyGraph<BindingNode>>, Vec<(Role, Role)>) {
        let generation = self.generation.load(Ordering::SeqCst);
        if let Some(cached) = self.graph_cache.lock().as_ref() {
            if cached.generation == generation {
                return (cached.graph.clone(), cached.missing.clone());
            }
        }

        let (graph, missing) = self.build_dependency_graph();
        let graph = Arc::new(graph);
        *self.graph_cache.lock() = Some(CachedGraph {
            generation,
            graph: graph.clone(),
            missing: missing.clone(),
        });
        (graph, missing)
    }

    fn build_dependency_graph(self: &Arc<Self>) -> (DependencyGraph<BindingNode>, Vec<(Role, Role)>) {
        let levels = self.lineage();
        let snapshots: Vec<Vec<(Role, Vec<Dependency>)>> = levels
            .iter()
            .map(|level| {
                level
                    .entries
                    .read()
                    .iter()
                    .map(|(role, entry)| (role.clone(), entry.registration.dependencies.clone()))
                    .collect()
            })
            .collect();
        let bound: Vec<HashSet<Role>> = snapshots
            .iter()
            .map(|entries| entries.iter().map(|(role, _)| role.clone()).collect())
            .collect();

        let owner_depth = |from: usize, role: &Role| (0..=from).rev().find(|&depth| bound[depth].contains(role));

        let mut graph = DependencyGraph::new();
        let mut missing = Vec::new();
        for (depth, entries) in snapshots.iter().enumerate() {
            for (role, dependencies) in entries {
                let node = BindingNode {
                    depth,
                    role: role.clone(),
                };
                graph.add_node(node.clone());
                for dependency in dependencies {
                    let target = levels[depth].canonical(&dependency.role);
                    match owner_depth(depth, &target) {
                        Some(owner) => graph.add_dependency(
                            node.clone(),
                            BindingNode {
                                depth: owner,
                                role: target,
                            },
                        ),
                        None if dependency.required => missing.push((role.clone(), target)),
                        None => {}
                    }
                }
            }
        }
        (graph, missing)
    }

    pub fn stats(&self) -> ContainerStats {
        let entries = self.entries.read();
        let active_singletons = entries
            .values()
            .filter_map(|entry| entry.instance.get())
            .filter(|managed| managed.state().is_active())
            .count();

        ContainerStats {
            name: self.name.clone(),
            registered_roles: entries.len(),
            aliases: self.aliases.read().len(),
            active_singletons,
            tracked_instances: self.ledger.lock().instances.len(),
            lookups: self.lookups.load(Ordering::Relaxed),
            failed_lookups: self.failed_lookups.load(Ordering::Relaxed),
        }
    }

    /// Stop this scope and its children.
    ///
    /// New lookups are rejected, in-flight lookups are awaited, then tracked
    /// instances are shut down newest first. With a timeout, whatever is
    /// left when it expires is abandoned. A second call returns an empty report.
    pub fn shutdown(&self, timeout: Option<Duration>) -> ShutdownReport {
        let deadline = timeout.map(|timeout| Instant::now() + timeout);
        self.shutdown_until(deadline)
    }

    fn shutdown_until(&self, deadline: Option<Instant>) -> ShutdownReport {
        let mut report = ShutdownReport::default();
        if self.closing.swap(true, Ordering::SeqCst) {
            return report;
        }
        info!("Stopping container '{}'", self.name);

        let children: Vec<Arc<ServiceRegistry>> = self
            .children
            .lock()
            .drain(..)
            .filter_map(|weak| weak.upgrade())
            .filter(|child| child.stopped_with_parent)
            .collect();
        for child in children.iter().rev() {
            report.merge(child.shutdown_until(deadline));
        }

        let mut in_flight = self.in_flight.lock();
        while *in_flight > 0 {
            match deadline {
                Some(deadline) => {
                    if self.idle.wait_until(&mut in_flight, deadline).timed_out() {
                        break;
                    }
                }
                None => self.idle.wait(&mut in_flight),
            }
        }
        let pending = *in_flight;
        drop(in_flight);
        if pending > 0 {
            warn!(
                "Container '{}' stopping with {} lookups still in flight",
                self.name, pending
            );
        }

        let instances = {
            let mut ledger = self.ledger.lock();
            ledger.drained = true;
            std::mem::take(&mut ledger.instances)
        };

        for managed in instances.into_iter().rev() {
            let role = managed.role().clone();
            if managed.state() == LifecycleState::Disposed {
                continue;
            }
            if deadline.map(|deadline| Instant::now() >= deadline).unwrap_or(false) {
                report.abandoned.push(role);
                continue;
            }
            match self.driver.shutdown(&managed) {
                Ok(()) => report.disposed.push(role),
                Err(err) => {
                    warn!("Failed to shut down '{}': {}", role, format_error(&err));
                    report.failed.push((role, format_error(&err)));
                }
            }
        }

        info!(
            "Container '{}' stopped: {} disposed, {} failed, {} abandoned",
            self.name,
            report.disposed.len(),
            report.failed.len(),
            report.abandoned.len()
        );
        report
    }

    fn enter(&self) -> InFlightGuard<'_> {
        *self.in_flight.lock() += 1;
        InFlightGuard { registry: self }
    }
}

impl fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("name", &self.name)
            .field("depth", &self.depth)
            .field("roles", &self.roles())
            .field("closing", &self.is_closing())
            .finish()
    }
}

/// Counts a lookup as in flight until dropped
struct InFlightGuard<'a> {
    registry: &'a ServiceRegistry,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let mut count = self.registry.in_flight.lock();
        *count -= 1;
        if *count == 0 {
            self.registry.idle.notify_all();
        }
    }
}

/// Cycle for a wait that would deadlock: the caller's chain from the role
/// it is constructing that closes the loop, then the roles waited through
fn wait_cycle(chain: &[BindingNode], waits: Vec<Role>) -> Vec<Role> {
    let mut cycle: Vec<Role> = match waits.last() {
        Some(closing) => match chain.iter().position(|link| &link.role == closing) {
            Some(position) => chain[position..].iter().map(|link| link.role.clone()).collect(),
            None => vec![closing.clone()],
        },
        None => Vec::new(),
    };
    cycle.extend(waits);
    cycle
}
