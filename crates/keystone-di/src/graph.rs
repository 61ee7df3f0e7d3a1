//! Declared-dependency graph
//!
//! Built from registrations only, so cycles can be found before any
//! instance is constructed. Nodes are roles by default; the registry uses
//! scope-qualified nodes so a child's shadowing binding is a distinct node
//! from the ancestor binding it hides.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::hash::Hash;

use crate::registration::Role;

/// Edges from a node to the nodes it declares
#[derive(Debug, Clone)]
pub struct DependencyGraph<N = Role> {
    dependencies: BTreeMap<N, BTreeSet<N>>,
}

impl<N> Default for DependencyGraph<N> {
    fn default() -> Self {
        Self {
            dependencies: BTreeMap::new(),
        }
    }
}

impl<N> DependencyGraph<N>
where
    N: Clone + Ord + Hash + fmt::Debug,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `dependent` declares `dependency`
    pub fn add_dependency(&mut self, dependent: N, dependency: N) {
        self.dependencies
            .entry(dependent)
            .or_default()
            .insert(dependency);
    }

    /// Make `node` part of the graph even if it declares nothing
    pub fn add_node(&mut self, node: N) {
        self.dependencies.entry(node).or_default();
    }

    pub fn dependencies_of(&self, node: &N) -> Option<&BTreeSet<N>> {
        self.dependencies.get(node)
    }

    pub fn has_dependency(&self, dependent: &N, dependency: &N) -> bool {
        self.dependencies
            .get(dependent)
            .map(|deps| deps.contains(dependency))
            .unwrap_or(false)
    }

    pub fn node_count(&self) -> usize {
        self.dependencies.len()
    }

    /// First cycle reachable from `start`, closed on its first node (`a -> b -> a`)
    pub fn find_cycle_from(&self, start: &N) -> Option<Vec<N>> {
        let mut visited = HashSet::new();
        let mut path = Vec::new();
        self.dfs_first_cycle(start, &mut visited, &mut path)
    }

    /// Every distinct cycle in the graph, each closed on its first node
    pub fn find_cycles(&self) -> Vec<Vec<N>> {
        let mut cycles = Vec::new();
        let mut visited = HashSet::new();
        let mut on_path = HashSet::new();
        let mut path = Vec::new();

        for node in self.dependencies.keys() {
            if !visited.contains(node) {
                self.dfs_all_cycles(node, &mut visited, &mut on_path, &mut path, &mut cycles);
            }
        }

        cycles
    }

    fn dfs_first_cycle(
        &self,
        node: &N,
        visited: &mut HashSet<N>,
        path: &mut Vec<N>,
    ) -> Option<Vec<N>> {
        if let Some(position) = path.iter().position(|r| r == node) {
            let mut cycle = path[position..].to_vec();
            cycle.push(node.clone());
            return Some(cycle);
        }
        if !visited.insert(node.clone()) {
            return None;
        }

        path.push(node.clone());
        if let Some(deps) = self.dependencies.get(node) {
            for neighbor in deps {
                if let Some(cycle) = self.dfs_first_cycle(neighbor, visited, path) {
                    return Some(cycle);
                }
            }
        }
        path.pop();
        None
    }

    fn dfs_all_cycles(
        &self,
        node: &N,
        visited: &mut HashSet<N>,
        on_path: &mut HashSet<N>,
        path: &mut Vec<N>,
        cycles: &mut Vec<Vec<N>>,
    ) {
        visited.insert(node.clone());
        on_path.insert(node.clone());
        path.push(node.clone());

        if let Some(deps) = self.dependencies.get(node) {
            for neighbor in deps {
                if !visited.contains(neighbor) {
                    self.dfs_all_cycles(neighbor, visited, on_path, path, cycles);
                } else if on_path.contains(neighbor) {
                    if let Some(start) = path.iter().position(|r| r == neighbor) {
                        let mut cycle = path[start..].to_vec();
                        cycle.push(neighbor.clone());
                        cycles.push(cycle);
                    }
                }
            }
        }

        on_path.remove(node);
        path.pop();
    }
}
