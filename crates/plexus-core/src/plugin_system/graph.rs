//! Dependency resolution over the registered plugin specs.
//!
//! Nodes are indices into the engine's spec list, in discovery order. An
//! edge points from a dependant to the plugin that provides one of its
//! declared dependencies.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use crate::plugin_system::dependency::{DependencyError, DependencyKind, PluginDependency};
use crate::plugin_system::spec::{PluginSpec, PluginState};

/// A resolved dependency declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    /// The declaring plugin
    pub from: usize,
    /// The providing plugin
    pub to: usize,
    pub declaration: PluginDependency,
}

impl Edge {
    pub fn kind(&self) -> DependencyKind {
        self.declaration.kind
    }

    /// Test edges force-load a plugin under test but do not order anything.
    pub fn affects_order(&self) -> bool {
        self.kind() != DependencyKind::Test
    }
}

#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    node_count: usize,
    edges: Vec<Edge>,
    discarded: HashSet<usize>,
    cyclic: BTreeSet<usize>,
    order: Vec<usize>,
    errors: Vec<(usize, DependencyError)>,
}

/// Indices of the specs that satisfy `dependency`, excluding the declaring plugin.
pub fn find_providers(specs: &[PluginSpec], dependant: usize, dependency: &PluginDependency) -> Vec<usize> {
    specs
        .iter()
        .enumerate()
        .filter(|(i, spec)| {
            *i != dependant && spec.state() != PluginState::Invalid && spec.provides(&dependency.name, &dependency.version)
        })
        .map(|(i, _)| i)
        .collect()
}

impl DependencyGraph {
    /// Matches every declaration to its provider, breaks cycles and computes
    /// the load order.
    ///
    /// Resolution failures are collected for specs still in `Read` without an
    /// error; they can be read back with [`resolution_errors`](Self::resolution_errors).
    pub fn build(specs: &[PluginSpec]) -> Self {
        let mut graph = DependencyGraph {
            node_count: specs.len(),
            ..Default::default()
        };

        for (index, spec) in specs.iter().enumerate() {
            if spec.state() == PluginState::Invalid {
                continue;
            }
            let reports_errors = spec.state() == PluginState::Read && !spec.has_error();
            for dependency in spec.dependencies() {
                let providers = find_providers(specs, index, dependency);
                match providers.as_slice() {
                    [provider] => graph.edges.push(Edge {
                        from: index,
                        to: *provider,
                        declaration: dependency.clone(),
                    }),
                    [] if dependency.is_required() => {
                        if reports_errors {
                            graph.errors.push((
                                index,
                                DependencyError::MissingPlugin {
                                    name: dependency.name.clone(),
                                    version: dependency.version.clone(),
                                },
                            ));
                        }
                    }
                    [] => log::debug!("Plugin '{}': skipping unresolved {}", spec.name(), dependency),
                    _ if dependency.is_required() => {
                        if reports_errors {
                            graph.errors.push((
                                index,
                                DependencyError::Ambiguous {
                                    name: dependency.name.clone(),
                                    version: dependency.version.clone(),
                                    candidates: providers.iter().map(|p| specs[*p].name().to_string()).collect(),
                                },
                            ));
                        }
                    }
                    _ => log::debug!(
                        "Plugin '{}': skipping {} with {} candidate providers",
                        spec.name(),
                        dependency,
                        providers.len()
                    ),
                }
            }
        }

        graph.break_cycles(specs);
        graph.order = graph.topological_order();
        graph
    }

    fn ordering_edges_from(&self, node: usize) -> impl Iterator<Item = (usize, &Edge)> + '_ {
        self.edges
            .iter()
            .enumerate()
            .filter(move |(i, e)| e.from == node && e.affects_order() && !self.discarded.contains(i))
    }

    /// Successors of `node` over ordering edges, last declaration first
    fn successors(&self, node: usize) -> Vec<usize> {
        let mut successors: Vec<usize> = self.ordering_edges_from(node).map(|(_, e)| e.to).collect();
        successors.reverse();
        successors
    }

    /// Tarjan's algorithm over the ordering edges. Members of each component
    /// are sorted by discovery index.
    fn strongly_connected(&self) -> Vec<Vec<usize>> {
        const UNVISITED: usize = usize::MAX;
        let mut index = vec![UNVISITED; self.node_count];
        let mut lowlink = vec![0usize; self.node_count];
        let mut on_stack = vec![false; self.node_count];
        let mut stack: Vec<usize> = Vec::new();
        let mut components = Vec::new();
        let mut next_index = 0;

        for root in 0..self.node_count {
            if index[root] != UNVISITED {
                continue;
            }
            index[root] = next_index;
            lowlink[root] = next_index;
            next_index += 1;
            stack.push(root);
            on_stack[root] = true;
            let mut work: Vec<(usize, Vec<usize>)> = vec![(root, self.successors(root))];

            while let Some(top) = work.last_mut() {
                let node = top.0;
                match top.1.pop() {
                    Some(next) if index[next] == UNVISITED => {
                        index[next] = next_index;
                        lowlink[next] = next_index;
                        next_index += 1;
                        stack.push(next);
                        on_stack[next] = true;
                        work.push((next, self.successors(next)));
                    }
                    Some(next) => {
                        if on_stack[next] {
                            lowlink[node] = lowlink[node].min(index[next]);
                        }
                    }
                    None => {
                        work.pop();
                        if let Some((parent, _)) = work.last() {
                            lowlink[*parent] = lowlink[*parent].min(lowlink[node]);
                        }
                        if lowlink[node] == index[node] {
                            let mut component = Vec::new();
                            while let Some(member) = stack.pop() {
                                on_stack[member] = false;
                                component.push(member);
                                if member == node {
                                    break;
                                }
                            }
                            component.sort_unstable();
                            components.push(component);
                        }
                    }
                }
            }
        }
        components
    }

    /// A cycle containing a Required edge excludes all of its members. Cycles
    /// of Optional edges only are broken by discarding back edges.
    fn break_cycles(&mut self, specs: &[PluginSpec]) {
        for component in self.strongly_connected() {
            if component.len() < 2 {
                continue;
            }
            let inside: Vec<usize> = self
                .edges
                .iter()
                .enumerate()
                .filter(|(_, e)| {
                    e.affects_order() && component.binary_search(&e.from).is_ok() && component.binary_search(&e.to).is_ok()
                })
                .map(|(i, _)| i)
                .collect();

            if inside.iter().any(|i| self.edges[*i].kind() == DependencyKind::Required) {
                let path = self.cycle_path(&component, &inside);
                self.record_cycle(specs, &component, &path);
            } else {
                self.discard_back_edges(specs, &component, &inside);
            }
        }
    }

    /// Shortest cycle through the first member of `component`, starting there
    fn cycle_path(&self, component: &[usize], inside: &[usize]) -> Vec<usize> {
        let start = component[0];
        let mut parent: HashMap<usize, usize> = HashMap::new();
        let mut queue = VecDeque::from([start]);
        while let Some(node) = queue.pop_front() {
            for edge in inside.iter().map(|i| &self.edges[*i]).filter(|e| e.from == node) {
                if edge.to == start {
                    let mut path = vec![node];
                    let mut current = node;
                    while let Some(previous) = parent.get(&current) {
                        path.push(*previous);
                        current = *previous;
                    }
                    path.reverse();
                    return path;
                }
                if !parent.contains_key(&edge.to) {
                    parent.insert(edge.to, node);
                    queue.push_back(edge.to);
                }
            }
        }
        component.to_vec()
    }

    /// Depth-first walk of an Optional-only component in discovery order,
    /// discarding every edge that closes a cycle.
    fn discard_back_edges(&mut self, specs: &[PluginSpec], component: &[usize], inside: &[usize]) {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            New,
            OnStack,
            Done,
        }

        let mut marks: HashMap<usize, Mark> = component.iter().map(|n| (*n, Mark::New)).collect();
        let outgoing = |node: usize| -> Vec<usize> {
            let mut edges: Vec<usize> = inside.iter().copied().filter(|i| self.edges[*i].from == node).collect();
            edges.reverse();
            edges
        };
        let mut discarded = Vec::new();

        for &root in component {
            if marks[&root] != Mark::New {
                continue;
            }
            marks.insert(root, Mark::OnStack);
            let mut stack: Vec<(usize, Vec<usize>)> = vec![(root, outgoing(root))];
            while let Some(frame) = stack.last_mut() {
                let node = frame.0;
                let Some(edge_index) = frame.1.pop() else {
                    marks.insert(node, Mark::Done);
                    stack.pop();
                    continue;
                };
                let target = self.edges[edge_index].to;
                match marks[&target] {
                    Mark::New => {
                        marks.insert(target, Mark::OnStack);
                        stack.push((target, outgoing(target)));
                    }
                    Mark::OnStack => {
                        log::debug!(
                            "Breaking optional dependency cycle at '{}' -> '{}'",
                            specs[node].name(),
                            specs[target].name()
                        );
                        discarded.push(edge_index);
                    }
                    Mark::Done => {}
                }
            }
        }
        self.discarded.extend(discarded);
    }

    fn record_cycle(&mut self, specs: &[PluginSpec], members: &[usize], path: &[usize]) {
        let chain: Vec<String> = path
            .iter()
            .chain(path.first())
            .map(|m| format!("{} ({})", specs[*m].name(), specs[*m].metadata().version))
            .collect();
        let error = DependencyError::CyclicDependency(chain);
        for member in members {
            if self.cyclic.insert(*member) && !specs[*member].has_error() {
                self.errors.push((*member, error.clone()));
            }
        }
    }

    /// Kahn's algorithm; among ready nodes the earliest discovered goes first.
    fn topological_order(&self) -> Vec<usize> {
        let mut pending_providers = vec![0usize; self.node_count];
        let mut dependants: Vec<Vec<usize>> = vec![Vec::new(); self.node_count];
        for (i, edge) in self.edges.iter().enumerate() {
            if !edge.affects_order()
                || self.discarded.contains(&i)
                || self.cyclic.contains(&edge.from)
                || self.cyclic.contains(&edge.to)
            {
                continue;
            }
            pending_providers[edge.from] += 1;
            dependants[edge.to].push(edge.from);
        }

        let mut ready: BTreeSet<usize> = (0..self.node_count)
            .filter(|n| pending_providers[*n] == 0 && !self.cyclic.contains(n))
            .collect();
        let mut order = Vec::with_capacity(self.node_count);
        while let Some(node) = ready.pop_first() {
            order.push(node);
            for dependant in &dependants[node] {
                pending_providers[*dependant] -= 1;
                if pending_providers[*dependant] == 0 {
                    ready.insert(*dependant);
                }
            }
        }

        let expected = self.node_count - self.cyclic.len();
        if order.len() != expected {
            log::error!(
                "Dependency ordering left {} plugin(s) unplaced",
                expected.saturating_sub(order.len())
            );
        }
        order
    }

    /// Load order: providers before dependants. Plugins in a required
    /// dependency cycle are left out.
    pub fn forward_order(&self) -> &[usize] {
        &self.order
    }

    /// Exact reverse of [`forward_order`](Self::forward_order)
    pub fn reverse_order(&self) -> Vec<usize> {
        self.order.iter().rev().copied().collect()
    }

    /// Every resolved declaration, test declarations included
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Resolved declarations of `node`, in declaration order
    pub fn providers_of(&self, node: usize) -> impl Iterator<Item = &Edge> + '_ {
        self.edges.iter().filter(move |e| e.from == node)
    }

    /// Plugins whose load order depends on `node`
    pub fn dependants_of(&self, node: usize) -> Vec<usize> {
        let mut dependants: Vec<usize> = self
            .edges
            .iter()
            .enumerate()
            .filter(|(i, e)| e.to == node && e.affects_order() && !self.discarded.contains(i))
            .map(|(_, e)| e.from)
            .collect();
        dependants.dedup();
        dependants
    }

    pub fn is_cyclic(&self, node: usize) -> bool {
        self.cyclic.contains(&node)
    }

    /// Failures found while building, per spec index
    pub fn resolution_errors(&self) -> &[(usize, DependencyError)] {
        &self.errors
    }
}
