//! Graph compilation: pass ordering, dead-pass culling and resource lifetimes

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::config::OrphanPolicy;
use crate::error::{GraphError, GraphResult};
use crate::render_graph::graph::RenderGraph;
use crate::render_graph::pass::*;
use crate::render_graph::resource::*;

/// Resource lifetime in terms of plan steps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceLifetime {
    pub first_use: usize,
    pub last_use: usize,
    /// Imported resources live for the whole frame and are never aliased
    pub pinned: bool,
}

impl ResourceLifetime {
    pub fn contains(&self, step: usize) -> bool {
        step >= self.first_use && step <= self.last_use
    }

    pub fn overlaps(&self, other: &ResourceLifetime) -> bool {
        self.first_use <= other.last_use && other.first_use <= self.last_use
    }
}

/// Compiled render graph with execution order and resource lifetimes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledPlan {
    graph: u32,
    pass_order: Vec<PassHandle>,
    lifetimes: BTreeMap<ResourceHandle, ResourceLifetime>,
    culled_passes: Vec<PassHandle>,
    culled_resources: Vec<ResourceHandle>,
}

impl CompiledPlan {
    /// Id of the graph this plan was compiled from.
    pub fn graph_id(&self) -> u32 {
        self.graph
    }

    /// Surviving passes in execution order
    pub fn pass_order(&self) -> &[PassHandle] {
        &self.pass_order
    }

    pub fn len(&self) -> usize {
        self.pass_order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pass_order.is_empty()
    }

    /// Step at which `pass` runs, if it survived culling
    pub fn position(&self, pass: PassHandle) -> Option<usize> {
        self.pass_order.iter().position(|&p| p == pass)
    }

    pub fn lifetime(&self, resource: ResourceHandle) -> Option<ResourceLifetime> {
        self.lifetimes.get(&resource).copied()
    }

    pub fn lifetimes(&self) -> impl Iterator<Item = (ResourceHandle, ResourceLifetime)> + '_ {
        self.lifetimes.iter().map(|(&h, &l)| (h, l))
    }

    /// Check if a resource is alive at a given execution step
    pub fn is_resource_alive(&self, resource: ResourceHandle, step: usize) -> bool {
        self.lifetimes
            .get(&resource)
            .is_some_and(|lifetime| lifetime.contains(step))
    }

    /// Transient resources whose backing must exist before `step` runs
    pub fn materialized_at(&self, step: usize) -> impl Iterator<Item = ResourceHandle> + '_ {
        self.lifetimes
            .iter()
            .filter(move |(_, l)| !l.pinned && l.first_use == step)
            .map(|(&h, _)| h)
    }

    /// Transient resources whose backing can be released after `step` ran
    pub fn released_after(&self, step: usize) -> impl Iterator<Item = ResourceHandle> + '_ {
        self.lifetimes
            .iter()
            .filter(move |(_, l)| !l.pinned && l.last_use == step)
            .map(|(&h, _)| h)
    }

    /// Whether two transient resources may share backing memory
    pub fn can_alias(&self, a: ResourceHandle, b: ResourceHandle) -> bool {
        match (self.lifetimes.get(&a), self.lifetimes.get(&b)) {
            (Some(la), Some(lb)) => a != b && !la.pinned && !lb.pinned && !la.overlaps(lb),
            _ => false,
        }
    }

    /// Passes removed because nothing observes their outputs
    pub fn culled_passes(&self) -> &[PassHandle] {
        &self.culled_passes
    }

    pub fn is_pass_culled(&self, pass: PassHandle) -> bool {
        self.culled_passes.contains(&pass)
    }

    /// Transient resources no surviving pass touches
    pub fn culled_resources(&self) -> &[ResourceHandle] {
        &self.culled_resources
    }
}

/// Turns the passes recorded in a graph into a [`CompiledPlan`].
#[derive(Debug, Clone, Copy, Default)]
pub struct GraphCompiler {
    orphan_policy: OrphanPolicy,
}

impl GraphCompiler {
    pub fn new(orphan_policy: OrphanPolicy) -> Self {
        Self { orphan_policy }
    }

    /// Compile the graph - dependency analysis, topological sort, culling and
    /// lifetime planning. Does not modify the graph.
    pub fn compile(&self, graph: &RenderGraph) -> GraphResult<CompiledPlan> {
        crate::profile_scope!("compile_render_graph");

        let registry = graph.resources();
        let nodes: Vec<&PassNode> = graph.passes().iter().filter(|n| n.is_valid()).collect();
        let deps = Dependencies::build(&nodes, registry);

        let order = topological_order(&nodes, &deps.edges)?;
        let live = deps.live_passes(&nodes, registry);
        self.check_orphaned_writes(&nodes, registry, &deps, &live)?;

        let pass_order: Vec<usize> = order.into_iter().filter(|&i| live[i]).collect();

        let culled_passes: Vec<PassHandle> = (0..nodes.len())
            .filter(|&i| !live[i])
            .map(|i| {
                log::debug!(
                    "Graph '{}': culled pass '{}', its outputs are never observed",
                    graph.name(),
                    nodes[i].name()
                );
                nodes[i].handle()
            })
            .collect();

        let mut lifetimes: BTreeMap<ResourceHandle, ResourceLifetime> = BTreeMap::new();
        for (step, &i) in pass_order.iter().enumerate() {
            for access in nodes[i].accesses() {
                if registry.is_imported(access.resource) {
                    continue;
                }
                lifetimes
                    .entry(access.resource)
                    .and_modify(|l| l.last_use = step)
                    .or_insert(ResourceLifetime {
                        first_use: step,
                        last_use: step,
                        pinned: false,
                    });
            }
        }

        if let Some(last) = pass_order.len().checked_sub(1) {
            for resource in registry.imported() {
                lifetimes.insert(
                    resource.handle,
                    ResourceLifetime {
                        first_use: 0,
                        last_use: last,
                        pinned: true,
                    },
                );
            }
        }

        let culled_resources: Vec<ResourceHandle> = registry
            .iter()
            .filter(|r| !r.is_imported() && !lifetimes.contains_key(&r.handle))
            .map(|r| r.handle)
            .collect();

        log::debug!(
            "Graph '{}' compiled: {} passes ({} culled), {} resources ({} culled)",
            graph.name(),
            pass_order.len(),
            culled_passes.len(),
            lifetimes.len(),
            culled_resources.len()
        );

        Ok(CompiledPlan {
            graph: graph.id(),
            pass_order: pass_order.into_iter().map(|i| nodes[i].handle()).collect(),
            lifetimes,
            culled_passes,
            culled_resources,
        })
    }

    /// A surviving pass writing a transient resource that no surviving pass
    /// reads afterwards. Read-modify-write accesses consume their own write.
    fn check_orphaned_writes(
        &self,
        nodes: &[&PassNode],
        registry: &ResourceRegistry,
        deps: &Dependencies,
        live: &[bool],
    ) -> GraphResult<()> {
        for (i, node) in nodes.iter().enumerate().filter(|(i, _)| live[*i]) {
            for access in node.accesses() {
                if access.kind != AccessKind::Write || registry.is_imported(access.resource) {
                    continue;
                }

                let observed = deps
                    .consumers
                    .get(&(i, access.resource))
                    .is_some_and(|readers| readers.iter().any(|&r| live[r]));
                if observed {
                    continue;
                }

                let resource = registry.name(access.resource).to_string();
                match self.orphan_policy {
                    OrphanPolicy::Deny => {
                        log::error!(
                            "Pass '{}' writes '{}' but nothing reads it",
                            node.name(),
                            resource
                        );
                        return Err(GraphError::OrphanedWrite {
                            pass: node.name().to_string(),
                            resource,
                        });
                    }
                    OrphanPolicy::Warn => log::warn!(
                        "Pass '{}' writes '{}' but nothing reads it",
                        node.name(),
                        resource
                    ),
                }
            }
        }
        Ok(())
    }
}

/// Edges between the valid passes of a graph, indexed by their position in
/// declaration order.
struct Dependencies {
    /// (before, after) ordering constraints
    edges: BTreeSet<(usize, usize)>,
    /// Producers each pass reads from
    producers: Vec<Vec<usize>>,
    /// Readers of the value a pass wrote to a resource
    consumers: HashMap<(usize, ResourceHandle), Vec<usize>>,
}

impl Dependencies {
    fn build(nodes: &[&PassNode], registry: &ResourceRegistry) -> Self {
        let mut uses: BTreeMap<ResourceHandle, Vec<(usize, AccessKind)>> = BTreeMap::new();
        for (i, node) in nodes.iter().enumerate() {
            for access in node.accesses() {
                uses.entry(access.resource).or_default().push((i, access.kind));
            }
        }

        let mut deps = Dependencies {
            edges: BTreeSet::new(),
            producers: vec![Vec::new(); nodes.len()],
            consumers: HashMap::new(),
        };

        for (&resource, uses) in &uses {
            let writers: Vec<usize> = uses
                .iter()
                .filter(|(_, kind)| kind.writes())
                .map(|&(i, _)| i)
                .collect();

            // Writes land in declaration order
            for pair in writers.windows(2) {
                deps.edges.insert((pair[0], pair[1]));
            }

            for &(reader, kind) in uses.iter().filter(|(_, kind)| kind.reads()) {
                let producer = writers.iter().rev().find(|&&w| w < reader).copied().or_else(|| {
                    // Transient contents are undefined before their first
                    // write, so a read declared earlier consumes that write.
                    let forward = !kind.writes() && !registry.is_imported(resource);
                    forward
                        .then(|| writers.iter().find(|&&w| w > reader).copied())
                        .flatten()
                });

                if let Some(producer) = producer {
                    deps.edges.insert((producer, reader));
                    deps.producers[reader].push(producer);
                    deps.consumers
                        .entry((producer, resource))
                        .or_default()
                        .push(reader);
                }

                // The next overwrite must wait until this read is done
                let after = producer.map_or(reader, |p| p.max(reader));
                if let Some(&next) = writers.iter().find(|&&w| w > after) {
                    deps.edges.insert((reader, next));
                }
            }
        }

        deps
    }

    /// Passes that transitively contribute to an imported resource or opted
    /// out of culling.
    fn live_passes(&self, nodes: &[&PassNode], registry: &ResourceRegistry) -> Vec<bool> {
        let mut live = vec![false; nodes.len()];
        let mut stack: Vec<usize> = nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| {
                !node.allows_culling()
                    || node
                        .accesses()
                        .iter()
                        .any(|a| a.kind.writes() && registry.is_imported(a.resource))
            })
            .map(|(i, _)| i)
            .collect();

        while let Some(i) = stack.pop() {
            if live[i] {
                continue;
            }
            live[i] = true;
            stack.extend(self.producers[i].iter().copied());
        }

        live
    }
}

/// Kahn's algorithm; among ready passes the earliest declared runs first.
fn topological_order(nodes: &[&PassNode], edges: &BTreeSet<(usize, usize)>) -> GraphResult<Vec<usize>> {
    let mut successors = vec![Vec::new(); nodes.len()];
    let mut in_degree = vec![0usize; nodes.len()];
    for &(from, to) in edges {
        successors[from].push(to);
        in_degree[to] += 1;
    }

    let mut ready: BTreeSet<usize> = (0..nodes.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(nodes.len());

    while let Some(i) = ready.pop_first() {
        order.push(i);
        for &next in &successors[i] {
            in_degree[next] -= 1;
            if in_degree[next] == 0 {
                ready.insert(next);
            }
        }
    }

    if order.len() != nodes.len() {
        // Passes left over are on a cycle or downstream of one; report the former
        let stuck: Vec<bool> = in_degree.iter().map(|&d| d > 0).collect();
        let passes: Vec<String> = (0..nodes.len())
            .filter(|&i| stuck[i] && reaches_itself(i, &successors, &stuck))
            .map(|i| nodes[i].name().to_string())
            .collect();
        log::error!("Render graph contains a cycle through: {}", passes.join(", "));
        return Err(GraphError::CyclicDependency { passes });
    }

    Ok(order)
}

/// Whether `start` can reach itself through passes marked in `within`.
fn reaches_itself(start: usize, successors: &[Vec<usize>], within: &[bool]) -> bool {
    let mut visited = vec![false; successors.len()];
    let mut stack: Vec<usize> = successors[start].clone();
    while let Some(i) = stack.pop() {
        if i == start {
            return true;
        }
        if !within[i] || visited[i] {
            continue;
        }
        visited[i] = true;
        stack.extend(successors[i].iter().copied());
    }
    false
}
