//! Render graph executor

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::backend::*;
use crate::error::{GraphError, GraphResult};
use crate::render_graph::compiler::CompiledPlan;
use crate::render_graph::graph::RenderGraph;
use crate::render_graph::pass::*;
use crate::render_graph::resource::*;

/// Allocate the next submission index.
///
/// Shared by every executor in the process so a backend sees increasing
/// indices no matter how many executors or schedulers feed it.
fn next_submission_index() -> u64 {
    static NEXT_SUBMISSION: AtomicU64 = AtomicU64::new(0);
    NEXT_SUBMISSION.fetch_add(1, Ordering::Relaxed)
}

/// Summary of one graph execution
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionReport {
    /// Names of executed passes, in order
    pub executed: Vec<String>,
    pub materialized: usize,
    pub released: usize,
    pub submissions: usize,
}

/// Executor for running a compiled render graph.
///
/// Owns the concrete backings of transient resources while a graph executes;
/// nothing is held between executions.
#[derive(Debug, Default)]
pub struct GraphExecutor {
    /// Backings of transient resources that are currently alive
    live: BTreeMap<ResourceHandle, BackendResource>,
}

impl GraphExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of transient backings currently held.
    pub fn live_resources(&self) -> usize {
        self.live.len()
    }

    /// Execute the compiled plan of `graph`.
    ///
    /// If a pass callback fails, the remaining passes are skipped, every live
    /// transient is released and the error is returned. The graph is retired
    /// either way.
    pub fn execute(
        &mut self,
        graph: &mut RenderGraph,
        plan: &CompiledPlan,
        backend: &mut dyn Backend,
        frame: &FrameContext,
    ) -> GraphResult<ExecutionReport> {
        graph.begin_execution(plan)?;

        let mut report = ExecutionReport::default();
        let result = self.run(graph, plan, backend, frame, &mut report);
        if result.is_err() {
            let released = self.release_all(backend);
            log::warn!(
                "Graph '{}' aborted after {} passes, released {} live resources",
                graph.name(),
                report.executed.len(),
                released
            );
        }
        graph.retire();

        result.map(|()| report)
    }

    fn run(
        &mut self,
        graph: &mut RenderGraph,
        plan: &CompiledPlan,
        backend: &mut dyn Backend,
        frame: &FrameContext,
        report: &mut ExecutionReport,
    ) -> GraphResult<()> {
        // Imported resources are bound for the whole frame
        let mut bindings: HashMap<ResourceHandle, BackendResource> = graph
            .resources()
            .iter()
            .filter_map(|r| match r.origin {
                ResourceOrigin::Imported(external) => Some((r.handle, external)),
                ResourceOrigin::Transient => None,
            })
            .collect();

        for (step, &pass) in plan.pass_order().iter().enumerate() {
            let callback = graph
                .take_callback(pass)
                .ok_or(GraphError::InvalidGraphState {
                    operation: "execute a pass without a callback",
                    state: graph.state().as_str(),
                })?;
            let node = graph.pass(pass).ok_or(GraphError::InvalidGraphState {
                operation: "execute a pass missing from the graph",
                state: graph.state().as_str(),
            })?;

            let mut commands = CommandSequence::new(node.name());

            for handle in plan.materialized_at(step) {
                let Some(resource) = graph.resources().get(handle) else {
                    return Err(GraphError::UnknownHandle(handle));
                };
                let backing = backend.allocate_resource(&resource.desc)?;
                log::trace!(
                    "Materialized '{}' as {:?} before '{}'",
                    resource.name,
                    backing,
                    node.name()
                );
                self.live.insert(handle, backing);
                bindings.insert(handle, backing);
                report.materialized += 1;

                match resource.desc.clear_policy() {
                    ClearPolicy::Color(color) => commands.push(Command::Clear {
                        target: backing,
                        value: ClearValue::Color(color),
                    }),
                    ClearPolicy::Depth(depth) => commands.push(Command::Clear {
                        target: backing,
                        value: ClearValue::Depth(depth),
                    }),
                    ClearPolicy::DontCare => {}
                }
            }

            {
                crate::profile_pass!(node.profiling_tag());
                let mut ctx = PassContext {
                    name: node.name(),
                    accesses: node.accesses(),
                    bindings: &bindings,
                    frame,
                    backend: &mut *backend,
                    commands: &mut commands,
                };
                callback(&mut ctx).map_err(|source| {
                    log::error!("Pass '{}' failed: {}", node.name(), source);
                    GraphError::CallbackFailure {
                        pass: node.name().to_string(),
                        source,
                    }
                })?;
            }

            commands.submission_index = next_submission_index();
            backend.submit(commands)?;
            report.submissions += 1;
            report.executed.push(node.name().to_string());

            for handle in plan.released_after(step) {
                if let Some(backing) = self.live.remove(&handle) {
                    backend.release_resource(backing);
                    bindings.remove(&handle);
                    report.released += 1;
                }
            }
        }

        Ok(())
    }

    fn release_all(&mut self, backend: &mut dyn Backend) -> usize {
        let count = self.live.len();
        for (_, backing) in std::mem::take(&mut self.live) {
            backend.release_resource(backing);
        }
        count
    }
}
