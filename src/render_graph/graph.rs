//! Render graph definition and lifecycle

use std::fmt;

use crate::backend::{BackendResource, ResourceDescriptor};
use crate::config::GraphConfig;
use crate::error::{GraphError, GraphResult};
use crate::render_graph::compiler::{CompiledPlan, GraphCompiler};
use crate::render_graph::pass::*;
use crate::render_graph::resource::*;

/// Lifecycle state of a graph instance.
///
/// A graph moves strictly forward: `Recording → Compiled → Executing → Retired`.
/// Compiling again while `Compiled` is allowed and yields the same plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphState {
    Recording,
    Compiled,
    Executing,
    Retired,
}

impl GraphState {
    pub fn as_str(self) -> &'static str {
        match self {
            GraphState::Recording => "recording",
            GraphState::Compiled => "compiled",
            GraphState::Executing => "executing",
            GraphState::Retired => "retired",
        }
    }
}

impl fmt::Display for GraphState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The render graph for one camera in one frame.
///
/// # Construction
///
/// ```ignore
/// let mut graph = RenderGraph::new("frame");
/// let backbuffer = graph.import_resource("Backbuffer", camera.target, target_desc)?;
///
/// let mut builder = graph.add_pass("Base Pass", "Base Pass Profiler")?;
/// let albedo = builder.create(albedo_desc)?;
/// let albedo = builder.write(albedo, 0)?;
/// builder.set_execute(albedo, |albedo, ctx| { /* ... */ Ok(()) });
/// drop(builder);
/// ```
///
/// # Execution
///
/// ```ignore
/// let plan = graph.compile()?;
/// executor.execute(&mut graph, &plan, &mut backend, &frame)?;
/// graph.teardown();
/// ```
pub struct RenderGraph {
    id: u32,
    name: String,
    state: GraphState,
    config: GraphConfig,
    registry: ResourceRegistry,
    passes: Vec<PassNode>,
}

impl RenderGraph {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_config(name, GraphConfig::default())
    }

    pub fn with_config(name: impl Into<String>, config: GraphConfig) -> Self {
        let id = next_graph_id();
        Self {
            id,
            name: name.into(),
            state: GraphState::Recording,
            config,
            registry: ResourceRegistry::new(id),
            passes: Vec::new(),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> GraphState {
        self.state
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    fn expect_state(&self, expected: GraphState, operation: &'static str) -> GraphResult<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(GraphError::InvalidGraphState {
                operation,
                state: self.state.as_str(),
            })
        }
    }

    /// Create a transient resource outside any pass
    pub fn create_resource(&mut self, desc: impl Into<ResourceDescriptor>) -> GraphResult<ResourceHandle> {
        self.expect_state(GraphState::Recording, "create a resource")?;
        self.registry.create(desc.into())
    }

    /// Import a caller-owned resource, pinned for the whole frame
    pub fn import_resource(
        &mut self,
        name: &str,
        external: BackendResource,
        desc: impl Into<ResourceDescriptor>,
    ) -> GraphResult<ResourceHandle> {
        self.expect_state(GraphState::Recording, "import a resource")?;
        self.registry.import(name, external, desc.into())
    }

    /// Begin declaring a pass.
    ///
    /// The returned builder seals the pass into the graph when dropped.
    pub fn add_pass(&mut self, name: &str, profiling_tag: &str) -> GraphResult<PassBuilder<'_>> {
        self.expect_state(GraphState::Recording, "add a pass")?;
        let handle = PassHandle::new(self.passes.len() as u32);
        Ok(PassBuilder::new(self, handle, name, profiling_tag))
    }

    pub(crate) fn seal_pass(&mut self, node: PassNode) {
        log::trace!(
            "Graph '{}': sealed pass '{}' ({} accesses)",
            self.name,
            node.name,
            node.accesses.len()
        );
        self.passes.push(node);
    }

    pub(crate) fn registry_mut(&mut self) -> &mut ResourceRegistry {
        &mut self.registry
    }

    /// Compile the graph into an execution plan.
    ///
    /// Allowed while recording or already compiled; compiling a compiled graph
    /// again produces an identical plan. On failure the graph stays in its
    /// current state and nothing has been sent to the backend.
    pub fn compile(&mut self) -> GraphResult<CompiledPlan> {
        if !matches!(self.state, GraphState::Recording | GraphState::Compiled) {
            return Err(GraphError::InvalidGraphState {
                operation: "compile",
                state: self.state.as_str(),
            });
        }

        let plan = GraphCompiler::new(self.config.orphan_policy).compile(self)?;
        self.state = GraphState::Compiled;
        Ok(plan)
    }

    pub(crate) fn begin_execution(&mut self, plan: &CompiledPlan) -> GraphResult<()> {
        self.expect_state(GraphState::Compiled, "execute")?;
        if plan.graph_id() != self.id {
            return Err(GraphError::InvalidGraphState {
                operation: "execute a plan compiled by another graph",
                state: self.state.as_str(),
            });
        }
        self.state = GraphState::Executing;
        Ok(())
    }

    pub(crate) fn take_callback(&mut self, pass: PassHandle) -> Option<ExecuteFn> {
        self.passes.get_mut(pass.index())?.execute.take()
    }

    pub(crate) fn retire(&mut self) {
        self.state = GraphState::Retired;
    }

    /// Release all frame-scoped metadata. Safe to call in any state, and the
    /// graph cannot be recorded into again afterwards.
    pub fn teardown(&mut self) {
        log::trace!(
            "Graph '{}': teardown ({} passes, {} resources)",
            self.name,
            self.passes.len(),
            self.registry.len()
        );
        self.passes.clear();
        self.state = GraphState::Retired;
    }

    /// Get pass nodes (metadata)
    pub fn passes(&self) -> &[PassNode] {
        &self.passes
    }

    pub fn pass(&self, handle: PassHandle) -> Option<&PassNode> {
        self.passes.get(handle.index())
    }

    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }

    /// Get all resources
    pub fn resources(&self) -> &ResourceRegistry {
        &self.registry
    }
}

impl fmt::Debug for RenderGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderGraph")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("state", &self.state)
            .field("passes", &self.passes)
            .field("resources", &self.registry.len())
            .finish()
    }
}
