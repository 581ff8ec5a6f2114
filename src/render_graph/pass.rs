//! Render pass declarations for the render graph

use std::collections::HashMap;
use std::fmt;

use crate::backend::*;
use crate::error::{GraphResult, PassError, PassResult};
use crate::render_graph::graph::RenderGraph;
use crate::render_graph::resource::*;

/// Handle to a pass in the render graph.
///
/// Only valid within the graph that created it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PassHandle(u32);

impl PassHandle {
    pub(crate) fn new(index: u32) -> Self {
        Self(index)
    }

    /// Declaration index of the pass.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for PassHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pass#{}", self.0)
    }
}

/// How a pass uses a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessKind {
    Read,
    Write,
    /// Read-modify-write, e.g. a depth buffer with depth testing enabled
    ReadWrite,
}

impl AccessKind {
    pub fn reads(self) -> bool {
        matches!(self, AccessKind::Read | AccessKind::ReadWrite)
    }

    pub fn writes(self) -> bool {
        matches!(self, AccessKind::Write | AccessKind::ReadWrite)
    }

    fn merge(self, other: AccessKind) -> AccessKind {
        if self == other {
            self
        } else {
            AccessKind::ReadWrite
        }
    }
}

/// Resource access declaration for a pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceAccess {
    pub resource: ResourceHandle,
    pub kind: AccessKind,
    /// Render-target slot for attachment writes
    pub slot: Option<u32>,
}

/// A handle the pass declared, returned by the builder.
///
/// Pass callbacks resolve these to concrete backend resources through
/// [`PassContext::resource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResolvedHandle {
    handle: ResourceHandle,
    kind: AccessKind,
}

impl ResolvedHandle {
    pub fn handle(&self) -> ResourceHandle {
        self.handle
    }

    pub fn kind(&self) -> AccessKind {
        self.kind
    }
}

pub(crate) type ExecuteFn = Box<dyn FnOnce(&mut PassContext<'_>) -> PassResult + Send>;

/// Metadata about a sealed pass in the graph
pub struct PassNode {
    pub(crate) handle: PassHandle,
    pub(crate) name: String,
    pub(crate) profiling_tag: String,
    pub(crate) accesses: Vec<ResourceAccess>,
    pub(crate) created: Vec<ResourceHandle>,
    pub(crate) allow_culling: bool,
    pub(crate) valid: bool,
    pub(crate) execute: Option<ExecuteFn>,
}

impl PassNode {
    pub fn handle(&self) -> PassHandle {
        self.handle
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn profiling_tag(&self) -> &str {
        &self.profiling_tag
    }

    pub fn accesses(&self) -> &[ResourceAccess] {
        &self.accesses
    }

    /// Resources this pass created.
    pub fn created(&self) -> &[ResourceHandle] {
        &self.created
    }

    pub fn access(&self, resource: ResourceHandle) -> Option<&ResourceAccess> {
        self.accesses.iter().find(|a| a.resource == resource)
    }

    pub fn reads_resource(&self, resource: ResourceHandle) -> bool {
        self.access(resource).is_some_and(|a| a.kind.reads())
    }

    pub fn writes_resource(&self, resource: ResourceHandle) -> bool {
        self.access(resource).is_some_and(|a| a.kind.writes())
    }

    /// Whether the compiler may remove this pass when its outputs are unused.
    pub fn allows_culling(&self) -> bool {
        self.allow_culling
    }

    /// A pass is valid when its builder finished without errors and attached
    /// an execution callback. Invalid passes are never compiled or executed.
    pub fn is_valid(&self) -> bool {
        self.valid
    }
}

impl fmt::Debug for PassNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PassNode")
            .field("handle", &self.handle)
            .field("name", &self.name)
            .field("profiling_tag", &self.profiling_tag)
            .field("accesses", &self.accesses)
            .field("allow_culling", &self.allow_culling)
            .field("valid", &self.valid)
            .field("has_callback", &self.execute.is_some())
            .finish()
    }
}

/// Scoped declaration surface for one pass.
///
/// Returned by [`RenderGraph::add_pass`]. The pass is sealed into the graph
/// when the builder is dropped, whether recording finished normally or an
/// error was propagated out of the recording scope.
///
/// ```ignore
/// let mut builder = graph.add_pass("Add Pass", "Add Pass Profiler")?;
/// let albedo = builder.read(albedo)?;
/// let target = builder.write(backbuffer, 0)?;
/// builder.set_execute((albedo, target), |(albedo, target), ctx| {
///     let source = ctx.resource(*albedo)?;
///     let destination = ctx.resource(*target)?;
///     ctx.record(Command::Blit { sources: vec![source], destination, shader: "Copy".into() });
///     Ok(())
/// });
/// ```
pub struct PassBuilder<'g> {
    graph: &'g mut RenderGraph,
    handle: PassHandle,
    name: String,
    profiling_tag: String,
    accesses: Vec<ResourceAccess>,
    created: Vec<ResourceHandle>,
    allow_culling: bool,
    execute: Option<ExecuteFn>,
    failed: bool,
}

impl<'g> PassBuilder<'g> {
    pub(crate) fn new(
        graph: &'g mut RenderGraph,
        handle: PassHandle,
        name: &str,
        profiling_tag: &str,
    ) -> Self {
        Self {
            graph,
            handle,
            name: name.to_string(),
            profiling_tag: profiling_tag.to_string(),
            accesses: Vec::new(),
            created: Vec::new(),
            allow_culling: true,
            execute: None,
            failed: false,
        }
    }

    pub fn handle(&self) -> PassHandle {
        self.handle
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Create a transient resource owned by the graph.
    ///
    /// Creating does not declare an access; write to the handle to use it.
    pub fn create(&mut self, desc: impl Into<ResourceDescriptor>) -> GraphResult<ResourceHandle> {
        match self.graph.registry_mut().create(desc.into()) {
            Ok(handle) => {
                self.created.push(handle);
                Ok(handle)
            }
            Err(err) => {
                self.failed = true;
                Err(err)
            }
        }
    }

    /// Declare that this pass reads from a resource
    pub fn read(&mut self, resource: ResourceHandle) -> GraphResult<ResolvedHandle> {
        self.declare(resource, AccessKind::Read, None)
    }

    /// Declare that this pass writes to a resource bound at render-target `slot`
    pub fn write(&mut self, resource: ResourceHandle, slot: u32) -> GraphResult<ResolvedHandle> {
        self.declare(resource, AccessKind::Write, Some(slot))
    }

    /// Declare that this pass reads and writes a resource in place
    pub fn read_write(&mut self, resource: ResourceHandle) -> GraphResult<ResolvedHandle> {
        self.declare(resource, AccessKind::ReadWrite, None)
    }

    fn declare(
        &mut self,
        resource: ResourceHandle,
        kind: AccessKind,
        slot: Option<u32>,
    ) -> GraphResult<ResolvedHandle> {
        if let Err(err) = self.graph.resources().validate(resource) {
            self.failed = true;
            return Err(err);
        }

        let kind = match self.accesses.iter_mut().find(|a| a.resource == resource) {
            Some(existing) => {
                existing.kind = existing.kind.merge(kind);
                existing.slot = slot.or(existing.slot);
                existing.kind
            }
            None => {
                self.accesses.push(ResourceAccess {
                    resource,
                    kind,
                    slot,
                });
                kind
            }
        };

        Ok(ResolvedHandle {
            handle: resource,
            kind,
        })
    }

    /// Attach the deferred execution logic.
    ///
    /// `data` is the pass-local state handed back to `execute` by reference.
    /// The callback can only resolve resources this pass declared.
    pub fn set_execute<D, F>(&mut self, data: D, callback: F)
    where
        D: Send + 'static,
        F: FnOnce(&D, &mut PassContext<'_>) -> PassResult + Send + 'static,
    {
        let execute: ExecuteFn = Box::new(move |ctx: &mut PassContext<'_>| callback(&data, ctx));
        self.execute = Some(execute);
    }

    /// Keep the pass even when none of its outputs reach the frame's output.
    pub fn allow_culling(&mut self, allow: bool) {
        self.allow_culling = allow;
    }
}

impl Drop for PassBuilder<'_> {
    fn drop(&mut self) {
        let valid = !self.failed && self.execute.is_some();
        if !valid {
            log::warn!(
                "Pass '{}' sealed without {}; it will not run",
                self.name,
                if self.failed {
                    "completing its declarations"
                } else {
                    "an execute callback"
                }
            );
        }

        let node = PassNode {
            handle: self.handle,
            name: std::mem::take(&mut self.name),
            profiling_tag: std::mem::take(&mut self.profiling_tag),
            accesses: std::mem::take(&mut self.accesses),
            created: std::mem::take(&mut self.created),
            allow_culling: self.allow_culling,
            valid,
            execute: self.execute.take(),
        };
        self.graph.seal_pass(node);
    }
}

/// Per-frame inputs visible to every pass
#[derive(Debug, Clone, Default)]
pub struct FrameContext {
    pub frame_index: u64,
    pub camera: Option<Camera>,
    pub visible: Option<VisibleSet>,
}

impl FrameContext {
    pub fn for_camera(frame_index: u64, camera: Camera, visible: VisibleSet) -> Self {
        Self {
            frame_index,
            camera: Some(camera),
            visible: Some(visible),
        }
    }
}

/// Context handed to a pass callback during execution
pub struct PassContext<'a> {
    pub(crate) name: &'a str,
    pub(crate) accesses: &'a [ResourceAccess],
    pub(crate) bindings: &'a HashMap<ResourceHandle, BackendResource>,
    pub(crate) frame: &'a FrameContext,
    pub(crate) backend: &'a mut dyn Backend,
    pub(crate) commands: &'a mut CommandSequence,
}

impl<'a> PassContext<'a> {
    pub fn pass_name(&self) -> &str {
        self.name
    }

    /// Resolve a declared handle to its concrete backing
    pub fn resource(&self, resolved: ResolvedHandle) -> Result<BackendResource, PassError> {
        self.resolve(resolved.handle())
    }

    /// Resolve a raw handle; fails unless this pass declared it
    pub fn resolve(&self, handle: ResourceHandle) -> Result<BackendResource, PassError> {
        if !self.accesses.iter().any(|a| a.resource == handle) {
            return Err(PassError::UndeclaredResource(handle));
        }
        self.bindings
            .get(&handle)
            .copied()
            .ok_or(PassError::NotMaterialized(handle))
    }

    pub fn frame_index(&self) -> u64 {
        self.frame.frame_index
    }

    pub fn camera(&self) -> Result<&Camera, PassError> {
        self.frame.camera.as_ref().ok_or(PassError::NoCamera)
    }

    pub fn visible_set(&self) -> Option<&VisibleSet> {
        self.frame.visible.as_ref()
    }

    /// Append a command to this pass's command sequence
    pub fn record(&mut self, command: Command) {
        self.commands.push(command);
    }

    /// Draw the frame's visible renderers within `queue_range`
    pub fn draw_visible_set(
        &mut self,
        shader_pass: &str,
        sort: SortCriteria,
        queue_range: RenderQueueRange,
    ) -> PassResult {
        let empty = VisibleSet::default();
        let visible = self.frame.visible.as_ref().unwrap_or(&empty);
        let command = self
            .backend
            .draw_visible_set(visible, shader_pass, sort, queue_range)?;
        self.commands.push(command);
        Ok(())
    }
}
