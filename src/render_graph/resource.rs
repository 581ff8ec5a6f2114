//! Virtual resources for the render graph

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::backend::{BackendResource, ResourceDescriptor};
use crate::error::{GraphError, GraphResult};

/// Allocate the id of a new graph instance.
///
/// Ids are never reused, so a handle from last frame's graph can never be
/// mistaken for one in the current graph.
pub(crate) fn next_graph_id() -> u32 {
    static NEXT_GRAPH: AtomicU32 = AtomicU32::new(0);
    NEXT_GRAPH.fetch_add(1, Ordering::Relaxed)
}

/// Handle to a virtual resource in the render graph.
///
/// Only valid within the graph that created it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceHandle {
    graph: u32,
    index: u32,
}

impl ResourceHandle {
    pub(crate) fn new(graph: u32, index: u32) -> Self {
        Self { graph, index }
    }

    /// Index into the owning graph's resource table.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Id of the graph that created this handle.
    pub fn graph_id(&self) -> u32 {
        self.graph
    }
}

impl fmt::Display for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "g{}#{}", self.graph, self.index)
    }
}

/// Where a virtual resource's backing comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceOrigin {
    /// Allocated and released by the executor within the frame
    Transient,
    /// Owned by the caller, pinned for the whole frame
    Imported(BackendResource),
}

/// Virtual resource in the render graph
#[derive(Debug, Clone)]
pub struct VirtualResource {
    pub handle: ResourceHandle,
    pub name: String,
    pub desc: ResourceDescriptor,
    pub origin: ResourceOrigin,
}

impl VirtualResource {
    pub fn is_imported(&self) -> bool {
        matches!(self.origin, ResourceOrigin::Imported(_))
    }
}

/// Table of every resource declared in one graph.
#[derive(Debug)]
pub struct ResourceRegistry {
    graph: u32,
    resources: Vec<VirtualResource>,
}

impl ResourceRegistry {
    pub(crate) fn new(graph: u32) -> Self {
        Self {
            graph,
            resources: Vec::new(),
        }
    }

    /// Register a transient resource described by `desc`.
    pub fn create(&mut self, desc: ResourceDescriptor) -> GraphResult<ResourceHandle> {
        let name = desc
            .label()
            .map(str::to_string)
            .unwrap_or_else(|| format!("resource{}", self.resources.len()));
        self.push(name, desc, ResourceOrigin::Transient)
    }

    /// Wrap a caller-owned resource, e.g. the final backbuffer.
    pub fn import(
        &mut self,
        name: &str,
        external: BackendResource,
        desc: ResourceDescriptor,
    ) -> GraphResult<ResourceHandle> {
        self.push(name.to_string(), desc, ResourceOrigin::Imported(external))
    }

    fn push(
        &mut self,
        name: String,
        desc: ResourceDescriptor,
        origin: ResourceOrigin,
    ) -> GraphResult<ResourceHandle> {
        desc.validate()
            .map_err(|reason| GraphError::InvalidDescriptor {
                name: name.clone(),
                reason,
            })?;

        let handle = ResourceHandle::new(self.graph, self.resources.len() as u32);
        self.resources.push(VirtualResource {
            handle,
            name,
            desc,
            origin,
        });
        Ok(handle)
    }

    /// Check that `handle` was created or imported by this graph.
    pub fn validate(&self, handle: ResourceHandle) -> GraphResult<()> {
        if self.contains(handle) {
            Ok(())
        } else {
            Err(GraphError::UnknownHandle(handle))
        }
    }

    pub fn contains(&self, handle: ResourceHandle) -> bool {
        handle.graph == self.graph && (handle.index as usize) < self.resources.len()
    }

    pub fn get(&self, handle: ResourceHandle) -> Option<&VirtualResource> {
        if handle.graph != self.graph {
            return None;
        }
        self.resources.get(handle.index as usize)
    }

    pub fn is_imported(&self, handle: ResourceHandle) -> bool {
        self.get(handle).is_some_and(VirtualResource::is_imported)
    }

    /// Name of a resource, for diagnostics.
    pub fn name(&self, handle: ResourceHandle) -> &str {
        self.get(handle).map_or("<unknown>", |r| r.name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &VirtualResource> {
        self.resources.iter()
    }

    pub fn imported(&self) -> impl Iterator<Item = &VirtualResource> {
        self.resources.iter().filter(|r| r.is_imported())
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}
