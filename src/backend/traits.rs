//! Core backend abstraction traits
//!
//! The graph core never talks to a graphics API directly. Everything it needs
//! from the GPU side goes through [`Backend`].

use crate::backend::types::*;
use std::cmp::Ordering;
use thiserror::Error;

/// Backend error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("Failed to allocate resource: {0}")]
    AllocationFailed(String),
    #[error("Failed to submit commands: {0}")]
    SubmissionFailed(String),
    #[error("Culling failed: {0}")]
    CullingFailed(String),
    #[error("Out of memory")]
    OutOfMemory,
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Handle to a concrete resource owned by a backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BackendResource(u64);

impl BackendResource {
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Interface every graphics backend provides to the graph
pub trait Backend {
    /// Get the backend name for debugging
    fn name(&self) -> &str;

    /// Allocate backing memory for a materialized resource
    fn allocate_resource(&mut self, desc: &ResourceDescriptor) -> BackendResult<BackendResource>;

    /// Return a resource whose lifetime ended; the backend may alias it
    fn release_resource(&mut self, resource: BackendResource);

    /// Submit the commands of one pass, in submission order
    fn submit(&mut self, commands: CommandSequence) -> BackendResult<()>;

    /// Determine what a camera can see
    fn cull(&mut self, camera: &Camera) -> BackendResult<VisibleSet>;

    /// Encode a draw of the visible renderers within `queue_range`
    fn draw_visible_set(
        &mut self,
        visible: &VisibleSet,
        shader_pass: &str,
        sort: SortCriteria,
        queue_range: RenderQueueRange,
    ) -> BackendResult<Command> {
        let mut renderers: Vec<VisibleRenderer> = visible
            .renderers
            .iter()
            .filter(|r| queue_range.contains(r.queue))
            .copied()
            .collect();

        match sort {
            SortCriteria::CommonOpaque => renderers.sort_by(|a, b| {
                a.queue.cmp(&b.queue).then(
                    a.distance
                        .partial_cmp(&b.distance)
                        .unwrap_or(Ordering::Equal),
                )
            }),
            SortCriteria::CommonTransparent => renderers.sort_by(|a, b| {
                a.queue.cmp(&b.queue).then(
                    b.distance
                        .partial_cmp(&a.distance)
                        .unwrap_or(Ordering::Equal),
                )
            }),
            SortCriteria::None => {}
        }

        Ok(Command::DrawRenderers {
            shader_pass: shader_pass.to_string(),
            renderers: renderers.into_iter().map(|r| r.id).collect(),
        })
    }
}
