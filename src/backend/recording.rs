//! Recording backend for testing and development.
//!
//! This backend doesn't perform actual GPU operations. It hands out opaque
//! resource ids, keeps released resources in a descriptor-keyed pool so later
//! allocations with the same shape alias the same backing, and records every
//! call so tests can assert on ordering.

use std::collections::HashMap;

use glam::Vec3;

use crate::backend::traits::*;
use crate::backend::types::*;

/// A call observed by the recording backend
#[derive(Debug, Clone, PartialEq)]
pub enum BackendEvent {
    Allocate {
        resource: BackendResource,
        label: Option<String>,
        reused: bool,
    },
    Release {
        resource: BackendResource,
    },
    Submit {
        label: String,
        submission_index: u64,
    },
    Cull {
        camera: String,
        visible: usize,
    },
}

/// In-memory backend that records every call.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    scene: Vec<Renderer>,
    next_resource: u64,
    live: HashMap<BackendResource, ResourceDescriptor>,
    pool: Vec<(ResourceDescriptor, BackendResource)>,
    events: Vec<BackendEvent>,
    submissions: Vec<CommandSequence>,
    /// Remaining allocations before `OutOfMemory` is reported
    allocation_budget: Option<usize>,
}

impl RecordingBackend {
    /// Create a new recording backend with an empty scene.
    pub fn new() -> Self {
        Self {
            // Ids below this are left for caller-owned resources such as camera targets
            next_resource: 1000,
            ..Default::default()
        }
    }

    /// Create a backend whose scene contains the given renderers.
    pub fn with_scene(scene: Vec<Renderer>) -> Self {
        Self {
            scene,
            ..Self::new()
        }
    }

    /// Fail with `OutOfMemory` once `budget` allocations have been served.
    pub fn with_allocation_budget(mut self, budget: usize) -> Self {
        self.allocation_budget = Some(budget);
        self
    }

    /// All calls observed so far.
    pub fn events(&self) -> &[BackendEvent] {
        &self.events
    }

    /// All submitted command sequences, in submission order.
    pub fn submissions(&self) -> &[CommandSequence] {
        &self.submissions
    }

    /// Resources currently allocated and not yet released.
    pub fn live_resources(&self) -> usize {
        self.live.len()
    }

    /// Released resources waiting in the pool for reuse.
    pub fn pooled_resources(&self) -> usize {
        self.pool.len()
    }

    pub fn allocation_count(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, BackendEvent::Allocate { .. }))
            .count()
    }

    pub fn release_count(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, BackendEvent::Release { .. }))
            .count()
    }

    /// Forget recorded events and submissions, keeping pooled resources.
    pub fn clear_events(&mut self) {
        self.events.clear();
        self.submissions.clear();
    }
}

impl Backend for RecordingBackend {
    fn name(&self) -> &str {
        "Recording Backend"
    }

    fn allocate_resource(&mut self, desc: &ResourceDescriptor) -> BackendResult<BackendResource> {
        if let Some(budget) = self.allocation_budget.as_mut() {
            if *budget == 0 {
                return Err(BackendError::OutOfMemory);
            }
            *budget -= 1;
        }

        let key = desc.without_label();
        let pooled = self.pool.iter().position(|(pooled, _)| *pooled == key);
        let (resource, reused) = match pooled {
            Some(index) => (self.pool.swap_remove(index).1, true),
            None => {
                let resource = BackendResource::from_raw(self.next_resource);
                self.next_resource += 1;
                (resource, false)
            }
        };

        log::trace!(
            "RecordingBackend: allocating {:?} as {:?} (reused: {})",
            desc.label(),
            resource,
            reused
        );

        self.live.insert(resource, key);
        self.events.push(BackendEvent::Allocate {
            resource,
            label: desc.label().map(str::to_string),
            reused,
        });
        Ok(resource)
    }

    fn release_resource(&mut self, resource: BackendResource) {
        match self.live.remove(&resource) {
            Some(key) => {
                log::trace!("RecordingBackend: releasing {:?}", resource);
                self.pool.push((key, resource));
                self.events.push(BackendEvent::Release { resource });
            }
            None => log::warn!("RecordingBackend: release of unknown resource {:?}", resource),
        }
    }

    fn submit(&mut self, commands: CommandSequence) -> BackendResult<()> {
        if let Some(last) = self.submissions.last() {
            if commands.submission_index <= last.submission_index {
                return Err(BackendError::SubmissionFailed(format!(
                    "submission {} arrived after {}",
                    commands.submission_index, last.submission_index
                )));
            }
        }

        log::trace!(
            "RecordingBackend: submitting '{}' ({} commands)",
            commands.label,
            commands.len()
        );

        self.events.push(BackendEvent::Submit {
            label: commands.label.clone(),
            submission_index: commands.submission_index,
        });
        self.submissions.push(commands);
        Ok(())
    }

    fn cull(&mut self, camera: &Camera) -> BackendResult<VisibleSet> {
        let renderers: Vec<VisibleRenderer> = self
            .scene
            .iter()
            .filter(|r| camera.culling_mask & (1 << (r.layer % 32)) != 0)
            .map(|r| VisibleRenderer {
                id: r.id,
                queue: r.queue,
                distance: Vec3::distance(r.position, camera.position),
            })
            .collect();

        self.events.push(BackendEvent::Cull {
            camera: camera.name.clone(),
            visible: renderers.len(),
        });
        Ok(VisibleSet { renderers })
    }
}
