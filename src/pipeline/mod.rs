//! Sample forward pipeline
//!
//! Two render features recorded into every camera's graph:
//! 1. Base pass - Renders opaque and transparent geometry into albedo and
//!    emission targets, firing registered hooks between stages
//! 2. Composite pass - Adds albedo and emission into the camera target

pub mod base_pass;
pub mod composite_pass;

pub use base_pass::BasePass;
pub use composite_pass::CompositePass;

use std::collections::HashMap;
use std::sync::Arc;

use crate::backend::Camera;
use crate::config::PipelineConfig;
use crate::error::GraphResult;
use crate::registry::{HookTable, PassRegistry, Registration};
use crate::render_graph::{RenderGraph, ResourceHandle};

/// Blackboard key of the base pass albedo target
pub const ALBEDO: &str = "albedo";
/// Blackboard key of the base pass emission target
pub const EMISSION: &str = "emission";

/// Registry order of the base pass
pub const BASE_PASS_ORDER: i32 = 0;
/// Registry order of the composite pass
pub const COMPOSITE_PASS_ORDER: i32 = 100;

/// Something that records passes into a camera's graph every frame.
pub trait RenderFeature: Send + Sync {
    fn name(&self) -> &str;

    /// Declare this feature's passes. Handles other features need are
    /// published on the blackboard.
    fn record(&self, graph: &mut RenderGraph, frame: &mut FrameBlackboard) -> GraphResult<()>;
}

/// Per-camera state shared between features while a graph is recorded
#[derive(Debug)]
pub struct FrameBlackboard {
    pub frame_index: u64,
    pub camera: Camera,
    /// The imported camera target
    pub target: ResourceHandle,
    /// Hooks captured for this graph
    pub hooks: HookTable,
    entries: HashMap<&'static str, ResourceHandle>,
}

impl FrameBlackboard {
    pub fn new(frame_index: u64, camera: Camera, target: ResourceHandle, hooks: HookTable) -> Self {
        Self {
            frame_index,
            camera,
            target,
            hooks,
            entries: HashMap::new(),
        }
    }

    /// Publish a resource under `key`, replacing any earlier entry
    pub fn insert(&mut self, key: &'static str, handle: ResourceHandle) {
        self.entries.insert(key, handle);
    }

    pub fn get(&self, key: &str) -> Option<ResourceHandle> {
        self.entries.get(key).copied()
    }
}

/// Register the base and composite passes.
pub fn register_default_features(
    registry: &PassRegistry,
    config: &PipelineConfig,
) -> [Registration; 2] {
    [
        registry.register_feature(BASE_PASS_ORDER, Arc::new(BasePass::new(config))),
        registry.register_feature(COMPOSITE_PASS_ORDER, Arc::new(CompositePass::new(config))),
    ]
}
