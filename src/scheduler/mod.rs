//! Per-camera frame scheduling.
//!
//! For every camera in a frame the scheduler opens a fresh graph, lets each
//! registered feature record its passes, compiles the graph and executes it
//! against the backend. The graph is torn down afterwards whether or not the
//! camera rendered.
//!
//! # Example
//!
//! ```ignore
//! let mut scheduler = FrameScheduler::with_default_features(PipelineConfig::default());
//! let report = scheduler.render_frame(&cameras, &mut backend);
//! for camera in &report.cameras {
//!     println!("{}: {:?}", camera.camera, camera.outcome);
//! }
//! ```

use std::fmt;
use std::sync::Arc;

use crate::backend::*;
use crate::config::PipelineConfig;
use crate::error::{GraphError, GraphResult};
use crate::pipeline::{register_default_features, FrameBlackboard};
use crate::registry::PassRegistry;
use crate::render_graph::*;

/// Scheduler state while rendering one camera.
///
/// Cycles `Idle → Recording → Compiled → Executing → Idle`; every failure
/// returns straight to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchedulerState {
    #[default]
    Idle,
    Recording,
    Compiled,
    Executing,
}

impl fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SchedulerState::Idle => "idle",
            SchedulerState::Recording => "recording",
            SchedulerState::Compiled => "compiled",
            SchedulerState::Executing => "executing",
        };
        f.write_str(name)
    }
}

/// What happened to one camera in a frame
#[derive(Debug)]
pub enum CameraOutcome {
    Rendered(ExecutionReport),
    /// Skipped before any graph was built
    Abandoned(&'static str),
    /// The camera's graph failed; the camera is skipped for this frame
    Failed(GraphError),
}

impl CameraOutcome {
    pub fn is_rendered(&self) -> bool {
        matches!(self, CameraOutcome::Rendered(_))
    }
}

#[derive(Debug)]
pub struct CameraReport {
    pub camera: String,
    pub outcome: CameraOutcome,
}

/// Result of one `render_frame` call
#[derive(Debug, Default)]
pub struct FrameReport {
    pub frame_index: u64,
    pub cameras: Vec<CameraReport>,
}

impl FrameReport {
    pub fn rendered(&self) -> usize {
        self.cameras.iter().filter(|c| c.outcome.is_rendered()).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &GraphError)> {
        self.cameras.iter().filter_map(|c| match &c.outcome {
            CameraOutcome::Failed(err) => Some((c.camera.as_str(), err)),
            _ => None,
        })
    }

    pub fn outcome(&self, camera: &str) -> Option<&CameraOutcome> {
        self.cameras
            .iter()
            .find(|c| c.camera == camera)
            .map(|c| &c.outcome)
    }
}

/// Drives the per-camera record, compile, execute, teardown loop
pub struct FrameScheduler {
    registry: Arc<PassRegistry>,
    config: PipelineConfig,
    executor: GraphExecutor,
    state: SchedulerState,
    frame_index: u64,
}

impl FrameScheduler {
    pub fn new(registry: Arc<PassRegistry>, config: PipelineConfig) -> Self {
        Self {
            registry,
            config,
            executor: GraphExecutor::new(),
            state: SchedulerState::Idle,
            frame_index: 0,
        }
    }

    /// Scheduler with a private registry holding the base and composite passes.
    pub fn with_default_features(config: PipelineConfig) -> Self {
        let registry = Arc::new(PassRegistry::new());
        register_default_features(&registry, &config);
        Self::new(registry, config)
    }

    pub fn registry(&self) -> &Arc<PassRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// Index of the next frame to render
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// Render every camera once.
    ///
    /// Per-camera failures are logged and reported; they never stop the
    /// remaining cameras.
    pub fn render_frame(&mut self, cameras: &[Camera], backend: &mut dyn Backend) -> FrameReport {
        crate::profile_scope!("render_frame");

        let mut report = FrameReport {
            frame_index: self.frame_index,
            cameras: Vec::with_capacity(cameras.len()),
        };

        for camera in cameras {
            let outcome = self.render_camera(camera, backend);
            match &outcome {
                CameraOutcome::Failed(err) => log::error!(
                    "Frame {}: camera '{}' skipped: {}",
                    self.frame_index,
                    camera.name,
                    err
                ),
                CameraOutcome::Abandoned(reason) => log::debug!(
                    "Frame {}: camera '{}' abandoned: {}",
                    self.frame_index,
                    camera.name,
                    reason
                ),
                CameraOutcome::Rendered(_) => {}
            }
            report.cameras.push(CameraReport {
                camera: camera.name.clone(),
                outcome,
            });
        }

        self.frame_index += 1;
        crate::frame_mark!();
        report
    }

    fn render_camera(&mut self, camera: &Camera, backend: &mut dyn Backend) -> CameraOutcome {
        if camera.has_empty_viewport() {
            return CameraOutcome::Abandoned("empty viewport");
        }

        let visible = match backend.cull(camera) {
            Ok(visible) => visible,
            Err(err) => return CameraOutcome::Failed(err.into()),
        };

        let mut graph = RenderGraph::with_config(&self.config.graph_name, self.config.graph.clone());
        let result = self.run_graph(&mut graph, camera, visible, backend);
        graph.teardown();
        self.transition(SchedulerState::Idle);

        match result {
            Ok(report) => CameraOutcome::Rendered(report),
            Err(err) => CameraOutcome::Failed(err),
        }
    }

    fn run_graph(
        &mut self,
        graph: &mut RenderGraph,
        camera: &Camera,
        visible: VisibleSet,
        backend: &mut dyn Backend,
    ) -> GraphResult<ExecutionReport> {
        self.transition(SchedulerState::Recording);
        let target = graph.import_resource(
            "Camera Target",
            camera.target,
            TextureDescriptor::new_2d(
                camera.width,
                camera.height,
                camera.target_format,
                TextureUsage::RENDER_ATTACHMENT | TextureUsage::COPY_DST,
            )
            .with_label(camera.name.as_str()),
        )?;

        let mut blackboard = FrameBlackboard::new(
            self.frame_index,
            camera.clone(),
            target,
            self.registry.hook_table(),
        );
        for feature in self.registry.features() {
            feature.record(graph, &mut blackboard)?;
        }

        let plan = graph.compile()?;
        self.transition(SchedulerState::Compiled);
        log::debug!(
            "Camera '{}': {} passes scheduled, {} culled",
            camera.name,
            plan.len(),
            plan.culled_passes().len()
        );

        self.transition(SchedulerState::Executing);
        let frame = FrameContext::for_camera(self.frame_index, camera.clone(), visible);
        self.executor.execute(graph, &plan, backend, &frame)
    }

    fn transition(&mut self, next: SchedulerState) {
        log::trace!("FrameScheduler: {} -> {}", self.state, next);
        self.state = next;
    }
}

impl fmt::Debug for FrameScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameScheduler")
            .field("registry", &self.registry)
            .field("state", &self.state)
            .field("frame_index", &self.frame_index)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera(name: &str, width: u32, height: u32) -> Camera {
        Camera::new(name, width, height, BackendResource::from_raw(1))
    }

    #[test]
    fn test_renders_camera_with_default_features() {
        let mut scheduler = FrameScheduler::with_default_features(PipelineConfig::default());
        let mut backend = RecordingBackend::new();

        let report = scheduler.render_frame(&[camera("Main", 320, 180)], &mut backend);

        assert_eq!(report.frame_index, 0);
        assert_eq!(report.rendered(), 1);
        match report.outcome("Main") {
            Some(CameraOutcome::Rendered(exec)) => {
                assert_eq!(exec.executed, vec!["Base Pass", "Add Pass"]);
                assert_eq!(exec.materialized, exec.released);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(scheduler.state(), SchedulerState::Idle);
        assert_eq!(scheduler.frame_index(), 1);
        assert_eq!(backend.live_resources(), 0);
    }

    #[test]
    fn test_empty_viewport_abandoned() {
        let mut scheduler = FrameScheduler::with_default_features(PipelineConfig::default());
        let mut backend = RecordingBackend::new();

        let report = scheduler.render_frame(&[camera("Empty", 0, 240)], &mut backend);

        assert!(matches!(
            report.outcome("Empty"),
            Some(CameraOutcome::Abandoned(_))
        ));
        assert!(backend.events().is_empty());
    }

    #[test]
    fn test_empty_registry_renders_nothing() {
        let mut scheduler =
            FrameScheduler::new(Arc::new(PassRegistry::new()), PipelineConfig::default());
        let mut backend = RecordingBackend::new();

        let report = scheduler.render_frame(&[camera("Main", 64, 64)], &mut backend);
        match report.outcome("Main") {
            Some(CameraOutcome::Rendered(exec)) => assert!(exec.executed.is_empty()),
            other => panic!("unexpected outcome {:?}", other),
        }
        assert!(backend.submissions().is_empty());
    }
}
