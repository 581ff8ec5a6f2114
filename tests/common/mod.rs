//! Shared helpers for integration tests.

#![allow(dead_code)]

use frame_graph::backend::*;
use frame_graph::render_graph::*;

/// Route `log` output through the test harness.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Camera-sized color target description.
pub fn color(label: &str) -> TextureDescriptor {
    TextureDescriptor::new_2d(
        256,
        256,
        TextureFormat::Rgba16Float,
        TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING,
    )
    .with_label(label)
}

/// Import a caller-owned final target into `graph`.
pub fn import_target(graph: &mut RenderGraph, raw: u64) -> ResourceHandle {
    graph
        .import_resource("Final Target", BackendResource::from_raw(raw), color("Final Target"))
        .expect("import final target")
}

/// Declare a pass that reads `reads`, writes `writes` and records nothing.
pub fn add_pass(
    graph: &mut RenderGraph,
    name: &str,
    reads: &[ResourceHandle],
    writes: &[ResourceHandle],
) -> PassHandle {
    let mut builder = graph.add_pass(name, name).expect("graph is recording");
    for &resource in reads {
        builder.read(resource).expect("read");
    }
    for (slot, &resource) in writes.iter().enumerate() {
        builder.write(resource, slot as u32).expect("write");
    }
    builder.set_execute((), |_, _| Ok(()));
    builder.handle()
}

/// Names of the passes in `plan`, in execution order.
pub fn plan_names(graph: &RenderGraph, plan: &CompiledPlan) -> Vec<String> {
    plan.pass_order()
        .iter()
        .map(|&pass| graph.pass(pass).expect("pass exists").name().to_string())
        .collect()
}

pub fn renderer(id: u32, z: f32, queue: u32) -> Renderer {
    Renderer {
        id,
        position: glam::Vec3::new(0.0, 0.0, z),
        queue,
        layer: 0,
    }
}

/// Recording backend that fails culling for one camera.
#[derive(Debug, Default)]
pub struct FailingCullBackend {
    pub inner: RecordingBackend,
    pub failing_camera: String,
}

impl FailingCullBackend {
    pub fn new(failing_camera: &str) -> Self {
        Self {
            inner: RecordingBackend::new(),
            failing_camera: failing_camera.to_string(),
        }
    }
}

impl Backend for FailingCullBackend {
    fn name(&self) -> &str {
        "Failing Cull Backend"
    }

    fn allocate_resource(&mut self, desc: &ResourceDescriptor) -> BackendResult<BackendResource> {
        self.inner.allocate_resource(desc)
    }

    fn release_resource(&mut self, resource: BackendResource) {
        self.inner.release_resource(resource)
    }

    fn submit(&mut self, commands: CommandSequence) -> BackendResult<()> {
        self.inner.submit(commands)
    }

    fn cull(&mut self, camera: &Camera) -> BackendResult<VisibleSet> {
        if camera.name == self.failing_camera {
            return Err(BackendError::CullingFailed(camera.name.clone()));
        }
        self.inner.cull(camera)
    }
}
