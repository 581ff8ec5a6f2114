//! Composite pass: `albedo + emission` into the camera target.

use crate::backend::Command;
use crate::config::{PassConfig, PipelineConfig};
use crate::error::GraphResult;
use crate::pipeline::{FrameBlackboard, RenderFeature, ALBEDO, EMISSION};
use crate::render_graph::RenderGraph;

/// Final color pass writing the camera target
#[derive(Debug, Clone)]
pub struct CompositePass {
    pass: PassConfig,
}

impl CompositePass {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            pass: config.composite_pass.clone(),
        }
    }
}

impl RenderFeature for CompositePass {
    fn name(&self) -> &str {
        &self.pass.name
    }

    fn record(&self, graph: &mut RenderGraph, frame: &mut FrameBlackboard) -> GraphResult<()> {
        let (Some(albedo), Some(emission)) = (frame.get(ALBEDO), frame.get(EMISSION)) else {
            log::warn!(
                "'{}' skipped: no albedo or emission target was published",
                self.pass.name
            );
            return Ok(());
        };

        let mut builder = graph.add_pass(&self.pass.name, &self.pass.profiling_tag)?;
        let albedo = builder.read(albedo)?;
        let emission = builder.read(emission)?;
        let target = builder.write(frame.target, 0)?;

        let shader = self.pass.shader.clone();
        builder.set_execute(
            (albedo, emission, target, shader),
            |(albedo, emission, target, shader), ctx| {
                let sources = vec![ctx.resource(*albedo)?, ctx.resource(*emission)?];
                let destination = ctx.resource(*target)?;
                ctx.record(Command::Blit {
                    sources,
                    destination,
                    shader: shader.clone(),
                });
                Ok(())
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::*;
    use crate::registry::HookTable;

    #[test]
    fn test_skipped_without_base_pass() {
        let mut graph = RenderGraph::new("test");
        let camera = Camera::new("cam", 64, 64, BackendResource::from_raw(1));
        let target = graph
            .import_resource(
                "Camera Target",
                camera.target,
                TextureDescriptor::new_2d(64, 64, camera.target_format, TextureUsage::RENDER_ATTACHMENT),
            )
            .unwrap();
        let mut frame = FrameBlackboard::new(0, camera, target, HookTable::default());

        CompositePass::new(&PipelineConfig::default())
            .record(&mut graph, &mut frame)
            .unwrap();
        assert_eq!(graph.pass_count(), 0);
    }
}
