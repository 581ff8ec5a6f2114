//! Base pass for the forward pipeline
//!
//! Renders the visible scene into two color targets:
//! - Albedo (slot 0)
//! - Emission (slot 1)
//!
//! plus a depth buffer that only lives for this pass.

use glam::Vec4;

use crate::backend::*;
use crate::config::{PassConfig, PipelineConfig};
use crate::error::GraphResult;
use crate::pipeline::{FrameBlackboard, RenderFeature, ALBEDO, EMISSION};
use crate::registry::{HookPoint, HookTable};
use crate::render_graph::*;

/// Opaque and transparent geometry pass
#[derive(Debug, Clone)]
pub struct BasePass {
    pass: PassConfig,
    linear_color_space: bool,
}

struct BasePassData {
    albedo: ResolvedHandle,
    emission: ResolvedHandle,
    depth: ResolvedHandle,
    camera: Camera,
    hooks: HookTable,
    shader_pass: String,
}

impl BasePass {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            pass: config.base_pass.clone(),
            linear_color_space: config.linear_color_space,
        }
    }

    fn color_target(&self, camera: &Camera, label: &str) -> TextureDescriptor {
        let format = if self.linear_color_space {
            TextureFormat::Rgba8UnormSrgb
        } else {
            TextureFormat::Rgba8Unorm
        };
        TextureDescriptor::new_2d(
            camera.width,
            camera.height,
            format,
            TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING,
        )
        .with_label(label)
        .with_clear(ClearPolicy::Color(Vec4::W))
    }

    fn depth_target(camera: &Camera) -> TextureDescriptor {
        TextureDescriptor::new_2d(
            camera.width,
            camera.height,
            TextureFormat::Depth24PlusStencil8,
            TextureUsage::RENDER_ATTACHMENT,
        )
        .with_label("Depth")
        .with_clear(ClearPolicy::Depth(1.0))
    }
}

impl RenderFeature for BasePass {
    fn name(&self) -> &str {
        &self.pass.name
    }

    fn record(&self, graph: &mut RenderGraph, frame: &mut FrameBlackboard) -> GraphResult<()> {
        let mut builder = graph.add_pass(&self.pass.name, &self.pass.profiling_tag)?;

        let albedo = builder.create(self.color_target(&frame.camera, "Albedo"))?;
        let emission = builder.create(self.color_target(&frame.camera, "Emission"))?;
        let depth = builder.create(Self::depth_target(&frame.camera))?;

        let data = BasePassData {
            albedo: builder.write(albedo, 0)?,
            emission: builder.write(emission, 1)?,
            // Depth-tested drawing reads what earlier draws wrote
            depth: builder.read_write(depth)?,
            camera: frame.camera.clone(),
            hooks: frame.hooks.clone(),
            shader_pass: self.pass.shader.clone(),
        };

        builder.set_execute(data, |data, ctx| {
            let colors = vec![ctx.resource(data.albedo)?, ctx.resource(data.emission)?];
            let depth = ctx.resource(data.depth)?;
            ctx.record(Command::SetRenderTargets {
                colors,
                depth: Some(depth),
            });

            if matches!(data.camera.clear_flags, CameraClearFlags::Skybox) {
                ctx.record(Command::DrawSkybox);
            }
            data.hooks.fire(HookPoint::AfterSkybox, &data.camera, ctx)?;

            ctx.draw_visible_set(
                &data.shader_pass,
                SortCriteria::CommonOpaque,
                RenderQueueRange::OPAQUE,
            )?;
            data.hooks.fire(HookPoint::AfterOpaque, &data.camera, ctx)?;

            ctx.draw_visible_set(
                &data.shader_pass,
                SortCriteria::CommonTransparent,
                RenderQueueRange::TRANSPARENT,
            )?;
            data.hooks.fire(HookPoint::AfterTransparent, &data.camera, ctx)?;

            Ok(())
        });
        drop(builder);

        frame.insert(ALBEDO, albedo);
        frame.insert(EMISSION, emission);
        Ok(())
    }
}
