//! Frame graph demo.
//!
//! Renders a few frames of a small scene with the default pipeline against the
//! recording backend and prints what was scheduled.
//!
//! ```bash
//! cargo run --example frame_demo -- --cameras 2 --frames 3
//! RUST_LOG=trace cargo run --example frame_demo -- --hook
//! ```

use clap::Parser;
use glam::Vec3;

use frame_graph::backend::*;
use frame_graph::scheduler::CameraOutcome;
use frame_graph::{FrameScheduler, HookPoint, OrphanPolicy, PipelineConfig};

/// Orphaned write handling for CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
enum CliOrphanPolicy {
    /// Fail the camera's frame.
    #[default]
    Deny,
    /// Log a warning and keep rendering.
    Warn,
}

impl From<CliOrphanPolicy> for OrphanPolicy {
    fn from(cli: CliOrphanPolicy) -> Self {
        match cli {
            CliOrphanPolicy::Deny => OrphanPolicy::Deny,
            CliOrphanPolicy::Warn => OrphanPolicy::Warn,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "frame_demo", about = "Render a test scene through the frame graph")]
struct Args {
    /// Number of frames to render.
    #[arg(long, default_value_t = 2)]
    frames: u64,

    /// Number of cameras rendered each frame.
    #[arg(long, default_value_t = 1)]
    cameras: u32,

    /// Camera target width.
    #[arg(long, default_value_t = 1280)]
    width: u32,

    /// Camera target height.
    #[arg(long, default_value_t = 720)]
    height: u32,

    /// Render intermediate targets in non-sRGB formats.
    #[arg(long)]
    gamma: bool,

    /// Register a hook that draws a debug mesh after opaque geometry.
    #[arg(long)]
    hook: bool,

    /// How orphaned writes are treated.
    #[arg(long, value_enum, default_value_t = CliOrphanPolicy::Deny)]
    orphans: CliOrphanPolicy,
}

fn scene() -> Vec<Renderer> {
    (0..12)
        .map(|i| Renderer {
            id: i,
            position: Vec3::new(i as f32 * 1.5 - 9.0, 0.0, -(i as f32)),
            // Every third renderer is transparent
            queue: if i % 3 == 0 { 3000 } else { 2000 },
            layer: i % 2,
        })
        .collect()
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut config = PipelineConfig {
        linear_color_space: !args.gamma,
        ..PipelineConfig::default()
    };
    config.graph.orphan_policy = args.orphans.into();

    let mut scheduler = FrameScheduler::with_default_features(config);
    if args.hook {
        scheduler
            .registry()
            .register_hook(HookPoint::AfterOpaque, |camera, ctx| {
                ctx.record(Command::DrawMesh {
                    mesh: 0,
                    material: 0,
                    transform: glam::Mat4::from_translation(camera.position),
                });
                Ok(())
            });
    }

    let cameras: Vec<Camera> = (0..args.cameras)
        .map(|i| {
            Camera::new(
                format!("Camera {i}"),
                args.width,
                args.height,
                BackendResource::from_raw(u64::from(i) + 1),
            )
            .with_position(Vec3::new(0.0, 2.0, 10.0 + i as f32))
            .with_culling_mask(if i % 2 == 0 { u32::MAX } else { 1 })
        })
        .collect();

    let mut backend = RecordingBackend::with_scene(scene());

    for _ in 0..args.frames {
        let report = scheduler.render_frame(&cameras, &mut backend);
        println!("frame {}", report.frame_index);
        for camera in &report.cameras {
            match &camera.outcome {
                CameraOutcome::Rendered(exec) => println!(
                    "  {}: {} passes, {} materialized, {} released",
                    camera.camera,
                    exec.executed.len(),
                    exec.materialized,
                    exec.released
                ),
                CameraOutcome::Abandoned(reason) => println!("  {}: abandoned ({reason})", camera.camera),
                CameraOutcome::Failed(err) => println!("  {}: failed ({err})", camera.camera),
            }
        }
    }

    for submission in backend.submissions() {
        println!(
            "#{:<3} {:<10} {} commands",
            submission.submission_index,
            submission.label,
            submission.len()
        );
    }

    println!(
        "{} allocations, {} pooled backings, {:?}",
        backend.allocation_count(),
        backend.pooled_resources(),
        scheduler.registry()
    );
}
