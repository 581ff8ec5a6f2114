//! Frame Graph - An engine-independent render graph scheduler
//!
//! Passes declare the resources they create, read and write; the graph derives
//! execution order, removes passes whose results are never observed, and
//! bounds each transient resource to the steps that use it.
//!
//! # Features
//! - Scoped pass recording with capability-restricted execution callbacks
//! - Deterministic compilation: topological order, dead-pass culling, lifetimes
//! - Transient resources materialized and released around their first and last use
//! - Per-camera frame scheduling with registered render features and hooks
//! - A recording backend for tests and tooling
//!
//! # Frame lifecycle
//!
//! ```ignore
//! let mut graph = RenderGraph::new("frame");
//! let backbuffer = graph.import_resource("Backbuffer", target, target_desc)?;
//! {
//!     let mut builder = graph.add_pass("Add Pass", "Add Pass Profiler")?;
//!     let target = builder.write(backbuffer, 0)?;
//!     builder.set_execute(target, |target, ctx| {
//!         let destination = ctx.resource(*target)?;
//!         ctx.record(Command::Clear { target: destination, value: ClearValue::Depth(1.0) });
//!         Ok(())
//!     });
//! }
//! let plan = graph.compile()?;
//! GraphExecutor::new().execute(&mut graph, &plan, &mut backend, &FrameContext::default())?;
//! graph.teardown();
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod profiling;
pub mod registry;
pub mod render_graph;
pub mod scheduler;

pub use backend::{Backend, BackendError, BackendResource, RecordingBackend};
pub use config::{GraphConfig, OrphanPolicy, PassConfig, PipelineConfig};
pub use error::{GraphError, GraphResult, PassError, PassResult};
pub use pipeline::{FrameBlackboard, RenderFeature};
pub use registry::{HookPoint, PassRegistry, Registration};
pub use render_graph::{
    CompiledPlan, ExecutionReport, FrameContext, GraphExecutor, PassBuilder, PassContext,
    RenderGraph, ResourceHandle,
};
pub use scheduler::{CameraOutcome, FrameReport, FrameScheduler, SchedulerState};
