//! Graph and pipeline configuration.

/// What the compiler does with a live pass that writes a transient resource
/// nobody reads afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrphanPolicy {
    /// Fail compilation with `GraphError::OrphanedWrite`
    #[default]
    Deny,
    /// Log a warning and keep the write
    Warn,
}

/// Configuration for compiling a single graph
#[derive(Debug, Clone, Default)]
pub struct GraphConfig {
    pub orphan_policy: OrphanPolicy,
}

/// Names and shader identifiers of one pass in the sample pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassConfig {
    /// Pass name, also used as the label of submitted commands
    pub name: String,
    /// Profiling sampler name
    pub profiling_tag: String,
    /// Shader pass tag or shader identifier used by the pass
    pub shader: String,
}

impl PassConfig {
    pub fn new(
        name: impl Into<String>,
        profiling_tag: impl Into<String>,
        shader: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            profiling_tag: profiling_tag.into(),
            shader: shader.into(),
        }
    }
}

/// Configuration for the frame scheduler and the sample pipeline
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Name given to every per-camera graph
    pub graph_name: String,
    /// Render intermediate color targets in sRGB formats
    pub linear_color_space: bool,
    pub base_pass: PassConfig,
    pub composite_pass: PassConfig,
    pub graph: GraphConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            graph_name: "FrameGraph".to_string(),
            linear_color_space: true,
            base_pass: PassConfig::new("Base Pass", "Base Pass Profiler", "BasePass"),
            composite_pass: PassConfig::new(
                "Add Pass",
                "Add Pass Profiler",
                "Hidden/FrameGraph/FinalColor",
            ),
            graph: GraphConfig::default(),
        }
    }
}
