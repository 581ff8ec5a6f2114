//! Common types shared between the graph core and backends

use crate::backend::traits::BackendResource;
use glam::{Mat4, Vec3, Vec4};

/// Texture format enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    Rgba8Unorm,
    Rgba8UnormSrgb,
    Bgra8Unorm,
    Bgra8UnormSrgb,
    Rgba16Float,
    Rgba32Float,
    Depth32Float,
    Depth24PlusStencil8,
    R32Float,
    Rg32Float,
}

impl TextureFormat {
    pub fn is_depth(&self) -> bool {
        matches!(
            self,
            TextureFormat::Depth32Float | TextureFormat::Depth24PlusStencil8
        )
    }
}

/// Texture usage flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureUsage(u32);

impl TextureUsage {
    pub const COPY_SRC: Self = Self(1 << 0);
    pub const COPY_DST: Self = Self(1 << 1);
    pub const TEXTURE_BINDING: Self = Self(1 << 2);
    pub const STORAGE_BINDING: Self = Self(1 << 3);
    pub const RENDER_ATTACHMENT: Self = Self(1 << 4);

    pub fn contains(&self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }
}

impl std::ops::BitOr for TextureUsage {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

/// Buffer usage flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferUsage(u32);

impl BufferUsage {
    pub const COPY_SRC: Self = Self(1 << 0);
    pub const COPY_DST: Self = Self(1 << 1);
    pub const UNIFORM: Self = Self(1 << 2);
    pub const STORAGE: Self = Self(1 << 3);
    pub const INDIRECT: Self = Self(1 << 4);

    pub fn contains(&self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }
}

impl std::ops::BitOr for BufferUsage {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

/// What happens to a resource's contents when it is materialized
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum ClearPolicy {
    /// Contents are undefined until the first write
    #[default]
    DontCare,
    /// Clear color attachments to the given color
    Color(Vec4),
    /// Clear depth attachments to the given depth
    Depth(f32),
}

/// Texture descriptor
#[derive(Debug, Clone, PartialEq)]
pub struct TextureDescriptor {
    pub label: Option<String>,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub mip_levels: u32,
    pub sample_count: u32,
    pub format: TextureFormat,
    pub usage: TextureUsage,
    pub clear: ClearPolicy,
}

impl Default for TextureDescriptor {
    fn default() -> Self {
        Self {
            label: None,
            width: 1,
            height: 1,
            depth: 1,
            mip_levels: 1,
            sample_count: 1,
            format: TextureFormat::Rgba8Unorm,
            usage: TextureUsage::TEXTURE_BINDING | TextureUsage::COPY_DST,
            clear: ClearPolicy::DontCare,
        }
    }
}

impl TextureDescriptor {
    /// Create a single-mip 2D texture descriptor
    pub fn new_2d(width: u32, height: u32, format: TextureFormat, usage: TextureUsage) -> Self {
        Self {
            width,
            height,
            format,
            usage,
            ..Default::default()
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_clear(mut self, clear: ClearPolicy) -> Self {
        self.clear = clear;
        self
    }

    /// Number of mips in a full chain for this size
    pub fn max_mip_levels(&self) -> u32 {
        let largest = self.width.max(self.height).max(self.depth);
        32 - largest.leading_zeros()
    }

    fn validate(&self) -> Result<(), String> {
        if self.width == 0 || self.height == 0 || self.depth == 0 {
            return Err(format!(
                "dimensions must be non-zero, got {}x{}x{}",
                self.width, self.height, self.depth
            ));
        }
        if self.mip_levels == 0 || self.mip_levels > self.max_mip_levels() {
            return Err(format!(
                "mip level count {} outside 1..={}",
                self.mip_levels,
                self.max_mip_levels()
            ));
        }
        if self.sample_count == 0 || !self.sample_count.is_power_of_two() {
            return Err(format!("unsupported sample count {}", self.sample_count));
        }
        if self.format.is_depth() && self.depth > 1 {
            return Err(format!("{:?} cannot be used for 3D textures", self.format));
        }
        if self.format.is_depth() && self.usage.contains(TextureUsage::STORAGE_BINDING) {
            return Err(format!("{:?} cannot be bound as storage", self.format));
        }
        if self.sample_count > 1 && self.usage.contains(TextureUsage::STORAGE_BINDING) {
            return Err("multisampled textures cannot be bound as storage".to_string());
        }
        Ok(())
    }
}

/// Buffer descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferDescriptor {
    pub label: Option<String>,
    pub size: u64,
    pub usage: BufferUsage,
}

impl BufferDescriptor {
    pub fn new(size: u64, usage: BufferUsage) -> Self {
        Self {
            label: None,
            size,
            usage,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// Descriptor of any resource the graph can create
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceDescriptor {
    Texture(TextureDescriptor),
    Buffer(BufferDescriptor),
}

impl ResourceDescriptor {
    pub fn label(&self) -> Option<&str> {
        match self {
            ResourceDescriptor::Texture(t) => t.label.as_deref(),
            ResourceDescriptor::Buffer(b) => b.label.as_deref(),
        }
    }

    pub fn clear_policy(&self) -> ClearPolicy {
        match self {
            ResourceDescriptor::Texture(t) => t.clear,
            ResourceDescriptor::Buffer(_) => ClearPolicy::DontCare,
        }
    }

    /// Check that the descriptor names something a backend can allocate
    pub fn validate(&self) -> Result<(), String> {
        match self {
            ResourceDescriptor::Texture(t) => t.validate(),
            ResourceDescriptor::Buffer(b) if b.size == 0 => {
                Err("buffer size must be non-zero".to_string())
            }
            ResourceDescriptor::Buffer(_) => Ok(()),
        }
    }

    /// Same descriptor with the label stripped, used to match pooled allocations
    pub fn without_label(&self) -> ResourceDescriptor {
        let mut desc = self.clone();
        match &mut desc {
            ResourceDescriptor::Texture(t) => t.label = None,
            ResourceDescriptor::Buffer(b) => b.label = None,
        }
        desc
    }
}

impl From<TextureDescriptor> for ResourceDescriptor {
    fn from(desc: TextureDescriptor) -> Self {
        ResourceDescriptor::Texture(desc)
    }
}

impl From<BufferDescriptor> for ResourceDescriptor {
    fn from(desc: BufferDescriptor) -> Self {
        ResourceDescriptor::Buffer(desc)
    }
}

/// How a camera clears its target before drawing
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum CameraClearFlags {
    #[default]
    Skybox,
    SolidColor(Vec4),
    DepthOnly,
    Nothing,
}

/// A camera rendered by the frame scheduler
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub position: Vec3,
    pub view: Mat4,
    pub projection: Mat4,
    pub clear_flags: CameraClearFlags,
    /// Layers this camera sees
    pub culling_mask: u32,
    /// Caller-owned render target, imported into every graph for this camera
    pub target: BackendResource,
    pub target_format: TextureFormat,
}

impl Camera {
    pub fn new(name: impl Into<String>, width: u32, height: u32, target: BackendResource) -> Self {
        let aspect = if height == 0 {
            1.0
        } else {
            width as f32 / height as f32
        };
        Self {
            name: name.into(),
            width,
            height,
            position: Vec3::ZERO,
            view: Mat4::IDENTITY,
            projection: Mat4::perspective_rh(60f32.to_radians(), aspect, 0.1, 1000.0),
            clear_flags: CameraClearFlags::Skybox,
            culling_mask: u32::MAX,
            target,
            target_format: TextureFormat::Bgra8UnormSrgb,
        }
    }

    pub fn with_position(mut self, position: Vec3) -> Self {
        self.position = position;
        self.view = Mat4::look_at_rh(position, Vec3::ZERO, Vec3::Y);
        self
    }

    pub fn with_clear_flags(mut self, clear_flags: CameraClearFlags) -> Self {
        self.clear_flags = clear_flags;
        self
    }

    pub fn with_culling_mask(mut self, mask: u32) -> Self {
        self.culling_mask = mask;
        self
    }

    pub fn has_empty_viewport(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// A renderable object known to the backend's scene
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Renderer {
    pub id: u32,
    pub position: Vec3,
    /// Render queue, opaque geometry sits below 2500
    pub queue: u32,
    pub layer: u32,
}

/// A renderer that survived culling for one camera
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisibleRenderer {
    pub id: u32,
    pub queue: u32,
    /// Distance to the camera
    pub distance: f32,
}

/// Output of backend culling for one camera
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VisibleSet {
    pub renderers: Vec<VisibleRenderer>,
}

impl VisibleSet {
    pub fn len(&self) -> usize {
        self.renderers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.renderers.is_empty()
    }
}

/// Draw ordering applied to a visible set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortCriteria {
    /// Front to back, grouped by queue
    CommonOpaque,
    /// Back to front, grouped by queue
    CommonTransparent,
    None,
}

/// Inclusive range of render queues to draw
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderQueueRange {
    pub min: u32,
    pub max: u32,
}

impl RenderQueueRange {
    pub const OPAQUE: Self = Self { min: 0, max: 2500 };
    pub const TRANSPARENT: Self = Self {
        min: 2501,
        max: 5000,
    };
    pub const ALL: Self = Self {
        min: 0,
        max: u32::MAX,
    };

    pub fn contains(&self, queue: u32) -> bool {
        queue >= self.min && queue <= self.max
    }
}

/// Clear value emitted when a resource is materialized
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClearValue {
    Color(Vec4),
    Depth(f32),
}

/// A backend command recorded by a pass
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Clear {
        target: BackendResource,
        value: ClearValue,
    },
    SetRenderTargets {
        colors: Vec<BackendResource>,
        depth: Option<BackendResource>,
    },
    DrawSkybox,
    DrawRenderers {
        shader_pass: String,
        renderers: Vec<u32>,
    },
    DrawMesh {
        mesh: u32,
        material: u32,
        transform: Mat4,
    },
    Blit {
        sources: Vec<BackendResource>,
        destination: BackendResource,
        shader: String,
    },
    Dispatch {
        kernel: String,
        groups: [u32; 3],
    },
}

/// Commands of one executed pass, submitted as a unit
#[derive(Debug, Clone, PartialEq)]
pub struct CommandSequence {
    pub label: String,
    /// Monotonic across submissions from one executor
    pub submission_index: u64,
    pub commands: Vec<Command>,
}

impl CommandSequence {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            submission_index: 0,
            commands: Vec::new(),
        }
    }

    pub fn push(&mut self, command: Command) {
        self.commands.push(command);
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}
