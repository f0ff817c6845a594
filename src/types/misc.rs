use std::hash::{Hash, Hasher};

#[cfg(feature = "serde-support")]
use serde::{Deserialize, Serialize};

use crate::DecimalF32;

/// Used to indicate which type of queue to use. Some operations require certain
/// types of queues.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum QueueType {
    /// Graphics queues generally supports all operations and are a safe default
    /// choice
    Graphics,

    /// Compute queues can be used for compute-based work.
    Compute,
}

bitflags::bitflags! {
    /// The current state of a resource. When an operation is performed that references a resource,
    /// it must be in the correct state. Resources are moved between state using barriers.
    pub struct ResourceState: u32 {
        const UNDEFINED = 0;
        const VERTEX_AND_CONSTANT_BUFFER = 0x1;
        const INDEX_BUFFER = 0x2;
        /// Similar to vulkan's COLOR_ATTACHMENT_OPTIMAL image layout
        const RENDER_TARGET = 0x4;
        const UNORDERED_ACCESS = 0x8;
        /// Similar to vulkan's DEPTH_STENCIL_ATTACHMENT_OPTIMAL image layout
        const DEPTH_WRITE = 0x10;
        const DEPTH_READ = 0x20;
        const NON_PIXEL_SHADER_RESOURCE = 0x40;
        const PIXEL_SHADER_RESOURCE = 0x80;
        /// Similar to vulkan's SHADER_READ_ONLY_OPTIMAL image layout
        const SHADER_RESOURCE = 0x40 | 0x80;
        const INDIRECT_ARGUMENT = 0x200;
        /// Similar to vulkan's TRANSFER_DST_OPTIMAL image layout
        const COPY_DST = 0x400;
        /// Similar to vulkan's TRANSFER_SRC_OPTIMAL image layout
        const COPY_SRC = 0x800;
        /// Similar to vulkan's PRESENT_SRC_KHR image layout
        const PRESENT = 0x1000;
        /// Similar to vulkan's COMMON image layout
        const COMMON = 0x2000;
    }
}

/// A 3d size for windows, textures, etc.
#[derive(Default, Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Extents3D {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
}

/// Number of MSAA samples to use. 1xMSAA and 4xMSAA are most broadly supported
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub enum SampleCount {
    SampleCount1,
    SampleCount2,
    SampleCount4,
    SampleCount8,
    SampleCount16,
}

impl Default for SampleCount {
    fn default() -> Self {
        Self::SampleCount1
    }
}

bitflags::bitflags! {
    /// Indicates how a resource will be used. In some cases, multiple flags are allowed.
    #[derive(Default)]
    #[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
    pub struct ResourceFlags: u32 {
        const TEXTURE_CUBE = 1<<12;
    }
}

bitflags::bitflags! {
    /// Flags for enabling/disabling color channels in the blend write mask
    #[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
    pub struct ColorFlags: u8 {
        const RED = 1;
        const GREEN = 2;
        const BLUE = 4;
        const ALPHA = 8;
        const ALL = 0x0F;
    }
}

impl Default for ColorFlags {
    fn default() -> Self {
        Self::ALL
    }
}

/// Indicates how the memory will be accessed and affects where in memory it
/// needs to be allocated.
#[derive(Clone, Copy, PartialEq, Debug)]
pub enum MemoryUsage {
    Unknown,

    /// The memory is only accessed by the GPU
    GpuOnly,

    /// The memory is only accessed by the CPU
    CpuOnly,

    /// The memory is written by the CPU and read by the GPU
    CpuToGpu,

    /// The memory is written by the GPU and read by the CPU
    GpuToCpu,
}

bitflags::bitflags! {
    /// Indicates a particular stage of a shader, or set of stages in a shader. Similar to
    /// VkShaderStageFlagBits
    #[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
    pub struct ShaderStageFlags : u32 {
        const VERTEX = 1;
        const FRAGMENT = 16;
        const COMPUTE = 32;
        const ALL_GRAPHICS = 0x1F;
        const ALL = 0x7FFF_FFFF;
    }
}

impl Default for ShaderStageFlags {
    fn default() -> Self {
        Self::empty()
    }
}

/// Indicates the type of pipeline, roughly corresponds with `QueueType`
#[derive(Clone, Copy, PartialEq, Debug)]
pub enum PipelineType {
    Graphics = 0,
    Compute = 1,
}

/// Affects how quickly vertex attributes are consumed from buffers, similar to
/// `vkVertexInputRate`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexAttributeRate {
    Vertex,
    Instance,
}

impl Default for VertexAttributeRate {
    fn default() -> Self {
        Self::Vertex
    }
}

/// Determines if the contents of an image attachment in a renderpass begins
/// with its previous contents, a clear value, or undefined data. Similar to
/// `vkAttachmentLoadOp`
#[derive(Copy, Clone, Debug, Hash, PartialEq)]
pub enum LoadOp {
    DontCare,
    Load,
    Clear,
}

impl Default for LoadOp {
    fn default() -> Self {
        Self::DontCare
    }
}

/// Determines if the contents of an image attachment in a render pass will
/// store the resulting state for use after the render pass
#[derive(Copy, Clone, Debug, Hash, PartialEq)]
pub enum StoreOp {
    /// Do not store the image, leaving the contents of it undefined
    DontCare,

    /// Persist the image's content after a render pass completes
    Store,
}

impl Default for StoreOp {
    fn default() -> Self {
        Self::Store
    }
}

/// How to intepret vertex data into a form of geometry. Similar to
/// `vkPrimitiveTopology`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub enum PrimitiveTopology {
    PointList,
    LineList,
    LineStrip,
    TriangleList,
    TriangleStrip,
}

impl Default for PrimitiveTopology {
    fn default() -> Self {
        Self::TriangleList
    }
}

/// The size of index buffer elements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub enum IndexType {
    Uint32,
    Uint16,
}

impl Default for IndexType {
    fn default() -> Self {
        Self::Uint32
    }
}

/// Affects blending. Similar to `vkBlendFactor`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub enum BlendFactor {
    Zero,
    One,
    SrcColor,
    OneMinusSrcColor,
    DstColor,
    OneMinusDstColor,
    SrcAlpha,
    OneMinusSrcAlpha,
    DstAlpha,
    OneMinusDstAlpha,
    SrcAlphaSaturate,
    ConstantColor,
    OneMinusConstantColor,
}

impl Default for BlendFactor {
    fn default() -> Self {
        Self::Zero
    }
}

/// Affects blending. Similar to `vkBlendOp`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub enum BlendOp {
    Add,
    Subtract,
    ReverseSubtract,
    Min,
    Max,
}

impl Default for BlendOp {
    fn default() -> Self {
        Self::Add
    }
}

/// Affects depth testing and sampling. Similar to `vkCompareOp`
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub enum CompareOp {
    Never,
    Less,
    Equal,
    LessOrEqual,
    Greater,
    NotEqual,
    GreaterOrEqual,
    Always,
}

impl Default for CompareOp {
    fn default() -> Self {
        Self::Never
    }
}

/// Similar to `vkStencilOp`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub enum StencilOp {
    Keep,
    Zero,
    Replace,
    IncrementAndClamp,
    DecrementAndClamp,
    Invert,
    IncrementAndWrap,
    DecrementAndWrap,
}

impl Default for StencilOp {
    fn default() -> Self {
        Self::Keep
    }
}

/// Determines if we cull polygons that are front-facing or back-facing. Facing
/// direction is determined by `FrontFace`, sometimes called "winding order".
/// Similar to `vkCullModeFlags`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub enum CullMode {
    None,
    Back,
    Front,
}

impl Default for CullMode {
    fn default() -> Self {
        Self::None
    }
}

/// Determines what winding order is considered the front face of a polygon.
/// Similar to `vkFrontFace`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub enum FrontFace {
    CounterClockwise,
    Clockwise,
}

impl Default for FrontFace {
    fn default() -> Self {
        Self::CounterClockwise
    }
}

/// Whether to fill in polygons or not. Similar to `vkPolygonMode`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub enum FillMode {
    Solid,
    Wireframe,
}

impl Default for FillMode {
    fn default() -> Self {
        Self::Solid
    }
}

/// Filtering method when sampling. Similar to `vkFilter`
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub enum FilterType {
    /// Finds the closest value in the texture and uses it. Commonly used for
    /// "pixel-perfect" assets.
    Nearest,

    /// "Averages" color values of the texture. A common choice for most cases
    /// but may make some "pixel-perfect" assets appear blurry
    Linear,
}

impl Default for FilterType {
    fn default() -> Self {
        Self::Nearest
    }
}

/// Affects image sampling, particularly for UV coordinates outside the [0, 1]
/// range. Similar to `vkSamplerAddressMode`
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub enum AddressMode {
    Mirror,
    Repeat,
    ClampToEdge,
    ClampToBorder,
}

impl Default for AddressMode {
    fn default() -> Self {
        Self::Mirror
    }
}

/// Similar to `vkSamplerMipmapMode`
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub enum MipMapMode {
    Nearest,
    Linear,
}

impl Default for MipMapMode {
    fn default() -> Self {
        Self::Nearest
    }
}

/// A clear value for color attachments
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct ColorClearValue(pub [f32; 4]);

impl Hash for ColorClearValue {
    fn hash<H: Hasher>(&self, mut state: &mut H) {
        for &value in &self.0 {
            DecimalF32(value).hash(&mut state);
        }
    }
}

/// A clear values for depth/stencil attachments. One or both values may be used
/// depending on the format of the attached image
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DepthStencilClearValue {
    pub depth: f32,
    pub stencil: u32,
}

impl Default for DepthStencilClearValue {
    fn default() -> Self {
        Self {
            depth: 0.0,
            stencil: 0,
        }
    }
}

impl Hash for DepthStencilClearValue {
    fn hash<H: Hasher>(&self, mut state: &mut H) {
        DecimalF32(self.depth).hash(&mut state);
        self.stencil.hash(&mut state);
    }
}

/// A viewport with an explicit depth range. The depth range doubles as the
/// reversed-depth switch, so changing the depth compare direction re-applies
/// the viewport as well.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: 0.0,
            height: 0.0,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }
}

/// A scissor rectangle
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct ScissorRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}
