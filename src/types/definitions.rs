use std::hash::{Hash, Hasher};

#[cfg(feature = "serde-support")]
use serde::{Deserialize, Serialize};

use super::*;
use crate::{DecimalF32, ResourceFlags, ShaderStageReflection, Texture};

bitflags::bitflags! {
    pub struct ResourceUsage: u16 {
        // buffer
        const HAS_CONST_BUFFER_VIEW = 0x0001;
        // buffer/texture
        const HAS_SHADER_RESOURCE_VIEW = 0x0002;
        // buffer/texture
        const HAS_UNORDERED_ACCESS_VIEW = 0x0004;
        // buffer/texture
        const HAS_RENDER_TARGET_VIEW = 0x0008;
        // texture
        const HAS_DEPTH_STENCIL_VIEW = 0x0010;
        // buffer
        const HAS_VERTEX_BUFFER = 0x0020;
        // buffer
        const HAS_INDEX_BUFFER = 0x0040;
        // buffer
        const HAS_INDIRECT_BUFFER  = 0x0080;
        // meta
        const BUFFER_ONLY_USAGE_FLAGS =
            Self::HAS_CONST_BUFFER_VIEW.bits|
            Self::HAS_VERTEX_BUFFER.bits|
            Self::HAS_INDEX_BUFFER.bits|
            Self::HAS_INDIRECT_BUFFER.bits;
        const TEXTURE_ONLY_USAGE_FLAGS =
            Self::HAS_DEPTH_STENCIL_VIEW.bits;
    }
}

/// Used to create a `Buffer`
#[derive(Clone, Debug)]
pub struct BufferDef {
    pub size: u64,
    pub memory_usage: MemoryUsage,
    pub queue_type: QueueType,
    pub usage_flags: ResourceUsage,
}

impl Default for BufferDef {
    fn default() -> Self {
        Self {
            size: 0,
            memory_usage: MemoryUsage::Unknown,
            queue_type: QueueType::Graphics,
            usage_flags: ResourceUsage::empty(),
        }
    }
}

impl BufferDef {
    pub fn verify(&self) {
        assert_ne!(self.size, 0);
        assert!(!self
            .usage_flags
            .intersects(ResourceUsage::TEXTURE_ONLY_USAGE_FLAGS));
    }

    pub fn for_vertex_buffer(size: usize) -> Self {
        Self {
            size: size as u64,
            memory_usage: MemoryUsage::GpuOnly,
            queue_type: QueueType::Graphics,
            usage_flags: ResourceUsage::HAS_VERTEX_BUFFER,
        }
    }

    pub fn for_index_buffer(size: usize) -> Self {
        Self {
            size: size as u64,
            memory_usage: MemoryUsage::GpuOnly,
            queue_type: QueueType::Graphics,
            usage_flags: ResourceUsage::HAS_INDEX_BUFFER,
        }
    }
}

/// Used to create a `Texture`
#[derive(Clone, Debug)]
pub struct TextureDef {
    pub extents: Extents3D,
    pub array_length: u32,
    pub mip_count: u32,
    pub sample_count: SampleCount,
    pub format: Format,
    pub usage_flags: ResourceUsage,
    pub resource_flags: ResourceFlags,
    pub mem_usage: MemoryUsage,
}

impl Default for TextureDef {
    fn default() -> Self {
        Self {
            extents: Extents3D {
                width: 0,
                height: 0,
                depth: 0,
            },
            array_length: 1,
            mip_count: 1,
            sample_count: SampleCount::SampleCount1,
            format: Format::UNDEFINED,
            usage_flags: ResourceUsage::empty(),
            resource_flags: ResourceFlags::empty(),
            mem_usage: MemoryUsage::GpuOnly,
        }
    }
}

impl TextureDef {
    pub fn is_2d(&self) -> bool {
        self.extents.depth == 1
    }

    pub fn is_3d(&self) -> bool {
        self.extents.depth > 1
    }

    pub fn is_cube(&self) -> bool {
        self.resource_flags.contains(ResourceFlags::TEXTURE_CUBE)
    }

    /// The subresource extents implied by this definition. Cube textures
    /// expose six faces per array element.
    pub fn subresource_layout(&self) -> SubresourceLayout {
        let (num_surfaces, num_faces) = if self.is_cube() {
            (self.array_length / 6, 6)
        } else {
            (self.array_length, 1)
        };
        SubresourceLayout::new(num_surfaces, num_faces, self.extents.depth, self.mip_count)
    }

    pub fn verify(&self) {
        assert!(self.extents.width > 0);
        assert!(self.extents.height > 0);
        assert!(self.extents.depth > 0);
        assert!(self.array_length > 0);
        assert!(self.mip_count > 0);
        assert!(
            self.mip_count <= 1 + (self.extents.width.max(self.extents.height) as f32).log2() as u32
        );

        assert!(!self
            .usage_flags
            .intersects(ResourceUsage::BUFFER_ONLY_USAGE_FLAGS));

        if self.resource_flags.contains(ResourceFlags::TEXTURE_CUBE) {
            assert_eq!(self.array_length % 6, 0);
        }

        assert!(
            !(self.format.has_depth()
                && self
                    .usage_flags
                    .intersects(ResourceUsage::HAS_UNORDERED_ACCESS_VIEW)),
            "Cannot use depth stencil as UAV"
        );
        if self
            .usage_flags
            .contains(ResourceUsage::HAS_DEPTH_STENCIL_VIEW)
        {
            assert!(self.format.has_depth());
        }
    }
}

/// Used to create a `Sampler`
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub struct SamplerDef {
    #[cfg_attr(feature = "serde-support", serde(default))]
    pub min_filter: FilterType,
    #[cfg_attr(feature = "serde-support", serde(default))]
    pub mag_filter: FilterType,
    #[cfg_attr(feature = "serde-support", serde(default))]
    pub mip_map_mode: MipMapMode,
    #[cfg_attr(feature = "serde-support", serde(default))]
    pub address_mode_u: AddressMode,
    #[cfg_attr(feature = "serde-support", serde(default))]
    pub address_mode_v: AddressMode,
    #[cfg_attr(feature = "serde-support", serde(default))]
    pub address_mode_w: AddressMode,
    #[cfg_attr(feature = "serde-support", serde(default))]
    pub mip_lod_bias: f32,
    #[cfg_attr(feature = "serde-support", serde(default))]
    pub max_anisotropy: f32,
    #[cfg_attr(feature = "serde-support", serde(default))]
    pub compare_op: CompareOp,
    #[cfg_attr(feature = "serde-support", serde(default))]
    pub compare_enable: bool,
    //NOTE: Custom hash impl, don't forget to add changes there too!
}

impl SamplerDef {
    /// Comparison samplers are baked into the root signature as static
    /// samplers instead of occupying sampler-table slots.
    pub fn is_comparison(&self) -> bool {
        self.compare_enable
    }
}

impl Eq for SamplerDef {}
impl PartialEq for SamplerDef {
    fn eq(&self, other: &Self) -> bool {
        self.min_filter == other.min_filter
            && self.mag_filter == other.mag_filter
            && self.mip_map_mode == other.mip_map_mode
            && self.address_mode_u == other.address_mode_u
            && self.address_mode_v == other.address_mode_v
            && self.address_mode_w == other.address_mode_w
            && DecimalF32(self.mip_lod_bias) == DecimalF32(other.mip_lod_bias)
            && DecimalF32(self.max_anisotropy) == DecimalF32(other.max_anisotropy)
            && self.compare_op == other.compare_op
            && self.compare_enable == other.compare_enable
    }
}

impl Hash for SamplerDef {
    fn hash<H: Hasher>(&self, mut state: &mut H) {
        self.min_filter.hash(&mut state);
        self.mag_filter.hash(&mut state);
        self.mip_map_mode.hash(&mut state);
        self.address_mode_u.hash(&mut state);
        self.address_mode_v.hash(&mut state);
        self.address_mode_w.hash(&mut state);
        DecimalF32(self.mip_lod_bias).hash(&mut state);
        DecimalF32(self.max_anisotropy).hash(&mut state);
        self.compare_op.hash(&mut state);
        self.compare_enable.hash(&mut state);
    }
}

/// Describes an attribute within a `VertexLayout`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VertexLayoutAttribute {
    /// Format of the attribute
    pub format: Format,
    /// Which buffer the attribute is contained in
    pub buffer_index: u32,
    /// Affects what input variable within the shader the attribute is assigned
    pub location: u32,
    /// The byte offset of the attribute within the buffer
    pub byte_offset: u32,
    /// Name of the attribute in the shader input signature
    pub semantic: String,
}

/// Describes a buffer that provides vertex attribute data (See `VertexLayout`)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VertexLayoutBuffer {
    pub stride: u32,
    pub rate: VertexAttributeRate,
}

/// Describes how vertex attributes are laid out within one or more buffers
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct VertexLayout {
    pub attributes: Vec<VertexLayoutAttribute>,
    pub buffers: Vec<VertexLayoutBuffer>,
}

impl VertexLayout {
    /// Stable hash of the layout, combined with the shader code to key the
    /// renderer cache.
    pub fn layout_hash(&self) -> u32 {
        let mut hasher = fnv::FnvHasher::default();
        self.hash(&mut hasher);
        hasher.finish() as u32
    }
}

/// Configures blend state for a particular render target
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub struct BlendStateRenderTarget {
    pub src_factor: BlendFactor,
    pub dst_factor: BlendFactor,
    pub src_factor_alpha: BlendFactor,
    pub dst_factor_alpha: BlendFactor,
    pub blend_op: BlendOp,
    pub blend_op_alpha: BlendOp,
    pub masks: ColorFlags,
}

impl Default for BlendStateRenderTarget {
    fn default() -> Self {
        Self {
            blend_op: BlendOp::Add,
            blend_op_alpha: BlendOp::Add,
            src_factor: BlendFactor::One,
            src_factor_alpha: BlendFactor::One,
            dst_factor: BlendFactor::Zero,
            dst_factor_alpha: BlendFactor::Zero,
            masks: ColorFlags::ALL,
        }
    }
}

impl BlendStateRenderTarget {
    pub fn default_alpha_disabled() -> Self {
        Default::default()
    }

    pub fn default_alpha_enabled() -> Self {
        Self {
            src_factor: BlendFactor::SrcAlpha,
            dst_factor: BlendFactor::OneMinusSrcAlpha,
            src_factor_alpha: BlendFactor::One,
            dst_factor_alpha: BlendFactor::Zero,
            blend_op: BlendOp::Add,
            blend_op_alpha: BlendOp::Add,
            masks: ColorFlags::ALL,
        }
    }

    pub fn blend_enabled(&self) -> bool {
        self.src_factor != BlendFactor::One
            || self.src_factor_alpha != BlendFactor::One
            || self.dst_factor != BlendFactor::Zero
            || self.dst_factor_alpha != BlendFactor::Zero
    }
}

/// Update frequency buckets for shader uniforms. Affects root-parameter
/// promotion priority and which constant data is re-uploaded per draw.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub enum UniformGroup {
    PerDraw,
    PerRendererChange,
    Manual,
}

/// The data type of an application-declared shader uniform.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub enum UniformFormat {
    Float,
    Float2,
    Float4,
    Float16,
    Int,
    Uint,
    Texture,
    TextureSubresource,
    Buffer,
    BufferSubresource,
    Sampler,
}

impl UniformFormat {
    pub fn is_texture(self) -> bool {
        matches!(self, Self::Texture | Self::TextureSubresource)
    }

    pub fn is_buffer(self) -> bool {
        matches!(self, Self::Buffer | Self::BufferSubresource)
    }

    /// Whether the uniform selects an individual subresource view rather
    /// than a whole-resource view.
    pub fn is_subresource(self) -> bool {
        matches!(self, Self::TextureSubresource | Self::BufferSubresource)
    }
}

/// A uniform the application declares ahead of time for a shader, used to
/// classify the reflected bindings.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub struct UniformDef {
    pub name: String,
    pub format: UniformFormat,
    /// Size in bytes for constant data, element count for resources
    pub size: u32,
    pub group: UniformGroup,
}

/// One compiled stage handed to renderer creation: opaque bytecode plus the
/// reflection data that drives layout building.
#[derive(Debug, Clone)]
pub struct ShaderStageDef {
    pub stage: ShaderStageFlags,
    pub entry_point: String,
    pub bytecode: Vec<u8>,
    pub reflection: ShaderStageReflection,
}

/// The full shader program for one renderer, as returned by the job's shader
/// load callback.
#[derive(Debug, Clone)]
pub struct ShaderProgramDef {
    pub stages: Vec<ShaderStageDef>,
    pub used_uniforms: Vec<UniformDef>,
}

/// How a subpass uses one attachment.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum AttachmentUsage {
    /// Not referenced by the subpass; keeps its previous state
    Unused,
    Color,
    /// Color attachment that is simultaneously readable as an input
    /// attachment
    ColorAndInput,
    Depth,
    ReadOnlyDepth,
    ReadOnlyDepthAndShaderResource,
    ShaderResource,
    /// Contents carried across the subpass without being referenced
    Preserved,
}

/// One render-pass attachment of a job.
#[derive(Clone)]
pub struct AttachmentDef {
    pub texture: Texture,
    pub load_op: LoadOp,
    pub store_op: StoreOp,
    pub clear_color: ColorClearValue,
    pub clear_depth_stencil: DepthStencilClearValue,
    /// The presentable attachment owned by the swapchain; transitions
    /// from/to PRESENT at job boundaries
    pub is_system: bool,
}

/// Per-subpass attachment usages. `usages` is indexed like
/// `JobDef::attachments`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubpassDef {
    pub usages: Vec<AttachmentUsage>,
}

/// Callback resolving a shader code to its compiled program. Returning `None`
/// marks the renderer as failed; draws using it are skipped.
pub type ShaderLoadFn = Box<dyn Fn(u32) -> Option<ShaderProgramDef> + Send + Sync>;

/// Used to create a `Job`
pub struct JobDef {
    pub is_compute: bool,
    pub attachments: Vec<AttachmentDef>,
    pub subpasses: Vec<SubpassDef>,
    pub load_shader: ShaderLoadFn,
}

impl JobDef {
    pub fn verify(&self) {
        if self.is_compute {
            assert!(self.attachments.is_empty());
            assert!(self.subpasses.is_empty());
        } else {
            assert!(!self.subpasses.is_empty());
            assert!(self.attachments.len() <= crate::MAX_RENDER_TARGET_ATTACHMENTS);
            for subpass in &self.subpasses {
                assert_eq!(subpass.usages.len(), self.attachments.len());
            }
            assert!(self.attachments.iter().filter(|a| a.is_system).count() <= 1);
        }
    }
}

/// Per-draw parameters handed to `Job::draw`.
#[derive(Debug, Clone, Default)]
pub struct DrawParams {
    pub index_count: u32,
    pub instance_count: u32,
    pub first_index: u32,
    pub vertex_offset: i32,
    pub first_instance: u32,
}
