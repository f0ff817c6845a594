use ash::vk;

use crate::{
    AddressMode, BarrierAccess, BarrierLayout, BarrierStage, BlendFactor, BlendOp, ColorFlags,
    CompareOp, CullMode, FillMode, FilterType, Format, FrontFace, IndexType, LoadOp, MipMapMode,
    PrimitiveTopology, SampleCount, ShaderStageFlags, StencilOp, StoreOp, VertexAttributeRate,
};

impl From<SampleCount> for vk::SampleCountFlags {
    fn from(val: SampleCount) -> Self {
        match val {
            SampleCount::SampleCount1 => Self::TYPE_1,
            SampleCount::SampleCount2 => Self::TYPE_2,
            SampleCount::SampleCount4 => Self::TYPE_4,
            SampleCount::SampleCount8 => Self::TYPE_8,
            SampleCount::SampleCount16 => Self::TYPE_16,
        }
    }
}

impl From<ColorFlags> for vk::ColorComponentFlags {
    fn from(val: ColorFlags) -> Self {
        let mut flags = Self::empty();
        if val.intersects(ColorFlags::RED) {
            flags |= Self::R;
        }
        if val.intersects(ColorFlags::GREEN) {
            flags |= Self::G;
        }
        if val.intersects(ColorFlags::BLUE) {
            flags |= Self::B;
        }
        if val.intersects(ColorFlags::ALPHA) {
            flags |= Self::A;
        }
        flags
    }
}

impl From<ShaderStageFlags> for vk::ShaderStageFlags {
    fn from(val: ShaderStageFlags) -> Self {
        let mut result = Self::empty();

        if val.intersects(ShaderStageFlags::VERTEX) {
            result |= Self::VERTEX;
        }

        if val.intersects(ShaderStageFlags::FRAGMENT) {
            result |= Self::FRAGMENT;
        }

        if val.intersects(ShaderStageFlags::COMPUTE) {
            result |= Self::COMPUTE;
        }

        if val.contains(ShaderStageFlags::ALL_GRAPHICS) {
            result |= Self::ALL_GRAPHICS;
        }

        result
    }
}

impl From<VertexAttributeRate> for vk::VertexInputRate {
    fn from(val: VertexAttributeRate) -> Self {
        match val {
            VertexAttributeRate::Vertex => Self::VERTEX,
            VertexAttributeRate::Instance => Self::INSTANCE,
        }
    }
}

impl From<LoadOp> for vk::AttachmentLoadOp {
    fn from(val: LoadOp) -> Self {
        match val {
            LoadOp::DontCare => Self::DONT_CARE,
            LoadOp::Load => Self::LOAD,
            LoadOp::Clear => Self::CLEAR,
        }
    }
}

impl From<StoreOp> for vk::AttachmentStoreOp {
    fn from(val: StoreOp) -> Self {
        match val {
            StoreOp::DontCare => Self::DONT_CARE,
            StoreOp::Store => Self::STORE,
        }
    }
}

impl From<PrimitiveTopology> for vk::PrimitiveTopology {
    fn from(val: PrimitiveTopology) -> Self {
        match val {
            PrimitiveTopology::PointList => Self::POINT_LIST,
            PrimitiveTopology::LineList => Self::LINE_LIST,
            PrimitiveTopology::LineStrip => Self::LINE_STRIP,
            PrimitiveTopology::TriangleList => Self::TRIANGLE_LIST,
            PrimitiveTopology::TriangleStrip => Self::TRIANGLE_STRIP,
        }
    }
}

impl From<IndexType> for vk::IndexType {
    fn from(val: IndexType) -> Self {
        match val {
            IndexType::Uint32 => Self::UINT32,
            IndexType::Uint16 => Self::UINT16,
        }
    }
}

impl From<BlendFactor> for vk::BlendFactor {
    fn from(val: BlendFactor) -> Self {
        match val {
            BlendFactor::Zero => Self::ZERO,
            BlendFactor::One => Self::ONE,
            BlendFactor::SrcColor => Self::SRC_COLOR,
            BlendFactor::OneMinusSrcColor => Self::ONE_MINUS_SRC_COLOR,
            BlendFactor::DstColor => Self::DST_COLOR,
            BlendFactor::OneMinusDstColor => Self::ONE_MINUS_DST_COLOR,
            BlendFactor::SrcAlpha => Self::SRC_ALPHA,
            BlendFactor::OneMinusSrcAlpha => Self::ONE_MINUS_SRC_ALPHA,
            BlendFactor::DstAlpha => Self::DST_ALPHA,
            BlendFactor::OneMinusDstAlpha => Self::ONE_MINUS_DST_ALPHA,
            BlendFactor::SrcAlphaSaturate => Self::SRC_ALPHA_SATURATE,
            BlendFactor::ConstantColor => Self::CONSTANT_COLOR,
            BlendFactor::OneMinusConstantColor => Self::ONE_MINUS_CONSTANT_COLOR,
        }
    }
}

impl From<BlendOp> for vk::BlendOp {
    fn from(val: BlendOp) -> Self {
        match val {
            BlendOp::Add => Self::ADD,
            BlendOp::Subtract => Self::SUBTRACT,
            BlendOp::ReverseSubtract => Self::REVERSE_SUBTRACT,
            BlendOp::Min => Self::MIN,
            BlendOp::Max => Self::MAX,
        }
    }
}

impl From<CompareOp> for vk::CompareOp {
    fn from(val: CompareOp) -> Self {
        match val {
            CompareOp::Never => Self::NEVER,
            CompareOp::Less => Self::LESS,
            CompareOp::Equal => Self::EQUAL,
            CompareOp::LessOrEqual => Self::LESS_OR_EQUAL,
            CompareOp::Greater => Self::GREATER,
            CompareOp::NotEqual => Self::NOT_EQUAL,
            CompareOp::GreaterOrEqual => Self::GREATER_OR_EQUAL,
            CompareOp::Always => Self::ALWAYS,
        }
    }
}

impl From<StencilOp> for vk::StencilOp {
    fn from(val: StencilOp) -> Self {
        match val {
            StencilOp::Keep => Self::KEEP,
            StencilOp::Zero => Self::ZERO,
            StencilOp::Replace => Self::REPLACE,
            StencilOp::IncrementAndClamp => Self::INCREMENT_AND_CLAMP,
            StencilOp::DecrementAndClamp => Self::DECREMENT_AND_CLAMP,
            StencilOp::Invert => Self::INVERT,
            StencilOp::IncrementAndWrap => Self::INCREMENT_AND_WRAP,
            StencilOp::DecrementAndWrap => Self::DECREMENT_AND_WRAP,
        }
    }
}

impl From<CullMode> for vk::CullModeFlags {
    fn from(val: CullMode) -> Self {
        match val {
            CullMode::None => Self::NONE,
            CullMode::Back => Self::BACK,
            CullMode::Front => Self::FRONT,
        }
    }
}

impl From<FrontFace> for vk::FrontFace {
    fn from(val: FrontFace) -> Self {
        match val {
            FrontFace::CounterClockwise => Self::COUNTER_CLOCKWISE,
            FrontFace::Clockwise => Self::CLOCKWISE,
        }
    }
}

impl From<FillMode> for vk::PolygonMode {
    fn from(val: FillMode) -> Self {
        match val {
            FillMode::Solid => Self::FILL,
            FillMode::Wireframe => Self::LINE,
        }
    }
}

impl From<FilterType> for vk::Filter {
    fn from(val: FilterType) -> Self {
        match val {
            FilterType::Nearest => Self::NEAREST,
            FilterType::Linear => Self::LINEAR,
        }
    }
}

impl From<MipMapMode> for vk::SamplerMipmapMode {
    fn from(val: MipMapMode) -> Self {
        match val {
            MipMapMode::Nearest => Self::NEAREST,
            MipMapMode::Linear => Self::LINEAR,
        }
    }
}

impl From<AddressMode> for vk::SamplerAddressMode {
    fn from(val: AddressMode) -> Self {
        match val {
            AddressMode::Mirror => Self::MIRRORED_REPEAT,
            AddressMode::Repeat => Self::REPEAT,
            AddressMode::ClampToEdge => Self::CLAMP_TO_EDGE,
            AddressMode::ClampToBorder => Self::CLAMP_TO_BORDER,
        }
    }
}

impl From<Format> for vk::Format {
    fn from(val: Format) -> Self {
        match val {
            Format::UNDEFINED => Self::UNDEFINED,
            Format::R8_UNORM => Self::R8_UNORM,
            Format::R8G8_UNORM => Self::R8G8_UNORM,
            Format::R8G8B8A8_UNORM => Self::R8G8B8A8_UNORM,
            Format::R8G8B8A8_SRGB => Self::R8G8B8A8_SRGB,
            Format::B8G8R8A8_UNORM => Self::B8G8R8A8_UNORM,
            Format::R10G10B10A2_UNORM => Self::A2B10G10R10_UNORM_PACK32,
            Format::R11G11B10_FLOAT => Self::B10G11R11_UFLOAT_PACK32,
            Format::R16_FLOAT => Self::R16_SFLOAT,
            Format::R16G16_FLOAT => Self::R16G16_SFLOAT,
            Format::R16G16B16A16_FLOAT => Self::R16G16B16A16_SFLOAT,
            Format::R32_UINT => Self::R32_UINT,
            Format::R32_SINT => Self::R32_SINT,
            Format::R32_FLOAT => Self::R32_SFLOAT,
            Format::R32G32_FLOAT => Self::R32G32_SFLOAT,
            Format::R32G32B32_FLOAT => Self::R32G32B32_SFLOAT,
            Format::R32G32B32A32_FLOAT => Self::R32G32B32A32_SFLOAT,
            Format::D16_UNORM => Self::D16_UNORM,
            Format::D24_UNORM_S8_UINT => Self::D24_UNORM_S8_UINT,
            Format::D32_FLOAT => Self::D32_SFLOAT,
            Format::D32_FLOAT_S8_UINT => Self::D32_SFLOAT_S8_UINT,
        }
    }
}

impl From<BarrierAccess> for vk::AccessFlags {
    fn from(val: BarrierAccess) -> Self {
        let mut flags = Self::empty();
        if val.intersects(BarrierAccess::INDIRECT_COMMAND_READ) {
            flags |= Self::INDIRECT_COMMAND_READ;
        }
        if val.intersects(BarrierAccess::INDEX_READ) {
            flags |= Self::INDEX_READ;
        }
        if val.intersects(BarrierAccess::VERTEX_ATTRIBUTE_READ) {
            flags |= Self::VERTEX_ATTRIBUTE_READ;
        }
        if val.intersects(BarrierAccess::UNIFORM_READ) {
            flags |= Self::UNIFORM_READ;
        }
        if val.intersects(BarrierAccess::INPUT_ATTACHMENT_READ) {
            flags |= Self::INPUT_ATTACHMENT_READ;
        }
        if val.intersects(BarrierAccess::SHADER_READ) {
            flags |= Self::SHADER_READ;
        }
        if val.intersects(BarrierAccess::SHADER_WRITE) {
            flags |= Self::SHADER_WRITE;
        }
        if val.intersects(BarrierAccess::COLOR_ATTACHMENT_READ) {
            flags |= Self::COLOR_ATTACHMENT_READ;
        }
        if val.intersects(BarrierAccess::COLOR_ATTACHMENT_WRITE) {
            flags |= Self::COLOR_ATTACHMENT_WRITE;
        }
        if val.intersects(BarrierAccess::DEPTH_STENCIL_ATTACHMENT_READ) {
            flags |= Self::DEPTH_STENCIL_ATTACHMENT_READ;
        }
        if val.intersects(BarrierAccess::DEPTH_STENCIL_ATTACHMENT_WRITE) {
            flags |= Self::DEPTH_STENCIL_ATTACHMENT_WRITE;
        }
        if val.intersects(BarrierAccess::TRANSFER_READ) {
            flags |= Self::TRANSFER_READ;
        }
        if val.intersects(BarrierAccess::TRANSFER_WRITE) {
            flags |= Self::TRANSFER_WRITE;
        }
        if val.intersects(BarrierAccess::MEMORY_READ) {
            flags |= Self::MEMORY_READ;
        }
        flags
    }
}

impl From<BarrierStage> for vk::PipelineStageFlags {
    fn from(val: BarrierStage) -> Self {
        let mut flags = Self::empty();
        if val.intersects(BarrierStage::TOP_OF_PIPE) {
            flags |= Self::TOP_OF_PIPE;
        }
        if val.intersects(BarrierStage::DRAW_INDIRECT) {
            flags |= Self::DRAW_INDIRECT;
        }
        if val.intersects(BarrierStage::VERTEX_INPUT) {
            flags |= Self::VERTEX_INPUT;
        }
        if val.intersects(BarrierStage::VERTEX_SHADER) {
            flags |= Self::VERTEX_SHADER;
        }
        if val.intersects(BarrierStage::FRAGMENT_SHADER) {
            flags |= Self::FRAGMENT_SHADER;
        }
        if val.intersects(BarrierStage::EARLY_FRAGMENT_TESTS) {
            flags |= Self::EARLY_FRAGMENT_TESTS;
        }
        if val.intersects(BarrierStage::LATE_FRAGMENT_TESTS) {
            flags |= Self::LATE_FRAGMENT_TESTS;
        }
        if val.intersects(BarrierStage::COLOR_ATTACHMENT_OUTPUT) {
            flags |= Self::COLOR_ATTACHMENT_OUTPUT;
        }
        if val.intersects(BarrierStage::COMPUTE_SHADER) {
            flags |= Self::COMPUTE_SHADER;
        }
        if val.intersects(BarrierStage::TRANSFER) {
            flags |= Self::TRANSFER;
        }
        if val.intersects(BarrierStage::BOTTOM_OF_PIPE) {
            flags |= Self::BOTTOM_OF_PIPE;
        }
        flags
    }
}

impl From<BarrierLayout> for vk::ImageLayout {
    fn from(val: BarrierLayout) -> Self {
        match val {
            BarrierLayout::Undefined => Self::UNDEFINED,
            BarrierLayout::General => Self::GENERAL,
            BarrierLayout::ColorAttachmentOptimal => Self::COLOR_ATTACHMENT_OPTIMAL,
            BarrierLayout::DepthStencilAttachmentOptimal => Self::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
            BarrierLayout::DepthStencilReadOnlyOptimal => Self::DEPTH_STENCIL_READ_ONLY_OPTIMAL,
            BarrierLayout::ShaderReadOnlyOptimal => Self::SHADER_READ_ONLY_OPTIMAL,
            BarrierLayout::TransferSrcOptimal => Self::TRANSFER_SRC_OPTIMAL,
            BarrierLayout::TransferDstOptimal => Self::TRANSFER_DST_OPTIMAL,
            BarrierLayout::PresentSrc => Self::PRESENT_SRC_KHR,
        }
    }
}
