use crate::{Buffer, ResourceState, SubresourceIndex, Texture};

/// The logical attachment/resource states the application reasons in. Each
/// one maps onto exactly one portable `ResourceState` combination.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum NglResourceState {
    ColorAttachment,
    ColorAttachmentAndInputAttachmentAndShaderResource,
    ColorAttachmentAndPreservedAttachment,
    DepthAttachment,
    ReadOnlyDepthAttachment,
    ReadOnlyDepthAttachmentAndShaderResource,
    ShaderResource,
    ShaderResourceAndUnorderedAccess,
    ShaderResourceAndNonFragmentShaderResource,
    ShaderResourceAndUnorderedAccessAndNonFragmentShaderResource,
}

impl From<NglResourceState> for ResourceState {
    fn from(state: NglResourceState) -> Self {
        match state {
            NglResourceState::ColorAttachment => Self::RENDER_TARGET,
            // The attachment stays writable; input-attachment reads go
            // through the fragment stage.
            NglResourceState::ColorAttachmentAndInputAttachmentAndShaderResource => {
                Self::RENDER_TARGET
            }
            NglResourceState::ColorAttachmentAndPreservedAttachment => Self::RENDER_TARGET,
            NglResourceState::DepthAttachment => Self::DEPTH_WRITE,
            NglResourceState::ReadOnlyDepthAttachment => Self::DEPTH_READ,
            NglResourceState::ReadOnlyDepthAttachmentAndShaderResource => {
                Self::DEPTH_READ | Self::PIXEL_SHADER_RESOURCE
            }
            NglResourceState::ShaderResource => Self::PIXEL_SHADER_RESOURCE,
            NglResourceState::ShaderResourceAndUnorderedAccess => Self::UNORDERED_ACCESS,
            NglResourceState::ShaderResourceAndNonFragmentShaderResource => {
                Self::NON_PIXEL_SHADER_RESOURCE
            }
            NglResourceState::ShaderResourceAndUnorderedAccessAndNonFragmentShaderResource => {
                Self::UNORDERED_ACCESS
            }
        }
    }
}

bitflags::bitflags! {
    /// Portable mirror of the access masks a barrier resolves to. The
    /// vulkan feature maps these onto `vk::AccessFlags`.
    pub struct BarrierAccess: u32 {
        const INDIRECT_COMMAND_READ = 0x0000_0001;
        const INDEX_READ = 0x0000_0002;
        const VERTEX_ATTRIBUTE_READ = 0x0000_0004;
        const UNIFORM_READ = 0x0000_0008;
        const INPUT_ATTACHMENT_READ = 0x0000_0010;
        const SHADER_READ = 0x0000_0020;
        const SHADER_WRITE = 0x0000_0040;
        const COLOR_ATTACHMENT_READ = 0x0000_0080;
        const COLOR_ATTACHMENT_WRITE = 0x0000_0100;
        const DEPTH_STENCIL_ATTACHMENT_READ = 0x0000_0200;
        const DEPTH_STENCIL_ATTACHMENT_WRITE = 0x0000_0400;
        const TRANSFER_READ = 0x0000_0800;
        const TRANSFER_WRITE = 0x0000_1000;
        const MEMORY_READ = 0x0000_8000;
    }
}

bitflags::bitflags! {
    /// Portable mirror of the pipeline stages a barrier resolves to.
    pub struct BarrierStage: u32 {
        const TOP_OF_PIPE = 0x0000_0001;
        const DRAW_INDIRECT = 0x0000_0002;
        const VERTEX_INPUT = 0x0000_0004;
        const VERTEX_SHADER = 0x0000_0008;
        const FRAGMENT_SHADER = 0x0000_0080;
        const EARLY_FRAGMENT_TESTS = 0x0000_0100;
        const LATE_FRAGMENT_TESTS = 0x0000_0200;
        const COLOR_ATTACHMENT_OUTPUT = 0x0000_0400;
        const COMPUTE_SHADER = 0x0000_0800;
        const TRANSFER = 0x0000_1000;
        const BOTTOM_OF_PIPE = 0x0000_2000;
    }
}

/// Portable mirror of the image layout a texture barrier resolves to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum BarrierLayout {
    Undefined,
    General,
    ColorAttachmentOptimal,
    DepthStencilAttachmentOptimal,
    DepthStencilReadOnlyOptimal,
    ShaderReadOnlyOptimal,
    TransferSrcOptimal,
    TransferDstOptimal,
    PresentSrc,
}

/// Access masks implied by a resource state. Unions over the state bits, so
/// combined states pick up every access they allow.
pub fn barrier_access_for(state: ResourceState) -> BarrierAccess {
    let mut access = BarrierAccess::empty();
    if state.intersects(ResourceState::VERTEX_AND_CONSTANT_BUFFER) {
        access |= BarrierAccess::VERTEX_ATTRIBUTE_READ | BarrierAccess::UNIFORM_READ;
    }
    if state.intersects(ResourceState::INDEX_BUFFER) {
        access |= BarrierAccess::INDEX_READ;
    }
    if state.intersects(ResourceState::RENDER_TARGET) {
        access |= BarrierAccess::COLOR_ATTACHMENT_READ | BarrierAccess::COLOR_ATTACHMENT_WRITE;
    }
    if state.intersects(ResourceState::UNORDERED_ACCESS) {
        access |= BarrierAccess::SHADER_READ | BarrierAccess::SHADER_WRITE;
    }
    if state.intersects(ResourceState::DEPTH_WRITE) {
        access |= BarrierAccess::DEPTH_STENCIL_ATTACHMENT_READ
            | BarrierAccess::DEPTH_STENCIL_ATTACHMENT_WRITE;
    }
    if state.intersects(ResourceState::DEPTH_READ) {
        access |= BarrierAccess::DEPTH_STENCIL_ATTACHMENT_READ;
    }
    if state.intersects(ResourceState::SHADER_RESOURCE) {
        access |= BarrierAccess::SHADER_READ;
    }
    if state.intersects(ResourceState::INDIRECT_ARGUMENT) {
        access |= BarrierAccess::INDIRECT_COMMAND_READ;
    }
    if state.intersects(ResourceState::COPY_SRC) {
        access |= BarrierAccess::TRANSFER_READ;
    }
    if state.intersects(ResourceState::COPY_DST) {
        access |= BarrierAccess::TRANSFER_WRITE;
    }
    if state.intersects(ResourceState::PRESENT) {
        access |= BarrierAccess::MEMORY_READ;
    }
    access
}

/// Pipeline stages implied by a resource state.
pub fn barrier_stage_for(state: ResourceState) -> BarrierStage {
    let mut stages = BarrierStage::empty();
    if state.intersects(ResourceState::VERTEX_AND_CONSTANT_BUFFER) {
        stages |= BarrierStage::VERTEX_INPUT | BarrierStage::VERTEX_SHADER;
    }
    if state.intersects(ResourceState::INDEX_BUFFER) {
        stages |= BarrierStage::VERTEX_INPUT;
    }
    if state.intersects(ResourceState::RENDER_TARGET) {
        stages |= BarrierStage::COLOR_ATTACHMENT_OUTPUT;
    }
    if state.intersects(ResourceState::UNORDERED_ACCESS) {
        stages |= BarrierStage::VERTEX_SHADER
            | BarrierStage::FRAGMENT_SHADER
            | BarrierStage::COMPUTE_SHADER;
    }
    if state.intersects(ResourceState::DEPTH_WRITE | ResourceState::DEPTH_READ) {
        stages |= BarrierStage::EARLY_FRAGMENT_TESTS | BarrierStage::LATE_FRAGMENT_TESTS;
    }
    if state.intersects(ResourceState::PIXEL_SHADER_RESOURCE) {
        stages |= BarrierStage::FRAGMENT_SHADER;
    }
    if state.intersects(ResourceState::NON_PIXEL_SHADER_RESOURCE) {
        stages |= BarrierStage::VERTEX_SHADER | BarrierStage::COMPUTE_SHADER;
    }
    if state.intersects(ResourceState::INDIRECT_ARGUMENT) {
        stages |= BarrierStage::DRAW_INDIRECT;
    }
    if state.intersects(ResourceState::COPY_SRC | ResourceState::COPY_DST) {
        stages |= BarrierStage::TRANSFER;
    }
    if state.intersects(ResourceState::PRESENT) {
        stages |= BarrierStage::BOTTOM_OF_PIPE;
    }
    if stages.is_empty() {
        // UNDEFINED and COMMON synchronize against everything upstream
        stages = BarrierStage::TOP_OF_PIPE;
    }
    stages
}

/// Image layout implied by a resource state. Combined read states pick the
/// most specific read-only layout; anything genuinely mixed falls back to
/// GENERAL.
pub fn barrier_layout_for(state: ResourceState) -> BarrierLayout {
    if state == ResourceState::UNDEFINED {
        BarrierLayout::Undefined
    } else if state.intersects(ResourceState::UNORDERED_ACCESS) {
        BarrierLayout::General
    } else if state.intersects(ResourceState::RENDER_TARGET) {
        BarrierLayout::ColorAttachmentOptimal
    } else if state.intersects(ResourceState::DEPTH_WRITE) {
        BarrierLayout::DepthStencilAttachmentOptimal
    } else if state.intersects(ResourceState::DEPTH_READ) {
        BarrierLayout::DepthStencilReadOnlyOptimal
    } else if state.intersects(ResourceState::SHADER_RESOURCE) {
        BarrierLayout::ShaderReadOnlyOptimal
    } else if state.intersects(ResourceState::COPY_SRC) {
        BarrierLayout::TransferSrcOptimal
    } else if state.intersects(ResourceState::COPY_DST) {
        BarrierLayout::TransferDstOptimal
    } else if state.intersects(ResourceState::PRESENT) {
        BarrierLayout::PresentSrc
    } else {
        BarrierLayout::General
    }
}

/// One entry of an application barrier list. `subresource` of `None` covers
/// the whole texture.
pub struct NglTextureBarrier<'a> {
    pub texture: &'a Texture,
    pub subresource: Option<SubresourceIndex>,
    pub new_state: NglResourceState,
}

/// Buffer variant of an application barrier.
pub struct NglBufferBarrier<'a> {
    pub buffer: &'a Buffer,
    pub new_state: NglResourceState,
}

/// A fully resolved transition as handed to the backend.
#[derive(Debug, Clone, PartialEq)]
pub enum NativeBarrier {
    TextureTransition(TextureTransition),
    BufferTransition(BufferTransition),
    /// Pure write-visibility barrier between two unordered-access uses of
    /// a texture or buffer
    UnorderedAccess { resource_id: u32 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextureTransition {
    pub texture_id: u32,
    /// Linear subresource index; `None` covers all subresources
    pub subresource: Option<u32>,
    pub src_state: ResourceState,
    pub dst_state: ResourceState,
    pub src_access: BarrierAccess,
    pub dst_access: BarrierAccess,
    pub src_stage: BarrierStage,
    pub dst_stage: BarrierStage,
    pub old_layout: BarrierLayout,
    pub new_layout: BarrierLayout,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BufferTransition {
    pub buffer_id: u32,
    pub src_state: ResourceState,
    pub dst_state: ResourceState,
    pub src_access: BarrierAccess,
    pub dst_access: BarrierAccess,
    pub src_stage: BarrierStage,
    pub dst_stage: BarrierStage,
}

pub(crate) fn texture_transition(
    texture: &Texture,
    subresource: Option<u32>,
    src_state: ResourceState,
    dst_state: ResourceState,
) -> TextureTransition {
    TextureTransition {
        texture_id: texture.texture_id(),
        subresource,
        src_state,
        dst_state,
        src_access: barrier_access_for(src_state),
        dst_access: barrier_access_for(dst_state),
        src_stage: barrier_stage_for(src_state),
        dst_stage: barrier_stage_for(dst_state),
        old_layout: barrier_layout_for(src_state),
        new_layout: barrier_layout_for(dst_state),
    }
}

pub(crate) fn buffer_transition(
    buffer: &Buffer,
    src_state: ResourceState,
    dst_state: ResourceState,
) -> BufferTransition {
    BufferTransition {
        buffer_id: buffer.buffer_id(),
        src_state,
        dst_state,
        src_access: barrier_access_for(src_state),
        dst_access: barrier_access_for(dst_state),
        src_stage: barrier_stage_for(src_state),
        dst_stage: barrier_stage_for(dst_state),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_LOGICAL_STATES: [NglResourceState; 10] = [
        NglResourceState::ColorAttachment,
        NglResourceState::ColorAttachmentAndInputAttachmentAndShaderResource,
        NglResourceState::ColorAttachmentAndPreservedAttachment,
        NglResourceState::DepthAttachment,
        NglResourceState::ReadOnlyDepthAttachment,
        NglResourceState::ReadOnlyDepthAttachmentAndShaderResource,
        NglResourceState::ShaderResource,
        NglResourceState::ShaderResourceAndUnorderedAccess,
        NglResourceState::ShaderResourceAndNonFragmentShaderResource,
        NglResourceState::ShaderResourceAndUnorderedAccessAndNonFragmentShaderResource,
    ];

    #[test]
    fn every_logical_state_derives_access_stage_layout() {
        for &logical in &ALL_LOGICAL_STATES {
            let state = ResourceState::from(logical);
            assert_ne!(state, ResourceState::UNDEFINED, "{:?}", logical);
            assert!(!barrier_access_for(state).is_empty(), "{:?}", logical);
            assert!(!barrier_stage_for(state).is_empty(), "{:?}", logical);
            assert_ne!(
                barrier_layout_for(state),
                BarrierLayout::Undefined,
                "{:?}",
                logical
            );
        }
    }

    #[test]
    fn depth_read_with_shader_resource_keeps_read_only_layout() {
        let state = ResourceState::from(NglResourceState::ReadOnlyDepthAttachmentAndShaderResource);
        assert_eq!(
            barrier_layout_for(state),
            BarrierLayout::DepthStencilReadOnlyOptimal
        );
        assert!(barrier_stage_for(state).contains(BarrierStage::FRAGMENT_SHADER));
        assert!(barrier_access_for(state).contains(BarrierAccess::DEPTH_STENCIL_ATTACHMENT_READ));
    }

    #[test]
    fn unordered_access_maps_to_general_layout() {
        let state = ResourceState::from(NglResourceState::ShaderResourceAndUnorderedAccess);
        assert_eq!(barrier_layout_for(state), BarrierLayout::General);
        assert!(barrier_access_for(state).contains(BarrierAccess::SHADER_WRITE));
    }

    #[test]
    fn present_state_synchronizes_at_pipe_bottom() {
        assert_eq!(
            barrier_stage_for(ResourceState::PRESENT),
            BarrierStage::BOTTOM_OF_PIPE
        );
        assert_eq!(
            barrier_layout_for(ResourceState::PRESENT),
            BarrierLayout::PresentSrc
        );
    }
}
