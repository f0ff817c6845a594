mod null;
pub use null::*;

#[cfg(feature = "vulkan")]
pub(crate) mod vulkan;

use std::fmt;

use crate::{
    GfxResult, IndexType, NativeBarrier, NativePipelineDesc, ScissorRect, ShaderStageFlags,
    Viewport,
};

/// One recorded native command. Command contexts accumulate these and hand
/// the stream to the backend at submit.
#[derive(Debug, Clone, PartialEq)]
pub enum NativeOp {
    BeginCommandBuffer,
    EndCommandBuffer,
    Barriers(Vec<NativeBarrier>),
    ClearRenderTarget {
        rtv_slot: u32,
        color: [f32; 4],
    },
    ClearDepthStencil {
        dsv_slot: u32,
        depth: f32,
        stencil: u32,
    },
    SetRenderTargets {
        rtv_slots: Vec<u32>,
        dsv_slot: Option<u32>,
    },
    SetPipeline {
        pipeline_id: u64,
    },
    SetViewport(Viewport),
    SetScissor(ScissorRect),
    SetRootConstants {
        parameter: u32,
        num_dwords: u32,
        data: Vec<u8>,
    },
    SetRootConstantBuffer {
        parameter: u32,
        page_id: u32,
        offset: u64,
    },
    SetViewTable {
        parameter: u32,
        base_slot: u32,
    },
    SetSamplerTable {
        parameter: u32,
        base_slot: u32,
    },
    CopyViewDescriptors {
        dst_base: u32,
        src_slots: Vec<u32>,
    },
    CopySamplerDescriptors {
        dst_base: u32,
        src_slots: Vec<u32>,
    },
    SetVertexBuffers {
        buffer_ids: Vec<u32>,
    },
    SetIndexBuffer {
        buffer_id: u32,
        index_type: IndexType,
    },
    DrawIndexedInstanced {
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    },
    Dispatch {
        group_count_x: u32,
        group_count_y: u32,
        group_count_z: u32,
    },
}

/// The driver seam: engines resolve states, layouts and descriptor slots up
/// front and hand finished work down through this interface. Selected once
/// at device creation, never mixed.
pub trait NativeBackend: fmt::Debug + Send + Sync {
    /// Compiles one stage's bytecode into a native module, returning its id.
    fn create_shader_module(
        &self,
        stage: ShaderStageFlags,
        bytecode: &[u8],
    ) -> GfxResult<u64>;

    /// Builds a pipeline state object from a fully resolved description.
    fn create_pipeline(&self, desc: &NativePipelineDesc) -> GfxResult<u64>;

    /// Executes one submitted command stream.
    fn execute(&self, ops: &[NativeOp]) -> GfxResult<()>;

    /// Requests the device to signal `fence_value` after the work submitted
    /// so far.
    fn signal_fence(&self, fence_value: u64);

    fn is_fence_complete(&self, fence_value: u64) -> bool;

    fn wait_for_fence(&self, fence_value: u64) -> GfxResult<()>;
}
