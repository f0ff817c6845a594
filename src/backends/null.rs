use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::{GfxResult, NativeOp, NativePipelineDesc, ShaderStageFlags};

use super::NativeBackend;

/// A backend that speaks the full explicit-API protocol without a device
/// behind it. Every submitted command stream and created object is recorded
/// and can be inspected, and fences complete as soon as they are signaled.
/// This is the default driver; it keeps the whole engine exercisable on
/// machines without a GPU.
#[derive(Debug, Default)]
pub struct NullBackend {
    completed_fence: AtomicU64,
    state: Mutex<NullBackendState>,
}

#[derive(Debug, Default)]
struct NullBackendState {
    executed: Vec<NativeOp>,
    shader_modules: u64,
    pipelines: Vec<NativePipelineDesc>,
}

impl NullBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every op executed so far, across submits, in order.
    pub fn executed_ops(&self) -> Vec<NativeOp> {
        self.state.lock().unwrap().executed.clone()
    }

    pub fn pipeline_count(&self) -> usize {
        self.state.lock().unwrap().pipelines.len()
    }

    pub fn created_pipelines(&self) -> Vec<NativePipelineDesc> {
        self.state.lock().unwrap().pipelines.clone()
    }
}

impl NativeBackend for NullBackend {
    fn create_shader_module(
        &self,
        stage: ShaderStageFlags,
        bytecode: &[u8],
    ) -> GfxResult<u64> {
        if bytecode.is_empty() {
            return Err(format!("shader compile failed for stage {:?}", stage).into());
        }
        let mut state = self.state.lock().unwrap();
        state.shader_modules += 1;
        Ok(state.shader_modules)
    }

    fn create_pipeline(&self, desc: &NativePipelineDesc) -> GfxResult<u64> {
        let mut state = self.state.lock().unwrap();
        state.pipelines.push(desc.clone());
        Ok(state.pipelines.len() as u64)
    }

    fn execute(&self, ops: &[NativeOp]) -> GfxResult<()> {
        self.state.lock().unwrap().executed.extend_from_slice(ops);
        Ok(())
    }

    fn signal_fence(&self, fence_value: u64) {
        // No device latency to model: signaled work is complete.
        self.completed_fence.fetch_max(fence_value, Ordering::SeqCst);
    }

    fn is_fence_complete(&self, fence_value: u64) -> bool {
        fence_value <= self.completed_fence.load(Ordering::SeqCst)
    }

    fn wait_for_fence(&self, fence_value: u64) -> GfxResult<()> {
        if self.is_fence_complete(fence_value) {
            Ok(())
        } else {
            Err("null driver cannot wait for an unsignaled fence".into())
        }
    }
}
