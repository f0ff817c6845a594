use std::hash::{Hash, Hasher};
use std::sync::Mutex;

use crate::deferred_drop::Drc;
use crate::{BufferDef, DeviceContext, GfxResult, ResourceState, ResourceUsage};

#[derive(Debug)]
pub(crate) struct BufferInner {
    pub(crate) device_context: DeviceContext,
    pub(crate) buffer_def: BufferDef,
    pub(crate) buffer_id: u32,
    pub(crate) state: Mutex<ResourceState>,

    pub(crate) srv_slot: Option<u32>,
    pub(crate) uav_slot: Option<u32>,
}

/// A device buffer with tracked resource state. Buffers have a single
/// subresource, so state tracking is one value.
#[derive(Clone, Debug)]
pub struct Buffer {
    pub(crate) inner: Drc<BufferInner>,
}

impl PartialEq for Buffer {
    fn eq(&self, other: &Self) -> bool {
        self.inner.buffer_id == other.inner.buffer_id
    }
}

impl Eq for Buffer {}

impl Hash for Buffer {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.buffer_id.hash(state);
    }
}

impl Buffer {
    pub fn new(device_context: &DeviceContext, buffer_def: &BufferDef) -> GfxResult<Self> {
        buffer_def.verify();

        let srv_slot = if buffer_def
            .usage_flags
            .contains(ResourceUsage::HAS_SHADER_RESOURCE_VIEW)
        {
            Some(device_context.allocate_view_slot())
        } else {
            None
        };
        let uav_slot = if buffer_def
            .usage_flags
            .contains(ResourceUsage::HAS_UNORDERED_ACCESS_VIEW)
        {
            Some(device_context.allocate_view_slot())
        } else {
            None
        };

        Ok(Self {
            inner: device_context.deferred_dropper().new_drc(BufferInner {
                device_context: device_context.clone(),
                buffer_def: buffer_def.clone(),
                buffer_id: device_context.allocate_buffer_id(),
                state: Mutex::new(ResourceState::COMMON),
                srv_slot,
                uav_slot,
            }),
        })
    }

    pub fn definition(&self) -> &BufferDef {
        &self.inner.buffer_def
    }

    pub fn device_context(&self) -> &DeviceContext {
        &self.inner.device_context
    }

    pub fn buffer_id(&self) -> u32 {
        self.inner.buffer_id
    }

    pub fn current_state(&self) -> ResourceState {
        *self.inner.state.lock().unwrap()
    }

    pub(crate) fn record_state(&self, new_state: ResourceState) {
        *self.inner.state.lock().unwrap() = new_state;
    }

    pub fn shader_resource_view_slot(&self) -> GfxResult<u32> {
        self.inner
            .srv_slot
            .ok_or_else(|| "buffer has no shader resource view".into())
    }

    pub fn unordered_access_view_slot(&self) -> GfxResult<u32> {
        self.inner
            .uav_slot
            .ok_or_else(|| "buffer has no unordered access view".into())
    }
}
