use std::hash::{Hash, Hasher};
use std::sync::Mutex;

use crate::deferred_drop::Drc;
use crate::{
    DeviceContext, Extents3D, GfxResult, ResourceState, ResourceUsage, SubresourceIndex,
    SubresourceLayout, TextureDef,
};

/// Tracks the current resource state of a texture, switching to
/// per-subresource granularity on the first partial transition and collapsing
/// back once every subresource agrees again.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TextureStateTracking {
    Whole(ResourceState),
    PerSubresource(Vec<ResourceState>),
}

impl TextureStateTracking {
    pub(crate) fn get(&self, linear: u32) -> ResourceState {
        match self {
            Self::Whole(state) => *state,
            Self::PerSubresource(states) => states[linear as usize],
        }
    }

    pub(crate) fn set_whole(&mut self, state: ResourceState) {
        *self = Self::Whole(state);
    }

    pub(crate) fn set_subresource(&mut self, linear: u32, count: u32, state: ResourceState) {
        if let Self::Whole(current) = *self {
            if current == state {
                return;
            }
            *self = Self::PerSubresource(vec![current; count as usize]);
        }
        if let Self::PerSubresource(states) = self {
            states[linear as usize] = state;
            let first = states[0];
            if states.iter().all(|s| *s == first) {
                *self = Self::Whole(first);
            }
        }
    }
}

#[derive(Debug)]
pub(crate) struct TextureInner {
    pub(crate) device_context: DeviceContext,
    pub(crate) texture_def: TextureDef,
    pub(crate) subresources: SubresourceLayout,
    pub(crate) texture_id: u32,
    pub(crate) state: Mutex<TextureStateTracking>,

    // Statically allocated view slots, sized by `subresources` where
    // per-subresource views exist.
    pub(crate) rtv_slots: Vec<u32>,
    pub(crate) dsv_read_write_slots: Vec<u32>,
    pub(crate) dsv_read_only_slots: Vec<u32>,
    pub(crate) srv_slot: Option<u32>,
    pub(crate) srv_subresource_slots: Vec<u32>,
    pub(crate) uav_slot: Option<u32>,
}

/// A texture plus the per-subresource bookkeeping the barrier engine and the
/// bind heaps need: linear subresource indexing, state tracking and
/// statically allocated view slots.
#[derive(Clone, Debug)]
pub struct Texture {
    pub(crate) inner: Drc<TextureInner>,
}

impl PartialEq for Texture {
    fn eq(&self, other: &Self) -> bool {
        self.inner.texture_id == other.inner.texture_id
    }
}

impl Eq for Texture {}

impl Hash for Texture {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.texture_id.hash(state);
    }
}

impl Texture {
    pub fn new(device_context: &DeviceContext, texture_def: &TextureDef) -> GfxResult<Self> {
        Self::with_initial_state(device_context, texture_def, ResourceState::COMMON)
    }

    /// Creates a texture that starts in the given state. Presentable
    /// surfaces enter the frame in `PRESENT`.
    pub fn with_initial_state(
        device_context: &DeviceContext,
        texture_def: &TextureDef,
        initial_state: ResourceState,
    ) -> GfxResult<Self> {
        texture_def.verify();

        let subresources = texture_def.subresource_layout();
        let count = subresources.subresource_count();

        let rtv_slots = if texture_def
            .usage_flags
            .contains(ResourceUsage::HAS_RENDER_TARGET_VIEW)
        {
            device_context.allocate_view_slots(count)
        } else {
            Vec::new()
        };
        let (dsv_read_write_slots, dsv_read_only_slots) = if texture_def
            .usage_flags
            .contains(ResourceUsage::HAS_DEPTH_STENCIL_VIEW)
        {
            (
                device_context.allocate_view_slots(count),
                device_context.allocate_view_slots(count),
            )
        } else {
            (Vec::new(), Vec::new())
        };
        let (srv_slot, srv_subresource_slots) = if texture_def
            .usage_flags
            .contains(ResourceUsage::HAS_SHADER_RESOURCE_VIEW)
        {
            (
                Some(device_context.allocate_view_slot()),
                device_context.allocate_view_slots(count),
            )
        } else {
            (None, Vec::new())
        };
        let uav_slot = if texture_def
            .usage_flags
            .contains(ResourceUsage::HAS_UNORDERED_ACCESS_VIEW)
        {
            Some(device_context.allocate_view_slot())
        } else {
            None
        };

        Ok(Self {
            inner: device_context.deferred_dropper().new_drc(TextureInner {
                device_context: device_context.clone(),
                texture_def: texture_def.clone(),
                subresources,
                texture_id: device_context.allocate_texture_id(),
                state: Mutex::new(TextureStateTracking::Whole(initial_state)),
                rtv_slots,
                dsv_read_write_slots,
                dsv_read_only_slots,
                srv_slot,
                srv_subresource_slots,
                uav_slot,
            }),
        })
    }

    pub fn definition(&self) -> &TextureDef {
        &self.inner.texture_def
    }

    pub fn extents(&self) -> &Extents3D {
        &self.inner.texture_def.extents
    }

    pub fn device_context(&self) -> &DeviceContext {
        &self.inner.device_context
    }

    pub fn subresource_layout(&self) -> &SubresourceLayout {
        &self.inner.subresources
    }

    pub fn subresource_count(&self) -> u32 {
        self.inner.subresources.subresource_count()
    }

    pub fn texture_id(&self) -> u32 {
        self.inner.texture_id
    }

    /// Current tracked state of one subresource, or of the whole texture
    /// when `subresource` is `None` (which requires uniform state).
    pub fn current_state(&self, subresource: Option<SubresourceIndex>) -> ResourceState {
        let state = self.inner.state.lock().unwrap();
        match subresource {
            Some(index) => state.get(self.inner.subresources.linear_index(index)),
            None => state.get(0),
        }
    }

    /// Whether all subresources currently share one state.
    pub fn has_uniform_state(&self) -> bool {
        matches!(
            &*self.inner.state.lock().unwrap(),
            TextureStateTracking::Whole(_)
        )
    }

    pub(crate) fn record_state(
        &self,
        subresource: Option<SubresourceIndex>,
        new_state: ResourceState,
    ) {
        let mut state = self.inner.state.lock().unwrap();
        match subresource {
            Some(index) => state.set_subresource(
                self.inner.subresources.linear_index(index),
                self.inner.subresources.subresource_count(),
                new_state,
            ),
            None => state.set_whole(new_state),
        }
    }

    pub fn render_target_view_slot(&self, subresource: SubresourceIndex) -> GfxResult<u32> {
        self.inner
            .rtv_slots
            .get(self.inner.subresources.linear_index(subresource) as usize)
            .copied()
            .ok_or_else(|| "texture has no render target views".into())
    }

    pub fn depth_stencil_view_slot(
        &self,
        subresource: SubresourceIndex,
        read_only: bool,
    ) -> GfxResult<u32> {
        let slots = if read_only {
            &self.inner.dsv_read_only_slots
        } else {
            &self.inner.dsv_read_write_slots
        };
        slots
            .get(self.inner.subresources.linear_index(subresource) as usize)
            .copied()
            .ok_or_else(|| "texture has no depth stencil views".into())
    }

    pub fn shader_resource_view_slot(&self) -> GfxResult<u32> {
        self.inner
            .srv_slot
            .ok_or_else(|| "texture has no shader resource view".into())
    }

    pub fn shader_resource_subresource_slot(
        &self,
        subresource: SubresourceIndex,
    ) -> GfxResult<u32> {
        self.inner
            .srv_subresource_slots
            .get(self.inner.subresources.linear_index(subresource) as usize)
            .copied()
            .ok_or_else(|| "texture has no shader resource views".into())
    }

    pub fn unordered_access_view_slot(&self) -> GfxResult<u32> {
        self.inner
            .uav_slot
            .ok_or_else(|| "texture has no unordered access view".into())
    }
}

#[cfg(test)]
mod tests {
    use super::TextureStateTracking;
    use crate::ResourceState;

    #[test]
    fn partial_transition_splits_then_collapses() {
        let mut tracking = TextureStateTracking::Whole(ResourceState::SHADER_RESOURCE);
        tracking.set_subresource(1, 4, ResourceState::RENDER_TARGET);
        assert!(matches!(tracking, TextureStateTracking::PerSubresource(_)));
        assert_eq!(tracking.get(0), ResourceState::SHADER_RESOURCE);
        assert_eq!(tracking.get(1), ResourceState::RENDER_TARGET);

        for i in [0u32, 2, 3] {
            tracking.set_subresource(i, 4, ResourceState::RENDER_TARGET);
        }
        assert_eq!(
            tracking,
            TextureStateTracking::Whole(ResourceState::RENDER_TARGET)
        );
    }

    #[test]
    fn redundant_partial_set_keeps_whole_tracking() {
        let mut tracking = TextureStateTracking::Whole(ResourceState::RENDER_TARGET);
        tracking.set_subresource(2, 4, ResourceState::RENDER_TARGET);
        assert!(matches!(tracking, TextureStateTracking::Whole(_)));
    }
}
