use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use fnv::FnvHashMap;

use crate::{
    Buffer, BufferDef, CommandQueue, DeferredDropper, GfxResult, NativeBackend, NullBackend,
    QueueType, RendererCache, Sampler, SamplerBindHeap, SamplerDef, Texture, TextureDef,
    UploadAllocator, ViewBindHeap, MAX_STATIC_SAMPLERS,
};

/// Slots in the shader-visible view heap ring.
const VIEW_BIND_HEAP_CAPACITY: u32 = 4096;
/// Slots in the shader-visible sampler heap.
const SAMPLER_BIND_HEAP_CAPACITY: u32 = 256;

/// Frames a dropped GPU object is held before its memory is released.
const DEFERRED_DROP_FRAME_COUNT: usize = 3;

#[derive(Debug)]
struct DeviceContextInner {
    backend: Arc<dyn NativeBackend>,
    deferred_dropper: DeferredDropper,

    // Persistent (CPU-visible) descriptor slots are never recycled; the
    // shader-visible heaps below are the recycled ones.
    next_view_slot: AtomicU32,
    next_texture_id: AtomicU32,
    next_buffer_id: AtomicU32,

    sampler_slots: Mutex<FnvHashMap<SamplerDef, u32>>,
    view_bind_heap: Mutex<ViewBindHeap>,
    sampler_bind_heap: Mutex<SamplerBindHeap>,
    upload_allocator: Mutex<UploadAllocator>,
    renderer_cache: RendererCache,
}

/// The device: owns the backend, the descriptor heaps, the upload memory
/// and the deferred-drop machinery. Cheap to clone; all resources hold one.
#[derive(Debug, Clone)]
pub struct DeviceContext {
    inner: Arc<DeviceContextInner>,
}

impl DeviceContext {
    pub fn new(backend: Arc<dyn NativeBackend>) -> GfxResult<Self> {
        Ok(Self {
            inner: Arc::new(DeviceContextInner {
                backend,
                deferred_dropper: DeferredDropper::new(DEFERRED_DROP_FRAME_COUNT),
                next_view_slot: AtomicU32::new(0),
                next_texture_id: AtomicU32::new(0),
                next_buffer_id: AtomicU32::new(0),
                sampler_slots: Mutex::new(FnvHashMap::default()),
                view_bind_heap: Mutex::new(ViewBindHeap::new(VIEW_BIND_HEAP_CAPACITY)),
                sampler_bind_heap: Mutex::new(SamplerBindHeap::new(SAMPLER_BIND_HEAP_CAPACITY)),
                upload_allocator: Mutex::new(UploadAllocator::new()),
                renderer_cache: RendererCache::new(),
            }),
        })
    }

    /// A device over the recording backend. Used by tests and headless runs.
    pub fn new_null() -> GfxResult<Self> {
        Self::new(Arc::new(NullBackend::new()))
    }

    pub fn backend(&self) -> &Arc<dyn NativeBackend> {
        &self.inner.backend
    }

    pub(crate) fn deferred_dropper(&self) -> &DeferredDropper {
        &self.inner.deferred_dropper
    }

    /// Advances the deferred-drop frame, releasing objects dropped far
    /// enough in the past. `Job::end` calls this once per submit.
    pub fn free_gpu_memory(&self) {
        self.inner.deferred_dropper.flush();
    }

    /// Releases every object still parked in the deferred-drop buckets.
    /// The teardown path, after `CommandQueue::wait_idle`.
    pub fn destroy(&self) {
        self.inner.deferred_dropper.destroy();
    }

    pub fn create_queue(&self, queue_type: QueueType) -> CommandQueue {
        CommandQueue::new(self, queue_type)
    }

    pub fn create_texture(&self, texture_def: &TextureDef) -> GfxResult<Texture> {
        Texture::new(self, texture_def)
    }

    pub fn create_buffer(&self, buffer_def: &BufferDef) -> GfxResult<Buffer> {
        Buffer::new(self, buffer_def)
    }

    pub fn create_sampler(&self, sampler_def: &SamplerDef) -> GfxResult<Sampler> {
        Sampler::new(self, sampler_def)
    }

    pub(crate) fn allocate_view_slot(&self) -> u32 {
        self.inner.next_view_slot.fetch_add(1, Ordering::Relaxed)
    }

    /// Reserves `count` contiguous persistent view slots.
    pub(crate) fn allocate_view_slots(&self, count: u32) -> Vec<u32> {
        let base = self.inner.next_view_slot.fetch_add(count, Ordering::Relaxed);
        (base..base + count).collect()
    }

    pub(crate) fn allocate_texture_id(&self) -> u32 {
        self.inner.next_texture_id.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn allocate_buffer_id(&self) -> u32 {
        self.inner.next_buffer_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Returns the persistent descriptor slot for a sampler definition,
    /// creating one on first sight. Equal definitions share a slot, which
    /// is what makes sampler-table deduplication keys stable.
    pub(crate) fn allocate_sampler_slot(&self, sampler_def: &SamplerDef) -> GfxResult<u32> {
        let mut slots = self.inner.sampler_slots.lock().unwrap();
        if let Some(&slot) = slots.get(sampler_def) {
            return Ok(slot);
        }
        let slot = slots.len() as u32;
        if slot >= MAX_STATIC_SAMPLERS as u32 {
            return Err(format!(
                "too many distinct samplers, at most {} are supported",
                MAX_STATIC_SAMPLERS
            )
            .into());
        }
        slots.insert(sampler_def.clone(), slot);
        Ok(slot)
    }

    pub(crate) fn view_bind_heap(&self) -> MutexGuard<'_, ViewBindHeap> {
        self.inner.view_bind_heap.lock().unwrap()
    }

    pub(crate) fn sampler_bind_heap(&self) -> MutexGuard<'_, SamplerBindHeap> {
        self.inner.sampler_bind_heap.lock().unwrap()
    }

    pub(crate) fn upload_allocator(&self) -> MutexGuard<'_, UploadAllocator> {
        self.inner.upload_allocator.lock().unwrap()
    }

    /// Pages the upload allocator has created so far.
    pub fn upload_page_count(&self) -> u32 {
        self.upload_allocator().page_count()
    }

    /// The shader-program cache shared by every job on this device.
    pub fn renderer_cache(&self) -> &RendererCache {
        &self.inner.renderer_cache
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn view_slots_are_unique_and_contiguous() {
        let device = DeviceContext::new_null().unwrap();
        let first = device.allocate_view_slots(4);
        assert_eq!(first.len(), 4);
        let second = device.allocate_view_slot();
        assert_eq!(second, first[3] + 1);
    }

    #[test]
    fn equal_sampler_definitions_share_a_slot() {
        let device = DeviceContext::new_null().unwrap();
        let a = device.allocate_sampler_slot(&SamplerDef::default()).unwrap();
        let b = device.allocate_sampler_slot(&SamplerDef::default()).unwrap();
        assert_eq!(a, b);

        let other = SamplerDef {
            mip_lod_bias: 1.0,
            ..SamplerDef::default()
        };
        let c = device.allocate_sampler_slot(&other).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn distinct_sampler_definitions_are_bounded() {
        let device = DeviceContext::new_null().unwrap();
        for i in 0..MAX_STATIC_SAMPLERS {
            let def = SamplerDef {
                mip_lod_bias: i as f32,
                ..SamplerDef::default()
            };
            device.allocate_sampler_slot(&def).unwrap();
        }
        let overflow = SamplerDef {
            mip_lod_bias: -1.0,
            ..SamplerDef::default()
        };
        assert!(device.allocate_sampler_slot(&overflow).is_err());
    }
}
