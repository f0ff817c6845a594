use crate::deferred_drop::Drc;
use crate::{DeviceContext, GfxResult, SamplerDef};

#[derive(Debug)]
pub(crate) struct SamplerInner {
    pub(crate) device_context: DeviceContext,
    pub(crate) sampler_def: SamplerDef,
    /// Slot in the static (CPU-side) sampler heap; source for the dedup
    /// table copies.
    pub(crate) slot: u32,
}

#[derive(Clone, Debug)]
pub struct Sampler {
    pub(crate) inner: Drc<SamplerInner>,
}

impl Sampler {
    pub fn new(device_context: &DeviceContext, sampler_def: &SamplerDef) -> GfxResult<Self> {
        let slot = device_context.allocate_sampler_slot(sampler_def)?;
        Ok(Self {
            inner: device_context.deferred_dropper().new_drc(SamplerInner {
                device_context: device_context.clone(),
                sampler_def: sampler_def.clone(),
                slot,
            }),
        })
    }

    pub fn definition(&self) -> &SamplerDef {
        &self.inner.sampler_def
    }

    /// Source index handed to `SamplerBindHeap::request`.
    pub fn slot(&self) -> u32 {
        self.inner.slot
    }
}
