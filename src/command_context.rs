use fnv::{FnvHashMap, FnvHashSet};

use crate::barrier::{buffer_transition, texture_transition};
use crate::{
    Buffer, GfxResult, IndexType, NativeBarrier, NativeOp, NglBufferBarrier, NglTextureBarrier,
    ResourceState, ScissorRect, SubresourceIndex, Texture, Viewport, MAX_VERTEX_INPUT_BINDINGS,
};

/// Records one command buffer's worth of work: native ops plus a pending
/// barrier batch that is flushed in front of the next action.
#[derive(Debug, Default)]
pub struct CommandContext {
    pub(crate) ops: Vec<NativeOp>,
    barrier_batch: Vec<NativeBarrier>,
    recording: bool,
    ended: bool,
}

impl CommandContext {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub fn begin(&mut self) -> GfxResult<()> {
        if self.recording {
            return Err("command context is already recording".into());
        }
        if self.ended && !self.ops.is_empty() {
            return Err("command context was ended but never submitted".into());
        }
        self.recording = true;
        self.ended = false;
        self.ops.push(NativeOp::BeginCommandBuffer);
        Ok(())
    }

    pub fn end(&mut self) -> GfxResult<()> {
        self.check_recording()?;
        self.flush_barriers();
        self.ops.push(NativeOp::EndCommandBuffer);
        self.recording = false;
        self.ended = true;
        Ok(())
    }

    pub(crate) fn is_ended(&self) -> bool {
        self.ended
    }

    pub(crate) fn reset(&mut self) {
        self.ops.clear();
        self.barrier_batch.clear();
        self.recording = false;
        self.ended = false;
    }

    fn check_recording(&self) -> GfxResult<()> {
        if self.recording {
            Ok(())
        } else {
            Err("command context is not recording".into())
        }
    }

    /// The recorded op stream. Tests assert against this.
    pub fn recorded_ops(&self) -> &[NativeOp] {
        &self.ops
    }

    /// Barriers accumulated but not yet flushed into the op stream.
    pub fn pending_barriers(&self) -> &[NativeBarrier] {
        &self.barrier_batch
    }

    pub(crate) fn record(&mut self, op: NativeOp) {
        debug_assert!(self.recording);
        self.ops.push(op);
    }

    /// Flushes the pending barrier batch into the op stream.
    pub fn flush_barriers(&mut self) {
        if !self.barrier_batch.is_empty() {
            let batch = std::mem::take(&mut self.barrier_batch);
            self.ops.push(NativeOp::Barriers(batch));
        }
    }

    /// Transitions a texture (or one subresource of it) to `new_state`.
    /// Transitions into the state the resource is already in are elided,
    /// except unordered-access to unordered-access, which still needs a
    /// write-visibility barrier.
    pub fn cmd_texture_barrier(
        &mut self,
        texture: &Texture,
        subresource: Option<SubresourceIndex>,
        new_state: ResourceState,
    ) -> GfxResult<()> {
        self.check_recording()?;

        if subresource.is_none() && !texture.has_uniform_state() {
            // Whole-resource transition over split tracking: bring every
            // subresource to the target state individually.
            let layout = *texture.subresource_layout();
            for linear in 0..layout.subresource_count() {
                self.texture_barrier_inner(texture, Some(layout.describe(linear)), new_state);
            }
            return Ok(());
        }
        self.texture_barrier_inner(texture, subresource, new_state);
        Ok(())
    }

    fn texture_barrier_inner(
        &mut self,
        texture: &Texture,
        subresource: Option<SubresourceIndex>,
        new_state: ResourceState,
    ) {
        let current = texture.current_state(subresource);
        if current == new_state {
            if new_state.intersects(ResourceState::UNORDERED_ACCESS) {
                self.barrier_batch.push(NativeBarrier::UnorderedAccess {
                    resource_id: texture.texture_id(),
                });
            }
            return;
        }
        let linear = subresource.map(|index| texture.subresource_layout().linear_index(index));
        self.barrier_batch
            .push(NativeBarrier::TextureTransition(texture_transition(
                texture, linear, current, new_state,
            )));
        texture.record_state(subresource, new_state);
    }

    /// Buffer variant of `cmd_texture_barrier`, single subresource.
    pub fn cmd_buffer_barrier(&mut self, buffer: &Buffer, new_state: ResourceState) -> GfxResult<()> {
        self.check_recording()?;
        self.buffer_barrier_inner(buffer, new_state);
        Ok(())
    }

    fn buffer_barrier_inner(&mut self, buffer: &Buffer, new_state: ResourceState) {
        let current = buffer.current_state();
        if current == new_state {
            if new_state.intersects(ResourceState::UNORDERED_ACCESS) {
                self.barrier_batch.push(NativeBarrier::UnorderedAccess {
                    resource_id: buffer.buffer_id(),
                });
            }
            return;
        }
        self.barrier_batch
            .push(NativeBarrier::BufferTransition(buffer_transition(
                buffer, current, new_state,
            )));
        buffer.record_state(new_state);
    }

    /// Application-facing barrier list. Per-subresource texture entries that
    /// together cover every distinct subresource with one target state merge
    /// into a single whole-resource transition. Transitions into an
    /// unordered-access state are followed by a write-visibility barrier.
    pub fn cmd_barrier_list(
        &mut self,
        texture_barriers: &[NglTextureBarrier<'_>],
        buffer_barriers: &[NglBufferBarrier<'_>],
    ) -> GfxResult<()> {
        self.check_recording()?;

        struct Coverage {
            state: ResourceState,
            uniform: bool,
            whole: bool,
            subresources: FnvHashSet<u32>,
        }

        // Distinct-subresource coverage per texture. Duplicate entries for
        // the same subresource must not count toward a whole-resource merge.
        let mut coverage: FnvHashMap<u32, Coverage> = FnvHashMap::default();
        for barrier in texture_barriers {
            let dst = ResourceState::from(barrier.new_state);
            let linear = barrier
                .subresource
                .map(|index| barrier.texture.subresource_layout().linear_index(index));
            let entry = coverage
                .entry(barrier.texture.texture_id())
                .or_insert_with(|| Coverage {
                    state: dst,
                    uniform: true,
                    whole: false,
                    subresources: FnvHashSet::default(),
                });
            entry.uniform &= entry.state == dst;
            match linear {
                Some(linear) => {
                    entry.subresources.insert(linear);
                }
                None => entry.whole = true,
            }
        }

        let mut merged: Vec<u32> = Vec::new();
        for barrier in texture_barriers {
            let texture = barrier.texture;
            let dst = ResourceState::from(barrier.new_state);
            let id = texture.texture_id();
            if let Some(cover) = coverage.get(&id) {
                let mergeable = cover.uniform
                    && !cover.whole
                    && cover.subresources.len() > 1
                    && cover.subresources.len() as u32 == texture.subresource_count()
                    && texture.has_uniform_state();
                if mergeable {
                    if !merged.contains(&id) {
                        merged.push(id);
                        let src = texture.current_state(None);
                        self.texture_barrier_inner(texture, None, dst);
                        if src != dst {
                            self.uav_follow_up(texture, dst);
                        }
                    }
                    continue;
                }
            }
            let changed = if barrier.subresource.is_none() && !texture.has_uniform_state() {
                // Whole-resource entry over split tracking: bring every
                // subresource to the target state individually.
                let layout = *texture.subresource_layout();
                let mut changed = false;
                for linear in 0..layout.subresource_count() {
                    let index = layout.describe(linear);
                    changed |= texture.current_state(Some(index)) != dst;
                    self.texture_barrier_inner(texture, Some(index), dst);
                }
                changed
            } else {
                let src = texture.current_state(barrier.subresource);
                self.texture_barrier_inner(texture, barrier.subresource, dst);
                src != dst
            };
            if changed {
                self.uav_follow_up(texture, dst);
            }
        }

        for barrier in buffer_barriers {
            let dst = ResourceState::from(barrier.new_state);
            let changed = barrier.buffer.current_state() != dst;
            self.buffer_barrier_inner(barrier.buffer, dst);
            if changed && dst.intersects(ResourceState::UNORDERED_ACCESS) {
                self.barrier_batch.push(NativeBarrier::UnorderedAccess {
                    resource_id: barrier.buffer.buffer_id(),
                });
            }
        }
        Ok(())
    }

    // A transition into an unordered-access state also needs write
    // visibility against the new accesses.
    fn uav_follow_up(&mut self, texture: &Texture, dst: ResourceState) {
        if dst.intersects(ResourceState::UNORDERED_ACCESS) {
            self.barrier_batch.push(NativeBarrier::UnorderedAccess {
                resource_id: texture.texture_id(),
            });
        }
    }

    pub fn cmd_clear_render_target(
        &mut self,
        texture: &Texture,
        subresource: SubresourceIndex,
        color: [f32; 4],
    ) -> GfxResult<()> {
        self.check_recording()?;
        self.flush_barriers();
        let rtv_slot = texture.render_target_view_slot(subresource)?;
        self.ops.push(NativeOp::ClearRenderTarget { rtv_slot, color });
        Ok(())
    }

    pub fn cmd_clear_depth_stencil(
        &mut self,
        texture: &Texture,
        subresource: SubresourceIndex,
        depth: f32,
        stencil: u32,
    ) -> GfxResult<()> {
        self.check_recording()?;
        self.flush_barriers();
        let dsv_slot = texture.depth_stencil_view_slot(subresource, false)?;
        self.ops.push(NativeOp::ClearDepthStencil {
            dsv_slot,
            depth,
            stencil,
        });
        Ok(())
    }

    pub fn cmd_set_viewport(&mut self, viewport: Viewport) -> GfxResult<()> {
        self.check_recording()?;
        self.ops.push(NativeOp::SetViewport(viewport));
        Ok(())
    }

    pub fn cmd_set_scissor(&mut self, scissor: ScissorRect) -> GfxResult<()> {
        self.check_recording()?;
        self.ops.push(NativeOp::SetScissor(scissor));
        Ok(())
    }

    pub fn cmd_set_vertex_buffers(&mut self, buffers: &[&Buffer]) -> GfxResult<()> {
        self.check_recording()?;
        if buffers.len() > MAX_VERTEX_INPUT_BINDINGS {
            return Err(format!(
                "binding {} vertex buffers, at most {} are supported",
                buffers.len(),
                MAX_VERTEX_INPUT_BINDINGS
            )
            .into());
        }
        self.ops.push(NativeOp::SetVertexBuffers {
            buffer_ids: buffers.iter().map(|b| b.buffer_id()).collect(),
        });
        Ok(())
    }

    pub fn cmd_set_index_buffer(&mut self, buffer: &Buffer, index_type: IndexType) -> GfxResult<()> {
        self.check_recording()?;
        self.ops.push(NativeOp::SetIndexBuffer {
            buffer_id: buffer.buffer_id(),
            index_type,
        });
        Ok(())
    }
}
