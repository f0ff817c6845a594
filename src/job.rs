use std::sync::Arc;

use fnv::FnvHashMap;

use crate::{
    AttachmentUsage, BlendFactor, BlendOp, BlendStateRenderTarget, Buffer, ColorFlags,
    CommandContext, CommandQueue, CompareOp, CullMode, DeviceContext, DrawParams,
    FrontFace, GfxResult, IndexType, JobDef, NativeOp, NglResourceState, NglTextureBarrier,
    PipelineStateKey, PipelineType, PrimitiveTopology, Renderer, ResourceState, RootParameter,
    Sampler, ScissorRect, SubresourceIndex, TableEntryKind, Texture, Viewport,
};

/// A value staged for a named shader uniform, consumed when draws bind
/// root parameters.
#[derive(Debug, Clone)]
pub enum UniformValue {
    Data(Vec<u8>),
    Texture(Texture, Option<SubresourceIndex>),
    Buffer(Buffer),
    Sampler(Sampler),
}

bitflags::bitflags! {
    /// What changed since the last draw. Pipeline-affecting bits trigger a
    /// pipeline cache lookup; the rest re-record dynamic state.
    struct StateDirtyFlags: u32 {
        const SHADER = 0x0001;
        const SUBPASS = 0x0002;
        const PRIMITIVE_TYPE = 0x0004;
        const CULL = 0x0008;
        const BLEND_FUNCS = 0x0010;
        const COLOR_MASKS = 0x0020;
        const DEPTH_FUNC = 0x0040;
        const DEPTH_MASK = 0x0080;
        const VIEWPORT = 0x0100;
        const SCISSOR = 0x0200;

        const PIPELINE = Self::SHADER.bits
            | Self::SUBPASS.bits
            | Self::PRIMITIVE_TYPE.bits
            | Self::CULL.bits
            | Self::BLEND_FUNCS.bits
            | Self::COLOR_MASKS.bits
            | Self::DEPTH_FUNC.bits
            | Self::DEPTH_MASK.bits;
    }
}

/// Blend factors and ops shared by every color target of a job. Write masks
/// are set per target with `Job::set_color_mask`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlendFunction {
    pub src_factor: BlendFactor,
    pub dst_factor: BlendFactor,
    pub src_factor_alpha: BlendFactor,
    pub dst_factor_alpha: BlendFactor,
    pub blend_op: BlendOp,
    pub blend_op_alpha: BlendOp,
}

impl Default for BlendFunction {
    fn default() -> Self {
        Self {
            src_factor: BlendFactor::One,
            dst_factor: BlendFactor::Zero,
            src_factor_alpha: BlendFactor::One,
            dst_factor_alpha: BlendFactor::Zero,
            blend_op: BlendOp::Add,
            blend_op_alpha: BlendOp::Add,
        }
    }
}

#[derive(Debug, Clone)]
struct JobState {
    shader_code: u32,
    vertex_layout: crate::VertexLayout,
    topology: PrimitiveTopology,
    cull_mode: CullMode,
    front_face: FrontFace,
    blend: BlendFunction,
    color_masks: Vec<ColorFlags>,
    depth_test_enable: bool,
    depth_write_enable: bool,
    depth_compare_op: CompareOp,
    viewport: Viewport,
    scissor: ScissorRect,
}

/// One recorded unit of GPU work between two fence signals: a render pass
/// with subpasses (or a compute pass), the shadow state the application
/// mutates, and the draws recorded against it.
pub struct Job<'a> {
    queue: &'a CommandQueue,
    device_context: DeviceContext,
    def: JobDef,
    context: CommandContext,
    subpass_index: usize,
    state: JobState,
    dirty: StateDirtyFlags,
    renderer_resolved: bool,
    renderer: Option<Arc<Renderer>>,
    bound_pipeline: Option<u64>,
    uniform_values: FnvHashMap<String, UniformValue>,
    block_open: bool,
    finished: bool,
}

fn usage_state(usage: AttachmentUsage) -> Option<NglResourceState> {
    match usage {
        AttachmentUsage::Unused | AttachmentUsage::Preserved => None,
        AttachmentUsage::Color => Some(NglResourceState::ColorAttachment),
        AttachmentUsage::ColorAndInput => {
            Some(NglResourceState::ColorAttachmentAndInputAttachmentAndShaderResource)
        }
        AttachmentUsage::Depth => Some(NglResourceState::DepthAttachment),
        AttachmentUsage::ReadOnlyDepth => Some(NglResourceState::ReadOnlyDepthAttachment),
        AttachmentUsage::ReadOnlyDepthAndShaderResource => {
            Some(NglResourceState::ReadOnlyDepthAttachmentAndShaderResource)
        }
        AttachmentUsage::ShaderResource => Some(NglResourceState::ShaderResource),
    }
}

impl<'a> Job<'a> {
    /// Starts recording. Attachments transition into their first-subpass
    /// states, clear-loaded attachments are cleared (first subpass only),
    /// and the render targets are selected. The presentable attachment must
    /// enter in the present state.
    pub fn begin(queue: &'a CommandQueue, def: JobDef) -> GfxResult<Self> {
        def.verify();

        for attachment in &def.attachments {
            if attachment.is_system
                && attachment.texture.current_state(None) != ResourceState::PRESENT
            {
                return Err("system attachment is not in the present state".into());
            }
        }

        let device_context = queue.device_context().clone();
        let mut context = queue.allocate_context();
        context.begin()?;

        let viewport = def
            .attachments
            .first()
            .map(|attachment| {
                let extents = attachment.texture.extents();
                Viewport {
                    width: extents.width as f32,
                    height: extents.height as f32,
                    ..Viewport::default()
                }
            })
            .unwrap_or_default();
        let scissor = def
            .attachments
            .first()
            .map(|attachment| {
                let extents = attachment.texture.extents();
                ScissorRect {
                    x: 0,
                    y: 0,
                    width: extents.width,
                    height: extents.height,
                }
            })
            .unwrap_or_default();
        let color_masks = vec![ColorFlags::ALL; def.attachments.len()];

        let mut job = Self {
            queue,
            device_context,
            def,
            context,
            subpass_index: 0,
            state: JobState {
                shader_code: 0,
                vertex_layout: crate::VertexLayout::default(),
                topology: PrimitiveTopology::TriangleList,
                cull_mode: CullMode::None,
                front_face: FrontFace::CounterClockwise,
                blend: BlendFunction::default(),
                color_masks,
                depth_test_enable: false,
                depth_write_enable: false,
                depth_compare_op: CompareOp::LessOrEqual,
                viewport,
                scissor,
            },
            dirty: StateDirtyFlags::all(),
            renderer_resolved: false,
            renderer: None,
            bound_pipeline: None,
            uniform_values: FnvHashMap::default(),
            block_open: false,
            finished: false,
        };

        // A failure here drops the half-built job; its `Drop` returns the
        // context to the queue's pool. The bind-heap block is only opened
        // once the job is certain to record.
        if !job.def.is_compute {
            job.transition_attachments(0, None)?;
            job.clear_attachments()?;
            job.select_render_targets()?;
        }
        job.device_context.view_bind_heap().begin_block();
        job.block_open = true;
        Ok(job)
    }

    pub fn subpass_index(&self) -> usize {
        self.subpass_index
    }

    /// The op stream recorded so far. Tests assert against this.
    pub fn recorded_ops(&self) -> &[NativeOp] {
        self.context.recorded_ops()
    }

    /// Transitions attachments whose usage differs between the previous and
    /// the target subpass. With no previous subpass every used attachment
    /// transitions.
    fn transition_attachments(
        &mut self,
        subpass: usize,
        previous: Option<usize>,
    ) -> GfxResult<()> {
        let def = &self.def;
        let mut barriers = Vec::new();
        for (index, attachment) in def.attachments.iter().enumerate() {
            let usage = def.subpasses[subpass].usages[index];
            let new_state = match usage_state(usage) {
                Some(state) => state,
                None => continue,
            };
            if let Some(previous) = previous {
                if def.subpasses[previous].usages[index] == usage {
                    continue;
                }
            }
            barriers.push(NglTextureBarrier {
                texture: &attachment.texture,
                subresource: None,
                new_state,
            });
        }
        self.context.cmd_barrier_list(&barriers, &[])
    }

    fn clear_attachments(&mut self) -> GfxResult<()> {
        let def = &self.def;
        for attachment in &def.attachments {
            if attachment.load_op != crate::LoadOp::Clear {
                continue;
            }
            let format = attachment.texture.definition().format;
            if format.has_depth() {
                // Depth-only formats have no stencil aspect to clear.
                let stencil = if format.has_stencil() {
                    attachment.clear_depth_stencil.stencil
                } else {
                    0
                };
                self.context.cmd_clear_depth_stencil(
                    &attachment.texture,
                    SubresourceIndex::default(),
                    attachment.clear_depth_stencil.depth,
                    stencil,
                )?;
            } else {
                self.context.cmd_clear_render_target(
                    &attachment.texture,
                    SubresourceIndex::default(),
                    attachment.clear_color.0,
                )?;
            }
        }
        Ok(())
    }

    fn select_render_targets(&mut self) -> GfxResult<()> {
        let def = &self.def;
        let usages = &def.subpasses[self.subpass_index].usages;
        let mut rtv_slots = Vec::new();
        let mut dsv_slot = None;
        for (index, attachment) in def.attachments.iter().enumerate() {
            match usages[index] {
                AttachmentUsage::Color | AttachmentUsage::ColorAndInput => {
                    rtv_slots.push(
                        attachment
                            .texture
                            .render_target_view_slot(SubresourceIndex::default())?,
                    );
                }
                AttachmentUsage::Depth => {
                    dsv_slot = Some(
                        attachment
                            .texture
                            .depth_stencil_view_slot(SubresourceIndex::default(), false)?,
                    );
                }
                AttachmentUsage::ReadOnlyDepth
                | AttachmentUsage::ReadOnlyDepthAndShaderResource => {
                    dsv_slot = Some(
                        attachment
                            .texture
                            .depth_stencil_view_slot(SubresourceIndex::default(), true)?,
                    );
                }
                _ => {}
            }
        }
        self.context.flush_barriers();
        self.context.record(NativeOp::SetRenderTargets {
            rtv_slots,
            dsv_slot,
        });
        Ok(())
    }

    /// Advances to the next subpass. Only attachments whose usage actually
    /// changed are transitioned.
    pub fn next_subpass(&mut self) -> GfxResult<()> {
        if self.def.is_compute {
            return Err("compute jobs have no subpasses".into());
        }
        let next = self.subpass_index + 1;
        if next >= self.def.subpasses.len() {
            return Err("job has no further subpasses".into());
        }
        self.transition_attachments(next, Some(self.subpass_index))?;
        self.subpass_index = next;
        self.select_render_targets()?;
        self.dirty |= StateDirtyFlags::SUBPASS;
        Ok(())
    }

    pub fn set_shader(&mut self, shader_code: u32, vertex_layout: &crate::VertexLayout) {
        if self.state.shader_code != shader_code || &self.state.vertex_layout != vertex_layout {
            self.state.shader_code = shader_code;
            self.state.vertex_layout = vertex_layout.clone();
            self.renderer_resolved = false;
            self.dirty |= StateDirtyFlags::SHADER;
        }
    }

    pub fn set_primitive_topology(&mut self, topology: PrimitiveTopology) {
        if self.state.topology != topology {
            self.state.topology = topology;
            self.dirty |= StateDirtyFlags::PRIMITIVE_TYPE;
        }
    }

    pub fn set_cull_mode(&mut self, cull_mode: CullMode, front_face: FrontFace) {
        if self.state.cull_mode != cull_mode || self.state.front_face != front_face {
            self.state.cull_mode = cull_mode;
            self.state.front_face = front_face;
            self.dirty |= StateDirtyFlags::CULL;
        }
    }

    pub fn set_blend_function(&mut self, blend: BlendFunction) {
        if self.state.blend != blend {
            self.state.blend = blend;
            self.dirty |= StateDirtyFlags::BLEND_FUNCS;
        }
    }

    pub fn set_color_mask(&mut self, attachment_index: usize, mask: ColorFlags) {
        if self.state.color_masks.get(attachment_index) != Some(&mask) {
            self.state.color_masks[attachment_index] = mask;
            self.dirty |= StateDirtyFlags::COLOR_MASKS;
        }
    }

    /// Changing the compare direction flips the depth range, so this also
    /// re-applies the viewport.
    pub fn set_depth_test(&mut self, enable: bool, compare_op: CompareOp) {
        if self.state.depth_test_enable != enable || self.state.depth_compare_op != compare_op {
            self.state.depth_test_enable = enable;
            self.state.depth_compare_op = compare_op;
            self.dirty |= StateDirtyFlags::DEPTH_FUNC;
        }
    }

    pub fn set_depth_write(&mut self, enable: bool) {
        if self.state.depth_write_enable != enable {
            self.state.depth_write_enable = enable;
            self.dirty |= StateDirtyFlags::DEPTH_MASK;
        }
    }

    /// Sets the viewport rectangle. The depth range is derived from the
    /// depth compare direction and cannot be set directly.
    pub fn set_viewport(&mut self, x: f32, y: f32, width: f32, height: f32) {
        let current = &self.state.viewport;
        if (current.x, current.y, current.width, current.height) != (x, y, width, height) {
            self.state.viewport = Viewport {
                x,
                y,
                width,
                height,
                ..self.state.viewport
            };
            self.dirty |= StateDirtyFlags::VIEWPORT;
        }
    }

    pub fn set_scissor(&mut self, scissor: ScissorRect) {
        if self.state.scissor != scissor {
            self.state.scissor = scissor;
            self.dirty |= StateDirtyFlags::SCISSOR;
        }
    }

    pub fn set_uniform_data(&mut self, name: &str, data: &[u8]) {
        self.uniform_values
            .insert(name.to_string(), UniformValue::Data(data.to_vec()));
    }

    pub fn set_uniform_texture(&mut self, name: &str, texture: &Texture) {
        self.uniform_values
            .insert(name.to_string(), UniformValue::Texture(texture.clone(), None));
    }

    pub fn set_uniform_texture_subresource(
        &mut self,
        name: &str,
        texture: &Texture,
        subresource: SubresourceIndex,
    ) {
        self.uniform_values.insert(
            name.to_string(),
            UniformValue::Texture(texture.clone(), Some(subresource)),
        );
    }

    pub fn set_uniform_buffer(&mut self, name: &str, buffer: &Buffer) {
        self.uniform_values
            .insert(name.to_string(), UniformValue::Buffer(buffer.clone()));
    }

    pub fn set_uniform_sampler(&mut self, name: &str, sampler: &Sampler) {
        self.uniform_values
            .insert(name.to_string(), UniformValue::Sampler(sampler.clone()));
    }

    pub fn set_vertex_buffers(&mut self, buffers: &[&Buffer]) -> GfxResult<()> {
        self.context.cmd_set_vertex_buffers(buffers)
    }

    pub fn set_index_buffer(&mut self, buffer: &Buffer, index_type: IndexType) -> GfxResult<()> {
        self.context.cmd_set_index_buffer(buffer, index_type)
    }

    fn resolve_renderer(&mut self) -> Option<Arc<Renderer>> {
        if !self.renderer_resolved {
            self.renderer = self.device_context.renderer_cache().get_or_create(
                self.device_context.backend().as_ref(),
                self.state.shader_code,
                &self.state.vertex_layout,
                &self.def.load_shader,
            );
            self.renderer_resolved = true;
            self.bound_pipeline = None;
        }
        self.renderer.clone()
    }

    fn pipeline_state_key(&self) -> PipelineStateKey {
        let usages = &self.def.subpasses[self.subpass_index].usages;
        let mut blend_states = Vec::new();
        let mut color_formats = Vec::new();
        let mut depth_format = None;
        let mut sample_count = crate::SampleCount::SampleCount1;
        for (index, attachment) in self.def.attachments.iter().enumerate() {
            let def = attachment.texture.definition();
            match usages[index] {
                AttachmentUsage::Color | AttachmentUsage::ColorAndInput => {
                    color_formats.push(def.format);
                    sample_count = def.sample_count;
                    blend_states.push(BlendStateRenderTarget {
                        src_factor: self.state.blend.src_factor,
                        dst_factor: self.state.blend.dst_factor,
                        src_factor_alpha: self.state.blend.src_factor_alpha,
                        dst_factor_alpha: self.state.blend.dst_factor_alpha,
                        blend_op: self.state.blend.blend_op,
                        blend_op_alpha: self.state.blend.blend_op_alpha,
                        masks: self.state.color_masks[index],
                    });
                }
                AttachmentUsage::Depth
                | AttachmentUsage::ReadOnlyDepth
                | AttachmentUsage::ReadOnlyDepthAndShaderResource => {
                    depth_format = Some(def.format);
                }
                _ => {}
            }
        }
        PipelineStateKey {
            topology: self.state.topology,
            cull_mode: self.state.cull_mode,
            front_face: self.state.front_face,
            blend_states,
            depth_test_enable: self.state.depth_test_enable,
            depth_write_enable: self.state.depth_write_enable,
            depth_compare_op: self.state.depth_compare_op,
            color_formats,
            depth_format,
            sample_count,
        }
    }

    /// The effective viewport: a greater-direction depth test means
    /// reversed depth, which maps through an inverted depth range.
    fn effective_viewport(&self) -> Viewport {
        let reversed = self.state.depth_test_enable
            && matches!(
                self.state.depth_compare_op,
                CompareOp::Greater | CompareOp::GreaterOrEqual
            );
        let (min_depth, max_depth) = if reversed { (1.0, 0.0) } else { (0.0, 1.0) };
        Viewport {
            min_depth,
            max_depth,
            ..self.state.viewport
        }
    }

    /// Applies dirty pipeline and dynamic state. Returns false when the
    /// pipeline could not be built and the draw must be skipped.
    fn apply_state(&mut self, renderer: &Renderer) -> GfxResult<bool> {
        let mut dirty = self.dirty;
        if dirty.intersects(StateDirtyFlags::PIPELINE) || self.bound_pipeline.is_none() {
            let key = if renderer.pipeline_type() == PipelineType::Graphics {
                self.pipeline_state_key()
            } else {
                PipelineStateKey::default()
            };
            let pipeline = match renderer
                .get_or_create_pipeline(self.device_context.backend().as_ref(), &key)
            {
                Some(pipeline) => pipeline,
                None => {
                    log::trace!(
                        "Skipping work for shader program {} with no pipeline",
                        renderer.shader_code()
                    );
                    return Ok(false);
                }
            };
            if self.bound_pipeline != Some(pipeline) {
                self.context
                    .record(NativeOp::SetPipeline { pipeline_id: pipeline });
                self.bound_pipeline = Some(pipeline);
            }
        }
        if dirty.intersects(StateDirtyFlags::DEPTH_FUNC) {
            dirty |= StateDirtyFlags::VIEWPORT;
        }
        if renderer.pipeline_type() == PipelineType::Graphics {
            if dirty.intersects(StateDirtyFlags::VIEWPORT) {
                let viewport = self.effective_viewport();
                self.context.cmd_set_viewport(viewport)?;
            }
            if dirty.intersects(StateDirtyFlags::SCISSOR) {
                self.context.cmd_set_scissor(self.state.scissor)?;
            }
        }
        self.dirty = StateDirtyFlags::empty();
        Ok(true)
    }

    fn constant_blob(
        values: &FnvHashMap<String, UniformValue>,
        constants: &[crate::ClassifiedConstant],
        num_constants: u32,
    ) -> Vec<u8> {
        let mut blob = vec![0_u8; num_constants as usize * 4];
        for constant in constants {
            match values.get(&constant.name) {
                Some(UniformValue::Data(data)) => {
                    let begin = constant.offset as usize;
                    let len = data.len().min(constant.size as usize).min(blob.len() - begin);
                    blob[begin..begin + len].copy_from_slice(&data[..len]);
                }
                _ => log::warn!("Uniform {} has no staged constant data", constant.name),
            }
        }
        blob
    }

    /// Binds every root parameter for the current renderer. Returns false
    /// when a table entry has no staged value, skipping the draw.
    fn bind_root_parameters(&mut self, renderer: &Renderer) -> GfxResult<bool> {
        let signature = renderer.root_signature();
        for (index, parameter) in signature.parameters.iter().enumerate() {
            let parameter_index = index as u32;
            match parameter {
                RootParameter::InlineConstants {
                    num_constants,
                    constants,
                    ..
                } => {
                    let blob =
                        Self::constant_blob(&self.uniform_values, constants, *num_constants);
                    self.context.record(NativeOp::SetRootConstants {
                        parameter: parameter_index,
                        num_dwords: *num_constants,
                        data: blob,
                    });
                }
                RootParameter::ConstantBufferView {
                    num_constants,
                    constants,
                    ..
                } => {
                    let blob =
                        Self::constant_blob(&self.uniform_values, constants, *num_constants);
                    let mut upload = self.device_context.upload_allocator();
                    let allocation = upload.allocate(blob.len() as u64, self.queue)?;
                    upload.write(&allocation, &blob)?;
                    drop(upload);
                    self.context.record(NativeOp::SetRootConstantBuffer {
                        parameter: parameter_index,
                        page_id: allocation.page_id,
                        offset: allocation.offset,
                    });
                }
                RootParameter::ViewTable { entries, .. } => {
                    let mut src_slots = Vec::with_capacity(entries.len());
                    for entry in entries {
                        let slot = match self.uniform_values.get(&entry.name) {
                            Some(UniformValue::Texture(texture, subresource)) => match entry.kind
                            {
                                TableEntryKind::ShaderResource => match subresource {
                                    Some(subresource) => {
                                        texture.shader_resource_subresource_slot(*subresource)?
                                    }
                                    None => texture.shader_resource_view_slot()?,
                                },
                                TableEntryKind::UnorderedAccess => {
                                    texture.unordered_access_view_slot()?
                                }
                            },
                            Some(UniformValue::Buffer(buffer)) => match entry.kind {
                                TableEntryKind::ShaderResource => {
                                    buffer.shader_resource_view_slot()?
                                }
                                TableEntryKind::UnorderedAccess => {
                                    buffer.unordered_access_view_slot()?
                                }
                            },
                            _ => {
                                log::warn!("Uniform {} has no bound resource", entry.name);
                                return Ok(false);
                            }
                        };
                        src_slots.push(slot);
                    }
                    let base = self
                        .device_context
                        .view_bind_heap()
                        .request_range(src_slots.len() as u32, self.queue)?;
                    self.context.record(NativeOp::CopyViewDescriptors {
                        dst_base: base,
                        src_slots,
                    });
                    self.context.record(NativeOp::SetViewTable {
                        parameter: parameter_index,
                        base_slot: base,
                    });
                }
                RootParameter::SamplerTable { samplers, .. } => {
                    let mut src_slots = Vec::with_capacity(samplers.len());
                    for sampler in samplers {
                        match self.uniform_values.get(&sampler.name) {
                            Some(UniformValue::Sampler(sampler)) => {
                                src_slots.push(sampler.slot());
                            }
                            _ => {
                                log::warn!("Uniform {} has no bound sampler", sampler.name);
                                return Ok(false);
                            }
                        }
                    }
                    let allocation = self
                        .device_context
                        .sampler_bind_heap()
                        .request(&src_slots)?;
                    if allocation.created {
                        self.context.record(NativeOp::CopySamplerDescriptors {
                            dst_base: allocation.base,
                            src_slots,
                        });
                    }
                    self.context.record(NativeOp::SetSamplerTable {
                        parameter: parameter_index,
                        base_slot: allocation.base,
                    });
                }
            }
        }
        Ok(true)
    }

    /// Records one draw. A failed renderer or pipeline skips the draw
    /// rather than failing the job.
    pub fn draw(&mut self, params: &DrawParams) -> GfxResult<()> {
        if self.def.is_compute {
            return Err("draw recorded on a compute job".into());
        }
        let renderer = match self.resolve_renderer() {
            Some(renderer) => renderer,
            None => {
                log::trace!(
                    "Skipping draw for failed shader program {}",
                    self.state.shader_code
                );
                return Ok(());
            }
        };
        if renderer.pipeline_type() != PipelineType::Graphics {
            return Err("draw recorded with a compute shader program".into());
        }
        if !self.apply_state(&renderer)? {
            return Ok(());
        }
        if !self.bind_root_parameters(&renderer)? {
            return Ok(());
        }
        self.context.flush_barriers();
        self.context.record(NativeOp::DrawIndexedInstanced {
            index_count: params.index_count,
            instance_count: params.instance_count.max(1),
            first_index: params.first_index,
            vertex_offset: params.vertex_offset,
            first_instance: params.first_instance,
        });
        Ok(())
    }

    /// Records one compute dispatch.
    pub fn dispatch(&mut self, group_counts: [u32; 3]) -> GfxResult<()> {
        if !self.def.is_compute {
            return Err("dispatch recorded on a graphics job".into());
        }
        let renderer = match self.resolve_renderer() {
            Some(renderer) => renderer,
            None => {
                log::trace!(
                    "Skipping dispatch for failed shader program {}",
                    self.state.shader_code
                );
                return Ok(());
            }
        };
        if renderer.pipeline_type() != PipelineType::Compute {
            return Err("dispatch recorded with a graphics shader program".into());
        }
        if !self.apply_state(&renderer)? {
            return Ok(());
        }
        if !self.bind_root_parameters(&renderer)? {
            return Ok(());
        }
        self.context.flush_barriers();
        self.context.record(NativeOp::Dispatch {
            group_count_x: group_counts[0],
            group_count_y: group_counts[1],
            group_count_z: group_counts[2],
        });
        Ok(())
    }

    /// Finishes recording and submits. The presentable attachment returns
    /// to the present state, everything the job allocated out of the shared
    /// rings is tagged with the submission fence, and the deferred-drop
    /// frame advances.
    pub fn end(mut self) -> GfxResult<u64> {
        for attachment in &self.def.attachments {
            if attachment.is_system {
                self.context
                    .cmd_texture_barrier(&attachment.texture, None, ResourceState::PRESENT)?;
            }
        }
        self.context.end()?;
        let context = std::mem::take(&mut self.context);
        let fence_value = self.queue.submit(vec![context])?;
        self.finished = true;
        self.device_context.view_bind_heap().end_block(fence_value);
        self.device_context.upload_allocator().discard_pages(fence_value);
        self.device_context.free_gpu_memory();
        Ok(fence_value)
    }
}

impl Drop for Job<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        // Abandoned or failed job: return the context to the queue's pool
        // and close the bind-heap block so the next job can open one. Its
        // ranges were never referenced by a submission, so they reclaim at
        // the last fence the queue already signaled.
        self.queue
            .discard_context(std::mem::take(&mut self.context));
        if self.block_open {
            self.device_context
                .view_bind_heap()
                .end_block(self.queue.last_signaled_fence_value());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        AttachmentDef, ColorClearValue, DepthStencilClearValue, DeviceContext, Extents3D, Format,
        LoadOp,
        QueueType, ReflectedConstantBuffer, ReflectedConstantBufferMember, ResourceUsage,
        ShaderProgramDef, ShaderStageDef, ShaderStageFlags, ShaderStageReflection, StoreOp,
        SubpassDef, TextureDef, UniformDef, UniformFormat, UniformGroup,
    };

    fn color_target(device: &DeviceContext, system: bool) -> Texture {
        let def = TextureDef {
            extents: Extents3D {
                width: 64,
                height: 64,
                depth: 1,
            },
            format: Format::R8G8B8A8_UNORM,
            usage_flags: ResourceUsage::HAS_RENDER_TARGET_VIEW
                | ResourceUsage::HAS_SHADER_RESOURCE_VIEW,
            ..TextureDef::default()
        };
        if system {
            Texture::with_initial_state(device, &def, ResourceState::PRESENT).unwrap()
        } else {
            Texture::new(device, &def).unwrap()
        }
    }

    fn depth_target(device: &DeviceContext) -> Texture {
        Texture::new(
            device,
            &TextureDef {
                extents: Extents3D {
                    width: 64,
                    height: 64,
                    depth: 1,
                },
                format: Format::D32_FLOAT,
                usage_flags: ResourceUsage::HAS_DEPTH_STENCIL_VIEW,
                ..TextureDef::default()
            },
        )
        .unwrap()
    }

    fn attachment(texture: Texture, system: bool) -> AttachmentDef {
        AttachmentDef {
            texture,
            load_op: LoadOp::Clear,
            store_op: StoreOp::Store,
            clear_color: ColorClearValue([0.0, 0.0, 0.0, 1.0]),
            clear_depth_stencil: DepthStencilClearValue::default(),
            is_system: system,
        }
    }

    fn graphics_program() -> ShaderProgramDef {
        ShaderProgramDef {
            stages: vec![
                ShaderStageDef {
                    stage: ShaderStageFlags::VERTEX,
                    entry_point: "vs_main".to_string(),
                    bytecode: vec![1, 2, 3, 4],
                    reflection: ShaderStageReflection {
                        shader_stage: ShaderStageFlags::VERTEX,
                        constant_buffers: vec![ReflectedConstantBuffer {
                            name: "per_draw".to_string(),
                            register: 0,
                            size: 64,
                            members: vec![ReflectedConstantBufferMember {
                                name: "mvp".to_string(),
                                offset: 0,
                                size: 64,
                                active: true,
                            }],
                        }],
                        ..ShaderStageReflection::default()
                    },
                },
                ShaderStageDef {
                    stage: ShaderStageFlags::FRAGMENT,
                    entry_point: "ps_main".to_string(),
                    bytecode: vec![5, 6, 7, 8],
                    reflection: ShaderStageReflection {
                        shader_stage: ShaderStageFlags::FRAGMENT,
                        ..ShaderStageReflection::default()
                    },
                },
            ],
            used_uniforms: vec![UniformDef {
                name: "mvp".to_string(),
                format: UniformFormat::Float16,
                size: 64,
                group: UniformGroup::PerDraw,
            }],
        }
    }

    fn simple_job_def(device: &DeviceContext) -> JobDef {
        JobDef {
            is_compute: false,
            attachments: vec![
                attachment(color_target(device, true), true),
                attachment(depth_target(device), false),
            ],
            subpasses: vec![SubpassDef {
                usages: vec![AttachmentUsage::Color, AttachmentUsage::Depth],
            }],
            load_shader: Box::new(|_| Some(graphics_program())),
        }
    }

    #[test]
    fn system_attachment_must_enter_in_present_state() {
        let device = DeviceContext::new_null().unwrap();
        let queue = device.create_queue(QueueType::Graphics);
        let def = JobDef {
            is_compute: false,
            attachments: vec![attachment(color_target(&device, false), true)],
            subpasses: vec![SubpassDef {
                usages: vec![AttachmentUsage::Color],
            }],
            load_shader: Box::new(|_| None),
        };
        assert!(Job::begin(&queue, def).is_err());
    }

    #[test]
    fn end_returns_the_system_attachment_to_present() {
        let device = DeviceContext::new_null().unwrap();
        let queue = device.create_queue(QueueType::Graphics);
        let def = simple_job_def(&device);
        let system = def.attachments[0].texture.clone();

        let job = Job::begin(&queue, def).unwrap();
        assert_eq!(system.current_state(None), ResourceState::RENDER_TARGET);
        job.end().unwrap();
        assert_eq!(system.current_state(None), ResourceState::PRESENT);
    }

    #[test]
    fn greater_depth_test_inverts_the_viewport_depth_range() {
        let device = DeviceContext::new_null().unwrap();
        let queue = device.create_queue(QueueType::Graphics);
        let mut job = Job::begin(&queue, simple_job_def(&device)).unwrap();

        job.set_shader(1, &crate::VertexLayout::default());
        job.set_depth_test(true, CompareOp::Greater);
        job.draw(&DrawParams::default()).unwrap();

        let viewport = job
            .recorded_ops()
            .iter()
            .filter_map(|op| match op {
                NativeOp::SetViewport(viewport) => Some(*viewport),
                _ => None,
            })
            .last()
            .unwrap();
        assert_eq!(viewport.min_depth, 1.0);
        assert_eq!(viewport.max_depth, 0.0);

        job.set_depth_test(true, CompareOp::LessOrEqual);
        job.draw(&DrawParams::default()).unwrap();
        let viewport = job
            .recorded_ops()
            .iter()
            .filter_map(|op| match op {
                NativeOp::SetViewport(viewport) => Some(*viewport),
                _ => None,
            })
            .last()
            .unwrap();
        assert_eq!(viewport.min_depth, 0.0);
        assert_eq!(viewport.max_depth, 1.0);
    }

    #[test]
    fn failed_begin_leaves_the_device_usable() {
        let device = DeviceContext::new_null().unwrap();
        let queue = device.create_queue(QueueType::Graphics);

        // A clear-loaded color attachment without render-target views makes
        // begin fail while recording the clears.
        let bad_texture = Texture::new(
            &device,
            &TextureDef {
                extents: Extents3D {
                    width: 64,
                    height: 64,
                    depth: 1,
                },
                format: Format::R8G8B8A8_UNORM,
                usage_flags: ResourceUsage::HAS_SHADER_RESOURCE_VIEW,
                ..TextureDef::default()
            },
        )
        .unwrap();
        let def = JobDef {
            is_compute: false,
            attachments: vec![attachment(bad_texture, false)],
            subpasses: vec![SubpassDef {
                usages: vec![AttachmentUsage::Color],
            }],
            load_shader: Box::new(|_| None),
        };
        assert!(Job::begin(&queue, def).is_err());

        // The failure must not wedge the shared bind heap or the pool.
        let mut job = Job::begin(&queue, simple_job_def(&device)).unwrap();
        job.set_shader(1, &crate::VertexLayout::default());
        job.draw(&DrawParams::default()).unwrap();
        job.end().unwrap();
    }

    #[test]
    fn abandoned_jobs_release_their_recording_state() {
        let device = DeviceContext::new_null().unwrap();
        let queue = device.create_queue(QueueType::Graphics);
        {
            let mut job = Job::begin(&queue, simple_job_def(&device)).unwrap();
            job.set_shader(1, &crate::VertexLayout::default());
            job.draw(&DrawParams::default()).unwrap();
            // Dropped without end.
        }
        let job = Job::begin(&queue, simple_job_def(&device)).unwrap();
        job.end().unwrap();
    }

    #[test]
    fn missing_constant_data_zero_fills_and_still_draws() {
        let device = DeviceContext::new_null().unwrap();
        let queue = device.create_queue(QueueType::Graphics);
        let mut job = Job::begin(&queue, simple_job_def(&device)).unwrap();

        // "mvp" is never staged; the draw goes through with zeroed data.
        job.set_shader(1, &crate::VertexLayout::default());
        job.draw(&DrawParams::default()).unwrap();
        assert!(job
            .recorded_ops()
            .iter()
            .any(|op| matches!(op, NativeOp::DrawIndexedInstanced { .. })));
        let constants = job
            .recorded_ops()
            .iter()
            .find_map(|op| match op {
                NativeOp::SetRootConstants { data, .. } => Some(data.clone()),
                _ => None,
            })
            .unwrap();
        assert!(constants.iter().all(|byte| *byte == 0));
        job.end().unwrap();
    }

    #[test]
    fn dropped_resources_are_released_between_frames() {
        let device = DeviceContext::new_null().unwrap();
        let queue = device.create_queue(QueueType::Graphics);

        drop(color_target(&device, false));
        // Each submit advances the deferred-drop frame until the dropped
        // texture's bucket cycles out.
        for _ in 0..4 {
            let job = Job::begin(&queue, simple_job_def(&device)).unwrap();
            job.end().unwrap();
        }
        queue.wait_idle().unwrap();
        device.destroy();
        // Device teardown below re-checks that nothing stayed parked; the
        // dropper asserts its buckets and channel are empty on drop.
    }

    #[test]
    fn draws_with_a_failed_shader_program_are_skipped() {
        let device = DeviceContext::new_null().unwrap();
        let queue = device.create_queue(QueueType::Graphics);
        let mut def = simple_job_def(&device);
        def.load_shader = Box::new(|_| None);
        let mut job = Job::begin(&queue, def).unwrap();

        job.set_shader(1, &crate::VertexLayout::default());
        job.draw(&DrawParams::default()).unwrap();
        assert!(!job
            .recorded_ops()
            .iter()
            .any(|op| matches!(op, NativeOp::DrawIndexedInstanced { .. })));
        job.end().unwrap();
    }

    #[test]
    fn compute_jobs_reject_draws_and_record_dispatches() {
        let device = DeviceContext::new_null().unwrap();
        let queue = device.create_queue(QueueType::Compute);
        let def = JobDef {
            is_compute: true,
            attachments: Vec::new(),
            subpasses: Vec::new(),
            load_shader: Box::new(|_| {
                Some(ShaderProgramDef {
                    stages: vec![ShaderStageDef {
                        stage: ShaderStageFlags::COMPUTE,
                        entry_point: "cs_main".to_string(),
                        bytecode: vec![9, 9, 9],
                        reflection: ShaderStageReflection {
                            shader_stage: ShaderStageFlags::COMPUTE,
                            compute_threads_per_group: Some([8, 8, 1]),
                            ..ShaderStageReflection::default()
                        },
                    }],
                    used_uniforms: Vec::new(),
                })
            }),
        };
        let mut job = Job::begin(&queue, def).unwrap();
        assert!(job.draw(&DrawParams::default()).is_err());
        job.set_shader(2, &crate::VertexLayout::default());
        job.dispatch([4, 4, 1]).unwrap();
        assert!(job
            .recorded_ops()
            .iter()
            .any(|op| matches!(op, NativeOp::Dispatch { .. })));
        job.end().unwrap();
    }
}
