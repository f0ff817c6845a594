use std::sync::{Arc, Mutex};

use fnv::FnvHashMap;

use crate::{
    BlendStateRenderTarget, ClassifiedLayout, CompareOp, CullMode, Format, FrontFace, GfxResult,
    NativeBackend, PipelineReflection, PipelineType, PrimitiveTopology, RootSignatureLayout,
    SampleCount, ShaderLoadFn, ShaderProgramDef, ShaderStageFlags, VertexLayout,
};

/// All fixed-function state a graphics pipeline bakes in. This is the second
/// cache level: one renderer owns one pipeline per distinct key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PipelineStateKey {
    pub topology: PrimitiveTopology,
    pub cull_mode: CullMode,
    pub front_face: FrontFace,
    pub blend_states: Vec<BlendStateRenderTarget>,
    pub depth_test_enable: bool,
    pub depth_write_enable: bool,
    pub depth_compare_op: CompareOp,
    pub color_formats: Vec<Format>,
    pub depth_format: Option<Format>,
    pub sample_count: SampleCount,
}

impl Default for PipelineStateKey {
    fn default() -> Self {
        Self {
            topology: PrimitiveTopology::TriangleList,
            cull_mode: CullMode::None,
            front_face: FrontFace::CounterClockwise,
            blend_states: Vec::new(),
            depth_test_enable: false,
            depth_write_enable: false,
            depth_compare_op: CompareOp::LessOrEqual,
            color_formats: Vec::new(),
            depth_format: None,
            sample_count: SampleCount::SampleCount1,
        }
    }
}

/// Everything the backend needs to build a pipeline state object.
#[derive(Debug, Clone)]
pub struct NativePipelineDesc {
    pub pipeline_type: PipelineType,
    pub shader_modules: Vec<(ShaderStageFlags, u64)>,
    pub root_signature_hash: u64,
    pub vertex_layout: VertexLayout,
    pub state: PipelineStateKey,
}

/// A compiled shader program with its resolved root signature and the
/// pipelines built from it so far.
pub struct Renderer {
    shader_code: u32,
    pipeline_type: PipelineType,
    vertex_layout: VertexLayout,
    reflection: PipelineReflection,
    layout: ClassifiedLayout,
    root_signature: RootSignatureLayout,
    shader_modules: Vec<(ShaderStageFlags, u64)>,
    // None memoizes a failed pipeline build so it is not retried every draw
    pipelines: Mutex<FnvHashMap<PipelineStateKey, Option<u64>>>,
}

impl std::fmt::Debug for Renderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer")
            .field("shader_code", &self.shader_code)
            .field("pipeline_type", &self.pipeline_type)
            .finish()
    }
}

impl Renderer {
    pub fn new(
        backend: &dyn NativeBackend,
        shader_code: u32,
        vertex_layout: &VertexLayout,
        program: &ShaderProgramDef,
    ) -> GfxResult<Self> {
        let stage_reflections: Vec<_> = program.stages.iter().map(|s| &s.reflection).collect();
        let reflection = PipelineReflection::from_stages(&stage_reflections)?;

        let pipeline_type = if reflection.shader_stages.intersects(ShaderStageFlags::COMPUTE) {
            PipelineType::Compute
        } else {
            PipelineType::Graphics
        };

        let layout = crate::classify_uniforms(&reflection, &program.used_uniforms)?;
        if layout.constant_buffers.is_empty()
            && layout.table_entries.is_empty()
            && layout.samplers.is_empty()
            && layout.static_samplers.is_empty()
        {
            log::warn!("Shader program {} binds no uniforms", shader_code);
        }

        let root_signature =
            RootSignatureLayout::build(&layout, pipeline_type == PipelineType::Graphics)?;

        let mut shader_modules = Vec::with_capacity(program.stages.len());
        for stage in &program.stages {
            let module = backend.create_shader_module(stage.stage, &stage.bytecode)?;
            shader_modules.push((stage.stage, module));
        }

        Ok(Self {
            shader_code,
            pipeline_type,
            vertex_layout: vertex_layout.clone(),
            reflection,
            layout,
            root_signature,
            shader_modules,
            pipelines: Mutex::new(FnvHashMap::default()),
        })
    }

    pub fn shader_code(&self) -> u32 {
        self.shader_code
    }

    pub fn pipeline_type(&self) -> PipelineType {
        self.pipeline_type
    }

    pub fn reflection(&self) -> &PipelineReflection {
        &self.reflection
    }

    pub fn layout(&self) -> &ClassifiedLayout {
        &self.layout
    }

    pub fn root_signature(&self) -> &RootSignatureLayout {
        &self.root_signature
    }

    /// Returns the pipeline for the given state, building it on first use.
    /// A build failure is logged once and the key is remembered as failed.
    pub fn get_or_create_pipeline(
        &self,
        backend: &dyn NativeBackend,
        key: &PipelineStateKey,
    ) -> Option<u64> {
        let mut pipelines = self.pipelines.lock().unwrap();
        if let Some(cached) = pipelines.get(key) {
            return *cached;
        }

        let desc = NativePipelineDesc {
            pipeline_type: self.pipeline_type,
            shader_modules: self.shader_modules.clone(),
            root_signature_hash: self.root_signature.layout_hash(),
            vertex_layout: self.vertex_layout.clone(),
            state: key.clone(),
        };
        let pipeline = match backend.create_pipeline(&desc) {
            Ok(pipeline) => Some(pipeline),
            Err(error) => {
                log::error!(
                    "Pipeline creation failed for shader program {}: {}",
                    self.shader_code,
                    error
                );
                None
            }
        };
        pipelines.insert(key.clone(), pipeline);
        pipeline
    }

    pub fn pipeline_count(&self) -> usize {
        self.pipelines
            .lock()
            .unwrap()
            .len()
    }

    /// Drops all built pipelines, keeping the compiled shader program.
    pub fn delete_pipelines(&self) {
        self.pipelines
            .lock()
            .unwrap()
            .clear();
    }
}

/// First cache level: (shader code, vertex layout) to renderer. A shader
/// program that fails to load or compile is remembered as failed so draws
/// referencing it are skipped without retrying the compile.
#[derive(Debug, Default)]
pub struct RendererCache {
    renderers: Mutex<FnvHashMap<u64, Option<Arc<Renderer>>>>,
}

pub fn renderer_cache_key(shader_code: u32, vertex_layout: &VertexLayout) -> u64 {
    (u64::from(shader_code) << 32) | u64::from(vertex_layout.layout_hash())
}

impl RendererCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_create(
        &self,
        backend: &dyn NativeBackend,
        shader_code: u32,
        vertex_layout: &VertexLayout,
        load_shader: &ShaderLoadFn,
    ) -> Option<Arc<Renderer>> {
        let key = renderer_cache_key(shader_code, vertex_layout);
        let mut renderers = self.renderers.lock().unwrap();
        if let Some(cached) = renderers.get(&key) {
            return cached.clone();
        }

        let renderer = match load_shader(shader_code) {
            None => {
                log::error!("No shader program for code {}", shader_code);
                None
            }
            Some(program) => match Renderer::new(backend, shader_code, vertex_layout, &program) {
                Ok(renderer) => Some(Arc::new(renderer)),
                Err(error) => {
                    log::error!(
                        "Renderer creation failed for shader program {}: {}",
                        shader_code,
                        error
                    );
                    None
                }
            },
        };
        renderers.insert(key, renderer.clone());
        renderer
    }

    pub fn renderer_count(&self) -> usize {
        self.renderers
            .lock()
            .unwrap()
            .len()
    }

    pub fn delete_renderers(&self) {
        let mut renderers = self.renderers.lock().unwrap();
        log::debug!("Deleting {} cached renderers", renderers.len());
        renderers.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::{
        NullBackend, ReflectedConstantBuffer, ReflectedConstantBufferMember, ShaderStageDef,
        ShaderStageReflection, UniformDef, UniformFormat, UniformGroup,
    };

    fn test_program() -> ShaderProgramDef {
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

    fn load_fn(program: ShaderProgramDef) -> ShaderLoadFn {
        Box::new(move |_| Some(program.clone()))
    }

    #[test]
    fn repeated_lookups_return_the_same_renderer() {
        let backend = NullBackend::new();
        let cache = RendererCache::new();
        let layout = VertexLayout::default();
        let load = load_fn(test_program());

        let a = cache.get_or_create(&backend, 7, &layout, &load).unwrap();
        let b = cache.get_or_create(&backend, 7, &layout, &load).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.renderer_count(), 1);
    }

    #[test]
    fn identical_state_reuses_the_pipeline() {
        let backend = NullBackend::new();
        let cache = RendererCache::new();
        let layout = VertexLayout::default();
        let load = load_fn(test_program());

        let renderer = cache.get_or_create(&backend, 7, &layout, &load).unwrap();
        let key = PipelineStateKey {
            color_formats: vec![Format::R8G8B8A8_UNORM],
            ..PipelineStateKey::default()
        };
        let first = renderer.get_or_create_pipeline(&backend, &key).unwrap();
        let second = renderer.get_or_create_pipeline(&backend, &key).unwrap();
        assert_eq!(first, second);
        assert_eq!(backend.pipeline_count(), 1);

        let other = PipelineStateKey {
            cull_mode: CullMode::Back,
            ..key
        };
        renderer.get_or_create_pipeline(&backend, &other).unwrap();
        assert_eq!(backend.pipeline_count(), 2);
    }

    #[test]
    fn failed_shader_load_is_memoized() {
        let backend = NullBackend::new();
        let cache = RendererCache::new();
        let layout = VertexLayout::default();
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let load: ShaderLoadFn = Box::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            None
        });

        assert!(cache.get_or_create(&backend, 3, &layout, &load).is_none());
        assert!(cache.get_or_create(&backend, 3, &layout, &load).is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failed_compile_is_memoized() {
        let backend = NullBackend::new();
        let cache = RendererCache::new();
        let layout = VertexLayout::default();
        let mut program = test_program();
        // the null backend rejects empty bytecode
        program.stages[0].bytecode.clear();
        let load = load_fn(program);

        assert!(cache.get_or_create(&backend, 9, &layout, &load).is_none());
        assert!(cache.get_or_create(&backend, 9, &layout, &load).is_none());
        assert_eq!(cache.renderer_count(), 1);
    }

    #[test]
    fn cache_key_combines_shader_code_and_layout() {
        let layout = VertexLayout::default();
        let key = renderer_cache_key(5, &layout);
        assert_eq!(key >> 32, 5);
        assert_eq!(key as u32, layout.layout_hash());
    }
}
