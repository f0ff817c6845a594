use fnv::FnvHashMap;

use crate::{Format, GfxResult, ShaderStageFlags, UniformDef, UniformFormat, UniformGroup};

/// One member of a reflected constant buffer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReflectedConstantBufferMember {
    pub name: String,
    pub offset: u32,
    pub size: u32,
    /// Whether the compiler kept the variable; dead members are skipped
    /// silently
    pub active: bool,
}

/// A reflected constant buffer. The buffer name selects the uniform group
/// it carries (`per_draw`, `per_renderer_change`, `manual`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReflectedConstantBuffer {
    pub name: String,
    pub register: u32,
    pub size: u32,
    pub members: Vec<ReflectedConstantBufferMember>,
}

/// The binding kinds the reflection adapter understands.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ReflectedResourceKind {
    Texture2D,
    Texture3D,
    TextureCube,
    StructuredBuffer,
    RWStructuredBuffer,
    RWTexture2D,
    RWTexture3D,
    Sampler,
}

/// A reflected non-constant-buffer binding.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReflectedResource {
    pub name: String,
    pub kind: ReflectedResourceKind,
    pub register: u32,
    /// Comparison (shadow) samplers become static samplers
    pub comparison: bool,
}

/// A vertex-stage input signature element.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReflectedVertexInput {
    pub semantic: String,
    pub location: u32,
    pub format: Format,
    /// System-value inputs (vertex id, instance id) take no vertex buffer
    /// slot
    pub system_value: bool,
}

/// Everything reflected out of one compiled stage.
#[derive(Debug, Clone, Default)]
pub struct ShaderStageReflection {
    pub shader_stage: ShaderStageFlags,
    pub constant_buffers: Vec<ReflectedConstantBuffer>,
    pub resources: Vec<ReflectedResource>,
    pub vertex_inputs: Vec<ReflectedVertexInput>,
    pub compute_threads_per_group: Option<[u32; 3]>,
}

/// A binding merged across stages, with the union of the stages that
/// reference it.
#[derive(Debug, Clone)]
pub struct MergedResource {
    pub resource: ReflectedResource,
    pub used_in_shader_stages: ShaderStageFlags,
}

#[derive(Debug, Clone)]
pub struct MergedConstantBuffer {
    pub buffer: ReflectedConstantBuffer,
    pub used_in_shader_stages: ShaderStageFlags,
}

/// Reflection for a whole program: stage reflections merged and checked for
/// binding compatibility.
#[derive(Debug, Clone, Default)]
pub struct PipelineReflection {
    pub shader_stages: ShaderStageFlags,
    pub constant_buffers: Vec<MergedConstantBuffer>,
    pub resources: Vec<MergedResource>,
    pub vertex_inputs: Vec<ReflectedVertexInput>,
    pub compute_threads_per_group: Option<[u32; 3]>,
}

impl PipelineReflection {
    /// Merges per-stage reflections. A binding reaching the same register
    /// from two stages must agree on name and kind.
    pub fn from_stages(stages: &[&ShaderStageReflection]) -> GfxResult<Self> {
        let mut merged = Self::default();
        let mut buffers_by_register: FnvHashMap<u32, usize> = FnvHashMap::default();
        let mut resources_by_register: FnvHashMap<(ReflectedResourceKind, u32), usize> =
            FnvHashMap::default();

        for stage in stages {
            merged.shader_stages |= stage.shader_stage;

            for buffer in &stage.constant_buffers {
                match buffers_by_register.get(&buffer.register) {
                    Some(&index) => {
                        let existing = &mut merged.constant_buffers[index];
                        if existing.buffer.name != buffer.name
                            || existing.buffer.size != buffer.size
                        {
                            return Err(format!(
                                "incompatible constant buffer {} across shader stages",
                                buffer.name
                            )
                            .into());
                        }
                        existing.used_in_shader_stages |= stage.shader_stage;
                    }
                    None => {
                        buffers_by_register
                            .insert(buffer.register, merged.constant_buffers.len());
                        merged.constant_buffers.push(MergedConstantBuffer {
                            buffer: buffer.clone(),
                            used_in_shader_stages: stage.shader_stage,
                        });
                    }
                }
            }

            for resource in &stage.resources {
                let key = (table_space(resource.kind), resource.register);
                match resources_by_register.get(&key) {
                    Some(&index) => {
                        let existing = &mut merged.resources[index];
                        if existing.resource.name != resource.name
                            || existing.resource.kind != resource.kind
                        {
                            return Err(format!(
                                "incompatible resource {} across shader stages",
                                resource.name
                            )
                            .into());
                        }
                        existing.used_in_shader_stages |= stage.shader_stage;
                    }
                    None => {
                        resources_by_register.insert(key, merged.resources.len());
                        merged.resources.push(MergedResource {
                            resource: resource.clone(),
                            used_in_shader_stages: stage.shader_stage,
                        });
                    }
                }
            }

            if stage.shader_stage.intersects(ShaderStageFlags::VERTEX) {
                merged.vertex_inputs = stage.vertex_inputs.clone();
            }
            if stage.shader_stage.intersects(ShaderStageFlags::COMPUTE) {
                merged.compute_threads_per_group = stage.compute_threads_per_group;
            }
        }
        Ok(merged)
    }
}

// Register spaces overlap between SRV-like, UAV-like and sampler bindings.
fn table_space(kind: ReflectedResourceKind) -> ReflectedResourceKind {
    match kind {
        ReflectedResourceKind::Texture2D
        | ReflectedResourceKind::Texture3D
        | ReflectedResourceKind::TextureCube
        | ReflectedResourceKind::StructuredBuffer => ReflectedResourceKind::Texture2D,
        ReflectedResourceKind::RWStructuredBuffer | ReflectedResourceKind::RWTexture2D
        | ReflectedResourceKind::RWTexture3D => ReflectedResourceKind::RWTexture2D,
        ReflectedResourceKind::Sampler => ReflectedResourceKind::Sampler,
    }
}

/// One constant the application will upload, classified into its buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedConstant {
    pub name: String,
    pub offset: u32,
    pub size: u32,
    pub format: UniformFormat,
}

/// A constant buffer with its surviving members and root-parameter cost.
#[derive(Debug, Clone)]
pub struct ClassifiedConstantBuffer {
    pub register: u32,
    pub group: UniformGroup,
    /// Cost as inline root constants, in 32-bit values
    pub num_constants: u32,
    pub used_in_shader_stages: ShaderStageFlags,
    pub constants: Vec<ClassifiedConstant>,
}

/// What a view-table entry binds.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TableEntryKind {
    ShaderResource,
    UnorderedAccess,
}

/// One SRV/UAV table slot, in reflection order.
#[derive(Debug, Clone)]
pub struct ClassifiedTableEntry {
    pub name: String,
    pub register: u32,
    pub kind: TableEntryKind,
    pub used_in_shader_stages: ShaderStageFlags,
    pub format: UniformFormat,
    /// Binds an individual subresource view instead of the whole resource
    pub subresource: bool,
}

/// One dynamic sampler-table slot.
#[derive(Debug, Clone)]
pub struct ClassifiedSampler {
    pub name: String,
    pub register: u32,
    pub used_in_shader_stages: ShaderStageFlags,
}

/// A comparison sampler promoted out of the sampler table.
#[derive(Debug, Clone)]
pub struct ClassifiedStaticSampler {
    pub name: String,
    pub register: u32,
    pub used_in_shader_stages: ShaderStageFlags,
}

/// The classified binding layout the root-signature builder consumes.
#[derive(Debug, Clone, Default)]
pub struct ClassifiedLayout {
    pub constant_buffers: Vec<ClassifiedConstantBuffer>,
    pub table_entries: Vec<ClassifiedTableEntry>,
    pub samplers: Vec<ClassifiedSampler>,
    pub static_samplers: Vec<ClassifiedStaticSampler>,
}

fn group_for_buffer_name(name: &str) -> Option<UniformGroup> {
    match name {
        "per_draw" => Some(UniformGroup::PerDraw),
        "per_renderer_change" => Some(UniformGroup::PerRendererChange),
        "manual" => Some(UniformGroup::Manual),
        _ => None,
    }
}

/// Classifies merged reflection against the uniforms the application
/// declared. Constant-buffer members that belong to another group are
/// skipped; members nobody declared are skipped with a warning; resource
/// bindings must be declared with a matching format.
pub fn classify_uniforms(
    reflection: &PipelineReflection,
    uniforms: &[UniformDef],
) -> GfxResult<ClassifiedLayout> {
    let declared: FnvHashMap<&str, &UniformDef> =
        uniforms.iter().map(|u| (u.name.as_str(), u)).collect();

    let mut layout = ClassifiedLayout::default();

    for merged in &reflection.constant_buffers {
        let buffer = &merged.buffer;
        let group = group_for_buffer_name(&buffer.name).ok_or_else(|| {
            crate::GfxError::from(format!("unknown constant buffer {}", buffer.name))
        })?;

        let mut constants = Vec::new();
        for member in &buffer.members {
            if !member.active {
                continue;
            }
            let uniform = match declared.get(member.name.as_str()) {
                Some(uniform) => *uniform,
                None => {
                    log::warn!("Not set uniform {}", member.name);
                    continue;
                }
            };
            if uniform.group != group {
                continue;
            }
            if uniform.format.is_texture()
                || uniform.format.is_buffer()
                || uniform.format == UniformFormat::Sampler
            {
                return Err(format!(
                    "uniform {} has a resource format but lives in constant buffer {}",
                    member.name, buffer.name
                )
                .into());
            }
            constants.push(ClassifiedConstant {
                name: member.name.clone(),
                offset: member.offset,
                size: member.size,
                format: uniform.format,
            });
        }

        layout.constant_buffers.push(ClassifiedConstantBuffer {
            register: buffer.register,
            group,
            num_constants: (buffer.size + 3) / 4,
            used_in_shader_stages: merged.used_in_shader_stages,
            constants,
        });
    }

    for merged in &reflection.resources {
        let resource = &merged.resource;
        match resource.kind {
            ReflectedResourceKind::Sampler => {
                if resource.comparison {
                    layout.static_samplers.push(ClassifiedStaticSampler {
                        name: resource.name.clone(),
                        register: resource.register,
                        used_in_shader_stages: merged.used_in_shader_stages,
                    });
                } else {
                    layout.samplers.push(ClassifiedSampler {
                        name: resource.name.clone(),
                        register: resource.register,
                        used_in_shader_stages: merged.used_in_shader_stages,
                    });
                }
            }
            ReflectedResourceKind::RWTexture3D => {
                return Err(format!(
                    "unsupported RW texture dimension for {}",
                    resource.name
                )
                .into());
            }
            kind => {
                let uniform = declared.get(resource.name.as_str()).ok_or_else(|| {
                    crate::GfxError::from(format!("undeclared shader resource {}", resource.name))
                })?;
                let writable = matches!(
                    kind,
                    ReflectedResourceKind::RWStructuredBuffer | ReflectedResourceKind::RWTexture2D
                );
                let expects_texture = matches!(
                    kind,
                    ReflectedResourceKind::Texture2D
                        | ReflectedResourceKind::Texture3D
                        | ReflectedResourceKind::TextureCube
                        | ReflectedResourceKind::RWTexture2D
                );
                if expects_texture && !uniform.format.is_texture() {
                    return Err(format!(
                        "shader resource {} is a texture but was declared {:?}",
                        resource.name, uniform.format
                    )
                    .into());
                }
                if !expects_texture && !uniform.format.is_buffer() {
                    return Err(format!(
                        "shader resource {} is a buffer but was declared {:?}",
                        resource.name, uniform.format
                    )
                    .into());
                }
                layout.table_entries.push(ClassifiedTableEntry {
                    name: resource.name.clone(),
                    register: resource.register,
                    kind: if writable {
                        TableEntryKind::UnorderedAccess
                    } else {
                        TableEntryKind::ShaderResource
                    },
                    used_in_shader_stages: merged.used_in_shader_stages,
                    format: uniform.format,
                    subresource: uniform.format.is_subresource(),
                });
            }
        }
    }

    Ok(layout)
}
