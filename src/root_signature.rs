use std::hash::{Hash, Hasher};

use crate::{
    ClassifiedConstant, ClassifiedLayout, ClassifiedSampler, ClassifiedStaticSampler,
    ClassifiedTableEntry, GfxResult, ShaderStageFlags, UniformGroup,
};

/// Total root-argument space a signature may occupy, in 32-bit values.
pub const ROOT_ARGUMENT_SPACE_SIZE: u32 = 64;

const ROOT_COST_TABLE: u32 = 1;
const ROOT_COST_INPUT_ASSEMBLER: u32 = 1;
const ROOT_COST_CBV: u32 = 2;

/// One bound root parameter. Parameter order is the binding order draws use.
#[derive(Debug, Clone)]
pub enum RootParameter {
    ViewTable {
        entries: Vec<ClassifiedTableEntry>,
        visibility: ShaderStageFlags,
    },
    SamplerTable {
        samplers: Vec<ClassifiedSampler>,
        visibility: ShaderStageFlags,
    },
    /// A constant buffer promoted into the root signature itself
    InlineConstants {
        register: u32,
        group: UniformGroup,
        num_constants: u32,
        visibility: ShaderStageFlags,
        constants: Vec<ClassifiedConstant>,
    },
    /// A constant buffer bound as a root descriptor into upload memory
    ConstantBufferView {
        register: u32,
        group: UniformGroup,
        num_constants: u32,
        visibility: ShaderStageFlags,
        constants: Vec<ClassifiedConstant>,
    },
}

impl RootParameter {
    pub fn cost(&self) -> u32 {
        match self {
            Self::ViewTable { .. } | Self::SamplerTable { .. } => ROOT_COST_TABLE,
            Self::InlineConstants { num_constants, .. } => *num_constants,
            Self::ConstantBufferView { .. } => ROOT_COST_CBV,
        }
    }
}

/// The root signature a renderer binds against: parameters in binding
/// order, the promoted static samplers, and the total argument cost.
#[derive(Debug, Clone)]
pub struct RootSignatureLayout {
    pub parameters: Vec<RootParameter>,
    pub static_samplers: Vec<ClassifiedStaticSampler>,
    uses_input_assembler: bool,
}

// Promotion priority: uniforms that change most often win the budget first.
fn group_priority(group: UniformGroup) -> u32 {
    match group {
        UniformGroup::PerDraw => 0,
        UniformGroup::PerRendererChange => 1,
        UniformGroup::Manual => 2,
    }
}

fn stage_priority(stages: ShaderStageFlags) -> u32 {
    if stages.intersects(ShaderStageFlags::FRAGMENT) {
        0
    } else if stages.intersects(ShaderStageFlags::VERTEX) {
        1
    } else {
        2
    }
}

impl RootSignatureLayout {
    /// Builds the layout, promoting constant buffers to inline root
    /// constants while the argument budget allows it. Promotion walks the
    /// buffers in (group, stage) priority order; a buffer is promoted when
    /// its size fits in the remaining budget plus the two values its root
    /// descriptor already costs.
    pub fn build(layout: &ClassifiedLayout, uses_input_assembler: bool) -> GfxResult<Self> {
        let mut budget = ROOT_ARGUMENT_SPACE_SIZE as i64;
        if uses_input_assembler {
            budget -= i64::from(ROOT_COST_INPUT_ASSEMBLER);
        }

        let view_visibility = layout
            .table_entries
            .iter()
            .fold(ShaderStageFlags::empty(), |acc, e| {
                acc | e.used_in_shader_stages
            });
        let sampler_visibility = layout
            .samplers
            .iter()
            .fold(ShaderStageFlags::empty(), |acc, s| {
                acc | s.used_in_shader_stages
            });

        if !layout.table_entries.is_empty() {
            budget -= i64::from(ROOT_COST_TABLE);
        }
        if !layout.samplers.is_empty() {
            budget -= i64::from(ROOT_COST_TABLE);
        }
        budget -= i64::from(ROOT_COST_CBV) * layout.constant_buffers.len() as i64;
        if budget < 0 {
            return Err("root signature exceeds the argument space budget".into());
        }

        let mut order: Vec<usize> = (0..layout.constant_buffers.len()).collect();
        order.sort_by_key(|&i| {
            let buffer = &layout.constant_buffers[i];
            (
                group_priority(buffer.group),
                stage_priority(buffer.used_in_shader_stages),
                buffer.register,
            )
        });

        let mut promoted = vec![false; layout.constant_buffers.len()];
        for &i in &order {
            let buffer = &layout.constant_buffers[i];
            if i64::from(buffer.num_constants) <= budget + i64::from(ROOT_COST_CBV) {
                promoted[i] = true;
                budget -= i64::from(buffer.num_constants) - i64::from(ROOT_COST_CBV);
            }
        }

        let mut parameters = Vec::new();
        if !layout.table_entries.is_empty() {
            parameters.push(RootParameter::ViewTable {
                entries: layout.table_entries.clone(),
                visibility: view_visibility,
            });
        }
        if !layout.samplers.is_empty() {
            parameters.push(RootParameter::SamplerTable {
                samplers: layout.samplers.clone(),
                visibility: sampler_visibility,
            });
        }
        for &i in &order {
            let buffer = &layout.constant_buffers[i];
            let parameter = if promoted[i] {
                RootParameter::InlineConstants {
                    register: buffer.register,
                    group: buffer.group,
                    num_constants: buffer.num_constants,
                    visibility: buffer.used_in_shader_stages,
                    constants: buffer.constants.clone(),
                }
            } else {
                RootParameter::ConstantBufferView {
                    register: buffer.register,
                    group: buffer.group,
                    num_constants: buffer.num_constants,
                    visibility: buffer.used_in_shader_stages,
                    constants: buffer.constants.clone(),
                }
            };
            parameters.push(parameter);
        }

        let result = Self {
            parameters,
            static_samplers: layout.static_samplers.clone(),
            uses_input_assembler,
        };
        debug_assert!(result.cost() <= ROOT_ARGUMENT_SPACE_SIZE);
        Ok(result)
    }

    /// Total argument-space cost of the signature.
    pub fn cost(&self) -> u32 {
        let mut cost = if self.uses_input_assembler {
            ROOT_COST_INPUT_ASSEMBLER
        } else {
            0
        };
        cost += self.parameters.iter().map(RootParameter::cost).sum::<u32>();
        cost
    }

    pub fn view_table_parameter(&self) -> Option<(u32, &[ClassifiedTableEntry])> {
        self.parameters.iter().enumerate().find_map(|(i, p)| match p {
            RootParameter::ViewTable { entries, .. } => Some((i as u32, entries.as_slice())),
            _ => None,
        })
    }

    pub fn sampler_table_parameter(&self) -> Option<(u32, &[ClassifiedSampler])> {
        self.parameters.iter().enumerate().find_map(|(i, p)| match p {
            RootParameter::SamplerTable { samplers, .. } => Some((i as u32, samplers.as_slice())),
            _ => None,
        })
    }

    /// Stable hash used in pipeline descriptions.
    pub fn layout_hash(&self) -> u64 {
        let mut hasher = fnv::FnvHasher::default();
        self.uses_input_assembler.hash(&mut hasher);
        for parameter in &self.parameters {
            match parameter {
                RootParameter::ViewTable { entries, visibility } => {
                    0u8.hash(&mut hasher);
                    visibility.bits().hash(&mut hasher);
                    for entry in entries {
                        entry.name.hash(&mut hasher);
                        entry.register.hash(&mut hasher);
                    }
                }
                RootParameter::SamplerTable {
                    samplers,
                    visibility,
                } => {
                    1u8.hash(&mut hasher);
                    visibility.bits().hash(&mut hasher);
                    for sampler in samplers {
                        sampler.name.hash(&mut hasher);
                        sampler.register.hash(&mut hasher);
                    }
                }
                RootParameter::InlineConstants {
                    register,
                    num_constants,
                    visibility,
                    ..
                } => {
                    2u8.hash(&mut hasher);
                    register.hash(&mut hasher);
                    num_constants.hash(&mut hasher);
                    visibility.bits().hash(&mut hasher);
                }
                RootParameter::ConstantBufferView {
                    register,
                    visibility,
                    ..
                } => {
                    3u8.hash(&mut hasher);
                    register.hash(&mut hasher);
                    visibility.bits().hash(&mut hasher);
                }
            }
        }
        for sampler in &self.static_samplers {
            sampler.name.hash(&mut hasher);
            sampler.register.hash(&mut hasher);
        }
        hasher.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ClassifiedConstantBuffer;

    fn buffer(
        register: u32,
        group: UniformGroup,
        num_constants: u32,
        stages: ShaderStageFlags,
    ) -> ClassifiedConstantBuffer {
        ClassifiedConstantBuffer {
            register,
            group,
            num_constants,
            used_in_shader_stages: stages,
            constants: Vec::new(),
        }
    }

    fn entry(register: u32) -> ClassifiedTableEntry {
        ClassifiedTableEntry {
            name: format!("srv{}", register),
            register,
            kind: crate::TableEntryKind::ShaderResource,
            used_in_shader_stages: ShaderStageFlags::FRAGMENT,
            format: crate::UniformFormat::Texture,
            subresource: false,
        }
    }

    #[test]
    fn small_buffers_are_promoted_to_inline_constants() {
        let layout = ClassifiedLayout {
            constant_buffers: vec![buffer(
                0,
                UniformGroup::PerDraw,
                16,
                ShaderStageFlags::VERTEX,
            )],
            ..Default::default()
        };
        let signature = RootSignatureLayout::build(&layout, true).unwrap();
        assert!(matches!(
            signature.parameters[0],
            RootParameter::InlineConstants {
                num_constants: 16,
                ..
            }
        ));
        // input assembler + 16 inline values
        assert_eq!(signature.cost(), 17);
    }

    #[test]
    fn oversized_buffer_stays_a_root_descriptor() {
        let layout = ClassifiedLayout {
            constant_buffers: vec![buffer(
                0,
                UniformGroup::PerDraw,
                128,
                ShaderStageFlags::VERTEX,
            )],
            ..Default::default()
        };
        let signature = RootSignatureLayout::build(&layout, true).unwrap();
        assert!(matches!(
            signature.parameters[0],
            RootParameter::ConstantBufferView { .. }
        ));
        assert_eq!(signature.cost(), 3);
    }

    #[test]
    fn promotion_prefers_per_draw_fragment_buffers() {
        // Budget: 64 - 1 (input assembler) - 2*3 (root CBVs) = 57.
        // Promotion order is per-draw fragment, per-draw vertex, then
        // per-renderer-change. The first two fit (30 <= 57+2, then
        // 30 <= 29+2); the third does not (30 > 1+2).
        let layout = ClassifiedLayout {
            constant_buffers: vec![
                buffer(0, UniformGroup::PerRendererChange, 30, ShaderStageFlags::FRAGMENT),
                buffer(1, UniformGroup::PerDraw, 30, ShaderStageFlags::VERTEX),
                buffer(2, UniformGroup::PerDraw, 30, ShaderStageFlags::FRAGMENT),
            ],
            ..Default::default()
        };
        let signature = RootSignatureLayout::build(&layout, true).unwrap();

        let kinds: Vec<(u32, bool)> = signature
            .parameters
            .iter()
            .map(|p| match p {
                RootParameter::InlineConstants { register, .. } => (*register, true),
                RootParameter::ConstantBufferView { register, .. } => (*register, false),
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(kinds, vec![(2, true), (1, true), (0, false)]);
        assert!(signature.cost() <= ROOT_ARGUMENT_SPACE_SIZE);
    }

    #[test]
    fn tables_charge_one_argument_each() {
        let layout = ClassifiedLayout {
            table_entries: vec![entry(0), entry(1)],
            samplers: vec![ClassifiedSampler {
                name: "s0".to_string(),
                register: 0,
                used_in_shader_stages: ShaderStageFlags::FRAGMENT,
            }],
            constant_buffers: vec![buffer(
                0,
                UniformGroup::PerDraw,
                61,
                ShaderStageFlags::FRAGMENT,
            )],
            ..Default::default()
        };
        // 64 - 1 (ia) - 1 (view table) - 1 (sampler table) - 2 (cbv) = 59;
        // 61 <= 59 + 2 so the buffer still promotes and lands exactly on
        // the budget.
        let signature = RootSignatureLayout::build(&layout, true).unwrap();
        assert_eq!(signature.cost(), ROOT_ARGUMENT_SPACE_SIZE);
        assert!(signature.view_table_parameter().is_some());
        assert!(signature.sampler_table_parameter().is_some());
    }

    #[test]
    fn compute_signature_skips_the_input_assembler_cost() {
        let layout = ClassifiedLayout {
            constant_buffers: vec![buffer(
                0,
                UniformGroup::Manual,
                8,
                ShaderStageFlags::COMPUTE,
            )],
            ..Default::default()
        };
        let signature = RootSignatureLayout::build(&layout, false).unwrap();
        assert_eq!(signature.cost(), 8);
    }

    #[test]
    fn layout_hash_is_stable_and_field_sensitive() {
        let layout = ClassifiedLayout {
            table_entries: vec![entry(0)],
            ..Default::default()
        };
        let a = RootSignatureLayout::build(&layout, true).unwrap();
        let b = RootSignatureLayout::build(&layout, true).unwrap();
        assert_eq!(a.layout_hash(), b.layout_hash());

        let c = RootSignatureLayout::build(&layout, false).unwrap();
        assert_ne!(a.layout_hash(), c.layout_hash());
    }
}
