#[cfg(feature = "serde-support")]
use serde::{Deserialize, Serialize};

/// Texture, attachment and vertex-attribute formats supported by the
/// benchmark workloads. Variant names follow the explicit-API convention.
#[allow(non_camel_case_types)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub enum Format {
    UNDEFINED,
    R8_UNORM,
    R8G8_UNORM,
    R8G8B8A8_UNORM,
    R8G8B8A8_SRGB,
    B8G8R8A8_UNORM,
    R10G10B10A2_UNORM,
    R11G11B10_FLOAT,
    R16_FLOAT,
    R16G16_FLOAT,
    R16G16B16A16_FLOAT,
    R32_UINT,
    R32_SINT,
    R32_FLOAT,
    R32G32_FLOAT,
    R32G32B32_FLOAT,
    R32G32B32A32_FLOAT,
    D16_UNORM,
    D24_UNORM_S8_UINT,
    D32_FLOAT,
    D32_FLOAT_S8_UINT,
}

impl Default for Format {
    fn default() -> Self {
        Self::UNDEFINED
    }
}

impl Format {
    pub fn has_depth(self) -> bool {
        matches!(
            self,
            Self::D16_UNORM | Self::D24_UNORM_S8_UINT | Self::D32_FLOAT | Self::D32_FLOAT_S8_UINT
        )
    }

    pub fn has_stencil(self) -> bool {
        matches!(self, Self::D24_UNORM_S8_UINT | Self::D32_FLOAT_S8_UINT)
    }

    /// Size of one texel (or vertex attribute element) in bytes.
    pub fn block_size(self) -> u32 {
        match self {
            Self::UNDEFINED => 0,
            Self::R8_UNORM => 1,
            Self::R8G8_UNORM | Self::R16_FLOAT | Self::D16_UNORM => 2,
            Self::R8G8B8A8_UNORM
            | Self::R8G8B8A8_SRGB
            | Self::B8G8R8A8_UNORM
            | Self::R10G10B10A2_UNORM
            | Self::R11G11B10_FLOAT
            | Self::R16G16_FLOAT
            | Self::R32_UINT
            | Self::R32_SINT
            | Self::R32_FLOAT
            | Self::D24_UNORM_S8_UINT
            | Self::D32_FLOAT => 4,
            Self::R16G16B16A16_FLOAT | Self::R32G32_FLOAT | Self::D32_FLOAT_S8_UINT => 8,
            Self::R32G32B32_FLOAT => 12,
            Self::R32G32B32A32_FLOAT => 16,
        }
    }
}
