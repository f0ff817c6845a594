#[cfg(feature = "serde-support")]
use serde::{Deserialize, Serialize};

/// The four extents a texture's subresources are laid out over. Cube textures
/// have six faces, everything else has one; array textures have one surface
/// per array element; volumes have one depth slice per layer of the volume.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub struct SubresourceLayout {
    pub num_surfaces: u32,
    pub num_faces: u32,
    pub num_depth_slices: u32,
    pub num_mip_levels: u32,
}

/// Coordinates of a single subresource within a `SubresourceLayout`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub struct SubresourceIndex {
    pub surface: u32,
    pub face: u32,
    pub depth_slice: u32,
    pub mip: u32,
}

impl SubresourceLayout {
    pub fn new(num_surfaces: u32, num_faces: u32, num_depth_slices: u32, num_mip_levels: u32) -> Self {
        debug_assert!(num_surfaces > 0 && num_faces > 0 && num_depth_slices > 0 && num_mip_levels > 0);
        Self {
            num_surfaces,
            num_faces,
            num_depth_slices,
            num_mip_levels,
        }
    }

    pub fn subresource_count(&self) -> u32 {
        self.num_surfaces * self.num_faces * self.num_depth_slices * self.num_mip_levels
    }

    /// Flattens a subresource coordinate into its linear index. Mips vary
    /// fastest, then depth slices, then faces, with surfaces outermost.
    pub fn linear_index(&self, index: SubresourceIndex) -> u32 {
        debug_assert!(index.surface < self.num_surfaces);
        debug_assert!(index.face < self.num_faces);
        debug_assert!(index.depth_slice < self.num_depth_slices);
        debug_assert!(index.mip < self.num_mip_levels);

        ((index.surface * self.num_faces + index.face) * self.num_depth_slices
            + index.depth_slice)
            * self.num_mip_levels
            + index.mip
    }

    /// Inverse of `linear_index`.
    pub fn describe(&self, linear: u32) -> SubresourceIndex {
        debug_assert!(linear < self.subresource_count());

        let mip = linear % self.num_mip_levels;
        let rest = linear / self.num_mip_levels;
        let depth_slice = rest % self.num_depth_slices;
        let rest = rest / self.num_depth_slices;
        let face = rest % self.num_faces;
        let surface = rest / self.num_faces;

        SubresourceIndex {
            surface,
            face,
            depth_slice,
            mip,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{SubresourceIndex, SubresourceLayout};

    #[test]
    fn linear_index_orders_mips_fastest() {
        let layout = SubresourceLayout::new(2, 6, 1, 4);
        let a = layout.linear_index(SubresourceIndex {
            surface: 0,
            face: 0,
            depth_slice: 0,
            mip: 3,
        });
        let b = layout.linear_index(SubresourceIndex {
            surface: 0,
            face: 1,
            depth_slice: 0,
            mip: 0,
        });
        assert_eq!(a, 3);
        assert_eq!(b, 4);
    }

    #[test]
    fn describe_round_trips_every_subresource() {
        for &(surfaces, faces, depths, mips) in
            &[(1, 1, 1, 1), (4, 1, 1, 5), (2, 6, 1, 3), (1, 1, 8, 4), (3, 6, 2, 2)]
        {
            let layout = SubresourceLayout::new(surfaces, faces, depths, mips);
            for linear in 0..layout.subresource_count() {
                let index = layout.describe(linear);
                assert_eq!(layout.linear_index(index), linear);
            }
        }
    }

    #[test]
    fn describe_decomposes_in_declared_order() {
        let layout = SubresourceLayout::new(2, 6, 1, 4);
        let index = layout.describe(6 * 4 + 2 * 4 + 3);
        assert_eq!(
            index,
            SubresourceIndex {
                surface: 1,
                face: 2,
                depth_slice: 0,
                mip: 3,
            }
        );
    }
}
