use std::hash::{Hash, Hasher};

/// An `f32` wrapper that is hashable and comparable by value. Used for the
/// pipeline-state fields that participate in cache keys. Not a general
/// purpose float wrapper: NaNs compare equal to each other and `-0.0`
/// hashes like `0.0`.
#[derive(Debug, Copy, Clone, Default)]
pub struct DecimalF32(pub f32);

impl DecimalF32 {
    fn canonical_bits(self) -> u32 {
        if self.0.is_nan() {
            f32::NAN.to_bits()
        } else if self.0 == 0.0 {
            0
        } else {
            self.0.to_bits()
        }
    }
}

impl Hash for DecimalF32 {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical_bits().hash(state);
    }
}

impl PartialEq for DecimalF32 {
    fn eq(&self, other: &Self) -> bool {
        self.canonical_bits() == other.canonical_bits()
    }
}

impl Eq for DecimalF32 {}

#[cfg(test)]
mod tests {
    use super::DecimalF32;

    #[test]
    fn zero_signs_compare_equal() {
        assert_eq!(DecimalF32(0.0), DecimalF32(-0.0));
    }

    #[test]
    fn distinct_values_differ() {
        assert_ne!(DecimalF32(1.0), DecimalF32(1.0000001));
    }
}
