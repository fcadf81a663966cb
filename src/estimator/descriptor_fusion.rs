//! Running fusion of probabilistic class descriptors.
//!
//! Contributions are kept as an unnormalized running sum plus a count and
//! normalized only when read, so the exact evidence behind a fused descriptor
//! can be reconstructed from the contributing measurements.

use crate::target::ProbabilisticTargetDescriptor;

#[derive(Debug, Clone, PartialEq)]
pub struct DescriptorFusion {
    sum: ProbabilisticTargetDescriptor,
    count: usize,
}

impl DescriptorFusion {
    pub fn new() -> Self {
        Self {
            sum: ProbabilisticTargetDescriptor::zeros(),
            count: 0,
        }
    }

    /// Add one observation. Invalid axes are replaced by uniform first, so a
    /// degenerate descriptor only dilutes the evidence.
    pub fn add(&mut self, descriptor: &ProbabilisticTargetDescriptor) {
        self.sum = &self.sum + &descriptor.sanitized();
        self.count += 1;
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Unnormalized running sum.
    pub fn sum(&self) -> &ProbabilisticTargetDescriptor {
        &self.sum
    }

    /// Mean of all contributions; uniform when nothing was added.
    pub fn fused(&self) -> ProbabilisticTargetDescriptor {
        if self.count == 0 {
            return ProbabilisticTargetDescriptor::uniform();
        }
        (self.sum.clone() / self.count as f64).normalized()
    }
}

impl Default for DescriptorFusion {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::{Alphanumeric, CertainTargetDescriptor, Color, Shape};
    use approx::assert_relative_eq;

    fn red_circle_a() -> CertainTargetDescriptor {
        CertainTargetDescriptor::new(
            Color::Red,
            Shape::Circle,
            Color::White,
            Alphanumeric::new('A').unwrap(),
        )
    }

    #[test]
    fn test_empty_is_uniform() {
        let fusion = DescriptorFusion::new();
        assert_eq!(fusion.fused(), ProbabilisticTargetDescriptor::uniform());
    }

    #[test]
    fn test_mean_of_contributions() {
        let mut fusion = DescriptorFusion::new();
        fusion.add(&red_circle_a().as_probabilistic());
        fusion.add(&ProbabilisticTargetDescriptor::uniform());

        let fused = fusion.fused();
        assert!(fused.is_valid());
        assert_eq!(fusion.count(), 2);
        assert_relative_eq!(fused.shape[Shape::Circle.index()], 0.5 + 0.5 / 9.0, epsilon = 1e-12);
        assert_relative_eq!(fusion.sum().shape.sum(), 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_uniform_input_keeps_ranking() {
        let mut fusion = DescriptorFusion::new();
        fusion.add(&red_circle_a().as_probabilistic());
        let before = fusion.fused().collapse_to_certain();

        for _ in 0..5 {
            fusion.add(&ProbabilisticTargetDescriptor::uniform());
        }
        assert_eq!(fusion.fused().collapse_to_certain(), before);
    }

    #[test]
    fn test_invalid_descriptor_is_sanitized() {
        let mut bad = red_circle_a().as_probabilistic();
        bad.shape[0] = f64::NAN;

        let mut fusion = DescriptorFusion::new();
        fusion.add(&bad);
        let fused = fusion.fused();
        assert!(fused.is_valid());
        assert_relative_eq!(fused.shape[0], 1.0 / 9.0, epsilon = 1e-12);
        assert_relative_eq!(fused.shape_color[Color::Red.index()], 1.0, epsilon = 1e-12);
    }
}
