//! Box (continuous) space

use super::Space;
use crate::{Result, VecGymError};
use ndarray::{ArrayD, IxDyn, Zip};
use rand::Rng;
use rand_distr::{Distribution, Exp1, StandardNormal, Uniform};
use serde::{Deserialize, Serialize};

/// Box space for continuous values with per-element bounds
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Box {
    /// Lower bound for each element
    pub low: ArrayD<f32>,
    /// Upper bound for each element
    pub high: ArrayD<f32>,
}

impl Box {
    /// Create a new box space with given bounds
    pub fn new(low: ArrayD<f32>, high: ArrayD<f32>) -> Result<Self> {
        if low.shape() != high.shape() {
            return Err(VecGymError::ShapeMismatch {
                expected: low.shape().to_vec(),
                actual: high.shape().to_vec(),
            });
        }
        Ok(Self { low, high })
    }

    /// Create a box space with the same bounds for every element
    pub fn uniform(shape: &[usize], low: f32, high: f32) -> Self {
        Self {
            low: ArrayD::from_elem(IxDyn(shape), low),
            high: ArrayD::from_elem(IxDyn(shape), high),
        }
    }

    /// Create a box space from -inf to +inf (unbounded)
    pub fn unbounded(shape: &[usize]) -> Self {
        Self::uniform(shape, f32::NEG_INFINITY, f32::INFINITY)
    }

    /// True when every element has finite bounds on both sides
    pub fn is_bounded(&self) -> bool {
        self.low.iter().chain(self.high.iter()).all(|v| v.is_finite())
    }

    /// True for `[height, width, channels]` image spaces
    pub fn is_image(&self) -> bool {
        self.low.ndim() == 3
    }

    /// Clamp each element of `value` into the bounds
    pub fn clip(&self, value: &ArrayD<f32>) -> ArrayD<f32> {
        let mut clipped = value.clone();
        for ((v, &l), &h) in clipped
            .iter_mut()
            .zip(self.low.iter())
            .zip(self.high.iter())
        {
            *v = v.max(l).min(h);
        }
        clipped
    }
}

impl Space for Box {
    type Sample = ArrayD<f32>;

    /// Bounded elements are uniform, half-bounded ones shifted exponential,
    /// unbounded ones standard normal.
    fn sample<R: Rng>(&self, rng: &mut R) -> Self::Sample {
        let mut result = ArrayD::zeros(self.low.raw_dim());
        Zip::from(&mut result)
            .and(&self.low)
            .and(&self.high)
            .for_each(|r, &l, &h| {
                *r = match (l.is_finite(), h.is_finite()) {
                    (true, true) if l < h => Uniform::new_inclusive(l, h).sample(rng),
                    (true, true) => l,
                    (true, false) => l + Distribution::<f32>::sample(&Exp1, rng),
                    (false, true) => h - Distribution::<f32>::sample(&Exp1, rng),
                    (false, false) => Distribution::<f32>::sample(&StandardNormal, rng),
                };
            });
        result
    }

    fn contains(&self, value: &Self::Sample) -> bool {
        value.shape() == self.low.shape()
            && Zip::from(value)
                .and(&self.low)
                .and(&self.high)
                .all(|&v, &l, &h| v >= l && v <= h)
    }

    fn shape(&self) -> &[usize] {
        self.low.shape()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_box_new_rejects_mismatched_bounds() {
        let low = ArrayD::zeros(IxDyn(&[2]));
        let high = ArrayD::ones(IxDyn(&[3]));
        assert!(matches!(
            Box::new(low, high),
            Err(VecGymError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_box_sample_unbounded() {
        let space = Box::unbounded(&[4]);
        let mut rng = rand::rngs::StdRng::seed_from_u64(42);
        let sample = space.sample(&mut rng);
        assert_eq!(sample.shape(), &[4]);
        assert!(sample.iter().all(|v| v.is_finite()));
        assert!(!space.is_bounded());
    }

    #[test]
    fn test_box_clip() {
        let space = Box::uniform(&[3], -1.0, 1.0);
        let value = ArrayD::from_shape_vec(IxDyn(&[3]), vec![-3.0, 0.5, 2.0]).unwrap();
        let clipped = space.clip(&value);
        assert_eq!(clipped.as_slice().unwrap(), &[-1.0, 0.5, 1.0]);
        assert!(space.contains(&clipped));
        assert!(!space.contains(&value));
    }

    #[test]
    fn test_box_is_image() {
        assert!(Box::uniform(&[84, 84, 3], 0.0, 255.0).is_image());
        assert!(!Box::uniform(&[3], 0.0, 1.0).is_image());
    }
}
