//! Observation and action space descriptors.
//!
//! Replicas report their spaces through `DynSpace`; the coordinator reads them
//! once from the first replica and assumes every other replica matches.

mod r#box;
mod discrete;
mod multi_discrete;

pub use discrete::Discrete;
pub use multi_discrete::MultiDiscrete;
pub use r#box::Box;

use ndarray::{Array1, ArrayD, IxDyn};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Trait for observation and action spaces
pub trait Space: Clone + Send + Sync {
    /// The type of samples from this space
    type Sample;

    /// Sample a random element from this space
    fn sample<R: Rng>(&self, rng: &mut R) -> Self::Sample;

    /// Check if a value is contained in this space
    fn contains(&self, value: &Self::Sample) -> bool;

    /// Get the shape of samples from this space
    fn shape(&self) -> &[usize];

    /// Get the total number of elements in a sample
    fn num_elements(&self) -> usize {
        self.shape().iter().product()
    }
}

/// Space descriptor with the concrete kind erased.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum DynSpace {
    Discrete(Discrete),
    MultiDiscrete(MultiDiscrete),
    Box(Box),
}

impl DynSpace {
    /// Shape of a single flattened sample
    pub fn shape(&self) -> Vec<usize> {
        match self {
            DynSpace::Discrete(s) => s.shape().to_vec(),
            DynSpace::MultiDiscrete(s) => s.shape().to_vec(),
            DynSpace::Box(s) => s.shape().to_vec(),
        }
    }

    /// Short kind name used in error messages and logs
    pub fn kind(&self) -> &'static str {
        match self {
            DynSpace::Discrete(_) => "Discrete",
            DynSpace::MultiDiscrete(_) => "MultiDiscrete",
            DynSpace::Box(_) => "Box",
        }
    }

    /// Sample as an `f32` array; discrete values are stored as floats.
    pub fn sample<R: Rng>(&self, rng: &mut R) -> ArrayD<f32> {
        match self {
            DynSpace::Discrete(s) => ArrayD::from_elem(IxDyn(&[1]), s.sample(rng) as f32),
            DynSpace::MultiDiscrete(s) => {
                let values: Vec<f32> = s.sample(rng).into_iter().map(|x| x as f32).collect();
                Array1::from(values).into_dyn()
            }
            DynSpace::Box(s) => s.sample(rng),
        }
    }

    /// Check if this space contains the value
    pub fn contains(&self, value: &ArrayD<f32>) -> bool {
        match self {
            DynSpace::Discrete(s) => match value.iter().next() {
                Some(&v) if value.len() == 1 && v >= 0.0 => s.contains(&(v.round() as usize)),
                _ => false,
            },
            DynSpace::MultiDiscrete(s) => {
                value.len() == s.nvec.len()
                    && value.iter().all(|&x| x >= 0.0)
                    && s.contains(&value.iter().map(|&x| x.round() as usize).collect())
            }
            DynSpace::Box(s) => s.contains(value),
        }
    }
}
