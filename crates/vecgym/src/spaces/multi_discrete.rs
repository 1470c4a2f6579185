//! MultiDiscrete space

use super::Space;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Several independent discrete dimensions; dimension i takes values in
/// `0..nvec[i]`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiDiscrete {
    pub nvec: Vec<usize>,
    shape: Vec<usize>,
}

impl MultiDiscrete {
    pub fn new(nvec: Vec<usize>) -> Self {
        assert!(
            !nvec.is_empty() && nvec.iter().all(|&n| n > 0),
            "MultiDiscrete needs at least one dimension and no empty dimension"
        );
        let shape = vec![nvec.len()];
        Self { nvec, shape }
    }
}

impl Space for MultiDiscrete {
    type Sample = Vec<usize>;

    fn sample<R: Rng>(&self, rng: &mut R) -> Self::Sample {
        self.nvec.iter().map(|&n| rng.gen_range(0..n)).collect()
    }

    fn contains(&self, value: &Self::Sample) -> bool {
        value.len() == self.nvec.len() && value.iter().zip(&self.nvec).all(|(&v, &n)| v < n)
    }

    fn shape(&self) -> &[usize] {
        &self.shape
    }
}
