//! Running mean and variance estimates.

use ndarray::{ArrayD, IxDyn, Zip};

/// Element-wise running mean and variance.
///
/// Batches are merged with the parallel-axis formula, so updating one sample
/// at a time and updating with the whole batch give the same statistics.
#[derive(Debug, Clone)]
pub struct RunningMeanStd {
    mean: ArrayD<f64>,
    var: ArrayD<f64>,
    count: f64,
}

impl RunningMeanStd {
    /// Statistics for samples of the given shape; `&[]` tracks a scalar.
    pub fn new(shape: &[usize]) -> Self {
        Self {
            mean: ArrayD::zeros(IxDyn(shape)),
            var: ArrayD::ones(IxDyn(shape)),
            count: 1e-4,
        }
    }

    /// Fold one sample into the statistics
    pub fn update(&mut self, sample: &ArrayD<f32>) {
        let batch_mean = sample.mapv(f64::from);
        let batch_var = ArrayD::zeros(batch_mean.raw_dim());
        self.update_from_moments(&batch_mean, &batch_var, 1.0);
    }

    /// Fold a single scalar into the statistics of a scalar tracker
    pub fn update_scalar(&mut self, value: f64) {
        let batch_mean = ArrayD::from_elem(IxDyn(&[]), value);
        let batch_var = ArrayD::zeros(IxDyn(&[]));
        self.update_from_moments(&batch_mean, &batch_var, 1.0);
    }

    fn update_from_moments(&mut self, batch_mean: &ArrayD<f64>, batch_var: &ArrayD<f64>, batch_count: f64) {
        let total = self.count + batch_count;
        let count = self.count;
        Zip::from(&mut self.mean)
            .and(&mut self.var)
            .and(batch_mean)
            .and(batch_var)
            .for_each(|mean, var, &b_mean, &b_var| {
                let delta = b_mean - *mean;
                let m2 = *var * count + b_var * batch_count + delta * delta * count * batch_count / total;
                *mean += delta * batch_count / total;
                *var = m2 / total;
            });
        self.count = total;
    }

    /// `(x - mean) / sqrt(var + epsilon)` for each element
    pub fn normalize(&self, sample: &ArrayD<f32>, epsilon: f64) -> ArrayD<f32> {
        let mut out = sample.clone();
        Zip::from(&mut out)
            .and(&self.mean)
            .and(&self.var)
            .for_each(|x, &mean, &var| *x = ((f64::from(*x) - mean) / (var + epsilon).sqrt()) as f32);
        out
    }

    pub fn mean(&self) -> &ArrayD<f64> {
        &self.mean
    }

    pub fn var(&self) -> &ArrayD<f64> {
        &self.var
    }

    /// Variance of a scalar tracker
    pub fn scalar_var(&self) -> f64 {
        self.var.iter().next().copied().unwrap_or(1.0)
    }

    /// Number of samples seen (starts at a small positive value)
    pub fn count(&self) -> f64 {
        self.count
    }
}
