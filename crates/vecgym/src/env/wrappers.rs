//! Environment wrappers for the continuous-control transform chain.

use super::{Env, EnvInfo, StepResult};
use crate::spaces::{Box as BoxSpace, DynSpace};
use crate::utils::RunningMeanStd;
use crate::{Result, VecGymError};
use ndarray::ArrayD;

/// Wrapper that tracks episode statistics (return and length).
///
/// Adds `episode_return` and `episode_length` to info on episode completion.
pub struct EpisodeStats<E: Env> {
    env: E,
    episode_return: f32,
    episode_length: u32,
}

impl<E: Env> EpisodeStats<E> {
    pub fn new(env: E) -> Self {
        Self {
            env,
            episode_return: 0.0,
            episode_length: 0,
        }
    }
}

impl<E: Env> Env for EpisodeStats<E> {
    fn observation_space(&self) -> DynSpace {
        self.env.observation_space()
    }

    fn action_space(&self) -> DynSpace {
        self.env.action_space()
    }

    fn reset(&mut self, seed: Option<u64>) -> (ArrayD<f32>, EnvInfo) {
        self.episode_return = 0.0;
        self.episode_length = 0;
        self.env.reset(seed)
    }

    fn step(&mut self, action: &ArrayD<f32>) -> StepResult {
        let mut result = self.env.step(action);

        self.episode_return += result.reward;
        self.episode_length += 1;

        if result.done() {
            result.info = result
                .info
                .with_episode_stats(self.episode_return, self.episode_length);
            self.episode_return = 0.0;
            self.episode_length = 0;
        }

        result
    }

    fn render(&self) -> Option<String> {
        self.env.render()
    }

    fn close(&mut self) {
        self.env.close()
    }
}

/// Clips continuous actions to the action space bounds.
pub struct ClipAction<E: Env> {
    env: E,
    space: BoxSpace,
}

impl<E: Env> ClipAction<E> {
    /// Fails unless the action space is a `Box`.
    pub fn new(env: E) -> Result<Self> {
        match env.action_space() {
            DynSpace::Box(space) => Ok(Self { env, space }),
            other => Err(VecGymError::Config(format!(
                "ClipAction requires a Box action space, got {}",
                other.kind()
            ))),
        }
    }
}

impl<E: Env> Env for ClipAction<E> {
    fn observation_space(&self) -> DynSpace {
        self.env.observation_space()
    }

    fn action_space(&self) -> DynSpace {
        self.env.action_space()
    }

    fn reset(&mut self, seed: Option<u64>) -> (ArrayD<f32>, EnvInfo) {
        self.env.reset(seed)
    }

    fn step(&mut self, action: &ArrayD<f32>) -> StepResult {
        let clipped = self.space.clip(action);
        self.env.step(&clipped)
    }

    fn render(&self) -> Option<String> {
        self.env.render()
    }

    fn close(&mut self) {
        self.env.close()
    }
}

/// Normalizes observations with a running mean/variance estimate that is
/// updated from every observation it sees, reset observations included.
pub struct NormalizeObservation<E: Env> {
    env: E,
    stats: RunningMeanStd,
    epsilon: f64,
}

impl<E: Env> NormalizeObservation<E> {
    pub fn new(env: E, epsilon: f64) -> Self {
        let stats = RunningMeanStd::new(&env.observation_space().shape());
        Self { env, stats, epsilon }
    }

    pub fn stats(&self) -> &RunningMeanStd {
        &self.stats
    }

    fn normalize(&mut self, obs: ArrayD<f32>) -> ArrayD<f32> {
        self.stats.update(&obs);
        self.stats.normalize(&obs, self.epsilon)
    }
}

impl<E: Env> Env for NormalizeObservation<E> {
    fn observation_space(&self) -> DynSpace {
        self.env.observation_space()
    }

    fn action_space(&self) -> DynSpace {
        self.env.action_space()
    }

    fn reset(&mut self, seed: Option<u64>) -> (ArrayD<f32>, EnvInfo) {
        let (obs, info) = self.env.reset(seed);
        (self.normalize(obs), info)
    }

    fn step(&mut self, action: &ArrayD<f32>) -> StepResult {
        let mut result = self.env.step(action);
        result.observation = self.normalize(result.observation);
        result
    }

    fn render(&self) -> Option<String> {
        self.env.render()
    }

    fn close(&mut self) {
        self.env.close()
    }
}

/// Clamps every observation element to `[-bound, bound]`.
pub struct ClipObservation<E: Env> {
    env: E,
    bound: f32,
}

impl<E: Env> ClipObservation<E> {
    pub fn new(env: E, bound: f32) -> Self {
        Self { env, bound }
    }
}

impl<E: Env> Env for ClipObservation<E> {
    fn observation_space(&self) -> DynSpace {
        self.env.observation_space()
    }

    fn action_space(&self) -> DynSpace {
        self.env.action_space()
    }

    fn reset(&mut self, seed: Option<u64>) -> (ArrayD<f32>, EnvInfo) {
        let (obs, info) = self.env.reset(seed);
        (obs.mapv(|x| x.clamp(-self.bound, self.bound)), info)
    }

    fn step(&mut self, action: &ArrayD<f32>) -> StepResult {
        let mut result = self.env.step(action);
        let bound = self.bound;
        result.observation.mapv_inplace(|x| x.clamp(-bound, bound));
        result
    }

    fn render(&self) -> Option<String> {
        self.env.render()
    }

    fn close(&mut self) {
        self.env.close()
    }
}

/// Scales rewards by the running standard deviation of the discounted return.
///
/// The return accumulator restarts at zero after every finished episode.
pub struct NormalizeReward<E: Env> {
    env: E,
    stats: RunningMeanStd,
    discounted_return: f64,
    gamma: f64,
    epsilon: f64,
}

impl<E: Env> NormalizeReward<E> {
    pub fn new(env: E, gamma: f64, epsilon: f64) -> Self {
        Self {
            env,
            stats: RunningMeanStd::new(&[]),
            discounted_return: 0.0,
            gamma,
            epsilon,
        }
    }

    pub fn stats(&self) -> &RunningMeanStd {
        &self.stats
    }
}

impl<E: Env> Env for NormalizeReward<E> {
    fn observation_space(&self) -> DynSpace {
        self.env.observation_space()
    }

    fn action_space(&self) -> DynSpace {
        self.env.action_space()
    }

    fn reset(&mut self, seed: Option<u64>) -> (ArrayD<f32>, EnvInfo) {
        self.env.reset(seed)
    }

    fn step(&mut self, action: &ArrayD<f32>) -> StepResult {
        let mut result = self.env.step(action);

        self.discounted_return = self.discounted_return * self.gamma + f64::from(result.reward);
        self.stats.update_scalar(self.discounted_return);
        let scale = (self.stats.scalar_var() + self.epsilon).sqrt();
        result.reward = (f64::from(result.reward) / scale) as f32;

        if result.done() {
            self.discounted_return = 0.0;
        }
        result
    }

    fn render(&self) -> Option<String> {
        self.env.render()
    }

    fn close(&mut self) {
        self.env.close()
    }
}

/// Clamps rewards to `[-bound, bound]`.
pub struct ClipReward<E: Env> {
    env: E,
    bound: f32,
}

impl<E: Env> ClipReward<E> {
    pub fn new(env: E, bound: f32) -> Self {
        Self { env, bound }
    }
}

impl<E: Env> Env for ClipReward<E> {
    fn observation_space(&self) -> DynSpace {
        self.env.observation_space()
    }

    fn action_space(&self) -> DynSpace {
        self.env.action_space()
    }

    fn reset(&mut self, seed: Option<u64>) -> (ArrayD<f32>, EnvInfo) {
        self.env.reset(seed)
    }

    fn step(&mut self, action: &ArrayD<f32>) -> StepResult {
        let mut result = self.env.step(action);
        result.reward = result.reward.clamp(-self.bound, self.bound);
        result
    }

    fn render(&self) -> Option<String> {
        self.env.render()
    }

    fn close(&mut self) {
        self.env.close()
    }
}
