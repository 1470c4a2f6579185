//! In-process replica and the transform chain shared with remote workers.

use super::config::TransformConfig;
use crate::env::{
    ClipAction, ClipObservation, ClipReward, Env, EpisodeStats, FrameStack, MaxAndSkip, NoopReset,
    NormalizeObservation, NormalizeReward, Registry, StepResult, WarpFrame,
};
use crate::spaces::DynSpace;
use crate::{Result, VecGymError};
use ndarray::ArrayD;
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Wrap a raw simulator in the transform chain picked by its action space.
///
/// - `Box` actions: episode statistics, action clipping, observation
///   normalization and clipping, reward normalization and clipping.
/// - `Discrete` actions: episode statistics, then no-op reset, max-and-skip,
///   frame warping and frame stacking. Needs an image observation space.
/// - Anything else is a configuration error.
pub fn wrap_env(env: Box<dyn Env>, transforms: &TransformConfig) -> Result<Box<dyn Env>> {
    let env = EpisodeStats::new(env);
    match env.action_space() {
        DynSpace::Box(_) => {
            let bound = transforms.clip_bound;
            let env = ClipAction::new(env)?;
            let env = NormalizeObservation::new(env, transforms.epsilon);
            let env = ClipObservation::new(env, bound);
            let env = NormalizeReward::new(env, transforms.gamma, transforms.epsilon);
            Ok(Box::new(ClipReward::new(env, bound)))
        }
        DynSpace::Discrete(_) => {
            let env = NoopReset::new(env, transforms.noop_max);
            let env = MaxAndSkip::new(env, transforms.frame_skip);
            let env = WarpFrame::new(env, transforms.frame_dim)?;
            Ok(Box::new(FrameStack::new(
                env,
                transforms.frame_stack,
                transforms.obs_format,
            )))
        }
        other => Err(VecGymError::Config(format!(
            "action space must be Box or Discrete, got {}",
            other.kind()
        ))),
    }
}

/// One simulator plus its transform chain, stepped in the calling thread.
pub struct LocalEnv {
    env: Box<dyn Env>,
    obs_space: DynSpace,
    act_space: DynSpace,
    max_episode_steps: usize,
    /// Handed to the simulator on the first reset only
    pending_seed: Option<u64>,
    action_rng: StdRng,
    observation_rng: StdRng,
}

impl LocalEnv {
    /// Build a replica of the registered environment `env_id`
    pub fn new(
        env_id: &str,
        seed: Option<u64>,
        registry: &Registry,
        transforms: &TransformConfig,
    ) -> Result<Self> {
        let (env, max_episode_steps) = registry.make(env_id)?;
        Self::from_env(env, max_episode_steps, seed, transforms)
    }

    /// Build a replica around an already constructed simulator
    pub fn from_env(
        env: Box<dyn Env>,
        max_episode_steps: usize,
        seed: Option<u64>,
        transforms: &TransformConfig,
    ) -> Result<Self> {
        let env = wrap_env(env, transforms)?;
        let obs_space = env.observation_space();
        let act_space = env.action_space();
        let (action_rng, observation_rng) = match seed {
            Some(seed) => (StdRng::seed_from_u64(seed), StdRng::seed_from_u64(seed)),
            None => (StdRng::from_entropy(), StdRng::from_entropy()),
        };

        Ok(Self {
            env,
            obs_space,
            act_space,
            max_episode_steps,
            pending_seed: seed,
            action_rng,
            observation_rng,
        })
    }

    pub fn reset(&mut self) -> ArrayD<f32> {
        let (obs, _info) = self.env.reset(self.pending_seed.take());
        obs
    }

    pub fn step(&mut self, action: &ArrayD<f32>) -> StepResult {
        self.env.step(action)
    }

    pub fn observation_space(&self) -> &DynSpace {
        &self.obs_space
    }

    pub fn action_space(&self) -> &DynSpace {
        &self.act_space
    }

    pub fn max_episode_steps(&self) -> usize {
        self.max_episode_steps
    }

    /// Random action from the seeded action-space sampler
    pub fn sample_action(&mut self) -> ArrayD<f32> {
        self.act_space.sample(&mut self.action_rng)
    }

    /// Random observation from the seeded observation-space sampler
    pub fn sample_observation(&mut self) -> ArrayD<f32> {
        self.obs_space.sample(&mut self.observation_rng)
    }

    pub fn close(&mut self) {
        self.env.close()
    }
}
