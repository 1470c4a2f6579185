//! Coordinator and transform-chain configuration.

use serde::{Deserialize, Serialize};

/// Square frame size for pixel observations
pub const ENV_DIM: usize = 84;
/// Channel layout of stacked pixel observations
pub const OBS_FORMAT: ObsFormat = ObsFormat::Nchw;
/// Discount factor of the reward normalizer
pub const GAMMA: f64 = 0.99;
/// Symmetric clip bound for normalized observations and rewards
pub const CLIP_BOUND: f32 = 10.0;

/// Channel layout of stacked frames
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObsFormat {
    /// `[frames, height, width]`
    #[serde(rename = "NCHW")]
    Nchw,
    /// `[height, width, frames]`
    #[serde(rename = "NHWC")]
    Nhwc,
}

/// Constants of the replica transform chains.
///
/// Local and remote replicas both read these; a remote replica ships its copy
/// to the worker when it is created.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformConfig {
    // Pixel (discrete-action) chain
    pub frame_dim: usize,
    pub obs_format: ObsFormat,
    /// Upper bound on random no-op actions after a reset
    pub noop_max: usize,
    /// Simulator frames per agent step
    pub frame_skip: usize,
    pub frame_stack: usize,

    // Continuous-control chain
    pub gamma: f64,
    pub clip_bound: f32,
    /// Added to variances before taking square roots
    pub epsilon: f64,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            frame_dim: ENV_DIM,
            obs_format: OBS_FORMAT,
            noop_max: 30,
            frame_skip: 4,
            frame_stack: 4,
            gamma: GAMMA,
            clip_bound: CLIP_BOUND,
            epsilon: 1e-8,
        }
    }
}

/// Configuration for `ParallelEnv`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParallelEnvConfig {
    /// Number of replicas
    pub env_num: usize,
    /// Worker pool address; when set, replicas run remotely
    pub worker_addr: Option<String>,
    pub transforms: TransformConfig,
}

impl Default for ParallelEnvConfig {
    fn default() -> Self {
        Self {
            env_num: 1,
            worker_addr: None,
            transforms: TransformConfig::default(),
        }
    }
}

impl ParallelEnvConfig {
    /// Create a new config with specified number of environments
    pub fn new(env_num: usize) -> Self {
        Self {
            env_num,
            ..Default::default()
        }
    }

    /// Run replicas on the worker pool at `addr`
    pub fn with_worker_addr(mut self, addr: impl Into<String>) -> Self {
        self.worker_addr = Some(addr.into());
        self
    }

    pub fn with_transforms(mut self, transforms: TransformConfig) -> Self {
        self.transforms = transforms;
        self
    }
}
