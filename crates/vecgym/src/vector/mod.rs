//! Vectorized environments.
//!
//! - `LocalEnv` - one replica stepped in the calling thread
//! - `ParallelEnv` - N replicas, local or on a worker pool, stepped as a batch

mod config;
mod local;
mod parallel;

pub use config::{ObsFormat, ParallelEnvConfig, TransformConfig, CLIP_BOUND, ENV_DIM, GAMMA, OBS_FORMAT};
pub use local::{wrap_env, LocalEnv};
pub use parallel::{ParallelEnv, VecStep};
