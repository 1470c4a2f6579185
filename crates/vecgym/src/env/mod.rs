//! Environment traits, wrappers and the environment registry.
//!
//! Provides the core `Env` trait, the wrappers that make up the continuous
//! and pixel transform chains, and `Registry` for building simulators by id.

pub mod atari;
mod registry;
mod traits;
mod wrappers;

pub use atari::{FrameStack, MaxAndSkip, NoopReset, WarpFrame};
pub use registry::{EnvCreator, EnvSpec, Registry};
pub use traits::{Env, EnvInfo, StepResult};
pub use wrappers::{
    ClipAction, ClipObservation, ClipReward, EpisodeStats, NormalizeObservation, NormalizeReward,
};
