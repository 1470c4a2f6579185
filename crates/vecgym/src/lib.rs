//! # vecgym
//!
//! Vectorized reinforcement-learning environments, run locally or on remote
//! workers.
//!
//! ## Overview
//!
//! vecgym provides:
//! - The `Env` trait and a `Registry` that builds simulators by id
//! - Standard transform chains (action clipping, running observation and
//!   reward normalization, DeepMind-style frame preprocessing)
//! - `LocalEnv` / `RemoteEnv` replicas wrapping one simulator each
//! - `ParallelEnv`, which fans a batch of actions out to N replicas and
//!   stacks the results
//! - `WorkerServer`, the process that hosts remote replicas
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use vecgym::prelude::*;
//!
//! let registry = vecgym_envs::registry();
//! let config = ParallelEnvConfig::new(4);
//! let mut envs = ParallelEnv::new("Pendulum-v1", Some(42), &config, &registry)?;
//!
//! let obs = envs.reset()?;
//! let actions = Array2::zeros((4, 1));
//! let step = envs.step(&actions)?;
//! ```

pub mod env;
pub mod remote;
pub mod spaces;
pub mod utils;
pub mod vector;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::env::{Env, EnvInfo, Registry, StepResult};
    pub use crate::remote::{BackgroundWorker, RemoteCall, RemoteEnv, WorkerPool, WorkerServer};
    pub use crate::spaces::{Box as BoxSpace, Discrete, DynSpace, MultiDiscrete, Space};
    pub use crate::vector::{
        LocalEnv, ObsFormat, ParallelEnv, ParallelEnvConfig, TransformConfig, VecStep, CLIP_BOUND,
        ENV_DIM,
    };
    pub use crate::{Result, VecGymError};
    pub use ndarray::{Array2, ArrayD, IxDyn};
}

/// Error types for the library
#[derive(Debug, thiserror::Error)]
pub enum VecGymError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown environment: {0}")]
    UnknownEnv(String),

    #[error("Shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("Array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    #[error("Remote worker error: {0}")]
    Remote(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = core::result::Result<T, VecGymError>;
