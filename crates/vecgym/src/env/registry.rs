//! Environment registry: builds simulators from identifier strings.

use super::Env;
use crate::{Result, VecGymError};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Constructor for a fresh, unwrapped simulator
pub type EnvCreator = Arc<dyn Fn() -> Box<dyn Env> + Send + Sync>;

/// Registration record for one environment id
#[derive(Clone)]
pub struct EnvSpec {
    pub id: String,
    /// Episode step budget enforced by the coordinator
    pub max_episode_steps: usize,
    creator: EnvCreator,
}

impl EnvSpec {
    /// Build a new, unwrapped simulator instance
    pub fn make(&self) -> Box<dyn Env> {
        (self.creator)()
    }
}

impl fmt::Debug for EnvSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvSpec")
            .field("id", &self.id)
            .field("max_episode_steps", &self.max_episode_steps)
            .finish()
    }
}

/// Maps environment ids to their constructors.
///
/// ```rust,ignore
/// let mut registry = Registry::new();
/// registry.register("Pendulum-v1", 200, || Box::new(Pendulum::new()));
/// let env = registry.make("Pendulum-v1")?;
/// ```
#[derive(Clone, Debug, Default)]
pub struct Registry {
    specs: BTreeMap<String, EnvSpec>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) an environment id
    pub fn register<F>(&mut self, id: impl Into<String>, max_episode_steps: usize, creator: F) -> &mut Self
    where
        F: Fn() -> Box<dyn Env> + Send + Sync + 'static,
    {
        let id = id.into();
        let spec = EnvSpec {
            id: id.clone(),
            max_episode_steps,
            creator: Arc::new(creator),
        };
        if self.specs.insert(id.clone(), spec).is_some() {
            tracing::debug!(env = %id, "Replaced existing registration");
        }
        self
    }

    pub fn spec(&self, id: &str) -> Result<&EnvSpec> {
        self.specs
            .get(id)
            .ok_or_else(|| VecGymError::UnknownEnv(id.to_string()))
    }

    /// Build a simulator by id, returning it with its episode step budget
    pub fn make(&self, id: &str) -> Result<(Box<dyn Env>, usize)> {
        let spec = self.spec(id)?;
        Ok((spec.make(), spec.max_episode_steps))
    }

    /// Registered ids in sorted order
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.specs.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}
