//! Fan-out/fan-in coordinator over N replicas.

use super::config::ParallelEnvConfig;
use super::local::LocalEnv;
use crate::env::{EnvInfo, Registry, StepResult};
use crate::remote::{RemoteCall, RemoteEnv, WorkerPool};
use crate::spaces::DynSpace;
use crate::{Result, VecGymError};
use ndarray::{stack, Array1, Array2, ArrayD, ArrayView, Axis, IxDyn};
use tracing::{debug, info};

/// Stacked, index-aligned results of one `ParallelEnv::step`
#[derive(Clone, Debug)]
pub struct VecStep {
    /// `[N, ..obs_shape]`
    pub observations: ArrayD<f32>,
    pub rewards: Array1<f32>,
    pub dones: Array1<bool>,
    pub infos: Vec<EnvInfo>,
}

impl VecStep {
    pub fn len(&self) -> usize {
        self.rewards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rewards.is_empty()
    }
}

/// Execution regime, fixed at construction
enum Replicas {
    Local(Vec<LocalEnv>),
    Remote {
        // Keeps the client runtime alive for the connection tasks
        _pool: WorkerPool,
        envs: Vec<RemoteEnv>,
    },
}

/// N replicas of one environment stepped as a batch.
///
/// Replicas whose episode ends (the simulator reports done, or the step
/// counter reaches `max_episode_steps`) are reset inside `step`; the batch
/// then carries the fresh reset observation at that index while reward,
/// done flag and info are reported as received.
pub struct ParallelEnv {
    replicas: Replicas,
    observation_space: DynSpace,
    action_space: DynSpace,
    max_episode_steps: usize,
    episode_rewards: Vec<f32>,
    episode_steps: Vec<usize>,
    total_steps: u64,
}

impl ParallelEnv {
    /// Build `config.env_num` replicas of `env_id`.
    ///
    /// With `config.worker_addr` set, replicas are created on that worker
    /// pool and `registry` is unused. With a seed, replica `i` gets
    /// `seed + i`.
    pub fn new(
        env_id: &str,
        seed: Option<u64>,
        config: &ParallelEnvConfig,
        registry: &Registry,
    ) -> Result<Self> {
        let n = config.env_num;
        if n == 0 {
            return Err(VecGymError::Config("env_num must be at least 1".into()));
        }
        let replica_seed = |i: usize| seed.map(|s| s.wrapping_add(i as u64));

        let (replicas, observation_space, action_space, max_episode_steps) =
            match &config.worker_addr {
                None => {
                    let envs = (0..n)
                        .map(|i| LocalEnv::new(env_id, replica_seed(i), registry, &config.transforms))
                        .collect::<Result<Vec<_>>>()?;
                    let first = &envs[0];
                    let spaces = (
                        first.observation_space().clone(),
                        first.action_space().clone(),
                        first.max_episode_steps(),
                    );
                    (Replicas::Local(envs), spaces.0, spaces.1, spaces.2)
                }
                Some(addr) => {
                    let pool = WorkerPool::connect(addr)?;
                    let envs = (0..n)
                        .map(|i| RemoteEnv::new(&pool, env_id, replica_seed(i), &config.transforms))
                        .collect::<Result<Vec<_>>>()?;
                    let first = &envs[0];
                    let spaces = (
                        first.observation_space().clone(),
                        first.action_space().clone(),
                        first.max_episode_steps(),
                    );
                    (
                        Replicas::Remote { _pool: pool, envs },
                        spaces.0,
                        spaces.1,
                        spaces.2,
                    )
                }
            };

        info!(
            env_id,
            num_envs = n,
            remote = config.worker_addr.is_some(),
            "created parallel environment"
        );

        Ok(Self {
            replicas,
            observation_space,
            action_space,
            max_episode_steps,
            episode_rewards: vec![0.0; n],
            episode_steps: vec![0; n],
            total_steps: 0,
        })
    }

    /// Reset every replica and stack the observations as `[N, ..obs_shape]`
    pub fn reset(&mut self) -> Result<ArrayD<f32>> {
        let observations: Vec<ArrayD<f32>> = match &mut self.replicas {
            Replicas::Local(envs) => envs.iter_mut().map(LocalEnv::reset).collect(),
            Replicas::Remote { envs, .. } => {
                let calls: Vec<_> = envs.iter().map(RemoteEnv::reset).collect();
                calls
                    .into_iter()
                    .map(RemoteCall::get)
                    .collect::<Result<Vec<_>>>()?
            }
        };
        self.episode_rewards.iter_mut().for_each(|r| *r = 0.0);
        self.episode_steps.iter_mut().for_each(|s| *s = 0);
        stack_observations(&observations)
    }

    /// Step every replica with its row of `actions`
    pub fn step(&mut self, actions: &Array2<f32>) -> Result<VecStep> {
        let n = self.num_envs();
        if actions.nrows() != n {
            return Err(VecGymError::ShapeMismatch {
                expected: vec![n, actions.ncols()],
                actual: actions.shape().to_vec(),
            });
        }
        let actions: Vec<ArrayD<f32>> = actions
            .outer_iter()
            .map(|row| row.to_owned().into_dyn())
            .collect();

        let mut results: Vec<StepResult> = match &mut self.replicas {
            Replicas::Local(envs) => envs
                .iter_mut()
                .zip(&actions)
                .map(|(env, action)| env.step(action))
                .collect(),
            Replicas::Remote { envs, .. } => {
                let calls: Vec<_> = envs
                    .iter()
                    .zip(actions)
                    .map(|(env, action)| env.step(action))
                    .collect();
                calls
                    .into_iter()
                    .map(RemoteCall::get)
                    .collect::<Result<Vec<_>>>()?
            }
        };

        let finished = self.record(&results);
        if !finished.is_empty() {
            self.reset_finished(&finished, &mut results)?;
        }

        let observations = stack_observations(results.iter().map(|r| &r.observation))?;
        let rewards = results.iter().map(|r| r.reward).collect();
        let dones = results.iter().map(StepResult::done).collect();
        let infos = results.into_iter().map(|r| r.info).collect();

        Ok(VecStep {
            observations,
            rewards,
            dones,
            infos,
        })
    }

    /// Update counters and return the indices whose episode ended
    fn record(&mut self, results: &[StepResult]) -> Vec<usize> {
        let mut finished = Vec::new();
        for (i, result) in results.iter().enumerate() {
            self.total_steps += 1;
            self.episode_steps[i] += 1;
            self.episode_rewards[i] += result.reward;

            if result.done() || self.episode_steps[i] >= self.max_episode_steps {
                debug!(
                    env = i,
                    reward = self.episode_rewards[i],
                    steps = self.episode_steps[i],
                    truncated = !result.done(),
                    "episode finished"
                );
                finished.push(i);
            }
        }
        finished
    }

    /// Replace the observations of finished replicas with fresh reset ones.
    ///
    /// A replica's counters are zeroed only once its reset has succeeded.
    fn reset_finished(&mut self, finished: &[usize], results: &mut [StepResult]) -> Result<()> {
        match &mut self.replicas {
            Replicas::Local(envs) => {
                for &i in finished {
                    results[i].observation = envs[i].reset();
                    self.episode_rewards[i] = 0.0;
                    self.episode_steps[i] = 0;
                }
            }
            Replicas::Remote { envs, .. } => {
                let calls: Vec<_> = finished.iter().map(|&i| (i, envs[i].reset())).collect();
                for (i, call) in calls {
                    results[i].observation = call.get()?;
                    self.episode_rewards[i] = 0.0;
                    self.episode_steps[i] = 0;
                }
            }
        }
        Ok(())
    }

    pub fn num_envs(&self) -> usize {
        self.episode_steps.len()
    }

    pub fn observation_space(&self) -> &DynSpace {
        &self.observation_space
    }

    pub fn action_space(&self) -> &DynSpace {
        &self.action_space
    }

    pub fn max_episode_steps(&self) -> usize {
        self.max_episode_steps
    }

    /// Agent steps taken across all replicas
    pub fn total_steps(&self) -> u64 {
        self.total_steps
    }

    /// Reward accumulated in each replica's current episode
    pub fn episode_rewards(&self) -> &[f32] {
        &self.episode_rewards
    }

    /// Steps taken in each replica's current episode
    pub fn episode_steps(&self) -> &[usize] {
        &self.episode_steps
    }

    pub fn is_remote(&self) -> bool {
        matches!(self.replicas, Replicas::Remote { .. })
    }

    /// Close every replica
    pub fn close(&mut self) -> Result<()> {
        match &mut self.replicas {
            Replicas::Local(envs) => envs.iter_mut().for_each(LocalEnv::close),
            Replicas::Remote { envs, .. } => {
                let calls: Vec<_> = envs.iter().map(RemoteEnv::close).collect();
                for call in calls {
                    call.get()?;
                }
            }
        }
        Ok(())
    }
}

fn stack_observations<'a>(
    observations: impl IntoIterator<Item = &'a ArrayD<f32>>,
) -> Result<ArrayD<f32>> {
    let views: Vec<ArrayView<f32, IxDyn>> = observations.into_iter().map(|o| o.view()).collect();
    Ok(stack(Axis(0), &views)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::Env;
    use crate::spaces::{Box as BoxSpace, Discrete};

    /// Counts its own steps; terminates every `horizon` steps.
    struct Counter {
        t: usize,
        horizon: usize,
    }

    impl Env for Counter {
        fn observation_space(&self) -> DynSpace {
            DynSpace::Box(BoxSpace::unbounded(&[1]))
        }
        fn action_space(&self) -> DynSpace {
            DynSpace::Box(BoxSpace::uniform(&[1], -1.0, 1.0))
        }
        fn reset(&mut self, _seed: Option<u64>) -> (ArrayD<f32>, EnvInfo) {
            self.t = 0;
            (ArrayD::zeros(IxDyn(&[1])), EnvInfo::new())
        }
        fn step(&mut self, _action: &ArrayD<f32>) -> StepResult {
            self.t += 1;
            StepResult {
                observation: ArrayD::from_elem(IxDyn(&[1]), self.t as f32),
                reward: 1.0,
                terminated: self.t % self.horizon == 0,
                truncated: false,
                info: EnvInfo::new(),
            }
        }
    }

    fn registry(horizon: usize, max_steps: usize) -> Registry {
        let mut registry = Registry::new();
        registry.register("Counter-v0", max_steps, move || {
            Box::new(Counter { t: 0, horizon }) as Box<dyn Env>
        });
        registry
    }

    #[test]
    fn test_zero_envs_is_config_error() {
        let result = ParallelEnv::new("Counter-v0", None, &ParallelEnvConfig::new(0), &registry(3, 10));
        assert!(matches!(result, Err(VecGymError::Config(_))));
    }

    #[test]
    fn test_episode_counters() {
        let mut env =
            ParallelEnv::new("Counter-v0", Some(1), &ParallelEnvConfig::new(3), &registry(3, 10))
                .unwrap();
        assert!(!env.is_remote());
        env.reset().unwrap();

        let actions = Array2::zeros((3, 1));
        env.step(&actions).unwrap();
        env.step(&actions).unwrap();
        assert_eq!(env.episode_steps(), &[2, 2, 2]);

        let step = env.step(&actions).unwrap();
        assert!(step.dones.iter().all(|d| *d));
        assert_eq!(env.episode_steps(), &[0, 0, 0]);
        assert_eq!(env.episode_rewards(), &[0.0, 0.0, 0.0]);
        assert_eq!(env.total_steps(), 9);
        assert_eq!(step.infos[0].episode_length, Some(3.0));
    }

    #[test]
    fn test_discrete_without_pixels_rejected() {
        let mut registry = Registry::new();
        registry.register("Flat-v0", 10, || {
            struct Flat;
            impl Env for Flat {
                fn observation_space(&self) -> DynSpace {
                    DynSpace::Box(BoxSpace::unbounded(&[2]))
                }
                fn action_space(&self) -> DynSpace {
                    DynSpace::Discrete(Discrete::new(2))
                }
                fn reset(&mut self, _seed: Option<u64>) -> (ArrayD<f32>, EnvInfo) {
                    (ArrayD::zeros(IxDyn(&[2])), EnvInfo::new())
                }
                fn step(&mut self, _action: &ArrayD<f32>) -> StepResult {
                    unreachable!()
                }
            }
            Box::new(Flat) as Box<dyn Env>
        });
        let result = ParallelEnv::new("Flat-v0", None, &ParallelEnvConfig::new(1), &registry);
        assert!(matches!(result, Err(VecGymError::Config(_))));
    }
}
