//! Coordinator behaviour over small mock simulators.

use ndarray::{Array2, ArrayD, IxDyn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::thread;
use std::time::{Duration, Instant};
use vecgym::prelude::*;

/// 8x8 RGB frame that is black after reset and brightens on every action 1.
/// Terminates once `horizon` brightening moves have been made.
struct Blink {
    moves: usize,
    horizon: usize,
}

impl Env for Blink {
    fn observation_space(&self) -> DynSpace {
        DynSpace::Box(BoxSpace::uniform(&[8, 8, 3], 0.0, 255.0))
    }

    fn action_space(&self) -> DynSpace {
        DynSpace::Discrete(Discrete::new(2))
    }

    fn reset(&mut self, _seed: Option<u64>) -> (ArrayD<f32>, EnvInfo) {
        self.moves = 0;
        (self.frame(), EnvInfo::new())
    }

    fn step(&mut self, action: &ArrayD<f32>) -> StepResult {
        if action[[0]] > 0.5 {
            self.moves += 1;
        }
        StepResult {
            observation: self.frame(),
            reward: 1.0,
            terminated: self.moves >= self.horizon,
            truncated: false,
            info: EnvInfo::new(),
        }
    }
}

impl Blink {
    fn frame(&self) -> ArrayD<f32> {
        ArrayD::from_elem(IxDyn(&[8, 8, 3]), (self.moves * 10).min(255) as f32)
    }
}

/// Continuous env whose reset observation is drawn from its seeded RNG
struct Noise {
    rng: StdRng,
}

impl Env for Noise {
    fn observation_space(&self) -> DynSpace {
        DynSpace::Box(BoxSpace::uniform(&[4], -1.0, 1.0))
    }

    fn action_space(&self) -> DynSpace {
        DynSpace::Box(BoxSpace::uniform(&[2], -1.0, 1.0))
    }

    fn reset(&mut self, seed: Option<u64>) -> (ArrayD<f32>, EnvInfo) {
        if let Some(seed) = seed {
            self.rng = StdRng::seed_from_u64(seed);
        }
        let obs = ArrayD::from_shape_fn(IxDyn(&[4]), |_| self.rng.gen_range(-1.0..1.0));
        (obs, EnvInfo::new())
    }

    fn step(&mut self, _action: &ArrayD<f32>) -> StepResult {
        let (observation, info) = self.reset(None);
        StepResult {
            observation,
            reward: self.rng.gen(),
            terminated: false,
            truncated: false,
            info,
        }
    }
}

/// Env with a `MultiDiscrete` action space
struct Grid;

impl Env for Grid {
    fn observation_space(&self) -> DynSpace {
        DynSpace::Box(BoxSpace::uniform(&[8, 8, 3], 0.0, 255.0))
    }

    fn action_space(&self) -> DynSpace {
        DynSpace::MultiDiscrete(MultiDiscrete::new(vec![3, 3]))
    }

    fn reset(&mut self, _seed: Option<u64>) -> (ArrayD<f32>, EnvInfo) {
        (ArrayD::zeros(IxDyn(&[8, 8, 3])), EnvInfo::new())
    }

    fn step(&mut self, _action: &ArrayD<f32>) -> StepResult {
        StepResult {
            observation: ArrayD::zeros(IxDyn(&[8, 8, 3])),
            reward: 0.0,
            terminated: false,
            truncated: false,
            info: EnvInfo::new(),
        }
    }
}

/// Continuous env whose every step takes `delay` of wall time
struct Sleepy {
    delay: Duration,
}

impl Env for Sleepy {
    fn observation_space(&self) -> DynSpace {
        DynSpace::Box(BoxSpace::uniform(&[2], -1.0, 1.0))
    }

    fn action_space(&self) -> DynSpace {
        DynSpace::Box(BoxSpace::uniform(&[1], -1.0, 1.0))
    }

    fn reset(&mut self, _seed: Option<u64>) -> (ArrayD<f32>, EnvInfo) {
        (ArrayD::zeros(IxDyn(&[2])), EnvInfo::new())
    }

    fn step(&mut self, _action: &ArrayD<f32>) -> StepResult {
        thread::sleep(self.delay);
        StepResult {
            observation: ArrayD::zeros(IxDyn(&[2])),
            reward: 1.0,
            terminated: false,
            truncated: false,
            info: EnvInfo::new(),
        }
    }
}

/// Ends its episode on the first step and panics if reset afterwards
struct Fragile {
    stepped: bool,
}

impl Env for Fragile {
    fn observation_space(&self) -> DynSpace {
        DynSpace::Box(BoxSpace::uniform(&[2], -1.0, 1.0))
    }

    fn action_space(&self) -> DynSpace {
        DynSpace::Box(BoxSpace::uniform(&[1], -1.0, 1.0))
    }

    fn reset(&mut self, _seed: Option<u64>) -> (ArrayD<f32>, EnvInfo) {
        if self.stepped {
            panic!("simulator cannot be reset after its first episode");
        }
        (ArrayD::zeros(IxDyn(&[2])), EnvInfo::new())
    }

    fn step(&mut self, _action: &ArrayD<f32>) -> StepResult {
        self.stepped = true;
        StepResult {
            observation: ArrayD::zeros(IxDyn(&[2])),
            reward: 2.0,
            terminated: true,
            truncated: false,
            info: EnvInfo::new(),
        }
    }
}

fn registry() -> Registry {
    let mut registry = Registry::new();
    registry
        .register("Blink-v0", 5, || {
            Box::new(Blink { moves: 0, horizon: usize::MAX }) as Box<dyn Env>
        })
        .register("BlinkShort-v0", 100, || {
            Box::new(Blink { moves: 0, horizon: 3 }) as Box<dyn Env>
        })
        .register("Noise-v0", 50, || {
            Box::new(Noise { rng: StdRng::from_entropy() }) as Box<dyn Env>
        })
        .register("Grid-v0", 10, || Box::new(Grid) as Box<dyn Env>)
        .register("Sleepy-v0", 100, || {
            Box::new(Sleepy { delay: Duration::from_millis(200) }) as Box<dyn Env>
        })
        .register("Fragile-v0", 100, || {
            Box::new(Fragile { stepped: false }) as Box<dyn Env>
        });
    registry
}

fn small_frames() -> TransformConfig {
    TransformConfig {
        frame_dim: 16,
        ..Default::default()
    }
}

fn config(n: usize) -> ParallelEnvConfig {
    ParallelEnvConfig::new(n).with_transforms(small_frames())
}

fn fresh_blink_reset() -> ArrayD<f32> {
    let env = Box::new(Blink { moves: 0, horizon: usize::MAX });
    LocalEnv::from_env(env, 5, None, &small_frames()).unwrap().reset()
}

#[test]
fn test_reset_returns_one_observation_per_replica() {
    for n in [1, 2, 5] {
        let mut envs = ParallelEnv::new("Blink-v0", Some(0), &config(n), &registry()).unwrap();
        let obs = envs.reset().unwrap();
        assert_eq!(obs.shape(), &[n, 4, 16, 16]);
        assert_eq!(envs.num_envs(), n);
    }
}

#[test]
fn test_step_returns_aligned_batches() {
    let mut envs = ParallelEnv::new("Noise-v0", Some(1), &config(3), &registry()).unwrap();
    envs.reset().unwrap();

    let step = envs.step(&Array2::zeros((3, 2))).unwrap();
    assert_eq!(step.observations.shape(), &[3, 4]);
    assert_eq!(step.rewards.len(), 3);
    assert_eq!(step.dones.len(), 3);
    assert_eq!(step.infos.len(), 3);
}

#[test]
fn test_total_steps_grow_by_num_envs() {
    let mut envs = ParallelEnv::new("BlinkShort-v0", None, &config(4), &registry()).unwrap();
    envs.reset().unwrap();

    let actions = Array2::ones((4, 1));
    for i in 1..=6 {
        envs.step(&actions).unwrap();
        assert_eq!(envs.total_steps(), 4 * i);
    }
}

#[test]
fn test_max_episode_steps_resets_replica() {
    let mut envs = ParallelEnv::new("Blink-v0", None, &config(2), &registry()).unwrap();
    assert_eq!(envs.max_episode_steps(), 5);
    let reset_obs = fresh_blink_reset();
    envs.reset().unwrap();

    let actions = Array2::ones((2, 1));
    for t in 1..5 {
        let step = envs.step(&actions).unwrap();
        assert_eq!(envs.episode_steps(), &[t, t]);
        assert_ne!(step.observations.index_axis(ndarray::Axis(0), 0), reset_obs);
    }

    let step = envs.step(&actions).unwrap();
    assert_eq!(envs.episode_steps(), &[0, 0]);
    assert_eq!(envs.episode_rewards(), &[0.0, 0.0]);
    assert!(step.dones.iter().all(|d| !d));
    // reward of the boundary step is still reported
    assert_eq!(step.rewards[0], 4.0);
    assert_eq!(step.observations.index_axis(ndarray::Axis(0), 0), reset_obs);
}

fn without_noops(n: usize) -> ParallelEnvConfig {
    ParallelEnvConfig::new(n).with_transforms(TransformConfig {
        noop_max: 0,
        ..small_frames()
    })
}

#[test]
fn test_done_replica_gets_reset_observation() {
    let mut envs = ParallelEnv::new("BlinkShort-v0", None, &without_noops(2), &registry()).unwrap();
    let reset_obs = envs.reset().unwrap();

    let mut actions = Array2::zeros((2, 1));
    actions[[0, 0]] = 1.0;
    let step = envs.step(&actions).unwrap();

    assert_eq!(step.dones.to_vec(), vec![true, false]);
    assert_eq!(envs.episode_steps(), &[0, 1]);
    assert_eq!(step.observations, reset_obs);
}

#[test]
fn test_episode_length_counts_raw_frames() {
    // One agent step, but the third skipped frame ends the episode
    let mut envs = ParallelEnv::new("BlinkShort-v0", None, &without_noops(1), &registry()).unwrap();
    envs.reset().unwrap();
    let step = envs.step(&Array2::ones((1, 1))).unwrap();
    assert!(step.dones[0]);
    assert_eq!(step.infos[0].episode_length, Some(3.0));
    assert_eq!(step.infos[0].episode_return, Some(3.0));
    assert_eq!(envs.total_steps(), 1);

    // No-op frames run after the inner reset and are counted too
    let mut envs = ParallelEnv::new("BlinkShort-v0", Some(3), &config(4), &registry()).unwrap();
    envs.reset().unwrap();
    let step = envs.step(&Array2::ones((4, 1))).unwrap();
    for info in &step.infos {
        let length = info.episode_length.unwrap();
        assert!((4.0..=33.0).contains(&length), "episode length {length}");
    }
}

#[test]
fn test_seeded_replicas_are_deterministic() {
    let registry = registry();
    let transforms = TransformConfig::default();
    let mut a = LocalEnv::new("Noise-v0", Some(17), &registry, &transforms).unwrap();
    let mut b = LocalEnv::new("Noise-v0", Some(17), &registry, &transforms).unwrap();
    assert_eq!(a.reset(), b.reset());

    let mut first = ParallelEnv::new("Noise-v0", Some(5), &config(3), &registry).unwrap();
    let mut second = ParallelEnv::new("Noise-v0", Some(5), &config(3), &registry).unwrap();
    let obs = first.reset().unwrap();
    assert_eq!(obs, second.reset().unwrap());
    // replica i is seeded with seed + i
    assert_ne!(
        obs.index_axis(ndarray::Axis(0), 0),
        obs.index_axis(ndarray::Axis(0), 1)
    );
}

#[test]
fn test_unsupported_action_space() {
    let result = ParallelEnv::new("Grid-v0", None, &config(2), &registry());
    assert!(matches!(result, Err(VecGymError::Config(_))));
}

#[test]
fn test_wrong_batch_size_is_rejected() {
    let mut envs = ParallelEnv::new("Blink-v0", None, &config(2), &registry()).unwrap();
    envs.reset().unwrap();

    let result = envs.step(&Array2::zeros((3, 1)));
    assert!(matches!(
        result,
        Err(VecGymError::ShapeMismatch { ref actual, .. }) if actual == &vec![3, 1]
    ));
    assert_eq!(envs.total_steps(), 0);
}

#[test]
fn test_remote_regime_resets_done_replica() {
    let worker = BackgroundWorker::spawn("127.0.0.1:0", registry()).unwrap();
    let remote_config = config(2).with_worker_addr(worker.addr().to_string());
    let mut envs = ParallelEnv::new("BlinkShort-v0", None, &remote_config, &registry()).unwrap();
    assert!(envs.is_remote());
    let reset_obs = envs.reset().unwrap();

    let step = envs.step(&Array2::ones((2, 1))).unwrap();
    assert_eq!(step.dones.to_vec(), vec![true, true]);
    assert_eq!(envs.episode_steps(), &[0, 0]);
    assert_eq!(step.observations, reset_obs);
    envs.close().unwrap();
}

#[test]
fn test_remote_max_steps_and_errors() {
    let worker = BackgroundWorker::spawn("127.0.0.1:0", registry()).unwrap();
    let addr = worker.addr().to_string();

    let mut envs =
        ParallelEnv::new("Blink-v0", None, &config(2).with_worker_addr(addr.clone()), &registry())
            .unwrap();
    let reset_obs = fresh_blink_reset();
    envs.reset().unwrap();
    let actions = Array2::ones((2, 1));
    for _ in 0..4 {
        envs.step(&actions).unwrap();
    }
    let step = envs.step(&actions).unwrap();
    assert_eq!(envs.episode_steps(), &[0, 0]);
    assert_eq!(step.observations.index_axis(ndarray::Axis(0), 1), reset_obs);

    let result = ParallelEnv::new("Grid-v0", None, &config(1).with_worker_addr(addr), &registry());
    assert!(matches!(result, Err(VecGymError::Config(_))));
}

#[test]
fn test_remote_replicas_step_concurrently() {
    let worker = BackgroundWorker::spawn("127.0.0.1:0", registry()).unwrap();
    let remote_config = ParallelEnvConfig::new(8).with_worker_addr(worker.addr().to_string());
    let mut envs = ParallelEnv::new("Sleepy-v0", None, &remote_config, &registry()).unwrap();
    envs.reset().unwrap();

    let start = Instant::now();
    envs.step(&Array2::zeros((8, 1))).unwrap();
    let elapsed = start.elapsed();
    // 8 x 200ms back to back would be 1.6s
    assert!(elapsed < Duration::from_millis(800), "step took {elapsed:?}");
    envs.close().unwrap();
}

#[test]
fn test_failed_reset_keeps_episode_counters() {
    let worker = BackgroundWorker::spawn("127.0.0.1:0", registry()).unwrap();
    let remote_config = ParallelEnvConfig::new(1).with_worker_addr(worker.addr().to_string());
    let mut envs = ParallelEnv::new("Fragile-v0", None, &remote_config, &registry()).unwrap();
    envs.reset().unwrap();

    let result = envs.step(&Array2::zeros((1, 1)));
    assert!(matches!(result, Err(VecGymError::Remote(_))));
    assert_eq!(envs.episode_steps(), &[1]);
    assert!(envs.episode_rewards()[0] > 0.0);
    assert_eq!(envs.total_steps(), 1);
}
