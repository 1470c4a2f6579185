//! DeepMind-style preprocessing for pixel environments with discrete actions.
//!
//! Chain order, innermost first: `NoopReset` -> `MaxAndSkip` -> `WarpFrame`
//! -> `FrameStack`. Frames are `f32` arrays laid out `[height, width, channels]`
//! with values in `0..=255` until `FrameStack` applies the requested layout.

use super::{Env, EnvInfo, StepResult};
use crate::spaces::{Box as BoxSpace, DynSpace};
use crate::vector::ObsFormat;
use crate::{Result, VecGymError};
use image::imageops::{self, FilterType};
use image::{GrayImage, Luma};
use ndarray::{Array3, ArrayD, IxDyn, Zip};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;

/// Runs a random number of no-op actions (action 0) after every reset.
pub struct NoopReset<E: Env> {
    env: E,
    noop_max: usize,
    rng: StdRng,
}

impl<E: Env> NoopReset<E> {
    pub fn new(env: E, noop_max: usize) -> Self {
        Self {
            env,
            noop_max,
            rng: StdRng::from_entropy(),
        }
    }

    fn noop() -> ArrayD<f32> {
        ArrayD::zeros(IxDyn(&[1]))
    }
}

impl<E: Env> Env for NoopReset<E> {
    fn observation_space(&self) -> DynSpace {
        self.env.observation_space()
    }

    fn action_space(&self) -> DynSpace {
        self.env.action_space()
    }

    fn reset(&mut self, seed: Option<u64>) -> (ArrayD<f32>, EnvInfo) {
        if let Some(seed) = seed {
            self.rng = StdRng::seed_from_u64(seed);
        }
        let (mut obs, mut info) = self.env.reset(seed);
        if self.noop_max == 0 {
            return (obs, info);
        }

        let noops = self.rng.gen_range(1..=self.noop_max);
        for _ in 0..noops {
            let result = self.env.step(&Self::noop());
            if result.done() {
                (obs, info) = self.env.reset(None);
            } else {
                obs = result.observation;
                info = result.info;
            }
        }
        (obs, info)
    }

    fn step(&mut self, action: &ArrayD<f32>) -> StepResult {
        self.env.step(action)
    }

    fn render(&self) -> Option<String> {
        self.env.render()
    }

    fn close(&mut self) {
        self.env.close()
    }
}

/// Repeats each action `skip` times, summing rewards, and returns the
/// element-wise max of the last two frames.
pub struct MaxAndSkip<E: Env> {
    env: E,
    skip: usize,
}

impl<E: Env> MaxAndSkip<E> {
    pub fn new(env: E, skip: usize) -> Self {
        Self {
            env,
            skip: skip.max(1),
        }
    }
}

impl<E: Env> Env for MaxAndSkip<E> {
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
        let mut previous: Option<ArrayD<f32>> = None;
        let mut total_reward = 0.0;
        let mut result = self.env.step(action);
        total_reward += result.reward;

        for _ in 1..self.skip {
            if result.done() {
                break;
            }
            let next = self.env.step(action);
            total_reward += next.reward;
            previous = Some(std::mem::replace(&mut result, next).observation);
        }

        if let Some(previous) = previous {
            Zip::from(&mut result.observation)
                .and(&previous)
                .for_each(|cur, &prev| *cur = cur.max(prev));
        }
        result.reward = total_reward;
        result
    }

    fn render(&self) -> Option<String> {
        self.env.render()
    }

    fn close(&mut self) {
        self.env.close()
    }
}

/// Converts RGB frames to grayscale and resizes them to `dim` x `dim`.
pub struct WarpFrame<E: Env> {
    env: E,
    dim: usize,
    height: usize,
    width: usize,
    channels: usize,
}

impl<E: Env> WarpFrame<E> {
    /// Fails unless the observation space is a `[height, width, channels]`
    /// image with 1 or 3 channels.
    pub fn new(env: E, dim: usize) -> Result<Self> {
        let shape = match env.observation_space() {
            DynSpace::Box(space) if space.is_image() => space.low.shape().to_vec(),
            other => {
                return Err(VecGymError::Config(format!(
                    "frame preprocessing requires an image observation space [H, W, C], got {} {:?}",
                    other.kind(),
                    other.shape()
                )))
            }
        };
        let (height, width, channels) = (shape[0], shape[1], shape[2]);
        if channels != 1 && channels != 3 {
            return Err(VecGymError::Config(format!(
                "frame preprocessing supports 1 or 3 channels, got {}",
                channels
            )));
        }
        if dim == 0 {
            return Err(VecGymError::Config("frame_dim must be > 0".into()));
        }
        Ok(Self {
            env,
            dim,
            height,
            width,
            channels,
        })
    }

    fn warp(&self, frame: &ArrayD<f32>) -> ArrayD<f32> {
        let mut gray = GrayImage::new(self.width as u32, self.height as u32);
        for (x, y, pixel) in gray.enumerate_pixels_mut() {
            let (row, col) = (y as usize, x as usize);
            let luma = if self.channels == 3 {
                0.299 * frame[[row, col, 0]] + 0.587 * frame[[row, col, 1]] + 0.114 * frame[[row, col, 2]]
            } else {
                frame[[row, col, 0]]
            };
            *pixel = Luma([luma.round().clamp(0.0, 255.0) as u8]);
        }

        let resized = imageops::resize(&gray, self.dim as u32, self.dim as u32, FilterType::Triangle);
        Array3::from_shape_fn((self.dim, self.dim, 1), |(r, c, _)| {
            f32::from(resized.get_pixel(c as u32, r as u32)[0])
        })
        .into_dyn()
    }
}

impl<E: Env> Env for WarpFrame<E> {
    fn observation_space(&self) -> DynSpace {
        DynSpace::Box(BoxSpace::uniform(&[self.dim, self.dim, 1], 0.0, 255.0))
    }

    fn action_space(&self) -> DynSpace {
        self.env.action_space()
    }

    fn reset(&mut self, seed: Option<u64>) -> (ArrayD<f32>, EnvInfo) {
        let (obs, info) = self.env.reset(seed);
        (self.warp(&obs), info)
    }

    fn step(&mut self, action: &ArrayD<f32>) -> StepResult {
        let mut result = self.env.step(action);
        result.observation = self.warp(&result.observation);
        result
    }

    fn render(&self) -> Option<String> {
        self.env.render()
    }

    fn close(&mut self) {
        self.env.close()
    }
}

/// Stacks the last `k` single-channel frames.
///
/// `ObsFormat::Nchw` yields `[k, height, width]`, `ObsFormat::Nhwc` yields
/// `[height, width, k]`. After a reset the stack holds `k` copies of the
/// reset frame.
pub struct FrameStack<E: Env> {
    env: E,
    k: usize,
    format: ObsFormat,
    frames: VecDeque<ArrayD<f32>>,
}

impl<E: Env> FrameStack<E> {
    pub fn new(env: E, k: usize, format: ObsFormat) -> Self {
        let k = k.max(1);
        Self {
            env,
            k,
            format,
            frames: VecDeque::with_capacity(k),
        }
    }

    fn stacked(&self) -> ArrayD<f32> {
        let frames = &self.frames;
        let (h, w) = match frames.front() {
            Some(first) => (first.shape()[0], first.shape()[1]),
            None => (0, 0),
        };
        match self.format {
            ObsFormat::Nchw => {
                Array3::from_shape_fn((self.k, h, w), |(i, r, c)| frames[i][[r, c, 0]]).into_dyn()
            }
            ObsFormat::Nhwc => {
                Array3::from_shape_fn((h, w, self.k), |(r, c, i)| frames[i][[r, c, 0]]).into_dyn()
            }
        }
    }
}

impl<E: Env> Env for FrameStack<E> {
    fn observation_space(&self) -> DynSpace {
        let shape = self.env.observation_space().shape();
        let (h, w) = (shape[0], shape[1]);
        let stacked = match self.format {
            ObsFormat::Nchw => [self.k, h, w],
            ObsFormat::Nhwc => [h, w, self.k],
        };
        DynSpace::Box(BoxSpace::uniform(&stacked, 0.0, 255.0))
    }

    fn action_space(&self) -> DynSpace {
        self.env.action_space()
    }

    fn reset(&mut self, seed: Option<u64>) -> (ArrayD<f32>, EnvInfo) {
        let (obs, info) = self.env.reset(seed);
        self.frames.clear();
        for _ in 0..self.k {
            self.frames.push_back(obs.clone());
        }
        (self.stacked(), info)
    }

    fn step(&mut self, action: &ArrayD<f32>) -> StepResult {
        let mut result = self.env.step(action);
        if self.frames.len() == self.k {
            self.frames.pop_front();
        }
        self.frames.push_back(result.observation);
        while self.frames.len() < self.k {
            self.frames.push_front(self.frames[0].clone());
        }
        result.observation = self.stacked();
        result
    }

    fn render(&self) -> Option<String> {
        self.env.render()
    }

    fn close(&mut self) {
        self.env.close()
    }
}
