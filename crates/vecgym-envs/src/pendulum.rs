//! Pendulum swing-up, continuous control.

use ndarray::{arr1, ArrayD};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f32::consts::PI;
use vecgym::env::{Env, EnvInfo, StepResult};
use vecgym::spaces::{Box as BoxSpace, DynSpace};

/// Pendulum environment
///
/// A frictionless pendulum starts at a random angle and must be swung up
/// and held upright by applying torque at the pivot.
///
/// Observation: [cos(theta), sin(theta), theta_dot]
/// Action: torque in [-2, 2]
pub struct Pendulum {
    // Physics constants
    gravity: f32,
    mass: f32,
    length: f32,
    dt: f32,
    max_speed: f32,
    max_torque: f32,

    // State
    theta: f32,
    theta_dot: f32,
    rng: StdRng,
}

impl Pendulum {
    pub fn new() -> Self {
        Self {
            gravity: 10.0,
            mass: 1.0,
            length: 1.0,
            dt: 0.05,
            max_speed: 8.0,
            max_torque: 2.0,
            theta: 0.0,
            theta_dot: 0.0,
            rng: StdRng::from_entropy(),
        }
    }

    fn observation(&self) -> ArrayD<f32> {
        arr1(&[self.theta.cos(), self.theta.sin(), self.theta_dot]).into_dyn()
    }
}

impl Default for Pendulum {
    fn default() -> Self {
        Self::new()
    }
}

/// Wrap an angle into [-pi, pi)
fn normalize_angle(x: f32) -> f32 {
    (x + PI).rem_euclid(2.0 * PI) - PI
}

impl Env for Pendulum {
    fn observation_space(&self) -> DynSpace {
        DynSpace::Box(BoxSpace {
            low: arr1(&[-1.0, -1.0, -self.max_speed]).into_dyn(),
            high: arr1(&[1.0, 1.0, self.max_speed]).into_dyn(),
        })
    }

    fn action_space(&self) -> DynSpace {
        DynSpace::Box(BoxSpace::uniform(&[1], -self.max_torque, self.max_torque))
    }

    fn reset(&mut self, seed: Option<u64>) -> (ArrayD<f32>, EnvInfo) {
        if let Some(s) = seed {
            self.rng = StdRng::seed_from_u64(s);
        }
        self.theta = self.rng.gen_range(-PI..PI);
        self.theta_dot = self.rng.gen_range(-1.0..1.0);
        (self.observation(), EnvInfo::new())
    }

    fn step(&mut self, action: &ArrayD<f32>) -> StepResult {
        let torque = action
            .iter()
            .next()
            .copied()
            .unwrap_or(0.0)
            .clamp(-self.max_torque, self.max_torque);

        let cost = normalize_angle(self.theta).powi(2)
            + 0.1 * self.theta_dot.powi(2)
            + 0.001 * torque.powi(2);

        let g = self.gravity;
        let (m, l) = (self.mass, self.length);
        let theta_acc = 3.0 * g / (2.0 * l) * self.theta.sin() + 3.0 / (m * l * l) * torque;
        self.theta_dot = (self.theta_dot + theta_acc * self.dt).clamp(-self.max_speed, self.max_speed);
        self.theta += self.theta_dot * self.dt;

        StepResult {
            observation: self.observation(),
            reward: -cost,
            terminated: false,
            truncated: false,
            info: EnvInfo::new(),
        }
    }

    fn render(&self) -> Option<String> {
        Some(format!(
            "theta={:+.3} theta_dot={:+.3}",
            normalize_angle(self.theta),
            self.theta_dot
        ))
    }
}
