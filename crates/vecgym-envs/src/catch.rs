//! Catch: a falling ball and a paddle, rendered as RGB pixels.

use ndarray::{s, Array3, ArrayD};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use vecgym::env::{Env, EnvInfo, StepResult};
use vecgym::spaces::{Box as BoxSpace, Discrete, DynSpace};

const BALL_COLOR: [f32; 3] = [255.0, 255.0, 255.0];
const PADDLE_COLOR: [f32; 3] = [64.0, 160.0, 255.0];

/// Catch environment
///
/// A ball drops one row per step from a random column of the top row. The
/// paddle on the bottom row must be under it when it lands.
///
/// Observation: `[rows * cell, cols * cell, 3]` pixels in 0..=255
/// Action: 0 = stay, 1 = left, 2 = right
/// Reward: +1 on a catch, -1 on a miss, 0 otherwise
pub struct Catch {
    rows: usize,
    cols: usize,
    /// Pixel size of one grid cell
    cell: usize,
    ball: (usize, usize),
    paddle: usize,
    rng: StdRng,
}

impl Catch {
    pub fn new() -> Self {
        Self::with_size(10, 5, 4)
    }

    pub fn with_size(rows: usize, cols: usize, cell: usize) -> Self {
        assert!(rows >= 2 && cols >= 1 && cell >= 1, "grid too small");
        Self {
            rows,
            cols,
            cell,
            ball: (0, 0),
            paddle: cols / 2,
            rng: StdRng::from_entropy(),
        }
    }

    fn paint(&self, frame: &mut Array3<f32>, (row, col): (usize, usize), color: [f32; 3]) {
        let (r, c) = (row * self.cell, col * self.cell);
        let mut patch = frame.slice_mut(s![r..r + self.cell, c..c + self.cell, ..]);
        for (channel, value) in color.iter().enumerate() {
            patch.slice_mut(s![.., .., channel]).fill(*value);
        }
    }

    fn observation(&self) -> ArrayD<f32> {
        let mut frame = Array3::zeros((self.rows * self.cell, self.cols * self.cell, 3));
        self.paint(&mut frame, (self.rows - 1, self.paddle), PADDLE_COLOR);
        self.paint(&mut frame, self.ball, BALL_COLOR);
        frame.into_dyn()
    }
}

impl Default for Catch {
    fn default() -> Self {
        Self::new()
    }
}

impl Env for Catch {
    fn observation_space(&self) -> DynSpace {
        DynSpace::Box(BoxSpace::uniform(
            &[self.rows * self.cell, self.cols * self.cell, 3],
            0.0,
            255.0,
        ))
    }

    fn action_space(&self) -> DynSpace {
        DynSpace::Discrete(Discrete::new(3))
    }

    fn reset(&mut self, seed: Option<u64>) -> (ArrayD<f32>, EnvInfo) {
        if let Some(s) = seed {
            self.rng = StdRng::seed_from_u64(s);
        }
        self.ball = (0, self.rng.gen_range(0..self.cols));
        self.paddle = self.cols / 2;
        (self.observation(), EnvInfo::new())
    }

    fn step(&mut self, action: &ArrayD<f32>) -> StepResult {
        let action = action.iter().next().map_or(0, |a| a.round() as i64);
        self.paddle = match action {
            1 => self.paddle.saturating_sub(1),
            2 => (self.paddle + 1).min(self.cols - 1),
            _ => self.paddle,
        };
        self.ball.0 += 1;

        let landed = self.ball.0 == self.rows - 1;
        let reward = match (landed, self.ball.1 == self.paddle) {
            (false, _) => 0.0,
            (true, true) => 1.0,
            (true, false) => -1.0,
        };

        let info = if landed {
            EnvInfo::new().with_extra("caught", if reward > 0.0 { 1.0 } else { 0.0 })
        } else {
            EnvInfo::new()
        };

        StepResult {
            observation: self.observation(),
            reward,
            terminated: landed,
            truncated: false,
            info,
        }
    }

    fn render(&self) -> Option<String> {
        let mut out = String::with_capacity(self.rows * (self.cols + 1));
        for row in 0..self.rows {
            for col in 0..self.cols {
                out.push(match (row, col) {
                    pos if pos == self.ball => 'o',
                    (r, c) if r == self.rows - 1 && c == self.paddle => '=',
                    _ => '.',
                });
            }
            out.push('\n');
        }
        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::IxDyn;

    fn act(a: f32) -> ArrayD<f32> {
        ArrayD::from_elem(IxDyn(&[1]), a)
    }

    #[test]
    fn test_catch_observation_shape() {
        let mut env = Catch::new();
        let (obs, _) = env.reset(Some(1));

        assert_eq!(obs.shape(), &[40, 20, 3]);
        assert!(env.observation_space().contains(&obs));
        // paddle starts centered on the bottom row
        assert_eq!(obs[[39, 10, 2]], 255.0);
    }

    #[test]
    fn test_catch_episode_length() {
        let mut env = Catch::new();
        env.reset(Some(7));

        for t in 1..10 {
            let result = env.step(&act(0.0));
            assert_eq!(result.done(), t == 9, "step {}", t);
        }
    }

    #[test]
    fn test_catch_reward_follows_paddle() {
        let mut env = Catch::with_size(4, 3, 1);
        env.reset(Some(0));
        let target = env.ball.1;

        let mut last = None;
        while last.is_none() {
            let action = match env.paddle.cmp(&target) {
                std::cmp::Ordering::Less => 2.0,
                std::cmp::Ordering::Greater => 1.0,
                std::cmp::Ordering::Equal => 0.0,
            };
            let result = env.step(&act(action));
            if result.done() {
                last = Some(result);
            }
        }
        let last = last.unwrap();
        assert_eq!(last.reward, 1.0);
        assert_eq!(last.info.get("caught"), Some(1.0));
    }

    #[test]
    fn test_catch_render() {
        let mut env = Catch::with_size(3, 3, 1);
        env.reset(Some(0));
        let text = env.render().unwrap();
        assert_eq!(text.lines().count(), 3);
        assert!(text.contains('o'));
        assert!(text.contains('='));
    }
}
