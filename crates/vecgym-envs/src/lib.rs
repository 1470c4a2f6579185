//! Built-in environments for vecgym.
//!
//! - `Pendulum` - continuous-control swing-up (`Pendulum-v1`)
//! - `Catch` - pixel-observation, discrete-action game (`Catch-v0`)

mod catch;
mod pendulum;

pub use catch::Catch;
pub use pendulum::Pendulum;

use vecgym::env::{Env, Registry};

/// Registry holding every built-in environment
pub fn registry() -> Registry {
    let mut registry = Registry::new();
    register_all(&mut registry);
    registry
}

/// Add the built-in environments to an existing registry
pub fn register_all(registry: &mut Registry) {
    registry
        .register("Pendulum-v1", 200, || Box::new(Pendulum::new()) as Box<dyn Env>)
        .register("Catch-v0", 1000, || Box::new(Catch::new()) as Box<dyn Env>);
}
