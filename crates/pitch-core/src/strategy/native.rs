//! Strategies implemented in Rust.
//!
//! These are used by tests, benchmarks and hosts that want a robot driven
//! without script overhead. They obey the same contract as scripts: input is
//! the [`WorldState`], output is a [`Decision`].

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use super::{Decision, Strategy};
use crate::error::StrategyFault;
use crate::observation::WorldState;
use crate::strategy::Action;

/// Drives with random motor values, kicking occasionally. Reproducible for a
/// given seed.
#[derive(Debug, Clone)]
pub struct RandomStrategy {
    rng: ChaCha8Rng,
}

impl RandomStrategy {
    /// Creates a strategy seeded with `seed`.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl Strategy for RandomStrategy {
    fn name(&self) -> &str {
        "random"
    }

    fn decide(&mut self, _world: &WorldState) -> Result<Decision, StrategyFault> {
        let mut motors = [0.0f32; 4];
        for m in &mut motors {
            *m = self.rng.gen_range(-1.0..=1.0);
        }
        let kick = self.rng.gen_bool(0.1);
        Ok(Decision::from(Action::new(motors, kick)))
    }
}

/// Wraps a closure as a strategy.
///
/// # Example
///
/// ```
/// use pitch_core::strategy::native::FnStrategy;
/// use pitch_core::strategy::{Action, Decision, Strategy};
/// use pitch_core::observation::WorldState;
///
/// let mut spin = FnStrategy::new("spin", |_ws: &WorldState| {
///     Ok(Decision::from(Action::new([0.5; 4], false)))
/// });
/// let decision = spin.decide(&WorldState::default()).unwrap();
/// assert_eq!(decision.action.motor1, 0.5);
/// ```
pub struct FnStrategy<F> {
    name: String,
    f: F,
}

impl<F> FnStrategy<F>
where
    F: FnMut(&WorldState) -> Result<Decision, StrategyFault>,
{
    /// Creates a named closure strategy.
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

impl<F> Strategy for FnStrategy<F>
where
    F: FnMut(&WorldState) -> Result<Decision, StrategyFault>,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn decide(&mut self, world: &WorldState) -> Result<Decision, StrategyFault> {
        (self.f)(world)
    }
}
