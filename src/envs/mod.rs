//! Reinforcement learning environments
mod acrobot;
mod bicycle;
mod builders;
mod car_on_hill;
mod cartpole;
mod lqg;
mod pendulum;
mod swing_pendulum;
#[cfg(test)]
pub mod testing;

pub use acrobot::{Acrobot, AcrobotState};
pub use bicycle::{Bicycle, BicycleState};
pub use builders::{BuildEnv, BuildEnvError, Mdp, MdpConfig, MdpState};
pub use car_on_hill::{CarOnHill, CarOnHillState};
pub use cartpole::{CartPole, CartPoleState, EnvironmentParams, PhysicalConstants};
pub use lqg::Lqg1d;
pub use pendulum::{InvertedPendulum, PendulumState};
pub use swing_pendulum::SwingPendulum;

use crate::logging::StatsLogger;
use crate::spaces::{ActionSpace, BoxSpace};
use crate::Prng;
use ndarray::{Array1, ArrayView1};
use thiserror::Error;

/// The successor of an environment step.
///
/// Unlike a continuing step, a terminating step leads to an absorbing state:
/// all trajectories from it yield zero reward. The absorbing state is still carried so that it
/// can be recorded as the next state of the transition.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Successor<S> {
    /// The episode continues from the given state.
    Continue(S),
    /// The episode ends in the given absorbing state.
    Terminate(S),
}

impl<S> Successor<S> {
    /// Whether the successor state is absorbing.
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminate(_))
    }

    /// Reference to the successor state.
    pub const fn state(&self) -> &S {
        match self {
            Self::Continue(s) | Self::Terminate(s) => s,
        }
    }

    /// Take the successor state, discarding whether it is absorbing.
    #[allow(clippy::missing_const_for_fn)] // false positive; destructors
    pub fn into_state(self) -> S {
        match self {
            Self::Continue(s) | Self::Terminate(s) => s,
        }
    }

    /// Apply a transformation to the successor state.
    pub fn map<F, T>(self, f: F) -> Successor<T>
    where
        F: FnOnce(S) -> T,
    {
        match self {
            Self::Continue(s) => Successor::Continue(f(s)),
            Self::Terminate(s) => Successor::Terminate(f(s)),
        }
    }
}

/// Error creating an environment state from an observation vector.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EnvError {
    #[error("state has {actual} dimensions but the environment expects {expected}")]
    StateDim { expected: usize, actual: usize },
    #[error("state component {index} has invalid value {value}")]
    InvalidStateValue { index: usize, value: f64 },
}

/// Check that an observation vector has the expected number of finite components.
pub(crate) fn check_observation(
    observation: ArrayView1<f64>,
    expected: usize,
) -> Result<(), EnvError> {
    if observation.len() != expected {
        return Err(EnvError::StateDim {
            expected,
            actual: observation.len(),
        });
    }
    if let Some((index, &value)) = observation.iter().enumerate().find(|(_, x)| !x.is_finite()) {
        return Err(EnvError::InvalidStateValue { index, value });
    }
    Ok(())
}

/// The external structure of a reinforcement learning environment.
pub trait EnvStructure {
    /// Space containing all non-absorbing state observations.
    ///
    /// Absorbing states may lie outside of this space.
    fn observation_space(&self) -> BoxSpace;

    /// The space of all possible actions.
    fn action_space(&self) -> ActionSpace;

    /// A lower and upper bound on possible reward values.
    ///
    /// These bounds are not required to be tight but ideally will be as tight as possible.
    fn reward_range(&self) -> (f64, f64);

    /// A discount factor applied to future rewards.
    ///
    /// A value between `0` and `1`, inclusive.
    fn discount_factor(&self) -> f64;

    /// Maximum number of steps in an episode.
    fn horizon(&self) -> u64;

    /// Number of state (observation) dimensions.
    #[inline]
    fn state_dim(&self) -> usize {
        self.observation_space().dim()
    }

    /// Number of action dimensions. Actions are always scalar.
    #[inline]
    fn action_dim(&self) -> usize {
        1
    }
}

impl<E: EnvStructure + ?Sized> EnvStructure for &'_ E {
    fn observation_space(&self) -> BoxSpace {
        E::observation_space(self)
    }
    fn action_space(&self) -> ActionSpace {
        E::action_space(self)
    }
    fn reward_range(&self) -> (f64, f64) {
        E::reward_range(self)
    }
    fn discount_factor(&self) -> f64 {
        E::discount_factor(self)
    }
    fn horizon(&self) -> u64 {
        E::horizon(self)
    }
    fn state_dim(&self) -> usize {
        E::state_dim(self)
    }
}

/// A reinforcement learning environment.
///
/// This defines the environment dynamics and structure.
/// It does not internally manage state.
pub trait Environment: EnvStructure {
    /// Internal environment state.
    type State: Clone + Send;

    /// Sample a new initial state.
    fn initial_state(&self, rng: &mut Prng) -> Self::State;

    /// Create a state from a state observation vector.
    ///
    /// Used to start episodes from caller-chosen initial states.
    fn state_from_observation(&self, observation: ArrayView1<f64>)
        -> Result<Self::State, EnvError>;

    /// The observation vector of a state.
    fn observe(&self, state: &Self::State) -> Array1<f64>;

    /// Sample a state transition.
    ///
    /// # Returns
    /// * `successor`: The resulting state and whether it is absorbing.
    /// * `reward`: The reward value for this transition.
    fn step(
        &self,
        state: Self::State,
        action: f64,
        rng: &mut Prng,
        logger: &mut dyn StatsLogger,
    ) -> (Successor<Self::State>, f64);

    /// Whether a state is a goal state.
    #[inline]
    fn is_goal(&self, _state: &Self::State) -> bool {
        false
    }
}

impl<E: Environment + ?Sized> Environment for &'_ E {
    type State = E::State;

    fn initial_state(&self, rng: &mut Prng) -> Self::State {
        E::initial_state(self, rng)
    }
    fn state_from_observation(
        &self,
        observation: ArrayView1<f64>,
    ) -> Result<Self::State, EnvError> {
        E::state_from_observation(self, observation)
    }
    fn observe(&self, state: &Self::State) -> Array1<f64> {
        E::observe(self, state)
    }
    fn step(
        &self,
        state: Self::State,
        action: f64,
        rng: &mut Prng,
        logger: &mut dyn StatsLogger,
    ) -> (Successor<Self::State>, f64) {
        E::step(self, state, action, rng, logger)
    }
    fn is_goal(&self, state: &Self::State) -> bool {
        E::is_goal(self, state)
    }
}
