use super::builders::{check_common, check_positive};
use super::{
    check_observation, BuildEnv, BuildEnvError, EnvError, EnvStructure, Environment, Successor,
};
use crate::logging::StatsLogger;
use crate::spaces::{ActionSpace, BoxSpace, DiscreteValuedSpace};
use crate::utils::ode;
use crate::Prng;
use ndarray::{array, Array1, ArrayView1};
use serde::{Deserialize, Serialize};

/// Car-on-Hill environment
///
/// A car of limited power must climb a hill whose shape is `x² + x` for `x < 0` and
/// `x / √(1 + 5x²)` for `x ≥ 0`. The car starts at rest in the valley and must build momentum
/// by first moving away from the goal.
///
/// As presented in "Tree-Based Batch Mode Reinforcement Learning" by [Ernst et al. (2005)][ernst].
///
/// [ernst]: https://www.jmlr.org/papers/v6/ernst05a.html
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CarOnHill {
    /// Maximum absolute position; leaving `[-max_pos, max_pos]` ends the episode.
    pub max_pos: f64,
    /// Maximum absolute velocity; exceeding it ends the episode in failure.
    pub max_velocity: f64,
    /// Gravitational acceleration (m/s^2)
    pub gravity: f64,
    /// Mass of the car (kg)
    pub mass: f64,
    /// Duration of one environment step (s)
    pub time_step: f64,
    /// Number of integration sub-steps per environment step
    pub integration_steps: usize,
    /// Forces (N) the car can apply
    pub actions: Vec<f64>,
    pub discount_factor: f64,
    pub horizon: u64,
}

impl Default for CarOnHill {
    fn default() -> Self {
        Self {
            max_pos: 1.0,
            max_velocity: 3.0,
            gravity: 9.81,
            mass: 1.0,
            time_step: 0.1,
            integration_steps: 10,
            actions: vec![-4.0, 4.0],
            discount_factor: 0.95,
            horizon: 300,
        }
    }
}

impl BuildEnv for CarOnHill {
    type Environment = Self;

    fn build_env(&self, _: &mut Prng) -> Result<Self, BuildEnvError> {
        check_common(self.discount_factor, self.horizon)?;
        check_positive("max_pos", self.max_pos)?;
        check_positive("max_velocity", self.max_velocity)?;
        check_positive("mass", self.mass)?;
        check_positive("time_step", self.time_step)?;
        if self.integration_steps == 0 || self.actions.is_empty() {
            return Err(BuildEnvError::InvalidParameter {
                name: "integration_steps/actions",
                reason: "must be non-empty".into(),
            });
        }
        Ok(self.clone())
    }
}

/// State of the [`CarOnHill`] environment.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarOnHillState {
    /// Horizontal position of the car.
    pub position: f64,
    /// Horizontal velocity of the car.
    pub velocity: f64,
}

impl CarOnHill {
    /// Hill slope `H'(p)` and curvature `H''(p)`.
    fn hill_derivatives(position: f64) -> (f64, f64) {
        if position < 0.0 {
            (2.0 * position + 1.0, 2.0)
        } else {
            let denom = 1.0 + 5.0 * position * position;
            (denom.powf(-1.5), -15.0 * position * denom.powf(-2.5))
        }
    }

    fn acceleration(&self, position: f64, velocity: f64, force: f64) -> f64 {
        let (slope, curvature) = Self::hill_derivatives(position);
        (force
            - self.gravity * self.mass * slope
            - velocity * velocity * self.mass * slope * curvature)
            / (self.mass * (1.0 + slope * slope))
    }

    fn reached_goal(&self, state: &CarOnHillState) -> bool {
        state.position > self.max_pos && state.velocity.abs() <= self.max_velocity
    }
}

impl EnvStructure for CarOnHill {
    fn observation_space(&self) -> BoxSpace {
        BoxSpace::symmetric(&[self.max_pos, self.max_velocity])
    }

    fn action_space(&self) -> ActionSpace {
        DiscreteValuedSpace::new(self.actions.clone()).into()
    }

    fn reward_range(&self) -> (f64, f64) {
        (-1.0, 1.0)
    }

    fn discount_factor(&self) -> f64 {
        self.discount_factor
    }

    fn horizon(&self) -> u64 {
        self.horizon
    }
}

impl Environment for CarOnHill {
    type State = CarOnHillState;

    fn initial_state(&self, _: &mut Prng) -> Self::State {
        CarOnHillState {
            position: -0.5,
            velocity: 0.0,
        }
    }

    fn state_from_observation(&self, observation: ArrayView1<f64>) -> Result<Self::State, EnvError> {
        check_observation(observation, 2)?;
        Ok(CarOnHillState {
            position: observation[0],
            velocity: observation[1],
        })
    }

    fn observe(&self, state: &Self::State) -> Array1<f64> {
        array![state.position, state.velocity]
    }

    fn step(
        &self,
        state: Self::State,
        action: f64,
        _: &mut Prng,
        _: &mut dyn StatsLogger,
    ) -> (Successor<Self::State>, f64) {
        let [position, velocity] = ode::integrate(
            |&[p, v]: &[f64; 2]| [v, self.acceleration(p, v, action)],
            [state.position, state.velocity],
            self.time_step,
            self.integration_steps,
        );
        let next = CarOnHillState { position, velocity };

        if position < -self.max_pos || velocity.abs() > self.max_velocity {
            (Successor::Terminate(next), -1.0)
        } else if self.reached_goal(&next) {
            (Successor::Terminate(next), 1.0)
        } else {
            (Successor::Continue(next), 0.0)
        }
    }

    fn is_goal(&self, state: &Self::State) -> bool {
        self.reached_goal(state)
    }
}
