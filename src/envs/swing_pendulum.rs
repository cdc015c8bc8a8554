use super::builders::{check_common, check_positive};
use super::{
    check_observation, BuildEnv, BuildEnvError, EnvError, EnvStructure, Environment,
    PendulumState, Successor,
};
use crate::logging::StatsLogger;
use crate::spaces::{ActionSpace, BoxSpace, DiscreteValuedSpace};
use crate::utils::{ode, wrap_angle};
use crate::Prng;
use ndarray::{array, Array1, ArrayView1};
use rand::distributions::{Distribution, Uniform};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Pendulum swing-up environment
///
/// A torque-limited pendulum starts hanging down and must be swung up and held upright.
/// The angle is `0` when upright. The goal is a slowly turning pendulum near upright. The reward is `cos(theta)` on every step and no state is
/// absorbing; an episode always runs for the full horizon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwingPendulum {
    /// Gravitational acceleration (m/s^2)
    pub gravity: f64,
    /// Mass of the pendulum (kg)
    pub mass: f64,
    /// Length of the pendulum (m)
    pub length: f64,
    /// Coefficient of friction at the hinge
    pub friction: f64,
    /// Maximum absolute angular velocity; faster motion is clipped.
    pub max_velocity: f64,
    /// Duration of one environment step (s)
    pub time_step: f64,
    /// Number of integration sub-steps per environment step
    pub integration_steps: usize,
    /// Torques (N m) that can be applied at the hinge
    pub actions: Vec<f64>,
    /// Bound on the initial deviation from hanging straight down
    pub initial_noise: f64,
    /// States within this angle of upright count as the goal
    pub goal_angle: f64,
    /// Goal states must also turn slower than this angular velocity
    pub goal_velocity: f64,
    pub discount_factor: f64,
    pub horizon: u64,
}

impl Default for SwingPendulum {
    fn default() -> Self {
        Self {
            gravity: 9.8,
            mass: 1.0,
            length: 1.0,
            friction: 0.01,
            max_velocity: 4.0 * PI,
            time_step: 0.1,
            integration_steps: 10,
            actions: vec![-5.0, 0.0, 5.0],
            initial_noise: 0.1,
            goal_angle: PI / 6.0,
            goal_velocity: 1.0,
            discount_factor: 0.9,
            horizon: 100,
        }
    }
}

impl BuildEnv for SwingPendulum {
    type Environment = Self;

    fn build_env(&self, _: &mut Prng) -> Result<Self, BuildEnvError> {
        check_common(self.discount_factor, self.horizon)?;
        check_positive("mass", self.mass)?;
        check_positive("length", self.length)?;
        check_positive("max_velocity", self.max_velocity)?;
        check_positive("time_step", self.time_step)?;
        check_positive("goal_velocity", self.goal_velocity)?;
        if self.integration_steps == 0 || self.actions.is_empty() {
            return Err(BuildEnvError::InvalidParameter {
                name: "integration_steps/actions",
                reason: "must be non-empty".into(),
            });
        }
        Ok(self.clone())
    }
}

impl SwingPendulum {
    fn angular_acceleration(&self, theta: f64, omega: f64, torque: f64) -> f64 {
        (-self.friction * omega + self.mass * self.gravity * self.length * theta.sin() + torque)
            / (self.mass * self.length * self.length)
    }
}

impl EnvStructure for SwingPendulum {
    fn observation_space(&self) -> BoxSpace {
        BoxSpace::symmetric(&[PI, self.max_velocity])
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

impl Environment for SwingPendulum {
    type State = PendulumState;

    fn initial_state(&self, rng: &mut Prng) -> Self::State {
        let offset = if self.initial_noise > 0.0 {
            Uniform::new_inclusive(-self.initial_noise, self.initial_noise).sample(rng)
        } else {
            0.0
        };
        PendulumState {
            theta: wrap_angle(PI + offset),
            omega: 0.0,
        }
    }

    fn state_from_observation(&self, observation: ArrayView1<f64>) -> Result<Self::State, EnvError> {
        check_observation(observation, 2)?;
        Ok(PendulumState {
            theta: wrap_angle(observation[0]),
            omega: observation[1].clamp(-self.max_velocity, self.max_velocity),
        })
    }

    fn observe(&self, state: &Self::State) -> Array1<f64> {
        array![state.theta, state.omega]
    }

    fn step(
        &self,
        state: Self::State,
        action: f64,
        _: &mut Prng,
        _: &mut dyn StatsLogger,
    ) -> (Successor<Self::State>, f64) {
        let [theta, omega] = ode::integrate(
            |&[theta, omega]: &[f64; 2]| [omega, self.angular_acceleration(theta, omega, action)],
            [state.theta, state.omega],
            self.time_step,
            self.integration_steps,
        );
        let next = PendulumState {
            theta: wrap_angle(theta),
            omega: omega.clamp(-self.max_velocity, self.max_velocity),
        };
        (Successor::Continue(next), next.theta.cos())
    }

    fn is_goal(&self, state: &Self::State) -> bool {
        wrap_angle(state.theta).abs() < self.goal_angle && state.omega.abs() < self.goal_velocity
    }
}
