use super::builders::{check_common, check_positive};
use super::{
    check_observation, BuildEnv, BuildEnvError, EnvError, EnvStructure, Environment, Successor,
};
use crate::logging::StatsLogger;
use crate::spaces::{ActionSpace, BoxSpace, DiscreteValuedSpace};
use crate::utils::ode;
use crate::Prng;
use ndarray::{array, Array1, ArrayView1};
use rand::distributions::{Distribution, Uniform};
use serde::{Deserialize, Serialize};
use std::f64::consts::FRAC_PI_2;

/// Inverted pendulum balancing environment
///
/// A pendulum is attached by a hinge to a cart that can be pushed left or right.
/// The goal is to keep the pendulum above the horizontal. Falling below the horizontal is
/// absorbing with reward `-1`; every other step has reward `0`.
///
/// As presented in "Least-Squares Policy Iteration" by [Lagoudakis & Parr (2003)][lspi].
///
/// [lspi]: https://www.jmlr.org/papers/v4/lagoudakis03a.html
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InvertedPendulum {
    /// Gravitational acceleration (m/s^2)
    pub gravity: f64,
    /// Mass of the pendulum (kg)
    pub pole_mass: f64,
    /// Mass of the cart (kg)
    pub cart_mass: f64,
    /// Length of the pendulum (m)
    pub pole_length: f64,
    /// Duration of one environment step (s)
    pub time_step: f64,
    /// Number of integration sub-steps per environment step
    pub integration_steps: usize,
    /// Forces (N) applied to the cart
    pub actions: Vec<f64>,
    /// Magnitude of the uniform noise added to the applied force (N)
    pub force_noise: f64,
    /// Bound on the initial angle and angular velocity
    pub initial_noise: f64,
    pub discount_factor: f64,
    pub horizon: u64,
}

impl Default for InvertedPendulum {
    fn default() -> Self {
        Self {
            gravity: 9.8,
            pole_mass: 2.0,
            cart_mass: 8.0,
            pole_length: 0.5,
            time_step: 0.1,
            integration_steps: 10,
            actions: vec![-50.0, 0.0, 50.0],
            force_noise: 10.0,
            initial_noise: 0.1,
            discount_factor: 0.95,
            horizon: 3000,
        }
    }
}

impl BuildEnv for InvertedPendulum {
    type Environment = Self;

    fn build_env(&self, _: &mut Prng) -> Result<Self, BuildEnvError> {
        check_common(self.discount_factor, self.horizon)?;
        check_positive("pole_mass", self.pole_mass)?;
        check_positive("cart_mass", self.cart_mass)?;
        check_positive("pole_length", self.pole_length)?;
        check_positive("time_step", self.time_step)?;
        if self.integration_steps == 0 || self.actions.is_empty() {
            return Err(BuildEnvError::InvalidParameter {
                name: "integration_steps/actions",
                reason: "must be non-empty".into(),
            });
        }
        if !(self.force_noise >= 0.0 && self.initial_noise >= 0.0) {
            return Err(BuildEnvError::InvalidParameter {
                name: "force_noise/initial_noise",
                reason: "must be non-negative".into(),
            });
        }
        Ok(self.clone())
    }
}

/// State of a pendulum: angle from upright and angular velocity.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendulumState {
    /// Angle from vertical (radians)
    pub theta: f64,
    /// Angular velocity (radians / s)
    pub omega: f64,
}

impl InvertedPendulum {
    fn angular_acceleration(&self, theta: f64, omega: f64, force: f64) -> f64 {
        let alpha = (self.pole_mass + self.cart_mass).recip();
        let (sin, cos) = theta.sin_cos();
        let ml = self.pole_mass * self.pole_length;
        (self.gravity * sin - alpha * ml * omega * omega * (2.0 * theta).sin() / 2.0
            - alpha * cos * force)
            / (4.0 * self.pole_length / 3.0 - alpha * ml * cos * cos)
    }
}

impl EnvStructure for InvertedPendulum {
    fn observation_space(&self) -> BoxSpace {
        BoxSpace::from_bounds(&[-FRAC_PI_2, f64::NEG_INFINITY], &[FRAC_PI_2, f64::INFINITY])
    }

    fn action_space(&self) -> ActionSpace {
        DiscreteValuedSpace::new(self.actions.clone()).into()
    }

    fn reward_range(&self) -> (f64, f64) {
        (-1.0, 0.0)
    }

    fn discount_factor(&self) -> f64 {
        self.discount_factor
    }

    fn horizon(&self) -> u64 {
        self.horizon
    }
}

impl Environment for InvertedPendulum {
    type State = PendulumState;

    fn initial_state(&self, rng: &mut Prng) -> Self::State {
        if self.initial_noise == 0.0 {
            return PendulumState {
                theta: 0.0,
                omega: 0.0,
            };
        }
        let dist = Uniform::new_inclusive(-self.initial_noise, self.initial_noise);
        PendulumState {
            theta: dist.sample(rng),
            omega: dist.sample(rng),
        }
    }

    fn state_from_observation(&self, observation: ArrayView1<f64>) -> Result<Self::State, EnvError> {
        check_observation(observation, 2)?;
        Ok(PendulumState {
            theta: observation[0],
            omega: observation[1],
        })
    }

    fn observe(&self, state: &Self::State) -> Array1<f64> {
        array![state.theta, state.omega]
    }

    fn step(
        &self,
        state: Self::State,
        action: f64,
        rng: &mut Prng,
        _: &mut dyn StatsLogger,
    ) -> (Successor<Self::State>, f64) {
        let noise = if self.force_noise > 0.0 {
            Uniform::new_inclusive(-self.force_noise, self.force_noise).sample(rng)
        } else {
            0.0
        };
        let force = action + noise;
        let [theta, omega] = ode::integrate(
            |&[theta, omega]: &[f64; 2]| [omega, self.angular_acceleration(theta, omega, force)],
            [state.theta, state.omega],
            self.time_step,
            self.integration_steps,
        );
        let next = PendulumState { theta, omega };
        if theta.abs() > FRAC_PI_2 {
            (Successor::Terminate(next), -1.0)
        } else {
            (Successor::Continue(next), 0.0)
        }
    }
}
