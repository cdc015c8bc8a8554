use super::builders::{check_common, check_positive};
use super::{
    check_observation, BuildEnv, BuildEnvError, EnvError, EnvStructure, Environment, Successor,
};
use crate::logging::StatsLogger;
use crate::spaces::{ActionSpace, BoxSpace, DiscreteValuedSpace};
use crate::utils::{ode, wrap_angle};
use crate::Prng;
use ndarray::{array, Array1, ArrayView1};
use rand::distributions::{Distribution, Uniform};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Acrobot environment
///
/// A two-link underactuated robot arm hangs from a fixed hinge; torque can only be applied at
/// the joint between the links. The goal is to swing the arm up to the inverted position.
/// Reaching a state within distance `1` of the upright rest state is absorbing with reward
/// `1 - distance`; all other steps have reward `0`.
///
/// As presented in "Tree-Based Batch Mode Reinforcement Learning" by [Ernst et al. (2005)][ernst].
///
/// [ernst]: https://www.jmlr.org/papers/v6/ernst05a.html
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Acrobot {
    /// Gravitational acceleration (m/s^2)
    pub gravity: f64,
    /// Mass of the first link (kg)
    pub mass1: f64,
    /// Mass of the second link (kg)
    pub mass2: f64,
    /// Length of the first link (m)
    pub length1: f64,
    /// Length of the second link (m)
    pub length2: f64,
    /// Friction coefficient of the first joint
    pub friction1: f64,
    /// Friction coefficient of the second joint
    pub friction2: f64,
    /// Maximum absolute angular velocity of the first link
    pub max_velocity1: f64,
    /// Maximum absolute angular velocity of the second link
    pub max_velocity2: f64,
    /// Duration of one environment step (s)
    pub time_step: f64,
    /// Number of integration sub-steps per environment step
    pub integration_steps: usize,
    /// Torques (N m) that can be applied at the middle joint
    pub actions: Vec<f64>,
    /// Bound on the initial angle of the first link
    pub initial_angle: f64,
    /// Distance from the upright rest state within which the goal is reached
    pub goal_radius: f64,
    pub discount_factor: f64,
    pub horizon: u64,
}

impl Default for Acrobot {
    fn default() -> Self {
        Self {
            gravity: 9.81,
            mass1: 1.0,
            mass2: 1.0,
            length1: 1.0,
            length2: 1.0,
            friction1: 0.01,
            friction2: 0.01,
            max_velocity1: 4.0 * PI,
            max_velocity2: 9.0 * PI,
            time_step: 0.1,
            integration_steps: 10,
            actions: vec![-5.0, 5.0],
            initial_angle: 2.0,
            goal_radius: 1.0,
            discount_factor: 0.95,
            horizon: 100,
        }
    }
}

impl BuildEnv for Acrobot {
    type Environment = Self;

    fn build_env(&self, _: &mut Prng) -> Result<Self, BuildEnvError> {
        check_common(self.discount_factor, self.horizon)?;
        check_positive("mass1", self.mass1)?;
        check_positive("mass2", self.mass2)?;
        check_positive("length1", self.length1)?;
        check_positive("length2", self.length2)?;
        check_positive("max_velocity1", self.max_velocity1)?;
        check_positive("max_velocity2", self.max_velocity2)?;
        check_positive("time_step", self.time_step)?;
        check_positive("goal_radius", self.goal_radius)?;
        if self.integration_steps == 0 || self.actions.is_empty() {
            return Err(BuildEnvError::InvalidParameter {
                name: "integration_steps/actions",
                reason: "must be non-empty".into(),
            });
        }
        Ok(self.clone())
    }
}

/// State of the [`Acrobot`] environment.
///
/// Angles are `0` when the links hang straight down.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcrobotState {
    /// Angle of the first link from hanging down (radians)
    pub theta1: f64,
    /// Angle of the second link relative to the first (radians)
    pub theta2: f64,
    /// Angular velocity of the first link
    pub omega1: f64,
    /// Angular velocity of the second link
    pub omega2: f64,
}

impl Acrobot {
    /// Time derivative of `[theta1, theta2, omega1, omega2]` under a joint torque.
    fn derivative(&self, y: &[f64; 4], torque: f64) -> [f64; 4] {
        let [theta1, theta2, omega1, omega2] = *y;
        let (m1, m2) = (self.mass1, self.mass2);
        let (l1, l2) = (self.length1, self.length2);
        let g = self.gravity;
        let (sin2, cos2) = theta2.sin_cos();

        let d11 = m1 * l1 * l1 + m2 * (l1 * l1 + l2 * l2 + 2.0 * l1 * l2 * cos2);
        let d22 = m2 * l2 * l2;
        let d12 = m2 * (l2 * l2 + l1 * l2 * cos2);
        let c1 = -m2 * l1 * l2 * omega2 * (2.0 * omega1 + omega2) * sin2;
        let c2 = m2 * l1 * l2 * omega1 * omega1 * sin2;
        let phi2 = m2 * l2 * g * (theta1 + theta2).sin();
        let phi1 = (m1 + m2) * l1 * g * theta1.sin() + phi2;

        let ratio = d12 / d22;
        let alpha1 = (-self.friction1 * omega1
            + ratio * (self.friction2 * omega2 - torque + c2 + phi2)
            - c1
            - phi1)
            / (d11 - ratio * d12);
        let alpha2 = (torque - self.friction2 * omega2 - d12 * alpha1 - c2 - phi2) / d22;
        [omega1, omega2, alpha1, alpha2]
    }

    /// Distance of a state from the upright rest state.
    fn goal_distance(state: &AcrobotState) -> f64 {
        let dtheta1 = wrap_angle(state.theta1 - PI);
        (dtheta1 * dtheta1
            + state.theta2 * state.theta2
            + state.omega1 * state.omega1
            + state.omega2 * state.omega2)
            .sqrt()
    }
}

impl EnvStructure for Acrobot {
    fn observation_space(&self) -> BoxSpace {
        BoxSpace::symmetric(&[PI, PI, self.max_velocity1, self.max_velocity2])
    }

    fn action_space(&self) -> ActionSpace {
        DiscreteValuedSpace::new(self.actions.clone()).into()
    }

    fn reward_range(&self) -> (f64, f64) {
        (0.0, 1.0)
    }

    fn discount_factor(&self) -> f64 {
        self.discount_factor
    }

    fn horizon(&self) -> u64 {
        self.horizon
    }
}

impl Environment for Acrobot {
    type State = AcrobotState;

    fn initial_state(&self, rng: &mut Prng) -> Self::State {
        let theta1 = if self.initial_angle > 0.0 {
            Uniform::new_inclusive(-self.initial_angle, self.initial_angle).sample(rng)
        } else {
            0.0
        };
        AcrobotState {
            theta1,
            theta2: 0.0,
            omega1: 0.0,
            omega2: 0.0,
        }
    }

    fn state_from_observation(&self, observation: ArrayView1<f64>) -> Result<Self::State, EnvError> {
        check_observation(observation, 4)?;
        Ok(AcrobotState {
            theta1: observation[0],
            theta2: observation[1],
            omega1: observation[2],
            omega2: observation[3],
        })
    }

    fn observe(&self, state: &Self::State) -> Array1<f64> {
        array![state.theta1, state.theta2, state.omega1, state.omega2]
    }

    fn step(
        &self,
        state: Self::State,
        action: f64,
        _: &mut Prng,
        _: &mut dyn StatsLogger,
    ) -> (Successor<Self::State>, f64) {
        let [theta1, theta2, omega1, omega2] = ode::integrate(
            |y: &[f64; 4]| self.derivative(y, action),
            [state.theta1, state.theta2, state.omega1, state.omega2],
            self.time_step,
            self.integration_steps,
        );
        let next = AcrobotState {
            theta1: wrap_angle(theta1),
            theta2: wrap_angle(theta2),
            omega1: omega1.clamp(-self.max_velocity1, self.max_velocity1),
            omega2: omega2.clamp(-self.max_velocity2, self.max_velocity2),
        };

        let distance = Self::goal_distance(&next);
        if distance < self.goal_radius {
            (Successor::Terminate(next), 1.0 - distance)
        } else {
            (Successor::Continue(next), 0.0)
        }
    }

    fn is_goal(&self, state: &Self::State) -> bool {
        Self::goal_distance(state) < self.goal_radius
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing;
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn run_default() {
        testing::check_env(&Acrobot::default(), 1000, 0);
    }

    #[test]
    fn hanging_is_equilibrium() {
        let env = Acrobot::default();
        let mut rng = Prng::seed_from_u64(0);
        let state = env
            .state_from_observation(array![0.0, 0.0, 0.0, 0.0].view())
            .unwrap();
        let (next, reward) = env.step(state, 0.0, &mut rng, &mut ());
        assert_eq!(reward, 0.0);
        assert_eq!(next, Successor::Continue(state));
    }

    #[test]
    fn near_upright_reaches_goal() {
        let env = Acrobot::default();
        let mut rng = Prng::seed_from_u64(0);
        let state = env
            .state_from_observation(array![PI - 0.01, 0.0, 0.0, 0.0].view())
            .unwrap();
        assert!(env.is_goal(&state));
        let (next, reward) = env.step(state, 0.0, &mut rng, &mut ());
        assert!(next.is_terminal());
        assert!(reward > 0.0 && reward <= 1.0);
        assert!(env.is_goal(next.state()));
    }

    #[test]
    fn velocities_are_clipped() {
        let env = Acrobot::default();
        let mut rng = Prng::seed_from_u64(0);
        let state = env
            .state_from_observation(array![0.0, 0.0, 100.0, -100.0].view())
            .unwrap();
        let next = env.step(state, 5.0, &mut rng, &mut ()).0.into_state();
        assert!(next.omega1.abs() <= env.max_velocity1);
        assert!(next.omega2.abs() <= env.max_velocity2);
    }

    #[test]
    fn initial_angle_bounded() {
        let env = Acrobot::default();
        let mut rng = Prng::seed_from_u64(5);
        for _ in 0..100 {
            let state = env.initial_state(&mut rng);
            assert!(state.theta1.abs() <= 2.0);
            assert_eq!(state.omega1, 0.0);
        }
    }
}
