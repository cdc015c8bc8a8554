use super::builders::{check_common, check_positive};
use super::{
    check_observation, BuildEnv, BuildEnvError, EnvError, EnvStructure, Environment, Successor,
};
use crate::logging::StatsLogger;
use crate::spaces::{ActionSpace, BoxSpace, DiscreteValuedSpace};
use crate::utils::wrap_angle;
use crate::Prng;
use ndarray::{array, Array1, ArrayView1};
use rand::distributions::{Distribution, Uniform};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Maximum absolute handlebar angle (radians).
const MAX_HANDLEBAR_ANGLE: f64 = 1.3963;

/// Bicycle balancing and navigation environment
///
/// The agent controls the torque applied to the handlebars and the displacement of the rider's
/// centre of mass. The bicycle falls when it tilts more than `π / 15` from vertical, which is
/// absorbing with reward `-1`.
///
/// In balancing mode the other steps have reward `0`. In navigation mode (`navigate`) the
/// bicycle must also ride to a goal; each step is rewarded for heading towards it and reaching
/// it is absorbing.
///
/// There are 9 actions, `0..=8`: action `a` applies torque `2 (a / 3 - 1)` and displacement
/// `0.02 (a % 3 - 1)`.
///
/// As presented in "Learning to Drive a Bicycle using Reinforcement Learning and Shaping" by
/// [Randløv & Alstrøm (1998)][randlov].
///
/// [randlov]: https://dl.acm.org/doi/10.5555/645527.757766
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Bicycle {
    /// Whether to ride to the goal rather than only balance.
    pub navigate: bool,
    /// Gravitational acceleration (m/s^2)
    pub gravity: f64,
    /// Horizontal distance between the front tyre contact point and the centre of mass (m)
    pub c: f64,
    /// Vertical distance between the centre of mass of the bicycle and of the rider (m)
    pub d_cm: f64,
    /// Height of the centre of mass over the ground (m)
    pub h: f64,
    /// Distance between the tyre contact points (m)
    pub l: f64,
    /// Mass of the bicycle (kg)
    pub mass_cycle: f64,
    /// Mass of a tyre (kg)
    pub mass_tyre: f64,
    /// Mass of the rider (kg)
    pub mass_person: f64,
    /// Radius of a tyre (m)
    pub radius: f64,
    /// Forward velocity (m/s)
    pub velocity: f64,
    /// Duration of one environment step (s)
    pub time_step: f64,
    /// Magnitude of the uniform noise added to the rider displacement (m)
    pub displacement_noise: f64,
    /// Goal position `[x, y]` (m); the bicycle starts at the origin heading along `+y`.
    pub goal: [f64; 2],
    /// Distance from the goal at which it is reached (m)
    pub goal_radius: f64,
    /// Reward for reaching the goal
    pub goal_reward: f64,
    pub discount_factor: f64,
    pub horizon: u64,
}

impl Default for Bicycle {
    fn default() -> Self {
        Self {
            navigate: false,
            gravity: 9.82,
            c: 0.66,
            d_cm: 0.30,
            h: 0.94,
            l: 1.11,
            mass_cycle: 15.0,
            mass_tyre: 1.7,
            mass_person: 60.0,
            radius: 0.34,
            velocity: 10.0 / 3.6,
            time_step: 0.01,
            displacement_noise: 0.02,
            goal: [1000.0, 0.0],
            goal_radius: 10.0,
            goal_reward: 0.01,
            discount_factor: 0.98,
            horizon: 50000,
        }
    }
}

impl BuildEnv for Bicycle {
    type Environment = Self;

    fn build_env(&self, _: &mut Prng) -> Result<Self, BuildEnvError> {
        check_common(self.discount_factor, self.horizon)?;
        check_positive("h", self.h)?;
        check_positive("l", self.l)?;
        check_positive("mass_cycle", self.mass_cycle)?;
        check_positive("mass_tyre", self.mass_tyre)?;
        check_positive("mass_person", self.mass_person)?;
        check_positive("radius", self.radius)?;
        check_positive("velocity", self.velocity)?;
        check_positive("time_step", self.time_step)?;
        check_positive("goal_radius", self.goal_radius)?;
        if !(self.displacement_noise >= 0.0) {
            return Err(BuildEnvError::InvalidParameter {
                name: "displacement_noise",
                reason: "must be non-negative".into(),
            });
        }
        Ok(self.clone())
    }
}

/// State of the [`Bicycle`] environment.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct BicycleState {
    /// Tilt angle of the bicycle from vertical (radians)
    pub omega: f64,
    pub omega_dot: f64,
    /// Handlebar angle (radians)
    pub theta: f64,
    pub theta_dot: f64,
    /// Back tyre contact point
    pub back: [f64; 2],
    /// Front tyre contact point
    pub front: [f64; 2],
}

impl BicycleState {
    /// Heading angle; `0` when riding along `+y`, increasing counter-clockwise.
    pub fn heading(&self) -> f64 {
        (-(self.front[0] - self.back[0])).atan2(self.front[1] - self.back[1])
    }
}

impl Bicycle {
    /// Largest tilt before the bicycle falls.
    const MAX_TILT: f64 = PI / 15.0;

    /// Heading of the direction from the back tyre to the goal, same convention as
    /// [`BicycleState::heading`].
    fn goal_heading(&self, back: [f64; 2]) -> f64 {
        (-(self.goal[0] - back[0])).atan2(self.goal[1] - back[1])
    }

    /// Angle between the bicycle heading and the direction to the goal.
    fn angle_to_goal(&self, state: &BicycleState) -> f64 {
        wrap_angle(self.goal_heading(state.back) - state.heading())
    }

    fn reached_goal(&self, state: &BicycleState) -> bool {
        let dx = self.goal[0] - state.front[0];
        let dy = self.goal[1] - state.front[1];
        self.navigate && dx.hypot(dy) <= self.goal_radius
    }

    /// Place the bicycle with its back tyre at `back` and the given heading.
    fn with_heading(&self, back: [f64; 2], heading: f64) -> ([f64; 2], [f64; 2]) {
        let (sin, cos) = heading.sin_cos();
        (back, [back[0] - self.l * sin, back[1] + self.l * cos])
    }
}

impl EnvStructure for Bicycle {
    fn observation_space(&self) -> BoxSpace {
        BoxSpace::from_bounds(
            &[-Self::MAX_TILT, f64::NEG_INFINITY, -MAX_HANDLEBAR_ANGLE, f64::NEG_INFINITY, -PI],
            &[Self::MAX_TILT, f64::INFINITY, MAX_HANDLEBAR_ANGLE, f64::INFINITY, PI],
        )
    }

    fn action_space(&self) -> ActionSpace {
        DiscreteValuedSpace::indices(9).into()
    }

    fn reward_range(&self) -> (f64, f64) {
        if self.navigate {
            (-1.0, self.goal_reward.max(4.0 * 0.00004))
        } else {
            (-1.0, 0.0)
        }
    }

    fn discount_factor(&self) -> f64 {
        self.discount_factor
    }

    fn horizon(&self) -> u64 {
        self.horizon
    }
}

impl Environment for Bicycle {
    type State = BicycleState;

    fn initial_state(&self, _: &mut Prng) -> Self::State {
        let (back, front) = self.with_heading([0.0, 0.0], 0.0);
        BicycleState {
            omega: 0.0,
            omega_dot: 0.0,
            theta: 0.0,
            theta_dot: 0.0,
            back,
            front,
        }
    }

    /// The positions are not observed; the bicycle is placed with its back tyre at the origin
    /// and a heading matching the observation.
    fn state_from_observation(&self, observation: ArrayView1<f64>) -> Result<Self::State, EnvError> {
        check_observation(observation, 5)?;
        let back = [0.0, 0.0];
        let heading = if self.navigate {
            wrap_angle(self.goal_heading(back) - observation[4])
        } else {
            observation[4]
        };
        let (back, front) = self.with_heading(back, heading);
        Ok(BicycleState {
            omega: observation[0],
            omega_dot: observation[1],
            theta: observation[2],
            theta_dot: observation[3],
            back,
            front,
        })
    }

    fn observe(&self, state: &Self::State) -> Array1<f64> {
        let psi = if self.navigate {
            self.angle_to_goal(state)
        } else {
            state.heading()
        };
        array![
            state.omega,
            state.omega_dot,
            state.theta,
            state.theta_dot,
            psi
        ]
    }

    fn step(
        &self,
        state: Self::State,
        action: f64,
        rng: &mut Prng,
        _: &mut dyn StatsLogger,
    ) -> (Successor<Self::State>, f64) {
        // Actions are indices 0..=8
        let a = action.round().clamp(0.0, 8.0);
        let torque = 2.0 * ((a / 3.0).floor() - 1.0);
        let mut displacement = 0.02 * (a % 3.0 - 1.0);
        if self.displacement_noise > 0.0 {
            displacement += Uniform::new_inclusive(-self.displacement_noise, self.displacement_noise)
                .sample(rng);
        }

        let total_mass = self.mass_cycle + self.mass_person;
        let inertia_bc = 13.0 / 3.0 * self.mass_cycle * self.h * self.h
            + self.mass_person * (self.h + self.d_cm).powi(2);
        let inertia_dc = self.mass_tyre * self.radius * self.radius;
        let inertia_dv = 1.5 * inertia_dc;
        let inertia_dl = 0.5 * inertia_dc;
        let sigma_dot = self.velocity / self.radius;
        let dt = self.time_step;
        let v = self.velocity;

        let BicycleState {
            mut omega,
            mut omega_dot,
            mut theta,
            mut theta_dot,
            mut back,
            mut front,
        } = state;

        // Inverse turning radii of the front tyre, back tyre and centre of mass
        let (inv_rf, inv_rb, inv_rcm) = if theta == 0.0 {
            (0.0, 0.0, 0.0)
        } else {
            let tan = theta.tan();
            (
                theta.sin().abs() / self.l,
                tan.abs() / self.l,
                ((self.l - self.c).powi(2) + (self.l / tan).powi(2)).sqrt().recip(),
            )
        };

        let phi = omega + (displacement / self.h).atan();
        let omega_ddot = (total_mass * self.h * self.gravity * phi.sin()
            - phi.cos()
                * (inertia_dc * sigma_dot * theta_dot
                    + theta.signum()
                        * v
                        * v
                        * (self.mass_tyre * self.radius * (inv_rf + inv_rb)
                            + total_mass * self.h * inv_rcm)))
            / inertia_bc;
        let theta_ddot = (torque - inertia_dv * omega_dot * sigma_dot) / inertia_dl;

        omega_dot += omega_ddot * dt;
        omega += omega_dot * dt;
        theta_dot += theta_ddot * dt;
        theta += theta_dot * dt;
        if theta.abs() > MAX_HANDLEBAR_ANGLE {
            theta = theta.signum() * MAX_HANDLEBAR_ANGLE;
        }

        // Move the tyre contact points along their instantaneous arcs
        let psi = state.heading();
        let front_dir = psi + theta + (psi + theta).signum() * (v * dt * inv_rf / 2.0).asin();
        let back_dir = psi + psi.signum() * (v * dt * inv_rb / 2.0).asin();
        front[0] -= v * dt * front_dir.sin();
        front[1] += v * dt * front_dir.cos();
        back[0] -= v * dt * back_dir.sin();
        back[1] += v * dt * back_dir.cos();

        // Keep the tyres exactly `l` apart
        let length = (front[0] - back[0]).hypot(front[1] - back[1]);
        if (length - self.l).abs() > 0.01 {
            let scale = (self.l - length) / length;
            back[0] += (back[0] - front[0]) * scale;
            back[1] += (back[1] - front[1]) * scale;
        }

        let next = BicycleState {
            omega,
            omega_dot,
            theta,
            theta_dot,
            back,
            front,
        };

        if omega.abs() > Self::MAX_TILT {
            (Successor::Terminate(next), -1.0)
        } else if self.reached_goal(&next) {
            (Successor::Terminate(next), self.goal_reward)
        } else if self.navigate {
            let psi_goal = self.angle_to_goal(&next);
            (Successor::Continue(next), (4.0 - psi_goal * psi_goal) * 0.00004)
        } else {
            (Successor::Continue(next), 0.0)
        }
    }

    fn is_goal(&self, state: &Self::State) -> bool {
        self.reached_goal(state)
    }
}
