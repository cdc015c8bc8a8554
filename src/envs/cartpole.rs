use super::builders::{check_common, check_positive};
use super::{
    check_observation, BuildEnv, BuildEnvError, EnvError, EnvStructure, Environment, Successor,
};
use crate::logging::StatsLogger;
use crate::spaces::{ActionSpace, BoxSpace, DiscreteValuedSpace};
use crate::Prng;
use ndarray::{array, Array1, ArrayView1};
use rand::distributions::{Distribution, Uniform};
use serde::{Deserialize, Serialize};

/// Configuration for the [`CartPole`] environment.
#[derive(Debug, Default, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CartPoleConfig {
    /// Physics configuration
    pub physics: PhysicalConstants,
    /// Environment configuration
    pub params: EnvironmentParams,
}

/// Cart-Pole environment
///
/// Consists of a simulated cart on a track with a vertical pole attached by a hinge on the top.
/// The goal is to keep the pole upright by applying left (action `0`) and right (action `1`)
/// forces to the cart.
///
/// The environment is based on [Barto et al. (1983)][barto1983] with updated dynamics equations
/// from [Florian (2005)][florian2005], who corrects the friction term.
/// The default dynamics constants are based on the [OpenAI Gym][gym_cartpole] CartPole
/// environment.
///
/// [barto1983]: https://ieeexplore.ieee.org/document/6313077
/// [florian2005]: https://coneural.org/florian/papers/05_cart_pole.pdf
/// [gym_cartpole]: https://gym.openai.com/envs/CartPole-v0/
#[derive(Debug, Default, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "CartPoleConfig", into = "CartPoleConfig")]
pub struct CartPole {
    phys: InternalPhysicalConstants,
    env: EnvironmentParams,
}

impl CartPole {
    pub fn new(phys: PhysicalConstants, env: EnvironmentParams) -> Self {
        Self {
            phys: phys.into(),
            env,
        }
    }
}

impl From<CartPoleConfig> for CartPole {
    fn from(config: CartPoleConfig) -> Self {
        Self::new(config.physics, config.params)
    }
}

impl From<CartPole> for CartPoleConfig {
    fn from(env: CartPole) -> Self {
        Self {
            physics: env.phys.c,
            params: env.env,
        }
    }
}

impl BuildEnv for CartPole {
    type Environment = Self;

    fn build_env(&self, _: &mut Prng) -> Result<Self, BuildEnvError> {
        check_common(self.env.discount_factor, self.env.horizon)?;
        check_positive("mass_cart", self.phys.c.mass_cart)?;
        check_positive("mass_pole", self.phys.c.mass_pole)?;
        check_positive("length_half_pole", self.phys.c.length_half_pole)?;
        check_positive("time_step", self.phys.c.time_step)?;
        Ok(*self)
    }
}

/// Direction of the force applied to the cart.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
enum Push {
    Left,
    Right,
}

impl Push {
    /// Action `0` pushes left; any larger action value pushes right.
    fn from_action(action: f64) -> Self {
        if action < 0.5 {
            Self::Left
        } else {
            Self::Right
        }
    }
}

impl EnvStructure for CartPole {
    fn observation_space(&self) -> BoxSpace {
        BoxSpace::from_bounds(
            &[-self.env.max_pos, f64::NEG_INFINITY, -self.env.max_angle, f64::NEG_INFINITY],
            &[self.env.max_pos, f64::INFINITY, self.env.max_angle, f64::INFINITY],
        )
    }

    fn action_space(&self) -> ActionSpace {
        DiscreteValuedSpace::indices(2).into()
    }

    fn reward_range(&self) -> (f64, f64) {
        (0.0, 1.0)
    }

    fn discount_factor(&self) -> f64 {
        self.env.discount_factor
    }

    fn horizon(&self) -> u64 {
        self.env.horizon
    }
}

impl Environment for CartPole {
    type State = CartPoleState;

    fn initial_state(&self, rng: &mut Prng) -> Self::State {
        // All parameters are sampled from the same range of values
        let dist = Uniform::new_inclusive(-0.05, 0.05);
        CartPoleState {
            physical: CartPolePhysicalState {
                cart_position: dist.sample(rng),
                cart_velocity: dist.sample(rng),
                pole_angle: dist.sample(rng),
                pole_angular_velocity: dist.sample(rng),
            },
            cached_normal_velocity_is_positive: true,
        }
    }

    fn state_from_observation(&self, observation: ArrayView1<f64>) -> Result<Self::State, EnvError> {
        check_observation(observation, 4)?;
        Ok(CartPoleState {
            physical: CartPolePhysicalState {
                cart_position: observation[0],
                cart_velocity: observation[1],
                pole_angle: observation[2],
                pole_angular_velocity: observation[3],
            },
            cached_normal_velocity_is_positive: true,
        })
    }

    fn observe(&self, state: &Self::State) -> Array1<f64> {
        let phys = &state.physical;
        array![
            phys.cart_position,
            phys.cart_velocity,
            phys.pole_angle,
            phys.pole_angular_velocity
        ]
    }

    fn step(
        &self,
        state: Self::State,
        action: f64,
        _: &mut Prng,
        _: &mut dyn StatsLogger,
    ) -> (Successor<Self::State>, f64) {
        let applied_force = match Push::from_action(action) {
            Push::Left => -self.env.action_force,
            Push::Right => self.env.action_force,
        };
        let next_state = self.phys.next_state(&state, applied_force);
        let reward = 1.0;
        let terminal = next_state.physical.cart_position.abs() > self.env.max_pos
            || next_state.physical.pole_angle.abs() > self.env.max_angle;
        // Leaving the bounds is absorbing: all future rewards are 0.
        let successor = if terminal {
            Successor::Terminate(next_state)
        } else {
            Successor::Continue(next_state)
        };
        (successor, reward)
    }
}

/// Physical constants for the [`CartPole`] environment.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicalConstants {
    /// Downward force of gravity (m/s^2)
    pub gravity: f64,
    /// Mass of the cart (kg)
    pub mass_cart: f64,
    /// Mass of the pole (kg)
    pub mass_pole: f64,
    /// Half the length of the pole (m)
    pub length_half_pole: f64,
    /// Coefficient of friction between the cart and the track (unitless).
    ///
    /// The track is assumed to fully confine the cart in the vertical direction and this same
    /// friction coefficient applies whether the normal force of the cart is up or down.
    pub friction_cart: f64,
    /// Coefficient of friction between the pole and the cart at the hinge (unitless).
    pub friction_pole: f64,
    /// Simulation time step (s)
    pub time_step: f64,
}

impl Default for PhysicalConstants {
    fn default() -> Self {
        // Defaults (other than friction) from the OpenAI CartPole environment
        Self {
            gravity: 9.8,
            mass_cart: 1.0,
            mass_pole: 0.1,
            length_half_pole: 0.5,
            friction_cart: 0.01,
            friction_pole: 0.01,
            time_step: 0.02,
        }
    }
}

/// Parameters for [`CartPole`] as a reinforcement learning environment.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentParams {
    /// Magnitude of the force (N) applied by actions.
    pub action_force: f64,
    /// Maximum absolute position (meters) before the episode is ended.
    pub max_pos: f64,
    /// Maximum absolute pole angle from vertical (radians) before the episode is ended.
    pub max_angle: f64,
    pub discount_factor: f64,
    /// Maximum episode length.
    pub horizon: u64,
}

impl Default for EnvironmentParams {
    fn default() -> Self {
        Self {
            action_force: 10.0,
            max_pos: 2.4,
            max_angle: 12.0f64.to_radians(), // 12 degrees
            discount_factor: 0.99,
            horizon: 400,
        }
    }
}

/// Internal cart-pole constants with pre-computed common values.
#[derive(Debug, Copy, Clone, PartialEq)]
struct InternalPhysicalConstants {
    /// Fundamental constants
    c: PhysicalConstants,
    /// Gravitational weight of the combined system (N): `gravity * (mass_cart + mass_pole)`.
    total_weight: f64,
    /// `1 / (mass_cart + mass_pole)`,
    inv_total_mass: f64,
    /// `mass_pole * length_half_pole`
    mass_length_pole: f64,
}

impl Default for InternalPhysicalConstants {
    fn default() -> Self {
        PhysicalConstants::default().into()
    }
}

impl From<PhysicalConstants> for InternalPhysicalConstants {
    fn from(c: PhysicalConstants) -> Self {
        let total_mass = c.mass_cart + c.mass_pole;
        Self {
            c,
            total_weight: c.gravity * total_mass,
            inv_total_mass: total_mass.recip(),
            mass_length_pole: c.mass_pole * c.length_half_pole,
        }
    }
}

/// Physical state of the [`CartPole`] environment.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartPolePhysicalState {
    /// Cart position from the track midpoint (m).
    pub cart_position: f64,
    /// Cart velocity (m/s).
    pub cart_velocity: f64,
    /// Angle of the pole from vertical (radians).
    pub pole_angle: f64,
    /// Pole angular velocity about the hinge (radians / s).
    pub pole_angular_velocity: f64,
}

/// State of the [`CartPole`] environment.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartPoleState {
    /// Physical state.
    pub physical: CartPolePhysicalState,

    /// Cached sign of `normal_force * cart_velocity`.
    ///
    /// The dynamics equations are circular in this term. The value from the previous time step
    /// is used and if the result is self-inconsistent then the negated value is used.
    cached_normal_velocity_is_positive: bool,
}

impl InternalPhysicalConstants {
    /// Simulate the state for one time step with an applied force on the cart (in N).
    fn next_state(&self, state: &CartPoleState, applied_force: f64) -> CartPoleState {
        // Reference:
        // "Correct equations for the dynamics of the cart-pole system" by Florian (2005)
        let phys = &state.physical;

        let mut signed_cart_friction = if state.cached_normal_velocity_is_positive {
            self.c.friction_cart
        } else {
            -self.c.friction_cart
        };
        let (sin_angle, cos_angle) = phys.pole_angle.sin_cos();
        let angular_velocity_squared = phys.pole_angular_velocity * phys.pole_angular_velocity;

        let mut angular_acceleration = self.angular_acceleration(
            phys,
            applied_force,
            signed_cart_friction,
            angular_velocity_squared,
            sin_angle,
            cos_angle,
        );
        let mut normal_force = self.normal_force(
            angular_acceleration,
            angular_velocity_squared,
            sin_angle,
            cos_angle,
        );
        let normal_velocity_is_positive = (normal_force * phys.cart_velocity).is_sign_positive();

        if normal_velocity_is_positive != state.cached_normal_velocity_is_positive {
            signed_cart_friction = -signed_cart_friction;
            angular_acceleration = self.angular_acceleration(
                phys,
                applied_force,
                signed_cart_friction,
                angular_velocity_squared,
                sin_angle,
                cos_angle,
            );
            normal_force = self.normal_force(
                angular_acceleration,
                angular_velocity_squared,
                sin_angle,
                cos_angle,
            );
        }

        // Horizontal acceleration of the cart (m/s^2)
        let force_pole = self.mass_length_pole
            * (angular_velocity_squared * sin_angle + angular_acceleration * cos_angle);
        let force_friction = -signed_cart_friction * normal_force;
        let net_force = applied_force + force_pole + force_friction;
        let cart_acceleration = net_force * self.inv_total_mass;

        // Semi-implicit euler integration
        let cart_velocity = phys.cart_velocity + self.c.time_step * cart_acceleration;
        let cart_position = phys.cart_position + self.c.time_step * cart_velocity;
        let pole_angular_velocity =
            phys.pole_angular_velocity + self.c.time_step * angular_acceleration;
        let pole_angle = phys.pole_angle + self.c.time_step * phys.pole_angular_velocity;

        CartPoleState {
            physical: CartPolePhysicalState {
                cart_velocity,
                cart_position,
                pole_angular_velocity,
                pole_angle,
            },
            cached_normal_velocity_is_positive: normal_velocity_is_positive,
        }
    }

    /// The pole angular acceleration
    ///
    /// # Args
    /// * `applied_force`            - Applied horizontal force on the cart (N).
    /// * `signed_cart_friction`     - `friction_cart * sign(normal_force * cart_velocity)`
    /// * `angular_velocity_squared` - `pole_angular_velocity ** 2`
    /// * `sin_angle`                - `sin(pole_angle)`.
    /// * `cos_angle`                - `cos(pole_angle)`.
    fn angular_acceleration(
        &self,
        state: &CartPolePhysicalState,
        applied_force: f64,
        signed_cart_friction: f64,
        angular_velocity_squared: f64,
        sin_angle: f64,
        cos_angle: f64,
    ) -> f64 {
        // Equation (21) of Florian (2005) as numerator / denominator
        let alpha = (-applied_force
            - self.mass_length_pole
                * angular_velocity_squared
                * (sin_angle + signed_cart_friction * cos_angle))
            * self.inv_total_mass;
        let beta = self.c.friction_pole * state.pole_angular_velocity / self.mass_length_pole;
        let numerator = self.c.gravity * sin_angle
            + cos_angle * (alpha + self.c.gravity * signed_cart_friction)
            - beta;

        let denominator = self.c.length_half_pole
            * (4.0 / 3.0
                - self.c.mass_pole
                    * cos_angle
                    * self.inv_total_mass
                    * (cos_angle - signed_cart_friction));
        numerator / denominator
    }

    /// Normal force of the cart against the track (N).
    ///
    /// Positive for downward normal force and negative for upward.
    fn normal_force(
        &self,
        angular_acceleration: f64,
        angular_velocity_squared: f64,
        sin_angle: f64,
        cos_angle: f64,
    ) -> f64 {
        self.total_weight
            - self.mass_length_pole
                * (angular_acceleration * sin_angle + angular_velocity_squared * cos_angle)
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing;
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn run_default() {
        testing::check_env(&CartPole::default(), 1000, 0);
    }

    #[test]
    fn push_direction() {
        let env = CartPole::default();
        let mut rng = Prng::seed_from_u64(0);
        let state = env.state_from_observation(array![0.0, 0.0, 0.0, 0.0].view()).unwrap();
        let (left, _) = env.step(state, 0.0, &mut rng, &mut ());
        let (right, _) = env.step(state, 1.0, &mut rng, &mut ());
        assert!(left.state().physical.cart_velocity < 0.0);
        assert!(right.state().physical.cart_velocity > 0.0);
    }

    #[test]
    fn pole_falls_without_balance() {
        let env = CartPole::default();
        let mut rng = Prng::seed_from_u64(0);
        let mut state = env.state_from_observation(array![0.0, 0.0, 0.1, 0.0].view()).unwrap();
        let mut steps = 0;
        loop {
            let (next, reward) = env.step(state, 1.0, &mut rng, &mut ());
            assert_eq!(reward, 1.0);
            steps += 1;
            match next {
                Successor::Continue(s) => state = s,
                Successor::Terminate(s) => {
                    assert!(s.physical.pole_angle.abs() > env.env.max_angle
                        || s.physical.cart_position.abs() > env.env.max_pos);
                    break;
                }
            }
            assert!(steps < 1000, "episode did not terminate");
        }
    }

    #[test]
    fn config_round_trip() {
        let env = CartPole::default();
        let json = serde_json::to_string(&env).unwrap();
        let restored: CartPole = serde_json::from_str(&json).unwrap();
        assert_eq!(env, restored);
    }
}
