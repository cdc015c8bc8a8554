//! Environment builder traits and the named benchmark configurations.
use super::{
    Acrobot, AcrobotState, Bicycle, BicycleState, CarOnHill, CarOnHillState, CartPole,
    CartPoleState, EnvError, EnvStructure, Environment, InvertedPendulum, Lqg1d, PendulumState,
    SwingPendulum, Successor,
};
use crate::logging::StatsLogger;
use crate::spaces::{ActionSpace, BoxSpace};
use crate::Prng;
use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Build an [`Environment`].
///
/// # Design Discussion
/// Environment is an associated type rather than a generic parameter so that
/// a given configuration constructs exactly one kind of environment.
pub trait BuildEnv {
    /// Type of environment to build
    type Environment: Environment;

    /// Build an environment instance.
    ///
    /// # Args
    /// * `rng` - Random number generator for randomness in the environment structure.
    fn build_env(&self, rng: &mut Prng) -> Result<Self::Environment, BuildEnvError>;
}

/// Error building an environment
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BuildEnvError {
    #[error("invalid discount factor {0}; must be in [0, 1]")]
    InvalidDiscountFactor(f64),
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

/// Validate parameters shared by all environments.
pub(crate) fn check_common(discount_factor: f64, horizon: u64) -> Result<(), BuildEnvError> {
    if !(0.0..=1.0).contains(&discount_factor) {
        return Err(BuildEnvError::InvalidDiscountFactor(discount_factor));
    }
    if horizon == 0 {
        return Err(BuildEnvError::InvalidParameter {
            name: "horizon",
            reason: "must be positive".into(),
        });
    }
    Ok(())
}

/// Require a strictly positive, finite parameter value.
pub(crate) fn check_positive(name: &'static str, value: f64) -> Result<(), BuildEnvError> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(BuildEnvError::InvalidParameter {
            name,
            reason: format!("must be positive, got {}", value),
        })
    }
}

/// Named benchmark environment configuration.
///
/// Deserializes from an object tagged by `mdpName`, e.g. `{"mdpName": "CarOnHill"}`;
/// all other fields are optional overrides of the environment defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mdpName")]
pub enum MdpConfig {
    CarOnHill(CarOnHill),
    SwingUpPendulum(InvertedPendulum),
    Acrobot(Acrobot),
    BicycleBalancing(Bicycle),
    BicycleNavigate(Bicycle),
    SwingPendulum(SwingPendulum),
    CartPole(CartPole),
    #[serde(rename = "LQG1D")]
    Lqg1d(Lqg1d),
}

impl Default for MdpConfig {
    fn default() -> Self {
        Self::CarOnHill(CarOnHill::default())
    }
}

impl BuildEnv for MdpConfig {
    type Environment = Mdp;

    fn build_env(&self, rng: &mut Prng) -> Result<Mdp, BuildEnvError> {
        Ok(match self {
            Self::CarOnHill(c) => Mdp::CarOnHill(c.build_env(rng)?),
            Self::SwingUpPendulum(c) => Mdp::InvertedPendulum(c.build_env(rng)?),
            Self::Acrobot(c) => Mdp::Acrobot(c.build_env(rng)?),
            Self::BicycleBalancing(c) => Mdp::Bicycle(
                Bicycle {
                    navigate: false,
                    ..c.clone()
                }
                .build_env(rng)?,
            ),
            Self::BicycleNavigate(c) => Mdp::Bicycle(
                Bicycle {
                    navigate: true,
                    ..c.clone()
                }
                .build_env(rng)?,
            ),
            Self::SwingPendulum(c) => Mdp::SwingPendulum(c.build_env(rng)?),
            Self::CartPole(c) => Mdp::CartPole(c.build_env(rng)?),
            Self::Lqg1d(c) => Mdp::Lqg1d(c.build_env(rng)?),
        })
    }
}

/// Any of the benchmark environments.
#[derive(Debug, Clone, PartialEq)]
pub enum Mdp {
    CarOnHill(CarOnHill),
    InvertedPendulum(InvertedPendulum),
    Acrobot(Acrobot),
    Bicycle(Bicycle),
    SwingPendulum(SwingPendulum),
    CartPole(CartPole),
    Lqg1d(Lqg1d),
}

/// State of an [`Mdp`].
#[derive(Debug, Clone, PartialEq)]
pub enum MdpState {
    CarOnHill(CarOnHillState),
    InvertedPendulum(PendulumState),
    Acrobot(AcrobotState),
    Bicycle(BicycleState),
    SwingPendulum(PendulumState),
    CartPole(CartPoleState),
    Lqg1d(f64),
}

/// Forward an expression to the inner environment of every [`Mdp`] variant.
macro_rules! for_each_mdp {
    ($mdp:expr, $env:ident => $body:expr) => {
        match $mdp {
            Mdp::CarOnHill($env) => $body,
            Mdp::InvertedPendulum($env) => $body,
            Mdp::Acrobot($env) => $body,
            Mdp::Bicycle($env) => $body,
            Mdp::SwingPendulum($env) => $body,
            Mdp::CartPole($env) => $body,
            Mdp::Lqg1d($env) => $body,
        }
    };
}

/// Match an [`Mdp`] with a state of the same variant.
macro_rules! with_matching_state {
    ($mdp:expr, $state:expr, $env:ident, $s:ident => $body:expr) => {
        match ($mdp, $state) {
            (Mdp::CarOnHill($env), MdpState::CarOnHill($s)) => {
                $body.map(MdpState::CarOnHill)
            }
            (Mdp::InvertedPendulum($env), MdpState::InvertedPendulum($s)) => {
                $body.map(MdpState::InvertedPendulum)
            }
            (Mdp::Acrobot($env), MdpState::Acrobot($s)) => $body.map(MdpState::Acrobot),
            (Mdp::Bicycle($env), MdpState::Bicycle($s)) => $body.map(MdpState::Bicycle),
            (Mdp::SwingPendulum($env), MdpState::SwingPendulum($s)) => {
                $body.map(MdpState::SwingPendulum)
            }
            (Mdp::CartPole($env), MdpState::CartPole($s)) => $body.map(MdpState::CartPole),
            (Mdp::Lqg1d($env), MdpState::Lqg1d($s)) => $body.map(MdpState::Lqg1d),
            (mdp, state) => panic!("state {:?} does not belong to environment {:?}", state, mdp),
        }
    };
}

impl EnvStructure for Mdp {
    fn observation_space(&self) -> BoxSpace {
        for_each_mdp!(self, env => env.observation_space())
    }
    fn action_space(&self) -> ActionSpace {
        for_each_mdp!(self, env => env.action_space())
    }
    fn reward_range(&self) -> (f64, f64) {
        for_each_mdp!(self, env => env.reward_range())
    }
    fn discount_factor(&self) -> f64 {
        for_each_mdp!(self, env => env.discount_factor())
    }
    fn horizon(&self) -> u64 {
        for_each_mdp!(self, env => env.horizon())
    }
}

/// Mixing states of different variants is a programming error and panics.
impl Environment for Mdp {
    type State = MdpState;

    fn initial_state(&self, rng: &mut Prng) -> MdpState {
        match self {
            Self::CarOnHill(env) => MdpState::CarOnHill(env.initial_state(rng)),
            Self::InvertedPendulum(env) => MdpState::InvertedPendulum(env.initial_state(rng)),
            Self::Acrobot(env) => MdpState::Acrobot(env.initial_state(rng)),
            Self::Bicycle(env) => MdpState::Bicycle(env.initial_state(rng)),
            Self::SwingPendulum(env) => MdpState::SwingPendulum(env.initial_state(rng)),
            Self::CartPole(env) => MdpState::CartPole(env.initial_state(rng)),
            Self::Lqg1d(env) => MdpState::Lqg1d(env.initial_state(rng)),
        }
    }

    fn state_from_observation(&self, observation: ArrayView1<f64>) -> Result<MdpState, EnvError> {
        Ok(match self {
            Self::CarOnHill(env) => MdpState::CarOnHill(env.state_from_observation(observation)?),
            Self::InvertedPendulum(env) => {
                MdpState::InvertedPendulum(env.state_from_observation(observation)?)
            }
            Self::Acrobot(env) => MdpState::Acrobot(env.state_from_observation(observation)?),
            Self::Bicycle(env) => MdpState::Bicycle(env.state_from_observation(observation)?),
            Self::SwingPendulum(env) => {
                MdpState::SwingPendulum(env.state_from_observation(observation)?)
            }
            Self::CartPole(env) => MdpState::CartPole(env.state_from_observation(observation)?),
            Self::Lqg1d(env) => MdpState::Lqg1d(env.state_from_observation(observation)?),
        })
    }

    fn observe(&self, state: &MdpState) -> Array1<f64> {
        match (self, state) {
            (Self::CarOnHill(env), MdpState::CarOnHill(s)) => env.observe(s),
            (Self::InvertedPendulum(env), MdpState::InvertedPendulum(s)) => env.observe(s),
            (Self::Acrobot(env), MdpState::Acrobot(s)) => env.observe(s),
            (Self::Bicycle(env), MdpState::Bicycle(s)) => env.observe(s),
            (Self::SwingPendulum(env), MdpState::SwingPendulum(s)) => env.observe(s),
            (Self::CartPole(env), MdpState::CartPole(s)) => env.observe(s),
            (Self::Lqg1d(env), MdpState::Lqg1d(s)) => env.observe(s),
            (mdp, state) => panic!("state {:?} does not belong to environment {:?}", state, mdp),
        }
    }

    fn step(
        &self,
        state: MdpState,
        action: f64,
        rng: &mut Prng,
        logger: &mut dyn StatsLogger,
    ) -> (Successor<MdpState>, f64) {
        let mut reward = 0.0;
        let successor = with_matching_state!(self, state, env, s => {
            let (successor, r) = env.step(s, action, rng, logger);
            reward = r;
            successor
        });
        (successor, reward)
    }

    fn is_goal(&self, state: &MdpState) -> bool {
        match (self, state) {
            (Self::CarOnHill(env), MdpState::CarOnHill(s)) => env.is_goal(s),
            (Self::InvertedPendulum(env), MdpState::InvertedPendulum(s)) => env.is_goal(s),
            (Self::Acrobot(env), MdpState::Acrobot(s)) => env.is_goal(s),
            (Self::Bicycle(env), MdpState::Bicycle(s)) => env.is_goal(s),
            (Self::SwingPendulum(env), MdpState::SwingPendulum(s)) => env.is_goal(s),
            (Self::CartPole(env), MdpState::CartPole(s)) => env.is_goal(s),
            (Self::Lqg1d(env), MdpState::Lqg1d(s)) => env.is_goal(s),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing;
    use super::*;
    use rand::SeedableRng;
    use rstest::rstest;

    #[rstest]
    #[case(r#"{"mdpName": "CarOnHill"}"#, 2)]
    #[case(r#"{"mdpName": "SwingUpPendulum"}"#, 2)]
    #[case(r#"{"mdpName": "Acrobot"}"#, 4)]
    #[case(r#"{"mdpName": "BicycleBalancing"}"#, 5)]
    #[case(r#"{"mdpName": "BicycleNavigate"}"#, 5)]
    #[case(r#"{"mdpName": "SwingPendulum"}"#, 2)]
    #[case(r#"{"mdpName": "CartPole"}"#, 4)]
    #[case(r#"{"mdpName": "LQG1D"}"#, 1)]
    fn build_named(#[case] json: &str, #[case] state_dim: usize) {
        let config: MdpConfig = serde_json::from_str(json).unwrap();
        let env = config.build_env(&mut Prng::seed_from_u64(0)).unwrap();
        assert_eq!(env.state_dim(), state_dim);
        testing::check_env(&env, 200, 1);
    }

    #[test]
    fn override_fields() {
        let config: MdpConfig =
            serde_json::from_str(r#"{"mdpName": "CarOnHill", "horizon": 10}"#).unwrap();
        let env = config.build_env(&mut Prng::seed_from_u64(0)).unwrap();
        assert_eq!(env.horizon(), 10);
    }

    #[test]
    fn navigate_flag_follows_name() {
        let config: MdpConfig = serde_json::from_str(r#"{"mdpName": "BicycleNavigate"}"#).unwrap();
        match config.build_env(&mut Prng::seed_from_u64(0)).unwrap() {
            Mdp::Bicycle(bicycle) => assert!(bicycle.navigate),
            mdp => panic!("unexpected {:?}", mdp),
        }
    }

    #[test]
    fn unknown_name_is_error() {
        assert!(serde_json::from_str::<MdpConfig>(r#"{"mdpName": "Pong"}"#).is_err());
    }

    #[test]
    fn invalid_discount_rejected() {
        let config = MdpConfig::CarOnHill(CarOnHill {
            discount_factor: 1.5,
            ..CarOnHill::default()
        });
        assert_eq!(
            config.build_env(&mut Prng::seed_from_u64(0)),
            Err(BuildEnvError::InvalidDiscountFactor(1.5))
        );
    }

    #[test]
    #[should_panic]
    fn mismatched_state_panics() {
        let mdp = Mdp::CarOnHill(CarOnHill::default());
        let _ = mdp.observe(&MdpState::Lqg1d(0.0));
    }
}
