use super::builders::{check_common, check_positive};
use super::{
    check_observation, BuildEnv, BuildEnvError, EnvError, EnvStructure, Environment, Successor,
};
use crate::logging::StatsLogger;
use crate::spaces::{ActionSpace, BoxSpace, IntervalSpace};
use crate::Prng;
use ndarray::{array, Array1, ArrayView1};
use rand::distributions::{Distribution, Uniform};
use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

/// One-dimensional linear-quadratic-Gaussian regulator
///
/// Dynamics `x' = clip(a x + b clip(u) + σ ε)` with `ε ~ N(0, 1)` and reward
/// `-(q x² + r u²)`. No state is absorbing.
///
/// The closed-form helpers ([`Lqg1d::compute_p`], [`Lqg1d::compute_j`], etc.) describe
/// linear-Gaussian policies `u = k x + N(0, Σ)` and ignore the state and action clipping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Lqg1d {
    pub a: f64,
    pub b: f64,
    /// State cost coefficient
    pub q: f64,
    /// Action cost coefficient
    pub r: f64,
    /// Standard deviation of the transition noise
    pub sigma_noise: f64,
    /// Maximum absolute state
    pub max_pos: f64,
    /// Maximum absolute action
    pub max_action: f64,
    pub discount_factor: f64,
    pub horizon: u64,
}

impl Default for Lqg1d {
    fn default() -> Self {
        Self {
            a: 1.0,
            b: 1.0,
            q: 0.9,
            r: 0.9,
            sigma_noise: 0.1,
            max_pos: 10.0,
            max_action: 8.0,
            discount_factor: 0.9,
            horizon: 50,
        }
    }
}

impl BuildEnv for Lqg1d {
    type Environment = Self;

    fn build_env(&self, _: &mut Prng) -> Result<Self, BuildEnvError> {
        check_common(self.discount_factor, self.horizon)?;
        check_positive("max_pos", self.max_pos)?;
        check_positive("max_action", self.max_action)?;
        if !(self.sigma_noise >= 0.0 && self.q >= 0.0 && self.r >= 0.0) {
            return Err(BuildEnvError::InvalidParameter {
                name: "sigma_noise/q/r",
                reason: "must be non-negative".into(),
            });
        }
        Ok(self.clone())
    }
}

impl Lqg1d {
    /// Number of Riccati iterations used by [`Lqg1d::compute_optimal_k`].
    const RICCATI_ITERATIONS: usize = 100;

    /// Value coefficient `P` of the linear policy `u = k x`, where `V(x) = -P x²`.
    ///
    /// Returns `f64::INFINITY` if the closed-loop system is not stable under discounting.
    pub fn compute_p(&self, k: f64) -> f64 {
        let closed_loop = self.a + self.b * k;
        let denom = 1.0 - self.discount_factor * closed_loop * closed_loop;
        if denom <= 0.0 {
            return f64::INFINITY;
        }
        (self.q + k * k * self.r) / denom
    }

    /// Optimal linear gain, found by iterating the discounted Riccati equation.
    pub fn compute_optimal_k(&self) -> f64 {
        let gamma = self.discount_factor;
        let (a, b) = (self.a, self.b);
        let mut p = 1.0;
        for _ in 0..Self::RICCATI_ITERATIONS {
            let denom = self.r + gamma * b * b * p;
            p = self.q + gamma * a * a * p - (gamma * a * b * p).powi(2) / denom;
        }
        -gamma * a * b * p / (self.r + gamma * b * b * p)
    }

    /// Constant value offset of the policy `u = k x + N(0, sigma)`.
    fn value_offset(&self, p: f64, sigma: f64) -> f64 {
        let gamma = self.discount_factor;
        (self.r * sigma
            + gamma * p * (self.b * self.b * sigma + self.sigma_noise * self.sigma_noise))
            / (1.0 - gamma)
    }

    /// Expected discounted return of `u = k x + N(0, sigma)` from the initial state `x0`.
    ///
    /// `sigma` is the variance of the policy noise.
    pub fn compute_j_at(&self, k: f64, sigma: f64, x0: f64) -> f64 {
        let p = self.compute_p(k);
        -(p * x0 * x0 + self.value_offset(p, sigma))
    }

    /// Expected discounted return of `u = k x + N(0, sigma)` from a uniform initial state.
    pub fn compute_j(&self, k: f64, sigma: f64) -> f64 {
        let p = self.compute_p(k);
        // E[x0²] for x0 ~ U(-max_pos, max_pos)
        let second_moment = self.max_pos * self.max_pos / 3.0;
        -(p * second_moment + self.value_offset(p, sigma))
    }

    /// Action value of `(x, u)` followed by the policy `u = k x + N(0, sigma)`.
    pub fn compute_q_function(&self, x: f64, u: f64, k: f64, sigma: f64) -> f64 {
        let p = self.compute_p(k);
        let mean_next = self.a * x + self.b * u;
        let expected_value =
            p * (mean_next * mean_next + self.sigma_noise * self.sigma_noise)
                + self.value_offset(p, sigma);
        -self.q * x * x - self.r * u * u - self.discount_factor * expected_value
    }
}

impl EnvStructure for Lqg1d {
    fn observation_space(&self) -> BoxSpace {
        BoxSpace::symmetric(&[self.max_pos])
    }

    fn action_space(&self) -> ActionSpace {
        IntervalSpace::symmetric(self.max_action).into()
    }

    fn reward_range(&self) -> (f64, f64) {
        let worst = self.q * self.max_pos * self.max_pos
            + self.r * self.max_action * self.max_action;
        (-worst, 0.0)
    }

    fn discount_factor(&self) -> f64 {
        self.discount_factor
    }

    fn horizon(&self) -> u64 {
        self.horizon
    }
}

impl Environment for Lqg1d {
    type State = f64;

    fn initial_state(&self, rng: &mut Prng) -> f64 {
        Uniform::new_inclusive(-self.max_pos, self.max_pos).sample(rng)
    }

    fn state_from_observation(&self, observation: ArrayView1<f64>) -> Result<f64, EnvError> {
        check_observation(observation, 1)?;
        Ok(observation[0].clamp(-self.max_pos, self.max_pos))
    }

    fn observe(&self, state: &f64) -> Array1<f64> {
        array![*state]
    }

    fn step(
        &self,
        state: f64,
        action: f64,
        rng: &mut Prng,
        _: &mut dyn StatsLogger,
    ) -> (Successor<f64>, f64) {
        let u = action.clamp(-self.max_action, self.max_action);
        let noise: f64 = rng.sample(StandardNormal);
        let next = (self.a * state + self.b * u + self.sigma_noise * noise)
            .clamp(-self.max_pos, self.max_pos);
        let reward = -(self.q * state * state + self.r * u * u);
        (Successor::Continue(next), reward)
    }
}
