//! Policies: mappings from state observations to actions
use crate::regressors::{max_q, Regressor, RegressorError};
use crate::spaces::ActionSpace;
use crate::Prng;
use ndarray::{Array1, Array2, ArrayView1};
use rand::distributions::Distribution;
use rand::Rng;
use rand_distr::StandardNormal;

/// A policy selects an action given a state observation.
pub trait Policy {
    /// Sample an action for the given observation.
    fn draw_action(&self, observation: ArrayView1<f64>, rng: &mut Prng) -> f64;
}

impl<P: Policy + ?Sized> Policy for &'_ P {
    fn draw_action(&self, observation: ArrayView1<f64>, rng: &mut Prng) -> f64 {
        P::draw_action(self, observation, rng)
    }
}

impl<P: Policy + ?Sized> Policy for Box<P> {
    fn draw_action(&self, observation: ArrayView1<f64>, rng: &mut Prng) -> f64 {
        P::draw_action(self, observation, rng)
    }
}

/// Policy that samples actions uniformly at random from an action space.
#[derive(Debug, Clone, PartialEq)]
pub struct RandomPolicy {
    action_space: ActionSpace,
}

impl RandomPolicy {
    pub const fn new(action_space: ActionSpace) -> Self {
        Self { action_space }
    }
}

impl Policy for RandomPolicy {
    fn draw_action(&self, _: ArrayView1<f64>, rng: &mut Prng) -> f64 {
        self.action_space.sample(rng)
    }
}

/// Greedy policy with respect to an action-value regressor over a discrete set of actions.
///
/// The regressor is evaluated on `[observation, action]` rows.
/// Ties go to the earliest action.
#[derive(Debug, Clone, PartialEq)]
pub struct GreedyPolicy<R> {
    q: R,
    actions: Vec<f64>,
}

impl<R: Regressor> GreedyPolicy<R> {
    /// Create a greedy policy from a fitted regressor.
    pub fn new(q: R, actions: Vec<f64>) -> Result<Self, RegressorError> {
        if !q.is_fitted() {
            return Err(RegressorError::NotFitted);
        }
        if actions.is_empty() {
            return Err(RegressorError::EmptyInput);
        }
        Ok(Self { q, actions })
    }

    /// The greedy action of an observation.
    pub fn greedy_action(&self, observation: ArrayView1<f64>) -> Result<f64, RegressorError> {
        greedy_action(&self.q, observation, &self.actions)
    }

    pub fn into_inner(self) -> R {
        self.q
    }
}

/// # Panics
/// If the regressor rejects the observation, for example due to a dimension mismatch.
impl<R: Regressor> Policy for GreedyPolicy<R> {
    fn draw_action(&self, observation: ArrayView1<f64>, _: &mut Prng) -> f64 {
        match self.greedy_action(observation) {
            Ok(action) => action,
            Err(err) => panic!("greedy action selection failed: {}", err),
        }
    }
}

/// The action maximizing `q` at a single observation.
pub(crate) fn greedy_action<R: Regressor + ?Sized>(
    q: &R,
    observation: ArrayView1<f64>,
    actions: &[f64],
) -> Result<f64, RegressorError> {
    let states = observation.insert_axis(ndarray::Axis(0));
    let (_, best) = max_q(q, states, actions)?;
    Ok(best[0])
}

/// Take a uniform random action with probability `epsilon`, otherwise follow `policy`.
#[derive(Debug, Clone, PartialEq)]
pub struct EpsilonGreedy<P> {
    pub policy: P,
    pub action_space: ActionSpace,
    pub epsilon: f64,
}

impl<P> EpsilonGreedy<P> {
    pub const fn new(policy: P, action_space: ActionSpace, epsilon: f64) -> Self {
        Self {
            policy,
            action_space,
            epsilon,
        }
    }
}

impl<P: Policy> Policy for EpsilonGreedy<P> {
    fn draw_action(&self, observation: ArrayView1<f64>, rng: &mut Prng) -> f64 {
        if rng.gen::<f64>() < self.epsilon {
            self.action_space.sample(rng)
        } else {
            self.policy.draw_action(observation, rng)
        }
    }
}

/// Linear-Gaussian policy `u = K x + N(0, S)`.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearGaussianPolicy {
    /// Gain matrix with one row per action dimension.
    pub gain: Array2<f64>,
    /// Standard deviation of the action noise.
    pub noise_stddev: f64,
}

impl LinearGaussianPolicy {
    pub fn new(gain: Array2<f64>, noise_stddev: f64) -> Self {
        Self { gain, noise_stddev }
    }

    /// Scalar policy `u = k x + N(0, variance)` on a one-dimensional state.
    pub fn scalar(k: f64, variance: f64) -> Self {
        Self::new(Array2::from_elem((1, 1), k), variance.max(0.0).sqrt())
    }

    /// The noise-free action `K x`.
    pub fn mean_action(&self, observation: ArrayView1<f64>) -> Array1<f64> {
        self.gain.dot(&observation)
    }
}

impl Policy for LinearGaussianPolicy {
    fn draw_action(&self, observation: ArrayView1<f64>, rng: &mut Prng) -> f64 {
        let mean = self.mean_action(observation)[0];
        if self.noise_stddev > 0.0 {
            let noise: f64 = rng.sample(StandardNormal);
            mean + self.noise_stddev * noise
        } else {
            mean
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regressors::{LinearRegression, LinearRegressionConfig};
    use crate::spaces::{DiscreteValuedSpace, IntervalSpace};
    use ndarray::array;
    use rand::SeedableRng;

    fn fitted_q() -> LinearRegression {
        // Q(s, a) = s * a, approximated with quadratic features
        let x = Array2::from_shape_fn((25, 2), |(i, j)| {
            if j == 0 {
                (i / 5) as f64 - 2.0
            } else {
                (i % 5) as f64 - 2.0
            }
        });
        let y = x.column(0).to_owned() * x.column(1);
        let mut q = LinearRegression::new(LinearRegressionConfig::new(2, 0.0));
        q.fit(x.view(), y.view()).unwrap();
        q
    }

    #[test]
    fn random_policy_in_space() {
        let space: ActionSpace = IntervalSpace::new(-1.0, 2.0).into();
        let policy = RandomPolicy::new(space.clone());
        let mut rng = Prng::seed_from_u64(0);
        for _ in 0..100 {
            let action = policy.draw_action(array![0.0].view(), &mut rng);
            assert!((-1.0..=2.0).contains(&action));
        }
    }

    #[test]
    fn greedy_picks_best_action() {
        let policy = GreedyPolicy::new(fitted_q(), vec![-1.0, 1.0]).unwrap();
        let mut rng = Prng::seed_from_u64(0);
        assert_eq!(policy.draw_action(array![2.0].view(), &mut rng), 1.0);
        assert_eq!(policy.draw_action(array![-2.0].view(), &mut rng), -1.0);
    }

    #[test]
    fn greedy_requires_fitted() {
        assert_eq!(
            GreedyPolicy::new(LinearRegression::default(), vec![0.0]),
            Err(RegressorError::NotFitted)
        );
    }

    #[test]
    fn epsilon_one_is_random() {
        let space: ActionSpace = DiscreteValuedSpace::new(vec![0.0, 1.0]).into();
        let policy = EpsilonGreedy::new(
            GreedyPolicy::new(fitted_q(), vec![1.0]).unwrap(),
            space,
            1.0,
        );
        let mut rng = Prng::seed_from_u64(1);
        let zeros = (0..200)
            .filter(|_| policy.draw_action(array![1.0].view(), &mut rng) == 0.0)
            .count();
        assert!(zeros > 50 && zeros < 150);
    }

    #[test]
    fn epsilon_zero_follows_policy() {
        let space: ActionSpace = DiscreteValuedSpace::new(vec![-1.0, 1.0]).into();
        let policy = EpsilonGreedy::new(
            GreedyPolicy::new(fitted_q(), vec![-1.0, 1.0]).unwrap(),
            space,
            0.0,
        );
        let mut rng = Prng::seed_from_u64(1);
        for _ in 0..20 {
            assert_eq!(policy.draw_action(array![1.5].view(), &mut rng), 1.0);
        }
    }

    #[test]
    fn linear_gaussian_mean() {
        let policy = LinearGaussianPolicy::scalar(-0.5, 0.0);
        let mut rng = Prng::seed_from_u64(0);
        assert_eq!(policy.draw_action(array![4.0].view(), &mut rng), -2.0);
    }

    #[test]
    fn linear_gaussian_noise_statistics() {
        let policy = LinearGaussianPolicy::scalar(1.0, 4.0);
        let mut rng = Prng::seed_from_u64(0);
        let stats: crate::utils::stats::OnlineMeanVariance<f64> = (0..4000)
            .map(|_| policy.draw_action(array![1.0].view(), &mut rng))
            .collect();
        assert!((stats.mean().unwrap() - 1.0).abs() < 0.15);
        assert!((stats.stddev().unwrap() - 2.0).abs() < 0.15);
    }
}
