//! Monte-Carlo policy evaluation
use crate::dataset::split_count;
use crate::envs::{EnvError, Environment, Successor};
use crate::logging::StatsLogger;
use crate::policy::Policy;
use crate::utils::stats::OnlineMeanVariance;
use crate::Prng;
use ndarray::{ArrayView1, ArrayView2, Axis};
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use thiserror::Error;

/// Episode performance measure.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Metric {
    /// Discounted return `Σ γᵗ rₜ`.
    Discounted,
    /// Mean reward per step (undiscounted).
    Average,
}

impl Default for Metric {
    fn default() -> Self {
        Self::Discounted
    }
}

/// Configuration for [`evaluate_policy`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    pub metric: Metric,
    /// Number of episodes when no initial states are given.
    pub n_episodes: usize,
    /// Number of worker threads; `1` evaluates in the calling thread.
    pub num_threads: usize,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            metric: Metric::Discounted,
            n_episodes: 1,
            num_threads: 1,
        }
    }
}

impl EvaluationConfig {
    /// Use one worker thread per logical CPU.
    #[must_use]
    pub fn with_all_cpus(mut self) -> Self {
        self.num_threads = num_cpus::get();
        self
    }
}

/// Error evaluating a policy.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvaluationError {
    #[error("no episodes to evaluate")]
    NoEpisodes,
    #[error("invalid initial state in row {row}: {source}")]
    InitialState { row: usize, source: EnvError },
}

/// Result of a single episode.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct EpisodeOutcome {
    /// Episode performance according to the metric.
    pub value: f64,
    /// Number of steps taken.
    pub steps: u64,
    /// Whether a goal state was reached.
    pub goal_reached: bool,
}

/// Summary of a policy evaluation.
///
/// Confidence values are half-widths of approximate 95% confidence intervals, `2 σ / √n`.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyEvaluation {
    pub mean: f64,
    pub confidence: f64,
    pub steps_mean: f64,
    pub steps_confidence: f64,
    /// Fraction of episodes that reached a goal state.
    pub goal_rate: f64,
}

/// Run one episode from `initial_state` until reaching an absorbing state or the horizon.
pub fn run_episode<E, P>(
    env: &E,
    policy: &P,
    initial_state: E::State,
    metric: Metric,
    rng: &mut Prng,
    logger: &mut dyn StatsLogger,
) -> EpisodeOutcome
where
    E: Environment + ?Sized,
    P: Policy + ?Sized,
{
    let gamma = match metric {
        Metric::Discounted => env.discount_factor(),
        Metric::Average => 1.0,
    };
    let horizon = env.horizon();
    let mut state = initial_state;
    let mut value = 0.0;
    let mut discount = 1.0;
    let mut steps = 0;
    let mut goal_reached = false;
    while steps < horizon {
        let action = policy.draw_action(env.observe(&state).view(), rng);
        let (successor, reward) = env.step(state, action, rng, logger);
        value += discount * reward;
        discount *= gamma;
        steps += 1;
        goal_reached |= env.is_goal(successor.state());
        match successor {
            Successor::Continue(next) => state = next,
            Successor::Terminate(_) => break,
        }
    }
    if metric == Metric::Average && steps > 0 {
        value /= steps as f64;
    }
    EpisodeOutcome {
        value,
        steps,
        goal_reached,
    }
}

/// Running statistics of episode outcomes.
#[derive(Debug, Default, Copy, Clone, PartialEq)]
struct OutcomeStats {
    values: OnlineMeanVariance<f64>,
    steps: OnlineMeanVariance<f64>,
    goals: u64,
}

impl OutcomeStats {
    fn push(&mut self, outcome: &EpisodeOutcome) {
        self.values.push(outcome.value);
        self.steps.push(outcome.steps as f64);
        self.goals += u64::from(outcome.goal_reached);
    }

    fn merge(&mut self, other: &Self) {
        self.values.merge(&other.values);
        self.steps.merge(&other.steps);
        self.goals += other.goals;
    }

    fn summary(&self) -> Option<PolicyEvaluation> {
        Some(PolicyEvaluation {
            mean: self.values.mean()?,
            confidence: self.values.confidence_95()?,
            steps_mean: self.steps.mean()?,
            steps_confidence: self.steps.confidence_95()?,
            goal_rate: self.goals as f64 / self.values.count() as f64,
        })
    }
}

/// Run episodes from the given initial states (or sampled ones) in the current thread.
fn evaluate_serial<E, P>(
    env: &E,
    policy: &P,
    metric: Metric,
    initial_states: EpisodeStarts<E::State>,
    rng: &mut Prng,
    logger: &mut dyn StatsLogger,
) -> OutcomeStats
where
    E: Environment + ?Sized,
    P: Policy + ?Sized,
{
    let mut stats = OutcomeStats::default();
    match initial_states {
        EpisodeStarts::Given(states) => {
            for state in states {
                stats.push(&run_logged_episode(env, policy, state, metric, rng, logger));
            }
        }
        EpisodeStarts::Sampled(n) => {
            for _ in 0..n {
                let state = env.initial_state(rng);
                stats.push(&run_logged_episode(env, policy, state, metric, rng, logger));
            }
        }
    }
    stats
}

fn run_logged_episode<E, P>(
    env: &E,
    policy: &P,
    state: E::State,
    metric: Metric,
    rng: &mut Prng,
    logger: &mut dyn StatsLogger,
) -> EpisodeOutcome
where
    E: Environment + ?Sized,
    P: Policy + ?Sized,
{
    let outcome = run_episode(env, policy, state, metric, rng, logger);
    logger.log_scalar("episode_value", outcome.value);
    logger.log_scalar("episode_length", outcome.steps as f64);
    outcome
}

/// Initial states of a block of episodes.
#[derive(Debug)]
enum EpisodeStarts<S> {
    Given(Vec<S>),
    Sampled(usize),
}

impl<S> EpisodeStarts<S> {
    fn len(&self) -> usize {
        match self {
            Self::Given(states) => states.len(),
            Self::Sampled(n) => *n,
        }
    }

    /// Divide into `parts` contiguous blocks.
    fn split(self, parts: usize) -> Vec<Self> {
        let total = self.len();
        match self {
            Self::Given(states) => {
                let mut states = states.into_iter();
                (0..parts)
                    .map(|i| Self::Given(states.by_ref().take(split_count(total, parts, i)).collect()))
                    .collect()
            }
            Self::Sampled(_) => (0..parts)
                .map(|i| Self::Sampled(split_count(total, parts, i)))
                .collect(),
        }
    }
}

/// Evaluate a policy by Monte-Carlo simulation.
///
/// With `initial_states`, one episode is run from each row; otherwise `config.n_episodes`
/// episodes are run from sampled initial states. Episodes are divided into contiguous blocks
/// across `config.num_threads` worker threads, each with its own generator derived from `rng`.
pub fn evaluate_policy<E, P>(
    env: &E,
    policy: &P,
    config: &EvaluationConfig,
    initial_states: Option<ArrayView2<f64>>,
    rng: &mut Prng,
    logger: &mut dyn StatsLogger,
) -> Result<PolicyEvaluation, EvaluationError>
where
    E: Environment + Sync + ?Sized,
    P: Policy + Sync + ?Sized,
{
    let start = Instant::now();
    let starts = match initial_states {
        Some(states) => EpisodeStarts::Given(
            states
                .axis_iter(Axis(0))
                .enumerate()
                .map(|(row, observation)| {
                    env.state_from_observation(observation)
                        .map_err(|source| EvaluationError::InitialState { row, source })
                })
                .collect::<Result<_, _>>()?,
        ),
        None => EpisodeStarts::Sampled(config.n_episodes),
    };
    let n_episodes = starts.len();
    if n_episodes == 0 {
        return Err(EvaluationError::NoEpisodes);
    }
    let num_threads = config.num_threads.clamp(1, n_episodes);

    let stats = if num_threads == 1 {
        evaluate_serial(env, policy, config.metric, starts, rng, logger)
    } else {
        let mut worker_rngs: Vec<_> = (0..num_threads)
            .map(|_| Prng::from_rng(&mut *rng).expect("Prng should be infallible"))
            .collect();

        // Only the first worker logs
        let mut worker0_logger = (&mut *logger).with_scope("worker0");
        let mut send_logger = Some(&mut worker0_logger as &mut dyn StatsLogger);

        crossbeam::scope(|scope| {
            let mut threads = Vec::new();
            for (block, worker_rng) in starts.split(num_threads).into_iter().zip(&mut worker_rngs) {
                let thread_logger = send_logger.take();
                threads.push(scope.spawn(move |_scope| {
                    evaluate_serial(
                        env,
                        policy,
                        config.metric,
                        block,
                        worker_rng,
                        thread_logger.unwrap_or(&mut ()),
                    )
                }));
            }
            threads
                .into_iter()
                .fold(OutcomeStats::default(), |mut stats, t| {
                    stats.merge(&t.join().unwrap());
                    stats
                })
        })
        .unwrap()
    };

    let evaluation = stats.summary().ok_or(EvaluationError::NoEpisodes)?;
    logger.log_scalar("value_mean", evaluation.mean);
    logger.log_scalar("value_confidence", evaluation.confidence);
    logger.log_scalar("steps_mean", evaluation.steps_mean);
    logger.log_duration("eval_time", start.elapsed());
    Ok(evaluation)
}

/// Monte-Carlo estimate of the action value `Q(state, action)` under `policy`.
///
/// Each of `n_rep` rollouts takes `action` from `state` and then follows `policy` for up to
/// `ep_length` further steps, stopping early at an absorbing state.
///
/// # Returns
/// The mean discounted return and its confidence half-width `2 σ / √n`.
pub fn estimate_q_value<E, P>(
    env: &E,
    state: &E::State,
    action: f64,
    policy: &P,
    ep_length: u64,
    n_rep: usize,
    rng: &mut Prng,
) -> Result<(f64, f64), EvaluationError>
where
    E: Environment + ?Sized,
    P: Policy + ?Sized,
{
    let gamma = env.discount_factor();
    let mut returns = OnlineMeanVariance::new();
    for _ in 0..n_rep {
        let (mut successor, reward) = env.step(state.clone(), action, rng, &mut ());
        let mut total = reward;
        let mut discount = gamma;
        for _ in 0..ep_length {
            let current = match successor {
                Successor::Continue(s) => s,
                Successor::Terminate(_) => break,
            };
            let a = policy.draw_action(env.observe(&current).view(), rng);
            let (next, reward) = env.step(current, a, rng, &mut ());
            total += discount * reward;
            discount *= gamma;
            successor = next;
        }
        returns.push(total);
    }
    match (returns.mean(), returns.confidence_95()) {
        (Some(mean), Some(confidence)) => Ok((mean, confidence)),
        _ => Err(EvaluationError::NoEpisodes),
    }
}

/// Evaluate from a single observed initial state; a convenience for plotting value curves.
pub fn evaluate_from<E, P>(
    env: &E,
    policy: &P,
    observation: ArrayView1<f64>,
    metric: Metric,
    rng: &mut Prng,
) -> Result<EpisodeOutcome, EnvError>
where
    E: Environment + ?Sized,
    P: Policy + ?Sized,
{
    let state = env.state_from_observation(observation)?;
    Ok(run_episode(env, policy, state, metric, rng, &mut ()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envs::{CarOnHill, EnvStructure, Lqg1d};
    use crate::policy::{LinearGaussianPolicy, RandomPolicy};
    use ndarray::array;
    use rstest::rstest;

    /// Always push along the velocity
    struct Pump;

    impl Policy for Pump {
        fn draw_action(&self, observation: ArrayView1<f64>, _: &mut Prng) -> f64 {
            if observation[1] >= 0.0 {
                4.0
            } else {
                -4.0
            }
        }
    }

    #[test]
    fn deterministic_episode_value() {
        // Falls off the left edge: a single -1 reward at the last step
        let env = CarOnHill::default();
        let mut rng = Prng::seed_from_u64(0);
        let state = env.initial_state(&mut rng);
        let outcome = run_episode(&env, &Pump, state, Metric::Discounted, &mut rng, &mut ());
        assert!(outcome.steps < env.horizon());
        let expected = -env.discount_factor().powi(outcome.steps as i32 - 1);
        assert!((outcome.value - expected).abs() < 1e-12);
        assert!(!outcome.goal_reached);
    }

    #[test]
    fn average_metric_divides_by_steps() {
        let env = CarOnHill::default();
        let mut rng = Prng::seed_from_u64(0);
        let state = env.initial_state(&mut rng);
        let outcome = run_episode(&env, &Pump, state, Metric::Average, &mut rng, &mut ());
        assert!((outcome.value + 1.0 / outcome.steps as f64).abs() < 1e-12);
    }

    #[test]
    fn zero_horizon_average_is_zero() {
        let env = Lqg1d {
            horizon: 0,
            ..Lqg1d::default()
        };
        let policy = LinearGaussianPolicy::scalar(-0.5, 0.0);
        let outcome = run_episode(
            &env,
            &policy,
            1.0,
            Metric::Average,
            &mut Prng::seed_from_u64(0),
            &mut (),
        );
        assert_eq!(outcome.steps, 0);
        assert_eq!(outcome.value, 0.0);
        assert!(!outcome.goal_reached);
    }

    #[test]
    fn goal_rate_counts_successful_episodes() {
        // Starting near the top with speed reaches the goal; the valley start falls off
        let env = CarOnHill::default();
        let initial = array![[0.95, 2.0], [0.95, 2.0], [-0.5, 0.0], [0.95, 2.0]];
        let config = EvaluationConfig {
            num_threads: 2,
            ..EvaluationConfig::default()
        };
        let evaluation = evaluate_policy(
            &env,
            &Pump,
            &config,
            Some(initial.view()),
            &mut Prng::seed_from_u64(0),
            &mut (),
        )
        .unwrap();
        assert_eq!(evaluation.goal_rate, 0.75);
        assert!(evaluation.mean > 0.0);
    }

    #[test]
    fn initial_states_set_episode_count() {
        let env = CarOnHill::default();
        let config = EvaluationConfig {
            n_episodes: 100,
            ..EvaluationConfig::default()
        };
        let initial = array![[-0.5, 0.0], [-0.5, 0.0], [-0.5, 0.0]];
        let evaluation = evaluate_policy(
            &env,
            &Pump,
            &config,
            Some(initial.view()),
            &mut Prng::seed_from_u64(0),
            &mut (),
        )
        .unwrap();
        // Identical deterministic episodes have zero spread
        assert_eq!(evaluation.confidence, 0.0);
        assert_eq!(evaluation.steps_confidence, 0.0);
        assert!(evaluation.mean < 0.0);
    }

    #[test]
    fn no_episodes_is_error() {
        let env = CarOnHill::default();
        let config = EvaluationConfig {
            n_episodes: 0,
            ..EvaluationConfig::default()
        };
        assert_eq!(
            evaluate_policy(&env, &Pump, &config, None, &mut Prng::seed_from_u64(0), &mut ()),
            Err(EvaluationError::NoEpisodes)
        );
    }

    #[test]
    fn invalid_initial_state_is_error() {
        let env = CarOnHill::default();
        let initial = array![[0.0, 0.0, 0.0]];
        assert!(matches!(
            evaluate_policy(
                &env,
                &Pump,
                &EvaluationConfig::default(),
                Some(initial.view()),
                &mut Prng::seed_from_u64(0),
                &mut ()
            ),
            Err(EvaluationError::InitialState { row: 0, .. })
        ));
    }

    #[rstest]
    fn parallel_matches_serial_for_deterministic(#[values(2, 3, 8)] num_threads: usize) {
        let env = CarOnHill::default();
        let initial = array![[-0.5, 0.0], [-0.3, 0.5], [0.2, -1.0], [-0.8, 1.0], [0.0, 0.0]];
        let serial = evaluate_policy(
            &env,
            &Pump,
            &EvaluationConfig::default(),
            Some(initial.view()),
            &mut Prng::seed_from_u64(0),
            &mut (),
        )
        .unwrap();
        let parallel = evaluate_policy(
            &env,
            &Pump,
            &EvaluationConfig {
                num_threads,
                ..EvaluationConfig::default()
            },
            Some(initial.view()),
            &mut Prng::seed_from_u64(0),
            &mut (),
        )
        .unwrap();
        assert!((serial.mean - parallel.mean).abs() < 1e-12);
        assert!((serial.confidence - parallel.confidence).abs() < 1e-12);
        assert!((serial.steps_mean - parallel.steps_mean).abs() < 1e-12);
        assert!((serial.steps_confidence - parallel.steps_confidence).abs() < 1e-9);
    }

    #[test]
    fn lqg_optimal_policy_matches_analytic_value() {
        let env = Lqg1d {
            horizon: 100,
            ..Lqg1d::default()
        };
        let k = env.compute_optimal_k();
        let policy = LinearGaussianPolicy::scalar(k, 0.0);
        let initial = ndarray::Array2::from_elem((400, 1), 2.0);
        let evaluation = evaluate_policy(
            &env,
            &policy,
            &EvaluationConfig {
                num_threads: 4,
                ..EvaluationConfig::default()
            },
            Some(initial.view()),
            &mut Prng::seed_from_u64(1),
            &mut (),
        )
        .unwrap();
        let expected = env.compute_j_at(k, 0.0, 2.0);
        assert!(
            (evaluation.mean - expected).abs() < 3.0 * evaluation.confidence + 0.05,
            "{} vs {}",
            evaluation.mean,
            expected
        );
    }

    #[test]
    fn q_estimate_matches_analytic() {
        let env = Lqg1d::default();
        let k = env.compute_optimal_k();
        let policy = LinearGaussianPolicy::scalar(k, 0.0);
        let mut rng = Prng::seed_from_u64(2);
        let (q, confidence) =
            estimate_q_value(&env, &2.0, 0.0, &policy, 200, 300, &mut rng).unwrap();
        let expected = env.compute_q_function(2.0, 0.0, k, 0.0);
        assert!(
            (q - expected).abs() < 3.0 * confidence + 0.05,
            "{} vs {}",
            q,
            expected
        );
    }

    #[test]
    fn random_policy_evaluation_runs() {
        let env = CarOnHill::default();
        let policy = RandomPolicy::new(env.action_space());
        let config = EvaluationConfig {
            n_episodes: 10,
            num_threads: 2,
            ..EvaluationConfig::default()
        };
        let evaluation =
            evaluate_policy(&env, &policy, &config, None, &mut Prng::seed_from_u64(0), &mut ())
                .unwrap();
        assert!(evaluation.mean >= -1.0 && evaluation.mean <= 1.0);
        assert!(evaluation.steps_mean >= 1.0);
        assert!((0.0..=1.0).contains(&evaluation.goal_rate));
    }

    #[test]
    fn evaluate_from_observation() {
        let env = CarOnHill::default();
        let outcome = evaluate_from(
            &env,
            &Pump,
            array![-0.5, 0.0].view(),
            Metric::Discounted,
            &mut Prng::seed_from_u64(0),
        )
        .unwrap();
        assert!(outcome.steps > 0);
    }
}
