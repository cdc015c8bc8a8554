//! Fitted Q-Iteration
use crate::dataset::{Dataset, DatasetError};
use crate::error::FqiError;
use crate::logging::StatsLogger;
use crate::policy::{greedy_action, GreedyPolicy, Policy};
use crate::regressors::{max_q, Regressor, RegressorError};
use crate::utils::stats::OnlineMeanVariance;
use crate::Prng;
use ndarray::{s, Array1, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Configuration of [`Fqi`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FqiConfig {
    /// Discount factor of the fitted action values.
    pub gamma: f64,
    /// Number of iterations run by [`Fqi::fit`].
    pub horizon: usize,
    /// Actions over which the maximum of the next-state values is taken.
    pub discrete_actions: Vec<f64>,
}

impl Default for FqiConfig {
    fn default() -> Self {
        Self {
            gamma: 0.99,
            horizon: 10,
            discrete_actions: Vec::new(),
        }
    }
}

/// Fitted Q-Iteration on a fixed batch of transitions.
///
/// Transitions are given as `sast` rows `[state, action, next_state, absorbing]` with a
/// separate reward vector. The first iteration regresses `Q(s, a)` on the rewards; every later
/// iteration regresses on the bootstrapped target
/// `r + γ (1 - absorbing) max_a' Q(s', a')` using the previous iterate.
///
/// As in "Tree-Based Batch Mode Reinforcement Learning" by [Ernst et al. (2005)][ernst].
///
/// [ernst]: https://www.jmlr.org/papers/v6/ernst05a.html
#[derive(Debug, Clone, PartialEq)]
pub struct Fqi<R> {
    regressor: R,
    state_dim: usize,
    config: FqiConfig,
    iteration: usize,
}

impl<R: Regressor> Fqi<R> {
    /// Create a new instance around an action-value regressor of `[state, action]` rows.
    pub fn new(regressor: R, state_dim: usize, config: FqiConfig) -> Result<Self, FqiError> {
        if !(0.0..=1.0).contains(&config.gamma) {
            return Err(FqiError::InvalidConfig {
                name: "gamma",
                reason: format!("{} is not in [0, 1]", config.gamma),
            });
        }
        if config.discrete_actions.is_empty() {
            return Err(FqiError::InvalidConfig {
                name: "discrete_actions",
                reason: "must be non-empty".into(),
            });
        }
        Ok(Self {
            regressor,
            state_dim,
            config,
            iteration: 0,
        })
    }

    pub const fn config(&self) -> &FqiConfig {
        &self.config
    }

    pub const fn regressor(&self) -> &R {
        &self.regressor
    }

    pub fn into_regressor(self) -> R {
        self.regressor
    }

    /// Number of completed iterations since the last call to [`Fqi::fit`].
    pub const fn iteration(&self) -> usize {
        self.iteration
    }

    /// Run `config.horizon` iterations starting from the first.
    ///
    /// The regressor is refit in place; an [`Ensemble`](crate::regressors::Ensemble) keeps its
    /// existing members unless cleared first.
    pub fn fit(
        &mut self,
        sast: ArrayView2<f64>,
        r: ArrayView1<f64>,
        logger: &mut dyn StatsLogger,
    ) -> Result<(), FqiError> {
        self.fit_with(sast, r, logger, |_, _| {})
    }

    /// Run `config.horizon` iterations, calling `callback(self, iteration)` after each one.
    pub fn fit_with<F>(
        &mut self,
        sast: ArrayView2<f64>,
        r: ArrayView1<f64>,
        logger: &mut dyn StatsLogger,
        mut callback: F,
    ) -> Result<(), FqiError>
    where
        F: FnMut(&Self, usize),
    {
        self.iteration = 0;
        for i in 0..self.config.horizon {
            self.partial_fit(sast, r, logger)?;
            callback(self, i);
        }
        Ok(())
    }

    /// Fit on the transitions of a dataset.
    pub fn fit_dataset(
        &mut self,
        dataset: &Dataset,
        logger: &mut dyn StatsLogger,
    ) -> Result<(), FqiError> {
        let sast = dataset.sast();
        self.fit(sast.view(), dataset.rewards(), logger)
    }

    /// Run a single iteration.
    pub fn partial_fit(
        &mut self,
        sast: ArrayView2<f64>,
        r: ArrayView1<f64>,
        logger: &mut dyn StatsLogger,
    ) -> Result<(), FqiError> {
        let sd = self.state_dim;
        let expected = 2 * sd + 2;
        if sast.ncols() != expected {
            return Err(DatasetError::ColumnCount {
                expected,
                actual: sast.ncols(),
            }
            .into());
        }
        if sast.nrows() != r.len() {
            return Err(RegressorError::RowCount {
                inputs: sast.nrows(),
                targets: r.len(),
            }
            .into());
        }
        let state_actions = sast.slice(s![.., ..=sd]);

        let targets = if self.iteration == 0 {
            r.to_owned()
        } else {
            let next_states = sast.slice(s![.., sd + 1..2 * sd + 1]);
            let absorbing = sast.column(2 * sd + 1);
            let (next_values, _) = max_q(
                &self.regressor,
                next_states,
                &self.config.discrete_actions,
            )?;
            let gamma = self.config.gamma;
            let mut targets = r.to_owned();
            ndarray::Zip::from(&mut targets)
                .and(&next_values)
                .and(absorbing)
                .for_each(|y, &v, &a| *y += gamma * (1.0 - a) * v);
            targets
        };

        let stats: OnlineMeanVariance<f64> = targets.iter().copied().collect();
        if let (Some(mean), Some(stddev)) = (stats.mean(), stats.stddev()) {
            logger.log_scalar("target_mean", mean);
            logger.log_scalar("target_stddev", stddev);
        }

        let start = Instant::now();
        self.regressor.fit(state_actions, targets.view())?;
        logger.log_duration("fit_time", start.elapsed());
        logger.log_counter_increment("iterations", 1);
        self.iteration += 1;
        Ok(())
    }

    /// Maximal action value of each state and the action attaining it.
    pub fn max_q(&self, states: ArrayView2<f64>) -> Result<(Array1<f64>, Array1<f64>), FqiError> {
        Ok(max_q(
            &self.regressor,
            states,
            &self.config.discrete_actions,
        )?)
    }

    /// Convert into the greedy policy of the fitted action values.
    pub fn into_policy(self) -> Result<GreedyPolicy<R>, RegressorError> {
        GreedyPolicy::new(self.regressor, self.config.discrete_actions)
    }
}

/// Greedy with respect to the current action values.
///
/// # Panics
/// If the regressor has not been fitted.
impl<R: Regressor> Policy for Fqi<R> {
    fn draw_action(&self, observation: ArrayView1<f64>, _: &mut Prng) -> f64 {
        match greedy_action(&self.regressor, observation, &self.config.discrete_actions) {
            Ok(action) => action,
            Err(err) => panic!("greedy action selection failed: {}", err),
        }
    }
}
