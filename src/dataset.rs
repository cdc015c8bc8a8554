//! Transition datasets and episode collection
use crate::envs::Environment;
use crate::logging::StatsLogger;
use crate::policy::{Policy, RandomPolicy};
use crate::Prng;
use ndarray::{concatenate, s, Array2, ArrayView1, ArrayView2, Axis};
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::time::Instant;
use thiserror::Error;

/// Column layout of a transition dataset.
///
/// Each row is `[state, action, reward, next_state, absorbing, done]`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatasetLayout {
    pub state_dim: usize,
    pub action_dim: usize,
    pub reward_dim: usize,
}

impl DatasetLayout {
    /// Layout for scalar actions and rewards.
    pub const fn new(state_dim: usize) -> Self {
        Self {
            state_dim,
            action_dim: 1,
            reward_dim: 1,
        }
    }

    pub const fn num_columns(&self) -> usize {
        2 * self.state_dim + self.action_dim + self.reward_dim + 2
    }

    pub const fn state_columns(&self) -> Range<usize> {
        0..self.state_dim
    }

    pub const fn action_columns(&self) -> Range<usize> {
        self.state_dim..self.state_dim + self.action_dim
    }

    pub const fn reward_column(&self) -> usize {
        self.state_dim + self.action_dim
    }

    pub const fn next_state_columns(&self) -> Range<usize> {
        let start = self.reward_column() + self.reward_dim;
        start..start + self.state_dim
    }

    pub const fn absorbing_column(&self) -> usize {
        self.num_columns() - 2
    }

    pub const fn done_column(&self) -> usize {
        self.num_columns() - 1
    }

    /// Number of columns of a `[state, action, next_state, absorbing]` array.
    pub const fn sast_columns(&self) -> usize {
        2 * self.state_dim + self.action_dim + 1
    }
}

/// Error in the structure of a dataset.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DatasetError {
    #[error("dataset has {actual} columns but the layout requires {expected}")]
    ColumnCount { expected: usize, actual: usize },
    #[error("row {row} column {column}: flag value {value} is not 0 or 1")]
    InvalidFlag { row: usize, column: usize, value: f64 },
    #[error("row {row} is absorbing but not done")]
    AbsorbingNotDone { row: usize },
    #[error("the last row does not end an episode")]
    LastRowNotDone,
    #[error("datasets have different layouts: {0:?} and {1:?}")]
    LayoutMismatch(DatasetLayout, DatasetLayout),
}

/// A table of environment transitions, one per row.
///
/// Rows are grouped into consecutive episodes; the last row of every episode has `done = 1`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    layout: DatasetLayout,
    data: Array2<f64>,
}

impl Dataset {
    /// An empty dataset.
    pub fn empty(layout: DatasetLayout) -> Self {
        Self {
            layout,
            data: Array2::zeros((0, layout.num_columns())),
        }
    }

    /// Wrap an existing array, validating it with [`Dataset::check`].
    pub fn from_array(layout: DatasetLayout, data: Array2<f64>) -> Result<Self, DatasetError> {
        let dataset = Self { layout, data };
        dataset.check()?;
        Ok(dataset)
    }

    /// Build from a flat row-major buffer of complete rows.
    fn from_rows(layout: DatasetLayout, rows: &[f64]) -> Self {
        let num_columns = layout.num_columns();
        let num_rows = rows.len() / num_columns;
        let data = Array2::from_shape_fn((num_rows, num_columns), |(i, j)| {
            rows[i * num_columns + j]
        });
        Self { layout, data }
    }

    /// Validate the column count and the absorbing and done flags.
    pub fn check(&self) -> Result<(), DatasetError> {
        let layout = &self.layout;
        if self.data.ncols() != layout.num_columns() {
            return Err(DatasetError::ColumnCount {
                expected: layout.num_columns(),
                actual: self.data.ncols(),
            });
        }
        for (row, values) in self.data.axis_iter(Axis(0)).enumerate() {
            for column in [layout.absorbing_column(), layout.done_column()] {
                let value = values[column];
                if value != 0.0 && value != 1.0 {
                    return Err(DatasetError::InvalidFlag { row, column, value });
                }
            }
            if values[layout.absorbing_column()] == 1.0 && values[layout.done_column()] != 1.0 {
                return Err(DatasetError::AbsorbingNotDone { row });
            }
        }
        match self.data.rows().into_iter().last() {
            Some(last) if last[layout.done_column()] != 1.0 => Err(DatasetError::LastRowNotDone),
            _ => Ok(()),
        }
    }

    pub const fn layout(&self) -> &DatasetLayout {
        &self.layout
    }

    /// The underlying array.
    pub fn view(&self) -> ArrayView2<f64> {
        self.data.view()
    }

    pub fn into_array(self) -> Array2<f64> {
        self.data
    }

    pub fn num_transitions(&self) -> usize {
        self.data.nrows()
    }

    pub fn num_episodes(&self) -> usize {
        self.done().iter().filter(|&&d| d == 1.0).count()
    }

    pub fn is_empty(&self) -> bool {
        self.data.nrows() == 0
    }

    pub fn states(&self) -> ArrayView2<f64> {
        self.data.slice(s![.., self.layout.state_columns()])
    }

    /// The action of each transition; actions are scalar.
    pub fn actions(&self) -> ArrayView1<f64> {
        self.data.column(self.layout.action_columns().start)
    }

    pub fn rewards(&self) -> ArrayView1<f64> {
        self.data.column(self.layout.reward_column())
    }

    pub fn next_states(&self) -> ArrayView2<f64> {
        self.data.slice(s![.., self.layout.next_state_columns()])
    }

    pub fn absorbing(&self) -> ArrayView1<f64> {
        self.data.column(self.layout.absorbing_column())
    }

    pub fn done(&self) -> ArrayView1<f64> {
        self.data.column(self.layout.done_column())
    }

    /// The `[state, action]` columns.
    pub fn state_actions(&self) -> ArrayView2<f64> {
        let end = self.layout.action_columns().end;
        self.data.slice(s![.., ..end])
    }

    /// The `[state, action, next_state, absorbing]` columns.
    pub fn sast(&self) -> Array2<f64> {
        let absorbing_column = self.layout.absorbing_column();
        let absorbing = self
            .data
            .slice(s![.., absorbing_column..=absorbing_column]);
        let mut sast = Array2::zeros((self.num_transitions(), self.layout.sast_columns()));
        let sa_end = self.layout.action_columns().end;
        sast.slice_mut(s![.., ..sa_end]).assign(&self.state_actions());
        sast.slice_mut(s![.., sa_end..sa_end + self.layout.state_dim])
            .assign(&self.next_states());
        sast.slice_mut(s![.., sa_end + self.layout.state_dim..])
            .assign(&absorbing);
        sast
    }

    /// Iterate over the episodes as row blocks, splitting after every done row.
    ///
    /// Trailing rows without a done flag form a final, incomplete episode.
    pub fn episodes(&self) -> impl Iterator<Item = ArrayView2<f64>> + '_ {
        let done = self.done();
        let mut ends: Vec<usize> = done
            .iter()
            .enumerate()
            .filter(|&(_, &d)| d == 1.0)
            .map(|(i, _)| i + 1)
            .collect();
        if ends.last().copied().unwrap_or(0) < self.num_transitions() {
            ends.push(self.num_transitions());
        }
        let starts = std::iter::once(0).chain(ends.clone());
        starts
            .zip(ends)
            .map(move |(start, end)| self.data.slice(s![start..end, ..]))
    }

    /// Append the transitions of another dataset with the same layout.
    pub fn append(&mut self, other: &Self) -> Result<(), DatasetError> {
        if self.layout != other.layout {
            return Err(DatasetError::LayoutMismatch(self.layout, other.layout));
        }
        self.data = concatenate(Axis(0), &[self.data.view(), other.data.view()]).map_err(|_| {
            DatasetError::ColumnCount {
                expected: self.data.ncols(),
                actual: other.data.ncols(),
            }
        })?;
        Ok(())
    }
}

/// Configuration for [`collect_episodes`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectConfig {
    /// Total number of episodes to collect.
    pub n_episodes: usize,
    /// Number of worker threads; `1` collects in the calling thread.
    pub num_threads: usize,
}

impl Default for CollectConfig {
    fn default() -> Self {
        Self {
            n_episodes: 1,
            num_threads: 1,
        }
    }
}

impl CollectConfig {
    /// Use one worker thread per logical CPU.
    #[must_use]
    pub fn with_all_cpus(mut self) -> Self {
        self.num_threads = num_cpus::get();
        self
    }
}

/// Append the transitions of one episode to a flat row buffer.
fn run_collect_episode<E>(
    env: &E,
    policy: &dyn Policy,
    rng: &mut Prng,
    logger: &mut dyn StatsLogger,
    rows: &mut Vec<f64>,
) where
    E: Environment + ?Sized,
{
    let horizon = env.horizon();
    let mut state = env.initial_state(rng);
    let mut t = 0;
    let mut episode_return = 0.0;
    while t < horizon {
        let observation = env.observe(&state);
        let action = policy.draw_action(observation.view(), rng);
        let (successor, reward) = env.step(state, action, rng, logger);
        t += 1;
        episode_return += reward;
        let absorbing = successor.is_terminal();
        let done = absorbing || t >= horizon;

        rows.extend(observation.iter());
        rows.push(action);
        rows.push(reward);
        let next_state = successor.into_state();
        rows.extend(env.observe(&next_state).iter());
        rows.push(if absorbing { 1.0 } else { 0.0 });
        rows.push(if done { 1.0 } else { 0.0 });

        if done {
            break;
        }
        state = next_state;
    }
    logger.log_scalar("episode_length", t as f64);
    logger.log_scalar("episode_return", episode_return);
    logger.log_counter_increment("episodes", 1);
}

/// Collect one episode.
///
/// Follows `policy`, or uniform random actions if `policy` is `None`, until reaching an
/// absorbing state or the environment horizon.
pub fn collect_episode<E>(
    env: &E,
    policy: Option<&dyn Policy>,
    rng: &mut Prng,
    logger: &mut dyn StatsLogger,
) -> Dataset
where
    E: Environment + ?Sized,
{
    let layout = DatasetLayout::new(env.state_dim());
    let random = RandomPolicy::new(env.action_space());
    let policy = policy.unwrap_or(&random);
    let mut rows = Vec::new();
    run_collect_episode(env, policy, rng, logger, &mut rows);
    Dataset::from_rows(layout, &rows)
}

/// Collect the rows of `n_episodes` episodes in the current thread.
fn collect_serial<E>(
    env: &E,
    policy: &dyn Policy,
    n_episodes: usize,
    rng: &mut Prng,
    logger: &mut dyn StatsLogger,
) -> Vec<f64>
where
    E: Environment + ?Sized,
{
    let mut rows = Vec::new();
    for _ in 0..n_episodes {
        run_collect_episode(env, policy, rng, logger, &mut rows);
    }
    rows
}

/// Collect multiple episodes, possibly across several threads.
///
/// With `num_threads > 1`, episodes are divided among workers as evenly as possible.
/// Each worker uses its own generator derived from `rng`; the result contains the episodes of
/// each worker in order, concatenated in worker order.
pub fn collect_episodes<E>(
    env: &E,
    policy: Option<&(dyn Policy + Sync)>,
    config: &CollectConfig,
    rng: &mut Prng,
    logger: &mut dyn StatsLogger,
) -> Dataset
where
    E: Environment + Sync + ?Sized,
{
    let start = Instant::now();
    let layout = DatasetLayout::new(env.state_dim());
    let random = RandomPolicy::new(env.action_space());
    let policy: &(dyn Policy + Sync) = policy.unwrap_or(&random);
    let num_threads = config.num_threads.max(1).min(config.n_episodes.max(1));

    let rows = if num_threads == 1 {
        collect_serial(env, policy, config.n_episodes, rng, logger)
    } else {
        let mut worker_rngs: Vec<_> = (0..num_threads)
            .map(|_| Prng::from_rng(&mut *rng).expect("Prng should be infallible"))
            .collect();

        // Only the first worker logs
        let mut worker0_logger = (&mut *logger).with_scope("worker0");
        let mut send_logger = Some(&mut worker0_logger as &mut dyn StatsLogger);

        crossbeam::scope(|scope| {
            let mut threads = Vec::new();
            for (i, worker_rng) in worker_rngs.iter_mut().enumerate() {
                let n_episodes = split_count(config.n_episodes, num_threads, i);
                let thread_logger = send_logger.take();
                threads.push(scope.spawn(move |_scope| {
                    collect_serial(
                        env,
                        policy,
                        n_episodes,
                        worker_rng,
                        thread_logger.unwrap_or(&mut ()),
                    )
                }));
            }
            threads
                .into_iter()
                .flat_map(|t| t.join().unwrap())
                .collect()
        })
        .unwrap()
    };

    let dataset = Dataset::from_rows(layout, &rows);
    logger.log_counter_increment("transitions", dataset.num_transitions() as u64);
    logger.log_duration("collect_time", start.elapsed());
    dataset
}

/// Size of part `index` when dividing `total` items into `parts` contiguous parts.
///
/// The first `total % parts` parts have one extra item.
pub(crate) const fn split_count(total: usize, parts: usize, index: usize) -> usize {
    total / parts + if index < total % parts { 1 } else { 0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envs::{CarOnHill, EnvStructure, Lqg1d};
    use crate::logging::{ByGroupCount, ChunkLogger, ChunkSummary, DisplayBackend};
    use ndarray::array;
    use rstest::rstest;

    fn layout1() -> DatasetLayout {
        DatasetLayout::new(1)
    }

    #[test]
    fn layout_columns() {
        let layout = DatasetLayout::new(2);
        assert_eq!(layout.num_columns(), 8);
        assert_eq!(layout.state_columns(), 0..2);
        assert_eq!(layout.action_columns(), 2..3);
        assert_eq!(layout.reward_column(), 3);
        assert_eq!(layout.next_state_columns(), 4..6);
        assert_eq!(layout.absorbing_column(), 6);
        assert_eq!(layout.done_column(), 7);
    }

    #[rstest]
    #[case(array![[0.0, 1.0, 2.0, 3.0, 0.0, 1.0]], Ok(()))]
    #[case(array![[0.0, 1.0, 2.0, 3.0, 0.0, 0.0]], Err(DatasetError::LastRowNotDone))]
    #[case(
        array![[0.0, 1.0, 2.0, 3.0, 1.0, 0.0], [0.0, 1.0, 2.0, 3.0, 0.0, 1.0]],
        Err(DatasetError::AbsorbingNotDone { row: 0 })
    )]
    #[case(
        array![[0.0, 1.0, 2.0, 3.0, 0.5, 1.0]],
        Err(DatasetError::InvalidFlag { row: 0, column: 4, value: 0.5 })
    )]
    #[case(
        array![[0.0, 1.0, 2.0, 3.0, 0.0]],
        Err(DatasetError::ColumnCount { expected: 6, actual: 5 })
    )]
    fn check(#[case] data: Array2<f64>, #[case] expected: Result<(), DatasetError>) {
        assert_eq!(Dataset::from_array(layout1(), data).map(|_| ()), expected);
    }

    #[test]
    fn accessors() {
        let data = array![
            [0.0, 1.0, 2.0, 3.0, 0.0, 0.0],
            [3.0, -1.0, 4.0, 5.0, 1.0, 1.0]
        ];
        let dataset = Dataset::from_array(layout1(), data).unwrap();
        assert_eq!(dataset.states(), array![[0.0], [3.0]]);
        assert_eq!(dataset.actions(), array![1.0, -1.0]);
        assert_eq!(dataset.rewards(), array![2.0, 4.0]);
        assert_eq!(dataset.next_states(), array![[3.0], [5.0]]);
        assert_eq!(dataset.absorbing(), array![0.0, 1.0]);
        assert_eq!(dataset.state_actions(), array![[0.0, 1.0], [3.0, -1.0]]);
        assert_eq!(dataset.sast(), array![[0.0, 1.0, 3.0, 0.0], [3.0, -1.0, 5.0, 1.0]]);
        assert_eq!(dataset.num_episodes(), 1);
    }

    #[test]
    fn episodes_split_on_done() {
        let data = array![
            [0.0, 0.0, 0.0, 1.0, 0.0, 0.0],
            [1.0, 0.0, 0.0, 2.0, 0.0, 1.0],
            [5.0, 0.0, 0.0, 6.0, 1.0, 1.0]
        ];
        let dataset = Dataset::from_array(layout1(), data).unwrap();
        let lengths: Vec<_> = dataset.episodes().map(|e| e.nrows()).collect();
        assert_eq!(lengths, vec![2, 1]);
    }

    #[test]
    fn append_checks_layout() {
        let mut a = Dataset::empty(DatasetLayout::new(1));
        let b = Dataset::empty(DatasetLayout::new(2));
        assert!(matches!(a.append(&b), Err(DatasetError::LayoutMismatch(..))));
    }

    #[test]
    fn collect_lqg_episode_runs_to_horizon() {
        let env = Lqg1d::default();
        let mut rng = Prng::seed_from_u64(0);
        let dataset = collect_episode(&env, None, &mut rng, &mut ());
        assert_eq!(dataset.num_transitions(), 50);
        dataset.check().unwrap();
        // Never absorbing: done only on the last step
        assert!(dataset.absorbing().iter().all(|&a| a == 0.0));
        let done = dataset.done();
        assert!(done.slice(s![..49]).iter().all(|&d| d == 0.0));
        assert_eq!(done[49], 1.0);
        // Consecutive rows chain next_state to state
        for i in 0..49 {
            assert_eq!(dataset.next_states()[(i, 0)], dataset.states()[(i + 1, 0)]);
        }
    }

    #[test]
    fn collect_absorbing_episode_flags() {
        // Pushing along the velocity swings the car off the left edge
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
        let env = CarOnHill::default();
        let mut rng = Prng::seed_from_u64(0);
        let dataset = collect_episode(&env, Some(&Pump), &mut rng, &mut ());
        dataset.check().unwrap();
        let n = dataset.num_transitions();
        assert!(n < env.horizon() as usize);
        assert_eq!(dataset.absorbing()[n - 1], 1.0);
        assert_eq!(dataset.done()[n - 1], 1.0);
        assert_eq!(dataset.rewards()[n - 1], -1.0);
        assert_eq!(dataset.num_episodes(), 1);
    }

    #[rstest]
    fn collect_episodes_counts(#[values(1, 3)] num_threads: usize) {
        let env = Lqg1d {
            horizon: 10,
            ..Lqg1d::default()
        };
        let config = CollectConfig {
            n_episodes: 7,
            num_threads,
        };
        let mut rng = Prng::seed_from_u64(0);
        let dataset = collect_episodes(&env, None, &config, &mut rng, &mut ());
        dataset.check().unwrap();
        assert_eq!(dataset.num_episodes(), 7);
        assert_eq!(dataset.num_transitions(), 70);
    }

    #[test]
    fn collect_episodes_parallel_is_reproducible() {
        let env = Lqg1d::default();
        let config = CollectConfig {
            n_episodes: 8,
            num_threads: 4,
        };
        let a = collect_episodes(&env, None, &config, &mut Prng::seed_from_u64(3), &mut ());
        let b = collect_episodes(&env, None, &config, &mut Prng::seed_from_u64(3), &mut ());
        assert_eq!(a, b);
    }

    #[test]
    fn zero_horizon_collects_nothing() {
        let env = Lqg1d {
            horizon: 0,
            ..Lqg1d::default()
        };
        let dataset = collect_episode(&env, None, &mut Prng::seed_from_u64(0), &mut ());
        dataset.check().unwrap();
        assert!(dataset.is_empty());
        assert_eq!(dataset.num_episodes(), 0);
    }

    #[test]
    fn collect_logs_episode_summaries() {
        let env = Lqg1d {
            horizon: 4,
            ..Lqg1d::default()
        };
        let config = CollectConfig {
            n_episodes: 3,
            num_threads: 1,
        };
        let mut logger = ChunkLogger::new(ByGroupCount::new(u64::MAX), DisplayBackend);
        collect_episodes(&env, None, &config, &mut Prng::seed_from_u64(0), &mut logger);
        match logger.summary(&"episode_length".into()) {
            Some(ChunkSummary::Scalar { stats }) => {
                assert_eq!(stats.count(), 3);
                assert_eq!(stats.mean(), Some(4.0));
            }
            other => panic!("unexpected summary {:?}", other),
        }
        assert_eq!(
            logger.summary(&"episodes".into()),
            Some(&ChunkSummary::Counter {
                increment: 3,
                initial_value: 0
            })
        );
    }

    #[test]
    fn collect_episodes_concatenates_in_worker_order() {
        let env = Lqg1d {
            horizon: 4,
            ..Lqg1d::default()
        };
        let config = CollectConfig {
            n_episodes: 5,
            num_threads: 2,
        };
        let parallel = collect_episodes(&env, None, &config, &mut Prng::seed_from_u64(11), &mut ());

        let mut rng = Prng::seed_from_u64(11);
        let mut worker_rngs: Vec<Prng> = (0..2)
            .map(|_| Prng::from_rng(&mut rng).unwrap())
            .collect();
        let mut serial = Dataset::empty(DatasetLayout::new(env.state_dim()));
        for (worker_rng, n) in worker_rngs.iter_mut().zip([3, 2]) {
            for _ in 0..n {
                let episode = collect_episode(&env, None, worker_rng, &mut ());
                serial.append(&episode).unwrap();
            }
        }
        assert_eq!(parallel.num_episodes(), 5);
        assert_eq!(parallel, serial);
    }

    #[test]
    fn split_count_is_balanced() {
        let counts: Vec<_> = (0..3).map(|i| split_count(7, 3, i)).collect();
        assert_eq!(counts, vec![3, 2, 2]);
    }
}
