//! Supervised regression models for value-function approximation
mod action;
mod config;
mod ensemble;
mod linear;

pub use action::ActionRegressor;
pub use config::{Model, ModelConfig};
pub use ensemble::Ensemble;
pub use linear::{LinearRegression, LinearRegressionConfig, PolynomialFeatures};

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use ndarray_stats::errors::MinMaxError;
use ndarray_stats::QuantileExt;
use thiserror::Error;

/// Error fitting or evaluating a [`Regressor`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegressorError {
    #[error("input has {actual} columns but {expected} were expected")]
    ColumnCount { expected: usize, actual: usize },
    #[error("{inputs} input rows but {targets} targets")]
    RowCount { inputs: usize, targets: usize },
    #[error("cannot fit on an empty dataset")]
    EmptyInput,
    #[error("the regressor has not been fitted")]
    NotFitted,
    #[error("the least-squares system is singular; try a positive ridge penalty")]
    Singular,
    #[error("action value {0} is not one of the regressor's actions")]
    UnknownAction(f64),
    #[error("no training samples for action value {0}")]
    NoSamplesForAction(f64),
    #[error("prediction is not a number")]
    NonFinitePrediction,
}

/// A regression model mapping input rows to scalar targets.
pub trait Regressor {
    /// Fit the model to inputs `x` (one sample per row) and targets `y`.
    fn fit(&mut self, x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<(), RegressorError>;

    /// Predict the target of each input row.
    fn predict(&self, x: ArrayView2<f64>) -> Result<Array1<f64>, RegressorError>;

    /// Whether the model has been fitted at least once.
    fn is_fitted(&self) -> bool;
}

impl<R: Regressor + ?Sized> Regressor for Box<R> {
    fn fit(&mut self, x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<(), RegressorError> {
        R::fit(self, x, y)
    }
    fn predict(&self, x: ArrayView2<f64>) -> Result<Array1<f64>, RegressorError> {
        R::predict(self, x)
    }
    fn is_fitted(&self) -> bool {
        R::is_fitted(self)
    }
}

/// Check that the inputs and targets describe the same, non-empty set of samples.
pub(crate) fn check_samples(x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<(), RegressorError> {
    if x.nrows() != y.len() {
        return Err(RegressorError::RowCount {
            inputs: x.nrows(),
            targets: y.len(),
        });
    }
    if x.nrows() == 0 {
        return Err(RegressorError::EmptyInput);
    }
    Ok(())
}

/// Maximal action value of each state and the action attaining it.
///
/// Evaluates `regressor` on every `[state, action]` pair. Ties go to the earliest action in
/// `actions`.
///
/// # Returns
/// * `values`: `max_a Q(s, a)` for each row `s` of `states`.
/// * `actions`: The maximizing action of each row.
pub fn max_q<R: Regressor + ?Sized>(
    regressor: &R,
    states: ArrayView2<f64>,
    actions: &[f64],
) -> Result<(Array1<f64>, Array1<f64>), RegressorError> {
    let num_states = states.nrows();
    let num_actions = actions.len();
    let state_dim = states.ncols();

    // Row i * num_actions + j holds [states[i], actions[j]]
    let inputs = Array2::from_shape_fn((num_states * num_actions, state_dim + 1), |(row, col)| {
        if col < state_dim {
            states[(row / num_actions, col)]
        } else {
            actions[row % num_actions]
        }
    });
    let predictions = regressor.predict(inputs.view())?;
    let num_predictions = predictions.len();
    let q = predictions
        .into_shape((num_states, num_actions))
        .map_err(|_| RegressorError::RowCount {
            inputs: inputs.nrows(),
            targets: num_predictions,
        })?;

    let mut values = Array1::zeros(num_states);
    let mut best_actions = Array1::zeros(num_states);
    for (i, row) in q.axis_iter(Axis(0)).enumerate() {
        let best = row.argmax().map_err(|err| match err {
            MinMaxError::EmptyInput => RegressorError::EmptyInput,
            MinMaxError::UndefinedOrder => RegressorError::NonFinitePrediction,
        })?;
        values[i] = row[best];
        best_actions[i] = actions[best];
    }
    Ok((values, best_actions))
}
