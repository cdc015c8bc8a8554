use super::{
    ActionRegressor, Ensemble, LinearRegression, LinearRegressionConfig, Regressor,
    RegressorError,
};
use crate::spaces::DiscreteValuedSpace;
use ndarray::{Array1, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

/// Named Q-function model configuration.
///
/// Deserializes from an object tagged by `modelName`, e.g. `{"modelName": "LinearEnsemble"}`;
/// all other fields configure the linear regression. Every model keeps a separate regressor
/// for each discrete action.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "modelName")]
pub enum ModelConfig {
    /// One linear regression per action, refitted from scratch on every fit.
    Linear(LinearRegressionConfig),
    /// One boosted ensemble of linear regressions per action; each fit adds a member.
    LinearEnsemble(LinearRegressionConfig),
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self::Linear(LinearRegressionConfig::default())
    }
}

impl ModelConfig {
    /// Build an unfitted model over the given discrete actions.
    pub fn build(&self, actions: DiscreteValuedSpace) -> Model {
        match self {
            Self::Linear(c) => {
                Model::Linear(ActionRegressor::new(LinearRegression::new(*c), actions))
            }
            Self::LinearEnsemble(c) => Model::LinearEnsemble(ActionRegressor::new(
                Ensemble::new(LinearRegression::new(*c)),
                actions,
            )),
        }
    }
}

/// A model built from a [`ModelConfig`].
#[derive(Debug, Clone, PartialEq)]
pub enum Model {
    Linear(ActionRegressor<LinearRegression>),
    LinearEnsemble(ActionRegressor<Ensemble<LinearRegression>>),
}

impl Regressor for Model {
    fn fit(&mut self, x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<(), RegressorError> {
        match self {
            Self::Linear(r) => r.fit(x, y),
            Self::LinearEnsemble(r) => r.fit(x, y),
        }
    }

    fn predict(&self, x: ArrayView2<f64>) -> Result<Array1<f64>, RegressorError> {
        match self {
            Self::Linear(r) => r.predict(x),
            Self::LinearEnsemble(r) => r.predict(x),
        }
    }

    fn is_fitted(&self) -> bool {
        match self {
            Self::Linear(r) => r.is_fitted(),
            Self::LinearEnsemble(r) => r.is_fitted(),
        }
    }
}
