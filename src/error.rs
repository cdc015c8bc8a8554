//! Error type
use crate::dataset::DatasetError;
use crate::envs::{BuildEnvError, EnvError};
use crate::evaluation::EvaluationError;
use crate::regressors::RegressorError;
use thiserror::Error;

/// Error from the batch RL crate.
#[derive(Error, Debug)]
pub enum FqiError {
    #[error("error building environment")]
    BuildEnv(#[from] BuildEnvError),
    #[error(transparent)]
    Env(#[from] EnvError),
    #[error("invalid dataset")]
    Dataset(#[from] DatasetError),
    #[error("regressor error")]
    Regressor(#[from] RegressorError),
    #[error("policy evaluation failed")]
    Evaluation(#[from] EvaluationError),
    #[error("invalid configuration `{name}`: {reason}")]
    InvalidConfig { name: &'static str, reason: String },
}
