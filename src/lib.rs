//! Batch reinforcement learning with Fitted Q-Iteration.
//!
//! The crate provides benchmark environments, episode collection into a flat transition dataset,
//! Monte-Carlo policy evaluation, and regressor-based Q-function approximation.
#![warn(clippy::cast_lossless)]
#![warn(clippy::cast_possible_truncation)]
#![warn(clippy::doc_markdown)]
#![warn(clippy::explicit_iter_loop)]
#![warn(clippy::for_kv_map)] // part of warn(clippy::all), specifically style?
#![warn(clippy::missing_const_for_fn)] // has some false positives
#![warn(clippy::needless_borrow)]
#![warn(clippy::needless_pass_by_value)]
#![warn(clippy::redundant_closure_for_method_calls)]
#![warn(clippy::use_self)] // also triggered by macro expansions
pub mod algorithms;
pub mod dataset;
pub mod envs;
mod error;
pub mod evaluation;
pub mod logging;
pub mod policy;
pub mod regressors;
pub mod spaces;
pub mod utils;

pub use algorithms::{Fqi, FqiConfig};
pub use dataset::{collect_episode, collect_episodes, CollectConfig, Dataset, DatasetLayout};
pub use envs::{BuildEnv, EnvStructure, Environment, Successor};
pub use error::FqiError;
pub use evaluation::{evaluate_policy, EvaluationConfig, Metric, PolicyEvaluation};
pub use policy::Policy;
pub use regressors::Regressor;

/// Pseudo-random number generator used throughout the crate.
pub type Prng = rand_chacha::ChaCha8Rng;
