//! Batch reinforcement learning algorithms
mod fqi;

pub use fqi::{Fqi, FqiConfig};
