//! `BoxSpace` definition
use super::{IntervalSpace, Space};
use ndarray::{Array1, ArrayView1};
use rand::distributions::Distribution;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Cartesian product of real intervals. Elements are real vectors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoxSpace {
    pub intervals: Vec<IntervalSpace>,
}

impl BoxSpace {
    pub fn new(intervals: Vec<IntervalSpace>) -> Self {
        Self { intervals }
    }

    /// Box from per-dimension lower and upper bounds.
    ///
    /// # Panics
    /// If the bounds have different lengths or any `low > high`.
    pub fn from_bounds(low: &[f64], high: &[f64]) -> Self {
        assert_eq!(low.len(), high.len(), "bounds length mismatch");
        Self::new(
            low.iter()
                .zip(high)
                .map(|(&l, &h)| IntervalSpace::new(l, h))
                .collect(),
        )
    }

    /// Box symmetric about the origin, `[-bound_i, bound_i]` in each dimension.
    pub fn symmetric(bounds: &[f64]) -> Self {
        Self::new(bounds.iter().map(|&b| IntervalSpace::symmetric(b)).collect())
    }

    /// Number of dimensions.
    pub fn dim(&self) -> usize {
        self.intervals.len()
    }

    pub fn low(&self) -> Array1<f64> {
        self.intervals.iter().map(|i| i.low).collect()
    }

    pub fn high(&self) -> Array1<f64> {
        self.intervals.iter().map(|i| i.high).collect()
    }

    /// Check membership of a vector view.
    pub fn contains_view(&self, value: ArrayView1<f64>) -> bool {
        value.len() == self.dim()
            && self
                .intervals
                .iter()
                .zip(value.iter())
                .all(|(interval, x)| interval.contains(x))
    }

    /// Clamp each coordinate into its interval.
    pub fn clip(&self, value: ArrayView1<f64>) -> Array1<f64> {
        self.intervals
            .iter()
            .zip(value.iter())
            .map(|(interval, &x)| interval.clip(x))
            .collect()
    }
}

impl fmt::Display for BoxSpace {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "BoxSpace(")?;
        let mut first = true;
        for interval in &self.intervals {
            if !first {
                write!(f, " x ")?;
            }
            first = false;
            write!(f, "[{}, {}]", interval.low, interval.high)?;
        }
        write!(f, ")")
    }
}

impl Space for BoxSpace {
    type Element = Array1<f64>;

    fn contains(&self, value: &Self::Element) -> bool {
        self.contains_view(value.view())
    }
}

impl Distribution<Array1<f64>> for BoxSpace {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Array1<f64> {
        self.intervals.iter().map(|i| i.sample(rng)).collect()
    }
}
