//! Summary statistics
use num_traits::Float;
use std::iter::{Extend, FromIterator};

/// Online mean and variance calculation using Welford's Algorithm
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct OnlineMeanVariance<T> {
    mean: T,
    squared_residual_sum: T,
    count: u64,
}

impl<T: Float> Default for OnlineMeanVariance<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Float> OnlineMeanVariance<T> {
    pub fn new() -> Self {
        Self {
            mean: T::zero(),
            squared_residual_sum: T::zero(),
            count: 0,
        }
    }

    /// Number of accumulated values.
    pub const fn count(&self) -> u64 {
        self.count
    }

    /// The mean of all accumulated values. `None` if empty.
    pub fn mean(&self) -> Option<T> {
        if self.count > 0 {
            Some(self.mean)
        } else {
            None
        }
    }

    /// The (population) variance of all accumulated values. `None` if empty.
    pub fn variance(&self) -> Option<T> {
        if self.count > 0 {
            Some(self.squared_residual_sum / self.count_as_float())
        } else {
            None
        }
    }

    /// The (population) standard deviation of all accumulated values. `None` if empty.
    pub fn stddev(&self) -> Option<T> {
        self.variance().map(Float::sqrt)
    }

    /// Half-width of the approximate 95% confidence interval of the mean: `2 σ / √n`.
    pub fn confidence_95(&self) -> Option<T> {
        let two = T::one() + T::one();
        self.stddev()
            .map(|stddev| two * stddev / self.count_as_float().sqrt())
    }

    /// Add a new value to the calculation.
    pub fn push(&mut self, value: T) {
        let residual_pre = value - self.mean;
        self.count += 1;
        self.mean = self.mean + residual_pre / self.count_as_float();
        let residual_post = value - self.mean;
        self.squared_residual_sum = self.squared_residual_sum + residual_pre * residual_post;
    }

    /// Combine with the statistics of another disjoint set of values.
    pub fn merge(&mut self, other: &Self) {
        if other.count == 0 {
            return;
        }
        if self.count == 0 {
            *self = *other;
            return;
        }
        let count = self.count + other.count;
        let n_self = self.count_as_float();
        let n_other = other.count_as_float();
        let n = T::from(count).unwrap_or_else(T::infinity);
        let delta = other.mean - self.mean;
        self.mean = self.mean + delta * n_other / n;
        self.squared_residual_sum = self.squared_residual_sum
            + other.squared_residual_sum
            + delta * delta * n_self * n_other / n;
        self.count = count;
    }

    fn count_as_float(&self) -> T {
        // u64 -> float conversions do not fail for the primitive float types
        T::from(self.count).unwrap_or_else(T::infinity)
    }
}

impl<T: Float> Extend<T> for OnlineMeanVariance<T> {
    fn extend<I>(&mut self, iter: I)
    where
        I: IntoIterator<Item = T>,
    {
        for value in iter {
            self.push(value)
        }
    }
}

impl<T: Float> FromIterator<T> for OnlineMeanVariance<T> {
    fn from_iter<I>(iter: I) -> Self
    where
        I: IntoIterator<Item = T>,
    {
        let mut s = Self::new();
        s.extend(iter);
        s
    }
}
