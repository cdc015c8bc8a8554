//! `DiscreteValuedSpace` definition
use super::Space;
use rand::distributions::Distribution;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A finite non-empty set of real values.
///
/// Used for environments whose actions are a handful of forces or torques.
/// Values are kept in the order given; the index of a value is its position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscreteValuedSpace {
    values: Vec<f64>,
}

impl DiscreteValuedSpace {
    /// # Panics
    /// If `values` is empty or contains a non-finite value.
    pub fn new(values: Vec<f64>) -> Self {
        assert!(!values.is_empty(), "space must be non-empty");
        assert!(
            values.iter().all(|v| v.is_finite()),
            "values must be finite"
        );
        Self { values }
    }

    /// The values `0, 1, ..., n - 1`.
    pub fn indices(n: usize) -> Self {
        Self::new((0..n).map(|i| i as f64).collect())
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Index of a value in the set, compared exactly.
    #[allow(clippy::float_cmp)]
    pub fn index_of(&self, value: f64) -> Option<usize> {
        self.values.iter().position(|&v| v == value)
    }
}

impl fmt::Display for DiscreteValuedSpace {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "DiscreteValuedSpace({:?})", self.values)
    }
}

impl Space for DiscreteValuedSpace {
    type Element = f64;

    fn contains(&self, value: &Self::Element) -> bool {
        self.index_of(*value).is_some()
    }
}

impl Distribution<f64> for DiscreteValuedSpace {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        self.values[rng.gen_range(0..self.values.len())]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Prng;
    use rand::SeedableRng;

    #[test]
    fn index_of() {
        let space = DiscreteValuedSpace::new(vec![-4.0, 4.0]);
        assert_eq!(space.index_of(4.0), Some(1));
        assert_eq!(space.index_of(0.0), None);
    }

    #[test]
    fn indices() {
        let space = DiscreteValuedSpace::indices(3);
        assert_eq!(space.values(), &[0.0, 1.0, 2.0]);
    }

    #[test]
    fn sample_covers_all_values() {
        let space = DiscreteValuedSpace::new(vec![-50.0, 0.0, 50.0]);
        let mut rng = Prng::seed_from_u64(0);
        let mut seen = [false; 3];
        for _ in 0..100 {
            let value = space.sample(&mut rng);
            seen[space.index_of(value).unwrap()] = true;
        }
        assert_eq!(seen, [true; 3]);
    }

    #[test]
    #[should_panic]
    fn empty_panics() {
        let _ = DiscreteValuedSpace::new(vec![]);
    }
}
