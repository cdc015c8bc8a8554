//! `IntervalSpace` definition
use super::Space;
use rand::distributions::Distribution;
use rand::Rng;
use rand_distr::{Exp1, StandardNormal};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A closed interval of real numbers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntervalSpace {
    pub low: f64,
    pub high: f64,
}

impl IntervalSpace {
    /// # Panics
    /// If `low > high` or either bound is NaN.
    pub fn new(low: f64, high: f64) -> Self {
        assert!(low <= high, "require low <= high");
        Self { low, high }
    }

    /// Interval symmetric about zero: `[-bound, bound]`.
    pub fn symmetric(bound: f64) -> Self {
        Self::new(-bound, bound)
    }

    /// Clamp a value into the interval.
    pub fn clip(&self, value: f64) -> f64 {
        value.max(self.low).min(self.high)
    }

    pub fn is_bounded(&self) -> bool {
        self.low.is_finite() && self.high.is_finite()
    }
}

/// The default interval is the full real number line.
impl Default for IntervalSpace {
    fn default() -> Self {
        Self {
            low: f64::NEG_INFINITY,
            high: f64::INFINITY,
        }
    }
}

impl fmt::Display for IntervalSpace {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "IntervalSpace({}, {})", self.low, self.high)
    }
}

impl Space for IntervalSpace {
    type Element = f64;

    fn contains(&self, value: &Self::Element) -> bool {
        self.low <= *value && *value <= self.high && value.is_finite()
    }
}

/// Uniform on bounded intervals; half-bounded intervals have an exponential tail
/// and the full line is sampled from a standard normal.
impl Distribution<f64> for IntervalSpace {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match (self.low.is_finite(), self.high.is_finite()) {
            (true, true) => rng.gen_range(self.low..=self.high),
            (true, false) => self.low + <Exp1 as Distribution<f64>>::sample(&Exp1, rng),
            (false, true) => self.high - <Exp1 as Distribution<f64>>::sample(&Exp1, rng),
            (false, false) => StandardNormal.sample(rng),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Prng;
    use rand::SeedableRng;
    use rstest::rstest;

    #[rstest]
    #[case(0.0, true)]
    #[case(0.5, true)]
    #[case(1.0, true)]
    #[case(-0.1, false)]
    #[case(1.1, false)]
    #[case(f64::NAN, false)]
    fn unit_contains(#[case] value: f64, #[case] expected: bool) {
        assert_eq!(IntervalSpace::new(0.0, 1.0).contains(&value), expected);
    }

    #[test]
    fn default_contains_large() {
        let space = IntervalSpace::default();
        assert!(space.contains(&1e300));
        assert!(!space.contains(&f64::INFINITY));
    }

    #[test]
    #[should_panic]
    fn reversed_bounds_panic() {
        let _ = IntervalSpace::new(1.0, 0.0);
    }

    #[rstest]
    #[case(IntervalSpace::new(-1.0, 2.0))]
    #[case(IntervalSpace::new(3.0, f64::INFINITY))]
    #[case(IntervalSpace::new(f64::NEG_INFINITY, -3.0))]
    #[case(IntervalSpace::default())]
    fn samples_contained(#[case] space: IntervalSpace) {
        let mut rng = Prng::seed_from_u64(1);
        for _ in 0..100 {
            let x = space.sample(&mut rng);
            assert!(space.contains(&x), "{} not in {}", x, space);
        }
    }

    #[test]
    fn clip() {
        let space = IntervalSpace::symmetric(2.0);
        assert_eq!(space.clip(3.0), 2.0);
        assert_eq!(space.clip(-5.0), -2.0);
        assert_eq!(space.clip(0.5), 0.5);
    }
}
