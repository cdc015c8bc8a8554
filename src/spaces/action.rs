use super::{DiscreteValuedSpace, IntervalSpace, Space};
use rand::distributions::Distribution;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Space of scalar actions; either a finite set of values or a real interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ActionSpace {
    Discrete(DiscreteValuedSpace),
    Continuous(IntervalSpace),
}

impl ActionSpace {
    /// The finite action set, if the space is discrete.
    pub fn discrete_values(&self) -> Option<&[f64]> {
        match self {
            Self::Discrete(space) => Some(space.values()),
            Self::Continuous(_) => None,
        }
    }
}

impl From<DiscreteValuedSpace> for ActionSpace {
    fn from(space: DiscreteValuedSpace) -> Self {
        Self::Discrete(space)
    }
}

impl From<IntervalSpace> for ActionSpace {
    fn from(space: IntervalSpace) -> Self {
        Self::Continuous(space)
    }
}

impl fmt::Display for ActionSpace {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Discrete(space) => space.fmt(f),
            Self::Continuous(space) => space.fmt(f),
        }
    }
}

impl Space for ActionSpace {
    type Element = f64;

    fn contains(&self, value: &f64) -> bool {
        match self {
            Self::Discrete(space) => space.contains(value),
            Self::Continuous(space) => space.contains(value),
        }
    }
}

impl Distribution<f64> for ActionSpace {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match self {
            Self::Discrete(space) => space.sample(rng),
            Self::Continuous(space) => space.sample(rng),
        }
    }
}
