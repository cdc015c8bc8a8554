//! Spaces: sets of observations and actions.
mod action;
mod box_space;
mod discrete;
mod interval;

pub use action::ActionSpace;
pub use box_space::BoxSpace;
pub use discrete::DiscreteValuedSpace;
pub use interval::IntervalSpace;

use rand::distributions::Distribution;

/// A mathematical space with a sampling distribution over its elements.
pub trait Space: Distribution<<Self as Space>::Element> {
    type Element;

    /// Check whether the space contains a particular value.
    fn contains(&self, value: &Self::Element) -> bool;
}
