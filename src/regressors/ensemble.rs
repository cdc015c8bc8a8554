use super::{check_samples, Regressor, RegressorError};
use ndarray::{Array1, ArrayView1, ArrayView2};

/// Boosted ensemble; the prediction is the sum of its members.
///
/// Each call to [`Regressor::fit`] adds a new member trained on the residual of the current
/// ensemble, so that fitting once per iteration of an algorithm accumulates a boosted model.
#[derive(Debug, Clone, PartialEq)]
pub struct Ensemble<R> {
    prototype: R,
    members: Vec<R>,
}

impl<R> Ensemble<R> {
    /// Create an empty ensemble whose members are copies of `prototype`.
    pub const fn new(prototype: R) -> Self {
        Self {
            prototype,
            members: Vec::new(),
        }
    }

    /// Number of fitted members.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Remove all members.
    pub fn clear(&mut self) {
        self.members.clear()
    }
}

impl<R: Regressor + Clone> Ensemble<R> {
    /// Fit a new member to the residual `y - predict(x)` and add it to the ensemble.
    pub fn add_member(&mut self, x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<(), RegressorError> {
        check_samples(x, y)?;
        let residual = if self.members.is_empty() {
            y.to_owned()
        } else {
            &y - &self.predict(x)?
        };
        let mut member = self.prototype.clone();
        member.fit(x, residual.view())?;
        self.members.push(member);
        Ok(())
    }
}

impl<R: Regressor + Clone> Regressor for Ensemble<R> {
    fn fit(&mut self, x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<(), RegressorError> {
        self.add_member(x, y)
    }

    fn predict(&self, x: ArrayView2<f64>) -> Result<Array1<f64>, RegressorError> {
        let mut members = self.members.iter();
        let first = members.next().ok_or(RegressorError::NotFitted)?;
        let mut total = first.predict(x)?;
        for member in members {
            total += &member.predict(x)?;
        }
        Ok(total)
    }

    fn is_fitted(&self) -> bool {
        !self.members.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::super::{LinearRegression, LinearRegressionConfig};
    use super::*;
    use ndarray::array;

    #[test]
    fn members_fit_residuals() {
        let mut ensemble = Ensemble::new(LinearRegression::new(LinearRegressionConfig::default()));
        let x = array![[0.0], [1.0], [2.0]];
        ensemble.add_member(x.view(), array![1.0, 1.0, 1.0].view()).unwrap();
        ensemble.add_member(x.view(), array![1.0, 3.0, 5.0].view()).unwrap();
        assert_eq!(ensemble.len(), 2);

        let prediction = ensemble.predict(array![[3.0]].view()).unwrap();
        assert!((prediction[0] - 7.0).abs() < 1e-9);

        // The second member only models the change
        let second = ensemble.members[1].predict(array![[0.0]].view()).unwrap();
        assert!(second[0].abs() < 1e-9);
    }

    #[test]
    fn empty_is_not_fitted() {
        let ensemble = Ensemble::new(LinearRegression::default());
        assert!(!ensemble.is_fitted());
        assert_eq!(
            ensemble.predict(array![[0.0]].view()),
            Err(RegressorError::NotFitted)
        );
    }

    #[test]
    fn failed_member_is_not_added() {
        let mut ensemble = Ensemble::new(LinearRegression::default());
        let x = array![[1.0, 2.0], [2.0, 4.0], [3.0, 6.0]];
        assert!(ensemble.add_member(x.view(), array![1.0, 2.0, 3.0].view()).is_err());
        assert!(ensemble.is_empty());
    }
}
