use super::{check_samples, Regressor, RegressorError};
use crate::spaces::DiscreteValuedSpace;
use ndarray::{s, Array1, ArrayView1, ArrayView2, Axis};

/// One regressor per discrete action value.
///
/// Input rows are `[state, action]`. Each row is routed to the model of its action value, which
/// sees only the state columns.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionRegressor<R> {
    actions: DiscreteValuedSpace,
    models: Vec<R>,
}

impl<R: Clone> ActionRegressor<R> {
    /// Create from a prototype model that is copied for every action.
    pub fn new(prototype: R, actions: DiscreteValuedSpace) -> Self {
        let models = vec![prototype; actions.len()];
        Self { actions, models }
    }
}

impl<R> ActionRegressor<R> {
    pub const fn actions(&self) -> &DiscreteValuedSpace {
        &self.actions
    }

    /// The model for the action at the given index.
    pub fn model(&self, index: usize) -> Option<&R> {
        self.models.get(index)
    }

    /// Row indices of `x` grouped by action index.
    fn route(&self, x: ArrayView2<f64>) -> Result<Vec<Vec<usize>>, RegressorError> {
        if x.ncols() == 0 {
            return Err(RegressorError::ColumnCount {
                expected: 1,
                actual: 0,
            });
        }
        let mut groups = vec![Vec::new(); self.actions.len()];
        for (row, &action) in x.column(x.ncols() - 1).iter().enumerate() {
            let index = self
                .actions
                .index_of(action)
                .ok_or(RegressorError::UnknownAction(action))?;
            groups[index].push(row);
        }
        Ok(groups)
    }
}

impl<R: Regressor> Regressor for ActionRegressor<R> {
    fn fit(&mut self, x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<(), RegressorError> {
        check_samples(x, y)?;
        let groups = self.route(x)?;
        let states = x.slice(s![.., ..x.ncols() - 1]);
        if let Some(index) = groups.iter().position(Vec::is_empty) {
            return Err(RegressorError::NoSamplesForAction(
                self.actions.values()[index],
            ));
        }
        for (rows, model) in groups.iter().zip(&mut self.models) {
            model.fit(states.select(Axis(0), rows).view(), y.select(Axis(0), rows).view())?;
        }
        Ok(())
    }

    fn predict(&self, x: ArrayView2<f64>) -> Result<Array1<f64>, RegressorError> {
        let groups = self.route(x)?;
        let states = x.slice(s![.., ..x.ncols() - 1]);
        let mut predictions = Array1::zeros(x.nrows());
        for (rows, model) in groups.iter().zip(&self.models) {
            if rows.is_empty() {
                continue;
            }
            let values = model.predict(states.select(Axis(0), rows).view())?;
            for (&row, &value) in rows.iter().zip(values.iter()) {
                predictions[row] = value;
            }
        }
        Ok(predictions)
    }

    fn is_fitted(&self) -> bool {
        self.models.iter().all(Regressor::is_fitted)
    }
}

#[cfg(test)]
mod tests {
    use super::super::{LinearRegression, LinearRegressionConfig};
    use super::*;
    use ndarray::array;

    fn regressor() -> ActionRegressor<LinearRegression> {
        ActionRegressor::new(
            LinearRegression::new(LinearRegressionConfig::default()),
            DiscreteValuedSpace::new(vec![-1.0, 1.0]),
        )
    }

    #[test]
    fn separate_model_per_action() {
        // Q(s, -1) = s, Q(s, 1) = -2 s + 1
        let x = array![
            [0.0, -1.0],
            [1.0, -1.0],
            [2.0, -1.0],
            [0.0, 1.0],
            [1.0, 1.0],
            [2.0, 1.0]
        ];
        let y = array![0.0, 1.0, 2.0, 1.0, -1.0, -3.0];
        let mut model = regressor();
        model.fit(x.view(), y.view()).unwrap();
        assert!(model.is_fitted());

        let test = array![[3.0, 1.0], [3.0, -1.0]];
        let prediction = model.predict(test.view()).unwrap();
        assert!((prediction[0] + 5.0).abs() < 1e-9);
        assert!((prediction[1] - 3.0).abs() < 1e-9);
    }

    #[test]
    fn unknown_action_is_error() {
        let mut model = regressor();
        let x = array![[0.0, 0.5]];
        assert_eq!(
            model.fit(x.view(), array![1.0].view()),
            Err(RegressorError::UnknownAction(0.5))
        );
    }

    #[test]
    fn missing_action_is_error() {
        let mut model = regressor();
        let x = array![[0.0, 1.0], [1.0, 1.0]];
        assert_eq!(
            model.fit(x.view(), array![1.0, 2.0].view()),
            Err(RegressorError::NoSamplesForAction(-1.0))
        );
    }

    #[test]
    fn not_fitted_until_fit() {
        let model = regressor();
        assert!(!model.is_fitted());
        assert_eq!(
            model.predict(array![[0.0, 1.0]].view()),
            Err(RegressorError::NotFitted)
        );
    }
}
