use super::{check_samples, Regressor, RegressorError};
use crate::utils::linalg::cholesky_solve;
use ndarray::{s, Array1, Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

/// Polynomial feature expansion of input rows.
///
/// Degree 1 leaves the inputs unchanged. Degree 2 appends every pairwise product
/// `x_i x_j` for `i <= j`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PolynomialFeatures {
    pub degree: u8,
}

impl Default for PolynomialFeatures {
    fn default() -> Self {
        Self { degree: 1 }
    }
}

impl PolynomialFeatures {
    /// Number of output features for `input_dim` inputs.
    pub const fn num_features(&self, input_dim: usize) -> usize {
        if self.degree >= 2 {
            input_dim + input_dim * (input_dim + 1) / 2
        } else {
            input_dim
        }
    }

    /// Expand each row of `x`.
    pub fn transform(&self, x: ArrayView2<f64>) -> Array2<f64> {
        if self.degree < 2 {
            return x.to_owned();
        }
        let input_dim = x.ncols();
        let mut features = Array2::zeros((x.nrows(), self.num_features(input_dim)));
        for (row, mut out) in x.axis_iter(Axis(0)).zip(features.axis_iter_mut(Axis(0))) {
            out.slice_mut(s![..input_dim]).assign(&row);
            let mut k = input_dim;
            for i in 0..input_dim {
                for j in i..input_dim {
                    out[k] = row[i] * row[j];
                    k += 1;
                }
            }
        }
        features
    }
}

/// Configuration of a [`LinearRegression`].
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinearRegressionConfig {
    /// Feature expansion applied before the linear fit.
    pub features: PolynomialFeatures,
    /// L2 penalty on the (non-intercept) coefficients.
    pub ridge: f64,
    /// Whether to fit an unpenalized intercept term.
    pub fit_intercept: bool,
}

impl Default for LinearRegressionConfig {
    fn default() -> Self {
        Self {
            features: PolynomialFeatures::default(),
            ridge: 0.0,
            fit_intercept: true,
        }
    }
}

impl LinearRegressionConfig {
    pub const fn new(degree: u8, ridge: f64) -> Self {
        Self {
            features: PolynomialFeatures { degree },
            ridge,
            fit_intercept: true,
        }
    }
}

/// Least-squares linear regression on polynomial features, with an optional ridge penalty.
///
/// Solves the normal equations `(Xᵀ X + λ I) w = Xᵀ y` by Cholesky decomposition.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LinearRegression {
    config: LinearRegressionConfig,
    /// Input dimension and fitted `(coefficients, intercept)`
    fitted: Option<(usize, Array1<f64>, f64)>,
}

impl LinearRegression {
    pub const fn new(config: LinearRegressionConfig) -> Self {
        Self {
            config,
            fitted: None,
        }
    }

    /// Fitted feature coefficients, if fitted.
    pub fn coefficients(&self) -> Option<ArrayView1<f64>> {
        self.fitted.as_ref().map(|(_, w, _)| w.view())
    }

    /// Fitted intercept, if fitted.
    pub fn intercept(&self) -> Option<f64> {
        self.fitted.as_ref().map(|(_, _, b)| *b)
    }

    /// Feature matrix, with a trailing column of ones when fitting an intercept.
    fn design_matrix(&self, x: ArrayView2<f64>) -> Array2<f64> {
        let features = self.config.features.transform(x);
        if !self.config.fit_intercept {
            return features;
        }
        let mut design = Array2::ones((features.nrows(), features.ncols() + 1));
        design
            .slice_mut(s![.., ..features.ncols()])
            .assign(&features);
        design
    }
}

impl Regressor for LinearRegression {
    fn fit(&mut self, x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<(), RegressorError> {
        check_samples(x, y)?;
        let design = self.design_matrix(x);
        let num_features = self.config.features.num_features(x.ncols());

        let mut gram = design.t().dot(&design);
        for i in 0..num_features {
            gram[(i, i)] += self.config.ridge;
        }
        let moment = design.t().dot(&y);
        let solution = cholesky_solve(gram.view(), moment.view()).ok_or(RegressorError::Singular)?;

        let intercept = if self.config.fit_intercept {
            solution[num_features]
        } else {
            0.0
        };
        let coefficients = solution.slice(s![..num_features]).to_owned();
        self.fitted = Some((x.ncols(), coefficients, intercept));
        Ok(())
    }

    fn predict(&self, x: ArrayView2<f64>) -> Result<Array1<f64>, RegressorError> {
        let (input_dim, coefficients, intercept) =
            self.fitted.as_ref().ok_or(RegressorError::NotFitted)?;
        if x.ncols() != *input_dim {
            return Err(RegressorError::ColumnCount {
                expected: *input_dim,
                actual: x.ncols(),
            });
        }
        Ok(self.config.features.transform(x).dot(coefficients) + *intercept)
    }

    fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rstest::rstest;

    fn assert_close(a: ArrayView1<f64>, b: ArrayView1<f64>, tol: f64) {
        assert_eq!(a.len(), b.len());
        assert!(
            a.iter().zip(b).all(|(x, y)| (x - y).abs() < tol),
            "{} != {}",
            a,
            b
        );
    }

    #[test]
    fn quadratic_features() {
        let x = array![[2.0, 3.0]];
        let features = PolynomialFeatures { degree: 2 }.transform(x.view());
        assert_eq!(features, array![[2.0, 3.0, 4.0, 6.0, 9.0]]);
    }

    #[test]
    fn fits_affine_function_exactly() {
        let x = array![[0.0, 1.0], [1.0, 0.0], [2.0, 2.0], [3.0, -1.0]];
        let y = x.column(0).to_owned() * 2.0 - x.column(1).to_owned() * 3.0 + 0.5;
        let mut model = LinearRegression::default();
        model.fit(x.view(), y.view()).unwrap();
        assert_close(model.predict(x.view()).unwrap().view(), y.view(), 1e-9);
        assert!((model.intercept().unwrap() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn fits_quadratic_function() {
        let x = Array2::from_shape_fn((20, 1), |(i, _)| i as f64 / 4.0 - 2.0);
        let y = x.column(0).mapv(|v| 1.5 * v * v - v + 2.0);
        let mut model = LinearRegression::new(LinearRegressionConfig::new(2, 0.0));
        model.fit(x.view(), y.view()).unwrap();
        let test = array![[0.3], [-1.7]];
        let expected = test.column(0).mapv(|v| 1.5 * v * v - v + 2.0);
        assert_close(model.predict(test.view()).unwrap().view(), expected.view(), 1e-8);
    }

    #[test]
    fn ridge_shrinks_coefficients() {
        let x = array![[-1.0], [0.0], [1.0]];
        let y = array![-1.0, 0.0, 1.0];
        let mut plain = LinearRegression::default();
        plain.fit(x.view(), y.view()).unwrap();
        let mut ridge = LinearRegression::new(LinearRegressionConfig::new(1, 10.0));
        ridge.fit(x.view(), y.view()).unwrap();
        assert!(ridge.coefficients().unwrap()[0].abs() < plain.coefficients().unwrap()[0].abs());
    }

    #[test]
    fn collinear_without_ridge_is_singular() {
        let x = array![[1.0, 2.0], [2.0, 4.0], [3.0, 6.0]];
        let y = array![1.0, 2.0, 3.0];
        let mut model = LinearRegression::default();
        assert_eq!(model.fit(x.view(), y.view()), Err(RegressorError::Singular));
        assert!(!model.is_fitted());
    }

    #[rstest]
    #[case::linear(1)]
    #[case::quadratic(2)]
    fn predict_before_fit(#[case] degree: u8) {
        let model = LinearRegression::new(LinearRegressionConfig::new(degree, 0.0));
        assert_eq!(
            model.predict(array![[1.0, 2.0]].view()),
            Err(RegressorError::NotFitted)
        );
    }

    #[test]
    fn predict_wrong_columns() {
        let x = array![[0.0], [1.0]];
        let y = array![0.0, 1.0];
        let mut model = LinearRegression::default();
        model.fit(x.view(), y.view()).unwrap();
        assert_eq!(
            model.predict(array![[1.0, 2.0]].view()),
            Err(RegressorError::ColumnCount {
                expected: 1,
                actual: 2
            })
        );
    }
}
