//! Fixed-step integration of ordinary differential equations.

/// One classical Runge-Kutta (RK4) step of `dy/dt = f(y)` with step size `h`.
pub fn rk4_step<F, const N: usize>(f: &F, y: &[f64; N], h: f64) -> [f64; N]
where
    F: Fn(&[f64; N]) -> [f64; N],
{
    let k1 = f(y);
    let k2 = f(&axpy(y, &k1, 0.5 * h));
    let k3 = f(&axpy(y, &k2, 0.5 * h));
    let k4 = f(&axpy(y, &k3, h));

    let mut next = *y;
    for i in 0..N {
        next[i] += h / 6.0 * (k1[i] + 2.0 * k2[i] + 2.0 * k3[i] + k4[i]);
    }
    next
}

/// Integrate `dy/dt = f(y)` over `duration` using `num_steps` equal RK4 steps.
///
/// # Panics
/// If `num_steps` is zero.
pub fn integrate<F, const N: usize>(f: F, y0: [f64; N], duration: f64, num_steps: usize) -> [f64; N]
where
    F: Fn(&[f64; N]) -> [f64; N],
{
    assert!(num_steps > 0, "num_steps must be positive");
    let h = duration / num_steps as f64;
    (0..num_steps).fold(y0, |y, _| rk4_step(&f, &y, h))
}

/// `y + a * x`
fn axpy<const N: usize>(y: &[f64; N], x: &[f64; N], a: f64) -> [f64; N] {
    let mut out = *y;
    for (o, xi) in out.iter_mut().zip(x) {
        *o += a * xi;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exponential_decay() {
        // dy/dt = -y, y(0) = 1 -> y(1) = e^-1
        let [y] = integrate(|&[y]: &[f64; 1]| [-y], [1.0], 1.0, 100);
        assert!((y - (-1.0f64).exp()).abs() < 1e-9);
    }

    #[test]
    fn harmonic_oscillator_energy() {
        // x'' = -x
        let f = |&[x, v]: &[f64; 2]| [v, -x];
        let [x, v] = integrate(f, [1.0, 0.0], std::f64::consts::PI, 1000);
        assert!((x + 1.0).abs() < 1e-6);
        assert!(v.abs() < 1e-6);
    }

    #[test]
    fn single_step_linear_exact() {
        // Constant derivative is integrated exactly
        let y = rk4_step(&|_: &[f64; 2]| [1.0, -2.0], &[0.0, 0.0], 0.5);
        assert!((y[0] - 0.5).abs() < 1e-12);
        assert!((y[1] + 1.0).abs() < 1e-12);
    }
}
