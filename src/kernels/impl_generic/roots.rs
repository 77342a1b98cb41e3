//! Batched root solvers for the initial conditions.
//!
//! Each binary is solved independently; the batch is walked on the host and
//! every element reports its own [`RootStatus`].

use numr::runtime::{Runtime, RuntimeClient};
use numr::tensor::Tensor;

use crate::constants::{PARAM_DIM, STATE_DIM};
use crate::error::{WaveformError, WaveformResult};
use crate::kernels::traits::{KernelArgs, KernelBuffer, RootStatus};
use crate::options::RootSolveOptions;

use super::flux::radiation_reaction;
use super::hamiltonian::{BinaryParams, circular_pphi_slope, circular_residual, hamiltonian};
use super::read_block;

/// Determinant magnitude below which the 2x2 Jacobian is treated as singular.
const SINGULAR_THRESHOLD: f64 = 1e-300;

/// Maximum step halvings in the Newton line search.
const MAX_BACKTRACKS: usize = 40;

/// Solve the circular-orbit conditions for every binary.
pub fn root_find_2d_impl<R, C>(
    _client: &C,
    out: &mut KernelBuffer<f64>,
    x0: &Tensor<R>,
    args: &KernelArgs<R>,
    options: &RootSolveOptions,
) -> WaveformResult<Vec<RootStatus>>
where
    R: Runtime,
    C: RuntimeClient<R>,
{
    let (params, n) = read_block(&args.params, PARAM_DIM, "root_find_2d: params")?;
    let (guess, n_guess) = read_block(x0, 2, "root_find_2d: x0")?;
    if n_guess != n || out.len() != 2 * n {
        return Err(WaveformError::invalid_input(format!(
            "root_find_2d: batch mismatch (params {}, x0 {}, out {})",
            n,
            n_guess,
            out.len()
        )));
    }

    let out = out.as_mut_slice();
    let mut statuses = Vec::with_capacity(n);

    for i in 0..n {
        let (binary, omega0) = BinaryParams::from_block(&params, n, i);
        let (x, status) = damped_newton_2d(
            |x| circular_residual(&binary, omega0, x[0], x[1]),
            [guess[i], guess[n + i]],
            options,
        );
        out[i] = x[0];
        out[n + i] = x[1];
        statuses.push(status);
    }

    Ok(statuses)
}

/// Solve the adiabatic inspiral condition for the radial momentum of every
/// binary.
///
/// The objective is `dH/dpr - F_phi / (dpphi/dr)`: the radial velocity the
/// momentum generates must match the shrinkage rate of the circular orbit
/// under radiation reaction.
pub fn root_find_scalar_impl<R, C>(
    _client: &C,
    out: &mut KernelBuffer<f64>,
    bracket: &Tensor<R>,
    args: &KernelArgs<R>,
    options: &RootSolveOptions,
) -> WaveformResult<Vec<RootStatus>>
where
    R: Runtime,
    C: RuntimeClient<R>,
{
    let (params, n) = read_block(&args.params, PARAM_DIM, "root_find_scalar: params")?;
    let (state, n_state) = read_block(&args.state, STATE_DIM, "root_find_scalar: state")?;
    let (ends, n_bracket) = read_block(bracket, 2, "root_find_scalar: bracket")?;
    if n_state != n || n_bracket != n || out.len() != n {
        return Err(WaveformError::invalid_input(format!(
            "root_find_scalar: batch mismatch (params {}, state {}, bracket {}, out {})",
            n,
            n_state,
            n_bracket,
            out.len()
        )));
    }

    let out = out.as_mut_slice();
    let mut statuses = Vec::with_capacity(n);

    for i in 0..n {
        let (binary, _) = BinaryParams::from_block(&params, n, i);
        let r = state[i];
        let pphi = state[3 * n + i];
        let slope = circular_pphi_slope(&binary, r, pphi, options.fd_eps);
        let nu = binary.nu();

        let objective = |pr: f64| {
            let partials = hamiltonian(&binary, r, pr, pphi);
            let (_, f_phi) = radiation_reaction(nu, partials.dh_dpphi, pr, pphi);
            partials.dh_dpr - f_phi / slope
        };

        let (pr, status) = ridder(objective, ends[i], ends[n + i], options);
        out[i] = pr;
        statuses.push(status);
    }

    Ok(statuses)
}

fn norm2(v: [f64; 2]) -> f64 {
    v[0].hypot(v[1])
}

/// Newton's method on a 2x2 system with a central-difference Jacobian and
/// step halving whenever the full step does not reduce the residual.
pub(crate) fn damped_newton_2d<F>(f: F, x0: [f64; 2], options: &RootSolveOptions) -> ([f64; 2], RootStatus)
where
    F: Fn([f64; 2]) -> [f64; 2],
{
    let mut x = x0;
    let mut fx = f(x);

    for iter in 0..options.max_iter {
        let res_norm = norm2(fx);
        if !res_norm.is_finite() {
            return (x, RootStatus::NonFinite { iterations: iter });
        }
        if res_norm < options.tol {
            return (x, RootStatus::Converged { iterations: iter });
        }

        // Central-difference Jacobian, column j = dF/dx_j
        let mut jac = [[0.0; 2]; 2];
        for j in 0..2 {
            let h = options.fd_eps * x[j].abs().max(1.0);
            let mut xp = x;
            let mut xm = x;
            xp[j] += h;
            xm[j] -= h;
            let fp = f(xp);
            let fm = f(xm);
            for row in 0..2 {
                jac[row][j] = (fp[row] - fm[row]) / (2.0 * h);
            }
        }

        let det = jac[0][0] * jac[1][1] - jac[0][1] * jac[1][0];
        if !det.is_finite() {
            return (x, RootStatus::NonFinite { iterations: iter });
        }
        if det.abs() < SINGULAR_THRESHOLD {
            return (x, RootStatus::SingularJacobian { iterations: iter });
        }

        // dx = -J^{-1} F
        let dx = [
            -(jac[1][1] * fx[0] - jac[0][1] * fx[1]) / det,
            -(-jac[1][0] * fx[0] + jac[0][0] * fx[1]) / det,
        ];

        let mut lambda = 1.0;
        let mut accepted = None;
        for _ in 0..MAX_BACKTRACKS {
            let trial = [x[0] + lambda * dx[0], x[1] + lambda * dx[1]];
            let f_trial = f(trial);
            let trial_norm = norm2(f_trial);
            if trial[0] > 0.0 && trial_norm.is_finite() && trial_norm < res_norm {
                accepted = Some((trial, f_trial));
                break;
            }
            lambda *= 0.5;
        }

        let step_norm = lambda * norm2(dx);
        match accepted {
            Some((trial, f_trial)) => {
                x = trial;
                fx = f_trial;
            }
            None => {
                // A vanishing Newton step at a residual floor is convergence
                if norm2(dx) < options.tol * (1.0 + norm2(x)) {
                    return (x, RootStatus::Converged { iterations: iter + 1 });
                }
                return (
                    x,
                    RootStatus::Stalled {
                        iterations: iter + 1,
                        residual: res_norm,
                    },
                );
            }
        }

        if step_norm < options.tol * (1.0 + norm2(x)) {
            return (x, RootStatus::Converged { iterations: iter + 1 });
        }
    }

    (
        x,
        RootStatus::MaxIterations {
            iterations: options.max_iter,
            residual: norm2(fx),
        },
    )
}

/// Ridder's method on `[a, b]`.
///
/// A bracket without a sign change is reported rather than widened.
pub(crate) fn ridder<F>(f: F, a: f64, b: f64, options: &RootSolveOptions) -> (f64, RootStatus)
where
    F: Fn(f64) -> f64,
{
    let mut fa = f(a);
    let mut fb = f(b);

    if !fa.is_finite() || !fb.is_finite() {
        return (f64::NAN, RootStatus::NonFinite { iterations: 0 });
    }
    if fa == 0.0 {
        return (a, RootStatus::Converged { iterations: 0 });
    }
    if fb == 0.0 {
        return (b, RootStatus::Converged { iterations: 0 });
    }
    if fa.signum() == fb.signum() {
        return (
            f64::NAN,
            RootStatus::BracketSignMismatch {
                f_low: fa,
                f_high: fb,
            },
        );
    }

    let mut a = a;
    let mut b = b;
    let mut x = 0.5 * (a + b);
    let mut fx = f64::NAN;

    for iter in 0..options.max_iter {
        let c = 0.5 * (a + b);
        let fc = f(c);
        if !fc.is_finite() {
            return (c, RootStatus::NonFinite { iterations: iter + 1 });
        }

        let denom = (fc * fc - fa * fb).sqrt();
        if denom == 0.0 {
            return (c, RootStatus::Converged { iterations: iter + 1 });
        }

        let s = if fa >= fb { 1.0 } else { -1.0 };
        let x_new = c + (c - a) * s * fc / denom;
        let f_new = f(x_new);
        if !f_new.is_finite() {
            return (x_new, RootStatus::NonFinite { iterations: iter + 1 });
        }

        let moved = (x_new - x).abs();
        x = x_new;
        fx = f_new;

        if f_new == 0.0 || (iter > 0 && moved <= options.tol) {
            return (x, RootStatus::Converged { iterations: iter + 1 });
        }

        // Keep a sign-changing bracket around x
        if fc.signum() != f_new.signum() {
            a = c;
            fa = fc;
            b = x_new;
            fb = f_new;
        } else if fa.signum() != f_new.signum() {
            b = x_new;
            fb = f_new;
        } else {
            a = x_new;
            fa = f_new;
        }

        if (b - a).abs() <= options.tol {
            return (x, RootStatus::Converged { iterations: iter + 1 });
        }
    }

    (
        x,
        RootStatus::MaxIterations {
            iterations: options.max_iter,
            residual: fx.abs(),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_newton_2d_linear_system() {
        // x + y = 3, x - y = 1
        let opts = RootSolveOptions::default();
        let (x, status) = damped_newton_2d(|x| [x[0] + x[1] - 3.0, x[0] - x[1] - 1.0], [1.0, 0.0], &opts);
        assert!(status.is_converged());
        assert!((x[0] - 2.0).abs() < 1e-10);
        assert!((x[1] - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_newton_2d_nonlinear_system() {
        // x^2 + y^2 = 4, x = y, positive branch
        let opts = RootSolveOptions::default();
        let (x, status) =
            damped_newton_2d(|x| [x[0] * x[0] + x[1] * x[1] - 4.0, x[0] - x[1]], [1.0, 2.0], &opts);
        assert!(status.is_converged());
        let expected = 2.0f64.sqrt();
        assert!((x[0] - expected).abs() < 1e-10);
        assert!((x[1] - expected).abs() < 1e-10);
    }

    #[test]
    fn test_newton_2d_iteration_cap() {
        let opts = RootSolveOptions::with_limits(2, 1e-14);
        let (_, status) = damped_newton_2d(
            |x| [x[0].exp() - 10.0, x[1] * x[1] * x[1] - 8.0],
            [1.0, 10.0],
            &opts,
        );
        assert!(matches!(status, RootStatus::MaxIterations { iterations: 2, .. }));
    }

    #[test]
    fn test_ridder_cubic() {
        // x^3 - x - 2 has a root near 1.5214
        let opts = RootSolveOptions::default();
        let (root, status) = ridder(|x| x * x * x - x - 2.0, 1.0, 2.0, &opts);
        assert!(status.is_converged());
        assert!((root - 1.521_379_706_804_568).abs() < 1e-10);
    }

    #[test]
    fn test_ridder_reports_sign_mismatch() {
        let opts = RootSolveOptions::default();
        let (root, status) = ridder(|x| x * x + 1.0, -1.0, 1.0, &opts);
        assert!(root.is_nan());
        assert_eq!(
            status,
            RootStatus::BracketSignMismatch {
                f_low: 2.0,
                f_high: 2.0
            }
        );
    }
}
