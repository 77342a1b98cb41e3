//! Types shared by the waveform kernels.

use std::fmt;

use numr::dtype::Complex128;
use numr::runtime::{Runtime, RuntimeClient};
use numr::tensor::Tensor;

use crate::error::{WaveformError, WaveformResult};

/// Inputs shared by the initial-condition kernels.
///
/// * `state` - `[4, N]`: rows are `r, phi, pr, pphi`
/// * `params` - `[5, N]`: rows are `m1/M, m2/M, chi1, chi2, omega0`
#[derive(Debug, Clone)]
pub struct KernelArgs<R: Runtime> {
    pub state: Tensor<R>,
    pub params: Tensor<R>,
}

/// Per-binary outcome of a root solve.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RootStatus {
    /// Converged within tolerance.
    Converged { iterations: usize },
    /// Iteration cap reached before convergence.
    MaxIterations { iterations: usize, residual: f64 },
    /// Backtracking could not reduce the residual.
    Stalled { iterations: usize, residual: f64 },
    /// Finite-difference Jacobian was singular.
    SingularJacobian { iterations: usize },
    /// Objective has the same sign at both bracket ends.
    BracketSignMismatch { f_low: f64, f_high: f64 },
    /// Objective evaluated to NaN or infinity.
    NonFinite { iterations: usize },
}

impl RootStatus {
    pub fn is_converged(&self) -> bool {
        matches!(self, Self::Converged { .. })
    }
}

impl fmt::Display for RootStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Converged { iterations } => write!(f, "converged after {} iterations", iterations),
            Self::MaxIterations {
                iterations,
                residual,
            } => write!(
                f,
                "did not converge after {} iterations (residual {:e})",
                iterations, residual
            ),
            Self::Stalled {
                iterations,
                residual,
            } => write!(
                f,
                "line search stalled after {} iterations (residual {:e})",
                iterations, residual
            ),
            Self::SingularJacobian { iterations } => {
                write!(f, "singular Jacobian at iteration {}", iterations)
            }
            Self::BracketSignMismatch { f_low, f_high } => write!(
                f,
                "bracket does not contain a sign change: f(low) = {:e}, f(high) = {:e}",
                f_low, f_high
            ),
            Self::NonFinite { iterations } => {
                write!(f, "non-finite objective at iteration {}", iterations)
            }
        }
    }
}

/// Why an element of the batch stopped integrating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StopReason {
    /// Separation fell to the stopping radius.
    Separation,
    /// Integration time reached `t_max`.
    MaxTime,
    /// Allocated sample capacity exhausted.
    Capacity,
    /// Non-finite state.
    NonFinite,
    /// Step size fell below the resolvable minimum.
    StepCollapse,
}

/// Raw output of the batched integrator.
///
/// Samples beyond `counts[i]` are zero.
#[derive(Debug, Clone)]
pub struct IntegrationOutput<R: Runtime> {
    /// `[N, capacity]` times in units of total mass
    pub time: Tensor<R>,
    /// `[N, 4, capacity]` states `r, phi, pr, pphi`
    pub states: Tensor<R>,
    /// Valid samples per binary, initial state included
    pub counts: Vec<usize>,
    pub stop_reasons: Vec<StopReason>,
}

/// Preallocated host buffer a kernel writes its result into.
///
/// Kernels fill the buffer in place; the caller turns it into a tensor once
/// the kernel returns.
#[derive(Debug, Clone, PartialEq)]
pub struct KernelBuffer<T> {
    data: Vec<T>,
}

impl<T: Copy> KernelBuffer<T> {
    pub fn filled(len: usize, value: T) -> Self {
        Self {
            data: vec![value; len],
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    fn check_shape(&self, shape: &[usize]) -> WaveformResult<()> {
        let expected: usize = shape.iter().product();
        if expected != self.data.len() {
            return Err(WaveformError::invalid_input(format!(
                "KernelBuffer: {} elements cannot be viewed as {:?}",
                self.data.len(),
                shape
            )));
        }
        Ok(())
    }
}

impl KernelBuffer<f64> {
    pub fn zeroed(len: usize) -> Self {
        Self::filled(len, 0.0)
    }

    /// Upload as a tensor of the given shape.
    pub fn into_tensor<R, C>(self, client: &C, shape: &[usize]) -> WaveformResult<Tensor<R>>
    where
        R: Runtime,
        C: RuntimeClient<R>,
    {
        self.check_shape(shape)?;
        Ok(Tensor::<R>::from_slice(&self.data, shape, client.device()))
    }
}

impl KernelBuffer<Complex128> {
    pub fn zeroed(len: usize) -> Self {
        Self::filled(len, Complex128::new(0.0, 0.0))
    }

    /// Upload as a complex tensor of the given shape.
    pub fn into_tensor<R, C>(self, client: &C, shape: &[usize]) -> WaveformResult<Tensor<R>>
    where
        R: Runtime,
        C: RuntimeClient<R>,
    {
        self.check_shape(shape)?;
        Ok(Tensor::<R>::from_slice(&self.data, shape, client.device()))
    }
}
