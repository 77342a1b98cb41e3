use numr::dtype::Complex128;
use numr::ops::{ComplexOps, ScalarOps, ShapeOps, TensorOps};
use numr::runtime::{Runtime, RuntimeClient};
use numr::tensor::Tensor;

use crate::error::WaveformResult;
use crate::modes::ModeSet;
use crate::options::{IntegratorOptions, RootSolveOptions};
use crate::ragged::ValidLengths;

use super::{IntegrationOutput, KernelArgs, KernelBuffer, RootStatus};

/// Batched numerical kernels behind the waveform pipeline.
///
/// One implementation exists per backend client. Every kernel processes all
/// binaries of a batch in one call; per-binary numerical failures come back
/// as data rather than as an `Err`.
///
/// # Example
///
/// ```ignore
/// use eobwave::kernels::{KernelArgs, KernelBuffer, WaveformKernels};
/// use numr::runtime::cpu::{CpuClient, CpuDevice};
///
/// let device = CpuDevice::new();
/// let client = CpuClient::new(device.clone());
///
/// let mut out = KernelBuffer::<f64>::zeroed(2 * n);
/// let status = client.root_find_2d(&mut out, &x0, &args, &RootSolveOptions::default())?;
/// ```
pub trait WaveformKernels<R: Runtime>:
    TensorOps<R> + ScalarOps<R> + ShapeOps<R> + ComplexOps<R> + RuntimeClient<R>
{
    /// Solve the quasi-circular conditions for `(r, pphi)` at `pr = 0`.
    ///
    /// # Arguments
    /// * `out` - `[2, N]` buffer receiving `r` then `pphi`
    /// * `x0` - `[2, N]` starting point
    /// * `args` - shared kernel arguments (`state` rows are unused)
    fn root_find_2d(
        &self,
        out: &mut KernelBuffer<f64>,
        x0: &Tensor<R>,
        args: &KernelArgs<R>,
        options: &RootSolveOptions,
    ) -> WaveformResult<Vec<RootStatus>>;

    /// Solve the adiabatic inspiral condition for the radial momentum.
    ///
    /// # Arguments
    /// * `out` - `[N]` buffer receiving `pr`
    /// * `bracket` - `[2, N]` lower then upper bracket ends
    /// * `args` - `state` holds the circular `r` and `pphi`
    fn root_find_scalar(
        &self,
        out: &mut KernelBuffer<f64>,
        bracket: &Tensor<R>,
        args: &KernelArgs<R>,
        options: &RootSolveOptions,
    ) -> WaveformResult<Vec<RootStatus>>;

    /// Evaluate the requested multipoles along truncated trajectories.
    ///
    /// # Arguments
    /// * `out` - `[N, n_modes, T]` buffer receiving `h_lm`
    /// * `states` - `[N, 4, T]` truncated trajectories
    /// * `params` - `[5, N]` parameter block
    fn evaluate_modes(
        &self,
        out: &mut KernelBuffer<Complex128>,
        states: &Tensor<R>,
        params: &Tensor<R>,
        lengths: &ValidLengths,
        modes: &ModeSet,
    ) -> WaveformResult<()>;

    /// Integrate the equations of motion for every binary in lockstep.
    ///
    /// # Arguments
    /// * `initial_state` - `[4, N]` starting states
    /// * `params` - `[5, N]` parameter block
    fn integrate(
        &self,
        initial_state: &Tensor<R>,
        params: &Tensor<R>,
        options: &IntegratorOptions,
    ) -> WaveformResult<IntegrationOutput<R>>;
}
