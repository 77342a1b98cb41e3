//! Multipole synthesis along batched trajectories.

use numr::dtype::Complex128;
use numr::ops::ComplexOps;
use numr::runtime::Runtime;
use numr::tensor::Tensor;

use crate::binary::BinaryBatch;
use crate::error::{WaveformError, WaveformResult};
use crate::kernels::{KernelBuffer, WaveformKernels};
use crate::modes::ModeSet;
use crate::trajectory::Trajectory;

/// Complex modes `h_lm` of every binary, aligned with its trajectory.
#[derive(Debug, Clone)]
pub struct ModeTimeSeries<R: Runtime> {
    /// `[N, n_modes, T]` complex strain modes
    pub hlms: Tensor<R>,
    pub modes: ModeSet,
}

impl<R: Runtime> ModeTimeSeries<R> {
    /// Evaluate `modes` for every valid sample of `trajectory`.
    pub fn synthesize<C>(
        client: &C,
        batch: &BinaryBatch,
        trajectory: &Trajectory<R>,
        modes: &ModeSet,
    ) -> WaveformResult<Self>
    where
        C: WaveformKernels<R>,
    {
        let n = batch.len();
        if trajectory.batch_size() != n {
            return Err(WaveformError::invalid_input(format!(
                "ModeTimeSeries::synthesize: {} binaries but {} trajectories",
                n,
                trajectory.batch_size()
            )));
        }
        trajectory
            .lengths
            .check_truncated(&trajectory.states, "ModeTimeSeries::synthesize")?;

        // Mass fractions are derived here; the frequency row is unused
        let tensors = batch.to_tensors(client);
        let unused = Tensor::<R>::from_slice(&vec![0.0; n], &[n], client.device());
        let params = tensors.parameter_block(client, &unused)?;

        let t_len = trajectory.lengths.max_len();
        let mut out = KernelBuffer::<Complex128>::zeroed(n * modes.len() * t_len);
        client.evaluate_modes(&mut out, &trajectory.states, &params, &trajectory.lengths, modes)?;
        let hlms = out.into_tensor(client, &[n, modes.len(), t_len])?;

        tracing::debug!(batch = n, modes = modes.len(), samples = t_len, "modes synthesized");

        Ok(Self {
            hlms,
            modes: modes.clone(),
        })
    }

    pub fn n_modes(&self) -> usize {
        self.modes.len()
    }

    /// `[N, n_modes, T]` real parts.
    pub fn real<C: ComplexOps<R>>(&self, client: &C) -> WaveformResult<Tensor<R>> {
        Ok(client.real(&self.hlms)?)
    }

    /// `[N, n_modes, T]` imaginary parts.
    pub fn imag<C: ComplexOps<R>>(&self, client: &C) -> WaveformResult<Tensor<R>> {
        Ok(client.imag(&self.hlms)?)
    }
}
