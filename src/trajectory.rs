//! Orbital trajectories of a batch, truncated to the longest valid run.

use numr::runtime::Runtime;
use numr::tensor::Tensor;

use crate::binary::BinaryBatch;
use crate::error::WaveformResult;
use crate::initial_conditions::InitialConditions;
use crate::kernels::{StopReason, WaveformKernels};
use crate::options::IntegratorOptions;
use crate::ragged::ValidLengths;

/// Integrated orbital states of every binary.
///
/// All arrays share the sample extent `lengths.max_len()`. Samples past a
/// binary's own count are zero padding.
#[derive(Debug, Clone)]
pub struct Trajectory<R: Runtime> {
    /// `[N, T]` time since the start frequency in seconds
    pub time: Tensor<R>,
    /// `[N, 4, T]` states `r, phi, pr, pphi`
    pub states: Tensor<R>,
    pub lengths: ValidLengths,
    pub stop_reasons: Vec<StopReason>,
}

impl<R: Runtime> Trajectory<R> {
    /// Integrate from solved initial conditions.
    pub fn integrate<C>(
        client: &C,
        batch: &BinaryBatch,
        initial: &InitialConditions<R>,
        options: &IntegratorOptions,
    ) -> WaveformResult<Self>
    where
        C: WaveformKernels<R>,
    {
        let state = initial.initial_state(client)?;
        let raw = client.integrate(&state, &initial.params, options)?;
        let lengths = ValidLengths::new(raw.counts, options.max_step)?;

        let time_m = lengths.truncate(&raw.time)?;
        let states = lengths.truncate(&raw.states)?;

        let n = lengths.batch_size();
        let t_len = lengths.max_len();
        let unit = Tensor::<R>::from_slice(&batch.time_unit(), &[n, 1], client.device())
            .broadcast_to(&[n, t_len])?
            .contiguous();
        let time = client.mul(&time_m, &unit)?;

        let truncated: Vec<usize> = (0..n)
            .filter(|&i| raw.stop_reasons[i] == StopReason::Capacity)
            .collect();
        if !truncated.is_empty() {
            tracing::warn!(
                binaries = ?truncated,
                capacity = lengths.capacity(),
                "trajectory filled its allocation before the inspiral finished"
            );
        }
        tracing::debug!(batch = n, samples = t_len, "trajectories integrated");

        Ok(Self {
            time,
            states,
            lengths,
            stop_reasons: raw.stop_reasons,
        })
    }

    pub fn batch_size(&self) -> usize {
        self.lengths.batch_size()
    }

    /// `[N, 1, T]` orbital phase.
    pub fn phase(&self) -> WaveformResult<Tensor<R>> {
        Ok(self.states.narrow(1, 1, 1)?.contiguous())
    }

    /// `[N, 1, T]` separation in units of total mass.
    pub fn separation(&self) -> WaveformResult<Tensor<R>> {
        Ok(self.states.narrow(1, 0, 1)?.contiguous())
    }
}
