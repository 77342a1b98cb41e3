//! Packing of batched modes into a single feature tensor.
//!
//! ```text
//! features[b, k, j]               = Re h_k(b, j)      k < n_modes
//! features[b, n_modes + k, j]     = Im h_k(b, j)
//! features[b, 2 n_modes, j]       = phi(b, j)
//! ```

use numr::dtype::Complex128;
use numr::ops::{ComplexOps, TensorOps};
use numr::runtime::{Runtime, RuntimeClient};
use numr::tensor::Tensor;

use crate::error::{WaveformError, WaveformResult};
use crate::initial_conditions::ConvergenceFailure;
use crate::kernels::StopReason;
use crate::modes::ModeSet;
use crate::multipoles::ModeTimeSeries;
use crate::ragged::ValidLengths;
use crate::trajectory::Trajectory;

/// Assembled waveform batch.
#[derive(Debug, Clone)]
pub struct WaveformOutput<R: Runtime> {
    /// `[N, 2 n_modes + 1, T]` real parts, imaginary parts and orbital phase
    pub features: Tensor<R>,
    /// `[N, T]` time in seconds
    pub time: Tensor<R>,
    pub lengths: ValidLengths,
    pub modes: ModeSet,
    pub failures: Vec<ConvergenceFailure>,
    pub stop_reasons: Vec<StopReason>,
}

/// Concatenate modes and phase along the channel axis.
pub fn assemble<R, C>(
    client: &C,
    trajectory: &Trajectory<R>,
    series: &ModeTimeSeries<R>,
    failures: Vec<ConvergenceFailure>,
) -> WaveformResult<WaveformOutput<R>>
where
    R: Runtime,
    C: TensorOps<R> + ComplexOps<R> + RuntimeClient<R>,
{
    let lengths = &trajectory.lengths;
    let hlms = lengths.truncate(&series.hlms)?;
    let time = lengths.truncate(&trajectory.time)?;
    let phase = lengths.truncate(&trajectory.phase()?)?;

    let real = client.real(&hlms)?;
    let imag = client.imag(&hlms)?;
    let features = client.cat(&[&real, &imag, &phase], 1)?;

    let expected = [lengths.batch_size(), 2 * series.n_modes() + 1, lengths.max_len()];
    if features.shape() != &expected[..] {
        return Err(WaveformError::invalid_input(format!(
            "assemble: features {:?}, expected {:?}",
            features.shape(),
            expected
        )));
    }

    Ok(WaveformOutput {
        features,
        time,
        lengths: lengths.clone(),
        modes: series.modes.clone(),
        failures,
        stop_reasons: trajectory.stop_reasons.clone(),
    })
}

impl<R: Runtime> WaveformOutput<R> {
    pub fn batch_size(&self) -> usize {
        self.lengths.batch_size()
    }

    pub fn n_modes(&self) -> usize {
        self.modes.len()
    }

    /// Sample extent of every array, the batch maximum valid count.
    pub fn n_samples(&self) -> usize {
        self.lengths.max_len()
    }

    /// Binaries whose integration ran out of allocated samples.
    pub fn truncated(&self) -> Vec<usize> {
        truncated(&self.stop_reasons)
    }

    /// Copy everything to host memory.
    pub fn to_host(&self) -> HostWaveform {
        HostWaveform {
            features: self.features.contiguous().to_vec(),
            time: self.time.contiguous().to_vec(),
            counts: self.lengths.counts().to_vec(),
            capacity: self.lengths.capacity(),
            ells: self.modes.ells().to_vec(),
            mms: self.modes.mms().to_vec(),
            failures: self.failures.clone(),
            stop_reasons: self.stop_reasons.clone(),
        }
    }
}

/// Host copy of a [`WaveformOutput`].
#[derive(Debug, Clone, PartialEq)]
pub struct HostWaveform {
    /// Row-major `[N, 2 n_modes + 1, T]`
    pub features: Vec<f64>,
    /// Row-major `[N, T]`
    pub time: Vec<f64>,
    pub counts: Vec<usize>,
    pub capacity: usize,
    pub ells: Vec<i32>,
    pub mms: Vec<i32>,
    pub failures: Vec<ConvergenceFailure>,
    pub stop_reasons: Vec<StopReason>,
}

impl HostWaveform {
    pub fn batch_size(&self) -> usize {
        self.counts.len()
    }

    pub fn n_modes(&self) -> usize {
        self.ells.len()
    }

    pub fn n_channels(&self) -> usize {
        2 * self.n_modes() + 1
    }

    pub fn n_samples(&self) -> usize {
        self.counts.iter().copied().max().unwrap_or(0)
    }

    /// Feature channel `c` of binary `b` at sample `j`.
    pub fn feature(&self, b: usize, c: usize, j: usize) -> f64 {
        let t = self.n_samples();
        self.features[(b * self.n_channels() + c) * t + j]
    }

    /// Complex value of mode `k` of binary `b` at sample `j`.
    pub fn mode_value(&self, b: usize, k: usize, j: usize) -> Complex128 {
        Complex128::new(self.feature(b, k, j), self.feature(b, k + self.n_modes(), j))
    }

    /// Orbital phase of binary `b` at sample `j`.
    pub fn phase(&self, b: usize, j: usize) -> f64 {
        self.feature(b, 2 * self.n_modes(), j)
    }

    /// Time in seconds of binary `b` at sample `j`.
    pub fn time(&self, b: usize, j: usize) -> f64 {
        self.time[b * self.n_samples() + j]
    }

    /// Row-major `[N, T]` validity mask.
    pub fn valid_mask(&self) -> Vec<bool> {
        let t = self.n_samples();
        self.counts
            .iter()
            .flat_map(|&count| (0..t).map(move |j| j < count))
            .collect()
    }

    /// Binaries whose trajectory filled the allocation.
    pub fn saturated(&self) -> Vec<usize> {
        (0..self.counts.len())
            .filter(|&i| self.counts[i] == self.capacity)
            .collect()
    }

    /// Binaries whose integration ran out of allocated samples.
    pub fn truncated(&self) -> Vec<usize> {
        truncated(&self.stop_reasons)
    }
}

fn truncated(stop_reasons: &[StopReason]) -> Vec<usize> {
    stop_reasons
        .iter()
        .enumerate()
        .filter(|(_, reason)| **reason == StopReason::Capacity)
        .map(|(i, _)| i)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use numr::runtime::cpu::{CpuClient, CpuDevice, CpuRuntime};

    /// Two binaries, capacity 4, valid counts 2 and 3, one (2, 2) mode.
    fn synthetic(device: &CpuDevice) -> (Trajectory<CpuRuntime>, ModeTimeSeries<CpuRuntime>) {
        let lengths = ValidLengths::new(vec![2, 3], 4).unwrap();
        let t_len = lengths.max_len();

        let time = Tensor::<CpuRuntime>::from_slice(&[0.0, 1.0, 0.0, 0.0, 1.0, 2.0], &[2, t_len], device);
        let mut states = Vec::new();
        for b in 0..2 {
            let phi = [0.1 * b as f64, 0.2, 0.3];
            states.extend_from_slice(&[10.0; 3]);
            states.extend_from_slice(&phi);
            states.extend_from_slice(&[0.0; 3]);
            states.extend_from_slice(&[3.0; 3]);
        }
        let states = Tensor::<CpuRuntime>::from_slice(&states, &[2, 4, t_len], device);
        let trajectory = Trajectory {
            time,
            states,
            lengths,
            stop_reasons: vec![StopReason::Separation; 2],
        };

        let hlms: Vec<Complex128> = (0..2 * t_len)
            .map(|i| Complex128::new(i as f64 + 1.0, -(i as f64) - 0.5))
            .collect();
        let series = ModeTimeSeries {
            hlms: Tensor::<CpuRuntime>::from_slice(&hlms, &[2, 1, t_len], device),
            modes: ModeSet::validate(Some(&[(2, 2)])).unwrap(),
        };
        (trajectory, series)
    }

    #[test]
    fn test_channels_reconstruct_modes() {
        let device = CpuDevice::new();
        let client = CpuClient::new(device.clone());
        let (trajectory, series) = synthetic(&device);

        let output = assemble(&client, &trajectory, &series, Vec::new()).unwrap();
        assert_eq!(output.features.shape(), &[2, 3, 3]);
        assert_eq!(output.time.shape(), &[2, 3]);

        let host = output.to_host();
        assert_eq!(host.n_channels(), 3);
        for b in 0..2 {
            for j in 0..3 {
                let value = host.mode_value(b, 0, j);
                let i = (b * 3 + j) as f64;
                assert_eq!(value.re, i + 1.0);
                assert_eq!(value.im, -i - 0.5);
            }
        }
        assert_eq!(host.phase(1, 0), 0.1);
        assert_eq!(host.phase(0, 2), 0.3);
        assert_eq!(host.time(1, 2), 2.0);
    }

    #[test]
    fn test_valid_mask_matches_counts() {
        let device = CpuDevice::new();
        let client = CpuClient::new(device.clone());
        let (trajectory, series) = synthetic(&device);

        let host = assemble(&client, &trajectory, &series, Vec::new())
            .unwrap()
            .to_host();
        assert_eq!(
            host.valid_mask(),
            vec![true, true, false, true, true, true]
        );
        assert_eq!(host.n_samples(), 3);
        assert!(host.saturated().is_empty());
    }

    #[test]
    fn test_separation_on_last_sample_is_not_truncated() {
        let device = CpuDevice::new();
        let client = CpuClient::new(device.clone());
        let (mut trajectory, series) = synthetic(&device);
        // Both binaries fill a capacity of 3, only one was cut short
        trajectory.lengths = ValidLengths::new(vec![3, 3], 3).unwrap();
        trajectory.stop_reasons = vec![StopReason::Separation, StopReason::Capacity];

        let output = assemble(&client, &trajectory, &series, Vec::new()).unwrap();
        assert_eq!(output.lengths.saturated(), vec![0, 1]);
        assert_eq!(output.truncated(), vec![1]);

        let host = output.to_host();
        assert_eq!(host.saturated(), vec![0, 1]);
        assert_eq!(host.truncated(), vec![1]);
    }
}
