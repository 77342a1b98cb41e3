//! Physical parameters of a batch of aligned-spin binaries.

use numr::ops::{ScalarOps, TensorOps};
use numr::runtime::{Runtime, RuntimeClient};
use numr::tensor::Tensor;

use crate::constants::MTSUN_SI;
use crate::error::{WaveformError, WaveformResult};

/// Parallel per-binary arrays of component masses (solar masses) and
/// dimensionless aligned spins.
///
/// The mass ordering is free: `m1 < m2` is accepted as-is.
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryBatch {
    m1: Vec<f64>,
    m2: Vec<f64>,
    chi1: Vec<f64>,
    chi2: Vec<f64>,
}

impl BinaryBatch {
    /// Build a batch, checking shapes and physical ranges.
    ///
    /// # Errors
    /// * `InvalidInput` for empty or mismatched arrays, non-positive masses,
    ///   or spins outside [-1, 1]
    pub fn new(m1: Vec<f64>, m2: Vec<f64>, chi1: Vec<f64>, chi2: Vec<f64>) -> WaveformResult<Self> {
        let n = m1.len();
        if n == 0 {
            return Err(WaveformError::invalid_input("BinaryBatch::new: empty batch"));
        }
        if m2.len() != n || chi1.len() != n || chi2.len() != n {
            return Err(WaveformError::invalid_input(format!(
                "BinaryBatch::new: array lengths differ (m1 {}, m2 {}, chi1 {}, chi2 {})",
                n,
                m2.len(),
                chi1.len(),
                chi2.len()
            )));
        }

        for i in 0..n {
            if !(m1[i].is_finite() && m1[i] > 0.0 && m2[i].is_finite() && m2[i] > 0.0) {
                return Err(WaveformError::invalid_input(format!(
                    "BinaryBatch::new: binary {} has non-positive mass ({}, {})",
                    i, m1[i], m2[i]
                )));
            }
            if !(chi1[i].abs() <= 1.0 && chi2[i].abs() <= 1.0) {
                return Err(WaveformError::invalid_input(format!(
                    "BinaryBatch::new: binary {} has spin outside [-1, 1] ({}, {})",
                    i, chi1[i], chi2[i]
                )));
            }
        }

        Ok(Self { m1, m2, chi1, chi2 })
    }

    /// A batch of `n` copies of the same binary.
    pub fn uniform(n: usize, m1: f64, m2: f64, chi1: f64, chi2: f64) -> WaveformResult<Self> {
        Self::new(vec![m1; n], vec![m2; n], vec![chi1; n], vec![chi2; n])
    }

    pub fn len(&self) -> usize {
        self.m1.len()
    }

    pub fn is_empty(&self) -> bool {
        self.m1.is_empty()
    }

    pub fn m1(&self) -> &[f64] {
        &self.m1
    }

    pub fn m2(&self) -> &[f64] {
        &self.m2
    }

    pub fn chi1(&self) -> &[f64] {
        &self.chi1
    }

    pub fn chi2(&self) -> &[f64] {
        &self.chi2
    }

    /// Total masses in solar masses.
    pub fn total_mass(&self) -> Vec<f64> {
        self.m1.iter().zip(&self.m2).map(|(a, b)| a + b).collect()
    }

    /// Geometric time unit `M * MTSUN_SI` in seconds, per binary.
    pub fn time_unit(&self) -> Vec<f64> {
        self.total_mass().iter().map(|m| m * MTSUN_SI).collect()
    }

    /// Upload the four parameter arrays as 1-D tensors of shape [N].
    pub fn to_tensors<R, C>(&self, client: &C) -> BatchTensors<R>
    where
        R: Runtime,
        C: RuntimeClient<R>,
    {
        let n = self.len();
        let device = client.device();
        BatchTensors {
            m1: Tensor::<R>::from_slice(&self.m1, &[n], device),
            m2: Tensor::<R>::from_slice(&self.m2, &[n], device),
            chi1: Tensor::<R>::from_slice(&self.chi1, &[n], device),
            chi2: Tensor::<R>::from_slice(&self.chi2, &[n], device),
        }
    }
}

/// Device-resident copies of a [`BinaryBatch`].
#[derive(Debug, Clone)]
pub struct BatchTensors<R: Runtime> {
    pub m1: Tensor<R>,
    pub m2: Tensor<R>,
    pub chi1: Tensor<R>,
    pub chi2: Tensor<R>,
}

impl<R: Runtime> BatchTensors<R> {
    /// Kernel parameter block `[5, N]`: mass fractions, spins and the
    /// orbital frequency row.
    pub fn parameter_block<C>(&self, client: &C, omega0: &Tensor<R>) -> WaveformResult<Tensor<R>>
    where
        C: TensorOps<R> + RuntimeClient<R>,
    {
        let total = client.add(&self.m1, &self.m2)?;
        let x1 = client.div(&self.m1, &total)?;
        let x2 = client.div(&self.m2, &total)?;
        Ok(client.stack(&[&x1, &x2, &self.chi1, &self.chi2, omega0], 0)?)
    }

    /// Orbital frequency `pi f M MTSUN_SI` in units of total mass for a GW
    /// frequency `f` in Hz.
    pub fn orbital_frequency<C>(&self, client: &C, frequencies: &Tensor<R>) -> WaveformResult<Tensor<R>>
    where
        C: TensorOps<R> + ScalarOps<R> + RuntimeClient<R>,
    {
        let total = client.add(&self.m1, &self.m2)?;
        let scaled = client.mul_scalar(frequencies, std::f64::consts::PI * MTSUN_SI)?;
        Ok(client.mul(&scaled, &total)?)
    }
}

/// Starting gravitational-wave frequency in Hz.
#[derive(Debug, Clone, PartialEq)]
pub enum StartFrequency {
    /// One frequency for every binary.
    Shared(f64),
    /// One frequency per binary.
    PerBinary(Vec<f64>),
}

impl StartFrequency {
    /// Expand to one frequency per binary.
    pub fn resolve(&self, batch_size: usize) -> WaveformResult<Vec<f64>> {
        let values = match self {
            Self::Shared(f) => vec![*f; batch_size],
            Self::PerBinary(fs) => {
                if fs.len() != batch_size {
                    return Err(WaveformError::invalid_input(format!(
                        "StartFrequency::resolve: {} frequencies for {} binaries",
                        fs.len(),
                        batch_size
                    )));
                }
                fs.clone()
            }
        };

        if let Some(bad) = values.iter().find(|f| !(f.is_finite() && **f > 0.0)) {
            return Err(WaveformError::invalid_input(format!(
                "StartFrequency::resolve: frequency must be positive, got {}",
                bad
            )));
        }
        Ok(values)
    }
}

impl Default for StartFrequency {
    fn default() -> Self {
        Self::Shared(10.0)
    }
}

impl From<f64> for StartFrequency {
    fn from(f: f64) -> Self {
        Self::Shared(f)
    }
}

impl From<Vec<f64>> for StartFrequency {
    fn from(fs: Vec<f64>) -> Self {
        Self::PerBinary(fs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use numr::runtime::cpu::{CpuClient, CpuDevice, CpuRuntime};

    #[test]
    fn test_batch_validation() {
        assert!(BinaryBatch::new(vec![8.0], vec![2.0], vec![0.6], vec![0.05]).is_ok());
        // Unordered masses are fine
        assert!(BinaryBatch::new(vec![2.0], vec![8.0], vec![0.0], vec![0.0]).is_ok());

        let mismatched = BinaryBatch::new(vec![8.0, 8.0], vec![2.0], vec![0.0], vec![0.0]);
        assert!(matches!(mismatched, Err(WaveformError::InvalidInput { .. })));

        let bad_spin = BinaryBatch::new(vec![8.0], vec![2.0], vec![1.2], vec![0.0]);
        assert!(matches!(bad_spin, Err(WaveformError::InvalidInput { .. })));

        let bad_mass = BinaryBatch::new(vec![-1.0], vec![2.0], vec![0.0], vec![0.0]);
        assert!(matches!(bad_mass, Err(WaveformError::InvalidInput { .. })));

        let empty = BinaryBatch::new(vec![], vec![], vec![], vec![]);
        assert!(matches!(empty, Err(WaveformError::InvalidInput { .. })));
    }

    #[test]
    fn test_parameter_block() {
        let device = CpuDevice::new();
        let client = CpuClient::new(device.clone());
        let batch = BinaryBatch::new(vec![8.0, 5.0], vec![2.0, 5.0], vec![0.6, 0.0], vec![0.05, 0.0]).unwrap();
        let tensors = batch.to_tensors(&client);

        let f = Tensor::<CpuRuntime>::from_slice(&[10.0, 20.0], &[2], &device);
        let omega = tensors.orbital_frequency(&client, &f).unwrap();
        let block = tensors.parameter_block(&client, &omega).unwrap();
        assert_eq!(block.shape(), &[5, 2]);

        let values: Vec<f64> = block.to_vec();
        assert!((values[0] - 0.8).abs() < 1e-15);
        assert!((values[1] - 0.5).abs() < 1e-15);
        assert!((values[2] - 0.2).abs() < 1e-15);
        assert_eq!(values[4], 0.6);
        let expected = std::f64::consts::PI * 10.0 * 10.0 * MTSUN_SI;
        assert!((values[8] - expected).abs() < 1e-18);
        assert!((values[9] - 2.0 * expected).abs() < 1e-18);
    }

    #[test]
    fn test_start_frequency_resolve() {
        assert_eq!(StartFrequency::Shared(20.0).resolve(3).unwrap(), vec![20.0; 3]);
        assert_eq!(
            StartFrequency::from(vec![10.0, 20.0]).resolve(2).unwrap(),
            vec![10.0, 20.0]
        );
        assert!(StartFrequency::from(vec![10.0]).resolve(2).is_err());
        assert!(StartFrequency::Shared(0.0).resolve(1).is_err());
        assert!(StartFrequency::Shared(f64::NAN).resolve(1).is_err());
    }
}
