//! Initial conditions on a quasi-circular inspiral.
//!
//! Two chained batched solves per binary:
//!
//! 1. `(r, pphi)` on the circular orbit whose frequency matches the start
//!    frequency (`dH/dr = 0`, `dH/dpphi = omega0`, `pr = 0`).
//! 2. `pr` such that the orbit shrinks at the rate radiation reaction drains
//!    angular momentum.
//!
//! A binary whose solve fails is flagged with a [`ConvergenceFailure`] and
//! still carries whatever values the solver reached; the rest of the batch
//! is unaffected.

use std::fmt;

use numr::ops::{ScalarOps, TensorOps};
use numr::runtime::{Runtime, RuntimeClient};
use numr::tensor::Tensor;
use thiserror::Error;

use crate::binary::{BinaryBatch, StartFrequency};
use crate::constants::STATE_DIM;
use crate::error::WaveformResult;
use crate::kernels::{KernelArgs, KernelBuffer, RootStatus, WaveformKernels};
use crate::options::RootSolveOptions;

/// Which root solve produced a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SolveStage {
    /// Circular-orbit solve for `(r, pphi)`.
    Conservative,
    /// Radial-momentum solve for `pr`.
    Dissipative,
}

impl fmt::Display for SolveStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Conservative => write!(f, "conservative"),
            Self::Dissipative => write!(f, "dissipative"),
        }
    }
}

/// Per-binary record of a root solve that did not converge.
#[derive(Debug, Clone, PartialEq, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[error("binary {binary}: {stage} initial-condition solve failed: {status}")]
pub struct ConvergenceFailure {
    pub binary: usize,
    pub stage: SolveStage,
    pub status: RootStatus,
}

/// Solved starting point of every binary in a batch.
#[derive(Debug, Clone)]
pub struct InitialConditions<R: Runtime> {
    /// `[N]` separation in units of total mass
    pub r0: Tensor<R>,
    /// `[N]` angular momentum per unit reduced mass
    pub pphi0: Tensor<R>,
    /// `[N]` radial momentum per unit reduced mass
    pub pr0: Tensor<R>,
    /// Newtonian separation estimate `omega0^{-2/3}`
    pub r_guess: Vec<f64>,
    /// `[5, N]` kernel parameter block
    pub params: Tensor<R>,
    pub conservative: Vec<RootStatus>,
    pub dissipative: Vec<RootStatus>,
    pub failures: Vec<ConvergenceFailure>,
}

impl<R: Runtime> InitialConditions<R> {
    /// Solve the initial conditions of a batch.
    ///
    /// # Errors
    /// Only for malformed inputs; numerical failures are recorded in
    /// [`failures`](Self::failures).
    pub fn solve<C>(
        client: &C,
        batch: &BinaryBatch,
        start_frequency: &StartFrequency,
        options: &RootSolveOptions,
    ) -> WaveformResult<Self>
    where
        C: WaveformKernels<R>,
    {
        let n = batch.len();
        let device = client.device();
        let frequencies = start_frequency.resolve(n)?;

        let tensors = batch.to_tensors(client);
        let f = Tensor::<R>::from_slice(&frequencies, &[n], device);
        let omega0 = tensors.orbital_frequency(client, &f)?;
        let params = tensors.parameter_block(client, &omega0)?;

        // Newtonian guess
        let r_guess_t = client.pow_scalar(&omega0, -2.0 / 3.0)?;
        let pphi_guess = client.sqrt(&r_guess_t)?;
        let x0 = client.stack(&[&r_guess_t, &pphi_guess], 0)?;
        let r_guess: Vec<f64> = r_guess_t.to_vec();

        let zeros = Tensor::<R>::from_slice(&vec![0.0; STATE_DIM * n], &[STATE_DIM, n], device);
        let mut args = KernelArgs {
            state: zeros,
            params,
        };

        let mut circular = KernelBuffer::<f64>::zeroed(2 * n);
        let conservative = client.root_find_2d(&mut circular, &x0, &args, options)?;
        let circular = circular.into_tensor(client, &[2, n])?;
        let r0 = circular.narrow(0, 0, 1)?.contiguous().reshape(&[n])?;
        let pphi0 = circular.narrow(0, 1, 1)?.contiguous().reshape(&[n])?;

        let phi0 = Tensor::<R>::from_slice(&vec![0.0; n], &[n], device);
        args.state = client.stack(&[&r0, &phi0, &phi0, &pphi0], 0)?;

        let bracket: Vec<f64> = std::iter::repeat_n(options.pr_bracket[0], n)
            .chain(std::iter::repeat_n(options.pr_bracket[1], n))
            .collect();
        let bracket = Tensor::<R>::from_slice(&bracket, &[2, n], device);

        let mut radial = KernelBuffer::<f64>::zeroed(n);
        let dissipative = client.root_find_scalar(&mut radial, &bracket, &args, options)?;
        let pr0 = radial.into_tensor(client, &[n])?;

        let failures = collect_failures(&conservative, &dissipative);
        for failure in &failures {
            tracing::warn!(
                binary = failure.binary,
                stage = %failure.stage,
                status = %failure.status,
                "initial-condition solve did not converge"
            );
        }
        tracing::debug!(batch = n, failed = failures.len(), "initial conditions solved");

        Ok(Self {
            r0,
            pphi0,
            pr0,
            r_guess,
            params: args.params,
            conservative,
            dissipative,
            failures,
        })
    }

    pub fn batch_size(&self) -> usize {
        self.r_guess.len()
    }

    /// Whether both stages converged for binary `index`.
    pub fn is_converged(&self, index: usize) -> bool {
        self.conservative[index].is_converged() && self.dissipative[index].is_converged()
    }

    /// `[4, N]` starting states `r, phi, pr, pphi` with `phi = 0`.
    pub fn initial_state<C>(&self, client: &C) -> WaveformResult<Tensor<R>>
    where
        C: TensorOps<R> + ScalarOps<R> + RuntimeClient<R>,
    {
        let phi0 = client.mul_scalar(&self.r0, 0.0)?;
        Ok(client.stack(&[&self.r0, &phi0, &self.pr0, &self.pphi0], 0)?)
    }
}

fn collect_failures(conservative: &[RootStatus], dissipative: &[RootStatus]) -> Vec<ConvergenceFailure> {
    let stages = [
        (SolveStage::Conservative, conservative),
        (SolveStage::Dissipative, dissipative),
    ];
    let mut failures: Vec<ConvergenceFailure> = stages
        .iter()
        .flat_map(|(stage, statuses)| {
            statuses
                .iter()
                .enumerate()
                .filter(|(_, status)| !status.is_converged())
                .map(|(binary, status)| ConvergenceFailure {
                    binary,
                    stage: *stage,
                    status: *status,
                })
        })
        .collect();
    failures.sort_by_key(|failure| failure.binary);
    failures
}

#[cfg(test)]
mod tests {
    use super::*;
    use numr::runtime::cpu::{CpuClient, CpuDevice, CpuRuntime};

    fn setup() -> (CpuDevice, CpuClient) {
        let device = CpuDevice::new();
        let client = CpuClient::new(device.clone());
        (device, client)
    }

    #[test]
    fn test_newtonian_guess_close_to_solution() {
        let (_device, client) = setup();
        let batch = BinaryBatch::uniform(1, 5.0, 5.0, 0.0, 0.0).unwrap();
        let ic = InitialConditions::<CpuRuntime>::solve(
            &client,
            &batch,
            &StartFrequency::Shared(10.0),
            &RootSolveOptions::default(),
        )
        .unwrap();

        assert!(ic.failures.is_empty(), "{:?}", ic.failures);
        assert!(ic.is_converged(0));

        let r0: Vec<f64> = ic.r0.to_vec();
        let pr0: Vec<f64> = ic.pr0.to_vec();
        let pphi0: Vec<f64> = ic.pphi0.to_vec();
        assert!((ic.r_guess[0] - r0[0]).abs() / r0[0] < 0.05);
        assert!(pr0[0] < 0.0 && pr0[0] > -1e-2);
        assert!(pphi0[0] > r0[0].sqrt());
    }

    #[test]
    fn test_initial_state_layout() {
        let (_device, client) = setup();
        let batch = BinaryBatch::new(vec![8.0, 5.0], vec![2.0, 5.0], vec![0.6, 0.0], vec![0.05, 0.0]).unwrap();
        let ic = InitialConditions::<CpuRuntime>::solve(
            &client,
            &batch,
            &StartFrequency::PerBinary(vec![20.0, 30.0]),
            &RootSolveOptions::default(),
        )
        .unwrap();
        assert_eq!(ic.batch_size(), 2);

        let state = ic.initial_state(&client).unwrap();
        assert_eq!(state.shape(), &[4, 2]);
        let values: Vec<f64> = state.to_vec();
        let r0: Vec<f64> = ic.r0.to_vec();
        assert_eq!(&values[0..2], &r0[..]);
        assert_eq!(&values[2..4], &[0.0, 0.0]);
        // Same total mass, higher frequency starts closer in
        assert!(r0[1] < r0[0]);
    }

    #[test]
    fn test_bracket_miss_is_reported_per_binary() {
        let (_device, client) = setup();
        let batch = BinaryBatch::uniform(2, 5.0, 5.0, 0.0, 0.0).unwrap();
        // 350 Hz sits just outside the ISCO of a 10 Msun binary: the inspiral
        // momentum there is far larger than the default bracket allows
        let ic = InitialConditions::<CpuRuntime>::solve(
            &client,
            &batch,
            &StartFrequency::PerBinary(vec![350.0, 120.0]),
            &RootSolveOptions::default(),
        )
        .unwrap();

        assert!(ic.failures.iter().any(|f| f.binary == 0));
        assert!(ic.failures.iter().all(|f| f.binary != 1));
        assert!(ic.is_converged(1));

        if ic.conservative[0].is_converged() {
            assert!(matches!(
                ic.dissipative[0],
                RootStatus::BracketSignMismatch { .. }
            ));
            let failure = &ic.failures[0];
            assert_eq!(failure.stage, SolveStage::Dissipative);
            assert!(failure.to_string().contains("binary 0"));
        }
    }

    #[test]
    fn test_default_bracket_holds_at_extreme_parameters() {
        let (_device, client) = setup();
        // Mass ratios up to 50 and spins at +-0.99, both mass orderings
        let batch = BinaryBatch::new(
            vec![50.0, 1.0, 5.0, 20.0, 30.0],
            vec![1.0, 50.0, 5.0, 1.0, 30.0],
            vec![0.99, -0.99, 0.0, -0.99, 0.99],
            vec![0.0, 0.99, 0.0, -0.99, 0.99],
        )
        .unwrap();
        let [low, high] = RootSolveOptions::default().pr_bracket;

        for f in [10.0, 20.0] {
            let ic = InitialConditions::<CpuRuntime>::solve(
                &client,
                &batch,
                &StartFrequency::Shared(f),
                &RootSolveOptions::default(),
            )
            .unwrap();

            assert!(ic.failures.is_empty(), "{} Hz: {:?}", f, ic.failures);
            let pr0: Vec<f64> = ic.pr0.to_vec();
            for (i, &pr) in pr0.iter().enumerate() {
                assert!(ic.is_converged(i));
                assert!(pr > low && pr < high, "{} Hz, binary {}: pr0 = {}", f, i, pr);
            }
        }
    }

    #[test]
    fn test_widened_bracket_recovers_root() {
        let (_device, client) = setup();
        let batch = BinaryBatch::uniform(1, 5.0, 5.0, 0.0, 0.0).unwrap();
        let options = RootSolveOptions::default().with_pr_bracket(-0.5, 0.0);
        let narrow = InitialConditions::<CpuRuntime>::solve(
            &client,
            &batch,
            &StartFrequency::Shared(120.0),
            &RootSolveOptions::default(),
        )
        .unwrap();
        let wide = InitialConditions::<CpuRuntime>::solve(
            &client,
            &batch,
            &StartFrequency::Shared(120.0),
            &options,
        )
        .unwrap();

        let a: Vec<f64> = narrow.pr0.to_vec();
        let b: Vec<f64> = wide.pr0.to_vec();
        assert!((a[0] - b[0]).abs() < 1e-10);
    }

    #[test]
    fn test_failures_sorted_by_binary() {
        let conservative = [
            RootStatus::Converged { iterations: 3 },
            RootStatus::MaxIterations {
                iterations: 10,
                residual: 1.0,
            },
        ];
        let dissipative = [
            RootStatus::BracketSignMismatch {
                f_low: 1.0,
                f_high: 1.0,
            },
            RootStatus::NonFinite { iterations: 0 },
        ];
        let failures = collect_failures(&conservative, &dissipative);
        let order: Vec<(usize, SolveStage)> = failures.iter().map(|f| (f.binary, f.stage)).collect();
        assert_eq!(
            order,
            vec![
                (0, SolveStage::Dissipative),
                (1, SolveStage::Conservative),
                (1, SolveStage::Dissipative)
            ]
        );
    }
}
