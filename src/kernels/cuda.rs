//! CUDA implementation of the waveform kernels.

use numr::dtype::Complex128;
use numr::runtime::cuda::{CudaClient, CudaRuntime};
use numr::tensor::Tensor;

use crate::error::WaveformResult;
use crate::kernels::impl_generic::{
    evaluate_modes_impl, integrate_impl, root_find_2d_impl, root_find_scalar_impl,
};
use crate::kernels::{IntegrationOutput, KernelArgs, KernelBuffer, RootStatus, WaveformKernels};
use crate::modes::ModeSet;
use crate::options::{IntegratorOptions, RootSolveOptions};
use crate::ragged::ValidLengths;

impl WaveformKernels<CudaRuntime> for CudaClient {
    fn root_find_2d(
        &self,
        out: &mut KernelBuffer<f64>,
        x0: &Tensor<CudaRuntime>,
        args: &KernelArgs<CudaRuntime>,
        options: &RootSolveOptions,
    ) -> WaveformResult<Vec<RootStatus>> {
        root_find_2d_impl(self, out, x0, args, options)
    }

    fn root_find_scalar(
        &self,
        out: &mut KernelBuffer<f64>,
        bracket: &Tensor<CudaRuntime>,
        args: &KernelArgs<CudaRuntime>,
        options: &RootSolveOptions,
    ) -> WaveformResult<Vec<RootStatus>> {
        root_find_scalar_impl(self, out, bracket, args, options)
    }

    fn evaluate_modes(
        &self,
        out: &mut KernelBuffer<Complex128>,
        states: &Tensor<CudaRuntime>,
        params: &Tensor<CudaRuntime>,
        lengths: &ValidLengths,
        modes: &ModeSet,
    ) -> WaveformResult<()> {
        evaluate_modes_impl(self, out, states, params, lengths, modes)
    }

    fn integrate(
        &self,
        initial_state: &Tensor<CudaRuntime>,
        params: &Tensor<CudaRuntime>,
        options: &IntegratorOptions,
    ) -> WaveformResult<IntegrationOutput<CudaRuntime>> {
        integrate_impl(self, initial_state, params, options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use numr::runtime::cuda::CudaDevice;

    fn setup() -> Option<(CudaDevice, CudaClient)> {
        // Skip if no CUDA device available
        let device = CudaDevice::new(0).ok()?;
        let client = CudaClient::new(device.clone());
        Some((device, client))
    }

    #[test]
    fn test_root_find_2d_cuda() {
        let Some((device, client)) = setup() else {
            return;
        };
        let omega0: f64 = 0.02;
        let params = Tensor::<CudaRuntime>::from_slice(&[0.5, 0.5, 0.0, 0.0, omega0], &[5, 1], &device);
        let r_guess = omega0.powf(-2.0 / 3.0);
        let x0 = Tensor::<CudaRuntime>::from_slice(&[r_guess, r_guess.sqrt()], &[2, 1], &device);
        let args = KernelArgs {
            state: Tensor::<CudaRuntime>::from_slice(&[0.0; 4], &[4, 1], &device),
            params,
        };

        let mut out = KernelBuffer::<f64>::zeroed(2);
        let status = client
            .root_find_2d(&mut out, &x0, &args, &RootSolveOptions::default())
            .unwrap();
        assert!(status[0].is_converged());
    }
}
