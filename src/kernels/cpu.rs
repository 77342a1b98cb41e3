//! CPU implementation of the waveform kernels.

use numr::dtype::Complex128;
use numr::runtime::cpu::{CpuClient, CpuRuntime};
use numr::tensor::Tensor;

use crate::error::WaveformResult;
use crate::kernels::impl_generic::{
    evaluate_modes_impl, integrate_impl, root_find_2d_impl, root_find_scalar_impl,
};
use crate::kernels::{IntegrationOutput, KernelArgs, KernelBuffer, RootStatus, WaveformKernels};
use crate::modes::ModeSet;
use crate::options::{IntegratorOptions, RootSolveOptions};
use crate::ragged::ValidLengths;

impl WaveformKernels<CpuRuntime> for CpuClient {
    fn root_find_2d(
        &self,
        out: &mut KernelBuffer<f64>,
        x0: &Tensor<CpuRuntime>,
        args: &KernelArgs<CpuRuntime>,
        options: &RootSolveOptions,
    ) -> WaveformResult<Vec<RootStatus>> {
        root_find_2d_impl(self, out, x0, args, options)
    }

    fn root_find_scalar(
        &self,
        out: &mut KernelBuffer<f64>,
        bracket: &Tensor<CpuRuntime>,
        args: &KernelArgs<CpuRuntime>,
        options: &RootSolveOptions,
    ) -> WaveformResult<Vec<RootStatus>> {
        root_find_scalar_impl(self, out, bracket, args, options)
    }

    fn evaluate_modes(
        &self,
        out: &mut KernelBuffer<Complex128>,
        states: &Tensor<CpuRuntime>,
        params: &Tensor<CpuRuntime>,
        lengths: &ValidLengths,
        modes: &ModeSet,
    ) -> WaveformResult<()> {
        evaluate_modes_impl(self, out, states, params, lengths, modes)
    }

    fn integrate(
        &self,
        initial_state: &Tensor<CpuRuntime>,
        params: &Tensor<CpuRuntime>,
        options: &IntegratorOptions,
    ) -> WaveformResult<IntegrationOutput<CpuRuntime>> {
        integrate_impl(self, initial_state, params, options)
    }
}
