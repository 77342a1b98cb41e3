//! Batched numerical kernels.
//!
//! The pipeline components never evaluate model equations themselves: they
//! stage tensors, call one of the [`WaveformKernels`] methods on the backend
//! client and wrap the result. Each backend gets a thin implementation that
//! delegates to [`impl_generic`].
//!
//! | Kernel | Inputs | Output |
//! |--------|--------|--------|
//! | [`WaveformKernels::root_find_2d`] | `x0 [2, N]`, params `[5, N]` | `(r, pphi)` into `[2, N]` |
//! | [`WaveformKernels::root_find_scalar`] | bracket `[2, N]`, state `[4, N]` | `pr` into `[N]` |
//! | [`WaveformKernels::integrate`] | state `[4, N]`, params `[5, N]` | `[N, 4, cap]`, `[N, cap]`, counts |
//! | [`WaveformKernels::evaluate_modes`] | `[N, 4, T]`, params `[5, N]` | `h_lm` into `[N, n_modes, T]` |

mod cpu;
#[cfg(feature = "cuda")]
mod cuda;
pub mod impl_generic;
mod traits;

pub use traits::{
    IntegrationOutput, KernelArgs, KernelBuffer, RootStatus, StopReason, WaveformKernels,
};
