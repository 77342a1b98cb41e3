//! Trait definitions and types for the waveform kernels.

mod algorithms;
mod types;

pub use algorithms::WaveformKernels;
pub use types::{IntegrationOutput, KernelArgs, KernelBuffer, RootStatus, StopReason};
