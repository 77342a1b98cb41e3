//! eobwave - Batched effective-one-body waveforms for aligned-spin binaries
//!
//! eobwave turns a batch of compact binaries (component masses and aligned
//! spins) into inspiral trajectories and spin-weighted spherical-harmonic
//! strain modes `h_lm`, packed into one feature tensor per call. Every stage
//! runs on numr tensors and works on any backend that implements
//! [`kernels::WaveformKernels`].
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                    WaveformGenerator                     │
//! │         modes → initial conditions → trajectory          │
//! │                    → h_lm → assembler                    │
//! └────────────────────────────┬─────────────────────────────┘
//!                              │ calls
//! ┌────────────────────────────▼─────────────────────────────┐
//! │                kernels (WaveformKernels)                 │
//! │             root_find_2d, root_find_scalar,              │
//! │                integrate, evaluate_modes                 │
//! └────────────────────────────┬─────────────────────────────┘
//!                              │ uses
//! ┌────────────────────────────▼─────────────────────────────┐
//! │                           numr                           │
//! │            (tensors, complex ops, CPU / CUDA)            │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`modes`] - Registry of producible (l, m) modes
//! - [`initial_conditions`] - Circular-orbit and radial-momentum root solves
//! - [`trajectory`] - Adaptive Dormand-Prince integration of the orbit
//! - [`multipoles`] - Factorized multipole modes along a trajectory
//! - [`assembler`] - Packing into `[N, 2 n_modes + 1, T]` features
//! - [`generator`] - One-call pipeline and backend selection
//! - [`kernels`] - Backend trait and its CPU/CUDA implementations
//!
//! # Ragged Output
//!
//! Binaries merge after different numbers of steps. Every output array is
//! sized to the longest valid run in the batch; [`ValidLengths`] carries each
//! binary's own count and everything past it is zero padding. Binaries cut
//! short by the allocation are listed by `truncated()`, which reads the
//! per-binary stop reasons.
//!
//! # Feature Flags
//!
//! | Feature | Description | Dependencies |
//! |---------|-------------|--------------|
//! | `cuda`  | Run the pipeline on an NVIDIA GPU | CUDA 12.x, numr/cuda |
//! | `serde` | Serialize options and per-binary diagnostics | serde |
//!
//! ## Usage
//!
//! ```toml
//! # CPU only (default)
//! eobwave = "0.1"
//!
//! # With CUDA support
//! eobwave = { version = "0.1", features = ["cuda"] }
//! ```
//!
//! # Example
//!
//! ```ignore
//! use eobwave::{BinaryBatch, Generator, GeneratorOptions, WaveformRequest};
//!
//! let batch = BinaryBatch::new(vec![8.0, 30.0], vec![2.0, 25.0], vec![0.6, 0.1], vec![0.05, -0.2])?;
//! let request = WaveformRequest::new(batch)
//!     .with_modes(vec![(2, 2), (3, 3), (2, 1)])
//!     .with_start_frequency(20.0);
//!
//! let generator = Generator::new(GeneratorOptions::default())?;
//! let waveform = generator.generate(&request)?;
//!
//! for b in 0..waveform.batch_size() {
//!     let h22 = waveform.mode_value(b, 0, waveform.counts[b] - 1);
//!     println!("binary {b}: {} samples, final |h22| = {}", waveform.counts[b], h22.re.hypot(h22.im));
//! }
//! ```

pub mod assembler;
pub mod binary;
pub mod constants;
pub mod error;
pub mod generator;
pub mod initial_conditions;
pub mod kernels;
pub mod modes;
pub mod multipoles;
pub mod options;
pub mod ragged;
pub mod trajectory;

pub use assembler::{HostWaveform, WaveformOutput, assemble};
pub use binary::{BatchTensors, BinaryBatch, StartFrequency};
pub use error::{WaveformError, WaveformResult};
pub use generator::{CallContext, Generator, WaveformGenerator, WaveformRequest};
pub use initial_conditions::{ConvergenceFailure, InitialConditions, SolveStage};
pub use kernels::{RootStatus, StopReason, WaveformKernels};
pub use modes::{ALLOWED_MODES, ModeSet};
pub use multipoles::ModeTimeSeries;
pub use options::{GeneratorOptions, IntegratorOptions, RootSolveOptions};
pub use ragged::ValidLengths;
pub use trajectory::Trajectory;
