//! Public entry point: one call from binary parameters to assembled modes.

use std::fmt;
use std::marker::PhantomData;

use numr::runtime::Runtime;
use numr::runtime::cpu::{CpuClient, CpuDevice, CpuRuntime};

use crate::assembler::{HostWaveform, WaveformOutput, assemble};
use crate::binary::{BinaryBatch, StartFrequency};
use crate::error::{WaveformError, WaveformResult};
use crate::initial_conditions::InitialConditions;
use crate::kernels::WaveformKernels;
use crate::modes::ModeSet;
use crate::multipoles::ModeTimeSeries;
use crate::options::GeneratorOptions;
use crate::trajectory::Trajectory;

/// Per-call sizes threaded through the stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallContext {
    pub batch_size: usize,
    pub n_modes: usize,
}

impl CallContext {
    fn check_batch(&self, stage: &str, batch_size: usize) -> WaveformResult<()> {
        if batch_size != self.batch_size {
            return Err(WaveformError::invalid_input(format!(
                "{}: context expects {} binaries, got {}",
                stage, self.batch_size, batch_size
            )));
        }
        Ok(())
    }
}

/// Inputs of one generation call.
#[derive(Debug, Clone, PartialEq)]
pub struct WaveformRequest {
    pub batch: BinaryBatch,
    /// Requested modes; `None` selects the full registry
    pub modes: Option<Vec<(i32, i32)>>,
    pub start_frequency: StartFrequency,
}

impl WaveformRequest {
    /// Request every registry mode from 10 Hz.
    ///
    /// With default [`IntegratorOptions`](crate::IntegratorOptions) a 10 Hz
    /// start usually exhausts `max_step` before the inspiral ends; check
    /// [`WaveformOutput::truncated`].
    pub fn new(batch: BinaryBatch) -> Self {
        Self {
            batch,
            modes: None,
            start_frequency: StartFrequency::default(),
        }
    }

    pub fn with_modes(mut self, modes: Vec<(i32, i32)>) -> Self {
        self.modes = Some(modes);
        self
    }

    pub fn with_start_frequency(mut self, start_frequency: impl Into<StartFrequency>) -> Self {
        self.start_frequency = start_frequency.into();
        self
    }

    /// Validate the request and fix the per-call sizes.
    pub fn context(&self) -> WaveformResult<(CallContext, ModeSet)> {
        let modes = ModeSet::validate(self.modes.as_deref())?;
        self.start_frequency.resolve(self.batch.len())?;
        let context = CallContext {
            batch_size: self.batch.len(),
            n_modes: modes.len(),
        };
        Ok((context, modes))
    }
}

/// Waveform pipeline bound to one backend client.
///
/// # Example
///
/// ```ignore
/// use eobwave::{BinaryBatch, GeneratorOptions, WaveformGenerator, WaveformRequest};
/// use numr::runtime::cpu::{CpuClient, CpuDevice};
///
/// let device = CpuDevice::new();
/// let client = CpuClient::new(device.clone());
/// let generator = WaveformGenerator::new(client, GeneratorOptions::default());
///
/// let batch = BinaryBatch::new(vec![8.0], vec![2.0], vec![0.6], vec![0.05])?;
/// let output = generator.generate(&WaveformRequest::new(batch).with_modes(vec![(2, 2)]))?;
/// ```
pub struct WaveformGenerator<R: Runtime, C> {
    client: C,
    options: GeneratorOptions,
    _runtime: PhantomData<R>,
}

impl<R: Runtime, C> fmt::Debug for WaveformGenerator<R, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WaveformGenerator")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl<R, C> WaveformGenerator<R, C>
where
    R: Runtime,
    C: WaveformKernels<R>,
{
    pub fn new(client: C, options: GeneratorOptions) -> Self {
        Self {
            client,
            options,
            _runtime: PhantomData,
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn options(&self) -> &GeneratorOptions {
        &self.options
    }

    /// Solve the starting orbit of every binary.
    pub fn initial_conditions(
        &self,
        context: &CallContext,
        batch: &BinaryBatch,
        start_frequency: &StartFrequency,
    ) -> WaveformResult<InitialConditions<R>> {
        context.check_batch("initial_conditions", batch.len())?;
        InitialConditions::solve(&self.client, batch, start_frequency, &self.options.roots)
    }

    /// Integrate from solved initial conditions.
    pub fn run_trajectory(
        &self,
        context: &CallContext,
        batch: &BinaryBatch,
        initial: &InitialConditions<R>,
    ) -> WaveformResult<Trajectory<R>> {
        context.check_batch("run_trajectory", batch.len())?;
        context.check_batch("run_trajectory", initial.batch_size())?;
        Trajectory::integrate(&self.client, batch, initial, &self.options.integrator)
    }

    /// Evaluate modes along a trajectory.
    pub fn hlms(
        &self,
        context: &CallContext,
        batch: &BinaryBatch,
        trajectory: &Trajectory<R>,
        modes: &ModeSet,
    ) -> WaveformResult<ModeTimeSeries<R>> {
        context.check_batch("hlms", batch.len())?;
        context.check_batch("hlms", trajectory.batch_size())?;
        if context.n_modes != modes.len() {
            return Err(WaveformError::invalid_input(format!(
                "hlms: context expects {} modes, got {}",
                context.n_modes,
                modes.len()
            )));
        }
        ModeTimeSeries::synthesize(&self.client, batch, trajectory, modes)
    }

    /// Run the whole pipeline.
    ///
    /// # Errors
    /// * `InvalidMode` / `DuplicateMode` before any numeric work
    /// * `InvalidInput` for malformed frequencies
    ///
    /// Root-solve failures and saturated trajectories are reported on the
    /// output, not as errors.
    pub fn generate(&self, request: &WaveformRequest) -> WaveformResult<WaveformOutput<R>> {
        let (context, modes) = request.context()?;
        tracing::info!(
            batch = context.batch_size,
            modes = context.n_modes,
            "generating waveforms"
        );

        let initial = self.initial_conditions(&context, &request.batch, &request.start_frequency)?;
        let trajectory = self.run_trajectory(&context, &request.batch, &initial)?;
        let series = self.hlms(&context, &request.batch, &trajectory, &modes)?;
        let output = assemble(&self.client, &trajectory, &series, initial.failures)?;

        tracing::info!(
            samples = output.n_samples(),
            failed = output.failures.len(),
            truncated = output.truncated().len(),
            "waveforms assembled"
        );
        Ok(output)
    }
}

/// Backend-erased generator returning host data.
pub enum Generator {
    Cpu(WaveformGenerator<CpuRuntime, CpuClient>),
    #[cfg(feature = "cuda")]
    Cuda(
        WaveformGenerator<
            numr::runtime::cuda::CudaRuntime,
            numr::runtime::cuda::CudaClient,
        >,
    ),
}

impl fmt::Debug for Generator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Generator")
            .field("backend", &self.backend())
            .finish_non_exhaustive()
    }
}

impl Generator {
    /// Build a generator on the backend selected by `options.use_gpu`.
    ///
    /// # Errors
    /// * `BackendUnavailable` when the accelerator is requested but the crate
    ///   was built without `cuda`, or no device can be opened
    pub fn new(options: GeneratorOptions) -> WaveformResult<Self> {
        if options.use_gpu {
            return Self::new_cuda(options);
        }
        let device = CpuDevice::new();
        let client = CpuClient::new(device);
        tracing::debug!("using cpu backend");
        Ok(Self::Cpu(WaveformGenerator::new(client, options)))
    }

    #[cfg(feature = "cuda")]
    fn new_cuda(options: GeneratorOptions) -> WaveformResult<Self> {
        use numr::runtime::cuda::{CudaClient, CudaDevice};

        let device = CudaDevice::new(0).map_err(|e| WaveformError::BackendUnavailable {
            backend: "cuda",
            reason: e.to_string(),
        })?;
        let client = CudaClient::new(device);
        tracing::debug!("using cuda backend");
        Ok(Self::Cuda(WaveformGenerator::new(client, options)))
    }

    #[cfg(not(feature = "cuda"))]
    fn new_cuda(_options: GeneratorOptions) -> WaveformResult<Self> {
        Err(WaveformError::BackendUnavailable {
            backend: "cuda",
            reason: "crate built without the `cuda` feature".to_string(),
        })
    }

    pub fn backend(&self) -> &'static str {
        match self {
            Self::Cpu(_) => "cpu",
            #[cfg(feature = "cuda")]
            Self::Cuda(_) => "cuda",
        }
    }

    /// Run the pipeline and copy the result to the host.
    pub fn generate(&self, request: &WaveformRequest) -> WaveformResult<HostWaveform> {
        match self {
            Self::Cpu(generator) => Ok(generator.generate(request)?.to_host()),
            #[cfg(feature = "cuda")]
            Self::Cuda(generator) => Ok(generator.generate(request)?.to_host()),
        }
    }
}
