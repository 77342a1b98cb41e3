//! Configuration for the generator and its numeric stages.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::constants::{PR_BRACKET_HIGH, PR_BRACKET_LOW};

/// Options for the batched initial-condition root solves.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RootSolveOptions {
    /// Maximum number of iterations per binary (default: 1000)
    pub max_iter: usize,
    /// Convergence tolerance (default: 1e-12)
    pub tol: f64,
    /// Relative step for finite-difference derivatives (default: 1e-7)
    pub fd_eps: f64,
    /// Bracket for the radial momentum solve (default: [-1e-2, 0])
    pub pr_bracket: [f64; 2],
}

impl Default for RootSolveOptions {
    fn default() -> Self {
        Self {
            max_iter: 1000,
            tol: 1e-12,
            fd_eps: 1e-7,
            pr_bracket: [PR_BRACKET_LOW, PR_BRACKET_HIGH],
        }
    }
}

impl RootSolveOptions {
    /// Create options with the given iteration cap and tolerance.
    pub fn with_limits(max_iter: usize, tol: f64) -> Self {
        Self {
            max_iter,
            tol,
            ..Default::default()
        }
    }

    /// Override the radial momentum bracket.
    pub fn with_pr_bracket(mut self, low: f64, high: f64) -> Self {
        self.pr_bracket = [low, high];
        self
    }
}

/// Options for the batched trajectory integration.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct IntegratorOptions {
    /// Allocated samples per binary, initial state included (default: 2000)
    ///
    /// At the default 10 Hz start most stellar-mass binaries fill all 2000
    /// samples before reaching `r_stop` (a 5 + 5 Msun binary needs roughly
    /// 30 Hz to finish). Raise this, or start later, for complete inspirals.
    pub max_step: usize,
    /// Maximum integration time in units of total mass (default: 1e7)
    pub t_max: f64,
    /// Relative tolerance (default: 1e-9)
    pub rtol: f64,
    /// Absolute tolerance (default: 1e-11)
    pub atol: f64,
    /// Initial step size (default: auto-computed)
    pub h0: Option<f64>,
    /// Maximum step size (default: unbounded)
    pub max_dt: Option<f64>,
    /// Separation at which the inspiral is considered finished (default: 3.0)
    pub r_stop: f64,
}

impl Default for IntegratorOptions {
    fn default() -> Self {
        Self {
            max_step: 2000,
            t_max: 1e7,
            rtol: 1e-9,
            atol: 1e-11,
            h0: None,
            max_dt: None,
            r_stop: 3.0,
        }
    }
}

impl IntegratorOptions {
    /// Create options with specified tolerances.
    pub fn with_tolerances(rtol: f64, atol: f64) -> Self {
        Self {
            rtol,
            atol,
            ..Default::default()
        }
    }

    /// Set the allocated sample capacity.
    pub fn with_max_step(mut self, max_step: usize) -> Self {
        self.max_step = max_step;
        self
    }

    /// Set the maximum integration time (units of total mass).
    pub fn with_t_max(mut self, t_max: f64) -> Self {
        self.t_max = t_max;
        self
    }

    /// Bound the step size (units of total mass).
    pub fn with_max_dt(mut self, max_dt: f64) -> Self {
        self.max_dt = Some(max_dt);
        self
    }
}

/// Top-level generator configuration.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GeneratorOptions {
    /// Run the kernels on the accelerator backend (requires the `cuda` feature)
    pub use_gpu: bool,
    /// Initial-condition solver settings
    pub roots: RootSolveOptions,
    /// Trajectory integrator settings
    pub integrator: IntegratorOptions,
}

impl GeneratorOptions {
    /// Select the backend.
    pub fn with_gpu(mut self, use_gpu: bool) -> Self {
        self.use_gpu = use_gpu;
        self
    }

    pub fn with_roots(mut self, roots: RootSolveOptions) -> Self {
        self.roots = roots;
        self
    }

    pub fn with_integrator(mut self, integrator: IntegratorOptions) -> Self {
        self.integrator = integrator;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_settings() {
        let opts = GeneratorOptions::default();
        assert!(!opts.use_gpu);
        assert_eq!(opts.roots.max_iter, 1000);
        assert_eq!(opts.roots.tol, 1e-12);
        assert_eq!(opts.roots.pr_bracket, [-1e-2, 0.0]);
        assert_eq!(opts.integrator.max_step, 2000);
        assert_eq!(opts.integrator.t_max, 1e7);
    }

    #[test]
    fn test_builders() {
        let opts = GeneratorOptions::default()
            .with_gpu(true)
            .with_integrator(IntegratorOptions::default().with_max_step(50).with_max_dt(10.0))
            .with_roots(RootSolveOptions::with_limits(10, 1e-8).with_pr_bracket(-0.1, 0.0));

        assert!(opts.use_gpu);
        assert_eq!(opts.integrator.max_step, 50);
        assert_eq!(opts.integrator.max_dt, Some(10.0));
        assert_eq!(opts.roots.max_iter, 10);
        assert_eq!(opts.roots.pr_bracket, [-0.1, 0.0]);
    }
}
