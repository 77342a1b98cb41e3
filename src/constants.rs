//! Physical constants.

/// Geometrized solar mass in seconds, G M_sun / c^3.
pub const MTSUN_SI: f64 = 4.925_490_947_641_266_8e-6;

/// Lower edge of the default radial-momentum bracket.
pub const PR_BRACKET_LOW: f64 = -1e-2;

/// Upper edge of the default radial-momentum bracket.
pub const PR_BRACKET_HIGH: f64 = 0.0;

/// Number of phase-space variables carried by a trajectory sample: (r, phi, pr, pphi).
pub const STATE_DIM: usize = 4;

/// Number of per-binary kernel parameters: (m1/M, m2/M, chi1, chi2, omega0).
pub const PARAM_DIM: usize = 5;
